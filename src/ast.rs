//! Árbol sintáctico abstracto.
//!
//! El AST es inmutable una vez construido por [`crate::parse`]. Cada
//! nodo que puede ser objeto de un diagnóstico lleva su ubicación
//! original por medio de [`Located`].

use crate::{lex::Identifier, source::Located};
use std::fmt::{self, Display};

/// Tipo escalar del lenguaje.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Integer,
    Real,
    Character,
}

impl Type {
    /// Determina si el tipo admite aritmética.
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Integer | Type::Real)
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer => fmt.write_str("inteiro"),
            Type::Real => fmt.write_str("real"),
            Type::Character => fmt.write_str("caracter"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
    pub commands: Vec<Located<Command>>,
}

/// `inteiro a, b;`
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub of: Located<Type>,
    pub names: Vec<Located<Identifier>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Assign {
        target: Located<Identifier>,
        value: Located<Expr>,
    },

    If {
        condition: Condition,
        then: Box<Located<Command>>,
        otherwise: Option<Box<Located<Command>>>,
    },

    While {
        condition: Condition,
        body: Box<Located<Command>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Literal),
    Read(Identifier),
    Binary(Box<Located<Expr>>, Located<BinOp>, Box<Located<Expr>>),
}

/// Comparación simple, como en `a > 10`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub left: Located<Expr>,
    pub op: Located<RelOp>,
    pub right: Located<Expr>,
}

/// Constante numérica en su forma textual.
///
/// El tipo es puramente léxico: con punto decimal es real, de lo
/// contrario es entero, sin importar su magnitud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal(String);

impl Literal {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Literal(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn typ(&self) -> Type {
        if self.0.contains('.') {
            Type::Real
        } else {
            Type::Integer
        }
    }
}

impl Display for Literal {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "RESTO",
        };

        fmt.write_str(string)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RelOp {
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl Display for RelOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            RelOp::Greater => ">",
            RelOp::Less => "<",
            RelOp::GreaterOrEqual => ">=",
            RelOp::LessOrEqual => "<=",
            RelOp::Equal => "==",
            RelOp::NotEqual => "!=",
        };

        fmt.write_str(string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_type_is_lexical() {
        assert_eq!(Literal::new("10").typ(), Type::Integer);
        assert_eq!(Literal::new("99999999999999999999").typ(), Type::Integer);
        assert_eq!(Literal::new("0.5").typ(), Type::Real);
        assert_eq!(Literal::new("10.0").typ(), Type::Real);
    }

    #[test]
    fn numeric_types() {
        assert!(Type::Integer.is_numeric());
        assert!(Type::Real.is_numeric());
        assert!(!Type::Character.is_numeric());
    }
}
