//! Código de tres direcciones.
//!
//! Los registros son virtuales e ilimitados; las variables se
//! direccionan por nombre. Las etiquetas no tienen efecto en tiempo de
//! ejecución, solo marcan destinos de saltos.

use crate::{
    ast::{Literal, RelOp},
    lex::Identifier,
};

use std::fmt::{self, Display};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Register(pub u32);

impl Display for Register {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "R{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "L{}", self.0)
    }
}

/// Operaciones aritméticas nativas. El residuo no es una de ellas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// `LOAD dst, var`
    Load(Register, Identifier),

    /// `LOADI dst, literal`
    LoadImmediate(Register, Literal),

    /// `STORE var, src`
    Store(Identifier, Register),

    /// `ADD dst, a, b` y similares
    Arithmetic(Arithmetic, Register, Register, Register),

    /// El resultado booleano reemplaza al primer operando.
    Compare(RelOp, Register, Register),

    Jump(Label),
    JumpIfFalse(Register, Label),
    JumpIfTrue(Register, Label),
    SetLabel(Label),
}

impl Instruction {
    pub fn opcode(&self) -> &'static str {
        use Instruction::*;

        match self {
            Load(..) => "LOAD",
            LoadImmediate(..) => "LOADI",
            Store(..) => "STORE",

            Arithmetic(op, ..) => match op {
                self::Arithmetic::Add => "ADD",
                self::Arithmetic::Sub => "SUB",
                self::Arithmetic::Mul => "MUL",
                self::Arithmetic::Div => "DIV",
            },

            Compare(op, ..) => match op {
                RelOp::Greater => "CMPGT",
                RelOp::Less => "CMPLT",
                RelOp::GreaterOrEqual => "CMPGE",
                RelOp::LessOrEqual => "CMPLE",
                RelOp::Equal => "CMPEQ",
                RelOp::NotEqual => "CMPNE",
            },

            Jump(_) => "JMP",
            JumpIfFalse(..) => "JMPFALSE",
            JumpIfTrue(..) => "JMPTRUE",
            SetLabel(_) => "LABEL",
        }
    }

    /// Operandos en su forma textual, en el orden en que se imprimen.
    pub fn operands(&self) -> Vec<String> {
        use Instruction::*;

        match self {
            Load(dst, var) => vec![dst.to_string(), var.to_string()],
            LoadImmediate(dst, literal) => vec![dst.to_string(), literal.to_string()],
            Store(var, src) => vec![var.to_string(), src.to_string()],
            Arithmetic(_, dst, a, b) => vec![dst.to_string(), a.to_string(), b.to_string()],
            Compare(_, a, b) => vec![a.to_string(), b.to_string()],
            Jump(label) | SetLabel(label) => vec![label.to_string()],
            JumpIfFalse(reg, label) | JumpIfTrue(reg, label) => {
                vec![reg.to_string(), label.to_string()]
            }
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} {}", self.opcode(), self.operands().join(", "))
    }
}

/// Un programa es una única secuencia de instrucciones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub code: Vec<Instruction>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.code.iter()
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Display for Program {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.code {
            writeln!(fmt, "{}", instruction)?;
        }

        Ok(())
    }
}
