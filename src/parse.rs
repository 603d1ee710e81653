//! Análisis sintáctico.
//!
//! Parser descendente recursivo que construye directamente el AST de
//! [`crate::ast`] a partir del flujo de tokens. Cada regla puede fallar
//! de forma débil (la regla no aplica y se puede intentar otra) o
//! estricta (la regla aplicaba pero el programa está mal formado). El
//! primer fallo estricto detiene el análisis: no hay recuperación, por
//! lo cual cada compilación reporta a lo sumo un error sintáctico.
//!
//! ```text
//! program     := declaration* command*
//! declaration := type IDENT ("," IDENT)* ";"
//! command     := assignment | if | while
//! assignment  := IDENT "=" expr (arith expr)* ";"
//! if          := "se" "(" condition ")" "entao" command ("senao" command)?
//! while       := "enquanto" "(" condition ")" command
//! condition   := expr relop expr
//! expr        := NUMBER | IDENT | "(" expr arith expr ")"
//! ```
//!
//! Los operadores encadenados de una asignación se pliegan hacia la
//! izquierda sin precedencia: `a = 1 + 2 * 3;` equivale a `a = ((1 + 2) * 3);`.

use std::{iter::Peekable, marker::PhantomData};
use thiserror::Error;

use crate::{
    ast::{BinOp, Command, Condition, Declaration, Expr, Literal, Program, RelOp, Type},
    error::{sealed, Phase, Report},
    lex::{Identifier, Keyword, Token},
    source::{Located, Location},
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("esperado {0}, encontrado {1}")]
    UnexpectedToken(Token, Token),

    #[error("esperado {0}, fim do programa encontrado")]
    MissingToken(Token),

    #[error("esperado identificador")]
    ExpectedId,

    #[error("esperado `inteiro`, `real` ou `caracter`")]
    ExpectedType,

    #[error("esperado `se`, `enquanto` ou atribuição")]
    ExpectedCommand,

    #[error("esperado uma expressão")]
    ExpectedExpr,

    #[error("esperado operador aritmético")]
    ExpectedOperator,

    #[error("esperado operador relacional")]
    ExpectedRelOp,

    #[error("fim abrupto do programa")]
    UnexpectedEof,
}

impl sealed::Sealed for ParserError {}

impl Report for ParserError {
    const PHASE: Phase = Phase::Syntactic;

    fn code(&self) -> u16 {
        match self {
            ParserError::UnexpectedToken(..)
            | ParserError::MissingToken(_)
            | ParserError::ExpectedId => 100,

            _ => 101,
        }
    }

    fn summary(&self) -> &'static str {
        match self.code() {
            100 => "token esperado não encontrado",
            _ => "estrutura inválida na gramática",
        }
    }

    fn offending(&self) -> String {
        match self {
            ParserError::UnexpectedToken(_, found) => found.text(),
            _ => String::new(),
        }
    }
}

/// Un flujo de tokens que puede bifurcarse para backtracking.
pub trait TokenStream<'a>: Iterator<Item = &'a Located<Token>> + Clone {}

impl<'a, I> TokenStream<'a> for I where I: Iterator<Item = &'a Located<Token>> + Clone {}

pub fn parse<'a>(tokens: impl TokenStream<'a>) -> Result<Program, Located<ParserError>> {
    let mut parser = Parser {
        tokens: tokens.peekable(),
        last_known: Location::default(),
        lifetime_hack: PhantomData,
    };

    parser.program().map_err(Failure::coerce)
}

#[derive(Clone)]
struct Parser<'a, I: TokenStream<'a>> {
    tokens: Peekable<I>,
    last_known: Location,
    lifetime_hack: PhantomData<&'a ()>,
}

enum Failure {
    Weak(Located<ParserError>),
    Strict(Located<ParserError>),
}

impl Failure {
    fn weak(self) -> Self {
        Failure::Weak(self.coerce())
    }

    fn strict(self) -> Self {
        Failure::Strict(self.coerce())
    }

    fn coerce(self) -> Located<ParserError> {
        match self {
            Failure::Weak(error) => error,
            Failure::Strict(error) => error,
        }
    }
}

type Parse<T> = Result<T, Failure>;

impl<'a, I: TokenStream<'a>> Parser<'a, I> {
    fn program(&mut self) -> Parse<Program> {
        let mut declarations = Vec::new();
        while let Some(declaration) = self.optional(Parser::declaration)? {
            declarations.push(declaration);
        }

        let mut commands = Vec::new();
        while self.tokens.peek().is_some() {
            commands.push(self.command()?);
        }

        Ok(Program {
            declarations,
            commands,
        })
    }

    fn declaration(&mut self) -> Parse<Declaration> {
        let of = self.typ().map_err(Failure::weak)?;
        let names = self.comma_separated(Parser::id)?;
        self.expect(Token::Semicolon)?;

        Ok(Declaration { of, names })
    }

    fn command(&mut self) -> Parse<Located<Command>> {
        self.located(|s| match s.lookahead(|s| s.next().map(Located::into_inner))? {
            Token::Keyword(Keyword::Se) => s.if_command(),
            Token::Keyword(Keyword::Enquanto) => s.while_command(),
            Token::Id(_) => s.assignment(),

            _ => {
                s.next()?;
                s.fail(ParserError::ExpectedCommand)
            }
        })
    }

    fn if_command(&mut self) -> Parse<Command> {
        self.keyword(Keyword::Se)?;
        let condition = self.condition()?;
        self.keyword(Keyword::Entao)?;

        let then = Box::new(self.command()?);
        let otherwise = match self.attempt(|s| s.keyword(Keyword::Senao).map_err(Failure::weak)) {
            Err(Failure::Weak(_)) => None,
            result => {
                result?;
                Some(Box::new(self.command()?))
            }
        };

        Ok(Command::If {
            condition,
            then,
            otherwise,
        })
    }

    fn while_command(&mut self) -> Parse<Command> {
        self.keyword(Keyword::Enquanto)?;
        let condition = self.condition()?;
        let body = Box::new(self.command()?);

        Ok(Command::While { condition, body })
    }

    fn assignment(&mut self) -> Parse<Command> {
        let target = self.id()?;
        self.expect(Token::Assign)?;

        let mut value = self.expr().map_err(Failure::strict)?;
        while let Some(op) = self.optional(Parser::arith)? {
            let right = self.expr().map_err(Failure::strict)?;
            let location = Location::span(value.location().clone(), right.location());

            value = Located::at(Expr::Binary(Box::new(value), op, Box::new(right)), location);
        }

        self.expect(Token::Semicolon)?;
        Ok(Command::Assign { target, value })
    }

    fn condition(&mut self) -> Parse<Condition> {
        self.expect(Token::OpenParen)?;

        let left = self.expr().map_err(Failure::strict)?;
        let op = self.relop()?;
        let right = self.expr().map_err(Failure::strict)?;

        self.expect(Token::CloseParen)?;
        Ok(Condition { left, op, right })
    }

    fn expr(&mut self) -> Parse<Located<Expr>> {
        self.located(|s| match s.next()?.into_inner() {
            Token::Number(text) => Ok(Expr::Number(Literal::new(text))),
            Token::Id(id) => Ok(Expr::Read(id)),

            Token::OpenParen => {
                let left = s.expr().map_err(Failure::strict)?;
                let op = s.arith().map_err(Failure::strict)?;
                let right = s.expr().map_err(Failure::strict)?;
                s.expect(Token::CloseParen)?;

                Ok(Expr::Binary(Box::new(left), op, Box::new(right)))
            }

            _ => s.fail(ParserError::ExpectedExpr).map_err(Failure::weak),
        })
    }

    fn arith(&mut self) -> Parse<Located<BinOp>> {
        let (location, token) = self.next().map_err(Failure::weak)?.split();
        let op = match token {
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            Token::Times => BinOp::Mul,
            Token::Slash => BinOp::Div,
            Token::Keyword(Keyword::Mod) => BinOp::Mod,

            _ => return self.fail(ParserError::ExpectedOperator).map_err(Failure::weak),
        };

        Ok(Located::at(op, location))
    }

    fn relop(&mut self) -> Parse<Located<RelOp>> {
        let (location, token) = self.next()?.split();
        let op = match token {
            Token::Greater => RelOp::Greater,
            Token::Less => RelOp::Less,
            Token::GreaterOrEqual => RelOp::GreaterOrEqual,
            Token::LessOrEqual => RelOp::LessOrEqual,
            Token::Equal => RelOp::Equal,
            Token::NotEqual => RelOp::NotEqual,

            _ => return self.fail(ParserError::ExpectedRelOp),
        };

        Ok(Located::at(op, location))
    }

    fn typ(&mut self) -> Parse<Located<Type>> {
        let (location, token) = self.next()?.split();
        let typ = match token {
            Token::Keyword(Keyword::Inteiro) => Type::Integer,
            Token::Keyword(Keyword::Real) => Type::Real,
            Token::Keyword(Keyword::Caracter) => Type::Character,

            _ => return self.fail(ParserError::ExpectedType),
        };

        Ok(Located::at(typ, location))
    }

    /// Aplica una regla y le asocia el rango de tokens que consumió.
    fn located<T, F>(&mut self, rule: F) -> Parse<Located<T>>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let start = match self.tokens.peek() {
            Some(token) => token.location().clone(),
            None => self.last_known.clone(),
        };

        let value = rule(self)?;
        Ok(Located::at(value, Location::span(start, &self.last_known)))
    }

    fn optional<T, F>(&mut self, rule: F) -> Parse<Option<T>>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        match self.attempt(rule) {
            Err(Failure::Weak(_)) => Ok(None),
            result => Ok(Some(result?)),
        }
    }

    fn attempt<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let mut fork = self.clone();

        let result = rule(&mut fork);
        if result.is_ok() {
            *self = fork;
        }

        result
    }

    fn lookahead<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        rule(&mut self.clone())
    }

    fn comma_separated<T, F>(&mut self, mut rule: F) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        let mut items = vec![rule(self).map_err(Failure::strict)?];

        loop {
            match self.attempt(|s| s.expect(Token::Comma).map_err(Failure::weak)) {
                Err(Failure::Weak(_)) => break Ok(items),
                result => {
                    result?;
                    items.push(rule(self).map_err(Failure::strict)?);
                }
            }
        }
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            _ => self.fail(ParserError::ExpectedId),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.next().map(Located::into_inner) {
            Ok(found) if found == token => Ok(()),
            Ok(found) => self.fail(ParserError::UnexpectedToken(token, found)),
            Err(_) => self.fail(ParserError::MissingToken(token)),
        }
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.next() {
            Some(token) => {
                self.last_known = token.location().clone();
                Ok(token.clone())
            }

            None => self.fail(ParserError::UnexpectedEof),
        }
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Failure::Strict(Located::at(error, self.last_known.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, source};

    fn parse_str(text: &str) -> Result<Program, Located<ParserError>> {
        let (start, stream) = source::consume(text.as_bytes(), "test");
        let tokens = Lexer::new(start, stream).try_exhaustive().unwrap();

        parse(tokens.iter())
    }

    fn number(text: &str) -> Expr {
        Expr::Number(Literal::new(text))
    }

    fn read(name: &str) -> Expr {
        Expr::Read(Identifier::from(name))
    }

    #[test]
    fn declarations() {
        let program = parse_str("inteiro a, b;\nreal c;\ncaracter d;").unwrap();

        let declared: Vec<_> = program
            .declarations
            .iter()
            .map(|declaration| {
                let names: Vec<_> = declaration
                    .names
                    .iter()
                    .map(|name| name.val().to_string())
                    .collect();

                (*declaration.of.val(), names)
            })
            .collect();

        assert_eq!(
            declared,
            vec![
                (Type::Integer, vec!["a".to_string(), "b".to_string()]),
                (Type::Real, vec!["c".to_string()]),
                (Type::Character, vec!["d".to_string()]),
            ]
        );

        assert!(program.commands.is_empty());
        assert_eq!(program.declarations[0].names[1].location().column(), 12);
    }

    #[test]
    fn chained_operators_fold_left() {
        let program = parse_str("a = 1 + 2 * b;").unwrap();

        let Command::Assign { target, value } = program.commands[0].val() else {
            panic!("expected assignment");
        };

        assert_eq!(target.val().as_ref(), "a");

        let Expr::Binary(left, op, right) = value.val() else {
            panic!("expected binary expression");
        };

        assert_eq!(*op.val(), BinOp::Mul);
        assert_eq!(*right.val(), read("b"));

        let Expr::Binary(inner_left, inner_op, inner_right) = left.val() else {
            panic!("expected nested binary expression");
        };

        assert_eq!(*inner_left.val(), number("1"));
        assert_eq!(*inner_op.val(), BinOp::Add);
        assert_eq!(*inner_right.val(), number("2"));

        // El operador conserva su propia ubicación
        assert_eq!(op.location().column(), 11);
        assert_eq!(value.location().to_string(), "test:[1:5-1:13]");
    }

    #[test]
    fn parenthesized_expressions_and_mod() {
        let program = parse_str("a = (b RESTO (c / 2.5));").unwrap();

        let Command::Assign { value, .. } = program.commands[0].val() else {
            panic!("expected assignment");
        };

        let Expr::Binary(left, op, right) = value.val() else {
            panic!("expected binary expression");
        };

        assert_eq!(*left.val(), read("b"));
        assert_eq!(*op.val(), BinOp::Mod);
        assert!(matches!(right.val(), Expr::Binary(_, op, _) if *op.val() == BinOp::Div));
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        let program =
            parse_str("se (a > 1) entao se (b < 2) entao x = 1; senao x = 2;").unwrap();

        let Command::If {
            then, otherwise, ..
        } = program.commands[0].val()
        else {
            panic!("expected if");
        };

        assert!(otherwise.is_none());
        assert!(matches!(
            then.val(),
            Command::If {
                otherwise: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn while_with_condition() {
        let program = parse_str("enquanto (a >= 0) a = a - 1;").unwrap();

        let Command::While { condition, body } = program.commands[0].val() else {
            panic!("expected while");
        };

        assert_eq!(*condition.left.val(), read("a"));
        assert_eq!(*condition.op.val(), RelOp::GreaterOrEqual);
        assert_eq!(*condition.right.val(), number("0"));
        assert!(matches!(body.val(), Command::Assign { .. }));
        assert_eq!(program.commands[0].location().to_string(), "test:[1:1-1:28]");
    }

    #[test]
    fn missing_semicolon() {
        let error = parse_str("inteiro a;\na = 1\n").unwrap_err();

        assert!(matches!(
            error.val(),
            ParserError::MissingToken(Token::Semicolon)
        ));
        assert_eq!(error.val().code(), 100);
    }

    #[test]
    fn unexpected_token() {
        let error = parse_str("a = 1 + ;").unwrap_err();

        assert!(matches!(error.val(), ParserError::ExpectedExpr));
        assert_eq!(error.val().code(), 101);
        assert_eq!(error.location().column(), 9);
    }

    #[test]
    fn declarations_after_commands_are_rejected() {
        let error = parse_str("a = 1;\ninteiro b;").unwrap_err();

        assert!(matches!(error.val(), ParserError::ExpectedCommand));
        assert_eq!(error.location().line(), 2);
    }
}
