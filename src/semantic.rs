//! Análisis semántico.
//!
//! Recorre el AST una sola vez, llenando la tabla de símbolos y
//! acumulando diagnósticos. El análisis nunca aborta: un error a lo
//! sumo detiene las verificaciones de la asignación donde ocurre
//! (variable destino no declarada) o el descenso por una rama
//! demasiado profunda. La generación de código solo procede si este
//! análisis no reportó nada.

use thiserror::Error;
use tracing::{debug, trace};

use std::fmt::{self, Display};

use crate::{
    ast::{BinOp, Command, Condition, Declaration, Expr, Literal, Program, Type},
    error::{sealed, Diagnostics, Phase, Report},
    lex::Identifier,
    source::{Located, Location},
    symbols::SymbolTable,
};

/// Longitud máxima de un identificador, en caracteres.
pub const MAX_IDENTIFIER_LENGTH: usize = 10;

/// Profundidad máxima de anidamiento de comandos.
pub const MAX_COMMAND_DEPTH: u32 = 10;

/// Un tipo inferido, desconocido si su expresión ya tenía errores.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Inferred(pub Option<Type>);

impl Display for Inferred {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(typ) => typ.fmt(fmt),
            None => fmt.write_str("desconhecido"),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("uso de variável '{0}' sem declaração")]
    Undeclared(Identifier),

    #[error("atribuição incompatível: {0} <- {1}")]
    IncompatibleAssignment(Type, Inferred),

    #[error("comparação inválida: {0} vs {1}")]
    IncompatibleComparison(Inferred, Inferred),

    #[error("operação '{0}' inválida para tipos: {1} e {2}")]
    IncompatibleOperands(BinOp, Inferred, Inferred),

    #[error("identificador '{0}' tem {1} caracteres")]
    IdentifierTooLong(Identifier, usize),

    #[error("profundidade de comandos excede 10 (={0})")]
    TooDeep(u32),

    #[error("variável '{0}' redeclarada")]
    Redeclared(Identifier),

    #[error("divisão por zero")]
    DivisionByZero,

    #[error("literal '{0}' fora do intervalo permitido")]
    LiteralOverflow(Literal),

    #[error("expressão constante fora do intervalo de {0}")]
    ConstantOverflow(Type),

    #[error("variável '{0}' lida antes de receber valor")]
    Uninitialized(Identifier),

    #[error("variável '{0}' nunca é utilizada")]
    Unused(Identifier),

    #[error("variável '{0}' atribuída a si mesma")]
    SelfAssignment(Identifier),
}

impl sealed::Sealed for SemanticError {}

impl Report for SemanticError {
    const PHASE: Phase = Phase::Semantic;

    fn code(&self) -> u16 {
        use SemanticError::*;

        match self {
            Undeclared(_) => 200,
            IncompatibleAssignment(..) | IncompatibleComparison(..) | IncompatibleOperands(..) => 201,
            IdentifierTooLong(..) => 202,
            TooDeep(_) => 203,
            Redeclared(_) => 204,
            DivisionByZero => 205,
            LiteralOverflow(_) | ConstantOverflow(_) => 206,
            Uninitialized(_) => 207,
            Unused(_) => 208,
            SelfAssignment(_) => 209,
        }
    }

    fn summary(&self) -> &'static str {
        use SemanticError::*;

        match self {
            Undeclared(_) => "variável não declarada",
            IncompatibleAssignment(..) | IncompatibleComparison(..) | IncompatibleOperands(..) => {
                "atribuição ou operação com tipos incompatíveis"
            }
            IdentifierTooLong(..) => "identificador excede 10 caracteres",
            TooDeep(_) => "profundidade de comandos excede 10",
            Redeclared(_) => "variável redeclarada",
            DivisionByZero => "divisão por zero",
            LiteralOverflow(_) | ConstantOverflow(_) => "overflow numérico",
            Uninitialized(_) => "uso de variável não inicializada",
            Unused(_) => "variável declarada mas não utilizada",
            SelfAssignment(_) => "auto-atribuição desnecessária",
        }
    }

    fn offending(&self) -> String {
        use SemanticError::*;

        match self {
            Undeclared(name)
            | IdentifierTooLong(name, _)
            | Redeclared(name)
            | Uninitialized(name)
            | Unused(name)
            | SelfAssignment(name) => name.to_string(),

            LiteralOverflow(literal) => literal.to_string(),
            _ => String::new(),
        }
    }
}

impl Program {
    /// Analiza el programa, reportando en `diagnostics`.
    ///
    /// Cada invocación parte de una tabla de símbolos nueva, por lo
    /// cual analizar dos veces el mismo AST produce los mismos
    /// diagnósticos y la misma tabla.
    pub fn analyze(&self, diagnostics: &mut Diagnostics) -> SymbolTable {
        let mut analyzer = Analyzer {
            symbols: SymbolTable::default(),
            diagnostics,
        };

        for declaration in &self.declarations {
            analyzer.declaration(declaration);
        }

        for command in &self.commands {
            analyzer.command(command, 1);
        }

        analyzer.unused();

        debug!(
            symbols = analyzer.symbols.len(),
            diagnostics = analyzer.diagnostics.len(),
            "semantic analysis finished"
        );

        analyzer.symbols
    }
}

struct Analyzer<'d> {
    symbols: SymbolTable,
    diagnostics: &'d mut Diagnostics,
}

impl Analyzer<'_> {
    fn declaration(&mut self, declaration: &Declaration) {
        let typ = *declaration.of.val();

        for name in &declaration.names {
            self.check_length(name.val(), name.location());

            if self
                .symbols
                .declare(name.val().clone(), typ, name.location().clone())
            {
                debug!(name = %name.val(), %typ, "declared");
            } else {
                self.report(SemanticError::Redeclared(name.val().clone()), name.location());
            }
        }
    }

    fn command(&mut self, command: &Located<Command>, depth: u32) {
        if depth > MAX_COMMAND_DEPTH {
            self.report(SemanticError::TooDeep(depth), command.location());
            return;
        }

        match command.val() {
            Command::Assign { target, value } => self.assignment(target, value),

            Command::If {
                condition,
                then,
                otherwise,
            } => {
                self.condition(condition);
                self.command(then, depth + 1);

                if let Some(otherwise) = otherwise {
                    self.command(otherwise, depth + 1);
                }
            }

            Command::While { condition, body } => {
                self.condition(condition);
                self.command(body, depth + 1);
            }
        }
    }

    fn assignment(&mut self, target: &Located<Identifier>, value: &Located<Expr>) {
        let name = target.val();
        let declared = match self.symbols.lookup(name.as_ref()) {
            Some(entry) => entry.typ(),
            None => {
                // Sin declaración no tiene sentido verificar lo demás
                self.report(SemanticError::Undeclared(name.clone()), target.location());
                return;
            }
        };

        self.check_length(name, target.location());

        if let Expr::Read(source) = value.val() {
            if source == name {
                self.report(SemanticError::SelfAssignment(name.clone()), value.location());
            }
        }

        let assigned = self.eval(value);
        if !assignable(declared, assigned) {
            self.report(
                SemanticError::IncompatibleAssignment(declared, Inferred(assigned)),
                target.location(),
            );
        }

        self.symbols.mark_assigned(name.as_ref());
    }

    fn condition(&mut self, condition: &Condition) {
        let left = self.eval(&condition.left);
        let right = self.eval(&condition.right);

        let comparable = match (left, right) {
            (Some(left), Some(right)) => {
                (left.is_numeric() && right.is_numeric())
                    || (left == Type::Character && right == Type::Character)
            }

            _ => false,
        };

        if !comparable {
            self.report(
                SemanticError::IncompatibleComparison(Inferred(left), Inferred(right)),
                condition.left.location(),
            );
        }
    }

    fn eval(&mut self, expr: &Located<Expr>) -> Option<Type> {
        match expr.val() {
            Expr::Number(literal) => {
                if !Constant::parse(literal).map_or(false, Constant::in_range) {
                    self.report(SemanticError::LiteralOverflow(literal.clone()), expr.location());
                }

                Some(literal.typ())
            }

            Expr::Read(name) => self.read(name, expr.location()),
            Expr::Binary(left, op, right) => self.binary(expr, left, op, right),
        }
    }

    fn read(&mut self, name: &Identifier, location: &Location) -> Option<Type> {
        let (typ, initialized) = match self.symbols.lookup(name.as_ref()) {
            Some(entry) => (entry.typ(), entry.is_initialized()),
            None => {
                self.report(SemanticError::Undeclared(name.clone()), location);
                return None;
            }
        };

        self.check_length(name, location);

        if !initialized {
            self.report(SemanticError::Uninitialized(name.clone()), location);
        }

        self.symbols.mark_used(name.as_ref());
        Some(typ)
    }

    fn binary(
        &mut self,
        expr: &Located<Expr>,
        left: &Located<Expr>,
        op: &Located<BinOp>,
        right: &Located<Expr>,
    ) -> Option<Type> {
        let left_type = self.eval(left);
        let right_type = self.eval(right);

        let typ = match (left_type, right_type) {
            (Some(l), Some(r)) if l.is_numeric() && r.is_numeric() => {
                if l == Type::Real || r == Type::Real {
                    Type::Real
                } else {
                    Type::Integer
                }
            }

            _ => {
                self.report(
                    SemanticError::IncompatibleOperands(
                        *op.val(),
                        Inferred(left_type),
                        Inferred(right_type),
                    ),
                    left.location(),
                );

                return None;
            }
        };

        let divides = matches!(op.val(), BinOp::Div | BinOp::Mod);
        if divides && fold(right.val()).map_or(false, Constant::is_zero) {
            self.report(SemanticError::DivisionByZero, op.location());
        }

        if let Some(value) = fold(expr.val()) {
            if !value.in_range() {
                self.report(SemanticError::ConstantOverflow(typ), expr.location());
            }
        }

        Some(typ)
    }

    fn check_length(&mut self, name: &Identifier, location: &Location) {
        let length = name.len();
        if length > MAX_IDENTIFIER_LENGTH {
            self.report(SemanticError::IdentifierTooLong(name.clone(), length), location);
        }
    }

    /// Se ejecuta al final del recorrido, nunca durante.
    fn unused(&mut self) {
        let unused: Vec<_> = self
            .symbols
            .iter()
            .filter(|entry| !entry.is_used())
            .map(|entry| (entry.name().clone(), entry.location().clone()))
            .collect();

        for (name, location) in unused {
            self.report(SemanticError::Unused(name), &location);
        }
    }

    fn report(&mut self, error: SemanticError, location: &Location) {
        trace!(code = error.code(), %location, %error, "semantic diagnostic");
        self.diagnostics.report(Located::at(error, location.clone()));
    }
}

/// Reglas de asignabilidad: tipos iguales o ensanchamiento de entero a real.
fn assignable(target: Type, value: Option<Type>) -> bool {
    match value {
        Some(value) if value == target => true,
        Some(Type::Integer) => target == Type::Real,
        _ => false,
    }
}

/// Valor de una expresión compuesta únicamente por constantes.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Constant {
    Integer(i64),
    Real(f64),
}

impl Constant {
    /// Un literal entero que no cabe en 64 bits no tiene valor conocido.
    fn parse(literal: &Literal) -> Option<Self> {
        match literal.typ() {
            Type::Real => literal.as_str().parse().ok().map(Constant::Real),
            _ => literal.as_str().parse().ok().map(Constant::Integer),
        }
    }

    /// Enteros de 32 bits con signo, reales finitos de 64 bits.
    fn in_range(self) -> bool {
        match self {
            Constant::Integer(value) => i32::try_from(value).is_ok(),
            Constant::Real(value) => value.is_finite(),
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Constant::Integer(value) => value == 0,
            Constant::Real(value) => value == 0.0,
        }
    }

    fn real(self) -> f64 {
        match self {
            Constant::Integer(value) => value as f64,
            Constant::Real(value) => value,
        }
    }

    /// Aritmética entera truncada y saturada; un divisor nulo no tiene valor.
    fn apply(self, op: BinOp, rhs: Constant) -> Option<Constant> {
        if matches!(op, BinOp::Div | BinOp::Mod) && rhs.is_zero() {
            return None;
        }

        let folded = match (self, rhs) {
            (Constant::Integer(a), Constant::Integer(b)) => Constant::Integer(match op {
                BinOp::Add => a.saturating_add(b),
                BinOp::Sub => a.saturating_sub(b),
                BinOp::Mul => a.saturating_mul(b),
                BinOp::Div => a.saturating_div(b),
                BinOp::Mod => a.checked_rem(b).unwrap_or(0),
            }),

            (a, b) => {
                let (a, b) = (a.real(), b.real());
                Constant::Real(match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Mod => a % b,
                })
            }
        };

        Some(folded)
    }
}

/// Pliega una expresión constante. Cualquier lectura de variable la vuelve no constante.
fn fold(expr: &Expr) -> Option<Constant> {
    match expr {
        Expr::Number(literal) => Constant::parse(literal),
        Expr::Read(_) => None,
        Expr::Binary(left, op, right) => fold(left.val())?.apply(*op.val(), fold(right.val())?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, parse, source};

    fn program(text: &str) -> Program {
        let (start, stream) = source::consume(text.as_bytes(), "test");
        let tokens = Lexer::new(start, stream).try_exhaustive().unwrap();

        parse::parse(tokens.iter()).unwrap()
    }

    fn analyze(text: &str) -> (SymbolTable, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let symbols = program(text).analyze(&mut diagnostics);

        (symbols, diagnostics)
    }

    fn positions(diagnostics: &Diagnostics) -> Vec<(u16, u32, u32)> {
        diagnostics
            .iter()
            .map(|diagnostic| (diagnostic.code(), diagnostic.line(), diagnostic.column()))
            .collect()
    }

    #[test]
    fn accepted_program() {
        let (symbols, diagnostics) = analyze("inteiro x;\nx = 5;\nse (x > 3) entao x = x + 1;");

        assert!(diagnostics.is_empty(), "{}", diagnostics);

        let x = symbols.lookup("x").unwrap();
        assert_eq!(x.typ(), Type::Integer);
        assert!(x.is_initialized());
        assert!(x.is_used());
    }

    #[test]
    fn redeclaration_keeps_the_first_entry() {
        let (symbols, diagnostics) = analyze("inteiro a;\nreal a;\na = 1;");

        assert_eq!(positions(&diagnostics), vec![(204, 2, 6)]);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols.lookup("a").unwrap().typ(), Type::Integer);
        assert_eq!(symbols.lookup("a").unwrap().line(), 1);
    }

    #[test]
    fn undeclared_target_aborts_the_assignment() {
        let (_, diagnostics) = analyze("inteiro z;\ny = z;");

        // `z` nunca se evalúa, por lo cual además queda sin usar
        assert_eq!(positions(&diagnostics), vec![(200, 2, 1), (208, 1, 9)]);
    }

    #[test]
    fn undeclared_read_poisons_the_expression() {
        let (_, diagnostics) = analyze("inteiro x;\nx = y + 1;");

        assert_eq!(diagnostics.codes(), vec![200, 201, 201]);
        assert_eq!(positions(&diagnostics)[0], (200, 2, 5));
    }

    #[test]
    fn long_identifiers() {
        let (_, diagnostics) = analyze("inteiro contador_longo;\ncontador_longo = 1;");

        assert_eq!(positions(&diagnostics), vec![(202, 1, 9), (202, 2, 1)]);
        assert_eq!(
            diagnostics.iter().next().unwrap().message(),
            "identificador 'contador_longo' tem 14 caracteres"
        );
    }

    #[test]
    fn widening_but_no_narrowing() {
        let (_, diagnostics) = analyze("inteiro i;\nreal r;\nr = 1;\ni = r;");

        assert_eq!(positions(&diagnostics), vec![(201, 4, 1)]);
        assert_eq!(
            diagnostics.iter().next().unwrap().message(),
            "atribuição incompatível: inteiro <- real"
        );
    }

    #[test]
    fn comparisons_need_compatible_operands() {
        let (_, diagnostics) = analyze(
            "caracter c, d;\ninteiro n;\nc = d;\nn = 1;\nse (c == n) entao n = 2;\nse (c != c) entao n = 3;",
        );

        assert_eq!(positions(&diagnostics), vec![(207, 3, 5), (201, 5, 5)]);
    }

    #[test]
    fn arithmetic_on_characters() {
        let (_, diagnostics) = analyze("caracter c;\ninteiro n;\nc = c;\nn = c + 1;");

        assert_eq!(diagnostics.codes(), vec![209, 207, 201, 201]);
    }

    #[test]
    fn every_read_before_assignment_is_reported() {
        let (_, diagnostics) = analyze("inteiro a, b;\nb = a + a;\na = 1;\nb = a;");

        assert_eq!(positions(&diagnostics), vec![(207, 2, 5), (207, 2, 9)]);
    }

    #[test]
    fn unused_variables_are_reported_last() {
        let (_, diagnostics) = analyze("inteiro a, b, c;\nx = 1;\na = 1;");

        assert_eq!(
            positions(&diagnostics),
            vec![(200, 2, 1), (208, 1, 12), (208, 1, 15)]
        );
    }

    #[test]
    fn division_by_constant_zero() {
        let (_, diagnostics) = analyze("inteiro a, b;\nb = 2;\na = b RESTO 0;\na = b / (2 - 2);");

        assert_eq!(positions(&diagnostics), vec![(205, 3, 7), (205, 4, 7)]);
    }

    #[test]
    fn division_by_variable_is_not_checked() {
        let (_, diagnostics) = analyze("inteiro a, b;\nb = 0;\na = 1 / b;");
        assert!(diagnostics.is_empty(), "{}", diagnostics);
    }

    #[test]
    fn literal_overflow() {
        let (_, diagnostics) =
            analyze("inteiro a, b;\na = 2147483647;\nb = 2147483648;\nb = 99999999999999999999;");

        assert_eq!(positions(&diagnostics), vec![(206, 3, 5), (206, 4, 5)]);
    }

    #[test]
    fn real_literal_overflow() {
        let huge = format!("{}.0", "9".repeat(400));
        let (_, diagnostics) = analyze(&format!("real r;\nr = 1.5;\nr = {};", huge));

        assert_eq!(positions(&diagnostics), vec![(206, 3, 5)]);
    }

    #[test]
    fn constant_expression_overflow() {
        let (_, diagnostics) =
            analyze("inteiro a;\nreal r;\na = 2147483647 + 1;\na = 65536 * 65536;\nr = 2147483647 + 1.0;");

        assert_eq!(positions(&diagnostics), vec![(206, 3, 5), (206, 4, 5)]);
    }

    #[test]
    fn self_assignment() {
        let (_, diagnostics) = analyze("inteiro a;\na = 1;\na = a;");
        assert_eq!(positions(&diagnostics), vec![(209, 3, 5)]);
    }

    #[test]
    fn depth_limit() {
        let chain = |levels: usize| {
            format!(
                "inteiro x, w;\nx = 0;\n{}x = 1;\nw = 1;\nz = 1;",
                "se (x > 0) entao ".repeat(levels)
            )
        };

        let (_, diagnostics) = analyze(&chain(9));
        assert_eq!(diagnostics.codes(), vec![200]);

        // Diez `se` anidados ponen a la asignación en profundidad 11
        let (_, diagnostics) = analyze(&chain(10));
        assert_eq!(positions(&diagnostics), vec![(203, 3, 171), (200, 5, 1)]);

        let (_, diagnostics) = analyze(&chain(14));
        assert_eq!(positions(&diagnostics), vec![(203, 3, 171), (200, 5, 1)]);
    }

    #[test]
    fn both_branches_past_the_limit_are_reported() {
        let source = format!(
            "inteiro x;\nx = 0;\n{}x = 1; senao x = 2;",
            "se (x > 0) entao ".repeat(10)
        );

        let (_, diagnostics) = analyze(&source);
        assert_eq!(positions(&diagnostics), vec![(203, 3, 171), (203, 3, 184)]);
    }

    #[test]
    fn depth_counts_each_branch() {
        let (_, diagnostics) = analyze(
            "inteiro x;\nx = 0;\nenquanto (x < 9) se (x > 0) entao x = 1; senao y = 2;",
        );

        assert_eq!(positions(&diagnostics), vec![(200, 3, 48)]);
    }

    #[test]
    fn analysis_is_idempotent() {
        let program = program("inteiro a, b;\nb = a RESTO 0;\nc = 1;");

        let mut first = Diagnostics::default();
        let mut second = Diagnostics::default();

        let first_symbols = program.analyze(&mut first);
        let second_symbols = program.analyze(&mut second);

        assert_eq!(first_symbols, second_symbols);
        assert_eq!(first.iter().collect::<Vec<_>>(), second.iter().collect::<Vec<_>>());
        assert_eq!(first.codes(), vec![207, 205, 200]);
    }

    #[test]
    fn folding() {
        use BinOp::*;
        use Constant::*;

        assert_eq!(Integer(7).apply(Div, Integer(2)), Some(Integer(3)));
        assert_eq!(Integer(-7).apply(Mod, Integer(2)), Some(Integer(-1)));
        assert_eq!(Integer(1).apply(Div, Integer(0)), None);
        assert_eq!(Real(1.0).apply(Mod, Integer(0)), None);
        assert_eq!(Integer(1).apply(Add, Real(0.5)), Some(Real(1.5)));
        assert_eq!(Integer(i64::MAX).apply(Add, Integer(1)), Some(Integer(i64::MAX)));
        assert!(!Integer(i64::MAX).in_range());
    }

    #[test]
    fn summaries_follow_codes() {
        let x = || Identifier::from("x");
        let cases = [
            (SemanticError::Undeclared(x()), 200, "variável não declarada"),
            (
                SemanticError::IncompatibleComparison(Inferred(None), Inferred(Some(Type::Real))),
                201,
                "atribuição ou operação com tipos incompatíveis",
            ),
            (SemanticError::IdentifierTooLong(x(), 11), 202, "identificador excede 10 caracteres"),
            (SemanticError::TooDeep(11), 203, "profundidade de comandos excede 10"),
            (SemanticError::Redeclared(x()), 204, "variável redeclarada"),
            (SemanticError::DivisionByZero, 205, "divisão por zero"),
            (SemanticError::ConstantOverflow(Type::Integer), 206, "overflow numérico"),
            (SemanticError::Uninitialized(x()), 207, "uso de variável não inicializada"),
            (SemanticError::Unused(x()), 208, "variável declarada mas não utilizada"),
            (SemanticError::SelfAssignment(x()), 209, "auto-atribuição desnecessária"),
        ];

        for (error, code, summary) in cases {
            assert_eq!((error.code(), error.summary()), (code, summary), "{}", error);
        }
    }

    #[test]
    fn assignability() {
        assert!(assignable(Type::Real, Some(Type::Integer)));
        assert!(assignable(Type::Character, Some(Type::Character)));
        assert!(!assignable(Type::Integer, Some(Type::Real)));
        assert!(!assignable(Type::Character, Some(Type::Integer)));
        assert!(!assignable(Type::Integer, None));
    }
}
