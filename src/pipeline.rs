//! Orquestación de las fases.
//!
//! Cada compilación es independiente: posee sus propios tokens, tabla
//! de símbolos, contadores y diagnósticos. Un error léxico o sintáctico
//! detiene la compilación en esa fase; los errores semánticos se
//! acumulan todos, pero impiden la generación de código.

use tracing::{debug, info};

use std::{fs, io, path::Path};

use crate::{
    ast::Program,
    error::Diagnostics,
    ir,
    lex::{Lexer, Token},
    parse,
    source::{self, Located},
    symbols::SymbolTable,
};

/// Resultados, posiblemente parciales, de una compilación.
#[derive(Debug, Default)]
pub struct Compilation {
    pub tokens: Vec<Located<Token>>,
    pub program: Option<Program>,
    pub symbols: Option<SymbolTable>,
    pub tac: Option<ir::Program>,
    pub diagnostics: Diagnostics,
}

impl Compilation {
    /// Una compilación es exitosa si no produjo ningún diagnóstico.
    pub fn succeeded(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Compila un programa en memoria. `name` solo se usa en diagnósticos.
pub fn compile(text: &str, name: &str) -> Compilation {
    let mut compilation = Compilation::default();

    let (start, stream) = source::consume(text.as_bytes(), name);
    match Lexer::new(start, stream).try_exhaustive() {
        Ok(tokens) => compilation.tokens = tokens,
        Err(errors) => {
            info!(name, errors = errors.len(), "lexical analysis failed");
            compilation.diagnostics.extend(errors);
            return compilation;
        }
    }

    debug!(name, tokens = compilation.tokens.len(), "lexed");

    let program = match parse::parse(compilation.tokens.iter()) {
        Ok(program) => program,
        Err(error) => {
            info!(name, error = %error.val(), "syntax analysis failed");
            compilation.diagnostics.report(error);
            return compilation;
        }
    };

    debug!(
        name,
        declarations = program.declarations.len(),
        commands = program.commands.len(),
        "parsed"
    );

    let symbols = program.analyze(&mut compilation.diagnostics);
    if compilation.succeeded() {
        compilation.tac = Some(program.lower());
    } else {
        info!(
            name,
            errors = compilation.diagnostics.len(),
            "semantic analysis failed"
        );
    }

    compilation.symbols = Some(symbols);
    compilation.program = Some(program);
    compilation
}

/// Lee y compila un archivo.
pub fn compile_file<P: AsRef<Path>>(path: P) -> io::Result<Compilation> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;

    Ok(compile(&text, &path.display().to_string()))
}
