//! Compilador para MLP.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente.
//! Este archivo se somete primero a análisis léxico en [`lex`], de
//! lo cual se obtiene un flujo de tokens. El flujo de tokens se
//! dispone en un AST ([`ast`]) por medio de análisis sintáctico en
//! [`parse`]. El árbol sintáctico es procesado por análisis semántico
//! en [`semantic`], el cual construye la tabla de símbolos descrita en
//! [`symbols`] y reporta diagnósticos ([`error`]).
//!
//! # Generación de código
//! Solamente un programa sin diagnósticos se traduce a código de tres
//! direcciones ([`ir`]) en `codegen`. El módulo [`pipeline`] encadena
//! todas las fases y conserva sus resultados parciales.

pub mod ast;
pub mod error;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod pipeline;
pub mod semantic;
pub mod source;
pub mod symbols;

mod codegen;

pub use pipeline::{compile, compile_file, Compilation};
