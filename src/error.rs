//! Diagnósticos.
//!
//! Todas las fases reportan sus errores como valores [`Located`] de un
//! tipo de error propio. Estos se acumulan en un [`Diagnostics`], el cual
//! pertenece a quien orquesta la compilación y se presta a cada fase.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
    iter,
};

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Fase del compilador en la que se originó un diagnóstico.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Lexical,
    Syntactic,
    Semantic,
}

impl Display for Phase {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lexical => fmt.write_str("lexico"),
            Phase::Syntactic => fmt.write_str("sintatico"),
            Phase::Semantic => fmt.write_str("semantico"),
        }
    }
}

/// Un error reportable como diagnóstico.
///
/// Lo implementan únicamente los tipos de error de cada fase.
pub trait Report: Error + sealed::Sealed {
    /// Fase a la que pertenece.
    const PHASE: Phase;

    /// Código numérico, como en `COD.200`.
    fn code(&self) -> u16;

    /// Descripción fija asociada al código.
    fn summary(&self) -> &'static str;

    /// Texto del programa fuente que provocó el error.
    fn offending(&self) -> String {
        String::new()
    }
}

/// Un diagnóstico individual.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    phase: Phase,
    code: u16,
    line: u32,
    column: u32,
    description: &'static str,
    message: String,
    offending: String,
    location: Location,
}

impl Diagnostic {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Línea, base 1.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Columna, base 1.
    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn offending(&self) -> &str {
        &self.offending
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl<E: Report> From<Located<E>> for Diagnostic {
    fn from(error: Located<E>) -> Self {
        let (location, error) = error.split();

        Diagnostic {
            phase: E::PHASE,
            code: error.code(),
            line: location.line().max(1),
            column: location.column().max(1),
            description: error.summary(),
            message: error.to_string(),
            offending: error.offending(),
            location,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "COD.{:03}: erro {} (linha {}, coluna {}): {} [{}]",
            self.code, self.phase, self.line, self.column, self.description, self.message
        )
    }
}

/// Acumulador de diagnósticos, en orden de reporte.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Agrega un diagnóstico ya construido.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Agrega un error de cualquier fase.
    pub fn report<E: Report>(&mut self, error: Located<E>) {
        self.add(Diagnostic::from(error));
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Determina si existe al menos un diagnóstico de la fase indicada.
    pub fn has_phase(&self, phase: Phase) -> bool {
        self.entries.iter().any(|diagnostic| diagnostic.phase == phase)
    }

    /// Códigos de todos los diagnósticos, en orden.
    pub fn codes(&self) -> Vec<u16> {
        self.entries.iter().map(Diagnostic::code).collect()
    }
}

impl<E: Report> Extend<Located<E>> for Diagnostics {
    fn extend<I: IntoIterator<Item = Located<E>>>(&mut self, errors: I) {
        self.entries.extend(errors.into_iter().map(Diagnostic::from));
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { entries } = self;

        if entries.is_empty() {
            return writeln!(fmt, "Nenhum erro encontrado");
        }

        for diagnostic in entries {
            writeln!(fmt, "{}", diagnostic)?;

            let location = diagnostic.location();
            writeln!(fmt, " --> {}", location)?;

            let digits = location.end().line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            let mut quoted = false;
            for line_number in location.start().line()..=location.end().line() {
                let line = location.with_line(line_number, |line| {
                    writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
                });

                if let Some(result) = line {
                    result?;
                    quoted = true;
                }
            }

            // Sin texto original no hay nada que subrayar
            if quoted {
                let (from, to) = (location.start().column(), location.end().column().max(2) - 1);
                let min = from.min(to).max(1);
                let max = from.max(to);

                let skip = (min - 1) as usize;
                let highlight = (max - min + 1) as usize;

                // Los tabuladores se repiten para que el subrayado quede alineado
                let indent: String = location
                    .with_line(location.start().line(), |line| {
                        line.chars()
                            .chain(iter::repeat(' '))
                            .take(skip)
                            .map(|c| if c == '\t' { '\t' } else { ' ' })
                            .collect()
                    })
                    .unwrap_or_default();

                writeln!(
                    fmt,
                    "{:digits$} | {}{:^<highlight$}",
                    "",
                    indent,
                    "",
                    digits = digits,
                    highlight = highlight
                )?;
            }

            writeln!(fmt)?;
        }

        let error_or_errors = if entries.len() == 1 { "erro" } else { "erros" };
        writeln!(
            fmt,
            "Compilação falhou com {} {}",
            entries.len(),
            error_or_errors
        )
    }
}
