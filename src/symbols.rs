//! Tabla de símbolos.
//!
//! El lenguaje no tiene ámbitos anidados: existe una única tabla por
//! programa. Las entradas se crean al declarar y nunca se eliminan; el
//! orden de inserción se preserva para reportes y listados.

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

use crate::{ast::Type, lex::Identifier, source::Location};

/// Metadatos de una variable declarada.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    name: Identifier,
    typ: Type,
    location: Location,
    initialized: bool,
    used: bool,
}

impl Entry {
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn typ(&self) -> Type {
        self.typ
    }

    /// Ubicación de la declaración.
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn line(&self) -> u32 {
        self.location.line()
    }

    pub fn column(&self) -> u32 {
        self.location.column()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_used(&self) -> bool {
        self.used
    }
}

impl Display for Entry {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "{} : {} (linha {}, col {})",
            self.name,
            self.typ,
            self.line(),
            self.column()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    entries: Vec<Entry>,
    index: HashMap<Identifier, usize>,
}

impl SymbolTable {
    /// Declara una variable.
    ///
    /// Retorna `false` sin modificar la tabla si el nombre ya existía.
    pub fn declare(&mut self, name: Identifier, typ: Type, location: Location) -> bool {
        if self.index.contains_key(&name) {
            return false;
        }

        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Entry {
            name,
            typ,
            location,
            initialized: false,
            used: false,
        });

        true
    }

    pub fn lookup(&self, name: &str) -> Option<&Entry> {
        self.index
            .get(name)
            .and_then(|&index| self.entries.get(index))
    }

    /// Marca una variable como leída.
    pub fn mark_used(&mut self, name: &str) {
        if let Some(entry) = self.lookup_mut(name) {
            entry.used = true;
        }
    }

    /// Marca una variable como destino de una asignación.
    pub fn mark_assigned(&mut self, name: &str) {
        if let Some(entry) = self.lookup_mut(name) {
            entry.initialized = true;
            entry.used = true;
        }
    }

    /// Entradas en orden de declaración.
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Entry> {
        let index = *self.index.get(name)?;
        self.entries.get_mut(index)
    }
}

impl<'a> IntoIterator for &'a SymbolTable {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Display for SymbolTable {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(fmt, "{}", entry)?;
        }

        Ok(())
    }
}
