//! Ubicaciones en código fuente.
//!
//! Todo token, nodo del AST y diagnóstico lleva consigo el rango del
//! programa del cual proviene. El parser asigna estas ubicaciones al
//! construir cada nodo, de modo que ninguna fase posterior tiene que
//! buscar texto en el flujo de tokens para ubicar un error.

use std::{
    cell::RefCell,
    fmt::{self, Debug, Display, Formatter},
    io::{self, BufRead, Lines},
    ops::Range,
    rc::Rc,
    vec,
};

/// Un flujo de entrada, carácter por carácter.
pub trait InputStream: Iterator<Item = Result<(char, Location), io::Error>> {}

impl<I> InputStream for I where I: Iterator<Item = Result<(char, Location), io::Error>> {}

/// Un valor junto con la porción del programa que lo originó.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    pub fn at(value: T, location: Location) -> Self {
        Located { location, value }
    }

    pub fn val(&self) -> &T {
        &self.value
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación.
    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }
}

/// Rango semiabierto de posiciones dentro de un mismo origen.
///
/// `end` es la columna inmediatamente posterior al último carácter
/// cubierto, por lo cual un solo carácter en `1:1` va de `1:1` a `1:2`.
#[derive(Clone)]
pub struct Location {
    origin: Rc<Origin>,
    range: Range<Position>,
}

impl Location {
    /// Rango desde el inicio de `from` hasta el final de `to`.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            origin: from.origin,
            range: from.range.start..to.range.end,
        }
    }

    pub fn start(&self) -> Position {
        self.range.start
    }

    pub fn end(&self) -> Position {
        self.range.end
    }

    /// Línea de inicio, base 1.
    pub fn line(&self) -> u32 {
        self.range.start.line
    }

    /// Columna de inicio, base 1.
    pub fn column(&self) -> u32 {
        self.range.start.column
    }

    /// Invoca `callback` con el texto de una línea del origen, si ya fue leída.
    pub fn with_line<F, R>(&self, line: u32, callback: F) -> Option<R>
    where
        F: FnOnce(&str) -> R,
    {
        let index = usize::try_from(line).ok()?.checked_sub(1)?;
        let lines = self.origin.lines.borrow();

        lines.get(index).map(|text| callback(text))
    }

    fn single(origin: Rc<Origin>, at: Position) -> Self {
        Location {
            origin,
            range: at..at.advance(),
        }
    }
}

impl Default for Location {
    /// `1:1` en un origen anónimo y vacío.
    fn default() -> Self {
        Location::single(Rc::new(Origin::new("<unknown>")), Position::default())
    }
}

impl PartialEq for Location {
    // Solo se comparan rangos
    fn eq(&self, other: &Self) -> bool {
        self.range == other.range
    }
}

impl Display for Location {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let Range { start, end } = self.range;

        if end == start.advance() {
            write!(fmt, "{}:{}", self.origin.name, start)
        } else {
            write!(fmt, "{}:[{}-{}]", self.origin.name, start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, fmt)
    }
}

/// Línea y columna, ambas con base 1.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn advance(self) -> Position {
        Position {
            column: self.column + 1,
            ..self
        }
    }

    pub fn back(self) -> Position {
        Position {
            column: self.column.saturating_sub(1).max(1),
            ..self
        }
    }

    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}:{}", self.line, self.column)
    }
}

/// Lee un programa carácter por carácter, asociando a cada uno su ubicación.
///
/// Cada línea leída termina en un `'\n'` emitido, aun si el archivo no
/// termina en salto de línea. Las líneas se conservan en el origen para
/// poder citarlas en diagnósticos. La ubicación retornada es el inicio
/// del programa.
pub fn consume<R, S>(reader: R, name: S) -> (Location, impl InputStream)
where
    R: BufRead,
    S: Into<String>,
{
    let origin = Rc::new(Origin::new(name));
    let start = Location::single(Rc::clone(&origin), Position::default());

    let chars = Chars {
        lines: reader.lines(),
        origin,
        current: Vec::new().into_iter(),
        here: Position::default(),
        failed: false,
    };

    (start, chars)
}

/// Nombre de un programa y las líneas leídas hasta el momento.
struct Origin {
    name: String,
    lines: RefCell<Vec<String>>,
}

impl Origin {
    fn new<S: Into<String>>(name: S) -> Self {
        Origin {
            name: name.into(),
            lines: RefCell::default(),
        }
    }
}

/// Ver [`consume()`].
struct Chars<R> {
    lines: Lines<R>,
    origin: Rc<Origin>,
    current: vec::IntoIter<char>,
    here: Position,
    failed: bool,
}

impl<R: BufRead> Iterator for Chars<R> {
    type Item = Result<(char, Location), io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let c = loop {
            if let Some(c) = self.current.next() {
                break c;
            }

            // Un error de E/S termina el flujo
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            };

            let mut chars: Vec<_> = line.chars().collect();
            chars.push('\n');

            self.origin.lines.borrow_mut().push(line);
            self.current = chars.into_iter();
        };

        let location = Location::single(Rc::clone(&self.origin), self.here);
        // Un tabulador ocupa una sola columna, como cualquier otro carácter
        self.here = match c {
            '\n' => self.here.newline(),
            _ => self.here.advance(),
        };

        Some(Ok((c, location)))
    }
}
