//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`InputStream`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! en blanco y los comentarios se descartan durante esta operación. Cada
//! token emitido esta asociado a una ubicación en el código fuente original,
//! lo cual permite rastrear errores en tanto los mismos como constructos
//! más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho de lo
//! que son y no incluyen lexemas. Los identificadores sí incluyen su lexema
//! original. A diferencia de los identificadores, las constantes numéricas
//! preservan su texto tal cual: el tipo de una constante depende de la
//! presencia de un punto decimal y su rango se valida hasta el análisis
//! semántico.
//!
//! # Reglas importantes del lenguaje
//! - Las palabras clave son case-insensitive, por lo cual tanto `resto`
//!   como `RESTO` resultan en [`Keyword::Mod`].
//! - Los identificadores sí distinguen mayúsculas de minúsculas.
//! - `//` inicia un comentario de línea; un `/` aislado es división.
//!
//! # Errores
//! El lexer es capaz de recuperarse parcialmente de condiciones de error.
//! Esto ocurre en suficiente grado como para reportar más de un error por
//! ejecución, pero no lo suficiente como para permitir el avance a las
//! demás fases de la compilación.

use crate::{
    error::{sealed, Phase, Report},
    source::{InputStream, Located, Location},
};

use std::{
    borrow::Borrow,
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

// Case-insensitive
pub use unicase::Ascii as NoCase;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("erro de E/S: {0}")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("símbolo '{0}'")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("esperado '{0}'")]
    Expected(char),

    /// Una constante real terminó en punto decimal.
    #[error("constante '{0}' sem dígitos após o ponto decimal")]
    MissingFraction(String),
}

impl sealed::Sealed for LexerError {}

impl Report for LexerError {
    const PHASE: Phase = Phase::Lexical;

    fn code(&self) -> u16 {
        1
    }

    fn summary(&self) -> &'static str {
        "símbolo não identificado como token"
    }

    fn offending(&self) -> String {
        match self {
            LexerError::Input(_) => String::new(),
            LexerError::BadChar(c) => c.to_string(),
            LexerError::Expected(c) => c.to_string(),
            LexerError::MissingFraction(text) => text.clone(),
        }
    }
}

/// Un identificador.
///
/// A diferencia de las palabras clave, dos identificadores solo son
/// iguales si coinciden carácter por carácter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl Identifier {
    /// Longitud en caracteres.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Constante numérica, con su texto original.
    Number(String),

    /// `=`
    Assign,

    /// `,`
    Comma,

    /// `;`
    Semicolon,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `>`
    Greater,

    /// `<`
    Less,

    /// `>=`
    GreaterOrEqual,

    /// `<=`
    LessOrEqual,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,
}

impl Token {
    /// Determina si el token es una palabra reservada.
    pub fn is_keyword(&self) -> bool {
        matches!(self, Token::Keyword(_))
    }

    /// Nombre de la categoría léxica.
    pub fn kind(&self) -> &'static str {
        use Token::*;

        match self {
            Id(_) => "IDENT",
            Keyword(_) => "KEYWORD",
            Number(_) => "NUM",
            Assign => "ATRIB",
            Comma => "VIRG",
            Semicolon => "PVIRG",
            OpenParen => "ABREPAR",
            CloseParen => "FECHAPAR",
            Plus | Minus | Times | Slash => "OPARIT",
            Greater | Less | GreaterOrEqual | LessOrEqual | Equal | NotEqual => "OPREL",
        }
    }

    /// Texto del token tal como aparece en el código fuente.
    pub fn text(&self) -> String {
        use Token::*;

        match self {
            Id(id) => id.to_string(),
            Keyword(keyword) => keyword.to_string(),
            Number(text) => text.clone(),
            Assign => "=".into(),
            Comma => ",".into(),
            Semicolon => ";".into(),
            OpenParen => "(".into(),
            CloseParen => ")".into(),
            Plus => "+".into(),
            Minus => "-".into(),
            Times => "*".into(),
            Slash => "/".into(),
            Greater => ">".into(),
            Less => "<".into(),
            GreaterOrEqual => ">=".into(),
            LessOrEqual => "<=".into(),
            Equal => "==".into(),
            NotEqual => "!=".into(),
        }
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Id(id) => write!(fmt, "identificador `{}`", id),
            Token::Keyword(keyword) => write!(fmt, "palavra reservada `{}`", keyword),
            Token::Number(text) => write!(fmt, "número `{}`", text),
            other => write!(fmt, "`{}`", other.text()),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Inteiro,
    Real,
    Caracter,
    Se,
    Entao,
    Senao,
    Enquanto,
    Mod,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Inteiro  => "inteiro",
            Real     => "real",
            Caracter => "caracter",
            Se       => "se",
            Entao    => "entao",
            Senao    => "senao",
            Enquanto => "enquanto",
            Mod      => "RESTO",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(NoCase<&str>, Keyword)] = &[
            (NoCase::new("inteiro"),  Inteiro),
            (NoCase::new("real"),     Real),
            (NoCase::new("caracter"), Caracter),
            (NoCase::new("se"),       Se),
            (NoCase::new("entao"),    Entao),
            (NoCase::new("senao"),    Senao),
            (NoCase::new("enquanto"), Enquanto),
            (NoCase::new("resto"),    Mod),
            (NoCase::new("mod"),      Mod),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == NoCase::new(string))
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: std::iter::Peekable<S>,
    state: State,
    start: Location,
    last: Location,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró `/`. Otro `/` inicia un comentario.
    Slash,

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Se encontró `=`, que puede ser asignación o `==`.
    Equals,

    /// Se encontró `!`, que debe ir seguido de `=`.
    Bang,

    /// Se encontró `<`.
    Less,

    /// Se encontró `>`.
    Greater,

    /// Constante numérica.
    ///
    /// Este estado incluirá dígitos en el token mientras que el
    /// siguiente carácter sea un dígito. Se admite a lo sumo un
    /// punto decimal.
    Number { text: String, fraction: bool },

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        let last = start.clone();
        Lexer {
            source: source.peekable(),
            state: State::Start,
            start,
            last,
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores. El propósito de esta función es permitir la
    /// recolección de múltiples errores léxicos en una misma ejecución
    /// del compilador.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use {State::*, Token::*};

        loop {
            // Se espera un siguiente carácter, fallando si hay error de E/S
            let (next_char, here) = match self.source.peek() {
                None => (None, None),
                Some(Ok((c, location))) => (Some(*c), Some(location.clone())),
                Some(Err(_)) => match self.source.next() {
                    Some(Err(error)) => return Err(error.into()),
                    _ => continue,
                },
            };

            // La posición de origen se mueve junto al siguiente carácter
            // siempre que no se haya encontrado una frontera de token
            if let (Start, Some(here)) = (&self.state, &here) {
                self.start = here.clone();
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error. Al llegar al final de la línea
                // el lexer se recupera y reinicia.
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('/')) => self.state = State::Slash,
                (Start, Some('=')) => self.state = Equals,
                (Start, Some('!')) => self.state = Bang,
                (Start, Some('<')) => self.state = State::Less,
                (Start, Some('>')) => self.state = State::Greater,

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                // Inicio de una constante numérica. No se consume el
                // dígito, ya que esta lógica ya está implementada en el
                // respectivo caso para un estado de constante numérica.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = State::Number {
                        text: String::new(),
                        fraction: false,
                    };

                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_whitespace() => (),
                (Start, Some(c)) => return Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => return Ok(Some(std::mem::replace(value, Plus))),

                // `//` inicia un comentario, de lo contrario es división
                (State::Slash, Some('/')) => self.state = Comment,
                (State::Slash, _) => return Ok(Some(Token::Slash)),

                // Los comentarios descartan la línea donde ocurren
                (Comment, Some('\n')) => self.state = Start,
                (Comment, Some(_)) => (),
                (Comment, None) => self.state = Start,

                // Operadores de uno o dos caracteres
                (Equals, Some('=')) => self.state = Complete(Equal),
                (Equals, _) => return Ok(Some(Assign)),
                (Bang, Some('=')) => self.state = Complete(NotEqual),
                (Bang, _) => return Err(LexerError::Expected('=')),
                (State::Less, Some('=')) => self.state = Complete(LessOrEqual),
                (State::Less, _) => return Ok(Some(Token::Less)),
                (State::Greater, Some('=')) => self.state = Complete(GreaterOrEqual),
                (State::Greater, _) => return Ok(Some(Token::Greater)),

                // Acumulación dígito por dígito de constantes
                (State::Number { text, .. }, Some(digit)) if digit.is_ascii_digit() => {
                    text.push(digit)
                }

                (State::Number { text, fraction }, Some('.')) if !*fraction => {
                    text.push('.');
                    *fraction = true;
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (State::Number { text, .. }, _) => {
                    let text = std::mem::take(text);
                    if text.ends_with('.') {
                        return Err(LexerError::MissingFraction(text));
                    }

                    return Ok(Some(Token::Number(text)));
                }

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => word.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    let word = std::mem::take(word);
                    let token = match self::Keyword::from_str(&word) {
                        Ok(keyword) => Token::Keyword(keyword),
                        Err(()) => Id(Identifier::from(word.as_str())),
                    };

                    return Ok(Some(token));
                }
            }

            // Si no hubo `continue` ni retorno, aquí se consume el carácter
            // que se observó con lookahead anteriormente
            self.source.next();
            if let Some(here) = here {
                self.last = here;
            }
        }
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some(token)) => {
                self.state = State::Start;

                let location = Location::span(self.start.clone(), &self.last);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(error, self.start.clone())))
            }
        }
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
