use std::error::Error as StdError;
use std::fmt;

use crate::lexer::LexicalError;

/// Errors detected while parsing and emitting code. Every variant carries
/// the 1-based source line it was detected on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParseError {
    Unexpected {
        line: u32,
        found: String,
        expected: String,
    },
    UnknownSymbol {
        line: u32,
        name: String,
    },
    UnknownOverload {
        line: u32,
        name: String,
    },
    AmbiguousOverload {
        line: u32,
        name: String,
    },
    TypeError {
        line: u32,
        message: String,
    },
    Redefinition {
        line: u32,
        name: String,
    },
    Duplicate {
        line: u32,
        name: String,
    },
    BadArrayShape {
        line: u32,
        name: String,
    },
    InitializerOverflow {
        line: u32,
        name: String,
    },
    /// A branch or call displacement does not fit in a word.
    DisplacementOverflow {
        line: u32,
    },
}

impl ParseError {
    pub fn line(&self) -> u32 {
        match *self {
            ParseError::Unexpected { line, .. }
            | ParseError::UnknownSymbol { line, .. }
            | ParseError::UnknownOverload { line, .. }
            | ParseError::AmbiguousOverload { line, .. }
            | ParseError::TypeError { line, .. }
            | ParseError::Redefinition { line, .. }
            | ParseError::Duplicate { line, .. }
            | ParseError::BadArrayShape { line, .. }
            | ParseError::InitializerOverflow { line, .. }
            | ParseError::DisplacementOverflow { line } => line,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Unexpected {
                line,
                found,
                expected,
            } => {
                if found.is_empty() {
                    write!(f, "line {}: expected {} before end of source", line, expected)
                } else {
                    write!(f, "line {}: expected {}, found \"{}\"", line, expected, found)
                }
            }
            ParseError::UnknownSymbol { line, name } => {
                write!(f, "line {}: unknown symbol \"{}\"", line, name)
            }
            ParseError::UnknownOverload { line, name } => {
                write!(f, "line {}: no overload matches \"{}\"", line, name)
            }
            ParseError::AmbiguousOverload { line, name } => {
                write!(f, "line {}: \"{}\" is ambiguous", line, name)
            }
            ParseError::TypeError { line, message } => {
                write!(f, "line {}: {}", line, message)
            }
            ParseError::Redefinition { line, name } => {
                write!(f, "line {}: \"{}\" is already defined", line, name)
            }
            ParseError::Duplicate { line, name } => {
                write!(f, "line {}: duplicate symbol \"{}\"", line, name)
            }
            ParseError::BadArrayShape { line, name } => {
                write!(f, "line {}: invalid array shape for \"{}\"", line, name)
            }
            ParseError::InitializerOverflow { line, name } => {
                write!(
                    f,
                    "line {}: initializer has more elements than \"{}\" holds",
                    line, name
                )
            }
            ParseError::DisplacementOverflow { line } => {
                write!(f, "line {}: branch distance does not fit in a word", line)
            }
        }
    }
}

impl StdError for ParseError {}

/// Compile-time failure: either the lexer or the parser gave up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    Lexical(LexicalError),
    Parse(ParseError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Lexical(err) => write!(f, "{}", err),
            Error::Parse(err) => write!(f, "{}", err),
        }
    }
}

impl StdError for Error {}

impl From<LexicalError> for Error {
    fn from(err: LexicalError) -> Error {
        Error::Lexical(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}
