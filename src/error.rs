use std::fmt;
use std::io;

use thiserror::Error;

use crate::token::*;

/// A location in the character source. Lines and columns are
/// zero-based; the offset counts characters from the start.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {} (offset {})",
            self.line + 1,
            self.column + 1,
            self.offset
        )
    }
}

/// The reason a read failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReadErrorKind {
    /// The token stream contained a token the reader cannot accept here.
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: TokenTypes, found: Token },

    /// A property was not declared by the record shape.
    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    /// A polymorphic record did not start with its discriminator.
    #[error("expected discriminator property `{expected}` first, found `{found}`")]
    DiscriminatorNotFirst { expected: String, found: String },

    /// The discriminator value named no registered subtype.
    #[error("unknown subtype `{tag}` for discriminator `{property}`")]
    UnknownSubtype { property: String, tag: String },

    /// An alias referenced an anchor that has no complete value.
    #[error("unresolved alias `{0}`")]
    UnresolvedAlias(String),

    /// The input ended inside a quoted scalar.
    #[error("unclosed quoted scalar")]
    UnclosedQuote,

    /// A closing token did not match the innermost open structure.
    #[error("expected {expected}, found {found}")]
    UnbalancedStructure { expected: TokenTypes, found: Token },

    /// More tokens followed a complete document.
    #[error("unexpected trailing content: {0}")]
    TrailingContent(Token),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("invalid escape sequence `\\{0}`")]
    InvalidEscape(char),

    #[error("invalid base64 data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("`{value}` is not a variant of {name}")]
    InvalidEnumValue { name: String, value: String },

    #[error("expected {expected} elements, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    /// The characters do not form a valid document.
    #[error("{0}")]
    InvalidSyntax(String),

    /// An `!include` could not be resolved.
    #[error("include `{name}` failed: {reason}")]
    Include { name: String, reason: String },

    /// The value could not be converted into the requested Rust type.
    #[error("{0}")]
    Shape(String),

    /// A custom reader rejected the text.
    #[error("{0}")]
    Custom(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The error returned from every read operation.
#[derive(Debug)]
pub struct ReadError {
    pub kind: ReadErrorKind,
    pub position: Option<Position>,
}

impl ReadError {
    pub fn new(kind: ReadErrorKind) -> Self {
        Self {
            kind,
            position: None,
        }
    }

    pub fn at(kind: ReadErrorKind, position: Position) -> Self {
        Self {
            kind,
            position: Some(position),
        }
    }

    /// Sets the position, unless one is already known.
    pub fn or_at(mut self, position: Position) -> Self {
        self.position.get_or_insert(position);
        self
    }

    pub fn kind(&self) -> &ReadErrorKind {
        &self.kind
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(pos) => write!(f, "{} at {}", self.kind, pos),
            None => fmt::Display::fmt(&self.kind, f),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ReadErrorKind> for ReadError {
    fn from(kind: ReadErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<io::Error> for ReadError {
    fn from(err: io::Error) -> Self {
        Self::new(ReadErrorKind::Io(err))
    }
}

/// The error returned from every write operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteError {
    /// The string formatter failed.
    #[error("formatting failed")]
    Fmt(#[from] fmt::Error),

    /// The byte sink failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The emitter received a token it cannot place here.
    #[error("invalid token {token}, expected {expected}")]
    InvalidToken { token: Token, expected: TokenTypes },

    /// The value does not fit the descriptor it is written with.
    #[error("{0}")]
    Shape(String),

    /// A custom writer failed.
    #[error("{0}")]
    Custom(String),
}

impl WriteError {
    pub(crate) fn invalid_token(token: Token, expected: TokenTypes) -> Self {
        Self::InvalidToken { token, expected }
    }
}

/// Returned from registration when the descriptor was already resolved.
#[derive(Debug, Error)]
#[error("a strategy for {0} was already resolved")]
pub struct RegisterError(pub String);
