//! Definitions of the tokens.
//!
//! Tokens carry no payload. The text of a scalar token is taken from
//! the [ReadContext](crate::ReadContext) with
//! [take_text](crate::ReadContext::take_text) on the read side, and
//! passed alongside the token to
//! [yield_scalar](crate::TokenSink::yield_scalar) on the write side.
//!
//! Structured data uses start/end pairs: [Token::ObjectStart] is
//! followed by pairs of [Token::PropertyKey] and one value, and ends
//! with [Token::ObjectEnd]. [Token::ArrayStart] is followed by values
//! and ends with [Token::ArrayEnd].

use std::fmt;

macro_rules! define_tokens {
    ($($id:ident => $name:literal),*$(,)?) => {
        /// The lexical categories produced by every tokenizer.
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub enum Token {
            $($id),*
        }

        impl Token {
            /// All tokens, in declaration order.
            pub const ALL: &'static [Token] = &[$(Token::$id),*];

            /// A short, human readable name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Token::$id => $name),*
                }
            }
        }

        /// Converts an integer representation of the token into
        /// [Token]. Returns `Err(())` if the value is invalid.
        impl TryFrom<u64> for Token {
            type Error = ();

            fn try_from(i: u64) -> Result<Self, Self::Error> {
                Ok(match i {
                    $(x if x == Token::$id as u64 => Self::$id,)*
                    _ => return Err(()),
                })
            }
        }
    }
}

define_tokens! {
    Null        => "null",
    ObjectStart => "object start",
    ObjectEnd   => "object end",
    PropertyKey => "property key",
    Number      => "number",
    Boolean     => "boolean",
    String      => "string",
    ArrayStart  => "array start",
    ArrayEnd    => "array end",
    EndOfInput  => "end of input",
    Skip        => "skip",
}

impl Token {
    /// Returns true if this token starts a nested value.
    pub fn is_start(self) -> bool {
        matches!(self, Self::ObjectStart | Self::ArrayStart)
    }

    /// Returns true if this token ends a nested value.
    pub fn is_end(self) -> bool {
        matches!(self, Self::ObjectEnd | Self::ArrayEnd)
    }

    /// Returns true if the token carries text retrievable with
    /// [take_text](crate::ReadContext::take_text).
    pub fn has_text(self) -> bool {
        matches!(
            self,
            Self::PropertyKey | Self::Number | Self::Boolean | Self::String
        )
    }

    /// Returns the end token matching a start token.
    pub fn closing(self) -> Option<Token> {
        match self {
            Self::ObjectStart => Some(Self::ObjectEnd),
            Self::ArrayStart => Some(Self::ArrayEnd),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [Token] values.
///
/// Implemented as a bit set.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct TokenTypes(u64);

impl TokenTypes {
    /// The empty set of tokens.
    pub const EMPTY: TokenTypes = TokenTypes(0);

    /// All tokens.
    pub const ALL: TokenTypes = TokenTypes(!0);

    /// Any token that can begin a value.
    pub const VALUE: TokenTypes = TokenTypes(
        1 << Token::Null as u64
            | 1 << Token::ObjectStart as u64
            | 1 << Token::Number as u64
            | 1 << Token::Boolean as u64
            | 1 << Token::String as u64
            | 1 << Token::ArrayStart as u64,
    );

    /// Constructs a new set with a single token.
    pub fn new(t: Token) -> Self {
        Self(1 << (t as u64))
    }

    /// Constructs a new set by adding a token to self.
    pub fn with(self, t: Token) -> Self {
        Self(self.0 | (1 << (t as u64)))
    }

    /// Constructs a new set by removing a token from self.
    pub fn without(self, t: Token) -> Self {
        Self(self.0 & !(1 << (t as u64)))
    }

    /// Constructs a new set as a union of two sets.
    pub fn union(self, tt: TokenTypes) -> Self {
        Self(self.0 | tt.0)
    }

    /// Returns true if the token is in the set.
    pub fn contains(self, t: Token) -> bool {
        self.0 & (1 << (t as u64)) != 0
    }
}

impl FromIterator<Token> for TokenTypes {
    fn from_iter<I: IntoIterator<Item = Token>>(it: I) -> Self {
        let mut v = 0u64;

        for t in it {
            v |= 1 << (t as u64);
        }

        Self(v)
    }
}

/// Displays the set as pipe-separated tokens: `Number|String`.
impl fmt::Debug for TokenTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut found = false;

        for t in Token::ALL {
            if !self.contains(*t) {
                continue;
            }

            if found {
                write!(f, "|")?;
            } else {
                found = true;
            }
            write!(f, "{:?}", t)?;
        }

        Ok(())
    }
}

impl fmt::Display for TokenTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut found = false;

        for t in Token::ALL {
            if !self.contains(*t) {
                continue;
            }

            if found {
                write!(f, " or ")?;
            } else {
                found = true;
            }
            f.write_str(t.name())?;
        }

        if !found {
            f.write_str("nothing")?;
        }

        Ok(())
    }
}
