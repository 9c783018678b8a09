use crate::error::{Position, ReadError, WriteError};
use crate::lex::{LexState, Tokenizer};
use crate::sink::TokenSink;
use crate::token::Token;

/// A recorded token stream, with the text of scalar tokens.
///
/// It is a [TokenSink] on the write side, and can be replayed as a
/// [Tokenizer] on the read side. This makes it possible to test
/// dispatch without a text format.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TokenVec(Vec<(Token, Option<String>)>);

impl TokenVec {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a token without text, builder style.
    pub fn token(mut self, token: Token) -> Self {
        self.0.push((token, None));
        self
    }

    /// Appends a token with text, builder style.
    pub fn scalar(mut self, token: Token, text: &str) -> Self {
        self.0.push((token, Some(text.to_owned())));
        self
    }

    /// Appends all tokens of another vector.
    pub fn extend(mut self, other: TokenVec) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Token, Option<&str>)> {
        self.0.iter().map(|(t, s)| (*t, s.as_deref()))
    }

    pub fn into_vec(self) -> Vec<(Token, Option<String>)> {
        self.0
    }

    /// Replays the tokens. The replay ends with [Token::EndOfInput].
    pub fn tokenizer(&self) -> TokenVecTokenizer<'_> {
        TokenVecTokenizer {
            tokens: &self.0,
            index: 0,
        }
    }

    /// Pushes the recorded tokens into a sink.
    pub fn replay(&self, sink: &mut dyn TokenSink) -> Result<(), WriteError> {
        for (token, text) in self.0.iter() {
            match text {
                Some(text) => sink.yield_scalar(*token, text)?,
                None => sink.yield_token(*token)?,
            }
        }

        sink.finish()
    }
}

impl From<Vec<(Token, Option<String>)>> for TokenVec {
    fn from(v: Vec<(Token, Option<String>)>) -> Self {
        TokenVec(v)
    }
}

impl TokenSink for TokenVec {
    fn yield_token(&mut self, token: Token) -> Result<(), WriteError> {
        self.0.push((token, None));
        Ok(())
    }

    fn yield_scalar(&mut self, token: Token, text: &str) -> Result<(), WriteError> {
        self.0.push((token, Some(text.to_owned())));
        Ok(())
    }
}

/// A [Tokenizer] over the tokens of a [TokenVec].
///
/// Positions count tokens: the offset is the token index.
pub struct TokenVecTokenizer<'a> {
    tokens: &'a [(Token, Option<String>)],
    index: usize,
}

impl Tokenizer for TokenVecTokenizer<'_> {
    fn next_token(&mut self, lex: &mut LexState) -> Result<Token, ReadError> {
        let Some((token, text)) = self.tokens.get(self.index) else {
            return Ok(Token::EndOfInput);
        };
        self.index += 1;

        if let Some(text) = text {
            lex.set_text(text.clone());
        }

        Ok(*token)
    }

    fn position(&self) -> Position {
        Position {
            line: 0,
            column: self.index.saturating_sub(1),
            offset: self.index.saturating_sub(1),
        }
    }
}
