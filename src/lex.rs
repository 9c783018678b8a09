//! The pull interface between tokenizers and the read context.

use std::collections::VecDeque;

use crate::error::{Position, ReadError, ReadErrorKind};
use crate::token::{Token, TokenTypes};

/// Turns characters into tokens on demand.
///
/// Each call produces exactly one token. The text of a scalar token is
/// left in the [LexState] with [LexState::set_text]. Once the input is
/// exhausted, [Token::EndOfInput] is returned on every call.
pub trait Tokenizer {
    fn next_token(&mut self, lex: &mut LexState) -> Result<Token, ReadError>;

    /// The position where the most recent token started.
    fn position(&self) -> Position;
}

/// Per-call tokenizer state owned by the read context: the nesting
/// stack, the lookahead queue and the text of the latest token.
#[derive(Debug, Default)]
pub struct LexState {
    stack: Vec<Token>,
    queue: VecDeque<(Token, Option<String>)>,
    text: Option<String>,
}

impl LexState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a structure. `start` must be a start token.
    pub fn push(&mut self, start: Token) {
        debug_assert!(start.is_start());
        self.stack.push(start);
    }

    /// Closes the innermost structure, which must be the one `end`
    /// closes.
    pub fn pop(&mut self, end: Token) -> Result<(), ReadErrorKind> {
        match self.stack.last().and_then(|t| t.closing()) {
            Some(want) if want == end => {
                self.stack.pop();
                Ok(())
            }
            Some(want) => Err(ReadErrorKind::UnbalancedStructure {
                expected: TokenTypes::new(want),
                found: end,
            }),
            None => Err(ReadErrorKind::UnbalancedStructure {
                expected: TokenTypes::VALUE,
                found: end,
            }),
        }
    }

    /// The innermost open start token.
    pub fn innermost(&self) -> Option<Token> {
        self.stack.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Fails if any structure is still open at the end of input.
    pub fn check_closed(&self) -> Result<(), ReadErrorKind> {
        match self.stack.last().and_then(|t| t.closing()) {
            Some(want) => Err(ReadErrorKind::UnbalancedStructure {
                expected: TokenTypes::new(want),
                found: Token::EndOfInput,
            }),
            None => Ok(()),
        }
    }

    /// Appends a token to the lookahead queue.
    pub fn enqueue(&mut self, token: Token, text: Option<String>) {
        self.queue.push_back((token, text));
    }

    /// Puts a token in front of everything already queued.
    pub fn enqueue_next(&mut self, token: Token, text: Option<String>) {
        self.queue.push_front((token, text));
    }

    /// Takes the oldest queued token, making its text current.
    pub fn dequeue(&mut self) -> Option<Token> {
        let (token, text) = self.queue.pop_front()?;
        self.text = text;
        Some(token)
    }

    pub fn has_queued(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn set_text(&mut self, text: String) {
        self.text = Some(text);
    }

    pub fn take_text(&mut self) -> Option<String> {
        self.text.take()
    }
}
