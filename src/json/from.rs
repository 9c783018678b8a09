use std::fmt;

use crate::error::WriteError;
use crate::sink::TokenSink;
use crate::token::*;

/// Renders tokens as compact [JSON](https://json.org/).
///
/// The output contains no whitespace. Non-finite numbers have no JSON
/// spelling and are written as `null`.
pub struct JsonSink<W: fmt::Write> {
    writer: W,
    state: JsonState,
    states: Vec<JsonState>,
}

#[derive(Clone, Copy, Debug)]
enum JsonState {
    Plain,
    FirstArrayElement,
    ArrayElement,
    FirstObjectKey,
    ObjectKey,
    ObjectValue,
    Done,
}

impl<W: fmt::Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            state: JsonState::Plain,
            states: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn expect_tokens(&self) -> TokenTypes {
        match self.state {
            JsonState::Plain | JsonState::ObjectValue => TokenTypes::VALUE,
            JsonState::FirstArrayElement | JsonState::ArrayElement => {
                TokenTypes::VALUE.with(Token::ArrayEnd)
            }
            JsonState::FirstObjectKey | JsonState::ObjectKey => {
                TokenTypes::new(Token::PropertyKey).with(Token::ObjectEnd)
            }
            JsonState::Done => TokenTypes::EMPTY,
        }
    }

    /// Writes the comma or colon as appropriate before a token, and
    /// updates the state.
    fn write_sep(&mut self, token: Token) -> Result<(), WriteError> {
        let is_key = token == Token::PropertyKey;

        match self.state {
            JsonState::Plain if !is_key => self.state = JsonState::Done,
            JsonState::FirstArrayElement if !is_key => self.state = JsonState::ArrayElement,
            JsonState::ArrayElement if !is_key => self.writer.write_str(",")?,
            JsonState::FirstObjectKey if is_key => self.state = JsonState::ObjectValue,
            JsonState::ObjectKey if is_key => {
                self.writer.write_str(",")?;
                self.state = JsonState::ObjectValue;
            }
            JsonState::ObjectValue if !is_key => {
                self.writer.write_str(":")?;
                self.state = JsonState::ObjectKey;
            }
            _ => return Err(WriteError::invalid_token(token, self.expect_tokens())),
        }

        Ok(())
    }

    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut start = 0;
        let w = &mut self.writer;

        w.write_char('"')?;

        for (i, c) in s.char_indices() {
            if c != '\\' && c != '"' && c >= ' ' {
                continue;
            }

            w.write_str(&s[start..i])?;
            w.write_char('\\')?;

            match c {
                '\x08' => w.write_char('b')?,
                '\x0C' => w.write_char('f')?,
                '\n' => w.write_char('n')?,
                '\r' => w.write_char('r')?,
                '\t' => w.write_char('t')?,
                c if c < ' ' => write!(w, "u{:04X}", c as u32)?,
                c => w.write_char(c)?,
            }

            start = i + c.len_utf8();
        }

        w.write_str(&s[start..])?;
        w.write_char('"')
    }

    fn write_number(&mut self, text: &str) -> fmt::Result {
        match text {
            ".inf" | "-.inf" | ".nan" => self.writer.write_str("null"),
            text => self.writer.write_str(text),
        }
    }
}

impl<W: fmt::Write> TokenSink for JsonSink<W> {
    fn yield_token(&mut self, token: Token) -> Result<(), WriteError> {
        if token.is_end() {
            let ok = match self.state {
                JsonState::FirstArrayElement | JsonState::ArrayElement => token == Token::ArrayEnd,
                JsonState::FirstObjectKey | JsonState::ObjectKey => token == Token::ObjectEnd,
                _ => false,
            };
            if !ok {
                return Err(WriteError::invalid_token(token, self.expect_tokens()));
            }

            self.state = self
                .states
                .pop()
                .ok_or(WriteError::invalid_token(token, TokenTypes::EMPTY))?;

            return Ok(self.writer.write_str(if token == Token::ArrayEnd { "]" } else { "}" })?);
        }

        self.write_sep(token)?;

        match token {
            Token::Null => self.writer.write_str("null")?,
            Token::ArrayStart => {
                self.states
                    .push(std::mem::replace(&mut self.state, JsonState::FirstArrayElement));
                self.writer.write_str("[")?;
            }
            Token::ObjectStart => {
                self.states
                    .push(std::mem::replace(&mut self.state, JsonState::FirstObjectKey));
                self.writer.write_str("{")?;
            }
            _ => return Err(WriteError::invalid_token(token, self.expect_tokens())),
        }

        Ok(())
    }

    fn yield_scalar(&mut self, token: Token, text: &str) -> Result<(), WriteError> {
        self.write_sep(token)?;

        match token {
            Token::String | Token::PropertyKey => self.write_str(text)?,
            Token::Number => self.write_number(text)?,
            Token::Boolean => self.writer.write_str(text)?,
            _ => {
                return Err(WriteError::invalid_token(
                    token,
                    [Token::String, Token::PropertyKey, Token::Number, Token::Boolean]
                        .into_iter()
                        .collect(),
                ))
            }
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        match self.state {
            JsonState::Done => Ok(()),
            _ => Err(WriteError::invalid_token(Token::EndOfInput, self.expect_tokens())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec::TokenVec;

    fn emit(tokens: TokenVec) -> Result<String, WriteError> {
        let mut sink = JsonSink::new(String::new());
        tokens.replay(&mut sink)?;
        Ok(sink.into_inner())
    }

    #[test]
    fn test_json_sink_plain() {
        let cases = vec![
            (TokenVec::new().token(Token::Null), "null"),
            (TokenVec::new().scalar(Token::Boolean, "true"), "true"),
            (TokenVec::new().scalar(Token::Number, "42"), "42"),
            (TokenVec::new().scalar(Token::Number, "-1.5"), "-1.5"),
            (TokenVec::new().scalar(Token::Number, ".inf"), "null"),
            (TokenVec::new().scalar(Token::String, "hello"), "\"hello\""),
            (TokenVec::new().scalar(Token::String, "\n"), "\"\\n\""),
            (TokenVec::new().scalar(Token::String, "a\"b\\c"), "\"a\\\"b\\\\c\""),
            (TokenVec::new().scalar(Token::String, "\x08\x0C"), "\"\\b\\f\""),
            (TokenVec::new().scalar(Token::String, "❤️"), "\"❤️\""),
            (TokenVec::new().scalar(Token::String, "\x1F"), "\"\\u001F\""),
        ];

        for (tokens, want) in cases {
            assert_eq!(emit(tokens).unwrap(), want);
        }
    }

    #[test]
    fn test_json_sink_array() {
        let cases = vec![
            (
                TokenVec::new().token(Token::ArrayStart).token(Token::ArrayEnd),
                "[]",
            ),
            (
                TokenVec::new()
                    .token(Token::ArrayStart)
                    .scalar(Token::Boolean, "true")
                    .scalar(Token::Boolean, "false")
                    .token(Token::ArrayEnd),
                "[true,false]",
            ),
            (
                TokenVec::new()
                    .token(Token::ArrayStart)
                    .token(Token::ArrayStart)
                    .token(Token::Null)
                    .token(Token::ArrayEnd)
                    .token(Token::ArrayEnd),
                "[[null]]",
            ),
        ];

        for (tokens, want) in cases {
            assert_eq!(emit(tokens).unwrap(), want);
        }
    }

    #[test]
    fn test_json_sink_object() {
        let cases = vec![
            (
                TokenVec::new().token(Token::ObjectStart).token(Token::ObjectEnd),
                "{}",
            ),
            (
                TokenVec::new()
                    .token(Token::ObjectStart)
                    .scalar(Token::PropertyKey, "akey")
                    .scalar(Token::Boolean, "true")
                    .scalar(Token::PropertyKey, "bkey")
                    .token(Token::ObjectStart)
                    .scalar(Token::PropertyKey, "ckey")
                    .scalar(Token::Number, "1")
                    .token(Token::ObjectEnd)
                    .token(Token::ObjectEnd),
                r#"{"akey":true,"bkey":{"ckey":1}}"#,
            ),
        ];

        for (tokens, want) in cases {
            assert_eq!(emit(tokens).unwrap(), want);
        }
    }

    #[test]
    fn test_json_sink_invalid() {
        let cases = vec![
            TokenVec::new()
                .token(Token::ObjectStart)
                .scalar(Token::String, "x")
                .token(Token::ObjectEnd),
            TokenVec::new().token(Token::ArrayStart).token(Token::ObjectEnd),
            TokenVec::new().scalar(Token::PropertyKey, "k"),
            TokenVec::new().token(Token::ArrayStart),
            TokenVec::new().token(Token::Null).token(Token::Null),
            TokenVec::new(),
        ];

        for tokens in cases {
            assert!(
                matches!(emit(tokens.clone()), Err(WriteError::InvalidToken { .. })),
                "{:?}",
                tokens
            );
        }
    }
}
