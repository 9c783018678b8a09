use crate::error::{Position, ReadError, ReadErrorKind};
use crate::lex::{LexState, Tokenizer};
use crate::scalar;
use crate::source::CharSource;
use crate::token::Token;

/// Tokenizes [JSON](https://json.org/) text.
///
/// Separators (`,` and `:`) produce [Token::Skip]. Any value may follow
/// a complete top-level value; it is up to the reader to reject it as
/// trailing content.
pub struct JsonTokenizer<S: CharSource> {
    src: S,
    state: JsonState,
    start: Position,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum JsonState {
    Value,
    ValueOrEnd,
    Key,
    KeyOrEnd,
    Colon,
    AfterValue,
    Done,
}

impl<S: CharSource> JsonTokenizer<S> {
    pub fn new(src: S) -> Self {
        Self {
            src,
            state: JsonState::Value,
            start: Position::default(),
        }
    }

    fn error(&self, kind: ReadErrorKind) -> ReadError {
        ReadError::at(kind, self.src.position())
    }

    fn syntax(&self, msg: String) -> ReadError {
        self.error(ReadErrorKind::InvalidSyntax(msg))
    }

    fn skip_whitespace(&mut self) -> Result<(), ReadError> {
        while let Some(' ' | '\t' | '\n' | '\r') = self.src.current()? {
            self.src.next()?;
        }

        Ok(())
    }

    fn after_value(&mut self, lex: &LexState) {
        self.state = if lex.depth() == 0 {
            JsonState::Done
        } else {
            JsonState::AfterValue
        };
    }

    fn expects_value(&self) -> bool {
        matches!(
            self.state,
            JsonState::Value | JsonState::ValueOrEnd | JsonState::Done
        )
    }

    fn read_string(&mut self) -> Result<String, ReadError> {
        let mut s = String::new();
        self.src.next()?;

        loop {
            match self.src.bump()? {
                None => return Err(self.error(ReadErrorKind::UnclosedQuote)),
                Some('"') => return Ok(s),
                Some('\\') => s.push(self.read_escape()?),
                Some(c) if c < ' ' => {
                    return Err(self.syntax(format!("control character {:?} in string", c)))
                }
                Some(c) => s.push(c),
            }
        }
    }

    fn read_escape(&mut self) -> Result<char, ReadError> {
        let c = self
            .src
            .bump()?
            .ok_or_else(|| self.error(ReadErrorKind::UnclosedQuote))?;

        Ok(match c {
            '"' | '\\' | '/' => c,
            'b' => '\x08',
            'f' => '\x0C',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => {
                let hi = self.read_hex4()?;
                if (0xD800..0xDC00).contains(&hi) {
                    if !(self.src.eat('\\')? && self.src.eat('u')?) {
                        return Err(self.error(ReadErrorKind::InvalidEscape('u')));
                    }
                    let lo = self.read_hex4()?;
                    if !(0xDC00..0xE000).contains(&lo) {
                        return Err(self.error(ReadErrorKind::InvalidEscape('u')));
                    }
                    let c = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
                    char::from_u32(c).ok_or_else(|| self.error(ReadErrorKind::InvalidEscape('u')))?
                } else {
                    char::from_u32(hi).ok_or_else(|| self.error(ReadErrorKind::InvalidEscape('u')))?
                }
            }
            c => return Err(self.error(ReadErrorKind::InvalidEscape(c))),
        })
    }

    fn read_hex4(&mut self) -> Result<u32, ReadError> {
        let mut v = 0;

        for _ in 0..4 {
            let d = self
                .src
                .bump()?
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error(ReadErrorKind::InvalidEscape('u')))?;
            v = v * 16 + d;
        }

        Ok(v)
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> Result<String, ReadError> {
        let mut s = String::new();

        while let Some(c) = self.src.current()? {
            if !pred(c) {
                break;
            }
            s.push(c);
            self.src.next()?;
        }

        Ok(s)
    }

    fn value(&mut self, lex: &mut LexState, c: char) -> Result<Token, ReadError> {
        if !self.expects_value() {
            return Err(self.syntax(format!("unexpected {:?}", c)));
        }

        match c {
            '{' => {
                self.src.next()?;
                lex.push(Token::ObjectStart);
                self.state = JsonState::KeyOrEnd;
                Ok(Token::ObjectStart)
            }
            '[' => {
                self.src.next()?;
                lex.push(Token::ArrayStart);
                self.state = JsonState::ValueOrEnd;
                Ok(Token::ArrayStart)
            }
            '"' => {
                let s = self.read_string()?;
                lex.set_text(s);
                self.after_value(lex);
                Ok(Token::String)
            }
            '-' | '0'..='9' => {
                let text = self.read_while(|c| matches!(c, '0'..='9' | '-' | '+' | '.' | 'e' | 'E'))?;
                if scalar::parse_number(&text).is_none() {
                    return Err(ReadError::at(ReadErrorKind::InvalidNumber(text), self.start));
                }
                lex.set_text(text);
                self.after_value(lex);
                Ok(Token::Number)
            }
            c if c.is_ascii_alphabetic() => {
                let word = self.read_while(|c| c.is_ascii_alphanumeric())?;
                let token = match word.as_str() {
                    "null" => Token::Null,
                    "true" | "false" => {
                        lex.set_text(word);
                        Token::Boolean
                    }
                    _ => {
                        return Err(ReadError::at(
                            ReadErrorKind::InvalidSyntax(format!("unexpected word `{}`", word)),
                            self.start,
                        ))
                    }
                };
                self.after_value(lex);
                Ok(token)
            }
            c => Err(self.syntax(format!("unexpected {:?}", c))),
        }
    }

    fn close(&mut self, lex: &mut LexState, end: Token) -> Result<Token, ReadError> {
        let allowed = match end {
            Token::ObjectEnd => matches!(self.state, JsonState::KeyOrEnd | JsonState::AfterValue),
            _ => matches!(self.state, JsonState::ValueOrEnd | JsonState::AfterValue),
        };
        if !allowed {
            return Err(self.syntax(format!("unexpected {}", end)));
        }

        lex.pop(end).map_err(|kind| self.error(kind))?;
        self.src.next()?;
        self.after_value(lex);

        Ok(end)
    }
}

impl<S: CharSource> Tokenizer for JsonTokenizer<S> {
    fn next_token(&mut self, lex: &mut LexState) -> Result<Token, ReadError> {
        self.skip_whitespace()?;
        self.start = self.src.position();

        let Some(c) = self.src.current()? else {
            lex.check_closed().map_err(|kind| self.error(kind))?;
            return Ok(Token::EndOfInput);
        };

        match c {
            '}' => self.close(lex, Token::ObjectEnd),
            ']' => self.close(lex, Token::ArrayEnd),
            ',' if self.state == JsonState::AfterValue => {
                self.src.next()?;
                self.state = match lex.innermost() {
                    Some(Token::ObjectStart) => JsonState::Key,
                    _ => JsonState::Value,
                };
                Ok(Token::Skip)
            }
            ':' if self.state == JsonState::Colon => {
                self.src.next()?;
                self.state = JsonState::Value;
                Ok(Token::Skip)
            }
            '"' if matches!(self.state, JsonState::Key | JsonState::KeyOrEnd) => {
                let s = self.read_string()?;
                lex.set_text(s);
                self.state = JsonState::Colon;
                Ok(Token::PropertyKey)
            }
            c => self.value(lex, c),
        }
    }

    fn position(&self) -> Position {
        self.start
    }
}
