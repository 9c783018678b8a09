use std::fmt;

use crate::error::WriteError;
use crate::scalar;
use crate::sink::TokenSink;
use crate::token::*;

const INDENT: usize = 2;

/// Where the next value lands, relative to what is already written.
#[derive(Clone, Copy, Debug)]
enum Slot {
    /// The document root.
    Top,
    /// After `key:` in a mapping whose entries start at this column.
    Value(usize),
    /// After `-` in a sequence whose entries start at this column.
    Item(usize),
}

#[derive(Debug)]
struct Frame {
    kind: Token,
    indent: usize,
    entries: usize,
    /// The first entry continues the current line.
    inline_first: bool,
    awaiting_value: bool,
}

/// Renders tokens as block-style YAML.
///
/// Collections are written one entry per line, indented by two spaces.
/// Empty collections are written as `{}` and `[]`. Strings are plain
/// when they would read back as the same string, and double-quoted
/// otherwise. The output has no trailing line break.
pub struct YamlSink<W: fmt::Write> {
    writer: W,
    frames: Vec<Frame>,
    /// A collection whose first token has been seen, but not yet
    /// written because it may turn out empty.
    pending: Option<(Token, Slot)>,
    done: bool,
}

impl<W: fmt::Write> YamlSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames: Vec::new(),
            pending: None,
            done: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn expect_tokens(&self) -> TokenTypes {
        if let Some((start, _)) = self.pending {
            let end = start.closing().unwrap_or(Token::EndOfInput);
            return match start {
                Token::ObjectStart => TokenTypes::new(Token::PropertyKey).with(end),
                _ => TokenTypes::VALUE.with(end),
            };
        }

        match self.frames.last() {
            None if self.done => TokenTypes::EMPTY,
            None => TokenTypes::VALUE,
            Some(f) if f.kind == Token::ObjectStart && f.awaiting_value => TokenTypes::VALUE,
            Some(f) if f.kind == Token::ObjectStart => {
                TokenTypes::new(Token::PropertyKey).with(Token::ObjectEnd)
            }
            Some(_) => TokenTypes::VALUE.with(Token::ArrayEnd),
        }
    }

    fn invalid(&self, token: Token) -> WriteError {
        WriteError::invalid_token(token, self.expect_tokens())
    }

    /// Starts a new line for the next entry of the innermost collection.
    fn new_entry(&mut self) -> fmt::Result {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };

        let first = frame.entries == 0;
        frame.entries += 1;
        if first && frame.inline_first {
            return Ok(());
        }

        let indent = frame.indent;
        self.writer.write_char('\n')?;
        for _ in 0..indent {
            self.writer.write_char(' ')?;
        }

        Ok(())
    }

    /// Writes a collection that has turned out not to be empty.
    fn open_pending(&mut self) -> fmt::Result {
        let Some((kind, slot)) = self.pending.take() else {
            return Ok(());
        };

        let (indent, inline_first) = match slot {
            Slot::Top => (0, true),
            Slot::Value(indent) => (indent + INDENT, false),
            Slot::Item(indent) => {
                self.writer.write_char(' ')?;
                (indent + INDENT, true)
            }
        };

        self.frames.push(Frame {
            kind,
            indent,
            entries: 0,
            inline_first,
            awaiting_value: false,
        });

        Ok(())
    }

    /// Claims the slot for a value token, writing any `-` it needs.
    fn begin_value(&mut self, token: Token) -> Result<Slot, WriteError> {
        self.open_pending()?;

        let slot = match self.frames.last_mut() {
            None if self.done => return Err(self.invalid(token)),
            None => Slot::Top,
            Some(f) if f.kind == Token::ObjectStart => {
                if !f.awaiting_value {
                    return Err(self.invalid(token));
                }
                f.awaiting_value = false;
                Slot::Value(f.indent)
            }
            Some(f) => {
                let indent = f.indent;
                self.new_entry()?;
                self.writer.write_char('-')?;
                Slot::Item(indent)
            }
        };

        Ok(slot)
    }

    fn after_value(&mut self) {
        if self.frames.is_empty() && self.pending.is_none() {
            self.done = true;
        }
    }

    fn write_scalar(&mut self, slot: Slot, repr: &str) -> fmt::Result {
        if !matches!(slot, Slot::Top) {
            self.writer.write_char(' ')?;
        }
        self.writer.write_str(repr)
    }

    fn write_str(&mut self, slot: Slot, s: &str, key: bool) -> fmt::Result {
        if is_plain_safe(s, key) {
            return self.write_scalar(slot, s);
        }

        if !matches!(slot, Slot::Top) {
            self.writer.write_char(' ')?;
        }
        write_quoted(&mut self.writer, s)
    }
}

/// Returns true if `s` reads back as the same string when written plain.
fn is_plain_safe(s: &str, key: bool) -> bool {
    let Some(first) = s.chars().next() else {
        return false;
    };

    if scalar::classify_plain(s) != Token::String {
        return false;
    }
    if ["y", "yes", "n", "no", "on", "off"]
        .iter()
        .any(|w| s.eq_ignore_ascii_case(w))
    {
        return false;
    }
    if first.is_whitespace()
        || matches!(
            first,
            '-' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>'
                | '\'' | '"' | '%' | '@' | '`'
        )
    {
        return false;
    }
    if s.ends_with(|c: char| c.is_whitespace()) || s.starts_with("...") || s == "<<" {
        return false;
    }
    if s.contains(": ") || s.contains(" #") || s.ends_with(':') || (key && s.contains(':')) {
        return false;
    }

    !s.chars()
        .any(|c| c.is_control() || matches!(c, ',' | '[' | ']' | '{' | '}'))
}

fn write_quoted(w: &mut impl fmt::Write, s: &str) -> fmt::Result {
    w.write_char('"')?;

    for c in s.chars() {
        match c {
            '"' => w.write_str("\\\"")?,
            '\\' => w.write_str("\\\\")?,
            '\0' => w.write_str("\\0")?,
            '\x07' => w.write_str("\\a")?,
            '\x08' => w.write_str("\\b")?,
            '\t' => w.write_str("\\t")?,
            '\n' => w.write_str("\\n")?,
            '\r' => w.write_str("\\r")?,
            '\x1B' => w.write_str("\\e")?,
            c if c.is_control() && (c as u32) < 0x100 => write!(w, "\\x{:02X}", c as u32)?,
            '\u{2028}' | '\u{2029}' => write!(w, "\\u{:04X}", c as u32)?,
            c => w.write_char(c)?,
        }
    }

    w.write_char('"')
}

impl<W: fmt::Write> TokenSink for YamlSink<W> {
    fn yield_token(&mut self, token: Token) -> Result<(), WriteError> {
        if token.is_end() {
            if let Some((start, slot)) = self.pending {
                if start.closing() != Some(token) {
                    return Err(self.invalid(token));
                }
                self.pending = None;
                let repr = if token == Token::ObjectEnd { "{}" } else { "[]" };
                self.write_scalar(slot, repr)?;
                self.after_value();
                return Ok(());
            }

            match self.frames.last() {
                Some(f) if f.kind.closing() == Some(token) && !f.awaiting_value => {
                    self.frames.pop();
                }
                _ => return Err(self.invalid(token)),
            }
            self.after_value();
            return Ok(());
        }

        match token {
            Token::ObjectStart | Token::ArrayStart => {
                let slot = self.begin_value(token)?;
                self.pending = Some((token, slot));
            }
            Token::Null => {
                let slot = self.begin_value(token)?;
                self.write_scalar(slot, "null")?;
                self.after_value();
            }
            _ => return Err(self.invalid(token)),
        }

        Ok(())
    }

    fn yield_scalar(&mut self, token: Token, text: &str) -> Result<(), WriteError> {
        if token == Token::PropertyKey {
            self.open_pending()?;
            match self.frames.last_mut() {
                Some(f) if f.kind == Token::ObjectStart && !f.awaiting_value => {
                    f.awaiting_value = true;
                }
                _ => return Err(self.invalid(token)),
            }
            self.new_entry()?;
            self.write_str(Slot::Top, text, true)?;
            self.writer.write_char(':')?;
            return Ok(());
        }

        if !matches!(token, Token::String | Token::Number | Token::Boolean) {
            return Err(WriteError::invalid_token(
                token,
                [Token::String, Token::PropertyKey, Token::Number, Token::Boolean]
                    .into_iter()
                    .collect(),
            ));
        }

        let slot = self.begin_value(token)?;
        match token {
            Token::String => self.write_str(slot, text, false)?,
            _ => self.write_scalar(slot, text)?,
        }
        self.after_value();

        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        if self.done {
            Ok(())
        } else {
            Err(self.invalid(Token::EndOfInput))
        }
    }
}
