use std::collections::HashMap;
use std::sync::Arc;

use super::include::IncludeResolver;
use crate::error::{Position, ReadError, ReadErrorKind};
use crate::lex::{LexState, Tokenizer};
use crate::scalar;
use crate::source::{CharSource, Cursor, StrSource};
use crate::token::{Token, TokenTypes};

const MAX_INCLUDE_DEPTH: usize = 16;

/// The current line of input, with random access to its characters.
struct Lines<S: CharSource> {
    src: S,
    chars: Vec<char>,
    col: usize,
    line: usize,
    offset: usize,
    next_offset: usize,
    has_break: bool,
    started: bool,
    done: bool,
}

impl<S: CharSource> Lines<S> {
    fn new(src: S) -> Self {
        Self {
            src,
            chars: Vec::new(),
            col: 0,
            line: 0,
            offset: 0,
            next_offset: 0,
            has_break: false,
            started: false,
            done: false,
        }
    }

    /// Loads the next line. Returns false once the input is exhausted.
    fn advance(&mut self) -> Result<bool, ReadError> {
        self.chars.clear();
        self.col = 0;
        if self.done {
            return Ok(false);
        }
        if self.started {
            self.line += 1;
        }
        self.offset = self.next_offset;
        self.has_break = false;

        let mut count = 0;
        loop {
            match self.src.current()? {
                None => {
                    self.done = true;
                    if count == 0 {
                        return Ok(false);
                    }
                    break;
                }
                Some('\n') => {
                    self.src.next()?;
                    count += 1;
                    self.has_break = true;
                    break;
                }
                Some('\r') => {
                    self.src.next()?;
                    count += 1;
                    if self.src.current()? == Some('\n') {
                        self.src.next()?;
                        count += 1;
                    }
                    self.has_break = true;
                    break;
                }
                Some('\u{feff}') if !self.started && count == 0 => {
                    self.src.next()?;
                    self.offset += 1;
                }
                Some(c) => {
                    self.src.next()?;
                    self.chars.push(c);
                    count += 1;
                }
            }
        }

        self.started = true;
        self.next_offset = self.offset + count;
        Ok(true)
    }

    fn cur(&self) -> Option<char> {
        self.chars.get(self.col).copied()
    }

    fn peek(&self, n: usize) -> Option<char> {
        self.chars.get(self.col + n).copied()
    }

    fn prev(&self) -> Option<char> {
        self.col.checked_sub(1).and_then(|i| self.chars.get(i).copied())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.cur();
        if c.is_some() {
            self.col += 1;
        }
        c
    }

    fn skip_blanks(&mut self) {
        while let Some(' ' | '\t') = self.cur() {
            self.col += 1;
        }
    }

    /// The number of leading spaces.
    fn indent(&self) -> usize {
        self.chars.iter().take_while(|c| **c == ' ').count()
    }

    /// True for a `---` or `...` marker at the start of the line.
    fn is_marker(&self, c: char) -> bool {
        self.chars.len() >= 3
            && self.chars[..3].iter().all(|x| *x == c)
            && matches!(self.chars.get(3), None | Some(' ' | '\t'))
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.col,
            offset: self.offset + self.col,
        }
    }
}

fn is_blank_or_end(c: Option<char>) -> bool {
    matches!(c, None | Some(' ' | '\t'))
}

fn is_flow_indicator(c: char) -> bool {
    matches!(c, ',' | '[' | ']' | '{' | '}')
}

fn is_value_start(token: Token) -> bool {
    matches!(
        token,
        Token::Null
            | Token::Number
            | Token::Boolean
            | Token::String
            | Token::ObjectStart
            | Token::ArrayStart
    )
}

fn trim_blanks_end(s: &mut String) {
    let len = s.trim_end_matches(|c: char| c == ' ' || c == '\t').len();
    s.truncate(len);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Tag {
    Str,
    Int,
    Float,
    Bool,
    Null,
    Map,
    Seq,
    Include,
}

impl Tag {
    fn parse(name: &str) -> Option<Tag> {
        let short = name.strip_prefix("!!").or_else(|| name.strip_prefix('!'))?;
        Some(match short {
            "" | "str" => Tag::Str,
            "int" => Tag::Int,
            "float" => Tag::Float,
            "bool" => Tag::Bool,
            "null" => Tag::Null,
            "map" => Tag::Map,
            "seq" => Tag::Seq,
            "include" => Tag::Include,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Stop {
    Eol,
    Colon,
    Comment,
    Flow,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Chomp {
    Clip,
    Strip,
    Keep,
}

/// Tokens seen since an anchor, until the anchored value is complete.
struct Recording {
    name: String,
    depth: usize,
    tokens: Vec<(Token, Option<String>)>,
}

/// Tokenizes a YAML document.
///
/// The supported subset covers block and flow collections, plain,
/// quoted and block scalars, comments, anchors and aliases, document
/// markers and a fixed set of tags:
///
/// | Tag | Effect |
/// |-----|--------|
/// | `!str` `!int` `!float` `!bool` `!null` | Forces the token of the following scalar. |
/// | `!map` `!seq` | An absent value becomes an empty mapping or sequence. |
/// | `!include` | Replaces the scalar with the document it names. |
///
/// The `!!` forms are accepted as well. Other tags are ignored.
///
/// Aliases replay the tokens recorded for their anchor, so the reader
/// never sees them. A second document is delivered as ordinary tokens
/// and rejected by the reader as trailing content.
pub struct YamlTokenizer<S: CharSource> {
    lines: Lines<S>,
    start: Position,
    /// Open collections with their columns, parallel to the lex stack.
    frames: Vec<(Token, usize)>,
    flow: usize,
    need_line: bool,
    line_fresh: bool,
    expecting_value: bool,
    emitted_any: bool,
    finished: bool,
    last_key_line: Option<usize>,
    /// Set when a line dedents to a column between two open
    /// collections: the line continues the innermost one, at its column.
    continued: Option<usize>,
    tag: Option<Tag>,
    anchor: Option<String>,
    anchors: HashMap<String, Vec<(Token, Option<String>)>>,
    recordings: Vec<Recording>,
    include: Option<Arc<dyn IncludeResolver>>,
    include_depth: usize,
}

impl<'a> YamlTokenizer<StrSource<'a>> {
    pub fn from_str(s: &'a str) -> Self {
        Self::new(Cursor::from_str(s))
    }
}

impl<S: CharSource> YamlTokenizer<S> {
    pub fn new(src: S) -> Self {
        Self {
            lines: Lines::new(src),
            start: Position::default(),
            frames: Vec::new(),
            flow: 0,
            need_line: true,
            line_fresh: false,
            expecting_value: false,
            emitted_any: false,
            finished: false,
            last_key_line: None,
            continued: None,
            tag: None,
            anchor: None,
            anchors: HashMap::new(),
            recordings: Vec::new(),
            include: None,
            include_depth: 0,
        }
    }

    /// Enables `!include` tags.
    pub fn with_include_resolver(mut self, resolver: Arc<dyn IncludeResolver>) -> Self {
        self.include = Some(resolver);
        self
    }

    fn error(&self, kind: ReadErrorKind) -> ReadError {
        ReadError::at(kind, self.lines.position())
    }

    fn syntax(&self, msg: impl Into<String>) -> ReadError {
        self.error(ReadErrorKind::InvalidSyntax(msg.into()))
    }

    fn include_error(&self, name: &str, reason: String) -> ReadError {
        ReadError::at(
            ReadErrorKind::Include {
                name: name.to_owned(),
                reason,
            },
            self.start,
        )
    }

    /// Feeds a dequeued token to the anchors being recorded.
    fn record(&mut self, token: Token, text: &Option<String>) {
        if matches!(token, Token::Skip | Token::EndOfInput) {
            return;
        }

        if is_value_start(token) {
            if let Some(name) = self.anchor.take() {
                self.recordings.push(Recording {
                    name,
                    depth: 0,
                    tokens: Vec::new(),
                });
            }
        }

        for rec in self.recordings.iter_mut() {
            rec.tokens.push((token, text.clone()));
            if token.is_start() {
                rec.depth += 1;
            } else if token.is_end() {
                rec.depth = rec.depth.saturating_sub(1);
            }
        }

        while let Some(i) = self.recordings.iter().position(|r| r.depth == 0) {
            let rec = self.recordings.remove(i);
            log::trace!("anchor `{}` holds {} tokens", rec.name, rec.tokens.len());
            self.anchors.insert(rec.name, rec.tokens);
        }
    }

    fn scan(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        if self.finished {
            lex.enqueue(Token::EndOfInput, None);
            return Ok(());
        }

        if self.need_line {
            if !self.lines.advance()? {
                return self.finish(lex);
            }
            self.need_line = false;
            self.line_fresh = true;
        }

        if self.line_fresh {
            self.line_fresh = false;
            if self.flow == 0 {
                return self.start_line(lex);
            }
        }

        self.lines.skip_blanks();
        self.start = self.lines.position();

        let Some(c) = self.lines.cur() else {
            self.need_line = true;
            return Ok(());
        };
        let next = self.lines.peek(1);

        match c {
            '#' => {
                self.lines.col = self.lines.chars.len();
                lex.enqueue(Token::Skip, None);
                Ok(())
            }
            '-' if self.flow == 0 && is_blank_or_end(next) => self.seq_entry(lex),
            '?' if is_blank_or_end(next) => {
                // Explicit keys are accepted, but the key itself is read as a plain value.
                self.lines.col += 1;
                lex.enqueue(Token::Skip, None);
                Ok(())
            }
            ':' if is_blank_or_end(next) || self.flow > 0 => {
                Err(self.syntax("`:` without a preceding key"))
            }
            '[' | '{' => self.open_flow(lex, c),
            ']' | '}' => self.close_flow(lex, c),
            ',' if self.flow > 0 => self.flow_separator(lex),
            '&' => self.anchor(lex),
            '*' => self.alias(lex),
            '!' => self.tag(lex),
            '|' | '>' if self.flow == 0 => self.block_scalar(lex, c == '>'),
            '"' | '\'' => {
                let col = self.lines.col;
                let line = self.lines.line;
                let text = if c == '"' {
                    self.double_quoted()?
                } else {
                    self.single_quoted()?
                };
                self.after_scalar(lex, text, false, col, line)
            }
            _ => self.plain(lex),
        }
    }

    /// Handles the indentation of a new line in block context.
    fn start_line(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        self.continued = None;
        let indent = self.lines.indent();
        self.lines.col = indent;
        self.lines.skip_blanks();

        match self.lines.cur() {
            None | Some('#') => {
                self.need_line = true;
                return Ok(());
            }
            Some(_) if self.lines.col != indent => {
                return Err(self.syntax("tabs are not allowed in indentation"));
            }
            Some(_) => {}
        }

        self.start = self.lines.position();

        if indent == 0 {
            if self.lines.cur() == Some('%') {
                self.need_line = true;
                return Ok(());
            }
            if self.lines.is_marker('-') {
                if self.emitted_any {
                    self.close_all(lex)?;
                }
                self.lines.col = 3;
                return Ok(());
            }
            if self.lines.is_marker('.') {
                self.close_all(lex)?;
                self.lines.col = 3;
                return Ok(());
            }
        }

        let dash = self.lines.cur() == Some('-') && is_blank_or_end(self.lines.peek(1));

        if self.expecting_value {
            let value_follows = match self.frames.last() {
                None => true,
                Some(&(token, col)) => {
                    indent > col || (indent == col && dash && token == Token::ObjectStart)
                }
            };
            if value_follows {
                return Ok(());
            }
            self.missing_value(lex)?;
        }

        while let Some(&(token, col)) = self.frames.last() {
            if col > indent {
                // Nothing open at or left of the new column: close nothing further.
                let parent = self.frames.iter().rev().nth(1);
                if parent.map_or(true, |&(_, c)| c < indent) {
                    self.continued = Some(col);
                    break;
                }
                self.close_frame(lex)?;
            } else if col == indent && token == Token::ArrayStart && !dash {
                self.close_frame(lex)?;
            } else {
                break;
            }
        }

        Ok(())
    }

    fn value_started(&mut self) {
        self.expecting_value = false;
        self.emitted_any = true;
        self.tag = None;
    }

    /// Produces the value of a key or entry that has none.
    fn missing_value(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        let tag = self.tag;
        self.value_started();

        match tag {
            Some(Tag::Map) => {
                lex.enqueue(Token::ObjectStart, None);
                lex.enqueue(Token::ObjectEnd, None);
            }
            Some(Tag::Seq) => {
                lex.enqueue(Token::ArrayStart, None);
                lex.enqueue(Token::ArrayEnd, None);
            }
            Some(Tag::Include) => {
                return Err(self.syntax("`!include` needs a document name"));
            }
            _ => lex.enqueue(Token::Null, None),
        }

        Ok(())
    }

    fn open(&mut self, lex: &mut LexState, token: Token, col: usize) {
        self.value_started();
        lex.push(token);
        self.frames.push((token, col));
        lex.enqueue(token, None);
    }

    fn close_frame(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        let Some(end) = self.frames.pop().and_then(|(token, _)| token.closing()) else {
            return Ok(());
        };

        lex.pop(end).map_err(|kind| self.error(kind))?;
        lex.enqueue(end, None);
        Ok(())
    }

    fn close_all(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        if self.expecting_value {
            self.missing_value(lex)?;
        }
        while !self.frames.is_empty() {
            self.close_frame(lex)?;
        }
        self.last_key_line = None;

        Ok(())
    }

    fn finish(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        if self.flow > 0 {
            lex.check_closed().map_err(|kind| self.error(kind))?;
        }

        self.close_all(lex)?;
        if !self.emitted_any {
            self.missing_value(lex)?;
        }
        self.finished = true;
        lex.enqueue(Token::EndOfInput, None);

        Ok(())
    }

    fn seq_entry(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        let col = self.continued.take().unwrap_or(self.lines.col);

        match self.frames.last() {
            Some(&(Token::ArrayStart, c)) if c == col => {
                if self.expecting_value {
                    self.missing_value(lex)?;
                }
            }
            _ => self.open(lex, Token::ArrayStart, col),
        }

        self.lines.col += 1;
        self.expecting_value = true;
        Ok(())
    }

    fn key(&mut self, lex: &mut LexState, text: String, col: usize) -> Result<(), ReadError> {
        self.tag = None;

        if self.flow > 0 {
            if lex.innermost() != Some(Token::ObjectStart) {
                return Err(self.syntax("mappings inside flow sequences are not supported"));
            }
            lex.enqueue(Token::PropertyKey, Some(text));
            self.expecting_value = true;
            return Ok(());
        }

        let line = self.lines.line;
        let col = self.continued.take().unwrap_or(col);
        match self.frames.last() {
            Some(&(Token::ObjectStart, c)) if c == col => {
                if self.expecting_value {
                    self.missing_value(lex)?;
                }
            }
            _ => {
                if self.last_key_line == Some(line) {
                    return Err(self.syntax("a mapping cannot start on the line of another key"));
                }
                self.open(lex, Token::ObjectStart, col);
            }
        }

        self.last_key_line = Some(line);
        lex.enqueue(Token::PropertyKey, Some(text));
        self.expecting_value = true;
        Ok(())
    }

    /// Emits a scalar value, applying any pending tag.
    fn scalar(&mut self, lex: &mut LexState, text: String, plain: bool) -> Result<(), ReadError> {
        let tag = self.tag.take();

        let token = match tag {
            Some(Tag::Include) => return self.include(lex, &text),
            Some(Tag::Str) => Token::String,
            Some(Tag::Int | Tag::Float) => {
                if scalar::parse_number(&text).is_none() {
                    return Err(ReadError::at(ReadErrorKind::InvalidNumber(text), self.start));
                }
                Token::Number
            }
            Some(Tag::Bool) => {
                if scalar::parse_bool(&text).is_none() {
                    return Err(ReadError::at(
                        ReadErrorKind::InvalidSyntax(format!("`{}` is not a boolean", text)),
                        self.start,
                    ));
                }
                Token::Boolean
            }
            Some(Tag::Null) => Token::Null,
            Some(Tag::Map | Tag::Seq) if plain && scalar::is_null(&text) => {
                self.tag = tag;
                return self.missing_value(lex);
            }
            Some(Tag::Map | Tag::Seq) => {
                return Err(self.syntax("`!map` and `!seq` cannot tag a scalar"));
            }
            None if plain => scalar::classify_plain(&text),
            None => Token::String,
        };

        self.value_started();
        let text = if token == Token::Null { None } else { Some(text) };
        lex.enqueue(token, text);

        Ok(())
    }

    /// Decides whether a scalar just read is a key or a value.
    fn after_scalar(
        &mut self,
        lex: &mut LexState,
        text: String,
        plain: bool,
        col: usize,
        line: usize,
    ) -> Result<(), ReadError> {
        self.lines.skip_blanks();

        let next = self.lines.peek(1);
        let is_key = self.lines.cur() == Some(':')
            && (is_blank_or_end(next)
                || (self.flow > 0 && (!plain || next.is_some_and(is_flow_indicator))));

        if is_key {
            if line != self.lines.line {
                return Err(self.syntax("keys must fit on one line"));
            }
            self.lines.col += 1;
            return self.key(lex, text, col);
        }

        if self.flow > 0 && lex.innermost() == Some(Token::ObjectStart) && !self.expecting_value {
            self.key(lex, text, col)?;
            return self.missing_value(lex);
        }

        self.scalar(lex, text, plain)
    }

    fn plain(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        let col = self.lines.col;
        let line = self.lines.line;
        let (mut text, mut stop) = self.plain_line();
        let mut multiline = false;
        let mut ended = false;

        while stop == Stop::Eol {
            match self.plain_continuation()? {
                Some(sep) => {
                    text.push_str(&sep);
                    let (more, s) = self.plain_line();
                    text.push_str(&more);
                    stop = s;
                    multiline = true;
                }
                None => {
                    ended = true;
                    break;
                }
            }
        }

        if multiline && stop == Stop::Colon {
            return Err(self.syntax("keys must fit on one line"));
        }
        if ended && self.flow == 0 {
            return self.scalar(lex, text, true);
        }

        self.after_scalar(lex, text, true, col, line)
    }

    /// Reads the part of a plain scalar on the current line.
    fn plain_line(&mut self) -> (String, Stop) {
        let mut s = String::new();
        if let Some(c) = self.lines.bump() {
            s.push(c);
        }

        let stop = loop {
            let Some(c) = self.lines.cur() else {
                break Stop::Eol;
            };
            let next = self.lines.peek(1);

            match c {
                ':' if is_blank_or_end(next)
                    || (self.flow > 0 && next.is_some_and(is_flow_indicator)) =>
                {
                    break Stop::Colon
                }
                '#' if matches!(self.lines.prev(), Some(' ' | '\t')) => break Stop::Comment,
                c if self.flow > 0 && is_flow_indicator(c) => break Stop::Flow,
                c => {
                    s.push(c);
                    self.lines.col += 1;
                }
            }
        };

        trim_blanks_end(&mut s);
        (s, stop)
    }

    /// Looks for a continuation line of a plain scalar. Returns the
    /// folded line break when one is found.
    fn plain_continuation(&mut self) -> Result<Option<String>, ReadError> {
        let parent = self.frames.last().map(|&(_, c)| c);
        let mut breaks = 0;

        loop {
            if !self.lines.advance()? {
                self.need_line = true;
                return Ok(None);
            }

            let indent = self.lines.indent();
            self.lines.col = indent;
            self.lines.skip_blanks();

            let Some(c) = self.lines.cur() else {
                breaks += 1;
                continue;
            };

            let continues = if self.flow > 0 {
                !is_flow_indicator(c) && c != '#' && c != ':'
            } else {
                c != '#'
                    && parent.map_or(true, |p| indent > p)
                    && !self.lines.is_marker('-')
                    && !self.lines.is_marker('.')
            };

            if !continues {
                if self.flow == 0 {
                    self.lines.col = 0;
                    self.line_fresh = true;
                }
                return Ok(None);
            }

            return Ok(Some(if breaks == 0 {
                " ".to_owned()
            } else {
                "\n".repeat(breaks)
            }));
        }
    }

    /// Moves to the next line inside a quoted scalar.
    fn quoted_line(&mut self, start: Position) -> Result<(), ReadError> {
        if self.lines.advance()? {
            Ok(())
        } else {
            Err(ReadError::at(ReadErrorKind::UnclosedQuote, start))
        }
    }

    /// Folds a line break inside a quoted scalar.
    fn fold_quoted(&mut self, s: &mut String, start: Position) -> Result<(), ReadError> {
        trim_blanks_end(s);

        let mut breaks = 0;
        loop {
            self.quoted_line(start)?;
            self.lines.skip_blanks();
            if self.lines.cur().is_some() {
                break;
            }
            breaks += 1;
        }

        if breaks == 0 {
            s.push(' ');
        } else {
            s.push_str(&"\n".repeat(breaks));
        }

        Ok(())
    }

    fn double_quoted(&mut self) -> Result<String, ReadError> {
        let start = self.lines.position();
        let mut s = String::new();
        self.lines.col += 1;

        loop {
            match self.lines.bump() {
                Some('"') => return Ok(s),
                Some('\\') => match self.lines.bump() {
                    None => {
                        self.quoted_line(start)?;
                        self.lines.skip_blanks();
                    }
                    Some(c) => s.push(self.escape(c)?),
                },
                Some(c) => s.push(c),
                None => self.fold_quoted(&mut s, start)?,
            }
        }
    }

    fn escape(&mut self, c: char) -> Result<char, ReadError> {
        Ok(match c {
            '0' => '\0',
            'a' => '\x07',
            'b' => '\x08',
            't' | '\t' => '\t',
            'n' => '\n',
            'v' => '\x0B',
            'f' => '\x0C',
            'r' => '\r',
            'e' => '\x1B',
            ' ' | '"' | '/' | '\\' => c,
            'N' => '\u{85}',
            '_' => '\u{a0}',
            'L' => '\u{2028}',
            'P' => '\u{2029}',
            'x' => self.hex(c, 2)?,
            'u' => self.hex(c, 4)?,
            'U' => self.hex(c, 8)?,
            c => return Err(self.error(ReadErrorKind::InvalidEscape(c))),
        })
    }

    fn hex(&mut self, escape: char, digits: usize) -> Result<char, ReadError> {
        let mut v: u32 = 0;

        for _ in 0..digits {
            let d = self
                .lines
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error(ReadErrorKind::InvalidEscape(escape)))?;
            v = v.wrapping_mul(16).wrapping_add(d);
        }

        char::from_u32(v).ok_or_else(|| self.error(ReadErrorKind::InvalidEscape(escape)))
    }

    fn single_quoted(&mut self) -> Result<String, ReadError> {
        let start = self.lines.position();
        let mut s = String::new();
        self.lines.col += 1;

        loop {
            match self.lines.bump() {
                Some('\'') if self.lines.cur() == Some('\'') => {
                    self.lines.col += 1;
                    s.push('\'');
                }
                Some('\'') => return Ok(s),
                Some(c) => s.push(c),
                None => self.fold_quoted(&mut s, start)?,
            }
        }
    }

    fn block_scalar(&mut self, lex: &mut LexState, folded: bool) -> Result<(), ReadError> {
        self.lines.col += 1;

        let mut chomp = Chomp::Clip;
        let mut explicit = None;
        for _ in 0..2 {
            match self.lines.cur() {
                Some('+') => chomp = Chomp::Keep,
                Some('-') => chomp = Chomp::Strip,
                Some(c @ '1'..='9') => explicit = c.to_digit(10).map(|d| d as usize),
                _ => break,
            }
            self.lines.col += 1;
        }

        self.lines.skip_blanks();
        if let Some(c) = self.lines.cur().filter(|c| *c != '#') {
            return Err(self.syntax(format!("unexpected {:?} after a block scalar indicator", c)));
        }

        let parent = self.frames.last().map(|&(_, c)| c);
        let mut indent = explicit.map(|d| parent.unwrap_or(0) + d);
        let mut lines: Vec<String> = Vec::new();
        let mut last_break = true;

        loop {
            if !self.lines.advance()? {
                self.need_line = true;
                break;
            }

            let n = self.lines.indent();
            if self.lines.chars[n..].iter().all(|c| *c == ' ' || *c == '\t') {
                lines.push(String::new());
                continue;
            }
            if n == 0 && (self.lines.is_marker('-') || self.lines.is_marker('.')) {
                self.line_fresh = true;
                break;
            }

            let want = match indent {
                Some(want) => want,
                None => {
                    if parent.is_some_and(|p| n <= p) {
                        self.line_fresh = true;
                        break;
                    }
                    indent = Some(n);
                    n
                }
            };
            if n < want {
                self.line_fresh = true;
                break;
            }

            lines.push(self.lines.chars[want..].iter().collect());
            last_break = self.lines.has_break;
        }

        let end = lines.iter().rposition(|l| !l.is_empty());
        let (content, trailing) = match end {
            Some(i) => (&lines[..=i], lines.len() - i - 1),
            None => (&lines[..0], lines.len()),
        };

        let indented = |l: &str| l.starts_with(|c: char| c == ' ' || c == '\t');
        let mut text = String::new();
        let mut blanks = 0;
        let mut prev: Option<&str> = None;

        for line in content.iter().map(String::as_str) {
            if line.is_empty() {
                blanks += 1;
                continue;
            }

            match prev {
                Some(p) if folded && !indented(p) && !indented(line) => {
                    if blanks == 0 {
                        text.push(' ');
                    } else {
                        text.push_str(&"\n".repeat(blanks));
                    }
                }
                Some(_) => text.push_str(&"\n".repeat(blanks + 1)),
                None => text.push_str(&"\n".repeat(blanks)),
            }

            text.push_str(line);
            prev = Some(line);
            blanks = 0;
        }

        let final_break = !content.is_empty() && (last_break || trailing > 0);
        match chomp {
            Chomp::Strip => {}
            Chomp::Clip => {
                if final_break {
                    text.push('\n');
                }
            }
            Chomp::Keep => {
                if final_break {
                    text.push('\n');
                }
                text.push_str(&"\n".repeat(trailing));
            }
        }

        self.scalar(lex, text, false)
    }

    fn open_flow(&mut self, lex: &mut LexState, c: char) -> Result<(), ReadError> {
        if self.flow > 0 && lex.innermost() == Some(Token::ObjectStart) && !self.expecting_value {
            return Err(self.syntax("collections are not supported as keys"));
        }

        let token = if c == '[' {
            Token::ArrayStart
        } else {
            Token::ObjectStart
        };
        let col = self.lines.col;
        self.lines.col += 1;
        self.open(lex, token, col);
        self.flow += 1;

        Ok(())
    }

    fn close_flow(&mut self, lex: &mut LexState, c: char) -> Result<(), ReadError> {
        let end = if c == ']' {
            Token::ArrayEnd
        } else {
            Token::ObjectEnd
        };

        if self.flow == 0 {
            return Err(self.error(ReadErrorKind::UnbalancedStructure {
                expected: TokenTypes::VALUE,
                found: end,
            }));
        }
        if self.expecting_value && lex.innermost() == Some(Token::ObjectStart) {
            self.missing_value(lex)?;
        }

        lex.pop(end).map_err(|kind| self.error(kind))?;
        self.frames.pop();
        self.flow -= 1;
        self.lines.col += 1;
        self.expecting_value = false;
        lex.enqueue(end, None);

        Ok(())
    }

    fn flow_separator(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        if self.expecting_value && lex.innermost() == Some(Token::ObjectStart) {
            self.missing_value(lex)?;
        }
        self.lines.col += 1;
        lex.enqueue(Token::Skip, None);

        Ok(())
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();

        while let Some(c) = self.lines.cur() {
            if c == ' ' || c == '\t' || is_flow_indicator(c) {
                break;
            }
            name.push(c);
            self.lines.col += 1;
        }

        name
    }

    fn anchor(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        self.lines.col += 1;
        let name = self.read_name();
        if name.is_empty() {
            return Err(self.syntax("anchor without a name"));
        }

        self.anchor = Some(name);
        lex.enqueue(Token::Skip, None);
        Ok(())
    }

    fn alias(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        let start = self.lines.position();
        self.lines.col += 1;
        let name = self.read_name();

        let recording = self.recordings.iter().any(|r| r.name == name);
        let tokens = match self.anchors.get(&name) {
            Some(tokens) if !recording => tokens.clone(),
            _ => return Err(ReadError::at(ReadErrorKind::UnresolvedAlias(name), start)),
        };

        log::trace!("replaying anchor `{}`", name);
        self.value_started();
        for (token, text) in tokens {
            lex.enqueue(token, text);
        }

        Ok(())
    }

    fn tag(&mut self, lex: &mut LexState) -> Result<(), ReadError> {
        let name = self.read_name();

        match Tag::parse(&name) {
            Some(tag) => self.tag = Some(tag),
            None => log::debug!("ignoring unsupported tag `{}`", name),
        }

        lex.enqueue(Token::Skip, None);
        Ok(())
    }

    /// Replaces an `!include` scalar with the tokens of the named document.
    fn include(&mut self, lex: &mut LexState, name: &str) -> Result<(), ReadError> {
        let Some(resolver) = self.include.clone() else {
            return Err(self.include_error(name, "no include resolver is configured".to_owned()));
        };
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(self.include_error(name, "includes are nested too deeply".to_owned()));
        }

        let content = resolver
            .resolve(name)
            .map_err(|err| self.include_error(name, err.to_string()))?;
        log::debug!("including `{}` ({} bytes)", name, content.len());

        let mut inner = YamlTokenizer::new(Cursor::from_str(&content));
        inner.include = Some(resolver);
        inner.include_depth = self.include_depth + 1;

        let mut inner_lex = LexState::new();
        let mut depth = 0usize;
        let mut complete = false;
        self.value_started();

        loop {
            let token = inner
                .next_token(&mut inner_lex)
                .map_err(|err| self.include_error(name, err.to_string()))?;
            let text = inner_lex.take_text();

            match token {
                Token::Skip => continue,
                Token::EndOfInput => return Ok(()),
                _ if complete => {
                    return Err(self.include_error(name, format!("trailing {}", token)));
                }
                _ => {}
            }

            if token.is_start() {
                depth += 1;
            } else if token.is_end() {
                depth = depth.saturating_sub(1);
            }
            complete = depth == 0;
            lex.enqueue(token, text);
        }
    }
}

impl<S: CharSource> Tokenizer for YamlTokenizer<S> {
    fn next_token(&mut self, lex: &mut LexState) -> Result<Token, ReadError> {
        loop {
            if let Some(token) = lex.dequeue() {
                let text = lex.take_text();
                self.record(token, &text);
                if let Some(text) = text {
                    lex.set_text(text);
                }
                return Ok(token);
            }

            self.scan(lex)?;
        }
    }

    fn position(&self) -> Position {
        self.start
    }
}
