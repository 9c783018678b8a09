//! Character sources with single-character lookahead and pushback.

use std::io;
use std::str::Chars;

use crate::error::Position;

/// A stream of characters as seen by a tokenizer.
///
/// The source has a cursor on the current character. [Self::next]
/// moves the cursor forward, and [Self::stash_current] moves it back
/// one position. Only one position of pushback is guaranteed.
pub trait CharSource {
    /// Returns the character under the cursor, or `None` at the end
    /// of input.
    fn current(&mut self) -> io::Result<Option<char>>;

    /// Moves past the current character and returns the new current
    /// character.
    fn next(&mut self) -> io::Result<Option<char>>;

    /// Moves the cursor back to the previous character.
    fn stash_current(&mut self);

    /// The position of the current character.
    fn position(&self) -> Position;

    /// Consumes and returns the current character.
    fn bump(&mut self) -> io::Result<Option<char>> {
        let c = self.current()?;
        if c.is_some() {
            self.next()?;
        }
        Ok(c)
    }

    /// Consumes the current character if it is `c`.
    fn eat(&mut self, c: char) -> io::Result<bool> {
        if self.current()? == Some(c) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Reads single characters from some underlying storage.
pub trait CharRead {
    fn read_char(&mut self) -> io::Result<Option<char>>;
}

/// Reads characters from a string slice.
pub struct StrRead<'a>(Chars<'a>);

impl<'a> StrRead<'a> {
    pub fn new(s: &'a str) -> Self {
        Self(s.chars())
    }
}

impl CharRead for StrRead<'_> {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        Ok(self.0.next())
    }
}

/// Reads UTF-8 characters from a byte stream.
///
/// Short reads are retried until a whole character is available.
/// [Interrupted](io::ErrorKind::Interrupted) and
/// [WouldBlock](io::ErrorKind::WouldBlock) are treated as transient,
/// and only a zero-length read marks the end of input.
pub struct Utf8Read<R: io::Read> {
    r: R,
}

impl<R: io::Read> Utf8Read<R> {
    pub fn new(r: R) -> Self {
        Self { r }
    }

    /// Fills `buf` completely. Returns false if the stream ended
    /// before the first byte.
    fn read_full(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        let mut n = 0;

        while n < buf.len() {
            match self.r.read(&mut buf[n..]) {
                Ok(0) if n == 0 => return Ok(false),
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
                Ok(m) => n += m,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => std::thread::yield_now(),
                Err(err) => return Err(err),
            }
        }

        Ok(true)
    }
}

impl<R: io::Read> CharRead for Utf8Read<R> {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        let mut buf: [u8; 4] = [0; 4];

        if !self.read_full(&mut buf[..1])? {
            return Ok(None);
        }

        if buf[0] < 0x80 {
            return Ok(Some(buf[0] as char));
        }

        let (mut c, n) = if buf[0] < 0xE0 {
            if buf[0] < 0xC0 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "bad UTF-8"));
            }

            ((buf[0] & 0x1F) as u32, 1)
        } else if buf[0] < 0xF0 {
            ((buf[0] & 0x0F) as u32, 2)
        } else if buf[0] < 0xF8 {
            ((buf[0] & 0x07) as u32, 3)
        } else {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad UTF-8"));
        };

        if !self.read_full(&mut buf[..n])? {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }

        for b in &buf[..n] {
            if b & 0xC0 != 0x80 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "bad UTF-8"));
            }

            c <<= 6;
            c |= (b & 0x3F) as u32;
        }

        char::from_u32(c)
            .map(Some)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad UTF-8"))
    }
}

/// A [CharSource] over any [CharRead], tracking the position.
pub struct Cursor<C: CharRead> {
    r: C,
    current: Option<char>,
    loaded: bool,
    pos: Position,
    prev: Option<(char, Position)>,
    pending: Vec<char>,
}

/// A source reading from a string slice.
pub type StrSource<'a> = Cursor<StrRead<'a>>;

/// A source reading UTF-8 from a byte stream.
pub type Utf8Source<R> = Cursor<Utf8Read<R>>;

impl<'a> Cursor<StrRead<'a>> {
    pub fn from_str(s: &'a str) -> Self {
        Self::new(StrRead::new(s))
    }
}

impl<R: io::Read> Cursor<Utf8Read<R>> {
    pub fn from_reader(r: R) -> Self {
        Self::new(Utf8Read::new(r))
    }
}

impl<C: CharRead> Cursor<C> {
    pub fn new(r: C) -> Self {
        Self {
            r,
            current: None,
            loaded: false,
            pos: Position::default(),
            prev: None,
            pending: Vec::new(),
        }
    }

    fn load(&mut self) -> io::Result<()> {
        if !self.loaded {
            self.current = match self.pending.pop() {
                Some(c) => Some(c),
                None => self.r.read_char()?,
            };
            self.loaded = true;
        }

        Ok(())
    }
}

impl<C: CharRead> CharSource for Cursor<C> {
    fn current(&mut self) -> io::Result<Option<char>> {
        self.load()?;
        Ok(self.current)
    }

    fn next(&mut self) -> io::Result<Option<char>> {
        self.load()?;

        if let Some(c) = self.current {
            self.prev = Some((c, self.pos));
            self.pos.offset += 1;
            if c == '\n' {
                self.pos.line += 1;
                self.pos.column = 0;
            } else {
                self.pos.column += 1;
            }
            self.loaded = false;
        }

        self.current()
    }

    fn stash_current(&mut self) {
        if let Some((c, pos)) = self.prev.take() {
            if self.loaded {
                if let Some(cur) = self.current {
                    self.pending.push(cur);
                }
            }
            self.current = Some(c);
            self.loaded = true;
            self.pos = pos;
        }
    }

    fn position(&self) -> Position {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns one byte per read, with interruptions in between.
    struct Trickle<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl io::Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            if self.data.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[0];
            self.data = &self.data[1..];
            Ok(1)
        }
    }

    #[test]
    fn utf8_read_char_empty() {
        let mut ur = Utf8Read::new("".as_bytes());
        assert_eq!(ur.read_char().unwrap(), None);
    }

    #[test]
    fn utf8_read_char_unicode() {
        let cases = ["a", "\u{07FF}", "\u{FFFF}", "\u{10FFFF}"];

        for s in cases {
            let mut ur = Utf8Read::new(s.as_bytes());
            assert_eq!(ur.read_char().unwrap(), s.chars().next());
            assert_eq!(ur.read_char().unwrap(), None);
        }
    }

    #[test]
    fn utf8_read_char_bad() {
        let mut ur = Utf8Read::new(&b"\x80"[..]);
        assert_eq!(ur.read_char().unwrap_err().kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn utf8_read_char_truncated() {
        let mut ur = Utf8Read::new(&b"\xE2\x9D"[..]);
        assert_eq!(ur.read_char().unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn utf8_read_partial_reads() {
        let mut src = Cursor::from_reader(Trickle {
            data: "h❤".as_bytes(),
            interrupt: false,
        });
        assert_eq!(src.bump().unwrap(), Some('h'));
        assert_eq!(src.bump().unwrap(), Some('❤'));
        assert_eq!(src.bump().unwrap(), None);
    }

    #[test]
    fn cursor_position() {
        let mut src = Cursor::from_str("ab\nc");
        assert_eq!(src.current().unwrap(), Some('a'));
        src.next().unwrap();
        src.next().unwrap();
        assert_eq!(src.next().unwrap(), Some('c'));
        assert_eq!(
            src.position(),
            Position {
                line: 1,
                column: 0,
                offset: 3
            }
        );
    }

    #[test]
    fn cursor_stash_current() {
        let mut src = Cursor::from_str("xyz");
        assert_eq!(src.next().unwrap(), Some('y'));
        src.stash_current();
        assert_eq!(src.current().unwrap(), Some('x'));
        assert_eq!(src.position().offset, 0);
        assert_eq!(src.next().unwrap(), Some('y'));
        assert_eq!(src.next().unwrap(), Some('z'));
        assert_eq!(src.next().unwrap(), None);
    }

    #[test]
    fn cursor_eat() {
        let mut src = Cursor::from_str("ab");
        assert!(!src.eat('b').unwrap());
        assert!(src.eat('a').unwrap());
        assert!(src.eat('b').unwrap());
        assert_eq!(src.current().unwrap(), None);
    }
}
