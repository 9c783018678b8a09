use std::fmt;
use std::io;

use crate::error::WriteError;
use crate::token::Token;

/// A receiver of tokens. This is the write side of the pipeline: a
/// [WriteContext](crate::WriteContext) pushes tokens, and an emitter
/// renders them as characters.
///
/// Scalar tokens ([Token::has_text]) arrive through
/// [Self::yield_scalar]; all others through [Self::yield_token].
pub trait TokenSink {
    /// Handles a token without text.
    fn yield_token(&mut self, token: Token) -> Result<(), WriteError>;

    /// Handles a scalar or property key, with its raw text.
    fn yield_scalar(&mut self, token: Token, text: &str) -> Result<(), WriteError>;

    /// Called once after the last token. Emitters verify that the
    /// document is complete here.
    fn finish(&mut self) -> Result<(), WriteError> {
        Ok(())
    }
}

impl<S: TokenSink + ?Sized> TokenSink for &mut S {
    fn yield_token(&mut self, token: Token) -> Result<(), WriteError> {
        (**self).yield_token(token)
    }

    fn yield_scalar(&mut self, token: Token, text: &str) -> Result<(), WriteError> {
        (**self).yield_scalar(token, text)
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        (**self).finish()
    }
}

/// Adapts an [io::Write] to [fmt::Write], so emitters can target byte
/// streams. The I/O error behind a [fmt::Error] is kept, and
/// retrievable with [Self::take_error].
pub struct IoWriter<W: io::Write> {
    w: W,
    error: Option<io::Error>,
}

impl<W: io::Write> IoWriter<W> {
    pub fn new(w: W) -> Self {
        Self { w, error: None }
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Replaces a formatting error with the I/O error that caused it.
    pub fn resolve(&mut self, err: WriteError) -> WriteError {
        match (err, self.error.take()) {
            (WriteError::Fmt(_), Some(io)) => WriteError::Io(io),
            (err, _) => err,
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W: io::Write> fmt::Write for IoWriter<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.w.write_all(s.as_bytes()).map_err(|err| {
            self.error = Some(err);
            fmt::Error
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use super::*;

    struct Broken;

    impl io::Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_io_writer() {
        let mut w = IoWriter::new(Vec::new());
        w.write_str("héllo").unwrap();
        assert_eq!(w.into_inner(), "héllo".as_bytes());
    }

    #[test]
    fn test_io_writer_error() {
        let mut w = IoWriter::new(Broken);
        let err = w.write_str("x").unwrap_err();
        match w.resolve(WriteError::from(err)) {
            WriteError::Io(err) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
            err => panic!("unexpected error: {:?}", err),
        }
    }
}
