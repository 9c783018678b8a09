use std::io;

use crate::error::WriteError;
use crate::sink::TokenSink;
use crate::token::Token;

/// A token sink that prints a description of the tokens to a writer,
/// and forwards them to another sink. For debugging.
///
/// Each token is output on one line. Start and end tokens adjust
/// indentation.
///
/// ## Example
///
/// ```
/// # use shapeser::*;
/// # use shapeser::test::*;
/// let mut got = TokenVec::new();
/// let mut output = Vec::new();
/// Codec::new()
///     .write(
///         &mut PrintingTokenSink::new(&mut got, &mut output, "T: "),
///         &vec![42u32].to_value(),
///         &Vec::<u32>::descriptor(),
///         Options::empty(),
///         &mut NoIdentity,
///     )
///     .unwrap();
/// assert_eq!(
///     String::from_utf8(output).unwrap(),
///     "T: array start\nT:   number \"42\"\nT: array end\n"
/// );
/// ```
pub struct PrintingTokenSink<'a: 'b, 'b, S: TokenSink + ?Sized, W: io::Write> {
    sink: &'b mut S,
    prefix: &'a str,
    writer: W,
    indent: usize,
}

impl<'a: 'b, 'b, S: TokenSink + ?Sized, W: io::Write> PrintingTokenSink<'a, 'b, S, W> {
    /// Creates a new printing sink. The prefix is used for each
    /// output line, before the indentation.
    pub fn new(sink: &'b mut S, writer: W, prefix: &'a str) -> Self {
        Self {
            sink,
            prefix,
            writer,
            indent: 0,
        }
    }

    fn print_token(&mut self, token: Token, text: Option<&str>) -> io::Result<()> {
        if token.is_end() {
            self.indent = self.indent.saturating_sub(1);
        }

        write!(self.writer, "{}{:indent$}{}", self.prefix, "", token, indent = 2 * self.indent)?;
        if let Some(text) = text {
            write!(self.writer, " {:?}", text)?;
        }
        writeln!(self.writer)?;

        if token.is_start() {
            self.indent += 1;
        }

        Ok(())
    }
}

impl<'a: 'b, 'b, S: TokenSink + ?Sized, W: io::Write> TokenSink for PrintingTokenSink<'a, 'b, S, W> {
    fn yield_token(&mut self, token: Token) -> Result<(), WriteError> {
        self.print_token(token, None)?;
        self.sink.yield_token(token)
    }

    fn yield_scalar(&mut self, token: Token, text: &str) -> Result<(), WriteError> {
        self.print_token(token, Some(text))?;
        self.sink.yield_scalar(token, text)
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        self.writer.flush()?;
        self.sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec::TokenVec;

    #[test]
    fn test_printing_token_sink() {
        let tokens = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "a")
            .token(Token::ArrayStart)
            .token(Token::Null)
            .token(Token::ArrayEnd)
            .token(Token::ObjectEnd);

        let mut got = TokenVec::new();
        let mut output = Vec::new();
        tokens
            .replay(&mut PrintingTokenSink::new(&mut got, &mut output, "T: "))
            .unwrap();

        assert_eq!(got, tokens);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            concat!(
                "T: object start\n",
                "T:   property key \"a\"\n",
                "T:   array start\n",
                "T:     null\n",
                "T:   array end\n",
                "T: object end\n",
            )
        );
    }
}
