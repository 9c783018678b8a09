//! The engine's entry points.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{ReadError, WriteError};
use crate::from::ReadContext;
use crate::identity::{IdentityCache, NoIdentity};
use crate::into::WriteContext;
use crate::json::{JsonSink, JsonTokenizer};
use crate::lex::Tokenizer;
use crate::options::Options;
use crate::registry::Registry;
use crate::shape::Shaped;
use crate::sink::{IoWriter, TokenSink};
use crate::source::{CharSource, Cursor};
use crate::value::Value;
use crate::yaml::{IncludeResolver, YamlSink, YamlTokenizer};

/// The text formats a [Codec] reads and writes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Format {
    Json,
    Yaml,
}

/// An engine instance: a [Registry] and default [Options].
///
/// The typed entry points go through [Shaped]. The `*_value` entry
/// points work on [Value] with an explicit descriptor, and [Self::read]
/// and [Self::write] accept any tokenizer or sink along with per-call
/// options and an identity cache.
///
/// ```
/// use shapeser::{Codec, Format};
///
/// let codec = Codec::new();
/// let v: Vec<u32> = codec.read_str(Format::Yaml, "- 1\n- 2").unwrap();
/// assert_eq!(v, vec![1, 2]);
/// assert_eq!(codec.write_string(Format::Json, &v).unwrap(), "[1,2]");
/// ```
#[derive(Clone)]
pub struct Codec {
    registry: Arc<Registry>,
    options: Options,
    includes: Option<Arc<dyn IncludeResolver>>,
}

impl Codec {
    /// A codec using the [global](Registry::global) registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::global())
    }

    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            options: Options::empty(),
            includes: None,
        }
    }

    /// Sets the default options.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Enables `!include` in YAML input.
    pub fn with_include_resolver(mut self, resolver: Arc<dyn IncludeResolver>) -> Self {
        self.includes = Some(resolver);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Reads one document from `tokenizer`.
    pub fn read(
        &self,
        tokenizer: &mut dyn Tokenizer,
        desc: &TypeDescriptor,
        options: Options,
        identity: &mut dyn IdentityCache,
    ) -> Result<Value, ReadError> {
        log::debug!("reading {} with {:?}", desc, options);

        ReadContext::new(tokenizer, &self.registry, options, identity).read_document(desc)
    }

    /// Writes one document to `sink`.
    pub fn write(
        &self,
        sink: &mut dyn TokenSink,
        value: &Value,
        desc: &TypeDescriptor,
        options: Options,
        identity: &mut dyn IdentityCache,
    ) -> Result<(), WriteError> {
        log::debug!("writing {} with {:?}", desc, options);

        WriteContext::new(sink, &self.registry, options, identity).write_document(value, desc)
    }

    /// Creates a tokenizer for `format` over `src`.
    pub fn tokenizer<'s, S: CharSource + 's>(&self, format: Format, src: S) -> Box<dyn Tokenizer + 's> {
        match format {
            Format::Json => Box::new(JsonTokenizer::new(src)),
            Format::Yaml => {
                let tokenizer = YamlTokenizer::new(src);
                match &self.includes {
                    Some(resolver) => Box::new(tokenizer.with_include_resolver(resolver.clone())),
                    None => Box::new(tokenizer),
                }
            }
        }
    }

    fn read_source<S: CharSource>(
        &self,
        format: Format,
        src: S,
        desc: &TypeDescriptor,
    ) -> Result<Value, ReadError> {
        let mut tokenizer = self.tokenizer(format, src);
        self.read(&mut *tokenizer, desc, self.options, &mut NoIdentity)
    }

    pub fn read_value_str(&self, format: Format, s: &str, desc: &TypeDescriptor) -> Result<Value, ReadError> {
        self.read_source(format, Cursor::from_str(s), desc)
    }

    pub fn read_value_from<R: io::Read>(
        &self,
        format: Format,
        r: R,
        desc: &TypeDescriptor,
    ) -> Result<Value, ReadError> {
        self.read_source(format, Cursor::from_reader(r), desc)
    }

    pub fn read_str<T: Shaped>(&self, format: Format, s: &str) -> Result<T, ReadError> {
        T::from_value(self.read_value_str(format, s, &T::descriptor())?)
    }

    /// Reads UTF-8 text from a byte stream.
    pub fn read_from<T: Shaped, R: io::Read>(&self, format: Format, r: R) -> Result<T, ReadError> {
        T::from_value(self.read_value_from(format, r, &T::descriptor())?)
    }

    fn emit(
        &self,
        format: Format,
        w: &mut dyn fmt::Write,
        value: &Value,
        desc: &TypeDescriptor,
    ) -> Result<(), WriteError> {
        match format {
            Format::Json => self.write(&mut JsonSink::new(w), value, desc, self.options, &mut NoIdentity),
            Format::Yaml => self.write(&mut YamlSink::new(w), value, desc, self.options, &mut NoIdentity),
        }
    }

    pub fn write_value_string(
        &self,
        format: Format,
        value: &Value,
        desc: &TypeDescriptor,
    ) -> Result<String, WriteError> {
        let mut out = String::new();
        self.emit(format, &mut out, value, desc)?;
        Ok(out)
    }

    /// Writes UTF-8 text to a byte stream, and flushes it.
    pub fn write_value_to<W: io::Write>(
        &self,
        format: Format,
        value: &Value,
        desc: &TypeDescriptor,
        w: W,
    ) -> Result<(), WriteError> {
        let mut w = IoWriter::new(w);

        match self.emit(format, &mut w, value, desc) {
            Ok(()) => Ok(w.flush()?),
            Err(err) => Err(w.resolve(err)),
        }
    }

    pub fn write_string<T: Shaped>(&self, format: Format, v: &T) -> Result<String, WriteError> {
        self.write_value_string(format, &v.to_value(), &T::descriptor())
    }

    pub fn write_to<T: Shaped, W: io::Write>(&self, format: Format, v: &T, w: W) -> Result<(), WriteError> {
        self.write_value_to(format, &v.to_value(), &T::descriptor(), w)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("includes", &self.includes.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::descriptor::ScalarKind;
    use crate::error::ReadErrorKind;
    use crate::identity::KeyedIdentityCache;
    use crate::token::Token;
    use crate::vec::TokenVec;

    #[test]
    fn test_typed() {
        let codec = Codec::with_registry(Arc::new(Registry::new()));

        let m: BTreeMap<String, Vec<i32>> = codec.read_str(Format::Json, r#"{"a": [1, -2]}"#).unwrap();
        assert_eq!(m["a"], vec![1, -2]);
        assert_eq!(codec.write_string(Format::Yaml, &m).unwrap(), "a:\n  - 1\n  - -2");

        let err = codec.read_str::<u8>(Format::Json, "[1]").unwrap_err();
        assert!(matches!(err.kind, ReadErrorKind::UnexpectedToken { found: Token::ArrayStart, .. }));
    }

    #[test]
    fn test_streams() {
        let codec = Codec::with_registry(Arc::new(Registry::new()));

        let v: Option<String> = codec.read_from(Format::Yaml, "~".as_bytes()).unwrap();
        assert_eq!(v, None);

        let mut out = Vec::new();
        codec.write_to(Format::Json, &vec!["x".to_owned()], &mut out).unwrap();
        assert_eq!(out, br#"["x"]"#);
    }

    #[test]
    fn test_trailing_content() {
        let codec = Codec::with_registry(Arc::new(Registry::new()));

        let err = codec.read_str::<i32>(Format::Json, "1 2").unwrap_err();
        assert!(matches!(err.kind, ReadErrorKind::TrailingContent(Token::Number)));
    }

    #[test]
    fn test_custom_tokenizer_and_sink() {
        let codec = Codec::with_registry(Arc::new(Registry::new()));
        let desc = TypeDescriptor::seq(TypeDescriptor::Scalar(ScalarKind::Boolean));
        let tokens = TokenVec::new()
            .token(Token::ArrayStart)
            .scalar(Token::Boolean, "true")
            .token(Token::ArrayEnd);

        let value = codec
            .read(&mut tokens.tokenizer(), &desc, Options::empty(), &mut KeyedIdentityCache::new())
            .unwrap();
        assert_eq!(value, Value::Array(vec![Value::Bool(true)]));

        let mut sink = TokenVec::new();
        codec
            .write(&mut sink, &value, &desc, Options::empty(), &mut NoIdentity)
            .unwrap();
        assert_eq!(sink.len(), 3);
    }
}
