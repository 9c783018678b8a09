//! The read side: materializing values from a token stream.
//!
//! A [ReadContext] pulls tokens from a [Tokenizer] one at a time. The
//! strategy for each descriptor is resolved through the [Registry],
//! and strategies recurse into the context for nested values.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::descriptor::{RecordShape, ScalarKind, TypeDescriptor};
use crate::error::{Position, ReadError, ReadErrorKind};
use crate::identity::IdentityCache;
use crate::lex::{LexState, Tokenizer};
use crate::options::Options;
use crate::registry::{CustomReader, Registry, Strategy};
use crate::scalar;
use crate::token::{Token, TokenTypes};
use crate::value::{Number, Record, Value};

/// A property key whose value is merged into the enclosing map.
pub const MERGE_KEY: &str = "<<";

/// Per-call read state.
pub struct ReadContext<'a> {
    tokenizer: &'a mut dyn Tokenizer,
    lex: LexState,
    current: Option<Token>,
    text: Option<String>,
    registry: &'a Registry,
    options: Options,
    identity: &'a mut dyn IdentityCache,
}

/// Fields already assigned while reading one record. Explicit
/// assignments always win over merged ones, and earlier merges win
/// over later ones.
#[derive(Default)]
struct Assigned {
    explicit: HashSet<String>,
    merged: HashSet<String>,
}

impl<'a> ReadContext<'a> {
    pub fn new(
        tokenizer: &'a mut dyn Tokenizer,
        registry: &'a Registry,
        options: Options,
        identity: &'a mut dyn IdentityCache,
    ) -> Self {
        Self {
            tokenizer,
            lex: LexState::new(),
            current: None,
            text: None,
            registry,
            options,
            identity,
        }
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Returns the current token, pulling the next one from the
    /// tokenizer if none is buffered. [Token::Skip] is never returned.
    pub fn current(&mut self) -> Result<Token, ReadError> {
        if let Some(token) = self.current {
            return Ok(token);
        }

        loop {
            let token = self
                .tokenizer
                .next_token(&mut self.lex)
                .map_err(|err| err.or_at(self.tokenizer.position()))?;
            let text = self.lex.take_text();

            if token == Token::Skip {
                continue;
            }

            log::trace!("{} {:?} at {}", token, text, self.tokenizer.position());
            self.current = Some(token);
            self.text = text;
            return Ok(token);
        }
    }

    /// Consumes the current token.
    pub fn advance(&mut self) {
        self.current = None;
        self.text = None;
    }

    /// Takes the text of the current token. Tokens without text yield
    /// an empty string.
    pub fn take_text(&mut self) -> String {
        self.text.take().unwrap_or_default()
    }

    /// Consumes the current token, which must be `token`.
    pub fn expect(&mut self, token: Token) -> Result<(), ReadError> {
        let found = self.current()?;
        if found != token {
            return Err(self.unexpected(TokenTypes::new(token), found));
        }

        self.advance();
        Ok(())
    }

    pub fn position(&self) -> Position {
        self.tokenizer.position()
    }

    /// Creates an error at the current position.
    pub fn error(&self, kind: ReadErrorKind) -> ReadError {
        ReadError::at(kind, self.position())
    }

    fn unexpected(&self, expected: TokenTypes, found: Token) -> ReadError {
        self.error(ReadErrorKind::UnexpectedToken { expected, found })
    }

    /// Reads one complete document: a value, followed by the end of
    /// input.
    pub fn read_document(&mut self, desc: &TypeDescriptor) -> Result<Value, ReadError> {
        let value = self.read(desc)?;

        match self.current()? {
            Token::EndOfInput => Ok(value),
            found => Err(self.error(ReadErrorKind::TrailingContent(found))),
        }
    }

    /// Reads a value of the given shape. [Token::Null] is accepted for
    /// every shape, and yields [Value::Null].
    pub fn read(&mut self, desc: &TypeDescriptor) -> Result<Value, ReadError> {
        let strategy = self.registry.resolve_reader(desc);

        if self.current()? == Token::Null {
            self.advance();
            return Ok(Value::Null);
        }

        match strategy {
            Strategy::Custom(reader) => self.read_custom(&reader),
            Strategy::Scalar(kind) => self.read_scalar(&kind),
            Strategy::Seq(elem) => self.read_seq(&elem).map(Value::Array),
            Strategy::Array(elem, len) => {
                let start = self.position();
                let items = self.read_seq(&elem)?;
                if items.len() != len {
                    return Err(ReadError::at(
                        ReadErrorKind::LengthMismatch {
                            expected: len,
                            found: items.len(),
                        },
                        start,
                    ));
                }
                Ok(Value::Array(items))
            }
            Strategy::Map(key, value) => self.read_map(&key, &value),
            Strategy::Optional(inner) => self.read(&inner),
            Strategy::Polymorphic(shape) => self.read_polymorphic(&shape),
            Strategy::Record(shape) => self.read_record(&shape),
            Strategy::Any => self.read_any(),
        }
    }

    fn read_custom(&mut self, reader: &CustomReader) -> Result<Value, ReadError> {
        let found = self.current()?;
        if found != reader.token {
            return Err(self.unexpected(TokenTypes::new(reader.token), found));
        }

        let text = self.take_text();
        let value = reader
            .read(&text)
            .map_err(|msg| self.error(ReadErrorKind::Custom(msg)))?;
        self.advance();

        Ok(value)
    }

    fn read_scalar(&mut self, kind: &ScalarKind) -> Result<Value, ReadError> {
        let accepted: TokenTypes = match kind {
            ScalarKind::String => [Token::String, Token::Number, Token::Boolean]
                .into_iter()
                .collect(),
            ScalarKind::Temporal => TokenTypes::new(Token::String).with(Token::Number),
            kind => TokenTypes::new(kind.token()),
        };

        let found = self.current()?;
        if !accepted.contains(found) {
            return Err(self.unexpected(accepted, found));
        }

        let text = self.take_text();
        let value = match kind {
            ScalarKind::String | ScalarKind::Temporal => Ok(Value::String(text)),
            ScalarKind::Char if text.chars().count() == 1 => Ok(Value::String(text)),
            ScalarKind::Char => Err(ReadErrorKind::Shape(format!(
                "expected a single character, found {:?}",
                text
            ))),
            ScalarKind::Integer => match scalar::parse_number(&text) {
                Some(n @ (Number::Int(_) | Number::UInt(_))) => Ok(Value::Number(n)),
                _ => Err(ReadErrorKind::InvalidNumber(text)),
            },
            ScalarKind::Float => match scalar::parse_number(&text) {
                Some(n) => Ok(Value::Number(Number::Float(n.as_f64()))),
                None => Err(ReadErrorKind::InvalidNumber(text)),
            },
            ScalarKind::Boolean => match scalar::parse_bool(&text) {
                Some(v) => Ok(Value::Bool(v)),
                None => Err(ReadErrorKind::InvalidSyntax(format!(
                    "invalid boolean `{}`",
                    text
                ))),
            },
            ScalarKind::Bytes => scalar::decode_bytes(&text)
                .map(Value::Bytes)
                .map_err(ReadErrorKind::from),
            ScalarKind::Enumeration(shape) => {
                if shape.variants.contains(&text) {
                    Ok(Value::String(text))
                } else {
                    Err(ReadErrorKind::InvalidEnumValue {
                        name: shape.name.clone(),
                        value: text,
                    })
                }
            }
        }
        .map_err(|kind| self.error(kind))?;

        self.advance();
        Ok(value)
    }

    /// Infers the value's kind from the current token.
    fn read_any(&mut self) -> Result<Value, ReadError> {
        match self.current()? {
            Token::ObjectStart => self.read_map(&TypeDescriptor::Any, &TypeDescriptor::Any),
            Token::ArrayStart => self.read_seq(&TypeDescriptor::Any).map(Value::Array),
            Token::Number => {
                let text = self.take_text();
                let n = scalar::parse_number(&text)
                    .ok_or_else(|| self.error(ReadErrorKind::InvalidNumber(text)))?;
                self.advance();
                Ok(Value::Number(n))
            }
            Token::Boolean => self.read_scalar(&ScalarKind::Boolean),
            Token::String | Token::PropertyKey => {
                let text = self.take_text();
                self.advance();
                Ok(Value::String(text))
            }
            found => Err(self.unexpected(TokenTypes::VALUE, found)),
        }
    }

    fn read_seq(&mut self, elem: &TypeDescriptor) -> Result<Vec<Value>, ReadError> {
        if self.options.contains(Options::UNWRAP_STRINGS) && self.current()? == Token::String {
            return Ok(vec![self.read(elem)?]);
        }

        self.expect(Token::ArrayStart)?;

        let mut items = Vec::new();
        while self.current()? != Token::ArrayEnd {
            items.push(self.read(elem)?);
        }
        self.advance();

        Ok(items)
    }

    fn read_map(&mut self, key: &TypeDescriptor, value: &TypeDescriptor) -> Result<Value, ReadError> {
        self.expect(Token::ObjectStart)?;

        let mut entries = BTreeMap::new();
        let mut merged = BTreeMap::new();

        while let Some(name) = self.next_key()? {
            if name == MERGE_KEY {
                let desc = TypeDescriptor::map(key.clone(), value.clone());
                for source in self.read_merge_sources(&desc)? {
                    if let Value::Map(m) = source {
                        for (k, v) in m {
                            merged.entry(k).or_insert(v);
                        }
                    }
                }
                continue;
            }

            self.check_key(key, &name)?;
            let v = self.read(value)?;
            entries.insert(name, v);
        }

        for (k, v) in merged {
            entries.entry(k).or_insert(v);
        }

        Ok(Value::Map(entries))
    }

    /// Consumes the next property key, or the end of the object.
    fn next_key(&mut self) -> Result<Option<String>, ReadError> {
        match self.current()? {
            Token::ObjectEnd => {
                self.advance();
                Ok(None)
            }
            Token::PropertyKey => {
                let name = self.take_text();
                self.advance();
                Ok(Some(name))
            }
            found => Err(self.unexpected(
                TokenTypes::new(Token::PropertyKey).with(Token::ObjectEnd),
                found,
            )),
        }
    }

    /// Map keys are kept as text, but must parse as the key shape.
    fn check_key(&self, key: &TypeDescriptor, name: &str) -> Result<(), ReadError> {
        let valid = match key {
            TypeDescriptor::Scalar(ScalarKind::Integer) => matches!(
                scalar::parse_number(name),
                Some(Number::Int(_) | Number::UInt(_))
            ),
            TypeDescriptor::Scalar(ScalarKind::Float) => scalar::parse_number(name).is_some(),
            TypeDescriptor::Scalar(ScalarKind::Boolean) => scalar::parse_bool(name).is_some(),
            TypeDescriptor::Scalar(ScalarKind::Enumeration(shape)) => {
                if !shape.variants.iter().any(|v| v == name) {
                    return Err(self.error(ReadErrorKind::InvalidEnumValue {
                        name: shape.name.clone(),
                        value: name.to_owned(),
                    }));
                }
                true
            }
            _ => true,
        };

        if valid {
            Ok(())
        } else {
            Err(self.error(ReadErrorKind::Shape(format!(
                "invalid key `{}` for {}",
                name, key
            ))))
        }
    }

    /// Reads the value of a merge key: one value, or a sequence of them.
    fn read_merge_sources(&mut self, desc: &TypeDescriptor) -> Result<Vec<Value>, ReadError> {
        if self.current()? != Token::ArrayStart {
            return Ok(vec![self.read(desc)?]);
        }

        self.advance();
        let mut sources = Vec::new();
        while self.current()? != Token::ArrayEnd {
            sources.push(self.read(desc)?);
        }
        self.advance();

        Ok(sources)
    }

    fn read_record(&mut self, shape: &Arc<RecordShape>) -> Result<Value, ReadError> {
        let mut record = shape.default_instance().clone();

        if self.options.contains(Options::UNWRAP_STRINGS) && self.current()? == Token::String {
            if let [field] = shape.fields.as_slice() {
                let value = self.read(field.descriptor())?;
                record.set(field.name.clone(), value);
                return Ok(Value::Record(self.identity.remap_or_cache(shape, record)));
            }
        }

        self.expect(Token::ObjectStart)?;
        self.read_fields(shape, &mut record, &mut Assigned::default(), false, None)?;

        Ok(Value::Record(self.identity.remap_or_cache(shape, record)))
    }

    /// Reads a record whose first property selects the concrete shape.
    fn read_polymorphic(&mut self, shape: &Arc<RecordShape>) -> Result<Value, ReadError> {
        let Some(discriminator) = &shape.discriminator else {
            return self.read_record(shape);
        };
        let property = discriminator.property.as_str();

        self.expect(Token::ObjectStart)?;

        let found = match self.current()? {
            Token::PropertyKey => self.take_text(),
            token => token.name().to_owned(),
        };
        if found != property || self.current()? != Token::PropertyKey {
            return Err(self.error(ReadErrorKind::DiscriminatorNotFirst {
                expected: property.to_owned(),
                found,
            }));
        }
        self.advance();

        let tag = match self.read(&TypeDescriptor::Scalar(ScalarKind::String))? {
            Value::String(tag) => tag,
            v => v.kind().to_owned(),
        };
        let subtype = discriminator.find(&tag).cloned().ok_or_else(|| {
            self.error(ReadErrorKind::UnknownSubtype {
                property: property.to_owned(),
                tag: tag.clone(),
            })
        })?;

        let mut record = subtype.default_instance().clone();
        if subtype.get_field(property).is_some() {
            record.set(property.to_owned(), Value::String(tag.clone()));
        }
        record.tag = Some(tag);

        self.read_fields(
            &subtype,
            &mut record,
            &mut Assigned::default(),
            false,
            Some(property),
        )?;

        Ok(Value::Record(self.identity.remap_or_cache(&subtype, record)))
    }

    /// Reads properties into `record` until the end of the object.
    /// The opening token has been consumed.
    fn read_fields(
        &mut self,
        shape: &RecordShape,
        record: &mut Record,
        assigned: &mut Assigned,
        merging: bool,
        discriminator: Option<&str>,
    ) -> Result<(), ReadError> {
        loop {
            let pos = self.position();
            let Some(name) = self.next_key()? else {
                return Ok(());
            };

            if name == MERGE_KEY && shape.get_field(MERGE_KEY).is_none() {
                self.read_record_merge(shape, record, assigned, discriminator)?;
                continue;
            }

            let Some(field) = shape.get_field(&name) else {
                if discriminator == Some(name.as_str())
                    || self.options.contains(Options::IGNORE_UNKNOWN_PROPERTIES)
                {
                    self.read(&TypeDescriptor::Any)?;
                    continue;
                }
                return Err(ReadError::at(ReadErrorKind::UnknownProperty(name), pos));
            };

            let value = self.read(field.descriptor())?;
            if !field.policy.admits_read(&value) {
                continue;
            }

            if merging {
                if assigned.explicit.contains(&name) || !assigned.merged.insert(name.clone()) {
                    continue;
                }
            } else {
                assigned.explicit.insert(name.clone());
            }

            record.set(name, value);
        }
    }

    fn read_record_merge(
        &mut self,
        shape: &RecordShape,
        record: &mut Record,
        assigned: &mut Assigned,
        discriminator: Option<&str>,
    ) -> Result<(), ReadError> {
        let many = self.current()? == Token::ArrayStart;
        if many {
            self.advance();
        }

        loop {
            match self.current()? {
                Token::ArrayEnd if many => {
                    self.advance();
                    return Ok(());
                }
                Token::Null => self.advance(),
                _ => {
                    self.expect(Token::ObjectStart)?;
                    self.read_fields(shape, record, assigned, true, discriminator)?;
                }
            }

            if !many {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Discriminator, FieldPolicy, FieldShape};
    use crate::identity::{KeyedIdentityCache, NoIdentity};
    use crate::vec::TokenVec;

    fn read_with(tokens: &TokenVec, desc: &TypeDescriptor, options: Options) -> Result<Value, ReadError> {
        let registry = Registry::new();
        let mut tokenizer = tokens.tokenizer();
        let mut identity = NoIdentity;
        let mut ctx = ReadContext::new(&mut tokenizer, &registry, options, &mut identity);
        ctx.read_document(desc)
    }

    fn read(tokens: &TokenVec, desc: &TypeDescriptor) -> Result<Value, ReadError> {
        read_with(tokens, desc, Options::empty())
    }

    fn string() -> TypeDescriptor {
        TypeDescriptor::Scalar(ScalarKind::String)
    }

    fn int() -> TypeDescriptor {
        TypeDescriptor::Scalar(ScalarKind::Integer)
    }

    fn point() -> TypeDescriptor {
        TypeDescriptor::record(
            RecordShape::new("Point")
                .field(FieldShape::new("x", int()))
                .field(FieldShape::new("y", int())),
        )
    }

    #[test]
    fn test_read_scalars() {
        let cases = vec![
            (TokenVec::new().scalar(Token::String, "hi"), string(), Value::from("hi")),
            (TokenVec::new().scalar(Token::Number, "42"), string(), Value::from("42")),
            (TokenVec::new().scalar(Token::Number, "-42"), int(), Value::from(-42)),
            (
                TokenVec::new().scalar(Token::Number, "1"),
                TypeDescriptor::Scalar(ScalarKind::Float),
                Value::from(1.0),
            ),
            (
                TokenVec::new().scalar(Token::Boolean, "true"),
                TypeDescriptor::Scalar(ScalarKind::Boolean),
                Value::from(true),
            ),
            (
                TokenVec::new().scalar(Token::String, "AA=="),
                TypeDescriptor::Scalar(ScalarKind::Bytes),
                Value::Bytes(vec![0]),
            ),
            (TokenVec::new().token(Token::Null), int(), Value::Null),
        ];

        for (tokens, desc, want) in cases {
            assert_eq!(read(&tokens, &desc).unwrap(), want, "{}", desc);
        }
    }

    #[test]
    fn test_read_scalar_mismatch() {
        let err = read(&TokenVec::new().scalar(Token::String, "x"), &int()).unwrap_err();
        assert!(matches!(
            err.kind,
            ReadErrorKind::UnexpectedToken {
                found: Token::String,
                ..
            }
        ));

        let err = read(&TokenVec::new().scalar(Token::Number, "1.5"), &int()).unwrap_err();
        assert!(matches!(err.kind, ReadErrorKind::InvalidNumber(_)));
    }

    #[test]
    fn test_read_any() {
        let tokens = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "a")
            .token(Token::ArrayStart)
            .scalar(Token::Number, "1")
            .scalar(Token::Boolean, "false")
            .token(Token::Null)
            .token(Token::ArrayEnd)
            .token(Token::ObjectEnd);

        assert_eq!(
            read(&tokens, &TypeDescriptor::Any).unwrap(),
            Value::Map(BTreeMap::from([(
                "a".to_owned(),
                Value::Array(vec![Value::from(1), Value::from(false), Value::Null])
            )]))
        );
    }

    #[test]
    fn test_read_null_collection_is_not_empty() {
        let desc = TypeDescriptor::seq(int());
        assert_eq!(read(&TokenVec::new().token(Token::Null), &desc).unwrap(), Value::Null);
        assert_eq!(
            read(
                &TokenVec::new().token(Token::ArrayStart).token(Token::ArrayEnd),
                &desc
            )
            .unwrap(),
            Value::Array(vec![])
        );
    }

    #[test]
    fn test_read_array_length() {
        let tokens = TokenVec::new()
            .token(Token::ArrayStart)
            .scalar(Token::Number, "1")
            .token(Token::ArrayEnd);

        let err = read(&tokens, &TypeDescriptor::array(int(), 2)).unwrap_err();
        assert!(matches!(
            err.kind,
            ReadErrorKind::LengthMismatch {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_read_trailing_content() {
        let tokens = TokenVec::new()
            .scalar(Token::Number, "1")
            .scalar(Token::String, "extra");

        let err = read(&tokens, &TypeDescriptor::Any).unwrap_err();
        assert!(matches!(err.kind, ReadErrorKind::TrailingContent(Token::String)));
    }

    #[test]
    fn test_read_map_merge() {
        let tokens = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "b")
            .scalar(Token::Number, "2")
            .scalar(Token::PropertyKey, "<<")
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "a")
            .scalar(Token::Number, "1")
            .scalar(Token::PropertyKey, "b")
            .scalar(Token::Number, "3")
            .token(Token::ObjectEnd)
            .token(Token::ObjectEnd);

        assert_eq!(
            read(&tokens, &TypeDescriptor::map(string(), int())).unwrap(),
            Value::Map(BTreeMap::from([
                ("a".to_owned(), Value::from(1)),
                ("b".to_owned(), Value::from(2)),
            ]))
        );
    }

    #[test]
    fn test_read_map_integer_keys() {
        let tokens = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "x")
            .scalar(Token::Number, "2")
            .token(Token::ObjectEnd);

        let err = read(&tokens, &TypeDescriptor::map(int(), int())).unwrap_err();
        assert!(matches!(err.kind, ReadErrorKind::Shape(_)));
    }

    #[test]
    fn test_read_record() {
        let tokens = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "y")
            .scalar(Token::Number, "2")
            .token(Token::ObjectEnd);

        assert_eq!(
            read(&tokens, &point()).unwrap(),
            Value::Record(Record::new("Point").with("x", 0).with("y", 2))
        );
    }

    #[test]
    fn test_read_unknown_property() {
        let tokens = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "x")
            .scalar(Token::Number, "1")
            .scalar(Token::PropertyKey, "z")
            .token(Token::ArrayStart)
            .token(Token::ArrayEnd)
            .token(Token::ObjectEnd);

        let err = read(&tokens, &point()).unwrap_err();
        assert!(matches!(&err.kind, ReadErrorKind::UnknownProperty(name) if name == "z"));

        assert_eq!(
            read_with(&tokens, &point(), Options::IGNORE_UNKNOWN_PROPERTIES).unwrap(),
            Value::Record(Record::new("Point").with("x", 1).with("y", 0))
        );
    }

    #[test]
    fn test_read_field_policies() {
        let list = || TypeDescriptor::seq(int());
        let desc = TypeDescriptor::record(
            RecordShape::new("P")
                .field(FieldShape::new("never", int()).policy(FieldPolicy::Never))
                .field(
                    FieldShape::new("not_null", int())
                        .policy(FieldPolicy::NotNull)
                        .default_value(Value::from(5)),
                )
                .field(
                    FieldShape::new("not_empty", list())
                        .policy(FieldPolicy::NotEmpty)
                        .default_value(Value::Array(vec![Value::from(9)])),
                ),
        );
        let tokens = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "never")
            .scalar(Token::Number, "1")
            .scalar(Token::PropertyKey, "not_null")
            .token(Token::Null)
            .scalar(Token::PropertyKey, "not_empty")
            .token(Token::ArrayStart)
            .token(Token::ArrayEnd)
            .token(Token::ObjectEnd);

        assert_eq!(
            read(&tokens, &desc).unwrap(),
            Value::Record(
                Record::new("P")
                    .with("never", 0)
                    .with("not_null", 5)
                    .with("not_empty", Value::Array(vec![Value::from(9)]))
            )
        );
    }

    #[test]
    fn test_read_record_merge() {
        let tokens = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "<<")
            .token(Token::ArrayStart)
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "x")
            .scalar(Token::Number, "1")
            .token(Token::ObjectEnd)
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "x")
            .scalar(Token::Number, "7")
            .scalar(Token::PropertyKey, "y")
            .scalar(Token::Number, "2")
            .token(Token::ObjectEnd)
            .token(Token::ArrayEnd)
            .scalar(Token::PropertyKey, "y")
            .scalar(Token::Number, "3")
            .token(Token::ObjectEnd);

        assert_eq!(
            read(&tokens, &point()).unwrap(),
            Value::Record(Record::new("Point").with("x", 1).with("y", 3))
        );
    }

    fn animal() -> TypeDescriptor {
        let dog = TypeDescriptor::record(
            RecordShape::new("Dog").field(FieldShape::new("name", string())),
        );
        TypeDescriptor::record(
            RecordShape::new("Animal").discriminator(Discriminator::new("type").subtype("dog", dog)),
        )
    }

    #[test]
    fn test_read_polymorphic() {
        let tokens = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "type")
            .scalar(Token::String, "dog")
            .scalar(Token::PropertyKey, "name")
            .scalar(Token::String, "rex")
            .token(Token::ObjectEnd);

        assert_eq!(
            read(&tokens, &animal()).unwrap(),
            Value::Record(Record::new("Dog").with_tag("dog").with("name", "rex"))
        );
    }

    #[test]
    fn test_read_polymorphic_errors() {
        let not_first = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "name")
            .scalar(Token::String, "rex")
            .scalar(Token::PropertyKey, "type")
            .scalar(Token::String, "dog")
            .token(Token::ObjectEnd);
        let err = read(&not_first, &animal()).unwrap_err();
        assert!(matches!(
            &err.kind,
            ReadErrorKind::DiscriminatorNotFirst { expected, found } if expected == "type" && found == "name"
        ));

        let unknown = TokenVec::new()
            .token(Token::ObjectStart)
            .scalar(Token::PropertyKey, "type")
            .scalar(Token::String, "cat")
            .token(Token::ObjectEnd);
        let err = read(&unknown, &animal()).unwrap_err();
        assert!(matches!(&err.kind, ReadErrorKind::UnknownSubtype { tag, .. } if tag == "cat"));
    }

    #[test]
    fn test_read_unwrap_strings() {
        let tokens = TokenVec::new().scalar(Token::String, "a");
        let desc = TypeDescriptor::seq(string());

        assert!(read(&tokens, &desc).is_err());
        assert_eq!(
            read_with(&tokens, &desc, Options::UNWRAP_STRINGS).unwrap(),
            Value::Array(vec![Value::from("a")])
        );

        let wrapper = TypeDescriptor::record(RecordShape::new("W").field(FieldShape::new("v", string())));
        assert_eq!(
            read_with(&tokens, &wrapper, Options::UNWRAP_STRINGS).unwrap(),
            Value::Record(Record::new("W").with("v", "a"))
        );
    }

    #[test]
    fn test_read_custom() {
        let registry = Registry::new();
        registry
            .register_reader(int(), Token::String, |s| {
                s.strip_prefix('#')
                    .and_then(|s| s.parse::<i64>().ok())
                    .map(Value::from)
                    .ok_or_else(|| format!("bad id {:?}", s))
            })
            .unwrap();

        let tokens = TokenVec::new().scalar(Token::String, "#12");
        let mut tokenizer = tokens.tokenizer();
        let mut identity = NoIdentity;
        let mut ctx = ReadContext::new(&mut tokenizer, &registry, Options::empty(), &mut identity);
        assert_eq!(ctx.read_document(&int()).unwrap(), Value::from(12));

        let tokens = TokenVec::new().scalar(Token::String, "12");
        let mut tokenizer = tokens.tokenizer();
        let mut ctx = ReadContext::new(&mut tokenizer, &registry, Options::empty(), &mut identity);
        let err = ctx.read_document(&int()).unwrap_err();
        assert!(matches!(err.kind, ReadErrorKind::Custom(_)));
    }

    #[test]
    fn test_read_remap_or_cache() {
        let user = TypeDescriptor::record(
            RecordShape::new("User")
                .field(FieldShape::new("id", int()))
                .field(FieldShape::new("name", string()))
                .keys(["id"]),
        );
        let entry = |name: &str| {
            TokenVec::new()
                .token(Token::ObjectStart)
                .scalar(Token::PropertyKey, "id")
                .scalar(Token::Number, "1")
                .scalar(Token::PropertyKey, "name")
                .scalar(Token::String, name)
                .token(Token::ObjectEnd)
        };
        let tokens = TokenVec::new()
            .token(Token::ArrayStart)
            .extend(entry("first"))
            .extend(entry("second"))
            .token(Token::ArrayEnd);

        let registry = Registry::new();
        let mut tokenizer = tokens.tokenizer();
        let mut identity = KeyedIdentityCache::new();
        let mut ctx = ReadContext::new(&mut tokenizer, &registry, Options::empty(), &mut identity);
        let got = ctx.read_document(&TypeDescriptor::seq(user)).unwrap();

        let first = Value::Record(Record::new("User").with("id", 1).with("name", "first"));
        assert_eq!(got, Value::Array(vec![first.clone(), first]));
    }
}
