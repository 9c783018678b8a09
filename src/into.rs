//! The write side: turning values into a token stream.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::descriptor::{FieldPolicy, RecordShape, ScalarKind, TypeDescriptor};
use crate::error::WriteError;
use crate::identity::IdentityCache;
use crate::options::Options;
use crate::registry::{Registry, Strategy};
use crate::scalar;
use crate::sink::TokenSink;
use crate::token::Token;
use crate::value::{Number, Record, Value};

/// Per-call write state.
pub struct WriteContext<'a> {
    sink: &'a mut dyn TokenSink,
    registry: &'a Registry,
    options: Options,
    identity: &'a mut dyn IdentityCache,
}

impl<'a> WriteContext<'a> {
    pub fn new(
        sink: &'a mut dyn TokenSink,
        registry: &'a Registry,
        options: Options,
        identity: &'a mut dyn IdentityCache,
    ) -> Self {
        Self {
            sink,
            registry,
            options,
            identity,
        }
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Writes one complete document.
    pub fn write_document(&mut self, value: &Value, desc: &TypeDescriptor) -> Result<(), WriteError> {
        self.write(value, desc)?;
        self.sink.finish()
    }

    /// Writes a value of the given shape. [Value::Null] is always
    /// written as [Token::Null].
    pub fn write(&mut self, value: &Value, desc: &TypeDescriptor) -> Result<(), WriteError> {
        if value.is_null() {
            return self.sink.yield_token(Token::Null);
        }

        match self.registry.resolve_writer(desc) {
            Strategy::Custom(writer) => {
                let v = writer.transform(value).map_err(WriteError::Custom)?;
                self.write(&v, &writer.target)
            }
            Strategy::Scalar(kind) => self.write_scalar(&kind, value),
            Strategy::Seq(elem) => self.write_seq(value, &elem),
            Strategy::Array(elem, len) => {
                match value {
                    Value::Array(items) if items.len() != len => {
                        return Err(WriteError::Shape(format!(
                            "expected {} elements, found {}",
                            len,
                            items.len()
                        )))
                    }
                    _ => {}
                }
                self.write_seq(value, &elem)
            }
            Strategy::Map(_, v) => match value {
                Value::Map(m) => {
                    self.sink.yield_token(Token::ObjectStart)?;
                    for (k, item) in m {
                        self.sink.yield_scalar(Token::PropertyKey, k)?;
                        self.write(item, &v)?;
                    }
                    self.sink.yield_token(Token::ObjectEnd)
                }
                v => Err(mismatch("map", v)),
            },
            Strategy::Optional(inner) => self.write(value, &inner),
            Strategy::Polymorphic(shape) | Strategy::Record(shape) => match value {
                Value::Record(record) => self.write_record(&shape, record),
                v => Err(mismatch("record", v)),
            },
            Strategy::Any => self.write_any(value),
        }
    }

    fn write_scalar(&mut self, kind: &ScalarKind, value: &Value) -> Result<(), WriteError> {
        match (kind, value) {
            (ScalarKind::Integer, Value::Number(n @ (Number::Int(_) | Number::UInt(_)))) => {
                self.sink.yield_scalar(Token::Number, &n.to_string())
            }
            (ScalarKind::Float, Value::Number(n)) => self
                .sink
                .yield_scalar(Token::Number, &Number::Float(n.as_f64()).to_string()),
            (ScalarKind::Boolean, Value::Bool(b)) => {
                self.sink.yield_scalar(Token::Boolean, if *b { "true" } else { "false" })
            }
            (ScalarKind::Bytes, Value::Bytes(b)) => {
                self.sink.yield_scalar(Token::String, &scalar::encode_bytes(b))
            }
            (ScalarKind::Enumeration(shape), Value::String(s)) if !shape.variants.contains(s) => {
                Err(WriteError::Shape(format!(
                    "`{}` is not a variant of {}",
                    s, shape.name
                )))
            }
            (
                ScalarKind::String
                | ScalarKind::Char
                | ScalarKind::Temporal
                | ScalarKind::Enumeration(_),
                Value::String(s),
            ) => self.sink.yield_scalar(Token::String, s),
            (kind, v) => Err(WriteError::Shape(format!(
                "cannot write {} as {:?}",
                v.kind(),
                kind
            ))),
        }
    }

    fn write_seq(&mut self, value: &Value, elem: &TypeDescriptor) -> Result<(), WriteError> {
        let Value::Array(items) = value else {
            return Err(mismatch("array", value));
        };

        self.sink.yield_token(Token::ArrayStart)?;
        for item in items {
            self.write(item, elem)?;
        }
        self.sink.yield_token(Token::ArrayEnd)
    }

    /// Writes a value without a declared shape.
    fn write_any(&mut self, value: &Value) -> Result<(), WriteError> {
        match value {
            Value::Null => self.sink.yield_token(Token::Null),
            Value::Bool(b) => self.write_scalar(&ScalarKind::Boolean, &Value::Bool(*b)),
            Value::Number(n) => self.sink.yield_scalar(Token::Number, &n.to_string()),
            Value::String(s) => self.sink.yield_scalar(Token::String, s),
            Value::Bytes(b) => self.sink.yield_scalar(Token::String, &scalar::encode_bytes(b)),
            Value::Array(_) => self.write_seq(value, &TypeDescriptor::Any),
            Value::Map(m) => {
                self.sink.yield_token(Token::ObjectStart)?;
                for (k, v) in m {
                    self.sink.yield_scalar(Token::PropertyKey, k)?;
                    self.write_any(v)?;
                }
                self.sink.yield_token(Token::ObjectEnd)
            }
            Value::Record(record) => {
                self.sink.yield_token(Token::ObjectStart)?;
                for (k, v) in &record.fields {
                    self.sink.yield_scalar(Token::PropertyKey, k)?;
                    self.write_any(v)?;
                }
                self.sink.yield_token(Token::ObjectEnd)
            }
        }
    }

    fn write_record(&mut self, shape: &Arc<RecordShape>, record: &Record) -> Result<(), WriteError> {
        let mut concrete = shape.clone();
        let mut tagged = None;

        if let Some(discriminator) = &shape.discriminator {
            let tag = match &record.tag {
                Some(tag) => Some(tag.as_str()),
                None => discriminator
                    .tags()
                    .find(|t| discriminator.find(t).is_some_and(|s| s.name == record.name)),
            };

            if let Some(tag) = tag {
                concrete = discriminator.find(tag).cloned().ok_or_else(|| {
                    WriteError::Shape(format!(
                        "unknown subtype `{}` for discriminator `{}`",
                        tag, discriminator.property
                    ))
                })?;
                tagged = Some((discriminator.property.as_str(), tag));
            }
        }

        if let Some(id) = self.identity.identity(&concrete, record) {
            if self.identity.has_been_emitted(&id) {
                let reference = self.identity.reference(&concrete, record);
                return match (tagged, &reference) {
                    (Some(tagged), Value::Map(entries)) => self.write_tagged_reference(tagged, entries),
                    _ => self.write_any(&reference),
                };
            }
            self.identity.mark_emitted(id);
        }

        self.sink.yield_token(Token::ObjectStart)?;

        if let Some((property, tag)) = tagged {
            self.sink.yield_scalar(Token::PropertyKey, property)?;
            self.sink.yield_scalar(Token::String, tag)?;
        }

        let defaults = concrete.default_instance();
        let sort = self.options.contains(Options::SORT_ALPHABETICALLY);
        let non_default = self.options.contains(Options::NON_DEFAULT_ONLY);

        for field in concrete.write_order(sort) {
            if tagged.is_some_and(|(property, _)| property == field.name) {
                continue;
            }

            let value = record.get(&field.name).unwrap_or(&Value::Null);
            let policy = match field.policy {
                FieldPolicy::Never => continue,
                _ if non_default => FieldPolicy::NotDefault,
                policy => policy,
            };
            if !policy.admits_write(value, defaults.get(&field.name)) {
                continue;
            }

            self.sink.yield_scalar(Token::PropertyKey, &field.name)?;
            self.write(value, field.descriptor())?;
        }

        self.sink.yield_token(Token::ObjectEnd)
    }

    /// Writes a reference to a subtype instance, discriminator first.
    fn write_tagged_reference(
        &mut self,
        (property, tag): (&str, &str),
        entries: &BTreeMap<String, Value>,
    ) -> Result<(), WriteError> {
        self.sink.yield_token(Token::ObjectStart)?;
        self.sink.yield_scalar(Token::PropertyKey, property)?;
        self.sink.yield_scalar(Token::String, tag)?;

        for (key, value) in entries.iter().filter(|(k, _)| k.as_str() != property) {
            self.sink.yield_scalar(Token::PropertyKey, key)?;
            self.write_any(value)?;
        }

        self.sink.yield_token(Token::ObjectEnd)
    }
}

fn mismatch(expected: &str, found: &Value) -> WriteError {
    WriteError::Shape(format!("expected {}, found {}", expected, found.kind()))
}
