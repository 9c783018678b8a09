//! Type descriptors: what shape a value is read into or written from.
//!
//! A [TypeDescriptor] is a plain value. Record shapes are shared
//! behind [Arc], so a descriptor is cheap to clone and to use as a
//! dispatch cache key. Two record shapes are equal only if their
//! names, fields, keys and subtypes agree; shapes nested inside a
//! field are compared by name.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::token::Token;
use crate::value::{Number, Record, Value};

/// The kinds of scalar values.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ScalarKind {
    String,
    Char,
    Integer,
    Float,
    Boolean,
    /// A date, time or duration, carried as text.
    Temporal,
    /// Binary data, carried as base64 text.
    Bytes,
    Enumeration(Arc<EnumShape>),
}

impl ScalarKind {
    /// The token this kind is read from and written as.
    pub fn token(&self) -> Token {
        match self {
            Self::Integer | Self::Float => Token::Number,
            Self::Boolean => Token::Boolean,
            _ => Token::String,
        }
    }
}

/// A closed set of named constants.
#[derive(Debug, Eq, Hash, PartialEq)]
pub struct EnumShape {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumShape {
    pub fn new<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }
}

/// Describes the shape of a value.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum TypeDescriptor {
    /// No declared shape; the value's kind is inferred from the tokens.
    Any,
    Scalar(ScalarKind),
    Seq(Box<TypeDescriptor>),
    /// A sequence with a fixed number of elements.
    Array(Box<TypeDescriptor>, usize),
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    Optional(Box<TypeDescriptor>),
    Record(Arc<RecordShape>),
}

impl TypeDescriptor {
    pub fn seq(elem: TypeDescriptor) -> Self {
        Self::Seq(Box::new(elem))
    }

    pub fn array(elem: TypeDescriptor, len: usize) -> Self {
        Self::Array(Box::new(elem), len)
    }

    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn record(shape: RecordShape) -> Self {
        Self::Record(Arc::new(shape))
    }

    pub fn enumeration(shape: EnumShape) -> Self {
        Self::Scalar(ScalarKind::Enumeration(Arc::new(shape)))
    }

    /// The value a freshly constructed instance holds for this shape.
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Any | Self::Optional(_) => Value::Null,
            Self::Scalar(kind) => match kind {
                ScalarKind::String | ScalarKind::Temporal => Value::String(String::new()),
                ScalarKind::Char => Value::String("\0".to_owned()),
                ScalarKind::Integer => Value::Number(Number::Int(0)),
                ScalarKind::Float => Value::Number(Number::Float(0.0)),
                ScalarKind::Boolean => Value::Bool(false),
                ScalarKind::Bytes => Value::Bytes(Vec::new()),
                ScalarKind::Enumeration(shape) => shape
                    .variants
                    .first()
                    .map_or(Value::Null, |v| Value::String(v.clone())),
            },
            Self::Seq(_) => Value::Array(Vec::new()),
            Self::Array(elem, len) => Value::Array(vec![elem.zero_value(); *len]),
            Self::Map(_, _) => Value::Map(Default::default()),
            Self::Record(shape) => Value::Record(shape.default_instance().clone()),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Scalar(ScalarKind::Enumeration(shape)) => f.write_str(&shape.name),
            Self::Scalar(kind) => write!(f, "{:?}", kind),
            Self::Seq(elem) => write!(f, "seq<{}>", elem),
            Self::Array(elem, len) => write!(f, "[{}; {}]", elem, len),
            Self::Map(k, v) => write!(f, "map<{}, {}>", k, v),
            Self::Optional(inner) => write!(f, "optional<{}>", inner),
            Self::Record(shape) => f.write_str(&shape.name),
        }
    }
}

/// A descriptor that may be computed on first use. This lets record
/// shapes refer to themselves, directly or through other shapes.
pub enum Slot<T> {
    Ready(T),
    Deferred(fn() -> T, OnceLock<T>),
}

impl<T> Slot<T> {
    pub fn deferred(f: fn() -> T) -> Self {
        Self::Deferred(f, OnceLock::new())
    }

    pub fn get(&self) -> &T {
        match self {
            Self::Ready(v) => v,
            Self::Deferred(f, cell) => cell.get_or_init(*f),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(v) => v.fmt(f),
            Self::Deferred(_, cell) => match cell.get() {
                Some(v) => v.fmt(f),
                None => f.write_str("<deferred>"),
            },
        }
    }
}

/// Controls when a field is assigned on read, and emitted on write.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FieldPolicy {
    #[default]
    Always,
    /// The field is never assigned nor emitted.
    Never,
    /// Null values are neither assigned nor emitted.
    NotNull,
    /// Empty sequences and maps are neither assigned nor emitted.
    NotEmpty,
    /// Values equal to the default instance's are not emitted.
    /// Reading treats this like [Always](FieldPolicy::Always).
    NotDefault,
}

impl FieldPolicy {
    /// Returns true if a value read for the field should be assigned.
    pub fn admits_read(self, value: &Value) -> bool {
        match self {
            Self::Always | Self::NotDefault => true,
            Self::Never => false,
            Self::NotNull => !value.is_null(),
            Self::NotEmpty => !value.is_null() && !value.is_empty_collection(),
        }
    }

    /// Returns true if the field's value should be emitted. `default`
    /// is the field's value in the default instance.
    pub fn admits_write(self, value: &Value, default: Option<&Value>) -> bool {
        match self {
            Self::NotDefault => default != Some(value),
            policy => policy.admits_read(value),
        }
    }
}

/// A named field of a record shape.
#[derive(Debug)]
pub struct FieldShape {
    pub name: String,
    descriptor: Slot<TypeDescriptor>,
    pub policy: FieldPolicy,
    pub order: Option<i32>,
    pub default: Option<Value>,
}

impl FieldShape {
    pub fn new(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self::with_slot(name.into(), Slot::Ready(descriptor))
    }

    /// Creates a field whose descriptor is computed on first use.
    pub fn deferred(name: impl Into<String>, descriptor: fn() -> TypeDescriptor) -> Self {
        Self::with_slot(name.into(), Slot::deferred(descriptor))
    }

    fn with_slot(name: String, descriptor: Slot<TypeDescriptor>) -> Self {
        Self {
            name,
            descriptor,
            policy: FieldPolicy::Always,
            order: None,
            default: None,
        }
    }

    pub fn policy(mut self, policy: FieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Emits this field before fields without an explicit order.
    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// The value of the field in a freshly constructed instance.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        self.descriptor.get()
    }

    fn initial_value(&self) -> Value {
        match &self.default {
            Some(v) => v.clone(),
            None => self.descriptor().zero_value(),
        }
    }
}

/// Selects the concrete subtype of a polymorphic record.
#[derive(Debug)]
pub struct Discriminator {
    pub property: String,
    subtypes: Vec<(String, Slot<TypeDescriptor>)>,
}

impl Discriminator {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            subtypes: Vec::new(),
        }
    }

    /// Registers a record subtype under a tag.
    pub fn subtype(mut self, tag: impl Into<String>, shape: TypeDescriptor) -> Self {
        self.subtypes.push((tag.into(), Slot::Ready(shape)));
        self
    }

    pub fn deferred_subtype(mut self, tag: impl Into<String>, shape: fn() -> TypeDescriptor) -> Self {
        self.subtypes.push((tag.into(), Slot::deferred(shape)));
        self
    }

    /// Returns the record shape registered for the tag.
    pub fn find(&self, tag: &str) -> Option<&Arc<RecordShape>> {
        self.subtypes
            .iter()
            .filter(|(t, _)| t == tag)
            .find_map(|(_, slot)| match slot.get() {
                TypeDescriptor::Record(shape) => Some(shape),
                _ => None,
            })
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.subtypes.iter().map(|(t, _)| t.as_str())
    }
}

/// A fixed-shape record: named, ordered fields.
#[derive(Debug)]
pub struct RecordShape {
    pub name: String,
    pub fields: Vec<FieldShape>,
    pub discriminator: Option<Discriminator>,
    /// Fields identifying an instance, see
    /// [KeyedIdentityCache](crate::KeyedIdentityCache).
    pub keys: Vec<String>,
    default: OnceLock<Record>,
}

impl RecordShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            discriminator: None,
            keys: Vec::new(),
            default: OnceLock::new(),
        }
    }

    pub fn field(mut self, field: FieldShape) -> Self {
        self.fields.push(field);
        self
    }

    pub fn discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The instance every read starts from, and the oracle for
    /// [NotDefault](FieldPolicy::NotDefault). Built once per shape.
    pub fn default_instance(&self) -> &Record {
        self.default.get_or_init(|| Record {
            name: self.name.clone(),
            tag: None,
            fields: self
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.initial_value()))
                .collect(),
        })
    }

    /// Fields in emission order. Fields with an explicit order come
    /// first, by order, then the rest in declaration order. If `sort`
    /// is set, all fields are ordered by name instead.
    pub fn write_order(&self, sort: bool) -> Vec<&FieldShape> {
        let mut fields: Vec<&FieldShape> = self.fields.iter().collect();

        if sort {
            fields.sort_by(|a, b| a.name.cmp(&b.name));
        } else {
            fields.sort_by_key(|f| (f.order.is_none(), f.order.unwrap_or(0)));
        }

        fields
    }
}

impl PartialEq for RecordShape {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }

        self.name == other.name
            && self.keys == other.keys
            && self.fields.len() == other.fields.len()
            && self.fields.iter().zip(&other.fields).all(|(a, b)| {
                a.name == b.name
                    && a.policy == b.policy
                    && a.order == b.order
                    && a.default == b.default
                    && same_outline(a.descriptor(), b.descriptor())
            })
            && match (&self.discriminator, &other.discriminator) {
                (None, None) => true,
                (Some(a), Some(b)) => {
                    a.property == b.property
                        && a.subtypes.len() == b.subtypes.len()
                        && a.subtypes.iter().zip(&b.subtypes).all(|((ta, sa), (tb, sb))| {
                            ta == tb && same_outline(sa.get(), sb.get())
                        })
                }
                _ => false,
            }
    }
}

impl Eq for RecordShape {}

impl Hash for RecordShape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        for field in &self.fields {
            field.name.hash(state);
        }
    }
}

/// Compares descriptors without descending into record shapes, which
/// may refer to themselves.
fn same_outline(a: &TypeDescriptor, b: &TypeDescriptor) -> bool {
    use TypeDescriptor::*;

    match (a, b) {
        (Record(x), Record(y)) => Arc::ptr_eq(x, y) || x.name == y.name,
        (Seq(x), Seq(y)) | (Optional(x), Optional(y)) => same_outline(x, y),
        (Array(x, n), Array(y, m)) => n == m && same_outline(x, y),
        (Map(kx, vx), Map(ky, vy)) => same_outline(kx, ky) && same_outline(vx, vy),
        (Any, Any) => true,
        (Scalar(x), Scalar(y)) => x == y,
        _ => false,
    }
}
