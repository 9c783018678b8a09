//! Binds Rust types to type descriptors and the value model.
//!
//! A [Shaped] type knows its [TypeDescriptor], and converts between
//! itself and a [Value]. Records and enumerations usually get their
//! implementation from `#[derive(Shaped)]`.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::descriptor::{ScalarKind, TypeDescriptor};
use crate::error::{ReadError, ReadErrorKind};
use crate::value::{Number, Record, Value};

/// A Rust type with a known shape.
pub trait Shaped: Sized {
    /// Describes the values of this type.
    fn descriptor() -> TypeDescriptor;

    /// Converts a value read with [Self::descriptor].
    fn from_value(value: Value) -> Result<Self, ReadError>;

    fn to_value(&self) -> Value;
}

/// A type usable as a map key. Keys are carried as strings.
pub trait MapKey: Sized {
    fn key_descriptor() -> TypeDescriptor;

    fn from_key(key: &str) -> Result<Self, ReadError>;

    fn to_key(&self) -> String;
}

fn shape_error(msg: String) -> ReadError {
    ReadError::new(ReadErrorKind::Shape(msg))
}

/// The error for a value of the wrong kind.
pub fn mismatch(want: &str, value: &Value) -> ReadError {
    shape_error(format!("expected {}, found {}", want, value.kind()))
}

/// Unwraps a record value.
pub fn expect_record(value: Value, name: &str) -> Result<Record, ReadError> {
    match value {
        Value::Record(record) => Ok(record),
        value => Err(mismatch(name, &value)),
    }
}

/// Removes a field from a record and converts it. A missing field
/// converts from [Value::Null].
pub fn take_field<T: Shaped>(record: &mut Record, name: &str) -> Result<T, ReadError> {
    let value = record.take(name).unwrap_or_default();
    T::from_value(value).map_err(|err| match err.kind {
        ReadErrorKind::Shape(msg) => shape_error(format!("{}.{}: {}", record.name, name, msg)),
        _ => err,
    })
}

/// Returns true if `record`, read through a polymorphic shape, is an
/// instance of the subtype registered under `tag`. Records without a
/// tag match by shape name.
pub fn is_subtype(record: &Record, tag: &str, desc: &TypeDescriptor) -> bool {
    match &record.tag {
        Some(t) => t == tag,
        None => matches!(desc, TypeDescriptor::Record(shape) if shape.name == record.name),
    }
}

macro_rules! int_shaped [
    ($($ty:ty => $via:ty),*$(,)?) => {
        $(impl Shaped for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::Scalar(ScalarKind::Integer)
            }

            fn from_value(value: Value) -> Result<Self, ReadError> {
                let Value::Number(n) = value else {
                    return Err(mismatch(stringify!($ty), &value));
                };

                n.as_i64()
                    .and_then(|v| <$ty>::try_from(v).ok())
                    .or_else(|| n.as_u64().and_then(|v| <$ty>::try_from(v).ok()))
                    .ok_or_else(|| shape_error(format!("{} is out of range for {}", n, stringify!($ty))))
            }

            fn to_value(&self) -> Value {
                Value::Number(Number::from(*self as $via))
            }
        }

        impl MapKey for $ty {
            fn key_descriptor() -> TypeDescriptor {
                TypeDescriptor::Scalar(ScalarKind::Integer)
            }

            fn from_key(key: &str) -> Result<Self, ReadError> {
                key.parse()
                    .map_err(|_| ReadError::new(ReadErrorKind::InvalidNumber(key.to_owned())))
            }

            fn to_key(&self) -> String {
                self.to_string()
            }
        })*
    };
];

int_shaped![
    i8 => i64,
    i16 => i64,
    i32 => i64,
    i64 => i64,
    isize => i64,
    u8 => u64,
    u16 => u64,
    u32 => u64,
    u64 => u64,
    usize => u64,
];

macro_rules! float_shaped [
    ($($ty:ty),*) => {
        $(impl Shaped for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::Scalar(ScalarKind::Float)
            }

            fn from_value(value: Value) -> Result<Self, ReadError> {
                match value {
                    Value::Number(n) => Ok(n.as_f64() as $ty),
                    value => Err(mismatch(stringify!($ty), &value)),
                }
            }

            fn to_value(&self) -> Value {
                Value::Number(Number::Float(f64::from(*self)))
            }
        })*
    };
];

float_shaped![f32, f64];

impl Shaped for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Scalar(ScalarKind::Boolean)
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        value.as_bool().ok_or_else(|| mismatch("bool", &value))
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Shaped for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Scalar(ScalarKind::String)
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        match value {
            Value::String(s) => Ok(s),
            value => Err(mismatch("string", &value)),
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl MapKey for String {
    fn key_descriptor() -> TypeDescriptor {
        TypeDescriptor::Scalar(ScalarKind::String)
    }

    fn from_key(key: &str) -> Result<Self, ReadError> {
        Ok(key.to_owned())
    }

    fn to_key(&self) -> String {
        self.clone()
    }
}

impl Shaped for char {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Scalar(ScalarKind::Char)
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        let s = value.as_str().ok_or_else(|| mismatch("char", &value))?;
        let mut chars = s.chars();

        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(shape_error(format!("expected a single character, found {:?}", s))),
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

/// Binary data, carried as base64 text.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Bytes(pub Vec<u8>);

impl Shaped for Bytes {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Scalar(ScalarKind::Bytes)
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        match value {
            Value::Bytes(v) => Ok(Bytes(v)),
            value => Err(mismatch("bytes", &value)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.0.clone())
    }
}

impl Shaped for Value {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Any
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        Ok(value)
    }

    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: Shaped> Shaped for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(T::descriptor())
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        match value {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_value)
    }
}

impl<T: Shaped> Shaped for Box<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        T::from_value(value).map(Box::new)
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

fn elements<T: Shaped>(value: Value) -> Result<Vec<T>, ReadError> {
    match value {
        Value::Array(items) => items.into_iter().map(T::from_value).collect(),
        value => Err(mismatch("array", &value)),
    }
}

impl<T: Shaped> Shaped for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::seq(T::descriptor())
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        elements(value)
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(T::to_value).collect())
    }
}

impl<T: Shaped, const N: usize> Shaped for [T; N] {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::array(T::descriptor(), N)
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        let items = elements::<T>(value)?;
        let found = items.len();

        items.try_into().map_err(|_| {
            ReadError::new(ReadErrorKind::LengthMismatch { expected: N, found })
        })
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(T::to_value).collect())
    }
}

fn entries<K: MapKey, V: Shaped>(value: Value) -> Result<Vec<(K, V)>, ReadError> {
    match value {
        Value::Map(m) => m
            .into_iter()
            .map(|(k, v)| Ok((K::from_key(&k)?, V::from_value(v)?)))
            .collect(),
        value => Err(mismatch("map", &value)),
    }
}

impl<K: MapKey + Eq + Hash, V: Shaped> Shaped for HashMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(K::key_descriptor(), V::descriptor())
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        Ok(entries(value)?.into_iter().collect())
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_key(), v.to_value())).collect())
    }
}

impl<K: MapKey + Ord, V: Shaped> Shaped for BTreeMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(K::key_descriptor(), V::descriptor())
    }

    fn from_value(value: Value) -> Result<Self, ReadError> {
        Ok(entries(value)?.into_iter().collect())
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_key(), v.to_value())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(u8::from_value(Value::from(200u8)).unwrap(), 200);
        assert_eq!(i64::from_value(Value::Number(Number::UInt(5))).unwrap(), 5);
        assert_eq!(u32::from_value(Value::Number(Number::Float(3.0))).unwrap(), 3);
        assert!(u8::from_value(Value::from(300i32)).is_err());
        assert!(i32::from_value(Value::from("1")).is_err());
        assert_eq!((-3i16).to_value(), Value::Number(Number::Int(-3)));
        assert_eq!(7usize.to_value(), Value::Number(Number::UInt(7)));
    }

    #[test]
    fn test_scalars() {
        assert_eq!(f64::from_value(Value::from(2i32)).unwrap(), 2.0);
        assert_eq!(char::from_value(Value::from("x")).unwrap(), 'x');
        assert!(char::from_value(Value::from("xy")).is_err());
        assert_eq!(
            Bytes::from_value(Value::Bytes(vec![1, 2])).unwrap(),
            Bytes(vec![1, 2])
        );
        assert!(bool::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_collections() {
        let v = Value::Array(vec![Value::from(1i32), Value::from(2i32)]);
        assert_eq!(Vec::<i32>::from_value(v.clone()).unwrap(), vec![1, 2]);
        assert_eq!(<[i32; 2]>::from_value(v.clone()).unwrap(), [1, 2]);
        assert!(matches!(
            <[i32; 3]>::from_value(v).unwrap_err().kind,
            ReadErrorKind::LengthMismatch { expected: 3, found: 2 }
        ));

        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Some(4i32).to_value(), Value::from(4i32));
        assert_eq!(None::<i32>.to_value(), Value::Null);

        let m = Value::Map(BTreeMap::from([("1".to_owned(), Value::from("a"))]));
        let got = HashMap::<u32, String>::from_value(m.clone()).unwrap();
        assert_eq!(got.get(&1).map(String::as_str), Some("a"));
        assert_eq!(got.to_value(), m);
        assert!(BTreeMap::<u32, String>::from_value(Value::Map(BTreeMap::from([(
            "x".to_owned(),
            Value::from("a")
        )])))
        .is_err());
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(
            Option::<Vec<u8>>::descriptor(),
            TypeDescriptor::optional(TypeDescriptor::seq(TypeDescriptor::Scalar(
                ScalarKind::Integer
            )))
        );
        assert_eq!(
            BTreeMap::<String, bool>::descriptor(),
            TypeDescriptor::map(
                TypeDescriptor::Scalar(ScalarKind::String),
                TypeDescriptor::Scalar(ScalarKind::Boolean)
            )
        );
        assert_eq!(Box::<char>::descriptor(), char::descriptor());
    }

    #[test]
    fn test_take_field() {
        let mut record = Record::new("Point").with("x", 1i32);
        assert_eq!(take_field::<i32>(&mut record, "x").unwrap(), 1);
        assert_eq!(take_field::<Option<i32>>(&mut record, "y").unwrap(), None);

        let err = take_field::<i32>(&mut record, "y").unwrap_err();
        assert!(err.to_string().contains("Point.y"), "{}", err);
    }
}
