//! shapeser reads and writes structured text (JSON and YAML) against
//! declared shapes. Every format is a tokenizer on the read side and an
//! emitter on the write side, meeting in a shared stream of [Token]s
//! such as [ObjectStart](Token::ObjectStart),
//! [PropertyKey](Token::PropertyKey) and [Number](Token::Number).
//!
//! ## Design
//!
//! The shape of a value is described by a [TypeDescriptor]: a scalar
//! kind, a sequence, a map, an optional value or a fixed-shape record.
//! Reading and writing dispatch on the descriptor, through a
//! [Registry] that resolves each descriptor to a strategy once and
//! caches it. Custom readers and writers can be registered for exact
//! descriptors, or for any descriptor matching a predicate.
//!
//! * The read side pulls. A [ReadContext] asks a [Tokenizer] for one
//!   token at a time, and recurses through the descriptor to build a
//!   [Value].
//! * The write side pushes. A [WriteContext] walks a [Value] and
//!   yields tokens into a [TokenSink], usually an emitter rendering
//!   text.
//! * Rust types are bound to descriptors through [Shaped], which can
//!   be derived for structs and enums.
//!
//! Records may be polymorphic: a discriminator property, which must
//! come first, selects the concrete record shape. An [IdentityCache]
//! lets an outside layer deduplicate records by key.
//!
//! ## Example
//!
//! ```
//! use shapeser::{Codec, Format, Shaped};
//!
//! #[derive(Debug, PartialEq, Shaped)]
//! struct Server {
//!     host: String,
//!     #[shape(default = 8080)]
//!     port: u16,
//! }
//!
//! let codec = Codec::new();
//! let server: Server = codec.read_str(Format::Yaml, "host: example.com").unwrap();
//! assert_eq!(server, Server { host: "example.com".to_owned(), port: 8080 });
//! assert_eq!(
//!     codec.write_string(Format::Json, &server).unwrap(),
//!     r#"{"host":"example.com","port":8080}"#
//! );
//! ```

mod codec;
pub use codec::Codec;
pub use codec::Format;

mod descriptor;
pub use descriptor::{
    Discriminator, EnumShape, FieldPolicy, FieldShape, RecordShape, ScalarKind, TypeDescriptor,
};

mod error;
pub use error::{Position, ReadError, ReadErrorKind, RegisterError, WriteError};

mod from;
pub use from::{ReadContext, MERGE_KEY};

mod identity;
pub use identity::{Identity, IdentityCache, KeyedIdentityCache, NoIdentity};

mod into;
pub use into::WriteContext;

pub mod json;

mod lex;
pub use lex::{LexState, Tokenizer};

mod options;
pub use options::Options;

mod registry;
pub use registry::Registry;

pub mod scalar;

mod shape;
pub use shape::{expect_record, is_subtype, mismatch, take_field, Bytes, MapKey, Shaped};

/// Derives [Shaped](trait@Shaped) for structs and enums.
pub use shapeser_derive::Shaped;

mod sink;
pub use sink::{IoWriter, TokenSink};

pub mod source;

pub mod test;

pub mod token;
pub use token::{Token, TokenTypes};

mod value;
pub use value::{Number, Record, Value};

mod vec;
pub use vec::{TokenVec, TokenVecTokenizer};

pub mod yaml;
