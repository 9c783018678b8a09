//! Reads and writes a subset of [YAML](https://yaml.org/).
//!
//! The reader understands block and flow style, anchors and aliases,
//! block scalars, a handful of tags and `!include`. The writer always
//! produces block style.

mod from;
pub use from::YamlSink;

mod include;
pub use include::{FsIncludeResolver, IncludeResolver};

mod into;
pub use into::YamlTokenizer;
