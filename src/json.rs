//! Reads and writes [JSON](https://json.org/).

mod from;
pub use from::JsonSink;

mod into;
pub use into::JsonTokenizer;
