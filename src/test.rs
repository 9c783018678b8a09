//! Utilities for testing and debugging.

mod printsink;
pub use printsink::PrintingTokenSink;
