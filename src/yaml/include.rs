use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Loads the documents named by `!include` tags.
pub trait IncludeResolver {
    fn resolve(&self, name: &str) -> io::Result<String>;
}

/// Resolves includes as file paths relative to a base directory.
#[derive(Clone, Debug)]
pub struct FsIncludeResolver {
    base: PathBuf,
}

impl FsIncludeResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl IncludeResolver for FsIncludeResolver {
    fn resolve(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.base.join(name))
    }
}

/// Resolves includes from memory, by exact name.
impl IncludeResolver for HashMap<String, String> {
    fn resolve(&self, name: &str) -> io::Result<String> {
        self.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no document named `{}`", name))
        })
    }
}
