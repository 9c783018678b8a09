//! The dispatch table from descriptors to read and write strategies.
//!
//! Strategies are resolved once per distinct descriptor and cached for
//! the lifetime of the registry. Custom readers and writers must be
//! registered before their descriptor is first resolved; later
//! registrations are rejected, never silently applied to some calls
//! and not others.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::descriptor::{RecordShape, ScalarKind, TypeDescriptor};
use crate::error::RegisterError;
use crate::token::Token;
use crate::value::Value;

pub type ReadFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;
pub type WriteFn = dyn Fn(&Value) -> Result<Value, String> + Send + Sync;
pub type Predicate = dyn Fn(&TypeDescriptor) -> bool + Send + Sync;

/// Reads a value from the text of a single scalar token.
pub struct CustomReader {
    /// The only token accepted, besides [Token::Null].
    pub token: Token,
    read: Box<ReadFn>,
}

impl CustomReader {
    pub fn read(&self, text: &str) -> Result<Value, String> {
        (self.read)(text)
    }
}

impl fmt::Debug for CustomReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomReader")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Transforms a value into another value, which is then written with
/// the `target` descriptor.
pub struct CustomWriter {
    pub target: TypeDescriptor,
    write: Box<WriteFn>,
}

impl CustomWriter {
    pub fn transform(&self, value: &Value) -> Result<Value, String> {
        (self.write)(value)
    }
}

impl fmt::Debug for CustomWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomWriter")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// How a descriptor is read or written.
#[derive(Clone, Debug)]
pub enum Strategy<C> {
    Custom(C),
    Scalar(ScalarKind),
    Seq(TypeDescriptor),
    Array(TypeDescriptor, usize),
    Map(TypeDescriptor, TypeDescriptor),
    Optional(TypeDescriptor),
    Polymorphic(Arc<RecordShape>),
    Record(Arc<RecordShape>),
    Any,
}

pub type ReadStrategy = Strategy<Arc<CustomReader>>;
pub type WriteStrategy = Strategy<Arc<CustomWriter>>;

impl<C> Strategy<C> {
    fn builtin(desc: &TypeDescriptor) -> Self {
        match desc {
            TypeDescriptor::Any => Self::Any,
            TypeDescriptor::Scalar(kind) => Self::Scalar(kind.clone()),
            TypeDescriptor::Seq(elem) => Self::Seq((**elem).clone()),
            TypeDescriptor::Array(elem, len) => Self::Array((**elem).clone(), *len),
            TypeDescriptor::Map(k, v) => Self::Map((**k).clone(), (**v).clone()),
            TypeDescriptor::Optional(inner) => Self::Optional((**inner).clone()),
            TypeDescriptor::Record(shape) if shape.discriminator.is_some() => {
                Self::Polymorphic(shape.clone())
            }
            TypeDescriptor::Record(shape) => Self::Record(shape.clone()),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Custom(_) => "custom",
            Self::Scalar(_) => "scalar",
            Self::Seq(_) => "sequence",
            Self::Array(_, _) => "array",
            Self::Map(_, _) => "map",
            Self::Optional(_) => "optional",
            Self::Polymorphic(_) => "polymorphic",
            Self::Record(_) => "record",
            Self::Any => "any",
        }
    }
}

enum Matcher {
    Exact(TypeDescriptor),
    Predicate(Box<Predicate>),
}

impl Matcher {
    fn matches(&self, desc: &TypeDescriptor) -> bool {
        match self {
            Self::Exact(d) => d == desc,
            Self::Predicate(p) => p(desc),
        }
    }
}

/// One direction of the dispatch table: custom entries in
/// registration order, and the populate-once cache.
struct Table<C> {
    custom: RwLock<Vec<(Matcher, C)>>,
    cache: RwLock<HashMap<TypeDescriptor, Strategy<C>>>,
}

impl<C: Clone> Table<C> {
    fn new() -> Self {
        Self {
            custom: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn register(&self, matcher: Matcher, entry: C, what: &str) -> Result<(), RegisterError> {
        let mut custom = write_lock(&self.custom);

        if let Some(desc) = read_lock(&self.cache).keys().find(|d| matcher.matches(d)) {
            log::warn!("{} registered after {} was resolved; ignoring it", what, desc);
            return Err(RegisterError(desc.to_string()));
        }

        custom.push((matcher, entry));
        Ok(())
    }

    fn resolve(&self, desc: &TypeDescriptor, what: &str) -> Strategy<C> {
        if let Some(s) = read_lock(&self.cache).get(desc) {
            return s.clone();
        }

        // Held until the strategy is cached, so registration cannot
        // slip in between.
        let custom = read_lock(&self.custom);
        let strategy = custom
            .iter()
            .find(|(m, _)| m.matches(desc))
            .map(|(_, c)| Strategy::Custom(c.clone()))
            .unwrap_or_else(|| Strategy::builtin(desc));

        let mut cache = write_lock(&self.cache);
        let strategy = cache.entry(desc.clone()).or_insert(strategy).clone();
        log::debug!("resolved {} of {} to {}", what, desc, strategy.name());

        strategy
    }

    fn is_resolved(&self, desc: &TypeDescriptor) -> bool {
        read_lock(&self.cache).contains_key(desc)
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Maps descriptors to read and write strategies.
///
/// Resolution order: custom entries (exact or predicate, first match
/// in registration order), then the built-in strategy for the
/// descriptor's kind.
pub struct Registry {
    readers: Table<Arc<CustomReader>>,
    writers: Table<Arc<CustomWriter>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            readers: Table::new(),
            writers: Table::new(),
        }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

        GLOBAL.get_or_init(|| Arc::new(Registry::new())).clone()
    }

    /// Reads `desc` from a single `token`, converting its text with `f`.
    pub fn register_reader<F>(&self, desc: TypeDescriptor, token: Token, f: F) -> Result<(), RegisterError>
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.readers
            .register(Matcher::Exact(desc), custom_reader(token, f), "reader")
    }

    /// Like [Self::register_reader], for every descriptor matching
    /// `pred`.
    pub fn register_reader_if<P, F>(&self, pred: P, token: Token, f: F) -> Result<(), RegisterError>
    where
        P: Fn(&TypeDescriptor) -> bool + Send + Sync + 'static,
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.readers.register(
            Matcher::Predicate(Box::new(pred)),
            custom_reader(token, f),
            "reader",
        )
    }

    /// Writes `desc` by transforming the value with `f`, and writing
    /// the result as `target`.
    pub fn register_writer<F>(
        &self,
        desc: TypeDescriptor,
        target: TypeDescriptor,
        f: F,
    ) -> Result<(), RegisterError>
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.writers
            .register(Matcher::Exact(desc), custom_writer(target, f), "writer")
    }

    pub fn register_writer_if<P, F>(
        &self,
        pred: P,
        target: TypeDescriptor,
        f: F,
    ) -> Result<(), RegisterError>
    where
        P: Fn(&TypeDescriptor) -> bool + Send + Sync + 'static,
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.writers.register(
            Matcher::Predicate(Box::new(pred)),
            custom_writer(target, f),
            "writer",
        )
    }

    pub fn resolve_reader(&self, desc: &TypeDescriptor) -> ReadStrategy {
        self.readers.resolve(desc, "reader")
    }

    pub fn resolve_writer(&self, desc: &TypeDescriptor) -> WriteStrategy {
        self.writers.resolve(desc, "writer")
    }

    /// Returns true if a reader or writer for `desc` is already fixed.
    pub fn is_resolved(&self, desc: &TypeDescriptor) -> bool {
        self.readers.is_resolved(desc) || self.writers.is_resolved(desc)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("readers", &read_lock(&self.readers.custom).len())
            .field("writers", &read_lock(&self.writers.custom).len())
            .finish_non_exhaustive()
    }
}

fn custom_reader<F>(token: Token, f: F) -> Arc<CustomReader>
where
    F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
{
    Arc::new(CustomReader {
        token,
        read: Box::new(f),
    })
}

fn custom_writer<F>(target: TypeDescriptor, f: F) -> Arc<CustomWriter>
where
    F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
{
    Arc::new(CustomWriter {
        target,
        write: Box::new(f),
    })
}
