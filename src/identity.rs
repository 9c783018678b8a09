//! The reference deduplication hook.
//!
//! Readers offer every materialized record to
//! [IdentityCache::remap_or_cache], and writers consult
//! [IdentityCache::has_been_emitted] before emitting a record in full.
//! A cache lives for one read or write call.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::descriptor::RecordShape;
use crate::value::{Record, Value};

/// Identifies one record instance within a shape.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Identity {
    pub shape: String,
    pub key: String,
}

/// Hook points for an external layer that deduplicates records.
///
/// All methods have pass-through defaults.
pub trait IdentityCache {
    /// Returns a previously read instance with the same identity, or
    /// remembers and returns `record`.
    fn remap_or_cache(&mut self, _shape: &RecordShape, record: Record) -> Record {
        record
    }

    /// The identity of a record, if it has one.
    fn identity(&self, _shape: &RecordShape, _record: &Record) -> Option<Identity> {
        None
    }

    fn has_been_emitted(&self, _identity: &Identity) -> bool {
        false
    }

    fn mark_emitted(&mut self, _identity: Identity) {}

    /// The value written in place of a record already emitted.
    fn reference(&self, _shape: &RecordShape, _record: &Record) -> Value {
        Value::Null
    }
}

/// Never deduplicates.
#[derive(Debug, Default)]
pub struct NoIdentity;

impl IdentityCache for NoIdentity {}

/// Identifies records by the values of their shape's
/// [key fields](RecordShape::keys).
///
/// On read, records with equal keys resolve to the first instance.
/// On write, repeated records are emitted as a map of their keys only.
/// Shapes without key fields, or records whose keys are all null, are
/// passed through.
#[derive(Debug, Default)]
pub struct KeyedIdentityCache {
    instances: HashMap<Identity, Record>,
    emitted: HashSet<Identity>,
}

impl KeyedIdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of distinct instances read so far.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl IdentityCache for KeyedIdentityCache {
    fn remap_or_cache(&mut self, shape: &RecordShape, record: Record) -> Record {
        match self.identity(shape, &record) {
            Some(id) => self.instances.entry(id).or_insert(record).clone(),
            None => record,
        }
    }

    fn identity(&self, shape: &RecordShape, record: &Record) -> Option<Identity> {
        if shape.keys.is_empty() {
            return None;
        }

        let values: Vec<&Value> = shape
            .keys
            .iter()
            .map(|k| record.get(k).unwrap_or(&Value::Null))
            .collect();
        if values.iter().all(|v| v.is_null()) {
            return None;
        }

        // Whole numbers are keyed as integers, so Float(1.0) and UInt(1)
        // share a key.
        let key = values
            .iter()
            .map(|v| match v {
                Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                    (Some(i), _) => i.to_string(),
                    (None, Some(u)) => u.to_string(),
                    (None, None) => n.to_string(),
                },
                v => format!("{:?}", v),
            })
            .collect::<Vec<_>>()
            .join(",");

        Some(Identity {
            shape: shape.name.clone(),
            key,
        })
    }

    fn has_been_emitted(&self, identity: &Identity) -> bool {
        self.emitted.contains(identity)
    }

    fn mark_emitted(&mut self, identity: Identity) {
        self.emitted.insert(identity);
    }

    fn reference(&self, shape: &RecordShape, record: &Record) -> Value {
        let keys: BTreeMap<String, Value> = shape
            .keys
            .iter()
            .map(|k| (k.clone(), record.get(k).cloned().unwrap_or_default()))
            .collect();

        Value::Map(keys)
    }
}
