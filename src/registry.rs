//! TypeRegistry: polymorphic deserialization dispatch
//!
//! A wire record carries an optional discriminator tag; the registry maps
//! tags to variant deserialize factories. Records without a registered
//! tag fall through two ways: the dedicated fan-out task names dispatch
//! map/starmap/chunks (those variants carry no tag on the wire), and
//! anything else becomes a plain descriptor.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::chain::{Chain, CHAIN_TAG};
use crate::chord::{Chord, CHORD_TAG};
use crate::chunks::{ChunkPartitioner, CHUNKS_TAG, CHUNKS_TASK};
use crate::descriptor::Descriptor;
use crate::error::WeftError;
use crate::group::{Group, GROUP_TAG};
use crate::map::{ElementwiseMap, StarMap, MAP_TAG, MAP_TASK, STARMAP_TAG, STARMAP_TASK};
use crate::signature::Signature;

/// Factory rebuilding one variant from its wire record.
pub type DeserializeFn = fn(Descriptor, &TypeRegistry) -> Result<Signature, WeftError>;

/// Builtin dispatch table backing `Signature`'s serde integration.
pub(crate) static TYPES: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::with_builtins);

/// Discriminator-keyed dispatch table for deserialization.
pub struct TypeRegistry {
    table: DashMap<String, DeserializeFn>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    /// Table with every builtin variant registered. The fan-out tags are
    /// included for records that do carry them, even though the builtin
    /// serializers key those variants off their task names instead.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(CHAIN_TAG, Chain::from_record_in);
        registry.register(GROUP_TAG, Group::from_record_in);
        registry.register(CHORD_TAG, Chord::from_record_in);
        registry.register(MAP_TAG, ElementwiseMap::from_record_in);
        registry.register(STARMAP_TAG, StarMap::from_record_in);
        registry.register(CHUNKS_TAG, ChunkPartitioner::from_record_in);
        registry
    }

    /// One-time registration. The first factory for a tag wins and
    /// duplicates are ignored, so registration order does not matter.
    /// Returns whether the tag was newly registered.
    pub fn register(&self, tag: impl Into<String>, factory: DeserializeFn) -> bool {
        match self.table.entry(tag.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(factory);
                true
            }
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.table.contains_key(tag)
    }

    /// Rebuild a signature from its wire record: registered tag first,
    /// then the dedicated fan-out task names, then a plain descriptor.
    pub fn deserialize(&self, record: Descriptor) -> Result<Signature, WeftError> {
        if let Some(tag) = record.variant_tag.as_deref() {
            let factory = self.table.get(tag).map(|entry| *entry);
            if let Some(factory) = factory {
                return factory(record, self);
            }
        }
        match record.task.as_str() {
            MAP_TASK => ElementwiseMap::from_record_in(record, self),
            STARMAP_TASK => StarMap::from_record_in(record, self),
            CHUNKS_TASK => ChunkPartitioner::from_record_in(record, self),
            _ => Ok(Signature::Task(record)),
        }
    }

    /// Rebuild a signature from a raw wire value.
    pub fn from_value(&self, value: Value) -> Result<Signature, WeftError> {
        let record: Descriptor = serde_json::from_value(value)?;
        self.deserialize(record)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a kwargs field holding a list of nested wire records.
pub(crate) fn member_list(
    kwargs: &Map<String, Value>,
    key: &str,
    registry: &TypeRegistry,
) -> Result<Vec<Signature>, WeftError> {
    match kwargs.get(key) {
        Some(Value::Array(records)) => records
            .iter()
            .map(|record| registry.from_value(record.clone()))
            .collect(),
        _ => Err(WeftError::MalformedRecord(format!(
            "missing or non-list kwargs field `{key}`"
        ))),
    }
}
