//! Chunked fan-out
//!
//! Partitions a one-shot element sequence into consecutive slices and
//! applies a starmap per slice, collected into one group in slice order.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::descriptor::Descriptor;
use crate::error::WeftError;
use crate::group::Group;
use crate::map::StarMap;
use crate::registry::TypeRegistry;
use crate::runtime::{ResultHandle, Runtime};
use crate::sequence::OnceSequence;
use crate::signature::Signature;

/// Registered name of the external chunk-execution task.
pub const CHUNKS_TASK: &str = "weft.chunks";
pub(crate) const CHUNKS_TAG: &str = "chunks";

/// Partitions elements into `size`-length slices (the final slice may be
/// shorter), one [`StarMap`] per slice.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPartitioner {
    base: Descriptor,
    task: Box<Signature>,
    items: OnceSequence,
    size: usize,
}

impl ChunkPartitioner {
    /// Fails fast on a zero chunk size; slices of at least one element
    /// are the only meaningful partition.
    pub fn new(
        task: Signature,
        items: impl Into<OnceSequence>,
        size: usize,
    ) -> Result<Self, WeftError> {
        if size == 0 {
            return Err(WeftError::InvalidChunkSize);
        }
        Ok(Self {
            base: Descriptor::new(CHUNKS_TASK).with_immutable(true),
            task: Box::new(task),
            items: items.into(),
            size,
        })
    }

    pub fn task(&self) -> &Signature {
        &self.task
    }

    pub fn items(&self) -> &OnceSequence {
        &self.items
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn base(&self) -> &Descriptor {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut Descriptor {
        &mut self.base
    }

    /// Partition the materialized sequence into consecutive slices, one
    /// starmap per slice, in order. Pure and idempotent once the sequence
    /// is materialized; the one-shot source is consumed exactly once.
    pub fn to_group(&self) -> Group {
        let task = (*self.task).clone();
        self.items
            .force()
            .chunks(self.size)
            .map(|slice| Signature::StarMap(StarMap::new(task.clone(), slice.to_vec())))
            .collect()
    }

    /// Invocation is `to_group()` dispatched as a batch.
    pub fn apply_async(
        &self,
        rt: &Runtime,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<Arc<dyn ResultHandle>, WeftError> {
        let (_args, _kwargs, options) = self.base.merge(args, kwargs, options);
        self.to_group().apply_async(rt, Vec::new(), Map::new(), options)
    }

    /// Construct, then invoke immediately.
    pub fn apply_chunks(
        task: Signature,
        items: impl Into<OnceSequence>,
        size: usize,
        rt: &Runtime,
    ) -> Result<Arc<dyn ResultHandle>, WeftError> {
        Self::new(task, items, size)?.apply_async(rt, Vec::new(), Map::new(), Map::new())
    }

    /// Force the sequence and pack `{task, it, n}` as the record's kwargs.
    pub fn to_record(&self) -> Descriptor {
        let mut record = self.base.clone();
        record.kwargs.insert("task".into(), self.task.to_value());
        record
            .kwargs
            .insert("it".into(), Value::Array(self.items.force().to_vec()));
        record
            .kwargs
            .insert("n".into(), Value::Number(self.size.into()));
        record
    }

    pub(crate) fn from_record_in(
        record: Descriptor,
        registry: &TypeRegistry,
    ) -> Result<Signature, WeftError> {
        let task = record
            .kwargs
            .get("task")
            .cloned()
            .ok_or_else(|| WeftError::MalformedRecord("missing kwargs field `task`".into()))?;
        let items = match record.kwargs.get("it") {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                return Err(WeftError::MalformedRecord(
                    "missing or non-list kwargs field `it`".into(),
                ))
            }
        };
        let size = record
            .kwargs
            .get("n")
            .and_then(Value::as_u64)
            .ok_or_else(|| WeftError::MalformedRecord("missing kwargs field `n`".into()))?;
        let task = registry.from_value(task)?;
        let mut base = record;
        base.kwargs.remove("task");
        base.kwargs.remove("it");
        base.kwargs.remove("n");
        let mut out = Self::new(task, items, size as usize)?;
        out.base = base;
        Ok(Signature::Chunks(out))
    }

    pub fn clone_with(
        &self,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Self {
        Self {
            base: self.base.clone_with(args, kwargs, options),
            task: self.task.clone(),
            items: self.items.clone(),
            size: self.size,
        }
    }
}

impl fmt::Display for ChunkPartitioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunks({}, n={})", self.task, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sig(name: &str) -> Signature {
        Signature::Task(Descriptor::new(name))
    }

    fn ten() -> Vec<Value> {
        (0..10).map(|i| json!(i)).collect()
    }

    #[test]
    fn partitions_into_ordered_slices_with_short_tail() {
        let chunks = ChunkPartitioner::new(sig("add"), ten(), 3).unwrap();
        let group = chunks.to_group();
        assert_eq!(group.tasks().len(), 4);

        let mut seen = Vec::new();
        let sizes: Vec<usize> = group
            .iter()
            .map(|member| match member {
                Signature::StarMap(star) => {
                    seen.extend(star.items().force().to_vec());
                    star.items().len()
                }
                other => panic!("expected starmap member, got {other}"),
            })
            .collect();
        assert_eq!(sizes, [3, 3, 3, 1]);
        assert_eq!(seen, ten());
    }

    #[test]
    fn to_group_is_idempotent_once_materialized() {
        let chunks =
            ChunkPartitioner::new(sig("add"), OnceSequence::lazy((0..10).map(|i| json!(i))), 3)
                .unwrap();
        let first = chunks.to_group();
        let second = chunks.to_group();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_chunk_size_fails_fast() {
        assert!(matches!(
            ChunkPartitioner::new(sig("add"), Vec::new(), 0),
            Err(WeftError::InvalidChunkSize)
        ));
    }

    #[test]
    fn packed_record_carries_task_items_and_size() {
        let chunks = ChunkPartitioner::new(sig("add"), ten(), 3).unwrap();
        let record = chunks.to_record();
        assert_eq!(record.task, CHUNKS_TASK);
        assert_eq!(record.kwargs["n"], json!(3));
        assert_eq!(record.kwargs["it"].as_array().map(Vec::len), Some(10));
    }
}
