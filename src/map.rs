//! Elementwise fan-out: map and starmap
//!
//! Both apply one task across a one-shot element sequence and differ only
//! in how each element becomes arguments: map passes the element as the
//! single positional argument, starmap unpacks it as the full positional
//! tuple. Remote transport cannot carry unbounded sources, so invocation
//! always forces the sequence into a finite list and ships `{task, it}`
//! as a single payload through the dedicated registered task name.
//!
//! These variants are always immutable: the element sequence fixes every
//! per-task argument, so per-invocation arg/kwarg overrides are dropped.

use std::fmt;

use serde_json::{Map, Value};

use crate::descriptor::Descriptor;
use crate::error::WeftError;
use crate::registry::TypeRegistry;
use crate::render::render_items;
use crate::sequence::OnceSequence;
use crate::signature::Signature;

/// Registered name of the external batch-map task.
pub const MAP_TASK: &str = "weft.map";
/// Registered name of the external batch-starmap task.
pub const STARMAP_TASK: &str = "weft.starmap";
pub(crate) const MAP_TAG: &str = "map";
pub(crate) const STARMAP_TAG: &str = "starmap";

/// Bound on the element-sequence portion of the render.
const RENDER_LIMIT: usize = 100;

fn base_for(task_name: &str) -> Descriptor {
    Descriptor::new(task_name).with_immutable(true)
}

fn pack(base: &Descriptor, task: &Signature, items: &OnceSequence) -> Descriptor {
    let mut record = base.clone();
    record.kwargs.insert("task".into(), task.to_value());
    record
        .kwargs
        .insert("it".into(), Value::Array(items.force().to_vec()));
    record
}

fn unpack(
    record: &Descriptor,
    registry: &TypeRegistry,
) -> Result<(Signature, OnceSequence), WeftError> {
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
    Ok((
        registry.from_value(task)?,
        OnceSequence::materialized(items),
    ))
}

/// Applies `task` to each element as one positional argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementwiseMap {
    base: Descriptor,
    task: Box<Signature>,
    items: OnceSequence,
}

impl ElementwiseMap {
    pub fn new(task: Signature, items: impl Into<OnceSequence>) -> Self {
        Self {
            base: base_for(MAP_TASK),
            task: Box::new(task),
            items: items.into(),
        }
    }

    pub fn task(&self) -> &Signature {
        &self.task
    }

    pub fn items(&self) -> &OnceSequence {
        &self.items
    }

    pub fn base(&self) -> &Descriptor {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut Descriptor {
        &mut self.base
    }

    /// Force the sequence and pack `{task, it}` as the record's kwargs.
    pub fn to_record(&self) -> Descriptor {
        pack(&self.base, &self.task, &self.items)
    }

    pub(crate) fn from_record_in(
        record: Descriptor,
        registry: &TypeRegistry,
    ) -> Result<Signature, WeftError> {
        let (task, items) = unpack(&record, registry)?;
        let mut base = record;
        base.kwargs.remove("task");
        base.kwargs.remove("it");
        Ok(Signature::Map(ElementwiseMap {
            base,
            task: Box::new(task),
            items,
        }))
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
        }
    }
}

impl fmt::Display for ElementwiseMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}(x) for x in {}]",
            self.task.task_name(),
            render_items(self.items.force(), RENDER_LIMIT)
        )
    }
}

/// Unpacks each element as the full positional-argument tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct StarMap {
    base: Descriptor,
    task: Box<Signature>,
    items: OnceSequence,
}

impl StarMap {
    pub fn new(task: Signature, items: impl Into<OnceSequence>) -> Self {
        Self {
            base: base_for(STARMAP_TASK),
            task: Box::new(task),
            items: items.into(),
        }
    }

    pub fn task(&self) -> &Signature {
        &self.task
    }

    pub fn items(&self) -> &OnceSequence {
        &self.items
    }

    pub fn base(&self) -> &Descriptor {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut Descriptor {
        &mut self.base
    }

    pub fn to_record(&self) -> Descriptor {
        pack(&self.base, &self.task, &self.items)
    }

    pub(crate) fn from_record_in(
        record: Descriptor,
        registry: &TypeRegistry,
    ) -> Result<Signature, WeftError> {
        let (task, items) = unpack(&record, registry)?;
        let mut base = record;
        base.kwargs.remove("task");
        base.kwargs.remove("it");
        Ok(Signature::StarMap(StarMap {
            base,
            task: Box::new(task),
            items,
        }))
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
        }
    }
}

impl fmt::Display for StarMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}(*x) for x in {}]",
            self.task.task_name(),
            render_items(self.items.force(), RENDER_LIMIT)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sig(name: &str) -> Signature {
        Signature::Task(Descriptor::new(name))
    }

    #[test]
    fn map_is_forced_immutable() {
        let map = ElementwiseMap::new(sig("add"), vec![json!(1), json!(2)]);
        assert!(map.base().immutable);
    }

    #[test]
    fn packed_record_carries_task_and_finite_list() {
        let map = ElementwiseMap::new(
            sig("add"),
            OnceSequence::lazy((0..4).map(|i| json!(i))),
        );
        let record = map.to_record();
        assert_eq!(record.task, MAP_TASK);
        assert_eq!(record.kwargs["it"].as_array().map(Vec::len), Some(4));
        assert_eq!(record.kwargs["task"]["task"], json!("add"));
        // Dispatch is keyed off the task name, not a variant tag.
        assert!(record.variant_tag.is_none());
    }

    #[test]
    fn renders_as_comprehension() {
        let map = ElementwiseMap::new(sig("add"), vec![json!(1), json!(2)]);
        assert_eq!(map.to_string(), "[add(x) for x in [1, 2]]");
        let star = StarMap::new(sig("add"), vec![json!([1, 2])]);
        assert_eq!(star.to_string(), "[add(*x) for x in [[1,2]]]");
    }

    #[test]
    fn render_is_length_bounded() {
        let items: Vec<Value> = (0..200).map(|i| json!(i)).collect();
        let map = ElementwiseMap::new(sig("add"), items);
        let rendered = map.to_string();
        assert!(rendered.len() < 130);
        assert!(rendered.contains("..."));
    }
}
