//! Signature: the tagged union over every IR variant
//!
//! One enum, one dispatch point. Every composite shares the Descriptor
//! capability set (partial application, copy-on-write cloning, in-place
//! option mutation, callback linking, serialization) and `Signature` is
//! where that surface lives.

use std::fmt;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::chain::Chain;
use crate::chord::Chord;
use crate::chunks::ChunkPartitioner;
use crate::descriptor::{Descriptor, LINK_ERROR_KEY, LINK_KEY};
use crate::error::WeftError;
use crate::group::Group;
use crate::map::{ElementwiseMap, StarMap};
use crate::registry::TYPES;
use crate::runtime::{ResultHandle, Runtime};

/// Any node of the composition IR.
#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
    /// A single task invocation.
    Task(Descriptor),
    /// Sequential composite.
    Chain(Chain),
    /// Parallel composite.
    Group(Group),
    /// Barrier composite: group header plus optional body.
    Chord(Chord),
    /// Per-element fan-out, one positional argument per element.
    Map(ElementwiseMap),
    /// Per-element fan-out, each element unpacked as the argument tuple.
    StarMap(StarMap),
    /// Chunked fan-out over consecutive slices.
    Chunks(ChunkPartitioner),
}

impl Signature {
    /// Wire record for this node. Composites pack their members into the
    /// record's kwargs.
    pub fn to_record(&self) -> Descriptor {
        match self {
            Signature::Task(d) => d.clone(),
            Signature::Chain(c) => c.to_record(),
            Signature::Group(g) => g.to_record(),
            Signature::Chord(c) => c.to_record(),
            Signature::Map(m) => m.to_record(),
            Signature::StarMap(m) => m.to_record(),
            Signature::Chunks(c) => c.to_record(),
        }
    }

    pub fn to_value(&self) -> Value {
        self.to_record().to_value()
    }

    /// Rebuild a node from a wire value via the builtin dispatch table.
    pub fn from_value(value: Value) -> Result<Self, WeftError> {
        TYPES.from_value(value)
    }

    /// Base descriptor carrying this node's options and immutability.
    pub fn base(&self) -> &Descriptor {
        match self {
            Signature::Task(d) => d,
            Signature::Chain(c) => c.base(),
            Signature::Group(g) => g.base(),
            Signature::Chord(c) => c.base(),
            Signature::Map(m) => m.base(),
            Signature::StarMap(m) => m.base(),
            Signature::Chunks(c) => c.base(),
        }
    }

    pub(crate) fn base_mut(&mut self) -> &mut Descriptor {
        match self {
            Signature::Task(d) => d,
            Signature::Chain(c) => c.base_mut(),
            Signature::Group(g) => g.base_mut(),
            Signature::Chord(c) => c.base_mut(),
            Signature::Map(m) => m.base_mut(),
            Signature::StarMap(m) => m.base_mut(),
            Signature::Chunks(c) => c.base_mut(),
        }
    }

    pub fn task_name(&self) -> &str {
        &self.base().task
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.base().options
    }

    pub fn is_immutable(&self) -> bool {
        self.base().immutable
    }

    /// In-place: optionally flip immutability, overlay options.
    pub fn set(&mut self, immutable: Option<bool>, options: Map<String, Value>) -> &mut Self {
        self.base_mut().set(immutable, options);
        self
    }

    /// In-place single-option overlay.
    pub fn set_option(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.base_mut().set_option(key, value);
        self
    }

    /// Attach a success callback and hand it back.
    ///
    /// On a chord the callback is forwarded to the body, since it
    /// conceptually fires on the synchronization result; linking a
    /// bodiless chord
    /// is an error.
    pub fn link(&mut self, callback: Signature) -> Result<Signature, WeftError> {
        match self {
            Signature::Chord(chord) => chord.link(callback),
            other => {
                other.base_mut().append_to_list_option(LINK_KEY, callback.to_value());
                Ok(callback)
            }
        }
    }

    /// Attach an error callback and hand it back.
    pub fn link_error(&mut self, errback: Signature) -> Result<Signature, WeftError> {
        match self {
            Signature::Chord(chord) => chord.link_error(errback),
            other => {
                other
                    .base_mut()
                    .append_to_list_option(LINK_ERROR_KEY, errback.to_value());
                Ok(errback)
            }
        }
    }

    /// Pre-order traversal: self, then the recursively flattened `link`
    /// chain of every directly linked callback.
    pub fn flatten_links(&self) -> Result<Vec<Signature>, WeftError> {
        let mut out = vec![self.clone()];
        if let Some(Value::Array(links)) = self.options().get(LINK_KEY) {
            for link in links {
                let callback = Signature::from_value(link.clone())?;
                out.extend(callback.flatten_links()?);
            }
        }
        Ok(out)
    }

    /// Merge the overrides into a new, independent, same-variant instance.
    pub fn clone_with(
        &self,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Signature {
        match self {
            Signature::Task(d) => Signature::Task(d.clone_with(args, kwargs, options)),
            Signature::Chain(c) => Signature::Chain(c.clone_with(args, kwargs, options)),
            Signature::Group(g) => Signature::Group(g.clone_with(args, kwargs, options)),
            Signature::Chord(c) => Signature::Chord(c.clone_with(args, kwargs, options)),
            Signature::Map(m) => Signature::Map(m.clone_with(args, kwargs, options)),
            Signature::StarMap(m) => Signature::StarMap(m.clone_with(args, kwargs, options)),
            Signature::Chunks(c) => Signature::Chunks(c.clone_with(args, kwargs, options)),
        }
    }

    /// Merge, then run locally.
    pub fn apply(
        &self,
        rt: &Runtime,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<Value, WeftError> {
        match self {
            Signature::Task(d) => d.apply(rt, args, kwargs, options),
            // Local barrier semantics.
            Signature::Chord(c) => c.apply(rt, args, kwargs, options),
            // Composites run locally through their registered execution
            // task, carrying members in the packed record.
            other => other.to_record().apply(rt, args, kwargs, options),
        }
    }

    /// Merge, then submit for remote execution.
    #[instrument(skip_all, fields(task = %self.task_name()))]
    pub fn apply_async(
        &self,
        rt: &Runtime,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<Arc<dyn ResultHandle>, WeftError> {
        match self {
            Signature::Task(d) => d.apply_async(rt, args, kwargs, options),
            Signature::Group(g) => g.apply_async(rt, args, kwargs, options),
            Signature::Chord(c) => c.apply_async(rt, args, kwargs, options),
            Signature::Chunks(c) => c.apply_async(rt, args, kwargs, options),
            // Chain and the map variants dispatch through their dedicated
            // registered task names; the packed record is the payload.
            other => other.to_record().apply_async(rt, args, kwargs, options),
        }
    }

    /// Submit, then block on the returned result handle.
    pub fn invoke_and_wait(&self, rt: &Runtime) -> Result<Value, WeftError> {
        self.apply_async(rt, Vec::new(), Map::new(), Map::new())?.wait()
    }

    /// Binary sequential composition. `None` when this operand defines no
    /// composition with `other`; the caller retries with operands
    /// reversed before failing.
    pub fn compose_sequential(&self, other: &Signature) -> Option<Chain> {
        let mut tasks: Vec<Signature> = Vec::new();
        // Chains always contribute their members, never themselves:
        // composition must not produce nested chains.
        match self {
            Signature::Chain(c) => tasks.extend(c.tasks().iter().cloned()),
            node => tasks.push(node.clone()),
        }
        match other {
            Signature::Chain(c) => tasks.extend(c.tasks().iter().cloned()),
            node => tasks.push(node.clone()),
        }
        Some(Chain::new(tasks))
    }

    /// Sequential composition ("then"): try `self ∘ other`, then the
    /// reversed operands, and only fail if neither side composes.
    pub fn and_then(&self, other: &Signature) -> Result<Chain, WeftError> {
        self.compose_sequential(other)
            .or_else(|| other.compose_sequential(self))
            .ok_or_else(|| WeftError::Composition {
                left: self.to_string(),
                right: other.to_string(),
            })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Task(d) => fmt::Display::fmt(d, f),
            Signature::Chain(c) => fmt::Display::fmt(c, f),
            Signature::Group(g) => fmt::Display::fmt(g, f),
            Signature::Chord(c) => fmt::Display::fmt(c, f),
            Signature::Map(m) => fmt::Display::fmt(m, f),
            Signature::StarMap(m) => fmt::Display::fmt(m, f),
            Signature::Chunks(c) => fmt::Display::fmt(c, f),
        }
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = Descriptor::deserialize(deserializer)?;
        TYPES.deserialize(record).map_err(D::Error::custom)
    }
}

impl From<Descriptor> for Signature {
    fn from(d: Descriptor) -> Self {
        Signature::Task(d)
    }
}

impl From<Chain> for Signature {
    fn from(c: Chain) -> Self {
        Signature::Chain(c)
    }
}

impl From<Group> for Signature {
    fn from(g: Group) -> Self {
        Signature::Group(g)
    }
}

impl From<Chord> for Signature {
    fn from(c: Chord) -> Self {
        Signature::Chord(c)
    }
}

impl From<ElementwiseMap> for Signature {
    fn from(m: ElementwiseMap) -> Self {
        Signature::Map(m)
    }
}

impl From<StarMap> for Signature {
    fn from(m: StarMap) -> Self {
        Signature::StarMap(m)
    }
}

impl From<ChunkPartitioner> for Signature {
    fn from(c: ChunkPartitioner) -> Self {
        Signature::Chunks(c)
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
    fn flatten_links_on_unlinked_node_is_self() {
        let s = sig("a");
        let flat = s.flatten_links().unwrap();
        assert_eq!(flat, vec![s]);
    }

    #[test]
    fn flatten_links_walks_the_link_chain_in_pre_order() {
        let c = sig("c");
        let mut b = sig("b");
        b.link(c).unwrap();
        let mut a = sig("a");
        a.link(b).unwrap();

        let names: Vec<_> = a
            .flatten_links()
            .unwrap()
            .iter()
            .map(|s| s.task_name().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn linking_the_same_callback_twice_keeps_one_entry() {
        let mut a = sig("a");
        a.link(sig("cb")).unwrap();
        a.link(sig("cb")).unwrap();
        assert_eq!(a.options()[LINK_KEY].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn link_returns_the_callback() {
        let mut a = sig("a");
        let returned = a.link(sig("cb")).unwrap();
        assert_eq!(returned.task_name(), "cb");
    }

    #[test]
    fn set_option_chains_in_place() {
        let mut a = sig("a");
        a.set_option("countdown", json!(5))
            .set_option("task_id", json!("x"));
        assert_eq!(a.options().get("countdown"), Some(&json!(5)));
        assert_eq!(a.options().get("task_id"), Some(&json!("x")));
    }
}
