//! Descriptor: the base IR node
//!
//! A serializable record of one task invocation (name, positional args,
//! keyword args, execution options) plus the merge/clone contract every
//! composite builds on. The resolved task object is cached out-of-band
//! and never serialized; after deserialization it is re-resolved lazily
//! through the registry on first access.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::WeftError;
use crate::render::reprcall;
use crate::runtime::{ResultHandle, Runtime, Task, TaskRegistry};
use crate::signature::Signature;

/// Option key holding success callbacks (list of nested wire records).
pub const LINK_KEY: &str = "link";
/// Option key holding error callbacks (list of nested wire records).
pub const LINK_ERROR_KEY: &str = "link_error";
/// Option key holding the dispatch delay in seconds.
pub const COUNTDOWN_KEY: &str = "countdown";
/// Option key holding the correlation id of an invocation.
pub const TASK_ID_KEY: &str = "task_id";

/// Lazily-resolved task object. Excluded from the wire form.
#[derive(Default, Clone)]
pub(crate) struct ResolvedTask(pub(crate) OnceCell<Arc<dyn Task>>);

impl fmt::Debug for ResolvedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            Some(task) => write!(f, "ResolvedTask({})", task.name()),
            None => f.write_str("ResolvedTask(<unresolved>)"),
        }
    }
}

/// Invocation record for a single task.
///
/// `args`, `kwargs`, and `options` default to empty, never absent. The
/// wire form is `{task, args, kwargs, options, variantTag, immutable}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    /// Task name; resolved to an executable task through the registry.
    pub task: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Discriminator consumed by the deserialization dispatch table.
    #[serde(rename = "variantTag", default, skip_serializing_if = "Option::is_none")]
    pub variant_tag: Option<String>,
    /// When set, stored args/kwargs can no longer be overridden; only
    /// options may still be overlaid.
    #[serde(default)]
    pub immutable: bool,
    #[serde(skip)]
    pub(crate) resolved: ResolvedTask,
}

impl Descriptor {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            options: Map::new(),
            variant_tag: None,
            immutable: false,
            resolved: ResolvedTask::default(),
        }
    }

    /// Build from a live task object, caching it so no registry lookup is
    /// needed until after a serialization round-trip.
    pub fn from_task(task: Arc<dyn Task>) -> Self {
        let descriptor = Self::new(task.name());
        let _ = descriptor.resolved.0.set(task);
        descriptor
    }

    /// Rebuild from a wire value.
    pub fn from_value(value: Value) -> Result<Self, WeftError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    pub fn with_variant_tag(mut self, tag: impl Into<String>) -> Self {
        self.variant_tag = Some(tag.into());
        self
    }

    /// Wire value of this record. The resolved-task cache is excluded.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("task".into(), Value::String(self.task.clone()));
        map.insert("args".into(), Value::Array(self.args.clone()));
        map.insert("kwargs".into(), Value::Object(self.kwargs.clone()));
        map.insert("options".into(), Value::Object(self.options.clone()));
        if let Some(tag) = &self.variant_tag {
            map.insert("variantTag".into(), Value::String(tag.clone()));
        }
        map.insert("immutable".into(), Value::Bool(self.immutable));
        Value::Object(map)
    }

    /// The partial-application rule.
    ///
    /// Mutable: override args are *prepended* before stored args (a chain
    /// successor receives its predecessor's result as leading argument);
    /// kwargs and options are overlay-merged, override wins per key.
    /// Immutable: arg/kwarg overrides are dropped entirely; options are
    /// still overlaid.
    pub fn merge(
        &self,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> (Vec<Value>, Map<String, Value>, Map<String, Value>) {
        let merged_options = overlay(&self.options, options);
        if self.immutable {
            return (self.args.clone(), self.kwargs.clone(), merged_options);
        }
        let mut merged_args = args;
        merged_args.extend(self.args.iter().cloned());
        (merged_args, overlay(&self.kwargs, kwargs), merged_options)
    }

    /// Resolved task object, looked up through the registry on first
    /// access and cached. Unknown names fail here, not at construction.
    pub fn resolved(&self, registry: &dyn TaskRegistry) -> Result<Arc<dyn Task>, WeftError> {
        self.resolved
            .0
            .get_or_try_init(|| registry.resolve(&self.task))
            .map(Arc::clone)
    }

    /// Merge, then run locally through the resolved task.
    pub fn apply(
        &self,
        rt: &Runtime,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<Value, WeftError> {
        let (args, kwargs, options) = self.merge(args, kwargs, options);
        let task = self.resolved(rt.registry())?;
        debug!(task = %self.task, "applying locally");
        task.apply_local(&args, &kwargs, &options)
    }

    /// Merge, then submit for remote execution through the resolved task.
    pub fn apply_async(
        &self,
        rt: &Runtime,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<Arc<dyn ResultHandle>, WeftError> {
        let (args, kwargs, options) = self.merge(args, kwargs, options);
        let task = self.resolved(rt.registry())?;
        debug!(task = %self.task, "submitting for remote execution");
        task.apply_remote(&args, &kwargs, &options)
    }

    /// Merge the overrides, then build a new independent instance.
    /// Mappings are deep-copied; variant tag, immutability, and the
    /// cached resolved task carry over.
    pub fn clone_with(
        &self,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Self {
        let (args, kwargs, options) = self.merge(args, kwargs, options);
        Self {
            task: self.task.clone(),
            args,
            kwargs,
            options,
            variant_tag: self.variant_tag.clone(),
            immutable: self.immutable,
            resolved: self.resolved.clone(),
        }
    }

    /// Clone, then fully overwrite (not merge) whichever fields were
    /// supplied.
    pub fn replace(
        &self,
        args: Option<Vec<Value>>,
        kwargs: Option<Map<String, Value>>,
        options: Option<Map<String, Value>>,
    ) -> Self {
        let mut out = self.clone_with(Vec::new(), Map::new(), Map::new());
        if let Some(args) = args {
            out.args = args;
        }
        if let Some(kwargs) = kwargs {
            out.kwargs = kwargs;
        }
        if let Some(options) = options {
            out.options = options;
        }
        out
    }

    /// In-place: optionally flip immutability, overlay options.
    pub fn set(&mut self, immutable: Option<bool>, options: Map<String, Value>) -> &mut Self {
        if let Some(immutable) = immutable {
            self.immutable = immutable;
        }
        for (key, value) in options {
            self.options.insert(key, value);
        }
        self
    }

    /// In-place single-option overlay.
    pub fn set_option(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Get-or-create a list at `options[key]` and append `value` unless
    /// an equal entry is already present.
    pub fn append_to_list_option(&mut self, key: &str, value: Value) -> &mut Self {
        let slot = self
            .options
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            if !items.contains(&value) {
                items.push(value);
            }
        }
        self
    }

    /// Attach a success callback.
    pub fn link(&mut self, callback: &Signature) -> &mut Self {
        self.append_to_list_option(LINK_KEY, callback.to_value())
    }

    /// Attach an error callback.
    pub fn link_error(&mut self, errback: &Signature) -> &mut Self {
        self.append_to_list_option(LINK_ERROR_KEY, errback.to_value())
    }
}

impl PartialEq for Descriptor {
    /// Field-wise wire equality; the resolved-task cache does not count.
    fn eq(&self, other: &Self) -> bool {
        self.task == other.task
            && self.args == other.args
            && self.kwargs == other.kwargs
            && self.options == other.options
            && self.variant_tag == other.variant_tag
            && self.immutable == other.immutable
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&reprcall(&self.task, &self.args, &self.kwargs))
    }
}

/// Overlay-merge: base copied, override wins per key.
pub(crate) fn overlay(
    base: &Map<String, Value>,
    over: Map<String, Value>,
) -> Map<String, Value> {
    if over.is_empty() {
        return base.clone();
    }
    let mut out = base.clone();
    for (key, value) in over {
        out.insert(key, value);
    }
    out
}
