//! Chord: barrier composition
//!
//! A group header plus an optional body. The barrier itself (dispatching
//! header members, counting completions, firing the body with aggregated
//! results) is owned by the chord coordinator; this node normalizes its
//! parts, assigns the body's correlation id, and hands off.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::descriptor::{Descriptor, TASK_ID_KEY};
use crate::error::WeftError;
use crate::group::Group;
use crate::registry::{member_list, TypeRegistry};
use crate::runtime::{ResultHandle, Runtime};
use crate::signature::Signature;

/// Registered name of the external chord-coordination task.
pub const CHORD_TASK: &str = "weft.chord";
pub(crate) const CHORD_TAG: &str = "chord";

/// Barrier composite. A bodiless chord is valid and constructible, but
/// invoking or linking it is an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    base: Descriptor,
    header: Group,
    body: Option<Box<Signature>>,
}

impl Chord {
    /// Header is normalized through group-adoption; the body, when
    /// supplied as a plain wire value, should be parsed into a node
    /// first ([`Signature::from_value`]); an existing node is taken
    /// as-is.
    pub fn new(header: impl Into<Group>, body: Option<Signature>) -> Self {
        Self {
            base: Descriptor::new(CHORD_TASK).with_variant_tag(CHORD_TAG),
            header: header.into(),
            body: body.map(Box::new),
        }
    }

    /// Header members.
    pub fn tasks(&self) -> &[Signature] {
        self.header.tasks()
    }

    pub fn header(&self) -> &Group {
        &self.header
    }

    pub fn body(&self) -> Option<&Signature> {
        self.body.as_deref()
    }

    pub fn base(&self) -> &Descriptor {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut Descriptor {
        &mut self.base
    }

    /// Unless the runtime is eager, ensure the body carries a correlation
    /// id and delegate to the chord coordinator; the returned handle is
    /// keyed by that id. Eager runtimes fall back to a local synchronous
    /// apply of the whole chord.
    pub fn apply_async(
        &self,
        rt: &Runtime,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<Arc<dyn ResultHandle>, WeftError> {
        if rt.is_eager() {
            let value = self.apply(rt, args, kwargs, options)?;
            return Ok(Arc::new(crate::runtime::ReadyHandle::new(
                Uuid::new_v4().to_string(),
                value,
            )));
        }

        let (_args, _kwargs, options) = self.base.merge(args, kwargs, options);
        let body = self.body.as_deref().ok_or(WeftError::MissingChordBody)?;
        let mut body = body.clone();
        let correlation_id = match body.options().get(TASK_ID_KEY).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                body.set_option(TASK_ID_KEY, Value::String(id.clone()));
                id
            }
        };
        debug!(
            members = self.header.tasks().len(),
            body_id = %correlation_id,
            "delegating chord to coordinator"
        );
        rt.chords().invoke(self.header.tasks(), &body, &options)
    }

    /// Local synchronous barrier: run every header member in order, then
    /// hand the body the aggregated results as its leading argument.
    pub fn apply(
        &self,
        rt: &Runtime,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<Value, WeftError> {
        let (_args, _kwargs, options) = self.base.merge(args, kwargs, options);
        let body = self.body.as_deref().ok_or(WeftError::MissingChordBody)?;
        let mut results = Vec::with_capacity(self.header.tasks().len());
        for member in self.header.tasks() {
            results.push(member.apply(rt, Vec::new(), Map::new(), Map::new())?);
        }
        body.apply(rt, vec![Value::Array(results)], Map::new(), options)
    }

    /// A chord's callback conceptually fires on its synchronization
    /// result, so linking forwards to the body. The callback itself is
    /// returned.
    pub fn link(&mut self, callback: Signature) -> Result<Signature, WeftError> {
        match &mut self.body {
            Some(body) => body.link(callback),
            None => Err(WeftError::MissingChordBody),
        }
    }

    pub fn link_error(&mut self, errback: Signature) -> Result<Signature, WeftError> {
        match &mut self.body {
            Some(body) => body.link_error(errback),
            None => Err(WeftError::MissingChordBody),
        }
    }

    /// Pack header members and body into the base record's kwargs.
    pub fn to_record(&self) -> Descriptor {
        let mut record = self.base.clone();
        record.kwargs.insert(
            "header".into(),
            Value::Array(self.header.tasks().iter().map(Signature::to_value).collect()),
        );
        record.kwargs.insert(
            "body".into(),
            self.body
                .as_deref()
                .map(Signature::to_value)
                .unwrap_or(Value::Null),
        );
        record
    }

    pub(crate) fn from_record_in(
        record: Descriptor,
        registry: &TypeRegistry,
    ) -> Result<Signature, WeftError> {
        let header = member_list(&record.kwargs, "header", registry)?;
        let body = match record.kwargs.get("body") {
            None | Some(Value::Null) => None,
            Some(value) => Some(registry.from_value(value.clone())?),
        };
        let mut base = record;
        base.kwargs.remove("header");
        base.kwargs.remove("body");
        Ok(Signature::Chord(Chord {
            base,
            header: Group::new(header),
            body: body.map(Box::new),
        }))
    }

    /// Merge the overrides into a new instance. The body is cloned
    /// independently: mutating the copy's body never affects the
    /// original's.
    pub fn clone_with(
        &self,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Self {
        Self {
            base: self.base.clone_with(args, kwargs, options),
            header: self.header.clone(),
            body: self.body.clone(),
        }
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Some(body) => write!(f, "{}({})", body.task_name(), self.header),
            None => write!(f, "<chord without body: {}>", self.header),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str) -> Signature {
        Signature::Task(Descriptor::new(name))
    }

    fn header() -> Group {
        Group::new([sig("add"), sig("add")])
    }

    #[test]
    fn bodiless_chord_is_constructible_and_renders_distinctly() {
        let with_body = Chord::new(header(), Some(sig("tsum")));
        let bodiless = Chord::new(header(), None);
        assert!(bodiless.body().is_none());
        assert_ne!(with_body.to_string(), bodiless.to_string());
        assert!(bodiless.to_string().starts_with("<chord without body:"));
        assert_eq!(with_body.to_string(), "tsum([add(), add()])");
    }

    #[test]
    fn header_is_adopted_not_shared() {
        let inner = Group::new([sig("a"), sig("b")]);
        let chord = Chord::new(Signature::Group(inner), None);
        assert_eq!(chord.tasks().len(), 2);
    }

    #[test]
    fn clone_body_is_independent() {
        let original = Chord::new(header(), Some(sig("tsum")));
        let mut copy = original.clone_with(Vec::new(), Map::new(), Map::new());
        copy.link(sig("cb")).unwrap();
        assert!(original.body().unwrap().options().get("link").is_none());
        assert!(copy.body().unwrap().options().get("link").is_some());
    }

    #[test]
    fn link_forwards_to_body_and_returns_callback() {
        let mut chord = Chord::new(header(), Some(sig("tsum")));
        let returned = chord.link(sig("cb")).unwrap();
        assert_eq!(returned.task_name(), "cb");
        assert_eq!(
            chord.body().unwrap().options()["link"]
                .as_array()
                .map(Vec::len),
            Some(1)
        );
    }

    #[test]
    fn linking_a_bodiless_chord_fails() {
        let mut chord = Chord::new(header(), None);
        assert!(matches!(
            chord.link(sig("cb")),
            Err(WeftError::MissingChordBody)
        ));
    }

    #[test]
    fn packed_record_keeps_bodiless_body_null() {
        let record = Chord::new(header(), None).to_record();
        assert_eq!(record.kwargs.get("body"), Some(&Value::Null));
        assert_eq!(record.kwargs["header"].as_array().map(Vec::len), Some(2));
        assert_eq!(record.variant_tag.as_deref(), Some("chord"));
    }
}
