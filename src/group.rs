//! Group: parallel composition
//!
//! Members are semantically independent; the ordering exists only for
//! deterministic dispatch (staggered delays, stable correlation ids).
//! Invocation clones every member before handing the batch to the
//! group coordinator; stored descriptors are never mutated or shared.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::descriptor::{Descriptor, COUNTDOWN_KEY};
use crate::error::WeftError;
use crate::registry::{member_list, TypeRegistry};
use crate::runtime::{ResultHandle, Runtime};
use crate::signature::Signature;

/// Registered name of the external group-execution task.
pub const GROUP_TASK: &str = "weft.group";
pub(crate) const GROUP_TAG: &str = "group";

/// Parallel composite.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    base: Descriptor,
    tasks: Vec<Signature>,
}

impl Group {
    pub fn new<I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = Signature>,
    {
        Self {
            base: Descriptor::new(GROUP_TASK).with_variant_tag(GROUP_TAG),
            tasks: tasks.into_iter().collect(),
        }
    }

    pub fn tasks(&self) -> &[Signature] {
        &self.tasks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Signature> {
        self.tasks.iter()
    }

    pub fn base(&self) -> &Descriptor {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut Descriptor {
        &mut self.base
    }

    /// Clone every member, then hand the batch to the group coordinator,
    /// which assigns per-member correlation ids and the group id.
    pub fn apply_async(
        &self,
        rt: &Runtime,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<Arc<dyn ResultHandle>, WeftError> {
        let (args, _kwargs, options) = self.base.merge(args, kwargs, options);
        let members: Vec<Signature> = self
            .tasks
            .iter()
            .map(|t| t.clone_with(Vec::new(), Map::new(), Map::new()))
            .collect();
        debug!(members = members.len(), "preparing group for dispatch");
        let prepared = rt.groups().prepare(&options, members, &args)?;
        Ok(prepared.handle)
    }

    /// Assign a cyclic arithmetic progression of countdown delays to
    /// members, in iteration order, restarting at `start` once `stop` is
    /// passed. Mutates in place.
    pub fn skew(&mut self, start: f64, stop: Option<f64>, step: f64) -> &mut Self {
        let mut next = start;
        for task in &mut self.tasks {
            let delay = Number::from_f64(next).map(Value::Number).unwrap_or(Value::Null);
            task.set_option(COUNTDOWN_KEY, delay);
            next += step;
            if let Some(stop) = stop {
                if next > stop {
                    next = start;
                }
            }
        }
        self
    }

    /// Pack the member sequence into the base record's kwargs.
    pub fn to_record(&self) -> Descriptor {
        let mut record = self.base.clone();
        record.kwargs.insert(
            "tasks".into(),
            Value::Array(self.tasks.iter().map(Signature::to_value).collect()),
        );
        record
    }

    pub(crate) fn from_record_in(
        record: Descriptor,
        registry: &TypeRegistry,
    ) -> Result<Signature, WeftError> {
        let tasks = member_list(&record.kwargs, "tasks", registry)?;
        let mut base = record;
        base.kwargs.remove("tasks");
        Ok(Signature::Group(Group { base, tasks }))
    }

    pub fn clone_with(
        &self,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Self {
        Self {
            base: self.base.clone_with(args, kwargs, options),
            tasks: self.tasks.clone(),
        }
    }
}

/// Group-adoption: an existing group contributes a copy of its member
/// sequence; any other node becomes a single-member group.
impl From<Signature> for Group {
    fn from(sig: Signature) -> Self {
        match sig {
            Signature::Group(group) => Group::new(group.tasks),
            other => Group::new([other]),
        }
    }
}

impl From<Vec<Signature>> for Group {
    fn from(tasks: Vec<Signature>) -> Self {
        Group::new(tasks)
    }
}

impl FromIterator<Signature> for Group {
    fn from_iter<I: IntoIterator<Item = Signature>>(iter: I) -> Self {
        Group::new(iter)
    }
}

impl<'a> IntoIterator for &'a Group {
    type Item = &'a Signature;
    type IntoIter = std::slice::Iter<'a, Signature>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.tasks.iter().map(|t| t.to_string()).collect();
        write!(f, "[{}]", rendered.join(", "))
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
    fn adopting_a_group_copies_its_member_sequence() {
        let inner = Group::new([sig("a"), sig("b")]);
        let adopted = Group::from(Signature::Group(inner.clone()));
        assert_eq!(adopted.tasks(), inner.tasks());
        assert_eq!(adopted.tasks().len(), 2);
    }

    #[test]
    fn adopting_a_plain_node_wraps_it() {
        let adopted = Group::from(sig("a"));
        assert_eq!(adopted.tasks().len(), 1);
    }

    #[test]
    fn skew_assigns_increasing_delays_in_order() {
        let mut group = Group::new([sig("t"), sig("t"), sig("t")]);
        group.skew(0.0, None, 1.0);
        let delays: Vec<_> = group
            .iter()
            .map(|t| t.options()[COUNTDOWN_KEY].clone())
            .collect();
        assert_eq!(delays, vec![json!(0.0), json!(1.0), json!(2.0)]);
    }

    #[test]
    fn skew_restarts_at_start_past_stop() {
        let mut group = Group::new([sig("t"), sig("t"), sig("t"), sig("t")]);
        group.skew(1.0, Some(2.0), 1.0);
        let delays: Vec<_> = group
            .iter()
            .map(|t| t.options()[COUNTDOWN_KEY].clone())
            .collect();
        assert_eq!(delays, vec![json!(1.0), json!(2.0), json!(1.0), json!(2.0)]);
    }

    #[test]
    fn renders_as_member_list() {
        let group = Group::new([sig("a"), sig("b")]);
        assert_eq!(group.to_string(), "[a(), b()]");
    }
}
