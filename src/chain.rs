//! Chain: sequential composition
//!
//! An ordered sequence of members where each member's result feeds the
//! next member's leading argument. Chain's own job ends at producing a
//! correctly ordered, flattened sequence; the threading itself is done
//! by the chain-execution task registered under [`CHAIN_TASK`].

use std::fmt;

use serde_json::{Map, Value};

use crate::descriptor::Descriptor;
use crate::error::WeftError;
use crate::registry::{member_list, TypeRegistry};
use crate::signature::Signature;

/// Registered name of the external chain-execution task.
pub const CHAIN_TASK: &str = "weft.chain";
pub(crate) const CHAIN_TAG: &str = "chain";

/// Sequential composite. Composition never nests chains: composing with
/// a chain always flattens into one member sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    base: Descriptor,
    tasks: Vec<Signature>,
}

impl Chain {
    pub fn new<I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = Signature>,
    {
        Self {
            base: Descriptor::new(CHAIN_TASK).with_variant_tag(CHAIN_TAG),
            tasks: tasks.into_iter().collect(),
        }
    }

    pub fn tasks(&self) -> &[Signature] {
        &self.tasks
    }

    pub fn base(&self) -> &Descriptor {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut Descriptor {
        &mut self.base
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
        Ok(Signature::Chain(Chain { base, tasks }))
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

impl FromIterator<Signature> for Chain {
    fn from_iter<I: IntoIterator<Item = Signature>>(iter: I) -> Self {
        Chain::new(iter)
    }
}

impl fmt::Display for Chain {
    /// Members joined by the sequence separator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.tasks.iter().map(|t| t.to_string()).collect();
        f.write_str(&rendered.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str) -> Signature {
        Signature::Task(Descriptor::new(name))
    }

    #[test]
    fn composition_is_associatively_flat() {
        let (a, b, c) = (sig("a"), sig("b"), sig("c"));

        let left = Signature::Chain(a.and_then(&b).unwrap())
            .and_then(&c)
            .unwrap();
        let right = a
            .and_then(&Signature::Chain(b.and_then(&c).unwrap()))
            .unwrap();

        let names = |chain: &Chain| -> Vec<String> {
            chain
                .tasks()
                .iter()
                .map(|t| t.task_name().to_string())
                .collect()
        };
        assert_eq!(names(&left), ["a", "b", "c"]);
        assert_eq!(names(&left), names(&right));
    }

    #[test]
    fn chain_of_chains_flattens_fully() {
        let ab = Signature::Chain(Chain::new([sig("a"), sig("b")]));
        let cd = Signature::Chain(Chain::new([sig("c"), sig("d")]));
        let flat = ab.and_then(&cd).unwrap();
        assert_eq!(flat.tasks().len(), 4);
        assert!(flat
            .tasks()
            .iter()
            .all(|t| !matches!(t, Signature::Chain(_))));
    }

    #[test]
    fn renders_members_joined_by_pipes() {
        let chain = Chain::new([sig("a"), sig("b")]);
        assert_eq!(chain.to_string(), "a() | b()");
    }

    #[test]
    fn packed_record_carries_tag_and_members() {
        let chain = Chain::new([sig("a")]);
        let record = chain.to_record();
        assert_eq!(record.variant_tag.as_deref(), Some("chain"));
        assert_eq!(record.task, CHAIN_TASK);
        assert_eq!(record.kwargs["tasks"].as_array().map(Vec::len), Some(1));
    }
}
