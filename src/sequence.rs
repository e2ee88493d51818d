//! One-shot memoized element sequences
//!
//! Fan-out variants (map, starmap, chunks) take their elements from an
//! arbitrary source that may only be safe to consume once. `OnceSequence`
//! materializes the source on first access and caches the finite result;
//! every later access is a read of the cache.

use std::fmt;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use serde_json::Value;

type Source = Box<dyn Iterator<Item = Value> + Send>;

/// A lazily-materialized, cached, ordered element sequence.
///
/// The source is consumed exactly once. Materialization is not safe to
/// race on the same instance; once materialized, concurrent read-only
/// iteration is.
pub struct OnceSequence {
    source: Mutex<Option<Source>>,
    cached: OnceCell<Vec<Value>>,
}

impl OnceSequence {
    /// Wrap a one-shot source without consuming it yet.
    pub fn lazy<I>(source: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self {
            source: Mutex::new(Some(Box::new(source.into_iter()))),
            cached: OnceCell::new(),
        }
    }

    /// Wrap an already-finite sequence.
    pub fn materialized(items: Vec<Value>) -> Self {
        Self {
            source: Mutex::new(None),
            cached: OnceCell::with_value(items),
        }
    }

    /// Force the sequence. The first call drains the source; later calls
    /// return the cached elements.
    pub fn force(&self) -> &[Value] {
        self.cached.get_or_init(|| {
            let mut slot = self.source.lock().unwrap_or_else(|e| e.into_inner());
            slot.take().map(Iterator::collect).unwrap_or_default()
        })
    }

    pub fn len(&self) -> usize {
        self.force().len()
    }

    pub fn is_empty(&self) -> bool {
        self.force().is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.force().iter()
    }
}

impl From<Vec<Value>> for OnceSequence {
    fn from(items: Vec<Value>) -> Self {
        Self::materialized(items)
    }
}

impl FromIterator<Value> for OnceSequence {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::materialized(iter.into_iter().collect())
    }
}

impl Clone for OnceSequence {
    /// Cloning forces the sequence; the clone is independently cached.
    fn clone(&self) -> Self {
        Self::materialized(self.force().to_vec())
    }
}

impl PartialEq for OnceSequence {
    fn eq(&self, other: &Self) -> bool {
        self.force() == other.force()
    }
}

impl fmt::Debug for OnceSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cached.get() {
            Some(items) => f.debug_list().entries(items).finish(),
            None => f.write_str("<unmaterialized>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn source_is_consumed_exactly_once() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulls);
        let seq = OnceSequence::lazy((0..3).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            json!(i)
        }));

        assert_eq!(seq.force(), &[json!(0), json!(1), json!(2)]);
        assert_eq!(seq.force(), &[json!(0), json!(1), json!(2)]);
        assert_eq!(pulls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn materialized_round_trips() {
        let seq = OnceSequence::materialized(vec![json!("a"), json!("b")]);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.iter().count(), 2);
    }

    #[test]
    fn clone_forces_and_detaches() {
        let seq = OnceSequence::lazy((0..2).map(|i| json!(i)));
        let copy = seq.clone();
        assert_eq!(copy, seq);
        assert_eq!(copy.force(), seq.force());
    }
}
