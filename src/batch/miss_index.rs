use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Set of input positions that ended without a value.
///
/// Cloning shares the underlying set, so the dispatch loop and reassembly
/// can record into the same instance. Recording a position twice is harmless.
#[derive(Debug, Clone, Default)]
pub struct MissIndex {
    inner: Arc<Mutex<BTreeSet<usize>>>,
}

impl MissIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a position; returns false if it was already present
    pub fn record(&self, index: usize) -> bool {
        self.inner.lock().insert(index)
    }

    /// Union another set of positions into this one
    pub fn extend(&self, indices: impl IntoIterator<Item = usize>) {
        self.inner.lock().extend(indices);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.inner.lock().contains(&index)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Positions in ascending order
    pub fn to_vec(&self) -> Vec<usize> {
        self.inner.lock().iter().copied().collect()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
