use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Default number of captured values kept per run.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Bounded FIFO of values captured from responses (e.g. ids of created
/// resources), shared by the dispatchers of one run.
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    entries: Mutex<VecDeque<String>>,
}

impl ResponseCache {
    /// A zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stores a value, evicting the oldest one when full.
    pub fn push(&self, value: String) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(value);
    }

    /// Round-robin read keyed by request index.
    #[must_use]
    pub fn get(&self, index: u64) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let len = u64::try_from(entries.len()).ok()?;
        let slot = index.checked_rem(len)?;
        let slot = usize::try_from(slot).ok()?;
        entries.get(slot).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
