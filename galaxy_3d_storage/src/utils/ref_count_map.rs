/// Small-integer reference counts keyed by a stable identity.
///
/// Used for many-to-many ownership where the same owner can reference a
/// resource several times (e.g. a mesh with three surfaces sharing one
/// material counts as one owner with a count of 3). An entry disappears as
/// soon as its count reaches zero.
///
/// # Example
///
/// ```ignore
/// let mut owners = RefCountMap::new();
/// owners.increment(mesh);   // 1
/// owners.increment(mesh);   // 2
/// owners.decrement(mesh);   // Some(1)
/// owners.decrement(mesh);   // Some(0), entry removed
/// ```

use std::hash::Hash;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct RefCountMap<K: Copy + Eq + Hash> {
    counts: FxHashMap<K, u32>,
}

impl<K: Copy + Eq + Hash> RefCountMap<K> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            counts: FxHashMap::default(),
        }
    }

    /// Add one reference. Returns the new count.
    pub fn increment(&mut self, key: K) -> u32 {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop one reference. Returns the remaining count, or `None` if the key
    /// had no references.
    pub fn decrement(&mut self, key: K) -> Option<u32> {
        let count = self.counts.get_mut(&key)?;
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.counts.remove(&key);
        }
        Some(remaining)
    }

    /// Drop every reference held by `key`. Returns the count it had.
    pub fn remove(&mut self, key: K) -> u32 {
        self.counts.remove(&key).unwrap_or(0)
    }

    /// Current count for `key` (0 if absent)
    pub fn count(&self, key: K) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn contains(&self, key: K) -> bool {
        self.counts.contains_key(&key)
    }

    /// Distinct keys with at least one reference
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.counts.keys().copied()
    }

    /// Number of distinct keys
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Remove all entries, returning the distinct keys that were present
    pub fn drain_keys(&mut self) -> Vec<K> {
        self.counts.drain().map(|(k, _)| k).collect()
    }
}

impl<K: Copy + Eq + Hash> Default for RefCountMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "ref_count_map_tests.rs"]
mod tests;
