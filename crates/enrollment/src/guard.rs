//! In-flight guards keyed by (viewer, cause). A second caller arriving while
//! the first is outstanding is turned away, not queued.

use std::sync::Arc;

use dashmap::DashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InFlightKey {
    pub viewer_id: String,
    pub cause_code: String,
}

impl InFlightKey {
    pub fn new(viewer_id: impl Into<String>, cause_code: impl Into<String>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            cause_code: cause_code.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    keys: Arc<DashSet<InFlightKey>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `None` when it is already held.
    pub fn try_acquire(&self, key: InFlightKey) -> Option<InFlightGuard> {
        if self.keys.insert(key.clone()) {
            Some(InFlightGuard {
                keys: self.keys.clone(),
                key,
            })
        } else {
            None
        }
    }

    pub fn is_in_flight(&self, key: &InFlightKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Releases its key when dropped, including on early return or error.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<DashSet<InFlightKey>>,
    key: InFlightKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let set = InFlightSet::new();
        let key = InFlightKey::new("u-1", "ABC123");

        let guard = set.try_acquire(key.clone());
        assert!(guard.is_some());
        assert!(set.try_acquire(key.clone()).is_none());
        assert!(set.is_in_flight(&key));

        drop(guard);
        assert!(!set.is_in_flight(&key));
        assert!(set.try_acquire(key).is_some());
    }

    #[test]
    fn test_keys_are_independent() {
        let set = InFlightSet::new();
        let _a = set.try_acquire(InFlightKey::new("u-1", "ABC123")).unwrap();
        let _b = set.try_acquire(InFlightKey::new("u-1", "XYZ789")).unwrap();
        let _c = set.try_acquire(InFlightKey::new("u-2", "ABC123")).unwrap();
        assert_eq!(set.len(), 3);
    }
}
