//! In-process intent store. Survives for the lifetime of the process, which
//! is what tests and the demo CLI need.

use async_trait::async_trait;
use cause_core::{EnrollmentIntent, IntentStore, SupportResult};
use parking_lot::Mutex;
use tracing::debug;

/// Single-slot intent store guarded by a mutex. Last write wins.
#[derive(Default)]
pub struct MemoryIntentStore {
    slot: Mutex<Option<EnrollmentIntent>>,
}

impl MemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing intent, e.g. one recorded long ago.
    pub fn with_intent(intent: EnrollmentIntent) -> Self {
        Self {
            slot: Mutex::new(Some(intent)),
        }
    }
}

#[async_trait]
impl IntentStore for MemoryIntentStore {
    async fn set(&self, cause_code: &str) -> SupportResult<()> {
        let previous = self.slot.lock().replace(EnrollmentIntent::new(cause_code));
        if let Some(previous) = previous.filter(|p| !p.matches(cause_code)) {
            debug!(
                replaced = %previous.cause_code,
                cause_code = %cause_code,
                "Pending intent overwritten"
            );
        }
        metrics::counter!("intent.store.set").increment(1);
        Ok(())
    }

    async fn get(&self) -> SupportResult<Option<EnrollmentIntent>> {
        Ok(self.slot.lock().clone())
    }

    async fn clear(&self) -> SupportResult<()> {
        self.slot.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_clear() {
        let store = MemoryIntentStore::new();
        assert!(store.get().await.unwrap().is_none());
        assert!(!store.has_pending_intent().await.unwrap());

        store.set("ABC123").await.unwrap();
        let intent = store.get().await.unwrap().unwrap();
        assert_eq!(intent.cause_code, "ABC123");
        assert!(store.has_pending_intent().await.unwrap());

        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = MemoryIntentStore::new();
        store.set("ABC123").await.unwrap();
        store.set("XYZ789").await.unwrap();
        assert_eq!(store.get().await.unwrap().unwrap().cause_code, "XYZ789");
    }

    #[tokio::test]
    async fn test_get_does_not_consume() {
        let store = MemoryIntentStore::with_intent(EnrollmentIntent::new("ABC123"));
        assert!(store.get().await.unwrap().is_some());
        assert!(store.get().await.unwrap().is_some());
    }
}
