#![warn(clippy::unwrap_used)]

pub mod client;
pub mod local;

pub use client::RedisIntentStore;
pub use local::MemoryIntentStore;

use std::sync::Arc;

use cause_core::config::{AppConfig, IntentBackend};
use cause_core::{IntentStore, SupportResult};
use tracing::info;

/// Build the intent store selected by `intent.backend`.
pub async fn build_intent_store(config: &AppConfig) -> SupportResult<Arc<dyn IntentStore>> {
    match config.intent.backend {
        IntentBackend::Memory => {
            info!("Using in-memory intent store");
            Ok(Arc::new(MemoryIntentStore::new()))
        }
        IntentBackend::Redis => {
            let store = RedisIntentStore::connect(&config.redis, &config.intent).await?;
            Ok(Arc::new(store))
        }
    }
}
