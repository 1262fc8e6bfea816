//! Pending enrollment intent: the durable "I want to support cause X" note
//! that survives redirects through registration, login and email
//! confirmation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SupportResult;

/// A single pending support request. Only one may exist per storage scope;
/// the last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentIntent {
    pub cause_code: String,
    /// When the intent was recorded. Informational only; intents never expire.
    pub created_at: DateTime<Utc>,
}

impl EnrollmentIntent {
    pub fn new(cause_code: impl Into<String>) -> Self {
        Self {
            cause_code: cause_code.into(),
            created_at: Utc::now(),
        }
    }

    pub fn matches(&self, cause_code: &str) -> bool {
        self.cause_code == cause_code
    }

    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.created_at).num_seconds()
    }
}

/// Single-key durable storage for the pending intent.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Record an intent for `cause_code`, replacing any pending one.
    async fn set(&self, cause_code: &str) -> SupportResult<()>;

    async fn get(&self) -> SupportResult<Option<EnrollmentIntent>>;

    async fn clear(&self) -> SupportResult<()>;

    /// Opaque check exposed to the auth and redirect surfaces.
    async fn has_pending_intent(&self) -> SupportResult<bool> {
        Ok(self.get().await?.is_some())
    }
}
