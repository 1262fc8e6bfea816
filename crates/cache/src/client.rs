//! Redis-backed intent store. The intent lives under a single key so it
//! survives full reloads and cross-origin redirects as long as the caller
//! keeps using the same storage scope.

use std::time::Duration;

use async_trait::async_trait;
use cause_core::config::{IntentConfig, RedisConfig};
use cause_core::{EnrollmentIntent, IntentStore, SupportError, SupportResult};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

pub struct RedisIntentStore {
    conn: MultiplexedConnection,
    key: String,
}

impl RedisIntentStore {
    /// Connect to Redis and verify connectivity.
    pub async fn connect(redis: &RedisConfig, intent: &IntentConfig) -> SupportResult<Self> {
        info!(url = %redis.url, "Connecting to Redis");

        let client = redis::Client::open(redis.url.as_str()).map_err(store_error)?;
        let timeout = Duration::from_millis(redis.connect_timeout_ms);
        let mut conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                SupportError::IntentStore(format!(
                    "timed out after {}ms connecting to {}",
                    redis.connect_timeout_ms, redis.url
                ))
            })?
            .map_err(store_error)?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        info!(response = %pong, key = %intent.storage_key(), "Redis intent store ready");

        Ok(Self {
            conn,
            key: intent.storage_key(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl IntentStore for RedisIntentStore {
    async fn set(&self, cause_code: &str) -> SupportResult<()> {
        let json = encode_intent(&EnrollmentIntent::new(cause_code))?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&self.key, json)
            .await
            .map_err(store_error)?;
        metrics::counter!("intent.store.set").increment(1);
        debug!(key = %self.key, cause_code = %cause_code, "Stored pending intent");
        Ok(())
    }

    async fn get(&self) -> SupportResult<Option<EnrollmentIntent>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(&self.key).await.map_err(store_error)?;

        Ok(data.and_then(|json| decode_intent(&self.key, &json)))
    }

    async fn clear(&self) -> SupportResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&self.key).await.map_err(store_error)?;
        Ok(())
    }
}

fn encode_intent(intent: &EnrollmentIntent) -> SupportResult<String> {
    Ok(serde_json::to_string(intent)?)
}

/// Unreadable payloads are treated as no intent at all.
fn decode_intent(key: &str, json: &str) -> Option<EnrollmentIntent> {
    match serde_json::from_str::<EnrollmentIntent>(json) {
        Ok(intent) => Some(intent),
        Err(e) => {
            warn!(key = %key, error = %e, "Discarding malformed intent");
            None
        }
    }
}

fn store_error(e: redis::RedisError) -> SupportError {
    SupportError::IntentStore(e.to_string())
}
