use serde::Deserialize;
use tracing::{debug, info};

/// Root application configuration. Loaded from environment variables
/// with the prefix `CAUSE_SUPPORT__` and an optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntentConfig {
    #[serde(default = "default_intent_backend")]
    pub backend: IntentBackend,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Storage scope the single intent key lives in. `global` shares one
    /// pending intent across every tab and session using the store.
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Intents older than this are still honored but logged as stale.
    #[serde(default = "default_stale_warn_after_secs")]
    pub stale_warn_after_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentConfig {
    #[serde(default = "default_supporter_label")]
    pub supporter_label: String,
    #[serde(default = "default_support_label")]
    pub support_label: String,
}

// Default functions
fn default_intent_backend() -> IntentBackend {
    IntentBackend::Memory
}
fn default_key_prefix() -> String {
    "cause-support:intent".to_string()
}
fn default_scope() -> String {
    "global".to_string()
}
fn default_stale_warn_after_secs() -> u64 {
    7 * 24 * 3600
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_supporter_label() -> String {
    "You are a supporter".to_string()
}
fn default_support_label() -> String {
    "Support this cause".to_string()
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            backend: default_intent_backend(),
            key_prefix: default_key_prefix(),
            scope: default_scope(),
            stale_warn_after_secs: default_stale_warn_after_secs(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            supporter_label: default_supporter_label(),
            support_label: default_support_label(),
        }
    }
}

impl IntentConfig {
    /// Full storage key of the pending intent.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.key_prefix, self.scope)
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!(path, "Layering config file");
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        debug!(prefix = "CAUSE_SUPPORT", "Layering environment overrides");
        builder = builder.add_source(
            config::Environment::with_prefix("CAUSE_SUPPORT")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        info!(
            intent_backend = ?config.intent.backend,
            intent_key = %config.intent.storage_key(),
            from_file = path.is_some(),
            "Configuration resolved"
        );
        Ok(config)
    }
}
