use thiserror::Error;

pub type SupportResult<T> = Result<T, SupportError>;

#[derive(Error, Debug)]
pub enum SupportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cause fetch error: {0}")]
    CauseFetch(String),

    #[error("Profile update error: {0}")]
    ProfileUpdate(String),

    #[error("Profile refresh error: {0}")]
    ProfileRefresh(String),

    #[error("Join error: {0}")]
    Join(String),

    #[error("Viewer is not signed in")]
    NotAuthenticated,

    #[error("Survey validation error: {0}")]
    Validation(String),

    #[error("Inconsistent enrollment state: {0}")]
    StateInconsistency(String),

    #[error("Intent store error: {0}")]
    IntentStore(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SupportError {
    /// True for failures of a remote collaborator (cause fetch, profile
    /// update/refresh, join).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::CauseFetch(_) | Self::ProfileUpdate(_) | Self::ProfileRefresh(_) | Self::Join(_)
        )
    }

    /// Whether the viewer may re-trigger the action that produced this error.
    /// Nothing in the enrollment flow is fatal, but configuration problems
    /// cannot be fixed by clicking again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}
