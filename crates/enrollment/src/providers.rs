//! Interfaces of the external collaborators the enrollment flow consumes.

use async_trait::async_trait;
use cause_core::types::{Cause, JoinRequest, Profile, ProfilePatch};
use cause_core::SupportResult;

/// Session/profile provider. Registration, login and email confirmation
/// happen elsewhere and eventually make this report a signed-in profile.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Current profile, or `None` for an anonymous visitor.
    async fn get_profile(&self) -> SupportResult<Option<Profile>>;

    /// Merge `patch` into the stored profile and return the result.
    async fn update_profile(&self, patch: ProfilePatch) -> SupportResult<Profile>;

    /// Re-read the profile from the server, picking up server-derived flags
    /// such as `has_taken_cause_survey`.
    async fn refresh_profile(&self) -> SupportResult<Profile>;
}

#[async_trait]
pub trait CauseProvider: Send + Sync {
    /// Fetch a cause by join code. `Ok(None)` means the code no longer
    /// resolves to a cause.
    async fn fetch_cause_by_code(&self, code: &str) -> SupportResult<Option<Cause>>;
}

/// The server-side join action, idempotent per `(code, email)`.
#[async_trait]
pub trait JoinEndpoint: Send + Sync {
    async fn join(&self, code: &str, request: &JoinRequest) -> SupportResult<()>;
}
