use std::sync::Arc;

use cause_core::types::Viewer;
use cause_core::SupportResult;
use tracing::debug;

use crate::providers::ProfileProvider;

/// Read-only view of the current viewer over the session provider.
///
/// Nothing is cached: every call goes back to the provider so consumers
/// always see the latest survey and verification flags.
#[derive(Clone)]
pub struct IdentityResolver {
    provider: Arc<dyn ProfileProvider>,
}

impl IdentityResolver {
    pub fn new(provider: Arc<dyn ProfileProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn ProfileProvider> {
        &self.provider
    }

    pub async fn viewer(&self) -> SupportResult<Viewer> {
        let profile = self.provider.get_profile().await?;
        Ok(Viewer::from_profile(profile))
    }

    /// Re-read the profile from the server. Must run after anything that
    /// changes survey or enrollment status and before the gate re-evaluates.
    pub async fn refresh(&self) -> SupportResult<Viewer> {
        let profile = self.provider.refresh_profile().await?;
        debug!(
            viewer_id = %profile.id,
            surveyed = profile.has_taken_cause_survey,
            verified = profile.is_verified,
            "Profile refreshed"
        );
        Ok(Viewer::Authenticated(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{demo_profile, InMemoryProfileProvider};

    #[tokio::test]
    async fn test_anonymous_viewer() {
        let resolver = IdentityResolver::new(Arc::new(InMemoryProfileProvider::anonymous()));
        assert_eq!(resolver.viewer().await.unwrap(), Viewer::Anonymous);
    }

    #[tokio::test]
    async fn test_viewer_is_never_cached() {
        let provider = Arc::new(InMemoryProfileProvider::anonymous());
        let resolver = IdentityResolver::new(provider.clone());
        assert!(resolver.viewer().await.unwrap().is_anonymous());

        provider.sign_in(demo_profile("u-1", "ada@example.org", "Ada Lovelace"));
        let viewer = resolver.viewer().await.unwrap();
        assert_eq!(viewer.viewer_id(), Some("u-1"));
    }

    #[tokio::test]
    async fn test_refresh_requires_session() {
        let resolver = IdentityResolver::new(Arc::new(InMemoryProfileProvider::anonymous()));
        assert!(resolver.refresh().await.is_err());
    }
}
