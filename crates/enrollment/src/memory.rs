//! In-memory collaborators: a session provider, a cause directory and a join
//! endpoint that behave like the real services (server-derived survey flag,
//! idempotent join per email) with call counters and failure injection.
//! Used by the demo CLI and the test suites.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cause_core::types::{
    Cause, CauseMetrics, Citizenship, JoinRequest, Profile, ProfilePatch, SupporterRecord,
    SupporterRef, SurveyAnswers, UserRecord, UserRef, VoterRegistration, VotingIntent,
};
use cause_core::{SupportError, SupportResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Map};
use tracing::debug;

use crate::providers::{CauseProvider, JoinEndpoint, ProfileProvider};

const SURVEY_KEYS: [&str; 3] = ["citizenship", "isVoter", "willVote"];

/// Consume one pending injected failure, if any.
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

// ─── Profile provider ───────────────────────────────────────────────────────

/// Session provider with a separate "server" copy of the profile. Updates
/// land on the server copy; the session only sees them after a refresh.
#[derive(Default)]
pub struct InMemoryProfileProvider {
    session: Mutex<Option<Profile>>,
    server: Mutex<Option<Profile>>,
    fail_update: AtomicUsize,
    fail_refresh: AtomicUsize,
    updates: AtomicUsize,
    refreshes: AtomicUsize,
}

impl InMemoryProfileProvider {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(profile: Profile) -> Self {
        let provider = Self::default();
        provider.sign_in(profile);
        provider
    }

    /// Simulate completing registration or login.
    pub fn sign_in(&self, profile: Profile) {
        *self.server.lock() = Some(profile.clone());
        *self.session.lock() = Some(profile);
    }

    pub fn sign_out(&self) {
        self.session.lock().take();
        self.server.lock().take();
    }

    /// Simulate following the email-confirmation link.
    pub fn confirm_email(&self) {
        for slot in [&self.server, &self.session] {
            if let Some(profile) = slot.lock().as_mut() {
                profile.is_verified = true;
            }
        }
    }

    /// Profile as the session currently reports it.
    pub fn current(&self) -> Option<Profile> {
        self.session.lock().clone()
    }

    pub fn fail_next_update(&self, n: usize) {
        self.fail_update.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_refresh(&self, n: usize) {
        self.fail_refresh.store(n, Ordering::SeqCst);
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileProvider for InMemoryProfileProvider {
    async fn get_profile(&self) -> SupportResult<Option<Profile>> {
        Ok(self.session.lock().clone())
    }

    async fn update_profile(&self, patch: ProfilePatch) -> SupportResult<Profile> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_update) {
            return Err(SupportError::ProfileUpdate("service unavailable".to_string()));
        }

        let mut server = self.server.lock();
        let profile = server.as_mut().ok_or(SupportError::NotAuthenticated)?;
        for (key, value) in patch.personal_info {
            profile.personal_info.insert(key, value);
        }
        profile.has_taken_cause_survey = SURVEY_KEYS
            .iter()
            .all(|k| profile.personal_info.get(*k).is_some_and(|v| !v.is_null()));
        debug!(viewer_id = %profile.id, "Profile updated");
        Ok(profile.clone())
    }

    async fn refresh_profile(&self) -> SupportResult<Profile> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_refresh) {
            return Err(SupportError::ProfileRefresh("service unavailable".to_string()));
        }

        let server = self.server.lock().clone();
        let profile = server.ok_or(SupportError::NotAuthenticated)?;
        *self.session.lock() = Some(profile.clone());
        Ok(profile)
    }
}

// ─── Cause directory ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryCauseDirectory {
    causes: DashMap<String, Cause>,
    fail_fetch: AtomicUsize,
    fetches: AtomicUsize,
}

impl InMemoryCauseDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, cause: Cause) {
        self.causes.insert(cause.join_code.clone(), cause);
    }

    pub fn get(&self, code: &str) -> Option<Cause> {
        self.causes.get(code).map(|r| r.clone())
    }

    pub fn fail_next_fetch(&self, n: usize) {
        self.fail_fetch.store(n, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Server-side join: adds an email-keyed supporter record unless one
    /// with the same email already exists.
    fn record_supporter(&self, code: &str, request: &JoinRequest) -> SupportResult<bool> {
        let mut cause = self
            .causes
            .get_mut(code)
            .ok_or_else(|| SupportError::Join(format!("cause {code} not found")))?;

        let already = cause.supporters.iter().any(|s| match s {
            SupporterRef::Record(r) => r.email.as_deref() == Some(request.email.as_str()),
            SupporterRef::Id(_) => false,
        });
        if already {
            return Ok(false);
        }

        cause.supporters.push(SupporterRef::Record(SupporterRecord {
            id: None,
            email: Some(request.email.clone()),
            user: None,
        }));
        cause.metrics.supporter_count += 1;
        Ok(true)
    }
}

#[async_trait]
impl CauseProvider for InMemoryCauseDirectory {
    async fn fetch_cause_by_code(&self, code: &str) -> SupportResult<Option<Cause>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_fetch) {
            return Err(SupportError::CauseFetch(format!("fetch of {code} failed")));
        }
        Ok(self.get(code))
    }
}

// ─── Join endpoint ──────────────────────────────────────────────────────────

pub struct InMemoryJoinEndpoint {
    directory: Arc<InMemoryCauseDirectory>,
    latency: Option<Duration>,
    fail_join: AtomicUsize,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, JoinRequest)>>,
}

impl InMemoryJoinEndpoint {
    pub fn new(directory: Arc<InMemoryCauseDirectory>) -> Self {
        Self {
            directory,
            latency: None,
            fail_join: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Delay each call, leaving room for concurrent callers to interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_join.store(n, Ordering::SeqCst);
    }

    /// Number of outbound join calls observed, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, JoinRequest)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl JoinEndpoint for InMemoryJoinEndpoint {
    async fn join(&self, code: &str, request: &JoinRequest) -> SupportResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((code.to_string(), request.clone()));

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if take_failure(&self.fail_join) {
            return Err(SupportError::Join("gateway timeout".to_string()));
        }

        let added = self.directory.record_supporter(code, request)?;
        debug!(cause_code = %code, email = %request.email, added, "Join recorded");
        Ok(())
    }
}

// ─── Demo data ──────────────────────────────────────────────────────────────

pub fn demo_profile(id: &str, email: &str, name: &str) -> Profile {
    let mut personal_info = Map::new();
    personal_info.insert("city".to_string(), json!("London"));
    Profile {
        id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        is_verified: true,
        has_taken_cause_survey: false,
        personal_info,
    }
}

/// A cause with a creator and no supporters yet.
pub fn demo_cause(code: &str) -> Cause {
    Cause {
        id: format!("cause-{}", code.to_lowercase()),
        join_code: code.to_string(),
        name: "Clean Rivers Initiative".to_string(),
        supporters: Vec::new(),
        creator: Some(UserRef::Record(UserRecord {
            id: Some("u-founder".to_string()),
            email: Some("founder@cleanrivers.org".to_string()),
            name: Some("Rivka Founder".to_string()),
        })),
        supporter_goal: 500,
        metrics: CauseMetrics::default(),
    }
}

pub fn demo_answers() -> SurveyAnswers {
    SurveyAnswers {
        citizenship: Citizenship::Citizen,
        is_voter: VoterRegistration::Registered,
        will_vote: VotingIntent::Yes,
    }
}
