//! Cause page controller.
//!
//! Wires the gate, executor and survey pipeline to the page inputs (mount,
//! profile change, cause arrival, Support click, survey submit) and raises
//! the outputs through the event sink. Each mount starts a new context
//! generation; a result that comes back after the page was remounted or torn
//! down is dropped instead of applied.

use std::sync::Arc;

use cause_core::config::{AppConfig, EnrollmentConfig};
use cause_core::event_bus::{make_event, noop_sink, EnrollmentEventKind, EventSink};
use cause_core::types::{Cause, EnrollmentState, Profile, SurveyForm, Viewer};
use cause_core::{IntentStore, SupportError, SupportResult};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::{ContextToken, PageGeneration};
use crate::executor::{EnrollmentExecutor, JoinOutcome};
use crate::gate::{EnrollmentGate, GateAction, GateInput};
use crate::identity::IdentityResolver;
use crate::matcher::{SupporterMatcher, SupporterRoster};
use crate::providers::{CauseProvider, JoinEndpoint, ProfileProvider};
use crate::state_machine::EnrollmentStateMachine;
use crate::survey::{SurveyCoordinator, SurveyOutcome};

/// Label and enabled flag of the Support button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallToAction {
    pub label: String,
    pub enabled: bool,
}

/// Collaborators shared by every cause page. In-flight guards live in the
/// executor and survey coordinator, so pages built from the same services
/// share them across remounts.
#[derive(Clone)]
pub struct EnrollmentServices {
    identity: IdentityResolver,
    causes: Arc<dyn CauseProvider>,
    gate: Arc<EnrollmentGate>,
    executor: EnrollmentExecutor,
    survey: SurveyCoordinator,
    events: Arc<dyn EventSink>,
    labels: EnrollmentConfig,
}

impl EnrollmentServices {
    pub fn new(
        profiles: Arc<dyn ProfileProvider>,
        causes: Arc<dyn CauseProvider>,
        join: Arc<dyn JoinEndpoint>,
        intents: Arc<dyn IntentStore>,
    ) -> Self {
        let identity = IdentityResolver::new(profiles);
        let executor = EnrollmentExecutor::new(join, causes.clone());
        let survey = SurveyCoordinator::new(identity.clone(), executor.clone());
        Self {
            identity,
            causes,
            gate: Arc::new(EnrollmentGate::new(intents)),
            executor,
            survey,
            events: noop_sink(),
            labels: EnrollmentConfig::default(),
        }
    }

    /// Attach an event sink for the page outputs.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Apply CTA labels and the stale-intent warning threshold.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.labels = config.enrollment.clone();
        self.gate = Arc::new(
            EnrollmentGate::new(self.gate.intents().clone())
                .with_stale_warning(config.intent.stale_warn_after_secs),
        );
        self
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    pub fn page(&self, cause_code: impl Into<String>) -> SupportPage {
        SupportPage {
            cause_code: cause_code.into(),
            services: self.clone(),
            generation: PageGeneration::new(),
            state: Mutex::new(PageState::default()),
        }
    }
}

struct PageState {
    machine: EnrollmentStateMachine,
    viewer: Viewer,
    cause: Option<Cause>,
    roster: Option<SupporterRoster>,
    torn_down: bool,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            machine: EnrollmentStateMachine::new(),
            viewer: Viewer::Anonymous,
            cause: None,
            roster: None,
            torn_down: false,
        }
    }
}

impl PageState {
    fn already_enrolled(&self) -> bool {
        self.machine.is_terminal()
            || self
                .roster
                .as_ref()
                .is_some_and(|r| SupporterMatcher::matches(r, self.viewer.profile()))
    }

    fn apply_cause(&mut self, cause: Cause) {
        self.roster = Some(SupporterRoster::from_cause(&cause));
        self.cause = Some(cause);
    }
}

/// Enrollment state of one viewer on one cause page.
pub struct SupportPage {
    cause_code: String,
    services: EnrollmentServices,
    generation: PageGeneration,
    state: Mutex<PageState>,
}

impl SupportPage {
    pub fn cause_code(&self) -> &str {
        &self.cause_code
    }

    pub fn state(&self) -> EnrollmentState {
        self.state.lock().machine.state()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().machine.last_error().map(str::to_string)
    }

    pub fn cause(&self) -> Option<Cause> {
        self.state.lock().cause.clone()
    }

    pub fn viewer(&self) -> Viewer {
        self.state.lock().viewer.clone()
    }

    pub fn already_enrolled(&self) -> bool {
        self.state.lock().already_enrolled()
    }

    pub fn call_to_action(&self) -> CallToAction {
        let labels = &self.services.labels;
        match self.state() {
            EnrollmentState::Supporter => CallToAction {
                label: labels.supporter_label.clone(),
                enabled: false,
            },
            EnrollmentState::Joining => CallToAction {
                label: labels.support_label.clone(),
                enabled: false,
            },
            _ => CallToAction {
                label: labels.support_label.clone(),
                enabled: true,
            },
        }
    }

    // ─── Inputs ─────────────────────────────────────────────────────────

    /// Page mounted (first visit or return from a redirect). Loads the cause
    /// and viewer, then lets the gate consume a matching stored intent.
    pub async fn mount(&self) -> SupportResult<EnrollmentState> {
        let token = self.generation.advance();
        *self.state.lock() = PageState::default();
        info!(cause_code = %self.cause_code, generation = token.generation(), "Cause page mounted");

        let cause = self
            .services
            .causes
            .fetch_cause_by_code(&self.cause_code)
            .await?;
        let Some(cause) = cause else {
            // Nothing to enroll in; a leftover intent for this code is dropped.
            self.services.gate.consume_matching_intent(&self.cause_code).await;
            warn!(cause_code = %self.cause_code, "Cause not reachable, ignoring enrollment");
            return Ok(self.state());
        };

        let viewer = self.services.identity.viewer().await?;
        if !token.is_current() {
            return Ok(self.discard_stale("mount"));
        }
        {
            let mut state = self.state.lock();
            state.apply_cause(cause);
            state.viewer = viewer;
        }

        self.evaluate(&token, false).await
    }

    /// The session provider reported a new profile (sign-in, sign-out,
    /// email confirmation).
    pub async fn profile_changed(&self) -> SupportResult<EnrollmentState> {
        let token = self.generation.token();
        if self.is_torn_down() {
            return Ok(self.state());
        }

        let viewer = self.services.identity.viewer().await?;
        if !token.is_current() {
            return Ok(self.discard_stale("profile_changed"));
        }
        self.state.lock().viewer = viewer;

        self.evaluate(&token, false).await
    }

    /// Fresh cause data arrived from outside the enrollment flow.
    pub async fn cause_arrived(&self, cause: Cause) -> SupportResult<EnrollmentState> {
        let token = self.generation.token();
        if self.is_torn_down() {
            return Ok(self.state());
        }
        if cause.join_code != self.cause_code {
            return Err(SupportError::StateInconsistency(format!(
                "cause {} delivered to page for {}",
                cause.join_code, self.cause_code
            )));
        }

        let viewer = self.services.identity.viewer().await?;
        if !token.is_current() {
            return Ok(self.discard_stale("cause_arrived"));
        }
        {
            let mut state = self.state.lock();
            state.apply_cause(cause);
            state.viewer = viewer;
        }

        self.evaluate(&token, false).await
    }

    /// The viewer clicked Support. Ignored while a join is outstanding or
    /// once the viewer is a supporter.
    pub async fn support_clicked(&self) -> SupportResult<EnrollmentState> {
        let token = self.generation.token();
        if self.is_torn_down() || !self.state.lock().machine.can_retry() {
            return Ok(self.state());
        }

        let viewer = self.services.identity.viewer().await?;
        if !token.is_current() {
            return Ok(self.discard_stale("support_clicked"));
        }
        {
            let mut state = self.state.lock();
            state.viewer = viewer;
            if state.machine.state() == EnrollmentState::Error {
                let resumed = state.machine.recover();
                debug!(cause_code = %self.cause_code, ?resumed, "Retrying after failure");
            }
        }

        self.evaluate(&token, true).await
    }

    /// The viewer submitted the survey form.
    pub async fn submit_survey(&self, form: SurveyForm) -> SupportResult<EnrollmentState> {
        let answers = form.validate()?;
        let token = self.generation.token();
        if self.is_torn_down() || self.state.lock().machine.is_terminal() {
            return Ok(self.state());
        }

        let origin = self.begin_joining()?;
        let result = self.services.survey.submit(&self.cause_code, answers).await;

        match result {
            Ok(SurveyOutcome::Completed { profile, join }) => {
                if !token.is_current() {
                    return Ok(self.discard_stale("submit_survey"));
                }
                self.state.lock().viewer = Viewer::Authenticated(profile.clone());
                self.finish_join(&token, &profile, join).await
            }
            Ok(SurveyOutcome::AlreadyInFlight) => Ok(self.state()),
            Err(e) => {
                // Resume wherever the server says the viewer is: back at the
                // survey if the answers never landed, otherwise at Support.
                let viewer = self.services.identity.viewer().await.ok();
                if !token.is_current() {
                    return Err(e);
                }
                let origin = match viewer {
                    Some(viewer) if viewer.has_taken_survey() => {
                        let resume = EnrollmentState::NotSupporter;
                        self.state.lock().viewer = viewer;
                        resume
                    }
                    _ => origin,
                };
                self.fail(origin, e)
            }
        }
    }

    /// The page is going away. Outstanding work is no longer applied.
    pub fn teardown(&self) {
        let token = self.generation.advance();
        self.state.lock().torn_down = true;
        debug!(cause_code = %self.cause_code, generation = token.generation(), "Cause page torn down");
    }

    // ─── Internals ──────────────────────────────────────────────────────

    async fn evaluate(&self, token: &ContextToken, clicked: bool) -> SupportResult<EnrollmentState> {
        let (viewer, already_enrolled) = {
            let state = self.state.lock();
            (state.viewer.clone(), state.already_enrolled())
        };

        let decision = self
            .services
            .gate
            .evaluate(GateInput {
                cause_code: &self.cause_code,
                viewer: &viewer,
                already_enrolled,
                clicked,
            })
            .await;
        if !token.is_current() {
            return Ok(self.discard_stale("gate"));
        }

        match decision.action {
            GateAction::None => {
                if already_enrolled {
                    self.state.lock().machine.transition(EnrollmentState::Supporter)?;
                }
                Ok(self.state())
            }
            GateAction::ShowRegisterOrLogin => {
                self.state.lock().machine.transition(EnrollmentState::PendingAuth)?;
                self.emit(EnrollmentEventKind::ShowAuthPrompt, &viewer, None);
                Ok(self.state())
            }
            GateAction::ShowSurvey => {
                self.state.lock().machine.transition(EnrollmentState::PendingSurvey)?;
                self.emit(EnrollmentEventKind::ShowSurvey, &viewer, None);
                Ok(self.state())
            }
            GateAction::AutoJoin => match viewer {
                Viewer::Authenticated(profile) => self.run_join(token, &profile).await,
                Viewer::Anonymous => Err(SupportError::NotAuthenticated),
            },
        }
    }

    async fn run_join(&self, token: &ContextToken, profile: &Profile) -> SupportResult<EnrollmentState> {
        let origin = self.begin_joining()?;
        let result = self.services.executor.join(&self.cause_code, profile).await;
        if !token.is_current() {
            return Ok(self.discard_stale("join"));
        }

        match result {
            Ok(outcome) => self.finish_join(token, profile, outcome).await,
            Err(e) => self.fail(origin, e),
        }
    }

    /// Move to `Joining`, returning the state a failure should resume from.
    fn begin_joining(&self) -> SupportResult<EnrollmentState> {
        let mut state = self.state.lock();
        let origin = match state.machine.state() {
            EnrollmentState::Error => state
                .machine
                .resume_from()
                .unwrap_or(EnrollmentState::NotSupporter),
            EnrollmentState::Joining => EnrollmentState::NotSupporter,
            other => other,
        };
        state.machine.transition(EnrollmentState::Joining)?;
        Ok(origin)
    }

    async fn finish_join(
        &self,
        token: &ContextToken,
        profile: &Profile,
        outcome: JoinOutcome,
    ) -> SupportResult<EnrollmentState> {
        let JoinOutcome::Joined { cause } = outcome else {
            debug!(cause_code = %self.cause_code, "Join already outstanding for this viewer");
            return Ok(self.state());
        };

        // Enrollment changed server-side; re-read the session before the
        // viewer is consulted again.
        let viewer = match self.services.identity.refresh().await {
            Ok(viewer) => viewer,
            Err(e) => {
                warn!(
                    cause_code = %self.cause_code,
                    viewer_id = %profile.id,
                    error = %e,
                    "Profile refresh after join failed"
                );
                Viewer::Authenticated(profile.clone())
            }
        };
        if !token.is_current() {
            return Ok(self.discard_stale("join_refresh"));
        }

        {
            let mut state = self.state.lock();
            if let Some(cause) = cause {
                state.apply_cause(cause);
            }
            state.viewer = viewer.clone();
            state.machine.transition(EnrollmentState::Supporter)?;
        }
        info!(cause_code = %self.cause_code, viewer_id = %profile.id, "Viewer is now a supporter");
        self.emit(EnrollmentEventKind::EnrollmentSucceeded, &viewer, None);
        Ok(EnrollmentState::Supporter)
    }

    fn fail(&self, origin: EnrollmentState, error: SupportError) -> SupportResult<EnrollmentState> {
        let viewer = {
            let mut state = self.state.lock();
            state.machine.fail(origin, error.to_string())?;
            state.viewer.clone()
        };
        warn!(
            cause_code = %self.cause_code,
            resume_from = ?origin,
            error = %error,
            "Enrollment step failed"
        );
        self.emit(
            EnrollmentEventKind::EnrollmentFailed,
            &viewer,
            Some(error.to_string()),
        );
        Err(error)
    }

    fn emit(&self, kind: EnrollmentEventKind, viewer: &Viewer, detail: Option<String>) {
        self.services.events.emit(make_event(
            kind,
            self.cause_code.clone(),
            viewer.viewer_id().map(str::to_string),
            detail,
        ));
    }

    fn is_torn_down(&self) -> bool {
        self.state.lock().torn_down
    }

    fn discard_stale(&self, operation: &str) -> EnrollmentState {
        debug!(cause_code = %self.cause_code, operation, "Discarding result for stale page context");
        self.state()
    }
}
