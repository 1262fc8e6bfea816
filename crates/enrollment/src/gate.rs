//! Enrollment gate: decides the next UI action for a cause page.
//!
//! [`EnrollmentGate::decide`] is a pure function of its inputs.
//! [`EnrollmentGate::evaluate`] wraps it with the intent bookkeeping: a
//! stored intent for the current cause is consumed on every evaluation that
//! sees it, and an anonymous support request records a fresh intent before
//! the viewer is sent to sign in.

use std::sync::Arc;

use chrono::Utc;
use cause_core::types::Viewer;
use cause_core::IntentStore;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Next action the page must take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    /// Nothing to do: either already a supporter or no support was requested.
    None,
    ShowRegisterOrLogin,
    ShowSurvey,
    AutoJoin,
}

impl GateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ShowRegisterOrLogin => "show_register_or_login",
            Self::ShowSurvey => "show_survey",
            Self::AutoJoin => "auto_join",
        }
    }
}

/// Where a pending support request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportRequest {
    /// The viewer clicked Support on this page.
    Click,
    /// A stored intent for this cause survived a redirect and was consumed.
    StoredIntent,
}

/// Inputs of one gate evaluation.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub cause_code: &'a str,
    pub viewer: &'a Viewer,
    pub already_enrolled: bool,
    pub clicked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub action: GateAction,
    pub request: Option<SupportRequest>,
    pub consumed_intent: bool,
}

pub struct EnrollmentGate {
    intents: Arc<dyn IntentStore>,
    stale_warn_after_secs: u64,
}

impl EnrollmentGate {
    pub fn new(intents: Arc<dyn IntentStore>) -> Self {
        Self {
            intents,
            stale_warn_after_secs: u64::MAX,
        }
    }

    /// Log a warning when a consumed intent is older than `secs`.
    pub fn with_stale_warning(mut self, secs: u64) -> Self {
        self.stale_warn_after_secs = secs;
        self
    }

    pub fn intents(&self) -> &Arc<dyn IntentStore> {
        &self.intents
    }

    /// First matching rule wins:
    /// 1. already enrolled → `None`
    /// 2. no support request → `None`
    /// 3. anonymous → `ShowRegisterOrLogin`
    /// 4. signed in, survey not taken → `ShowSurvey`
    /// 5. signed in, survey taken → `AutoJoin`
    pub fn decide(
        viewer: &Viewer,
        already_enrolled: bool,
        request: Option<SupportRequest>,
        has_taken_survey: bool,
    ) -> GateAction {
        if already_enrolled {
            return GateAction::None;
        }
        if request.is_none() {
            return GateAction::None;
        }
        match viewer {
            Viewer::Anonymous => GateAction::ShowRegisterOrLogin,
            Viewer::Authenticated(_) if !has_taken_survey => GateAction::ShowSurvey,
            Viewer::Authenticated(_) => GateAction::AutoJoin,
        }
    }

    /// Run one evaluation for a page, consuming a matching stored intent and
    /// recording a new one when the viewer must sign in first.
    ///
    /// Intent store failures are logged and never block the decision.
    pub async fn evaluate(&self, input: GateInput<'_>) -> GateDecision {
        let consumed_intent = self.consume_matching_intent(input.cause_code).await;

        let request = if input.clicked {
            Some(SupportRequest::Click)
        } else if consumed_intent {
            Some(SupportRequest::StoredIntent)
        } else {
            None
        };

        let action = Self::decide(
            input.viewer,
            input.already_enrolled,
            request,
            input.viewer.has_taken_survey(),
        );

        if action == GateAction::ShowRegisterOrLogin {
            match self.intents.set(input.cause_code).await {
                Ok(()) => info!(cause_code = %input.cause_code, "Recorded pending intent before sign-in"),
                Err(e) => warn!(
                    cause_code = %input.cause_code,
                    error = %e,
                    "Failed to record pending intent; support will need another click after sign-in"
                ),
            }
        }

        metrics::counter!("enrollment.gate.decision", "action" => action.as_str()).increment(1);
        debug!(
            cause_code = %input.cause_code,
            viewer_id = input.viewer.viewer_id().unwrap_or("anonymous"),
            already_enrolled = input.already_enrolled,
            ?request,
            action = action.as_str(),
            "Gate evaluated"
        );

        GateDecision {
            action,
            request,
            consumed_intent,
        }
    }

    /// Clear the stored intent if it names `cause_code`. Intents for other
    /// causes are left for their own page.
    pub async fn consume_matching_intent(&self, cause_code: &str) -> bool {
        let stored = match self.intents.get().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(cause_code = %cause_code, error = %e, "Failed to read pending intent");
                return false;
            }
        };

        let Some(intent) = stored.filter(|i| i.matches(cause_code)) else {
            return false;
        };

        if let Err(e) = self.intents.clear().await {
            warn!(cause_code = %cause_code, error = %e, "Failed to clear pending intent");
        }

        let age_secs = intent.age_secs(Utc::now());
        if age_secs >= 0 && age_secs as u64 > self.stale_warn_after_secs {
            warn!(cause_code = %cause_code, age_secs, "Honoring stale pending intent");
        }
        metrics::counter!("enrollment.intent.consumed").increment(1);
        info!(cause_code = %cause_code, age_secs, "Consumed pending intent");
        true
    }
}
