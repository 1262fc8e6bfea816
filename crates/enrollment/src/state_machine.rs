use cause_core::types::EnrollmentState;
use cause_core::{SupportError, SupportResult};
use serde::{Deserialize, Serialize};

/// Describes a single valid state transition for a viewer on one cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: EnrollmentState,
    pub to: EnrollmentState,
    pub trigger: String,
}

/// Guards the enrollment lifecycle with a finite set of valid transitions.
///
/// `Supporter` is absorbing. `Error` is not terminal: it remembers the state
/// the failing operation started from and hands control back to it.
#[derive(Debug, Clone)]
pub struct EnrollmentStateMachine {
    state: EnrollmentState,
    resume_from: Option<EnrollmentState>,
    last_error: Option<String>,
    transitions: Vec<StateTransition>,
}

impl EnrollmentStateMachine {
    /// Creates a new state machine in `NotSupporter` with all valid
    /// transitions pre-configured.
    pub fn new() -> Self {
        use EnrollmentState::*;

        let table = [
            (NotSupporter, PendingAuth, "support_anonymous"),
            (NotSupporter, PendingSurvey, "support_unsurveyed"),
            (NotSupporter, Joining, "support_surveyed"),
            (NotSupporter, Supporter, "already_enrolled"),
            (PendingAuth, PendingSurvey, "signed_in_unsurveyed"),
            (PendingAuth, Joining, "signed_in_surveyed"),
            (PendingAuth, Supporter, "already_enrolled"),
            (PendingSurvey, PendingAuth, "signed_out"),
            (PendingSurvey, Joining, "survey_submitted"),
            (PendingSurvey, Supporter, "already_enrolled"),
            (Joining, Supporter, "join_succeeded"),
            (Joining, Error, "join_failed"),
            (PendingSurvey, Error, "survey_failed"),
            (NotSupporter, Error, "operation_failed"),
            (PendingAuth, Error, "operation_failed"),
            // Error -> origin state
            (Error, NotSupporter, "recover"),
            (Error, PendingAuth, "recover"),
            (Error, PendingSurvey, "recover"),
            (Error, Joining, "retry"),
            (Error, Supporter, "already_enrolled"),
        ];

        let transitions = table
            .into_iter()
            .map(|(from, to, trigger)| StateTransition {
                from,
                to,
                trigger: trigger.to_string(),
            })
            .collect();

        Self {
            state: NotSupporter,
            resume_from: None,
            last_error: None,
            transitions,
        }
    }

    pub fn state(&self) -> EnrollmentState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// State the last failing operation was attempted from.
    pub fn resume_from(&self) -> Option<EnrollmentState> {
        self.resume_from
    }

    /// Returns `true` if the given transition is allowed.
    pub fn can_transition(&self, from: EnrollmentState, to: EnrollmentState) -> bool {
        from == to || self.transitions.iter().any(|t| t.from == from && t.to == to)
    }

    /// Attempts to move to `to`. Moving to the current state is a no-op.
    pub fn transition(&mut self, to: EnrollmentState) -> SupportResult<()> {
        if !self.can_transition(self.state, to) {
            return Err(SupportError::StateInconsistency(format!(
                "invalid enrollment transition from {:?} to {:?}",
                self.state, to
            )));
        }
        if self.state == EnrollmentState::Error && to != EnrollmentState::Error {
            self.resume_from = None;
            self.last_error = None;
        }
        self.state = to;
        Ok(())
    }

    /// Record a failure of an operation attempted from `origin`.
    ///
    /// `Joining` is transient: a failed join hands control back to the state
    /// the join was started from, which `origin` names.
    pub fn fail(&mut self, origin: EnrollmentState, message: impl Into<String>) -> SupportResult<()> {
        if self.state == EnrollmentState::Supporter {
            return Err(SupportError::StateInconsistency(
                "supporter state is terminal".to_string(),
            ));
        }
        self.resume_from = Some(origin);
        self.last_error = Some(message.into());
        self.state = EnrollmentState::Error;
        Ok(())
    }

    /// Leave `Error` for the state the failed operation started from.
    pub fn recover(&mut self) -> EnrollmentState {
        if self.state == EnrollmentState::Error {
            self.state = self.resume_from.take().unwrap_or(EnrollmentState::NotSupporter);
            self.last_error = None;
        }
        self.state
    }

    /// Whether the Support action may be invoked from the current state.
    pub fn can_retry(&self) -> bool {
        !matches!(
            self.state,
            EnrollmentState::Supporter | EnrollmentState::Joining
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.state == EnrollmentState::Supporter
    }
}

impl Default for EnrollmentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EnrollmentState::*;

    #[test]
    fn test_full_path() {
        let mut sm = EnrollmentStateMachine::new();
        for to in [PendingAuth, PendingSurvey, Joining, Supporter] {
            sm.transition(to).unwrap();
        }
        assert_eq!(sm.state(), Supporter);
        assert!(sm.is_terminal());
    }

    #[test]
    fn test_shortcut_path() {
        let mut sm = EnrollmentStateMachine::new();
        sm.transition(Joining).unwrap();
        sm.transition(Supporter).unwrap();
        assert_eq!(sm.state(), Supporter);
    }

    #[test]
    fn test_supporter_is_absorbing() {
        let mut sm = EnrollmentStateMachine::new();
        sm.transition(Supporter).unwrap();
        for to in [NotSupporter, PendingAuth, PendingSurvey, Joining, Error] {
            assert!(sm.transition(to).is_err());
        }
        assert!(sm.fail(Joining, "late failure").is_err());
        assert!(!sm.can_retry());
    }

    #[test]
    fn test_error_returns_to_origin() {
        let mut sm = EnrollmentStateMachine::new();
        sm.transition(PendingSurvey).unwrap();
        sm.fail(PendingSurvey, "Profile update error: 503").unwrap();

        assert_eq!(sm.state(), Error);
        assert_eq!(sm.resume_from(), Some(PendingSurvey));
        assert_eq!(sm.last_error(), Some("Profile update error: 503"));
        assert!(sm.can_retry());

        assert_eq!(sm.recover(), PendingSurvey);
        assert!(sm.last_error().is_none());
    }

    #[test]
    fn test_retry_join_from_error() {
        let mut sm = EnrollmentStateMachine::new();
        sm.transition(Joining).unwrap();
        sm.fail(NotSupporter, "Join error: timeout").unwrap();
        sm.transition(Joining).unwrap();
        assert!(sm.resume_from().is_none());
        sm.transition(Supporter).unwrap();
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut sm = EnrollmentStateMachine::new();
        assert!(sm.transition(PendingAuth).is_ok());
        assert!(sm.transition(NotSupporter).is_err());
        assert_eq!(sm.state(), PendingAuth);
    }
}
