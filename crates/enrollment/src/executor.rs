use std::sync::Arc;

use cause_core::types::{Cause, JoinRequest, Profile};
use cause_core::SupportResult;
use tracing::{debug, info, warn};

use crate::guard::{InFlightKey, InFlightSet};
use crate::providers::{CauseProvider, JoinEndpoint};

#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// The endpoint accepted the join. `cause` is the refetched cause, absent
    /// when the refetch itself failed.
    Joined { cause: Option<Cause> },
    /// Another join for the same viewer and cause is still outstanding; this
    /// call did nothing.
    AlreadyInFlight,
}

impl JoinOutcome {
    pub fn is_joined(&self) -> bool {
        matches!(self, JoinOutcome::Joined { .. })
    }
}

/// Performs the join call and refetches the cause so supporter counts come
/// from the server rather than a local increment.
#[derive(Clone)]
pub struct EnrollmentExecutor {
    endpoint: Arc<dyn JoinEndpoint>,
    causes: Arc<dyn CauseProvider>,
    in_flight: InFlightSet,
}

impl EnrollmentExecutor {
    pub fn new(endpoint: Arc<dyn JoinEndpoint>, causes: Arc<dyn CauseProvider>) -> Self {
        Self {
            endpoint,
            causes,
            in_flight: InFlightSet::new(),
        }
    }

    pub fn is_in_flight(&self, cause_code: &str, profile: &Profile) -> bool {
        self.in_flight
            .is_in_flight(&InFlightKey::new(&profile.id, cause_code))
    }

    pub async fn join(&self, cause_code: &str, profile: &Profile) -> SupportResult<JoinOutcome> {
        let Some(_guard) = self
            .in_flight
            .try_acquire(InFlightKey::new(&profile.id, cause_code))
        else {
            metrics::counter!("enrollment.join.deduplicated").increment(1);
            debug!(cause_code = %cause_code, viewer_id = %profile.id, "Join already in flight, dropping");
            return Ok(JoinOutcome::AlreadyInFlight);
        };

        let request = join_request(profile);
        info!(cause_code = %cause_code, viewer_id = %profile.id, "Joining cause");

        if let Err(e) = self.endpoint.join(cause_code, &request).await {
            metrics::counter!("enrollment.join.failure").increment(1);
            warn!(cause_code = %cause_code, viewer_id = %profile.id, error = %e, "Join failed");
            return Err(e);
        }
        metrics::counter!("enrollment.join.success").increment(1);

        let cause = match self.causes.fetch_cause_by_code(cause_code).await {
            Ok(cause) => cause,
            Err(e) => {
                warn!(cause_code = %cause_code, error = %e, "Cause refetch after join failed");
                None
            }
        };

        info!(
            cause_code = %cause_code,
            viewer_id = %profile.id,
            supporter_count = cause.as_ref().map(|c| c.metrics.supporter_count),
            "Joined cause"
        );
        Ok(JoinOutcome::Joined { cause })
    }
}

/// Build the join payload from a profile.
pub fn join_request(profile: &Profile) -> JoinRequest {
    let (first_name, last_name) = split_name(&profile.name);
    JoinRequest {
        first_name,
        last_name,
        email: profile.email.clone(),
    }
}

/// First whitespace-delimited token, then the rest rejoined with single
/// spaces. Either part may be empty.
pub fn split_name(name: &str) -> (String, String) {
    let mut tokens = name.split_whitespace();
    let first = tokens.next().unwrap_or_default().to_string();
    let rest = tokens.collect::<Vec<_>>().join(" ");
    (first, rest)
}
