use cause_core::types::{Profile, SurveyAnswers, Viewer};
use cause_core::{SupportError, SupportResult};
use tracing::{debug, info, warn};

use crate::executor::{EnrollmentExecutor, JoinOutcome};
use crate::guard::{InFlightKey, InFlightSet};
use crate::identity::IdentityResolver;

#[derive(Debug, Clone)]
pub enum SurveyOutcome {
    /// Answers stored, profile refreshed and the join attempted.
    Completed { profile: Profile, join: JoinOutcome },
    /// A submission for the same viewer and cause is still outstanding.
    AlreadyInFlight,
}

/// Runs the one-time survey pipeline: merge answers into the profile,
/// refresh it, then join. Each step is awaited before the next starts, and
/// the first failure stops the pipeline.
#[derive(Clone)]
pub struct SurveyCoordinator {
    identity: IdentityResolver,
    executor: EnrollmentExecutor,
    in_flight: InFlightSet,
}

impl SurveyCoordinator {
    pub fn new(identity: IdentityResolver, executor: EnrollmentExecutor) -> Self {
        Self {
            identity,
            executor,
            in_flight: InFlightSet::new(),
        }
    }

    pub async fn submit(&self, cause_code: &str, answers: SurveyAnswers) -> SupportResult<SurveyOutcome> {
        let viewer_id = match self.identity.viewer().await? {
            Viewer::Authenticated(profile) => profile.id,
            Viewer::Anonymous => return Err(SupportError::NotAuthenticated),
        };

        let Some(_guard) = self
            .in_flight
            .try_acquire(InFlightKey::new(&viewer_id, cause_code))
        else {
            metrics::counter!("enrollment.survey.deduplicated").increment(1);
            debug!(cause_code = %cause_code, viewer_id = %viewer_id, "Survey submit already in flight, dropping");
            return Ok(SurveyOutcome::AlreadyInFlight);
        };

        let patch = answers.to_patch()?;
        self.identity.provider().update_profile(patch).await?;
        metrics::counter!("enrollment.survey.submitted").increment(1);
        info!(cause_code = %cause_code, viewer_id = %viewer_id, "Survey answers saved");

        let profile = match self.identity.refresh().await? {
            Viewer::Authenticated(profile) => profile,
            Viewer::Anonymous => return Err(SupportError::NotAuthenticated),
        };
        if !profile.has_taken_cause_survey {
            // The flag is server-derived; never force it locally.
            warn!(viewer_id = %viewer_id, "Profile still reports survey not taken after submit");
        }

        let join = self.executor.join(cause_code, &profile).await?;
        Ok(SurveyOutcome::Completed { profile, join })
    }
}
