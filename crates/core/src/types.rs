use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SupportError, SupportResult};

// ─── Cause ──────────────────────────────────────────────────────────────────

/// A civic campaign viewers can support, as returned by the cause data
/// provider. Read-only to the enrollment flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cause {
    #[serde(alias = "_id")]
    pub id: String,
    pub join_code: String,
    pub name: String,
    #[serde(default)]
    pub supporters: Vec<SupporterRef>,
    #[serde(default)]
    pub creator: Option<UserRef>,
    #[serde(default)]
    pub supporter_goal: u64,
    #[serde(default)]
    pub metrics: CauseMetrics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CauseMetrics {
    #[serde(default)]
    pub supporter_count: u64,
    #[serde(default)]
    pub share_count: u64,
}

/// A supporter entry as written by the various join paths (self-join, bulk
/// invite, legacy import). The shape is not canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SupporterRef {
    Id(String),
    Record(SupporterRecord),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupporterRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
}

/// Reference to a user: either a bare id or an embedded user document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    Record(UserRecord),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            UserRef::Id(id) => Some(id),
            UserRef::Record(record) => record.id.as_deref(),
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            UserRef::Id(_) => None,
            UserRef::Record(record) => record.email.as_deref(),
        }
    }
}

// ─── Viewer ─────────────────────────────────────────────────────────────────

/// Profile of a signed-in viewer as reported by the session provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub has_taken_cause_survey: bool,
    #[serde(default)]
    pub personal_info: Map<String, Value>,
}

/// Partial profile update. Keys in `personal_info` are merged into the
/// stored object; keys not present are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default)]
    pub personal_info: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Viewer {
    Anonymous,
    Authenticated(Profile),
}

impl Viewer {
    pub fn from_profile(profile: Option<Profile>) -> Self {
        match profile {
            Some(profile) => Viewer::Authenticated(profile),
            None => Viewer::Anonymous,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated(profile) => Some(profile),
        }
    }

    pub fn viewer_id(&self) -> Option<&str> {
        self.profile().map(|p| p.id.as_str())
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Viewer::Anonymous)
    }

    /// Anonymous viewers have never taken the survey.
    pub fn has_taken_survey(&self) -> bool {
        self.profile().is_some_and(|p| p.has_taken_cause_survey)
    }
}

// ─── Survey ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Citizenship {
    Citizen,
    PermanentResident,
    NonCitizen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoterRegistration {
    Registered,
    NotRegistered,
    Unsure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingIntent {
    Yes,
    No,
    Undecided,
}

/// Answers to the one-time cause survey. Every field is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyAnswers {
    pub citizenship: Citizenship,
    pub is_voter: VoterRegistration,
    pub will_vote: VotingIntent,
}

impl SurveyAnswers {
    /// Render the answers as the partial update merged into a profile's
    /// personal info.
    pub fn to_patch(&self) -> SupportResult<ProfilePatch> {
        match serde_json::to_value(self)? {
            Value::Object(personal_info) => Ok(ProfilePatch { personal_info }),
            other => Err(SupportError::Validation(format!(
                "survey answers serialized to non-object: {other}"
            ))),
        }
    }
}

/// Raw survey input as captured by the form. Fields stay optional until
/// `validate` turns the form into `SurveyAnswers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyForm {
    pub citizenship: Option<Citizenship>,
    pub is_voter: Option<VoterRegistration>,
    pub will_vote: Option<VotingIntent>,
}

impl SurveyForm {
    pub fn validate(&self) -> SupportResult<SurveyAnswers> {
        let mut missing = Vec::new();
        if self.citizenship.is_none() {
            missing.push("citizenship");
        }
        if self.is_voter.is_none() {
            missing.push("isVoter");
        }
        if self.will_vote.is_none() {
            missing.push("willVote");
        }

        match (self.citizenship, self.is_voter, self.will_vote) {
            (Some(citizenship), Some(is_voter), Some(will_vote)) => Ok(SurveyAnswers {
                citizenship,
                is_voter,
                will_vote,
            }),
            _ => Err(SupportError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

impl From<SurveyAnswers> for SurveyForm {
    fn from(answers: SurveyAnswers) -> Self {
        Self {
            citizenship: Some(answers.citizenship),
            is_voter: Some(answers.is_voter),
            will_vote: Some(answers.will_vote),
        }
    }
}

// ─── Join ───────────────────────────────────────────────────────────────────

/// Payload sent to the external join endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

// ─── Enrollment state ───────────────────────────────────────────────────────

/// Where a viewer stands with respect to one cause. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    NotSupporter,
    PendingAuth,
    PendingSurvey,
    Joining,
    Supporter,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_supporter_refs_deserialize_every_shape() {
        let refs: Vec<SupporterRef> = serde_json::from_value(json!([
            "u-1",
            { "email": "a@b.com" },
            { "user": "u-2" },
            { "user": { "_id": "u-3" } },
            { "_id": "u-4", "email": "d@e.com" },
            {}
        ]))
        .unwrap();

        assert_eq!(refs[0], SupporterRef::Id("u-1".into()));
        match &refs[1] {
            SupporterRef::Record(r) => assert_eq!(r.email.as_deref(), Some("a@b.com")),
            other => panic!("expected record, got {other:?}"),
        }
        match &refs[3] {
            SupporterRef::Record(r) => {
                assert_eq!(r.user.as_ref().and_then(UserRef::id), Some("u-3"))
            }
            other => panic!("expected record, got {other:?}"),
        }
        assert_eq!(refs[5], SupporterRef::Record(SupporterRecord::default()));
    }

    #[test]
    fn test_cause_wire_shape() {
        let cause: Cause = serde_json::from_value(json!({
            "_id": "c-1",
            "joinCode": "ABC123",
            "name": "Clean Rivers",
            "supporters": ["u-1"],
            "creator": { "_id": "u-9", "email": "owner@example.org" },
            "supporterGoal": 500,
            "metrics": { "supporterCount": 1 }
        }))
        .unwrap();

        assert_eq!(cause.id, "c-1");
        assert_eq!(cause.join_code, "ABC123");
        assert_eq!(cause.creator.as_ref().and_then(UserRef::email), Some("owner@example.org"));
        assert_eq!(cause.metrics.supporter_count, 1);
    }

    #[test]
    fn test_survey_form_reports_missing_fields() {
        let form = SurveyForm {
            citizenship: Some(Citizenship::Citizen),
            ..Default::default()
        };
        let err = form.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("isVoter"));
        assert!(msg.contains("willVote"));
        assert!(!msg.contains("citizenship"));
    }

    #[test]
    fn test_survey_patch_keys() {
        let answers = SurveyAnswers {
            citizenship: Citizenship::PermanentResident,
            is_voter: VoterRegistration::Unsure,
            will_vote: VotingIntent::Yes,
        };
        let patch = answers.to_patch().unwrap();
        assert_eq!(patch.personal_info["citizenship"], json!("permanent_resident"));
        assert_eq!(patch.personal_info["isVoter"], json!("unsure"));
        assert_eq!(patch.personal_info["willVote"], json!("yes"));
    }

    #[test]
    fn test_viewer_survey_flag() {
        assert!(!Viewer::Anonymous.has_taken_survey());
        let profile = Profile {
            id: "u-1".into(),
            email: "a@b.com".into(),
            name: "Ada Lovelace".into(),
            is_verified: true,
            has_taken_cause_survey: true,
            personal_info: Map::new(),
        };
        assert!(Viewer::from_profile(Some(profile)).has_taken_survey());
    }
}
