//! Supporter matching over heterogeneous supporter records.
//!
//! Records reach a cause through several write paths (self-join, bulk invite,
//! legacy import) and carry different subsets of `_id`, `email` and `user`.
//! Each record is normalized once into a [`SupporterIdentity`] when cause data
//! arrives; matching then ORs the individual field checks. A single matching
//! field is enough evidence of identity.

use cause_core::types::{Cause, Profile, SupporterRef, UserRef};
use serde::Serialize;

/// Canonical form of a supporter or creator record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupporterIdentity {
    /// A bare identity string or the record's own `_id`.
    pub id: Option<String>,
    pub email: Option<String>,
    /// `user` as a bare id or `user._id`.
    pub user_id: Option<String>,
}

impl From<&SupporterRef> for SupporterIdentity {
    fn from(supporter: &SupporterRef) -> Self {
        match supporter {
            SupporterRef::Id(id) => Self {
                id: Some(id.clone()),
                ..Default::default()
            },
            SupporterRef::Record(record) => Self {
                id: record.id.clone(),
                email: record.email.clone(),
                user_id: record.user.as_ref().and_then(UserRef::id).map(str::to_string),
            },
        }
    }
}

impl From<&UserRef> for SupporterIdentity {
    fn from(user: &UserRef) -> Self {
        Self {
            id: user.id().map(str::to_string),
            email: user.email().map(str::to_string),
            user_id: None,
        }
    }
}

/// Which field produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchEvidence {
    SupporterId,
    SupporterEmail,
    SupporterUser,
    CreatorId,
    CreatorEmail,
}

/// Normalized supporter list and creator of one cause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupporterRoster {
    pub cause_code: String,
    pub supporters: Vec<SupporterIdentity>,
    pub creator: Option<SupporterIdentity>,
}

impl SupporterRoster {
    pub fn from_cause(cause: &Cause) -> Self {
        Self {
            cause_code: cause.join_code.clone(),
            supporters: cause.supporters.iter().map(SupporterIdentity::from).collect(),
            creator: cause.creator.as_ref().map(SupporterIdentity::from),
        }
    }

    pub fn len(&self) -> usize {
        self.supporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supporters.is_empty()
    }
}

pub struct SupporterMatcher;

impl SupporterMatcher {
    /// Whether `profile` already appears among the supporters or as the
    /// creator. An absent profile never matches.
    pub fn matches(roster: &SupporterRoster, profile: Option<&Profile>) -> bool {
        Self::evidence(roster, profile).is_some()
    }

    /// Convenience for callers holding raw cause data.
    pub fn match_cause(cause: &Cause, profile: Option<&Profile>) -> bool {
        Self::matches(&SupporterRoster::from_cause(cause), profile)
    }

    /// First field found to match, supporters before creator.
    pub fn evidence(roster: &SupporterRoster, profile: Option<&Profile>) -> Option<MatchEvidence> {
        let profile = profile?;

        roster
            .supporters
            .iter()
            .find_map(|s| supporter_evidence(s, profile))
            .or_else(|| {
                roster
                    .creator
                    .as_ref()
                    .and_then(|c| creator_evidence(c, profile))
            })
    }
}

fn supporter_evidence(supporter: &SupporterIdentity, profile: &Profile) -> Option<MatchEvidence> {
    if supporter.id.as_deref() == Some(profile.id.as_str()) {
        Some(MatchEvidence::SupporterId)
    } else if supporter.email.as_deref() == Some(profile.email.as_str()) {
        Some(MatchEvidence::SupporterEmail)
    } else if supporter.user_id.as_deref() == Some(profile.id.as_str()) {
        Some(MatchEvidence::SupporterUser)
    } else {
        None
    }
}

fn creator_evidence(creator: &SupporterIdentity, profile: &Profile) -> Option<MatchEvidence> {
    if creator.id.as_deref() == Some(profile.id.as_str()) {
        Some(MatchEvidence::CreatorId)
    } else if creator.email.as_deref() == Some(profile.email.as_str()) {
        Some(MatchEvidence::CreatorEmail)
    } else {
        None
    }
}
