use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A tracked contributor, keyed by username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorRecord {
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    pub contributions: u64,

    /// Project ids this contributor was seen in. Only ever grows.
    #[serde(default)]
    pub projects: BTreeSet<String>,

    /// `owner/name` of repositories this contributor was seen in. Only ever grows.
    #[serde(default)]
    pub repositories: BTreeSet<String>,

    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub profile_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub needs_update: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ContributorProfile>,

    /// Reason the last detailed profile fetch failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_error: Option<String>,
}

impl ContributorRecord {
    #[must_use]
    pub fn new(username: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            avatar_url: None,
            profile_url: None,
            contributions: 0,
            projects: BTreeSet::new(),
            repositories: BTreeSet::new(),
            last_seen: now,
            profile_updated: None,
            needs_update: true,
            profile: None,
            profile_error: None,
        }
    }

    #[must_use]
    pub fn followers(&self) -> u64 {
        self.profile.as_ref().map_or(0, |p| p.followers)
    }
}

/// Detailed profile fields. Field names match the GitHub users API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub hireable: Option<bool>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub public_gists: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
