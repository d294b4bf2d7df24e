//! Remote metrics API
//!
//! [`MetricsApi`] is the seam between collection logic and the hosting service. It
//! exposes exactly the reads the collector and contributor cache need, and reports
//! failures through [`ApiError`] so callers can tell permanent outcomes (not found,
//! forbidden) apart from rate limiting and everything else.
//!
//! [`GitHubClient`] implements the trait over the GitHub REST v3 API.

mod client;

pub use client::GitHubClient;

use crate::model::{ContributorProfile, RepoKey};
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use serde::Deserialize;

/// Rate limit state reported by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Failure outcome of a remote call.
#[derive(Debug)]
pub enum ApiError {
    /// The resource does not exist (HTTP 404).
    NotFound,

    /// Access to the resource is denied for reasons other than rate limiting (HTTP 403).
    Forbidden,

    /// The call budget is exhausted until the reported reset time.
    RateLimited(RateLimitInfo),

    /// The server answered with another unsuccessful status.
    Status { status: u16, url: String },

    /// The call did not produce a usable response.
    Transport(ohno::AppError),
}

impl ApiError {
    /// Whether the server answered, and so the call consumed budget.
    #[must_use]
    pub const fn reached_server(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Forbidden => write!(f, "access forbidden"),
            Self::RateLimited(info) => write!(f, "rate limited until {}", info.reset_at.format("%Y-%m-%d %H:%M:%S UTC")),
            Self::Status { status, url } => write!(f, "HTTP {status} from {url}"),
            Self::Transport(e) => write!(f, "{e:#}"),
        }
    }
}

impl core::error::Error for ApiError {}

pub type ApiResult<T> = Result<T, ApiError>;

/// Repository metadata and raw counters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoMetadata {
    pub name: String,
    pub stargazers_count: u64,
    pub forks_count: u64,

    /// Users watching the repository. GitHub's `watchers_count` mirrors stars, so this is the real one.
    #[serde(default)]
    pub subscribers_count: u64,

    /// Open issues plus open pull requests.
    pub open_issues_count: u64,

    /// Size in kilobytes.
    pub size: u64,
    #[serde(default)]
    pub network_count: u64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Author of one commit, when it is linked to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub login: Option<String>,
}

/// A contributor as listed by the repository contributors endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoContributor {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    pub contributions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Release {
    /// Publication time, falling back to creation time for unpublished drafts.
    #[must_use]
    pub fn date(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.created_at)
    }
}

/// Read-only access to the hosting service.
pub trait MetricsApi: Send + Sync {
    fn get_repository(&self, repo: &RepoKey) -> impl Future<Output = ApiResult<RepoMetadata>> + Send;

    /// Number of commits on the default branch since `since`. An empty repository has zero.
    fn count_commits_since(&self, repo: &RepoKey, since: DateTime<Utc>) -> impl Future<Output = ApiResult<u64>> + Send;

    /// Authors of up to `limit` of the most recent commits since `since`, newest first.
    fn recent_commits(&self, repo: &RepoKey, since: DateTime<Utc>, limit: usize) -> impl Future<Output = ApiResult<Vec<CommitAuthor>>> + Send;

    /// Up to `limit` contributors, ordered by descending contribution count.
    fn top_contributors(&self, repo: &RepoKey, limit: usize) -> impl Future<Output = ApiResult<Vec<RepoContributor>>> + Send;

    fn count_contributors(&self, repo: &RepoKey) -> impl Future<Output = ApiResult<u64>> + Send;

    fn user_profile(&self, username: &str) -> impl Future<Output = ApiResult<ContributorProfile>> + Send;

    fn count_open_pull_requests(&self, repo: &RepoKey) -> impl Future<Output = ApiResult<u64>> + Send;

    /// The latest published release, or `None` when the repository has none.
    fn latest_release(&self, repo: &RepoKey) -> impl Future<Output = ApiResult<Option<Release>>> + Send;

    fn count_releases(&self, repo: &RepoKey) -> impl Future<Output = ApiResult<u64>> + Send;

    fn rate_limit_status(&self) -> impl Future<Output = ApiResult<RateLimitInfo>> + Send;
}
