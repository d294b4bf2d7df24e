//! In-process [`MetricsApi`] for unit tests.

use super::github::{ApiError, ApiResult, CommitAuthor, MetricsApi, RateLimitInfo, Release, RepoContributor, RepoMetadata};
use crate::model::{ContributorProfile, RepoKey};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FakeRepo {
    pub meta: RepoMetadata,
    pub commits_24h: u64,
    pub commits_7d: u64,
    pub commits_30d: u64,
    pub recent_authors: Vec<Option<String>>,
    pub contributors: Vec<RepoContributor>,
    pub total_contributors: u64,
    pub open_pull_requests: u64,
    pub latest_release: Option<Release>,
    pub releases: u64,
}

impl FakeRepo {
    pub fn with_stars(name: &str, stars: u64) -> Self {
        Self {
            meta: RepoMetadata {
                name: name.into(),
                stargazers_count: stars,
                forks_count: 10,
                subscribers_count: 5,
                open_issues_count: 8,
                size: 1024,
                network_count: 10,
                language: Some("Rust".into()),
                description: None,
            },
            commits_24h: 1,
            commits_7d: 12,
            commits_30d: 40,
            recent_authors: Vec::new(),
            contributors: Vec::new(),
            total_contributors: 3,
            open_pull_requests: 2,
            latest_release: None,
            releases: 0,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Ok(Box<FakeRepo>),
    NotFound,
    Forbidden,
    ServerError,
}

#[derive(Debug, Default)]
struct State {
    repos: HashMap<RepoKey, Outcome>,
    profiles: HashMap<String, ContributorProfile>,
    remaining: Option<u64>,
    calls: HashMap<&'static str, usize>,
    metadata_fetched_at: Vec<DateTime<Utc>>,
}

/// Scripted API; unknown repositories and users answer not-found.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_repo(&self, owner: &str, name: &str, outcome: Outcome) {
        let _ = self.state.lock().unwrap().repos.insert(RepoKey::new(owner, name), outcome);
    }

    pub fn update_repo(&self, owner: &str, name: &str, f: impl FnOnce(&mut FakeRepo)) {
        let mut state = self.state.lock().unwrap();
        if let Some(Outcome::Ok(repo)) = state.repos.get_mut(&RepoKey::new(owner, name)) {
            f(repo.as_mut());
        }
    }

    pub fn set_profile(&self, username: &str, profile: ContributorProfile) {
        let _ = self.state.lock().unwrap().profiles.insert(username.into(), profile);
    }

    /// Remote remaining budget; `None` makes the status call fail.
    pub fn set_remaining(&self, remaining: Option<u64>) {
        self.state.lock().unwrap().remaining = remaining;
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().unwrap().calls.get(method).copied().unwrap_or(0)
    }

    /// When each successful repository metadata fetch happened.
    pub fn metadata_fetched_at(&self) -> Vec<DateTime<Utc>> {
        self.state.lock().unwrap().metadata_fetched_at.clone()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    fn with_repo<T>(&self, method: &'static str, repo: &RepoKey, f: impl FnOnce(&FakeRepo) -> T) -> ApiResult<T> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(method).or_default() += 1;

        match state.repos.get(repo) {
            Some(Outcome::Ok(r)) => Ok(f(r.as_ref())),
            Some(Outcome::Forbidden) => Err(ApiError::Forbidden),
            Some(Outcome::ServerError) => Err(ApiError::Status {
                status: 500,
                url: format!("fake://{repo}"),
            }),
            Some(Outcome::NotFound) | None => Err(ApiError::NotFound),
        }
    }
}

impl MetricsApi for FakeApi {
    async fn get_repository(&self, repo: &RepoKey) -> ApiResult<RepoMetadata> {
        let meta = self.with_repo("get_repository", repo, |r| r.meta.clone())?;
        self.state.lock().unwrap().metadata_fetched_at.push(Utc::now());
        Ok(meta)
    }

    async fn count_commits_since(&self, repo: &RepoKey, since: DateTime<Utc>) -> ApiResult<u64> {
        // Windows are matched with slack since the caller's clock ran ahead of `since`.
        let age = Utc::now() - since;
        self.with_repo("count_commits_since", repo, |r| {
            if age < chrono::Duration::days(2) {
                r.commits_24h
            } else if age < chrono::Duration::days(8) {
                r.commits_7d
            } else {
                r.commits_30d
            }
        })
    }

    async fn recent_commits(&self, repo: &RepoKey, _since: DateTime<Utc>, limit: usize) -> ApiResult<Vec<CommitAuthor>> {
        self.with_repo("recent_commits", repo, |r| {
            r.recent_authors
                .iter()
                .take(limit)
                .map(|login| CommitAuthor { login: login.clone() })
                .collect()
        })
    }

    async fn top_contributors(&self, repo: &RepoKey, limit: usize) -> ApiResult<Vec<RepoContributor>> {
        self.with_repo("top_contributors", repo, |r| r.contributors.iter().take(limit).cloned().collect())
    }

    async fn count_contributors(&self, repo: &RepoKey) -> ApiResult<u64> {
        self.with_repo("count_contributors", repo, |r| r.total_contributors)
    }

    async fn user_profile(&self, username: &str) -> ApiResult<ContributorProfile> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry("user_profile").or_default() += 1;
        state.profiles.get(username).cloned().ok_or(ApiError::NotFound)
    }

    async fn count_open_pull_requests(&self, repo: &RepoKey) -> ApiResult<u64> {
        self.with_repo("count_open_pull_requests", repo, |r| r.open_pull_requests)
    }

    async fn latest_release(&self, repo: &RepoKey) -> ApiResult<Option<Release>> {
        self.with_repo("latest_release", repo, |r| r.latest_release.clone())
    }

    async fn count_releases(&self, repo: &RepoKey) -> ApiResult<u64> {
        self.with_repo("count_releases", repo, |r| r.releases)
    }

    async fn rate_limit_status(&self) -> ApiResult<RateLimitInfo> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry("rate_limit_status").or_default() += 1;
        state
            .remaining
            .map(|remaining| RateLimitInfo {
                limit: 5000,
                remaining,
                reset_at: Utc::now() + chrono::Duration::hours(1),
            })
            .ok_or_else(|| ApiError::Transport(ohno::app_err!("rate limit status unavailable")))
    }
}
