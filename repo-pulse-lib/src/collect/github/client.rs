use super::{ApiError, ApiResult, CommitAuthor, MetricsApi, RateLimitInfo, Release, RepoContributor, RepoMetadata};
use crate::model::{ContributorProfile, RepoKey};
use chrono::{DateTime, SecondsFormat, Utc};
use core::time::Duration;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

const LOG_TARGET: &str = "    github";

/// Fallback wait when a rate-limited response carries no reset information.
const DEFAULT_RATE_LIMIT_WAIT_SECS: i64 = 3600;

static LAST_PAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[?&]page=(\d+)[^>]*>;\s*rel="last""#).expect("invalid regex"));

#[derive(Debug, Deserialize)]
struct CommitItem {
    author: Option<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    rate: RateLimitResource,
}

#[derive(Debug, Deserialize)]
struct RateLimitResource {
    limit: u64,
    remaining: u64,
    reset: i64,
}

/// [`MetricsApi`] over the GitHub REST v3 API.
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    /// Create a client with an optional token, talking to `base_url` (normally `https://api.github.com`).
    pub fn new(token: Option<&str>, base_url: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};

        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let _ = headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("repo-pulse/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn repo_url(&self, repo: &RepoKey, rest: &str) -> String {
        format!("{}/repos/{}/{}{rest}", self.base_url, repo.owner, repo.name)
    }

    /// Issue a GET and classify the outcome.
    async fn get(&self, url: &str) -> ApiResult<reqwest::Response> {
        log::trace!(target: LOG_TARGET, "GET {url}");

        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => return Err(ApiError::Transport(e.into())),
        };

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        Err(classify_failure(status, resp.headers(), url, Utc::now()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let resp = self.get(url).await?;
        resp.json().await.map_err(|e| ApiError::Transport(e.into()))
    }

    /// Count the items of a list endpoint requested with `per_page=1`.
    ///
    /// With one item per page the page number of the `last` link equals the item count.
    /// Without such a link the list fits on the first page and its length is the count.
    async fn count_items(&self, url: &str) -> ApiResult<u64> {
        let resp = self.get(url).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(0);
        }

        if let Some(count) = last_page_from_headers(resp.headers()) {
            return Ok(count);
        }

        let items: Vec<serde_json::Value> = resp.json().await.map_err(|e| ApiError::Transport(e.into()))?;
        Ok(items.len() as u64)
    }
}

impl MetricsApi for GitHubClient {
    async fn get_repository(&self, repo: &RepoKey) -> ApiResult<RepoMetadata> {
        self.get_json(&self.repo_url(repo, "")).await
    }

    async fn count_commits_since(&self, repo: &RepoKey, since: DateTime<Utc>) -> ApiResult<u64> {
        let url = self.repo_url(repo, &format!("/commits?since={}&per_page=1", format_since(since)));
        match self.count_items(&url).await {
            Err(ApiError::Status { status: 409, .. }) => {
                log::debug!(target: LOG_TARGET, "Repository '{repo}' is empty");
                Ok(0)
            }
            other => other,
        }
    }

    async fn recent_commits(&self, repo: &RepoKey, since: DateTime<Utc>, limit: usize) -> ApiResult<Vec<CommitAuthor>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let url = self.repo_url(repo, &format!("/commits?since={}&per_page={limit}", format_since(since)));
        let items: Vec<CommitItem> = match self.get_json(&url).await {
            Ok(items) => items,
            Err(ApiError::Status { status: 409, .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(items
            .into_iter()
            .take(limit)
            .map(|item| CommitAuthor {
                login: item.author.map(|a| a.login),
            })
            .collect())
    }

    async fn top_contributors(&self, repo: &RepoKey, limit: usize) -> ApiResult<Vec<RepoContributor>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let resp = self.get(&self.repo_url(repo, &format!("/contributors?per_page={limit}"))).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        let mut contributors: Vec<RepoContributor> = resp.json().await.map_err(|e| ApiError::Transport(e.into()))?;
        contributors.truncate(limit);
        Ok(contributors)
    }

    async fn count_contributors(&self, repo: &RepoKey) -> ApiResult<u64> {
        self.count_items(&self.repo_url(repo, "/contributors?per_page=1")).await
    }

    async fn user_profile(&self, username: &str) -> ApiResult<ContributorProfile> {
        self.get_json(&format!("{}/users/{username}", self.base_url)).await
    }

    async fn count_open_pull_requests(&self, repo: &RepoKey) -> ApiResult<u64> {
        self.count_items(&self.repo_url(repo, "/pulls?state=open&per_page=1")).await
    }

    async fn latest_release(&self, repo: &RepoKey) -> ApiResult<Option<Release>> {
        match self.get_json(&self.repo_url(repo, "/releases/latest")).await {
            Ok(release) => Ok(Some(release)),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn count_releases(&self, repo: &RepoKey) -> ApiResult<u64> {
        self.count_items(&self.repo_url(repo, "/releases?per_page=1")).await
    }

    async fn rate_limit_status(&self) -> ApiResult<RateLimitInfo> {
        let resp: RateLimitResponse = self.get_json(&format!("{}/rate_limit", self.base_url)).await?;
        let reset_at = DateTime::from_timestamp(resp.rate.reset, 0)
            .ok_or_else(|| ApiError::Transport(ohno::app_err!("invalid rate limit reset timestamp {}", resp.rate.reset)))?;

        Ok(RateLimitInfo {
            limit: resp.rate.limit,
            remaining: resp.rate.remaining,
            reset_at,
        })
    }
}

fn format_since(since: DateTime<Utc>) -> String {
    since.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Map an unsuccessful response to an [`ApiError`].
///
/// GitHub reports primary rate limit exhaustion as 403 with a zero remaining budget and
/// secondary limits as 403 or 429 with `retry-after`. Any other 403 is a real denial.
fn classify_failure(status: StatusCode, headers: &HeaderMap, url: &str, now: DateTime<Utc>) -> ApiError {
    let rate_limit = extract_rate_limit_from_headers(headers);
    let retry_after = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok());

    let rate_limited = |rate_limit: Option<RateLimitInfo>| {
        let reset_at = retry_after.map_or_else(
            || rate_limit.map_or(now + chrono::Duration::seconds(DEFAULT_RATE_LIMIT_WAIT_SECS), |rl| rl.reset_at),
            |secs| now + chrono::Duration::seconds(secs),
        );

        ApiError::RateLimited(RateLimitInfo {
            limit: rate_limit.map_or(0, |rl| rl.limit),
            remaining: 0,
            reset_at,
        })
    };

    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::TOO_MANY_REQUESTS => rate_limited(rate_limit),
        StatusCode::FORBIDDEN if retry_after.is_some() || rate_limit.is_some_and(|rl| rl.remaining == 0) => rate_limited(rate_limit),
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        _ => ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        },
    }
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let remaining = header("x-ratelimit-remaining")?.parse::<u64>().ok()?;
    let reset_timestamp = header("x-ratelimit-reset")?.parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;
    let limit = header("x-ratelimit-limit").and_then(|v| v.parse::<u64>().ok()).unwrap_or(remaining);

    Some(RateLimitInfo { limit, remaining, reset_at })
}

fn last_page_from_headers(headers: &HeaderMap) -> Option<u64> {
    let link = headers.get(LINK)?.to_str().ok()?;
    LAST_PAGE_REGEX.captures(link)?.get(1)?.as_str().parse().ok()
}
