use super::context::Context;
use super::contributor_cache::{ContributorCache, ProfileDepth};
use super::github::{ApiError, CommitAuthor, MetricsApi, RepoMetadata};
use super::targets::Target;
use crate::model::{Activity, ContributorActivity, ReleaseSummary, RepoInfo, RepoKey, RepoStats, StatsChanges, StatsSnapshot};
use chrono::{DateTime, TimeDelta, Utc};
use core::fmt::{Display, Formatter};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const LOG_TARGET: &str = " collector";

/// Why a repository produced no snapshot.
#[derive(Debug)]
pub enum CollectionError {
    /// The repository failed permanently earlier in this process; no call was made.
    PreviouslyFailed,

    /// The repository does not exist.
    NotFound,

    /// Access to the repository is denied.
    Forbidden,

    /// Anything else. The repository is retried on the next run.
    Transient(ohno::AppError),
}

impl CollectionError {
    /// Whether the repository is now in the failed set.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        !matches!(self, Self::Transient(_))
    }
}

impl Display for CollectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PreviouslyFailed => write!(f, "skipped after an earlier permanent failure"),
            Self::NotFound => write!(f, "repository not found"),
            Self::Forbidden => write!(f, "access to repository forbidden"),
            Self::Transient(e) => write!(f, "{e:#}"),
        }
    }
}

impl core::error::Error for CollectionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSettings {
    /// Most recent commits inspected for the 7-day contributor ranking.
    pub commit_sample_size: usize,

    /// Length of the ranked contributor list in a snapshot.
    pub top_contributors: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            commit_sample_size: 50,
            top_contributors: 10,
        }
    }
}

/// Produces one [`StatsSnapshot`] per repository.
///
/// The collector remembers repositories that failed permanently and refuses them
/// without an API call for the rest of its life. Snapshot timestamps handed out by one
/// collector are strictly increasing.
#[derive(Debug)]
pub struct RepositoryCollector<A> {
    ctx: Arc<Context<A>>,
    settings: CollectorSettings,
    contributors: Option<ContributorCache<A>>,
    failed: HashSet<RepoKey>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl<A: MetricsApi> RepositoryCollector<A> {
    /// Create a collector. Contributors are tracked when a cache is given.
    #[must_use]
    pub fn new(ctx: Arc<Context<A>>, settings: CollectorSettings, contributors: Option<ContributorCache<A>>) -> Self {
        Self {
            ctx,
            settings,
            contributors,
            failed: HashSet::new(),
            last_timestamp: None,
        }
    }

    #[must_use]
    pub fn has_failed(&self, repo: &RepoKey) -> bool {
        self.failed.contains(repo)
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Collect statistics and activity for one target.
    ///
    /// The result is not persisted. Its deltas are computed against the latest snapshot
    /// already in the store.
    pub async fn collect(&mut self, target: &Target) -> Result<StatsSnapshot, CollectionError> {
        let repo = &target.repo;
        if self.failed.contains(repo) {
            log::debug!(target: LOG_TARGET, "Skipping '{repo}', it failed permanently earlier");
            return Err(CollectionError::PreviouslyFailed);
        }

        let api = &self.ctx.api;

        let meta = match self
            .ctx
            .limiter
            .call(&format!("fetching '{repo}'"), move || api.get_repository(repo))
            .await
        {
            Ok(meta) => meta,
            Err(ApiError::NotFound) => return Err(self.fail_permanently(repo, CollectionError::NotFound)),
            Err(ApiError::Forbidden) => return Err(self.fail_permanently(repo, CollectionError::Forbidden)),
            Err(e) => return Err(transient(repo, "fetching repository", e)),
        };
        let timestamp = self.next_timestamp(Utc::now());

        let prior = self.ctx.store.latest_snapshot(repo).map_err(CollectionError::Transient)?;

        let mut stats = RepoStats {
            stars: meta.stargazers_count,
            forks: meta.forks_count,
            watchers: meta.subscribers_count,
            open_issues: meta.open_issues_count,
            size_kb: meta.size,
            network_count: meta.network_count,
            changes: None,
        };
        stats.changes = prior.as_ref().map(|p| StatsChanges::between(&stats, &p.stats));

        let activity = self.activity(target, &meta, timestamp).await?;

        self.track_contributors(target, timestamp).await;

        log::debug!(
            target: LOG_TARGET,
            "Collected '{repo}': {} stars, {} commits in 7 days",
            stats.stars,
            activity.commits_last_7d
        );

        Ok(StatsSnapshot {
            timestamp,
            repo: RepoInfo {
                owner: repo.owner.clone(),
                name: repo.name.clone(),
                project_id: target.project_id.clone(),
                project_name: target.project_name.clone(),
                symbol: target.symbol.clone(),
                tier: target.tier,
                language: meta.language,
                description: meta.description,
            },
            stats,
            activity,
        })
    }

    async fn activity(&self, target: &Target, meta: &RepoMetadata, now: DateTime<Utc>) -> Result<Activity, CollectionError> {
        let repo = &target.repo;
        let api = &self.ctx.api;
        let limiter = &self.ctx.limiter;
        let operation = format!("collecting activity of '{repo}'");
        let operation = operation.as_str();

        let commits_since = move |since: DateTime<Utc>| limiter.call(operation, move || api.count_commits_since(repo, since));
        let commits_last_24h = commits_since(now - TimeDelta::hours(24))
            .await
            .map_err(|e| transient(repo, "counting commits of the last day", e))?;
        let commits_last_7d = commits_since(now - TimeDelta::days(7))
            .await
            .map_err(|e| transient(repo, "counting commits of the last week", e))?;
        let commits_last_30d = commits_since(now - TimeDelta::days(30))
            .await
            .map_err(|e| transient(repo, "counting commits of the last month", e))?;

        let sample_size = self.settings.commit_sample_size;
        let recent = limiter
            .call(operation, move || api.recent_commits(repo, now - TimeDelta::days(7), sample_size))
            .await
            .map_err(|e| transient(repo, "listing recent commits", e))?;
        let (unique_contributors_7d, top_contributors_7d) = rank_authors(&recent, self.settings.top_contributors);

        let total_contributors = match limiter.call(operation, move || api.count_contributors(repo)).await {
            Ok(count) => count,

            // GitHub refuses to enumerate contributors of very large repositories.
            Err(ApiError::Forbidden) => {
                log::warn!(target: LOG_TARGET, "Contributor list of '{repo}' is not available, recording zero");
                0
            }
            Err(e) => return Err(transient(repo, "counting contributors", e)),
        };

        let open_pull_requests = limiter
            .call(operation, move || api.count_open_pull_requests(repo))
            .await
            .map_err(|e| transient(repo, "counting open pull requests", e))?;

        let latest_release = match limiter
            .call(operation, move || api.latest_release(repo))
            .await
            .map_err(|e| transient(repo, "fetching the latest release", e))?
        {
            Some(release) => {
                let total_releases = limiter
                    .call(operation, move || api.count_releases(repo))
                    .await
                    .map_err(|e| transient(repo, "counting releases", e))?;
                let published_at = release.date();

                Some(ReleaseSummary {
                    tag: release.tag_name,
                    published_at,
                    days_since: (now - published_at).num_days().max(0),
                    total_releases,
                })
            }
            None => None,
        };

        Ok(Activity {
            commits_last_24h,
            commits_last_7d,
            commits_last_30d,
            unique_contributors_7d,
            top_contributors_7d,
            total_contributors,
            open_pull_requests,
            open_issues_only: meta.open_issues_count.saturating_sub(open_pull_requests),
            latest_release,
        })
    }

    /// Feed the repository's top contributors to the cache. Failures are logged only.
    async fn track_contributors(&self, target: &Target, now: DateTime<Utc>) {
        let Some(cache) = &self.contributors else {
            return;
        };

        let repo = &target.repo;
        let api = &self.ctx.api;
        let limit = cache.settings().max_per_repo;

        let contributors = match self
            .ctx
            .limiter
            .call(&format!("listing contributors of '{repo}'"), move || api.top_contributors(repo, limit))
            .await
        {
            Ok(contributors) => contributors,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not list contributors of '{repo}': {e}");
                return;
            }
        };

        let due = match cache.observe(target, &contributors, now) {
            Ok(due) => due,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not record contributors of '{repo}': {e:#}");
                return;
            }
        };

        if cache.settings().depth != ProfileDepth::Full {
            return;
        }

        for (index, username) in due.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(cache.settings().refresh_delay).await;
            }

            if let Err(e) = cache.refresh_profile(username, now).await {
                log::warn!(target: LOG_TARGET, "Could not store profile of '{username}': {e:#}");
            }
        }
    }

    fn fail_permanently(&mut self, repo: &RepoKey, error: CollectionError) -> CollectionError {
        log::warn!(target: LOG_TARGET, "'{repo}' failed permanently: {error}");
        let _ = self.failed.insert(repo.clone());
        error
    }

    /// `now`, nudged forward when the clock did not move past the previous snapshot.
    fn next_timestamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let timestamp = match self.last_timestamp {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };

        self.last_timestamp = Some(timestamp);
        timestamp
    }
}

fn transient(repo: &RepoKey, what: &str, error: ApiError) -> CollectionError {
    CollectionError::Transient(ohno::app_err!("{what} of '{repo}': {error}"))
}

/// Count commits per linked author and rank them by count, then by first appearance.
fn rank_authors(commits: &[CommitAuthor], top_n: usize) -> (u64, Vec<ContributorActivity>) {
    let mut ranked: Vec<ContributorActivity> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for login in commits.iter().filter_map(|c| c.login.as_deref()) {
        if let Some(&i) = index.get(login) {
            ranked[i].commits += 1;
        } else {
            let _ = index.insert(login, ranked.len());
            ranked.push(ContributorActivity {
                username: login.to_string(),
                commits: 1,
            });
        }
    }

    let unique = ranked.len() as u64;
    ranked.sort_by(|a, b| b.commits.cmp(&a.commits));
    ranked.truncate(top_n);

    (unique, ranked)
}
