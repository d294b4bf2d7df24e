//! Collection engine
//!
//! Components, from the leaves up:
//!
//! - [`RateLimiter`]: sliding-window call budget gating every remote call
//! - [`TargetRegistry`]: repositories to monitor, resolved from a [`Catalog`]
//! - [`ContributorCache`]: contributor records with a profile TTL
//! - [`RepositoryCollector`]: one snapshot per repository, with deltas
//! - [`CollectionOrchestrator`]: tiered runs and the continuous scheduler
//! - [`Aggregator`]: daily rollups of raw snapshots
//!
//! All of them receive their collaborators through a shared [`Context`].

mod aggregator;
mod cancel;
mod collector;
mod context;
mod contributor_cache;
mod github;
mod orchestrator;
mod progress;
mod rate_limiter;
mod repo_spec;
mod targets;

#[cfg(test)]
mod test_api;

pub use aggregator::{Aggregator, MAX_WINDOW_DAYS, summarize};
pub use cancel::CancellationFlag;
pub use collector::{CollectionError, CollectorSettings, RepositoryCollector};
pub use context::Context;
pub use contributor_cache::{
    ContributorCache, ContributorSettings, ContributorSummary, ProfileDepth, ProfileUpdateSummary, TopContributor,
};
pub use github::{
    ApiError, ApiResult, CommitAuthor, GitHubClient, MetricsApi, RateLimitInfo, Release, RepoContributor, RepoMetadata,
};
pub use orchestrator::{CollectionOrchestrator, OrchestratorSettings, RunSummary};
pub use progress::{NoProgress, Progress};
pub use rate_limiter::{RateLimitSettings, RateLimiter};
pub use repo_spec::parse_github_url;
pub use targets::{Catalog, CatalogFile, Project, Target, TargetRegistry};
