//! Persisted record types
//!
//! Everything written to a [`Store`](crate::store::Store) is one of the types in this
//! module: immutable [`StatsSnapshot`]s appended once per collection, upserted
//! [`DailyAggregate`]s keyed by project, repository and date, and upserted
//! [`ContributorRecord`]s keyed by username.

mod contributor;
mod daily;
mod repo;
mod snapshot;

pub use contributor::{ContributorProfile, ContributorRecord};
pub use daily::{DailyAggregate, DailyKey, DailyMetrics};
pub use repo::{RepoKey, Tier};
pub use snapshot::{Activity, ContributorActivity, Counter, CounterDelta, ReleaseSummary, RepoInfo, RepoStats, StatsChanges, StatsSnapshot};
