//! Persistence backends
//!
//! The [`Store`] trait is the only shared mutable resource in the system. Snapshots are
//! appended and never rewritten; daily aggregates and contributor records are upserted
//! with replace semantics.
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`]: process-local maps, used by tests and dry runs
//! - [`JsonStore`]: a directory of JSON documents, used by the command-line tool

mod json_store;
mod memory;
mod path_utils;
mod store_lock;

pub use json_store::JsonStore;
pub use memory::MemoryStore;
pub use store_lock::{StoreLockGuard, acquire_store_lock};

use crate::Result;
use crate::model::{ContributorRecord, DailyAggregate, DailyKey, RepoKey, StatsSnapshot};
use chrono::{DateTime, Utc};

/// Durable time-series persistence.
pub trait Store: Send + Sync + core::fmt::Debug {
    /// Append an immutable snapshot.
    fn append_snapshot(&self, snapshot: &StatsSnapshot) -> Result<()>;

    /// The most recently appended snapshot of a repository.
    fn latest_snapshot(&self, repo: &RepoKey) -> Result<Option<StatsSnapshot>>;

    /// All snapshots with `start <= timestamp < end`, ordered by timestamp.
    fn snapshots_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<StatsSnapshot>>;

    /// Insert or replace the aggregate with the same key.
    fn upsert_daily(&self, aggregate: &DailyAggregate) -> Result<()>;

    fn daily_aggregate(&self, key: &DailyKey) -> Result<Option<DailyAggregate>>;

    /// All aggregates, ordered by key.
    fn daily_aggregates(&self) -> Result<Vec<DailyAggregate>>;

    fn contributor(&self, username: &str) -> Result<Option<ContributorRecord>>;

    /// Insert or replace the record with the same username.
    fn upsert_contributor(&self, record: &ContributorRecord) -> Result<()>;

    /// Up to `limit` records flagged `needs_update`, least recently refreshed first.
    fn contributors_needing_update(&self, limit: usize) -> Result<Vec<ContributorRecord>>;

    /// All contributor records, ordered by username.
    fn contributors(&self) -> Result<Vec<ContributorRecord>>;
}

/// Order records for a profile refresh pass: never-refreshed first, then oldest refresh.
fn refresh_order(records: &mut [ContributorRecord]) {
    records.sort_by(|a, b| a.profile_updated.cmp(&b.profile_updated).then_with(|| a.username.cmp(&b.username)));
}

/// Select the records flagged for a refresh, in refresh order.
fn select_for_update(records: impl IntoIterator<Item = ContributorRecord>, limit: usize) -> Vec<ContributorRecord> {
    let mut flagged: Vec<_> = records.into_iter().filter(|r| r.needs_update).collect();
    refresh_order(&mut flagged);
    flagged.truncate(limit);
    flagged
}
