use super::{Store, select_for_update};
use crate::Result;
use crate::model::{ContributorRecord, DailyAggregate, DailyKey, RepoKey, StatsSnapshot};
use chrono::{DateTime, Utc};
use ohno::app_err;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    snapshots: BTreeMap<RepoKey, Vec<StatsSnapshot>>,
    daily: BTreeMap<DailyKey, DailyAggregate>,
    contributors: BTreeMap<String, ContributorRecord>,
}

/// A [`Store`] that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots held across all repositories.
    pub fn snapshot_count(&self) -> Result<usize> {
        Ok(self.lock()?.snapshots.values().map(Vec::len).sum())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|e| app_err!("memory store lock poisoned: {e}"))
    }
}

impl Store for MemoryStore {
    fn append_snapshot(&self, snapshot: &StatsSnapshot) -> Result<()> {
        self.lock()?
            .snapshots
            .entry(snapshot.repo_key())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    fn latest_snapshot(&self, repo: &RepoKey) -> Result<Option<StatsSnapshot>> {
        Ok(self.lock()?.snapshots.get(repo).and_then(|s| s.last()).cloned())
    }

    fn snapshots_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<StatsSnapshot>> {
        let inner = self.lock()?;
        let mut result: Vec<_> = inner
            .snapshots
            .values()
            .flatten()
            .filter(|s| s.timestamp >= start && s.timestamp < end)
            .cloned()
            .collect();
        result.sort_by_key(|s| s.timestamp);
        Ok(result)
    }

    fn upsert_daily(&self, aggregate: &DailyAggregate) -> Result<()> {
        let _ = self.lock()?.daily.insert(aggregate.key(), aggregate.clone());
        Ok(())
    }

    fn daily_aggregate(&self, key: &DailyKey) -> Result<Option<DailyAggregate>> {
        Ok(self.lock()?.daily.get(key).cloned())
    }

    fn daily_aggregates(&self) -> Result<Vec<DailyAggregate>> {
        Ok(self.lock()?.daily.values().cloned().collect())
    }

    fn contributor(&self, username: &str) -> Result<Option<ContributorRecord>> {
        Ok(self.lock()?.contributors.get(username).cloned())
    }

    fn upsert_contributor(&self, record: &ContributorRecord) -> Result<()> {
        let _ = self.lock()?.contributors.insert(record.username.clone(), record.clone());
        Ok(())
    }

    fn contributors_needing_update(&self, limit: usize) -> Result<Vec<ContributorRecord>> {
        let inner = self.lock()?;
        Ok(select_for_update(inner.contributors.values().cloned(), limit))
    }

    fn contributors(&self) -> Result<Vec<ContributorRecord>> {
        Ok(self.lock()?.contributors.values().cloned().collect())
    }
}
