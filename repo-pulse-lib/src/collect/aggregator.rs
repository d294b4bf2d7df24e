//! Daily rollup of raw snapshots.
//!
//! Each pass recomputes every (project, repository, date) group inside a trailing
//! window of whole UTC days and replaces the stored aggregate. The computation only
//! depends on the snapshots in the store, so repeated passes over the same data write
//! identical documents.

use crate::Result;
use crate::model::{Counter, DailyAggregate, DailyKey, DailyMetrics, StatsSnapshot};
use crate::store::Store;
use chrono::{DateTime, Days, NaiveTime, Utc};
use ohno::app_err;
use std::collections::BTreeMap;
use std::sync::Arc;

const LOG_TARGET: &str = "aggregator";

/// Longest trailing window a single pass recomputes.
pub const MAX_WINDOW_DAYS: u32 = 3650;

#[derive(Debug)]
pub struct Aggregator {
    store: Arc<dyn Store>,
}

impl Aggregator {
    #[must_use]
    pub const fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Recompute the aggregates of the last `window_days` whole days plus today.
    ///
    /// Returns the number of aggregates written. An empty window writes nothing.
    /// Windows longer than [`MAX_WINDOW_DAYS`] are rejected.
    pub fn aggregate_daily(&self, window_days: u32, now: DateTime<Utc>) -> Result<usize> {
        if window_days > MAX_WINDOW_DAYS {
            return Err(app_err!("aggregation window of {window_days} days exceeds the maximum of {MAX_WINDOW_DAYS}"));
        }

        let today = now.date_naive();
        let start = today
            .checked_sub_days(Days::new(u64::from(window_days)))
            .ok_or_else(|| app_err!("aggregation window of {window_days} days reaches before the earliest date"))?
            .and_time(NaiveTime::MIN)
            .and_utc();
        let end = today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| app_err!("no date follows {today}"))?
            .and_time(NaiveTime::MIN)
            .and_utc();

        let snapshots = self.store.snapshots_between(start, end)?;

        let mut groups: BTreeMap<DailyKey, Vec<&StatsSnapshot>> = BTreeMap::new();
        for snapshot in &snapshots {
            let key = DailyKey::new(
                snapshot.repo.project_id.clone(),
                snapshot.repo_key().to_string(),
                snapshot.timestamp.date_naive(),
            );
            groups.entry(key).or_default().push(snapshot);
        }

        for (key, group) in &groups {
            if let Some(aggregate) = summarize(key, group) {
                self.store.upsert_daily(&aggregate)?;
            }
        }

        log::info!(
            target: LOG_TARGET,
            "Aggregated {} snapshots into {} daily records since {}",
            snapshots.len(),
            groups.len(),
            start.format("%Y-%m-%d")
        );

        Ok(groups.len())
    }
}

/// Compress one day of one repository's snapshots, given in timestamp order.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "averages are approximate by nature")]
pub fn summarize(key: &DailyKey, snapshots: &[&StatsSnapshot]) -> Option<DailyAggregate> {
    let (first, last) = (snapshots.first()?, snapshots.last()?);

    let max = |f: fn(&StatsSnapshot) -> u64| snapshots.iter().map(|s| f(s)).max().unwrap_or_default();
    let change = |end: u64, start: u64| end.cast_signed().saturating_sub(start.cast_signed());

    let count = snapshots.len() as f64;
    let avg_unique_contributors_7d = snapshots.iter().map(|s| s.activity.unique_contributors_7d as f64).sum::<f64>() / count;

    let rates: Vec<f64> = snapshots.iter().filter_map(|s| s.stats.growth_rate(Counter::Stars)).collect();
    let avg_stars_growth_rate = (!rates.is_empty()).then(|| rates.iter().sum::<f64>() / rates.len() as f64);

    Some(DailyAggregate {
        id: key.id(),
        date: key.date,
        project_id: key.project_id.clone(),
        repo_key: key.repo_key.clone(),
        project_name: last.repo.project_name.clone(),
        symbol: last.repo.symbol.clone(),
        tier: last.repo.tier,
        metrics: DailyMetrics {
            stars_start: first.stats.stars,
            stars_end: last.stats.stars,
            stars_change: change(last.stats.stars, first.stats.stars),
            forks_start: first.stats.forks,
            forks_end: last.stats.forks,
            forks_change: change(last.stats.forks, first.stats.forks),
            watchers_start: first.stats.watchers,
            watchers_end: last.stats.watchers,
            open_issues_start: first.stats.open_issues,
            open_issues_end: last.stats.open_issues,
            max_commits_24h: max(|s| s.activity.commits_last_24h),
            max_commits_7d: max(|s| s.activity.commits_last_7d),
            max_commits_30d: max(|s| s.activity.commits_last_30d),
            max_total_contributors: max(|s| s.activity.total_contributors),
            max_open_pull_requests: max(|s| s.activity.open_pull_requests),
            avg_unique_contributors_7d,
            avg_stars_growth_rate,
        },
        data_points: snapshots.len() as u64,
    })
}
