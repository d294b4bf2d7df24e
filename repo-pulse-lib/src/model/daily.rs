use super::Tier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Composite key of a daily aggregate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DailyKey {
    pub project_id: String,
    pub repo_key: String,
    pub date: NaiveDate,
}

impl DailyKey {
    #[must_use]
    pub fn new(project_id: impl Into<String>, repo_key: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            project_id: project_id.into(),
            repo_key: repo_key.into(),
            date,
        }
    }

    /// Stable identifier, `{project_id}_{owner/name}_{YYYY-MM-DD}`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}_{}_{}", self.project_id, self.repo_key, self.date.format("%Y-%m-%d"))
    }
}

/// One repository's compressed activity for one UTC calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub id: String,
    pub date: NaiveDate,
    pub project_id: String,
    pub repo_key: String,
    pub project_name: String,
    pub symbol: String,
    pub tier: Tier,
    pub metrics: DailyMetrics,
    pub data_points: u64,
}

impl DailyAggregate {
    #[must_use]
    pub fn key(&self) -> DailyKey {
        DailyKey::new(self.project_id.clone(), self.repo_key.clone(), self.date)
    }
}

/// First/last counter values, maxima of windowed activity, and averages of ratio-like values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub stars_start: u64,
    pub stars_end: u64,
    pub stars_change: i64,
    pub forks_start: u64,
    pub forks_end: u64,
    pub forks_change: i64,
    pub watchers_start: u64,
    pub watchers_end: u64,
    pub open_issues_start: u64,
    pub open_issues_end: u64,

    pub max_commits_24h: u64,
    pub max_commits_7d: u64,
    pub max_commits_30d: u64,
    pub max_total_contributors: u64,
    pub max_open_pull_requests: u64,

    pub avg_unique_contributors_7d: f64,

    /// Mean of the per-snapshot star growth rates that were defined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_stars_growth_rate: Option<f64>,
}
