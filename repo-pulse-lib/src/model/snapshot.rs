use super::{RepoKey, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// One timestamped observation of a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub repo: RepoInfo,
    pub stats: RepoStats,
    pub activity: Activity,
}

impl StatsSnapshot {
    #[must_use]
    pub fn repo_key(&self) -> RepoKey {
        self.repo.key()
    }
}

/// Repository identity plus the catalog context it was collected under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub owner: String,
    pub name: String,
    pub project_id: String,
    pub project_name: String,
    pub symbol: String,
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RepoInfo {
    #[must_use]
    pub fn key(&self) -> RepoKey {
        RepoKey::new(self.owner.clone(), self.name.clone())
    }
}

/// Counters that carry a change and growth rate relative to the prior snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Counter {
    Stars,
    Forks,
    Watchers,
    OpenIssues,
    SizeKb,
}

/// Raw repository counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoStats {
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    pub size_kb: u64,
    pub network_count: u64,

    /// Present only when a prior snapshot of the same repository existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<StatsChanges>,
}

impl RepoStats {
    #[must_use]
    pub const fn counter(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Stars => self.stars,
            Counter::Forks => self.forks,
            Counter::Watchers => self.watchers,
            Counter::OpenIssues => self.open_issues,
            Counter::SizeKb => self.size_kb,
        }
    }

    #[must_use]
    pub fn change(&self, counter: Counter) -> Option<i64> {
        self.changes.as_ref().map(|c| c.get(counter).change)
    }

    #[must_use]
    pub fn growth_rate(&self, counter: Counter) -> Option<f64> {
        self.changes.as_ref().and_then(|c| c.get(counter).growth_rate)
    }
}

/// Per-counter deltas against the previous snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsChanges {
    pub stars: CounterDelta,
    pub forks: CounterDelta,
    pub watchers: CounterDelta,
    pub open_issues: CounterDelta,
    pub size_kb: CounterDelta,
}

impl StatsChanges {
    /// Compute the deltas of `current` against `prior`.
    #[must_use]
    pub fn between(current: &RepoStats, prior: &RepoStats) -> Self {
        let delta = |counter| CounterDelta::new(current.counter(counter), prior.counter(counter));

        Self {
            stars: delta(Counter::Stars),
            forks: delta(Counter::Forks),
            watchers: delta(Counter::Watchers),
            open_issues: delta(Counter::OpenIssues),
            size_kb: delta(Counter::SizeKb),
        }
    }

    #[must_use]
    pub const fn get(&self, counter: Counter) -> &CounterDelta {
        match counter {
            Counter::Stars => &self.stars,
            Counter::Forks => &self.forks,
            Counter::Watchers => &self.watchers,
            Counter::OpenIssues => &self.open_issues,
            Counter::SizeKb => &self.size_kb,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CounterDelta {
    pub change: i64,

    /// `change / prior`, defined only when the prior value is positive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<f64>,
}

impl CounterDelta {
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "growth rates are approximate by nature")]
    pub fn new(current: u64, prior: u64) -> Self {
        let change = current.cast_signed().saturating_sub(prior.cast_signed());
        let growth_rate = (prior > 0).then(|| change as f64 / prior as f64);

        Self { change, growth_rate }
    }
}

/// Activity metrics over fixed trailing windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub commits_last_24h: u64,
    pub commits_last_7d: u64,
    pub commits_last_30d: u64,

    /// Distinct commit authors within the sampled 7-day commits.
    pub unique_contributors_7d: u64,
    pub top_contributors_7d: Vec<ContributorActivity>,
    pub total_contributors: u64,
    pub open_pull_requests: u64,

    /// Open issues excluding pull requests.
    pub open_issues_only: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_release: Option<ReleaseSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorActivity {
    pub username: String,
    pub commits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub tag: String,
    pub published_at: DateTime<Utc>,
    pub days_since: i64,
    pub total_releases: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn stats(stars: u64, forks: u64, watchers: u64, open_issues: u64, size_kb: u64) -> RepoStats {
        RepoStats {
            stars,
            forks,
            watchers,
            open_issues,
            size_kb,
            network_count: 0,
            changes: None,
        }
    }

    #[test]
    fn test_counter_delta_positive_prior() {
        let delta = CounterDelta::new(120, 100);
        assert_eq!(delta.change, 20);
        assert!((delta.growth_rate.unwrap() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_counter_delta_zero_prior_has_no_growth_rate() {
        let delta = CounterDelta::new(5, 0);
        assert_eq!(delta.change, 5);
        assert!(delta.growth_rate.is_none());
    }

    #[test]
    fn test_counter_delta_decrease() {
        let delta = CounterDelta::new(90, 100);
        assert_eq!(delta.change, -10);
        assert!((delta.growth_rate.unwrap() + 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_changes_between_matches_counter_differences() {
        let prior = stats(100, 10, 0, 7, 2048);
        let current = stats(130, 12, 4, 5, 2048);
        let changes = StatsChanges::between(&current, &prior);

        for counter in Counter::iter() {
            let delta = changes.get(counter);
            let expected = current.counter(counter).cast_signed() - prior.counter(counter).cast_signed();
            assert_eq!(delta.change, expected, "{counter}");
            assert_eq!(delta.growth_rate.is_some(), prior.counter(counter) > 0, "{counter}");
        }
    }

    #[test]
    fn test_accessors_without_changes() {
        let current = stats(1, 1, 1, 1, 1);
        assert!(current.change(Counter::Stars).is_none());
        assert!(current.growth_rate(Counter::Stars).is_none());
    }

    #[test]
    fn test_first_snapshot_serializes_without_change_fields() {
        let json = serde_json::to_string(&stats(1, 2, 3, 4, 5)).unwrap();
        assert!(!json.contains("changes"));
        assert!(!json.contains("growth_rate"));
    }

    #[test]
    fn test_zero_prior_omits_growth_rate_in_json() {
        let mut current = stats(3, 0, 0, 0, 0);
        current.changes = Some(StatsChanges::between(&current, &stats(0, 0, 0, 0, 0)));
        let json = serde_json::to_string(&current).unwrap();
        assert!(json.contains(r#""change":3"#));
        assert!(!json.contains("growth_rate"));

        let back: RepoStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, current);
    }
}
