//! Contributor tracking with a time-to-live on detailed profiles.
//!
//! Every observation of a contributor in a repository refreshes the cheap fields
//! (avatar, contribution count, last seen) and grows the project and repository sets.
//! The detailed profile costs one API call per user, so it is fetched only when the
//! record is flagged or older than the TTL.

use super::cancel::CancellationFlag;
use super::context::Context;
use super::github::{MetricsApi, RepoContributor};
use super::targets::Target;
use crate::Result;
use crate::model::ContributorRecord;
use chrono::{DateTime, Utc};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};

const LOG_TARGET: &str = "contributor";

/// When detailed profiles are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProfileDepth {
    /// Collection only flags stale records; a separate pass fetches profiles.
    #[default]
    Basic,

    /// Collection fetches stale profiles inline.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContributorSettings {
    pub ttl: Duration,
    pub max_per_repo: usize,
    pub depth: ProfileDepth,

    /// Pause between two profile fetches.
    pub refresh_delay: Duration,
}

impl Default for ContributorSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(7 * 24 * 3600),
            max_per_repo: 50,
            depth: ProfileDepth::Basic,
            refresh_delay: Duration::from_millis(500),
        }
    }
}

/// Outcome of a profile refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileUpdateSummary {
    pub updated: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopContributor {
    pub username: String,
    pub projects: usize,
    pub repositories: usize,
    pub followers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorSummary {
    pub total: usize,
    pub top: Vec<TopContributor>,
}

#[derive(Debug)]
pub struct ContributorCache<A> {
    ctx: Arc<Context<A>>,
    settings: ContributorSettings,
}

impl<A> Clone for ContributorCache<A> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            settings: self.settings,
        }
    }
}

impl<A: MetricsApi> ContributorCache<A> {
    #[must_use]
    pub const fn new(ctx: Arc<Context<A>>, settings: ContributorSettings) -> Self {
        Self { ctx, settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &ContributorSettings {
        &self.settings
    }

    /// Whether a detailed profile fetch is due.
    #[must_use]
    pub fn should_refresh_profile(&self, record: Option<&ContributorRecord>, now: DateTime<Utc>) -> bool {
        let Some(record) = record else {
            return true;
        };

        if record.needs_update {
            return true;
        }

        record
            .profile_updated
            .is_none_or(|updated| now.signed_duration_since(updated).to_std().unwrap_or(Duration::ZERO) >= self.settings.ttl)
    }

    /// Record that `contributors` were seen in `target`'s repository.
    ///
    /// Only the top `max_per_repo` by contribution count are tracked. Returns the
    /// usernames whose detailed profile is due.
    pub fn observe(&self, target: &Target, contributors: &[RepoContributor], now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut ranked: Vec<_> = contributors.iter().collect();
        ranked.sort_by(|a, b| b.contributions.cmp(&a.contributions));
        ranked.truncate(self.settings.max_per_repo);

        let repo_key = target.repo.to_string();
        let mut due = Vec::new();

        for contributor in ranked {
            let existing = self.ctx.store.contributor(&contributor.login)?;
            let needs_update = self.should_refresh_profile(existing.as_ref(), now);
            let mut record = existing.unwrap_or_else(|| ContributorRecord::new(contributor.login.clone(), now));

            record.avatar_url.clone_from(&contributor.avatar_url);
            record.profile_url.clone_from(&contributor.html_url);
            record.contributions = contributor.contributions;
            record.last_seen = now;
            record.needs_update = needs_update;
            let _ = record.projects.insert(target.project_id.clone());
            let _ = record.repositories.insert(repo_key.clone());

            self.ctx.store.upsert_contributor(&record)?;

            if needs_update {
                due.push(record.username);
            }
        }

        log::debug!(
            target: LOG_TARGET,
            "Observed {} contributors of '{repo_key}', {} due for a profile refresh",
            contributors.len().min(self.settings.max_per_repo),
            due.len()
        );

        Ok(due)
    }

    /// Fetch and store one detailed profile. Returns whether the fetch succeeded.
    ///
    /// A failed fetch still marks the record as refreshed, with the reason recorded,
    /// so that one broken profile is not retried on every pass.
    pub async fn refresh_profile(&self, username: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = self
            .ctx
            .limiter
            .call(&format!("fetching profile of '{username}'"), || self.ctx.api.user_profile(username))
            .await;

        let mut record = self
            .ctx
            .store
            .contributor(username)?
            .unwrap_or_else(|| ContributorRecord::new(username, now));

        record.profile_updated = Some(now);
        record.needs_update = false;

        let ok = match result {
            Ok(profile) => {
                record.profile = Some(profile);
                record.profile_error = None;
                log::debug!(target: LOG_TARGET, "Refreshed profile of '{username}'");
                true
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not fetch profile of '{username}': {e}");
                record.profile_error = Some(e.to_string());
                false
            }
        };

        self.ctx.store.upsert_contributor(&record)?;
        Ok(ok)
    }

    /// Refresh profiles of flagged records, least recently refreshed first.
    pub async fn update_profiles(&self, limit: usize, cancel: &CancellationFlag) -> Result<ProfileUpdateSummary> {
        let pending = self.ctx.store.contributors_needing_update(limit)?;
        log::info!(target: LOG_TARGET, "Refreshing {} contributor profiles (limit {limit})", pending.len());

        let mut summary = ProfileUpdateSummary::default();
        for (index, record) in pending.iter().enumerate() {
            if index > 0 && !cancel.sleep(self.settings.refresh_delay).await {
                break;
            }

            if self.refresh_profile(&record.username, Utc::now()).await? {
                summary.updated += 1;
            } else {
                summary.errors += 1;
            }
        }

        log::info!(
            target: LOG_TARGET,
            "Contributor profile refresh done: {} updated, {} errors",
            summary.updated,
            summary.errors
        );

        Ok(summary)
    }

    /// Total tracked contributors and the `top_n` most widespread ones.
    pub fn summary(&self, top_n: usize) -> Result<ContributorSummary> {
        let records = self.ctx.store.contributors()?;

        let mut top: Vec<_> = records
            .iter()
            .map(|r| TopContributor {
                username: r.username.clone(),
                projects: r.projects.len(),
                repositories: r.repositories.len(),
                followers: r.followers(),
            })
            .collect();

        top.sort_by(|a, b| {
            b.projects
                .cmp(&a.projects)
                .then_with(|| b.followers.cmp(&a.followers))
                .then_with(|| a.username.cmp(&b.username))
        });
        top.truncate(top_n);

        Ok(ContributorSummary { total: records.len(), top })
    }
}
