//! Run-level control of a collection pass.
//!
//! A run visits primary targets first, then decides whether the remaining call budget
//! can afford the secondary tier, persists each snapshot as soon as it is produced,
//! and finishes with the daily aggregation and contributor summary passes.

use super::aggregator::Aggregator;
use super::cancel::CancellationFlag;
use super::collector::{CollectorSettings, RepositoryCollector};
use super::context::Context;
use super::contributor_cache::{ContributorCache, ContributorSettings, ContributorSummary};
use super::github::{MetricsApi, RateLimitInfo};
use super::progress::Progress;
use super::targets::{Target, TargetRegistry};
use crate::Result;
use chrono::Utc;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};

const LOG_TARGET: &str = "orchestrator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Pause between two targets.
    pub politeness_delay: Duration,

    /// API calls one secondary target is expected to cost.
    pub estimated_calls_per_target: u64,

    /// Calls that must remain after the secondary tier.
    pub budget_margin: u64,

    /// Trailing days recomputed by the aggregation pass.
    pub aggregation_window_days: u32,

    /// Contributors listed in the end-of-run summary.
    pub summary_top_n: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            politeness_delay: Duration::from_millis(500),
            estimated_calls_per_target: 10,
            budget_margin: 100,
            aggregation_window_days: 7,
            summary_top_n: 10,
        }
    }
}

/// Outcome of one [`CollectionOrchestrator::run_once`].
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub successes: usize,

    /// Transient failures, including snapshots that could not be stored.
    pub errors: usize,
    pub permanent_failures: usize,

    /// Secondary targets not visited because the budget was too small.
    pub skipped_secondary: usize,
    pub aggregates: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
    pub rate_limit: Option<RateLimitInfo>,
    pub contributors: Option<ContributorSummary>,
}

#[derive(Debug, Default)]
struct TierCounts {
    successes: usize,
    errors: usize,
    permanent_failures: usize,
    cancelled: bool,
}

pub struct CollectionOrchestrator<A> {
    ctx: Arc<Context<A>>,
    registry: TargetRegistry,
    collector: RepositoryCollector<A>,
    contributors: Option<ContributorCache<A>>,
    aggregator: Aggregator,
    settings: OrchestratorSettings,
    progress: Arc<dyn Progress>,
}

impl<A> core::fmt::Debug for CollectionOrchestrator<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CollectionOrchestrator")
            .field("targets", &self.registry.len())
            .field("tracking_contributors", &self.contributors.is_some())
            .field("settings", &self.settings)
            .field("progress", &"<dyn Progress>")
            .finish_non_exhaustive()
    }
}

impl<A: MetricsApi> CollectionOrchestrator<A> {
    /// Wire up a collector and, when `contributors` is given, a contributor cache.
    #[must_use]
    pub fn new(
        ctx: Arc<Context<A>>,
        registry: TargetRegistry,
        collector_settings: CollectorSettings,
        contributors: Option<ContributorSettings>,
        settings: OrchestratorSettings,
        progress: Arc<dyn Progress>,
    ) -> Self {
        let contributors = contributors.map(|s| ContributorCache::new(Arc::clone(&ctx), s));

        Self {
            collector: RepositoryCollector::new(Arc::clone(&ctx), collector_settings, contributors.clone()),
            aggregator: Aggregator::new(Arc::clone(&ctx.store)),
            ctx,
            registry,
            contributors,
            settings,
            progress,
        }
    }

    /// Calls the secondary tier needs before it may run.
    #[must_use]
    pub const fn required_budget(&self, secondary_count: usize) -> u64 {
        (secondary_count as u64)
            .saturating_mul(self.settings.estimated_calls_per_target)
            .saturating_add(self.settings.budget_margin)
    }

    /// Remaining call budget: the smaller of the remote and local figures, local alone
    /// when the remote status is unavailable.
    pub async fn remaining_budget(&self) -> u64 {
        let local = self.ctx.limiter.remaining_capacity() as u64;
        match self.ctx.api.rate_limit_status().await {
            Ok(info) => info.remaining.min(local),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not fetch the remote rate limit, using the local budget of {local}: {e}");
                local
            }
        }
    }

    /// Run one collection pass over all targets.
    pub async fn run_once(&mut self, cancel: &CancellationFlag) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        let primary: Vec<Target> = self.registry.primary().cloned().collect();
        let secondary: Vec<Target> = self.registry.secondary().cloned().collect();

        log::info!(
            target: LOG_TARGET,
            "Starting collection of {} primary and {} secondary repositories",
            primary.len(),
            secondary.len()
        );

        self.progress.set_phase("Primary");
        let counts = self.run_tier(&primary, cancel).await;
        summary.add(&counts);

        if !summary.cancelled && !secondary.is_empty() {
            let remaining = self.remaining_budget().await;
            let required = self.required_budget(secondary.len());

            if remaining > required {
                log::info!(target: LOG_TARGET, "Budget of {remaining} calls covers the {required} the secondary tier needs");
                self.progress.set_phase("Secondary");
                let counts = self.run_tier(&secondary, cancel).await;
                summary.add(&counts);
            } else {
                log::warn!(
                    target: LOG_TARGET,
                    "Skipping {} secondary repositories: {remaining} calls left, {required} needed",
                    secondary.len()
                );
                summary.skipped_secondary = secondary.len();
            }
        }

        self.progress.done();
        summary.aggregates = self.aggregator.aggregate_daily(self.settings.aggregation_window_days, Utc::now())?;

        if let Some(cache) = &self.contributors {
            let contributors = cache.summary(self.settings.summary_top_n)?;
            log_contributor_summary(&contributors);
            summary.contributors = Some(contributors);
        }

        summary.rate_limit = self.ctx.api.rate_limit_status().await.ok();
        summary.elapsed = start.elapsed();

        log_run_summary(&summary);
        Ok(summary)
    }

    /// Run immediately, then on every `interval` tick until cancelled.
    ///
    /// Runs never overlap; a run that outlasts the interval delays the next tick.
    /// A failed run is logged and the schedule continues. Returns the number of runs.
    pub async fn run_continuously(&mut self, interval: Duration, cancel: &CancellationFlag) -> usize {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut runs = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel.cancelled() => break,
            }

            runs += 1;
            if let Err(e) = self.run_once(cancel).await {
                log::error!(target: LOG_TARGET, "Collection run {runs} failed: {e:#}");
            }

            if cancel.is_cancelled() {
                break;
            }

            log::info!(target: LOG_TARGET, "Next collection run in {interval:?}");
        }

        log::info!(target: LOG_TARGET, "Scheduler stopped after {runs} runs");
        runs
    }

    async fn run_tier(&mut self, targets: &[Target], cancel: &CancellationFlag) -> TierCounts {
        let mut counts = TierCounts::default();
        let total = targets.len() as u64;
        let done = Arc::new(AtomicU64::new(0));

        let progress_done = Arc::clone(&done);
        self.progress.set_determinate(Box::new(move || {
            let current = progress_done.load(Ordering::Relaxed);
            (total, current, format!("{current}/{total} repositories"))
        }));

        for (index, target) in targets.iter().enumerate() {
            if cancel.is_cancelled() || (index > 0 && !cancel.sleep(self.settings.politeness_delay).await) {
                log::info!(target: LOG_TARGET, "Cancelled with {} repositories left in the tier", targets.len() - index);
                counts.cancelled = true;
                break;
            }

            match self.collector.collect(target).await {
                Ok(snapshot) => match self.ctx.store.append_snapshot(&snapshot) {
                    Ok(()) => counts.successes += 1,
                    Err(e) => {
                        log::error!(target: LOG_TARGET, "Could not store snapshot of '{}': {e:#}", target.repo);
                        counts.errors += 1;
                    }
                },
                Err(e) if e.is_permanent() => counts.permanent_failures += 1,
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not collect '{}': {e}", target.repo);
                    counts.errors += 1;
                }
            }

            let _ = done.fetch_add(1, Ordering::Relaxed);
        }

        counts
    }
}

impl RunSummary {
    const fn add(&mut self, counts: &TierCounts) {
        self.successes += counts.successes;
        self.errors += counts.errors;
        self.permanent_failures += counts.permanent_failures;
        self.cancelled |= counts.cancelled;
    }
}

fn log_run_summary(summary: &RunSummary) {
    log::info!(
        target: LOG_TARGET,
        "Run finished in {:.1}s: {} collected, {} errors, {} permanent failures, {} secondary skipped, {} daily aggregates",
        summary.elapsed.as_secs_f64(),
        summary.successes,
        summary.errors,
        summary.permanent_failures,
        summary.skipped_secondary,
        summary.aggregates
    );

    if let Some(rate) = &summary.rate_limit {
        log::info!(
            target: LOG_TARGET,
            "Rate limit: {}/{} calls left, resets at {}",
            rate.remaining,
            rate.limit,
            rate.reset_at.with_timezone(&chrono::Local).format("%T")
        );
    }
}

fn log_contributor_summary(summary: &ContributorSummary) {
    log::info!(target: LOG_TARGET, "Tracking {} contributors", summary.total);
    for (rank, top) in summary.top.iter().enumerate() {
        log::info!(
            target: LOG_TARGET,
            "{:>3}. {} ({} projects, {} repositories, {} followers)",
            rank + 1,
            top.username,
            top.projects,
            top.repositories,
            top.followers
        );
    }
}
