use crate::Result;
use crate::collect::{CollectorSettings, ContributorSettings, MAX_WINDOW_DAYS, OrchestratorSettings, ProfileDepth, RateLimitSettings};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

const LOG_TARGET: &str = "    config";

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "pulse.toml";

/// Largest page the GitHub API serves, which bounds the sampled list sizes.
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub contributors: ContributorConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubConfig {
    pub api_url: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub buffer: f64,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    #[serde(with = "humantime_serde")]
    pub reset_margin: Duration,
    #[serde(with = "humantime_serde")]
    pub max_wait: Duration,
    pub max_retries: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let s = RateLimitSettings::default();
        Self {
            limit: s.limit,
            buffer: s.buffer,
            window: s.window,
            reset_margin: s.reset_margin,
            max_wait: s.max_wait,
            max_retries: s.max_retries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionConfig {
    pub commit_sample_size: usize,
    pub top_contributors: usize,
    #[serde(with = "humantime_serde")]
    pub politeness_delay: Duration,
    pub estimated_calls_per_target: u64,
    pub budget_margin: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        let collector = CollectorSettings::default();
        let orchestrator = OrchestratorSettings::default();
        Self {
            commit_sample_size: collector.commit_sample_size,
            top_contributors: collector.top_contributors,
            politeness_delay: orchestrator.politeness_delay,
            estimated_calls_per_target: orchestrator.estimated_calls_per_target,
            budget_margin: orchestrator.budget_margin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContributorConfig {
    pub enabled: bool,
    pub depth: ProfileDepth,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    pub max_per_repo: usize,
    #[serde(with = "humantime_serde")]
    pub refresh_delay: Duration,
    pub update_limit: usize,
    pub summary_top_n: usize,
}

impl Default for ContributorConfig {
    fn default() -> Self {
        let s = ContributorSettings::default();
        Self {
            enabled: true,
            depth: s.depth,
            ttl: s.ttl,
            max_per_repo: s.max_per_repo,
            refresh_delay: s.refresh_delay,
            update_limit: 100,
            summary_top_n: OrchestratorSettings::default().summary_top_n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_hours(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationConfig {
    pub window_days: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_days: OrchestratorSettings::default().aggregation_window_days,
        }
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `pulse.toml` in `base_dir` is used when it exists.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!(target: LOG_TARGET, "No configuration file at '{path}', using defaults");
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config
            .validate()
            .map_err(|e| e.enrich_with(|| format!("validating configuration file '{final_path}'")))?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let _ = Url::parse(&self.github.api_url).into_app_err_with(|| format!("github.api_url '{}' is not a valid URL", self.github.api_url))?;

        if self.github.request_timeout.is_zero() {
            return Err(app_err!("github.request_timeout must be positive"));
        }

        if self.rate_limit.limit == 0 {
            return Err(app_err!("rate_limit.limit must be positive"));
        }

        if !(self.rate_limit.buffer > 0.0 && self.rate_limit.buffer <= 1.0) {
            return Err(app_err!("rate_limit.buffer must be in (0, 1], got {}", self.rate_limit.buffer));
        }

        if self.rate_limit.window.is_zero() {
            return Err(app_err!("rate_limit.window must be positive"));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.collection.commit_sample_size) {
            return Err(app_err!(
                "collection.commit_sample_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.collection.commit_sample_size
            ));
        }

        if self.collection.top_contributors == 0 {
            return Err(app_err!("collection.top_contributors must be positive"));
        }

        if self.collection.estimated_calls_per_target == 0 {
            return Err(app_err!("collection.estimated_calls_per_target must be positive"));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.contributors.max_per_repo) {
            return Err(app_err!(
                "contributors.max_per_repo must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.contributors.max_per_repo
            ));
        }

        if self.scheduler.interval.is_zero() {
            return Err(app_err!("scheduler.interval must be positive"));
        }

        if !(1..=MAX_WINDOW_DAYS).contains(&self.aggregation.window_days) {
            return Err(app_err!(
                "aggregation.window_days must be between 1 and {MAX_WINDOW_DAYS}, got {}",
                self.aggregation.window_days
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn rate_limit_settings(&self) -> RateLimitSettings {
        RateLimitSettings {
            limit: self.rate_limit.limit,
            buffer: self.rate_limit.buffer,
            window: self.rate_limit.window,
            reset_margin: self.rate_limit.reset_margin,
            max_wait: self.rate_limit.max_wait,
            max_retries: self.rate_limit.max_retries,
        }
    }

    #[must_use]
    pub const fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            commit_sample_size: self.collection.commit_sample_size,
            top_contributors: self.collection.top_contributors,
        }
    }

    /// Contributor tracking settings, or `None` when tracking is disabled.
    #[must_use]
    pub fn contributor_settings(&self) -> Option<ContributorSettings> {
        self.contributors.enabled.then(|| self.profile_settings())
    }

    /// Contributor settings regardless of whether tracking during collection is enabled.
    #[must_use]
    pub const fn profile_settings(&self) -> ContributorSettings {
        ContributorSettings {
            ttl: self.contributors.ttl,
            max_per_repo: self.contributors.max_per_repo,
            depth: self.contributors.depth,
            refresh_delay: self.contributors.refresh_delay,
        }
    }

    #[must_use]
    pub const fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            politeness_delay: self.collection.politeness_delay,
            estimated_calls_per_target: self.collection.estimated_calls_per_target,
            budget_margin: self.collection.budget_margin,
            aggregation_window_days: self.aggregation.window_days,
            summary_top_n: self.contributors.summary_top_n,
        }
    }
}
