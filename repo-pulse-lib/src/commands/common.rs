//! Setup shared between the commands: logging, configuration, data directory, and
//! construction of the collection context.

use super::ProgressReporter;
use super::config::Config;
use crate::Result;
use crate::collect::{CatalogFile, Context, GitHubClient, RateLimiter, TargetRegistry};
use crate::store::{JsonStore, Store, StoreLockGuard, acquire_store_lock};
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use core::time::Duration;
use directories::BaseDirs;
use ohno::{IntoAppError, bail};
use std::fs;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

impl ColorMode {
    /// Resolve against whether the destination stream is a terminal.
    #[must_use]
    pub const fn enabled(self, is_terminal: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => is_terminal,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by all commands that touch the data directory
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Directory holding snapshots, aggregates, and contributor records
    #[arg(long, value_name = "PATH", env = "PULSE_DATA_DIR")]
    pub data_dir: Option<Utf8PathBuf>,

    /// Project catalog (JSON array of projects with repository URLs)
    #[arg(long, value_name = "PATH", env = "PULSE_CATALOG", default_value = "catalog.json")]
    pub catalog: Utf8PathBuf,

    /// Path to configuration file (default is `pulse.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,
}

pub struct Common<'a, H: super::Host> {
    pub config: Config,
    pub data_dir: PathBuf,
    host: &'a mut H,
    args: CommonArgs,
}

impl<'a, H: super::Host> Common<'a, H> {
    /// Initialize logging and load the configuration.
    ///
    /// `service` selects the log format of a long-running process, with timestamps.
    pub fn new(host: &'a mut H, args: &CommonArgs, service: bool) -> Result<Self> {
        Self::init_logging(args.log_level, service);

        let config = Config::load(&Utf8PathBuf::from("."), args.config.as_ref())?;

        let data_dir = if let Some(path) = &args.data_dir {
            path.as_std_path().to_path_buf()
        } else {
            BaseDirs::new()
                .into_app_err("could not determine the data directory")?
                .data_dir()
                .join("repo-pulse")
        };

        Ok(Self {
            config,
            data_dir,
            host,
            args: args.clone(),
        })
    }

    /// Initialize logger based on log level
    fn init_logging(log_level: LogLevel, service: bool) {
        let level = match log_level {
            LogLevel::None => return,
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        let env = env_logger::Env::default().filter_or("RUST_LOG", level);

        // A second initialization, as happens when commands run in-process, keeps the first logger.
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp(service.then_some(env_logger::TimestampPrecision::Seconds))
            .format_module_path(false)
            .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
            .try_init();
    }

    pub fn output(&mut self) -> impl Write {
        self.host.output()
    }

    /// Whether console output should be colored.
    #[must_use]
    pub fn use_colors(&self) -> bool {
        self.args.color.enabled(std::io::stdout().is_terminal())
    }

    /// Open the JSON store under the data directory, holding its exclusive lock.
    pub async fn open_store(&self) -> Result<(Arc<dyn Store>, StoreLockGuard)> {
        fs::create_dir_all(&self.data_dir).into_app_err_with(|| format!("creating data directory '{}'", self.data_dir.display()))?;

        let lock = acquire_store_lock(&self.data_dir).await?;
        let store = JsonStore::open(&self.data_dir)?;
        Ok((Arc::new(store), lock))
    }

    /// Load the target registry from the catalog file.
    pub fn registry(&self) -> Result<TargetRegistry> {
        TargetRegistry::load(&CatalogFile::new(self.args.catalog.as_std_path()))
    }

    /// Build the shared collection context around an authenticated GitHub client.
    pub fn context(&self, store: Arc<dyn Store>) -> Result<Arc<Context<GitHubClient>>> {
        let Some(token) = self.args.github_token.as_deref().filter(|t| !t.trim().is_empty()) else {
            bail!("a GitHub token is required, pass --github-token or set GITHUB_TOKEN");
        };

        let api = GitHubClient::new(Some(token), &self.config.github.api_url, self.config.github.request_timeout)?;
        let limiter = RateLimiter::new(self.config.rate_limit_settings());

        Ok(Context::new(api, store, limiter))
    }

    /// A progress bar on stderr, shown only when logging is off.
    #[must_use]
    pub fn progress_reporter(&self) -> ProgressReporter {
        let delay = if self.args.log_level == LogLevel::None {
            Duration::from_millis(300)
        } else {
            Duration::from_hours(365 * 24)
        };

        ProgressReporter::new(delay, self.args.color.enabled(std::io::stderr().is_terminal()))
    }
}
