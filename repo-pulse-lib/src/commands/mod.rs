//! Command-line interface for repo-pulse
//!
//! Each subcommand lives in its own module and receives a [`Host`] for its output:
//!
//! - **collect**: collect snapshots for the catalog, once or on a schedule
//! - **update-contributors**: refresh detailed contributor profiles
//! - **aggregate**: recompute daily aggregates for a trailing window
//! - **list**: show the repositories the catalog resolves to
//! - **init**: write the default configuration file
//! - **validate**: check a configuration file and, optionally, a catalog
//!
//! Commands that touch the data directory share [`common::CommonArgs`], which covers
//! the GitHub token, data directory, catalog, configuration file, and logging.
//! The data directory is locked for the duration of such a command.

mod aggregate;
mod collect;
mod common;
mod config;
mod contributors;
mod host;
mod init;
mod list;
mod progress_reporter;
mod report;
mod run;
mod signals;
mod validate;

pub use aggregate::{AggregateArgs, aggregate_daily};
pub use collect::{CollectArgs, collect_stats};
pub use contributors::{UpdateContributorsArgs, update_contributors};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use list::{ListArgs, list_targets};
pub use progress_reporter::ProgressReporter;
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
