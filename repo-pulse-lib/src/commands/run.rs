//! Command dispatch logic for repo-pulse

use super::{
    AggregateArgs, CollectArgs, InitArgs, ListArgs, UpdateContributorsArgs, ValidateArgs, aggregate_daily, collect_stats, init_config,
    list_targets, update_contributors, validate_config,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "repo-pulse", version, author, long_about = None)]
#[command(about = "Track GitHub repository statistics over time")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: PulseSubcommand,
}

#[derive(Subcommand, Debug)]
enum PulseSubcommand {
    /// Collect repository statistics, once or on a schedule
    Collect(Box<CollectArgs>),
    /// Refresh detailed profiles of flagged contributors
    UpdateContributors(Box<UpdateContributorsArgs>),
    /// Recompute daily aggregates from stored snapshots
    Aggregate(Box<AggregateArgs>),
    /// List the repositories resolved from the catalog
    List(ListArgs),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file and catalog
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Errors
///
/// Returns an error if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        PulseSubcommand::Collect(args) => collect_stats(host, args).await,
        PulseSubcommand::UpdateContributors(args) => update_contributors(host, args).await,
        PulseSubcommand::Aggregate(args) => aggregate_daily(host, args).await,
        PulseSubcommand::List(args) => list_targets(host, args),
        PulseSubcommand::Init(args) => init_config(host, args),
        PulseSubcommand::Validate(args) => validate_config(host, args),
    }
}
