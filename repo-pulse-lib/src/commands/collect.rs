use super::Host;
use super::common::{Common, CommonArgs};
use super::report::write_run_summary;
use super::signals::cancel_on_shutdown;
use crate::Result;
use crate::collect::{CancellationFlag, CollectionOrchestrator, NoProgress, Progress};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;

const LOG_TARGET: &str = "   collect";

#[derive(Parser, Debug)]
pub struct CollectArgs {
    /// Run a single collection pass and exit instead of collecting on a schedule
    #[arg(long)]
    pub once: bool,

    /// Collect only the primary repository of each project
    #[arg(long)]
    pub primary_only: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Collect statistics for every catalog repository, once or until interrupted.
pub async fn collect_stats<H: Host>(host: &mut H, args: &CollectArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common, !args.once)?;

    let mut registry = common.registry()?;
    if args.primary_only {
        registry = registry.primary_only();
    }

    let (store, _lock) = common.open_store().await?;
    let ctx = common.context(store)?;

    let progress: Arc<dyn Progress> = if args.once {
        Arc::new(common.progress_reporter())
    } else {
        Arc::new(NoProgress)
    };

    let config = &common.config;
    let mut orchestrator = CollectionOrchestrator::new(
        ctx,
        registry,
        config.collector_settings(),
        config.contributor_settings(),
        config.orchestrator_settings(),
        progress,
    );
    let interval = config.scheduler.interval;

    let cancel = CancellationFlag::new();
    let signals = cancel_on_shutdown(cancel.clone());

    if !args.once {
        let runs = orchestrator.run_continuously(interval, &cancel).await;
        signals.abort();
        log::info!(target: LOG_TARGET, "Stopped after {runs} collection runs");
        return Ok(());
    }

    let result = orchestrator.run_once(&cancel).await;
    signals.abort();
    let summary = result?;

    let mut text = String::new();
    write_run_summary(&summary, common.use_colors(), &mut text)?;
    let _ = write!(common.output(), "{text}");
    Ok(())
}
