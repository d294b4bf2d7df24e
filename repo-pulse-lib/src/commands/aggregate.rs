use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::collect::{Aggregator, MAX_WINDOW_DAYS};
use chrono::Utc;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct AggregateArgs {
    /// Trailing whole days to recompute (default from the configuration)
    #[arg(long, value_name = "DAYS", value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_WINDOW_DAYS)))]
    pub days: Option<u32>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn aggregate_daily<H: Host>(host: &mut H, args: &AggregateArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common, false)?;
    let days = args.days.unwrap_or(common.config.aggregation.window_days);

    let (store, _lock) = common.open_store().await?;
    let count = Aggregator::new(store).aggregate_daily(days, Utc::now())?;

    let _ = writeln!(common.output(), "Computed {count} daily aggregates over the last {days} days");
    Ok(())
}
