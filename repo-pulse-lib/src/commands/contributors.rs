use super::Host;
use super::common::{Common, CommonArgs};
use super::report::write_profile_summary;
use super::signals::cancel_on_shutdown;
use crate::Result;
use crate::collect::{CancellationFlag, ContributorCache};
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct UpdateContributorsArgs {
    /// Most profiles to refresh in this pass (default from the configuration)
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Refresh detailed profiles of contributors flagged during collection.
pub async fn update_contributors<H: Host>(host: &mut H, args: &UpdateContributorsArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common, false)?;
    let limit = args.limit.unwrap_or(common.config.contributors.update_limit);

    let (store, _lock) = common.open_store().await?;
    let ctx = common.context(store)?;
    let cache = ContributorCache::new(ctx, common.config.profile_settings());

    let cancel = CancellationFlag::new();
    let signals = cancel_on_shutdown(cancel.clone());
    let result = cache.update_profiles(limit, &cancel).await;
    signals.abort();

    let mut text = String::new();
    write_profile_summary(&result?, &mut text)?;
    let _ = write!(common.output(), "{text}");
    Ok(())
}
