use crate::collect::CancellationFlag;
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "   signals";

/// Cancel `flag` on Ctrl-C, or on SIGTERM where available.
///
/// The returned task ends after the first signal; abort it once the guarded work is done.
pub fn cancel_on_shutdown(flag: CancellationFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_shutdown().await;
        log::info!(target: LOG_TARGET, "Shutdown requested, finishing the current repository");
        flag.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            log::warn!(target: LOG_TARGET, "Could not install SIGTERM handler: {e}");
            None
        }
    };

    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            if let Err(e) = r {
                log::warn!(target: LOG_TARGET, "Could not listen for Ctrl-C: {e}");
                core::future::pending::<()>().await;
            }
        }
        Some(()) = async {
            match &mut sigterm {
                Some(s) => s.recv().await,
                None => core::future::pending().await,
            }
        } => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!(target: LOG_TARGET, "Could not listen for Ctrl-C: {e}");
        core::future::pending::<()>().await;
    }
}
