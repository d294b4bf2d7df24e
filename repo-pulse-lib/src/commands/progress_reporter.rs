use crate::collect::Progress;
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

type StatusCallback = Box<dyn Fn() -> (u64, u64, String) + Send + Sync>;

/// How often the bar polls its status callback.
const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

const BAR_TEMPLATE: &str = "{prefix:>12.bold.cyan} [{bar:25}] {msg}";
const BAR_TEMPLATE_PLAIN: &str = "{prefix:>12} [{bar:25}] {msg}";

/// When the bar may start drawing, and whether it has.
#[derive(Debug)]
struct Reveal {
    after: Instant,
    shown: AtomicBool,
}

impl Reveal {
    /// Switch to drawing once the delay has passed. Returns whether the bar is shown.
    fn check(&self, bar: &ProgressBar) -> bool {
        if self.shown.load(Ordering::Relaxed) {
            return true;
        }

        if Instant::now() < self.after {
            return false;
        }

        self.shown.store(true, Ordering::Relaxed);
        bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        true
    }
}

/// A per-tier progress bar on stderr that stays hidden until a delay has passed.
///
/// Passes that finish inside the delay never draw anything.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    reveal: Arc<Reveal>,
    status: Arc<Mutex<StatusCallback>>,
    refresher: Arc<JoinHandle<()>>,
    use_colors: bool,
}

impl ProgressReporter {
    /// Create a hidden reporter that reveals itself after `delay`.
    ///
    /// When `use_colors` is false, the bar is rendered without ANSI styling.
    #[must_use]
    pub fn new(delay: Duration, use_colors: bool) -> Self {
        let bar = ProgressBar::hidden();
        let reveal = Arc::new(Reveal {
            after: Instant::now() + delay,
            shown: AtomicBool::new(false),
        });
        let status: Arc<Mutex<StatusCallback>> = Arc::new(Mutex::new(Box::new(|| (0, 0, String::new()))));

        let refresher = tokio::spawn(refresh(bar.clone(), Arc::clone(&reveal), Arc::clone(&status)));

        Self {
            bar,
            reveal,
            status,
            refresher: Arc::new(refresher),
            use_colors,
        }
    }

    fn style(&self) -> ProgressStyle {
        let template = if self.use_colors { BAR_TEMPLATE } else { BAR_TEMPLATE_PLAIN };
        ProgressStyle::default_bar()
            .template(template)
            .expect("progress bar template is valid")
            .progress_chars("=> ")
    }
}

impl Progress for ProgressReporter {
    fn set_phase(&self, phase: &str) {
        self.bar.set_prefix(phase.to_string());
    }

    fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {
        *self.status.lock().expect("lock poisoned") = callback;
        self.bar.set_length(0);
        self.bar.set_position(0);
        self.bar.set_style(self.style());
    }

    fn done(&self) {
        self.refresher.abort();
        if self.reveal.shown.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("bar", &self.bar)
            .field("reveal", &self.reveal)
            .field("use_colors", &self.use_colors)
            .finish_non_exhaustive()
    }
}

/// Poll the status callback until aborted, drawing once the bar is revealed.
async fn refresh(bar: ProgressBar, reveal: Arc<Reveal>, status: Arc<Mutex<StatusCallback>>) {
    let mut interval = tokio::time::interval(REFRESH_INTERVAL);
    #[expect(clippy::infinite_loop, reason = "task runs until aborted")]
    loop {
        let _ = interval.tick().await;
        if !reveal.check(&bar) {
            continue;
        }

        let (total, current, message) = (status.lock().expect("lock poisoned"))();
        if total > 0 {
            bar.set_length(total);
            bar.set_position(current);
        }
        bar.set_message(message);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reporter_stays_hidden_before_delay() {
        let reporter = ProgressReporter::new(Duration::from_hours(1), false);

        reporter.set_phase("Primary");
        reporter.set_determinate(Box::new(|| (10, 3, "3/10 repositories".to_string())));
        reporter.set_phase("Secondary");
        reporter.done();

        assert!(!reporter.reveal.shown.load(Ordering::Relaxed));
        assert_eq!(reporter.bar.prefix(), "Secondary");
    }

    #[test]
    fn test_reveal_after_delay() {
        let bar = ProgressBar::hidden();

        let later = Reveal {
            after: Instant::now() + Duration::from_hours(1),
            shown: AtomicBool::new(false),
        };
        assert!(!later.check(&bar));

        let now = Reveal {
            after: Instant::now(),
            shown: AtomicBool::new(false),
        };
        assert!(now.check(&bar));
        assert!(now.shown.load(Ordering::Relaxed));
    }
}
