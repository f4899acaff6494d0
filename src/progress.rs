use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const REFRESH_EVERY: Duration = Duration::from_millis(200);

/// Number of price entries processed so far, shared by every region worker.
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicU64>);

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal progress bar for a run. `estimate` is only a heuristic upper bound.
pub fn progress_bar(estimate: u64) -> ProgressBar {
    let bar = ProgressBar::new(estimate);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Mirrors a [`Progress`] counter onto a progress bar until finished.
pub struct Reporter {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<ProgressBar>,
}

impl Reporter {
    pub fn spawn(progress: Progress, bar: ProgressBar) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REFRESH_EVERY);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => show(&bar, progress.get()),
                }
            }
            show(&bar, progress.get());
            bar
        });
        Reporter { stop_tx, handle }
    }

    /// Stops the reporting loop and leaves the bar at its final count.
    pub async fn finish(self, message: impl Into<String>) {
        let _ = self.stop_tx.send(());
        if let Ok(bar) = self.handle.await {
            bar.finish_with_message(message.into());
        }
    }
}

fn show(bar: &ProgressBar, done: u64) {
    // Entries can outnumber the estimate.
    if bar.length().is_some_and(|len| done > len) {
        bar.set_length(done);
    }
    bar.set_position(done);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_shared_between_clones() {
        let progress = Progress::new();
        let other = progress.clone();
        progress.inc();
        other.inc();
        assert_eq!(progress.get(), 2);
    }

    #[tokio::test]
    async fn bar_grows_past_the_estimate() {
        let progress = Progress::new();
        let bar = ProgressBar::hidden();
        bar.set_length(1);
        let reporter = Reporter::spawn(progress.clone(), bar.clone());

        for _ in 0..3 {
            progress.inc();
        }
        reporter.finish("done").await;

        assert_eq!(bar.position(), 3);
        assert_eq!(bar.length(), Some(3));
    }
}
