//! Periodic study-time accrual for an open session.

use std::sync::Arc;

use storage::repository::SaveOutcome;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::ProgressError;
use crate::notice::ErrorReporter;
use crate::progress_store::ProgressStore;

/// Timer owned by a study session.
///
/// Every tick adds one interval of study time while the host reports the
/// session as visible, then flushes the store whether or not time was added.
/// Going hidden triggers an extra flush. A failed flush is reported and the
/// timer keeps running; the next tick retries with the larger snapshot.
pub struct TimeAccumulator {
    store: ProgressStore,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TimeAccumulator {
    /// Spawn the ticker on the current tokio runtime.
    #[must_use]
    pub fn start(
        store: ProgressStore,
        period: Duration,
        visibility: watch::Receiver<bool>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let period = period.max(Duration::from_secs(1));
        let cancel = CancellationToken::new();
        log::info!(
            "starting study timer for course {} every {}s",
            store.course().id,
            period.as_secs()
        );
        let handle = tokio::spawn(tick_loop(
            store.clone(),
            period,
            visibility,
            reporter,
            cancel.clone(),
        ));
        Self {
            store,
            cancel,
            handle,
        }
    }

    /// Cancel the ticker, wait for it to finish, then flush one final time.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the final flush fails.
    pub async fn stop(self) -> Result<SaveOutcome, ProgressError> {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            log::warn!("study timer task ended abnormally: {err}");
        }
        log::info!("stopped study timer for course {}", self.store.course().id);
        self.store.flush().await
    }
}

async fn tick_loop(
    store: ProgressStore,
    period: Duration,
    mut visibility: watch::Receiver<bool>,
    reporter: Arc<dyn ErrorReporter>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let seconds = period.as_secs();
    let mut visibility_open = true;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = visibility.changed(), if visibility_open => {
                match changed {
                    Ok(()) => {
                        let visible = *visibility.borrow_and_update();
                        if !visible {
                            log::debug!("session hidden, flushing course {}", store.course().id);
                            store.flush_or_report(reporter.as_ref()).await;
                        }
                    }
                    // The host dropped its sender; keep the last reported state.
                    Err(_) => visibility_open = false,
                }
            }
            _ = ticker.tick() => {
                let visible = *visibility.borrow();
                if visible {
                    store.accumulate_time(seconds);
                }
                store.flush_or_report(reporter.as_ref()).await;
            }
        }
    }
}
