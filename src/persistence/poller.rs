//! Polling a backend-side collection run until it settles

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::{ApiClient, RunStatusReport};
use crate::errors::Result;
use crate::models::EntityId;

/// Default time between two status requests
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Shorter intervals are raised to this
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Background task fetching run status at a fixed interval.
///
/// Each report (or error) is pushed to the receiver returned by
/// [`RunPoller::spawn`]. Polling ends on its own once the run leaves
/// `pending`/`running`, when the receiver is dropped, or on
/// [`cancel`](RunPoller::cancel). Dropping the poller cancels it too.
pub struct RunPoller {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RunPoller {
    pub fn spawn(
        client: ApiClient,
        collection_id: EntityId,
        run_id: String,
        interval: Duration,
    ) -> (Self, mpsc::Receiver<Result<RunStatusReport>>) {
        let (tx, rx) = mpsc::channel(16);
        let interval = interval.max(MIN_POLL_INTERVAL);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let report = client.run_status(collection_id, &run_id).await;
                let settled = match &report {
                    Ok(report) => !report.status.is_active(),
                    Err(e) => {
                        warn!(collection_id, %run_id, error = %e, "Failed to fetch run status");
                        false
                    }
                };
                if tx.send(report).await.is_err() || settled {
                    break;
                }
            }
            debug!(collection_id, %run_id, "Run polling finished");
        });

        (
            Self {
                cancel,
                handle: Some(handle),
            },
            rx,
        )
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the polling task to exit
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RunPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
