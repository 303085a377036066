//! Debounced script saving
//!
//! Every keystroke in a script editor produces an edit; only the last edit
//! of a burst is written, once the editor has been quiet for the delay.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::client::ApiClient;
use crate::errors::{ReqdeckError, Result};
use crate::models::EntityId;

/// Quiet period before a pending edit is written
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(1000);

/// Latest scripts of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEdit {
    pub request_id: EntityId,
    pub pre_request_script: String,
    pub post_request_script: String,
}

/// A background write that did not go through
#[derive(Debug)]
pub struct SaveFailure {
    pub request_id: EntityId,
    pub error: ReqdeckError,
}

pub struct ScriptAutosave {
    tx: mpsc::UnboundedSender<ScriptEdit>,
    handle: JoinHandle<Result<()>>,
}

impl ScriptAutosave {
    /// Start the writer task.
    ///
    /// Failed background writes are reported on the returned receiver; the
    /// write performed by [`flush`](ScriptAutosave::flush) reports through
    /// its own result instead.
    pub fn spawn(
        client: ApiClient,
        delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SaveFailure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(debounce(client, delay, rx, failures_tx));
        (Self { tx, handle }, failures_rx)
    }

    /// Queue an edit, replacing any pending one for the same request
    pub fn edit(&self, edit: ScriptEdit) {
        if self.tx.send(edit).is_err() {
            warn!("Script autosave task is gone; edit dropped");
        }
    }

    /// Write whatever is pending right away and stop
    pub async fn flush(self) -> Result<()> {
        drop(self.tx);
        self.handle.await.map_err(|e| {
            ReqdeckError::Persistence(format!("Script autosave task failed: {}", e))
        })?
    }
}

async fn debounce(
    client: ApiClient,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<ScriptEdit>,
    failures: mpsc::UnboundedSender<SaveFailure>,
) -> Result<()> {
    let mut pending = None;
    loop {
        let mut latest = match pending.take() {
            Some(edit) => edit,
            None => match rx.recv().await {
                Some(edit) => edit,
                None => return Ok(()),
            },
        };

        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(edit) if edit.request_id == latest.request_id => latest = edit,
                    Some(edit) => {
                        // Another request: write this one now, debounce the new one
                        report(&failures, &latest, save(&client, &latest).await);
                        pending = Some(edit);
                        break;
                    }
                    None => return save(&client, &latest).await,
                },
                _ = tokio::time::sleep(delay) => {
                    report(&failures, &latest, save(&client, &latest).await);
                    break;
                }
            }
        }
    }
}

fn report(failures: &mpsc::UnboundedSender<SaveFailure>, edit: &ScriptEdit, result: Result<()>) {
    if let Err(error) = result {
        // Nobody listening is fine; the warning is already logged
        let _ = failures.send(SaveFailure {
            request_id: edit.request_id,
            error,
        });
    }
}

async fn save(client: &ApiClient, edit: &ScriptEdit) -> Result<()> {
    let result = client
        .save_scripts(
            edit.request_id,
            &edit.pre_request_script,
            &edit.post_request_script,
        )
        .await;
    match &result {
        Ok(()) => debug!(request_id = edit.request_id, "Scripts saved"),
        Err(e) => warn!(request_id = edit.request_id, error = %e, "Failed to save scripts"),
    }
    result
}
