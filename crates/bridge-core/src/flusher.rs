//! Re-drives pending voicemails through the delivery engine

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::DeliveryEngine;
use crate::pending::PendingVoicemailStore;
use crate::types::DeliveryOutcome;

/// Summary of one flush cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub scanned: usize,
    pub delivered: usize,
    pub failed: usize,
    /// True when the scan stopped early on a storage error
    pub aborted: bool,
}

/// Pending queue flusher
///
/// No backoff and no attempt cap: a record that keeps failing is retried on
/// every cycle until its recipient links an account.
pub struct QueueFlusher {
    engine: Arc<DeliveryEngine>,
    pending: Arc<dyn PendingVoicemailStore>,
}

impl QueueFlusher {
    pub fn new(engine: Arc<DeliveryEngine>) -> Self {
        let pending = engine.pending_store();
        Self { engine, pending }
    }

    /// Scan the queue once and retry every undelivered voicemail
    pub async fn flush_pending(&self) -> FlushReport {
        let mut report = FlushReport::default();
        let mut undelivered = self.pending.query_undelivered();

        while let Some(entry) = undelivered.next().await {
            let (id, voicemail) = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!(error = %e, "Failed to get a pending voicemail, stopping scan");
                    report.aborted = true;
                    break;
                }
            };
            report.scanned += 1;

            match self
                .engine
                .deliver(&voicemail.from, &voicemail.to, &voicemail.audio_url, true)
                .await
            {
                DeliveryOutcome::Delivered { .. } => match self.pending.mark_delivered(id).await {
                    Ok(()) => {
                        info!(pending_id = id, to = %voicemail.to, "Delivered pending voicemail");
                        report.delivered += 1;
                    }
                    Err(e) => {
                        error!(pending_id = id, error = %e, "Delivered pending voicemail but failed to mark it");
                        report.failed += 1;
                    }
                },
                DeliveryOutcome::Failed(e) => {
                    warn!(pending_id = id, error = %e, "Failed to deliver a pending voicemail");
                    report.failed += 1;
                }
                DeliveryOutcome::QueuedPending(new_id) => {
                    // Retries never enqueue; seeing this means a store bug.
                    error!(pending_id = id, new_id, "Retry produced a new pending voicemail");
                    report.failed += 1;
                }
            }
        }

        debug!(?report, "Flush cycle finished");
        report
    }

    /// Run [`flush_pending`](Self::flush_pending) every `interval` until `shutdown` fires
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Pending voicemail flusher running every {:?}", interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.flush_pending().await;
                    }
                    _ = shutdown.cancelled() => {
                        debug!("Pending voicemail flusher stopped");
                        break;
                    }
                }
            }
        })
    }
}
