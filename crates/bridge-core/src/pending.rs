//! Durable queue of voicemails waiting for a reachable recipient

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::{NewPendingVoicemail, PendingId, PendingVoicemail};

/// Pending voicemail storage trait
///
/// Records are never deleted; delivery flips `delivered` to true.
#[async_trait]
pub trait PendingVoicemailStore: Send + Sync {
    /// Insert a record with `delivered = false` and return its id.
    async fn enqueue(&self, voicemail: NewPendingVoicemail) -> Result<PendingId>;

    /// Mark a record delivered. Calling it again is a no-op.
    async fn mark_delivered(&self, id: PendingId) -> Result<()>;

    /// Fresh scan of every undelivered record. Each call re-runs the query.
    fn query_undelivered(&self) -> BoxStream<'_, Result<(PendingId, PendingVoicemail)>>;
}
