//! # Delivery decision engine
//!
//! Routes one voicemail to its recipient. Every attempt ends in exactly one
//! [`DeliveryOutcome`]:
//!
//! | recipient               | sender                 | retry | outcome                          |
//! |-------------------------|------------------------|-------|----------------------------------|
//! | absent / needs bridge   | any                    | no    | `QueuedPending` (one new record) |
//! | absent / needs bridge   | any                    | yes   | `Failed(PersistentNonDelivery)`  |
//! | linked                  | linked                 | any   | one direct post                  |
//! | linked                  | absent / needs bridge  | any   | reverse creation + audio chunk   |
//!
//! The engine never retries. Deferred delivery is driven by
//! [`QueueFlusher`](crate::flusher::QueueFlusher) re-submitting pending
//! records with `is_retry = true`.
//!
//! The optional deadline covers the identity lookups and platform posts of
//! one attempt. Enqueueing runs outside it: an insert cut short could still
//! land, and the caller would see `Failed` for a record that was queued.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::audio::normalize_audio_url;
use crate::error::{BridgeError, Result};
use crate::identity::{lookup_identity_pair, IdentityStore};
use crate::pending::PendingVoicemailStore;
use crate::poster::{ConversationPoster, StreamFields};
use crate::types::{AccountId, DeliveryOutcome, NewPendingVoicemail, ANONYMOUS_CALLER, NEW_STREAM};

/// Reason attached to streams created on behalf of an unregistered caller
const VOICEMAIL_REASON: &str = "voicemail";

/// Decides how a voicemail reaches the platform
pub struct DeliveryEngine {
    identities: Arc<dyn IdentityStore>,
    pending: Arc<dyn PendingVoicemailStore>,
    poster: Arc<dyn ConversationPoster>,
    /// Upper bound for a whole attempt, including every network call
    deadline: Option<Duration>,
}

impl DeliveryEngine {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        pending: Arc<dyn PendingVoicemailStore>,
        poster: Arc<dyn ConversationPoster>,
    ) -> Self {
        Self {
            identities,
            pending,
            poster,
            deadline: None,
        }
    }

    /// Bound the lookups and posts of every attempt by `deadline`
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// The queue this engine parks undeliverable voicemails in
    pub fn pending_store(&self) -> Arc<dyn PendingVoicemailStore> {
        self.pending.clone()
    }

    /// Deliver a voicemail from `from` to `to`.
    ///
    /// `is_retry` marks a re-drive of an already queued voicemail; such an
    /// attempt never queues again.
    pub async fn deliver(&self, from: &str, to: &str, audio_url: &str, is_retry: bool) -> DeliveryOutcome {
        let started = Instant::now();
        let outcome = self
            .attempt(from, to, audio_url, is_retry, started)
            .await
            .unwrap_or_else(DeliveryOutcome::Failed);
        match &outcome {
            DeliveryOutcome::Delivered { conversation_id } => {
                info!(from, to, conversation_id, is_retry, "Delivered voicemail");
            }
            DeliveryOutcome::QueuedPending(id) => {
                info!(from, to, pending_id = id, "Receiver doesn't have an account, stored pending voicemail");
            }
            DeliveryOutcome::Failed(err) => {
                warn!(from, to, is_retry, kind = err.kind(), error = %err, "Voicemail delivery failed");
            }
        }
        outcome
    }

    /// Run `step` against what is left of the attempt deadline
    async fn bounded<T>(&self, started: Instant, step: impl Future<Output = Result<T>>) -> Result<T> {
        let Some(deadline) = self.deadline else {
            return step.await;
        };
        tokio::time::timeout_at(started + deadline, step)
            .await
            .map_err(|_| BridgeError::transport(format!("delivery exceeded {:?} deadline", deadline)))?
    }

    async fn attempt(
        &self,
        from: &str,
        to: &str,
        audio_url: &str,
        is_retry: bool,
        started: Instant,
    ) -> Result<DeliveryOutcome> {
        if to.is_empty() {
            return Err(BridgeError::invalid_request("empty recipient (did someone call us?)"));
        }
        let from = if from.is_empty() { ANONYMOUS_CALLER } else { from };
        let audio_url = normalize_audio_url(audio_url);

        let (from_identity, to_identity) = self
            .bounded(started, lookup_identity_pair(self.identities.as_ref(), from, to))
            .await?;

        let Some(to_account) = to_identity.as_ref().and_then(|identity| identity.direct_account()) else {
            if is_retry {
                // Already in the queue; queueing again would duplicate it.
                return Err(BridgeError::PersistentNonDelivery { to: to.to_string() });
            }
            let id = self
                .pending
                .enqueue(NewPendingVoicemail {
                    from: from.to_string(),
                    to: to.to_string(),
                    audio_url,
                })
                .await
                .map_err(|e| BridgeError::storage(format!("receiver {} doesn't have an account, failed to store pending voicemail: {}", to, e)))?;
            return Ok(DeliveryOutcome::QueuedPending(id));
        };

        if let Some(from_account) = from_identity.as_ref().and_then(|identity| identity.direct_account()) {
            debug!(%from_account, %to_account, "Posting voicemail between linked accounts");
            let mut fields = StreamFields::new();
            fields.insert("participant", to_account.to_string());
            fields.insert("audio_url", audio_url);
            let stream = self
                .bounded(started, self.poster.post_to_conversation(from_account, NEW_STREAM, fields))
                .await?;
            return Ok(DeliveryOutcome::Delivered { conversation_id: stream.id });
        }

        self.deliver_reverse(from, to_account, audio_url, started).await
    }

    /// Sender has no account: create the stream as the recipient first, then
    /// post the audio as whoever the platform resolved the caller to.
    async fn deliver_reverse(
        &self,
        from: &str,
        to_account: AccountId,
        audio_url: String,
        started: Instant,
    ) -> Result<DeliveryOutcome> {
        let mut fields = StreamFields::new();
        fields.insert("participant", from.to_string());
        fields.insert("reason", VOICEMAIL_REASON.to_string());
        let stream = self
            .bounded(started, self.poster.post_to_conversation(to_account, NEW_STREAM, fields))
            .await?;

        // No other participant means the recipient left themselves a voicemail.
        let acting = stream.others.first().map(|p| p.id).unwrap_or(to_account);
        debug!(stream_id = stream.id, %acting, %to_account, "Created stream in reverse");

        let mut fields = StreamFields::new();
        fields.insert("audio_url", audio_url);
        self.bounded(started, self.poster.post_to_conversation(acting, stream.id, fields))
            .await
            .map_err(|e| {
                warn!(stream_id = stream.id, %acting, "Stream exists without audio after failed chunk post");
                match e {
                    BridgeError::Transport(msg) => BridgeError::transport(format!("stream {}: {}", stream.id, msg)),
                    other => other,
                }
            })?;
        Ok(DeliveryOutcome::Delivered { conversation_id: stream.id })
    }
}
