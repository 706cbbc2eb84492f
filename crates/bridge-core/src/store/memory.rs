//! In-memory identity and pending voicemail store

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{BridgeError, Result};
use crate::identity::IdentityStore;
use crate::pending::PendingVoicemailStore;
use crate::types::{Identity, NewPendingVoicemail, PendingId, PendingVoicemail};

/// In-memory store
///
/// Clones share the same maps, so a test can hold one handle while the engine
/// owns another.
///
/// ```
/// use vmbridge_core::{AccountId, Identity, IdentityStore, MemoryStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// store.upsert_identity("+15550001111", Identity::linked(AccountId(7)));
///
/// let found = store.find_identity("+15550001111").await.unwrap();
/// assert_eq!(found.and_then(|i| i.direct_account()), Some(AccountId(7)));
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// Map of phone number to identity
    identities: Arc<DashMap<String, Identity>>,
    /// Map of pending id to voicemail
    pending: Arc<DashMap<PendingId, PendingVoicemail>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the identity for a phone number
    pub fn upsert_identity(&self, phone: &str, identity: Identity) {
        self.identities.insert(phone.to_string(), identity);
    }

    /// Get a pending voicemail regardless of its delivery state
    pub fn pending(&self, id: PendingId) -> Option<PendingVoicemail> {
        self.pending.get(&id).map(|entry| entry.clone())
    }

    /// Every pending voicemail ever stored, ordered by id
    pub fn all_pending(&self) -> Vec<(PendingId, PendingVoicemail)> {
        let mut all: Vec<_> = self
            .pending
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_identity(&self, phone: &str) -> Result<Option<Identity>> {
        Ok(self.identities.get(phone).map(|entry| entry.clone()))
    }
}

#[async_trait]
impl PendingVoicemailStore for MemoryStore {
    async fn enqueue(&self, voicemail: NewPendingVoicemail) -> Result<PendingId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.insert(id, voicemail.into());
        Ok(id)
    }

    async fn mark_delivered(&self, id: PendingId) -> Result<()> {
        match self.pending.get_mut(&id) {
            Some(mut entry) => {
                entry.delivered = true;
                Ok(())
            }
            None => Err(BridgeError::storage(format!("pending voicemail {} not found", id))),
        }
    }

    fn query_undelivered(&self) -> BoxStream<'_, Result<(PendingId, PendingVoicemail)>> {
        let snapshot: Vec<_> = self
            .all_pending()
            .into_iter()
            .filter(|(_, voicemail)| !voicemail.delivered)
            .map(Ok)
            .collect();
        stream::iter(snapshot).boxed()
    }
}
