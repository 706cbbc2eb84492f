//! Shared fakes for the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use vmbridge_core::{
    AccountId, BridgeError, ConversationPoster, DeliveryEngine, Identity, IdentityStore, MemoryStore,
    NewPendingVoicemail, Participant, PendingId, PendingVoicemail, PendingVoicemailStore, Result, Stream,
    StreamFields,
};

pub const CALLER: &str = "+15551230000";
pub const CALLEE: &str = "+15559998888";
pub const RECORDING: &str = "https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/rec123";
pub const RECORDING_MP3: &str = "https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/rec123.mp3";

/// One call made to the fake poster
#[derive(Debug, Clone, PartialEq)]
pub struct PostCall {
    pub acting: AccountId,
    pub conversation_id: i64,
    pub fields: StreamFields,
}

impl PostCall {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Poster that records every call and replays scripted responses.
///
/// Once the script runs out it answers with a stream whose id is 500 plus
/// the call index and no other participants.
#[derive(Default)]
pub struct RecordingPoster {
    calls: Mutex<Vec<PostCall>>,
    script: Mutex<VecDeque<Result<Stream>>>,
}

impl RecordingPoster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond_with(&self, response: Result<Stream>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<PostCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationPoster for RecordingPoster {
    async fn post_to_conversation(
        &self,
        acting: AccountId,
        conversation_id: i64,
        fields: StreamFields,
    ) -> Result<Stream> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(PostCall {
                acting,
                conversation_id,
                fields,
            });
            calls.len() as i64
        };
        match self.script.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(Stream {
                id: 500 + index,
                others: Vec::new(),
            }),
        }
    }
}

/// Store wrapper counting every identity lookup and enqueue
#[derive(Clone, Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    lookups: Arc<AtomicUsize>,
    enqueues: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn enqueues(&self) -> usize {
        self.enqueues.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityStore for CountingStore {
    async fn find_identity(&self, phone: &str) -> Result<Option<Identity>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_identity(phone).await
    }
}

#[async_trait]
impl PendingVoicemailStore for CountingStore {
    async fn enqueue(&self, voicemail: NewPendingVoicemail) -> Result<PendingId> {
        self.enqueues.fetch_add(1, Ordering::SeqCst);
        self.inner.enqueue(voicemail).await
    }

    async fn mark_delivered(&self, id: PendingId) -> Result<()> {
        self.inner.mark_delivered(id).await
    }

    fn query_undelivered(&self) -> BoxStream<'_, Result<(PendingId, PendingVoicemail)>> {
        self.inner.query_undelivered()
    }
}

/// Store whose backend is down
pub struct UnavailableStore;

#[async_trait]
impl IdentityStore for UnavailableStore {
    async fn find_identity(&self, _phone: &str) -> Result<Option<Identity>> {
        Err(BridgeError::storage("datastore unavailable"))
    }
}

#[async_trait]
impl PendingVoicemailStore for UnavailableStore {
    async fn enqueue(&self, _voicemail: NewPendingVoicemail) -> Result<PendingId> {
        Err(BridgeError::storage("datastore unavailable"))
    }

    async fn mark_delivered(&self, _id: PendingId) -> Result<()> {
        Err(BridgeError::storage("datastore unavailable"))
    }

    fn query_undelivered(&self) -> BoxStream<'_, Result<(PendingId, PendingVoicemail)>> {
        stream::iter(vec![Err(BridgeError::storage("datastore unavailable"))]).boxed()
    }
}

pub fn stream_with_other(id: i64, other: i64) -> Stream {
    Stream {
        id,
        others: vec![Participant { id: AccountId(other) }],
    }
}

/// Engine over a counting in-memory store and a recording poster
pub fn engine_with(store: &CountingStore, poster: &Arc<RecordingPoster>) -> DeliveryEngine {
    DeliveryEngine::new(Arc::new(store.clone()), Arc::new(store.clone()), poster.clone())
}
