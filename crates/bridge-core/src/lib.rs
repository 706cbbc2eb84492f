//! # VMBridge-Core
//!
//! Turns forwarded-call voicemail recordings into platform conversations.
//!
//! This crate provides:
//! - Identity lookup of both call parties by phone number
//! - A durable queue of voicemails whose recipient has no linked account
//! - A platform client that creates streams and appends audio chunks
//! - The delivery decision engine tying these together
//! - A flusher that re-drives queued voicemails
//!
//! ## Architecture
//!
//! Collaborators are traits ([`IdentityStore`], [`PendingVoicemailStore`],
//! [`ConversationPoster`], [`Notifier`]) constructed once at startup and
//! handed to [`DeliveryEngine`] as `Arc<dyn ...>`. Tests swap in
//! [`MemoryStore`] and fake posters.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod flusher;
pub mod identity;
pub mod logging;
pub mod notify;
pub mod pending;
pub mod poster;
pub mod store;
pub mod types;

pub use audio::normalize_audio_url;
pub use config::BridgeConfig;
pub use engine::DeliveryEngine;
pub use error::{BridgeError, Result};
pub use flusher::{FlushReport, QueueFlusher};
pub use identity::{lookup_identity_pair, IdentityStore};
pub use notify::{Notifier, TwilioSmsNotifier};
pub use pending::PendingVoicemailStore;
pub use poster::{ConversationPoster, HttpConversationPoster, StreamFields};
pub use store::{MemoryStore, SqliteStore};
pub use types::{
    AccountId, DeliveryOutcome, Identity, NewPendingVoicemail, Participant, PendingId, PendingVoicemail, Stream,
    ANONYMOUS_CALLER,
};
