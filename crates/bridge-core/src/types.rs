//! Core types for the voicemail bridge

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Caller placeholder used when the provider withholds the sender number.
pub const ANONYMOUS_CALLER: &str = "unknownuser";

/// Platform account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to a pending voicemail by the store
pub type PendingId = i64;

/// Stream id meaning "create a new stream"
pub const NEW_STREAM: i64 = 0;

/// Linkage between a phone number and a platform account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub account: Option<AccountId>,
    /// Stored as `available`: true means the account has no phone number able
    /// to take calls directly, so voicemail must go through the bridge.
    #[serde(rename = "available")]
    pub needs_voicemail_bridge: bool,
    #[serde(default)]
    pub status: String,
}

impl Identity {
    /// An identity whose account takes calls directly.
    pub fn linked(account: AccountId) -> Self {
        Self {
            account: Some(account),
            needs_voicemail_bridge: false,
            status: String::new(),
        }
    }

    /// An identity that still needs voicemail bridging.
    pub fn unlinked(account: AccountId) -> Self {
        Self {
            account: Some(account),
            needs_voicemail_bridge: true,
            status: String::new(),
        }
    }

    /// The account to address directly, if any.
    pub fn direct_account(&self) -> Option<AccountId> {
        if self.needs_voicemail_bridge {
            None
        } else {
            self.account
        }
    }
}

/// A voicemail waiting for its recipient to link an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVoicemail {
    pub from: String,
    pub to: String,
    pub audio_url: String,
    #[serde(default)]
    pub delivered: bool,
}

/// Request to store a new pending voicemail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPendingVoicemail {
    pub from: String,
    pub to: String,
    pub audio_url: String,
}

impl From<NewPendingVoicemail> for PendingVoicemail {
    fn from(new: NewPendingVoicemail) -> Self {
        Self {
            from: new.from,
            to: new.to,
            audio_url: new.audio_url,
            delivered: false,
        }
    }
}

/// Stream participant other than the acting account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: AccountId,
}

/// Conversation on the platform
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stream {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub others: Vec<Participant>,
}

/// Result of a single delivery attempt
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Audio landed in a conversation
    Delivered { conversation_id: i64 },
    /// Recipient unreachable, voicemail parked in the pending queue
    QueuedPending(PendingId),
    /// Attempt failed; nothing was queued
    Failed(BridgeError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}
