//! Telephony webhook handlers

use std::collections::HashMap;

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Form,
};
use serde::Deserialize;
use tracing::{info, warn};
use vmbridge_core::{normalize_audio_url, DeliveryOutcome, FlushReport};

use super::AppState;

/// Call-control document returned when a forwarded call comes in
pub const CALL_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
	<Say>Please leave a message after the tone.</Say>
	<Record maxLength="30" />
	<Say>Sorry, no message could be recorded.</Say>
</Response>"#;

/// Recording callback posted once the caller hangs up
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingCallback {
    #[serde(rename = "From", default)]
    pub from: String,
    /// Number the call was originally placed to
    #[serde(rename = "ForwardedFrom", default)]
    pub forwarded_from: String,
    #[serde(rename = "RecordingUrl", default)]
    pub recording_url: String,
}

impl RecordingCallback {
    /// Recording URL as it will be posted to the platform
    pub fn audio_url(&self) -> String {
        normalize_audio_url(&self.recording_url)
    }
}

/// GET requests don't contain the recording; answer with the static prompt.
pub async fn incoming_call(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    info!(?params, "Incoming call");
    ([(header::CONTENT_TYPE, "text/xml")], CALL_RESPONSE)
}

/// Accept a finished recording and deliver it in the background.
///
/// The provider always gets `200`; outcomes only show up in the logs. The
/// delivery task is tracked so shutdown can wait for it.
pub async fn recording_completed(
    State(state): State<AppState>,
    form: Result<Form<RecordingCallback>, FormRejection>,
) -> StatusCode {
    let Form(callback) = match form {
        Ok(form) => form,
        Err(e) => {
            warn!(error = %e, "Failed to parse body");
            return StatusCode::OK;
        }
    };

    info!("{} -> {} ({})", callback.from, callback.forwarded_from, callback.audio_url());
    let tracker = state.tracker.clone();
    tracker.spawn(async move {
        state.deliver_voicemail(callback).await;
    });
    StatusCode::OK
}

/// Run one flush cycle on demand
pub async fn flush_pending(State(state): State<AppState>) -> Json<FlushReport> {
    Json(state.flusher.flush_pending().await)
}

pub async fn health() -> &'static str {
    "ok"
}

impl AppState {
    /// Deliver a fresh voicemail and send the advisory SMS if it got queued
    pub async fn deliver_voicemail(&self, callback: RecordingCallback) {
        let outcome = self
            .engine
            .deliver(&callback.from, &callback.forwarded_from, &callback.recording_url, false)
            .await;

        let DeliveryOutcome::QueuedPending(pending_id) = outcome else {
            return;
        };
        let Some(advisory) = &self.advisory else {
            return;
        };
        match advisory.notifier.send_sms(&callback.forwarded_from, &advisory.message).await {
            Ok(()) => info!(pending_id, to = %callback.forwarded_from, "Sent voicemail advisory SMS"),
            Err(e) => warn!(pending_id, to = %callback.forwarded_from, error = %e, "Failed to send advisory SMS"),
        }
    }
}
