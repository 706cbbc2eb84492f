//! HTTP surface of the voicemail bridge

pub mod call;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tokio_util::task::TaskTracker;
use tower_http::LatencyUnit;
use tracing::{info, warn, Level};
use vmbridge_core::{
    BridgeConfig, DeliveryEngine, HttpConversationPoster, Notifier, QueueFlusher, Result, SqliteStore,
    TwilioSmsNotifier,
};

/// SMS sent to recipients whose voicemail had to be queued
#[derive(Clone)]
pub struct Advisory {
    pub notifier: Arc<dyn Notifier>,
    pub message: String,
}

/// Shared handler state; every collaborator is built once at startup
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DeliveryEngine>,
    pub flusher: Arc<QueueFlusher>,
    pub advisory: Option<Advisory>,
    /// Webhook deliveries still running after their `200` went out
    pub tracker: TaskTracker,
}

impl AppState {
    pub fn new(engine: Arc<DeliveryEngine>, advisory: Option<Advisory>) -> Self {
        let flusher = Arc::new(QueueFlusher::new(engine.clone()));
        Self {
            engine,
            flusher,
            advisory,
            tracker: TaskTracker::new(),
        }
    }

    /// Wait for tracked webhook deliveries to finish.
    ///
    /// Returns `false` if `limit` expired first; the remaining tasks are
    /// dropped with the runtime.
    pub async fn drain_deliveries(&self, limit: Option<Duration>) -> bool {
        self.tracker.close();
        if self.tracker.is_empty() {
            return true;
        }
        info!(in_flight = self.tracker.len(), "Waiting for voicemail deliveries");
        match limit {
            Some(limit) => match tokio::time::timeout(limit, self.tracker.wait()).await {
                Ok(()) => true,
                Err(_) => {
                    warn!(in_flight = self.tracker.len(), "Gave up waiting for voicemail deliveries");
                    false
                }
            },
            None => {
                self.tracker.wait().await;
                true
            }
        }
    }

    /// Wire the SQLite store, platform client and optional SMS notifier
    pub async fn from_config(config: &BridgeConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::connect(&config.database.url, config.database.max_connections).await?);
        let poster = Arc::new(HttpConversationPoster::new(&config.platform)?);
        let engine = DeliveryEngine::new(store.clone(), store, poster).with_deadline(config.delivery.deadline());

        let advisory = match &config.sms {
            Some(sms) if sms.notify_on_queue => Some(Advisory {
                notifier: Arc::new(TwilioSmsNotifier::new(sms, config.platform.request_timeout())?),
                message: sms.advisory_message.clone(),
            }),
            _ => None,
        };

        Ok(Self::new(Arc::new(engine), advisory))
    }
}

/// Create the webhook router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/call", get(call::incoming_call).post(call::recording_completed))
        .route("/v1/flush", post(call::flush_pending))
        .route("/health", get(call::health))
        .layer(
            TraceLayer::new_for_http().on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
        )
        .with_state(state)
}
