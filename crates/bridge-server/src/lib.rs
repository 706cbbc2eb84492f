//! # VMBridge-Server
//!
//! Webhook listener for the telephony provider. Forwarded calls get a static
//! "leave a message" prompt; finished recordings are handed to the
//! [`DeliveryEngine`](vmbridge_core::DeliveryEngine).

pub mod api;

pub use api::{create_router, Advisory, AppState};
