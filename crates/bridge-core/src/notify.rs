//! Outbound SMS notifications

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::SmsConfig;
use crate::error::{BridgeError, Result};

/// Sends a text message to a phone number.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_sms(&self, to: &str, message: &str) -> Result<()>;
}

/// Twilio-compatible Messages API client
pub struct TwilioSmsNotifier {
    client: Client,
    messages_url: Url,
    from_number: String,
    key_sid: String,
    key_secret: String,
}

impl TwilioSmsNotifier {
    pub fn new(config: &SmsConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            messages_url: Url::parse(&config.messages_url)?,
            from_number: config.from_number.clone(),
            key_sid: config.key_sid.clone(),
            key_secret: config.key_secret.clone(),
        })
    }
}

#[async_trait]
impl Notifier for TwilioSmsNotifier {
    async fn send_sms(&self, to: &str, message: &str) -> Result<()> {
        debug!(to, "Sending SMS");
        let response = self
            .client
            .post(self.messages_url.clone())
            .basic_auth(&self.key_sid, Some(&self.key_secret))
            .form(&[("From", self.from_number.as_str()), ("To", to), ("Body", message)])
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(BridgeError::NotificationRejected {
                path: self.messages_url.path().to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
