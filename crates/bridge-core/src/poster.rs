//! Posting audio into platform conversations

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::PlatformConfig;
use crate::error::{BridgeError, Result};
use crate::types::{AccountId, Stream, NEW_STREAM};

/// Form fields sent with a stream request (`participant`, `audio_url`, `reason`...)
pub type StreamFields = BTreeMap<&'static str, String>;

/// Creates streams or appends chunks on behalf of an account.
#[async_trait]
pub trait ConversationPoster: Send + Sync {
    /// `conversation_id == 0` creates a new stream owned by `acting`;
    /// anything else appends to that stream.
    async fn post_to_conversation(
        &self,
        acting: AccountId,
        conversation_id: i64,
        fields: StreamFields,
    ) -> Result<Stream>;
}

/// Path of a stream request relative to the API root
pub fn stream_path(conversation_id: i64) -> String {
    if conversation_id > NEW_STREAM {
        format!("streams/{}/chunks", conversation_id)
    } else {
        "streams".to_string()
    }
}

/// Platform API client
#[derive(Clone)]
pub struct HttpConversationPoster {
    client: Client,
    api_url: Url,
    access_token: String,
}

impl HttpConversationPoster {
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Self::with_client(client, &config.api_url, &config.access_token)
    }

    /// Build on top of an existing HTTP client
    pub fn with_client(client: Client, api_url: &str, access_token: &str) -> Result<Self> {
        // Relative paths only resolve under the API root when it ends in '/'.
        let mut base = api_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client,
            api_url: Url::parse(&base)?,
            access_token: access_token.to_string(),
        })
    }
}

#[async_trait]
impl ConversationPoster for HttpConversationPoster {
    async fn post_to_conversation(
        &self,
        acting: AccountId,
        conversation_id: i64,
        fields: StreamFields,
    ) -> Result<Stream> {
        let url = self.api_url.join(&stream_path(conversation_id))?;
        debug!(path = url.path(), account_id = %acting, "Posting to stream");

        let response = self
            .client
            .post(url.clone())
            .query(&[("on_behalf_of", acting.to_string())])
            .bearer_auth(&self.access_token)
            .form(&fields)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(BridgeError::RemoteRejected {
                path: url.path().to_string(),
                account_id: acting,
                status: status.as_u16(),
            });
        }

        Ok(response.json::<Stream>().await?)
    }
}
