//! Configuration for the voicemail bridge
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file, and `VMBRIDGE__<SECTION>__<KEY>` environment variables.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "VMBRIDGE";

/// Advisory sent to recipients who have not linked their phone number yet
pub const DEFAULT_ADVISORY_MESSAGE: &str = "You have a new voicemail. First, please verify your \
phone number to listen: open the app, go to Settings > Connect accounts > Add phone number.";

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub platform: PlatformConfig,
    pub delivery: DeliveryConfig,
    pub flush: FlushConfig,
    pub sms: Option<SmsConfig>,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Platform conversation API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Base URL the `streams` paths are resolved against
    pub api_url: String,
    /// Bearer credential used for every request
    pub access_token: String,
    pub request_timeout_secs: u64,
}

/// Delivery engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// End-to-end deadline for one delivery attempt (0 = unbounded)
    pub timeout_secs: u64,
}

/// Pending queue flusher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    /// Seconds between scheduled flushes (0 disables the schedule)
    pub interval_secs: u64,
}

/// Outbound SMS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    /// Provider Messages endpoint, including the account path
    pub messages_url: String,
    pub from_number: String,
    pub key_sid: String,
    pub key_secret: String,
    #[serde(default = "default_advisory_message")]
    pub advisory_message: String,
    #[serde(default = "default_true")]
    pub notify_on_queue: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
}

fn default_advisory_message() -> String {
    DEFAULT_ADVISORY_MESSAGE.to_string()
}

fn default_true() -> bool {
    true
}

impl BridgeConfig {
    /// Load configuration from an optional file plus environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.platform.access_token.trim().is_empty() {
            return Err(BridgeError::config("platform.access_token must be set"));
        }
        if self.platform.api_url.trim().is_empty() {
            return Err(BridgeError::config("platform.api_url must be set"));
        }
        if let Some(sms) = &self.sms {
            if sms.key_sid.is_empty() || sms.key_secret.is_empty() {
                return Err(BridgeError::config("sms.key_sid and sms.key_secret must be set"));
            }
            if sms.from_number.is_empty() {
                return Err(BridgeError::config("sms.from_number must be set"));
            }
        }
        Ok(())
    }
}

impl PlatformConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DeliveryConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl FlushConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://vmbridge.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.rogertalk.com/v17/".to_string(),
            access_token: String::new(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let file = write_config(
            r#"
            [platform]
            access_token = "secret"
            "#,
        );
        let config = BridgeConfig::load(file.path()).unwrap();

        assert_eq!(config.platform.access_token, "secret");
        assert_eq!(config.platform.api_url, "https://api.rogertalk.com/v17/");
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.flush.interval(), Some(Duration::from_secs(300)));
        assert_eq!(config.delivery.deadline(), Some(Duration::from_secs(30)));
        assert!(config.sms.is_none());
    }

    #[test]
    fn sms_section_gets_advisory_defaults() {
        let file = write_config(
            r#"
            [platform]
            access_token = "secret"

            [sms]
            messages_url = "https://api.twilio.com/2010-04-01/Accounts/AC1/Messages"
            from_number = "+14427776437"
            key_sid = "SK1"
            key_secret = "shh"
            "#,
        );
        let config = BridgeConfig::load(file.path()).unwrap();
        let sms = config.sms.unwrap();

        assert!(sms.notify_on_queue);
        assert_eq!(sms.advisory_message, DEFAULT_ADVISORY_MESSAGE);
    }

    #[test]
    fn missing_access_token_is_rejected() {
        let err = BridgeConfig::default().validate().unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn zero_disables_schedule_and_deadline() {
        let config = BridgeConfig {
            delivery: DeliveryConfig { timeout_secs: 0 },
            flush: FlushConfig { interval_secs: 0 },
            ..Default::default()
        };
        assert!(config.delivery.deadline().is_none());
        assert!(config.flush.interval().is_none());
    }
}
