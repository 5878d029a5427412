//! Controller configuration loaded from TOML.
//!
//! ```toml
//! scan_seconds = 5
//! max_links = 5
//!
//! [retry]
//! attempts = 3
//!
//! [gen2]
//! filter = true
//! allow = ["AA:BB:CC:DD:EE:FF"]
//!
//! [mqtt]
//! enabled = true
//! server = "192.168.1.10"
//!
//! [[identity]]
//! label = "C21347"
//! full_id = "3BBF1347"
//! name = "Room 1 Master"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::{DEFAULT_ATTEMPTS, RetryPolicy};
use crate::discovery::Gen2Filter;
use crate::dispatch::{DEFAULT_MAX_LINKS, DispatchSettings, MAX_LINKS_LIMIT};
use crate::error::{Error, Result, millis};
use crate::transport::LinkOptions;
use crate::trigger::{DEFAULT_BASE_TOPIC, Topics};
use crate::types::{FullId, Identity, IdentityRegistry};

/// Default messaging broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Scan window in seconds. `0` scans until the radio ends the scan.
    pub scan_seconds: u64,
    /// Maximum discovered devices and concurrent links.
    pub max_links: usize,
    /// Pause between two devices, in milliseconds.
    pub inter_command_delay_ms: u64,
    /// Timeout of service discovery and of one write, in milliseconds.
    pub write_timeout_ms: u64,
    /// Connection retry policy.
    pub retry: RetryConfig,
    /// Version 2 address allow-list.
    pub gen2: Gen2Filter,
    /// Messaging broker settings.
    pub mqtt: MqttConfig,
    /// Configured version 1 base stations, in matching order.
    #[serde(rename = "identity")]
    pub identities: Vec<Identity>,
}

/// Connection retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub settle_ms: u64,
    pub attempt_timeout_ms: u64,
}

/// Messaging broker settings.
///
/// The messaging client itself lives outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    pub server: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Base topic.
    pub topic: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: DEFAULT_ATTEMPTS,
            settle_ms: millis(policy.settle_delay),
            attempt_timeout_ms: millis(policy.attempt_timeout),
        }
    }
}

impl RetryConfig {
    /// Converts to a retry policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            settle_delay: Duration::from_millis(self.settle_ms),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: String::new(),
            port: DEFAULT_MQTT_PORT,
            username: None,
            password: None,
            topic: DEFAULT_BASE_TOPIC.to_string(),
        }
    }
}

impl MqttConfig {
    /// Returns true if a client should connect.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.server.is_empty()
    }

    /// Returns the topic names for this configuration.
    #[must_use]
    pub fn topics(&self) -> Topics {
        Topics::new(self.topic.as_str())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let settings = DispatchSettings::default();
        Self {
            scan_seconds: settings.scan_window.map_or(0, |w| w.as_secs()),
            max_links: DEFAULT_MAX_LINKS,
            inter_command_delay_ms: millis(settings.inter_command_delay),
            write_timeout_ms: millis(settings.write_timeout),
            retry: RetryConfig::default(),
            gen2: Gen2Filter::default(),
            mqtt: MqttConfig::default(),
            identities: stock_identities(),
        }
    }
}

/// The two master base stations the controller ships with.
fn stock_identities() -> Vec<Identity> {
    vec![
        Identity::new("C21347", FullId::new(0x3BBF_1347), "Room 1 Master"),
        Identity::new("F862BD", FullId::new(0x6BC1_62BD), "Room 2 Master"),
    ]
}

impl ControllerConfig {
    /// Load configuration from a file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        tracing::debug!("loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Write the default configuration to a file
    pub async fn create_default(path: impl AsRef<Path>) -> Result<()> {
        let content = Self::default().to_toml_string()?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.validate()?;
        for identity in &mut config.identities {
            *identity = Identity::new(
                std::mem::take(&mut identity.label),
                identity.full_id,
                std::mem::take(&mut identity.name),
            );
        }
        Ok(config)
    }

    /// Serializes to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks limits that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_LINKS_LIMIT).contains(&self.max_links) {
            return Err(Error::Config {
                message: format!(
                    "max_links must be between 1 and {MAX_LINKS_LIMIT}, got {}",
                    self.max_links
                ),
            });
        }
        if self.identities.len() > self.max_links {
            return Err(Error::Config {
                message: format!(
                    "{} identities configured but max_links is {}",
                    self.identities.len(),
                    self.max_links
                ),
            });
        }
        if self.retry.attempts == 0 {
            return Err(Error::Config {
                message: "retry.attempts must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Returns the scan window. `None` for an unbounded scan.
    #[must_use]
    pub const fn scan_window(&self) -> Option<Duration> {
        match self.scan_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }

    /// Builds the identity registry.
    #[must_use]
    pub fn registry(&self) -> IdentityRegistry {
        IdentityRegistry::new(self.identities.clone())
    }

    /// Builds the dispatch settings.
    #[must_use]
    pub fn settings(&self) -> DispatchSettings {
        DispatchSettings {
            scan_window: self.scan_window(),
            max_links: self.max_links,
            retry: self.retry.policy(),
            inter_command_delay: Duration::from_millis(self.inter_command_delay_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            link: LinkOptions::default(),
            gen2: self.gen2.clone(),
        }
    }
}
