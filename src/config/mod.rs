//! Configuration management for AVR MQTT GW
//!
//! Handles loading, parsing, and validating YAML configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::topics::{Channel, TopicRegistry};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    pub mqtt: MqttConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<TopicsConfig>,
}

/// AV receiver connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_host")]
    pub host: String,
    #[serde(default = "default_device_port")]
    pub port: u16,
    /// Device identifier; selects the `/meem/<id>/` topic root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// MQTT broker connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u16,
}

/// Per-channel topic overrides
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TopicsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<TopicOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<TopicOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute: Option<TopicOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<TopicOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<TopicOverride>,
}

/// Replacement inbound and/or outbound topic for one channel
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TopicOverride {
    #[serde(rename = "in")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound: Option<String>,
    #[serde(rename = "out")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound: Option<String>,
}

impl TopicsConfig {
    pub fn get(&self, channel: Channel) -> Option<&TopicOverride> {
        match channel {
            Channel::Power => self.power.as_ref(),
            Channel::Volume => self.volume.as_ref(),
            Channel::Mute => self.mute.as_ref(),
            Channel::Source => self.source.as_ref(),
            Channel::Sources => self.sources.as_ref(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: default_device_host(),
            port: default_device_port(),
            id: None,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            mqtt: MqttConfig::default(),
            topics: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Resolve the topic names this configuration describes
    pub fn topic_registry(&self) -> TopicRegistry {
        TopicRegistry::new(self.device.id.as_deref(), self.topics.as_ref())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.device.host.is_empty() {
            anyhow::bail!("device host cannot be empty");
        }
        if self.device.port == 0 {
            anyhow::bail!("device port cannot be 0");
        }
        if let Some(id) = &self.device.id {
            if id.contains(['/', '+', '#', '?']) {
                anyhow::bail!("device id '{}' contains a reserved topic character", id);
            }
        }

        if self.mqtt.host.is_empty() {
            anyhow::bail!("mqtt host cannot be empty");
        }
        if self.mqtt.port == 0 {
            anyhow::bail!("mqtt port cannot be 0");
        }
        if self.mqtt.username.is_some() != self.mqtt.password.is_some() {
            anyhow::bail!("mqtt username and password must be set together");
        }

        if let Some(topics) = &self.topics {
            if topics.sources.as_ref().is_some_and(|s| s.inbound.is_some()) {
                anyhow::bail!("the sources channel has no inbound topic");
            }
        }

        self.topic_registry()
            .validate()
            .context("Invalid topic configuration")?;

        Ok(())
    }
}

// Default value functions
fn default_device_host() -> String { "192.168.0.9".to_string() }
fn default_device_port() -> u16 { 23 }
fn default_mqtt_host() -> String { "192.168.0.23".to_string() }
fn default_mqtt_port() -> u16 { 1883 }
fn default_keep_alive() -> u16 { 300 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_minimal_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("avr.yaml");
        std::fs::write(
            &path,
            r#"
mqtt:
  host: "broker.local"
"#,
        )?;

        let config = AppConfig::load(&path.to_string_lossy()).await?;
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.keep_alive_secs, 300);
        assert_eq!(config.device.host, "192.168.0.9");
        assert_eq!(config.device.port, 23);
        assert_eq!(config.topic_registry().root(), "/house/lounge/avr/");
        Ok(())
    }

    #[tokio::test]
    async fn test_load_full_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("avr.yaml");
        std::fs::write(
            &path,
            r#"
device:
  host: "10.0.0.5"
  port: 8102
  id: "f00d"
mqtt:
  host: "10.0.0.2"
  port: 1884
  username: "avr"
  password: "secret"
topics:
  power:
    in: "lounge/amp/power/set"
  sources:
    out: "lounge/amp/inputs"
"#,
        )?;

        let config = AppConfig::load(&path.to_string_lossy()).await?;
        let topics = config.topic_registry();
        assert_eq!(topics.root(), "/meem/f00d/");
        assert_eq!(topics.inbound(Channel::Power), Some("lounge/amp/power/set"));
        assert_eq!(topics.outbound(Channel::Power), "/meem/f00d/power/out");
        assert_eq!(topics.outbound(Channel::Sources), "lounge/amp/inputs");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_mqtt_section_is_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("avr.yaml");
        std::fs::write(&path, "device:\n  host: \"10.0.0.5\"\n")?;

        assert!(AppConfig::load(&path.to_string_lossy()).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_then_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("saved.yaml");
        let mut config = AppConfig::default();
        config.device.id = Some("abc".to_string());

        config.save(&path.to_string_lossy()).await?;
        let loaded = AppConfig::load(&path.to_string_lossy()).await?;
        assert_eq!(loaded.device.id.as_deref(), Some("abc"));
        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.mqtt.host.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.device.id = Some("a/b".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.mqtt.username = Some("user".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.topics = Some(TopicsConfig {
            sources: Some(TopicOverride {
                inbound: Some("x/in".to_string()),
                outbound: None,
            }),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }
}
