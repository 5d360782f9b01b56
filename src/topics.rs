//! Topic registry - derives the MQTT topic names for every channel
//!
//! Topics are computed once from configuration and shared read-only by the
//! bridge. Each channel has an inbound (control) topic and an outbound
//! (state) topic; `sources` is outbound only. Appending [`QUERY_SUFFIX`] to an
//! outbound topic forms the query topic used to request the cached value.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::TopicsConfig;
use crate::error::{BridgeError, Result};

/// Marker appended to an outbound topic to request its current value
pub const QUERY_SUFFIX: char = '?';

/// Root prefix used when no device id is configured
pub const DEFAULT_ROOT_TOPIC: &str = "/house/lounge/avr/";

/// The fixed set of state channels exposed on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Power,
    Volume,
    Mute,
    Source,
    Sources,
}

impl Channel {
    /// All channels, in publication order
    pub fn all() -> &'static [Channel] {
        &[
            Channel::Power,
            Channel::Volume,
            Channel::Mute,
            Channel::Source,
            Channel::Sources,
        ]
    }

    /// Channels that accept control commands
    pub fn controllable() -> &'static [Channel] {
        &[
            Channel::Power,
            Channel::Volume,
            Channel::Mute,
            Channel::Source,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Power => "power",
            Channel::Volume => "volume",
            Channel::Mute => "mute",
            Channel::Source => "source",
            Channel::Sources => "sources",
        }
    }

    pub fn has_inbound(&self) -> bool {
        !matches!(self, Channel::Sources)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound/outbound topic names for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPair {
    /// Control topic; `None` for `sources`
    pub inbound: Option<String>,
    /// State topic
    pub outbound: String,
}

/// Resolved topic names for all channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRegistry {
    root: String,
    power: TopicPair,
    volume: TopicPair,
    mute: TopicPair,
    source: TopicPair,
    sources: TopicPair,
}

/// Compute the root prefix for an optional device id
pub fn root_topic(device_id: Option<&str>) -> String {
    match device_id {
        Some(id) if !id.is_empty() => format!("/meem/{}/", id),
        _ => DEFAULT_ROOT_TOPIC.to_string(),
    }
}

impl TopicRegistry {
    /// Derive every channel's topics from a device id and optional overrides
    pub fn new(device_id: Option<&str>, overrides: Option<&TopicsConfig>) -> Self {
        let root = root_topic(device_id);

        let pair = |channel: Channel| {
            let over = overrides.and_then(|o| o.get(channel));
            let inbound = channel.has_inbound().then(|| {
                over.and_then(|o| o.inbound.clone())
                    .unwrap_or_else(|| format!("{}{}/in", root, channel))
            });
            let outbound = over
                .and_then(|o| o.outbound.clone())
                .unwrap_or_else(|| format!("{}{}/out", root, channel));
            TopicPair { inbound, outbound }
        };

        Self {
            power: pair(Channel::Power),
            volume: pair(Channel::Volume),
            mute: pair(Channel::Mute),
            source: pair(Channel::Source),
            sources: pair(Channel::Sources),
            root,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn pair(&self, channel: Channel) -> &TopicPair {
        match channel {
            Channel::Power => &self.power,
            Channel::Volume => &self.volume,
            Channel::Mute => &self.mute,
            Channel::Source => &self.source,
            Channel::Sources => &self.sources,
        }
    }

    pub fn inbound(&self, channel: Channel) -> Option<&str> {
        self.pair(channel).inbound.as_deref()
    }

    pub fn outbound(&self, channel: Channel) -> &str {
        &self.pair(channel).outbound
    }

    /// Outbound topic plus the query suffix
    pub fn query_topic(&self, channel: Channel) -> String {
        format!("{}{}", self.outbound(channel), QUERY_SUFFIX)
    }

    /// Channel whose control topic is exactly `topic`
    pub fn channel_for_inbound(&self, topic: &str) -> Option<Channel> {
        Channel::controllable()
            .iter()
            .copied()
            .find(|c| self.inbound(*c) == Some(topic))
    }

    /// Channel whose state topic is exactly `topic`
    pub fn channel_for_outbound(&self, topic: &str) -> Option<Channel> {
        Channel::all()
            .iter()
            .copied()
            .find(|c| self.outbound(*c) == topic)
    }

    /// The four control topics
    pub fn control_topics(&self) -> Vec<&str> {
        Channel::controllable()
            .iter()
            .filter_map(|c| self.inbound(*c))
            .collect()
    }

    /// The five query topics
    pub fn query_topics(&self) -> Vec<String> {
        Channel::all().iter().map(|c| self.query_topic(*c)).collect()
    }

    /// Check that every topic is usable and no two topics collide
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for channel in Channel::all() {
            let pair = self.pair(*channel);
            for topic in pair.inbound.iter().chain(std::iter::once(&pair.outbound)) {
                check_topic(topic)?;
                if !seen.insert(topic.as_str()) {
                    return Err(BridgeError::InvalidTopic {
                        topic: topic.clone(),
                        reason: "used by more than one channel",
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_topic(topic: &str) -> Result<()> {
    let reason = if topic.is_empty() {
        "topic is empty"
    } else if topic.contains(QUERY_SUFFIX) {
        "'?' is reserved for queries"
    } else if topic.contains(['+', '#']) {
        "wildcards are not allowed"
    } else {
        return Ok(());
    };
    Err(BridgeError::InvalidTopic {
        topic: topic.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicOverride;
    use proptest::prelude::*;

    #[test]
    fn test_default_root() {
        let topics = TopicRegistry::new(None, None);
        assert_eq!(topics.root(), "/house/lounge/avr/");
        assert_eq!(topics.inbound(Channel::Power), Some("/house/lounge/avr/power/in"));
        assert_eq!(topics.outbound(Channel::Sources), "/house/lounge/avr/sources/out");
        assert_eq!(topics.inbound(Channel::Sources), None);
    }

    #[test]
    fn test_device_id_root() {
        let topics = TopicRegistry::new(Some("abc-123"), None);
        assert_eq!(topics.root(), "/meem/abc-123/");
        assert_eq!(topics.outbound(Channel::Volume), "/meem/abc-123/volume/out");
        assert_eq!(topics.query_topic(Channel::Mute), "/meem/abc-123/mute/out?");
    }

    #[test]
    fn test_empty_device_id_uses_default() {
        assert_eq!(root_topic(Some("")), DEFAULT_ROOT_TOPIC);
    }

    #[test]
    fn test_partial_override() {
        let mut overrides = TopicsConfig::default();
        overrides.volume = Some(TopicOverride {
            inbound: Some("living/volume/set".to_string()),
            outbound: None,
        });
        let topics = TopicRegistry::new(None, Some(&overrides));

        assert_eq!(topics.inbound(Channel::Volume), Some("living/volume/set"));
        assert_eq!(topics.outbound(Channel::Volume), "/house/lounge/avr/volume/out");
        assert_eq!(
            topics.channel_for_inbound("living/volume/set"),
            Some(Channel::Volume)
        );
    }

    #[test]
    fn test_lookup_and_lists() {
        let topics = TopicRegistry::new(Some("x"), None);
        assert_eq!(topics.channel_for_outbound("/meem/x/source/out"), Some(Channel::Source));
        assert_eq!(topics.channel_for_outbound("/meem/x/source/in"), None);
        assert_eq!(topics.channel_for_inbound("/meem/x/sources/out"), None);
        assert_eq!(topics.control_topics().len(), 4);
        assert_eq!(topics.query_topics().len(), 5);
        assert!(topics.query_topics().contains(&"/meem/x/sources/out?".to_string()));
    }

    #[test]
    fn test_validate_rejects_collision() {
        let mut overrides = TopicsConfig::default();
        overrides.mute = Some(TopicOverride {
            inbound: Some("/house/lounge/avr/power/in".to_string()),
            outbound: None,
        });
        let topics = TopicRegistry::new(None, Some(&overrides));
        assert!(matches!(
            topics.validate(),
            Err(BridgeError::InvalidTopic { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_reserved_characters() {
        for bad in ["a/b?", "a/+/b", "a/#", ""] {
            let mut overrides = TopicsConfig::default();
            overrides.source = Some(TopicOverride {
                inbound: None,
                outbound: Some(bad.to_string()),
            });
            let topics = TopicRegistry::new(None, Some(&overrides));
            assert!(topics.validate().is_err(), "accepted {:?}", bad);
        }
    }

    proptest! {
        #[test]
        fn prop_derived_topics_never_collide(id in "[a-zA-Z0-9_-]{0,24}") {
            let topics = TopicRegistry::new(Some(&id), None);
            prop_assert!(topics.validate().is_ok());
            for channel in Channel::all() {
                prop_assert!(topics.outbound(*channel).starts_with(topics.root()));
                prop_assert_eq!(topics.channel_for_outbound(topics.outbound(*channel)), Some(*channel));
            }
        }
    }
}
