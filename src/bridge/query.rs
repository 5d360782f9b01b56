//! State queries: reply with a cached snapshot on a caller-chosen topic
//!
//! A client publishes its reply topic as the plain-string payload of
//! `<outbound topic>?`; the bridge answers with exactly one publish of the
//! cached value on that reply topic. Nothing is kept between queries.

use tracing::{debug, warn};

use crate::bus::BusClient;
use crate::device::DeviceCommander;
use crate::topics::QUERY_SUFFIX;

/// Reply for a channel that is unknown or has never been set
pub const EMPTY_REPLY: &str = "{}";

impl<D: DeviceCommander, B: BusClient> super::Bridge<D, B> {
    /// Publish the cached value of `requested_topic` to `reply_topic`
    pub fn handle_query(&self, requested_topic: &str, reply_topic: &str) {
        if reply_topic.is_empty() {
            warn!("Query for {} without a reply topic, dropped", requested_topic);
            return;
        }
        if let Some(reason) = self.unusable_reply_topic(reply_topic) {
            warn!(
                "Query for {} with reply topic {} dropped: {}",
                requested_topic, reply_topic, reason
            );
            return;
        }

        let payload = match self.topics.channel_for_outbound(requested_topic) {
            Some(channel) => match self.cache.read(channel).to_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Failed to encode {} state: {}", channel, e);
                    return;
                },
            },
            None => {
                debug!("Query for unknown topic {}, replying empty", requested_topic);
                EMPTY_REPLY.to_string()
            },
        };

        debug!("Query {} → reply on {}", requested_topic, reply_topic);
        self.publish(reply_topic, payload);
    }

    /// Reply topics must not be query topics, wildcards or control topics
    fn unusable_reply_topic(&self, reply_topic: &str) -> Option<&'static str> {
        if reply_topic.contains(QUERY_SUFFIX) {
            Some("query topics are never published to")
        } else if reply_topic.contains(['+', '#']) {
            Some("wildcards cannot be published to")
        } else if self.topics.channel_for_inbound(reply_topic).is_some() {
            Some("a reply on a control topic would reach the receiver")
        } else {
            None
        }
    }
}
