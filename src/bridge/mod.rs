//! Bridge module - state synchronization between the receiver and the bus
//!
//! The Bridge is the core of the gateway. It owns:
//! - the resolved topic names
//! - the cache of last-known state per channel
//! - the device command sink and (once opened) the bus connection
//!
//! Every adapter callback is delivered to it from one dispatch loop, so all
//! operations here are synchronous and lock-free.

mod device_events;
mod query;
mod routing;
mod subscriptions;

pub use query::EMPTY_REPLY;
pub use routing::{classify, Route};


use tracing::{debug, info, warn};

use crate::bus::{BusClient, BusEvent};
use crate::device::DeviceCommander;
use crate::state::StateCache;
use crate::topics::{Channel, TopicRegistry};

/// Connection lifecycle as seen by the bridge
///
/// `Idle → DeviceConnected → BusConnecting → Subscribed`. A bus close falls
/// back to `BusConnecting`; nothing returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Waiting for the receiver
    Idle,
    /// Receiver connected; the bus connection should be opened
    DeviceConnected,
    /// Bus connection opened, waiting for the broker
    BusConnecting,
    /// Broker session up and all topics subscribed
    Subscribed,
}

/// State-synchronization bridge between a receiver and a message bus
pub struct Bridge<D, B> {
    topics: TopicRegistry,
    cache: StateCache,
    device: D,
    bus: Option<B>,
    link: LinkState,
}

impl<D: DeviceCommander, B: BusClient> Bridge<D, B> {
    pub fn new(topics: TopicRegistry, device: D) -> Self {
        Self {
            topics,
            cache: StateCache::new(),
            device,
            bus: None,
            link: LinkState::Idle,
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn bus(&self) -> Option<&B> {
        self.bus.as_ref()
    }

    /// Hand over the bus connection opened after the receiver connected
    pub fn attach_bus(&mut self, bus: B) {
        if self.bus.is_some() {
            warn!("Bus already attached, replacing it");
        }
        self.bus = Some(bus);
        self.link = LinkState::BusConnecting;
    }

    /// Handle a bus lifecycle change or inbound message
    pub fn on_bus_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::Connected => {
                info!("✅ MQTT session opened");
                self.link = LinkState::Subscribed;
                self.subscribe_all();
            },
            BusEvent::Closed => {
                info!("MQTT session closed");
                if self.link == LinkState::Subscribed {
                    self.link = LinkState::BusConnecting;
                }
            },
            BusEvent::Error(e) => {
                warn!("MQTT error: {}", e);
            },
            BusEvent::Message { topic, payload } => {
                self.on_bus_message(&topic, &payload);
            },
        }
    }

    /// Publish the cached snapshot of a channel on its outbound topic
    fn publish_channel(&self, channel: Channel) {
        match self.cache.read(channel).to_payload() {
            Ok(payload) => self.publish(self.topics.outbound(channel), payload),
            Err(e) => warn!("Failed to encode {} state: {}", channel, e),
        }
    }

    fn publish(&self, topic: &str, payload: String) {
        let Some(bus) = &self.bus else {
            debug!("No bus yet, not publishing to {}", topic);
            return;
        };

        debug!("📤 {} : {}", topic, payload);
        if let Err(e) = bus.publish(topic, payload) {
            warn!("{}", e);
        }
    }
}
