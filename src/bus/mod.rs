//! Message-bus adapter interface
//!
//! The bus adapter owns the broker connection. Lifecycle changes and inbound
//! messages arrive as [`BusEvent`]s on an mpsc channel; the bridge publishes
//! and subscribes through [`BusClient`].

pub mod mqtt;

use crate::error::Result;

pub use mqtt::MqttBus;

/// Event reported by the bus adapter
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// Session with the broker established (again)
    Connected,
    /// Session closed; the adapter reconnects on its own
    Closed,
    /// Transport or protocol error
    Error(String),
    /// Message on a subscribed topic
    Message { topic: String, payload: Vec<u8> },
}

/// Publish/subscribe operations used by the bridge
///
/// Implementations must not block: queue the request and return.
pub trait BusClient {
    fn subscribe(&self, topic: &str) -> Result<()>;
    fn publish(&self, topic: &str, payload: String) -> Result<()>;
}
