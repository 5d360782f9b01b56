//! MQTT bus adapter
//!
//! Wraps a `rumqttc` client. The event loop runs in its own task and forwards
//! connection changes and inbound publishes as [`BusEvent`]s. `rumqttc`
//! reconnects by itself when polled again after an error.

use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{BusClient, BusEvent};
use crate::config::MqttConfig;
use crate::error::{BridgeError, Result};

const REQUEST_CHANNEL_SIZE: usize = 100;
const EVENT_CHANNEL_SIZE: usize = 256;
/// Pause before polling again after a connection error
const ERROR_RETRY_DELAY: Duration = Duration::from_secs(5);

/// MQTT connection used by the bridge
pub struct MqttBus {
    client: AsyncClient,
    running: Arc<Mutex<bool>>,
}

/// Client id used when none is configured
pub fn generate_client_id() -> String {
    format!("avr-mqtt-{}", uuid::Uuid::new_v4().simple())
}

impl MqttBus {
    /// Start connecting to the broker
    ///
    /// Returns immediately; [`BusEvent::Connected`] arrives on the returned
    /// channel once the broker acknowledges the session.
    pub fn connect(config: &MqttConfig) -> (Self, mpsc::Receiver<BusEvent>) {
        let client_id = config.client_id.clone().unwrap_or_else(generate_client_id);

        let mut options = MqttOptions::new(&client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs as u64));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_SIZE);
        let running = Arc::new(Mutex::new(true));
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

        info!(
            "🔌 Connecting to MQTT broker {}:{} as {}",
            config.host, config.port, client_id
        );

        let task_running = Arc::clone(&running);
        tokio::spawn(async move {
            loop {
                if !*task_running.lock() {
                    break;
                }

                let event = match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => BusEvent::Message {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    },
                    Ok(Event::Incoming(Packet::ConnAck(_))) => BusEvent::Connected,
                    Ok(Event::Incoming(Packet::Disconnect)) => BusEvent::Closed,
                    Ok(_) => continue,
                    Err(e) => {
                        if !*task_running.lock() {
                            break;
                        }
                        if tx.send(BusEvent::Error(e.to_string())).await.is_err() {
                            break;
                        }
                        if tx.send(BusEvent::Closed).await.is_err() {
                            break;
                        }
                        tokio::time::sleep(ERROR_RETRY_DELAY).await;
                        continue;
                    },
                };

                if tx.send(event).await.is_err() {
                    break;
                }
            }

            debug!("MQTT event loop stopped");
        });

        (Self { client, running }, rx)
    }

    /// Stop the event loop and disconnect from the broker
    pub async fn disconnect(&self) {
        *self.running.lock() = false;
        if let Err(e) = self.client.disconnect().await {
            warn!("MQTT disconnect failed: {}", e);
        }
        info!("MQTT bus stopped");
    }
}

impl BusClient for MqttBus {
    fn subscribe(&self, topic: &str) -> Result<()> {
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| BridgeError::Bus(format!("subscribe to {} failed: {}", topic, e)))
    }

    fn publish(&self, topic: &str, payload: String) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| BridgeError::Bus(format!("publish to {} failed: {}", topic, e)))
    }
}
