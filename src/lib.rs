//! AVR MQTT GW
//!
//! Mirrors a Pioneer AV receiver's power, volume, mute and input state onto
//! MQTT topics and forwards control messages from the bus back to the
//! receiver.

pub mod bridge;
pub mod bus;
pub mod config;
pub mod device;
pub mod error;
pub mod state;
pub mod topics;

pub use bridge::{Bridge, LinkState};
pub use error::{BridgeError, Result};
