//! Receiver-side adapter interface
//!
//! A device driver owns the connection to the AV receiver. It reports state
//! changes as [`DeviceEvent`]s over an mpsc channel consumed by the main
//! dispatch loop, and accepts [`DeviceCommand`]s through [`DeviceCommander`].

pub mod pioneer;

use crate::error::Result;
use crate::state::InputId;

pub use pioneer::{PioneerHandle, PioneerReceiver};

/// Event reported by the receiver
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Connection to the receiver established (again)
    Connected,
    /// Connection to the receiver lost; the driver reconnects on its own
    Disconnected,
    Power(bool),
    /// Master volume in dB
    Volume(f64),
    Mute(bool),
    /// Selected input; `name` is set when the driver already knows it
    Input { id: InputId, name: Option<String> },
    /// Display name learned for an input
    InputName { id: InputId, name: String },
}

/// Command forwarded to the receiver
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    Power(bool),
    /// Master volume in dB
    Volume(f64),
    Mute(bool),
    SelectInput(InputId),
}

/// Sink for receiver commands
///
/// Implementations must not block: the bridge calls this from its dispatch
/// loop. Queue the command and return.
pub trait DeviceCommander {
    fn send(&self, command: DeviceCommand) -> Result<()>;
}
