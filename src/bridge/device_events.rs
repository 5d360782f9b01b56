//! Receiver events → cache update → publish
//!
//! Every event publishes, even when the value did not change.

use tracing::{debug, info};

use super::LinkState;
use crate::bus::BusClient;
use crate::device::{DeviceCommander, DeviceEvent};
use crate::state::{InputId, MuteState, PowerState, Snapshot, SourceNames, SourceState, VolumeState};

impl<D: DeviceCommander, B: BusClient> super::Bridge<D, B> {
    /// Handle one event reported by the receiver
    pub fn on_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected => self.on_device_connected(),
            DeviceEvent::Disconnected => {
                info!("Receiver disconnected, keeping cached state");
            },
            DeviceEvent::Power(on) => {
                self.apply(Snapshot::Power(PowerState { value: Some(on) }));
            },
            DeviceEvent::Volume(db) => {
                self.apply(Snapshot::Volume(VolumeState::db(db)));
            },
            DeviceEvent::Mute(muted) => {
                self.apply(Snapshot::Mute(MuteState { value: Some(muted) }));
            },
            DeviceEvent::Input { id, name } => {
                self.apply(Snapshot::Source(SourceState {
                    value: Some(id),
                    name,
                }));
            },
            DeviceEvent::InputName { id, name } => self.on_input_name(id, name),
        }
    }

    fn on_device_connected(&mut self) {
        if self.link == LinkState::Idle {
            info!("🔊 Receiver connected, opening bus connection");
            self.link = LinkState::DeviceConnected;
        } else {
            info!("Receiver reconnected (link {:?})", self.link);
        }
    }

    /// Learn an input name; re-announce the source if it is the selected one
    fn on_input_name(&mut self, id: InputId, name: String) {
        debug!("Receiver input {} is named {:?}", id, name);

        let mut entry = SourceNames::new();
        entry.insert(id.clone(), name.clone());
        self.apply(Snapshot::Sources(entry));

        if self.cache.current_source() == Some(&id) {
            self.apply(Snapshot::Source(SourceState {
                value: Some(id),
                name: Some(name),
            }));
        }
    }

    fn apply(&mut self, snapshot: Snapshot) {
        let channel = snapshot.channel();
        self.cache.update(snapshot);
        self.publish_channel(channel);
    }
}
