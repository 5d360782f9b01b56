//! State module - last-known receiver state per channel
//!
//! Holds the snapshot types published on the bus and the cache the bridge
//! answers queries from.

mod store;
mod types;

pub use store::StateCache;
pub use types::{
    InputId, MuteState, PowerState, Snapshot, SourceNames, SourceState, VolumeState, VOLUME_UNIT,
};
