//! Receiver state type definitions
//!
//! Defines the per-channel snapshots published on the bus. Every field is
//! optional so that a channel which has never been set serializes to `{}`.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::topics::Channel;

/// Unit reported with every volume snapshot
pub const VOLUME_UNIT: &str = "dB";

/// Receiver input identifier (e.g. "19" for HDMI 1 on Pioneer receivers)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputId(pub String);

impl InputId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InputId {
    fn from(s: &str) -> Self {
        InputId(s.to_string())
    }
}

impl From<String> for InputId {
    fn from(s: String) -> Self {
        InputId(s)
    }
}

/// Power state: `true` when the receiver is on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<bool>,
}

/// Master volume in dB
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeState {
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_db"
    )]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl VolumeState {
    pub fn db(value: f64) -> Self {
        Self {
            value: Some(value),
            unit: Some(VOLUME_UNIT.to_string()),
        }
    }
}

/// Whole dB values go out as integers (`-30`, not `-30.0`)
fn serialize_db<S: Serializer>(value: &Option<f64>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(db) if db.fract() == 0.0 && db.abs() < i64::MAX as f64 => s.serialize_i64(*db as i64),
        Some(db) => s.serialize_f64(*db),
        None => s.serialize_none(),
    }
}

/// Mute state: `true` when muted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MuteState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<bool>,
}

/// Selected input and, once known, its display name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<InputId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Known input names, keyed by input id
pub type SourceNames = BTreeMap<InputId, String>;

/// One channel's state as published on the bus
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Snapshot {
    Power(PowerState),
    Volume(VolumeState),
    Mute(MuteState),
    Source(SourceState),
    Sources(SourceNames),
}

impl Snapshot {
    /// Snapshot of a channel that has never been updated
    pub fn empty(channel: Channel) -> Self {
        match channel {
            Channel::Power => Snapshot::Power(PowerState::default()),
            Channel::Volume => Snapshot::Volume(VolumeState::default()),
            Channel::Mute => Snapshot::Mute(MuteState::default()),
            Channel::Source => Snapshot::Source(SourceState::default()),
            Channel::Sources => Snapshot::Sources(SourceNames::new()),
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Snapshot::Power(_) => Channel::Power,
            Snapshot::Volume(_) => Channel::Volume,
            Snapshot::Mute(_) => Channel::Mute,
            Snapshot::Source(_) => Channel::Source,
            Snapshot::Sources(_) => Channel::Sources,
        }
    }

    /// JSON payload for the bus
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
