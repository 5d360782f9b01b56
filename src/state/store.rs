//! StateCache - last-known receiver state per channel
//!
//! Owned exclusively by the bridge and mutated only from its dispatch loop,
//! so no locking is involved. Updates are unconditional: there is no
//! equality check and every update counts as a change.

use super::types::{
    InputId, MuteState, PowerState, Snapshot, SourceNames, SourceState, VolumeState,
};
use crate::topics::Channel;

#[derive(Debug, Default)]
pub struct StateCache {
    power: PowerState,
    volume: VolumeState,
    mute: MuteState,
    source: SourceState,
    sources: SourceNames,
    /// Total updates applied, for diagnostics
    update_count: u64,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot for its channel
    ///
    /// Replaces the previous value, except for `sources` where the given
    /// entries are merged into the known names.
    pub fn update(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Power(s) => self.power = s,
            Snapshot::Volume(s) => self.volume = s,
            Snapshot::Mute(s) => self.mute = s,
            Snapshot::Source(s) => self.source = s,
            Snapshot::Sources(names) => self.sources.extend(names),
        }
        self.update_count += 1;
    }

    /// Current snapshot for a channel (empty if never set)
    pub fn read(&self, channel: Channel) -> Snapshot {
        match channel {
            Channel::Power => Snapshot::Power(self.power.clone()),
            Channel::Volume => Snapshot::Volume(self.volume.clone()),
            Channel::Mute => Snapshot::Mute(self.mute.clone()),
            Channel::Source => Snapshot::Source(self.source.clone()),
            Channel::Sources => Snapshot::Sources(self.sources.clone()),
        }
    }

    /// Id of the currently selected input, if known
    pub fn current_source(&self) -> Option<&InputId> {
        self.source.value.as_ref()
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(entries: &[(&str, &str)]) -> Snapshot {
        Snapshot::Sources(
            entries
                .iter()
                .map(|(id, name)| (InputId::from(*id), name.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_read_before_update_is_empty() {
        let cache = StateCache::new();
        for channel in Channel::all() {
            assert_eq!(cache.read(*channel), Snapshot::empty(*channel));
        }
        assert_eq!(cache.current_source(), None);
    }

    #[test]
    fn test_update_replaces() {
        let mut cache = StateCache::new();
        cache.update(Snapshot::Volume(VolumeState::db(-40.0)));
        cache.update(Snapshot::Volume(VolumeState::db(-20.0)));
        assert_eq!(cache.read(Channel::Volume), Snapshot::Volume(VolumeState::db(-20.0)));
    }

    #[test]
    fn test_identical_update_still_counts() {
        let mut cache = StateCache::new();
        let snapshot = Snapshot::Mute(MuteState { value: Some(true) });
        cache.update(snapshot.clone());
        cache.update(snapshot);
        assert_eq!(cache.update_count(), 2);
    }

    #[test]
    fn test_sources_merge() {
        let mut cache = StateCache::new();
        cache.update(names(&[("19", "HDMI 1")]));
        cache.update(names(&[("25", "BD")]));
        cache.update(names(&[("19", "Apple TV")]));

        assert_eq!(cache.read(Channel::Sources), names(&[("19", "Apple TV"), ("25", "BD")]));
    }

    proptest! {
        #[test]
        fn prop_sources_never_shrink(ids in proptest::collection::vec("[0-9]{2}", 1..20)) {
            let mut cache = StateCache::new();
            let mut seen = std::collections::BTreeSet::new();
            for id in &ids {
                cache.update(names(&[(id.as_str(), "name")]));
                seen.insert(id.clone());
                let Snapshot::Sources(known) = cache.read(Channel::Sources) else {
                    panic!("sources channel returned another snapshot");
                };
                prop_assert_eq!(known.len(), seen.len());
                for s in &seen {
                    prop_assert!(known.contains_key(&InputId::from(s.as_str())));
                }
            }
        }
    }
}
