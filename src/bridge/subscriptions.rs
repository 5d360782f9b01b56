//! Topic subscription on every new bus session

use tracing::{info, warn};

use crate::bus::BusClient;
use crate::device::DeviceCommander;

impl<D: DeviceCommander, B: BusClient> super::Bridge<D, B> {
    /// Subscribe to every control topic and every query topic
    ///
    /// Called after each broker connect; a reconnect simply subscribes again.
    pub(super) fn subscribe_all(&self) {
        let Some(bus) = &self.bus else {
            return;
        };

        let control = self.topics.control_topics();
        let queries = self.topics.query_topics();

        let mut failed = 0;
        for topic in control.iter().copied().chain(queries.iter().map(String::as_str)) {
            if let Err(e) = bus.subscribe(topic) {
                warn!("{}", e);
                failed += 1;
            }
        }

        info!(
            "📬 Subscribed to {} control and {} query topics ({} failed)",
            control.len(),
            queries.len(),
            failed
        );
    }
}
