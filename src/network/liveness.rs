use std::time::Duration;

use tracing::info;

use crate::core::HardwareAddress;
use crate::time::Timestamp;

use super::registry::PeerRegistry;

/// Demotes peers that have been silent for too long
#[derive(Debug, Clone, Copy)]
pub struct LivenessMonitor {
    disconnect_timeout: Duration,
}

impl LivenessMonitor {
    /// Creates a monitor with the given silence threshold
    pub fn new(disconnect_timeout: Duration) -> Self {
        LivenessMonitor { disconnect_timeout }
    }

    /// Silence threshold
    pub fn disconnect_timeout(&self) -> Duration {
        self.disconnect_timeout
    }

    /// Marks every peer silent for at least the timeout as disconnected
    ///
    /// Returns the demoted addresses. A second sweep without intervening
    /// updates demotes nothing.
    pub fn sweep(&self, registry: &mut PeerRegistry, now: Timestamp) -> Vec<HardwareAddress> {
        let Some(cutoff) = now.checked_sub(self.disconnect_timeout) else {
            return Vec::new();
        };

        let mut demoted = Vec::new();
        for address in registry.addresses() {
            if registry.mark_disconnected(&address, cutoff) {
                info!(
                    "Peer {} disconnected after {:?} of silence",
                    address, self.disconnect_timeout
                );
                demoted.push(address);
            }
        }
        demoted
    }
}
