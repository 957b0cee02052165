//! Node coordination
//!
//! A [`Dispatcher`] owns everything one node knows and runs its periodic
//! cycle; a [`NodeHandle`] lets other tasks watch the registry, feed the
//! presence latches and stop the node.

pub mod config;
pub mod dispatcher;

pub use self::config::{CommandSource, Destinations, NodeConfig, OutboundMode};
pub use self::dispatcher::Dispatcher;

use std::sync::Arc;

use tokio::sync::watch;

use crate::core::HardwareAddress;
use crate::network::PeerRegistry;
use crate::sensor::PresenceLatches;

/// Cloneable view of a running node
#[derive(Debug, Clone)]
pub struct NodeHandle {
    address: HardwareAddress,
    registry: watch::Receiver<PeerRegistry>,
    shutdown: Arc<watch::Sender<bool>>,
    latches: PresenceLatches,
}

impl NodeHandle {
    /// The node's hardware address
    pub fn address(&self) -> HardwareAddress {
        self.address
    }

    /// Snapshot of the registry as last published
    pub fn registry(&self) -> PeerRegistry {
        self.registry.borrow().clone()
    }

    /// Receiver notified on every registry change
    pub fn subscribe(&self) -> watch::Receiver<PeerRegistry> {
        self.registry.clone()
    }

    /// Presence latches for edge handlers
    pub fn latches(&self) -> PresenceLatches {
        self.latches.clone()
    }

    /// Asks the dispatcher to stop after its current event
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Returns whether shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}
