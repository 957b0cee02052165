//! Network management and peer tracking module
//!
//! This module holds the transport abstraction, the link implementations
//! (UDP emulation and an in-memory medium), the peer registry and the
//! liveness sweep.

pub mod liveness;
pub mod memory;
pub mod registry;
pub mod udp;

pub use self::liveness::LivenessMonitor;
pub use self::memory::{MemoryMedium, MemoryTransport};
pub use self::registry::{AdmissionPolicy, Peer, PeerRegistry, Upsert};
pub use self::udp::{LinkCodec, LinkFrame, UdpConfig, UdpTransport};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::core::{HardwareAddress, Result};

/// Queue depth for received datagrams and send reports
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// A payload received from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Sender's hardware address
    pub source: HardwareAddress,
    /// Raw payload
    pub payload: Bytes,
}

/// Completion notification for one send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Address the payload was sent to
    pub destination: HardwareAddress,
    /// Whether the link reported success
    pub success: bool,
}

/// Notification streams produced by a transport
#[derive(Debug)]
pub struct TransportEvents {
    /// Received datagrams
    pub datagrams: mpsc::Receiver<Datagram>,
    /// Send completions
    pub reports: mpsc::Receiver<SendReport>,
}

impl TransportEvents {
    /// Creates an event pair and the sender halves feeding it
    pub fn channel() -> (mpsc::Sender<Datagram>, mpsc::Sender<SendReport>, Self) {
        let (datagram_tx, datagrams) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (report_tx, reports) = mpsc::channel(EVENT_QUEUE_DEPTH);
        (datagram_tx, report_tx, TransportEvents { datagrams, reports })
    }
}

/// Connectionless, best-effort datagram link
///
/// `send` only queues: it never waits for the medium. Completion arrives
/// later as a [`SendReport`].
pub trait Transport: Send + Sync {
    /// This node's hardware address
    fn local_address(&self) -> HardwareAddress;

    /// Queues `payload` for `destination`
    fn send(&self, destination: HardwareAddress, payload: &[u8]) -> Result<()>;

    /// Queues `payload` for every node in range
    fn broadcast(&self, payload: &[u8]) -> Result<()> {
        self.send(HardwareAddress::BROADCAST, payload)
    }
}
