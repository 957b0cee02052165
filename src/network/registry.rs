use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{Error, HardwareAddress, Result};
use crate::protocol::Message;
use crate::time::Timestamp;

/// A remote node as last observed
#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    /// The peer's hardware address
    pub address: HardwareAddress,
    /// Time of the last accepted frame
    pub last_seen: Timestamp,
    /// Whether the peer has been heard within the disconnect timeout
    pub connected: bool,
    /// Last decoded payload, `None` when unknown
    pub last_value: Option<Message>,
}

impl Peer {
    fn unseen(address: HardwareAddress) -> Self {
        Peer {
            address,
            last_seen: Timestamp::ZERO,
            connected: false,
            last_value: None,
        }
    }

    /// Last reported temperature, if known
    pub fn temperature(&self) -> Option<f32> {
        self.last_value.as_ref().and_then(Message::temperature)
    }
}

/// What happens when a frame arrives from an address not in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionPolicy {
    /// Only preassigned addresses are tracked, others are ignored
    #[default]
    Preassigned,
    /// Admit while there is room, then replace the stalest disconnected peer
    EvictDisconnected,
}

/// Outcome of [`PeerRegistry::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// Existing entry refreshed
    Refreshed,
    /// New entry admitted into a free slot
    Admitted,
    /// New entry replaced the given disconnected peer
    Evicted(HardwareAddress),
    /// Address not tracked under the current policy
    Ignored,
}

/// Bounded table of known peers keyed by hardware address
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRegistry {
    capacity: usize,
    policy: AdmissionPolicy,
    peers: HashMap<HardwareAddress, Peer>,
    /// Slot order, stable across refreshes
    order: Vec<HardwareAddress>,
}

impl PeerRegistry {
    /// Creates an empty registry with `capacity` slots
    pub fn new(capacity: usize, policy: AdmissionPolicy) -> Self {
        PeerRegistry {
            capacity,
            policy,
            peers: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    /// Creates a registry holding `addresses` as disconnected entries
    pub fn with_peers(
        capacity: usize,
        policy: AdmissionPolicy,
        addresses: &[HardwareAddress],
    ) -> Result<Self> {
        let mut registry = Self::new(capacity, policy);
        for &address in addresses {
            registry.preassign(address)?;
        }
        Ok(registry)
    }

    /// Reserves a slot for `address`
    pub fn preassign(&mut self, address: HardwareAddress) -> Result<()> {
        if self.peers.contains_key(&address) {
            return Ok(());
        }
        if self.is_full() {
            return Err(Error::RegistryFull(address));
        }
        self.insert(Peer::unseen(address));
        Ok(())
    }

    /// Records a frame received from `address`
    pub fn upsert(
        &mut self,
        address: HardwareAddress,
        value: Message,
        now: Timestamp,
    ) -> Result<Upsert> {
        if let Some(peer) = self.peers.get_mut(&address) {
            if !peer.connected {
                info!("Peer {} connected", address);
            }
            peer.last_seen = now;
            peer.connected = true;
            peer.last_value = Some(value);
            return Ok(Upsert::Refreshed);
        }

        let outcome = match self.policy {
            AdmissionPolicy::Preassigned => {
                debug!("Ignoring frame from unregistered {}", address);
                return Ok(Upsert::Ignored);
            }
            AdmissionPolicy::EvictDisconnected if !self.is_full() => Upsert::Admitted,
            AdmissionPolicy::EvictDisconnected => {
                let victim = self
                    .peers
                    .values()
                    .filter(|p| !p.connected)
                    .min_by_key(|p| p.last_seen)
                    .map(|p| p.address)
                    .ok_or(Error::RegistryFull(address))?;
                self.remove(&victim);
                info!("Evicted disconnected peer {} for {}", victim, address);
                Upsert::Evicted(victim)
            }
        };

        info!("Peer {} admitted", address);
        self.insert(Peer {
            address,
            last_seen: now,
            connected: true,
            last_value: Some(value),
        });
        Ok(outcome)
    }

    /// Demotes `address` if it has not been seen since `cutoff`
    ///
    /// Returns whether the peer was demoted by this call.
    pub fn mark_disconnected(&mut self, address: &HardwareAddress, cutoff: Timestamp) -> bool {
        match self.peers.get_mut(address) {
            Some(peer) if peer.connected && peer.last_seen <= cutoff => {
                peer.connected = false;
                peer.last_value = None;
                true
            }
            _ => false,
        }
    }

    /// Looks up a peer
    pub fn get(&self, address: &HardwareAddress) -> Option<&Peer> {
        self.peers.get(address)
    }

    /// Peers in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Peer> + '_ {
        self.order.iter().filter_map(move |a| self.peers.get(a))
    }

    /// Addresses of currently connected peers in slot order
    pub fn connected(&self) -> impl Iterator<Item = HardwareAddress> + '_ {
        self.iter().filter(|p| p.connected).map(|p| p.address)
    }

    /// Addresses in slot order
    pub fn addresses(&self) -> Vec<HardwareAddress> {
        self.order.clone()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns whether no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admission policy in effect
    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    fn is_full(&self) -> bool {
        self.peers.len() >= self.capacity
    }

    fn insert(&mut self, peer: Peer) {
        self.order.push(peer.address);
        self.peers.insert(peer.address, peer);
    }

    fn remove(&mut self, address: &HardwareAddress) {
        self.peers.remove(address);
        self.order.retain(|a| a != address);
    }
}
