use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::trace;

use crate::core::{Error, HardwareAddress, Result, MAX_PAYLOAD_SIZE};

use super::{Datagram, SendReport, Transport, TransportEvents};

struct Medium {
    endpoints: HashMap<HardwareAddress, mpsc::Sender<Datagram>>,
    loss_probability: f64,
    rng: StdRng,
}

/// Shared in-process radio medium
///
/// Routes datagrams between attached endpoints. Each delivery is dropped
/// independently with the configured loss probability.
#[derive(Clone)]
pub struct MemoryMedium {
    inner: Arc<Mutex<Medium>>,
}

impl MemoryMedium {
    /// Creates a lossless medium
    pub fn new() -> Self {
        Self::with_loss(0.0, 0)
    }

    /// Creates a medium dropping deliveries with `probability`, seeded for reproducibility
    pub fn with_loss(probability: f64, seed: u64) -> Self {
        MemoryMedium {
            inner: Arc::new(Mutex::new(Medium {
                endpoints: HashMap::new(),
                loss_probability: probability.clamp(0.0, 1.0),
                rng: StdRng::seed_from_u64(seed),
            })),
        }
    }

    /// Attaches a node and returns its transport and event streams
    pub fn attach(&self, address: HardwareAddress) -> Result<(MemoryTransport, TransportEvents)> {
        let (datagram_tx, report_tx, events) = TransportEvents::channel();
        let mut medium = self.lock()?;
        if medium.endpoints.contains_key(&address) {
            return Err(Error::transport(format!("{} already attached", address)));
        }
        medium.endpoints.insert(address, datagram_tx);
        drop(medium);

        Ok((
            MemoryTransport {
                address,
                medium: self.clone(),
                reports: report_tx,
            },
            events,
        ))
    }

    /// Detaches a node, as if it went out of range
    pub fn detach(&self, address: &HardwareAddress) -> Result<()> {
        self.lock()?.endpoints.remove(address);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Medium>> {
        self.inner
            .lock()
            .map_err(|_| Error::transport("Medium lock poisoned"))
    }

    /// Delivers `payload` and returns whether any endpoint received it
    fn deliver(
        &self,
        source: HardwareAddress,
        destination: HardwareAddress,
        payload: &[u8],
    ) -> Result<bool> {
        let mut medium = self.lock()?;
        let Medium {
            endpoints,
            loss_probability,
            rng,
        } = &mut *medium;

        let payload = Bytes::copy_from_slice(payload);
        let mut delivered = false;
        for (address, endpoint) in endpoints.iter() {
            if *address == source || !(destination.is_broadcast() || destination == *address) {
                continue;
            }
            if *loss_probability > 0.0 && rng.gen_bool(*loss_probability) {
                trace!("Dropped frame {} -> {}", source, address);
                continue;
            }
            let datagram = Datagram {
                source,
                payload: payload.clone(),
            };
            delivered |= endpoint.try_send(datagram).is_ok();
        }
        Ok(delivered)
    }
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

/// One node's attachment to a [`MemoryMedium`]
pub struct MemoryTransport {
    address: HardwareAddress,
    medium: MemoryMedium,
    reports: mpsc::Sender<SendReport>,
}

impl Transport for MemoryTransport {
    fn local_address(&self) -> HardwareAddress {
        self.address
    }

    fn send(&self, destination: HardwareAddress, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let delivered = self.medium.deliver(self.address, destination, payload)?;
        // Broadcasts are unacknowledged and always complete successfully
        let success = delivered || destination.is_broadcast();
        if self.reports.try_send(SendReport { destination, success }).is_err() {
            trace!("Dropping send report for {}", destination);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> HardwareAddress {
        HardwareAddress::new([0xf4, 0x12, 0xfa, 0xd4, 0x3e, last])
    }

    #[test]
    fn test_unicast_and_broadcast_routing() {
        let medium = MemoryMedium::new();
        let (a, mut events_a) = medium.attach(addr(1)).unwrap();
        let (_b, mut events_b) = medium.attach(addr(2)).unwrap();
        let (_c, mut events_c) = medium.attach(addr(3)).unwrap();

        a.send(addr(2), &[0x02, 0x01]).unwrap();
        assert_eq!(
            events_b.datagrams.try_recv().unwrap().payload,
            Bytes::from_static(&[0x02, 0x01])
        );
        assert!(events_c.datagrams.try_recv().is_err());

        a.broadcast(&[0x02, 0x00]).unwrap();
        assert_eq!(events_b.datagrams.try_recv().unwrap().source, addr(1));
        assert_eq!(events_c.datagrams.try_recv().unwrap().source, addr(1));
        assert!(events_a.datagrams.try_recv().is_err());

        let reports: Vec<_> = std::iter::from_fn(|| events_a.reports.try_recv().ok()).collect();
        assert_eq!(
            reports,
            vec![
                SendReport { destination: addr(2), success: true },
                SendReport { destination: HardwareAddress::BROADCAST, success: true },
            ]
        );
    }

    #[test]
    fn test_unreachable_unicast_reports_failure() {
        let medium = MemoryMedium::new();
        let (a, mut events_a) = medium.attach(addr(1)).unwrap();
        let (_b, _events_b) = medium.attach(addr(2)).unwrap();
        medium.detach(&addr(2)).unwrap();

        a.send(addr(2), &[0x02, 0x01]).unwrap();
        assert_eq!(
            events_a.reports.try_recv().unwrap(),
            SendReport { destination: addr(2), success: false }
        );
    }

    #[test]
    fn test_total_loss_drops_everything() {
        let medium = MemoryMedium::with_loss(1.0, 7);
        let (a, _events_a) = medium.attach(addr(1)).unwrap();
        let (_b, mut events_b) = medium.attach(addr(2)).unwrap();

        for _ in 0..10 {
            a.send(addr(2), &[0x02, 0x01]).unwrap();
        }
        assert!(events_b.datagrams.try_recv().is_err());
    }

    #[test]
    fn test_duplicate_attach_rejected() {
        let medium = MemoryMedium::new();
        let _first = medium.attach(addr(1)).unwrap();
        assert!(matches!(medium.attach(addr(1)), Err(Error::Transport(_))));
    }
}
