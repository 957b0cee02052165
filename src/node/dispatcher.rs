use std::sync::Arc;

use embedded_hal::digital::OutputPin;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::actuator::Actuator;
use crate::core::{Error, HardwareAddress, Result, SensorSnapshot};
use crate::network::{
    LivenessMonitor, PeerRegistry, SendReport, Transport, TransportEvents, Upsert,
};
use crate::protocol::{Message, PacketCodec};
use crate::sensor::{PresenceLatches, SensorHub, TemperatureSource, Transition};
use crate::time::{Clock, Timestamp};
use crate::util::format_temperature;

use super::config::{CommandSource, Destinations, NodeConfig, OutboundMode};
use super::NodeHandle;

/// Coordination context for one node
///
/// Owns the registry, debounce state and bound output. Everything runs on
/// the task driving [`Dispatcher::run`], so none of it is locked; other
/// tasks see the registry through [`NodeHandle`].
pub struct Dispatcher<T, S, P> {
    config: NodeConfig,
    transport: T,
    codec: PacketCodec,
    sensors: SensorHub<S>,
    registry: PeerRegistry,
    liveness: LivenessMonitor,
    output: Actuator<P>,
    clock: Arc<dyn Clock>,
    toggle_level: bool,
    registry_tx: watch::Sender<PeerRegistry>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl<T, S, P> Dispatcher<T, S, P>
where
    T: Transport,
    S: TemperatureSource,
    P: OutputPin,
{
    /// Creates a dispatcher from a validated configuration
    pub fn new(
        config: NodeConfig,
        transport: T,
        temperature: S,
        output: Actuator<P>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        if transport.local_address() != config.address {
            return Err(Error::config(format!(
                "Transport address {} does not match configured address {}",
                transport.local_address(),
                config.address
            )));
        }

        let registry =
            PeerRegistry::with_peers(config.registry_capacity, config.admission, &config.peers)?;
        let codec = if config.accept_legacy_frames {
            PacketCodec::with_legacy_frames()
        } else {
            PacketCodec::new()
        };
        let (registry_tx, _) = watch::channel(registry.clone());
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Dispatcher {
            sensors: SensorHub::new(temperature, config.detection_timeout),
            liveness: LivenessMonitor::new(config.disconnect_timeout),
            config,
            transport,
            codec,
            registry,
            output,
            clock,
            toggle_level: false,
            registry_tx,
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }

    /// Handle for observing and stopping this node from other tasks
    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            address: self.config.address,
            registry: self.registry_tx.subscribe(),
            shutdown: Arc::clone(&self.shutdown_tx),
            latches: self.sensors.latches(),
        }
    }

    /// Latches for the presence edge handlers
    pub fn latches(&self) -> PresenceLatches {
        self.sensors.latches()
    }

    /// Peer registry as last updated
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Bound output
    pub fn output(&self) -> &Actuator<P> {
        &self.output
    }

    /// Node configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Runs one dispatch cycle and returns the message sent, if any
    pub fn tick(&mut self, now: Timestamp) -> Option<Message> {
        let (snapshot, transition) = self.sensors.sample(now);
        if let Some(transition) = transition {
            debug!("Presence {:?} at {} ms", transition, now.as_millis());
            if !self.drives_output_by_toggle() {
                self.output.set(transition == Transition::Activated);
            }
        }

        let message = self.outbound(snapshot)?;
        let frame = match message {
            Message::Command { level } if self.config.legacy_commands => {
                self.codec.encode_legacy_command(level)
            }
            _ => self.codec.encode(&message),
        };
        for destination in self.destinations() {
            if let Err(e) = self.transport.send(destination, frame.as_bytes()) {
                warn!("Failed to queue packet for {}: {}", destination, e);
            }
        }
        Some(message)
    }

    fn drives_output_by_toggle(&self) -> bool {
        matches!(
            self.config.outbound,
            OutboundMode::Command {
                source: CommandSource::Toggle
            }
        )
    }

    fn outbound(&mut self, snapshot: SensorSnapshot) -> Option<Message> {
        match &self.config.outbound {
            OutboundMode::Report => Some(Message::Report(snapshot)),
            OutboundMode::RelayedReport { paired } => {
                let paired = self
                    .registry
                    .get(paired)
                    .and_then(|peer| peer.last_value.as_ref())
                    .and_then(Message::snapshot)
                    .unwrap_or_default();
                Some(Message::RelayedReport {
                    local: snapshot,
                    paired,
                })
            }
            OutboundMode::Command {
                source: CommandSource::Toggle,
            } => {
                self.toggle_level = !self.toggle_level;
                self.output.set(self.toggle_level);
                Some(Message::Command {
                    level: u8::from(self.toggle_level),
                })
            }
            OutboundMode::Command {
                source: CommandSource::FollowPresence,
            } => Some(Message::Command {
                level: u8::from(self.sensors.presence().is_active()),
            }),
            OutboundMode::LegacyTemperature => {
                Some(Message::LegacyTemperature(snapshot.temperature))
            }
            OutboundMode::Silent => None,
        }
    }

    /// Current receivers of the outbound packet
    pub fn destinations(&self) -> Vec<HardwareAddress> {
        match &self.config.destinations {
            Destinations::Broadcast => vec![HardwareAddress::BROADCAST],
            Destinations::List(addresses) => addresses.clone(),
            Destinations::Unicast(address) => vec![*address],
            Destinations::ConnectedPeers => self.registry.connected().collect(),
        }
    }

    /// Decodes and applies one received payload
    ///
    /// Malformed payloads leave the registry untouched. Commands drive the
    /// bound output whether or not the sender is tracked.
    pub fn handle_datagram(
        &mut self,
        source: HardwareAddress,
        payload: &[u8],
        now: Timestamp,
    ) -> Result<Upsert> {
        let message = self.codec.decode(payload)?;

        if let Message::Command { level } = message {
            debug!("Command level {} from {}", level, source);
            self.output.set(level != 0);
        }

        if self.config.mirror_remote_presence {
            if let Some(snapshot) = message.snapshot() {
                if snapshot.presence_b {
                    self.sensors.latches().remote.trigger(now);
                }
            }
        }

        if let Some(celsius) = message.temperature() {
            debug!("Report from {}: {} C", source, format_temperature(celsius));
        }

        let outcome = self.registry.upsert(source, message, now)?;
        if outcome != Upsert::Ignored {
            self.publish();
        }
        Ok(outcome)
    }

    /// Runs the liveness sweep and returns the demoted peers
    pub fn sweep(&mut self, now: Timestamp) -> Vec<HardwareAddress> {
        let demoted = self.liveness.sweep(&mut self.registry, now);
        if !demoted.is_empty() {
            self.publish();
        }
        info!("Peers: {}", self.status_line());
        demoted
    }

    /// Logs a send completion; failures are never retried
    pub fn handle_report(&self, report: SendReport) {
        if report.success {
            info!("Delivery success to {}", report.destination);
        } else {
            warn!("{}", Error::TransportSendFailure(report.destination));
        }
    }

    /// Peer temperatures in slot order, `0` for peers not connected
    pub fn status_line(&self) -> String {
        self.registry
            .iter()
            .map(|peer| match (peer.connected, peer.temperature()) {
                (true, Some(celsius)) => format_temperature(celsius),
                _ => "0".to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn publish(&self) {
        self.registry_tx.send_replace(self.registry.clone());
    }

    /// Drives the node until [`NodeHandle::shutdown`] is called
    pub async fn run(mut self, events: TransportEvents) -> Result<()> {
        let TransportEvents {
            mut datagrams,
            mut reports,
        } = events;
        let mut shutdown = self.shutdown_tx.subscribe();

        let mut tick = interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep = interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Node {} running", self.config.address);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tick.tick() => {
                    let now = self.clock.now();
                    self.tick(now);
                }

                _ = sweep.tick() => {
                    let now = self.clock.now();
                    self.sweep(now);
                }

                Some(datagram) = datagrams.recv() => {
                    let now = self.clock.now();
                    match self.handle_datagram(datagram.source, &datagram.payload, now) {
                        Ok(_) => {}
                        Err(Error::Codec(e)) => {
                            debug!("Dropped frame from {}: {}", datagram.source, e);
                        }
                        Err(e) => warn!("Frame from {} not recorded: {}", datagram.source, e),
                    }
                }

                Some(report) = reports.recv() => {
                    self.handle_report(report);
                }

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.output.set(false);
        info!("Node {} stopped", self.config.address);
        Ok(())
    }
}
