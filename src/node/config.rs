use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Error, HardwareAddress, Result, DEFAULT_REGISTRY_CAPACITY};
use crate::network::AdmissionPolicy;

/// Where a command level comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandSource {
    /// Flip the level every tick
    Toggle,
    /// Aggregate local presence
    FollowPresence,
}

/// What a node sends each tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum OutboundMode {
    /// Local sensor report
    Report,
    /// Local report plus the paired node's last known values
    RelayedReport { paired: HardwareAddress },
    /// Actuator command for the receivers
    Command { source: CommandSource },
    /// Untagged four byte temperature, as point-to-point responders send
    LegacyTemperature,
    /// Receive only
    Silent,
}

/// Who receives the outbound packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destinations {
    /// Everyone in range
    Broadcast,
    /// A fixed set of addresses
    List(Vec<HardwareAddress>),
    /// A single bound peer
    Unicast(HardwareAddress),
    /// Every registry peer currently connected
    ConnectedPeers,
}

/// Configuration for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's hardware address
    pub address: HardwareAddress,
    /// Packet sent each tick
    pub outbound: OutboundMode,
    /// Receivers of the outbound packet
    pub destinations: Destinations,
    /// Dispatch cycle period
    #[serde(serialize_with = "crate::core::serde::serialize_millis")]
    #[serde(deserialize_with = "crate::core::serde::deserialize_millis")]
    pub tick_interval: Duration,
    /// Liveness sweep period
    #[serde(serialize_with = "crate::core::serde::serialize_millis")]
    #[serde(deserialize_with = "crate::core::serde::deserialize_millis")]
    pub sweep_interval: Duration,
    /// How long one presence edge keeps a channel active
    #[serde(serialize_with = "crate::core::serde::serialize_millis")]
    #[serde(deserialize_with = "crate::core::serde::deserialize_millis")]
    pub detection_timeout: Duration,
    /// Silence after which a peer is disconnected
    #[serde(serialize_with = "crate::core::serde::serialize_millis")]
    #[serde(deserialize_with = "crate::core::serde::deserialize_millis")]
    pub disconnect_timeout: Duration,
    /// Peer slots
    pub registry_capacity: usize,
    /// Handling of unknown senders
    pub admission: AdmissionPolicy,
    /// Addresses reserved at startup
    pub peers: Vec<HardwareAddress>,
    /// Decode untagged frames from older firmware
    pub accept_legacy_frames: bool,
    /// Send commands as the untagged single level byte
    pub legacy_commands: bool,
    /// Retrigger local presence when a peer reports radar presence
    pub mirror_remote_presence: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            address: HardwareAddress::new([0; 6]),
            outbound: OutboundMode::Report,
            destinations: Destinations::Broadcast,
            tick_interval: Duration::from_millis(500),
            sweep_interval: Duration::from_millis(1_000),
            detection_timeout: Duration::from_millis(500),
            disconnect_timeout: Duration::from_millis(3_000),
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
            admission: AdmissionPolicy::Preassigned,
            peers: Vec::new(),
            accept_legacy_frames: false,
            legacy_commands: false,
            mirror_remote_presence: false,
        }
    }
}

impl NodeConfig {
    /// Default configuration for the node at `address`
    pub fn for_address(address: HardwareAddress) -> Self {
        NodeConfig {
            address,
            ..Default::default()
        }
    }

    /// Parses and validates a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: NodeConfig = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid node config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Serializes the configuration as pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Checks the configuration for values the node cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.address.is_broadcast() {
            return Err(Error::config("Node address cannot be the broadcast address"));
        }

        let intervals = [
            ("tick_interval", self.tick_interval),
            ("sweep_interval", self.sweep_interval),
            ("detection_timeout", self.detection_timeout),
            ("disconnect_timeout", self.disconnect_timeout),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(Error::config(format!("{} must be non-zero", name)));
            }
        }

        if self.registry_capacity == 0 {
            return Err(Error::config("registry_capacity must be at least 1"));
        }
        if self.peers.len() > self.registry_capacity {
            return Err(Error::config(format!(
                "{} preassigned peers exceed registry capacity {}",
                self.peers.len(),
                self.registry_capacity
            )));
        }

        match &self.destinations {
            Destinations::List(addresses) if addresses.is_empty() => {
                return Err(Error::config("Destination list is empty"));
            }
            Destinations::Unicast(address) if address.is_broadcast() => {
                return Err(Error::config("Unicast destination cannot be the broadcast address"));
            }
            _ => {}
        }

        if let OutboundMode::RelayedReport { paired } = &self.outbound {
            if *paired == self.address {
                return Err(Error::config("A node cannot relay its own reports"));
            }
        }

        let sends_legacy =
            self.legacy_commands || self.outbound == OutboundMode::LegacyTemperature;
        if sends_legacy && !self.accept_legacy_frames {
            return Err(Error::config("Untagged outbound frames require accept_legacy_frames"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> HardwareAddress {
        HardwareAddress::new([0x24, 0x6f, 0x28, 0x7a, 0xe1, last])
    }

    #[test]
    fn test_defaults_match_presence_node() {
        let config = NodeConfig::for_address(addr(1));
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.detection_timeout, Duration::from_millis(500));
        assert_eq!(config.disconnect_timeout, Duration::from_millis(3_000));
        assert_eq!(config.sweep_interval, Duration::from_millis(1_000));
        assert_eq!(config.registry_capacity, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_controller_config() {
        let json = r#"{
            "address": "24:6f:28:7a:e1:01",
            "outbound": { "mode": "command", "source": "toggle" },
            "destinations": "connected-peers",
            "tick_interval": 1000,
            "disconnect_timeout": 2000,
            "peers": ["24:6f:28:7a:e1:02", "24-6f-28-7a-e1-03"]
        }"#;

        let config = NodeConfig::from_json_str(json).unwrap();
        assert_eq!(config.address, addr(1));
        assert_eq!(config.outbound, OutboundMode::Command { source: CommandSource::Toggle });
        assert_eq!(config.destinations, Destinations::ConnectedPeers);
        assert_eq!(config.tick_interval, Duration::from_millis(1_000));
        assert_eq!(config.disconnect_timeout, Duration::from_millis(2_000));
        assert_eq!(config.detection_timeout, Duration::from_millis(500));
        assert_eq!(config.peers, vec![addr(2), addr(3)]);
    }

    #[test]
    fn test_json_round_trip() {
        let config = NodeConfig {
            outbound: OutboundMode::RelayedReport { paired: addr(2) },
            destinations: Destinations::List(vec![addr(3), addr(4)]),
            admission: AdmissionPolicy::EvictDisconnected,
            mirror_remote_presence: true,
            ..NodeConfig::for_address(addr(1))
        };
        let json = config.to_json_string().unwrap();
        assert!(json.contains("\"relayed-report\""));
        assert!(json.contains("\"evict-disconnected\""));
        assert_eq!(NodeConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_validation_failures() {
        let base = NodeConfig::for_address(addr(1));

        let cases = vec![
            NodeConfig {
                address: HardwareAddress::BROADCAST,
                ..base.clone()
            },
            NodeConfig {
                tick_interval: Duration::ZERO,
                ..base.clone()
            },
            NodeConfig {
                disconnect_timeout: Duration::ZERO,
                ..base.clone()
            },
            NodeConfig {
                registry_capacity: 0,
                ..base.clone()
            },
            NodeConfig {
                registry_capacity: 1,
                peers: vec![addr(2), addr(3)],
                ..base.clone()
            },
            NodeConfig {
                destinations: Destinations::List(Vec::new()),
                ..base.clone()
            },
            NodeConfig {
                outbound: OutboundMode::RelayedReport { paired: addr(1) },
                ..base.clone()
            },
            NodeConfig {
                outbound: OutboundMode::LegacyTemperature,
                ..base.clone()
            },
            NodeConfig {
                legacy_commands: true,
                ..base.clone()
            },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{:?}", config);
        }
    }

    #[test]
    fn test_parse_legacy_responder_config() {
        let json = r#"{
            "address": "24:6f:28:7a:e1:02",
            "outbound": { "mode": "legacy-temperature" },
            "destinations": { "unicast": "24:6f:28:7a:e1:01" },
            "accept_legacy_frames": true
        }"#;

        let config = NodeConfig::from_json_str(json).unwrap();
        assert_eq!(config.outbound, OutboundMode::LegacyTemperature);
        assert_eq!(config.destinations, Destinations::Unicast(addr(1)));
        assert!(!config.legacy_commands);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let result = NodeConfig::from_json_str(r#"{ "address": "not-an-address" }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
