use crate::core::SensorSnapshot;

use super::{
    COMMAND, COMMAND_LEN, RELAYED_REPORT, RELAYED_REPORT_LEN, SENSOR_REPORT, SENSOR_REPORT_LEN,
};

/// Payload types exchanged between nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    /// Local sensor values of the sender
    Report(SensorSnapshot),

    /// Level to apply to the receiver's bound output
    Command {
        /// Output level, non-zero drives the output high
        level: u8,
    },

    /// Sender values plus the last known values of its paired node
    RelayedReport {
        /// Sender's own readings
        local: SensorSnapshot,
        /// Last known readings of the paired node
        paired: SensorSnapshot,
    },

    /// Untagged four byte temperature from point-to-point responders
    LegacyTemperature(f32),
}

impl Message {
    /// Leading type tag, `None` for untagged legacy frames
    pub fn type_id(&self) -> Option<u8> {
        match self {
            Message::Report(_) => Some(SENSOR_REPORT),
            Message::Command { .. } => Some(COMMAND),
            Message::RelayedReport { .. } => Some(RELAYED_REPORT),
            Message::LegacyTemperature(_) => None,
        }
    }

    /// Exact length of the encoded frame
    pub fn encoded_len(&self) -> usize {
        match self {
            Message::Report(_) => SENSOR_REPORT_LEN,
            Message::Command { .. } => COMMAND_LEN,
            Message::RelayedReport { .. } => RELAYED_REPORT_LEN,
            Message::LegacyTemperature(_) => super::LEGACY_TEMPERATURE_LEN,
        }
    }

    /// Returns whether this message carries an actuator command
    pub fn is_command(&self) -> bool {
        matches!(self, Message::Command { .. })
    }

    /// Sender's own temperature, if the message carries one
    pub fn temperature(&self) -> Option<f32> {
        match self {
            Message::Report(snapshot) => Some(snapshot.temperature),
            Message::RelayedReport { local, .. } => Some(local.temperature),
            Message::LegacyTemperature(celsius) => Some(*celsius),
            Message::Command { .. } => None,
        }
    }

    /// Sender's own sensor values, if the message carries them
    pub fn snapshot(&self) -> Option<SensorSnapshot> {
        match self {
            Message::Report(snapshot) => Some(*snapshot),
            Message::RelayedReport { local, .. } => Some(*local),
            Message::LegacyTemperature(celsius) => {
                Some(SensorSnapshot::new(*celsius, false, false))
            }
            Message::Command { .. } => None,
        }
    }
}
