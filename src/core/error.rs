use std::io;
use thiserror::Error;

use super::types::HardwareAddress;

/// Errors raised while decoding a received frame
///
/// These never leave the receive path: the dispatcher logs them and drops
/// the frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,

    #[error("frame length {actual} does not match {expected} bytes for type 0x{type_id:02x}")]
    LengthMismatch {
        type_id: u8,
        expected: usize,
        actual: usize,
    },

    #[error("unknown packet type 0x{0:02x}")]
    UnknownType(u8),

    #[error("invalid value {value} for field `{field}`")]
    InvalidField { field: &'static str, value: u8 },
}

/// Custom error types for the coordination mesh
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Peer registry full, cannot admit {0}")]
    RegistryFull(HardwareAddress),

    #[error("Send to {0} failed")]
    TransportSendFailure(HardwareAddress),

    #[error("Sensor read failed: {0}")]
    SensorRead(String),

    #[error("Payload of {size} bytes exceeds the {max} byte link limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Actuator error: {0}")]
    Actuator(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new sensor read error
    pub fn sensor_read(msg: impl Into<String>) -> Self {
        Error::SensorRead(msg.into())
    }

    /// Creates a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Creates a new actuator error
    pub fn actuator(msg: impl Into<String>) -> Self {
        Error::Actuator(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
