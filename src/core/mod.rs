//! Core types shared by every layer of the mesh
//!
//! Addresses, sensor values, errors and the link constants the firmware
//! family agrees on.

pub mod error;
pub mod serde;
pub mod types;

pub use self::error::{CodecError, Error, Result};
pub use self::types::{HardwareAddress, SensorSnapshot, ADDRESS_LEN};

/// Maximum payload carried by one link datagram
pub const MAX_PAYLOAD_SIZE: usize = 250;

/// Default UDP port used by the link emulation
pub const DEFAULT_PORT: u16 = 4210;

/// Default number of peer slots per node
pub const DEFAULT_REGISTRY_CAPACITY: usize = 4;
