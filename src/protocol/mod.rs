//! Protocol implementation module
//!
//! This module defines the packets nodes exchange and their fixed-layout
//! little-endian encoding.

pub mod codec;
pub mod message;

pub use self::codec::{EncodedFrame, PacketCodec};
pub use self::message::Message;

/// Tag of a sensor report packet
pub const SENSOR_REPORT: u8 = 0x01;

/// Tag of an actuator command packet
pub const COMMAND: u8 = 0x02;

/// Tag of a sensor report that nests a paired node's values
pub const RELAYED_REPORT: u8 = 0x03;

/// Encoded size of one sensor snapshot: f32 temperature and two presence bytes
pub const SNAPSHOT_LEN: usize = 6;

/// Frame length of a sensor report
pub const SENSOR_REPORT_LEN: usize = 1 + SNAPSHOT_LEN;

/// Frame length of an actuator command
pub const COMMAND_LEN: usize = 2;

/// Frame length of a relayed sensor report
pub const RELAYED_REPORT_LEN: usize = 1 + 2 * SNAPSHOT_LEN;

/// Untagged command frame length
pub const LEGACY_COMMAND_LEN: usize = 1;

/// Untagged temperature frame length
pub const LEGACY_TEMPERATURE_LEN: usize = 4;

/// Largest frame the codec produces
pub const MAX_FRAME_LEN: usize = RELAYED_REPORT_LEN;

/// Expected frame length for a type tag
pub fn expected_len(type_id: u8) -> Option<usize> {
    match type_id {
        SENSOR_REPORT => Some(SENSOR_REPORT_LEN),
        COMMAND => Some(COMMAND_LEN),
        RELAYED_REPORT => Some(RELAYED_REPORT_LEN),
        _ => None,
    }
}
