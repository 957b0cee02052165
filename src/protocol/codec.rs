use bytes::{Buf, BufMut};

use crate::core::{CodecError, SensorSnapshot};

use super::message::Message;
use super::{
    expected_len, COMMAND, LEGACY_COMMAND_LEN, LEGACY_TEMPERATURE_LEN, MAX_FRAME_LEN,
    RELAYED_REPORT, SENSOR_REPORT,
};

/// Encoded packet held in a fixed stack buffer
#[derive(Clone, Copy)]
pub struct EncodedFrame {
    buf: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl EncodedFrame {
    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Frame length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false, every packet type has at least one byte
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for EncodedFrame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::fmt::Debug for EncodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EncodedFrame").field(&self.as_bytes()).finish()
    }
}

/// Fixed-layout packet codec
///
/// Tagged frames are always accepted. Untagged frames from the older
/// point-to-point firmware (a bare level byte or a bare `f32`) are
/// recognised by length only, and only when legacy framing is enabled.
///
/// Round trips preserve temperatures bit for bit, so a NaN comes back as
/// the same NaN even though it never compares equal to itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec {
    accept_legacy: bool,
}

impl PacketCodec {
    /// Creates a codec that only accepts tagged frames
    pub fn new() -> Self {
        PacketCodec {
            accept_legacy: false,
        }
    }

    /// Creates a codec that also accepts untagged legacy frames
    pub fn with_legacy_frames() -> Self {
        PacketCodec {
            accept_legacy: true,
        }
    }

    /// Returns whether untagged frames are accepted
    pub fn accepts_legacy(&self) -> bool {
        self.accept_legacy
    }

    /// Encodes a message into its fixed-length frame
    pub fn encode(&self, message: &Message) -> EncodedFrame {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = message.encoded_len();
        {
            let mut dst = &mut buf[..len];
            match message {
                Message::Report(snapshot) => {
                    dst.put_u8(SENSOR_REPORT);
                    put_snapshot(&mut dst, snapshot);
                }
                Message::Command { level } => {
                    dst.put_u8(COMMAND);
                    dst.put_u8(*level);
                }
                Message::RelayedReport { local, paired } => {
                    dst.put_u8(RELAYED_REPORT);
                    put_snapshot(&mut dst, local);
                    put_snapshot(&mut dst, paired);
                }
                Message::LegacyTemperature(celsius) => {
                    dst.put_f32_le(*celsius);
                }
            }
            debug_assert!(dst.is_empty());
        }
        EncodedFrame { buf, len }
    }

    /// Encodes a command as the untagged single level byte
    pub fn encode_legacy_command(&self, level: u8) -> EncodedFrame {
        let mut buf = [0u8; MAX_FRAME_LEN];
        buf[0] = level;
        EncodedFrame {
            buf,
            len: LEGACY_COMMAND_LEN,
        }
    }

    /// Decodes a received frame
    pub fn decode(&self, frame: &[u8]) -> Result<Message, CodecError> {
        if frame.is_empty() {
            return Err(CodecError::Empty);
        }

        if self.accept_legacy {
            match frame.len() {
                LEGACY_COMMAND_LEN => return Ok(Message::Command { level: frame[0] }),
                LEGACY_TEMPERATURE_LEN => {
                    let mut src = frame;
                    return Ok(Message::LegacyTemperature(src.get_f32_le()));
                }
                _ => {}
            }
        }

        let type_id = frame[0];
        let expected = expected_len(type_id).ok_or(CodecError::UnknownType(type_id))?;
        if frame.len() != expected {
            return Err(CodecError::LengthMismatch {
                type_id,
                expected,
                actual: frame.len(),
            });
        }

        let mut src = &frame[1..];
        match type_id {
            SENSOR_REPORT => Ok(Message::Report(get_snapshot(&mut src)?)),
            COMMAND => Ok(Message::Command {
                level: src.get_u8(),
            }),
            RELAYED_REPORT => {
                let local = get_snapshot(&mut src)?;
                let paired = get_snapshot(&mut src)?;
                Ok(Message::RelayedReport { local, paired })
            }
            other => Err(CodecError::UnknownType(other)),
        }
    }
}

fn put_snapshot<B: BufMut>(dst: &mut B, snapshot: &SensorSnapshot) {
    dst.put_f32_le(snapshot.temperature);
    dst.put_u8(snapshot.presence_a as u8);
    dst.put_u8(snapshot.presence_b as u8);
}

fn get_snapshot<B: Buf>(src: &mut B) -> Result<SensorSnapshot, CodecError> {
    let temperature = src.get_f32_le();
    let presence_a = get_flag(src, "presence_a")?;
    let presence_b = get_flag(src, "presence_b")?;
    Ok(SensorSnapshot {
        temperature,
        presence_a,
        presence_b,
    })
}

fn get_flag<B: Buf>(src: &mut B, field: &'static str) -> Result<bool, CodecError> {
    match src.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(CodecError::InvalidField { field, value }),
    }
}
