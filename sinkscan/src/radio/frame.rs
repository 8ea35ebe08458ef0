//! Beacon and send frame layout
//!
//! Both directions use the same 12 byte 802.15.4 style frame:
//!
//! | bytes  | field                          |
//! |--------|--------------------------------|
//! | 0      | frame control (beacon type)    |
//! | 1      | addressing modes               |
//! | 2      | sequence number                |
//! | 3..5   | destination PAN (LE)           |
//! | 5..7   | destination short address (LE) |
//! | 7..9   | source PAN (LE)                |
//! | 9..11  | source short address (LE)      |
//! | 11     | payload                        |

use heapless::Vec;

use crate::config::{ProtocolConfig, MAX_CHANNELS, REPEAT_COUNT_SENTINEL};

/// Length of one frame
pub const FRAME_LEN: usize = 12;

/// Frame control byte of a beacon frame
pub const FCF_BEACON: u8 = 0x00;

/// Addressing modes: short source and short destination address
pub const FCA_SHORT_ADDRS: u8 = 0x88;

/// Payload of every frame sent to a sink
pub const SEND_TOKEN: u8 = 69;

const FRAME_TYPE_MASK: u8 = 0x07;
const PAYLOAD_OFFSET: usize = 11;

/// Frame decoding error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Fewer bytes than a full frame
    TooShort,
    /// Frame control does not announce a beacon
    NotBeacon,
    /// Beacon value outside 1..=10
    ValueOutOfRange(u8),
}

/// Received beacon frame
///
/// Equality covers every field, which is what duplicate filtering relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BeaconFrame {
    /// Sequence number
    pub seq: u8,
    /// Destination PAN
    pub dst_pan: u16,
    /// Destination short address
    pub dst_addr: u16,
    /// Source PAN
    pub src_pan: u16,
    /// Source short address
    pub src_addr: u16,
    /// Sequence value in 1..=10
    pub value: u8,
}

impl BeaconFrame {
    /// Parse a beacon frame from raw bytes
    pub fn parse(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < FRAME_LEN {
            return Err(FrameError::TooShort);
        }
        if data[0] & FRAME_TYPE_MASK != FCF_BEACON {
            return Err(FrameError::NotBeacon);
        }

        let value = data[PAYLOAD_OFFSET];
        if !(1..=REPEAT_COUNT_SENTINEL).contains(&value) {
            return Err(FrameError::ValueOutOfRange(value));
        }

        Ok(Self {
            seq: data[2],
            dst_pan: u16::from_le_bytes([data[3], data[4]]),
            dst_addr: u16::from_le_bytes([data[5], data[6]]),
            src_pan: u16::from_le_bytes([data[7], data[8]]),
            src_addr: u16::from_le_bytes([data[9], data[10]]),
            value,
        })
    }

    /// Serialize the frame
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let mut bytes = [0u8; FRAME_LEN];
        write_header(
            &mut bytes,
            self.seq,
            (self.dst_pan, self.dst_addr),
            (self.src_pan, self.src_addr),
        );
        bytes[PAYLOAD_OFFSET] = self.value;
        bytes
    }
}

/// Outgoing frames for every channel, packed into one buffer
///
/// The frame for the channel at position `i` of the channel set starts at
/// `i * FRAME_LEN`, so a send is a single `transmit(buffer, offset, FRAME_LEN)`.
#[derive(Debug, Clone)]
pub struct SendFrames {
    buffer: Vec<u8, { FRAME_LEN * MAX_CHANNELS }>,
}

impl SendFrames {
    /// Prepare the send frames for every configured channel
    pub fn new(config: &ProtocolConfig) -> Self {
        let mut buffer = Vec::new();
        for spec in &config.channels {
            let mut frame = [0u8; FRAME_LEN];
            write_header(
                &mut frame,
                0,
                (spec.pan_id, spec.short_addr),
                (config.own_pan_id, config.own_short_addr),
            );
            frame[PAYLOAD_OFFSET] = SEND_TOKEN;
            // channel set is bounded by MAX_CHANNELS
            let _ = buffer.extend_from_slice(&frame);
        }
        Self { buffer }
    }

    /// Packed buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Offset and length of the frame for the channel at `index`
    pub fn slot(&self, index: usize) -> Option<(usize, usize)> {
        let offset = index * FRAME_LEN;
        (offset + FRAME_LEN <= self.buffer.len()).then_some((offset, FRAME_LEN))
    }
}

fn write_header(frame: &mut [u8; FRAME_LEN], seq: u8, dst: (u16, u16), src: (u16, u16)) {
    frame[0] = FCF_BEACON;
    frame[1] = FCA_SHORT_ADDRS;
    frame[2] = seq;
    frame[3..5].copy_from_slice(&dst.0.to_le_bytes());
    frame[5..7].copy_from_slice(&dst.1.to_le_bytes());
    frame[7..9].copy_from_slice(&src.0.to_le_bytes());
    frame[9..11].copy_from_slice(&src.1.to_le_bytes());
}
