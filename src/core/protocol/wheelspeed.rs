//! Wheel-speed telemetry frame (return channel to the receiver)
//!
//! Layout, little-endian, 36 bytes:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 3 | sync `AA 44 13` |
//! | 3 | 1 | payload length (20) |
//! | 4 | 2 | message id (2269) |
//! | 6 | 2 | GPS week |
//! | 8 | 4 | time of week \[ms\] |
//! | 12 | 16 | four `i32` speed channels |
//! | 28 | 2 | channel validity mask |
//! | 30 | 2 | reserved, zero |
//! | 32 | 4 | CRC-32 over bytes 0..32 |

use super::checksum::frame_crc32;
use thiserror::Error;

/// Sync marker of the short-header frame
pub const WHEELSPEED_SYNC: [u8; 3] = [0xAA, 0x44, 0x13];
/// Declared payload length
pub const WHEELSPEED_PAYLOAD_LEN: u8 = 20;
/// Message identifier
pub const WHEELSPEED_MESSAGE_ID: u16 = 2269;
/// Bytes covered by the CRC
pub const WHEELSPEED_BODY_LEN: usize = 32;
/// Complete frame size
pub const WHEELSPEED_FRAME_LEN: usize = WHEELSPEED_BODY_LEN + 4;

/// Mask for a single channel sample
pub const MASK_ONE_CHANNEL: u16 = 1 << 0;
/// Mask for a two channel sample (bit 11 flags the pair layout)
pub const MASK_TWO_CHANNELS: u16 = (1 << 0) | (1 << 1) | (1 << 11);
/// Mask for a four channel sample
pub const MASK_FOUR_CHANNELS: u16 = (1 << 0) | (1 << 1) | (1 << 2) | (1 << 3);

/// Decode errors for a received wheel-speed frame
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WheelSpeedError {
    /// Wrong frame size
    #[error("wheel-speed frame must be {WHEELSPEED_FRAME_LEN} bytes, got {0}")]
    Length(usize),
    /// Header does not match the fixed values
    #[error("unexpected wheel-speed header")]
    Header,
    /// CRC mismatch
    #[error("wheel-speed frame CRC mismatch")]
    Crc,
}

/// Wheel-speed frame state
///
/// Time fields are set by the caller and keep their value between frames;
/// speed channels and mask are rebuilt from each new sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelSpeedFrame {
    /// GPS week number
    pub wno: u16,
    /// GPS time of week in milliseconds
    pub tow_ms: u32,
    /// Speed channels
    pub speeds: [i32; 4],
    /// Channel validity mask
    pub mask: u16,
}

impl WheelSpeedFrame {
    /// Create an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time fields used by subsequent frames
    pub fn set_time(&mut self, wno: u16, tow_ms: u32) {
        self.wno = wno;
        self.tow_ms = tow_ms;
    }

    /// Load a speed sample. Only 1, 2 or 4 channels are valid; any other
    /// count leaves the frame untouched and returns `false`.
    pub fn set_speeds(&mut self, speeds: &[i32]) -> bool {
        let mask = match speeds.len() {
            1 => MASK_ONE_CHANNEL,
            2 => MASK_TWO_CHANNELS,
            4 => MASK_FOUR_CHANNELS,
            _ => return false,
        };
        self.speeds = [0; 4];
        self.speeds[..speeds.len()].copy_from_slice(speeds);
        self.mask = mask;
        true
    }

    /// Number of valid channels according to the mask
    pub fn channel_count(&self) -> usize {
        (self.mask & 0x000F).count_ones() as usize
    }

    /// Serialize header + payload + CRC
    pub fn encode(&self) -> [u8; WHEELSPEED_FRAME_LEN] {
        let mut frame = [0u8; WHEELSPEED_FRAME_LEN];
        frame[0..3].copy_from_slice(&WHEELSPEED_SYNC);
        frame[3] = WHEELSPEED_PAYLOAD_LEN;
        frame[4..6].copy_from_slice(&WHEELSPEED_MESSAGE_ID.to_le_bytes());
        frame[6..8].copy_from_slice(&self.wno.to_le_bytes());
        frame[8..12].copy_from_slice(&self.tow_ms.to_le_bytes());
        for (i, speed) in self.speeds.iter().enumerate() {
            let at = 12 + i * 4;
            frame[at..at + 4].copy_from_slice(&speed.to_le_bytes());
        }
        frame[28..30].copy_from_slice(&self.mask.to_le_bytes());

        let crc = frame_crc32(&frame[..WHEELSPEED_BODY_LEN]);
        frame[WHEELSPEED_BODY_LEN..].copy_from_slice(&crc.to_le_bytes());
        frame
    }

    /// Parse a frame produced by [`encode`](Self::encode)
    pub fn decode(frame: &[u8]) -> Result<Self, WheelSpeedError> {
        if frame.len() != WHEELSPEED_FRAME_LEN {
            return Err(WheelSpeedError::Length(frame.len()));
        }
        if frame[0..3] != WHEELSPEED_SYNC
            || frame[3] != WHEELSPEED_PAYLOAD_LEN
            || u16::from_le_bytes([frame[4], frame[5]]) != WHEELSPEED_MESSAGE_ID
        {
            return Err(WheelSpeedError::Header);
        }

        let crc = u32::from_le_bytes([frame[32], frame[33], frame[34], frame[35]]);
        if frame_crc32(&frame[..WHEELSPEED_BODY_LEN]) != crc {
            return Err(WheelSpeedError::Crc);
        }

        let mut speeds = [0i32; 4];
        for (i, speed) in speeds.iter_mut().enumerate() {
            let at = 12 + i * 4;
            *speed = i32::from_le_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]]);
        }

        Ok(Self {
            wno: u16::from_le_bytes([frame[6], frame[7]]),
            tow_ms: u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]),
            speeds,
            mask: u16::from_le_bytes([frame[28], frame[29]]),
        })
    }
}
