//! Stream framing for the mixed binary / text protocol
//!
//! The receiver interleaves two message formats on one byte stream with no
//! delimiters in between:
//! - Binary frames: `AA 44 12 | len:u16 | id:u16 | payload | crc:u32`
//! - Text sentences: `$FP,...*XX`
//!
//! [`scan`] decides what starts at a given offset; [`FrameDecoder`] runs the
//! resynchronizing loop over an accumulation buffer.

use super::checksum::{frame_crc32, trailing_crc32, verify_frame_crc32};
use bytes::{Buf, BytesMut};
use thiserror::Error;

// ============ Binary frame constants ============

/// Sync marker of an inbound binary frame
pub const BINARY_SYNC: [u8; 3] = [0xAA, 0x44, 0x12];
/// Sync + payload length + message id
pub const BINARY_HEADER_LEN: usize = 7;
/// Trailing CRC size
pub const CRC_LEN: usize = 4;

// ============ Text sentence constants ============

/// First byte of a sentence
pub const SENTENCE_START: u8 = b'$';
/// Separates the sentence body from its checksum digits
pub const CHECKSUM_MARKER: u8 = b'*';
/// Number of hex digits after the checksum marker
pub const CHECKSUM_DIGITS: usize = 2;
/// Longest sentence the scanner will wait for before giving up on a `$`
pub const MAX_SENTENCE_LEN: usize = 512;

/// Kind of a delimited message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// CRC framed binary message
    Binary,
    /// Checksum terminated text sentence
    Sentence,
}

/// Result of probing the buffer at one offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    /// A complete message of `len` bytes starts at the offset
    Matched {
        /// Which protocol matched
        kind: MessageKind,
        /// Total message length in bytes
        len: usize,
    },
    /// Not enough bytes to decide; wait for more input without advancing
    Incomplete,
    /// The offset does not start a message of either protocol
    NoMatch,
}

/// Probe `buffer[offset..]`: binary first, then text.
///
/// A binary candidate with a bad CRC is treated as `NoMatch` and the text
/// matcher is tried at the same offset.
pub fn scan(buffer: &[u8], offset: usize) -> ScanResult {
    let Some(data) = buffer.get(offset..) else {
        return ScanResult::Incomplete;
    };
    if data.is_empty() {
        return ScanResult::Incomplete;
    }

    match scan_binary(data) {
        ScanResult::NoMatch => scan_sentence(data),
        other => other,
    }
}

fn scan_binary(data: &[u8]) -> ScanResult {
    if data.len() < BINARY_SYNC.len() {
        // A sync split across two reads must not be skipped
        return if BINARY_SYNC.starts_with(data) {
            ScanResult::Incomplete
        } else {
            ScanResult::NoMatch
        };
    }
    if data[..BINARY_SYNC.len()] != BINARY_SYNC {
        return ScanResult::NoMatch;
    }
    if data.len() < BINARY_HEADER_LEN {
        return ScanResult::Incomplete;
    }

    let payload_len = usize::from(u16::from_le_bytes([data[3], data[4]]));
    let total = BINARY_HEADER_LEN + payload_len + CRC_LEN;
    if data.len() < total {
        return ScanResult::Incomplete;
    }

    if verify_frame_crc32(&data[..total]) {
        ScanResult::Matched {
            kind: MessageKind::Binary,
            len: total,
        }
    } else {
        ScanResult::NoMatch
    }
}

fn scan_sentence(data: &[u8]) -> ScanResult {
    if data[0] != SENTENCE_START {
        return ScanResult::NoMatch;
    }

    let window = &data[..data.len().min(MAX_SENTENCE_LEN)];
    for (i, &byte) in window.iter().enumerate().skip(1) {
        if byte == CHECKSUM_MARKER {
            let len = i + 1 + CHECKSUM_DIGITS;
            return if data.len() < len {
                ScanResult::Incomplete
            } else {
                ScanResult::Matched {
                    kind: MessageKind::Sentence,
                    len,
                }
            };
        }
        // A second start marker means this one was noise
        if byte == SENTENCE_START || !(0x20..=0x7E).contains(&byte) {
            return ScanResult::NoMatch;
        }
    }

    if data.len() < MAX_SENTENCE_LEN {
        ScanResult::Incomplete
    } else {
        ScanResult::NoMatch
    }
}

/// Binary frame parse errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes than a header plus CRC
    #[error("frame too short: {0} bytes")]
    TooShort(usize),
    /// Sync marker missing
    #[error("bad sync marker")]
    BadSync,
    /// Declared payload length disagrees with the frame size
    #[error("declared payload length {declared} does not fit frame of {actual} bytes")]
    LengthMismatch {
        /// Length from the header
        declared: usize,
        /// Bytes actually present
        actual: usize,
    },
    /// CRC mismatch
    #[error("CRC mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// CRC carried by the frame
        expected: u32,
        /// CRC recomputed over the frame
        computed: u32,
    },
}

/// Header fields of an inbound binary frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryHeader {
    /// Declared payload length
    pub payload_len: u16,
    /// Message type identifier
    pub message_id: u16,
}

/// Borrowed view of a validated binary frame
#[derive(Debug, Clone, Copy)]
pub struct BinaryFrame<'a> {
    /// Parsed header
    pub header: BinaryHeader,
    /// Payload bytes (without header and CRC)
    pub payload: &'a [u8],
}

impl<'a> BinaryFrame<'a> {
    /// Validate and split a complete frame (sync to CRC inclusive)
    pub fn parse(frame: &'a [u8]) -> Result<Self, FrameError> {
        if frame.len() < BINARY_HEADER_LEN + CRC_LEN {
            return Err(FrameError::TooShort(frame.len()));
        }
        if frame[..BINARY_SYNC.len()] != BINARY_SYNC {
            return Err(FrameError::BadSync);
        }

        let header = BinaryHeader {
            payload_len: u16::from_le_bytes([frame[3], frame[4]]),
            message_id: u16::from_le_bytes([frame[5], frame[6]]),
        };
        let declared = usize::from(header.payload_len);
        if BINARY_HEADER_LEN + declared + CRC_LEN != frame.len() {
            return Err(FrameError::LengthMismatch {
                declared,
                actual: frame.len(),
            });
        }

        let crc_at = frame.len() - CRC_LEN;
        if !verify_frame_crc32(frame) {
            return Err(FrameError::CrcMismatch {
                expected: trailing_crc32(frame).unwrap_or_default(),
                computed: frame_crc32(&frame[..crc_at]),
            });
        }

        Ok(Self {
            header,
            payload: &frame[BINARY_HEADER_LEN..crc_at],
        })
    }
}

/// Build a complete inbound-format binary frame around `payload`
///
/// Used by simulators and tests; the device itself produces these.
pub fn encode_binary(message_id: u16, payload: &[u8]) -> Vec<u8> {
    let len = u16::try_from(payload.len()).unwrap_or(u16::MAX);
    let payload = &payload[..usize::from(len)];

    let mut frame = Vec::with_capacity(BINARY_HEADER_LEN + payload.len() + CRC_LEN);
    frame.extend_from_slice(&BINARY_SYNC);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&message_id.to_le_bytes());
    frame.extend_from_slice(payload);
    let crc = frame_crc32(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// One delimited message handed out by [`FrameDecoder::push`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    /// Complete binary frame, sync to CRC inclusive
    Binary(&'a [u8]),
    /// Complete sentence, `$` to checksum digits inclusive
    Sentence(&'a [u8]),
}

/// Counters for one [`FrameDecoder::push`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushSummary {
    /// Messages delivered
    pub messages: usize,
    /// Bytes skipped during resynchronization
    pub skipped: usize,
}

/// Streaming frame decoder that handles partial data
///
/// Owns the accumulation buffer. Bytes are consumed strictly left to right
/// and an incomplete tail is kept verbatim for the next push.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create new decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
        }
    }

    /// Append `data` and deliver every complete message in stream order
    pub fn push<F>(&mut self, data: &[u8], mut on_message: F) -> PushSummary
    where
        F: FnMut(Message<'_>),
    {
        self.buffer.extend_from_slice(data);

        let mut summary = PushSummary::default();
        let mut offset = 0;
        while offset < self.buffer.len() {
            match scan(&self.buffer, offset) {
                ScanResult::Matched { kind, len } => {
                    let bytes = &self.buffer[offset..offset + len];
                    on_message(match kind {
                        MessageKind::Binary => Message::Binary(bytes),
                        MessageKind::Sentence => Message::Sentence(bytes),
                    });
                    summary.messages += 1;
                    offset += len;
                }
                ScanResult::Incomplete => break,
                ScanResult::NoMatch => {
                    summary.skipped += 1;
                    offset += 1;
                }
            }
        }

        self.buffer.advance(offset);
        summary
    }

    /// Bytes waiting for the rest of a message
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Clear buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &[u8] = b"$FP,TEXT,1,INFO,Fusion initialised*59";

    #[test]
    fn test_binary_match() {
        let frame = encode_binary(1429, &[1, 2, 3, 4]);
        assert_eq!(frame.len(), BINARY_HEADER_LEN + 4 + CRC_LEN);
        assert_eq!(
            scan(&frame, 0),
            ScanResult::Matched {
                kind: MessageKind::Binary,
                len: frame.len()
            }
        );
    }

    #[test]
    fn test_binary_incomplete_at_every_split() {
        let frame = encode_binary(7, &[9; 10]);
        for cut in 1..frame.len() {
            assert_eq!(scan(&frame[..cut], 0), ScanResult::Incomplete, "cut at {cut}");
        }
    }

    #[test]
    fn test_binary_crc_mismatch_is_no_match() {
        let mut frame = encode_binary(7, &[9; 10]);
        frame[BINARY_HEADER_LEN] ^= 0x80;
        assert_eq!(scan(&frame, 0), ScanResult::NoMatch);
    }

    #[test]
    fn test_sentence_match() {
        assert_eq!(
            scan(TEXT, 0),
            ScanResult::Matched {
                kind: MessageKind::Sentence,
                len: TEXT.len()
            }
        );
    }

    #[test]
    fn test_sentence_incomplete() {
        // No checksum marker yet
        assert_eq!(scan(b"$FP,TEXT,1", 0), ScanResult::Incomplete);
        // Marker present, digits missing
        assert_eq!(scan(b"$FP,TEXT*", 0), ScanResult::Incomplete);
        assert_eq!(scan(b"$FP,TEXT*5", 0), ScanResult::Incomplete);
        assert_eq!(scan(b"$", 0), ScanResult::Incomplete);
    }

    #[test]
    fn test_sentence_with_binary_garbage_is_no_match() {
        assert_eq!(scan(b"$FP,\x00\x01*00", 0), ScanResult::NoMatch);
    }

    #[test]
    fn test_second_start_marker_is_no_match() {
        assert_eq!(scan(b"$yy$FP,TEXT,1*00", 0), ScanResult::NoMatch);
        assert_eq!(
            scan(b"$yy$FP,TEXT,1*00", 3),
            ScanResult::Matched {
                kind: MessageKind::Sentence,
                len: 13
            }
        );
    }

    #[test]
    fn test_sentence_window_exhausted() {
        let mut long = vec![b'$'];
        long.resize(MAX_SENTENCE_LEN + 10, b'A');
        assert_eq!(scan(&long, 0), ScanResult::NoMatch);
    }

    #[test]
    fn test_no_match_and_offsets() {
        assert_eq!(scan(b"xyz", 0), ScanResult::NoMatch);
        assert_eq!(scan(b"\xAA\x44\x11", 0), ScanResult::NoMatch);
        assert_eq!(scan(b"\xAA\x44", 0), ScanResult::Incomplete);
        assert_eq!(scan(b"abc", 3), ScanResult::Incomplete);
        assert_eq!(scan(b"abc", 10), ScanResult::Incomplete);
    }

    #[test]
    fn test_parse_binary_frame() {
        let frame = encode_binary(0x1234, b"hello");
        let parsed = BinaryFrame::parse(&frame).unwrap();
        assert_eq!(parsed.header.message_id, 0x1234);
        assert_eq!(parsed.header.payload_len, 5);
        assert_eq!(parsed.payload, b"hello");

        assert_eq!(BinaryFrame::parse(&frame[..5]).unwrap_err(), FrameError::TooShort(5));
        let mut bad = frame.clone();
        bad[0] = 0;
        assert_eq!(BinaryFrame::parse(&bad).unwrap_err(), FrameError::BadSync);
        let mut bad = frame.clone();
        bad[8] ^= 1;
        let carried = u32::from_le_bytes(frame[frame.len() - 4..].try_into().unwrap());
        assert_eq!(
            BinaryFrame::parse(&bad).unwrap_err(),
            FrameError::CrcMismatch {
                expected: carried,
                computed: frame_crc32(&bad[..bad.len() - 4]),
            }
        );
    }

    #[test]
    fn test_decoder_carries_partial_message() {
        let mut decoder = FrameDecoder::new();
        let mut seen = Vec::new();

        let summary = decoder.push(&TEXT[..10], |m| seen.push(format!("{m:?}")));
        assert_eq!(summary.messages, 0);
        assert_eq!(decoder.pending(), &TEXT[..10]);

        let summary = decoder.push(&TEXT[10..], |m| seen.push(format!("{m:?}")));
        assert_eq!(summary.messages, 1);
        assert_eq!(seen.len(), 1);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn test_decoder_skips_garbage_one_byte_at_a_time() {
        let mut decoder = FrameDecoder::new();
        let mut stream = b"\r\njunk".to_vec();
        stream.extend_from_slice(TEXT);

        let mut count = 0;
        let summary = decoder.push(&stream, |_| count += 1);
        assert_eq!(count, 1);
        assert_eq!(summary.skipped, 6);
    }
}
