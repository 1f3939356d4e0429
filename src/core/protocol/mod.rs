//! Wire protocol implementations
//!
//! - Checksum algorithms (frame CRC-32, sentence XOR)
//! - Stream framing for interleaved binary frames and text sentences
//! - Sentence tokenizer with checksum verification
//! - Wheel-speed telemetry frame encoder

pub mod checksum;
pub mod framing;
pub mod sentence;
pub mod wheelspeed;

pub use checksum::{frame_crc32, xor_checksum};
pub use framing::{
    encode_binary, scan, BinaryFrame, BinaryHeader, FrameDecoder, FrameError, Message, MessageKind,
    PushSummary, ScanResult,
};
pub use sentence::{encode_sentence, tokenize, SentenceError};
pub use wheelspeed::{WheelSpeedError, WheelSpeedFrame};
