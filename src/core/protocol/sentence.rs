//! Text sentence tokenizer
//!
//! The framer only delimits `$...*XX`; the checksum is verified here, when
//! the sentence is split into tokens for a converter.

use super::checksum::{format_hex_checksum, parse_hex_checksum, xor_checksum};
use super::framing::{CHECKSUM_MARKER, SENTENCE_START};
use thiserror::Error;

/// Field separator inside a sentence body
pub const FIELD_SEPARATOR: char = ',';

/// Sentence errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SentenceError {
    /// Does not begin with `$`
    #[error("sentence does not start with '$'")]
    MissingStart,
    /// No `*` checksum marker
    #[error("sentence has no checksum marker")]
    MissingChecksum,
    /// Checksum digits are not two hex characters
    #[error("invalid checksum digits")]
    InvalidChecksumDigits,
    /// Checksum mismatch
    #[error("checksum mismatch: sentence carries {expected:02X}, computed {computed:02X}")]
    ChecksumMismatch {
        /// Value carried by the sentence
        expected: u8,
        /// Value computed over the body
        computed: u8,
    },
    /// Body is not valid UTF-8
    #[error("sentence body is not valid UTF-8")]
    NotUtf8,
}

/// Verify the checksum of a complete sentence and return its body
/// (between `$` and `*`, both exclusive).
///
/// Trailing CR/LF after the checksum digits is tolerated.
pub fn verified_body(raw: &[u8]) -> Result<&str, SentenceError> {
    if raw.first() != Some(&SENTENCE_START) {
        return Err(SentenceError::MissingStart);
    }
    let raw = raw.trim_ascii_end();
    let star = raw
        .iter()
        .rposition(|&b| b == CHECKSUM_MARKER)
        .ok_or(SentenceError::MissingChecksum)?;

    let body = &raw[1..star];
    let expected =
        parse_hex_checksum(&raw[star + 1..]).ok_or(SentenceError::InvalidChecksumDigits)?;
    let computed = xor_checksum(body);
    if expected != computed {
        return Err(SentenceError::ChecksumMismatch { expected, computed });
    }

    std::str::from_utf8(body).map_err(|_| SentenceError::NotUtf8)
}

/// Verify and split a sentence into its comma-separated tokens
pub fn tokenize(raw: &[u8]) -> Result<Vec<&str>, SentenceError> {
    Ok(verified_body(raw)?.split(FIELD_SEPARATOR).collect())
}

/// Wrap a body into a complete sentence with checksum
pub fn encode_sentence(body: &str) -> String {
    format!(
        "{}{}{}{}",
        char::from(SENTENCE_START),
        body,
        char::from(CHECKSUM_MARKER),
        format_hex_checksum(xor_checksum(body.as_bytes()))
    )
}
