//! Checksum calculation algorithms
//!
//! Two algorithms are used on the wire:
//! - CRC-32 in the receiver's binary flavour (reflected polynomial 0xEDB88320,
//!   init 0, no final XOR) trailing every binary frame
//! - 8-bit XOR over the body of every text sentence

/// Pre-computed table for polynomial 0xEDB88320 (reflected 0x04C11DB7)
const CRC32_TABLE: [u32; 256] = build_crc32_table();

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Binary frame CRC-32
///
/// Same table as IEEE 802.3 CRC-32, but the register starts at zero and the
/// result is not inverted.
pub fn frame_crc32(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |crc, &byte| {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        CRC32_TABLE[index] ^ (crc >> 8)
    })
}

/// Little-endian CRC carried in the last 4 bytes of `frame`
pub fn trailing_crc32(frame: &[u8]) -> Option<u32> {
    let tail = frame.get(frame.len().checked_sub(4)?..)?;
    Some(u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]))
}

/// Verify the trailing CRC of `frame` against the CRC of everything before it.
pub fn verify_frame_crc32(frame: &[u8]) -> bool {
    match trailing_crc32(frame) {
        Some(expected) => frame_crc32(&frame[..frame.len() - 4]) == expected,
        None => false,
    }
}

/// XOR checksum - XOR of all bytes
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Parse two ASCII hex digits (either case) into a checksum byte
pub fn parse_hex_checksum(digits: &[u8]) -> Option<u8> {
    if digits.len() != 2 {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    u8::from_str_radix(text, 16).ok()
}

/// Format a checksum byte as the two uppercase hex digits used on the wire
pub fn format_hex_checksum(checksum: u8) -> String {
    format!("{checksum:02X}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor() {
        assert_eq!(xor_checksum(&[0x01, 0x02, 0x03]), 0x00);
        assert_eq!(xor_checksum(&[0xFF, 0x00]), 0xFF);
        assert_eq!(xor_checksum(b"FP,TEXT,1,INFO,Fusion initialised"), 0x59);
    }

    #[test]
    fn test_table_matches_ieee() {
        assert_eq!(CRC32_TABLE[1], 0x7707_3096);
        assert_eq!(CRC32_TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn test_frame_crc32_vector() {
        assert_eq!(frame_crc32(b"123456789"), 0x2DFD_2D88);
        assert_eq!(frame_crc32(&[]), 0);
    }

    #[test]
    fn test_verify_frame_crc32() {
        let mut frame = b"\xAA\x44\x12payload".to_vec();
        let crc = frame_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        assert!(verify_frame_crc32(&frame));
        assert_eq!(trailing_crc32(&frame), Some(crc));
        assert_eq!(trailing_crc32(&[1, 2, 3]), None);

        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(!verify_frame_crc32(&frame));
        assert!(!verify_frame_crc32(&[0x00, 0x01]));
    }

    #[test]
    fn test_single_bit_flip_always_detected() {
        let payload: Vec<u8> = (0u8..16).collect();
        let crc = frame_crc32(&payload);
        for byte in 0..payload.len() {
            for bit in 0..8 {
                let mut corrupted = payload.clone();
                corrupted[byte] ^= 1 << bit;
                assert_ne!(frame_crc32(&corrupted), crc, "flip at {byte}:{bit} undetected");
            }
        }
    }

    #[test]
    fn test_hex_checksum() {
        assert_eq!(parse_hex_checksum(b"4F"), Some(0x4F));
        assert_eq!(parse_hex_checksum(b"4f"), Some(0x4F));
        assert_eq!(parse_hex_checksum(b"G0"), None);
        assert_eq!(parse_hex_checksum(b"4"), None);
        assert_eq!(format_hex_checksum(0x0A), "0A");
    }
}
