//! BESTGNSSPOS binary message
//!
//! Payload layout, little-endian, 72 bytes:
//!
//! | offset | type | field |
//! |---|---|---|
//! | 0 | u32 | solution status |
//! | 4 | u32 | position type |
//! | 8 | f64 | latitude \[deg\] |
//! | 16 | f64 | longitude \[deg\] |
//! | 24 | f64 | height above MSL \[m\] |
//! | 32 | f32 | undulation \[m\] |
//! | 36 | u32 | datum id |
//! | 40 | 3 x f32 | lat/lon/height standard deviation \[m\] |
//! | 52 | 4 x u8 | station id |
//! | 56 | f32 | differential age \[s\] |
//! | 60 | f32 | solution age \[s\] |
//! | 64 | 4 x u8 | satellites tracked / in solution / L1 / multi-frequency |
//! | 68 | u8 | reserved |
//! | 69 | 3 x u8 | extended status, Galileo/BeiDou mask, GPS/GLONASS mask |

use super::DecodeError;
use crate::core::records::BestGnssPosData;

/// Message id
pub const BESTGNSSPOS_MESSAGE_ID: u16 = 1429;
/// Payload size
pub const BESTGNSSPOS_PAYLOAD_LEN: usize = 72;

/// Little-endian field reader over a length-checked payload
struct Reader<'a> {
    payload: &'a [u8],
}

impl Reader<'_> {
    fn array<const N: usize>(&self, at: usize) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(bytes) = self.payload.get(at..at + N) {
            out.copy_from_slice(bytes);
        }
        out
    }

    fn u8(&self, at: usize) -> u8 {
        self.payload.get(at).copied().unwrap_or_default()
    }

    fn u32(&self, at: usize) -> u32 {
        u32::from_le_bytes(self.array(at))
    }

    fn f32(&self, at: usize) -> f32 {
        f32::from_le_bytes(self.array(at))
    }

    fn f64(&self, at: usize) -> f64 {
        f64::from_le_bytes(self.array(at))
    }
}

/// Decode a BESTGNSSPOS payload
pub fn decode(payload: &[u8]) -> Result<BestGnssPosData, DecodeError> {
    if payload.len() != BESTGNSSPOS_PAYLOAD_LEN {
        return Err(DecodeError::PayloadLength {
            family: "BESTGNSSPOS",
            expected: BESTGNSSPOS_PAYLOAD_LEN,
            actual: payload.len(),
        });
    }
    let r = Reader { payload };
    let station: [u8; 4] = r.array(52);

    Ok(BestGnssPosData {
        solution_status: r.u32(0),
        position_type: r.u32(4),
        latitude_deg: r.f64(8),
        longitude_deg: r.f64(16),
        height_msl: r.f64(24),
        undulation: r.f32(32),
        datum_id: r.u32(36),
        latitude_stdev: r.f32(40),
        longitude_stdev: r.f32(44),
        height_stdev: r.f32(48),
        station_id: String::from_utf8_lossy(&station)
            .trim_end_matches('\0')
            .to_string(),
        differential_age: r.f32(56),
        solution_age: r.f32(60),
        num_svs: r.u8(64),
        num_sol_svs: r.u8(65),
        num_sol_l1_svs: r.u8(66),
        num_sol_multi_svs: r.u8(67),
        ext_sol_status: r.u8(69),
        galileo_beidou_sig_mask: r.u8(70),
        gps_glonass_sig_mask: r.u8(71),
    })
}
