//! LLH sentence: geodetic position with ENU covariance

use super::{DecodeError, Fields};
use crate::core::records::LlhData;
use crate::core::transform::Vector3;

/// Decode `FP,LLH,1,...`; latitude and longitude arrive in degrees
pub fn decode(tokens: &[&str]) -> Result<LlhData, DecodeError> {
    let f = Fields::check("LLH", tokens, 1, 14)?;
    let lat: f64 = f.num(5)?;
    let lon: f64 = f.num(6)?;
    Ok(LlhData {
        stamp: f.gps_time(3)?,
        position: Vector3::new(lat.to_radians(), lon.to_radians(), f.num(7)?),
        position_cov: f.covariance(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::convert::samples::{self, tokens};

    #[test]
    fn test_decode() {
        let data = decode(&tokens(samples::LLH)).unwrap();
        assert_eq!(data.stamp.wno, 2231);
        assert!((data.position.x.to_degrees() - 47.392_357_470).abs() < 1e-12);
        assert!((data.position.y.to_degrees() - 8.448_121_451).abs() < 1e-12);
        assert_eq!(data.position.z, 473.5857);
        assert_eq!(data.position_cov.diagonal(), Vector3::new(0.04968, 0.03862, 0.08590));
        assert_eq!(data.position_cov.m[0][1], 0.00124);
        assert_eq!(data.position_cov.m[2][1], -0.01172);
        assert_eq!(data.position_cov.m[2][0], 0.00273);
    }

    #[test]
    fn test_rejects_other_counts() {
        let mut t = tokens(samples::LLH);
        t.pop();
        assert!(decode(&t).is_err());
    }
}
