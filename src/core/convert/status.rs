//! Status sentences: ODOMSTATUS, IMUBIAS, GNSSANT, GNSSCORR

use super::{DecodeError, Fields};
use crate::core::records::{GnssAntData, GnssCorrData, ImuBiasData, OdomStatusData};
use crate::core::transform::Vector3;

/// Decode `FP,ODOMSTATUS,1,...`
pub fn decode_odomstatus(tokens: &[&str]) -> Result<OdomStatusData, DecodeError> {
    let f = Fields::check("ODOMSTATUS", tokens, 1, 30)?;
    // 13, 14 and 27..=29 are reserved
    Ok(OdomStatusData {
        stamp: f.gps_time(3)?,
        init_status: f.num(5)?,
        fusion_imu: f.num(6)?,
        fusion_gnss1: f.num(7)?,
        fusion_gnss2: f.num(8)?,
        fusion_corr: f.num(9)?,
        fusion_cam1: f.num(10)?,
        fusion_ws: f.num(11)?,
        fusion_markers: f.num(12)?,
        imu_status: f.num(15)?,
        imu_noise: f.num(16)?,
        imu_conv: f.num(17)?,
        gnss1_status: f.num(18)?,
        gnss2_status: f.num(19)?,
        baseline_status: f.num(20)?,
        corr_status: f.num(21)?,
        cam1_status: f.num(22)?,
        ws_status: f.num(23)?,
        ws_conv: f.num(24)?,
        markers_status: f.num(25)?,
        markers_conv: f.num(26)?,
    })
}

/// Decode `FP,IMUBIAS,1,...`
pub fn decode_imubias(tokens: &[&str]) -> Result<ImuBiasData, DecodeError> {
    let f = Fields::check("IMUBIAS", tokens, 1, 21)?;
    Ok(ImuBiasData {
        stamp: f.gps_time(3)?,
        fusion_imu: f.num(5)?,
        imu_status: f.num(6)?,
        imu_noise: f.num(7)?,
        imu_conv: f.num(8)?,
        bias_acc: f.vector3(9)?,
        bias_gyr: f.vector3(12)?,
        bias_cov_acc: f.vector3(15)?,
        bias_cov_gyr: f.vector3(18)?,
    })
}

/// Decode `FP,GNSSANT,1,...`
pub fn decode_gnssant(tokens: &[&str]) -> Result<GnssAntData, DecodeError> {
    let f = Fields::check("GNSSANT", tokens, 1, 11)?;
    Ok(GnssAntData {
        stamp: f.gps_time(3)?,
        gnss1_state: f.str(5).to_string(),
        gnss1_power: f.str(6).to_string(),
        gnss1_age: f.num(7)?,
        gnss2_state: f.str(8).to_string(),
        gnss2_power: f.str(9).to_string(),
        gnss2_age: f.num(10)?,
    })
}

/// Decode `FP,GNSSCORR,1,...`; station latitude/longitude arrive in degrees
pub fn decode_gnsscorr(tokens: &[&str]) -> Result<GnssCorrData, DecodeError> {
    let f = Fields::check("GNSSCORR", tokens, 1, 20)?;
    let lat: f64 = f.num(16)?;
    let lon: f64 = f.num(17)?;
    Ok(GnssCorrData {
        stamp: f.gps_time(3)?,
        gnss1_fix: f.num(5)?,
        gnss1_nsig_l1: f.num(6)?,
        gnss1_nsig_l2: f.num(7)?,
        gnss2_fix: f.num(8)?,
        gnss2_nsig_l1: f.num(9)?,
        gnss2_nsig_l2: f.num(10)?,
        corr_latency: f.num(11)?,
        corr_update_rate: f.num(12)?,
        corr_data_rate: f.num(13)?,
        corr_msg_rate: f.num(14)?,
        station_id: f.num(15)?,
        station_position: Vector3::new(lat.to_radians(), lon.to_radians(), f.num(18)?),
        station_distance: f.num(19)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::convert::samples::{self, tokens};

    #[test]
    fn test_odomstatus() {
        let data = decode_odomstatus(&tokens(samples::ODOMSTATUS)).unwrap();
        assert_eq!(data.stamp.wno, 2234);
        assert_eq!(data.init_status, 2);
        assert_eq!(
            (data.fusion_imu, data.fusion_gnss1, data.fusion_gnss2, data.fusion_corr),
            (1, 1, 1, 1)
        );
        assert_eq!((data.fusion_cam1, data.fusion_ws, data.fusion_markers), (0, 1, 0));
        assert_eq!((data.imu_status, data.imu_noise, data.imu_conv), (1, 0, 1));
        assert_eq!((data.gnss1_status, data.gnss2_status, data.baseline_status), (8, 8, 1));
        assert_eq!((data.corr_status, data.cam1_status), (5, 0));
        assert_eq!((data.ws_status, data.ws_conv), (2, 1));
        assert_eq!((data.markers_status, data.markers_conv), (0, 0));
    }

    #[test]
    fn test_imubias() {
        let data = decode_imubias(&tokens(samples::IMUBIAS)).unwrap();
        assert_eq!(data.stamp.wno, 2342);
        assert_eq!((data.fusion_imu, data.imu_status, data.imu_noise, data.imu_conv), (2, 1, 0, 3));
        assert!(data.bias_acc.is_zero() && data.bias_cov_gyr.is_zero());
    }

    #[test]
    fn test_gnssant() {
        let data = decode_gnssant(&tokens(samples::GNSSANT)).unwrap();
        assert_eq!(data.gnss1_state, "ok");
        assert_eq!(data.gnss2_power, "on");
        assert_eq!((data.gnss1_age, data.gnss2_age), (0, 0));
    }

    #[test]
    fn test_gnsscorr() {
        let data = decode_gnsscorr(&tokens(samples::GNSSCORR)).unwrap();
        assert_eq!((data.gnss1_fix, data.gnss1_nsig_l1, data.gnss1_nsig_l2), (8, 30, 28));
        assert_eq!((data.gnss2_fix, data.gnss2_nsig_l1, data.gnss2_nsig_l2), (8, 29, 27));
        assert_eq!(data.corr_latency, 0.5);
        assert_eq!(data.corr_data_rate, 800.0);
        assert_eq!(data.station_id, 0);
        assert!((data.station_position.x.to_degrees() - 47.4).abs() < 1e-12);
        assert_eq!(data.station_position.z, 480.0);
        assert_eq!(data.station_distance, 5.123);
    }
}
