//! ODOMETRY, ODOMENU and ODOMSH sentences
//!
//! The ECEF odometry converter also watches for position jumps: when the
//! new position differs from the previous one by more than the previous
//! position covariance on any axis, a [`Record::CovWarn`] follows the
//! odometry record.

use super::{DecodeError, Fields};
use crate::core::records::{CovWarnData, OdometryData, OdometryFamily, Record};
use crate::core::transform::{Matrix3, Vector3};

/// Frame of the ECEF pose
pub const FRAME_ECEF: &str = "FP_ECEF";
/// Frame of the local ENU origin
pub const FRAME_ENU0: &str = "FP_ENU0";
/// Point of interest
pub const FRAME_POI: &str = "FP_POI";
/// Smooth point of interest
pub const FRAME_POISH: &str = "FP_POISH";

const IDX_STAMP: usize = 3;
const IDX_POSITION: usize = 5;
const IDX_ORIENTATION: usize = 8;
const IDX_VELOCITY: usize = 12;
const IDX_ANGULAR: usize = 15;
const IDX_ACCELERATION: usize = 18;
const IDX_FUSION: usize = 21;
const IDX_POSITION_COV: usize = 26;
const IDX_ORIENTATION_COV: usize = 32;
const IDX_VELOCITY_COV: usize = 38;
const IDX_SW_VERSION: usize = 44;

/// Previous sample for jump detection
#[derive(Debug, Clone, Copy)]
struct LastPosition {
    position: Vector3,
    covariance: Matrix3,
}

/// Converter for one odometry family
#[derive(Debug)]
pub struct OdometryConverter {
    family: OdometryFamily,
    last: Option<LastPosition>,
}

impl OdometryConverter {
    /// Create a converter for `family`
    pub fn new(family: OdometryFamily) -> Self {
        Self { family, last: None }
    }

    /// Family handled by this converter
    pub fn family(&self) -> OdometryFamily {
        self.family
    }

    fn layout(&self) -> (&'static str, u32, usize, &'static str, &'static str) {
        match self.family {
            OdometryFamily::Odometry => ("ODOMETRY", 2, 45, FRAME_ECEF, FRAME_POI),
            OdometryFamily::OdomEnu => ("ODOMENU", 1, 44, FRAME_ENU0, FRAME_POI),
            OdometryFamily::OdomSh => ("ODOMSH", 1, 44, FRAME_ECEF, FRAME_POISH),
        }
    }

    /// Decode one sentence into its odometry record
    pub fn decode(&self, tokens: &[&str]) -> Result<OdometryData, DecodeError> {
        let (name, version, count, frame_id, child_frame_id) = self.layout();
        let f = Fields::check(name, tokens, version, count)?;

        let sw_version = match self.family {
            OdometryFamily::Odometry => Some(f.str(IDX_SW_VERSION).to_string()),
            _ => None,
        };

        Ok(OdometryData {
            family: self.family,
            stamp: f.gps_time(IDX_STAMP)?,
            frame_id: frame_id.to_string(),
            child_frame_id: child_frame_id.to_string(),
            position: f.vector3(IDX_POSITION)?,
            orientation: f.quaternion(IDX_ORIENTATION)?,
            velocity: f.vector3(IDX_VELOCITY)?,
            angular_velocity: f.vector3(IDX_ANGULAR)?,
            acceleration: f.vector3(IDX_ACCELERATION)?,
            position_cov: f.covariance(IDX_POSITION_COV)?,
            orientation_cov: f.covariance(IDX_ORIENTATION_COV)?,
            velocity_cov: f.covariance(IDX_VELOCITY_COV)?,
            fusion_status: f.num(IDX_FUSION)?,
            imu_bias_status: f.num(IDX_FUSION + 1)?,
            gnss1_status: f.num(IDX_FUSION + 2)?,
            gnss2_status: f.num(IDX_FUSION + 3)?,
            wheelspeed_status: f.num(IDX_FUSION + 4)?,
            sw_version,
        })
    }

    /// Decode and emit the odometry record, then any jump warning
    pub fn convert<F: FnMut(Record)>(&mut self, tokens: &[&str], emit: &mut F) -> Result<(), DecodeError> {
        let data = self.decode(tokens)?;
        let warning = match self.family {
            OdometryFamily::Odometry => self.check_jump(&data),
            _ => None,
        };
        emit(Record::Odometry(data));
        if let Some(warning) = warning {
            emit(Record::CovWarn(warning));
        }
        Ok(())
    }

    fn check_jump(&mut self, data: &OdometryData) -> Option<CovWarnData> {
        let previous = self.last.replace(LastPosition {
            position: data.position,
            covariance: data.position_cov,
        })?;
        if previous.position.is_zero() {
            return None;
        }

        let jump = data.position - previous.position;
        let bound = previous.covariance.diagonal();
        let delta = jump.abs();
        if delta.x <= bound.x && delta.y <= bound.y && delta.z <= bound.z {
            return None;
        }

        tracing::warn!(
            stamp = %data.stamp,
            jump = ?jump.to_array(),
            covariance = ?bound.to_array(),
            "position jump larger than the previous covariance"
        );
        Some(CovWarnData {
            stamp: data.stamp,
            jump,
            covariance: bound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::convert::samples::{self, tokens};
    use crate::core::protocol::encode_sentence;
    use crate::core::records::RecordKind;

    fn run(converter: &mut OdometryConverter, sentence: &str) -> Vec<Record> {
        let mut out = Vec::new();
        converter.convert(&tokens(sentence), &mut |r| out.push(r)).unwrap();
        out
    }

    #[test]
    fn test_decode_odometry() {
        let converter = OdometryConverter::new(OdometryFamily::Odometry);
        let data = converter.decode(&tokens(samples::ODOMETRY)).unwrap();
        assert_eq!(data.stamp.wno, 2231);
        assert_eq!(data.stamp.tow, 227_610.75);
        assert_eq!(data.frame_id, "FP_ECEF");
        assert_eq!(data.child_frame_id, "FP_POI");
        assert_eq!(data.position, Vector3::new(4_279_243.1641, 635_824.2171, 4_671_589.8683));
        assert_eq!(data.orientation.w, -0.412_792);
        assert_eq!(data.orientation.z, 0.854_251);
        assert_eq!(data.velocity.x, 17.0001);
        assert_eq!(data.acceleration.z, 9.8034);
        assert_eq!(
            (data.fusion_status, data.imu_bias_status, data.gnss1_status, data.gnss2_status, data.wheelspeed_status),
            (4, 1, 8, 8, 1)
        );
        assert_eq!(data.position_cov.diagonal(), Vector3::new(0.01056, 0.01001, 0.03849));
        // xy, yz, xz land symmetric
        assert_eq!(data.position_cov.m[0][1], -0.00323);
        assert_eq!(data.position_cov.m[1][0], -0.00323);
        assert_eq!(data.position_cov.m[1][2], 0.00585);
        assert_eq!(data.position_cov.m[0][2], -0.00217);
        assert_eq!(data.velocity_cov.m[2][2], 0.00067);
        assert_eq!(data.sw_version.as_deref(), Some("fp_release_vr2_2.54.0_160"));

        let pose_cov = data.pose_covariance();
        assert_eq!(pose_cov.m[3][3], 0.00036);
        assert_eq!(pose_cov.m[0][3], 0.0);
    }

    #[test]
    fn test_odomenu_and_odomsh_layouts() {
        let body = samples::ODOMETRY
            .trim_start_matches('$')
            .split('*')
            .next()
            .unwrap()
            .rsplit_once(',')
            .unwrap()
            .0
            .to_string();

        let enu = encode_sentence(&body.replacen("ODOMETRY,2", "ODOMENU,1", 1));
        let data = OdometryConverter::new(OdometryFamily::OdomEnu)
            .decode(&tokens(&enu))
            .unwrap();
        assert_eq!((data.frame_id.as_str(), data.child_frame_id.as_str()), ("FP_ENU0", "FP_POI"));
        assert_eq!(data.sw_version, None);

        let sh = encode_sentence(&body.replacen("ODOMETRY,2", "ODOMSH,1", 1));
        let data = OdometryConverter::new(OdometryFamily::OdomSh)
            .decode(&tokens(&sh))
            .unwrap();
        assert_eq!((data.frame_id.as_str(), data.child_frame_id.as_str()), ("FP_ECEF", "FP_POISH"));
    }

    #[test]
    fn test_rejects_wrong_version() {
        let v1 = encode_sentence(
            &samples::ODOMETRY[1..samples::ODOMETRY.len() - 3].replacen("ODOMETRY,2", "ODOMETRY,1", 1),
        );
        let converter = OdometryConverter::new(OdometryFamily::Odometry);
        assert!(matches!(
            converter.decode(&tokens(&v1)),
            Err(DecodeError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_jump_detection() {
        let mut converter = OdometryConverter::new(OdometryFamily::Odometry);
        let first = run(&mut converter, samples::ODOMETRY);
        assert_eq!(first.len(), 1);

        // same position: no warning
        let again = run(&mut converter, samples::ODOMETRY);
        assert_eq!(again.len(), 1);

        // move X by 1 m, well beyond a 0.01056 covariance
        let moved = encode_sentence(
            &samples::ODOMETRY[1..samples::ODOMETRY.len() - 3].replacen("4279243.1641", "4279244.1641", 1),
        );
        let out = run(&mut converter, &moved);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind(), RecordKind::Odometry);
        let Record::CovWarn(warning) = &out[1] else {
            panic!("expected a jump warning");
        };
        assert!((warning.jump.x - 1.0).abs() < 1e-6);
        assert_eq!(warning.covariance, Vector3::new(0.01056, 0.01001, 0.03849));
    }

    #[test]
    fn test_no_jump_from_zero_position() {
        let mut converter = OdometryConverter::new(OdometryFamily::Odometry);
        let zero = encode_sentence(
            &samples::ODOMETRY[1..samples::ODOMETRY.len() - 3]
                .replacen("4279243.1641,635824.2171,4671589.8683", "0,0,0", 1),
        );
        assert_eq!(run(&mut converter, &zero).len(), 1);
        assert_eq!(run(&mut converter, samples::ODOMETRY).len(), 1);
    }

    #[test]
    fn test_enu_family_skips_jump_detection() {
        let mut converter = OdometryConverter::new(OdometryFamily::OdomEnu);
        let body = samples::ODOMETRY[1..samples::ODOMETRY.len() - 3].replacen("ODOMETRY,2", "ODOMENU,1", 1);
        let body = body.rsplit_once(',').unwrap().0;
        let a = encode_sentence(body);
        let b = encode_sentence(&body.replacen("4279243.1641", "4279299.0", 1));
        assert_eq!(run(&mut converter, &a).len(), 1);
        assert_eq!(run(&mut converter, &b).len(), 1);
    }
}
