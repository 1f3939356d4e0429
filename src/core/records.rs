//! Decoded telemetry records
//!
//! Every converter produces [`Record`] values; the sink receives them keyed
//! by [`RecordKind`]. Angles are radians unless a field says otherwise.

use crate::core::transform::{Matrix3, Matrix6, Quaternion, Transform, Vector3};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Seconds in a GPS week
pub const SECONDS_PER_WEEK: f64 = 604_800.0;
/// Current GPS-UTC leap second offset
pub const GPS_LEAP_SECONDS: i64 = 18;

/// GPS time stamp: week number and time of week in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GpsTime {
    /// Week number
    pub wno: u16,
    /// Time of week \[s\]
    pub tow: f64,
}

impl GpsTime {
    /// Create a stamp
    pub fn new(wno: u16, tow: f64) -> Self {
        Self { wno, tow }
    }

    /// Week 0 and tow 0.0, i.e. the device has no time yet
    pub fn is_zero(&self) -> bool {
        self.wno == 0 && self.tow == 0.0
    }

    /// Convert to UTC (GPS epoch 1980-01-06 minus the leap second offset)
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let epoch = Utc.with_ymd_and_hms(1980, 1, 6, 0, 0, 0).single()?;
        let seconds = f64::from(self.wno) * SECONDS_PER_WEEK + self.tow;
        #[allow(clippy::cast_possible_truncation)]
        let micros = (seconds * 1e6).round() as i64;
        epoch.checked_add_signed(Duration::microseconds(micros) - Duration::seconds(GPS_LEAP_SECONDS))
    }
}

impl fmt::Display for GpsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:.6}", self.wno, self.tow)
    }
}

// ============ Odometry ============

/// Which odometry sentence produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OdometryFamily {
    /// ECEF pose of the point of interest
    Odometry,
    /// ENU0 pose of the point of interest
    OdomEnu,
    /// ECEF pose of the smooth point of interest
    OdomSh,
}

/// Fused pose, velocity and covariances
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OdometryData {
    /// Producing sentence
    pub family: OdometryFamily,
    /// Time stamp
    pub stamp: GpsTime,
    /// Parent frame
    pub frame_id: String,
    /// Child frame
    pub child_frame_id: String,
    /// Position \[m\]
    pub position: Vector3,
    /// Orientation
    pub orientation: Quaternion,
    /// Linear velocity \[m/s\]
    pub velocity: Vector3,
    /// Angular velocity \[rad/s\]
    pub angular_velocity: Vector3,
    /// Linear acceleration \[m/s^2\]
    pub acceleration: Vector3,
    /// Position covariance
    pub position_cov: Matrix3,
    /// Orientation covariance
    pub orientation_cov: Matrix3,
    /// Velocity covariance
    pub velocity_cov: Matrix3,
    /// Fusion status
    pub fusion_status: i32,
    /// IMU bias status
    pub imu_bias_status: i32,
    /// GNSS1 fix type
    pub gnss1_status: i32,
    /// GNSS2 fix type
    pub gnss2_status: i32,
    /// Wheel-speed status
    pub wheelspeed_status: i32,
    /// Firmware version, carried by ODOMETRY only
    pub sw_version: Option<String>,
}

impl OdometryData {
    /// 6x6 pose covariance: position block, then orientation block
    pub fn pose_covariance(&self) -> Matrix6 {
        Matrix6::block_diagonal(&self.position_cov, &self.orientation_cov)
    }

    /// 6x6 twist covariance; only the linear velocity block is known
    pub fn twist_covariance(&self) -> Matrix6 {
        Matrix6::block_diagonal(&self.velocity_cov, &Matrix3::zero())
    }

    /// Pose as a rigid transform
    pub fn pose(&self) -> Transform {
        Transform::new(self.position, self.orientation)
    }
}

/// Fusion and sensor status summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OdomStatusData {
    /// Time stamp
    pub stamp: GpsTime,
    /// Initialisation status
    pub init_status: i32,
    /// Fusion IMU measurement status
    pub fusion_imu: i32,
    /// Fusion GNSS1 measurement status
    pub fusion_gnss1: i32,
    /// Fusion GNSS2 measurement status
    pub fusion_gnss2: i32,
    /// Fusion correction status
    pub fusion_corr: i32,
    /// Fusion camera status
    pub fusion_cam1: i32,
    /// Fusion wheel-speed status
    pub fusion_ws: i32,
    /// Fusion marker status
    pub fusion_markers: i32,
    /// IMU status
    pub imu_status: i32,
    /// IMU noise level
    pub imu_noise: i32,
    /// IMU convergence
    pub imu_conv: i32,
    /// GNSS1 fix
    pub gnss1_status: i32,
    /// GNSS2 fix
    pub gnss2_status: i32,
    /// Dual-antenna baseline status
    pub baseline_status: i32,
    /// Correction status
    pub corr_status: i32,
    /// Camera status
    pub cam1_status: i32,
    /// Wheel-speed status
    pub ws_status: i32,
    /// Wheel-speed convergence
    pub ws_conv: i32,
    /// Marker status
    pub markers_status: i32,
    /// Marker convergence
    pub markers_conv: i32,
}

// ============ Position ============

/// Geodetic position with ENU covariance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlhData {
    /// Time stamp
    pub stamp: GpsTime,
    /// Latitude \[rad\], longitude \[rad\], height \[m\]
    pub position: Vector3,
    /// Position covariance in ENU
    pub position_cov: Matrix3,
}

/// Derived geodetic fix, in the shape of a satellite-fix message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavSatFixData {
    /// Time stamp
    pub stamp: GpsTime,
    /// Frame of the fix
    pub frame_id: String,
    /// Latitude \[deg\]
    pub latitude_deg: f64,
    /// Longitude \[deg\]
    pub longitude_deg: f64,
    /// Height \[m\]
    pub altitude: f64,
    /// Position covariance in ENU
    pub position_cov: Matrix3,
    /// 0 unknown, 3 known
    pub position_cov_type: u8,
    /// -1 no fix, 0 fix, 2 GBAS fix
    pub status: i8,
}

/// Receiver best GNSS position (binary message)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestGnssPosData {
    /// Solution status
    pub solution_status: u32,
    /// Position type
    pub position_type: u32,
    /// Latitude \[deg\]
    pub latitude_deg: f64,
    /// Longitude \[deg\]
    pub longitude_deg: f64,
    /// Height above mean sea level \[m\]
    pub height_msl: f64,
    /// Geoid undulation \[m\]
    pub undulation: f32,
    /// Datum identifier
    pub datum_id: u32,
    /// Latitude standard deviation \[m\]
    pub latitude_stdev: f32,
    /// Longitude standard deviation \[m\]
    pub longitude_stdev: f32,
    /// Height standard deviation \[m\]
    pub height_stdev: f32,
    /// Base station identifier
    pub station_id: String,
    /// Differential age \[s\]
    pub differential_age: f32,
    /// Solution age \[s\]
    pub solution_age: f32,
    /// Satellites tracked
    pub num_svs: u8,
    /// Satellites used in the solution
    pub num_sol_svs: u8,
    /// Satellites with L1 used in the solution
    pub num_sol_l1_svs: u8,
    /// Satellites with multiple frequencies used in the solution
    pub num_sol_multi_svs: u8,
    /// Extended solution status
    pub ext_sol_status: u8,
    /// Galileo and BeiDou signal mask
    pub galileo_beidou_sig_mask: u8,
    /// GPS and GLONASS signal mask
    pub gps_glonass_sig_mask: u8,
}

/// Position jump beyond the previous covariance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CovWarnData {
    /// Time stamp of the new sample
    pub stamp: GpsTime,
    /// Position change \[m\]
    pub jump: Vector3,
    /// Diagonal of the previous position covariance
    pub covariance: Vector3,
}

// ============ Inertial ============

/// Source of an IMU record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImuSource {
    /// RAWIMU sentence
    Raw,
    /// CORRIMU sentence
    Corrected,
    /// Derived from odometry
    Odometry,
}

/// Accelerometer and gyroscope sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImuData {
    /// Producing source
    pub source: ImuSource,
    /// Time stamp
    pub stamp: GpsTime,
    /// Sensor frame
    pub frame_id: String,
    /// Linear acceleration \[m/s^2\]
    pub acceleration: Vector3,
    /// Angular velocity \[rad/s\]
    pub angular_velocity: Vector3,
}

/// IMU bias estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImuBiasData {
    /// Time stamp
    pub stamp: GpsTime,
    /// Fusion IMU measurement status
    pub fusion_imu: i32,
    /// IMU status
    pub imu_status: i32,
    /// IMU noise level
    pub imu_noise: i32,
    /// IMU convergence
    pub imu_conv: i32,
    /// Accelerometer bias \[m/s^2\]
    pub bias_acc: Vector3,
    /// Gyroscope bias \[rad/s\]
    pub bias_gyr: Vector3,
    /// Accelerometer bias covariance
    pub bias_cov_acc: Vector3,
    /// Gyroscope bias covariance
    pub bias_cov_gyr: Vector3,
}

/// Orientation in ENU as yaw, pitch, roll
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YprData {
    /// Time stamp
    pub stamp: GpsTime,
    /// Frame of the angles
    pub frame_id: String,
    /// Yaw, pitch, roll \[rad\]
    pub ypr: Vector3,
}

// ============ Frames, GNSS, misc ============

/// Rigid transform between two frames
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TfData {
    /// Time stamp
    pub stamp: GpsTime,
    /// Parent frame
    pub frame_id: String,
    /// Child frame
    pub child_frame_id: String,
    /// Transform parent -> child
    pub transform: Transform,
}

/// Antenna state of both GNSS receivers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GnssAntData {
    /// Time stamp
    pub stamp: GpsTime,
    /// GNSS1 antenna state
    pub gnss1_state: String,
    /// GNSS1 antenna power
    pub gnss1_power: String,
    /// Seconds since GNSS1 state change
    pub gnss1_age: u32,
    /// GNSS2 antenna state
    pub gnss2_state: String,
    /// GNSS2 antenna power
    pub gnss2_power: String,
    /// Seconds since GNSS2 state change
    pub gnss2_age: u32,
}

/// GNSS correction status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GnssCorrData {
    /// Time stamp
    pub stamp: GpsTime,
    /// GNSS1 fix type
    pub gnss1_fix: i32,
    /// GNSS1 L1 signals
    pub gnss1_nsig_l1: i32,
    /// GNSS1 L2 signals
    pub gnss1_nsig_l2: i32,
    /// GNSS2 fix type
    pub gnss2_fix: i32,
    /// GNSS2 L1 signals
    pub gnss2_nsig_l1: i32,
    /// GNSS2 L2 signals
    pub gnss2_nsig_l2: i32,
    /// Correction latency \[s\]
    pub corr_latency: f64,
    /// Correction update rate \[Hz\]
    pub corr_update_rate: f64,
    /// Correction data rate \[B/s\]
    pub corr_data_rate: f64,
    /// Correction message rate \[Hz\]
    pub corr_msg_rate: f64,
    /// Base station identifier
    pub station_id: i32,
    /// Station latitude \[rad\], longitude \[rad\], height \[m\]
    pub station_position: Vector3,
    /// Distance to the station \[m\]
    pub station_distance: f64,
}

/// Free text from the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextData {
    /// Severity as sent by the device
    pub level: String,
    /// Message text
    pub text: String,
}

/// Time pulse annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePulseData {
    /// Pulse source
    pub name: String,
    /// Time base
    pub timebase: String,
    /// Time reference
    pub timeref: String,
    /// Whole seconds of week
    pub tow_sec: u32,
    /// Sub-second part \[s\]
    pub tow_sub_sec: f64,
    /// GPS leap seconds, when known
    pub gps_leaps: Option<i32>,
}

/// End of a fusion or sensor epoch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndOfEpochData {
    /// Time stamp
    pub stamp: GpsTime,
    /// Epoch name
    pub epoch: String,
}

// ============ Record ============

/// Record type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// ODOMETRY
    Odometry,
    /// ODOMENU
    OdomEnu,
    /// ODOMSH
    OdomSh,
    /// ODOMSTATUS
    OdomStatus,
    /// LLH
    Llh,
    /// RAWIMU
    RawImu,
    /// CORRIMU
    CorrImu,
    /// IMU derived from odometry
    PoiImu,
    /// IMUBIAS
    ImuBias,
    /// Transform
    Tf,
    /// GNSSANT
    GnssAnt,
    /// GNSSCORR
    GnssCorr,
    /// TEXT
    Text,
    /// TP
    TimePulse,
    /// EOE
    EndOfEpoch,
    /// BESTGNSSPOS
    BestGnssPos,
    /// Position jump warning
    CovWarn,
    /// Geodetic fix derived from odometry
    NavSatFix,
    /// ENU yaw/pitch/roll derived from odometry
    Ypr,
}

impl RecordKind {
    /// Every kind
    pub const ALL: [Self; 19] = [
        Self::Odometry,
        Self::OdomEnu,
        Self::OdomSh,
        Self::OdomStatus,
        Self::Llh,
        Self::RawImu,
        Self::CorrImu,
        Self::PoiImu,
        Self::ImuBias,
        Self::Tf,
        Self::GnssAnt,
        Self::GnssCorr,
        Self::Text,
        Self::TimePulse,
        Self::EndOfEpoch,
        Self::BestGnssPos,
        Self::CovWarn,
        Self::NavSatFix,
        Self::Ypr,
    ];

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Odometry => "odometry",
            Self::OdomEnu => "odomenu",
            Self::OdomSh => "odomsh",
            Self::OdomStatus => "odomstatus",
            Self::Llh => "llh",
            Self::RawImu => "rawimu",
            Self::CorrImu => "corrimu",
            Self::PoiImu => "poiimu",
            Self::ImuBias => "imubias",
            Self::Tf => "tf",
            Self::GnssAnt => "gnssant",
            Self::GnssCorr => "gnsscorr",
            Self::Text => "text",
            Self::TimePulse => "tp",
            Self::EndOfEpoch => "eoe",
            Self::BestGnssPos => "bestgnsspos",
            Self::CovWarn => "covwarn",
            Self::NavSatFix => "navsatfix",
            Self::Ypr => "ypr",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown record kind: {s}"))
    }
}

/// Decoded record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    /// ODOMETRY, ODOMENU or ODOMSH
    Odometry(OdometryData),
    /// ODOMSTATUS
    OdomStatus(OdomStatusData),
    /// LLH
    Llh(LlhData),
    /// RAWIMU, CORRIMU or odometry-derived IMU
    Imu(ImuData),
    /// IMUBIAS
    ImuBias(ImuBiasData),
    /// TF or derived transform
    Transform(TfData),
    /// GNSSANT
    GnssAnt(GnssAntData),
    /// GNSSCORR
    GnssCorr(GnssCorrData),
    /// TEXT
    Text(TextData),
    /// TP
    TimePulse(TimePulseData),
    /// EOE
    EndOfEpoch(EndOfEpochData),
    /// BESTGNSSPOS
    BestGnssPos(BestGnssPosData),
    /// Position jump warning
    CovWarn(CovWarnData),
    /// Derived geodetic fix
    NavSatFix(NavSatFixData),
    /// Derived Euler angles
    Ypr(YprData),
}

impl Record {
    /// Type tag of this record
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Odometry(d) => match d.family {
                OdometryFamily::Odometry => RecordKind::Odometry,
                OdometryFamily::OdomEnu => RecordKind::OdomEnu,
                OdometryFamily::OdomSh => RecordKind::OdomSh,
            },
            Self::OdomStatus(_) => RecordKind::OdomStatus,
            Self::Llh(_) => RecordKind::Llh,
            Self::Imu(d) => match d.source {
                ImuSource::Raw => RecordKind::RawImu,
                ImuSource::Corrected => RecordKind::CorrImu,
                ImuSource::Odometry => RecordKind::PoiImu,
            },
            Self::ImuBias(_) => RecordKind::ImuBias,
            Self::Transform(_) => RecordKind::Tf,
            Self::GnssAnt(_) => RecordKind::GnssAnt,
            Self::GnssCorr(_) => RecordKind::GnssCorr,
            Self::Text(_) => RecordKind::Text,
            Self::TimePulse(_) => RecordKind::TimePulse,
            Self::EndOfEpoch(_) => RecordKind::EndOfEpoch,
            Self::BestGnssPos(_) => RecordKind::BestGnssPos,
            Self::CovWarn(_) => RecordKind::CovWarn,
            Self::NavSatFix(_) => RecordKind::NavSatFix,
            Self::Ypr(_) => RecordKind::Ypr,
        }
    }

    /// Device time stamp, when the record carries one
    pub fn stamp(&self) -> Option<GpsTime> {
        match self {
            Self::Odometry(d) => Some(d.stamp),
            Self::OdomStatus(d) => Some(d.stamp),
            Self::Llh(d) => Some(d.stamp),
            Self::Imu(d) => Some(d.stamp),
            Self::ImuBias(d) => Some(d.stamp),
            Self::Transform(d) => Some(d.stamp),
            Self::GnssAnt(d) => Some(d.stamp),
            Self::GnssCorr(d) => Some(d.stamp),
            Self::EndOfEpoch(d) => Some(d.stamp),
            Self::CovWarn(d) => Some(d.stamp),
            Self::NavSatFix(d) => Some(d.stamp),
            Self::Ypr(d) => Some(d.stamp),
            Self::Text(_) | Self::TimePulse(_) | Self::BestGnssPos(_) => None,
        }
    }

    /// JSON object `{"kind": ..., "data": ...}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "kind": self.kind(), "data": self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_zero_stamp() {
        assert!(GpsTime::default().is_zero());
        assert!(!GpsTime::new(0, 0.5).is_zero());
        assert!(!GpsTime::new(1, 0.0).is_zero());
    }

    #[test]
    fn test_gps_to_utc() {
        let epoch = GpsTime::new(0, 18.0).to_utc().unwrap();
        assert_eq!(epoch, Utc.with_ymd_and_hms(1980, 1, 6, 0, 0, 0).unwrap());

        // week 2231, tow 227610.75 -> 2022-10-11T15:13:12.75Z
        let t = GpsTime::new(2231, 227_610.75).to_utc().unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2022, 10, 11));
        assert_eq!(t.timestamp_subsec_millis(), 750);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(RecordKind::TimePulse.to_string(), "tp");
        let record = Record::Text(TextData {
            level: "INFO".into(),
            text: "hello".into(),
        });
        assert_eq!(record.kind(), RecordKind::Text);
        let json = record.to_json();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["data"]["text"], "hello");
        assert!(record.stamp().is_none());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("NavSatFix".parse::<RecordKind>(), Ok(RecordKind::NavSatFix));
        assert_eq!("tp".parse::<RecordKind>(), Ok(RecordKind::TimePulse));
        assert!("odom".parse::<RecordKind>().is_err());
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_str().parse::<RecordKind>(), Ok(kind));
        }
    }
}
