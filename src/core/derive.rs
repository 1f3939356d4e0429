//! Derived products
//!
//! Records computed from odometry rather than received from the device:
//! geodetic fix, IMU at the point of interest, ENU Euler angles, pose
//! transforms, and the `map`/`odom`/`base_link` tree assembled from TF
//! records. [`Presenter`] wraps a sink and publishes these alongside the
//! decoded records.

use super::convert::tf::FRAME_PREFIX;
use super::records::{
    GpsTime, ImuData, ImuSource, NavSatFixData, OdometryData, OdometryFamily, Record, RecordKind,
    TfData, YprData,
};
use super::sink::Sink;
use super::transform::{
    ecef_to_enu, ecef_to_llh, rot_enu_ecef_from_llh, rot_to_euler_ypr, rotate_cov3, Matrix3,
    Transform,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Frame of the Euler angle output
pub const FRAME_ENU: &str = "FP_ENU";
/// Global map frame
pub const FRAME_MAP: &str = "map";
/// Odometry frame
pub const FRAME_ODOM: &str = "odom";
/// Vehicle body frame
pub const FRAME_BASE_LINK: &str = "base_link";

/// NavSatFix status: no fix
pub const STATUS_NO_FIX: i8 = -1;
/// NavSatFix status: unaugmented fix
pub const STATUS_FIX: i8 = 0;
/// NavSatFix status: ground-based augmentation
pub const STATUS_GBAS_FIX: i8 = 2;

/// NavSatFix covariance unknown
pub const COVARIANCE_TYPE_UNKNOWN: u8 = 0;
/// NavSatFix covariance fully known
pub const COVARIANCE_TYPE_KNOWN: u8 = 3;

/// GNSS fix values below this carry no position
const GNSS_FIX_2D: i32 = 3;
/// GNSS fix values from this on are RTK solutions
const GNSS_FIX_RTK_FLOAT: i32 = 6;

const TREE_KEYS: [&str; 4] = ["ECEFENU0", "POIPOISH", "ECEFPOISH", "ENU0POI"];

/// Wall-clock time of a record: the receive time `now` when the device had
/// no GPS time yet, UTC from the GPS stamp otherwise
pub fn stamp_or_now(stamp: &GpsTime, now: DateTime<Utc>) -> DateTime<Utc> {
    if stamp.is_zero() {
        return now;
    }
    stamp.to_utc().unwrap_or(now)
}

/// Geodetic fix from an ECEF odometry record
pub fn navsatfix_from_odometry(odom: &OdometryData) -> NavSatFixData {
    let best = odom.gnss1_status.max(odom.gnss2_status);
    let status = if best < GNSS_FIX_2D {
        STATUS_NO_FIX
    } else if best < GNSS_FIX_RTK_FLOAT {
        STATUS_FIX
    } else {
        STATUS_GBAS_FIX
    };

    let mut fix = NavSatFixData {
        stamp: odom.stamp,
        frame_id: odom.child_frame_id.clone(),
        latitude_deg: 0.0,
        longitude_deg: 0.0,
        altitude: 0.0,
        position_cov: Matrix3::zero(),
        position_cov_type: COVARIANCE_TYPE_UNKNOWN,
        status,
    };

    if odom.position.is_zero() {
        return fix;
    }

    let llh = ecef_to_llh(&odom.position);
    let rotation = rot_enu_ecef_from_llh(llh.x, llh.y);
    fix.latitude_deg = llh.x.to_degrees();
    fix.longitude_deg = llh.y.to_degrees();
    fix.altitude = llh.z;
    fix.position_cov = rotate_cov3(&rotation, &odom.position_cov);
    fix.position_cov_type = COVARIANCE_TYPE_KNOWN;
    fix
}

/// IMU sample at the point of interest
pub fn imu_from_odometry(odom: &OdometryData) -> ImuData {
    ImuData {
        source: ImuSource::Odometry,
        stamp: odom.stamp,
        frame_id: odom.frame_id.clone(),
        acceleration: odom.acceleration,
        angular_velocity: odom.angular_velocity,
    }
}

/// Yaw, pitch and roll of the pose orientation
pub fn ypr_from_odometry(odom: &OdometryData) -> YprData {
    YprData {
        stamp: odom.stamp,
        frame_id: FRAME_ENU.to_string(),
        ypr: rot_to_euler_ypr(&odom.orientation.to_rotation_matrix()),
    }
}

/// Pose as a transform record; `None` until fusion runs with a valid
/// orientation
pub fn tf_from_odometry(odom: &OdometryData) -> Option<TfData> {
    if odom.fusion_status <= 0 || odom.orientation.is_zero() {
        return None;
    }
    Some(TfData {
        stamp: odom.stamp,
        frame_id: odom.frame_id.clone(),
        child_frame_id: odom.child_frame_id.clone(),
        transform: odom.pose(),
    })
}

// ============ Transform tree ============

/// Latest transform per frame pair, assembling the navigation tree once the
/// required pairs are known
#[derive(Debug, Default)]
pub struct TransformTree {
    transforms: HashMap<String, TfData>,
}

impl TransformTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key of a transform: both frame names without the device prefix
    pub fn key(tf: &TfData) -> String {
        let strip = |s: &str| s.strip_prefix(FRAME_PREFIX).unwrap_or(s).to_string();
        strip(&tf.frame_id) + &strip(&tf.child_frame_id)
    }

    /// Cached transform for `key`
    pub fn get(&self, key: &str) -> Option<&TfData> {
        self.transforms.get(key)
    }

    /// Number of cached pairs
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// No transform cached yet
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Whether every pair the tree needs has been seen
    pub fn is_complete(&self) -> bool {
        TREE_KEYS.iter().all(|k| self.transforms.contains_key(*k))
    }

    /// Cache `tf` and return `ECEF -> map`, `map -> odom` and
    /// `odom -> base_link` when the tree is complete
    pub fn update(&mut self, tf: &TfData) -> Vec<TfData> {
        self.transforms.insert(Self::key(tf), tf.clone());
        self.assemble().unwrap_or_default()
    }

    fn assemble(&self) -> Option<Vec<TfData>> {
        let ecef_enu0 = self.transforms.get("ECEFENU0")?;
        let ecef_poish = self.transforms.get("ECEFPOISH")?;
        let enu0_poi = self.transforms.get("ENU0POI")?;
        self.transforms.get("POIPOISH")?;

        let origin_llh = ecef_to_llh(&ecef_enu0.transform.translation);
        let enu0_poish = Transform::new(
            ecef_to_enu(&ecef_poish.transform.translation, &origin_llh),
            (ecef_enu0.transform.rotation.inverse() * ecef_poish.transform.rotation).normalized(),
        );
        let map_odom = enu0_poi.transform * enu0_poish.inverse();

        // Dynamic links carry no device stamp and are timed on receipt
        Some(vec![
            TfData {
                child_frame_id: FRAME_MAP.to_string(),
                ..ecef_enu0.clone()
            },
            TfData {
                stamp: GpsTime::default(),
                frame_id: FRAME_MAP.to_string(),
                child_frame_id: FRAME_ODOM.to_string(),
                transform: map_odom,
            },
            TfData {
                stamp: GpsTime::default(),
                frame_id: FRAME_ODOM.to_string(),
                child_frame_id: FRAME_BASE_LINK.to_string(),
                transform: enu0_poish,
            },
        ])
    }
}

// ============ Presenter ============

/// Sink adapter that forwards every record and adds the derived products
/// the inner sink subscribes to
pub struct Presenter<S: Sink> {
    inner: S,
    tree: TransformTree,
}

impl<S: Sink> Presenter<S> {
    /// Wrap `inner`
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            tree: TransformTree::new(),
        }
    }

    /// Wrapped sink
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Wrapped sink, mutably
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Transform cache
    pub fn tree(&self) -> &TransformTree {
        &self.tree
    }

    fn publish_if(&mut self, kind: RecordKind, make: impl FnOnce() -> Record) {
        if self.inner.is_subscribed(kind) {
            self.inner.publish(make());
        }
    }

    fn publish_transform(&mut self, tf: TfData) {
        for derived in self.tree.update(&tf) {
            self.publish_if(RecordKind::Tf, || Record::Transform(derived));
        }
        self.publish_if(RecordKind::Tf, || Record::Transform(tf));
    }

    fn present_odometry(&mut self, odom: &OdometryData) {
        match odom.family {
            OdometryFamily::Odometry => {
                self.publish_if(RecordKind::NavSatFix, || Record::NavSatFix(navsatfix_from_odometry(odom)));
                self.publish_if(RecordKind::PoiImu, || Record::Imu(imu_from_odometry(odom)));
            }
            OdometryFamily::OdomEnu => {
                self.publish_if(RecordKind::Ypr, || Record::Ypr(ypr_from_odometry(odom)));
            }
            OdometryFamily::OdomSh => {}
        }
        if let Some(tf) = tf_from_odometry(odom) {
            self.publish_transform(tf);
        }
    }
}

impl<S: Sink> Sink for Presenter<S> {
    fn publish(&mut self, record: Record) {
        match record {
            Record::Transform(tf) => self.publish_transform(tf),
            Record::Odometry(odom) => {
                self.inner.publish(Record::Odometry(odom.clone()));
                self.present_odometry(&odom);
            }
            other => self.inner.publish(other),
        }
    }

    fn is_subscribed(&self, kind: RecordKind) -> bool {
        self.inner.is_subscribed(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::TextData;
    use crate::core::sink::{CollectingSink, MockSink};
    use crate::core::transform::{llh_to_ecef, Quaternion, Vector3};
    use chrono::TimeZone;

    fn odometry(family: OdometryFamily) -> OdometryData {
        let (frame_id, child_frame_id) = match family {
            OdometryFamily::Odometry => ("FP_ECEF", "FP_POI"),
            OdometryFamily::OdomEnu => ("FP_ENU0", "FP_POI"),
            OdometryFamily::OdomSh => ("FP_ECEF", "FP_POISH"),
        };
        OdometryData {
            family,
            stamp: GpsTime::new(2231, 227_610.75),
            frame_id: frame_id.into(),
            child_frame_id: child_frame_id.into(),
            position: llh_to_ecef(&Vector3::new(47.4_f64.to_radians(), 8.5_f64.to_radians(), 450.0)),
            orientation: Quaternion::identity(),
            velocity: Vector3::new(1.0, 0.0, 0.0),
            angular_velocity: Vector3::new(0.0, 0.0, 0.1),
            acceleration: Vector3::new(0.0, 0.0, 9.81),
            position_cov: Matrix3::from_symmetric(0.01, 0.02, 0.03, 0.0, 0.0, 0.0),
            orientation_cov: Matrix3::zero(),
            velocity_cov: Matrix3::zero(),
            fusion_status: 8,
            imu_bias_status: 4,
            gnss1_status: 8,
            gnss2_status: 8,
            wheelspeed_status: -1,
            sw_version: None,
        }
    }

    fn tf(frame: &str, child: &str, transform: Transform) -> TfData {
        TfData {
            stamp: GpsTime::new(2231, 1.0),
            frame_id: format!("FP_{frame}"),
            child_frame_id: format!("FP_{child}"),
            transform,
        }
    }

    #[test]
    fn test_stamp_or_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(stamp_or_now(&GpsTime::default(), now), now);
        let stamped = stamp_or_now(&GpsTime::new(2231, 227_610.75), now);
        assert_eq!(stamped, GpsTime::new(2231, 227_610.75).to_utc().unwrap());
        assert_ne!(stamped, now);
    }

    #[test]
    fn test_navsatfix() {
        let odom = odometry(OdometryFamily::Odometry);
        let fix = navsatfix_from_odometry(&odom);
        assert_eq!(fix.frame_id, "FP_POI");
        assert!((fix.latitude_deg - 47.4).abs() < 1e-9);
        assert!((fix.longitude_deg - 8.5).abs() < 1e-9);
        assert!((fix.altitude - 450.0).abs() < 1e-6);
        assert_eq!(fix.position_cov_type, COVARIANCE_TYPE_KNOWN);
        assert_eq!(fix.status, STATUS_GBAS_FIX);

        // Rotation preserves the trace
        let trace = |m: &Matrix3| m.m[0][0] + m.m[1][1] + m.m[2][2];
        assert!((trace(&fix.position_cov) - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_navsatfix_status_and_zero_position() {
        let mut odom = odometry(OdometryFamily::Odometry);
        odom.gnss1_status = 2;
        odom.gnss2_status = 0;
        assert_eq!(navsatfix_from_odometry(&odom).status, STATUS_NO_FIX);
        odom.gnss2_status = 5;
        assert_eq!(navsatfix_from_odometry(&odom).status, STATUS_FIX);

        odom.position = Vector3::zero();
        let fix = navsatfix_from_odometry(&odom);
        assert_eq!(fix.latitude_deg, 0.0);
        assert_eq!(fix.longitude_deg, 0.0);
        assert_eq!(fix.altitude, 0.0);
        assert!(fix.position_cov.is_zero());
        assert_eq!(fix.position_cov_type, COVARIANCE_TYPE_UNKNOWN);
    }

    #[test]
    fn test_imu_and_ypr() {
        let odom = odometry(OdometryFamily::Odometry);
        let imu = imu_from_odometry(&odom);
        assert_eq!(imu.source, ImuSource::Odometry);
        assert_eq!(imu.frame_id, "FP_ECEF");
        assert_eq!(imu.acceleration, odom.acceleration);
        assert_eq!(imu.angular_velocity, odom.angular_velocity);
        assert_eq!(Record::Imu(imu).kind(), RecordKind::PoiImu);

        let mut enu = odometry(OdometryFamily::OdomEnu);
        let yaw = 30_f64.to_radians();
        enu.orientation = Quaternion::new((yaw / 2.0).cos(), 0.0, 0.0, (yaw / 2.0).sin());
        let ypr = ypr_from_odometry(&enu);
        assert_eq!(ypr.frame_id, FRAME_ENU);
        assert!((ypr.ypr.x - yaw).abs() < 1e-12);
        assert!(ypr.ypr.y.abs() < 1e-12);
        assert!(ypr.ypr.z.abs() < 1e-12);
    }

    #[test]
    fn test_tf_requires_fusion() {
        let mut odom = odometry(OdometryFamily::Odometry);
        let tf = tf_from_odometry(&odom).unwrap();
        assert_eq!(tf.frame_id, "FP_ECEF");
        assert_eq!(tf.child_frame_id, "FP_POI");
        assert_eq!(tf.transform.translation, odom.position);

        odom.orientation = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert!(tf_from_odometry(&odom).is_none());

        odom.orientation = Quaternion::identity();
        odom.fusion_status = 0;
        assert!(tf_from_odometry(&odom).is_none());
    }

    #[test]
    fn test_tree_waits_for_all_pairs() {
        let mut tree = TransformTree::new();
        let origin = llh_to_ecef(&Vector3::new(0.8, 0.15, 400.0));
        let q_enu0 = Quaternion::from_rotation_matrix(&rot_enu_ecef_from_llh(0.8, 0.15).transpose());

        assert!(tree.update(&tf("ECEF", "ENU0", Transform::new(origin, q_enu0))).is_empty());
        assert!(tree.update(&tf("POI", "POISH", Transform::default())).is_empty());
        assert!(tree.update(&tf("ENU0", "POI", Transform::default())).is_empty());
        assert!(!tree.is_complete());
        assert_eq!(tree.len(), 3);
        assert!(tree.get("ENU0POI").is_some());

        let out = tree.update(&tf("ECEF", "POISH", Transform::new(origin, q_enu0)));
        assert!(tree.is_complete());
        assert_eq!(out.len(), 3);

        assert_eq!(out[0].frame_id, "FP_ECEF");
        assert_eq!(out[0].child_frame_id, FRAME_MAP);
        assert_eq!(out[0].transform.translation, origin);

        // POISH sits at the ENU0 origin with the same attitude
        assert_eq!((out[1].frame_id.as_str(), out[1].child_frame_id.as_str()), (FRAME_MAP, FRAME_ODOM));
        assert!(out[1].stamp.is_zero());
        assert!(out[1].transform.translation.norm() < 1e-6);
        assert_eq!(
            (out[2].frame_id.as_str(), out[2].child_frame_id.as_str()),
            (FRAME_ODOM, FRAME_BASE_LINK)
        );
        assert!(out[2].transform.translation.norm() < 1e-6);
        let q = out[2].transform.rotation;
        assert!((q.w.abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tree_map_odom_composition() {
        let mut tree = TransformTree::new();
        let origin_llh = Vector3::new(0.8, 0.15, 400.0);
        let origin = llh_to_ecef(&origin_llh);
        let q_enu0 = Quaternion::from_rotation_matrix(&rot_enu_ecef_from_llh(0.8, 0.15).transpose());

        // POISH 10 m east of the ENU0 origin, POI 12 m east
        let poish_ecef = crate::core::transform::enu_to_ecef(&Vector3::new(10.0, 0.0, 0.0), &origin_llh);
        tree.update(&tf("ECEF", "ENU0", Transform::new(origin, q_enu0)));
        tree.update(&tf("POI", "POISH", Transform::default()));
        tree.update(&tf("ECEF", "POISH", Transform::new(poish_ecef, q_enu0)));
        let out = tree.update(&tf("ENU0", "POI", Transform::new(Vector3::new(12.0, 0.0, 0.0), Quaternion::identity())));

        let base = out[2].transform.translation;
        assert!((base.x - 10.0).abs() < 1e-6 && base.y.abs() < 1e-6 && base.z.abs() < 1e-6);
        let map_odom = out[1].transform.translation;
        assert!((map_odom.x - 2.0).abs() < 1e-6 && map_odom.y.abs() < 1e-6);
    }

    #[test]
    fn test_presenter_forwards_and_derives() {
        let mut presenter = Presenter::new(CollectingSink::default());
        presenter.publish(Record::Text(TextData {
            level: "INFO".into(),
            text: "hello".into(),
        }));
        presenter.publish(Record::Odometry(odometry(OdometryFamily::Odometry)));

        let kinds: Vec<RecordKind> = presenter.inner().drain().iter().map(Record::kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::Text,
                RecordKind::Odometry,
                RecordKind::NavSatFix,
                RecordKind::PoiImu,
                RecordKind::Tf
            ]
        );
        assert_eq!(presenter.tree().len(), 1);
        assert!(presenter.tree().get("ECEFPOI").is_some());
    }

    #[test]
    fn test_presenter_skips_unsubscribed() {
        let mut sink = MockSink::new();
        sink.expect_is_subscribed()
            .returning(|kind| kind == RecordKind::Ypr);
        sink.expect_publish()
            .withf(|r| matches!(r.kind(), RecordKind::OdomEnu | RecordKind::Ypr))
            .times(2)
            .return_const(());

        let mut presenter = Presenter::new(sink);
        presenter.publish(Record::Odometry(odometry(OdometryFamily::OdomEnu)));
        // The ODOMENU pose still feeds the tree
        assert!(presenter.tree().get("ENU0POI").is_some());
    }
}
