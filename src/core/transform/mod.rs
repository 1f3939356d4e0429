//! Coordinate transformations
//!
//! - Fixed-size vectors, quaternions, matrices and rigid transforms
//! - WGS84 geodesy and local ENU frames

pub mod linalg;
pub mod wgs84;

pub use linalg::{
    euler_ypr_to_rot, rot_to_euler_ypr, rotate_cov3, rotate_cov6, Matrix3, Matrix6, Quaternion,
    Transform, Vector3,
};
pub use wgs84::{ecef_to_enu, ecef_to_llh, enu_to_ecef, llh_to_ecef, rot_enu_ecef, rot_enu_ecef_from_llh};
