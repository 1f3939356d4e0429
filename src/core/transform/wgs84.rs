//! WGS84 geodesy: geodetic/ECEF conversion and local ENU frames
//!
//! Latitude and longitude are radians everywhere; heights are metres above
//! the ellipsoid.

use super::linalg::{Matrix3, Vector3};

/// Semi-major axis \[m\]
pub const WGS84_A: f64 = 6_378_137.0;
/// Flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// Semi-minor axis \[m\]
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// First eccentricity squared
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);
/// Second eccentricity squared
pub const WGS84_EP2: f64 = WGS84_E2 / (1.0 - WGS84_E2);

/// Geodetic `(lat, lon, height)` to ECEF
pub fn llh_to_ecef(llh: &Vector3) -> Vector3 {
    let (lat, lon, h) = (llh.x, llh.y, llh.z);
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    Vector3::new(
        (n + h) * cos_lat * cos_lon,
        (n + h) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + h) * sin_lat,
    )
}

/// ECEF to geodetic `(lat, lon, height)`, closed form (Heikkinen)
pub fn ecef_to_llh(ecef: &Vector3) -> Vector3 {
    let (x, y, z) = (ecef.x, ecef.y, ecef.z);
    let a2 = WGS84_A * WGS84_A;
    let b2 = WGS84_B * WGS84_B;
    let e4 = WGS84_E2 * WGS84_E2;

    let p = x.hypot(y);
    let f = 54.0 * b2 * z * z;
    let g = p * p + (1.0 - WGS84_E2) * z * z - WGS84_E2 * (a2 - b2);
    let c = e4 * f * p * p / (g * g * g);
    let s = (1.0 + c + (c * c + 2.0 * c).sqrt()).cbrt();
    let k = s + 1.0 + 1.0 / s;
    let pk = f / (3.0 * k * k * g * g);
    let q = (1.0 + 2.0 * e4 * pk).sqrt();
    let r0 = -pk * WGS84_E2 * p / (1.0 + q)
        + (a2 / 2.0 * (1.0 + 1.0 / q)
            - pk * (1.0 - WGS84_E2) * z * z / (q * (1.0 + q))
            - pk * p * p / 2.0)
            .max(0.0)
            .sqrt();
    let pe = p - WGS84_E2 * r0;
    let u = pe.hypot(z);
    let v = (pe * pe + (1.0 - WGS84_E2) * z * z).sqrt();
    let z0 = b2 * z / (WGS84_A * v);

    Vector3::new(
        (z + WGS84_EP2 * z0).atan2(p),
        y.atan2(x),
        u * (1.0 - b2 / (WGS84_A * v)),
    )
}

/// Rotation from ECEF to the ENU frame anchored at `(lat, lon)`
pub fn rot_enu_ecef_from_llh(lat: f64, lon: f64) -> Matrix3 {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    Matrix3::from_rows([
        [-sin_lon, cos_lon, 0.0],
        [-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat],
        [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat],
    ])
}

/// Rotation from ECEF to the ENU frame anchored at an ECEF point
pub fn rot_enu_ecef(origin_ecef: &Vector3) -> Matrix3 {
    let llh = ecef_to_llh(origin_ecef);
    rot_enu_ecef_from_llh(llh.x, llh.y)
}

/// ECEF point to ENU coordinates relative to a geodetic origin
pub fn ecef_to_enu(point_ecef: &Vector3, origin_llh: &Vector3) -> Vector3 {
    let origin_ecef = llh_to_ecef(origin_llh);
    rot_enu_ecef_from_llh(origin_llh.x, origin_llh.y) * (*point_ecef - origin_ecef)
}

/// ENU coordinates relative to a geodetic origin back to ECEF
pub fn enu_to_ecef(point_enu: &Vector3, origin_llh: &Vector3) -> Vector3 {
    let origin_ecef = llh_to_ecef(origin_llh);
    rot_enu_ecef_from_llh(origin_llh.x, origin_llh.y).transpose() * *point_enu + origin_ecef
}
