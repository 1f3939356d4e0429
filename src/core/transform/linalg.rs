//! Small fixed-size linear algebra: vectors, quaternions, rotation and
//! covariance matrices, rigid transforms.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// 3D vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Vector3 {
    /// Create a vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// All components exactly zero
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Dot product
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Euclidean norm
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Component-wise absolute value
    pub fn abs(&self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    /// Components as an array
    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl Add for Vector3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Unit quaternion (Hamilton convention, `w` scalar part)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// Scalar part
    pub w: f64,
    /// X of vector part
    pub x: f64,
    /// Y of vector part
    pub y: f64,
    /// Z of vector part
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion from its components
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Identity rotation
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// All components exactly zero (not a valid rotation)
    pub fn is_zero(&self) -> bool {
        self.w == 0.0 && self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Norm
    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit-length copy; the zero quaternion stays zero
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n == 0.0 {
            return *self;
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Conjugate
    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Inverse; equals the conjugate for unit quaternions
    pub fn inverse(&self) -> Self {
        let n2 = self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z;
        if n2 == 0.0 {
            return *self;
        }
        let c = self.conjugate();
        Self::new(c.w / n2, c.x / n2, c.y / n2, c.z / n2)
    }

    /// Rotate a vector
    pub fn rotate(&self, v: &Vector3) -> Vector3 {
        self.to_rotation_matrix() * *v
    }

    /// Rotation matrix of a (normalized) quaternion
    pub fn to_rotation_matrix(&self) -> Matrix3 {
        let q = self.normalized();
        let (w, x, y, z) = (q.w, q.x, q.y, q.z);
        Matrix3::from_rows([
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - w * z),
                2.0 * (x * z + w * y),
            ],
            [
                2.0 * (x * y + w * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - w * x),
            ],
            [
                2.0 * (x * z - w * y),
                2.0 * (y * z + w * x),
                1.0 - 2.0 * (x * x + y * y),
            ],
        ])
    }

    /// Quaternion of a rotation matrix (Shepperd's method)
    pub fn from_rotation_matrix(r: &Matrix3) -> Self {
        let m = &r.m;
        let trace = m[0][0] + m[1][1] + m[2][2];
        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self::new(
                0.25 * s,
                (m[2][1] - m[1][2]) / s,
                (m[0][2] - m[2][0]) / s,
                (m[1][0] - m[0][1]) / s,
            )
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt() * 2.0;
            Self::new(
                (m[2][1] - m[1][2]) / s,
                0.25 * s,
                (m[0][1] + m[1][0]) / s,
                (m[0][2] + m[2][0]) / s,
            )
        } else if m[1][1] > m[2][2] {
            let s = (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt() * 2.0;
            Self::new(
                (m[0][2] - m[2][0]) / s,
                (m[0][1] + m[1][0]) / s,
                0.25 * s,
                (m[1][2] + m[2][1]) / s,
            )
        } else {
            let s = (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt() * 2.0;
            Self::new(
                (m[1][0] - m[0][1]) / s,
                (m[0][2] + m[2][0]) / s,
                (m[1][2] + m[2][1]) / s,
                0.25 * s,
            )
        };
        q.normalized()
    }
}

impl Mul for Quaternion {
    type Output = Self;
    fn mul(self, r: Self) -> Self {
        Self::new(
            self.w * r.w - self.x * r.x - self.y * r.y - self.z * r.z,
            self.w * r.x + self.x * r.w + self.y * r.z - self.z * r.y,
            self.w * r.y - self.x * r.z + self.y * r.w + self.z * r.x,
            self.w * r.z + self.x * r.y - self.y * r.x + self.z * r.w,
        )
    }
}

/// 3x3 matrix, row-major
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Matrix3 {
    /// Rows
    pub m: [[f64; 3]; 3],
}

impl Matrix3 {
    /// From rows
    pub const fn from_rows(m: [[f64; 3]; 3]) -> Self {
        Self { m }
    }

    /// Zero matrix
    pub const fn zero() -> Self {
        Self::from_rows([[0.0; 3]; 3])
    }

    /// Identity
    pub const fn identity() -> Self {
        Self::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Symmetric matrix from its six distinct entries, in the on-wire order
    /// `xx, yy, zz, xy, yz, xz`
    pub fn from_symmetric(xx: f64, yy: f64, zz: f64, xy: f64, yz: f64, xz: f64) -> Self {
        Self::from_rows([[xx, xy, xz], [xy, yy, yz], [xz, yz, zz]])
    }

    /// Transpose
    pub fn transpose(&self) -> Self {
        let mut t = Self::zero();
        for (i, row) in self.m.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                t.m[j][i] = *v;
            }
        }
        t
    }

    /// Main diagonal
    pub fn diagonal(&self) -> Vector3 {
        Vector3::new(self.m[0][0], self.m[1][1], self.m[2][2])
    }

    /// All entries exactly zero
    pub fn is_zero(&self) -> bool {
        self.m.iter().flatten().all(|v| *v == 0.0)
    }

    /// Row-major flat copy
    pub fn to_row_major(&self) -> [f64; 9] {
        let mut out = [0.0; 9];
        for (i, v) in self.m.iter().flatten().enumerate() {
            out[i] = *v;
        }
        out
    }
}

impl Mul for Matrix3 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut out = Self::zero();
        for i in 0..3 {
            for j in 0..3 {
                out.m[i][j] = (0..3).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        out
    }
}

impl Mul<Vector3> for Matrix3 {
    type Output = Vector3;
    fn mul(self, v: Vector3) -> Vector3 {
        let r = &self.m;
        Vector3::new(
            r[0][0] * v.x + r[0][1] * v.y + r[0][2] * v.z,
            r[1][0] * v.x + r[1][1] * v.y + r[1][2] * v.z,
            r[2][0] * v.x + r[2][1] * v.y + r[2][2] * v.z,
        )
    }
}

/// 6x6 matrix, row-major (pose/twist covariance)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix6 {
    /// Rows
    pub m: [[f64; 6]; 6],
}

impl Default for Matrix6 {
    fn default() -> Self {
        Self::zero()
    }
}

impl Matrix6 {
    /// Zero matrix
    pub const fn zero() -> Self {
        Self { m: [[0.0; 6]; 6] }
    }

    /// Copy a 3x3 block in at (`row`, `col`), both multiples of 3
    pub fn set_block(&mut self, row: usize, col: usize, block: &Matrix3) {
        for i in 0..3 {
            for j in 0..3 {
                self.m[row + i][col + j] = block.m[i][j];
            }
        }
    }

    /// 3x3 block at (`row`, `col`)
    pub fn block(&self, row: usize, col: usize) -> Matrix3 {
        let mut out = Matrix3::zero();
        for i in 0..3 {
            for j in 0..3 {
                out.m[i][j] = self.m[row + i][col + j];
            }
        }
        out
    }

    /// Block-diagonal matrix `diag(a, b)`
    pub fn block_diagonal(a: &Matrix3, b: &Matrix3) -> Self {
        let mut out = Self::zero();
        out.set_block(0, 0, a);
        out.set_block(3, 3, b);
        out
    }

    /// Transpose
    pub fn transpose(&self) -> Self {
        let mut t = Self::zero();
        for i in 0..6 {
            for j in 0..6 {
                t.m[j][i] = self.m[i][j];
            }
        }
        t
    }
}

impl Mul for Matrix6 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut out = Self::zero();
        for i in 0..6 {
            for j in 0..6 {
                out.m[i][j] = (0..6).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        out
    }
}

/// Rotate a 3x3 covariance: `R * C * R^T`
pub fn rotate_cov3(rotation: &Matrix3, cov: &Matrix3) -> Matrix3 {
    *rotation * *cov * rotation.transpose()
}

/// Rotate a 6x6 covariance with the same rotation applied to both 3D halves
pub fn rotate_cov6(rotation: &Matrix3, cov: &Matrix6) -> Matrix6 {
    let r = Matrix6::block_diagonal(rotation, rotation);
    r * *cov * r.transpose()
}

/// Euler angles of a rotation matrix as `(yaw, pitch, roll)` in radians,
/// for `R = Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub fn rot_to_euler_ypr(r: &Matrix3) -> Vector3 {
    let m = &r.m;
    let yaw = m[1][0].atan2(m[0][0]);
    let pitch = (-m[2][0]).atan2((m[2][1] * m[2][1] + m[2][2] * m[2][2]).sqrt());
    let roll = m[2][1].atan2(m[2][2]);
    Vector3::new(yaw, pitch, roll)
}

/// Rotation matrix `Rz(yaw) * Ry(pitch) * Rx(roll)`, angles in radians
pub fn euler_ypr_to_rot(yaw: f64, pitch: f64, roll: f64) -> Matrix3 {
    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sr, cr) = roll.sin_cos();
    Matrix3::from_rows([
        [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr],
        [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr],
        [-sp, cp * sr, cp * cr],
    ])
}

/// Rigid transform: rotate, then translate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation
    pub translation: Vector3,
    /// Rotation
    pub rotation: Quaternion,
}

impl Transform {
    /// Create a transform
    pub fn new(translation: Vector3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Inverse transform
    pub fn inverse(&self) -> Self {
        let q_inv = self.rotation.inverse();
        Self::new(-q_inv.rotate(&self.translation), q_inv)
    }

    /// Apply to a point
    pub fn apply(&self, p: &Vector3) -> Vector3 {
        self.rotation.rotate(p) + self.translation
    }
}

impl Mul for Transform {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.translation + self.rotation.rotate(&rhs.translation),
            (self.rotation * rhs.rotation).normalized(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-12;

    fn assert_vec_eq(a: &Vector3, b: &Vector3, eps: f64) {
        assert!((*a - *b).norm() < eps, "{a:?} != {b:?}");
    }

    fn assert_mat_eq(a: &Matrix3, b: &Matrix3, eps: f64) {
        for i in 0..3 {
            for j in 0..3 {
                assert!((a.m[i][j] - b.m[i][j]).abs() < eps, "{a:?} != {b:?}");
            }
        }
    }

    #[test]
    fn test_quaternion_rotation() {
        // 90 degrees about Z maps X onto Y
        let half = FRAC_PI_2 / 2.0;
        let q = Quaternion::new(half.cos(), 0.0, 0.0, half.sin());
        let v = q.rotate(&Vector3::new(1.0, 0.0, 0.0));
        assert_vec_eq(&v, &Vector3::new(0.0, 1.0, 0.0), EPS);
    }

    #[test]
    fn test_quaternion_inverse_and_compose() {
        let q = Quaternion::new(0.854_251, -0.412_792, 0.290_804, -0.123_898).normalized();
        let id = q * q.inverse();
        assert!((id.w - 1.0).abs() < EPS);
        assert!(id.x.abs() < EPS && id.y.abs() < EPS && id.z.abs() < EPS);

        let p = q * Quaternion::new(0.5, 0.5, 0.5, 0.5);
        let composed = p.to_rotation_matrix();
        let product = q.to_rotation_matrix() * Quaternion::new(0.5, 0.5, 0.5, 0.5).to_rotation_matrix();
        assert_mat_eq(&composed, &product, 1e-12);
    }

    #[test]
    fn test_matrix_quaternion_roundtrip() {
        for (yaw, pitch, roll) in [(0.3, -0.2, 1.1), (3.0, 0.1, -3.0), (-1.5, 1.4, 0.0)] {
            let r = euler_ypr_to_rot(yaw, pitch, roll);
            let q = Quaternion::from_rotation_matrix(&r);
            assert_mat_eq(&q.to_rotation_matrix(), &r, 1e-12);
        }
    }

    #[test]
    fn test_euler_roundtrip() {
        let r = euler_ypr_to_rot(0.7, -0.4, 0.2);
        let ypr = rot_to_euler_ypr(&r);
        assert_vec_eq(&ypr, &Vector3::new(0.7, -0.4, 0.2), 1e-12);
    }

    #[test]
    fn test_cov_rotation() {
        let cov = Matrix3::from_symmetric(4.0, 1.0, 9.0, 0.0, 0.0, 0.0);
        let rz = euler_ypr_to_rot(FRAC_PI_2, 0.0, 0.0);
        let rotated = rotate_cov3(&rz, &cov);
        assert_vec_eq(&rotated.diagonal(), &Vector3::new(1.0, 4.0, 9.0), 1e-12);

        let mut cov6 = Matrix6::zero();
        cov6.set_block(0, 0, &cov);
        cov6.set_block(3, 3, &cov);
        let rotated6 = rotate_cov6(&rz, &cov6);
        assert_mat_eq(&rotated6.block(0, 0), &rotated, 1e-12);
        assert_mat_eq(&rotated6.block(3, 3), &rotated, 1e-12);
        assert!(rotated6.block(0, 3).is_zero());
    }

    #[test]
    fn test_transform_inverse() {
        let t = Transform::new(
            Vector3::new(1.0, -2.0, 3.0),
            Quaternion::from_rotation_matrix(&euler_ypr_to_rot(0.5, 0.2, -0.1)),
        );
        let id = t * t.inverse();
        assert_vec_eq(&id.translation, &Vector3::zero(), 1e-12);
        let p = Vector3::new(4.0, 5.0, 6.0);
        assert_vec_eq(&t.inverse().apply(&t.apply(&p)), &p, 1e-12);
    }
}
