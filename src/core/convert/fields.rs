//! Typed access to sentence tokens

use super::DecodeError;
use crate::core::records::GpsTime;
use crate::core::transform::{Matrix3, Quaternion, Vector3};
use std::str::FromStr;

/// Tokens of one sentence, checked for version and count
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    family: &'static str,
    tokens: &'a [&'a str],
}

impl<'a> Fields<'a> {
    /// Check the version token (index 2) and the total token count
    pub fn check(
        family: &'static str,
        tokens: &'a [&'a str],
        version: u32,
        count: usize,
    ) -> Result<Self, DecodeError> {
        let found = tokens.get(2).copied().unwrap_or_default();
        if found.parse::<u32>().ok() != Some(version) {
            return Err(DecodeError::UnsupportedVersion {
                family,
                version: found.to_string(),
            });
        }
        if tokens.len() != count {
            return Err(DecodeError::TokenCount {
                family,
                expected: count,
                actual: tokens.len(),
            });
        }
        Ok(Self { family, tokens })
    }

    /// Raw token
    pub fn str(&self, index: usize) -> &'a str {
        self.tokens.get(index).copied().unwrap_or_default()
    }

    /// Tokens from `index` to the end
    pub fn rest(&self, index: usize) -> &'a [&'a str] {
        self.tokens.get(index..).unwrap_or_default()
    }

    /// Numeric token; an empty token reads as zero
    pub fn num<T>(&self, index: usize) -> Result<T, DecodeError>
    where
        T: FromStr + Default,
    {
        let raw = self.str(index).trim();
        if raw.is_empty() {
            return Ok(T::default());
        }
        raw.parse().map_err(|_| DecodeError::InvalidField {
            family: self.family,
            index,
            value: raw.to_string(),
        })
    }

    /// Numeric token that may legitimately be absent
    pub fn opt_num<T: FromStr + Default>(&self, index: usize) -> Result<Option<T>, DecodeError> {
        if self.str(index).trim().is_empty() {
            Ok(None)
        } else {
            self.num(index).map(Some)
        }
    }

    /// Week number at `index`, time of week at `index + 1`
    pub fn gps_time(&self, index: usize) -> Result<GpsTime, DecodeError> {
        Ok(GpsTime::new(self.num(index)?, self.num(index + 1)?))
    }

    /// Three consecutive floats
    pub fn vector3(&self, index: usize) -> Result<Vector3, DecodeError> {
        Ok(Vector3::new(
            self.num(index)?,
            self.num(index + 1)?,
            self.num(index + 2)?,
        ))
    }

    /// Quaternion in `w, x, y, z` order
    pub fn quaternion(&self, index: usize) -> Result<Quaternion, DecodeError> {
        Ok(Quaternion::new(
            self.num(index)?,
            self.num(index + 1)?,
            self.num(index + 2)?,
            self.num(index + 3)?,
        ))
    }

    /// Symmetric covariance in `xx, yy, zz, xy, yz, xz` order
    pub fn covariance(&self, index: usize) -> Result<Matrix3, DecodeError> {
        Ok(Matrix3::from_symmetric(
            self.num(index)?,
            self.num(index + 1)?,
            self.num(index + 2)?,
            self.num(index + 3)?,
            self.num(index + 4)?,
            self.num(index + 5)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check() {
        let tokens = ["FP", "X", "1", "2"];
        assert!(Fields::check("X", &tokens, 1, 4).is_ok());
        assert!(matches!(
            Fields::check("X", &tokens, 2, 4),
            Err(DecodeError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            Fields::check("X", &tokens, 1, 5),
            Err(DecodeError::TokenCount { expected: 5, actual: 4, .. })
        ));
        assert!(Fields::check("X", &["FP", "X"], 1, 2).is_err());
    }

    #[test]
    fn test_numbers() {
        let tokens = ["FP", "X", "1", "", "1.5", "abc", "-7"];
        let fields = Fields::check("X", &tokens, 1, 7).unwrap();
        assert_eq!(fields.num::<f64>(3).unwrap(), 0.0);
        assert_eq!(fields.num::<f64>(4).unwrap(), 1.5);
        assert_eq!(fields.num::<i32>(6).unwrap(), -7);
        assert_eq!(fields.opt_num::<i32>(3).unwrap(), None);
        assert!(matches!(
            fields.num::<f64>(5),
            Err(DecodeError::InvalidField { index: 5, .. })
        ));
    }
}
