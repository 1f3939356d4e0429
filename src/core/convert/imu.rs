//! RAWIMU and CORRIMU sentences

use super::odometry::FRAME_POI;
use super::{DecodeError, Fields};
use crate::core::records::{ImuData, ImuSource};

/// Decode `FP,RAWIMU,1,...` or `FP,CORRIMU,1,...`
pub fn decode(source: ImuSource, tokens: &[&str]) -> Result<ImuData, DecodeError> {
    let family = match source {
        ImuSource::Corrected => "CORRIMU",
        _ => "RAWIMU",
    };
    let f = Fields::check(family, tokens, 1, 11)?;
    Ok(ImuData {
        source,
        stamp: f.gps_time(3)?,
        frame_id: FRAME_POI.to_string(),
        acceleration: f.vector3(5)?,
        angular_velocity: f.vector3(8)?,
    })
}
