//! TF sentence: static or dynamic transform between two device frames

use super::{DecodeError, Fields};
use crate::core::records::TfData;
use crate::core::transform::Transform;

/// Prefix added to the device's frame names
pub const FRAME_PREFIX: &str = "FP_";

/// Decode `FP,TF,2,...`
pub fn decode(tokens: &[&str]) -> Result<TfData, DecodeError> {
    let f = Fields::check("TF", tokens, 2, 14)?;
    Ok(TfData {
        stamp: f.gps_time(3)?,
        frame_id: format!("{FRAME_PREFIX}{}", f.str(5)),
        child_frame_id: format!("{FRAME_PREFIX}{}", f.str(6)),
        transform: Transform::new(f.vector3(7)?, f.quaternion(10)?),
    })
}
