//! TEXT, TP and EOE sentences

use super::{DecodeError, Fields};
use crate::core::records::{EndOfEpochData, TextData, TimePulseData};

/// Decode `FP,TEXT,1,level,text`.
///
/// Commas inside the message split it into extra tokens; they are joined
/// back instead of being rejected.
pub fn decode_text(tokens: &[&str]) -> Result<TextData, DecodeError> {
    let count = tokens.len().max(5);
    let f = Fields::check("TEXT", tokens, 1, count)?;
    Ok(TextData {
        level: f.str(3).to_string(),
        text: f.rest(4).join(","),
    })
}

/// Decode `FP,TP,1,...`
pub fn decode_timepulse(tokens: &[&str]) -> Result<TimePulseData, DecodeError> {
    let f = Fields::check("TP", tokens, 1, 9)?;
    Ok(TimePulseData {
        name: f.str(3).to_string(),
        timebase: f.str(4).to_string(),
        timeref: f.str(5).to_string(),
        tow_sec: f.num(6)?,
        tow_sub_sec: f.num(7)?,
        gps_leaps: f.opt_num(8)?,
    })
}

/// Decode `FP,EOE,1,...`
pub fn decode_eoe(tokens: &[&str]) -> Result<EndOfEpochData, DecodeError> {
    let f = Fields::check("EOE", tokens, 1, 6)?;
    Ok(EndOfEpochData {
        stamp: f.gps_time(3)?,
        epoch: f.str(5).to_string(),
    })
}
