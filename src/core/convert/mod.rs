//! Message converters
//!
//! One converter per enabled message family, selected once from the
//! configured format list. Sentences are routed by their family token,
//! binary frames by message id.

pub mod bestgnsspos;
pub mod fields;
pub mod imu;
pub mod llh;
pub mod odometry;
pub mod status;
pub mod text;
pub mod tf;

pub use fields::Fields;
pub use odometry::OdometryConverter;

use super::protocol::BinaryHeader;
use super::records::{ImuSource, OdometryFamily, Record};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Vendor prefix in token 0 of every handled sentence
pub const VENDOR_PREFIX: &str = "FP";

/// Decode errors; all are recoverable, the message is skipped
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Wrong number of tokens
    #[error("{family}: expected {expected} tokens, got {actual}")]
    TokenCount {
        /// Family name
        family: &'static str,
        /// Required count
        expected: usize,
        /// Received count
        actual: usize,
    },
    /// Version token not supported
    #[error("{family}: unsupported version '{version}'")]
    UnsupportedVersion {
        /// Family name
        family: &'static str,
        /// Received version token
        version: String,
    },
    /// Token cannot be parsed
    #[error("{family}: invalid field {index}: '{value}'")]
    InvalidField {
        /// Family name
        family: &'static str,
        /// Token index
        index: usize,
        /// Offending token
        value: String,
    },
    /// Binary payload size does not match the message
    #[error("{family}: payload must be {expected} bytes, got {actual}")]
    PayloadLength {
        /// Message name
        family: &'static str,
        /// Required length
        expected: usize,
        /// Received length
        actual: usize,
    },
}

// ============ Formats ============

/// Message family that can be enabled in the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// ECEF odometry
    Odometry,
    /// ENU0 odometry
    OdomEnu,
    /// Smooth odometry
    OdomSh,
    /// Fusion status
    OdomStatus,
    /// Geodetic position
    Llh,
    /// Raw IMU
    RawImu,
    /// Bias-corrected IMU
    CorrImu,
    /// IMU bias
    ImuBias,
    /// Transforms
    Tf,
    /// Antenna state
    GnssAnt,
    /// Correction status
    GnssCorr,
    /// Device text
    Text,
    /// Time pulse
    TimePulse,
    /// End of epoch
    EndOfEpoch,
    /// Binary best GNSS position
    BestGnssPos,
}

impl OutputFormat {
    /// Every format, in slot order
    pub const ALL: [Self; 15] = [
        Self::Odometry,
        Self::OdomEnu,
        Self::OdomSh,
        Self::OdomStatus,
        Self::Llh,
        Self::RawImu,
        Self::CorrImu,
        Self::ImuBias,
        Self::Tf,
        Self::GnssAnt,
        Self::GnssCorr,
        Self::Text,
        Self::TimePulse,
        Self::EndOfEpoch,
        Self::BestGnssPos,
    ];

    /// Configuration / family name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Odometry => "ODOMETRY",
            Self::OdomEnu => "ODOMENU",
            Self::OdomSh => "ODOMSH",
            Self::OdomStatus => "ODOMSTATUS",
            Self::Llh => "LLH",
            Self::RawImu => "RAWIMU",
            Self::CorrImu => "CORRIMU",
            Self::ImuBias => "IMUBIAS",
            Self::Tf => "TF",
            Self::GnssAnt => "GNSSANT",
            Self::GnssCorr => "GNSSCORR",
            Self::Text => "TEXT",
            Self::TimePulse => "TP",
            Self::EndOfEpoch => "EOE",
            Self::BestGnssPos => "BESTGNSSPOS",
        }
    }

    /// Binary message id, for formats carried in binary frames
    pub fn message_id(&self) -> Option<u16> {
        match self {
            Self::BestGnssPos => Some(bestgnsspos::BESTGNSSPOS_MESSAGE_ID),
            _ => None,
        }
    }

    /// Family key as it appears in token 1 of a sentence
    pub fn from_sentence_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.message_id().is_none() && f.name() == key)
    }

    /// Format carried by binary message `id`
    pub fn from_message_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.message_id() == Some(id))
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == upper)
            .ok_or_else(|| s.to_string())
    }
}

// ============ Registry ============

/// A converter instance, one variant per family group
#[derive(Debug)]
enum Converter {
    Odometry(OdometryConverter),
    OdomStatus,
    Llh,
    Imu(ImuSource),
    ImuBias,
    Tf,
    GnssAnt,
    GnssCorr,
    Text,
    TimePulse,
    EndOfEpoch,
    BestGnssPos,
}

impl Converter {
    fn for_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Odometry => Self::Odometry(OdometryConverter::new(OdometryFamily::Odometry)),
            OutputFormat::OdomEnu => Self::Odometry(OdometryConverter::new(OdometryFamily::OdomEnu)),
            OutputFormat::OdomSh => Self::Odometry(OdometryConverter::new(OdometryFamily::OdomSh)),
            OutputFormat::OdomStatus => Self::OdomStatus,
            OutputFormat::Llh => Self::Llh,
            OutputFormat::RawImu => Self::Imu(ImuSource::Raw),
            OutputFormat::CorrImu => Self::Imu(ImuSource::Corrected),
            OutputFormat::ImuBias => Self::ImuBias,
            OutputFormat::Tf => Self::Tf,
            OutputFormat::GnssAnt => Self::GnssAnt,
            OutputFormat::GnssCorr => Self::GnssCorr,
            OutputFormat::Text => Self::Text,
            OutputFormat::TimePulse => Self::TimePulse,
            OutputFormat::EndOfEpoch => Self::EndOfEpoch,
            OutputFormat::BestGnssPos => Self::BestGnssPos,
        }
    }

    fn convert_sentence<F: FnMut(Record)>(
        &mut self,
        tokens: &[&str],
        emit: &mut F,
    ) -> Result<(), DecodeError> {
        let record = match self {
            Self::Odometry(converter) => return converter.convert(tokens, emit),
            Self::OdomStatus => Record::OdomStatus(status::decode_odomstatus(tokens)?),
            Self::Llh => Record::Llh(llh::decode(tokens)?),
            Self::Imu(source) => Record::Imu(imu::decode(*source, tokens)?),
            Self::ImuBias => Record::ImuBias(status::decode_imubias(tokens)?),
            Self::Tf => Record::Transform(tf::decode(tokens)?),
            Self::GnssAnt => Record::GnssAnt(status::decode_gnssant(tokens)?),
            Self::GnssCorr => Record::GnssCorr(status::decode_gnsscorr(tokens)?),
            Self::Text => Record::Text(text::decode_text(tokens)?),
            Self::TimePulse => Record::TimePulse(text::decode_timepulse(tokens)?),
            Self::EndOfEpoch => Record::EndOfEpoch(text::decode_eoe(tokens)?),
            // Binary-only family; never registered under a sentence key
            Self::BestGnssPos => return Ok(()),
        };
        emit(record);
        Ok(())
    }

    fn convert_binary<F: FnMut(Record)>(
        &mut self,
        payload: &[u8],
        emit: &mut F,
    ) -> Result<(), DecodeError> {
        if let Self::BestGnssPos = self {
            emit(Record::BestGnssPos(bestgnsspos::decode(payload)?));
        }
        Ok(())
    }
}

/// Result of routing one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A converter handled the message
    Converted,
    /// Not a vendor sentence
    ForeignSentence,
    /// No converter registered for this family or message id
    Unregistered,
}

/// Converters for the enabled families, one slot per [`OutputFormat`]
#[derive(Debug, Default)]
pub struct ConverterRegistry {
    slots: [Option<Converter>; OutputFormat::ALL.len()],
}

impl ConverterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured format names.
    ///
    /// Returns the registry and the names that were not recognised. Enabling
    /// ODOMETRY also enables TF.
    pub fn from_formats<I, S>(names: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        let mut unknown = Vec::new();
        for name in names {
            match name.as_ref().parse::<OutputFormat>() {
                Ok(format) => {
                    registry.enable(format);
                    if format == OutputFormat::Odometry {
                        registry.enable(OutputFormat::Tf);
                    }
                }
                Err(name) => {
                    tracing::warn!(format = %name, "unknown output format, skipping");
                    unknown.push(name);
                }
            }
        }
        (registry, unknown)
    }

    /// Enable one family; an already enabled family keeps its state
    pub fn enable(&mut self, format: OutputFormat) {
        let slot = &mut self.slots[format.slot()];
        if slot.is_none() {
            *slot = Some(Converter::for_format(format));
        }
    }

    /// Whether a family is enabled
    pub fn is_enabled(&self, format: OutputFormat) -> bool {
        self.slots[format.slot()].is_some()
    }

    /// Enabled families in slot order
    pub fn enabled(&self) -> Vec<OutputFormat> {
        OutputFormat::ALL
            .into_iter()
            .filter(|f| self.is_enabled(*f))
            .collect()
    }

    /// No family enabled
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Route a tokenized sentence (`FP`, family, version, fields...)
    pub fn dispatch_sentence<F: FnMut(Record)>(
        &mut self,
        tokens: &[&str],
        mut emit: F,
    ) -> Result<Dispatch, DecodeError> {
        if tokens.first().copied() != Some(VENDOR_PREFIX) {
            return Ok(Dispatch::ForeignSentence);
        }
        let Some(format) = tokens.get(1).and_then(|key| OutputFormat::from_sentence_key(key)) else {
            return Ok(Dispatch::Unregistered);
        };
        match self.slots[format.slot()].as_mut() {
            Some(converter) => {
                converter.convert_sentence(tokens, &mut emit)?;
                Ok(Dispatch::Converted)
            }
            None => Ok(Dispatch::Unregistered),
        }
    }

    /// Route a binary frame by message id
    pub fn dispatch_binary<F: FnMut(Record)>(
        &mut self,
        header: &BinaryHeader,
        payload: &[u8],
        mut emit: F,
    ) -> Result<Dispatch, DecodeError> {
        let Some(format) = OutputFormat::from_message_id(header.message_id) else {
            return Ok(Dispatch::Unregistered);
        };
        match self.slots[format.slot()].as_mut() {
            Some(converter) => {
                converter.convert_binary(payload, &mut emit)?;
                Ok(Dispatch::Converted)
            }
            None => Ok(Dispatch::Unregistered),
        }
    }
}
