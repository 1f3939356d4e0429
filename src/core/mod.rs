//! Core module containing the protocol engine
//!
//! This module provides:
//! - Transport layer for the sensor connection (Serial, TCP)
//! - Stream framing of binary messages and text sentences
//! - Converters from wire messages to typed records
//! - Coordinate transform math and derived products
//! - Driver session tying it all together

pub mod convert;
pub mod derive;
pub mod protocol;
pub mod records;
pub mod session;
pub mod sink;
pub mod transform;
pub mod transport;
