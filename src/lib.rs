//! # Fixlink Core Library
//!
//! Protocol engine for GNSS/INS positioning sensors that stream a mix of
//! binary (CRC framed) messages and ASCII (`$...*XX`) sentences over a
//! serial line or a TCP socket.
//!
//! ## Features
//!
//! - Serial (raw termios) and TCP transports with non-blocking polling
//! - Stream demultiplexing of interleaved binary frames and text sentences
//! - Per-family converters producing typed telemetry records
//! - WGS-84 / ECEF / ENU transform math and derived products
//! - Wheel-speed telemetry frame encoder for the return channel
//!
//! ## Example
//!
//! ```rust,no_run
//! use fixlink_core::{CollectingSink, DriverConfig, Driver};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = DriverConfig::default();
//!     let mut driver = Driver::new(config, CollectingSink::default());
//!     driver.connect()?;
//!
//!     loop {
//!         driver.run_once()?;
//!         for record in driver.sink().drain() {
//!             println!("{}: {:?}", record.kind(), record);
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(5));
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::{ConfigError, DriverConfig, LoggingConfig};
pub use crate::core::convert::{ConverterRegistry, OutputFormat};
pub use crate::core::derive::{Presenter, TransformTree};
pub use crate::core::records::{GpsTime, Record, RecordKind};
pub use crate::core::session::{Driver, DriverError, DriverState, DriverStats, RunOutcome};
pub use crate::core::sink::{ChannelSink, CollectingSink, Sink};
pub use crate::core::transport::{SerialConfig, TcpConfig, TransportConfig, TransportError, TransportType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
