//! Transport layer for the sensor link
//!
//! Supports:
//! - Serial ports with raw line discipline (Linux)
//! - Raw TCP connections
//!
//! Transports are synchronous and polled: [`Transport::receive`] never
//! waits for data.

mod serial;
mod tcp;

pub use serial::{list_ports, map_baud_rate, SerialConfig, SerialTransport, SUPPORTED_BAUD_RATES};
pub use tcp::{TcpConfig, TcpTransport};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// Connection settings, one variant per transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Raw TCP
    Tcp(TcpConfig),
    /// Serial port
    Serial(SerialConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Tcp(TcpConfig::default())
    }
}

impl TransportConfig {
    /// Transport kind
    pub fn transport_type(&self) -> TransportType {
        match self {
            Self::Tcp(_) => TransportType::Tcp,
            Self::Serial(_) => TransportType::Serial,
        }
    }
}

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Serial port
    Serial,
    /// Raw TCP
    Tcp,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "Serial"),
            Self::Tcp => write!(f, "TCP"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection timeout
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Transport not available on this platform
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Peer closed the connection
    #[error("Disconnected")]
    Disconnected,
}

/// Result of a non-blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes were written to the front of the buffer
    Data(usize),
    /// Nothing available right now
    WouldBlock,
}

/// Transport statistics
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Write calls
    pub packets_sent: u64,
    /// Reads that returned data
    pub packets_received: u64,
    /// Connection uptime in seconds
    pub uptime_secs: u64,
}

impl TransportStats {
    pub(crate) fn with_uptime(&self, connected_at: Option<Instant>) -> Self {
        let mut stats = self.clone();
        if let Some(connected_at) = connected_at {
            stats.uptime_secs = connected_at.elapsed().as_secs();
        }
        stats
    }
}

/// Transport trait for all connection types
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Open the connection
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Close the connection; a no-op when not connected
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Write one buffer, without retrying a short write
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read whatever is available into `buffer` without waiting.
    ///
    /// End of stream is reported as [`TransportError::Disconnected`].
    fn receive(&mut self, buffer: &mut [u8]) -> Result<ReadOutcome, TransportError>;

    /// Get transport type
    fn transport_type(&self) -> TransportType;

    /// Get connection info string
    fn connection_info(&self) -> String;

    /// Get statistics
    fn stats(&self) -> TransportStats;
}

/// Create an unconnected transport from configuration
pub fn create_transport(config: &TransportConfig) -> Box<dyn Transport> {
    match config {
        TransportConfig::Tcp(cfg) => Box::new(TcpTransport::new(cfg.clone())),
        TransportConfig::Serial(cfg) => Box::new(SerialTransport::new(cfg.clone())),
    }
}
