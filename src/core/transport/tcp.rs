//! TCP transport implementation

use super::{ReadOutcome, Transport, TransportError, TransportStats, TransportType};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

fn default_connect_timeout() -> u64 {
    5
}

/// TCP connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Sensor address
    pub ip: String,
    /// Port number
    pub port: u16,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl TcpConfig {
    /// Create a new TCP configuration
    pub fn new(ip: &str, port: u16) -> Self {
        Self {
            ip: ip.to_string(),
            port,
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    fn socket_addr(&self) -> Result<SocketAddr, TransportError> {
        (self.ip.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::InvalidConfiguration(format!("{}:{}: {e}", self.ip, self.port)))?
            .next()
            .ok_or_else(|| TransportError::InvalidConfiguration(format!("{}:{}", self.ip, self.port)))
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self::new("10.0.2.1", 21000)
    }
}

/// TCP transport
pub struct TcpTransport {
    config: TcpConfig,
    stream: Option<TcpStream>,
    stats: TransportStats,
    connected_at: Option<Instant>,
}

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            stream: None,
            stats: TransportStats::default(),
            connected_at: None,
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let addr = self.config.socket_addr()?;
        let timeout = Duration::from_secs(self.config.connect_timeout_secs.max(1));

        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| match e.kind() {
            ErrorKind::TimedOut => TransportError::Timeout(self.config.connect_timeout_secs),
            _ => TransportError::ConnectionFailed(format!("{addr}: {e}")),
        })?;

        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;

        self.stream = Some(stream);
        self.connected_at = Some(Instant::now());
        self.stats = TransportStats::default();

        tracing::info!(%addr, "TCP connection established");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(stream) = self.stream.take() {
            stream.shutdown(Shutdown::Both).ok();
            tracing::info!(peer = %self.connection_info(), "TCP connection closed");
        }
        self.connected_at = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        let written = match stream.write(data) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => 0,
            Err(e) => return Err(TransportError::IoError(e)),
        };

        self.stats.bytes_sent += written as u64;
        self.stats.packets_sent += 1;
        Ok(written)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<ReadOutcome, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        match stream.read(buffer) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(n) => {
                self.stats.bytes_received += n as u64;
                self.stats.packets_received += 1;
                Ok(ReadOutcome::Data(n))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(ReadOutcome::WouldBlock)
            }
            Err(e) => Err(TransportError::IoError(e)),
        }
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }

    fn connection_info(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    fn stats(&self) -> TransportStats {
        self.stats.with_uptime(self.connected_at)
    }
}
