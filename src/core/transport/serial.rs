//! Serial port transport implementation
//!
//! The device is opened directly and switched to raw mode with termios;
//! the previous terminal settings are restored on disconnect.

use super::{ReadOutcome, Transport, TransportError, TransportStats, TransportType};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Baud rates the line discipline can be configured for
pub const SUPPORTED_BAUD_RATES: [u32; 9] = [
    9600, 38400, 57600, 115_200, 230_400, 460_800, 500_000, 921_600, 1_000_000,
];

/// Rate used when the configured one is not supported
pub const FALLBACK_BAUD_RATE: u32 = 115_200;

fn default_baud_rate() -> u32 {
    FALLBACK_BAUD_RATE
}

fn default_read_timeout() -> u8 {
    50
}

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path (e.g. /dev/ttyUSB0)
    pub device: String,
    /// Baud rate
    #[serde(rename = "baudrate", default = "default_baud_rate")]
    pub baud_rate: u32,
    /// VTIME read timeout in tenths of a second
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ds: u8,
}

impl SerialConfig {
    /// Create a new serial configuration with default settings
    pub fn new(device: &str, baud_rate: u32) -> Self {
        Self {
            device: device.to_string(),
            baud_rate,
            read_timeout_ds: default_read_timeout(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyUSB0", FALLBACK_BAUD_RATE)
    }
}

/// Map a configured rate onto a supported one, falling back to 115200
pub fn map_baud_rate(requested: u32) -> u32 {
    if SUPPORTED_BAUD_RATES.contains(&requested) {
        requested
    } else {
        tracing::warn!(
            requested,
            fallback = FALLBACK_BAUD_RATE,
            "unsupported baud rate, using fallback"
        );
        FALLBACK_BAUD_RATE
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::IoError(e.into()))
}

/// Serial port transport
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<imp::RawPort>,
    stats: TransportStats,
    connected_at: Option<Instant>,
}

impl SerialTransport {
    /// Create a new serial transport
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: None,
            stats: TransportStats::default(),
            connected_at: None,
        }
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let baud_rate = map_baud_rate(self.config.baud_rate);
        let port = imp::RawPort::open(&self.config.device, baud_rate, self.config.read_timeout_ds)?;

        self.port = Some(port);
        self.connected_at = Some(Instant::now());
        self.stats = TransportStats::default();

        tracing::info!(device = %self.config.device, baud_rate, "serial port opened");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.connected_at = None;
        if let Some(port) = self.port.take() {
            port.close()?;
            tracing::info!(device = %self.config.device, "serial port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        let written = port.write(data)?;

        self.stats.bytes_sent += written as u64;
        self.stats.packets_sent += 1;
        Ok(written)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<ReadOutcome, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        let outcome = port.read(buffer)?;

        if let ReadOutcome::Data(n) = outcome {
            self.stats.bytes_received += n as u64;
            self.stats.packets_received += 1;
        }
        Ok(outcome)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Serial
    }

    fn connection_info(&self) -> String {
        format!("{} @ {} baud", self.config.device, self.config.baud_rate)
    }

    fn stats(&self) -> TransportStats {
        self.stats.with_uptime(self.connected_at)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

#[cfg(target_os = "linux")]
mod imp {
    use super::super::{ReadOutcome, TransportError};
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use nix::sys::termios::{
        cfsetispeed, cfsetospeed, tcgetattr, tcsetattr, BaudRate, InputFlags, LocalFlags,
        OutputFlags, SetArg, SpecialCharacterIndices, Termios,
    };
    use std::fs::{File, OpenOptions};
    use std::io::{ErrorKind, Read, Write};
    use std::os::fd::AsFd;
    use std::os::unix::fs::OpenOptionsExt;

    fn baud(rate: u32) -> BaudRate {
        match rate {
            9600 => BaudRate::B9600,
            38400 => BaudRate::B38400,
            57600 => BaudRate::B57600,
            230_400 => BaudRate::B230400,
            460_800 => BaudRate::B460800,
            500_000 => BaudRate::B500000,
            921_600 => BaudRate::B921600,
            1_000_000 => BaudRate::B1000000,
            _ => BaudRate::B115200,
        }
    }

    fn termios_error(device: &str, e: nix::Error) -> TransportError {
        TransportError::ConnectionFailed(format!("{device}: termios: {e}"))
    }

    /// Open descriptor plus the settings to restore
    pub(super) struct RawPort {
        file: File,
        saved: Termios,
    }

    impl RawPort {
        pub(super) fn open(device: &str, baud_rate: u32, vtime: u8) -> Result<Self, TransportError> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_NOCTTY)
                .open(device)
                .map_err(|e| match e.kind() {
                    ErrorKind::NotFound => TransportError::PortNotFound(device.to_string()),
                    ErrorKind::PermissionDenied => TransportError::PermissionDenied(device.to_string()),
                    _ => TransportError::ConnectionFailed(format!("{device}: {e}")),
                })?;

            let saved = tcgetattr(file.as_fd()).map_err(|e| termios_error(device, e))?;
            let mut raw = saved.clone();

            raw.input_flags &= !(InputFlags::IXON | InputFlags::IXOFF | InputFlags::ICRNL);
            raw.output_flags &= !(OutputFlags::OPOST | OutputFlags::ONLCR);
            raw.local_flags &= !(LocalFlags::ISIG
                | LocalFlags::ICANON
                | LocalFlags::ECHO
                | LocalFlags::ECHOE
                | LocalFlags::ECHONL
                | LocalFlags::IEXTEN);
            raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
            raw.control_chars[SpecialCharacterIndices::VTIME as usize] = vtime;

            let speed = baud(baud_rate);
            cfsetospeed(&mut raw, speed).map_err(|e| termios_error(device, e))?;
            cfsetispeed(&mut raw, speed).map_err(|e| termios_error(device, e))?;
            tcsetattr(file.as_fd(), SetArg::TCSANOW, &raw).map_err(|e| termios_error(device, e))?;

            Ok(Self { file, saved })
        }

        pub(super) fn read(&mut self, buffer: &mut [u8]) -> Result<ReadOutcome, TransportError> {
            let readable = {
                let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
                let ready = poll(&mut fds, PollTimeout::ZERO)
                    .map_err(|e| TransportError::IoError(e.into()))?;
                ready > 0
                    && fds[0]
                        .revents()
                        .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR))
            };
            if !readable {
                return Ok(ReadOutcome::WouldBlock);
            }

            match self.file.read(buffer) {
                Ok(0) => Err(TransportError::Disconnected),
                Ok(n) => Ok(ReadOutcome::Data(n)),
                Err(e) if e.kind() == ErrorKind::Interrupted => Ok(ReadOutcome::WouldBlock),
                Err(e) => Err(TransportError::IoError(e)),
            }
        }

        pub(super) fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
            Ok(self.file.write(data)?)
        }

        /// Restore the saved line discipline, then close
        pub(super) fn close(self) -> Result<(), TransportError> {
            tcsetattr(self.file.as_fd(), SetArg::TCSANOW, &self.saved)
                .map_err(|e| TransportError::IoError(e.into()))
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::super::{ReadOutcome, TransportError};

    pub(super) struct RawPort;

    impl RawPort {
        pub(super) fn open(device: &str, _baud_rate: u32, _vtime: u8) -> Result<Self, TransportError> {
            Err(TransportError::Unsupported(format!(
                "raw serial access to {device} is only implemented on Linux"
            )))
        }

        pub(super) fn read(&mut self, _buffer: &mut [u8]) -> Result<ReadOutcome, TransportError> {
            Err(TransportError::NotConnected)
        }

        pub(super) fn write(&mut self, _data: &[u8]) -> Result<usize, TransportError> {
            Err(TransportError::NotConnected)
        }

        pub(super) fn close(self) -> Result<(), TransportError> {
            Ok(())
        }
    }
}
