//! Driver session: connection lifecycle and the polling read loop
//!
//! A [`Driver`] owns one transport, the accumulation buffer and the
//! converter registry. Each [`Driver::run_once`] performs one non-blocking
//! read, frames everything that is complete and hands decoded records to the
//! sink before returning.

use super::convert::{ConverterRegistry, DecodeError, Dispatch};
use super::protocol::{tokenize, BinaryFrame, FrameDecoder, Message, WheelSpeedFrame};
use super::records::Record;
use super::sink::Sink;
use super::transport::{create_transport, ReadOutcome, Transport, TransportError, TransportStats};
use crate::config::DriverConfig;
use thiserror::Error;

/// Bytes requested from the transport per read
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Not connected
    Disconnected,
    /// Connected and polling
    Connected,
    /// Connection lost or could not be opened
    Failed,
}

/// Driver errors
#[derive(Error, Debug)]
pub enum DriverError {
    /// No usable output format in the configuration
    #[error("no usable output format configured (unknown: {unknown:?})")]
    NoFormats {
        /// Names that were not recognised
        unknown: Vec<String>,
    },

    /// No open connection
    #[error("driver is not connected")]
    NotConnected,

    /// Transport failure; the connection has been closed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Outcome of one [`Driver::run_once`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No data was available
    Idle,
    /// Bytes were read and every complete message was dispatched
    Processed {
        /// Bytes read
        bytes: usize,
        /// Messages framed
        messages: usize,
    },
}

/// Driver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Bytes read from the transport
    pub bytes_read: u64,
    /// Binary frames framed
    pub frames: u64,
    /// Sentences framed
    pub sentences: u64,
    /// Bytes skipped while resynchronizing
    pub skipped_bytes: u64,
    /// Sentences with a bad checksum
    pub checksum_failures: u64,
    /// Messages a converter rejected
    pub decode_failures: u64,
    /// Messages without a registered converter
    pub unhandled: u64,
    /// Records handed to the sink
    pub records_published: u64,
    /// Wheel-speed frames the transport accepted in full
    pub wheelspeed_sent: u64,
}

/// Sensor driver
pub struct Driver<S: Sink> {
    config: DriverConfig,
    sink: S,
    registry: ConverterRegistry,
    init_error: Option<DriverError>,
    decoder: FrameDecoder,
    transport: Option<Box<dyn Transport>>,
    state: DriverState,
    read_buffer: Vec<u8>,
    wheelspeed: WheelSpeedFrame,
    stats: DriverStats,
}

impl<S: Sink> Driver<S> {
    /// Create a driver and its converters from the configured formats.
    ///
    /// An empty converter set is reported by [`init_error`](Self::init_error);
    /// the driver is still usable for the wheel-speed return channel.
    pub fn new(config: DriverConfig, sink: S) -> Self {
        let (registry, unknown) = ConverterRegistry::from_formats(&config.formats);
        let init_error = if registry.is_empty() {
            tracing::error!(?unknown, "no usable output format configured");
            Some(DriverError::NoFormats { unknown })
        } else {
            tracing::debug!(formats = ?registry.enabled(), "converters initialised");
            None
        };

        Self {
            config,
            sink,
            registry,
            init_error,
            decoder: FrameDecoder::new(),
            transport: None,
            state: DriverState::Disconnected,
            read_buffer: vec![0u8; READ_CHUNK_SIZE],
            wheelspeed: WheelSpeedFrame::new(),
            stats: DriverStats::default(),
        }
    }

    /// Open the configured transport, replacing any existing connection
    pub fn connect(&mut self) -> Result<(), DriverError> {
        let transport = create_transport(&self.config.connection);
        self.open(transport)
    }

    /// Use `transport` as the connection, connecting it first if needed
    pub fn open(&mut self, mut transport: Box<dyn Transport>) -> Result<(), DriverError> {
        self.disconnect();
        if !transport.is_connected() {
            if let Err(e) = transport.connect() {
                tracing::warn!(target_info = %transport.connection_info(), error = %e, "connect failed");
                self.state = DriverState::Failed;
                return Err(e.into());
            }
        }
        tracing::info!(
            transport = %transport.transport_type(),
            peer = %transport.connection_info(),
            "connected"
        );
        self.transport = Some(transport);
        self.state = DriverState::Connected;
        Ok(())
    }

    /// Close the connection and drop any partial message. Safe to call
    /// when never connected.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.disconnect() {
                tracing::warn!(error = %e, "error while closing connection");
            }
            tracing::info!(peer = %transport.connection_info(), "disconnected");
        }
        self.decoder.clear();
        if self.state == DriverState::Connected {
            self.state = DriverState::Disconnected;
        }
    }

    /// One non-blocking read followed by framing and dispatch.
    ///
    /// End of stream or a read error closes the connection and is returned
    /// as an error; no data available is [`RunOutcome::Idle`].
    pub fn run_once(&mut self) -> Result<RunOutcome, DriverError> {
        let transport = self.transport.as_mut().ok_or(DriverError::NotConnected)?;

        let n = match transport.receive(&mut self.read_buffer) {
            Ok(ReadOutcome::WouldBlock) => return Ok(RunOutcome::Idle),
            Ok(ReadOutcome::Data(n)) => n,
            Err(e) => {
                tracing::warn!(error = %e, "read failed, closing connection");
                self.disconnect();
                self.state = DriverState::Failed;
                return Err(e.into());
            }
        };
        self.stats.bytes_read += n as u64;

        let Self {
            decoder,
            registry,
            sink,
            stats,
            read_buffer,
            ..
        } = self;
        let summary = decoder.push(&read_buffer[..n], |message| {
            handle_message(registry, sink, stats, message);
        });
        self.stats.skipped_bytes += summary.skipped as u64;
        if summary.skipped > 0 {
            tracing::debug!(skipped = summary.skipped, "resynchronized");
        }

        Ok(RunOutcome::Processed {
            bytes: n,
            messages: summary.messages,
        })
    }

    /// Time fields for subsequent wheel-speed frames
    pub fn set_wheelspeed_time(&mut self, wno: u16, tow_ms: u32) {
        self.wheelspeed.set_time(wno, tow_ms);
    }

    /// Encode and write one wheel-speed frame.
    ///
    /// Returns `Ok(None)` without writing when the sample count is not 1, 2
    /// or 4, otherwise the number of bytes the transport accepted. Short
    /// writes are not retried.
    pub fn send_wheelspeed(&mut self, speeds: &[i32]) -> Result<Option<usize>, DriverError> {
        let transport = self.transport.as_mut().ok_or(DriverError::NotConnected)?;
        if !self.wheelspeed.set_speeds(speeds) {
            tracing::debug!(count = speeds.len(), "wheel-speed sample needs 1, 2 or 4 channels");
            return Ok(None);
        }

        let frame = self.wheelspeed.encode();
        let written = transport.send(&frame)?;
        if written < frame.len() {
            tracing::debug!(written, "short wheel-speed write");
        } else {
            self.stats.wheelspeed_sent += 1;
        }
        Ok(Some(written))
    }

    /// Initialisation failure, if any
    pub fn init_error(&self) -> Option<&DriverError> {
        self.init_error.as_ref()
    }

    /// Current state
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Connection open
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    /// Driver counters
    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Transport counters of the open connection
    pub fn transport_stats(&self) -> Option<TransportStats> {
        self.transport.as_ref().map(|t| t.stats())
    }

    /// Converter registry
    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Bytes waiting for the rest of a message
    pub fn pending_bytes(&self) -> usize {
        self.decoder.pending().len()
    }

    /// Record sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Record sink, mutable
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: Sink> Drop for Driver<S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn handle_message<S: Sink>(
    registry: &mut ConverterRegistry,
    sink: &mut S,
    stats: &mut DriverStats,
    message: Message<'_>,
) {
    let mut published = 0u64;
    let mut emit = |record: Record| {
        published += 1;
        sink.publish(record);
    };

    let result: Result<Dispatch, DecodeError> = match message {
        Message::Binary(bytes) => {
            stats.frames += 1;
            match BinaryFrame::parse(bytes) {
                Ok(frame) => registry.dispatch_binary(&frame.header, frame.payload, &mut emit),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping binary frame");
                    stats.decode_failures += 1;
                    return;
                }
            }
        }
        Message::Sentence(bytes) => {
            stats.sentences += 1;
            match tokenize(bytes) {
                Ok(tokens) => registry.dispatch_sentence(&tokens, &mut emit),
                Err(e) => {
                    tracing::warn!(error = %e, sentence = %String::from_utf8_lossy(bytes), "dropping sentence");
                    stats.checksum_failures += 1;
                    return;
                }
            }
        }
    };

    match result {
        Ok(Dispatch::Converted) => {}
        Ok(Dispatch::ForeignSentence | Dispatch::Unregistered) => {
            stats.unhandled += 1;
            tracing::debug!(message = %describe(message), "no converter for message");
        }
        Err(e) => {
            stats.decode_failures += 1;
            tracing::warn!(error = %e, "decode failed");
        }
    }
    stats.records_published += published;
}

fn describe(message: Message<'_>) -> String {
    match message {
        Message::Binary(bytes) => match BinaryFrame::parse(bytes) {
            Ok(frame) => format!("binary id {}", frame.header.message_id),
            Err(_) => format!("binary {}", hex::encode(&bytes[..bytes.len().min(8)])),
        },
        Message::Sentence(bytes) => {
            let head = bytes.split(|&b| b == b',').take(2).collect::<Vec<_>>();
            String::from_utf8_lossy(&head.join(&b',')).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::convert::samples;
    use crate::core::protocol::wheelspeed::WHEELSPEED_FRAME_LEN;
    use crate::core::records::RecordKind;
    use crate::core::sink::{CollectingSink, MockSink};
    use crate::core::transport::{MockTransport, TransportType};
    use std::collections::VecDeque;

    /// `Some(bytes)` is a read, `Some(empty)` and an exhausted queue read as
    /// would-block, `None` is the end of stream
    fn scripted(mut reads: VecDeque<Option<Vec<u8>>>) -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_is_connected().return_const(true);
        mock.expect_connection_info().returning(|| "mock".to_string());
        mock.expect_transport_type().return_const(TransportType::Tcp);
        mock.expect_receive().returning(move |buffer| match reads.pop_front() {
            Some(Some(chunk)) if !chunk.is_empty() => {
                buffer[..chunk.len()].copy_from_slice(&chunk);
                Ok(ReadOutcome::Data(chunk.len()))
            }
            Some(None) => Err(TransportError::Disconnected),
            Some(Some(_)) | None => Ok(ReadOutcome::WouldBlock),
        });
        mock
    }

    fn config(formats: &[&str]) -> DriverConfig {
        DriverConfig {
            formats: formats.iter().map(ToString::to_string).collect(),
            ..DriverConfig::default()
        }
    }

    #[test]
    fn test_empty_registry_reported() {
        let driver = Driver::new(config(&["NOPE"]), CollectingSink::default());
        assert!(matches!(
            driver.init_error(),
            Some(DriverError::NoFormats { unknown }) if unknown == &["NOPE".to_string()]
        ));
        assert_eq!(driver.state(), DriverState::Disconnected);
    }

    #[test]
    fn test_not_connected() {
        let mut driver = Driver::new(config(&["LLH"]), CollectingSink::default());
        assert!(driver.init_error().is_none());
        assert!(matches!(driver.run_once(), Err(DriverError::NotConnected)));
        assert!(matches!(driver.send_wheelspeed(&[1]), Err(DriverError::NotConnected)));
        driver.disconnect();
        assert_eq!(driver.state(), DriverState::Disconnected);
    }

    #[test]
    fn test_read_loop() {
        let llh = samples::LLH.as_bytes();
        let (head, tail) = llh.split_at(40);
        let mut first = b"\x00\xffjunk".to_vec();
        first.extend_from_slice(samples::TEXT.as_bytes());
        first.extend_from_slice(b"\r\n");
        first.extend_from_slice(head);

        let mut mock = scripted(VecDeque::from([Some(first), Some(tail.to_vec()), Some(Vec::new()), None]));
        mock.expect_disconnect().times(1).returning(|| Ok(()));

        let mut driver = Driver::new(config(&["LLH", "TEXT"]), CollectingSink::default());
        driver.open(Box::new(mock)).unwrap();
        assert_eq!(driver.state(), DriverState::Connected);

        let outcome = driver.run_once().unwrap();
        assert!(matches!(outcome, RunOutcome::Processed { messages: 1, .. }));
        assert_eq!(driver.pending_bytes(), 40);
        let kinds: Vec<_> = driver.sink().drain().iter().map(Record::kind).collect();
        assert_eq!(kinds, vec![RecordKind::Text]);

        driver.run_once().unwrap();
        let kinds: Vec<_> = driver.sink().drain().iter().map(Record::kind).collect();
        assert_eq!(kinds, vec![RecordKind::Llh]);
        assert_eq!(driver.pending_bytes(), 0);

        assert_eq!(driver.run_once().unwrap(), RunOutcome::Idle);

        assert!(matches!(
            driver.run_once(),
            Err(DriverError::Transport(TransportError::Disconnected))
        ));
        assert_eq!(driver.state(), DriverState::Failed);
        assert!(!driver.is_connected());

        let stats = driver.stats();
        assert_eq!(stats.sentences, 2);
        assert_eq!(stats.records_published, 2);
        // six junk bytes plus the CR LF after the first sentence
        assert_eq!(stats.skipped_bytes, 8);
    }

    #[test]
    fn test_bad_checksum_and_unregistered_counted() {
        let mut bad = samples::LLH.as_bytes().to_vec();
        let n = bad.len();
        bad[n - 1] = b'0';
        let mut data = bad;
        data.extend_from_slice(samples::RAWIMU.as_bytes());
        data.extend_from_slice(samples::GPGGA.as_bytes());

        let mut mock = scripted(VecDeque::from([Some(data)]));
        mock.expect_disconnect().returning(|| Ok(()));

        let mut sink = MockSink::new();
        sink.expect_publish().never();

        let mut driver = Driver::new(config(&["LLH"]), sink);
        driver.open(Box::new(mock)).unwrap();
        driver.run_once().unwrap();

        let stats = driver.stats();
        assert_eq!(stats.checksum_failures, 1);
        assert_eq!(stats.unhandled, 2);
        assert_eq!(stats.records_published, 0);
    }

    #[test]
    fn test_sink_receives_records_in_order() {
        let mut data = samples::TEXT.as_bytes().to_vec();
        data.extend_from_slice(samples::LLH.as_bytes());

        let mut mock = scripted(VecDeque::from([Some(data)]));
        mock.expect_disconnect().returning(|| Ok(()));

        let mut seq = mockall::Sequence::new();
        let mut sink = MockSink::new();
        sink.expect_publish()
            .withf(|r| r.kind() == RecordKind::Text)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        sink.expect_publish()
            .withf(|r| r.kind() == RecordKind::Llh)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut driver = Driver::new(config(&["LLH", "TEXT"]), sink);
        driver.open(Box::new(mock)).unwrap();
        driver.run_once().unwrap();
    }

    #[test]
    fn test_wheelspeed() {
        let mut mock = scripted(VecDeque::new());
        mock.expect_disconnect().returning(|| Ok(()));
        mock.expect_send()
            .withf(|frame| {
                frame.len() == WHEELSPEED_FRAME_LEN
                    && WheelSpeedFrame::decode(frame)
                        .is_ok_and(|f| f.wno == 2231 && f.tow_ms == 1000 && f.speeds == [5, -5, 0, 0])
            })
            .times(1)
            .returning(|frame| Ok(frame.len()));

        let mut driver = Driver::new(config(&["TEXT"]), CollectingSink::default());
        driver.open(Box::new(mock)).unwrap();
        driver.set_wheelspeed_time(2231, 1000);

        assert_eq!(driver.send_wheelspeed(&[1, 2, 3]).unwrap(), None);
        assert_eq!(driver.send_wheelspeed(&[5, -5]).unwrap(), Some(WHEELSPEED_FRAME_LEN));
        assert_eq!(driver.stats().wheelspeed_sent, 1);
    }

    #[test]
    fn test_short_wheelspeed_write_not_counted() {
        let mut written = VecDeque::from([0, 10, WHEELSPEED_FRAME_LEN]);
        let mut mock = scripted(VecDeque::new());
        mock.expect_disconnect().returning(|| Ok(()));
        mock.expect_send()
            .times(3)
            .returning(move |_| Ok(written.pop_front().unwrap_or_default()));

        let mut driver = Driver::new(config(&["TEXT"]), CollectingSink::default());
        driver.open(Box::new(mock)).unwrap();

        assert_eq!(driver.send_wheelspeed(&[1]).unwrap(), Some(0));
        assert_eq!(driver.send_wheelspeed(&[1]).unwrap(), Some(10));
        assert_eq!(driver.stats().wheelspeed_sent, 0);
        assert_eq!(driver.send_wheelspeed(&[1]).unwrap(), Some(WHEELSPEED_FRAME_LEN));
        assert_eq!(driver.stats().wheelspeed_sent, 1);
    }

    #[test]
    fn test_connect_failure_sets_failed() {
        let mut mock = MockTransport::new();
        mock.expect_is_connected().return_const(false);
        mock.expect_connection_info().returning(|| "mock".to_string());
        mock.expect_connect()
            .times(1)
            .returning(|| Err(TransportError::ConnectionFailed("refused".into())));

        let mut driver = Driver::new(config(&["TEXT"]), CollectingSink::default());
        assert!(matches!(
            driver.open(Box::new(mock)),
            Err(DriverError::Transport(TransportError::ConnectionFailed(_)))
        ));
        assert_eq!(driver.state(), DriverState::Failed);
        assert!(matches!(driver.run_once(), Err(DriverError::NotConnected)));
    }
}
