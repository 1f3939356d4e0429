//! Record sinks
//!
//! The driver hands every decoded [`Record`] to a [`Sink`]. The sink owns
//! fan-out; the engine only asks it whether a kind has subscribers when
//! computing derived products.

use super::records::{Record, RecordKind};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashSet;

/// Consumer of decoded records
#[cfg_attr(test, mockall::automock)]
pub trait Sink {
    /// Deliver one record
    fn publish(&mut self, record: Record);

    /// Whether anyone listens for `kind`
    fn is_subscribed(&self, _kind: RecordKind) -> bool {
        true
    }
}

/// Sink that stores records in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<Record>>,
    subscriptions: Option<HashSet<RecordKind>>,
}

impl CollectingSink {
    /// Collect only the given kinds
    pub fn subscribed_to(kinds: impl IntoIterator<Item = RecordKind>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            subscriptions: Some(kinds.into_iter().collect()),
        }
    }

    /// Take all records collected so far
    pub fn drain(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Number of pending records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// No pending records
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Sink for CollectingSink {
    fn publish(&mut self, record: Record) {
        if self.is_subscribed(record.kind()) {
            self.records.get_mut().push(record);
        }
    }

    fn is_subscribed(&self, kind: RecordKind) -> bool {
        self.subscriptions
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&kind))
    }
}

/// Sink that forwards records over a bounded channel.
///
/// A full channel drops the record; a disconnected receiver turns the sink
/// into a no-op.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Record>,
    dropped: u64,
}

impl ChannelSink {
    /// Create a sink and its receiving end
    pub fn bounded(capacity: usize) -> (Self, Receiver<Record>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx, dropped: 0 }, rx)
    }

    /// Records dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Sink for ChannelSink {
    fn publish(&mut self, record: Record) {
        match self.tx.try_send(record) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(record)) => {
                self.dropped += 1;
                tracing::debug!(kind = %record.kind(), "record channel full, dropping");
            }
        }
    }
}
