//! Record output for the command line
//!
//! Writes each published record as one line, either JSON for scripting or
//! a compact human-readable form.

use crate::core::derive::stamp_or_now;
use crate::core::records::{Record, RecordKind};
use crate::core::sink::Sink;
use chrono::{SecondsFormat, Utc};
use clap::ValueEnum;
use std::collections::HashSet;
use std::io::{self, Write};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RecordFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// `time kind fields` per line
    Text,
}

/// Format one record as a single line (no terminator)
pub fn format_record(record: &Record, format: RecordFormat) -> String {
    let now = Utc::now();
    let time = record
        .stamp()
        .map_or(now, |stamp| stamp_or_now(&stamp, now))
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    match format {
        RecordFormat::Json => {
            let mut json = record.to_json();
            json["time"] = serde_json::Value::String(time);
            json.to_string()
        }
        RecordFormat::Text => {
            let data = serde_json::to_value(record).unwrap_or_default();
            format!("{time} {:<11} {data}", record.kind().as_str())
        }
    }
}

/// Sink writing formatted records to any writer
pub struct WriterSink<W: Write> {
    writer: W,
    format: RecordFormat,
    kinds: Option<HashSet<RecordKind>>,
    failed: bool,
}

impl WriterSink<io::Stdout> {
    /// Sink writing to standard output
    pub fn stdout(format: RecordFormat) -> Self {
        Self::new(io::stdout(), format)
    }
}

impl<W: Write> WriterSink<W> {
    /// Create a sink over `writer`
    pub fn new(writer: W, format: RecordFormat) -> Self {
        Self {
            writer,
            format,
            kinds: None,
            failed: false,
        }
    }

    /// Only write the given kinds
    #[must_use]
    pub fn only(mut self, kinds: impl IntoIterator<Item = RecordKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Whether a write has failed (e.g. closed pipe)
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Flush the writer
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Unwrap
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn publish(&mut self, record: Record) {
        if self.failed || !self.is_subscribed(record.kind()) {
            return;
        }
        if let Err(e) = writeln!(self.writer, "{}", format_record(&record, self.format)) {
            tracing::error!("output write failed: {e}");
            self.failed = true;
        }
    }

    fn is_subscribed(&self, kind: RecordKind) -> bool {
        self.kinds.as_ref().map_or(true, |kinds| kinds.contains(&kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::{EndOfEpochData, GpsTime, TextData};

    fn eoe() -> Record {
        Record::EndOfEpoch(EndOfEpochData {
            stamp: GpsTime::new(2231, 227_610.75),
            epoch: "FUSION".into(),
        })
    }

    #[test]
    fn test_json_line() {
        let line = format_record(&eoe(), RecordFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["kind"], "eoe");
        assert_eq!(value["data"]["epoch"], "FUSION");
        assert_eq!(value["time"], "2022-10-11T15:13:12.750Z");
    }

    #[test]
    fn test_text_line() {
        let line = format_record(&eoe(), RecordFormat::Text);
        assert!(line.starts_with("2022-10-11T15:13:12.750Z eoe "));
        assert!(line.contains("\"FUSION\""));
    }

    #[test]
    fn test_writer_sink_filter() {
        let mut sink = WriterSink::new(Vec::new(), RecordFormat::Json).only([RecordKind::Text]);
        sink.publish(eoe());
        sink.publish(Record::Text(TextData {
            level: "WARNING".into(),
            text: "low voltage".into(),
        }));
        assert!(!sink.has_failed());
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("low voltage"));
    }
}
