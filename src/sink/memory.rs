//! In-memory sink that records every call

use super::{LogSink, Stream};
use crate::error::SinkError;
use std::sync::Mutex;

/// One recorded `send_normal` / `send_error` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEntry {
    pub stream: Stream,
    pub guid: String,
    pub text: String,
    pub sender: String,
    pub instance_index: String,
}

/// Sink that keeps entries in memory. Can be told to fail every send.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<SentEntry>>,
    failing: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose sends all fail after being recorded.
    pub fn failing() -> Self {
        MemorySink {
            entries: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn entries(&self) -> Vec<SentEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn count(&self, stream: Stream) -> usize {
        self.entries().iter().filter(|e| e.stream == stream).count()
    }

    fn record(
        &self,
        stream: Stream,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        let entry = SentEntry {
            stream,
            guid: guid.to_string(),
            text: text.to_string(),
            sender: sender.to_string(),
            instance_index: instance_index.to_string(),
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }

        if self.failing {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "memory sink set to fail",
            )));
        }
        Ok(())
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn send_normal(
        &self,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        self.record(Stream::Out, guid, text, sender, instance_index)
    }

    fn send_error(
        &self,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        self.record(Stream::Err, guid, text, sender, instance_index)
    }
}
