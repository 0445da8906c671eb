// src/writer.rs - accumulates one log entry and routes it on flush
use crate::sink::LogSink;
use tracing::warn;

/// Which log stream an entry goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// No `dsonde` call happened; flushing discards with a diagnostic.
    #[default]
    Unset,
    Discard,
    Normal,
    Error,
}

impl ChannelMode {
    /// Parse a `dsonde` argument.
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector {
            "out" => Some(ChannelMode::Normal),
            "err" => Some(ChannelMode::Error),
            "nothing" => Some(ChannelMode::Discard),
            _ => None,
        }
    }
}

/// What a flush did with the buffered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Discarded,
    Sent,
    Failed,
}

/// Buffer for a single log entry.
#[derive(Debug)]
pub struct LogEntryBuffer {
    mode: ChannelMode,
    guid: String,
    sender: String,
    instance: u32,
    buf: Vec<u8>,
}

impl LogEntryBuffer {
    pub fn new(guid: &str, sender: &str, instance: u32) -> Self {
        LogEntryBuffer {
            mode: ChannelMode::Unset,
            guid: guid.to_string(),
            sender: sender.to_string(),
            instance,
            buf: Vec::new(),
        }
    }

    /// Append bytes. Never fails.
    pub fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn set_mode(&mut self, mode: ChannelMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Send or discard the entry according to the channel mode, consuming the buffer.
    ///
    /// Sink failures are logged and reported through the outcome, never returned.
    pub fn flush(self, sink: &dyn LogSink) -> FlushOutcome {
        let text = String::from_utf8_lossy(&self.buf);
        let instance = self.instance.to_string();

        let result = match self.mode {
            ChannelMode::Unset => {
                warn!(
                    guid = %self.guid,
                    "channel mode never selected; requires either {{{{dsonde \"out\"}}}} or {{{{dsonde \"err\"}}}}"
                );
                return FlushOutcome::Discarded;
            }
            ChannelMode::Discard => return FlushOutcome::Discarded,
            ChannelMode::Normal => sink
                .send_normal(&self.guid, &text, &self.sender, &instance)
                .map_err(|e| ("sending app log", e)),
            ChannelMode::Error => sink
                .send_error(&self.guid, &text, &self.sender, &instance)
                .map_err(|e| ("sending app error log", e)),
        };

        match result {
            Ok(()) => FlushOutcome::Sent,
            Err((what, error)) => {
                warn!(sink = sink.name(), guid = %self.guid, %error, "{}", what);
                FlushOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, SentEntry, Stream};
    use tracing_test::traced_test;

    #[test]
    fn test_normal_and_error_streams() {
        let sink = MemorySink::new();

        let mut out = LogEntryBuffer::new("GUID-1", "sndr", 0);
        out.write(b"user=");
        out.write(b"alice");
        out.set_mode(ChannelMode::Normal);
        assert_eq!(out.flush(&sink), FlushOutcome::Sent);

        let mut err = LogEntryBuffer::new("GUID-2", "sndr", 4);
        err.write(b"denied");
        err.set_mode(ChannelMode::Error);
        assert_eq!(err.flush(&sink), FlushOutcome::Sent);

        assert_eq!(
            sink.entries(),
            vec![
                SentEntry {
                    stream: Stream::Out,
                    guid: "GUID-1".into(),
                    text: "user=alice".into(),
                    sender: "sndr".into(),
                    instance_index: "0".into(),
                },
                SentEntry {
                    stream: Stream::Err,
                    guid: "GUID-2".into(),
                    text: "denied".into(),
                    sender: "sndr".into(),
                    instance_index: "4".into(),
                },
            ]
        );
    }

    #[test]
    fn test_discard_sends_nothing() {
        let sink = MemorySink::new();
        let mut buffer = LogEntryBuffer::new("GUID-1", "sndr", 0);
        buffer.write(b"quiet");
        buffer.set_mode(ChannelMode::Discard);
        assert_eq!(buffer.flush(&sink), FlushOutcome::Discarded);
        assert!(sink.entries().is_empty());
    }

    #[traced_test]
    #[test]
    fn test_unset_mode_discards_with_diagnostic() {
        let sink = MemorySink::new();
        let mut buffer = LogEntryBuffer::new("GUID-1", "sndr", 0);
        buffer.write(b"lost");
        assert_eq!(buffer.mode(), ChannelMode::Unset);
        assert_eq!(buffer.flush(&sink), FlushOutcome::Discarded);
        assert!(sink.entries().is_empty());
        assert!(logs_contain("channel mode never selected"));
    }

    #[traced_test]
    #[test]
    fn test_sink_failure_is_logged_not_returned() {
        let sink = MemorySink::failing();
        let mut buffer = LogEntryBuffer::new("GUID-1", "sndr", 0);
        buffer.set_mode(ChannelMode::Error);
        assert_eq!(buffer.flush(&sink), FlushOutcome::Failed);
        assert!(logs_contain("sending app error log"));
    }

    #[test]
    fn test_selectors() {
        assert_eq!(ChannelMode::from_selector("out"), Some(ChannelMode::Normal));
        assert_eq!(ChannelMode::from_selector("err"), Some(ChannelMode::Error));
        assert_eq!(ChannelMode::from_selector("nothing"), Some(ChannelMode::Discard));
        assert_eq!(ChannelMode::from_selector("OUT"), None);
    }
}
