//! Per-application log sinks
//!
//! A sink receives fully rendered log entries tagged with an application GUID,
//! a sender label and an instance index, on either the normal or the error stream.

pub mod memory;
pub mod stdout;
pub mod udp;

use crate::error::SinkError;

pub use memory::{MemorySink, SentEntry};
pub use stdout::StdoutSink;
pub use udp::{SinkSettings, UdpLogSink};

/// Stream an entry is sent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Out,
    Err,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Out => "OUT",
            Stream::Err => "ERR",
        }
    }
}

/// External per-application log channel.
pub trait LogSink: Send + Sync {
    /// Sink name for identification and logging
    fn name(&self) -> &'static str;

    fn send_normal(
        &self,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError>;

    fn send_error(
        &self,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError>;
}

impl<S: LogSink + ?Sized> LogSink for std::sync::Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn send_normal(
        &self,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        (**self).send_normal(guid, text, sender, instance_index)
    }

    fn send_error(
        &self,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        (**self).send_error(guid, text, sender, instance_index)
    }
}
