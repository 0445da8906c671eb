//! Stdout sink for local runs and debugging
//!
//! Prints one line per entry: `<OUT|ERR> <guid>/<instance> <sender>: <text>`.

use super::{LogSink, Stream};
use crate::error::SinkError;
use std::io::Write;

#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }

    pub fn format_line(
        stream: Stream,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> String {
        format!(
            "{} {}/{} {}: {}",
            stream.as_str(),
            guid,
            instance_index,
            sender,
            text
        )
    }

    fn print(
        &self,
        stream: Stream,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        let line = Self::format_line(stream, guid, text, sender, instance_index);
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

impl LogSink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    fn send_normal(
        &self,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        self.print(Stream::Out, guid, text, sender, instance_index)
    }

    fn send_error(
        &self,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        self.print(Stream::Err, guid, text, sender, instance_index)
    }
}
