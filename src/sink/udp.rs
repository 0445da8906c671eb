//! UDP sink sending JSON log envelopes to a collector
//!
//! The sink is initialized once from [`SinkSettings`] when the plugin starts and
//! never reconfigured afterwards. Each entry is one datagram.

use super::{LogSink, Stream};
use crate::config::Destination;
use crate::error::SinkError;
use serde::Serialize;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::debug;

/// Process-wide parameters of the log sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSettings {
    pub destination: Destination,
    pub origin: String,
    pub sender: String,
    pub instance: i64,
}

impl SinkSettings {
    /// Envelope origin: the configured origin, sender and instance joined by `/`.
    pub fn envelope_origin(&self) -> String {
        format!("{}/{}/{}", self.origin, self.sender, self.instance)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    origin: &'a str,
    event_type: &'static str,
    timestamp: i64,
    log_message: LogMessage<'a>,
}

#[derive(Serialize)]
struct LogMessage<'a> {
    message: &'a str,
    message_type: &'static str,
    timestamp: i64,
    app_id: &'a str,
    source_type: &'a str,
    source_instance: &'a str,
}

pub struct UdpLogSink {
    socket: UdpSocket,
    target: SocketAddr,
    origin: String,
}

impl UdpLogSink {
    pub fn initialize(settings: &SinkSettings) -> Result<Self, SinkError> {
        let resolve_err = |reason: String| SinkError::Resolve {
            destination: settings.destination.to_string(),
            reason,
        };

        let target = settings
            .destination
            .to_string()
            .to_socket_addrs()
            .map_err(|e| resolve_err(e.to_string()))?
            .next()
            .ok_or_else(|| resolve_err("no addresses found".to_string()))?;

        let bind: SocketAddr = if target.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)?;

        debug!(%target, origin = %settings.envelope_origin(), "udp log sink initialized");

        Ok(UdpLogSink {
            socket,
            target,
            origin: settings.envelope_origin(),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    fn send(
        &self,
        stream: Stream,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let envelope = Envelope {
            origin: &self.origin,
            event_type: "LogMessage",
            timestamp,
            log_message: LogMessage {
                message: text,
                message_type: stream.as_str(),
                timestamp,
                app_id: guid,
                source_type: sender,
                source_instance: instance_index,
            },
        };

        let payload = serde_json::to_vec(&envelope)?;
        self.socket.send_to(&payload, self.target)?;
        Ok(())
    }
}

impl LogSink for UdpLogSink {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn send_normal(
        &self,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        self.send(Stream::Out, guid, text, sender, instance_index)
    }

    fn send_error(
        &self,
        guid: &str,
        text: &str,
        sender: &str,
        instance_index: &str,
    ) -> Result<(), SinkError> {
        self.send(Stream::Err, guid, text, sender, instance_index)
    }
}
