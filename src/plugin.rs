// src/plugin.rs - output plugin lifecycle: configure, start, process, stop
use crate::config::PluginConfig;
use crate::dispatch::TemplateDispatcher;
use crate::error::{ConfigError, ProcessingError, SinkError};
use crate::field::{FieldDescriptor, Record};
use crate::pipeline::context::ProcessResult;
use crate::provider::FieldProvider;
use crate::resolve::{resolve, ResolvedConfig};
use crate::sink::{LogSink, StdoutSink, UdpLogSink};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A pipeline output stage
pub trait OutputPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Bind the plugin against the fields the upstream stages provide.
    fn configure(&mut self, provider: &dyn FieldProvider) -> Result<(), ConfigError>;

    /// Field layout records must follow; `None` until configured.
    fn layout(&self) -> Option<&[FieldDescriptor]>;

    /// Open the sink. Requires a configured plugin.
    fn start(&mut self) -> Result<(), ProcessingError>;

    fn process(&self, record: &Record) -> ProcessResult;

    fn stop(&mut self);
}

/// Where started plugins send their entries
#[derive(Clone)]
pub enum SinkKind {
    Udp,
    Stdout,
    Custom(Arc<dyn LogSink>),
}

impl fmt::Debug for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Udp => write!(f, "Udp"),
            SinkKind::Stdout => write!(f, "Stdout"),
            SinkKind::Custom(sink) => write!(f, "Custom({})", sink.name()),
        }
    }
}

/// Renders records through the configured templates into per-application logs.
pub struct DsondePlugin {
    config: PluginConfig,
    sink_kind: SinkKind,
    dispatcher: Option<TemplateDispatcher>,
    sink: Option<Arc<dyn LogSink>>,
}

impl DsondePlugin {
    pub fn new(config: PluginConfig, sink_kind: SinkKind) -> Self {
        DsondePlugin {
            config,
            sink_kind,
            dispatcher: None,
            sink: None,
        }
    }

    pub fn resolved(&self) -> Option<&ResolvedConfig> {
        self.dispatcher.as_ref().map(|d| d.config())
    }

    pub fn is_started(&self) -> bool {
        self.sink.is_some()
    }
}

impl OutputPlugin for DsondePlugin {
    fn name(&self) -> &str {
        "dsonde"
    }

    fn configure(&mut self, provider: &dyn FieldProvider) -> Result<(), ConfigError> {
        let config = self.config.clone().validate()?;
        let resolved = resolve(&config, provider)?;
        for descriptor in &resolved.layout {
            debug!(field = %descriptor.name, field_type = %descriptor.field_type, "input key");
        }
        info!(
            destination = %resolved.destination,
            origin = %resolved.origin,
            sender = %resolved.sender,
            instance = resolved.instance,
            "plugin configured"
        );
        self.dispatcher = Some(TemplateDispatcher::new(Arc::new(resolved)));
        Ok(())
    }

    fn layout(&self) -> Option<&[FieldDescriptor]> {
        self.resolved().map(|r| r.layout.as_slice())
    }

    fn start(&mut self) -> Result<(), ProcessingError> {
        let resolved = self.resolved().ok_or(ConfigError::NotConfigured)?;
        if self.sink.is_some() {
            return Ok(());
        }

        let sink: Arc<dyn LogSink> = match &self.sink_kind {
            SinkKind::Udp => Arc::new(UdpLogSink::initialize(&resolved.sink_settings())?),
            SinkKind::Stdout => Arc::new(StdoutSink::new()),
            SinkKind::Custom(sink) => Arc::clone(sink),
        };
        info!(sink = sink.name(), "plugin started");
        self.sink = Some(sink);
        Ok(())
    }

    fn process(&self, record: &Record) -> ProcessResult {
        match (&self.dispatcher, &self.sink) {
            (Some(dispatcher), Some(sink)) => dispatcher.process(record, sink.as_ref()),
            (None, _) => ProcessResult::Error {
                flushes: 0,
                error: ConfigError::NotConfigured.into(),
            },
            (Some(_), None) => ProcessResult::Error {
                flushes: 0,
                error: SinkError::NotStarted.into(),
            },
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            info!(sink = sink.name(), "plugin stopped");
        }
    }
}
