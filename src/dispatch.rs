// src/dispatch.rs - per-record template execution and flushing
use crate::error::{IdentityError, ProcessingError};
use crate::field::{decode_record, Record, DEST_INSTANCE, SOURCE_INSTANCE};
use crate::pipeline::context::ProcessResult;
use crate::resolve::ResolvedConfig;
use crate::sink::LogSink;
use crate::template::{FuncHost, TemplateSet, Value};
use crate::writer::{ChannelMode, LogEntryBuffer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Functions the templates may call besides the builtins.
pub const TEMPLATE_FUNCTIONS: &[&str] = &["ikey", "dsonde"];

/// Application instance a record pertains to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub guid: String,
    pub index: u32,
}

impl Identity {
    /// Parse `<guid>/<index>`. Anything after a second `/` is ignored.
    pub fn parse(text: &str) -> Result<Self, IdentityError> {
        let mut parts = text.split('/');
        let guid = parts.next().unwrap_or_default();
        let index = parts
            .next()
            .ok_or_else(|| IdentityError::MissingSeparator(text.to_string()))?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentityError::InvalidIndex {
                text: text.to_string(),
                reason: "index must be decimal digits".to_string(),
            });
        }
        let index = index
            .parse::<u32>()
            .map_err(|e| IdentityError::InvalidIndex {
                text: text.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Identity {
            guid: guid.to_string(),
            index,
        })
    }
}

/// Which instance field drives an emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Destination,
}

impl Role {
    pub fn field(self) -> &'static str {
        match self {
            Role::Source => SOURCE_INSTANCE,
            Role::Destination => DEST_INSTANCE,
        }
    }
}

/// One template execution: serves `ikey`/`dsonde` and collects output.
struct Emission<'a> {
    fields: &'a HashMap<String, String>,
    buffer: LogEntryBuffer,
}

fn single_string<'v>(name: &str, args: &'v [Value]) -> Result<&'v str, String> {
    match args {
        [Value::Str(s)] => Ok(s),
        [other] => Err(format!(
            "wrong type for value; expected string; got {}",
            other.kind()
        )),
        _ => Err(format!(
            "wrong number of args for {}: want 1 got {}",
            name,
            args.len()
        )),
    }
}

impl FuncHost for Emission<'_> {
    fn write(&mut self, text: &str) {
        self.buffer.write(text.as_bytes());
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, String> {
        match name {
            "ikey" => {
                let key = single_string(name, args)?;
                Ok(Value::Str(self.fields.get(key).cloned().unwrap_or_default()))
            }
            "dsonde" => {
                let selector = single_string(name, args)?;
                let mode = ChannelMode::from_selector(selector)
                    .ok_or_else(|| format!("unknown dropsonde mode {:?}", selector))?;
                self.buffer.set_mode(mode);
                Ok(Value::Str(String::new()))
            }
            _ => Err(format!("function {:?} not bound", name)),
        }
    }
}

/// Drives decoding, template compilation and emission for each record.
#[derive(Debug, Clone)]
pub struct TemplateDispatcher {
    config: Arc<ResolvedConfig>,
}

impl TemplateDispatcher {
    pub fn new(config: Arc<ResolvedConfig>) -> Self {
        TemplateDispatcher { config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Process one record, flushing one entry per present identity.
    pub fn process(&self, record: &Record, sink: &dyn LogSink) -> ProcessResult {
        if !record.is_valid(0) && !record.is_valid(1) {
            return ProcessResult::Skip;
        }

        let fields = match decode_record(record) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = %e, "decoding record");
                return ProcessResult::Error {
                    flushes: 0,
                    error: e.into(),
                };
            }
        };

        let instances: Vec<(Role, &str)> = [Role::Source, Role::Destination]
            .into_iter()
            .filter_map(|role| {
                fields
                    .get(role.field())
                    .filter(|text| !text.is_empty())
                    .map(|text| (role, text.as_str()))
            })
            .collect();
        if instances.is_empty() {
            return ProcessResult::Skip;
        }

        let templates = match TemplateSet::compile(&self.config.templates, TEMPLATE_FUNCTIONS) {
            Ok(templates) => templates,
            Err(e) => {
                warn!(error = %e, "parsing templates");
                return ProcessResult::Error {
                    flushes: 0,
                    error: e.into(),
                };
            }
        };

        let mut flushes = 0;
        let mut errors = Vec::new();
        for (role, text) in instances {
            let identity = match Identity::parse(text) {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(field = role.field(), error = %e, "skipping emission");
                    errors.push(ProcessingError::from(e));
                    continue;
                }
            };
            debug!(field = role.field(), guid = %identity.guid, index = identity.index, "emitting");

            let mut emission = Emission {
                fields: &fields,
                buffer: LogEntryBuffer::new(&identity.guid, &self.config.sender, identity.index),
            };
            let result = templates.execute(&mut emission);
            emission.buffer.flush(sink);
            flushes += 1;

            if let Err(e) = result {
                warn!(field = role.field(), error = %e, "executing template");
                return ProcessResult::Error {
                    flushes,
                    error: e.into(),
                };
            }
        }

        ProcessResult::Emitted { flushes, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PluginConfig;
    use crate::error::TemplateError;
    use crate::field::{FieldDescriptor, FieldType, RawValue};
    use crate::provider::StaticFieldProvider;
    use crate::resolve::resolve;
    use crate::sink::{MemorySink, SentEntry, Stream};

    fn dispatcher(config: PluginConfig) -> TemplateDispatcher {
        let provider = StaticFieldProvider::new([
            FieldDescriptor::new("uid", FieldType::String),
            FieldDescriptor::new("ip.daddr", FieldType::Ipv4),
            FieldDescriptor::new("dport", FieldType::Uint16),
        ])
        .with_instance_fields();
        let resolved = resolve(&config.with_destination("127.0.0.1:1234"), &provider).unwrap();
        TemplateDispatcher::new(Arc::new(resolved))
    }

    fn record(d: &TemplateDispatcher) -> Record {
        Record::for_layout(&d.config().layout)
    }

    #[test]
    fn test_identity_parse() {
        assert_eq!(
            Identity::parse("GUID-1/0").unwrap(),
            Identity {
                guid: "GUID-1".into(),
                index: 0
            }
        );
        assert_eq!(Identity::parse("g/12/extra").unwrap().index, 12);
        assert!(matches!(
            Identity::parse("GUID-2"),
            Err(IdentityError::MissingSeparator(_))
        ));
        assert!(matches!(
            Identity::parse("GUID-2/x"),
            Err(IdentityError::InvalidIndex { .. })
        ));
        assert!(Identity::parse("GUID-2/4294967296").is_err());
        assert!(matches!(
            Identity::parse("G/+5"),
            Err(IdentityError::InvalidIndex { .. })
        ));
        assert!(Identity::parse("G/").is_err());
    }

    #[test]
    fn test_round_trip_single_source() {
        let d = dispatcher(PluginConfig::new("o", "sndr", r#"{{dsonde "out"}}user={{ikey "uid"}}"#));
        let rec = record(&d)
            .with(SOURCE_INSTANCE, RawValue::string("GUID-1/0"))
            .with("uid", RawValue::string("alice"));
        let sink = MemorySink::new();

        let result = d.process(&rec, &sink);
        assert!(matches!(result, ProcessResult::Emitted { flushes: 1, ref errors } if errors.is_empty()));
        assert_eq!(
            sink.entries(),
            vec![SentEntry {
                stream: Stream::Out,
                guid: "GUID-1".into(),
                text: "user=alice".into(),
                sender: "sndr".into(),
                instance_index: "0".into(),
            }]
        );
        assert_eq!(sink.count(Stream::Err), 0);
    }

    #[test]
    fn test_flush_count_follows_identities() {
        let d = dispatcher(PluginConfig::new("o", "s", r#"{{dsonde "out"}}x"#));
        let sink = MemorySink::new();

        let both = record(&d)
            .with(SOURCE_INSTANCE, RawValue::string("A/0"))
            .with(DEST_INSTANCE, RawValue::string("B/1"));
        assert_eq!(d.process(&both, &sink).flushes(), 2);

        let dest_only = record(&d).with(DEST_INSTANCE, RawValue::string("B/1"));
        assert_eq!(d.process(&dest_only, &sink).flushes(), 1);

        let neither = record(&d).with("uid", RawValue::string("alice"));
        assert!(matches!(d.process(&neither, &sink), ProcessResult::Skip));

        let empty = record(&d)
            .with(SOURCE_INSTANCE, RawValue::string(""))
            .with(DEST_INSTANCE, RawValue::string(""));
        assert!(matches!(d.process(&empty, &sink), ProcessResult::Skip));

        let guids: Vec<String> = sink.entries().into_iter().map(|e| e.guid).collect();
        assert_eq!(guids, vec!["A", "B", "B"]);
    }

    #[test]
    fn test_channel_mode_is_per_emission() {
        let d = dispatcher(PluginConfig::new(
            "o",
            "s",
            r#"{{if eq (ikey "uid") "A"}}{{dsonde "err"}}{{end}}hello"#,
        ));
        let sink = MemorySink::new();
        let rec = record(&d)
            .with(SOURCE_INSTANCE, RawValue::string("A/0"))
            .with(DEST_INSTANCE, RawValue::string("B/0"))
            .with("uid", RawValue::string("A"));

        // both executions see uid == "A", so both select err independently
        assert_eq!(d.process(&rec, &sink).flushes(), 2);
        assert_eq!(sink.count(Stream::Err), 2);

        let d = dispatcher(PluginConfig::new("o", "s", "hello"));
        let sink = MemorySink::new();
        assert_eq!(d.process(&rec, &sink).flushes(), 2);
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_channel_mode_does_not_carry_across_records() {
        let d = dispatcher(PluginConfig::new(
            "o",
            "s",
            r#"{{if eq (ikey "dport") "22"}}{{dsonde "err"}}{{end}}{{template "f1"}}"#,
        )
        .with_aux(1, "{{if false}}{{else}}x{{end}}"));
        let sink = MemorySink::new();

        let first = record(&d)
            .with(SOURCE_INSTANCE, RawValue::string("A/0"))
            .with("dport", RawValue::U16(22));
        d.process(&first, &sink);
        let second = record(&d)
            .with(DEST_INSTANCE, RawValue::string("B/0"))
            .with("dport", RawValue::U16(80));
        d.process(&second, &sink);

        // the second record never selects a mode and is discarded
        assert_eq!(sink.entries().len(), 1);
        assert_eq!(sink.entries()[0].stream, Stream::Err);
        assert_eq!(sink.entries()[0].text, "x");
    }

    #[test]
    fn test_unset_aux_template_renders_empty() {
        let d = dispatcher(
            PluginConfig::new("o", "s", r#"{{dsonde "out"}}a{{template "f2"}}b{{template "f4"}}"#)
                .with_aux(1, "unused"),
        );
        let sink = MemorySink::new();
        let rec = record(&d).with(SOURCE_INSTANCE, RawValue::string("A/0"));

        let result = d.process(&rec, &sink);
        assert!(!result.is_error(), "unexpected result {:?}", result);
        assert_eq!(sink.entries()[0].text, "ab");
    }

    #[test]
    fn test_malformed_identity_only_skips_that_emission() {
        let d = dispatcher(PluginConfig::new("o", "s", r#"{{dsonde "out"}}{{ikey "uid"}}"#));
        let sink = MemorySink::new();
        let rec = record(&d)
            .with(SOURCE_INSTANCE, RawValue::string("GUID-2"))
            .with(DEST_INSTANCE, RawValue::string("GUID-3/5"))
            .with("uid", RawValue::string("bob"));

        match d.process(&rec, &sink) {
            ProcessResult::Emitted { flushes, errors } => {
                assert_eq!(flushes, 1);
                assert_eq!(errors.len(), 1);
                assert!(matches!(
                    errors[0],
                    ProcessingError::Identity(IdentityError::MissingSeparator(_))
                ));
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(sink.entries()[0].guid, "GUID-3");
        assert_eq!(sink.entries()[0].instance_index, "5");
    }

    #[test]
    fn test_bad_mode_flushes_partial_and_aborts_record() {
        let d = dispatcher(PluginConfig::new(
            "o",
            "s",
            r#"{{dsonde "err"}}partial{{dsonde "loud"}}rest"#,
        ));
        let sink = MemorySink::new();
        let rec = record(&d)
            .with(SOURCE_INSTANCE, RawValue::string("A/0"))
            .with(DEST_INSTANCE, RawValue::string("B/0"));

        match d.process(&rec, &sink) {
            ProcessResult::Error { flushes, error } => {
                assert_eq!(flushes, 1);
                assert!(error.to_string().contains("unknown dropsonde mode \"loud\""));
            }
            other => panic!("unexpected result {:?}", other),
        }
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "partial");
    }

    #[test]
    fn test_compile_error_aborts_before_any_flush() {
        let d = dispatcher(PluginConfig::new("o", "s", "{{if}}"));
        let sink = MemorySink::new();
        let rec = record(&d).with(SOURCE_INSTANCE, RawValue::string("A/0"));
        match d.process(&rec, &sink) {
            ProcessResult::Error { flushes: 0, error } => {
                assert!(matches!(error, ProcessingError::Template(TemplateError::Parse { .. })));
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_decode_error_aborts_record() {
        let d = dispatcher(PluginConfig::new("o", "s", r#"{{dsonde "out"}}{{ikey "ip.daddr"}}"#));
        let sink = MemorySink::new();
        let rec = record(&d)
            .with(SOURCE_INSTANCE, RawValue::string("A/0"))
            .with("ip.daddr", RawValue::Bytes(vec![10, 0]));
        assert!(matches!(
            d.process(&rec, &sink),
            ProcessResult::Error {
                error: ProcessingError::Decode(_),
                ..
            }
        ));

        let ok = record(&d)
            .with(SOURCE_INSTANCE, RawValue::string("A/0"))
            .with("ip.daddr", RawValue::Ipv4(0x0a00_0002));
        assert_eq!(d.process(&ok, &sink).flushes(), 1);
        assert_eq!(sink.entries()[0].text, "10.0.0.2");
    }
}
