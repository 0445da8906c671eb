// src/resolve.rs - configure-time binding of template field references
use crate::config::{Destination, PluginConfig};
use crate::error::ConfigError;
use crate::field::{FieldDescriptor, DEST_INSTANCE, SOURCE_INSTANCE};
use crate::provider::FieldProvider;
use crate::sink::SinkSettings;
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

static FIELD_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"ikey "([^"]*)""#).expect("field reference pattern is valid")
});

/// Validated, immutable configuration of one plugin instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub destination: Destination,
    pub origin: String,
    pub sender: String,
    pub instance: i64,
    /// Position 0 is the primary template, position `i` is `f<i>`.
    pub templates: Vec<String>,
    /// Every field the templates may look up, plus the instance fields.
    pub fields: IndexMap<String, FieldDescriptor>,
    /// Input field set: the instance fields at 0 and 1, then referenced fields in discovery order.
    pub layout: Vec<FieldDescriptor>,
}

impl ResolvedConfig {
    pub fn sink_settings(&self) -> SinkSettings {
        SinkSettings {
            destination: self.destination.clone(),
            origin: self.origin.clone(),
            sender: self.sender.clone(),
            instance: self.instance,
        }
    }
}

/// Distinct field names referenced through `ikey "<name>"`, in first-seen order.
pub fn referenced_fields(templates: &[String]) -> IndexSet<String> {
    templates
        .iter()
        .flat_map(|t| FIELD_REFERENCE.captures_iter(t))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Validate `config` and bind every referenced field against `provider`.
pub fn resolve(
    config: &PluginConfig,
    provider: &dyn FieldProvider,
) -> Result<ResolvedConfig, ConfigError> {
    debug!(destination = %config.destination, "resolving plugin config");
    let destination = Destination::parse(&config.destination)?;

    let templates = config.templates();
    debug!(format = %templates[0], aux = templates.len() - 1, "templates configured");

    let mut referenced = IndexMap::new();
    for name in referenced_fields(&templates) {
        let descriptor = provider
            .lookup(&name)
            .ok_or_else(|| ConfigError::UnresolvedField { name: name.clone() })?;
        debug!(field = %name, field_type = %descriptor.field_type, "found input key in templates");
        referenced.insert(name, descriptor);
    }

    let mut layout = Vec::with_capacity(2 + referenced.len());
    for name in [SOURCE_INSTANCE, DEST_INSTANCE] {
        let descriptor = provider
            .lookup(name)
            .ok_or_else(|| ConfigError::MissingInstanceStage {
                name: name.to_string(),
            })?;
        layout.push(descriptor);
    }
    layout.extend(
        referenced
            .values()
            .filter(|d| d.name != SOURCE_INSTANCE && d.name != DEST_INSTANCE)
            .cloned(),
    );

    let fields: IndexMap<String, FieldDescriptor> = layout
        .iter()
        .map(|d| (d.name.clone(), d.clone()))
        .collect();

    info!(keys = layout.len(), "input keys resolved");

    Ok(ResolvedConfig {
        destination,
        origin: config.origin.clone(),
        sender: config.sender.clone(),
        instance: config.instance,
        templates,
        fields,
        layout,
    })
}
