// src/config.rs - plugin configuration tuple and config file loading
use crate::error::ConfigError;
use crate::field::FieldDescriptor;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Collector address used when `destination` is not configured.
pub const DEFAULT_DESTINATION: &str = "localhost:3457";

/// Highest auxiliary template key (`f1` .. `f4`).
pub const MAX_AUX_TEMPLATES: usize = 4;

/// The plugin's configuration tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default = "default_destination")]
    pub destination: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub sender: String,
    /// Static instance id handed to the log sink at start.
    #[serde(default)]
    pub instance: i64,
    /// Primary template.
    #[serde(default)]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f4: Option<String>,
}

fn default_destination() -> String {
    DEFAULT_DESTINATION.to_string()
}

impl PluginConfig {
    pub fn new(origin: &str, sender: &str, format: &str) -> Self {
        PluginConfig {
            destination: default_destination(),
            origin: origin.to_string(),
            sender: sender.to_string(),
            instance: 0,
            format: format.to_string(),
            f1: None,
            f2: None,
            f3: None,
            f4: None,
        }
    }

    /// Set auxiliary template `f<n>` (1-based).
    pub fn with_aux(mut self, n: usize, template: &str) -> Self {
        let slot = match n {
            1 => &mut self.f1,
            2 => &mut self.f2,
            3 => &mut self.f3,
            4 => &mut self.f4,
            _ => return self,
        };
        *slot = Some(template.to_string());
        self
    }

    pub fn with_destination(mut self, destination: &str) -> Self {
        self.destination = destination.to_string();
        self
    }

    /// Check mandatory keys and apply the `\x22` quote fixup to every string value.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.origin.is_empty() {
            return Err(ConfigError::MissingKey("origin"));
        }
        if self.sender.is_empty() {
            return Err(ConfigError::MissingKey("sender"));
        }
        if self.format.is_empty() {
            return Err(ConfigError::MissingKey("format"));
        }

        self.destination = fixup_config_string(&self.destination);
        self.origin = fixup_config_string(&self.origin);
        self.sender = fixup_config_string(&self.sender);
        self.format = fixup_config_string(&self.format);
        for aux in [&mut self.f1, &mut self.f2, &mut self.f3, &mut self.f4]
            .into_iter()
            .flatten()
        {
            *aux = fixup_config_string(aux);
        }

        Ok(self)
    }

    /// Ordered templates: position 0 is the primary, position `i` is `f<i>`.
    ///
    /// Every auxiliary slot is present; unset ones are empty templates, so
    /// `{{template "f<i>"}}` always resolves.
    pub fn templates(&self) -> Vec<String> {
        let aux: [&Option<String>; MAX_AUX_TEMPLATES] = [&self.f1, &self.f2, &self.f3, &self.f4];
        std::iter::once(self.format.clone())
            .chain(aux.iter().map(|t| t.as_deref().unwrap_or_default().to_string()))
            .collect()
    }
}

/// Config file: the plugin tuple plus the fields declared by upstream stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub plugin: PluginConfig,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl ConfigFile {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let mut file: ConfigFile = serde_yaml::from_str(text)?;
        file.plugin = file.plugin.validate()?;
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }
}

/// Config values cannot carry a raw double quote, so `\x22` stands in for one.
pub fn fixup_config_string(value: &str) -> String {
    value.replace("\\x22", "\"")
}

/// Validated `host:port` destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: String,
}

impl Destination {
    pub fn parse(hostport: &str) -> Result<Self, ConfigError> {
        let (host, port) = split_host_port(hostport).map_err(|reason| {
            ConfigError::InvalidDestination {
                destination: hostport.to_string(),
                reason: reason.to_string(),
            }
        })?;
        Ok(Destination {
            host: host.to_string(),
            port: port.to_string(),
        })
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Split `host:port`, `[host]:port` or `[ipv6]:port` into host and port.
fn split_host_port(hostport: &str) -> Result<(&str, &str), &'static str> {
    let colon = hostport.rfind(':').ok_or("missing port in address")?;

    let (host, host_start, port_start) = if let Some(rest) = hostport.strip_prefix('[') {
        let end = rest.find(']').ok_or("missing ']' in address")? + 1;
        match end + 1 {
            n if n == hostport.len() => return Err("missing port in address"),
            n if n == colon => {}
            n if hostport.as_bytes()[n] == b':' => return Err("too many colons in address"),
            _ => return Err("missing port in address"),
        }
        (&hostport[1..end], 1, end + 1)
    } else {
        let host = &hostport[..colon];
        if host.contains(':') {
            return Err("too many colons in address");
        }
        (host, 0, 0)
    };

    if hostport[host_start..].contains('[') {
        return Err("unexpected '[' in address");
    }
    if hostport[port_start..].contains(']') {
        return Err("unexpected ']' in address");
    }

    Ok((host, &hostport[colon + 1..]))
}
