use crate::field::FieldType;

/// Errors that prevent a plugin instance from activating.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to split host:port of {destination:?}: {reason}")]
    InvalidDestination { destination: String, reason: String },

    #[error("`format` refers to field {name:?}, but no stack plugin provides that")]
    UnresolvedField { name: String },

    #[error("field {name:?} is not provided; an instance-providing stage must run before this plugin")]
    MissingInstanceStage { name: String },

    #[error("mandatory config key `{0}` is missing")]
    MissingKey(&'static str),

    #[error("plugin is not configured")]
    NotConfigured,

    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// A field slot whose storage cannot be rendered as text.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("converting an {kind} address for field {field:?}: {reason}")]
    Address {
        field: String,
        kind: &'static str,
        reason: String,
    },

    #[error("field {field:?} is declared {expected} but holds {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template: {name}:{line}: {message}")]
    Parse {
        name: String,
        line: usize,
        message: String,
    },

    #[error("template: {name}: {message}")]
    Exec { name: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("instance {0:?} is not of the form <guid>/<index>")]
    MissingSeparator(String),

    #[error("instance {text:?} has an invalid index: {reason}")]
    InvalidIndex { text: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink is not started")]
    NotStarted,

    #[error("resolving destination {destination:?}: {reason}")]
    Resolve { destination: String, reason: String },

    #[error("encoding envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that aborts one record, or one identity's emission within a record.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("input line {line}: {message}")]
    Input { line: usize, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Line too long: {length} > {max_length}")]
    LineTooLong { length: usize, max_length: usize },
}
