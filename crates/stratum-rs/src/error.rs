//! Error types for loading, parsing and dumping configs.

use stratum_rs_core::{DecodeError, EncodeError, FieldPath, ResolveError, SchemaError};
use thiserror::Error;

/// Errors returned by the SDK entry points.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing a config file failed.
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A YAML document could not be parsed or rendered.
    #[error("failed to process YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A JSON document could not be parsed or rendered.
    #[error("failed to process JSON config: {0}")]
    Json(#[from] serde_json::Error),
    /// A JSON5 document could not be parsed.
    #[error("failed to parse JSON5 config: {0}")]
    Json5(#[from] json5::Error),
    /// A TOML document could not be parsed.
    #[error("failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// A config could not be rendered as TOML.
    #[error("failed to render TOML config: {0}")]
    TomlRender(#[from] toml::ser::Error),
    /// TOML has no null, and leaving this one out would change the loaded value.
    #[error("cannot render null at {path} as TOML")]
    TomlNull { path: FieldPath },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Command-line arguments were rejected (also carries help and version output).
    #[error(transparent)]
    Cli(#[from] clap::Error),
    /// A root field collides with the reserved config file flag.
    #[error("field {field:?} of {type_name} is reserved for the config file flag")]
    ReservedField { type_name: String, field: String },
    /// The format name or file extension is not recognized.
    #[error("unsupported config format {0:?}")]
    UnsupportedFormat(String),
}

impl ConfigError {
    /// Process exit code used by [`crate::parse_or_exit`].
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::Cli(err) => err.exit_code(),
            _ => 2,
        }
    }
}
