//! File formats for config documents and command-line values.

use crate::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use stratum_rs_core::{FieldPath, RawValue};

/// Serialization format of a config document.
///
/// The format is always passed explicitly or inferred from a file
/// extension; there is no process-wide current format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Json5,
    Toml,
}

/// Wrapper used to parse a lone TOML value.
#[derive(Deserialize)]
struct TomlScalar {
    value: RawValue,
}

impl ConfigFormat {
    pub const ALL: [ConfigFormat; 4] = [
        ConfigFormat::Yaml,
        ConfigFormat::Json,
        ConfigFormat::Json5,
        ConfigFormat::Toml,
    ];

    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            "json5" => Some(ConfigFormat::Json5),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    /// Canonical file extension.
    pub fn extension(self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Json => "json",
            ConfigFormat::Json5 => "json5",
            ConfigFormat::Toml => "toml",
        }
    }

    /// Parse a whole document. Empty documents parse to null.
    pub fn parse_document(self, contents: &str) -> Result<RawValue, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(RawValue::Null);
        }
        let value = match self {
            ConfigFormat::Yaml => serde_yaml::from_str(contents)?,
            ConfigFormat::Json => serde_json::from_str(contents)?,
            ConfigFormat::Json5 => json5::from_str(contents)?,
            ConfigFormat::Toml => toml::from_str(contents)?,
        };
        Ok(value)
    }

    /// Parse a single command-line value; text the format cannot parse stays a string.
    pub fn parse_scalar(self, text: &str) -> RawValue {
        let parsed = match self {
            ConfigFormat::Yaml => serde_yaml::from_str::<RawValue>(text).ok(),
            ConfigFormat::Json => serde_json::from_str::<RawValue>(text).ok(),
            ConfigFormat::Json5 => json5::from_str::<RawValue>(text).ok(),
            ConfigFormat::Toml => toml::from_str::<TomlScalar>(&format!("value = {text}"))
                .ok()
                .map(|scalar| scalar.value),
        };
        match parsed {
            Some(value) if !text.trim().is_empty() => value,
            _ => RawValue::String(text.to_string()),
        }
    }

    /// Render a raw tree as a document.
    ///
    /// TOML has no null, so a tree holding one is refused.
    pub fn render(self, value: &RawValue) -> Result<String, ConfigError> {
        let rendered = match self {
            ConfigFormat::Yaml => serde_yaml::to_string(value)?,
            ConfigFormat::Json | ConfigFormat::Json5 => {
                let mut text = serde_json::to_string_pretty(value)?;
                text.push('\n');
                text
            }
            ConfigFormat::Toml => {
                if let Some(path) = null_path(value) {
                    return Err(ConfigError::TomlNull { path });
                }
                toml::to_string(value)?
            }
        };
        Ok(rendered)
    }
}

impl FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim().trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == name || (name == "yml" && *format == Self::Yaml))
            .ok_or(ConfigError::UnsupportedFormat(name))
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

fn null_path(value: &RawValue) -> Option<FieldPath> {
    let within =
        |segment: String, item: &RawValue| null_path(item).map(|path| path.prefixed(segment));
    match value {
        RawValue::Null => Some(FieldPath::root()),
        RawValue::Object(map) => map.iter().find_map(|(key, item)| within(key.clone(), item)),
        RawValue::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(index, item)| within(index.to_string(), item)),
        _ => None,
    }
}
