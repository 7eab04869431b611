//! IO helpers for reading and writing config files.

use crate::{ConfigError, ConfigFormat};
use log::{debug, warn};
use std::fs;
use std::path::Path;
use stratum_rs_core::{ConfigLayer, RawValue};

/// Format for a path: the explicit choice, else its extension, else YAML.
pub(crate) fn format_for(path: &Path, explicit: Option<ConfigFormat>) -> ConfigFormat {
    if let Some(format) = explicit {
        return format;
    }
    ConfigFormat::from_path(path).unwrap_or_else(|| {
        warn!(
            "unrecognized config extension, reading as {} (path={})",
            ConfigFormat::default(),
            path.display()
        );
        ConfigFormat::default()
    })
}

/// Read and parse a config document from disk.
pub(crate) fn read_document(
    path: &Path,
    format: Option<ConfigFormat>,
) -> Result<RawValue, ConfigError> {
    let format = format_for(path, format);
    debug!(
        "loading config file (format={}, path={})",
        format,
        path.display()
    );
    let contents = fs::read_to_string(path)?;
    format.parse_document(&contents)
}

/// Load the file layer of a resolution.
pub(crate) fn load_file_layer(
    path: &Path,
    format: Option<ConfigFormat>,
) -> Result<ConfigLayer, ConfigError> {
    let value = read_document(path, format)?;
    Ok(ConfigLayer::file(Some(path.to_path_buf()), value)?)
}

/// Render a raw tree and write it to disk, creating parent directories.
pub(crate) fn write_document(
    path: &Path,
    format: Option<ConfigFormat>,
    value: &RawValue,
) -> Result<(), ConfigError> {
    let format = format_for(path, format);
    let contents = format.render(value)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    debug!(
        "writing config file (format={}, path={}, len={})",
        format,
        path.display(),
        contents.len()
    );
    fs::write(path, contents)?;
    Ok(())
}
