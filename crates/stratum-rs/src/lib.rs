//! Public SDK surface for Stratum.
//!
//! Describe a configuration once as a [`Config`] type, then populate it from
//! schema defaults, an optional config file and dotted command-line flags:
//!
//! ```ignore
//! let config: TrainConfig = stratum_rs::parse(&ParseOptions::new())?;
//! ```
//!
//! The engine itself lives in [`stratum_rs_core`]; this crate adds file
//! formats, file I/O, the command-line adapter and the entry points.

mod cli;
mod error;
mod format;
mod layer_io;

pub use cli::{ArgumentParser, CONFIG_PATH_ARG, CliArgs};
pub use error::ConfigError;
pub use format::ConfigFormat;
/// Re-export for convenience.
pub use stratum_rs_core as core;
pub use stratum_rs_core::{
    Config, ConfigEnum, ConfigLayer, ConfigResolver, DecodeError, Decoder, Describe, Encoder,
    FieldDef, FromValue, RawValue, Resolved, SchemaCache, StructBuilder, StructDef, StructValue,
    ToValue, TypeExpr, TypeKey, TypeRegistry, UnknownKeyPolicy, Value, config_enum, config_value,
};

use log::{debug, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use stratum_rs_core::choose_config_path;

/// Options controlling how a config is parsed from the command line.
#[derive(Clone)]
pub struct ParseOptions {
    /// Config file used when the command line does not name one.
    pub config_path: Option<PathBuf>,
    /// Format of the config file and of command-line values. Defaults to the
    /// file extension, then YAML.
    pub format: Option<ConfigFormat>,
    pub unknown_keys: UnknownKeyPolicy,
    /// Program name shown in help; defaults to the config type name.
    pub program_name: Option<String>,
    registry: TypeRegistry,
    schemas: SchemaCache,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            format: None,
            unknown_keys: UnknownKeyPolicy::default(),
            program_name: None,
            registry: TypeRegistry::global().clone(),
            schemas: SchemaCache::global().clone(),
        }
    }
}

impl ParseOptions {
    /// Options using the process-wide registry and schema cache.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_format(mut self, format: ConfigFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_unknown_keys(mut self, policy: UnknownKeyPolicy) -> Self {
        self.unknown_keys = policy;
        self
    }

    pub fn with_program_name(mut self, name: impl Into<String>) -> Self {
        self.program_name = Some(name.into());
        self
    }

    /// Use a dedicated registry instead of the process-wide one.
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use a dedicated schema cache instead of the process-wide one.
    pub fn with_schema_cache(mut self, schemas: SchemaCache) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    fn encoder(&self) -> Encoder<'_> {
        Encoder::new(&self.registry, &self.schemas)
    }

    fn resolver(&self) -> ConfigResolver<'_> {
        ConfigResolver::new(&self.registry, &self.schemas).with_unknown_keys(self.unknown_keys)
    }

    /// Build the command-line parser for a config type.
    pub fn argument_parser<T: Config>(&self) -> Result<ArgumentParser, ConfigError> {
        let schema = self.schemas.schema_for::<T>()?;
        let program = self
            .program_name
            .clone()
            .unwrap_or_else(|| schema.name().to_string());
        ArgumentParser::new(
            &schema,
            &self.encoder(),
            &program,
            self.format.unwrap_or_default(),
        )
    }
}

/// Parse a config from the process arguments.
pub fn parse<T: Config>(options: &ParseOptions) -> Result<T, ConfigError> {
    parse_from(options, std::env::args_os())
}

/// Parse a config from explicit arguments; the first item is the program name.
pub fn parse_from<T, I, S>(options: &ParseOptions, args: I) -> Result<T, ConfigError>
where
    T: Config,
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    Ok(parse_layered_from(options, args)?.config)
}

/// Like [`parse_from`], also returning the merged tree, the layers and unknown-key warnings.
pub fn parse_layered_from<T, I, S>(
    options: &ParseOptions,
    args: I,
) -> Result<Resolved<T>, ConfigError>
where
    T: Config,
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let cli = options.argument_parser::<T>()?.parse_from(args)?;
    let config_path =
        choose_config_path(options.config_path.as_deref(), cli.config_path.as_deref());
    let file = match config_path {
        Some(path) => Some(layer_io::load_file_layer(&path, options.format)?),
        None => None,
    };
    debug!(
        "parsed command line (overrides={}, config_path={})",
        cli.overrides.len(),
        file.as_ref()
            .and_then(ConfigLayer::path)
            .map_or_else(|| "-".to_string(), |path| path.display().to_string())
    );
    let cli_layer = ConfigLayer::cli(cli.overrides)?;
    Ok(options.resolver().resolve(file, Some(cli_layer))?)
}

/// Parse a config from the process arguments, exiting on failure.
///
/// Help and version requests print and exit 0; other errors print a
/// diagnostic and exit non-zero.
pub fn parse_or_exit<T: Config>(options: &ParseOptions) -> T {
    match parse(options) {
        Ok(config) => config,
        Err(ConfigError::Cli(err)) => err.exit(),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}

/// Parse a config from the process arguments and hand it to `main`.
pub fn run<T, F, R>(options: &ParseOptions, main: F) -> R
where
    T: Config,
    F: FnOnce(T) -> R,
{
    main(parse_or_exit(options))
}

/// Decode a config from a document; missing fields take their defaults.
pub fn load<T: Config>(contents: &str, format: ConfigFormat) -> Result<T, ConfigError> {
    let options = ParseOptions::new();
    let file = ConfigLayer::file(None, format.parse_document(contents)?)?;
    Ok(options.resolver().resolve(Some(file), None)?.config)
}

/// Decode a config from a file, choosing the format by extension.
pub fn load_from_path<T: Config>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    info!("loading config from path: {}", path.display());
    let file = layer_io::load_file_layer(path, None)?;
    Ok(ParseOptions::new().resolver().resolve(Some(file), None)?.config)
}

/// Encode a config as a raw tree, optionally leaving out fields equal to their defaults.
pub fn to_raw<T: Config>(config: &T, omit_defaults: bool) -> Result<RawValue, ConfigError> {
    let options = ParseOptions::new();
    let encoder = options.encoder();
    let encoded = encoder.encode_config(config)?;
    if !omit_defaults {
        return Ok(encoded);
    }
    let schema = options.schemas.schema_for::<T>()?;
    Ok(encoder.strip_defaults(&schema, &encoded)?)
}

/// Encode a config for one document format.
///
/// TOML output leaves out null fields whose default is null too. Any other
/// null makes rendering fail rather than load back as a different config.
fn to_document<T: Config>(
    config: &T,
    format: ConfigFormat,
    omit_defaults: bool,
) -> Result<RawValue, ConfigError> {
    let raw = to_raw(config, omit_defaults)?;
    if format != ConfigFormat::Toml {
        return Ok(raw);
    }
    let options = ParseOptions::new();
    let schema = options.schemas.schema_for::<T>()?;
    Ok(options.encoder().strip_null_defaults(&schema, &raw)?)
}

/// Render a config as a document.
pub fn dump<T: Config>(
    config: &T,
    format: ConfigFormat,
    omit_defaults: bool,
) -> Result<String, ConfigError> {
    format.render(&to_document(config, format, omit_defaults)?)
}

/// Write a config to a file, choosing the format by extension.
pub fn dump_to_path<T: Config>(
    config: &T,
    path: impl AsRef<Path>,
    omit_defaults: bool,
) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let format = layer_io::format_for(path, None);
    layer_io::write_document(path, Some(format), &to_document(config, format, omit_defaults)?)
}

/// Flatten a nested raw mapping into dotted keys.
pub fn flatten(value: &RawValue) -> Vec<(String, RawValue)> {
    match value.as_object() {
        Some(map) => stratum_rs_core::merge::flatten(map),
        None => Vec::new(),
    }
}

/// Rebuild a nested mapping from dotted keys.
pub fn unflatten<I, K>(entries: I) -> Result<RawValue, ConfigError>
where
    I: IntoIterator<Item = (K, RawValue)>,
    K: AsRef<str>,
{
    Ok(RawValue::Object(stratum_rs_core::merge::unflatten(entries)?))
}

/// Install `env_logger` as the log backend when the `logging` feature is on.
///
/// Does nothing without the feature or when a logger is already installed.
/// Call it first thing in `main`; `RUST_LOG` picks the level.
#[inline]
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
