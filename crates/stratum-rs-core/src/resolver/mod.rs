//! Layered resolution: merge file and command-line layers, then decode once.
//!
//! Precedence (low -> high): schema defaults, file layer, command-line layer.
//! Defaults never form a merge layer; the decoder applies them only for
//! fields the merged tree leaves out.


use crate::decode::{Decoder, UnknownKeyPolicy, UnknownKeyWarning};
use crate::error::ResolveError;
use crate::merge;
use crate::registry::TypeRegistry;
use crate::schema::{Config, Schema, SchemaCache};
use crate::value::{RawMap, RawValue, StructValue};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Origin of a config layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Structured config file.
    File,
    /// Dotted command-line overrides (highest precedence).
    Cli,
}

/// One source's raw mapping, prior to merge.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    source: ConfigLayerSource,
    path: Option<PathBuf>,
    value: RawValue,
}

/// Metadata about a layer that took part in a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub source: ConfigLayerSource,
    /// Location on disk, for file layers.
    pub path: Option<PathBuf>,
}

impl ConfigLayer {
    /// Wrap a parsed file document. An empty document counts as an empty mapping.
    pub fn file(path: Option<PathBuf>, value: RawValue) -> Result<Self, ResolveError> {
        let value = match value {
            RawValue::Null => RawValue::Object(RawMap::new()),
            RawValue::Object(map) => RawValue::Object(map),
            other => {
                return Err(ResolveError::LayerNotMapping {
                    layer: ConfigLayerSource::File,
                    found: kind_of(&other).to_string(),
                });
            }
        };
        Ok(Self {
            source: ConfigLayerSource::File,
            path,
            value,
        })
    }

    /// Build the command-line layer from `(dotted.key, value)` overrides.
    pub fn cli<I, K>(overrides: I) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = (K, RawValue)>,
        K: AsRef<str>,
    {
        Ok(Self {
            source: ConfigLayerSource::Cli,
            path: None,
            value: RawValue::Object(merge::unflatten(overrides)?),
        })
    }

    pub fn source(&self) -> ConfigLayerSource {
        self.source
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn value(&self) -> &RawValue {
        &self.value
    }

    pub fn info(&self) -> LayerInfo {
        LayerInfo {
            source: self.source,
            path: self.path.clone(),
        }
    }
}

/// Result of a resolution: the single decoded instance plus provenance.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub config: T,
    /// Layers merged, lowest precedence first.
    pub layers: Vec<LayerInfo>,
    /// The merged tree the config was decoded from.
    pub merged: RawValue,
    pub warnings: Vec<UnknownKeyWarning>,
}

/// Stateless pipeline from raw layers to one decoded config.
pub struct ConfigResolver<'a> {
    registry: &'a TypeRegistry,
    schemas: &'a SchemaCache,
    unknown_keys: UnknownKeyPolicy,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(registry: &'a TypeRegistry, schemas: &'a SchemaCache) -> Self {
        Self {
            registry,
            schemas,
            unknown_keys: UnknownKeyPolicy::default(),
        }
    }

    /// Resolver over the process-wide registry and schema cache.
    pub fn global() -> ConfigResolver<'static> {
        ConfigResolver::new(TypeRegistry::global(), SchemaCache::global())
    }

    pub fn with_unknown_keys(mut self, policy: UnknownKeyPolicy) -> Self {
        self.unknown_keys = policy;
        self
    }

    /// Deep-merge the file layer, then the command-line layer, onto an empty mapping.
    pub fn merge(&self, file: Option<&ConfigLayer>, cli: Option<&ConfigLayer>) -> RawValue {
        merge::merge_all(file.into_iter().chain(cli).map(ConfigLayer::value))
    }

    /// Resolve a config type from optional file and command-line layers.
    pub fn resolve<T: Config>(
        &self,
        file: Option<ConfigLayer>,
        cli: Option<ConfigLayer>,
    ) -> Result<Resolved<T>, ResolveError> {
        let schema = self.schemas.schema_for::<T>()?;
        let resolved = self.resolve_struct(&schema, file, cli)?;
        Ok(Resolved {
            config: T::from_struct(&resolved.config)?,
            layers: resolved.layers,
            merged: resolved.merged,
            warnings: resolved.warnings,
        })
    }

    /// Resolve against an already built schema.
    pub fn resolve_struct(
        &self,
        schema: &Arc<Schema>,
        file: Option<ConfigLayer>,
        cli: Option<ConfigLayer>,
    ) -> Result<Resolved<StructValue>, ResolveError> {
        let layers: Vec<LayerInfo> = file
            .iter()
            .chain(cli.iter())
            .map(ConfigLayer::info)
            .collect();
        info!(
            "resolving config (type={}, layers={})",
            schema.name(),
            layers.len()
        );
        let merged = self.merge(file.as_ref(), cli.as_ref());
        debug!(
            "merged config layers (type={}, merged={})",
            schema.name(),
            merged
        );

        let mut decoder =
            Decoder::new(self.registry, self.schemas).with_unknown_keys(self.unknown_keys);
        let config = decoder.decode_struct(schema, &merged)?;
        Ok(Resolved {
            config,
            layers,
            merged,
            warnings: decoder.take_warnings(),
        })
    }
}

/// Pick the config file path: a command-line path wins over the API default.
pub fn choose_config_path(
    api_default: Option<&Path>,
    cli_override: Option<&Path>,
) -> Option<PathBuf> {
    match (api_default, cli_override) {
        (Some(default), Some(cli)) => {
            if default != cli {
                warn!(
                    "config path from the command line overrides the default (default={}, cli={})",
                    default.display(),
                    cli.display()
                );
            }
            Some(cli.to_path_buf())
        }
        (None, Some(cli)) => Some(cli.to_path_buf()),
        (Some(default), None) => Some(default.to_path_buf()),
        (None, None) => None,
    }
}

fn kind_of(value: &RawValue) -> &'static str {
    match value {
        RawValue::Null => "null",
        RawValue::Bool(_) => "a boolean",
        RawValue::Number(_) => "a number",
        RawValue::String(_) => "a string",
        RawValue::Array(_) => "a sequence",
        RawValue::Object(_) => "a mapping",
    }
}
