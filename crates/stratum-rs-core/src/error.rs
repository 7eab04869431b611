//! Error types for schema introspection, decoding, encoding and resolution.

use crate::resolver::ConfigLayerSource;
use crate::value::RawValue;
use std::fmt;
use thiserror::Error;

/// Dotted address of a field, from the root of the config tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The empty path addressing the root value.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from its segments, outermost first.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether this path addresses the root value.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Return this path with `segment` prepended by an enclosing frame.
    pub fn prefixed(mut self, segment: impl Into<String>) -> Self {
        self.0.insert(0, segment.into());
        self
    }

    /// Return a new path extended by one trailing segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        Self::from_segments(path.split('.'))
    }
}

/// Errors raised while building a schema from a struct definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// Structs reference each other directly, with no optional or collection in between.
    #[error("cyclic struct reference: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },
    /// A container literal was used as a default instead of a factory.
    #[error(
        "field {type_name}.{field} uses a mutable literal default; supply it through a default factory"
    )]
    MutableDefault { type_name: String, field: String },
    /// A nested default was declared on a field that is not a struct.
    #[error("field {type_name}.{field} declares a nested default but has type {found}")]
    InvalidNestedDefault {
        type_name: String,
        field: String,
        found: String,
    },
    /// The same field name was declared twice in one struct.
    #[error("field {type_name}.{field} is declared more than once")]
    DuplicateField { type_name: String, field: String },
    /// A field name cannot be used as a dotted-path segment.
    #[error("field name {field:?} in {type_name} is not a valid path segment")]
    InvalidFieldName { type_name: String, field: String },
    /// A union was declared without alternatives.
    #[error("field {type_name}.{field} declares a union with no alternatives")]
    EmptyUnion { type_name: String, field: String },
    /// An enum was declared without variants.
    #[error("enum {name} declares no variants")]
    EmptyEnum { name: String },
    /// An enum repeats a variant name.
    #[error("enum {name} declares variant {variant} twice")]
    DuplicateVariant { name: String, variant: String },
    /// A deferred struct reference could not be found in the schema cache.
    #[error("struct {key} has no schema in the cache")]
    UnresolvedStruct { key: String },
}

/// Errors raised while decoding a raw tree against a schema.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A raw value could not be converted to the declared type.
    #[error("invalid value {raw} at {path}: expected {expected}: {reason}")]
    TypeConversion {
        path: FieldPath,
        expected: String,
        raw: RawValue,
        reason: String,
    },
    /// A required field is absent from the merged tree and has no default.
    #[error("missing value for required field {path}")]
    MissingValue { path: FieldPath },
    /// A key has no matching field (fatal only under the deny policy).
    #[error("unknown key {path}")]
    UnknownKey { path: FieldPath },
    /// The post-construction hook of a struct failed.
    #[error("post-init hook of {type_name} failed at {path}: {message}")]
    PostInit {
        path: FieldPath,
        type_name: String,
        message: String,
    },
    /// A typed value did not have the shape a Rust field expected.
    #[error("cannot read {expected} from {path}: found {found}")]
    Extract {
        path: FieldPath,
        expected: String,
        found: String,
    },
    /// Building a schema on demand failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl DecodeError {
    /// Dotted path of the failing field, when the error has one.
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            Self::TypeConversion { path, .. }
            | Self::MissingValue { path }
            | Self::UnknownKey { path }
            | Self::PostInit { path, .. }
            | Self::Extract { path, .. } => Some(path),
            Self::Schema(_) => None,
        }
    }

    /// Prefix the error path with the segment of an enclosing frame.
    pub(crate) fn within(self, segment: &str) -> Self {
        match self {
            Self::TypeConversion {
                path,
                expected,
                raw,
                reason,
            } => Self::TypeConversion {
                path: path.prefixed(segment),
                expected,
                raw,
                reason,
            },
            Self::MissingValue { path } => Self::MissingValue {
                path: path.prefixed(segment),
            },
            Self::UnknownKey { path } => Self::UnknownKey {
                path: path.prefixed(segment),
            },
            Self::PostInit {
                path,
                type_name,
                message,
            } => Self::PostInit {
                path: path.prefixed(segment),
                type_name,
                message,
            },
            Self::Extract {
                path,
                expected,
                found,
            } => Self::Extract {
                path: path.prefixed(segment),
                expected,
                found,
            },
            Self::Schema(err) => Self::Schema(err),
        }
    }
}

/// Errors raised while encoding a typed value.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A custom value has no encoder registered for its type.
    #[error("no encoder registered for {type_name} at {path}")]
    NoEncoder { path: FieldPath, type_name: String },
    /// A registered encoder returned an error.
    #[error("encoder for {type_name} failed at {path}: {message}")]
    Custom {
        path: FieldPath,
        type_name: String,
        message: String,
    },
    /// A struct value lacks a field its schema declares.
    #[error("value of {type_name} is missing field {path}")]
    MissingField { path: FieldPath, type_name: String },
    /// A struct value carries a field its schema does not declare.
    #[error("value of {type_name} carries undeclared field {path}")]
    UndeclaredField { path: FieldPath, type_name: String },
    /// Building a schema on demand failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl EncodeError {
    /// Prefix the error path with the segment of an enclosing frame.
    pub(crate) fn within(self, segment: &str) -> Self {
        match self {
            Self::NoEncoder { path, type_name } => Self::NoEncoder {
                path: path.prefixed(segment),
                type_name,
            },
            Self::Custom {
                path,
                type_name,
                message,
            } => Self::Custom {
                path: path.prefixed(segment),
                type_name,
                message,
            },
            Self::MissingField { path, type_name } => Self::MissingField {
                path: path.prefixed(segment),
                type_name,
            },
            Self::UndeclaredField { path, type_name } => Self::UndeclaredField {
                path: path.prefixed(segment),
                type_name,
            },
            Self::Schema(err) => Self::Schema(err),
        }
    }
}

/// Errors raised by the layered resolution pipeline.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The root schema could not be built.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The merged tree could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Two overrides address a value and a field inside that value.
    #[error("override {key} conflicts with the non-mapping value set at {prefix}")]
    ConflictingOverride { key: String, prefix: String },
    /// An override key has an empty path segment.
    #[error("invalid override key {key:?}")]
    InvalidOverrideKey { key: String },
    /// A layer's top-level value is not a mapping.
    #[error("{layer:?} layer must be a mapping, found {found}")]
    LayerNotMapping {
        layer: ConfigLayerSource,
        found: String,
    },
}
