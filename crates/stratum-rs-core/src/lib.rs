//! Typed conversion engine and layered resolution for Stratum configs.
//!
//! A config type describes itself once through [`Config::definition`]. The
//! [`SchemaCache`] turns that definition into a memoized [`Schema`], the
//! [`Decoder`] walks an untyped [`RawValue`] tree against it and the
//! [`Encoder`] walks back. [`ConfigResolver`] deep-merges file and
//! command-line layers and decodes the merged tree exactly once.
//!
//! This crate performs no I/O; file formats and argument parsing live in the
//! `stratum-rs` crate.

mod convert;
mod decode;
mod encode;
mod error;
pub mod merge;
mod registry;
mod resolver;
mod schema;
pub mod value;

/// Conversion traits between typed values and Rust types.
pub use convert::{ConfigEnum, Describe, FromValue, ToValue};
/// Decoding of raw trees into typed values.
pub use decode::{Decoder, UnknownKeyPolicy, UnknownKeyWarning};
/// Encoding of typed values into raw trees.
pub use encode::Encoder;
/// Error types for introspection, decoding, encoding and resolution.
pub use error::{DecodeError, EncodeError, FieldPath, ResolveError, SchemaError};
/// Type-keyed conversion registry.
pub use registry::{Conversion, DecodeFn, EncodeFn, TypeRegistry};
/// Layered resolution pipeline.
pub use resolver::{
    ConfigLayer, ConfigLayerSource, ConfigResolver, LayerInfo, Resolved, choose_config_path,
};
/// Schema definitions and introspection.
pub use schema::{
    CollectionShape, Config, DefaultFactory, EnumDef, FieldDef, FieldDefault, FieldSpec,
    PostInit, PrimitiveKind, Schema, SchemaCache, StructDef, StructRef, TypeDescriptor,
    TypeExpr, TypeIdentity, TypeKey,
};
/// Value trees.
pub use value::{
    CustomData, CustomValue, EnumValue, RawMap, RawValue, StructBuilder, StructValue, Value,
};
