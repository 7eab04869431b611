//! Schemas: type descriptors and ordered field specs for config structs.
//!
//! A config type hands a [`StructDef`] to the [`SchemaCache`], which
//! resolves it into an immutable [`Schema`] exactly once per type.

mod def;
mod introspect;


pub use def::{EnumDef, FieldDef, StructDef, StructRef, TypeExpr};
pub use introspect::SchemaCache;

use crate::error::DecodeError;
use crate::value::{StructBuilder, StructValue, Value};
use std::fmt;
use std::sync::Arc;

/// Stable identifier of a type, used for schema memoization and registry dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Key derived from the Rust type name.
    pub fn of<T: ?Sized>() -> Self {
        Self::new(std::any::type_name::<T>())
    }

    /// Key used by path-like values.
    pub fn path() -> Self {
        Self::new("path")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment of the key, without generic arguments.
    pub fn short_name(&self) -> &str {
        let base = self.0.split('<').next().unwrap_or(&self.0);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// A type key together with its ancestor chain, nearest ancestor first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeIdentity {
    key: TypeKey,
    ancestors: Vec<TypeKey>,
}

impl TypeIdentity {
    pub fn new(key: TypeKey) -> Self {
        Self {
            key,
            ancestors: Vec::new(),
        }
    }

    pub fn with_ancestors(key: TypeKey, ancestors: Vec<TypeKey>) -> Self {
        Self { key, ancestors }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn ancestors(&self) -> &[TypeKey] {
        &self.ancestors
    }

    pub fn name(&self) -> &str {
        self.key.short_name()
    }
}

/// Scalar types decoded by the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Int,
    Float,
    Str,
    Bytes,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Str => "str",
            PrimitiveKind::Bytes => "bytes",
        }
    }

    /// Registry key for this primitive.
    pub fn key(self) -> TypeKey {
        TypeKey::new(self.name())
    }
}

/// Shape of a collection field.
#[derive(Debug, Clone)]
pub enum CollectionShape {
    List(Box<TypeDescriptor>),
    Set(Box<TypeDescriptor>),
    /// Fixed-arity tuple; raw sequences must match its length exactly.
    Tuple(Vec<TypeDescriptor>),
    /// Homogeneous tuple of any length.
    VarTuple(Box<TypeDescriptor>),
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
}

/// Resolved declared type of a field.
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    Optional(Box<TypeDescriptor>),
    /// Alternatives tried in declaration order.
    Union(Vec<TypeDescriptor>),
    Collection(CollectionShape),
    Enum(Arc<EnumDef>),
    Struct(Arc<Schema>),
    /// Recursive struct reference reached through an optional or a collection.
    Deferred(TypeKey),
    PathLike,
    Any,
    /// User type decodable only through a registry entry.
    Custom(TypeIdentity),
}

impl TypeDescriptor {
    /// Human-readable type name used in diagnostics and help text.
    pub fn name(&self) -> String {
        match self {
            TypeDescriptor::Primitive(kind) => kind.name().to_string(),
            TypeDescriptor::Optional(inner) => format!("Optional[{}]", inner.name()),
            TypeDescriptor::Union(alternatives) => {
                format!("Union[{}]", join_names(alternatives))
            }
            TypeDescriptor::Collection(shape) => match shape {
                CollectionShape::List(item) => format!("List[{}]", item.name()),
                CollectionShape::Set(item) => format!("Set[{}]", item.name()),
                CollectionShape::Tuple(items) => format!("Tuple[{}]", join_names(items)),
                CollectionShape::VarTuple(item) => format!("Tuple[{}, ...]", item.name()),
                CollectionShape::Map(key, value) => {
                    format!("Dict[{}, {}]", key.name(), value.name())
                }
            },
            TypeDescriptor::Enum(def) => def.name().to_string(),
            TypeDescriptor::Struct(schema) => schema.name().to_string(),
            TypeDescriptor::Deferred(key) => key.short_name().to_string(),
            TypeDescriptor::PathLike => "Path".to_string(),
            TypeDescriptor::Any => "Any".to_string(),
            TypeDescriptor::Custom(identity) => identity.name().to_string(),
        }
    }

    /// Identity used for registry dispatch; structural types have none.
    pub fn dispatch_identity(&self) -> Option<TypeIdentity> {
        match self {
            TypeDescriptor::Primitive(kind) => Some(TypeIdentity::new(kind.key())),
            TypeDescriptor::PathLike => Some(TypeIdentity::new(TypeKey::path())),
            TypeDescriptor::Enum(def) => Some(def.identity().clone()),
            TypeDescriptor::Struct(schema) => Some(schema.identity().clone()),
            TypeDescriptor::Deferred(key) => Some(TypeIdentity::new(key.clone())),
            TypeDescriptor::Custom(identity) => Some(identity.clone()),
            TypeDescriptor::Optional(_)
            | TypeDescriptor::Union(_)
            | TypeDescriptor::Collection(_)
            | TypeDescriptor::Any => None,
        }
    }
}

fn join_names(descriptors: &[TypeDescriptor]) -> String {
    descriptors
        .iter()
        .map(TypeDescriptor::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Zero-argument constructor producing a fresh default on every call.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Finalize step run once on the assembled fields of a struct.
pub type PostInit = Arc<dyn Fn(&mut StructBuilder) -> anyhow::Result<()> + Send + Sync>;

/// Fallback used when a field is absent from the merged tree.
#[derive(Clone)]
pub enum FieldDefault {
    /// No default; the field must be supplied.
    Required,
    /// Immutable literal, cloned on use.
    Literal(Value),
    /// Factory invoked afresh on every decode.
    Factory(DefaultFactory),
    /// Nested struct decoded from an empty mapping, so its own defaults apply.
    Nested,
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Required => f.write_str("Required"),
            FieldDefault::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            FieldDefault::Factory(_) => f.write_str("Factory(..)"),
            FieldDefault::Nested => f.write_str("Nested"),
        }
    }
}

/// One field of a config struct.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    descriptor: TypeDescriptor,
    default: FieldDefault,
    doc: Option<String>,
    aliases: Vec<String>,
}

impl FieldSpec {
    /// Field name, also its dotted-path segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn default(&self) -> &FieldDefault {
        &self.default
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Extra command-line flags declared for this field.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn is_required(&self) -> bool {
        matches!(self.default, FieldDefault::Required)
    }
}

/// Ordered field specs of one config struct plus its optional post-init hook.
pub struct Schema {
    identity: TypeIdentity,
    doc: Option<String>,
    fields: Vec<FieldSpec>,
    post_init: Option<PostInit>,
}

impl Schema {
    pub fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    pub fn key(&self) -> &TypeKey {
        self.identity.key()
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn post_init(&self) -> Option<&PostInit> {
        self.post_init.as_ref()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("identity", &self.identity)
            .field("fields", &self.fields)
            .field("post_init", &self.post_init.is_some())
            .finish()
    }
}

/// A Rust type populated from layered configuration.
///
/// `definition` describes the fields once; `from_struct` and `to_struct`
/// move values between the decoded [`StructValue`] and the Rust type.
pub trait Config: Sized + 'static {
    fn definition() -> StructDef;

    fn from_struct(value: &StructValue) -> Result<Self, DecodeError>;

    fn to_struct(&self) -> StructValue;
}
