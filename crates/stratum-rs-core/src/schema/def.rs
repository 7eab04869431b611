//! Declarative struct definitions handed to the introspector.

use super::{Config, DefaultFactory, PostInit, PrimitiveKind, TypeIdentity, TypeKey};
use crate::convert::{ConfigEnum, Describe, ToValue};
use crate::value::{StructBuilder, Value};
use std::fmt;
use std::sync::Arc;

/// Declared type of a field, before nested structs are resolved.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Primitive(PrimitiveKind),
    Optional(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    List(Box<TypeExpr>),
    Set(Box<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    VarTuple(Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Enum(Arc<EnumDef>),
    Struct(StructRef),
    Path,
    Any,
    Custom(TypeIdentity),
}

impl TypeExpr {
    /// Type expression of a Rust type.
    pub fn of<T: Describe>() -> Self {
        T::type_expr()
    }

    pub fn optional(inner: TypeExpr) -> Self {
        TypeExpr::Optional(Box::new(inner))
    }

    /// Union whose alternatives are tried in the given order.
    pub fn union(alternatives: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::Union(alternatives.into_iter().collect())
    }

    pub fn list(item: TypeExpr) -> Self {
        TypeExpr::List(Box::new(item))
    }

    pub fn set(item: TypeExpr) -> Self {
        TypeExpr::Set(Box::new(item))
    }

    pub fn tuple(items: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::Tuple(items.into_iter().collect())
    }

    pub fn var_tuple(item: TypeExpr) -> Self {
        TypeExpr::VarTuple(Box::new(item))
    }

    pub fn map(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::Map(Box::new(key), Box::new(value))
    }

    pub fn enumeration<E: ConfigEnum>() -> Self {
        TypeExpr::Enum(E::enum_def())
    }

    pub fn structure<T: Config>() -> Self {
        TypeExpr::Struct(StructRef::of::<T>())
    }

    pub fn custom(identity: TypeIdentity) -> Self {
        TypeExpr::Custom(identity)
    }
}

/// Lazy reference to a config struct definition.
#[derive(Clone)]
pub struct StructRef {
    key: TypeKey,
    define: fn() -> StructDef,
}

impl StructRef {
    pub fn of<T: Config>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            define: T::definition,
        }
    }

    /// Reference a definition that is not tied to a Rust type.
    pub fn new(key: TypeKey, define: fn() -> StructDef) -> Self {
        Self { key, define }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub(crate) fn define(&self) -> StructDef {
        (self.define)()
    }
}

impl fmt::Debug for StructRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StructRef").field(&self.key).finish()
    }
}

/// Enum type with its variant names in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    identity: TypeIdentity,
    variants: Vec<String>,
}

impl EnumDef {
    pub fn new<I, S>(key: TypeKey, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity: TypeIdentity::new(key),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Case-sensitive variant lookup.
    pub fn contains(&self, variant: &str) -> bool {
        self.variants.iter().any(|candidate| candidate == variant)
    }
}

/// Default as declared, before validation.
#[derive(Clone)]
pub(crate) enum DefaultDef {
    None,
    Literal(Value),
    Factory(DefaultFactory),
    Nested,
}

/// Declaration of one field.
#[derive(Clone)]
pub struct FieldDef {
    pub(crate) name: String,
    pub(crate) ty: TypeExpr,
    pub(crate) default: DefaultDef,
    pub(crate) doc: Option<String>,
    pub(crate) aliases: Vec<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            default: DefaultDef::None,
            doc: None,
            aliases: Vec::new(),
        }
    }

    /// Field whose declared type is the Rust type `T`.
    pub fn of<T: Describe>(name: impl Into<String>) -> Self {
        Self::new(name, T::type_expr())
    }

    /// Immutable literal default. Containers must use [`FieldDef::with_factory`].
    pub fn with_default(mut self, value: impl ToValue) -> Self {
        self.default = DefaultDef::Literal(value.to_value());
        self
    }

    /// Default built by `factory` on every decode that needs it.
    pub fn with_factory<T, F>(mut self, factory: F) -> Self
    where
        T: ToValue,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.default = DefaultDef::Factory(Arc::new(move || factory().to_value()));
        self
    }

    /// Default a nested struct field to the struct's own defaults.
    pub fn with_nested_default(mut self) -> Self {
        self.default = DefaultDef::Nested;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Extra command-line flag for this field, e.g. `--num-workers` or `-w`.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

/// Declaration of a config struct: fields in order, parents and hook.
#[derive(Default, Clone)]
pub struct StructDef {
    pub(crate) doc: Option<String>,
    pub(crate) parents: Vec<StructRef>,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) post_init: Option<PostInit>,
}

impl StructDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Inherit the fields (and hook) of another config struct.
    ///
    /// Parent fields come first; a field redeclared here replaces the parent
    /// field in place.
    pub fn extends<P: Config>(mut self) -> Self {
        self.parents.push(StructRef::of::<P>());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Hook run once after every field is set, before the instance is sealed.
    pub fn post_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut StructBuilder) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.post_init = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for StructDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructDef")
            .field("parents", &self.parents)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
