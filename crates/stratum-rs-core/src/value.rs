//! Raw and typed value trees.
//!
//! [`RawValue`] is the untyped tree produced by file parsers and CLI
//! adapters. [`Value`] is the typed tree the decoder builds from it; struct
//! instances are [`StructValue`]s, sealed once decoding returns them.

use crate::convert::{ConfigEnum, FromValue, ToValue};
use crate::error::{DecodeError, FieldPath};
use crate::schema::{Config, EnumDef, TypeIdentity, TypeKey};
use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Untyped value tree: scalars, sequences and string-keyed mappings.
pub type RawValue = serde_json::Value;
/// String-keyed mapping inside a [`RawValue`].
pub type RawMap = serde_json::Map<String, RawValue>;

/// Typed value tree produced by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent optional value.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Path(PathBuf),
    Enum(EnumValue),
    List(Vec<Value>),
    /// Distinct elements in first-seen order.
    Set(Vec<Value>),
    Tuple(Vec<Value>),
    /// Pairs with distinct keys in first-seen order.
    Map(Vec<(Value, Value)>),
    Struct(StructValue),
    /// Raw value passed through without conversion.
    Any(RawValue),
    /// Opaque value produced by a registered decoder.
    Custom(CustomValue),
}

impl Value {
    /// Build a set value, dropping repeated elements.
    pub fn set_from(items: Vec<Value>) -> Self {
        let mut distinct: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !distinct.contains(&item) {
                distinct.push(item);
            }
        }
        Value::Set(distinct)
    }

    /// Build a map value; a repeated key keeps its first position and last value.
    pub fn map_from(pairs: Vec<(Value, Value)>) -> Self {
        let mut distinct: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match distinct.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = value,
                None => distinct.push((key, value)),
            }
        }
        Value::Map(distinct)
    }

    /// Short name of the value's shape, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Path(_) => "path",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
            Value::Any(_) => "any",
            Value::Custom(_) => "custom",
        }
    }

    /// Whether the value is (or contains) a mutable container.
    pub fn is_mutable(&self) -> bool {
        match self {
            Value::List(_) | Value::Set(_) | Value::Map(_) | Value::Struct(_) => true,
            Value::Tuple(items) => items.iter().any(Value::is_mutable),
            Value::Any(raw) => raw.is_array() || raw.is_object(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

/// A decoded enum variant.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    def: Arc<EnumDef>,
    variant: String,
}

impl EnumValue {
    /// Pair a declared enum with one of its variant names.
    pub fn new(def: Arc<EnumDef>, variant: impl Into<String>) -> Self {
        Self {
            def,
            variant: variant.into(),
        }
    }

    pub fn def(&self) -> &Arc<EnumDef> {
        &self.def
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }
}

/// Payload stored in a [`CustomValue`].
pub trait CustomData: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn CustomData) -> bool;
}

impl<T> CustomData for T
where
    T: Any + fmt::Debug + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn CustomData) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// Opaque value of a user type that only a registered decoder can produce.
#[derive(Clone)]
pub struct CustomValue {
    identity: TypeIdentity,
    data: Arc<dyn CustomData>,
}

impl CustomValue {
    /// Wrap `data` as a value of the type identified by `identity`.
    pub fn new<T: CustomData>(identity: TypeIdentity, data: T) -> Self {
        Self {
            identity,
            data: Arc::new(data),
        }
    }

    pub fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    /// Borrow the payload as `T` when it has that type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.as_ref().as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValue")
            .field("type", &self.identity.key())
            .field("data", &self.data)
            .finish()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.identity.key() == other.identity.key()
            && self.data.as_ref().dyn_eq(other.data.as_ref())
    }
}

/// Field values of one struct instance, in schema order.
///
/// A `StructValue` cannot be modified once built; post-init hooks work on a
/// [`StructBuilder`] before the decoder seals it.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    key: TypeKey,
    fields: Vec<(String, Value)>,
}

impl StructValue {
    /// Type key of the struct this value instantiates.
    pub fn type_key(&self) -> &TypeKey {
        &self.key
    }

    /// Iterate over `(name, value)` pairs in field order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Borrow the typed value of a field.
    pub fn value(&self, name: &str) -> Option<&Value> {
        lookup(&self.fields, name)
    }

    /// Read a field into a Rust type.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T, DecodeError> {
        extract(&self.fields, name)
    }

    /// Read a nested struct field into its config type.
    pub fn get_config<T: Config>(&self, name: &str) -> Result<T, DecodeError> {
        match lookup(&self.fields, name) {
            Some(Value::Struct(nested)) => T::from_struct(nested).map_err(|err| err.within(name)),
            Some(other) => Err(DecodeError::Extract {
                path: FieldPath::from_segments([name]),
                expected: TypeKey::of::<T>().short_name().to_string(),
                found: other.kind().to_string(),
            }),
            None => Err(missing_field(name)),
        }
    }
}

/// Mutable struct instance used while assembling fields.
///
/// Config types build one in [`Config::to_struct`]; post-init hooks receive
/// the decoder's builder after every field is set.
#[derive(Debug, Clone)]
pub struct StructBuilder {
    value: StructValue,
}

impl StructBuilder {
    /// Start an empty instance of the struct identified by `key`.
    pub fn new(key: TypeKey) -> Self {
        Self {
            value: StructValue {
                key,
                fields: Vec::new(),
            },
        }
    }

    /// Start an empty instance of a config type.
    pub fn of<T: Config>() -> Self {
        Self::new(TypeKey::of::<T>())
    }

    /// Chain a field conversion.
    pub fn field<T: ToValue + ?Sized>(mut self, name: &str, value: &T) -> Self {
        self.set(name, value);
        self
    }

    /// Chain a nested config field.
    pub fn config<T: Config>(mut self, name: &str, value: &T) -> Self {
        self.set_value(name, Value::Struct(value.to_struct()));
        self
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.value.value(name)
    }

    pub fn get<T: FromValue>(&self, name: &str) -> Result<T, DecodeError> {
        self.value.get(name)
    }

    /// Set a field from a Rust value, replacing any previous value.
    pub fn set<T: ToValue + ?Sized>(&mut self, name: &str, value: &T) {
        self.set_value(name, value.to_value());
    }

    /// Set a field to a typed value, replacing any previous value.
    pub fn set_value(&mut self, name: &str, value: Value) {
        match self.value.fields.iter_mut().find(|(field, _)| field == name) {
            Some(slot) => slot.1 = value,
            None => self.value.fields.push((name.to_string(), value)),
        }
    }

    pub fn len(&self) -> usize {
        self.value.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.fields.is_empty()
    }

    /// Seal the instance.
    pub fn build(self) -> StructValue {
        self.value
    }
}

fn lookup<'v>(fields: &'v [(String, Value)], name: &str) -> Option<&'v Value> {
    fields
        .iter()
        .find(|(field, _)| field == name)
        .map(|(_, value)| value)
}

fn extract<T: FromValue>(fields: &[(String, Value)], name: &str) -> Result<T, DecodeError> {
    let value = lookup(fields, name).ok_or_else(|| missing_field(name))?;
    T::from_value(value).map_err(|err| err.within(name))
}

fn missing_field(name: &str) -> DecodeError {
    DecodeError::MissingValue {
        path: FieldPath::from_segments([name]),
    }
}

/// Read a config enum out of a typed value (used by [`crate::config_enum!`]).
pub fn enum_from_value<E: ConfigEnum>(value: &Value) -> Result<E, DecodeError> {
    let name = match value {
        Value::Enum(value) => value.variant(),
        Value::Str(value) => value.as_str(),
        other => return Err(mismatch::<E>(other)),
    };
    E::from_variant(name).ok_or_else(|| DecodeError::Extract {
        path: FieldPath::root(),
        expected: TypeKey::of::<E>().short_name().to_string(),
        found: format!("variant {name:?}"),
    })
}

/// Wrap a config enum as a typed value (used by [`crate::config_enum!`]).
pub fn enum_to_value<E: ConfigEnum>(value: &E) -> Value {
    Value::Enum(EnumValue::new(E::enum_def(), value.variant()))
}

/// Read a nested config out of a typed value (used by [`crate::config_value!`]).
pub fn config_from_value<T: Config>(value: &Value) -> Result<T, DecodeError> {
    match value {
        Value::Struct(nested) => T::from_struct(nested),
        other => Err(mismatch::<T>(other)),
    }
}

pub(crate) fn mismatch<T: ?Sized + 'static>(found: &Value) -> DecodeError {
    DecodeError::Extract {
        path: FieldPath::root(),
        expected: TypeKey::of::<T>().short_name().to_string(),
        found: found.kind().to_string(),
    }
}
