//! Encoding of typed values back into raw trees.

#[cfg(test)]
mod tests;

use crate::error::{EncodeError, FieldPath};
use crate::registry::TypeRegistry;
use crate::schema::{
    Config, FieldDefault, PrimitiveKind, Schema, SchemaCache, TypeDescriptor, TypeIdentity,
    TypeKey,
};
use crate::value::{RawMap, RawValue, StructValue, Value};
use serde_json::Number;

/// Walks typed values and produces raw trees that decode back to equal values.
pub struct Encoder<'a> {
    registry: &'a TypeRegistry,
    schemas: &'a SchemaCache,
}

impl<'a> Encoder<'a> {
    pub fn new(registry: &'a TypeRegistry, schemas: &'a SchemaCache) -> Self {
        Self { registry, schemas }
    }

    /// Encoder over the process-wide registry and schema cache.
    pub fn global() -> Encoder<'static> {
        Encoder::new(TypeRegistry::global(), SchemaCache::global())
    }

    /// Encode a config instance into a mapping in schema field order.
    pub fn encode_config<T: Config>(&self, config: &T) -> Result<RawValue, EncodeError> {
        self.schemas.schema_for::<T>()?;
        self.encode_struct(&config.to_struct())
    }

    /// Encode a struct value, dispatching through the registry first.
    pub fn encode_struct(&self, value: &StructValue) -> Result<RawValue, EncodeError> {
        self.encode(&Value::Struct(value.clone()))
    }

    pub fn encode(&self, value: &Value) -> Result<RawValue, EncodeError> {
        if let Some(raw) = self.custom(value)? {
            return Ok(raw);
        }
        let raw = match value {
            Value::None => RawValue::Null,
            Value::Bool(value) => RawValue::Bool(*value),
            Value::Int(value) => RawValue::from(*value),
            Value::Float(value) => encode_float(*value),
            Value::Str(value) => RawValue::String(value.clone()),
            Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => RawValue::String(text.to_string()),
                Err(_) => {
                    RawValue::Array(bytes.iter().map(|byte| RawValue::from(*byte)).collect())
                }
            },
            Value::Path(path) => RawValue::String(path.to_string_lossy().into_owned()),
            Value::Enum(value) => RawValue::String(value.variant().to_string()),
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
                RawValue::Array(self.encode_items(items)?)
            }
            Value::Map(pairs) => self.encode_map(pairs)?,
            Value::Struct(value) => self.encode_fields(value)?,
            Value::Any(raw) => raw.clone(),
            Value::Custom(custom) => {
                return Err(EncodeError::NoEncoder {
                    path: FieldPath::root(),
                    type_name: custom.identity().key().to_string(),
                });
            }
        };
        Ok(raw)
    }

    /// Encoded defaults of every field that has one, nested defaults included.
    pub fn defaults(&self, schema: &Schema) -> Result<RawValue, EncodeError> {
        let mut defaults = RawMap::new();
        for field in schema.fields() {
            let encoded = match (field.default(), field.descriptor()) {
                (FieldDefault::Required, _) => continue,
                (FieldDefault::Literal(value), _) => self.encode(value),
                (FieldDefault::Factory(factory), _) => self.encode(&factory()),
                (FieldDefault::Nested, TypeDescriptor::Struct(nested)) => self.defaults(nested),
                (FieldDefault::Nested, _) => continue,
            };
            defaults.insert(
                field.name().to_string(),
                encoded.map_err(|err| err.within(field.name()))?,
            );
        }
        Ok(RawValue::Object(defaults))
    }

    /// Drop every field of `encoded` whose value equals its declared default.
    ///
    /// Nested structs with a nested default are stripped recursively and
    /// dropped once empty. Other containers are compared whole, since the
    /// decoder replaces them wholesale.
    pub fn strip_defaults(
        &self,
        schema: &Schema,
        encoded: &RawValue,
    ) -> Result<RawValue, EncodeError> {
        let Some(map) = encoded.as_object() else {
            return Ok(encoded.clone());
        };
        let mut stripped = RawMap::new();
        for (name, raw) in map {
            let Some(field) = schema.field(name) else {
                stripped.insert(name.clone(), raw.clone());
                continue;
            };
            let default = match (field.default(), field.descriptor()) {
                (FieldDefault::Required, _) => None,
                (FieldDefault::Literal(value), _) => Some(self.encode(value)),
                (FieldDefault::Factory(factory), _) => Some(self.encode(&factory())),
                (FieldDefault::Nested, TypeDescriptor::Struct(nested)) => {
                    let inner = self
                        .strip_defaults(nested, raw)
                        .map_err(|err| err.within(name))?;
                    if inner.as_object().is_some_and(RawMap::is_empty) {
                        continue;
                    }
                    stripped.insert(name.clone(), inner);
                    continue;
                }
                (FieldDefault::Nested, _) => None,
            };
            match default.transpose().map_err(|err| err.within(name))? {
                Some(default) if &default == raw => {}
                _ => {
                    stripped.insert(name.clone(), raw.clone());
                }
            }
        }
        Ok(RawValue::Object(stripped))
    }

    /// Drop the null fields of `encoded` whose declared default is also null.
    ///
    /// Absent fields decode back to their default, so such a field can be
    /// left out of a document format that has no null. Any other null is kept.
    pub fn strip_null_defaults(
        &self,
        schema: &Schema,
        encoded: &RawValue,
    ) -> Result<RawValue, EncodeError> {
        let Some(map) = encoded.as_object() else {
            return Ok(encoded.clone());
        };
        let mut kept = RawMap::new();
        for (name, raw) in map {
            let Some(field) = schema.field(name) else {
                kept.insert(name.clone(), raw.clone());
                continue;
            };
            if raw.is_null() {
                let default = match field.default() {
                    FieldDefault::Literal(value) => Some(self.encode(value)),
                    FieldDefault::Factory(factory) => Some(self.encode(&factory())),
                    FieldDefault::Required | FieldDefault::Nested => None,
                };
                let default = default.transpose().map_err(|err| err.within(name))?;
                if default.as_ref().is_some_and(RawValue::is_null) {
                    continue;
                }
            }
            let value = match struct_schema(field.descriptor()) {
                Some(nested) if raw.is_object() => self
                    .strip_null_defaults(nested, raw)
                    .map_err(|err| err.within(name))?,
                _ => raw.clone(),
            };
            kept.insert(name.clone(), value);
        }
        Ok(RawValue::Object(kept))
    }

    /// Run a registered encoder for the value's type, if one matches.
    fn custom(&self, value: &Value) -> Result<Option<RawValue>, EncodeError> {
        if self.registry.is_empty() {
            return Ok(None);
        }
        let Some(identity) = self.identity_of(value) else {
            return Ok(None);
        };
        let Some(encode) = self.registry.encoder_for(&identity) else {
            return Ok(None);
        };
        encode(value).map(Some).map_err(|err| EncodeError::Custom {
            path: FieldPath::root(),
            type_name: identity.key().to_string(),
            message: format!("{err:#}"),
        })
    }

    fn identity_of(&self, value: &Value) -> Option<TypeIdentity> {
        let primitive = |kind: PrimitiveKind| Some(TypeIdentity::new(kind.key()));
        match value {
            Value::Bool(_) => primitive(PrimitiveKind::Bool),
            Value::Int(_) => primitive(PrimitiveKind::Int),
            Value::Float(_) => primitive(PrimitiveKind::Float),
            Value::Str(_) => primitive(PrimitiveKind::Str),
            Value::Bytes(_) => primitive(PrimitiveKind::Bytes),
            Value::Path(_) => Some(TypeIdentity::new(TypeKey::path())),
            Value::Enum(value) => Some(value.def().identity().clone()),
            Value::Struct(value) => Some(
                self.schemas
                    .get(value.type_key())
                    .map(|schema| schema.identity().clone())
                    .unwrap_or_else(|| TypeIdentity::new(value.type_key().clone())),
            ),
            Value::Custom(custom) => Some(custom.identity().clone()),
            Value::None
            | Value::List(_)
            | Value::Set(_)
            | Value::Tuple(_)
            | Value::Map(_)
            | Value::Any(_) => None,
        }
    }

    fn encode_items(&self, items: &[Value]) -> Result<Vec<RawValue>, EncodeError> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.encode(item)
                    .map_err(|err| err.within(&index.to_string()))
            })
            .collect()
    }

    /// Maps with scalar keys become mappings, others a sequence of pairs.
    fn encode_map(&self, pairs: &[(Value, Value)]) -> Result<RawValue, EncodeError> {
        let keys: Option<Vec<String>> = pairs.iter().map(|(key, _)| scalar_key(key)).collect();
        match keys {
            Some(keys) => {
                let mut map = RawMap::new();
                for (key, (_, value)) in keys.into_iter().zip(pairs) {
                    let encoded = self.encode(value).map_err(|err| err.within(&key))?;
                    map.insert(key, encoded);
                }
                Ok(RawValue::Object(map))
            }
            None => pairs
                .iter()
                .enumerate()
                .map(|(index, (key, value))| {
                    let segment = index.to_string();
                    let key = self.encode(key).map_err(|err| err.within(&segment))?;
                    let value = self.encode(value).map_err(|err| err.within(&segment))?;
                    Ok(RawValue::Array(vec![key, value]))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(RawValue::Array),
        }
    }

    fn encode_fields(&self, value: &StructValue) -> Result<RawValue, EncodeError> {
        let mut map = RawMap::new();
        let Some(schema) = self.schemas.get(value.type_key()) else {
            for (name, field) in value.fields() {
                map.insert(
                    name.to_string(),
                    self.encode(field).map_err(|err| err.within(name))?,
                );
            }
            return Ok(RawValue::Object(map));
        };

        if let Some((name, _)) = value.fields().find(|(name, _)| schema.field(name).is_none()) {
            return Err(EncodeError::UndeclaredField {
                path: FieldPath::from_segments([name]),
                type_name: schema.name().to_string(),
            });
        }
        for field in schema.fields() {
            let Some(item) = value.value(field.name()) else {
                return Err(EncodeError::MissingField {
                    path: FieldPath::from_segments([field.name()]),
                    type_name: schema.name().to_string(),
                });
            };
            let encoded = self.encode(item).map_err(|err| err.within(field.name()))?;
            map.insert(field.name().to_string(), encoded);
        }
        Ok(RawValue::Object(map))
    }
}

/// Non-finite floats have no raw number form; they encode to the text `f64` parses back.
fn encode_float(value: f64) -> RawValue {
    match Number::from_f64(value) {
        Some(number) => RawValue::Number(number),
        None => RawValue::String(value.to_string()),
    }
}

fn scalar_key(key: &Value) -> Option<String> {
    match key {
        Value::Str(value) => Some(value.clone()),
        Value::Int(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        Value::Float(value) => Some(value.to_string()),
        Value::Enum(value) => Some(value.variant().to_string()),
        Value::Path(path) => Some(path.to_string_lossy().into_owned()),
        _ => None,
    }
}

fn struct_schema(descriptor: &TypeDescriptor) -> Option<&Schema> {
    match descriptor {
        TypeDescriptor::Struct(schema) => Some(&**schema),
        TypeDescriptor::Optional(inner) => struct_schema(inner),
        _ => None,
    }
}
