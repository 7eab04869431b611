//! Recursive decoding of raw trees against type descriptors.

mod primitive;


use crate::error::{DecodeError, FieldPath, SchemaError};
use crate::registry::TypeRegistry;
use crate::schema::{
    CollectionShape, Config, FieldDefault, FieldSpec, Schema, SchemaCache, TypeDescriptor,
    TypeKey,
};
use crate::value::{EnumValue, RawMap, RawValue, StructBuilder, StructValue, Value};
use log::warn;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// What to do with mapping keys that match no field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKeyPolicy {
    /// Log a warning, record it and ignore the key.
    #[default]
    Warn,
    /// Fail the decode with [`DecodeError::UnknownKey`].
    Deny,
}

/// A mapping key that matched no field and was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKeyWarning {
    pub path: FieldPath,
    pub type_name: String,
}

impl fmt::Display for UnknownKeyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ignoring unknown key {} (not a field of {})",
            self.path, self.type_name
        )
    }
}

/// Walks a raw tree against a schema and builds typed values.
///
/// Registry decoders are consulted first for every typed node; built-in
/// handling applies only when no exact or ancestor entry matches.
pub struct Decoder<'a> {
    registry: &'a TypeRegistry,
    schemas: &'a SchemaCache,
    unknown_keys: UnknownKeyPolicy,
    /// Segments of the node being decoded, for warnings.
    path: Vec<String>,
    warnings: Vec<UnknownKeyWarning>,
}

impl<'a> Decoder<'a> {
    pub fn new(registry: &'a TypeRegistry, schemas: &'a SchemaCache) -> Self {
        Self {
            registry,
            schemas,
            unknown_keys: UnknownKeyPolicy::default(),
            path: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Decoder over the process-wide registry and schema cache.
    pub fn global() -> Decoder<'static> {
        Decoder::new(TypeRegistry::global(), SchemaCache::global())
    }

    pub fn with_unknown_keys(mut self, policy: UnknownKeyPolicy) -> Self {
        self.unknown_keys = policy;
        self
    }

    /// Unknown-key warnings recorded so far.
    pub fn warnings(&self) -> &[UnknownKeyWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<UnknownKeyWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Decode a raw mapping into a config type.
    pub fn decode_config<T: Config>(&mut self, raw: &RawValue) -> Result<T, DecodeError> {
        let schema = self.schemas.schema_for::<T>()?;
        let value = self.decode_struct(&schema, raw)?;
        T::from_struct(&value)
    }

    /// Decode a raw mapping into a sealed struct value.
    pub fn decode_struct(
        &mut self,
        schema: &Arc<Schema>,
        raw: &RawValue,
    ) -> Result<StructValue, DecodeError> {
        if let Some(value) = self.custom(&TypeDescriptor::Struct(schema.clone()), raw)? {
            return match value {
                Value::Struct(value) => Ok(value),
                other => Err(conversion(
                    schema.name(),
                    raw,
                    format!("registered decoder returned {}", other.kind()),
                )),
            };
        }
        self.build_struct(schema, raw)
    }

    /// Decode a raw value against a descriptor.
    pub fn decode(
        &mut self,
        descriptor: &TypeDescriptor,
        raw: &RawValue,
    ) -> Result<Value, DecodeError> {
        if let TypeDescriptor::Deferred(key) = descriptor {
            let schema = self.schemas.get(key).ok_or_else(|| unresolved(key))?;
            return self.decode(&TypeDescriptor::Struct(schema), raw);
        }
        if let Some(value) = self.custom(descriptor, raw)? {
            return Ok(value);
        }
        match descriptor {
            TypeDescriptor::Primitive(kind) => primitive::decode(*kind, raw)
                .map_err(|reason| conversion(kind.name(), raw, reason)),
            TypeDescriptor::Optional(inner) => {
                if raw.is_null() {
                    Ok(Value::None)
                } else {
                    self.decode(inner, raw)
                }
            }
            TypeDescriptor::Union(alternatives) => {
                self.decode_union(descriptor, alternatives, raw)
            }
            TypeDescriptor::Collection(shape) => self.decode_collection(descriptor, shape, raw),
            TypeDescriptor::Enum(def) => match raw.as_str() {
                Some(name) if def.contains(name) => {
                    Ok(Value::Enum(EnumValue::new(def.clone(), name)))
                }
                _ => Err(conversion(
                    def.name(),
                    raw,
                    format!("expected one of [{}]", def.variants().join(", ")),
                )),
            },
            TypeDescriptor::Struct(schema) => self.build_struct(schema, raw).map(Value::Struct),
            TypeDescriptor::PathLike => match raw.as_str() {
                Some(path) => Ok(Value::Path(PathBuf::from(path))),
                None => Err(conversion("Path", raw, "expected a string")),
            },
            TypeDescriptor::Any => Ok(Value::Any(raw.clone())),
            TypeDescriptor::Custom(identity) => Err(conversion(
                identity.name(),
                raw,
                format!("no decoder registered for {}", identity.key()),
            )),
            TypeDescriptor::Deferred(key) => Err(unresolved(key).into()),
        }
    }

    /// Run a registered decoder for the descriptor's type, if one matches.
    fn custom(
        &mut self,
        descriptor: &TypeDescriptor,
        raw: &RawValue,
    ) -> Result<Option<Value>, DecodeError> {
        if self.registry.is_empty() {
            return Ok(None);
        }
        let Some(identity) = descriptor.dispatch_identity() else {
            return Ok(None);
        };
        let Some(decode) = self.registry.decoder_for(&identity) else {
            return Ok(None);
        };
        decode(&identity, raw)
            .map(Some)
            .map_err(|err| conversion(&descriptor.name(), raw, format!("{err:#}")))
    }

    fn decode_union(
        &mut self,
        descriptor: &TypeDescriptor,
        alternatives: &[TypeDescriptor],
        raw: &RawValue,
    ) -> Result<Value, DecodeError> {
        let mut failures = Vec::with_capacity(alternatives.len());
        for alternative in alternatives {
            let mark = self.warnings.len();
            match self.decode(alternative, raw) {
                Ok(value) => return Ok(value),
                Err(DecodeError::Schema(err)) => return Err(err.into()),
                Err(err) => {
                    self.warnings.truncate(mark);
                    failures.push(format!("{}: {}", alternative.name(), reason(&err)));
                }
            }
        }
        Err(conversion(
            &descriptor.name(),
            raw,
            format!("no alternative matched ({})", failures.join("; ")),
        ))
    }

    fn decode_collection(
        &mut self,
        descriptor: &TypeDescriptor,
        shape: &CollectionShape,
        raw: &RawValue,
    ) -> Result<Value, DecodeError> {
        match shape {
            CollectionShape::Map(key, value) => self.decode_map(descriptor, key, value, raw),
            CollectionShape::List(item) => {
                let items = sequence(descriptor, raw)?;
                self.decode_items(item, items).map(Value::List)
            }
            CollectionShape::Set(item) => {
                let items = sequence(descriptor, raw)?;
                self.decode_items(item, items).map(Value::set_from)
            }
            CollectionShape::VarTuple(item) => {
                let items = sequence(descriptor, raw)?;
                self.decode_items(item, items).map(Value::Tuple)
            }
            CollectionShape::Tuple(declared) => {
                let items = sequence(descriptor, raw)?;
                if declared.len() != items.len() {
                    return Err(conversion(
                        &descriptor.name(),
                        raw,
                        format!(
                            "expected {} elements, found {}",
                            declared.len(),
                            items.len()
                        ),
                    ));
                }
                declared
                    .iter()
                    .zip(items)
                    .enumerate()
                    .map(|(index, (item, raw))| self.descend(&index.to_string(), item, raw))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Tuple)
            }
        }
    }

    fn decode_items(
        &mut self,
        item: &TypeDescriptor,
        items: &[RawValue],
    ) -> Result<Vec<Value>, DecodeError> {
        items
            .iter()
            .enumerate()
            .map(|(index, raw)| self.descend(&index.to_string(), item, raw))
            .collect()
    }

    /// Decode a mapping, or a sequence of `[key, value]` pairs.
    fn decode_map(
        &mut self,
        descriptor: &TypeDescriptor,
        key: &TypeDescriptor,
        value: &TypeDescriptor,
        raw: &RawValue,
    ) -> Result<Value, DecodeError> {
        let mut pairs = Vec::new();
        match raw {
            RawValue::Object(map) => {
                for (name, item) in map {
                    let decoded_key = self.descend(name, key, &RawValue::String(name.clone()))?;
                    let decoded_value = self.descend(name, value, item)?;
                    pairs.push((decoded_key, decoded_value));
                }
            }
            RawValue::Array(entries) => {
                for (index, entry) in entries.iter().enumerate() {
                    let segment = index.to_string();
                    let Some([raw_key, raw_value]) = entry.as_array().map(Vec::as_slice) else {
                        return Err(conversion(
                            &descriptor.name(),
                            entry,
                            "expected a [key, value] pair",
                        )
                        .within(&segment));
                    };
                    let decoded_key = self.descend(&segment, key, raw_key)?;
                    let decoded_value = self.descend(&segment, value, raw_value)?;
                    pairs.push((decoded_key, decoded_value));
                }
            }
            _ => {
                return Err(conversion(
                    &descriptor.name(),
                    raw,
                    "expected a mapping or a sequence of pairs",
                ));
            }
        }
        Ok(Value::map_from(pairs))
    }

    fn build_struct(
        &mut self,
        schema: &Arc<Schema>,
        raw: &RawValue,
    ) -> Result<StructValue, DecodeError> {
        let Some(map) = raw.as_object() else {
            return Err(conversion(schema.name(), raw, "expected a mapping"));
        };
        self.check_unknown_keys(schema, map)?;

        let mut builder = StructBuilder::new(schema.key().clone());
        for field in schema.fields() {
            self.path.push(field.name().to_string());
            let result = match map.get(field.name()) {
                Some(raw) => self.decode(field.descriptor(), raw),
                None => self.default_for(field),
            };
            self.path.pop();
            builder.set_value(field.name(), result.map_err(|err| err.within(field.name()))?);
        }

        if let Some(hook) = schema.post_init() {
            hook(&mut builder).map_err(|err| DecodeError::PostInit {
                path: FieldPath::root(),
                type_name: schema.name().to_string(),
                message: format!("{err:#}"),
            })?;
            if builder.len() != schema.fields().len() {
                return Err(DecodeError::PostInit {
                    path: FieldPath::root(),
                    type_name: schema.name().to_string(),
                    message: "hook set a field the schema does not declare".to_string(),
                });
            }
        }
        Ok(builder.build())
    }

    fn check_unknown_keys(&mut self, schema: &Schema, map: &RawMap) -> Result<(), DecodeError> {
        for key in map.keys() {
            if schema.field(key).is_some() {
                continue;
            }
            match self.unknown_keys {
                UnknownKeyPolicy::Deny => {
                    return Err(DecodeError::UnknownKey {
                        path: FieldPath::from_segments([key.as_str()]),
                    });
                }
                UnknownKeyPolicy::Warn => {
                    let warning = UnknownKeyWarning {
                        path: FieldPath::from_segments(self.path.iter()).child(key.as_str()),
                        type_name: schema.name().to_string(),
                    };
                    warn!("{warning}");
                    self.warnings.push(warning);
                }
            }
        }
        Ok(())
    }

    fn default_for(&mut self, field: &FieldSpec) -> Result<Value, DecodeError> {
        match field.default() {
            FieldDefault::Required => Err(DecodeError::MissingValue {
                path: FieldPath::root(),
            }),
            FieldDefault::Literal(value) => Ok(value.clone()),
            FieldDefault::Factory(factory) => Ok(factory()),
            FieldDefault::Nested => {
                self.decode(field.descriptor(), &RawValue::Object(RawMap::new()))
            }
        }
    }

    /// Decode a child node, prefixing its errors with `segment`.
    fn descend(
        &mut self,
        segment: &str,
        descriptor: &TypeDescriptor,
        raw: &RawValue,
    ) -> Result<Value, DecodeError> {
        self.path.push(segment.to_string());
        let result = self.decode(descriptor, raw);
        self.path.pop();
        result.map_err(|err| err.within(segment))
    }
}

fn conversion(expected: &str, raw: &RawValue, reason: impl Into<String>) -> DecodeError {
    DecodeError::TypeConversion {
        path: FieldPath::root(),
        expected: expected.to_string(),
        raw: raw.clone(),
        reason: reason.into(),
    }
}

fn sequence<'r>(
    descriptor: &TypeDescriptor,
    raw: &'r RawValue,
) -> Result<&'r [RawValue], DecodeError> {
    raw.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| conversion(&descriptor.name(), raw, "expected a sequence"))
}

fn unresolved(key: &TypeKey) -> SchemaError {
    SchemaError::UnresolvedStruct {
        key: key.to_string(),
    }
}

/// Failure summary of one union alternative.
fn reason(err: &DecodeError) -> String {
    match err {
        DecodeError::TypeConversion { path, reason, .. } if path.is_root() => reason.clone(),
        other => other.to_string(),
    }
}
