//! Builds and memoizes schemas from struct definitions.

use super::def::{DefaultDef, FieldDef, StructRef, TypeExpr};
use super::{
    CollectionShape, Config, FieldDefault, FieldSpec, PostInit, Schema, TypeDescriptor,
    TypeIdentity, TypeKey,
};
use crate::error::SchemaError;
use log::debug;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

static GLOBAL_SCHEMAS: LazyLock<SchemaCache> = LazyLock::new(SchemaCache::new);

/// Memo of built schemas keyed by type.
///
/// Schemas are immutable once inserted. A schema built concurrently by two
/// callers is kept from whichever insert lands first.
#[derive(Default, Clone)]
pub struct SchemaCache {
    schemas: Arc<RwLock<HashMap<TypeKey, Arc<Schema>>>>,
}

impl SchemaCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache shared by the default decoder, encoder and resolver.
    pub fn global() -> &'static SchemaCache {
        &GLOBAL_SCHEMAS
    }

    /// Fetch an already built schema.
    pub fn get(&self, key: &TypeKey) -> Option<Arc<Schema>> {
        self.schemas.read().get(key).cloned()
    }

    /// Number of memoized schemas.
    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }

    /// Schema of a config type, building it (and its nested structs) on first use.
    pub fn schema_for<T: Config>(&self) -> Result<Arc<Schema>, SchemaError> {
        self.schema_for_ref(&StructRef::of::<T>())
    }

    /// Schema of a referenced struct definition.
    pub fn schema_for_ref(&self, reference: &StructRef) -> Result<Arc<Schema>, SchemaError> {
        if let Some(schema) = self.get(reference.key()) {
            return Ok(schema);
        }
        let mut introspector = Introspector::new(self);
        introspector.struct_schema(reference, false)?;
        Ok(introspector.commit(reference.key()))
    }
}

/// Single build pass; schemas become visible in the cache only if the whole pass succeeds.
struct Introspector<'a> {
    cache: &'a SchemaCache,
    built: HashMap<TypeKey, Arc<Schema>>,
    /// Structs being built, with whether each was entered through an indirection.
    stack: Vec<(TypeKey, bool)>,
}

impl<'a> Introspector<'a> {
    fn new(cache: &'a SchemaCache) -> Self {
        Self {
            cache,
            built: HashMap::new(),
            stack: Vec::new(),
        }
    }

    fn lookup(&self, key: &TypeKey) -> Option<Arc<Schema>> {
        self.built
            .get(key)
            .cloned()
            .or_else(|| self.cache.get(key))
    }

    /// Publish every schema of this pass and return the canonical root schema.
    fn commit(self, root: &TypeKey) -> Arc<Schema> {
        let mut schemas = self.cache.schemas.write();
        let mut canonical = None;
        for (key, schema) in self.built {
            let stored = schemas.entry(key.clone()).or_insert(schema).clone();
            if &key == root {
                canonical = Some(stored);
            }
        }
        canonical
            .or_else(|| schemas.get(root).cloned())
            .unwrap_or_else(|| {
                Arc::new(Schema {
                    identity: TypeIdentity::new(root.clone()),
                    doc: None,
                    fields: Vec::new(),
                    post_init: None,
                })
            })
    }

    fn struct_schema(
        &mut self,
        reference: &StructRef,
        indirect: bool,
    ) -> Result<Arc<Schema>, SchemaError> {
        let key = reference.key();
        if let Some(schema) = self.lookup(key) {
            return Ok(schema);
        }
        self.stack.push((key.clone(), indirect));
        let result = self.build(reference);
        self.stack.pop();
        let schema = Arc::new(result?);
        debug!(
            "built schema (type={}, fields={})",
            schema.name(),
            schema.fields.len()
        );
        self.built.insert(key.clone(), schema.clone());
        Ok(schema)
    }

    fn build(&mut self, reference: &StructRef) -> Result<Schema, SchemaError> {
        let def = reference.define();
        let type_name = reference.key().short_name().to_string();
        let mut fields: Vec<FieldSpec> = Vec::new();
        let mut ancestors: Vec<TypeKey> = Vec::new();
        let mut post_init: Option<PostInit> = None;

        for parent in &def.parents {
            if let Some(cycle) = self.cycle_to(parent.key(), false) {
                return Err(cycle);
            }
            let parent_schema = self.struct_schema(parent, false)?;
            for key in std::iter::once(parent_schema.key()).chain(parent_schema.identity.ancestors())
            {
                if !ancestors.contains(key) {
                    ancestors.push(key.clone());
                }
            }
            for field in parent_schema.fields() {
                upsert(&mut fields, field.clone());
            }
            if let Some(hook) = parent_schema.post_init() {
                post_init = Some(hook.clone());
            }
        }

        let mut declared = HashSet::new();
        for field in def.fields {
            if field.name.is_empty() || field.name.contains('.') {
                return Err(SchemaError::InvalidFieldName {
                    type_name,
                    field: field.name,
                });
            }
            if !declared.insert(field.name.clone()) {
                return Err(SchemaError::DuplicateField {
                    type_name,
                    field: field.name,
                });
            }
            let spec = self.field_spec(&type_name, field)?;
            upsert(&mut fields, spec);
        }

        if let Some(hook) = def.post_init {
            post_init = Some(hook);
        }

        Ok(Schema {
            identity: TypeIdentity::with_ancestors(reference.key().clone(), ancestors),
            doc: def.doc,
            fields,
            post_init,
        })
    }

    fn field_spec(&mut self, type_name: &str, field: FieldDef) -> Result<FieldSpec, SchemaError> {
        let descriptor = self.descriptor(&field.ty, type_name, &field.name, false)?;
        let default = match field.default {
            DefaultDef::None => FieldDefault::Required,
            DefaultDef::Literal(value) => {
                if value.is_mutable() {
                    return Err(SchemaError::MutableDefault {
                        type_name: type_name.to_string(),
                        field: field.name,
                    });
                }
                FieldDefault::Literal(value)
            }
            DefaultDef::Factory(factory) => FieldDefault::Factory(factory),
            DefaultDef::Nested => {
                if !matches!(descriptor, TypeDescriptor::Struct(_)) {
                    return Err(SchemaError::InvalidNestedDefault {
                        type_name: type_name.to_string(),
                        field: field.name,
                        found: descriptor.name(),
                    });
                }
                FieldDefault::Nested
            }
        };
        Ok(FieldSpec {
            name: field.name,
            descriptor,
            default,
            doc: field.doc,
            aliases: field.aliases,
        })
    }

    /// Resolve a declared type. `indirect` is set once an optional or a
    /// collection lies between the enclosing struct and this type.
    fn descriptor(
        &mut self,
        expr: &TypeExpr,
        type_name: &str,
        field: &str,
        indirect: bool,
    ) -> Result<TypeDescriptor, SchemaError> {
        let descriptor = match expr {
            TypeExpr::Primitive(kind) => TypeDescriptor::Primitive(*kind),
            TypeExpr::Optional(inner) => TypeDescriptor::Optional(Box::new(
                self.descriptor(inner, type_name, field, true)?,
            )),
            TypeExpr::Union(alternatives) => {
                if alternatives.is_empty() {
                    return Err(SchemaError::EmptyUnion {
                        type_name: type_name.to_string(),
                        field: field.to_string(),
                    });
                }
                let resolved = alternatives
                    .iter()
                    .map(|alternative| self.descriptor(alternative, type_name, field, indirect))
                    .collect::<Result<Vec<_>, _>>()?;
                TypeDescriptor::Union(resolved)
            }
            TypeExpr::List(item) => TypeDescriptor::Collection(CollectionShape::List(Box::new(
                self.descriptor(item, type_name, field, true)?,
            ))),
            TypeExpr::Set(item) => TypeDescriptor::Collection(CollectionShape::Set(Box::new(
                self.descriptor(item, type_name, field, true)?,
            ))),
            TypeExpr::VarTuple(item) => TypeDescriptor::Collection(CollectionShape::VarTuple(
                Box::new(self.descriptor(item, type_name, field, true)?),
            )),
            TypeExpr::Tuple(items) => {
                let resolved = items
                    .iter()
                    .map(|item| self.descriptor(item, type_name, field, true))
                    .collect::<Result<Vec<_>, _>>()?;
                TypeDescriptor::Collection(CollectionShape::Tuple(resolved))
            }
            TypeExpr::Map(key, value) => TypeDescriptor::Collection(CollectionShape::Map(
                Box::new(self.descriptor(key, type_name, field, true)?),
                Box::new(self.descriptor(value, type_name, field, true)?),
            )),
            TypeExpr::Enum(def) => {
                if def.variants().is_empty() {
                    return Err(SchemaError::EmptyEnum {
                        name: def.name().to_string(),
                    });
                }
                let variants = def.variants();
                if let Some((index, _)) = variants
                    .iter()
                    .enumerate()
                    .find(|(index, variant)| variants[..*index].contains(*variant))
                {
                    return Err(SchemaError::DuplicateVariant {
                        name: def.name().to_string(),
                        variant: variants[index].to_string(),
                    });
                }
                TypeDescriptor::Enum(def.clone())
            }
            TypeExpr::Struct(reference) => match self.cycle_to(reference.key(), indirect) {
                Some(cycle) => return Err(cycle),
                None if self.in_progress(reference.key()) => {
                    TypeDescriptor::Deferred(reference.key().clone())
                }
                None => TypeDescriptor::Struct(self.struct_schema(reference, indirect)?),
            },
            TypeExpr::Path => TypeDescriptor::PathLike,
            TypeExpr::Any => TypeDescriptor::Any,
            TypeExpr::Custom(identity) => TypeDescriptor::Custom(identity.clone()),
        };
        Ok(descriptor)
    }

    fn in_progress(&self, key: &TypeKey) -> bool {
        self.stack.iter().any(|(candidate, _)| candidate == key)
    }

    /// If `key` is already being built, decide whether reaching it again is
    /// a fatal cycle (`Some`) or a deferrable one (`None`).
    fn cycle_to(&self, key: &TypeKey, indirect: bool) -> Option<SchemaError> {
        let Some(position) = self
            .stack
            .iter()
            .position(|(candidate, _)| candidate == key)
        else {
            return None;
        };
        let through_indirection =
            indirect || self.stack[position + 1..].iter().any(|(_, entered)| *entered);
        if through_indirection {
            return None;
        }
        let mut chain: Vec<String> = self.stack[position..]
            .iter()
            .map(|(candidate, _)| candidate.short_name().to_string())
            .collect();
        chain.push(key.short_name().to_string());
        Some(SchemaError::Cycle { chain })
    }
}

/// Replace a field with the same name in place, or append it.
fn upsert(fields: &mut Vec<FieldSpec>, field: FieldSpec) {
    match fields.iter_mut().find(|existing| existing.name == field.name) {
        Some(slot) => *slot = field,
        None => fields.push(field),
    }
}
