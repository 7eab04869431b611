//! Type-keyed registry of custom decoders and encoders.

use crate::schema::{TypeIdentity, TypeKey};
use crate::value::{RawValue, Value};
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Converts a raw value into a typed value of the identified type.
pub type DecodeFn = Arc<dyn Fn(&TypeIdentity, &RawValue) -> anyhow::Result<Value> + Send + Sync>;
/// Converts a typed value back into a raw value.
pub type EncodeFn = Arc<dyn Fn(&Value) -> anyhow::Result<RawValue> + Send + Sync>;

static GLOBAL_REGISTRY: LazyLock<TypeRegistry> = LazyLock::new(TypeRegistry::new);

/// A conversion function for one direction.
#[derive(Clone)]
pub enum Conversion {
    Decode(DecodeFn),
    Encode(EncodeFn),
}

impl Conversion {
    /// Wrap a decoding closure.
    pub fn decode<F>(decode: F) -> Self
    where
        F: Fn(&TypeIdentity, &RawValue) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Conversion::Decode(Arc::new(decode))
    }

    /// Wrap an encoding closure.
    pub fn encode<F>(encode: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<RawValue> + Send + Sync + 'static,
    {
        Conversion::Encode(Arc::new(encode))
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conversion::Decode(_) => f.write_str("Decode(..)"),
            Conversion::Encode(_) => f.write_str("Encode(..)"),
        }
    }
}

#[derive(Clone)]
struct Entry<F> {
    function: F,
    include_subclasses: bool,
}

#[derive(Default)]
struct Tables {
    decoders: HashMap<TypeKey, Entry<DecodeFn>>,
    encoders: HashMap<TypeKey, Entry<EncodeFn>>,
}

impl<F: Clone> Entry<F> {
    fn lookup(table: &HashMap<TypeKey, Entry<F>>, identity: &TypeIdentity) -> Option<F> {
        if let Some(entry) = table.get(identity.key()) {
            return Some(entry.function.clone());
        }
        identity
            .ancestors()
            .iter()
            .filter_map(|ancestor| table.get(ancestor))
            .find(|entry| entry.include_subclasses)
            .map(|entry| entry.function.clone())
    }
}

/// Registry mapping types to custom conversions.
///
/// Lookup takes the exact type first, then the nearest ancestor registered
/// with `include_subclasses`. Registering a type again replaces its entry.
#[derive(Default, Clone)]
pub struct TypeRegistry {
    tables: Arc<RwLock<Tables>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by the default decoder, encoder and resolver.
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL_REGISTRY
    }

    /// Register a conversion for a type key.
    pub fn register(&self, key: TypeKey, conversion: Conversion, include_subclasses: bool) {
        debug!(
            "registering conversion (type={}, kind={:?}, include_subclasses={})",
            key, conversion, include_subclasses
        );
        let mut tables = self.tables.write();
        match conversion {
            Conversion::Decode(function) => {
                tables.decoders.insert(
                    key,
                    Entry {
                        function,
                        include_subclasses,
                    },
                );
            }
            Conversion::Encode(function) => {
                tables.encoders.insert(
                    key,
                    Entry {
                        function,
                        include_subclasses,
                    },
                );
            }
        }
    }

    /// Register a decoder for a type key.
    pub fn register_decoder<F>(&self, key: TypeKey, include_subclasses: bool, decode: F)
    where
        F: Fn(&TypeIdentity, &RawValue) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(key, Conversion::decode(decode), include_subclasses);
    }

    /// Register an encoder for a type key.
    pub fn register_encoder<F>(&self, key: TypeKey, include_subclasses: bool, encode: F)
    where
        F: Fn(&Value) -> anyhow::Result<RawValue> + Send + Sync + 'static,
    {
        self.register(key, Conversion::encode(encode), include_subclasses);
    }

    /// Decoder applicable to a type, if any.
    pub fn decoder_for(&self, identity: &TypeIdentity) -> Option<DecodeFn> {
        Entry::lookup(&self.tables.read().decoders, identity)
    }

    /// Encoder applicable to a type, if any.
    pub fn encoder_for(&self, identity: &TypeIdentity) -> Option<EncodeFn> {
        Entry::lookup(&self.tables.read().encoders, identity)
    }

    /// Whether no conversion of either direction is registered.
    pub fn is_empty(&self) -> bool {
        let tables = self.tables.read();
        tables.decoders.is_empty() && tables.encoders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::TypeRegistry;
    use crate::schema::{TypeIdentity, TypeKey};
    use crate::value::{RawValue, Value};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn decode(registry: &TypeRegistry, identity: &TypeIdentity, raw: RawValue) -> Option<Value> {
        let decoder = registry.decoder_for(identity)?;
        Some(decoder(identity, &raw).expect("decode"))
    }

    #[test]
    fn exact_registration_wins_over_ancestors() {
        let registry = TypeRegistry::new();
        registry.register_decoder(TypeKey::new("Base"), true, |_, _| {
            Ok(Value::Str("base".to_string()))
        });
        registry.register_decoder(TypeKey::new("Child"), false, |_, _| {
            Ok(Value::Str("child".to_string()))
        });

        let child = TypeIdentity::with_ancestors(TypeKey::new("Child"), vec![TypeKey::new("Base")]);
        assert_eq!(
            decode(&registry, &child, json!(1)),
            Some(Value::Str("child".to_string()))
        );
    }

    #[test]
    fn ancestors_match_only_with_include_subclasses() {
        let registry = TypeRegistry::new();
        registry.register_decoder(TypeKey::new("Base"), false, |_, _| Ok(Value::Int(1)));
        registry.register_decoder(TypeKey::new("Root"), true, |_, _| Ok(Value::Int(2)));

        let child = TypeIdentity::with_ancestors(
            TypeKey::new("Child"),
            vec![TypeKey::new("Base"), TypeKey::new("Root")],
        );
        assert_eq!(decode(&registry, &child, json!(null)), Some(Value::Int(2)));

        let unrelated = TypeIdentity::new(TypeKey::new("Other"));
        assert_eq!(decode(&registry, &unrelated, json!(null)), None);
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let registry = TypeRegistry::new();
        registry.register_decoder(TypeKey::new("Point"), false, |_, _| Ok(Value::Int(1)));
        registry.register_decoder(TypeKey::new("Point"), false, |_, _| Ok(Value::Int(2)));

        let point = TypeIdentity::new(TypeKey::new("Point"));
        assert_eq!(decode(&registry, &point, json!({})), Some(Value::Int(2)));
    }

    #[test]
    fn decoders_and_encoders_are_independent() {
        let registry = TypeRegistry::new();
        assert!(registry.is_empty());
        registry.register_encoder(TypeKey::new("Point"), false, |_| Ok(json!("p")));

        let point = TypeIdentity::new(TypeKey::new("Point"));
        assert!(registry.decoder_for(&point).is_none());
        let encoder = registry.encoder_for(&point).expect("encoder");
        assert_eq!(encoder(&Value::None).expect("encode"), json!("p"));
        assert!(!registry.is_empty());
    }
}
