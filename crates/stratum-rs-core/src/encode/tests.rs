//! Tests for encoding typed values.

use super::*;
use crate::config_enum;
use crate::decode::Decoder;
use crate::error::DecodeError;
use crate::schema::{FieldDef, StructDef, TypeExpr};
use crate::value::{CustomValue, StructBuilder};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

config_enum! {
    enum Level {
        Low,
        High,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Inner {
    rate: f64,
    tags: Vec<String>,
}

impl Config for Inner {
    fn definition() -> StructDef {
        StructDef::new()
            .field(FieldDef::of::<f64>("rate").with_default(0.5))
            .field(FieldDef::of::<Vec<String>>("tags").with_factory(|| vec!["base".to_string()]))
    }

    fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        Ok(Self {
            rate: value.get("rate")?,
            tags: value.get("tags")?,
        })
    }

    fn to_struct(&self) -> StructValue {
        StructBuilder::of::<Self>()
            .field("rate", &self.rate)
            .field("tags", &self.tags)
            .build()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Sample {
    name: String,
    note: Option<String>,
    mode: Value,
    level: Level,
    output: PathBuf,
    ids: BTreeSet<i64>,
    pair: (i64, String),
    weights: BTreeMap<String, f64>,
    inner: Inner,
}

impl Config for Sample {
    fn definition() -> StructDef {
        StructDef::new()
            .field(FieldDef::of::<String>("name"))
            .field(FieldDef::of::<Option<String>>("note").with_default(Value::None))
            .field(
                FieldDef::new(
                    "mode",
                    TypeExpr::union([TypeExpr::of::<i64>(), TypeExpr::of::<String>()]),
                )
                .with_default(1i64),
            )
            .field(FieldDef::of::<Level>("level").with_default(Level::Low))
            .field(FieldDef::of::<PathBuf>("output").with_default(PathBuf::from("out")))
            .field(FieldDef::of::<BTreeSet<i64>>("ids").with_factory(BTreeSet::<i64>::new))
            .field(FieldDef::of::<(i64, String)>("pair").with_default((0i64, "zero".to_string())))
            .field(
                FieldDef::of::<BTreeMap<String, f64>>("weights")
                    .with_factory(BTreeMap::<String, f64>::new),
            )
            .field(FieldDef::new("inner", TypeExpr::structure::<Inner>()).with_nested_default())
    }

    fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        Ok(Self {
            name: value.get("name")?,
            note: value.get("note")?,
            mode: value.get("mode")?,
            level: value.get("level")?,
            output: value.get("output")?,
            ids: value.get("ids")?,
            pair: value.get("pair")?,
            weights: value.get("weights")?,
            inner: value.get_config("inner")?,
        })
    }

    fn to_struct(&self) -> StructValue {
        StructBuilder::of::<Self>()
            .field("name", &self.name)
            .field("note", &self.note)
            .field("mode", &self.mode)
            .field("level", &self.level)
            .field("output", &self.output)
            .field("ids", &self.ids)
            .field("pair", &self.pair)
            .field("weights", &self.weights)
            .config("inner", &self.inner)
            .build()
    }
}

fn engine() -> (TypeRegistry, SchemaCache) {
    (TypeRegistry::new(), SchemaCache::new())
}

#[test]
fn encoded_configs_decode_back_to_equal_values() {
    let (registry, schemas) = engine();
    let raw = json!({
        "name": "run",
        "note": "hello",
        "mode": "fast",
        "level": "High",
        "output": "/tmp/out",
        "ids": [3, 1, 3],
        "pair": [7, "seven"],
        "weights": { "a": 0.25, "b": 2 },
        "inner": { "rate": "1e-3", "tags": ["x"] }
    });

    let mut decoder = Decoder::new(&registry, &schemas);
    let sample: Sample = decoder.decode_config(&raw).expect("decode");
    let encoder = Encoder::new(&registry, &schemas);
    let encoded = encoder.encode_config(&sample).expect("encode");
    let again: Sample = decoder.decode_config(&encoded).expect("decode again");

    assert_eq!(again, sample);
    assert_eq!(sample.mode, Value::Str("fast".to_string()));
    assert_eq!(sample.ids.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(sample.inner.rate, 0.001);
}

#[test]
fn structs_encode_in_schema_order() {
    let (registry, schemas) = engine();
    let mut decoder = Decoder::new(&registry, &schemas);
    let sample: Sample = decoder
        .decode_config(&json!({ "inner": {}, "name": "ordered" }))
        .expect("decode");

    let encoded = Encoder::new(&registry, &schemas)
        .encode_config(&sample)
        .expect("encode");
    let keys: Vec<&str> = encoded
        .as_object()
        .expect("mapping")
        .keys()
        .map(String::as_str)
        .collect();

    assert_eq!(
        keys,
        vec![
            "name", "note", "mode", "level", "output", "ids", "pair", "weights", "inner"
        ]
    );
    assert_eq!(encoded["level"], json!("Low"));
    assert_eq!(encoded["output"], json!("out"));
    assert_eq!(encoded["pair"], json!([0, "zero"]));
    assert_eq!(encoded["note"], json!(null));
}

#[test]
fn non_finite_floats_encode_as_parseable_text() {
    let (registry, schemas) = engine();
    let encoder = Encoder::new(&registry, &schemas);

    assert_eq!(encoder.encode(&Value::Float(f64::INFINITY)).expect("inf"), json!("inf"));
    assert_eq!(encoder.encode(&Value::Float(1.5)).expect("finite"), json!(1.5));
}

#[test]
fn maps_with_structured_keys_encode_as_pairs() {
    let (registry, schemas) = engine();
    let encoder = Encoder::new(&registry, &schemas);
    let map = Value::Map(vec![(
        Value::Tuple(vec![Value::Int(1), Value::Int(2)]),
        Value::Str("edge".to_string()),
    )]);

    assert_eq!(encoder.encode(&map).expect("pairs"), json!([[[1, 2], "edge"]]));

    let scalar = Value::Map(vec![(Value::Int(1), Value::Bool(true))]);
    assert_eq!(encoder.encode(&scalar).expect("object"), json!({ "1": true }));
}

#[derive(Debug, PartialEq)]
struct Celsius(f64);

#[test]
fn custom_values_need_a_registered_encoder() {
    let (registry, schemas) = engine();
    let identity = TypeIdentity::new(TypeKey::new("Celsius"));
    let value = Value::List(vec![Value::Custom(CustomValue::new(
        identity.clone(),
        Celsius(21.5),
    ))]);

    let err = Encoder::new(&registry, &schemas).encode(&value).unwrap_err();
    match err {
        EncodeError::NoEncoder { path, type_name } => {
            assert_eq!(path.to_string(), "0");
            assert_eq!(type_name, "Celsius");
        }
        other => panic!("unexpected error {other:?}"),
    }

    registry.register_encoder(identity.key().clone(), false, |value| match value {
        Value::Custom(custom) => custom
            .downcast_ref::<Celsius>()
            .map(|celsius| json!(format!("{}C", celsius.0)))
            .ok_or_else(|| anyhow::anyhow!("not a temperature")),
        other => anyhow::bail!("unexpected {}", other.kind()),
    });
    assert_eq!(
        Encoder::new(&registry, &schemas).encode(&value).expect("encode"),
        json!(["21.5C"])
    );
}

#[test]
fn undeclared_and_missing_fields_are_rejected() {
    let (registry, schemas) = engine();
    schemas.schema_for::<Inner>().expect("schema");
    let encoder = Encoder::new(&registry, &schemas);

    let missing = StructBuilder::of::<Inner>().field("rate", &1.0).build();
    assert!(matches!(
        encoder.encode_struct(&missing),
        Err(EncodeError::MissingField { .. })
    ));

    let extra = StructBuilder::of::<Inner>()
        .field("rate", &1.0)
        .field("tags", &Vec::<String>::new())
        .field("colour", "red")
        .build();
    assert!(matches!(
        encoder.encode_struct(&extra),
        Err(EncodeError::UndeclaredField { .. })
    ));
}

#[test]
fn defaults_cover_literals_factories_and_nested_structs() {
    let (registry, schemas) = engine();
    let schema = schemas.schema_for::<Sample>().expect("schema");

    let defaults = Encoder::new(&registry, &schemas)
        .defaults(&schema)
        .expect("defaults");

    assert_eq!(
        defaults,
        json!({
            "note": null,
            "mode": 1,
            "level": "Low",
            "output": "out",
            "ids": [],
            "pair": [0, "zero"],
            "weights": {},
            "inner": { "rate": 0.5, "tags": ["base"] }
        })
    );
}

#[test]
fn strip_defaults_keeps_only_changed_fields() {
    let (registry, schemas) = engine();
    let schema = schemas.schema_for::<Sample>().expect("schema");
    let mut decoder = Decoder::new(&registry, &schemas);
    let sample: Sample = decoder
        .decode_config(&json!({ "name": "slim", "inner": { "rate": 2.0 }, "weights": { "a": 1 } }))
        .expect("decode");

    let encoder = Encoder::new(&registry, &schemas);
    let encoded = encoder.encode_config(&sample).expect("encode");
    let stripped = encoder.strip_defaults(&schema, &encoded).expect("strip");

    assert_eq!(
        stripped,
        json!({ "name": "slim", "weights": { "a": 1.0 }, "inner": { "rate": 2.0 } })
    );
    let reloaded: Sample = decoder.decode_config(&stripped).expect("reload");
    assert_eq!(reloaded, sample);
}

#[derive(Debug, Clone, PartialEq)]
struct Sparse {
    seed: Option<i64>,
    hint: Option<String>,
    slots: Vec<Option<i64>>,
}

impl Config for Sparse {
    fn definition() -> StructDef {
        StructDef::new()
            .field(FieldDef::of::<Option<i64>>("seed").with_default(Some(7i64)))
            .field(FieldDef::of::<Option<String>>("hint").with_default(Value::None))
            .field(FieldDef::of::<Vec<Option<i64>>>("slots").with_factory(Vec::<Option<i64>>::new))
    }

    fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        Ok(Self {
            seed: value.get("seed")?,
            hint: value.get("hint")?,
            slots: value.get("slots")?,
        })
    }

    fn to_struct(&self) -> StructValue {
        StructBuilder::of::<Self>()
            .field("seed", &self.seed)
            .field("hint", &self.hint)
            .field("slots", &self.slots)
            .build()
    }
}

#[test]
fn strip_null_defaults_drops_only_nulls_matching_their_default() {
    let (registry, schemas) = engine();
    let schema = schemas.schema_for::<Sparse>().expect("schema");
    let encoder = Encoder::new(&registry, &schemas);

    let sparse = Sparse {
        seed: None,
        hint: None,
        slots: vec![Some(1), None],
    };
    let encoded = encoder.encode_config(&sparse).expect("encode");
    assert_eq!(
        encoder.strip_null_defaults(&schema, &encoded).expect("strip"),
        json!({ "seed": null, "slots": [1, null] })
    );

    let sample_schema = schemas.schema_for::<Sample>().expect("schema");
    let mut decoder = Decoder::new(&registry, &schemas);
    let sample: Sample = decoder
        .decode_config(&json!({ "name": "slim" }))
        .expect("decode");
    let encoded = encoder.encode_config(&sample).expect("encode");
    let kept = encoder
        .strip_null_defaults(&sample_schema, &encoded)
        .expect("strip");
    assert!(kept.get("note").is_none());
    assert_eq!(kept["inner"], json!({ "rate": 0.5, "tags": ["base"] }));
    let reloaded: Sample = decoder.decode_config(&kept).expect("reload");
    assert_eq!(reloaded, sample);
}
