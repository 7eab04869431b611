//! Tests for loading and dumping config files.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::Path;
use stratum_rs::{
    Config, ConfigError, ConfigFormat, DecodeError, FieldDef, StructBuilder, StructDef,
    StructValue, config_enum, dump, dump_to_path, flatten, load, load_from_path, to_raw,
    unflatten,
};
use tempfile::TempDir;

config_enum! {
    enum Precision {
        Fp16,
        Fp32,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Model {
    name: String,
    layers: i64,
    precision: Precision,
    dropout: Option<f64>,
    tags: Vec<String>,
}

impl Config for Model {
    fn definition() -> StructDef {
        StructDef::new()
            .field(FieldDef::of::<String>("name"))
            .field(FieldDef::of::<i64>("layers").with_default(12i64))
            .field(FieldDef::of::<Precision>("precision").with_default(Precision::Fp32))
            .field(FieldDef::of::<Option<f64>>("dropout").with_default(None::<f64>))
            .field(FieldDef::of::<Vec<String>>("tags").with_factory(Vec::<String>::new))
    }

    fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        Ok(Self {
            name: value.get("name")?,
            layers: value.get("layers")?,
            precision: value.get("precision")?,
            dropout: value.get("dropout")?,
            tags: value.get("tags")?,
        })
    }

    fn to_struct(&self) -> StructValue {
        StructBuilder::of::<Self>()
            .field("name", &self.name)
            .field("layers", &self.layers)
            .field("precision", &self.precision)
            .field("dropout", &self.dropout)
            .field("tags", &self.tags)
            .build()
    }
}

fn sample() -> Model {
    Model {
        name: "bert".to_string(),
        layers: 24,
        precision: Precision::Fp16,
        dropout: Some(0.1),
        tags: vec!["large".to_string()],
    }
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

#[test]
fn load_fills_missing_fields_with_defaults() {
    let model: Model = load("name: tiny\n", ConfigFormat::Yaml).expect("load");

    assert_eq!(
        model,
        Model {
            name: "tiny".to_string(),
            layers: 12,
            precision: Precision::Fp32,
            dropout: None,
            tags: Vec::new(),
        }
    );
}

#[test]
fn dump_then_load_round_trips_in_every_format() {
    let model = sample();
    for format in ConfigFormat::ALL {
        let text = dump(&model, format, false).expect("dump");
        let loaded: Model = load(&text, format).expect("load");
        assert_eq!(loaded, model, "{format}");
    }
}

#[test]
fn files_round_trip_by_extension() {
    let temp = TempDir::new().expect("tmp");
    let model = sample();
    for name in ["model.yaml", "nested/model.json", "model.json5", "model.toml"] {
        let path = temp.path().join(name);
        dump_to_path(&model, &path, false).expect("dump");
        let loaded: Model = load_from_path(&path).expect("load");
        assert_eq!(loaded, model, "{name}");
    }
}

#[test]
fn omit_defaults_keeps_only_changed_fields() {
    let model = Model {
        layers: 12,
        precision: Precision::Fp32,
        dropout: None,
        tags: Vec::new(),
        ..sample()
    };

    assert_eq!(to_raw(&model, true).expect("raw"), json!({ "name": "bert" }));
    assert_eq!(
        dump(&model, ConfigFormat::Yaml, true).expect("dump"),
        "name: bert\n"
    );
    let full = to_raw(&model, false).expect("raw");
    assert_eq!(full["precision"], json!("Fp32"));
    assert_eq!(full["dropout"], json!(null));
}

#[test]
fn empty_files_decode_to_defaults_or_report_missing_fields() {
    let temp = TempDir::new().expect("tmp");
    let path = temp.path().join("empty.yaml");
    write(&path, "");

    let err = load_from_path::<Model>(&path).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("missing value for required field name"), "{message}");
}

#[test]
fn malformed_documents_report_format_errors() {
    let err = load::<Model>("{ name: ", ConfigFormat::Json).unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));

    let err = load::<Model>("- just\n- a list\n", ConfigFormat::Yaml).unwrap_err();
    assert!(err.to_string().contains("must be a mapping"), "{err}");
}

#[test]
fn missing_files_report_read_errors() {
    let temp = TempDir::new().expect("tmp");
    let err = load_from_path::<Model>(temp.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed(_)));
}

#[test]
fn flatten_and_unflatten_are_inverse() {
    let tree = json!({ "model": { "name": "bert", "layers": 24 }, "seed": 1 });
    let flat = flatten(&tree);

    assert_eq!(
        flat,
        vec![
            ("model.name".to_string(), json!("bert")),
            ("model.layers".to_string(), json!(24)),
            ("seed".to_string(), json!(1)),
        ]
    );
    assert_eq!(unflatten(flat).expect("tree"), tree);
}

#[derive(Debug, Clone, PartialEq)]
struct Sampling {
    seed: Option<i64>,
    ids: Vec<Option<i64>>,
    note: Option<String>,
}

impl Config for Sampling {
    fn definition() -> StructDef {
        StructDef::new()
            .field(FieldDef::of::<Option<i64>>("seed").with_default(Some(7i64)))
            .field(FieldDef::of::<Vec<Option<i64>>>("ids").with_factory(Vec::<Option<i64>>::new))
            .field(FieldDef::of::<Option<String>>("note").with_default(None::<String>))
    }

    fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        Ok(Self {
            seed: value.get("seed")?,
            ids: value.get("ids")?,
            note: value.get("note")?,
        })
    }

    fn to_struct(&self) -> StructValue {
        StructBuilder::of::<Self>()
            .field("seed", &self.seed)
            .field("ids", &self.ids)
            .field("note", &self.note)
            .build()
    }
}

#[test]
fn toml_leaves_out_nulls_that_match_their_default() {
    let sampling = Sampling {
        seed: Some(3),
        ids: vec![Some(1), Some(2)],
        note: None,
    };

    let text = dump(&sampling, ConfigFormat::Toml, false).expect("dump");
    assert!(!text.contains("note"), "{text}");
    let loaded: Sampling = load(&text, ConfigFormat::Toml).expect("load");
    assert_eq!(loaded, sampling);
}

#[test]
fn toml_refuses_nulls_it_cannot_round_trip() {
    let unset_seed = Sampling {
        seed: None,
        ids: Vec::new(),
        note: None,
    };
    let err = dump(&unset_seed, ConfigFormat::Toml, false).expect_err("seed defaults to 7");
    assert_eq!(err.to_string(), "cannot render null at seed as TOML");

    let sparse_ids = Sampling {
        seed: Some(7),
        ids: vec![Some(1), None, Some(2)],
        note: None,
    };
    let err = dump(&sparse_ids, ConfigFormat::Toml, false).expect_err("null list item");
    assert!(matches!(err, ConfigError::TomlNull { .. }));
    assert_eq!(err.to_string(), "cannot render null at ids.1 as TOML");

    let temp = TempDir::new().expect("tmp");
    let path = temp.path().join("sampling.toml");
    assert!(dump_to_path(&sparse_ids, &path, false).is_err());
    assert!(!path.exists());

    for format in [ConfigFormat::Yaml, ConfigFormat::Json] {
        for sampling in [&unset_seed, &sparse_ids] {
            let text = dump(sampling, format, false).expect("dump");
            let loaded: Sampling = load(&text, format).expect("load");
            assert_eq!(&loaded, sampling, "{format}");
        }
    }
}
