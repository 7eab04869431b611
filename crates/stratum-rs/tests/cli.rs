//! Tests for command-line parsing.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use stratum_rs::{
    Config, ConfigError, DecodeError, FieldDef, ParseOptions, StructBuilder, StructDef,
    StructValue, Value, parse_from, parse_layered_from,
};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
struct Compute {
    workers: i64,
    eval_workers: Option<i64>,
}

impl Config for Compute {
    fn definition() -> StructDef {
        StructDef::new()
            .doc("Compute resources.")
            .field(
                FieldDef::of::<i64>("workers")
                    .with_default(8i64)
                    .doc("Number of data loader workers.")
                    .alias("--num-workers")
                    .alias("-w"),
            )
            .field(FieldDef::of::<Option<i64>>("eval_workers").with_default(Value::None))
            .post_init(|fields| {
                if fields.value("eval_workers").is_some_and(Value::is_none) {
                    let workers: i64 = fields.get("workers")?;
                    fields.set("eval_workers", &workers);
                }
                Ok(())
            })
    }

    fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        Ok(Self {
            workers: value.get("workers")?,
            eval_workers: value.get("eval_workers")?,
        })
    }

    fn to_struct(&self) -> StructValue {
        StructBuilder::of::<Self>()
            .field("workers", &self.workers)
            .field("eval_workers", &self.eval_workers)
            .build()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Train {
    exp_name: String,
    debug: bool,
    lr: f64,
    steps: Vec<i64>,
    compute: Compute,
}

impl Config for Train {
    fn definition() -> StructDef {
        StructDef::new()
            .doc("Train a model.")
            .field(FieldDef::of::<String>("exp_name").with_default("default_exp"))
            .field(FieldDef::of::<bool>("debug").with_default(false))
            .field(FieldDef::of::<f64>("lr").with_default(0.1))
            .field(FieldDef::of::<Vec<i64>>("steps").with_factory(|| vec![10i64, 20]))
            .field(FieldDef::of::<Compute>("compute").with_nested_default())
    }

    fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        Ok(Self {
            exp_name: value.get("exp_name")?,
            debug: value.get("debug")?,
            lr: value.get("lr")?,
            steps: value.get("steps")?,
            compute: value.get_config("compute")?,
        })
    }

    fn to_struct(&self) -> StructValue {
        StructBuilder::of::<Self>()
            .field("exp_name", &self.exp_name)
            .field("debug", &self.debug)
            .field("lr", &self.lr)
            .field("steps", &self.steps)
            .config("compute", &self.compute)
            .build()
    }
}

stratum_rs::config_value!(Compute);

struct Reserved;

impl Config for Reserved {
    fn definition() -> StructDef {
        StructDef::new().field(FieldDef::of::<String>("config_path").with_default("x"))
    }

    fn from_struct(_value: &StructValue) -> Result<Self, DecodeError> {
        Ok(Reserved)
    }

    fn to_struct(&self) -> StructValue {
        StructBuilder::of::<Self>().build()
    }
}

fn parse(args: &[&str]) -> Result<Train, ConfigError> {
    parse_from(&ParseOptions::new(), std::iter::once("train").chain(args.iter().copied()))
}

#[test]
fn no_arguments_yields_defaults() {
    let config = parse(&[]).expect("config");

    assert_eq!(
        config,
        Train {
            exp_name: "default_exp".to_string(),
            debug: false,
            lr: 0.1,
            steps: vec![10, 20],
            compute: Compute {
                workers: 8,
                eval_workers: Some(8),
            },
        }
    );
}

#[test]
fn dotted_flags_override_nested_fields() {
    let config = parse(&[
        "--compute.workers=42",
        "--lr",
        "-0.5",
        "--steps",
        "[1, 2, 3]",
    ])
    .expect("config");

    assert_eq!(config.compute.workers, 42);
    assert_eq!(config.compute.eval_workers, Some(42));
    assert_eq!(config.lr, -0.5);
    assert_eq!(config.steps, vec![1, 2, 3]);
}

#[test]
fn string_fields_keep_their_text() {
    let config = parse(&["--exp_name", "1.10"]).expect("config");
    assert_eq!(config.exp_name, "1.10");
}

#[test]
fn bare_bool_flags_mean_true() {
    assert!(parse(&["--debug"]).expect("bare").debug);
    assert!(!parse(&["--debug", "no"]).expect("literal").debug);
    assert!(parse(&["--debug=yes"]).expect("literal").debug);
}

#[test]
fn field_aliases_are_accepted() {
    assert_eq!(parse(&["--num-workers", "4"]).expect("long").compute.workers, 4);
    assert_eq!(parse(&["-w", "6"]).expect("short").compute.workers, 6);
}

#[test]
fn repeated_flags_keep_the_last_value() {
    let config = parse(&["--compute.workers", "1", "--compute.workers", "3"]).expect("config");
    assert_eq!(config.compute.workers, 3);
}

#[test]
fn config_file_sits_between_defaults_and_flags() {
    let temp = TempDir::new().expect("tmp");
    let path = temp.path().join("train.yaml");
    fs::write(
        &path,
        "exp_name: from_file\ncompute:\n  workers: 8\n  eval_workers: 2\n",
    )
    .expect("write");

    let resolved = parse_layered_from::<Train, _, _>(
        &ParseOptions::new(),
        [
            "train",
            "--config_path",
            path.to_str().expect("utf-8 path"),
            "--compute.workers",
            "16",
        ],
    )
    .expect("config");

    assert_eq!(resolved.config.exp_name, "from_file");
    assert_eq!(resolved.config.compute.workers, 16);
    assert_eq!(resolved.config.compute.eval_workers, Some(2));
    assert_eq!(resolved.layers.len(), 2);
    assert_eq!(
        resolved.merged,
        json!({ "exp_name": "from_file", "compute": { "workers": 16, "eval_workers": 2 } })
    );
}

#[test]
fn command_line_config_path_wins_over_the_default_path() {
    let temp = TempDir::new().expect("tmp");
    let default_path = temp.path().join("default.json");
    let cli_path = temp.path().join("cli.toml");
    fs::write(&default_path, r#"{"exp_name": "default_file"}"#).expect("write");
    fs::write(&cli_path, "exp_name = \"cli_file\"\n").expect("write");

    let options = ParseOptions::new().with_config_path(&default_path);
    let from_default: Train = parse_from(&options, ["train"]).expect("default");
    assert_eq!(from_default.exp_name, "default_file");

    let cli_arg: PathBuf = cli_path;
    let from_cli: Train = parse_from(
        &options,
        ["train".into(), "--config_path".into(), cli_arg.into_os_string()],
    )
    .expect("cli");
    assert_eq!(from_cli.exp_name, "cli_file");
}

#[test]
fn invalid_values_report_the_dotted_path() {
    let err = parse(&["--compute.workers", "many"]).unwrap_err();
    let message = err.to_string();

    assert!(message.contains("compute.workers"), "{message}");
    assert!(message.contains("many"), "{message}");
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn unknown_flags_are_rejected_by_the_parser() {
    let err = parse(&["--compute.wrokers", "3"]).unwrap_err();
    assert!(matches!(err, ConfigError::Cli(_)));
    assert_ne!(err.exit_code(), 0);
}

#[test]
fn help_lists_dotted_flags_docs_and_defaults() {
    let parser = ParseOptions::new()
        .with_program_name("train")
        .argument_parser::<Train>()
        .expect("parser");
    let help = parser
        .render_help()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    assert!(help.contains("Train a model."), "{help}");
    assert!(help.contains("--config_path <PATH>"), "{help}");
    assert!(help.contains("--compute.workers <int>"), "{help}");
    assert!(
        help.contains("Number of data loader workers. [int, default: 8]"),
        "{help}"
    );
    assert!(help.contains("[Optional[int], default: null]"), "{help}");
    assert!(help.contains("Compute:"), "{help}");
}

#[test]
fn config_path_is_a_reserved_field_name() {
    let err = ParseOptions::new()
        .argument_parser::<Reserved>()
        .unwrap_err();
    assert!(matches!(err, ConfigError::ReservedField { ref field, .. } if field == "config_path"));
}
