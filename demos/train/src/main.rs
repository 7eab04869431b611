//! Example training entry point.
//!
//! ```text
//! stratum-rs-train --compute.workers 4 --log.exp_name resnet
//! stratum-rs-train --config_path train.yaml --num-workers 16
//! ```

use log::info;
use std::path::PathBuf;
use stratum_rs::{
    Config, ConfigFormat, DecodeError, FieldDef, ParseOptions, StructBuilder, StructDef,
    StructValue, Value, init_logging,
};

/// Training resources.
#[derive(Debug, Clone, PartialEq)]
struct ComputeConfig {
    workers: i64,
    eval_workers: Option<i64>,
}

impl Config for ComputeConfig {
    fn definition() -> StructDef {
        StructDef::new()
            .doc("Config for training resources")
            .field(
                FieldDef::of::<i64>("workers")
                    .with_default(8i64)
                    .doc("The number of workers for training")
                    .alias("--num-workers"),
            )
            .field(
                FieldDef::of::<Option<i64>>("eval_workers")
                    .with_default(Value::None)
                    .doc("The number of workers for evaluation"),
            )
            .post_init(|fields| {
                // Evaluation shares the training worker count unless set.
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
struct LogConfig {
    exp_name: String,
    exp_root: PathBuf,
}

impl LogConfig {
    fn exp_dir(&self) -> PathBuf {
        self.exp_root.join(&self.exp_name)
    }
}

impl Config for LogConfig {
    fn definition() -> StructDef {
        StructDef::new()
            .doc("Config for logging arguments")
            .field(
                FieldDef::of::<String>("exp_name")
                    .with_default("default_exp")
                    .doc("The experiment name"),
            )
            .field(
                FieldDef::of::<PathBuf>("exp_root")
                    .with_default(PathBuf::from("/share/experiments"))
                    .doc("The experiment root folder path"),
            )
    }

    fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        Ok(Self {
            exp_name: value.get("exp_name")?,
            exp_root: value.get("exp_root")?,
        })
    }

    fn to_struct(&self) -> StructValue {
        StructBuilder::of::<Self>()
            .field("exp_name", &self.exp_name)
            .field("exp_root", &self.exp_root)
            .build()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TrainConfig {
    log: LogConfig,
    compute: ComputeConfig,
}

impl Config for TrainConfig {
    fn definition() -> StructDef {
        StructDef::new()
            .doc("Train a model")
            .field(FieldDef::of::<LogConfig>("log").with_nested_default())
            .field(FieldDef::of::<ComputeConfig>("compute").with_nested_default())
    }

    fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        Ok(Self {
            log: value.get_config("log")?,
            compute: value.get_config("compute")?,
        })
    }

    fn to_struct(&self) -> StructValue {
        StructBuilder::of::<Self>()
            .config("log", &self.log)
            .config("compute", &self.compute)
            .build()
    }
}

stratum_rs::config_value!(LogConfig);
stratum_rs::config_value!(ComputeConfig);

fn train(config: TrainConfig) -> anyhow::Result<()> {
    info!("starting run (exp_name={})", config.log.exp_name);
    println!("Training {}...", config.log.exp_name);
    println!(
        "\tUsing {} workers and {} evaluation workers",
        config.compute.workers,
        config
            .compute
            .eval_workers
            .map_or_else(|| "no".to_string(), |n| n.to_string())
    );
    println!("\tSaving to {}", config.log.exp_dir().display());
    print!("{}", stratum_rs::dump(&config, ConfigFormat::Yaml, false)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging();
    stratum_rs::run(&ParseOptions::new().with_program_name("stratum-rs-train"), train)
}
