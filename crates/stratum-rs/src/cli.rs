//! Command-line adapter: one dotted flag per leaf field of a schema.

use crate::{ConfigError, ConfigFormat};
use clap::{Arg, ArgAction, Command, value_parser};
use log::debug;
use std::ffi::OsString;
use std::path::PathBuf;
use stratum_rs_core::{
    Encoder, FieldDefault, FieldSpec, PrimitiveKind, RawValue, Schema, TypeDescriptor,
};

/// Reserved flag naming the config file.
pub const CONFIG_PATH_ARG: &str = "config_path";

/// Root field names that would collide with built-in flags.
const RESERVED_FIELDS: &[&str] = &[CONFIG_PATH_ARG, "help"];

/// Arguments recovered from a command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    /// Value of `--config_path`, if given.
    pub config_path: Option<PathBuf>,
    /// `(dotted.key, value)` overrides in flag declaration order.
    pub overrides: Vec<(String, RawValue)>,
}

#[derive(Debug, Clone)]
struct Leaf {
    id: String,
    /// Keep the text as given instead of parsing it with the format.
    verbatim: bool,
}

/// Parser for the flags of one config schema.
#[derive(Debug, Clone)]
pub struct ArgumentParser {
    command: Command,
    leaves: Vec<Leaf>,
    format: ConfigFormat,
}

impl ArgumentParser {
    /// Generate flags for every leaf field of `schema`; nested structs add a
    /// dotted prefix and their own help heading.
    pub fn new(
        schema: &Schema,
        encoder: &Encoder<'_>,
        program: &str,
        format: ConfigFormat,
    ) -> Result<Self, ConfigError> {
        if let Some(field) = schema
            .fields()
            .iter()
            .find(|field| RESERVED_FIELDS.contains(&field.name()))
        {
            return Err(ConfigError::ReservedField {
                type_name: schema.name().to_string(),
                field: field.name().to_string(),
            });
        }

        let mut command = Command::new(program.to_string())
            .args_override_self(true)
            .arg(
                Arg::new(CONFIG_PATH_ARG)
                    .long(CONFIG_PATH_ARG)
                    .value_name("PATH")
                    .value_parser(value_parser!(PathBuf))
                    .help("Config file read before the command-line flags are applied"),
            );
        if let Some(doc) = schema.doc() {
            command = command.about(doc.to_string());
        }

        let mut leaves = Vec::new();
        let mut args = Vec::new();
        collect_args(schema, "", None, encoder, &mut leaves, &mut args)?;
        debug!(
            "generated command-line flags (type={}, flags={})",
            schema.name(),
            leaves.len()
        );
        Ok(Self {
            command: command.args(args),
            leaves,
            format,
        })
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Rendered `--help` text.
    pub fn render_help(&self) -> String {
        self.command.clone().render_help().to_string()
    }

    /// Parse a command line; the first item is the program name.
    pub fn parse_from<I, T>(&self, args: I) -> Result<CliArgs, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().try_get_matches_from(args)?;
        let config_path = matches.get_one::<PathBuf>(CONFIG_PATH_ARG).cloned();
        let overrides = self
            .leaves
            .iter()
            .filter_map(|leaf| {
                let text = matches.get_one::<String>(&leaf.id)?;
                let value = if leaf.verbatim {
                    RawValue::String(text.clone())
                } else {
                    self.format.parse_scalar(text)
                };
                Some((leaf.id.clone(), value))
            })
            .collect();
        Ok(CliArgs {
            config_path,
            overrides,
        })
    }
}

fn collect_args(
    schema: &Schema,
    prefix: &str,
    heading: Option<&str>,
    encoder: &Encoder<'_>,
    leaves: &mut Vec<Leaf>,
    args: &mut Vec<Arg>,
) -> Result<(), ConfigError> {
    for field in schema.fields() {
        let id = if prefix.is_empty() {
            field.name().to_string()
        } else {
            format!("{prefix}.{}", field.name())
        };
        if let TypeDescriptor::Struct(nested) = field.descriptor() {
            collect_args(nested, &id, Some(nested.name()), encoder, leaves, args)?;
            continue;
        }

        let mut arg = Arg::new(id.clone())
            .long(id.clone())
            .value_name(field.descriptor().name())
            .help(help_text(field, encoder)?)
            .action(ArgAction::Set)
            .allow_negative_numbers(true);
        if is_bool(field.descriptor()) {
            arg = arg.num_args(0..=1).default_missing_value("true");
        }
        for alias in field.aliases() {
            arg = with_alias(arg, alias);
        }
        if let Some(heading) = heading {
            arg = arg.help_heading(heading.to_string());
        }
        args.push(arg);
        leaves.push(Leaf {
            id,
            verbatim: matches!(
                field.descriptor(),
                TypeDescriptor::Primitive(PrimitiveKind::Str) | TypeDescriptor::PathLike
            ),
        });
    }
    Ok(())
}

fn help_text(field: &FieldSpec, encoder: &Encoder<'_>) -> Result<String, ConfigError> {
    let default = match field.default() {
        FieldDefault::Required | FieldDefault::Nested => None,
        FieldDefault::Literal(value) => Some(encoder.encode(value)?),
        FieldDefault::Factory(factory) => Some(encoder.encode(&factory())?),
    };
    let detail = match default {
        Some(default) => format!("{}, default: {}", field.descriptor().name(), default),
        None => format!("{}, required", field.descriptor().name()),
    };
    Ok(match field.doc() {
        Some(doc) => format!("{doc} [{detail}]"),
        None => format!("[{detail}]"),
    })
}

/// `-w` becomes a short flag; anything else a visible long alias.
fn with_alias(arg: Arg, alias: &str) -> Arg {
    if let Some(long) = alias.strip_prefix("--") {
        return arg.visible_alias(long.to_string());
    }
    let mut chars = alias.strip_prefix('-').unwrap_or(alias).chars();
    match (chars.next(), chars.next()) {
        (Some(short), None) if alias.starts_with('-') => arg.short(short),
        _ => arg.visible_alias(alias.trim_start_matches('-').to_string()),
    }
}

fn is_bool(descriptor: &TypeDescriptor) -> bool {
    match descriptor {
        TypeDescriptor::Primitive(PrimitiveKind::Bool) => true,
        TypeDescriptor::Optional(inner) => is_bool(inner),
        _ => false,
    }
}
