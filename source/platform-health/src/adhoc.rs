//! Ad-hoc probes: `check <type> --url https://example.com --check "..."`.
//!
//! The flag set is synthesized from each provider type's declared field list,
//! so a newly registered provider gets a CLI surface for free. The collected
//! flags are folded back into a spec map and run through the same builder and
//! engine as a config file.

use clap::{Arg, ArgAction, ArgMatches, Command};
use miette::miette;
use serde_yaml::{Mapping, Value};

use crate::engine::{check_instances, context::CheckContext};
use crate::provider::builder::InstanceBuilder;
use crate::provider::registry::{ProviderRegistry, ProviderType};
use crate::provider::{FieldKind, FieldSpec};
use crate::render::{self, OutputFormat};

/// The dynamic `check` command: one subcommand per non-container provider.
pub fn command(registry: &ProviderRegistry) -> Command {
    let mut cmd = Command::new("check")
        .about("Probe a single provider without a config file")
        .subcommand_required(true)
        .arg_required_else_help(true);

    for kind in registry.kinds() {
        let provider_type = registry.get(kind).expect("kind comes from the registry");
        if provider_type.container {
            continue;
        }
        cmd = cmd.subcommand(subcommand_for(provider_type));
    }
    cmd
}

fn subcommand_for(provider_type: &ProviderType) -> Command {
    let mut sub = Command::new(provider_type.kind).about(provider_type.help);

    for field in provider_type.fields {
        sub = sub.arg(field_arg(field));
    }

    sub.arg(
        Arg::new("check")
            .long("check")
            .action(ArgAction::Append)
            .value_name("EXPR")
            .help("CEL expression the probe must satisfy (repeatable)"),
    )
    .arg(
        Arg::new("timeout")
            .long("timeout")
            .value_name("DURATION")
            .help("Probe deadline, e.g. 5s"),
    )
    .arg(
        Arg::new("output")
            .long("output")
            .short('o')
            .value_parser(clap::value_parser!(OutputFormat))
            .help("Output format"),
    )
}

fn field_arg(field: &FieldSpec) -> Arg {
    let mut arg = Arg::new(field.name).long(field.name).help(field.help);
    if let Some(alias) = field.alias {
        arg = arg.short(alias);
    }
    match field.kind {
        FieldKind::Bool => arg.action(ArgAction::SetTrue),
        FieldKind::StringList | FieldKind::List => {
            arg.action(ArgAction::Append).value_name("VALUE")
        }
        _ => arg.action(ArgAction::Set).value_name("VALUE"),
    }
}

/// Run one ad-hoc probe and return the process exit code.
pub async fn run(registry: &ProviderRegistry, args: &[String], quiet: u8) -> miette::Result<i32> {
    let matches = command(registry)
        .try_get_matches_from(std::iter::once("check".to_string()).chain(args.iter().cloned()))
        .map_err(|e| miette!("{e}"))?;

    let (kind, sub) = matches
        .subcommand()
        .expect("subcommand_required is set on the check command");
    let provider_type = registry.get(kind).expect("subcommands mirror the registry");

    let map = spec_from_matches(kind, provider_type, sub);

    let builder = InstanceBuilder::new(registry, true);
    let mut warnings = Vec::new();
    let instance = builder
        .build_instance(kind, map, &mut warnings)?
        .ok_or_else(|| miette!("instance was dropped during build"))?;

    let ctx = CheckContext::new("ad-hoc", num_cpus::get());
    let responses = check_instances(&ctx, std::slice::from_ref(&instance)).await;
    let response = responses
        .first()
        .ok_or_else(|| miette!("probe produced no response"))?;

    let format = sub
        .get_one::<OutputFormat>("output")
        .copied()
        .unwrap_or(OutputFormat::Yaml);
    let rendered = render::render(response, format, quiet);
    if !rendered.is_empty() {
        println!("{rendered}");
    }

    Ok(render::exit_code(response))
}

fn spec_from_matches(kind: &str, provider_type: &ProviderType, sub: &ArgMatches) -> Mapping {
    let mut map = Mapping::new();
    map.insert(
        Value::String("type".to_string()),
        Value::String(kind.to_string()),
    );

    for field in provider_type.fields {
        let key = Value::String(field.name.to_string());
        match field.kind {
            FieldKind::Bool => {
                if sub.get_flag(field.name) {
                    map.insert(key, Value::Bool(true));
                }
            }
            FieldKind::StringList | FieldKind::List => {
                if let Some(values) = sub.get_many::<String>(field.name) {
                    map.insert(
                        key,
                        Value::Sequence(values.map(|v| parse_scalar(v)).collect()),
                    );
                }
            }
            _ => {
                if let Some(value) = sub.get_one::<String>(field.name) {
                    map.insert(key, parse_scalar(value));
                }
            }
        }
    }

    if let Some(timeout) = sub.get_one::<String>("timeout") {
        map.insert(
            Value::String("timeout".to_string()),
            Value::String(timeout.clone()),
        );
    }

    if let Some(checks) = sub.get_many::<String>("check") {
        let entries: Vec<Value> = checks
            .map(|expr| {
                let mut entry = Mapping::new();
                entry.insert(
                    Value::String("check".to_string()),
                    Value::String(expr.clone()),
                );
                Value::Mapping(entry)
            })
            .collect();
        map.insert(Value::String("checks".to_string()), Value::Sequence(entries));
    }

    map
}

fn parse_scalar(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
