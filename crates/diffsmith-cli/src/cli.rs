//! Command-line definition

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use diffsmith_core::{DiffsmithConfig, PatchToolKind};
use std::path::PathBuf;

/// The `diffsmith` command
#[must_use]
pub fn command() -> Command {
    Command::new("diffsmith")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Turn natural-language edit requests into validated unified diffs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding the target files"),
        )
        .arg(
            Arg::new("patch-tool")
                .long("patch-tool")
                .global(true)
                .value_parser(["gnu", "native"])
                .help("Structural-patch tool used for dry runs and commits"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .global(true)
                .help("Model name for the text-synthesis service"),
        )
        .subcommand(
            Command::new("run")
                .about("Decompose a request and apply a diff for every task")
                .arg(Arg::new("request").required(true).help("Edit request"))
                .arg(
                    Arg::new("max-attempts")
                        .long("max-attempts")
                        .value_parser(value_parser!(u32).range(1..))
                        .help("Synthesis attempts per task"),
                )
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .action(ArgAction::SetTrue)
                        .help("Pretty-print the JSON report"),
                ),
        )
        .subcommand(
            Command::new("decompose")
                .about("Show the tasks and notes a request decomposes into")
                .arg(Arg::new("request").required(true).help("Edit request")),
        )
        .subcommand(
            Command::new("check")
                .about("Validate a diff file against a target without applying it")
                .arg(
                    Arg::new("category")
                        .long("category")
                        .default_value("structure")
                        .help("Category of the target file (structure, style, behavior)"),
                )
                .arg(
                    Arg::new("diff")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Unified diff to validate"),
                ),
        )
}

/// Configuration file (or defaults) with command-line overrides applied
///
/// # Errors
/// Returns the configuration error when the file cannot be loaded or the
/// result is out of range
pub fn resolve_config(matches: &ArgMatches) -> anyhow::Result<DiffsmithConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => DiffsmithConfig::load(path)?,
        None => DiffsmithConfig::new(),
    };

    if let Some(root) = matches.get_one::<PathBuf>("root") {
        config = config.with_root(root);
    }
    if let Some(tool) = matches.get_one::<String>("patch-tool") {
        config = config.with_patch_tool(if tool == "native" {
            PatchToolKind::Native
        } else {
            PatchToolKind::Gnu
        });
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config = config.with_model(model);
    }
    if let Some(("run", run)) = matches.subcommand() {
        if let Some(attempts) = run.get_one::<u32>("max-attempts") {
            config = config.with_max_attempts(*attempts);
        }
    }

    config.validate()?;
    Ok(config)
}
