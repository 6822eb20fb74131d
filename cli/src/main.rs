use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use phil_cli::process_command_line;
use phil_core::{FormatOptions, PhilError, Scope, TypeRegistry, as_str, diff, extract};
use phil_parser::PhilParser;

/// Output format for rendered trees.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Phil,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "phil")]
#[command(about = "Inspect and merge phil configuration documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a master document, optionally with overrides applied.
    Show(ShowArgs),
    /// Merge working documents and overrides over a master and print the
    /// full result.
    Merge(MergeArgs),
    /// Print only the parameters that differ from the master defaults.
    Diff(MergeArgs),
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// Master phil document.
    master: PathBuf,
    /// Working files, `path=value` overrides, and display flags.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
    /// Attribute verbosity (0-3).
    #[arg(long, default_value_t = 2)]
    attributes_level: u32,
    /// Hide parameters above this expert level.
    #[arg(long)]
    expert_level: Option<u32>,
    /// Output format.
    #[arg(long, default_value = "phil")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// Master phil document.
    master: PathBuf,
    /// Working files, `path=value` overrides, and display flags.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
    /// Output format.
    #[arg(long, default_value = "phil")]
    format: CliOutputFormat,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Show(args) => run_show(args),
        Command::Merge(args) => run_merge(args, false),
        Command::Diff(args) => run_merge(args, true),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn load_master(path: &PathBuf, registry: &TypeRegistry) -> Result<Scope, String> {
    let outcome = PhilParser::new(registry).parse_file(&path.to_string_lossy());
    for warning in &outcome.warnings {
        eprintln!("{warning}");
    }
    outcome.into_result().map_err(join_errors)
}

fn join_errors(errors: Vec<PhilError>) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn run_show(args: ShowArgs) -> Result<(), String> {
    let registry = TypeRegistry::with_builtins();
    let master = load_master(&args.master, &registry)?;

    let result = process_command_line(&master, &args.args, &registry).map_err(join_errors)?;
    for diagnostic in &result.diagnostics {
        eprintln!("{diagnostic}");
    }
    if !result.is_clean() {
        return Err("cannot merge the given arguments".to_string());
    }
    if !result.unconsumed.is_empty() {
        return Err(format!(
            "unrecognized arguments: {}",
            result.unconsumed.join(" ")
        ));
    }

    let options = FormatOptions {
        attributes_level: args.attributes_level,
        expert_level: args.expert_level,
    };
    print_tree(&result.merged, &options, args.format)
}

fn run_merge(args: MergeArgs, diff_only: bool) -> Result<(), String> {
    let registry = TypeRegistry::with_builtins();
    let master = load_master(&args.master, &registry)?;

    let result = process_command_line(&master, &args.args, &registry).map_err(join_errors)?;
    for diagnostic in &result.diagnostics {
        eprintln!("{diagnostic}");
    }
    if !result.is_clean() {
        return Err("cannot merge the given arguments".to_string());
    }
    if !result.unconsumed.is_empty() {
        return Err(format!(
            "unrecognized arguments: {}",
            result.unconsumed.join(" ")
        ));
    }

    let tree = if diff_only && !result.display.show_defaults {
        diff(&master, &result.merged, &registry)
    } else {
        result.merged
    };
    let options = FormatOptions {
        attributes_level: result.display.attributes_level,
        expert_level: result.display.expert_level,
    };
    print_tree(&tree, &options, args.format)
}

fn print_tree(
    tree: &Scope,
    options: &FormatOptions,
    format: CliOutputFormat,
) -> Result<(), String> {
    match format {
        CliOutputFormat::Phil => {
            print!("{}", as_str(tree, options));
            Ok(())
        }
        CliOutputFormat::Json => {
            let data = extract(tree);
            let text = serde_json::to_string_pretty(&data)
                .map_err(|err| format!("cannot serialize tree: {err}"))?;
            println!("{text}");
            Ok(())
        }
    }
}
