pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "epicerie",
    about = "Epicerie operator CLI",
    long_about = "Inspect configuration, check readiness, browse the catalog, and replay scripted shopping sessions.",
    after_help = "Examples:\n  epicerie doctor --json\n  epicerie catalog --category Fruits\n  epicerie replay session.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, catalog loading, perfect cart coverage, and tool contracts")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List catalog products the way the shop grid shows them")]
    Catalog {
        #[arg(long, help = "Exact category name; `All` disables the filter")]
        category: Option<String>,
        #[arg(long, help = "Case-insensitive text matched against name and description")]
        search: Option<String>,
    },
    #[command(about = "Print the tool signatures advertised to the assistant backend")]
    Tools,
    #[command(about = "Run a JSON script of shopper steps against a fresh storefront")]
    Replay {
        #[arg(help = "Path to a JSON array of replay steps")]
        file: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Catalog { category, search } => {
            commands::catalog::run(category.as_deref(), search.as_deref())
        }
        Command::Tools => commands::tools::run(),
        Command::Replay { file } => commands::replay::run(&file),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
