pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "amanah",
    about = "Amanah operator CLI",
    long_about = "Inspect configuration, check runtime readiness and try the donor input parsers.",
    after_help = "Examples:\n  amanah doctor --json\n  amanah config\n  amanah parse amount 1,5jt"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, provider, gateway, prompt and demo catalog readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run a donor reply through one of the input parsers")]
    Parse {
        #[arg(value_enum)]
        parser: commands::parse::ParserKind,
        #[arg(required = true, num_args = 1.., help = "Text as the donor would type it")]
        input: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Parse { parser, input } => commands::parse::run(parser, &input.join(" ")),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
