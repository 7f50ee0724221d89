//! gridlint CLI — static analysis for monitoring dashboard definitions.
//!
//! This binary provides the `gridlint` command with subcommands for linting
//! dashboard JSON files and listing the rule catalog. See `gridlint --help`
//! for usage.

use clap::Parser;

mod cli_args;
mod commands;
mod discover;

use cli_args::{Cli, Commands};
use gridlint_output::OutputFormatter;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let formatter: Box<dyn OutputFormatter> = if cli.json {
        Box::new(gridlint_output::json::JsonFormatter)
    } else {
        Box::new(gridlint_output::human::HumanFormatter::new(cli.verbose))
    };

    let exit_code = match cli.command {
        Commands::Lint {
            paths,
            strict,
            fix,
            config,
        } => commands::lint::run(&*formatter, paths, strict, fix, &config),
        Commands::Rules => commands::rules::run(),
    };

    std::process::exit(exit_code);
}
