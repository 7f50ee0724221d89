use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gridlint",
    version,
    about = "Static analysis and autofix for monitoring dashboards"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as structured JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Show excluded results in reports
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Lint dashboard JSON files
    Lint {
        /// Files or directories to lint (default: current directory)
        paths: Vec<String>,

        /// Exit non-zero on warnings as well as errors
        #[arg(long)]
        strict: bool,

        /// Apply automatic fixes and write the files back
        #[arg(long)]
        fix: bool,

        /// Path to the configuration file
        #[arg(long, default_value = ".gridlint.json")]
        config: String,
    },

    /// List the available rules
    Rules,
}
