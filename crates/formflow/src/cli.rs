use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::cmd::{
    self, check::CheckArgs, evaluate::EvaluateArgs, export::ExportArgs, schema::SchemaArgs,
    simulate::SimulateArgs,
};
use crate::{logging, settings};

#[derive(Parser, Debug)]
#[command(
    name = "formflow",
    about = "Check, evaluate and simulate conditional form definitions",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Engine settings file
    #[arg(long = "config", value_name = "formflow.toml", global = true)]
    config: Option<PathBuf>,

    /// Drain passes allowed for re-entrant notifications
    #[arg(long = "max-passes", value_name = "N", global = true)]
    max_passes: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate dependency chains; fails on circular dependencies
    Check(CheckArgs),
    /// Print field, page and button visibility for a set of variables
    Evaluate(EvaluateArgs),
    /// Replay a scripted session and print each outcome
    Simulate(SimulateArgs),
    /// Print the extracted conditions of a form
    Export(ExportArgs),
    /// Print the JSON Schema of form definitions
    Schema(SchemaArgs),
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = settings::engine_config(cli.config.as_deref(), cli.max_passes)?;
    logging::init(cli.verbose, config.log_level.as_deref());
    match cli.command {
        Commands::Check(args) => cmd::check::run(args, &config),
        Commands::Evaluate(args) => cmd::evaluate::run(args, &config),
        Commands::Simulate(args) => cmd::simulate::run(args, &config),
        Commands::Export(args) => cmd::export::run(args, &config),
        Commands::Schema(args) => cmd::schema::run(args),
    }
}
