// SPDX-License-Identifier: MIT

//! `rf` — the operator CLI for the remediation fleet engine: upload a CSV
//! and spawn a run, list runs, show one run in detail, and record a human
//! review decision on a session. Talks directly to the on-disk state
//! (`rf-storage`) and to `rf-runner` as a spawned child process — there is
//! no resident daemon for this CLI to dial into, unlike the teacher's `oj`.

mod commands;
mod env;
mod output;
mod run_id;
mod runner_process;

use clap::{Parser, Subcommand};
use output::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rf", version, about = "Operator CLI for the remediation fleet engine")]
struct Cli {
    /// State root (defaults to $RF_STATE_ROOT or ./rf-state)
    #[arg(short = 'r', long = "root", global = true)]
    root: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a findings CSV and spawn a run
    Spawn(commands::spawn::SpawnArgs),
    /// List all runs, newest last
    List,
    /// Show one run in full detail
    Show(commands::show::ShowArgs),
    /// Approve or reject a session's remediation
    Review(commands::review::ReviewArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let root = cli.root.unwrap_or_else(env::state_root);

    match cli.command {
        Commands::Spawn(args) => commands::spawn::run(&root, args, cli.output).await,
        Commands::List => commands::list::run(&root, cli.output),
        Commands::Show(args) => commands::show::run(&root, args, cli.output),
        Commands::Review(args) => commands::review::run(&root, args, cli.output),
    }
}
