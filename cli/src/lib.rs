mod cloudformation;
mod commands;
pub mod config;
pub mod error;
mod logger;
mod progress;
mod runner;
pub mod status;
mod table;
mod writer;

use crate::commands::Commands;
use crate::config::Config;
use crate::error::Error;
use crate::logger::Logger;
use crate::runner::{Context, Runnable, Runner};
use crate::writer::Writer;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file, eks-stacks.toml in the current directory by default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Derive a runner from the command and run it
async fn run(command: &impl Runnable, context: &Context) -> Result<(), Error> {
    let mut runner = command.runner(context);
    runner.run().await
}

impl Cli {
    pub async fn run(self) -> Result<(), Error> {
        Logger::init();

        let context = Context {
            config: Config::load(self.config.as_deref())?,
            writer: Writer::new(self.json),
        };

        log::debug!("Running with {:?}", context.config);

        // Match all commands here, in one place
        match &self.command {
            Commands::Synth(cmd) => run(cmd, &context).await,
            Commands::Plan(cmd) => run(cmd, &context).await,
            Commands::Diff(cmd) => run(cmd, &context).await,
            Commands::Deploy(cmd) => run(cmd, &context).await,
            Commands::Destroy(cmd) => run(cmd, &context).await,
            Commands::Outputs(cmd) => run(cmd, &context).await,
            Commands::Manifests(cmd) => run(cmd, &context).await,
        }
    }
}
