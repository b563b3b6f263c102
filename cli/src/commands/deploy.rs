mod runner;
use crate::runner::{Context, Runnable, Runner};
use clap::ArgAction;
use runner::DeployRunner;

#[derive(clap::Args, Clone)]
pub struct DeployCommand {
    /// Deploy only the named stacks, without their dependencies
    #[arg(short, long, action = ArgAction::SetTrue)]
    exclusively: bool,

    /// Give up waiting for a stack after this long, e.g. "30m" or "1h 15m"
    #[arg(long, default_value = "30m")]
    timeout: humantime::Duration,

    /// Stacks to deploy, all when omitted
    stacks: Vec<String>,
}

impl Runnable for DeployCommand {
    fn runner(&self, context: &Context) -> impl Runner {
        DeployRunner {
            command: self.clone(),
            context,
        }
    }
}
