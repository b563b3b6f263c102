use crate::cloudformation::Client;
use crate::error::Error;
use crate::progress::{ProgressStatus, RunProgress};
use crate::runner::{Context, Runnable, Runner};
use crate::status::StackState;
use eks_stacks_synth::StackId;
use eyre::WrapErr;
use serde_json::json;
use std::io::{self, Write};
use std::time::Duration;

#[derive(clap::Args, Clone)]
pub struct DestroyCommand {
    /// Do not ask for confirmation
    #[arg(short, long)]
    force: bool,

    /// Give up waiting for a stack after this long
    #[arg(long, default_value = "30m")]
    timeout: humantime::Duration,

    /// Stacks to delete, all when omitted
    stacks: Vec<String>,
}

impl Runnable for DestroyCommand {
    fn runner(&self, context: &Context) -> impl Runner {
        DestroyRunner {
            command: self.clone(),
            context,
        }
    }
}

struct DestroyRunner<'a> {
    command: DestroyCommand,
    context: &'a Context,
}

impl DestroyRunner<'_> {
    fn confirm(&self, stacks: &[StackId]) -> eyre::Result<bool> {
        eprintln!("{}", console::style("Stacks to be deleted:").bold());

        for id in stacks {
            eprintln!("  {id}");
        }

        eprint!(
            "{} {}: ",
            console::style("Do you want to proceed?").bold(),
            console::style("[y/N]").dim()
        );
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .wrap_err("Failed to read input")?;

        Ok(matches!(input.trim().to_lowercase().as_ref(), "y" | "yes"))
    }

    async fn destroy(
        &self,
        client: &Client,
        progress: &RunProgress,
        id: &StackId,
        timeout: Duration,
    ) -> eyre::Result<&'static str> {
        let name = id.as_str();
        let stack_progress = progress.stack(name);

        if client.describe(name).await?.is_none() {
            stack_progress.finish("Skipped", ProgressStatus::Warn, Some("not deployed"));
            return Ok("absent");
        }

        client.delete(name).await?;
        stack_progress.log_stage("Destroying");

        let (state, status) = client
            .wait(name, timeout, |status| stack_progress.set_status(status))
            .await?;

        if state != StackState::Success {
            stack_progress.finish("Failed", ProgressStatus::Error, Some(&status));
            return Err(eyre::eyre!("Stack {name} ended in {status}"));
        }

        stack_progress.finish("Destroyed", ProgressStatus::Success, None);
        Ok("deleted")
    }
}

impl Runner for DestroyRunner<'_> {
    fn context(&self) -> &Context {
        self.context
    }

    /// Delete the selection and its dependents, dependents first
    async fn run(&mut self) -> Result<(), Error> {
        let app = self.app()?;
        let requested = self.select(&app, &self.command.stacks)?;
        let mut selected = app.graph()?.downstream_closure(&requested)?;
        selected.reverse();

        // The prompt would corrupt structured output
        if !self.command.force && self.context.writer.is_structured() {
            return Err(self.error(
                Some("Confirmation required"),
                Some("Pass --force to destroy stacks with --json"),
                None,
            ));
        }

        if !self.command.force && !self.confirm(&selected)? {
            eprintln!("{}", console::style("Destroying canceled").dim().bold());
            return Ok(());
        }

        let client = self.client().await;
        let timeout: Duration = self.command.timeout.into();
        let progress = RunProgress::new("Destroying", selected.len() as u64);
        let mut results = serde_json::Map::new();

        for id in &selected {
            let result = self.destroy(&client, &progress, id, timeout).await;
            progress.advance();

            match result {
                Ok(result) => {
                    results.insert(id.to_string(), json!(result));
                }

                Err(e) => {
                    progress.finish();
                    results.insert(id.to_string(), json!("failed"));
                    self.context.writer.json(json!({ "stacks": results }))?;

                    return Err(self.error(
                        Some(&format!("Failed to destroy {id}")),
                        Some(&format!("{e:#}")),
                        None,
                    ));
                }
            }
        }

        progress.finish();
        self.context.writer.json(json!({ "stacks": results }))
    }
}
