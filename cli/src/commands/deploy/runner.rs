use crate::cloudformation::{Client, FailedResource, Operation};
use crate::commands::deploy::DeployCommand;
use crate::error::Error;
use crate::progress::{ProgressStatus, RunProgress, StackProgress};
use crate::runner::{Context, Runner};
use crate::status::{DeployAction, StackState};
use eks_stacks_synth::{Assembly, StackId, SynthesizedStack};
use serde_json::json;
use std::time::Duration;

pub(crate) struct DeployRunner<'a> {
    pub(crate) command: DeployCommand,
    pub(crate) context: &'a Context,
}

/// Outcome of one stack, as reported in structured output
#[derive(serde::Serialize)]
struct StackResult {
    stack: StackId,
    result: &'static str,
    status: Option<String>,
    failures: Vec<FailedResource>,
}

impl Runner for DeployRunner<'_> {
    fn context(&self) -> &Context {
        self.context
    }

    /// Deploy the selection in plan order, stopping at the first failure
    async fn run(&mut self) -> Result<(), Error> {
        let app = self.app()?;
        let assembly = self.assembly(&app)?;
        let requested = self.select(&app, &self.command.stacks)?;

        let selected = if self.command.exclusively {
            requested
        } else {
            app.graph()?.upstream_closure(&requested)?
        };

        let client = self.client().await;
        self.check_account(&client).await?;

        let timeout: Duration = self.command.timeout.into();
        let progress = RunProgress::new("Deploying", selected.len() as u64);
        let mut results = Vec::new();
        let mut failed = None;

        for stack in stacks_in_order(&assembly, &selected) {
            let result = self.deploy(&client, &progress, stack, timeout).await;
            progress.advance();

            match result {
                Ok(result) => results.push(result),
                Err(e) => {
                    failed = Some((stack.id.clone(), e));
                    break;
                }
            }
        }

        progress.finish();

        let Some((id, error)) = failed else {
            return self.context.writer.json(json!({ "stacks": results }));
        };

        let failures = client.failures(id.as_str()).await.unwrap_or_else(|e| {
            log::warn!("Could not read events of {id}: {e:?}");
            vec![]
        });

        for failure in &failures {
            self.context.writer.error(&format!(
                "  {} {} ({}): {}\n",
                console::style(&failure.status).red(),
                failure.logical_id,
                failure.resource_type,
                failure.reason
            ))?;
        }

        results.push(StackResult {
            stack: id.clone(),
            result: "failed",
            status: None,
            failures,
        });

        self.context.writer.json(json!({ "stacks": results }))?;

        Err(self.error(
            Some(&format!("Failed to deploy {id}")),
            Some(&format!("{error:#}")),
            None,
        ))
    }
}

/// Synthesized stacks of the selection, in deployment order
fn stacks_in_order<'a>(
    assembly: &'a Assembly,
    selected: &'a [StackId],
) -> impl Iterator<Item = &'a SynthesizedStack> {
    assembly
        .stacks
        .iter()
        .filter(move |s| selected.contains(&s.id))
}

impl DeployRunner<'_> {
    /// Refuse to touch an account other than the configured one
    async fn check_account(&self, client: &Client) -> Result<(), Error> {
        let Some(expected) = &self.context.config.environment.account else {
            return Ok(());
        };

        let actual = client.caller_account().await?;

        if &actual != expected {
            return Err(self.error(
                Some("Wrong AWS account"),
                Some(&format!(
                    "The stacks target account {expected}, but the credentials belong to {actual}"
                )),
                None,
            ));
        }

        Ok(())
    }

    /// Start the operation the current state of the stack calls for
    async fn start(
        &self,
        client: &Client,
        stack_progress: &StackProgress,
        stack: &SynthesizedStack,
        timeout: Duration,
    ) -> eyre::Result<Operation> {
        let name = stack.id.as_str();
        let remote = client.describe(name).await?;

        let deployed = match &remote {
            Some(_) => client.template(name).await?,
            None => None,
        };

        let status = remote.as_ref().map(|r| r.status.as_str());

        match DeployAction::decide(status, deployed.as_ref(), &stack.template) {
            DeployAction::Create => client.create(stack).await,
            DeployAction::Update => client.update(stack).await,
            DeployAction::Skip => Ok(Operation::Unchanged),

            DeployAction::Recreate => {
                log::warn!(
                    "{name} is in {}, deleting it before creation",
                    status.unwrap_or_default()
                );
                client.delete(name).await?;
                stack_progress.log_stage("Deleting");

                let (state, status) = client
                    .wait(name, timeout, |status| stack_progress.set_status(status))
                    .await?;

                if state != StackState::Success {
                    return Err(eyre::eyre!("Failed to delete stack {name}: {status}"));
                }

                client.create(stack).await
            }

            DeployAction::Blocked => Err(eyre::eyre!(
                "Stack {name} is {}, wait for it to settle or fix it by hand",
                status.unwrap_or_default()
            )),
        }
    }

    /// Create or update one stack and wait for CloudFormation to settle
    async fn deploy(
        &self,
        client: &Client,
        progress: &RunProgress,
        stack: &SynthesizedStack,
        timeout: Duration,
    ) -> eyre::Result<StackResult> {
        let name = stack.id.as_str();
        let stack_progress = progress.stack(name);
        stack_progress.set_status("checking");

        let operation = self
            .start(client, &stack_progress, stack, timeout)
            .await
            .inspect_err(|_| stack_progress.finish("Failed", ProgressStatus::Error, None))?;

        let stage = match operation {
            Operation::Create => "Creating",
            Operation::Update => "Updating",

            Operation::Unchanged => {
                stack_progress.finish("Unchanged", ProgressStatus::Success, None);

                return Ok(StackResult {
                    stack: stack.id.clone(),
                    result: "unchanged",
                    status: None,
                    failures: vec![],
                });
            }
        };

        stack_progress.log_stage(stage);

        let (state, status) = client
            .wait(name, timeout, |status| stack_progress.set_status(status))
            .await
            .inspect_err(|_| stack_progress.finish("Timeout", ProgressStatus::Warn, None))?;

        if state != StackState::Success {
            stack_progress.finish("Failed", ProgressStatus::Error, Some(&status));
            return Err(eyre::eyre!("Stack {name} ended in {status}"));
        }

        stack_progress.finish("Deployed", ProgressStatus::Success, None);

        Ok(StackResult {
            stack: stack.id.clone(),
            result: match operation {
                Operation::Create => "created",
                _ => "updated",
            },
            status: Some(status),
            failures: vec![],
        })
    }
}
