use crate::status::StackState;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::Capability;
use eks_stacks_synth::SynthesizedStack;
use eyre::WrapErr;
use serde::Serialize;
use std::time::Duration;

/// Time between two status checks of a stack in progress
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// CloudFormation answers requests for an unknown stack with a validation error
fn is_missing_stack(error: &impl ProvideErrorMetadata) -> bool {
    error.code() == Some("ValidationError")
        && error.message().is_some_and(|m| m.contains("does not exist"))
}

/// Turn an SDK error into a report which keeps the service message
fn sdk_error<E: std::error::Error + Send + Sync + 'static>(error: E) -> eyre::Report {
    eyre::eyre!("{}", DisplayErrorContext(error))
}

#[derive(Clone, Debug, Serialize)]
pub struct StackOutput {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

/// A stack as it currently exists in CloudFormation
#[derive(Clone, Debug)]
pub struct RemoteStack {
    pub status: String,
    pub reason: Option<String>,
    pub outputs: Vec<StackOutput>,
}

/// A resource which failed during the last operation on a stack
#[derive(Clone, Debug, Serialize)]
pub struct FailedResource {
    pub logical_id: String,
    pub resource_type: String,
    pub status: String,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,

    /// CloudFormation found nothing to change
    Unchanged,
}

/// CloudFormation and STS access for one region
pub struct Client {
    cloudformation: aws_sdk_cloudformation::Client,
    sts: aws_sdk_sts::Client,
}

impl Client {
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Client {
            cloudformation: aws_sdk_cloudformation::Client::new(&config),
            sts: aws_sdk_sts::Client::new(&config),
        }
    }

    /// Account of the credentials in use
    pub async fn caller_account(&self) -> eyre::Result<String> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err("Failed to get the caller identity")?;

        Ok(identity
            .account()
            .ok_or_else(|| eyre::eyre!("Caller identity has no account"))?
            .to_string())
    }

    /// Current state of the stack, None if it does not exist
    pub async fn describe(&self, name: &str) -> eyre::Result<Option<RemoteStack>> {
        let result = self
            .cloudformation
            .describe_stacks()
            .stack_name(name)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,

            Err(e) if is_missing_stack(&e) => return Ok(None),

            Err(e) => {
                return Err(sdk_error(e)).wrap_err(format!("Failed to describe stack {name}"));
            }
        };

        let Some(stack) = output.stacks().first() else {
            return Ok(None);
        };

        let outputs = stack
            .outputs()
            .iter()
            .map(|output| StackOutput {
                key: output.output_key().unwrap_or_default().to_string(),
                value: output.output_value().unwrap_or_default().to_string(),
                description: output.description().map(|d| d.to_string()),
            })
            .collect();

        Ok(Some(RemoteStack {
            status: stack
                .stack_status()
                .map(|s| s.as_str().to_string())
                .ok_or_else(|| eyre::eyre!("Status of {name} is missing"))?,
            reason: stack.stack_status_reason().map(|r| r.to_string()),
            outputs,
        }))
    }

    /// Template of the deployed stack, None if the stack does not exist
    pub async fn template(&self, name: &str) -> eyre::Result<Option<serde_json::Value>> {
        let result = self
            .cloudformation
            .get_template()
            .stack_name(name)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if is_missing_stack(&e) => return Ok(None),

            Err(e) => {
                return Err(sdk_error(e)).wrap_err(format!("Failed to get template of {name}"));
            }
        };

        let body = output
            .template_body()
            .ok_or_else(|| eyre::eyre!("Template of {name} is empty"))?;

        let template = serde_json::from_str(body)
            .wrap_err(format!("Deployed template of {name} is not JSON"))?;

        Ok(Some(template))
    }

    pub async fn create(&self, stack: &SynthesizedStack) -> eyre::Result<Operation> {
        let name = stack.id.as_str();

        self.cloudformation
            .create_stack()
            .stack_name(name)
            .template_body(stack.template_body()?)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err(format!("Failed to create stack {name}"))?;

        Ok(Operation::Create)
    }

    /// Start updating the stack, CloudFormation may find nothing to change
    pub async fn update(&self, stack: &SynthesizedStack) -> eyre::Result<Operation> {
        let name = stack.id.as_str();

        let result = self
            .cloudformation
            .update_stack()
            .stack_name(name)
            .template_body(stack.template_body()?)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await;

        match result {
            Ok(_) => Ok(Operation::Update),

            Err(e)
                if e.message()
                    .is_some_and(|m| m.contains("No updates are to be performed")) =>
            {
                Ok(Operation::Unchanged)
            }

            Err(e) => Err(sdk_error(e)).wrap_err(format!("Failed to update stack {name}")),
        }
    }

    pub async fn delete(&self, name: &str) -> eyre::Result<()> {
        self.cloudformation
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err(format!("Failed to delete stack {name}"))?;

        Ok(())
    }

    /// Poll the stack until it reaches a terminal status
    ///
    /// A stack that disappeared counts as deleted. `on_status` sees every
    /// status observed on the way.
    pub async fn wait(
        &self,
        name: &str,
        timeout: Duration,
        on_status: impl Fn(&str),
    ) -> eyre::Result<(StackState, String)> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let (status, reason) = match self.describe(name).await? {
                Some(stack) => (stack.status, stack.reason),
                None => ("DELETE_COMPLETE".to_string(), None),
            };

            on_status(&status);
            let state = StackState::classify(&status);

            if state == StackState::Failure {
                if let Some(reason) = reason {
                    log::warn!("{name}: {reason}");
                }
            }

            if state.is_terminal() {
                return Ok((state, status));
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(eyre::eyre!(
                    "Stack {name} is still {status} after {}",
                    humantime::format_duration(timeout)
                ));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Failed resources of the latest operation on the stack
    ///
    /// Events come newest first, so reading stops at the event which
    /// started the operation.
    pub async fn failures(&self, name: &str) -> eyre::Result<Vec<FailedResource>> {
        let mut failures = Vec::new();
        let mut next_token = None;

        loop {
            let response = self
                .cloudformation
                .describe_stack_events()
                .stack_name(name)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(sdk_error)
                .wrap_err(format!("Failed to read events of {name}"))?;

            for event in response.stack_events() {
                let status = event
                    .resource_status()
                    .map(|s| s.as_str())
                    .unwrap_or_default();

                let is_stack_event = event.resource_type() == Some("AWS::CloudFormation::Stack");

                if is_stack_event && event.resource_status_reason() == Some("User Initiated") {
                    return Ok(failures);
                }

                if status.ends_with("_FAILED") && !is_stack_event {
                    failures.push(FailedResource {
                        logical_id: event.logical_resource_id().unwrap_or_default().to_string(),
                        resource_type: event.resource_type().unwrap_or_default().to_string(),
                        status: status.to_string(),
                        reason: event
                            .resource_status_reason()
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
            }

            next_token = response.next_token().map(|t| t.to_string());

            if next_token.is_none() {
                return Ok(failures);
            }
        }
    }
}
