use eks_stacks_synth::diff::diff;
use serde_json::Value;

/// Where a stack operation stands, derived from the CloudFormation stack status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackState {
    /// CloudFormation is still working on the stack
    Pending,
    Success,
    Failure,
}

impl StackState {
    pub fn classify(status: &str) -> Self {
        match status {
            "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "DELETE_COMPLETE" | "IMPORT_COMPLETE" => {
                StackState::Success
            }

            // Rolled back means the requested change did not happen
            "ROLLBACK_COMPLETE" | "UPDATE_ROLLBACK_COMPLETE" | "IMPORT_ROLLBACK_COMPLETE" => {
                StackState::Failure
            }

            status if status.ends_with("_IN_PROGRESS") => StackState::Pending,
            status if status.ends_with("_FAILED") => StackState::Failure,

            status => {
                log::warn!("Unknown stack status {status}");
                StackState::Failure
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != StackState::Pending
    }
}

/// The stack can only be deleted, updates are refused
pub fn needs_recreate(status: &str) -> bool {
    matches!(status, "ROLLBACK_COMPLETE" | "ROLLBACK_FAILED" | "CREATE_FAILED")
}

/// What deploying a template does to the stack of the same name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployAction {
    Create,
    Update,

    /// Delete the failed stack, then create it again
    Recreate,

    /// The stack is healthy and already runs this template
    Skip,

    /// The stack is busy or stuck, nothing can be done until it settles
    Blocked,
}

impl DeployAction {
    /// `status` and `deployed` describe the current stack, None if it does not exist
    pub fn decide(status: Option<&str>, deployed: Option<&Value>, template: &Value) -> Self {
        let Some(status) = status else {
            return DeployAction::Create;
        };

        if status == "DELETE_COMPLETE" {
            return DeployAction::Create;
        }

        if needs_recreate(status) {
            return DeployAction::Recreate;
        }

        match StackState::classify(status) {
            StackState::Pending => DeployAction::Blocked,

            StackState::Success => match deployed {
                Some(deployed) if diff(deployed, template).is_empty() => DeployAction::Skip,
                _ => DeployAction::Update,
            },

            // An update that rolled back left the previous template in place
            StackState::Failure
                if matches!(status, "UPDATE_ROLLBACK_COMPLETE" | "IMPORT_ROLLBACK_COMPLETE") =>
            {
                DeployAction::Update
            }

            StackState::Failure => DeployAction::Blocked,
        }
    }
}
