use crate::handle::StackId;

/// Structural failures detected while declaring or synthesizing stacks
///
/// All of them surface before anything is sent to CloudFormation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Stack \"{0}\" is declared more than once")]
    DuplicateStack(StackId),

    #[error("Stack \"{0}\" is not declared in the app")]
    UnknownStack(StackId),

    #[error("Stack \"{0}\" cannot depend on itself")]
    SelfDependency(StackId),

    #[error("Dependency cycle between stacks: {}", join(.0))]
    Cycle(Vec<StackId>),

    #[error("\"{name}\" is not registered, required by stack \"{consumer}\"")]
    MissingRegistration { name: String, consumer: StackId },

    #[error("\"{name}\" is already registered by stack \"{owner}\"")]
    DuplicateRegistration { name: String, owner: StackId },

    #[error("Logical id \"{id}\" is used twice in stack \"{stack}\"")]
    DuplicateLogicalId { stack: StackId, id: String },

    #[error("Invalid CIDR block \"{0}\"")]
    InvalidCidr(String),

    #[error("Invalid node group scaling {name}: min {min}, desired {desired}, max {max}")]
    InvalidScaling {
        name: String,
        min: u32,
        desired: u32,
        max: u32,
    },

    #[error("Audit failed:\n{}", .0.join("\n"))]
    Audit(Vec<String>),

    #[error("Failed to serialize {what}")]
    Serialize {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

fn join(ids: &[StackId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}
