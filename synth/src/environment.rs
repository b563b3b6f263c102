use serde::{Deserialize, Serialize};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Target account and region of the stacks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Expected AWS account, checked against the caller identity before deploying
    pub account: Option<String>,

    pub region: String,

    #[serde(default = "default_partition")]
    pub partition: String,
}

fn default_partition() -> String {
    "aws".to_string()
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            account: None,
            region: DEFAULT_REGION.to_string(),
            partition: default_partition(),
        }
    }
}

impl Environment {
    pub fn new(account: Option<&str>, region: &str) -> Self {
        Environment {
            account: account.map(|a| a.to_string()),
            region: region.to_string(),
            ..Default::default()
        }
    }

    /// The three zones subnets are spread across
    pub fn availability_zones(&self) -> [String; 3] {
        ["a", "b", "c"].map(|zone| format!("{}{zone}", self.region))
    }
}
