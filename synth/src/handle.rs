use crate::template::{get_att, import_value, logical_id, reference};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identity of a stack, which is also its CloudFormation stack name
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackId(String);

impl StackId {
    pub fn new(name: &str) -> Self {
        StackId(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StackId {
    fn from(name: &str) -> Self {
        StackId::new(name)
    }
}

/// Reference to an attribute of a resource declared in some stack
///
/// The value is not known until the owning stack is provisioned. Resolving a
/// handle from another stack goes through a CFN export, which also makes the
/// consuming stack depend on the owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    pub stack: StackId,
    pub logical_id: String,

    /// None stands for the resource's "Ref" value
    pub attribute: Option<String>,
}

impl Handle {
    pub fn new(stack: &StackId, logical_id: &str, attribute: Option<&str>) -> Self {
        Handle {
            stack: stack.clone(),
            logical_id: logical_id.to_string(),
            attribute: attribute.map(|a| a.to_string()),
        }
    }

    /// Value inside the owning stack's own template
    pub fn local(&self) -> Value {
        match &self.attribute {
            Some(attribute) => get_att(&self.logical_id, attribute),
            None => reference(&self.logical_id),
        }
    }

    /// Logical id of the output the owning stack exports this handle under
    pub fn output_name(&self) -> String {
        match &self.attribute {
            Some(attribute) => logical_id(&format!(
                "ExportsOutputFnGetAtt{}{}",
                self.logical_id, attribute
            )),
            None => logical_id(&format!("ExportsOutputRef{}", self.logical_id)),
        }
    }

    pub fn export_name(&self) -> String {
        format!("{}:{}", self.stack, self.output_name())
    }

    /// Value inside any other stack's template
    pub fn imported(&self) -> Value {
        import_value(&self.export_name())
    }

    /// Value as seen from `consumer`'s template
    pub fn value_in(&self, consumer: &StackId) -> Value {
        if &self.stack == consumer {
            self.local()
        } else {
            self.imported()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handle_resolves_locally_or_through_an_export() {
        let network = StackId::new("EksVpcCdkStack");
        let cluster = StackId::new("EksClusterStack");
        let vpc = Handle::new(&network, "EksVpc", None);
        let eip = Handle::new(&network, "NatEip", Some("AllocationId"));

        assert_eq!(vpc.value_in(&network), json!({"Ref": "EksVpc"}));
        assert_eq!(
            vpc.value_in(&cluster),
            json!({"Fn::ImportValue": "EksVpcCdkStack:ExportsOutputRefEksVpc"})
        );
        assert_eq!(
            eip.export_name(),
            "EksVpcCdkStack:ExportsOutputFnGetAttNatEipAllocationId"
        );
        assert_eq!(eip.local(), json!({"Fn::GetAtt": ["NatEip", "AllocationId"]}));
    }
}
