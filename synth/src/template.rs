mod intrinsic;

use crate::error::{Error, Result};
use crate::handle::StackId;
pub use intrinsic::*;
use serde_json::{json, Map, Value};

/// A single resource in the CFN template, with its logical id
#[derive(Clone, Debug)]
pub struct CfnResource {
    pub name: String,
    pub resource: Value,
}

/// Stack output, optionally exported for other stacks to import
#[derive(Clone, Debug)]
pub struct CfnOutput {
    pub name: String,
    pub value: Value,
    pub description: Option<String>,
    pub export: Option<String>,
}

impl CfnOutput {
    pub fn new(name: &str, value: Value) -> Self {
        CfnOutput {
            name: name.to_string(),
            value,
            description: None,
            export: None,
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn export(mut self, name: &str) -> Self {
        self.export = Some(name.to_string());
        self
    }

    fn to_json(&self) -> Value {
        let mut output = json!({ "Value": self.value });

        if let Some(description) = &self.description {
            output["Description"] = json!(description);
        }

        if let Some(export) = &self.export {
            output["Export"] = json!({ "Name": export });
        }

        output
    }
}

/// CloudFormation template of one stack
///
/// Resources and outputs are kept in sorted maps, so the same declarations
/// always serialize to the same document.
#[derive(Clone, Debug)]
pub struct Template {
    stack: StackId,
    description: String,
    resources: Map<String, Value>,
    outputs: Map<String, Value>,
}

impl Template {
    pub fn new(stack: &StackId, description: &str) -> Self {
        Template {
            stack: stack.clone(),
            description: description.to_string(),
            resources: Map::new(),
            outputs: Map::new(),
        }
    }

    /// Add a resource to the CFN template
    pub fn add_resource(&mut self, CfnResource { name, resource }: CfnResource) -> Result<()> {
        if self.resources.contains_key(&name) {
            return Err(Error::DuplicateLogicalId {
                stack: self.stack.clone(),
                id: name,
            });
        }

        self.resources.insert(name, resource);
        Ok(())
    }

    pub fn add_output(&mut self, output: CfnOutput) -> Result<()> {
        if self.outputs.contains_key(&output.name) {
            return Err(Error::DuplicateLogicalId {
                stack: self.stack.clone(),
                id: output.name,
            });
        }

        self.outputs.insert(output.name.clone(), output.to_json());
        Ok(())
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    pub fn resource(&self, name: &str) -> Option<&Value> {
        self.resources.get(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.resources.iter()
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.outputs.iter()
    }

    /// The full template document
    pub fn to_json(&self) -> Value {
        let mut template = json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": self.description,
            "Resources": self.resources,
        });

        if !self.outputs.is_empty() {
            template["Outputs"] = Value::Object(self.outputs.clone());
        }

        template
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pretty = serde_json::to_string_pretty(&self.to_json()).map_err(|_| std::fmt::Error)?;
        write!(f, "{pretty}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Template {
        Template::new(&StackId::new("TestStack"), "Test stack")
    }

    #[test]
    fn duplicate_logical_id_is_rejected() {
        let mut template = template();
        let queue = || CfnResource {
            name: "Queue".into(),
            resource: json!({"Type": "AWS::SQS::Queue"}),
        };

        template.add_resource(queue()).unwrap();

        assert!(matches!(
            template.add_resource(queue()),
            Err(Error::DuplicateLogicalId { id, .. }) if id == "Queue"
        ));
    }

    #[test]
    fn outputs_carry_description_and_export() {
        let mut template = template();

        template
            .add_output(
                CfnOutput::new("VpcId", reference("EksVpc"))
                    .description("The VPC")
                    .export("TestStack:VpcId"),
            )
            .unwrap();

        let document = template.to_json();

        assert_eq!(
            document["Outputs"]["VpcId"],
            json!({
                "Value": {"Ref": "EksVpc"},
                "Description": "The VPC",
                "Export": {"Name": "TestStack:VpcId"}
            })
        );
    }

    #[test]
    fn outputs_section_is_omitted_when_empty() {
        let document = template().to_json();
        assert!(document.get("Outputs").is_none());
        assert_eq!(document["Description"], "Test stack");
    }
}
