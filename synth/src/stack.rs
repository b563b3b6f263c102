use crate::error::Result;
use crate::handle::{Handle, StackId};
use crate::registry::Registry;
use crate::template::{CfnOutput, CfnResource, Template};
use serde_json::Value;
use std::collections::BTreeSet;

/// A named, independently deployable group of resources
///
/// Besides the template, a stack remembers which foreign handles it imports
/// and which registry entries it looked up. Both turn into dependency edges
/// once the stack is added to an app.
#[derive(Clone, Debug)]
pub struct Stack {
    id: StackId,
    description: String,
    template: Template,
    imports: BTreeSet<Handle>,
    lookups: BTreeSet<StackId>,
}

impl Stack {
    pub fn new(name: &str, description: &str) -> Self {
        let id = StackId::new(name);

        Stack {
            template: Template::new(&id, description),
            id,
            description: description.to_string(),
            imports: BTreeSet::new(),
            lookups: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &StackId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub(crate) fn template_mut(&mut self) -> &mut Template {
        &mut self.template
    }

    pub fn add_resource(&mut self, resource: CfnResource) -> Result<()> {
        self.template.add_resource(resource)
    }

    pub fn add_output(&mut self, output: CfnOutput) -> Result<()> {
        self.template.add_output(output)
    }

    /// Handle to a resource declared in this stack
    pub fn handle(&self, logical_id: &str, attribute: Option<&str>) -> Handle {
        Handle::new(&self.id, logical_id, attribute)
    }

    /// Value of a handle as seen from this stack
    ///
    /// A handle owned by another stack is imported.
    pub fn resolve(&mut self, handle: &Handle) -> Value {
        if handle.stack != self.id {
            self.imports.insert(handle.clone());
        }

        handle.value_in(&self.id)
    }

    pub fn resolve_all(&mut self, handles: &[Handle]) -> Vec<Value> {
        handles.iter().map(|h| self.resolve(h)).collect()
    }

    /// Value registered under `name` by another stack
    pub fn lookup(&mut self, registry: &Registry, name: &str) -> Result<Value> {
        let registration = registry.get(name, &self.id)?;

        if registration.owner != self.id {
            self.lookups.insert(registration.owner.clone());
        }

        Ok(registration.value.clone())
    }

    pub fn imports(&self) -> impl Iterator<Item = &Handle> {
        self.imports.iter()
    }

    /// Stacks owning the registry entries this stack looked up
    pub fn lookup_owners(&self) -> impl Iterator<Item = &StackId> {
        self.lookups.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn foreign_handles_are_recorded_as_imports() {
        let network = Stack::new("EksVpcCdkStack", "VPC");
        let vpc = network.handle("EksVpc", None);
        let mut alb = Stack::new("EksAlbStack", "ALB");
        let own = alb.handle("ProdHelloAlb", Some("DNSName"));

        assert_eq!(
            alb.resolve(&vpc),
            json!({"Fn::ImportValue": "EksVpcCdkStack:ExportsOutputRefEksVpc"})
        );
        assert_eq!(
            alb.resolve(&own),
            json!({"Fn::GetAtt": ["ProdHelloAlb", "DNSName"]})
        );
        assert_eq!(alb.imports().collect::<Vec<_>>(), vec![&vpc]);
    }

    #[test]
    fn lookups_record_the_owner() {
        let mut registry = Registry::default();
        let role = StackId::new("EksClusterRoleStack");
        registry.register("prod-sre-eks-cluster-role", &role, json!("arn")).unwrap();

        let mut cluster = Stack::new("EksClusterStack", "Cluster");

        assert_eq!(
            cluster.lookup(&registry, "prod-sre-eks-cluster-role").unwrap(),
            json!("arn")
        );
        assert_eq!(cluster.lookup_owners().collect::<Vec<_>>(), vec![&role]);
        assert!(cluster.lookup(&registry, "unknown").is_err());
    }
}
