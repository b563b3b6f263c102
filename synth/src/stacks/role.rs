use crate::app::App;
use crate::catalog::{RoleSpec, CLUSTER_ROLE, WORKER_NODE_ROLE};
use crate::error::Result;
use crate::handle::StackId;
use crate::stack::Stack;
use crate::template::{get_att, reference, CfnOutput};

/// Declare a role with its inline policies and register its ARN by role name
fn role_stack(
    app: &mut App,
    name: &str,
    description: &str,
    role: &RoleSpec,
    output: &str,
) -> Result<StackId> {
    let mut stack = Stack::new(name, description);

    stack.add_resource(role.resource())?;

    for policy in role.inline_policies {
        stack.add_resource(policy.resource(vec![reference(role.logical_id)]))?;
    }

    stack.add_output(CfnOutput::new(output, get_att(role.logical_id, "Arn")))?;

    let id = stack.id().clone();
    app.registry_mut().register(role.role_name, &id, role.arn())?;
    app.add(stack)?;

    Ok(id)
}

/// Service role assumed by the EKS control plane
pub struct ClusterRoleStack {
    pub id: StackId,
}

impl ClusterRoleStack {
    pub fn new(app: &mut App) -> Result<Self> {
        let id = role_stack(
            app,
            "EksClusterRoleStack",
            "IAM role for EKS cluster",
            &CLUSTER_ROLE,
            "EksClusterRoleArn",
        )?;

        Ok(ClusterRoleStack { id })
    }
}

/// Instance role of the worker nodes
pub struct NodeGroupRoleStack {
    pub id: StackId,
}

impl NodeGroupRoleStack {
    pub fn new(app: &mut App) -> Result<Self> {
        let id = role_stack(
            app,
            "EksNodeGroupRoleStack",
            "IAM role for EKS worker nodes",
            &WORKER_NODE_ROLE,
            "EksNodeGroupRoleArn",
        )?;

        Ok(NodeGroupRoleStack { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WORKER_NODE_ROLE_NAME;
    use crate::error::Error;
    use serde_json::{json, Value};

    fn policy_roles(template: &Value) -> Vec<&Value> {
        template["Resources"]
            .as_object()
            .into_iter()
            .flatten()
            .filter(|(_, r)| r["Type"] == "AWS::IAM::Policy")
            .map(|(_, r)| &r["Properties"]["Roles"])
            .collect()
    }

    #[test]
    fn worker_role_carries_three_inline_policies() {
        let mut app = App::default();
        NodeGroupRoleStack::new(&mut app).unwrap();

        let template = app.stacks()[0].template().to_json();
        let roles = policy_roles(&template);

        assert_eq!(roles.len(), 3);
        assert!(roles.iter().all(|r| **r == json!([{"Ref": "EksNodeGroupRole"}])));
        assert_eq!(
            template["Outputs"]["EksNodeGroupRoleArn"]["Value"],
            json!({"Fn::GetAtt": ["EksNodeGroupRole", "Arn"]})
        );
    }

    #[test]
    fn role_arn_is_registered_once() {
        let mut app = App::default();
        let stack = NodeGroupRoleStack::new(&mut app).unwrap();

        let registration = app
            .registry()
            .get(WORKER_NODE_ROLE_NAME, &StackId::new("EksNodeGroupSchedulerStack"))
            .unwrap();
        assert_eq!(registration.owner, stack.id);

        assert!(matches!(
            NodeGroupRoleStack::new(&mut app),
            Err(Error::DuplicateRegistration { .. })
        ));
    }
}
