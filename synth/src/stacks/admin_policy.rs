use crate::app::App;
use crate::catalog::{ADMIN_EKS_POLICY, DEVOPS_ADMIN_ROLE_NAME};
use crate::error::Result;
use crate::handle::StackId;
use crate::stack::Stack;
use crate::template::CfnOutput;
use serde_json::json;

/// EKS access for the existing administrators' role
pub struct AdminPolicyStack {
    pub id: StackId,
}

impl AdminPolicyStack {
    pub fn new(app: &mut App) -> Result<Self> {
        let mut stack = Stack::new("EksAdminPolicyStack", "IAM policy for EKS admin access");

        stack.add_resource(ADMIN_EKS_POLICY.resource(vec![json!(DEVOPS_ADMIN_ROLE_NAME)]))?;

        stack.add_output(
            CfnOutput::new("AdminEKSPolicyName", json!(ADMIN_EKS_POLICY.policy_name))
                .description("Name of the AdminRoleEKSClusterPolicy"),
        )?;
        stack.add_output(
            CfnOutput::new(
                "PolicyAttachedToRole",
                json!(format!(
                    "{} attached to {DEVOPS_ADMIN_ROLE_NAME}",
                    ADMIN_EKS_POLICY.policy_name
                )),
            )
            .description("Confirmation of policy attachment"),
        )?;

        let id = stack.id().clone();
        app.add(stack)?;

        Ok(AdminPolicyStack { id })
    }
}
