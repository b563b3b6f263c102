use crate::template::{managed_policy_arn, sub, CfnResource};
use serde_json::{json, Value};

pub const CLUSTER_ROLE_NAME: &str = "prod-sre-eks-cluster-role";
pub const WORKER_NODE_ROLE_NAME: &str = "prod-sre-workernode-role";

/// Pre-existing role of the platform administrators, not managed here
pub const DEVOPS_ADMIN_ROLE_NAME: &str = "devops-admins";

#[derive(Clone, Debug)]
pub struct PolicyStatement {
    pub sid: Option<&'static str>,
    pub actions: &'static [&'static str],
    pub resources: &'static [&'static str],
}

impl PolicyStatement {
    fn to_json(&self) -> Value {
        let mut statement = json!({
            "Action": self.actions,
            "Effect": "Allow",
            "Resource": self.resources,
        });

        if let Some(sid) = self.sid {
            statement["Sid"] = json!(sid);
        }

        statement
    }
}

/// Named policy attached to roles as a standalone AWS::IAM::Policy
#[derive(Clone, Debug)]
pub struct InlinePolicy {
    pub logical_id: &'static str,
    pub policy_name: &'static str,
    pub statements: &'static [PolicyStatement],
}

impl InlinePolicy {
    /// Policy resource attached to `roles` (role names or Refs)
    pub fn resource(&self, roles: Vec<Value>) -> CfnResource {
        CfnResource {
            name: self.logical_id.to_string(),
            resource: json!({
                "Type": "AWS::IAM::Policy",
                "Properties": {
                    "PolicyDocument": {
                        "Statement": self
                            .statements
                            .iter()
                            .map(PolicyStatement::to_json)
                            .collect::<Vec<Value>>(),
                        "Version": "2012-10-17"
                    },
                    "PolicyName": self.policy_name,
                    "Roles": roles
                }
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RoleSpec {
    pub logical_id: &'static str,
    pub role_name: &'static str,
    pub service_principal: &'static str,
    pub managed_policies: &'static [&'static str],
    pub inline_policies: &'static [InlinePolicy],
}

impl RoleSpec {
    pub fn resource(&self) -> CfnResource {
        CfnResource {
            name: self.logical_id.to_string(),
            resource: json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Statement": [{
                            "Action": "sts:AssumeRole",
                            "Effect": "Allow",
                            "Principal": { "Service": self.service_principal }
                        }],
                        "Version": "2012-10-17"
                    },
                    "ManagedPolicyArns": self
                        .managed_policies
                        .iter()
                        .map(|name| managed_policy_arn(name))
                        .collect::<Vec<Value>>(),
                    "RoleName": self.role_name
                }
            }),
        }
    }

    /// Region-less role ARN built from the fixed role name
    ///
    /// EKS rejects role ARNs carrying a region, so this is used instead of the
    /// role's "Arn" attribute when other stacks need it.
    pub fn arn(&self) -> Value {
        sub(&format!(
            "arn:${{AWS::Partition}}:iam::${{AWS::AccountId}}:role/{}",
            self.role_name
        ))
    }
}

const GET_CLOUDWATCH_METRICS: InlinePolicy = InlinePolicy {
    logical_id: "GetCloudwatchMetricsPolicy",
    policy_name: "GetCloudwatchMetrics-for-EKS",
    statements: &[PolicyStatement {
        sid: None,
        actions: &["cloudwatch:GetMetricData", "cloudwatch:ListMetrics"],
        resources: &["*"],
    }],
};

pub const CLUSTER_ROLE: RoleSpec = RoleSpec {
    logical_id: "EksClusterRole",
    role_name: CLUSTER_ROLE_NAME,
    service_principal: "eks.amazonaws.com",
    managed_policies: &["AmazonEKSClusterPolicy", "AmazonEKSVPCResourceController"],
    inline_policies: &[GET_CLOUDWATCH_METRICS],
};

pub const WORKER_NODE_ROLE: RoleSpec = RoleSpec {
    logical_id: "EksNodeGroupRole",
    role_name: WORKER_NODE_ROLE_NAME,
    service_principal: "ec2.amazonaws.com",
    managed_policies: &[
        "AmazonEC2ContainerRegistryReadOnly",
        "AmazonEKS_CNI_Policy",
        "AmazonEKSWorkerNodePolicy",
        "AmazonSSMManagedInstanceCore",
        "AmazonSSMPatchAssociation",
    ],
    inline_policies: &[
        InlinePolicy {
            logical_id: "AllowWAFpolicy",
            policy_name: "AllowWAF",
            statements: &[PolicyStatement {
                sid: None,
                actions: &[
                    "wafv2:AssociateWebACL",
                    "wafv2:DisassociateWebACL",
                    "wafv2:GetWebACL",
                ],
                resources: &["*"],
            }],
        },
        InlinePolicy {
            logical_id: "EC2TagsPolicy",
            policy_name: "EC2Tags",
            statements: &[PolicyStatement {
                sid: None,
                actions: &["ec2:DescribeInstances", "ec2:CreateTags", "ec2:DescribeTags"],
                resources: &["*"],
            }],
        },
        GET_CLOUDWATCH_METRICS,
    ],
};

/// Full EKS access for the administrators' role
pub const ADMIN_EKS_POLICY: InlinePolicy = InlinePolicy {
    logical_id: "AdminRoleEKSClusterPolicy",
    policy_name: "AdminRoleEKSClusterPolicy",
    statements: &[PolicyStatement {
        sid: Some("EKSAdminAccessPolicy2"),
        actions: &["eks:*"],
        resources: &["*"],
    }],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_arn_has_no_region() {
        assert_eq!(
            CLUSTER_ROLE.arn(),
            json!({"Fn::Sub": "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/prod-sre-eks-cluster-role"})
        );
    }

    #[test]
    fn role_trusts_its_service() {
        let role = WORKER_NODE_ROLE.resource();
        let properties = &role.resource["Properties"];

        assert_eq!(properties["RoleName"], "prod-sre-workernode-role");
        assert_eq!(
            properties["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "ec2.amazonaws.com"
        );
        assert_eq!(properties["ManagedPolicyArns"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn statement_sid_is_optional() {
        let admin = ADMIN_EKS_POLICY.resource(vec![json!(DEVOPS_ADMIN_ROLE_NAME)]);
        let statement = &admin.resource["Properties"]["PolicyDocument"]["Statement"][0];

        assert_eq!(statement["Sid"], "EKSAdminAccessPolicy2");
        assert_eq!(statement["Action"], json!(["eks:*"]));
        assert_eq!(admin.resource["Properties"]["Roles"], json!(["devops-admins"]));
    }
}
