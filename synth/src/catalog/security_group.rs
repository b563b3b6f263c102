use crate::template::CfnResource;
use serde_json::{json, Value};

/// Metadata key recording the intended exposure of a security group
pub const EXPOSURE_METADATA_KEY: &str = "eks-stacks:exposure";

/// Network-facing resource owning a dedicated security group
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityGroupRole {
    ClusterControlPlane,
    HelloNodeGroup,
    HelloAlb,
}

/// Whether a group may accept traffic from outside the VPC
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exposure {
    Internal,
    Public,
}

impl Exposure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exposure::Internal => "internal",
            Exposure::Public => "public",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "internal" => Some(Exposure::Internal),
            "public" => Some(Exposure::Public),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp(u16),
    All,
}

#[derive(Clone, Debug)]
pub struct IngressRule {
    pub cidr: &'static str,
    pub protocol: Protocol,
    pub description: &'static str,
}

impl IngressRule {
    fn to_json(&self) -> Value {
        match self.protocol {
            Protocol::Tcp(port) => json!({
                "CidrIp": self.cidr,
                "Description": self.description,
                "FromPort": port,
                "IpProtocol": "tcp",
                "ToPort": port
            }),
            Protocol::All => json!({
                "CidrIp": self.cidr,
                "Description": self.description,
                "IpProtocol": "-1"
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SecurityGroupPolicy {
    pub role: SecurityGroupRole,
    pub group_name: &'static str,
    pub description: &'static str,
    pub exposure: Exposure,
    pub ingress: &'static [IngressRule],
}

// 80 and 3306 open to the world do not match the internal posture of the
// other groups. Kept as declared, the audit reports it as a warning.
const CLUSTER_CONTROL_PLANE: SecurityGroupPolicy = SecurityGroupPolicy {
    role: SecurityGroupRole::ClusterControlPlane,
    group_name: "prod-sre-cluster-sg",
    description: "Security group for EKS cluster control plane",
    exposure: Exposure::Public,
    ingress: &[
        IngressRule {
            cidr: "0.0.0.0/0",
            protocol: Protocol::Tcp(80),
            description: "Allow HTTP access to cluster",
        },
        IngressRule {
            cidr: "0.0.0.0/0",
            protocol: Protocol::Tcp(3306),
            description: "Allow MySQL access to cluster",
        },
    ],
};

const HELLO_NODE_GROUP: SecurityGroupPolicy = SecurityGroupPolicy {
    role: SecurityGroupRole::HelloNodeGroup,
    group_name: "prod-hello-ng-sg",
    description: "Security group for prod-hello node group",
    exposure: Exposure::Internal,
    ingress: &[
        IngressRule {
            cidr: super::VPC_CIDR,
            protocol: Protocol::Tcp(80),
            description: "Allow HTTP from VPC",
        },
        IngressRule {
            cidr: super::VPC_CIDR,
            protocol: Protocol::All,
            description: "Allow all traffic from VPC",
        },
    ],
};

const HELLO_ALB: SecurityGroupPolicy = SecurityGroupPolicy {
    role: SecurityGroupRole::HelloAlb,
    group_name: "prod-eks-sre-hello-alb-sg",
    description: "Security group for prod-eks-sre-hello internal ALB",
    exposure: Exposure::Internal,
    ingress: &[IngressRule {
        cidr: super::VPC_CIDR,
        protocol: Protocol::Tcp(80),
        description: "Allow HTTP from VPC",
    }],
};

pub const SECURITY_GROUPS: [&SecurityGroupPolicy; 3] =
    [&CLUSTER_CONTROL_PLANE, &HELLO_NODE_GROUP, &HELLO_ALB];

impl SecurityGroupRole {
    pub fn policy(self) -> &'static SecurityGroupPolicy {
        match self {
            SecurityGroupRole::ClusterControlPlane => &CLUSTER_CONTROL_PLANE,
            SecurityGroupRole::HelloNodeGroup => &HELLO_NODE_GROUP,
            SecurityGroupRole::HelloAlb => &HELLO_ALB,
        }
    }
}

impl SecurityGroupPolicy {
    /// Security group with the policy's ingress rules and unrestricted egress
    pub fn resource(&self, logical_id: &str, vpc_id: Value) -> CfnResource {
        CfnResource {
            name: logical_id.to_string(),
            resource: json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Metadata": { EXPOSURE_METADATA_KEY: self.exposure.as_str() },
                "Properties": {
                    "GroupDescription": self.description,
                    "GroupName": self.group_name,
                    "SecurityGroupEgress": [{
                        "CidrIp": "0.0.0.0/0",
                        "Description": "Allow all outbound traffic by default",
                        "IpProtocol": "-1"
                    }],
                    "SecurityGroupIngress": self
                        .ingress
                        .iter()
                        .map(IngressRule::to_json)
                        .collect::<Vec<Value>>(),
                    "VpcId": vpc_id
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VPC_CIDR;
    use crate::cidr::Cidr;

    #[test]
    fn internal_groups_only_admit_vpc_traffic() {
        let vpc: Cidr = VPC_CIDR.parse().unwrap();

        for policy in SECURITY_GROUPS {
            for rule in policy.ingress {
                let cidr: Cidr = rule.cidr.parse().unwrap();
                assert!(cidr.is_any() || vpc.contains(&cidr), "{}", policy.group_name);

                if policy.exposure == Exposure::Internal {
                    assert!(!cidr.is_any(), "{} is open to the world", policy.group_name);
                }
            }
        }
    }

    #[test]
    fn roles_map_to_their_own_group() {
        for policy in SECURITY_GROUPS {
            assert_eq!(policy.role.policy().group_name, policy.group_name);
        }
    }

    #[test]
    fn all_traffic_rule_has_no_ports() {
        let resource = SecurityGroupRole::HelloNodeGroup
            .policy()
            .resource("HelloNodeGroupSecurityGroup", json!("vpc-1"));

        let ingress = &resource.resource["Properties"]["SecurityGroupIngress"];
        assert_eq!(ingress[1]["IpProtocol"], "-1");
        assert!(ingress[1].get("FromPort").is_none());
        assert_eq!(resource.resource["Metadata"][EXPOSURE_METADATA_KEY], "internal");
    }
}
