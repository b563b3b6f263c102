use super::cluster::ClusterStack;
use super::launch_template::LaunchTemplateStack;
use super::network::NetworkStack;
use super::{ENVIRONMENT_TAG, SYSTEM_TAG};
use crate::app::App;
use crate::catalog::{SecurityGroupRole, WORKER_NODE_ROLE_NAME};
use crate::error::{Error, Result};
use crate::handle::{Handle, StackId};
use crate::stack::Stack;
use crate::template::{get_att, join, CfnOutput, CfnResource};
use serde_json::{json, Map, Value};

/// Node count bounds of a managed node group
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scaling {
    pub min: u32,
    pub desired: u32,
    pub max: u32,
}

impl Scaling {
    pub fn is_valid(&self) -> bool {
        self.min <= self.desired && self.desired <= self.max
    }
}

/// Optional outputs a node group publishes besides name, ARN and template
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtraOutput {
    ClusterName,
    PrivateSubnets,
    SecurityGroupId,
}

#[derive(Clone, Debug)]
pub struct NodeGroupSpec {
    pub stack_name: &'static str,
    pub description: &'static str,
    pub logical_id: &'static str,
    pub nodegroup_name: &'static str,
    pub component: &'static str,
    pub scaling: Scaling,

    /// Dedicated group created next to the node group
    pub security_group: Option<SecurityGroupRole>,
    pub outputs: &'static [ExtraOutput],
}

impl NodeGroupSpec {
    pub fn validate(&self) -> Result<()> {
        if self.scaling.is_valid() {
            return Ok(());
        }

        Err(Error::InvalidScaling {
            name: self.nodegroup_name.to_string(),
            min: self.scaling.min,
            desired: self.scaling.desired,
            max: self.scaling.max,
        })
    }
}

pub const SCHEDULER_NODE_GROUP: NodeGroupSpec = NodeGroupSpec {
    stack_name: "EksNodeGroupSchedulerStack",
    description: "EKS node group for scheduler workloads",
    logical_id: "ProdSchedulerNodeGroup",
    nodegroup_name: "prod-scheduler-v2",
    component: "prod-eks-scheduler",
    scaling: Scaling {
        min: 1,
        desired: 2,
        max: 2,
    },
    security_group: None,
    outputs: &[ExtraOutput::ClusterName, ExtraOutput::PrivateSubnets],
};

pub const HELLO_NODE_GROUP: NodeGroupSpec = NodeGroupSpec {
    stack_name: "EksNodeGroupHelloStack",
    description: "EKS node group for hello application",
    logical_id: "ProdHelloNodeGroup",
    nodegroup_name: "prod-hello-ng",
    component: "prod-eks-hello",
    scaling: Scaling {
        min: 1,
        desired: 1,
        max: 1,
    },
    // Created for the workload, not attached to the nodes
    security_group: Some(SecurityGroupRole::HelloNodeGroup),
    outputs: &[ExtraOutput::SecurityGroupId],
};

const SECURITY_GROUP: &str = "HelloNodeGroupSecurityGroup";

/// Managed node group on the private subnets, booted from the shared launch template
pub struct NodeGroupStack {
    pub id: StackId,
    pub nodegroup_arn: Handle,
    pub security_group_id: Option<Handle>,
}

impl NodeGroupStack {
    pub fn new(
        app: &mut App,
        spec: &NodeGroupSpec,
        network: &NetworkStack,
        cluster: &ClusterStack,
        launch_template: &LaunchTemplateStack,
    ) -> Result<Self> {
        spec.validate()?;

        let mut stack = Stack::new(spec.stack_name, spec.description);

        let security_group_id = match spec.security_group {
            Some(role) => {
                let vpc_id = stack.resolve(&network.vpc);
                stack.add_resource(role.policy().resource(SECURITY_GROUP, vpc_id))?;
                Some(stack.handle(SECURITY_GROUP, Some("GroupId")))
            }
            None => None,
        };

        let cluster_name = stack.resolve(&cluster.cluster_name);
        let node_role = stack.lookup(app.registry(), WORKER_NODE_ROLE_NAME)?;
        let subnets = stack.resolve_all(&network.private_subnets);
        let launch_template_id = stack.resolve(&launch_template.launch_template_id);

        let mut tags = Map::new();
        for (key, value) in [
            ENVIRONMENT_TAG,
            SYSTEM_TAG,
            ("Component", spec.component),
            ("NodeGroup", spec.nodegroup_name),
        ] {
            tags.insert(key.to_string(), json!(value));
        }

        stack.add_resource(CfnResource {
            name: spec.logical_id.into(),
            resource: json!({
                "Type": "AWS::EKS::Nodegroup",
                "Properties": {
                    "AmiType": "AL2023_x86_64_STANDARD",
                    "CapacityType": "ON_DEMAND",
                    "ClusterName": cluster_name,
                    "LaunchTemplate": {
                        "Id": launch_template_id,
                        "Version": "$Latest"
                    },
                    "NodeRole": node_role,
                    "NodegroupName": spec.nodegroup_name,
                    "ScalingConfig": {
                        "DesiredSize": spec.scaling.desired,
                        "MaxSize": spec.scaling.max,
                        "MinSize": spec.scaling.min
                    },
                    "Subnets": subnets,
                    "Tags": Value::Object(tags)
                }
            }),
        })?;

        stack.add_output(
            CfnOutput::new("NodeGroupName", json!(spec.nodegroup_name))
                .description(&format!("EKS Node Group Name for {}", spec.nodegroup_name)),
        )?;
        stack.add_output(
            CfnOutput::new("NodeGroupArn", get_att(spec.logical_id, "Arn"))
                .description(&format!("EKS Node Group ARN for {}", spec.nodegroup_name)),
        )?;
        stack.add_output(
            CfnOutput::new("UsedLaunchTemplateId", launch_template_id)
                .description("Launch Template ID used by this node group"),
        )?;

        for output in spec.outputs {
            let output = match output {
                ExtraOutput::ClusterName => {
                    CfnOutput::new("NodeGroupClusterName", cluster_name.clone())
                        .description("EKS Cluster Name associated with this node group")
                }
                ExtraOutput::PrivateSubnets => {
                    CfnOutput::new("UsedPrivateSubnets", join(",", subnets.clone()))
                        .description("Private subnet IDs used by this node group")
                }
                ExtraOutput::SecurityGroupId => {
                    let Some(handle) = &security_group_id else {
                        continue;
                    };

                    CfnOutput::new("HelloSecurityGroupId", handle.local()).description(&format!(
                        "Security Group ID for {} node group",
                        spec.nodegroup_name
                    ))
                }
            };

            stack.add_output(output)?;
        }

        let nodegroup = NodeGroupStack {
            id: stack.id().clone(),
            nodegroup_arn: stack.handle(spec.logical_id, Some("Arn")),
            security_group_id,
        };

        app.add(stack)?;
        Ok(nodegroup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::{ClusterRoleStack, NodeGroupRoleStack};
    use pretty_assertions::assert_eq;

    fn base() -> (App, NetworkStack, ClusterStack, LaunchTemplateStack) {
        let mut app = App::default();
        let network = NetworkStack::new(&mut app).unwrap();
        ClusterRoleStack::new(&mut app).unwrap();
        NodeGroupRoleStack::new(&mut app).unwrap();
        let cluster = ClusterStack::new(&mut app, &network).unwrap();
        let launch_template = LaunchTemplateStack::new(&mut app, &cluster).unwrap();

        (app, network, cluster, launch_template)
    }

    #[test]
    fn declared_node_groups_have_valid_scaling() {
        assert!(SCHEDULER_NODE_GROUP.validate().is_ok());
        assert!(HELLO_NODE_GROUP.validate().is_ok());
    }

    #[test]
    fn desired_above_max_is_rejected() {
        let (mut app, network, cluster, launch_template) = base();
        let spec = NodeGroupSpec {
            scaling: Scaling {
                min: 1,
                desired: 3,
                max: 2,
            },
            ..SCHEDULER_NODE_GROUP
        };

        let result = NodeGroupStack::new(&mut app, &spec, &network, &cluster, &launch_template);

        assert!(matches!(
            result,
            Err(Error::InvalidScaling { desired: 3, max: 2, .. })
        ));
    }

    #[test]
    fn desired_below_min_is_rejected() {
        let spec = NodeGroupSpec {
            scaling: Scaling {
                min: 2,
                desired: 1,
                max: 3,
            },
            ..HELLO_NODE_GROUP
        };

        assert!(spec.validate().is_err());
    }

    #[test]
    fn scheduler_uses_private_subnets_and_latest_template() {
        let (mut app, network, cluster, launch_template) = base();
        let nodegroup = NodeGroupStack::new(
            &mut app,
            &SCHEDULER_NODE_GROUP,
            &network,
            &cluster,
            &launch_template,
        )
        .unwrap();

        assert!(nodegroup.security_group_id.is_none());

        let template = app.stacks().last().unwrap().template().to_json();
        let properties = &template["Resources"]["ProdSchedulerNodeGroup"]["Properties"];

        assert_eq!(
            properties["Subnets"],
            json!([
                {"Fn::ImportValue": "EksVpcCdkStack:ExportsOutputRefPrivateSubnetA"},
                {"Fn::ImportValue": "EksVpcCdkStack:ExportsOutputRefPrivateSubnetB"},
                {"Fn::ImportValue": "EksVpcCdkStack:ExportsOutputRefPrivateSubnetC"}
            ])
        );
        assert_eq!(properties["LaunchTemplate"]["Version"], "$Latest");
        assert_eq!(
            properties["NodeRole"],
            json!({"Fn::Sub": "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/prod-sre-workernode-role"})
        );
        assert_eq!(
            properties["ScalingConfig"],
            json!({"DesiredSize": 2, "MaxSize": 2, "MinSize": 1})
        );
        assert_eq!(properties["Tags"]["Component"], "prod-eks-scheduler");
        assert!(template["Outputs"]["UsedPrivateSubnets"].is_object());
        assert!(template["Outputs"].get("HelloSecurityGroupId").is_none());
    }

    #[test]
    fn hello_gets_its_own_security_group() {
        let (mut app, network, cluster, launch_template) = base();
        let nodegroup = NodeGroupStack::new(
            &mut app,
            &HELLO_NODE_GROUP,
            &network,
            &cluster,
            &launch_template,
        )
        .unwrap();

        assert!(nodegroup.security_group_id.is_some());

        let template = app.stacks().last().unwrap().template().to_json();
        assert_eq!(
            template["Resources"][SECURITY_GROUP]["Properties"]["GroupName"],
            "prod-hello-ng-sg"
        );
        assert_eq!(
            template["Outputs"]["HelloSecurityGroupId"]["Value"],
            json!({"Fn::GetAtt": [SECURITY_GROUP, "GroupId"]})
        );
    }
}
