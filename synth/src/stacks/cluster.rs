use super::network::NetworkStack;
use crate::app::App;
use crate::catalog::{SecurityGroupRole, CLUSTER_ROLE_NAME};
use crate::error::Result;
use crate::handle::{Handle, StackId};
use crate::stack::Stack;
use crate::template::{CfnOutput, CfnResource};
use serde_json::json;

pub const CLUSTER_NAME: &str = "prod-eks-sre-cluster";
pub const KUBERNETES_VERSION: &str = "1.33";
const SERVICE_CIDR: &str = "10.100.0.0/16";

const CLUSTER: &str = "ProdSreEksCluster";
const SECURITY_GROUP: &str = "EksClusterSecurityGroup";

/// EKS control plane attached to all six subnets
pub struct ClusterStack {
    pub id: StackId,

    /// `Ref` of an EKS cluster resolves to its name
    pub cluster_name: Handle,
    pub cluster_arn: Handle,

    /// Group EKS creates for the control plane and managed nodes
    pub primary_security_group_id: Handle,
    pub additional_security_group_id: Handle,
}

impl ClusterStack {
    pub fn new(app: &mut App, network: &NetworkStack) -> Result<Self> {
        let mut stack = Stack::new("EksClusterStack", "EKS cluster configuration");

        let vpc_id = stack.resolve(&network.vpc);
        stack.add_resource(
            SecurityGroupRole::ClusterControlPlane
                .policy()
                .resource(SECURITY_GROUP, vpc_id),
        )?;

        let role_arn = stack.lookup(app.registry(), CLUSTER_ROLE_NAME)?;
        let subnet_ids = stack.resolve_all(&network.all_subnets());
        let additional_security_group_id = stack.handle(SECURITY_GROUP, Some("GroupId"));

        stack.add_resource(CfnResource {
            name: CLUSTER.into(),
            resource: json!({
                "Type": "AWS::EKS::Cluster",
                "Properties": {
                    "KubernetesNetworkConfig": {
                        "IpFamily": "ipv4",
                        "ServiceIpv4Cidr": SERVICE_CIDR
                    },
                    "Name": CLUSTER_NAME,
                    "ResourcesVpcConfig": {
                        "EndpointPrivateAccess": true,
                        "EndpointPublicAccess": true,
                        "PublicAccessCidrs": ["0.0.0.0/0"],
                        "SecurityGroupIds": [additional_security_group_id.local()],
                        "SubnetIds": subnet_ids
                    },
                    "RoleArn": role_arn,
                    "Version": KUBERNETES_VERSION
                }
            }),
        })?;

        let cluster = ClusterStack {
            id: stack.id().clone(),
            cluster_name: stack.handle(CLUSTER, None),
            cluster_arn: stack.handle(CLUSTER, Some("Arn")),
            primary_security_group_id: stack.handle(CLUSTER, Some("ClusterSecurityGroupId")),
            additional_security_group_id,
        };

        stack.add_output(CfnOutput::new("EksClusterName", cluster.cluster_name.local()))?;
        stack.add_output(CfnOutput::new("EksClusterArn", cluster.cluster_arn.local()))?;
        stack.add_output(
            CfnOutput::new(
                "EksClusterPrimarySecurityGroup",
                cluster.primary_security_group_id.local(),
            )
            .description("Primary security group automatically created by EKS for the cluster"),
        )?;
        stack.add_output(
            CfnOutput::new(
                "EksClusterAdditionalSecurityGroup",
                cluster.additional_security_group_id.local(),
            )
            .description("Additional security group attached to the cluster"),
        )?;

        app.add(stack)?;
        Ok(cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::stacks::ClusterRoleStack;
    use pretty_assertions::assert_eq;

    #[test]
    fn cluster_needs_the_registered_role() {
        let mut app = App::default();
        let network = NetworkStack::new(&mut app).unwrap();

        assert!(matches!(
            ClusterStack::new(&mut app, &network),
            Err(Error::MissingRegistration { name, .. }) if name == CLUSTER_ROLE_NAME
        ));
    }

    #[test]
    fn cluster_imports_network_and_looks_up_role() {
        let mut app = App::default();
        let network = NetworkStack::new(&mut app).unwrap();
        let role = ClusterRoleStack::new(&mut app).unwrap();
        let cluster = ClusterStack::new(&mut app, &network).unwrap();

        let graph = app.graph().unwrap();
        assert_eq!(
            graph.dependencies_of(&cluster.id).unwrap(),
            vec![network.id.clone(), role.id.clone()]
        );

        let template = app.stacks()[2].template().to_json();
        let config = &template["Resources"][CLUSTER]["Properties"]["ResourcesVpcConfig"];

        assert_eq!(config["SubnetIds"].as_array().unwrap().len(), 6);
        assert_eq!(
            config["SubnetIds"][0],
            json!({"Fn::ImportValue": "EksVpcCdkStack:ExportsOutputRefPublicSubnetA"})
        );
        assert_eq!(
            config["SecurityGroupIds"],
            json!([{"Fn::GetAtt": ["EksClusterSecurityGroup", "GroupId"]}])
        );
    }
}
