use super::network::NetworkStack;
use super::{ENVIRONMENT_TAG, SYSTEM_TAG};
use crate::app::App;
use crate::catalog::SecurityGroupRole;
use crate::error::Result;
use crate::handle::{Handle, StackId};
use crate::stack::Stack;
use crate::template::{get_att, join, reference, tags, CfnOutput, CfnResource};
use serde_json::json;

const LOAD_BALANCER_NAME: &str = "prod-eks-sre-hello-alb";
const TARGET_GROUP_NAME: &str = "prod-hello-tg";

const SECURITY_GROUP: &str = "AlbSecurityGroup";
const LOAD_BALANCER: &str = "ProdHelloAlb";
const TARGET_GROUP: &str = "ProdHelloTargetGroup";
const LISTENER: &str = "ProdHelloListener";

/// Internal application load balancer in front of the hello pods
pub struct AlbStack {
    pub id: StackId,
    pub dns_name: Handle,
    pub target_group_arn: Handle,
}

impl AlbStack {
    pub fn new(app: &mut App, network: &NetworkStack) -> Result<Self> {
        let mut stack = Stack::new(
            "EksAlbStack",
            "Internal load balancer for the hello application",
        );

        let vpc_id = stack.resolve(&network.vpc);
        let subnets = stack.resolve_all(&network.private_subnets);
        let security_group_id = get_att(SECURITY_GROUP, "GroupId");

        stack.add_resource(
            SecurityGroupRole::HelloAlb
                .policy()
                .resource(SECURITY_GROUP, vpc_id.clone()),
        )?;

        stack.add_resource(CfnResource {
            name: LOAD_BALANCER.into(),
            resource: json!({
                "Type": "AWS::ElasticLoadBalancingV2::LoadBalancer",
                "Properties": {
                    "IpAddressType": "ipv4",
                    "Name": LOAD_BALANCER_NAME,
                    "Scheme": "internal",
                    "SecurityGroups": [security_group_id],
                    "Subnets": subnets,
                    "Tags": tags(&[("Name", LOAD_BALANCER_NAME), ENVIRONMENT_TAG, SYSTEM_TAG]),
                    "Type": "application"
                }
            }),
        })?;

        // Pods register by IP, nodes are not targets
        stack.add_resource(CfnResource {
            name: TARGET_GROUP.into(),
            resource: json!({
                "Type": "AWS::ElasticLoadBalancingV2::TargetGroup",
                "Properties": {
                    "HealthCheckEnabled": true,
                    "HealthCheckIntervalSeconds": 30,
                    "HealthCheckPath": "/",
                    "HealthCheckProtocol": "HTTP",
                    "HealthCheckTimeoutSeconds": 5,
                    "HealthyThresholdCount": 2,
                    "Name": TARGET_GROUP_NAME,
                    "Port": 80,
                    "Protocol": "HTTP",
                    "Tags": tags(&[("Name", TARGET_GROUP_NAME), ENVIRONMENT_TAG]),
                    "TargetType": "ip",
                    "UnhealthyThresholdCount": 2,
                    "VpcId": vpc_id
                }
            }),
        })?;

        stack.add_resource(CfnResource {
            name: LISTENER.into(),
            resource: json!({
                "Type": "AWS::ElasticLoadBalancingV2::Listener",
                "Properties": {
                    "DefaultActions": [{
                        "TargetGroupArn": reference(TARGET_GROUP),
                        "Type": "forward"
                    }],
                    "LoadBalancerArn": reference(LOAD_BALANCER),
                    "Port": 80,
                    "Protocol": "HTTP"
                }
            }),
        })?;

        let dns_name = stack.handle(LOAD_BALANCER, Some("DNSName"));

        stack.add_output(
            CfnOutput::new("AlbArn", reference(LOAD_BALANCER))
                .description("ARN of the internal ALB"),
        )?;
        stack.add_output(
            CfnOutput::new("AlbDnsName", dns_name.local())
                .description("DNS name of the internal ALB"),
        )?;
        stack.add_output(
            CfnOutput::new("AlbSecurityGroupId", security_group_id)
                .description("Security Group ID for the ALB"),
        )?;
        stack.add_output(
            CfnOutput::new("TargetGroupArn", reference(TARGET_GROUP))
                .description("ARN of the target group"),
        )?;
        stack.add_output(
            CfnOutput::new(
                "CurlCommand",
                join("", vec![json!("curl http://"), dns_name.local()]),
            )
            .description("Command to test the ALB endpoint"),
        )?;

        let alb = AlbStack {
            id: stack.id().clone(),
            dns_name,
            target_group_arn: stack.handle(TARGET_GROUP, None),
        };

        app.add(stack)?;
        Ok(alb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EXPOSURE_METADATA_KEY;
    use pretty_assertions::assert_eq;

    #[test]
    fn load_balancer_is_internal_on_private_subnets() {
        let mut app = App::default();
        let network = NetworkStack::new(&mut app).unwrap();
        let alb = AlbStack::new(&mut app, &network).unwrap();

        let template = app.stacks()[1].template().to_json();
        let properties = &template["Resources"][LOAD_BALANCER]["Properties"];

        assert_eq!(properties["Scheme"], "internal");
        assert_eq!(
            properties["Subnets"][2],
            json!({"Fn::ImportValue": "EksVpcCdkStack:ExportsOutputRefPrivateSubnetC"})
        );
        assert_eq!(
            template["Resources"][SECURITY_GROUP]["Metadata"][EXPOSURE_METADATA_KEY],
            "internal"
        );
        assert_eq!(
            template["Outputs"]["CurlCommand"]["Value"],
            json!({"Fn::Join": ["", ["curl http://", {"Fn::GetAtt": ["ProdHelloAlb", "DNSName"]}]]})
        );

        let imported: Vec<_> = app.stacks()[1].imports().map(|h| h.stack.clone()).collect();
        assert!(imported.iter().all(|id| *id == network.id));
        assert_eq!(alb.dns_name.attribute.as_deref(), Some("DNSName"));
    }
}
