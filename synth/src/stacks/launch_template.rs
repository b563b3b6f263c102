use super::cluster::ClusterStack;
use super::{ENVIRONMENT_TAG, SYSTEM_TAG};
use crate::app::App;
use crate::error::Result;
use crate::handle::{Handle, StackId};
use crate::stack::Stack;
use crate::template::{reference, tags, CfnOutput, CfnResource};
use base64::Engine;
use serde_json::json;

pub const LAUNCH_TEMPLATE_NAME: &str = "prod-scheduler-v2-lt";
const KEY_PAIR: &str = "prod-eks-sre";
const INSTANCE_TYPE: &str = "t3a.xlarge";
const HOSTNAME_PREFIX: &str = "prod-eks-scheduler";

const LAUNCH_TEMPLATE: &str = "ProdSchedulerLaunchTemplate";

/// Boot script naming each instance after its launch time in milliseconds
///
/// Node groups with a launch template expect MIME multipart user data.
fn user_data() -> String {
    format!(
        r#"MIME-Version: 1.0
Content-Type: multipart/mixed; boundary="==BOUNDARY=="

--==BOUNDARY==
Content-Type: text/x-shellscript; charset="us-ascii"

#!/bin/bash
INSTANCE_ID=`curl -sL http://169.254.169.254/latest/meta-data/instance-id`
REGION=`curl -sL http://169.254.169.254/latest/meta-data/placement/region`
PREFIX="{HOSTNAME_PREFIX}"
TIMESTAMP=$(($(date +"%s%N")/1000000))
SET_HOSTNAME="$PREFIX-$TIMESTAMP"

aws ec2 create-tags --region $REGION --resources $INSTANCE_ID --tags "Key"="Name",Value="$SET_HOSTNAME"

--==BOUNDARY==--
"#
    )
}

/// Launch template shared by both node groups
pub struct LaunchTemplateStack {
    pub id: StackId,

    /// Consumers pair it with the `$Latest` version
    pub launch_template_id: Handle,
}

impl LaunchTemplateStack {
    pub fn new(app: &mut App, cluster: &ClusterStack) -> Result<Self> {
        let mut stack = Stack::new(
            "EksLaunchTemplateStack",
            "Launch template for EKS worker nodes",
        );

        let security_group_id = stack.resolve(&cluster.primary_security_group_id);
        let encoded = base64::engine::general_purpose::STANDARD.encode(user_data());

        stack.add_resource(CfnResource {
            name: LAUNCH_TEMPLATE.into(),
            resource: json!({
                "Type": "AWS::EC2::LaunchTemplate",
                "Properties": {
                    "LaunchTemplateData": {
                        "BlockDeviceMappings": [{
                            "DeviceName": "/dev/xvda",
                            "Ebs": {
                                "DeleteOnTermination": true,
                                "Iops": 3000,
                                "Throughput": 125,
                                "VolumeSize": 70,
                                "VolumeType": "gp3"
                            }
                        }],
                        "InstanceType": INSTANCE_TYPE,
                        "KeyName": KEY_PAIR,
                        "MetadataOptions": {
                            "HttpEndpoint": "enabled",
                            "InstanceMetadataTags": "enabled"
                        },
                        "NetworkInterfaces": [{
                            "DeviceIndex": 0,
                            "Groups": [security_group_id.clone()]
                        }],
                        "TagSpecifications": [{
                            "ResourceType": "instance",
                            "Tags": tags(&[
                                ENVIRONMENT_TAG,
                                SYSTEM_TAG,
                                ("Component", HOSTNAME_PREFIX),
                            ])
                        }],
                        "UserData": encoded
                    },
                    "LaunchTemplateName": LAUNCH_TEMPLATE_NAME
                }
            }),
        })?;

        stack.add_output(
            CfnOutput::new("LaunchTemplateId", reference(LAUNCH_TEMPLATE))
                .description("Launch Template ID for EKS node group"),
        )?;
        stack.add_output(
            CfnOutput::new("LaunchTemplateName", json!(LAUNCH_TEMPLATE_NAME))
                .description("Launch Template Name"),
        )?;
        stack.add_output(
            CfnOutput::new("UsedSecurityGroupId", security_group_id)
                .description("Primary security group ID from EKS cluster used in launch template"),
        )?;

        let launch_template = LaunchTemplateStack {
            id: stack.id().clone(),
            launch_template_id: stack.handle(LAUNCH_TEMPLATE, None),
        };

        app.add(stack)?;
        Ok(launch_template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::{ClusterRoleStack, NetworkStack};

    #[test]
    fn user_data_is_base64_multipart() {
        let mut app = App::default();
        let network = NetworkStack::new(&mut app).unwrap();
        ClusterRoleStack::new(&mut app).unwrap();
        let cluster = ClusterStack::new(&mut app, &network).unwrap();
        LaunchTemplateStack::new(&mut app, &cluster).unwrap();

        let template = app.stacks()[3].template();
        let data = &template.resource(LAUNCH_TEMPLATE).unwrap()["Properties"]["LaunchTemplateData"];

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(data["UserData"].as_str().unwrap())
            .unwrap();
        let script = String::from_utf8(decoded).unwrap();

        assert!(script.starts_with("MIME-Version: 1.0\n"));
        assert!(script.contains("PREFIX=\"prod-eks-scheduler\""));
        assert!(script.trim_end().ends_with("--==BOUNDARY==--"));

        assert_eq!(
            data["NetworkInterfaces"][0]["Groups"][0],
            json!({"Fn::ImportValue": "EksClusterStack:ExportsOutputFnGetAttProdSreEksClusterClusterSecurityGroupId"})
        );
    }
}
