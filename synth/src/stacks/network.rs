use crate::app::App;
use crate::catalog::VPC_CIDR;
use crate::error::Result;
use crate::handle::{Handle, StackId};
use crate::stack::Stack;
use crate::template::{get_att, reference, tags, CfnOutput, CfnResource};
use serde_json::json;

pub const STACK_NAME: &str = "EksVpcCdkStack";

#[derive(Clone, Copy, Debug)]
pub struct SubnetSpec {
    pub logical_id: &'static str,
    pub cidr: &'static str,

    /// Index into the environment's availability zones
    pub zone: usize,
    pub public: bool,
}

/// Six /20 blocks, one public and one private per zone
pub const SUBNETS: [SubnetSpec; 6] = [
    SubnetSpec { logical_id: "PublicSubnetA", cidr: "192.168.0.0/20", zone: 0, public: true },
    SubnetSpec { logical_id: "PublicSubnetB", cidr: "192.168.16.0/20", zone: 1, public: true },
    SubnetSpec { logical_id: "PublicSubnetC", cidr: "192.168.32.0/20", zone: 2, public: true },
    SubnetSpec { logical_id: "PrivateSubnetA", cidr: "192.168.48.0/20", zone: 0, public: false },
    SubnetSpec { logical_id: "PrivateSubnetB", cidr: "192.168.64.0/20", zone: 1, public: false },
    SubnetSpec { logical_id: "PrivateSubnetC", cidr: "192.168.80.0/20", zone: 2, public: false },
];

const VPC: &str = "EksVpc";
const INTERNET_GATEWAY: &str = "InternetGateway";
const GATEWAY_ATTACHMENT: &str = "VpcIgwAttachment";
const PUBLIC_ROUTE_TABLE: &str = "PublicRouteTable";
const PRIVATE_ROUTE_TABLE: &str = "PrivateRouteTable";
const NAT_EIP: &str = "NatEip";
const NAT_GATEWAY: &str = "NatGateway";

/// VPC with public and private subnets across three zones
///
/// Public subnets route through the internet gateway, private ones through a
/// single NAT gateway placed in the first public subnet.
pub struct NetworkStack {
    pub id: StackId,
    pub vpc: Handle,
    pub public_subnets: Vec<Handle>,
    pub private_subnets: Vec<Handle>,
}

impl NetworkStack {
    pub fn new(app: &mut App) -> Result<Self> {
        let mut stack = Stack::new(STACK_NAME, "VPC infrastructure for EKS cluster");
        let zones = app.environment().availability_zones();

        stack.add_resource(CfnResource {
            name: VPC.into(),
            resource: json!({
                "Type": "AWS::EC2::VPC",
                "Properties": {
                    "CidrBlock": VPC_CIDR,
                    // Required by the private endpoint of the cluster
                    "EnableDnsHostnames": true,
                    "EnableDnsSupport": true,
                    "Tags": tags(&[("Name", "eks-vpc")])
                }
            }),
        })?;

        stack.add_resource(CfnResource {
            name: INTERNET_GATEWAY.into(),
            resource: json!({
                "Type": "AWS::EC2::InternetGateway",
                "Properties": { "Tags": tags(&[("Name", "eks-igw")]) }
            }),
        })?;

        stack.add_resource(CfnResource {
            name: GATEWAY_ATTACHMENT.into(),
            resource: json!({
                "Type": "AWS::EC2::VPCGatewayAttachment",
                "Properties": {
                    "InternetGatewayId": reference(INTERNET_GATEWAY),
                    "VpcId": reference(VPC)
                }
            }),
        })?;

        for subnet in &SUBNETS {
            let zone = &zones[subnet.zone];
            let visibility = if subnet.public { "public" } else { "private" };
            let name = format!("prod-eks-subnet-{visibility}-{zone}");

            stack.add_resource(CfnResource {
                name: subnet.logical_id.into(),
                resource: json!({
                    "Type": "AWS::EC2::Subnet",
                    "Properties": {
                        "AvailabilityZone": zone,
                        "CidrBlock": subnet.cidr,
                        "MapPublicIpOnLaunch": subnet.public,
                        "Tags": tags(&[("Name", name.as_str())]),
                        "VpcId": reference(VPC)
                    }
                }),
            })?;
        }

        stack.add_resource(route_table(PUBLIC_ROUTE_TABLE, "eks-public-rt"))?;

        stack.add_resource(CfnResource {
            name: "PublicDefaultRoute".into(),
            resource: json!({
                "Type": "AWS::EC2::Route",
                // The gateway is only usable once attached
                "DependsOn": GATEWAY_ATTACHMENT,
                "Properties": {
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "GatewayId": reference(INTERNET_GATEWAY),
                    "RouteTableId": reference(PUBLIC_ROUTE_TABLE)
                }
            }),
        })?;

        stack.add_resource(CfnResource {
            name: NAT_EIP.into(),
            resource: json!({
                "Type": "AWS::EC2::EIP",
                "Properties": { "Domain": "vpc" }
            }),
        })?;

        // Single NAT gateway in the first public subnet
        let nat_subnet = SUBNETS[0].logical_id;

        stack.add_resource(CfnResource {
            name: NAT_GATEWAY.into(),
            resource: json!({
                "Type": "AWS::EC2::NatGateway",
                "Properties": {
                    "AllocationId": get_att(NAT_EIP, "AllocationId"),
                    "SubnetId": reference(nat_subnet),
                    "Tags": tags(&[("Name", "eks-natgw")])
                }
            }),
        })?;

        stack.add_resource(route_table(PRIVATE_ROUTE_TABLE, "eks-private-rt"))?;

        stack.add_resource(CfnResource {
            name: "PrivateDefaultRoute".into(),
            resource: json!({
                "Type": "AWS::EC2::Route",
                "Properties": {
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "NatGatewayId": reference(NAT_GATEWAY),
                    "RouteTableId": reference(PRIVATE_ROUTE_TABLE)
                }
            }),
        })?;

        for subnet in &SUBNETS {
            let table = if subnet.public {
                PUBLIC_ROUTE_TABLE
            } else {
                PRIVATE_ROUTE_TABLE
            };

            stack.add_resource(CfnResource {
                name: format!("{}Assoc", subnet.logical_id),
                resource: json!({
                    "Type": "AWS::EC2::SubnetRouteTableAssociation",
                    "Properties": {
                        "RouteTableId": reference(table),
                        "SubnetId": reference(subnet.logical_id)
                    }
                }),
            })?;
        }

        stack.add_output(CfnOutput::new("VpcId", reference(VPC)))?;
        stack.add_output(CfnOutput::new("VpcCidr", json!(VPC_CIDR)))?;

        let handles = |public: bool| -> Vec<Handle> {
            SUBNETS
                .iter()
                .filter(|s| s.public == public)
                .map(|s| stack.handle(s.logical_id, None))
                .collect()
        };

        let network = NetworkStack {
            id: stack.id().clone(),
            vpc: stack.handle(VPC, None),
            public_subnets: handles(true),
            private_subnets: handles(false),
        };

        app.add(stack)?;
        Ok(network)
    }

    /// Public subnets first, then private ones
    pub fn all_subnets(&self) -> Vec<Handle> {
        self.public_subnets
            .iter()
            .chain(&self.private_subnets)
            .cloned()
            .collect()
    }
}

fn route_table(logical_id: &str, name: &str) -> CfnResource {
    CfnResource {
        name: logical_id.into(),
        resource: json!({
            "Type": "AWS::EC2::RouteTable",
            "Properties": {
                "Tags": tags(&[("Name", name)]),
                "VpcId": reference(VPC)
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cidr::Cidr;
    use crate::environment::Environment;

    #[test]
    fn subnets_are_disjoint_blocks_of_the_vpc() {
        let vpc: Cidr = VPC_CIDR.parse().unwrap();
        let blocks: Vec<Cidr> = SUBNETS.iter().map(|s| s.cidr.parse().unwrap()).collect();

        for (i, block) in blocks.iter().enumerate() {
            assert!(vpc.contains(block));

            for other in &blocks[i + 1..] {
                assert!(!block.overlaps(other), "{block} overlaps {other}");
            }
        }
    }

    #[test]
    fn subnets_follow_the_region() {
        let mut app = App::new(Environment::new(None, "eu-west-1"));
        let network = NetworkStack::new(&mut app).unwrap();

        assert_eq!(network.public_subnets.len(), 3);
        assert_eq!(network.private_subnets.len(), 3);

        let template = app.stacks()[0].template();
        let subnet = template.resource("PrivateSubnetB").unwrap();
        assert_eq!(subnet["Properties"]["AvailabilityZone"], "eu-west-1b");
        assert_eq!(
            subnet["Properties"]["Tags"][0]["Value"],
            "prod-eks-subnet-private-eu-west-1b"
        );
        assert_eq!(
            template.resource("PrivateSubnetBAssoc").unwrap()["Properties"]["RouteTableId"],
            json!({"Ref": "PrivateRouteTable"})
        );
    }
}
