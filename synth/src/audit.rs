//! Structural checks over synthesized templates
//!
//! The audit reads templates rather than builder inputs, so it also covers
//! anything hand-edited into a stack.

use crate::assembly::Assembly;
use crate::catalog::{Exposure, EXPOSURE_METADATA_KEY, VPC_CIDR};
use crate::cidr::Cidr;
use crate::handle::StackId;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub stack: StackId,
    pub resource: String,
    pub message: String,
}

impl Finding {
    fn error(stack: &StackId, resource: &str, message: String) -> Self {
        Finding {
            severity: Severity::Error,
            stack: stack.clone(),
            resource: resource.to_string(),
            message,
        }
    }

    fn warning(stack: &StackId, resource: &str, message: String) -> Self {
        Finding {
            severity: Severity::Warning,
            ..Self::error(stack, resource, message)
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(
            f,
            "{severity}: {}/{}: {}",
            self.stack, self.resource, self.message
        )
    }
}

/// Resources of a given type across all stacks, in deployment order
fn resources_of<'a>(
    assembly: &'a Assembly,
    kind: &'a str,
) -> impl Iterator<Item = (&'a StackId, &'a String, &'a Value)> + 'a {
    assembly.stacks.iter().flat_map(move |stack| {
        stack.template["Resources"]
            .as_object()
            .into_iter()
            .flatten()
            .filter(move |(_, resource)| resource["Type"] == kind)
            .map(move |(name, resource)| (&stack.id, name, resource))
    })
}

/// VPC block declared in the assembly, the platform default otherwise
fn vpc_cidr(assembly: &Assembly) -> Cidr {
    resources_of(assembly, "AWS::EC2::VPC")
        .find_map(|(_, _, vpc)| {
            vpc["Properties"]["CidrBlock"]
                .as_str()?
                .parse::<Cidr>()
                .ok()
        })
        .or_else(|| VPC_CIDR.parse().ok())
        .unwrap_or(Cidr::ANY)
}

fn check_security_groups(assembly: &Assembly, vpc: &Cidr, findings: &mut Vec<Finding>) {
    for (stack, name, group) in resources_of(assembly, "AWS::EC2::SecurityGroup") {
        let exposure = group["Metadata"][EXPOSURE_METADATA_KEY]
            .as_str()
            .and_then(Exposure::parse)
            .unwrap_or(Exposure::Internal);

        let rules = group["Properties"]["SecurityGroupIngress"]
            .as_array()
            .into_iter()
            .flatten();

        for rule in rules {
            let Some(text) = rule["CidrIp"].as_str() else {
                continue;
            };

            let cidr = match text.parse::<Cidr>() {
                Ok(cidr) => cidr,
                Err(e) => {
                    findings.push(Finding::error(stack, name, e.to_string()));
                    continue;
                }
            };

            let port = match rule["FromPort"].as_u64() {
                Some(port) => format!("port {port}"),
                None => "all traffic".to_string(),
            };

            if cidr.is_any() {
                let message = format!("{port} is open to {cidr}");

                findings.push(match exposure {
                    Exposure::Internal => {
                        Finding::error(stack, name, format!("{message} on an internal group"))
                    }
                    Exposure::Public => Finding::warning(stack, name, message),
                });
            } else if !vpc.contains(&cidr) {
                findings.push(Finding::error(
                    stack,
                    name,
                    format!("{port} admits {cidr}, outside of the VPC {vpc}"),
                ));
            }
        }
    }
}

fn check_subnets(assembly: &Assembly, vpc: &Cidr, findings: &mut Vec<Finding>) {
    let mut subnets: Vec<(&StackId, &String, Cidr)> = Vec::new();

    for (stack, name, subnet) in resources_of(assembly, "AWS::EC2::Subnet") {
        let Some(text) = subnet["Properties"]["CidrBlock"].as_str() else {
            continue;
        };

        match text.parse::<Cidr>() {
            Ok(cidr) if !vpc.contains(&cidr) => findings.push(Finding::error(
                stack,
                name,
                format!("{cidr} is outside of the VPC {vpc}"),
            )),
            Ok(cidr) => subnets.push((stack, name, cidr)),
            Err(e) => findings.push(Finding::error(stack, name, e.to_string())),
        }
    }

    for (i, (stack, name, cidr)) in subnets.iter().enumerate() {
        for (_, other_name, other) in &subnets[i + 1..] {
            if cidr.overlaps(other) {
                findings.push(Finding::error(
                    stack,
                    name,
                    format!("{cidr} overlaps {other} of {other_name}"),
                ));
            }
        }
    }
}

fn check_scaling(assembly: &Assembly, findings: &mut Vec<Finding>) {
    for (stack, name, nodegroup) in resources_of(assembly, "AWS::EKS::Nodegroup") {
        let scaling = &nodegroup["Properties"]["ScalingConfig"];

        let (Some(min), Some(desired), Some(max)) = (
            scaling["MinSize"].as_u64(),
            scaling["DesiredSize"].as_u64(),
            scaling["MaxSize"].as_u64(),
        ) else {
            findings.push(Finding::error(
                stack,
                name,
                "Incomplete scaling configuration".into(),
            ));
            continue;
        };

        if !(min <= desired && desired <= max) {
            findings.push(Finding::error(
                stack,
                name,
                format!("Scaling min {min}, desired {desired}, max {max} is out of order"),
            ));
        }
    }
}

/// Run all checks, errors and warnings alike
pub fn check(assembly: &Assembly) -> Vec<Finding> {
    let vpc = vpc_cidr(assembly);
    let mut findings = Vec::new();

    check_security_groups(assembly, &vpc, &mut findings);
    check_subnets(assembly, &vpc, &mut findings);
    check_scaling(assembly, &mut findings);

    log::debug!("Audit produced {} findings", findings.len());
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::SynthesizedStack;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn assembly(resources: Value) -> Assembly {
        Assembly::new(
            vec![SynthesizedStack {
                id: StackId::new("Test"),
                description: String::new(),
                dependencies: vec![],
                template: json!({ "Resources": resources }),
            }],
            vec![vec![StackId::new("Test")]],
        )
    }

    fn group(exposure: &str, cidr: &str) -> Value {
        json!({
            "Type": "AWS::EC2::SecurityGroup",
            "Metadata": { EXPOSURE_METADATA_KEY: exposure },
            "Properties": {
                "SecurityGroupIngress": [{
                    "CidrIp": cidr,
                    "FromPort": 80,
                    "IpProtocol": "tcp",
                    "ToPort": 80
                }]
            }
        })
    }

    #[test]
    fn world_open_public_group_is_a_warning() {
        let findings = check(&assembly(json!({ "Sg": group("public", "0.0.0.0/0") })));

        assert_eq!(findings.len(), 1);
        assert!(!findings[0].is_error());
        assert_eq!(
            findings[0].to_string(),
            "warning: Test/Sg: port 80 is open to 0.0.0.0/0"
        );
    }

    #[test]
    fn world_open_internal_group_is_an_error() {
        let findings = check(&assembly(json!({ "Sg": group("internal", "0.0.0.0/0") })));

        assert_eq!(findings.len(), 1);
        assert!(findings[0].is_error());
    }

    #[test]
    fn ingress_outside_of_vpc_is_an_error() {
        let findings = check(&assembly(json!({
            "Vpc": {"Type": "AWS::EC2::VPC", "Properties": {"CidrBlock": "10.0.0.0/16"}},
            "Sg": group("internal", "192.168.0.0/16")
        })));

        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("outside of the VPC 10.0.0.0/16"));
    }

    #[test]
    fn overlapping_subnets_are_reported() {
        let subnet =
            |cidr: &str| json!({"Type": "AWS::EC2::Subnet", "Properties": {"CidrBlock": cidr}});
        let findings = check(&assembly(json!({
            "A": subnet("192.168.0.0/20"),
            "B": subnet("192.168.8.0/24"),
            "C": subnet("192.168.16.0/20"),
            "D": subnet("172.16.0.0/20")
        })));

        let messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "172.16.0.0/20 is outside of the VPC 192.168.0.0/16",
                "192.168.0.0/20 overlaps 192.168.8.0/24 of B",
            ]
        );
    }

    #[test]
    fn scaling_out_of_order_is_an_error() {
        let findings = check(&assembly(json!({
            "Ng": {
                "Type": "AWS::EKS::Nodegroup",
                "Properties": {"ScalingConfig": {"MinSize": 1, "DesiredSize": 3, "MaxSize": 2}}
            }
        })));

        assert_eq!(findings.len(), 1);
        assert!(findings[0].is_error());
    }
}
