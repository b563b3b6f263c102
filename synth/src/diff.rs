//! Comparison of two versions of a stack template
//!
//! Knows which properties force CloudFormation to replace a resource, so a
//! diff can warn about downtime before anything is deployed.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Remove,
    Update,

    /// The resource is deleted and created anew
    Replace,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
            ChangeKind::Update => "update",
            ChangeKind::Replace => "replace",
        };

        f.write_str(text)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChange {
    pub logical_id: String,
    pub resource_type: String,
    pub kind: ChangeKind,

    /// Top level properties that differ
    pub properties: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputChange {
    pub name: String,
    pub kind: ChangeKind,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TemplateDiff {
    pub resources: Vec<ResourceChange>,
    pub outputs: Vec<OutputChange>,

    /// Other top level keys that differ, such as Description
    pub other: Vec<String>,
}

impl TemplateDiff {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.outputs.is_empty() && self.other.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len() + self.outputs.len() + self.other.len()
    }

    pub fn replacements(&self) -> impl Iterator<Item = &ResourceChange> {
        self.resources
            .iter()
            .filter(|c| c.kind == ChangeKind::Replace)
    }

    pub fn has_replacements(&self) -> bool {
        self.replacements().next().is_some()
    }
}

/// Properties whose change replaces the resource, per resource type
const IMMUTABLE_PROPERTIES: &[(&str, &[&str])] = &[
    ("AWS::EC2::VPC", &["CidrBlock"]),
    ("AWS::EC2::Subnet", &["AvailabilityZone", "CidrBlock", "VpcId"]),
    ("AWS::EC2::SecurityGroup", &["GroupDescription", "GroupName", "VpcId"]),
    ("AWS::EC2::EIP", &["Domain"]),
    ("AWS::EC2::NatGateway", &["AllocationId", "SubnetId"]),
    ("AWS::EC2::RouteTable", &["VpcId"]),
    ("AWS::EC2::Route", &["DestinationCidrBlock", "RouteTableId"]),
    ("AWS::EC2::SubnetRouteTableAssociation", &["SubnetId"]),
    ("AWS::EC2::LaunchTemplate", &["LaunchTemplateName"]),
    ("AWS::IAM::Role", &["Path", "RoleName"]),
    ("AWS::EKS::Cluster", &["KubernetesNetworkConfig", "Name", "RoleArn"]),
    (
        "AWS::EKS::Nodegroup",
        &["AmiType", "CapacityType", "ClusterName", "NodeRole", "NodegroupName", "Subnets"],
    ),
    ("AWS::ElasticLoadBalancingV2::LoadBalancer", &["Name", "Scheme", "Type"]),
    (
        "AWS::ElasticLoadBalancingV2::TargetGroup",
        &["Name", "Port", "Protocol", "TargetType", "VpcId"],
    ),
    ("AWS::ElasticLoadBalancingV2::Listener", &["LoadBalancerArn"]),
];

pub fn immutable_properties(resource_type: &str) -> &'static [&'static str] {
    IMMUTABLE_PROPERTIES
        .iter()
        .find(|(kind, _)| *kind == resource_type)
        .map(|(_, properties)| *properties)
        .unwrap_or(&[])
}

fn section<'a>(template: &'a Value, name: &str) -> Option<&'a Map<String, Value>> {
    template.get(name).and_then(Value::as_object)
}

fn resource_type(resource: &Value) -> String {
    resource["Type"].as_str().unwrap_or_default().to_string()
}

fn changed_keys(old: &Value, new: &Value) -> Vec<String> {
    let empty = Map::new();
    let old = old.as_object().unwrap_or(&empty);
    let new = new.as_object().unwrap_or(&empty);

    old.keys()
        .chain(new.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|key| old.get(key.as_str()) != new.get(key.as_str()))
        .cloned()
        .collect()
}

fn compare_resource(logical_id: &str, old: &Value, new: &Value) -> Option<ResourceChange> {
    if old == new {
        return None;
    }

    let old_type = resource_type(old);
    let new_type = resource_type(new);
    let properties = changed_keys(&old["Properties"], &new["Properties"]);

    let kind = if old_type != new_type
        || properties
            .iter()
            .any(|p| immutable_properties(&new_type).contains(&p.as_str()))
    {
        ChangeKind::Replace
    } else {
        ChangeKind::Update
    };

    Some(ResourceChange {
        logical_id: logical_id.to_string(),
        resource_type: new_type,
        kind,
        properties,
    })
}

/// Changes turning `old` into `new`
///
/// Either side may be `Value::Null` for a stack that does not exist.
pub fn diff(old: &Value, new: &Value) -> TemplateDiff {
    let empty = Map::new();
    let mut result = TemplateDiff::default();

    let old_resources = section(old, "Resources").unwrap_or(&empty);
    let new_resources = section(new, "Resources").unwrap_or(&empty);

    for (id, resource) in old_resources {
        match new_resources.get(id) {
            Some(updated) => result.resources.extend(compare_resource(id, resource, updated)),
            None => result.resources.push(ResourceChange {
                logical_id: id.clone(),
                resource_type: resource_type(resource),
                kind: ChangeKind::Remove,
                properties: vec![],
            }),
        }
    }

    for (id, resource) in new_resources {
        if !old_resources.contains_key(id) {
            result.resources.push(ResourceChange {
                logical_id: id.clone(),
                resource_type: resource_type(resource),
                kind: ChangeKind::Add,
                properties: vec![],
            });
        }
    }

    let old_outputs = section(old, "Outputs").unwrap_or(&empty);
    let new_outputs = section(new, "Outputs").unwrap_or(&empty);

    for name in old_outputs.keys().chain(new_outputs.keys()).collect::<BTreeSet<_>>() {
        let kind = match (old_outputs.get(name), new_outputs.get(name)) {
            (Some(a), Some(b)) if a == b => continue,
            (Some(_), Some(_)) => ChangeKind::Update,
            (Some(_), None) => ChangeKind::Remove,
            (None, _) => ChangeKind::Add,
        };

        result.outputs.push(OutputChange {
            name: name.clone(),
            kind,
        });
    }

    // Everything is new in a stack that does not exist
    if old.is_object() {
        result.other = changed_keys(old, new)
            .into_iter()
            .filter(|key| key != "Resources" && key != "Outputs")
            .collect();
    }

    result.resources.sort_by(|a, b| a.logical_id.cmp(&b.logical_id));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn subnet(cidr: &str, tag: &str) -> Value {
        json!({
            "Type": "AWS::EC2::Subnet",
            "Properties": {"CidrBlock": cidr, "Tags": [{"Key": "Name", "Value": tag}]}
        })
    }

    #[test]
    fn identical_templates_have_no_changes() {
        let template = json!({"Resources": {"A": subnet("10.0.0.0/24", "a")}});
        assert!(diff(&template, &template).is_empty());
    }

    #[test]
    fn tag_change_is_an_update_and_cidr_change_a_replacement() {
        let old = json!({"Resources": {
            "A": subnet("10.0.0.0/24", "a"),
            "B": subnet("10.0.1.0/24", "b")
        }});
        let new = json!({"Resources": {
            "A": subnet("10.0.0.0/24", "renamed"),
            "B": subnet("10.0.2.0/24", "b")
        }});

        let changes = diff(&old, &new);

        assert_eq!(
            changes.resources,
            vec![
                ResourceChange {
                    logical_id: "A".into(),
                    resource_type: "AWS::EC2::Subnet".into(),
                    kind: ChangeKind::Update,
                    properties: vec!["Tags".into()],
                },
                ResourceChange {
                    logical_id: "B".into(),
                    resource_type: "AWS::EC2::Subnet".into(),
                    kind: ChangeKind::Replace,
                    properties: vec!["CidrBlock".into()],
                },
            ]
        );
        assert_eq!(changes.replacements().count(), 1);
    }

    #[test]
    fn missing_stack_shows_everything_as_added() {
        let new = json!({
            "Resources": {"A": subnet("10.0.0.0/24", "a")},
            "Outputs": {"SubnetId": {"Value": {"Ref": "A"}}}
        });

        let changes = diff(&Value::Null, &new);

        assert_eq!(changes.resources[0].kind, ChangeKind::Add);
        assert_eq!(
            changes.outputs,
            vec![OutputChange {
                name: "SubnetId".into(),
                kind: ChangeKind::Add
            }]
        );
        assert!(!changes.has_replacements());
        assert!(changes.other.is_empty());
    }

    #[test]
    fn description_change_is_a_change() {
        let resources = json!({"A": subnet("10.0.0.0/24", "a")});
        let old = json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": "Network",
            "Resources": resources
        });
        let new = json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": "Network of the EKS cluster",
            "Resources": resources
        });

        let changes = diff(&old, &new);

        assert!(!changes.is_empty());
        assert!(changes.resources.is_empty());
        assert_eq!(changes.other, vec!["Description".to_string()]);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn type_change_replaces() {
        let old = json!({"Resources": {"A": {"Type": "AWS::SQS::Queue"}}});
        let new = json!({"Resources": {"A": {"Type": "AWS::SNS::Topic"}}});

        assert_eq!(diff(&old, &new).resources[0].kind, ChangeKind::Replace);
    }
}
