//! Builders for CloudFormation intrinsic functions and common property shapes

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

pub fn import_value(export_name: &str) -> Value {
    json!({ "Fn::ImportValue": export_name })
}

pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

pub fn sub(text: &str) -> Value {
    json!({ "Fn::Sub": text })
}

/// ARN of an AWS managed IAM policy in the stack's partition
pub fn managed_policy_arn(policy_name: &str) -> Value {
    join(
        "",
        vec![
            json!("arn:"),
            reference("AWS::Partition"),
            json!(format!(":iam::aws:policy/{policy_name}")),
        ],
    )
}

/// CFN "Tags" list out of key/value pairs
pub fn tags(pairs: &[(&str, &str)]) -> Value {
    Value::Array(
        pairs
            .iter()
            .map(|(key, value)| json!({ "Key": key, "Value": value }))
            .collect(),
    )
}

/// Replace any character CloudFormation does not accept in a logical id
///
/// Logical ids are alphanumeric only.
pub fn logical_id(name: &str) -> String {
    static NON_ALPHANUMERIC: OnceLock<Regex> = OnceLock::new();

    NON_ALPHANUMERIC
        .get_or_init(|| Regex::new(r"[^A-Za-z0-9]").unwrap())
        .replace_all(name, "")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_id_strips_separators() {
        assert_eq!(logical_id("Eks-Vpc.Cdk_Stack"), "EksVpcCdkStack");
        assert_eq!(logical_id("DNSName"), "DNSName");
    }

    #[test]
    fn managed_policy_arn_is_partition_aware() {
        assert_eq!(
            managed_policy_arn("AmazonEKSClusterPolicy"),
            json!({"Fn::Join": ["", [
                "arn:",
                {"Ref": "AWS::Partition"},
                ":iam::aws:policy/AmazonEKSClusterPolicy"
            ]]})
        );
    }
}
