use super::cluster::ClusterStack;
use super::nodegroup::HELLO_NODE_GROUP;
use crate::app::App;
use crate::error::{Error, Result};
use crate::handle::StackId;
use crate::stack::Stack;
use crate::template::{join, CfnOutput, CfnResource};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Namespace, PodSpec, PodTemplateSpec, Service, ServicePort,
    ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

pub const NAMESPACE: &str = "prod-hello";
const APP_LABEL: &str = "prod-hello";
const IMAGE: &str = "575108957879.dkr.ecr.us-east-1.amazonaws.com/hello/swatops13032:latest";

/// Kubernetes objects of the hello application
///
/// They are published as stack outputs for manual application, nothing here
/// talks to the cluster.
#[derive(Clone, Debug)]
pub struct Manifests {
    pub namespace: Namespace,
    pub deployment: Deployment,
    pub service: Service,
}

fn labels(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    )
}

fn app_labels() -> Option<BTreeMap<String, String>> {
    labels(&[("app", APP_LABEL)])
}

pub fn manifests() -> Manifests {
    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(NAMESPACE.to_string()),
            labels: labels(&[("name", NAMESPACE)]),
            ..Default::default()
        },
        ..Default::default()
    };

    let deployment = Deployment {
        metadata: ObjectMeta {
            name: Some("prod-hello-deployment".to_string()),
            namespace: Some(NAMESPACE.to_string()),
            labels: app_labels(),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: app_labels(),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: app_labels(),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "hello-container".to_string(),
                        image: Some(IMAGE.to_string()),
                        image_pull_policy: Some("Always".to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: 80,
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    // Pin the pods to the hello node group
                    node_selector: labels(&[(
                        "eks.amazonaws.com/nodegroup",
                        HELLO_NODE_GROUP.nodegroup_name,
                    )]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    };

    let service = Service {
        metadata: ObjectMeta {
            name: Some("prod-hello-service".to_string()),
            namespace: Some(NAMESPACE.to_string()),
            labels: app_labels(),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_string()),
            selector: app_labels(),
            ports: Some(vec![ServicePort {
                port: 80,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(80)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    };

    Manifests {
        namespace,
        deployment,
        service,
    }
}

/// Compact JSON text of a manifest, as published in outputs
fn compact<T: Serialize>(what: &str, manifest: &T) -> Result<String> {
    serde_json::to_string(manifest).map_err(|source| Error::Serialize {
        what: format!("{what} manifest"),
        source,
    })
}

/// Manifests and kubectl instructions for the hello workload
pub struct K8sResourcesStack {
    pub id: StackId,
}

impl K8sResourcesStack {
    pub fn new(app: &mut App, cluster: &ClusterStack) -> Result<Self> {
        let mut stack = Stack::new(
            "EksK8sResourcesStack",
            "Kubernetes manifests for the hello application",
        );

        // A template needs at least one resource
        stack.add_resource(CfnResource {
            name: "ManifestsPlaceholder".into(),
            resource: json!({ "Type": "AWS::CloudFormation::WaitConditionHandle" }),
        })?;

        let manifests = manifests();

        for (name, what, text) in [
            (
                "NamespaceManifest",
                "namespace",
                compact("namespace", &manifests.namespace)?,
            ),
            (
                "DeploymentManifest",
                "deployment",
                compact("deployment", &manifests.deployment)?,
            ),
            (
                "ServiceManifest",
                "service",
                compact("service", &manifests.service)?,
            ),
        ] {
            stack.add_output(
                CfnOutput::new(name, json!(text))
                    .description(&format!("Kubernetes {what} manifest for {NAMESPACE}")),
            )?;
        }

        let cluster_name = stack.resolve(&cluster.cluster_name);
        let region = &app.environment().region;

        stack.add_output(
            CfnOutput::new(
                "KubectlCommands",
                join(
                    "",
                    vec![
                        json!("aws eks update-kubeconfig --name "),
                        cluster_name.clone(),
                        json!(format!(" --region {region}")),
                    ],
                ),
            )
            .description("Command to configure kubectl"),
        )?;
        stack.add_output(
            CfnOutput::new("ClusterName", cluster_name)
                .description("EKS Cluster name for kubectl configuration"),
        )?;

        let id = stack.id().clone();
        app.add(stack)?;

        Ok(K8sResourcesStack { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deployment_serializes_with_kind_and_selector() {
        let manifests = manifests();
        let deployment = serde_json::to_value(&manifests.deployment).unwrap();

        assert_eq!(deployment["apiVersion"], "apps/v1");
        assert_eq!(deployment["kind"], "Deployment");
        assert_eq!(deployment["spec"]["selector"]["matchLabels"]["app"], "prod-hello");
        assert_eq!(
            deployment["spec"]["template"]["spec"]["nodeSelector"],
            json!({"eks.amazonaws.com/nodegroup": "prod-hello-ng"})
        );
        assert_eq!(
            deployment["spec"]["template"]["spec"]["containers"][0]["ports"],
            json!([{"containerPort": 80, "protocol": "TCP"}])
        );
    }

    #[test]
    fn service_is_a_node_port() {
        let service = serde_json::to_value(&manifests().service).unwrap();

        assert_eq!(service["kind"], "Service");
        assert_eq!(service["spec"]["type"], "NodePort");
        assert_eq!(
            service["spec"]["ports"],
            json!([{"port": 80, "protocol": "TCP", "targetPort": 80}])
        );
    }

    #[test]
    fn namespace_output_is_compact_json() {
        let text = compact("namespace", &manifests().namespace).unwrap();

        assert!(!text.contains('\n'));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            json!({
                "apiVersion": "v1",
                "kind": "Namespace",
                "metadata": {"labels": {"name": "prod-hello"}, "name": "prod-hello"}
            })
        );
    }
}
