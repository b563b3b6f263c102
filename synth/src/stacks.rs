//! The ten stacks of the EKS platform
//!
//! Each builder declares its resources into a fresh [`Stack`](crate::Stack),
//! adds it to the app and returns the handles later stacks consume.

mod admin_policy;
mod alb;
mod cluster;
mod k8s_resources;
mod launch_template;
mod network;
mod nodegroup;
mod role;

pub use admin_policy::AdminPolicyStack;
pub use alb::AlbStack;
pub use cluster::ClusterStack;
pub use k8s_resources::{manifests, K8sResourcesStack, Manifests};
pub use launch_template::LaunchTemplateStack;
pub use network::{NetworkStack, SubnetSpec, SUBNETS};
pub use nodegroup::{
    ExtraOutput, NodeGroupSpec, NodeGroupStack, Scaling, HELLO_NODE_GROUP, SCHEDULER_NODE_GROUP,
};
pub use role::{ClusterRoleStack, NodeGroupRoleStack};

/// Tags shared by all production compute resources
pub(crate) const ENVIRONMENT_TAG: (&str, &str) = ("Environment", "prod");
pub(crate) const SYSTEM_TAG: (&str, &str) = ("System", "prod-eks");
