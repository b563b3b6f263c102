//! Fixed security policy of the platform, kept as data
//!
//! Stack builders turn these tables into resources. The audit reads the same
//! intent back from the synthesized templates.

mod iam;
mod security_group;

pub use iam::*;
pub use security_group::*;

/// Address space of the platform VPC
pub const VPC_CIDR: &str = "192.168.0.0/16";
