use crate::error::{Error, Result};
use crate::handle::StackId;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct Registration {
    pub owner: StackId,
    pub value: Value,
}

/// Named identifiers published by stacks for stacks that hold no handle
///
/// A stack owning a well-known resource (e.g. a role with a fixed name)
/// registers it here. Consumers look it up by name, which fails right away
/// when nothing is registered under that name.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, Registration>,
}

impl Registry {
    pub fn register(&mut self, name: &str, owner: &StackId, value: Value) -> Result<()> {
        if let Some(existing) = self.entries.get(name) {
            return Err(Error::DuplicateRegistration {
                name: name.to_string(),
                owner: existing.owner.clone(),
            });
        }

        log::debug!("Registered \"{name}\" owned by {owner}");

        self.entries.insert(
            name.to_string(),
            Registration {
                owner: owner.clone(),
                value,
            },
        );

        Ok(())
    }

    pub fn get(&self, name: &str, consumer: &StackId) -> Result<&Registration> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::MissingRegistration {
                name: name.to_string(),
                consumer: consumer.clone(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_of_unregistered_name_fails() {
        let registry = Registry::default();

        let err = registry
            .get("prod-sre-workernode-role", &StackId::new("EksNodeGroupHelloStack"))
            .unwrap_err();

        assert!(matches!(err, Error::MissingRegistration { .. }));
        assert!(err.to_string().contains("prod-sre-workernode-role"));
    }

    #[test]
    fn name_can_be_registered_once() {
        let mut registry = Registry::default();
        let owner = StackId::new("EksClusterRoleStack");

        registry
            .register("prod-sre-eks-cluster-role", &owner, json!("arn"))
            .unwrap();

        assert!(matches!(
            registry.register("prod-sre-eks-cluster-role", &owner, json!("arn")),
            Err(Error::DuplicateRegistration { .. })
        ));

        assert_eq!(
            registry
                .get("prod-sre-eks-cluster-role", &StackId::new("EksClusterStack"))
                .unwrap()
                .owner,
            owner
        );
    }
}
