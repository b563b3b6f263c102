use crate::audit::Finding;
use crate::error::{Error, Result};
use crate::handle::StackId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct SynthesizedStack {
    pub id: StackId,
    pub description: String,
    pub dependencies: Vec<StackId>,
    pub template: Value,
}

impl SynthesizedStack {
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.id)
    }

    /// Template text as sent to CloudFormation
    pub fn template_body(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.template).map_err(|source| Error::Serialize {
            what: format!("template of {}", self.id),
            source,
        })
    }
}

/// Synthesis result: all templates in deployment order
#[derive(Clone, Debug, PartialEq)]
pub struct Assembly {
    pub stacks: Vec<SynthesizedStack>,
    pub waves: Vec<Vec<StackId>>,
    pub findings: Vec<Finding>,
}

/// Layout of manifest.json
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    order: Vec<StackId>,
    waves: Vec<Vec<StackId>>,
    stacks: BTreeMap<StackId, ManifestStack>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestStack {
    template_file: String,
    description: String,
    dependencies: Vec<StackId>,
}

impl Assembly {
    pub fn new(stacks: Vec<SynthesizedStack>, waves: Vec<Vec<StackId>>) -> Self {
        Assembly {
            stacks,
            waves,
            findings: Vec::new(),
        }
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }

    pub fn stack(&self, id: &StackId) -> Option<&SynthesizedStack> {
        self.stacks.iter().find(|s| &s.id == id)
    }

    pub fn order(&self) -> Vec<StackId> {
        self.stacks.iter().map(|s| s.id.clone()).collect()
    }

    /// Write templates and manifest.json into `dir`, creating it if needed
    pub fn write(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;

        let mut stacks = BTreeMap::new();

        for stack in &self.stacks {
            let body = serde_json::to_string_pretty(&stack.template)?;
            std::fs::write(dir.join(stack.template_file()), body)?;

            stacks.insert(
                stack.id.clone(),
                ManifestStack {
                    template_file: stack.template_file(),
                    description: stack.description.clone(),
                    dependencies: stack.dependencies.clone(),
                },
            );
        }

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            order: self.order(),
            waves: self.waves.clone(),
            stacks,
        };

        std::fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        log::info!("Wrote {} templates to {}", self.stacks.len(), dir.display());
        Ok(())
    }

    /// Load an assembly previously written with [`Assembly::write`]
    ///
    /// Findings are not persisted and come back empty.
    pub fn read(dir: &Path) -> std::io::Result<Self> {
        let manifest: Manifest =
            serde_json::from_str(&std::fs::read_to_string(dir.join(MANIFEST_FILE))?)?;

        let mut stacks = Vec::with_capacity(manifest.order.len());

        for id in manifest.order {
            let entry = manifest.stacks.get(&id).ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Stack {id} is missing from {MANIFEST_FILE}"),
                )
            })?;

            let template: Value =
                serde_json::from_str(&std::fs::read_to_string(dir.join(&entry.template_file))?)?;

            stacks.push(SynthesizedStack {
                id: id.clone(),
                description: entry.description.clone(),
                dependencies: entry.dependencies.clone(),
                template,
            });
        }

        Ok(Assembly::new(stacks, manifest.waves))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn written_assembly_reads_back() {
        let dir = tempfile::tempdir().unwrap();

        let assembly = Assembly::new(
            vec![
                SynthesizedStack {
                    id: StackId::new("Net"),
                    description: "Network".into(),
                    dependencies: vec![],
                    template: json!({"Resources": {"Vpc": {"Type": "AWS::EC2::VPC"}}}),
                },
                SynthesizedStack {
                    id: StackId::new("App"),
                    description: "Application".into(),
                    dependencies: vec![StackId::new("Net")],
                    template: json!({"Resources": {}}),
                },
            ],
            vec![vec![StackId::new("Net")], vec![StackId::new("App")]],
        );

        assembly.write(dir.path()).unwrap();
        assert!(dir.path().join("Net.template.json").exists());

        assert_eq!(Assembly::read(dir.path()).unwrap(), assembly);
    }

    #[test]
    fn reading_a_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Assembly::read(&dir.path().join("nope")).is_err());
    }
}
