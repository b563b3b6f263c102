use crate::error::Error;
use crate::runner::{Context, Runnable, Runner};
use eks_stacks_synth::stacks::manifests;
use eyre::WrapErr;
use serde_json::json;

#[derive(clap::Args, Clone)]
pub struct ManifestsCommand {}

impl Runnable for ManifestsCommand {
    fn runner(&self, context: &Context) -> impl Runner {
        ManifestsRunner { context }
    }
}

struct ManifestsRunner<'a> {
    context: &'a Context,
}

impl Runner for ManifestsRunner<'_> {
    fn context(&self) -> &Context {
        self.context
    }

    /// Print the manifests ready for `kubectl apply -f -`
    async fn run(&mut self) -> Result<(), Error> {
        let manifests = manifests();

        // A v1 List keeps the three objects in one applicable document
        let list = json!({
            "apiVersion": "v1",
            "kind": "List",
            "items": [
                serde_json::to_value(&manifests.namespace).wrap_err("Invalid namespace")?,
                serde_json::to_value(&manifests.deployment).wrap_err("Invalid deployment")?,
                serde_json::to_value(&manifests.service).wrap_err("Invalid service")?,
            ]
        });

        let text = serde_json::to_string_pretty(&list).wrap_err("Failed to format manifests")?;

        self.context.writer.text(&format!("{text}\n"))?;
        self.context.writer.json(list)
    }
}
