use crate::error::Error;
use crate::runner::{Context, Runnable, Runner};
use eyre::WrapErr;
use serde_json::json;
use std::path::PathBuf;

#[derive(clap::Args, Clone)]
pub struct SynthCommand {
    /// Cloud assembly directory, overrides the config file
    #[arg(short, long)]
    out: Option<PathBuf>,
}

impl Runnable for SynthCommand {
    fn runner(&self, context: &Context) -> impl Runner {
        SynthRunner {
            command: self.clone(),
            context,
        }
    }
}

struct SynthRunner<'a> {
    command: SynthCommand,
    context: &'a Context,
}

impl Runner for SynthRunner<'_> {
    fn context(&self) -> &Context {
        self.context
    }

    /// Write every template and the manifest, then list what was written
    async fn run(&mut self) -> Result<(), Error> {
        let app = self.app()?;
        let assembly = self.assembly(&app)?;
        let writer = &self.context.writer;

        let dir = self
            .command
            .out
            .clone()
            .unwrap_or_else(|| self.context.config.output_dir.clone());

        assembly
            .write(&dir)
            .wrap_err(format!("Failed to write the assembly to {}", dir.display()))?;

        writer.text(&format!(
            "{} {} stacks to {}\n",
            console::style("Synthesized").green().bold(),
            assembly.stacks.len(),
            dir.display()
        ))?;

        for stack in &assembly.stacks {
            writer.text(&format!(
                "  {} {}\n",
                stack.id,
                console::style(stack.template_file()).dim()
            ))?;
        }

        // Audit warnings are already logged during synthesis
        if !assembly.findings.is_empty() {
            writer.text(&format!(
                "{} {} audit warnings\n",
                console::style("Found").yellow().bold(),
                assembly.findings.len()
            ))?;
        }

        writer.json(json!({
            "dir": dir,
            "order": assembly.order(),
            "findings": assembly.findings,
        }))
    }
}
