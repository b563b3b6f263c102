use crate::error::Error;
use crate::runner::{Context, Runnable, Runner};
use crate::table;
use serde_json::json;
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub struct OutputsCommand {
    /// Stacks to read, all when omitted
    stacks: Vec<String>,
}

impl Runnable for OutputsCommand {
    fn runner(&self, context: &Context) -> impl Runner {
        OutputsRunner {
            command: self.clone(),
            context,
        }
    }
}

#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Stack")]
    stack: String,
    #[tabled(rename = "Output")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Description")]
    description: String,
}

struct OutputsRunner<'a> {
    command: OutputsCommand,
    context: &'a Context,
}

impl Runner for OutputsRunner<'_> {
    fn context(&self) -> &Context {
        self.context
    }

    async fn run(&mut self) -> Result<(), Error> {
        let app = self.app()?;
        let selected = self.select(&app, &self.command.stacks)?;
        let client = self.client().await;
        let writer = &self.context.writer;
        let mut rows = Vec::new();
        let mut result = serde_json::Map::new();

        for id in &selected {
            let Some(stack) = client.describe(id.as_str()).await? else {
                log::info!("{id} is not deployed");
                continue;
            };

            for output in &stack.outputs {
                rows.push(OutputRow {
                    stack: id.to_string(),
                    key: output.key.clone(),
                    value: output.value.clone(),
                    description: output.description.clone().unwrap_or_default(),
                });
            }

            result.insert(id.to_string(), json!(stack.outputs));
        }

        if rows.is_empty() {
            writer.text(&format!(
                "{}\n",
                console::style("No deployed stacks found").yellow().bold()
            ))?;
        } else {
            writer.text(&format!("{}\n", table::render(rows)))?;
        }

        writer.json(serde_json::Value::Object(result))
    }
}
