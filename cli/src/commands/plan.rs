use crate::error::Error;
use crate::runner::{Context, Runnable, Runner};
use crate::table;
use serde_json::json;
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub struct PlanCommand {}

impl Runnable for PlanCommand {
    fn runner(&self, context: &Context) -> impl Runner {
        PlanRunner { context }
    }
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Wave")]
    wave: usize,
    #[tabled(rename = "Stack")]
    stack: String,
    #[tabled(rename = "Depends on")]
    dependencies: String,
    #[tabled(rename = "Description")]
    description: String,
}

struct PlanRunner<'a> {
    context: &'a Context,
}

impl Runner for PlanRunner<'_> {
    fn context(&self) -> &Context {
        self.context
    }

    /// Print stacks wave by wave, stacks of one wave are independent
    async fn run(&mut self) -> Result<(), Error> {
        let app = self.app()?;
        let graph = app.graph()?;
        let plan = graph.plan()?;
        let mut rows = Vec::new();
        let mut dependencies = serde_json::Map::new();

        for (wave, ids) in plan.waves.iter().enumerate() {
            for id in ids {
                let depends_on = graph.dependencies_of(id)?;

                let description = app
                    .stacks()
                    .iter()
                    .find(|s| s.id() == id)
                    .map(|s| s.description().to_string())
                    .unwrap_or_default();

                rows.push(PlanRow {
                    wave: wave + 1,
                    stack: id.to_string(),
                    dependencies: depends_on
                        .iter()
                        .map(|d| d.as_str())
                        .collect::<Vec<_>>()
                        .join("\n"),
                    description,
                });

                dependencies.insert(id.to_string(), json!(depends_on));
            }
        }

        self.context.writer.text(&format!("{}\n", table::render(rows)))?;

        self.context.writer.json(json!({
            "order": plan.order,
            "waves": plan.waves,
            "dependencies": dependencies,
        }))
    }
}
