use crate::cloudformation::Client;
use crate::error::Error;
use crate::runner::{Context, Runnable, Runner};
use eks_stacks_synth::diff::{diff, ChangeKind, TemplateDiff};
use eks_stacks_synth::{Assembly, StackId};
use eyre::WrapErr;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(clap::Args, Clone)]
pub struct DiffCommand {
    /// Previously synthesized assembly to compare with, instead of deployed stacks
    #[arg(long)]
    against: Option<PathBuf>,

    /// Exit with an error when any resource would be replaced
    #[arg(long)]
    fail_on_replace: bool,

    /// Stacks to compare, all when omitted
    stacks: Vec<String>,
}

impl Runnable for DiffCommand {
    fn runner(&self, context: &Context) -> impl Runner {
        DiffRunner {
            command: self.clone(),
            context,
        }
    }
}

struct DiffRunner<'a> {
    command: DiffCommand,
    context: &'a Context,
}

fn symbol(kind: ChangeKind) -> console::StyledObject<&'static str> {
    match kind {
        ChangeKind::Add => console::style("[+]").green(),
        ChangeKind::Remove => console::style("[-]").red(),
        ChangeKind::Update => console::style("[~]").yellow(),
        ChangeKind::Replace => console::style("[!]").red().bold(),
    }
}

/// Human readable listing of the changes of one stack
fn render(changes: &TemplateDiff) -> String {
    let mut lines = Vec::new();

    for change in &changes.resources {
        let mut line = format!(
            "{} {} {}",
            symbol(change.kind),
            change.resource_type,
            change.logical_id
        );

        if !change.properties.is_empty() {
            line.push_str(&format!(
                " {}",
                console::style(change.properties.join(", ")).dim()
            ));
        }

        if change.kind == ChangeKind::Replace {
            line.push_str(&format!(" {}", console::style("(replacement)").red()));
        }

        lines.push(line);
    }

    for change in &changes.outputs {
        lines.push(format!("{} Output {}", symbol(change.kind), change.name));
    }

    for key in &changes.other {
        lines.push(format!("{} Template {key}", symbol(ChangeKind::Update)));
    }

    lines.join("\n")
}

/// What the synthesized templates are compared with
enum Baseline {
    Assembly(Assembly),
    Deployed(Client),
}

impl Baseline {
    /// Template of the stack, Null for a stack that does not exist yet
    async fn template(&self, id: &StackId) -> eyre::Result<Value> {
        match self {
            Baseline::Assembly(previous) => Ok(previous
                .stack(id)
                .map(|s| s.template.clone())
                .unwrap_or(Value::Null)),

            Baseline::Deployed(client) => {
                Ok(client.template(id.as_str()).await?.unwrap_or(Value::Null))
            }
        }
    }
}

impl Runner for DiffRunner<'_> {
    fn context(&self) -> &Context {
        self.context
    }

    async fn run(&mut self) -> Result<(), Error> {
        let app = self.app()?;
        let assembly = self.assembly(&app)?;
        let selected = self.select(&app, &self.command.stacks)?;
        let writer = &self.context.writer;

        let baseline = match &self.command.against {
            Some(dir) => Baseline::Assembly(
                Assembly::read(dir)
                    .wrap_err(format!("Failed to read the assembly in {}", dir.display()))?,
            ),
            None => Baseline::Deployed(self.client().await),
        };

        let mut result = serde_json::Map::new();
        let mut replacements = 0;

        for stack in assembly.stacks.iter().filter(|s| selected.contains(&s.id)) {
            let old = baseline.template(&stack.id).await?;
            let changes = diff(&old, &stack.template);
            replacements += changes.replacements().count();

            let status = if old.is_null() {
                console::style("new stack").green().to_string()
            } else if changes.is_empty() {
                console::style("no differences").dim().to_string()
            } else {
                console::style(format!("{} changes", changes.len())).yellow().to_string()
            };

            writer.text(&format!(
                "{} {}\n",
                console::style(format!("Stack {}", stack.id)).bold(),
                status
            ))?;

            if !changes.is_empty() {
                writer.text(&format!("{}\n", render(&changes)))?;
            }

            writer.text("\n")?;
            result.insert(stack.id.to_string(), json!(changes));
        }

        writer.json(Value::Object(result))?;

        if replacements > 0 {
            writer.error(&format!(
                "{}\n",
                console::style(format!("{replacements} resources will be replaced"))
                    .red()
                    .bold()
            ))?;

            if self.command.fail_on_replace {
                return Err(self.error(
                    Some("Replacements detected"),
                    Some("Replaced resources lose their identity and data"),
                    None,
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replacement_is_marked() {
        console::set_colors_enabled(false);

        let old = json!({"Resources": {"Vpc": {
            "Type": "AWS::EC2::VPC",
            "Properties": {"CidrBlock": "10.0.0.0/16"}
        }}});
        let new = json!({"Resources": {"Vpc": {
            "Type": "AWS::EC2::VPC",
            "Properties": {"CidrBlock": "10.1.0.0/16"}
        }}});

        assert_eq!(
            render(&diff(&old, &new)),
            "[!] AWS::EC2::VPC Vpc CidrBlock (replacement)"
        );
    }

    #[test]
    fn outputs_are_listed_after_resources() {
        console::set_colors_enabled(false);

        let new = json!({
            "Resources": {"Queue": {"Type": "AWS::SQS::Queue"}},
            "Outputs": {"QueueUrl": {"Value": {"Ref": "Queue"}}}
        });

        assert_eq!(
            render(&diff(&Value::Null, &new)),
            "[+] AWS::SQS::Queue Queue\n[+] Output QueueUrl"
        );
    }

    #[test]
    fn description_change_is_listed() {
        console::set_colors_enabled(false);

        let old = json!({"Description": "EKS cluster", "Resources": {}});
        let new = json!({"Description": "EKS cluster and node group", "Resources": {}});

        assert_eq!(render(&diff(&old, &new)), "[~] Template Description");
    }
}
