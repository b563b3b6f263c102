use crate::assembly::{Assembly, SynthesizedStack};
use crate::audit;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::graph::StackGraph;
use crate::handle::{Handle, StackId};
use crate::registry::Registry;
use crate::stack::Stack;
use crate::stacks::{
    AdminPolicyStack, AlbStack, ClusterRoleStack, ClusterStack, K8sResourcesStack,
    LaunchTemplateStack, NetworkStack, NodeGroupRoleStack, NodeGroupStack, HELLO_NODE_GROUP,
    SCHEDULER_NODE_GROUP,
};
use crate::template::CfnOutput;
use std::collections::{BTreeMap, BTreeSet};

/// All stacks of a deployment plus the edges between them
#[derive(Clone, Debug, Default)]
pub struct App {
    environment: Environment,
    stacks: Vec<Stack>,
    registry: Registry,

    /// Explicit edges, (dependent, dependency)
    dependencies: Vec<(StackId, StackId)>,
}

impl App {
    pub fn new(environment: Environment) -> Self {
        App {
            environment,
            ..Default::default()
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn add(&mut self, stack: Stack) -> Result<()> {
        if self.stacks.iter().any(|s| s.id() == stack.id()) {
            return Err(Error::DuplicateStack(stack.id().clone()));
        }

        log::debug!("Declared stack {}", stack.id());
        self.stacks.push(stack);
        Ok(())
    }

    /// Declare that `dependent` must be deployed after `dependency`
    ///
    /// Needed wherever no handle or registry lookup links the two stacks.
    pub fn add_dependency(&mut self, dependent: &StackId, dependency: &StackId) {
        self.dependencies
            .push((dependent.clone(), dependency.clone()));
    }

    /// Graph over all declared stacks and every known edge
    ///
    /// Fails when an edge points at a stack that was never declared.
    pub fn graph(&self) -> Result<StackGraph> {
        let mut graph = StackGraph::default();

        for stack in &self.stacks {
            graph.add_stack(stack.id())?;
        }

        for stack in &self.stacks {
            for handle in stack.imports() {
                graph.add_dependency(stack.id(), &handle.stack)?;
            }

            for owner in stack.lookup_owners() {
                graph.add_dependency(stack.id(), owner)?;
            }
        }

        for (dependent, dependency) in &self.dependencies {
            graph.add_dependency(dependent, dependency)?;
        }

        Ok(graph)
    }

    /// Produce the templates of all stacks in deployment order
    ///
    /// Does not modify the app, so repeated calls give the same assembly.
    pub fn synth(&self) -> Result<Assembly> {
        let graph = self.graph()?;
        let plan = graph.plan()?;

        // Every imported handle becomes an exported output of its owner
        let mut exports: BTreeMap<&StackId, BTreeSet<&Handle>> = BTreeMap::new();

        for stack in &self.stacks {
            for handle in stack.imports() {
                exports.entry(&handle.stack).or_default().insert(handle);
            }
        }

        let mut synthesized = Vec::with_capacity(self.stacks.len());

        for id in &plan.order {
            let Some(stack) = self.stacks.iter().find(|s| s.id() == id) else {
                return Err(Error::UnknownStack(id.clone()));
            };

            let mut stack = stack.clone();

            for handle in exports.get(id).into_iter().flatten() {
                let name = handle.output_name();

                // Another handle may sanitize to the same output name
                if let Some(existing) = stack.template().output(&name) {
                    if existing["Value"] != handle.local() {
                        return Err(Error::DuplicateLogicalId {
                            stack: id.clone(),
                            id: name,
                        });
                    }

                    continue;
                }

                stack.template_mut().add_output(
                    CfnOutput::new(&name, handle.local()).export(&handle.export_name()),
                )?;
            }

            synthesized.push(SynthesizedStack {
                id: id.clone(),
                description: stack.description().to_string(),
                dependencies: graph.dependencies_of(id)?,
                template: stack.template().to_json(),
            });
        }

        let assembly = Assembly::new(synthesized, plan.waves);
        let findings = audit::check(&assembly);
        let errors: Vec<String> = findings
            .iter()
            .filter(|f| f.is_error())
            .map(|f| f.to_string())
            .collect();

        if !errors.is_empty() {
            return Err(Error::Audit(errors));
        }

        for finding in &findings {
            log::warn!("{finding}");
        }

        Ok(assembly.with_findings(findings))
    }
}

/// The EKS platform: network, IAM, cluster, node groups, workloads and ALB
///
/// Stacks are declared leaves first. Handles passed between stacks add their
/// own edges, the explicit ones below cover the rest.
pub fn eks_app(environment: Environment) -> Result<App> {
    let mut app = App::new(environment);

    let network = NetworkStack::new(&mut app)?;
    let cluster_role = ClusterRoleStack::new(&mut app)?;
    let nodegroup_role = NodeGroupRoleStack::new(&mut app)?;
    let admin_policy = AdminPolicyStack::new(&mut app)?;

    let cluster = ClusterStack::new(&mut app, &network)?;
    app.add_dependency(&cluster.id, &network.id);
    app.add_dependency(&cluster.id, &cluster_role.id);

    let launch_template = LaunchTemplateStack::new(&mut app, &cluster)?;
    app.add_dependency(&launch_template.id, &cluster.id);

    let mut nodegroups = Vec::new();

    for spec in [&SCHEDULER_NODE_GROUP, &HELLO_NODE_GROUP] {
        let nodegroup = NodeGroupStack::new(&mut app, spec, &network, &cluster, &launch_template)?;

        for dependency in [
            &network.id,
            &cluster_role.id,
            &nodegroup_role.id,
            &admin_policy.id,
            &cluster.id,
            &launch_template.id,
        ] {
            app.add_dependency(&nodegroup.id, dependency);
        }

        nodegroups.push(nodegroup);
    }

    let hello = &nodegroups[1];

    let k8s_resources = K8sResourcesStack::new(&mut app, &cluster)?;
    app.add_dependency(&k8s_resources.id, &cluster.id);
    app.add_dependency(&k8s_resources.id, &hello.id);

    let alb = AlbStack::new(&mut app, &network)?;
    app.add_dependency(&alb.id, &network.id);
    app.add_dependency(&alb.id, &hello.id);

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::CfnResource;
    use serde_json::json;

    fn stack_with_queue(name: &str) -> Stack {
        let mut stack = Stack::new(name, name);

        stack
            .add_resource(CfnResource {
                name: "Queue".into(),
                resource: json!({"Type": "AWS::SQS::Queue"}),
            })
            .unwrap();

        stack
    }

    #[test]
    fn imported_handle_adds_edge_and_export() {
        let mut app = App::default();
        let producer = stack_with_queue("Producer");
        let queue = producer.handle("Queue", Some("Arn"));
        let mut consumer = stack_with_queue("Consumer");
        let value = consumer.resolve(&queue);

        consumer
            .add_output(CfnOutput::new("QueueArn", value))
            .unwrap();

        // Declared before its producer on purpose
        app.add(consumer).unwrap();
        app.add(producer).unwrap();

        let assembly = app.synth().unwrap();
        let order: Vec<&str> = assembly.stacks.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec!["Producer", "Consumer"]);

        let producer = assembly.stack(&StackId::new("Producer")).unwrap();
        assert_eq!(
            producer.template["Outputs"]["ExportsOutputFnGetAttQueueArn"],
            json!({
                "Value": {"Fn::GetAtt": ["Queue", "Arn"]},
                "Export": {"Name": "Producer:ExportsOutputFnGetAttQueueArn"}
            })
        );
    }

    #[test]
    fn colliding_export_names_are_rejected() {
        let mut app = App::default();
        let mut producer = stack_with_queue("Producer");

        producer
            .add_resource(CfnResource {
                name: "QueueB".into(),
                resource: json!({"Type": "AWS::SQS::Queue"}),
            })
            .unwrap();

        // "Queue" + "BArn" and "QueueB" + "Arn" give the same output name
        let first = producer.handle("Queue", Some("BArn"));
        let second = producer.handle("QueueB", Some("Arn"));
        assert_eq!(first.output_name(), second.output_name());

        let mut consumer = stack_with_queue("Consumer");
        let values = consumer.resolve_all(&[first, second]);
        consumer
            .add_output(CfnOutput::new("Both", json!(values)))
            .unwrap();

        app.add(producer).unwrap();
        app.add(consumer).unwrap();

        assert!(matches!(
            app.synth(),
            Err(Error::DuplicateLogicalId { stack, id })
                if stack.as_str() == "Producer" && id == "ExportsOutputFnGetAttQueueBArn"
        ));
    }

    #[test]
    fn handle_of_undeclared_stack_fails_before_synthesis() {
        let mut app = App::default();
        let ghost = Stack::new("Ghost", "never added");
        let mut consumer = stack_with_queue("Consumer");
        consumer.resolve(&ghost.handle("Queue", None));
        app.add(consumer).unwrap();

        assert!(matches!(
            app.synth(),
            Err(Error::UnknownStack(id)) if id.as_str() == "Ghost"
        ));
    }

    #[test]
    fn explicit_cycle_is_rejected() {
        let mut app = App::default();
        app.add(stack_with_queue("A")).unwrap();
        app.add(stack_with_queue("B")).unwrap();
        app.add_dependency(&StackId::new("A"), &StackId::new("B"));
        app.add_dependency(&StackId::new("B"), &StackId::new("A"));

        assert!(matches!(app.synth(), Err(Error::Cycle(_))));
    }

    #[test]
    fn duplicate_stack_is_rejected() {
        let mut app = App::default();
        app.add(stack_with_queue("A")).unwrap();

        assert!(matches!(
            app.add(stack_with_queue("A")),
            Err(Error::DuplicateStack(_))
        ));
    }
}
