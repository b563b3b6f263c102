use crate::error::{Error, Result};
use crate::handle::StackId;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Deployment order of the stacks
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Every stack after all of its dependencies
    pub order: Vec<StackId>,

    /// Stacks grouped by the length of their longest dependency chain,
    /// stacks within a wave do not depend on each other
    pub waves: Vec<Vec<StackId>>,
}

/// Directed graph of "stack A must exist before stack B" edges
#[derive(Clone, Debug, Default)]
pub struct StackGraph {
    /// Declaration order, used to break ties in the plan
    nodes: Vec<StackId>,
    index: HashMap<StackId, usize>,

    /// Per node, indexes of the stacks it depends on
    dependencies: Vec<BTreeSet<usize>>,
}

impl StackGraph {
    pub fn add_stack(&mut self, id: &StackId) -> Result<()> {
        if self.index.contains_key(id) {
            return Err(Error::DuplicateStack(id.clone()));
        }

        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(id.clone());
        self.dependencies.push(BTreeSet::new());
        Ok(())
    }

    fn position(&self, id: &StackId) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| Error::UnknownStack(id.clone()))
    }

    /// Declare that `dependent` must be deployed after `dependency`
    pub fn add_dependency(&mut self, dependent: &StackId, dependency: &StackId) -> Result<()> {
        let from = self.position(dependent)?;
        let to = self.position(dependency)?;

        if from == to {
            return Err(Error::SelfDependency(dependent.clone()));
        }

        self.dependencies[from].insert(to);
        Ok(())
    }

    pub fn contains(&self, id: &StackId) -> bool {
        self.index.contains_key(id)
    }

    pub fn stacks(&self) -> &[StackId] {
        &self.nodes
    }

    /// Direct dependencies, in declaration order
    pub fn dependencies_of(&self, id: &StackId) -> Result<Vec<StackId>> {
        let position = self.position(id)?;

        Ok(self.dependencies[position]
            .iter()
            .map(|&i| self.nodes[i].clone())
            .collect())
    }

    /// Stacks depending directly on `id`, in declaration order
    pub fn dependents_of(&self, id: &StackId) -> Result<Vec<StackId>> {
        let position = self.position(id)?;

        Ok(self
            .dependencies
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.contains(&position))
            .map(|(i, _)| self.nodes[i].clone())
            .collect())
    }

    /// Topological order (Kahn) with ties broken by declaration order
    pub fn plan(&self) -> Result<Plan> {
        let count = self.nodes.len();
        let mut remaining: Vec<usize> = self.dependencies.iter().map(|d| d.len()).collect();
        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| remaining[i] == 0).collect();
        let mut order = Vec::with_capacity(count);
        let mut depth = vec![0usize; count];

        while let Some(next) = ready.pop_first() {
            order.push(next);

            for (dependent, deps) in self.dependencies.iter().enumerate() {
                if !deps.contains(&next) {
                    continue;
                }

                depth[dependent] = depth[dependent].max(depth[next] + 1);
                remaining[dependent] -= 1;

                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < count {
            return Err(Error::Cycle(self.find_cycle(&remaining)));
        }

        let mut waves: Vec<Vec<StackId>> = Vec::new();

        for &i in &order {
            if waves.len() <= depth[i] {
                waves.resize(depth[i] + 1, Vec::new());
            }

            waves[depth[i]].push(self.nodes[i].clone());
        }

        Ok(Plan {
            order: order.into_iter().map(|i| self.nodes[i].clone()).collect(),
            waves,
        })
    }

    /// Walk unresolved dependencies until a stack repeats
    ///
    /// Every stack left unresolved by Kahn's pass has at least one unresolved
    /// dependency, so the walk always closes a loop.
    fn find_cycle(&self, remaining: &[usize]) -> Vec<StackId> {
        let unresolved = |i: usize| remaining[i] > 0;
        let mut path: Vec<usize> = Vec::new();
        let mut current = (0..self.nodes.len()).find(|&i| unresolved(i));

        while let Some(node) = current {
            if let Some(start) = path.iter().position(|&p| p == node) {
                let mut cycle: Vec<StackId> =
                    path[start..].iter().map(|&i| self.nodes[i].clone()).collect();
                cycle.push(self.nodes[node].clone());
                return cycle;
            }

            path.push(node);

            current = self.dependencies[node]
                .iter()
                .copied()
                .find(|&dep| unresolved(dep));
        }

        path.into_iter().map(|i| self.nodes[i].clone()).collect()
    }

    /// `ids` plus everything they transitively depend on, in plan order
    pub fn upstream_closure(&self, ids: &[StackId]) -> Result<Vec<StackId>> {
        let mut selected = BTreeSet::new();
        let mut stack: Vec<usize> = ids.iter().map(|id| self.position(id)).collect::<Result<_>>()?;

        while let Some(node) = stack.pop() {
            if selected.insert(node) {
                stack.extend(self.dependencies[node].iter().copied());
            }
        }

        self.in_plan_order(&selected)
    }

    /// `ids` plus everything that transitively depends on them, in plan order
    pub fn downstream_closure(&self, ids: &[StackId]) -> Result<Vec<StackId>> {
        let mut selected = BTreeSet::new();
        let mut stack: Vec<usize> = ids.iter().map(|id| self.position(id)).collect::<Result<_>>()?;

        while let Some(node) = stack.pop() {
            if selected.insert(node) {
                stack.extend(
                    self.dependencies
                        .iter()
                        .enumerate()
                        .filter(|(_, deps)| deps.contains(&node))
                        .map(|(i, _)| i),
                );
            }
        }

        self.in_plan_order(&selected)
    }

    fn in_plan_order(&self, selected: &BTreeSet<usize>) -> Result<Vec<StackId>> {
        Ok(self
            .plan()?
            .order
            .into_iter()
            .filter(|id| selected.contains(&self.index[id]))
            .collect())
    }
}
