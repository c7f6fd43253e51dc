use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{ScheduleError, ScheduleResult};
use crate::step::{Anchor, StepDefinition, StepId};
use crate::step_validation;

/// A node a step's anchor date is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum DependencyRef {
    /// The synthetic node carrying the case goal date.
    Goal,
    Step(StepId),
}

impl DependencyRef {
    pub fn step_id(&self) -> Option<&str> {
        match self {
            DependencyRef::Goal => None,
            DependencyRef::Step(id) => Some(id),
        }
    }
}

/// Non-fatal template configuration findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleWarning {
    /// Anchored to the previous step, but no step has `sequence - 1`; the goal date is used.
    MissingPredecessor { step_id: StepId, sequence: i32 },
}

impl fmt::Display for ScheduleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleWarning::MissingPredecessor { step_id, sequence } => write!(
                f,
                "step '{step_id}' follows the previous step but no step has sequence {}; anchored to the goal date",
                sequence - 1
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub step_id: StepId,
    pub offset_days: i64,
    /// Never empty; goal-anchored steps carry `[DependencyRef::Goal]`.
    pub dependencies: Vec<DependencyRef>,
}

/// Steps in an order where every dependency precedes its dependents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationPlan {
    pub order: Vec<PlannedStep>,
    pub warnings: Vec<ScheduleWarning>,
}

pub struct DependencyGraph {
    pub graph: DiGraph<DependencyRef, ()>,
    pub id_to_index: HashMap<StepId, NodeIndex>,
    dependencies: HashMap<StepId, Vec<DependencyRef>>,
    offsets: HashMap<StepId, i64>,
    warnings: Vec<ScheduleWarning>,
}

impl DependencyGraph {
    pub fn build(steps: &[StepDefinition]) -> ScheduleResult<Self> {
        step_validation::validate_step_collection(steps)?;

        let mut graph: DiGraph<DependencyRef, ()> = DiGraph::new();
        let mut id_to_index: HashMap<StepId, NodeIndex> = HashMap::new();
        let goal_ix = graph.add_node(DependencyRef::Goal);

        // Add nodes first
        for step in steps {
            let node_ix = graph.add_node(DependencyRef::Step(step.id.clone()));
            id_to_index.insert(step.id.clone(), node_ix);
        }

        let by_sequence: HashMap<i32, &str> = steps
            .iter()
            .map(|step| (step.sequence, step.id.as_str()))
            .collect();

        let mut dependencies = HashMap::with_capacity(steps.len());
        let mut offsets = HashMap::with_capacity(steps.len());
        let mut warnings = Vec::new();

        // Add edges: dependency -> dependent
        for step in steps {
            let resolved = Self::resolve(step, &by_sequence, &id_to_index, &mut warnings)?;
            let step_ix = id_to_index[&step.id];
            for dep in &resolved {
                let dep_ix = match dep {
                    DependencyRef::Goal => goal_ix,
                    DependencyRef::Step(id) => id_to_index[id],
                };
                graph.add_edge(dep_ix, step_ix, ());
            }
            dependencies.insert(step.id.clone(), resolved);
            offsets.insert(step.id.clone(), step.offset_days);
        }

        Ok(Self {
            graph,
            id_to_index,
            dependencies,
            offsets,
            warnings,
        })
    }

    fn resolve(
        step: &StepDefinition,
        by_sequence: &HashMap<i32, &str>,
        id_to_index: &HashMap<StepId, NodeIndex>,
        warnings: &mut Vec<ScheduleWarning>,
    ) -> ScheduleResult<Vec<DependencyRef>> {
        match &step.anchor {
            Anchor::GoalDate => Ok(vec![DependencyRef::Goal]),
            Anchor::ExplicitDependencies(ids) if !ids.is_empty() => {
                let mut resolved: Vec<DependencyRef> = Vec::with_capacity(ids.len());
                for id in ids {
                    if !id_to_index.contains_key(id) {
                        return Err(ScheduleError::UnknownDependency {
                            step_id: step.id.clone(),
                            missing_dependency_id: id.clone(),
                        });
                    }
                    let dep = DependencyRef::Step(id.clone());
                    if !resolved.contains(&dep) {
                        resolved.push(dep);
                    }
                }
                Ok(resolved)
            }
            Anchor::PreviousStep | Anchor::ExplicitDependencies(_) => {
                match by_sequence.get(&(step.sequence - 1)) {
                    Some(prev) => Ok(vec![DependencyRef::Step((*prev).to_string())]),
                    None => {
                        tracing::warn!(
                            step_id = %step.id,
                            sequence = step.sequence,
                            "step anchored to a missing previous step; using the goal date"
                        );
                        warnings.push(ScheduleWarning::MissingPredecessor {
                            step_id: step.id.clone(),
                            sequence: step.sequence,
                        });
                        Ok(vec![DependencyRef::Goal])
                    }
                }
            }
        }
    }

    pub fn dependencies_of(&self, step_id: &str) -> Option<&[DependencyRef]> {
        self.dependencies.get(step_id).map(Vec::as_slice)
    }

    pub fn warnings(&self) -> &[ScheduleWarning] {
        &self.warnings
    }

    /// Topologically order the steps, failing with the ids of every step on a cycle.
    pub fn evaluation_plan(&self) -> ScheduleResult<EvaluationPlan> {
        let order = toposort(&self.graph, None).map_err(|_| self.cycle_error())?;

        let order = order
            .into_iter()
            .filter_map(|node_ix| match &self.graph[node_ix] {
                DependencyRef::Goal => None,
                DependencyRef::Step(id) => Some(PlannedStep {
                    step_id: id.clone(),
                    offset_days: self.offsets[id],
                    dependencies: self.dependencies[id].clone(),
                }),
            })
            .collect();

        Ok(EvaluationPlan {
            order,
            warnings: self.warnings.clone(),
        })
    }

    fn cycle_error(&self) -> ScheduleError {
        let mut involved: Vec<StepId> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.graph.contains_edge(component[0], component[0])
            })
            .flatten()
            .filter_map(|node_ix| self.graph[node_ix].step_id().map(str::to_string))
            .collect();
        involved.sort();
        ScheduleError::CyclicDependency {
            involved_step_ids: involved,
        }
    }
}

/// Build the graph and order it in one go.
pub fn plan(steps: &[StepDefinition]) -> ScheduleResult<EvaluationPlan> {
    DependencyGraph::build(steps)?.evaluation_plan()
}
