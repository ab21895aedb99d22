//! Dependency graph between pipelines and the per-build status table.

use chrono::Utc;
use drover_core::event::{BuildStatus, Event};
use drover_core::pipeline::PipelineDefinition;
use drover_core::run::{PipelineStatus, StatusRecord};
use drover_core::trigger::{TriggerEvaluator, Verdict};
use drover_core::{Error, Result};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A pipeline whose dependencies are all terminal, with the gate verdict for
/// the event synthesized from their outcomes.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub definition: Arc<PipelineDefinition>,
    /// The dispatched event with `status` set to the dependencies' aggregate.
    pub event: Event,
    pub verdict: Verdict,
}

impl Candidate {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn is_admitted(&self) -> bool {
        self.verdict.is_admit()
    }
}

/// Directed graph of `depends_on` edges, from dependency to dependent.
///
/// Nodes are created for dependencies before their definition is added, so
/// definitions may arrive in any order. Only the dispatch loop writes the
/// status table.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    definitions: HashMap<String, Arc<PipelineDefinition>>,
    statuses: HashMap<String, PipelineStatus>,
    evaluator: TriggerEvaluator,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a full set of definitions and check it is closed.
    pub fn from_definitions(definitions: impl IntoIterator<Item = PipelineDefinition>) -> Result<Self> {
        let mut graph = Self::new();
        for definition in definitions {
            graph.add(definition)?;
        }
        graph.validate()?;
        Ok(graph)
    }

    /// Add a pipeline. The graph is unchanged when this fails.
    pub fn add(&mut self, definition: PipelineDefinition) -> Result<()> {
        let name = definition.name.clone();
        if self.definitions.contains_key(&name) {
            return Err(Error::DuplicatePipeline(name));
        }

        if definition.depends_on.iter().any(|dep| dep == &name) {
            return Err(Error::CycleDetected(format!("{} depends on itself", name)));
        }

        // A new edge dep -> name closes a cycle iff name already reaches dep.
        if let Some(&node) = self.index.get(&name) {
            for dep in &definition.depends_on {
                if let Some(&dep_node) = self.index.get(dep)
                    && has_path_connecting(&self.graph, node, dep_node, None)
                {
                    return Err(Error::CycleDetected(format!(
                        "{} -> {} -> {}",
                        name, dep, name
                    )));
                }
            }
        }

        let node = self.node(&name);
        for dep in &definition.depends_on {
            let dep_node = self.node(dep);
            self.graph.update_edge(dep_node, node, ());
        }

        debug!(pipeline = %name, depends_on = ?definition.depends_on, "Added pipeline to graph");
        self.definitions.insert(name, Arc::new(definition));
        Ok(())
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&node) = self.index.get(name) {
            return node;
        }
        let node = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), node);
        node
    }

    /// Check that every referenced dependency is defined.
    pub fn validate(&self) -> Result<()> {
        for definition in self.definitions() {
            for dep in &definition.depends_on {
                if !self.definitions.contains_key(dep) {
                    return Err(Error::UnknownDependency {
                        pipeline: definition.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Defined pipelines, dependencies before dependents.
    pub fn topological_order(&self) -> Result<Vec<Arc<PipelineDefinition>>> {
        let order = toposort(&self.graph, None).map_err(|cycle| {
            Error::CycleDetected(self.graph[cycle.node_id()].clone())
        })?;
        Ok(order
            .into_iter()
            .filter_map(|node| self.definitions.get(&self.graph[node]).cloned())
            .collect())
    }

    /// Defined pipelines in insertion order.
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<PipelineDefinition>> {
        self.graph
            .node_indices()
            .filter_map(|node| self.definitions.get(&self.graph[node]))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PipelineDefinition>> {
        self.definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Direct dependents of `name`.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.index
            .get(name)
            .map(|&node| {
                self.graph
                    .neighbors_directed(node, Direction::Outgoing)
                    .map(|n| self.graph[n].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every unrecorded pipeline whose dependencies are all terminal,
    /// admitted or not.
    pub fn evaluate(&self, event: &Event) -> Vec<Candidate> {
        self.definitions()
            .filter(|definition| !self.statuses.contains_key(&definition.name))
            .filter_map(|definition| {
                let event = self.synthesize(definition, event)?;
                let verdict = self.evaluator.evaluate(&definition.trigger, &event);
                Some(Candidate {
                    definition: Arc::clone(definition),
                    event,
                    verdict,
                })
            })
            .collect()
    }

    /// Pipelines that may start now.
    pub fn ready(&self, event: &Event) -> Vec<Arc<PipelineDefinition>> {
        self.evaluate(event)
            .into_iter()
            .filter(Candidate::is_admitted)
            .map(|candidate| candidate.definition)
            .collect()
    }

    /// The event a pipeline is gated against, or `None` while any dependency
    /// is still unrecorded.
    fn synthesize(&self, definition: &PipelineDefinition, event: &Event) -> Option<Event> {
        if definition.depends_on.is_empty() {
            return Some(event.clone());
        }

        let mut failed = false;
        for dep in &definition.depends_on {
            failed |= self.statuses.get(dep)?.is_failure();
        }

        let status = if failed {
            BuildStatus::Failure
        } else {
            BuildStatus::Success
        };
        Some(event.clone().with_status(status))
    }

    /// Record the terminal status of a pipeline. Each name is written once.
    pub fn record(&mut self, name: &str, status: PipelineStatus) -> Result<StatusRecord> {
        if !self.definitions.contains_key(name) {
            return Err(Error::UnknownPipeline(name.to_string()));
        }
        if let Some(existing) = self.statuses.get(name) {
            warn!(pipeline = %name, existing = %existing, attempted = %status, "Status already recorded");
            return Err(Error::AlreadyTerminal(name.to_string()));
        }

        self.statuses.insert(name.to_string(), status);
        Ok(StatusRecord {
            pipeline: name.to_string(),
            status,
            recorded_at: Utc::now(),
        })
    }

    /// Load previously persisted records. Records for pipelines that are no
    /// longer defined are ignored.
    pub fn restore(&mut self, records: &[StatusRecord]) -> Result<usize> {
        let mut restored = 0;
        for record in records {
            if !self.definitions.contains_key(&record.pipeline) {
                warn!(pipeline = %record.pipeline, "Ignoring stored status for unknown pipeline");
                continue;
            }
            self.record(&record.pipeline, record.status)?;
            restored += 1;
        }
        Ok(restored)
    }

    pub fn status(&self, name: &str) -> Option<PipelineStatus> {
        self.statuses.get(name).copied()
    }

    /// Whether every defined pipeline has a terminal status.
    pub fn is_settled(&self) -> bool {
        self.definitions.keys().all(|name| self.statuses.contains_key(name))
    }

    /// Forget all recorded statuses.
    pub fn reset(&mut self) {
        self.statuses.clear();
    }
}
