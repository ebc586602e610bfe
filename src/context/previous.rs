//! Previous generation as observed at context open.
//!
//! The loaded snapshot never changes during a build. Every recorded resource is
//! statted once here and the resulting statuses are escalated over include and output
//! edges, so later lookups are plain map reads.

use crate::escalation::EscalationEngine;
use crate::graph::AssociationGraph;
use crate::resource::ResourceStat;
use crate::status::StatusResolver;
use crate::store::{BuildState, InputRecord, OutputRecord};
use crate::types::{ResourceId, ResourceStatus};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Escalation node. Inputs and included resources share one namespace so an input
/// that is also included by another is a single node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Node {
    Resource(ResourceId),
    Output(ResourceId),
}

#[derive(Debug, Default)]
pub(crate) struct PreviousGeneration {
    state: BuildState,
    graph: AssociationGraph,
    /// Effective status of each recorded input.
    inputs: BTreeMap<ResourceId, ResourceStatus>,
    /// Own status of each recorded output.
    outputs: BTreeMap<ResourceId, ResourceStatus>,
}

impl PreviousGeneration {
    pub fn observe(state: BuildState, resolver: &StatusResolver) -> Self {
        let mut engine = EscalationEngine::new();
        let mut inputs = BTreeMap::new();
        let mut outputs = BTreeMap::new();

        for (id, record) in &state.inputs {
            let status = observe_one(resolver, id.path(), &record.stat);
            engine.set_status(Node::Resource(id.clone()), status);
            inputs.insert(id.clone(), status);

            for included in &record.includes {
                engine.add_dependency(Node::Resource(id.clone()), Node::Resource(included.clone()));
            }
            for output in &record.outputs {
                engine.add_dependency(Node::Resource(id.clone()), Node::Output(output.clone()));
            }
        }

        // Included resources that are not inputs themselves; no recorded stat leaves
        // the node unknown, which escalates its includers.
        for (id, stat) in &state.included {
            if state.inputs.contains_key(id) {
                continue;
            }
            engine.set_status(Node::Resource(id.clone()), observe_one(resolver, id.path(), stat));
        }

        for (id, record) in &state.outputs {
            let status = observe_one(resolver, id.path(), &record.stat);
            engine.set_status(Node::Output(id.clone()), status);
            outputs.insert(id.clone(), status);
        }

        let escalated = engine.resolve();
        for (id, own) in inputs.iter_mut() {
            if let Some(effective) = escalated.status(&Node::Resource(id.clone())) {
                if effective != *own {
                    debug!(resource = %id, own = %own, %effective, "Escalated input");
                }
                *own = effective;
            }
        }

        debug!(
            generation = state.generation,
            inputs = inputs.len(),
            outputs = outputs.len(),
            rounds = escalated.rounds(),
            "Observed previous generation"
        );

        let graph = state.graph();
        Self {
            state,
            graph,
            inputs,
            outputs,
        }
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    pub fn graph(&self) -> &AssociationGraph {
        &self.graph
    }

    pub fn input(&self, id: &ResourceId) -> Option<&InputRecord> {
        self.state.inputs.get(id)
    }

    pub fn output(&self, id: &ResourceId) -> Option<&OutputRecord> {
        self.state.outputs.get(id)
    }

    /// Effective status of a recorded input.
    pub fn input_status(&self, id: &ResourceId) -> Option<ResourceStatus> {
        self.inputs.get(id).copied()
    }

    /// Own status of a recorded output.
    pub fn output_status(&self, id: &ResourceId) -> Option<ResourceStatus> {
        self.outputs.get(id).copied()
    }

    pub fn input_ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.state.inputs.keys()
    }

    pub fn output_ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.state.outputs.keys()
    }
}

/// A resource that cannot be statted counts as changed; the build goes on.
fn observe_one(resolver: &StatusResolver, path: &Path, recorded: &ResourceStat) -> ResourceStatus {
    match resolver.resolve(path, Some(recorded)) {
        Ok(resolution) => resolution.status,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot stat recorded resource");
            ResourceStatus::Modified
        }
    }
}
