//! Build state records and the metadata store
//!
//! A [`BuildState`] is the full record set of one generation. It is loaded read-only
//! when a build opens and replaced as a whole when the build closes.

pub mod attributes;
pub mod persistence;

pub use attributes::Attributes;
pub use persistence::FileStateStore;

use crate::error::StorageError;
use crate::graph::AssociationGraph;
use crate::messages::Message;
use crate::resource::ResourceStat;
use crate::types::{ResourceId, ResourceStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Recorded state of one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub id: ResourceId,
    pub stat: ResourceStat,
    /// Status the input had when this record was written.
    pub status: ResourceStatus,
    pub includes: BTreeSet<ResourceId>,
    pub outputs: BTreeSet<ResourceId>,
    pub attributes: Attributes,
    pub messages: Vec<Message>,
    /// Generation in which the input was last processed.
    pub generation: u64,
}

/// Recorded state of one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: ResourceId,
    pub stat: ResourceStat,
    pub status: ResourceStatus,
    pub inputs: BTreeSet<ResourceId>,
    pub attributes: Attributes,
    pub generation: u64,
}

/// The full record set of one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    pub generation: u64,
    pub inputs: BTreeMap<ResourceId, InputRecord>,
    pub outputs: BTreeMap<ResourceId, OutputRecord>,
    /// Stat of every included resource as seen when its includer was processed.
    pub included: BTreeMap<ResourceId, ResourceStat>,
}

impl BuildState {
    /// Record tables equal, ignoring the generation counter.
    pub fn same_records(&self, other: &BuildState) -> bool {
        self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.included == other.included
    }

    /// Rebuild the association graph recorded in this state.
    pub fn graph(&self) -> AssociationGraph {
        let mut graph = AssociationGraph::new();
        for (id, record) in &self.inputs {
            for output in &record.outputs {
                graph.associate_output(id, output);
            }
            for included in &record.includes {
                graph.associate_included(id, included);
            }
        }
        graph
    }

    /// Messages recorded per input.
    pub fn messages(&self) -> BTreeMap<ResourceId, Vec<Message>> {
        self.inputs
            .iter()
            .filter(|(_, record)| !record.messages.is_empty())
            .map(|(id, record)| (id.clone(), record.messages.clone()))
            .collect()
    }

    /// Check that input and output records agree on every association.
    pub fn associations_symmetric(&self) -> bool {
        let forward = self.inputs.values().all(|input| {
            input.outputs.iter().all(|o| {
                self.outputs
                    .get(o)
                    .is_some_and(|out| out.inputs.contains(&input.id))
            })
        });
        let backward = self.outputs.values().all(|output| {
            output.inputs.iter().all(|i| {
                self.inputs
                    .get(i)
                    .is_some_and(|input| input.outputs.contains(&output.id))
            })
        });
        forward && backward
    }
}

/// Persistence seam for build state.
pub trait MetadataStore: Send + Sync {
    /// Load the last committed state, `None` if nothing was ever committed.
    fn load(&self) -> Result<Option<BuildState>, StorageError>;

    /// Commit `state`, atomically replacing the previous one.
    fn save(&self, state: &BuildState) -> Result<(), StorageError>;
}

/// In-memory store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<BuildState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<BuildState> {
        self.state.lock().clone()
    }
}

impl MetadataStore for MemoryStateStore {
    fn load(&self) -> Result<Option<BuildState>, StorageError> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &BuildState) -> Result<(), StorageError> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }
}
