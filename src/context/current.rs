//! Mutable state of the generation being built.

use crate::graph::AssociationGraph;
use crate::messages::MessageJournal;
use crate::resource::ResourceStat;
use crate::store::Attributes;
use crate::types::{ResourceId, ResourceStatus};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// An input registered with the open build.
#[derive(Debug, Clone)]
pub(crate) struct CurrentInput {
    pub stat: ResourceStat,
    /// Effective status at registration.
    pub status: ResourceStatus,
    pub processed: bool,
    pub attributes: Attributes,
    /// Stat of each included resource as seen when it was associated.
    pub included: BTreeMap<ResourceId, ResourceStat>,
}

/// Where an output's content stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteState {
    /// No stream was opened; whatever is on disk is taken as is.
    Untouched,
    /// A stream is open. Still open at close means it was leaked.
    Open,
    Finalized(ResourceStat),
    /// A stream was dropped without finishing.
    Discarded,
}

#[derive(Debug, Clone)]
pub(crate) struct CurrentOutput {
    pub write: WriteState,
    pub attributes: Attributes,
}

impl CurrentOutput {
    pub fn new() -> Self {
        Self {
            write: WriteState::Untouched,
            attributes: Attributes::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct CurrentGeneration {
    pub inputs: BTreeMap<ResourceId, CurrentInput>,
    pub outputs: BTreeMap<ResourceId, CurrentOutput>,
    pub graph: AssociationGraph,
    pub journal: MessageJournal,
    /// Batch registrations that could not be resolved.
    pub skipped: Vec<PathBuf>,
}

impl CurrentGeneration {
    pub fn new(journal: MessageJournal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }
}
