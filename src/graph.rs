//! Input/output association graph
//!
//! Many-to-many input↔output edges kept symmetric by construction, plus directed
//! input→included-resource edges consumed only by escalation. One graph exists per
//! generation.

use crate::types::ResourceId;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationGraph {
    outputs_by_input: BTreeMap<ResourceId, BTreeSet<ResourceId>>,
    inputs_by_output: BTreeMap<ResourceId, BTreeSet<ResourceId>>,
    includes_by_input: BTreeMap<ResourceId, BTreeSet<ResourceId>>,
}

impl AssociationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input↔output edge. Returns false if it already existed.
    pub fn associate_output(&mut self, input: &ResourceId, output: &ResourceId) -> bool {
        let added = self
            .outputs_by_input
            .entry(input.clone())
            .or_default()
            .insert(output.clone());
        self.inputs_by_output
            .entry(output.clone())
            .or_default()
            .insert(input.clone());
        added
    }

    /// Add a directed input→included edge. Returns false if it already existed.
    pub fn associate_included(&mut self, input: &ResourceId, included: &ResourceId) -> bool {
        self.includes_by_input
            .entry(input.clone())
            .or_default()
            .insert(included.clone())
    }

    pub fn outputs_of(&self, input: &ResourceId) -> impl Iterator<Item = &ResourceId> {
        self.outputs_by_input.get(input).into_iter().flatten()
    }

    pub fn inputs_of(&self, output: &ResourceId) -> impl Iterator<Item = &ResourceId> {
        self.inputs_by_output.get(output).into_iter().flatten()
    }

    pub fn includes_of(&self, input: &ResourceId) -> impl Iterator<Item = &ResourceId> {
        self.includes_by_input.get(input).into_iter().flatten()
    }

    /// Every output that has at least one edge.
    pub fn outputs(&self) -> impl Iterator<Item = &ResourceId> {
        self.inputs_by_output
            .iter()
            .filter(|(_, inputs)| !inputs.is_empty())
            .map(|(output, _)| output)
    }

    /// Drop an output and every edge touching it.
    pub fn remove_output(&mut self, output: &ResourceId) {
        if let Some(inputs) = self.inputs_by_output.remove(output) {
            for input in inputs {
                if let Some(outputs) = self.outputs_by_input.get_mut(&input) {
                    outputs.remove(output);
                    if outputs.is_empty() {
                        self.outputs_by_input.remove(&input);
                    }
                }
            }
        }
    }

    /// Drop an input with its output and include edges.
    pub fn remove_input(&mut self, input: &ResourceId) {
        self.includes_by_input.remove(input);
        if let Some(outputs) = self.outputs_by_input.remove(input) {
            for output in outputs {
                if let Some(inputs) = self.inputs_by_output.get_mut(&output) {
                    inputs.remove(input);
                    if inputs.is_empty() {
                        self.inputs_by_output.remove(&output);
                    }
                }
            }
        }
    }

    /// Check that both edge directions agree.
    pub fn is_symmetric(&self) -> bool {
        let forward = self.outputs_by_input.iter().all(|(input, outputs)| {
            outputs.iter().all(|output| {
                self.inputs_by_output
                    .get(output)
                    .is_some_and(|inputs| inputs.contains(input))
            })
        });
        let backward = self.inputs_by_output.iter().all(|(output, inputs)| {
            inputs.iter().all(|input| {
                self.outputs_by_input
                    .get(input)
                    .is_some_and(|outputs| outputs.contains(output))
            })
        });
        forward && backward
    }
}
