//! Status escalation over dependency edges
//!
//! A node whose own stat is unchanged is still MODIFIED when anything it depends on,
//! directly or transitively, is NEW, MODIFIED or REMOVED. Propagation runs to a fixed
//! point over the edge list instead of recursing, so include cycles terminate and every
//! member of a cycle containing a changed node escalates together.

use crate::types::ResourceStatus;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct EscalationEngine<N> {
    own: BTreeMap<N, ResourceStatus>,
    edges: BTreeMap<N, BTreeSet<N>>,
}

impl<N: Ord + Clone + Debug> Default for EscalationEngine<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Ord + Clone + Debug> EscalationEngine<N> {
    pub fn new() -> Self {
        Self {
            own: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    /// Record a node's own status (from its stat alone).
    pub fn set_status(&mut self, node: N, status: ResourceStatus) {
        self.own.insert(node, status);
    }

    /// `dependent` must be rebuilt when `dependency` changes.
    pub fn add_dependency(&mut self, dependent: N, dependency: N) {
        self.edges.entry(dependent).or_default().insert(dependency);
    }

    pub fn node_count(&self) -> usize {
        self.own.len()
    }

    /// Compute effective statuses for every node with an own status.
    ///
    /// Dependencies without a recorded status count as changed.
    pub fn resolve(&self) -> Escalated<N> {
        let mut changed: BTreeSet<&N> = self
            .own
            .iter()
            .filter(|(_, status)| !status.is_unmodified())
            .map(|(node, _)| node)
            .collect();
        for targets in self.edges.values() {
            for target in targets {
                if !self.own.contains_key(target) {
                    changed.insert(target);
                }
            }
        }

        // Each round either escalates at least one node or ends, so the node count
        // bounds the number of rounds.
        let bound = self.own.len() + 1;
        let mut rounds = 0;
        while rounds < bound {
            rounds += 1;
            let mut escalated = Vec::new();
            for (node, targets) in &self.edges {
                if changed.contains(node) || !self.own.contains_key(node) {
                    continue;
                }
                if targets.iter().any(|t| changed.contains(t)) {
                    escalated.push(node);
                }
            }
            if escalated.is_empty() {
                break;
            }
            changed.extend(escalated);
        }
        debug!(nodes = self.own.len(), rounds, "Escalation reached fixed point");

        let effective = self
            .own
            .iter()
            .map(|(node, own)| {
                let status = if own.is_unmodified() && changed.contains(node) {
                    ResourceStatus::Modified
                } else {
                    *own
                };
                (node.clone(), status)
            })
            .collect();
        Escalated { effective, rounds }
    }
}

/// Result of escalation.
#[derive(Debug, Clone)]
pub struct Escalated<N> {
    effective: BTreeMap<N, ResourceStatus>,
    rounds: usize,
}

impl<N: Ord> Escalated<N> {
    pub fn status(&self, node: &N) -> Option<ResourceStatus> {
        self.effective.get(node).copied()
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }
}
