//! Closing a build: assemble the next generation, commit it, clean up.
//!
//! Order matters. The new state is saved before any file is deleted, so a failed save
//! leaves both the previous snapshot and the outputs on disk as they were.

use super::current::{CurrentGeneration, CurrentInput, WriteState};
use super::BuildContext;
use crate::error::BuildError;
use crate::messages::Message;
use crate::resource::ResourceStat;
use crate::store::{Attributes, BuildState, InputRecord, OutputRecord};
use crate::types::{ResourceId, ResourceStatus, Severity};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};

/// What a closed build produced.
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    /// Generation now on record.
    pub generation: u64,
    /// False when the record tables were unchanged and nothing was written.
    pub state_changed: bool,
    pub deleted_outputs: Vec<PathBuf>,
    /// Paths a batch registration skipped because they could not be resolved.
    pub skipped_inputs: Vec<PathBuf>,
    pub errors: Vec<(ResourceId, Message)>,
    pub warnings: Vec<(ResourceId, Message)>,
    /// Number of messages carried over from the previous build.
    pub replayed: usize,
}

impl BuildOutcome {
    /// A build fails iff an ERROR message exists anywhere in the new generation.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// An input that survives into the next generation.
enum Live {
    Processed(CurrentInput),
    /// Registered but not processed: the previous record carries over.
    Carried(InputRecord),
}

#[instrument(skip_all, fields(previous = ctx.previous.generation()))]
pub(super) fn finalize(
    ctx: &BuildContext,
    current: CurrentGeneration,
) -> Result<BuildOutcome, BuildError> {
    let CurrentGeneration {
        inputs,
        outputs,
        mut graph,
        journal,
        skipped,
    } = current;
    let previous = &ctx.previous;
    let next_generation = previous.generation() + 1;
    let registered_ids: BTreeSet<ResourceId> = outputs.keys().cloned().collect();

    // Inputs whose processing left an output half written are not recorded, so the
    // next build sees them as NEW and processes them again.
    let mut invalid = Vec::new();
    let mut failed = BTreeSet::new();
    let mut registered = BTreeMap::new();
    for (id, output) in outputs {
        let stat = match output.write {
            WriteState::Finalized(stat) => Some(stat),
            WriteState::Untouched => {
                match ResourceStat::capture(id.path(), ctx.digests_enabled()) {
                    Ok(stat) => stat,
                    Err(e) => {
                        warn!(output = %id, error = %e, "Cannot stat output");
                        None
                    }
                }
            }
            WriteState::Open | WriteState::Discarded => {
                failed.extend(graph.inputs_of(&id).cloned());
                invalid.push(id.clone());
                None
            }
        };
        match stat {
            Some(stat) => {
                registered.insert(id, (stat, output.attributes));
            }
            None => {
                debug!(output = %id, "Excluding output without valid content");
                graph.remove_output(&id);
            }
        }
    }

    let mut live = BTreeMap::new();
    let mut dropped = Vec::new();
    for (id, input) in inputs {
        if input.processed && failed.contains(&id) {
            warn!(resource = %id, "Input produced an invalid output; not recording it");
            graph.remove_input(&id);
            dropped.push(id);
            continue;
        }
        if input.processed {
            live.insert(id, Live::Processed(input));
            continue;
        }
        match previous.input(&id) {
            Some(record) => {
                let mut record = record.clone();
                if input.status.is_unmodified() {
                    record.stat = input.stat;
                }
                live.insert(id, Live::Carried(record));
            }
            None => {
                debug!(resource = %id, "Not recording unprocessed new input");
                graph.remove_input(&id);
            }
        }
    }

    // Carried inputs keep their old outputs unless this build registered them anew.
    for (id, entry) in &live {
        if let Live::Carried(record) = entry {
            for output in &record.outputs {
                if !registered_ids.contains(output) && previous.output(output).is_some() {
                    graph.associate_output(id, output);
                }
            }
            for included in &record.includes {
                graph.associate_included(id, included);
            }
        }
    }

    let mut next_outputs = BTreeMap::new();
    for (id, (stat, attributes)) in registered {
        let record = output_record(ctx, &id, stat, attributes, &graph, next_generation);
        next_outputs.insert(id, record);
    }
    for id in graph.outputs() {
        if next_outputs.contains_key(id) {
            continue;
        }
        if let Some(record) = previous.output(id) {
            let mut record = record.clone();
            record.inputs = graph.inputs_of(id).cloned().collect();
            next_outputs.insert(id.clone(), record);
        }
    }

    let sealed = journal.seal(live.keys(), &dropped);
    let mut next_inputs = BTreeMap::new();
    let mut included = BTreeMap::new();
    for (id, entry) in live {
        let outputs: BTreeSet<_> = graph.outputs_of(&id).cloned().collect();
        let messages = sealed.entries.get(&id).cloned().unwrap_or_default();
        let record = match entry {
            Live::Processed(input) => {
                let mut stat = input.stat;
                if ctx.digests_enabled() {
                    if let Err(e) = stat.ensure_digest(id.path()) {
                        warn!(resource = %id, error = %e, "Cannot digest input");
                    }
                }
                included.extend(input.included);
                let record = InputRecord {
                    id: id.clone(),
                    stat,
                    status: input.status,
                    includes: graph.includes_of(&id).cloned().collect(),
                    outputs,
                    attributes: input.attributes,
                    messages,
                    generation: next_generation,
                };
                match previous.input(&id) {
                    Some(prev) if same_input(prev, &record) => prev.clone(),
                    _ => record,
                }
            }
            Live::Carried(mut record) => {
                for inc in &record.includes {
                    if let Some(stat) = previous.state().included.get(inc) {
                        included.insert(inc.clone(), stat.clone());
                    }
                }
                record.outputs = outputs;
                record.messages = messages;
                record
            }
        };
        next_inputs.insert(id, record);
    }

    let mut state = BuildState {
        generation: next_generation,
        inputs: next_inputs,
        outputs: next_outputs,
        included,
    };
    debug_assert!(state.associations_symmetric());

    let changed = !state.same_records(previous.state());
    if changed {
        ctx.store.save(&state).map_err(|e| {
            error!(error = %e, "Failed to commit build state; previous generation stays authoritative");
            BuildError::Persistence(e)
        })?;
    } else {
        state.generation = previous.generation();
        debug!(generation = state.generation, "Build state unchanged; nothing to commit");
    }

    let mut doomed: BTreeSet<&ResourceId> = invalid.iter().collect();
    if ctx.config.delete_orphans {
        doomed.extend(previous.output_ids().filter(|id| !state.outputs.contains_key(*id)));
    }
    let deleted_outputs = delete_outputs(doomed);

    for (id, message) in &sealed.replayed {
        replay(id, message);
    }

    let outcome = BuildOutcome {
        generation: state.generation,
        state_changed: changed,
        deleted_outputs,
        skipped_inputs: skipped,
        errors: sealed.with_severity(Severity::Error),
        warnings: sealed.with_severity(Severity::Warning),
        replayed: sealed.replayed.len(),
    };

    info!(
        generation = outcome.generation,
        changed = outcome.state_changed,
        inputs = state.inputs.len(),
        outputs = state.outputs.len(),
        deleted = outcome.deleted_outputs.len(),
        skipped = outcome.skipped_inputs.len(),
        errors = outcome.errors.len(),
        warnings = outcome.warnings.len(),
        "Closed build context"
    );
    Ok(outcome)
}

fn output_record(
    ctx: &BuildContext,
    id: &ResourceId,
    stat: ResourceStat,
    attributes: Attributes,
    graph: &crate::graph::AssociationGraph,
    generation: u64,
) -> OutputRecord {
    let inputs: BTreeSet<ResourceId> = graph.inputs_of(id).cloned().collect();
    match ctx.previous.output(id) {
        Some(prev) if prev.stat == stat && prev.inputs == inputs && prev.attributes == attributes => {
            prev.clone()
        }
        prev => OutputRecord {
            id: id.clone(),
            status: if prev.is_some() {
                ResourceStatus::Modified
            } else {
                ResourceStatus::New
            },
            stat,
            inputs,
            attributes,
            generation,
        },
    }
}

/// Reprocessing that reproduced the previous record exactly keeps that record.
fn same_input(prev: &InputRecord, next: &InputRecord) -> bool {
    prev.stat == next.stat
        && prev.includes == next.includes
        && prev.outputs == next.outputs
        && prev.attributes == next.attributes
        && prev.messages == next.messages
}

fn delete_outputs<'a>(doomed: impl IntoIterator<Item = &'a ResourceId>) -> Vec<PathBuf> {
    let mut deleted = Vec::new();
    for id in doomed {
        match fs::remove_file(id.path()) {
            Ok(()) => {
                info!(output = %id, "Deleted output");
                deleted.push(id.path().to_path_buf());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(output = %id, error = %e, "Failed to delete output"),
        }
    }
    deleted
}

fn replay(id: &ResourceId, message: &Message) {
    let cause = message.cause.as_deref().unwrap_or("");
    match message.severity {
        Severity::Error => error!(
            resource = %id,
            line = message.line,
            column = message.column,
            cause,
            "{}",
            message.text
        ),
        Severity::Warning => warn!(
            resource = %id,
            line = message.line,
            column = message.column,
            cause,
            "{}",
            message.text
        ),
    }
}
