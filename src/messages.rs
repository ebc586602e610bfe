//! Diagnostic message journal
//!
//! Messages are attached to resources and carried from one generation to the next
//! until the resource is reprocessed. Reprocessing clears a resource's messages; only
//! what is added again during this build survives.

use crate::types::{ResourceId, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;

/// One diagnostic attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub line: u32,
    pub column: u32,
    pub text: String,
    pub severity: Severity,
    /// Rendered error chain of the cause, if any.
    pub cause: Option<String>,
}

impl Message {
    pub fn new(line: u32, column: u32, text: impl Into<String>, severity: Severity) -> Self {
        Self {
            line,
            column,
            text: text.into(),
            severity,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: &(dyn Error + 'static)) -> Self {
        self.cause = Some(render_chain(cause));
        self
    }
}

fn render_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        source = inner.source();
    }
    rendered
}

#[derive(Debug, Clone, Default)]
pub struct MessageJournal {
    previous: BTreeMap<ResourceId, Vec<Message>>,
    current: BTreeMap<ResourceId, Vec<Message>>,
    reprocessed: BTreeSet<ResourceId>,
}

impl MessageJournal {
    pub fn new(previous: BTreeMap<ResourceId, Vec<Message>>) -> Self {
        Self {
            previous,
            current: BTreeMap::new(),
            reprocessed: BTreeSet::new(),
        }
    }

    /// Start reprocessing a resource: its carried messages are dropped.
    pub fn begin_reprocessing(&mut self, id: &ResourceId) {
        if self.reprocessed.insert(id.clone()) {
            self.current.remove(id);
        }
    }

    /// Append to the resource's current record. Without reprocessing, the record
    /// starts from the carried messages.
    pub fn add(&mut self, id: &ResourceId, message: Message) {
        let reprocessed = self.reprocessed.contains(id);
        let previous = &self.previous;
        self.current
            .entry(id.clone())
            .or_insert_with(|| {
                if reprocessed {
                    Vec::new()
                } else {
                    previous.get(id).cloned().unwrap_or_default()
                }
            })
            .push(message);
    }

    /// Messages recorded in the previous generation.
    pub fn previous_messages(&self, id: &ResourceId) -> &[Message] {
        self.previous.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Messages the resource will carry into the next generation.
    pub fn messages(&self, id: &ResourceId) -> Vec<Message> {
        if let Some(current) = self.current.get(id) {
            return current.clone();
        }
        if self.reprocessed.contains(id) {
            Vec::new()
        } else {
            self.previous.get(id).cloned().unwrap_or_default()
        }
    }

    /// Close the journal over the live resources of the new generation.
    ///
    /// `dropped` are processed resources left out of the new generation. Their
    /// messages are not carried forward but still count towards the outcome.
    pub fn seal<'a>(
        &self,
        live: impl IntoIterator<Item = &'a ResourceId>,
        dropped: impl IntoIterator<Item = &'a ResourceId>,
    ) -> SealedJournal {
        let mut entries = BTreeMap::new();
        let mut replayed = Vec::new();
        for id in live {
            let messages = self.messages(id);
            if messages.is_empty() {
                continue;
            }
            if !self.reprocessed.contains(id) {
                let carried = self.previous.get(id).map(Vec::len).unwrap_or(0);
                for message in messages.iter().take(carried) {
                    replayed.push((id.clone(), message.clone()));
                }
            }
            entries.insert(id.clone(), messages);
        }
        let unrecorded = dropped
            .into_iter()
            .filter_map(|id| self.current.get(id).map(|m| (id.clone(), m.clone())))
            .filter(|(_, messages)| !messages.is_empty())
            .collect();
        SealedJournal {
            entries,
            unrecorded,
            replayed,
        }
    }
}

/// Final message set of a generation.
#[derive(Debug, Clone, Default)]
pub struct SealedJournal {
    pub entries: BTreeMap<ResourceId, Vec<Message>>,
    /// Messages of resources that are not recorded in the new generation.
    pub unrecorded: BTreeMap<ResourceId, Vec<Message>>,
    /// Messages carried forward unchanged from the previous generation.
    pub replayed: Vec<(ResourceId, Message)>,
}

impl SealedJournal {
    /// Messages of one severity, recorded or not.
    pub fn with_severity(&self, severity: Severity) -> Vec<(ResourceId, Message)> {
        self.entries
            .iter()
            .chain(&self.unrecorded)
            .flat_map(|(id, messages)| {
                messages
                    .iter()
                    .filter(move |m| m.severity == severity)
                    .map(move |m| (id.clone(), m.clone()))
            })
            .collect()
    }
}
