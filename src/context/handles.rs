//! Typed views over input and output records.
//!
//! A metadata view is read-only and bound to either the current or the previous
//! generation. The read-write views (`Input`, `Output`) always target the current
//! generation and deref to their metadata view.

use super::stream::OutputStream;
use super::BuildContext;
use crate::error::BuildError;
use crate::messages::Message;
use crate::types::{Generation, ResourceId, ResourceStatus};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::ops::Deref;
use std::path::Path;

/// Read-only view of an input.
#[derive(Clone)]
pub struct InputMetadata<'a> {
    ctx: &'a BuildContext,
    id: ResourceId,
    generation: Generation,
}

impl<'a> InputMetadata<'a> {
    pub(crate) fn new(ctx: &'a BuildContext, id: ResourceId, generation: Generation) -> Self {
        Self {
            ctx,
            id,
            generation,
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn resource(&self) -> &Path {
        self.id.path()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Effective status: covers the input itself, its included resources and the
    /// outputs it was associated with.
    pub fn status(&self) -> ResourceStatus {
        self.ctx.input_status(&self.id)
    }

    pub fn is_processing_required(&self) -> bool {
        !self.status().is_unmodified()
    }

    /// Outputs associated in the bound generation.
    pub fn associated_outputs(&self) -> Vec<OutputMetadata<'a>> {
        self.ctx
            .outputs_of(&self.id, self.generation)
            .into_iter()
            .map(|id| OutputMetadata::new(self.ctx, id, self.generation))
            .collect()
    }

    /// Resources included in the bound generation.
    pub fn included_inputs(&self) -> Vec<ResourceId> {
        self.ctx.includes_of(&self.id, self.generation)
    }

    /// Value recorded by the previous build.
    pub fn get_value<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, BuildError> {
        self.ctx.load_value(&self.id, key)
    }

    /// Messages of the bound generation.
    pub fn messages(&self) -> Vec<Message> {
        self.ctx.messages_of(&self.id, self.generation)
    }

    /// Start processing: carried messages are dropped and the record becomes mutable.
    pub fn process(&self) -> Result<Input<'a>, BuildError> {
        self.ctx.process_input(&self.id)?;
        Ok(Input {
            metadata: InputMetadata::new(self.ctx, self.id.clone(), Generation::Current),
        })
    }
}

impl std::fmt::Debug for InputMetadata<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputMetadata")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// An input being processed in this build.
#[derive(Debug, Clone)]
pub struct Input<'a> {
    metadata: InputMetadata<'a>,
}

impl<'a> Input<'a> {
    /// Register `path` as an output and associate it with this input.
    pub fn associate_output(&self, path: impl AsRef<Path>) -> Result<Output<'a>, BuildError> {
        let output = self.metadata.ctx.register_output(path)?;
        self.metadata.ctx.link(&self.metadata.id, output.id())?;
        Ok(output)
    }

    /// Associate an output registered elsewhere, e.g. an aggregate.
    pub fn associate_with(&self, output: &Output<'_>) -> Result<(), BuildError> {
        self.metadata.ctx.link(&self.metadata.id, output.id())
    }

    pub fn associate_included_input(&self, path: impl AsRef<Path>) -> Result<(), BuildError> {
        self.metadata.ctx.include(&self.metadata.id, path.as_ref())
    }

    pub fn set_value<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<(), BuildError> {
        self.metadata.ctx.store_value(&self.metadata.id, key, value)
    }

    pub fn add_message(&self, message: Message) -> Result<(), BuildError> {
        self.metadata.ctx.record_message(&self.metadata.id, message)
    }

    pub fn is_processed(&self) -> bool {
        self.metadata.ctx.is_processed(&self.metadata.id)
    }
}

impl<'a> Deref for Input<'a> {
    type Target = InputMetadata<'a>;

    fn deref(&self) -> &Self::Target {
        &self.metadata
    }
}

/// Read-only view of an output.
#[derive(Clone)]
pub struct OutputMetadata<'a> {
    ctx: &'a BuildContext,
    id: ResourceId,
    generation: Generation,
}

impl<'a> OutputMetadata<'a> {
    pub(crate) fn new(ctx: &'a BuildContext, id: ResourceId, generation: Generation) -> Self {
        Self {
            ctx,
            id,
            generation,
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn resource(&self) -> &Path {
        self.id.path()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Own status against the previous build. Associated inputs are not considered.
    pub fn status(&self) -> ResourceStatus {
        self.ctx.output_status(&self.id)
    }

    /// Inputs associated in the bound generation.
    pub fn associated_inputs(&self) -> Vec<InputMetadata<'a>> {
        self.ctx
            .inputs_of(&self.id, self.generation)
            .into_iter()
            .map(|id| InputMetadata::new(self.ctx, id, self.generation))
            .collect()
    }

    /// True when the output itself or any associated input is not UNMODIFIED.
    pub fn is_processing_required(&self) -> bool {
        !self.status().is_unmodified()
            || self
                .associated_inputs()
                .iter()
                .any(InputMetadata::is_processing_required)
    }

    pub fn get_value<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, BuildError> {
        self.ctx.load_value(&self.id, key)
    }
}

impl std::fmt::Debug for OutputMetadata<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputMetadata")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// An output registered with this build.
#[derive(Debug, Clone)]
pub struct Output<'a> {
    metadata: OutputMetadata<'a>,
}

impl<'a> Output<'a> {
    pub(crate) fn new(ctx: &'a BuildContext, id: ResourceId) -> Self {
        Self {
            metadata: OutputMetadata::new(ctx, id, Generation::Current),
        }
    }

    /// Open a stream that replaces the output's content on
    /// [`finish`](OutputStream::finish). Dropping it unfinished invalidates the output.
    pub fn new_output_stream(&self) -> Result<OutputStream<'a>, BuildError> {
        OutputStream::open(self.metadata.ctx, self.metadata.id.clone())
    }

    /// Write the whole content through `write`. Any error discards the output.
    pub fn write_with<F>(&self, write: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
    {
        let mut stream = self.new_output_stream()?;
        write(&mut stream)?;
        stream.finish()
    }

    pub fn associate_input(&self, input: &InputMetadata<'_>) -> Result<(), BuildError> {
        self.metadata.ctx.link(input.id(), &self.metadata.id)
    }

    pub fn set_value<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<(), BuildError> {
        self.metadata.ctx.store_value(&self.metadata.id, key, value)
    }
}

impl<'a> Deref for Output<'a> {
    type Target = OutputMetadata<'a>;

    fn deref(&self) -> &Self::Target {
        &self.metadata
    }
}
