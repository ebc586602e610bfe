//! Build context
//!
//! One [`BuildContext`] per build invocation. It loads the previous generation once,
//! hands out typed handles over inputs and outputs, and on [`BuildContext::close`]
//! commits the next generation and reports the outcome.
//!
//! All operations take `&self`; the current generation sits behind a mutex so
//! independent inputs can be processed from several threads. Closing takes `&mut self`,
//! which ends every outstanding handle and stream borrow first.

mod current;
mod finalize;
mod handles;
mod previous;
mod stream;

pub use finalize::BuildOutcome;
pub use handles::{Input, InputMetadata, Output, OutputMetadata};
pub use stream::OutputStream;

use crate::config::{BuildConfig, ConfigLoader};
use crate::error::BuildError;
use crate::messages::{Message, MessageJournal};
use crate::resource::{path, ResourceStat};
use crate::status::StatusResolver;
use crate::store::{FileStateStore, MetadataStore};
use crate::types::{Generation, ResourceId, ResourceStatus};
use current::{CurrentGeneration, CurrentInput, CurrentOutput, WriteState};
use parking_lot::Mutex;
use previous::PreviousGeneration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Context lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Open,
    Closing,
    Closed,
}

impl Lifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Open => "open",
            Lifecycle::Closing => "closing",
            Lifecycle::Closed => "closed",
        }
    }
}

pub struct BuildContext {
    build_root: PathBuf,
    config: BuildConfig,
    resolver: StatusResolver,
    store: Arc<dyn MetadataStore>,
    previous: PreviousGeneration,
    current: Mutex<CurrentGeneration>,
    lifecycle: Lifecycle,
}

impl BuildContext {
    /// Open a build rooted at `build_root` with layered configuration and the
    /// file-backed store.
    pub fn open(build_root: impl AsRef<Path>) -> Result<Self, BuildError> {
        let build_root = build_root.as_ref();
        let config = ConfigLoader::load(build_root)?;
        Self::with_config(build_root, config)
    }

    pub fn with_config(
        build_root: impl AsRef<Path>,
        config: BuildConfig,
    ) -> Result<Self, BuildError> {
        let build_root = build_root.as_ref();
        let store = Arc::new(FileStateStore::new(config.state_path(build_root)));
        Self::with_store(build_root, config, store)
    }

    /// Open against an explicit metadata store.
    ///
    /// Fails with [`BuildError::Persistence`] when the previous generation cannot be
    /// read; nothing is written in that case.
    pub fn with_store(
        build_root: impl AsRef<Path>,
        config: BuildConfig,
        store: Arc<dyn MetadataStore>,
    ) -> Result<Self, BuildError> {
        config.validate()?;
        let root = build_root.as_ref();
        let build_root = dunce::canonicalize(root)
            .map_err(|e| BuildError::invalid(root, format!("build root: {}", e)))?;

        let state = store.load()?.unwrap_or_default();
        let resolver = StatusResolver::new(config.digest);
        let previous = PreviousGeneration::observe(state, &resolver);
        let journal = MessageJournal::new(previous.state().messages());

        info!(
            root = %build_root.display(),
            generation = previous.generation(),
            inputs = previous.state().inputs.len(),
            outputs = previous.state().outputs.len(),
            digest = ?config.digest,
            "Opened build context"
        );

        Ok(Self {
            build_root,
            config,
            resolver,
            store,
            previous,
            current: Mutex::new(CurrentGeneration::new(journal)),
            lifecycle: Lifecycle::Open,
        })
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Generation number of the loaded snapshot, 0 for a first build.
    pub fn previous_generation(&self) -> u64 {
        self.previous.generation()
    }


    /// Register one input and resolve its effective status.
    pub fn register_input(&self, path: impl AsRef<Path>) -> Result<InputMetadata<'_>, BuildError> {
        self.ensure_open()?;
        let id = self.register_input_id(path.as_ref())?;
        Ok(InputMetadata::new(self, id, Generation::Current))
    }

    /// Register every path. Paths that cannot be resolved are skipped with a warning
    /// and reported in the [`BuildOutcome`]; the rest are registered.
    pub fn register_inputs<I, P>(&self, paths: I) -> Result<Vec<InputMetadata<'_>>, BuildError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut registered = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match self.register_input(path) {
                Ok(input) => registered.push(input),
                Err(e @ BuildError::NotOpen(_)) => return Err(e),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping input");
                    self.current.lock().skipped.push(self.absolutize(path));
                }
            }
        }
        Ok(registered)
    }

    /// Register every path and start processing those whose effective status is not
    /// UNMODIFIED. Unchanged inputs are registered but not returned.
    pub fn register_inputs_for_processing<I, P>(&self, paths: I) -> Result<Vec<Input<'_>>, BuildError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let registered = self.register_inputs(paths)?;
        let total = registered.len();
        let mut selected = Vec::new();
        for input in registered {
            if input.is_processing_required() {
                selected.push(input.process()?);
            }
        }
        debug!(
            registered = total,
            selected = selected.len(),
            "Selected inputs for processing"
        );
        Ok(selected)
    }

    /// Inputs registered in this build plus inputs only known to the previous one.
    pub fn registered_inputs(&self) -> Vec<InputMetadata<'_>> {
        let current = self.current.lock();
        let mut handles: Vec<_> = current
            .inputs
            .keys()
            .map(|id| InputMetadata::new(self, id.clone(), Generation::Current))
            .collect();
        handles.extend(
            self.previous
                .input_ids()
                .filter(|id| !current.inputs.contains_key(*id))
                .map(|id| InputMetadata::new(self, id.clone(), Generation::Previous)),
        );
        handles
    }


    /// Register an output of this build. Registering the same output twice returns
    /// the same record.
    pub fn register_output(&self, path: impl AsRef<Path>) -> Result<Output<'_>, BuildError> {
        self.ensure_open()?;
        let id = self.register_output_id(path.as_ref())?;
        Ok(Output::new(self, id))
    }

    /// Output as recorded by the previous build, `None` if it was not recorded.
    pub fn get_old_output(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Option<OutputMetadata<'_>>, BuildError> {
        self.ensure_open()?;
        let id = path::resource_id(&self.absolutize(path.as_ref()))?;
        Ok(self
            .previous
            .output(&id)
            .map(|_| OutputMetadata::new(self, id, Generation::Previous)))
    }

    /// Outputs registered in this build.
    pub fn processed_outputs(&self) -> Vec<OutputMetadata<'_>> {
        self.current
            .lock()
            .outputs
            .keys()
            .map(|id| OutputMetadata::new(self, id.clone(), Generation::Current))
            .collect()
    }


    /// Associate a registered input with an output, registering the output if needed.
    pub fn associate_output(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), BuildError> {
        self.ensure_open()?;
        let input = self.registered_input_id(input.as_ref())?;
        let output = self.register_output_id(output.as_ref())?;
        self.link(&input, &output)
    }

    /// Same edge as [`associate_output`](Self::associate_output), seen from the output.
    pub fn associate_input(
        &self,
        output: impl AsRef<Path>,
        input: impl AsRef<Path>,
    ) -> Result<(), BuildError> {
        self.associate_output(input, output)
    }

    /// Record that a processed input includes another resource.
    pub fn associate_included_input(
        &self,
        input: impl AsRef<Path>,
        included: impl AsRef<Path>,
    ) -> Result<(), BuildError> {
        self.ensure_open()?;
        let input = self.registered_input_id(input.as_ref())?;
        self.include(&input, included.as_ref())
    }


    /// Store a typed value on a processed input or a registered output.
    pub fn set_value<V: Serialize + ?Sized>(
        &self,
        resource: impl AsRef<Path>,
        key: &str,
        value: &V,
    ) -> Result<(), BuildError> {
        self.ensure_open()?;
        let id = path::resource_id(&self.absolutize(resource.as_ref()))?;
        self.store_value(&id, key, value)
    }

    /// Value recorded by the previous build. Resources without a previous record
    /// yield `Ok(None)`.
    pub fn get_value<V: DeserializeOwned>(
        &self,
        resource: impl AsRef<Path>,
        key: &str,
    ) -> Result<Option<V>, BuildError> {
        self.ensure_open()?;
        let id = path::resource_id(&self.absolutize(resource.as_ref()))?;
        self.load_value(&id, key)
    }

    /// Attach a diagnostic to an input being processed.
    pub fn add_message(&self, resource: impl AsRef<Path>, message: Message) -> Result<(), BuildError> {
        self.ensure_open()?;
        let id = self.registered_input_id(resource.as_ref())?;
        self.record_message(&id, message)
    }

    /// Commit the next generation and report the outcome.
    ///
    /// The context is closed afterwards whether or not this succeeds.
    pub fn close(&mut self) -> Result<BuildOutcome, BuildError> {
        self.ensure_open()?;
        self.lifecycle = Lifecycle::Closing;
        let current = std::mem::take(self.current.get_mut());
        let result = finalize::finalize(self, current);
        self.lifecycle = Lifecycle::Closed;
        result
    }


    fn ensure_open(&self) -> Result<(), BuildError> {
        match self.lifecycle {
            Lifecycle::Open => Ok(()),
            other => Err(BuildError::NotOpen(other.as_str())),
        }
    }

    fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.build_root.join(path)
        }
    }

    fn register_input_id(&self, path: &Path) -> Result<ResourceId, BuildError> {
        let id = path::input_id(&self.absolutize(path))?;
        if self.current.lock().inputs.contains_key(&id) {
            return Ok(id);
        }

        let recorded = self.previous.input(&id).map(|r| &r.stat);
        let resolution = self
            .resolver
            .resolve(id.path(), recorded)
            .map_err(|e| BuildError::invalid(id.path(), e.to_string()))?;
        let stat = resolution
            .stat
            .ok_or_else(|| BuildError::invalid(id.path(), "disappeared during registration"))?;
        // A change since open wins over the escalated status computed at open.
        let status = match (resolution.status, self.previous.input_status(&id)) {
            (ResourceStatus::Unmodified, Some(effective)) => effective,
            (own, _) => own,
        };

        self.current
            .lock()
            .inputs
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(resource = %id, %status, "Registered input");
                CurrentInput {
                    stat,
                    status,
                    processed: false,
                    attributes: Default::default(),
                    included: Default::default(),
                }
            });
        Ok(id)
    }

    fn registered_input_id(&self, path: &Path) -> Result<ResourceId, BuildError> {
        let id = path::resource_id(&self.absolutize(path))?;
        if self.current.lock().inputs.contains_key(&id) {
            Ok(id)
        } else {
            Err(BuildError::UnknownResource(id))
        }
    }

    fn register_output_id(&self, path: &Path) -> Result<ResourceId, BuildError> {
        let id = path::resource_id(&self.absolutize(path))?;
        self.current
            .lock()
            .outputs
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(resource = %id, "Registered output");
                CurrentOutput::new()
            });
        Ok(id)
    }

    pub(crate) fn process_input(&self, id: &ResourceId) -> Result<(), BuildError> {
        self.ensure_open()?;
        if !self.current.lock().inputs.contains_key(id) {
            self.register_input_id(id.path())?;
        }
        let mut guard = self.current.lock();
        let current = &mut *guard;
        let input = current
            .inputs
            .get_mut(id)
            .ok_or_else(|| BuildError::UnknownResource(id.clone()))?;
        if !input.processed {
            input.processed = true;
            current.journal.begin_reprocessing(id);
            debug!(resource = %id, status = %input.status, "Processing input");
        }
        Ok(())
    }

    pub(crate) fn link(&self, input: &ResourceId, output: &ResourceId) -> Result<(), BuildError> {
        self.ensure_open()?;
        let mut current = self.current.lock();
        if !current.inputs.contains_key(input) {
            return Err(BuildError::UnknownResource(input.clone()));
        }
        current
            .outputs
            .entry(output.clone())
            .or_insert_with(CurrentOutput::new);
        if current.graph.associate_output(input, output) {
            debug!(input = %input, output = %output, "Associated output");
        }
        Ok(())
    }

    pub(crate) fn include(&self, input: &ResourceId, path: &Path) -> Result<(), BuildError> {
        self.ensure_open()?;
        let included = path::resource_id(&self.absolutize(path))?;
        let stat = ResourceStat::capture(included.path(), self.resolver.digests_enabled())
            .map_err(|e| BuildError::invalid(included.path(), e.to_string()))?;

        let mut guard = self.current.lock();
        let current = &mut *guard;
        let record = current
            .inputs
            .get_mut(input)
            .ok_or_else(|| BuildError::UnknownResource(input.clone()))?;
        if !record.processed {
            return Err(BuildError::NotProcessed(input.clone()));
        }
        match stat {
            Some(stat) => {
                record.included.insert(included.clone(), stat);
            }
            None => warn!(input = %input, included = %included, "Included resource does not exist"),
        }
        current.graph.associate_included(input, &included);
        Ok(())
    }

    pub(crate) fn store_value<V: Serialize + ?Sized>(
        &self,
        id: &ResourceId,
        key: &str,
        value: &V,
    ) -> Result<(), BuildError> {
        self.ensure_open()?;
        let mut guard = self.current.lock();
        let current = &mut *guard;
        let attributes = if let Some(input) = current.inputs.get_mut(id) {
            if !input.processed {
                return Err(BuildError::NotProcessed(id.clone()));
            }
            &mut input.attributes
        } else if let Some(output) = current.outputs.get_mut(id) {
            &mut output.attributes
        } else {
            return Err(BuildError::UnknownResource(id.clone()));
        };
        attributes
            .set(key, value)
            .map_err(|e| BuildError::Attribute {
                resource: id.clone(),
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    pub(crate) fn load_value<V: DeserializeOwned>(
        &self,
        id: &ResourceId,
        key: &str,
    ) -> Result<Option<V>, BuildError> {
        let attributes = match (self.previous.input(id), self.previous.output(id)) {
            (Some(input), _) => &input.attributes,
            (None, Some(output)) => &output.attributes,
            (None, None) => return Ok(None),
        };
        attributes.get(key).map_err(|e| BuildError::Attribute {
            resource: id.clone(),
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    pub(crate) fn record_message(&self, id: &ResourceId, message: Message) -> Result<(), BuildError> {
        self.ensure_open()?;
        let mut guard = self.current.lock();
        let current = &mut *guard;
        match current.inputs.get(id) {
            None => return Err(BuildError::UnknownResource(id.clone())),
            Some(input) if !input.processed => return Err(BuildError::NotProcessed(id.clone())),
            Some(_) => {}
        }
        debug!(
            resource = %id,
            severity = ?message.severity,
            line = message.line,
            column = message.column,
            "Message added"
        );
        current.journal.add(id, message);
        Ok(())
    }

    /// Effective status of an input: as registered in this build, else as observed
    /// at open.
    pub(crate) fn input_status(&self, id: &ResourceId) -> ResourceStatus {
        if let Some(input) = self.current.lock().inputs.get(id) {
            return input.status;
        }
        self.previous
            .input_status(id)
            .unwrap_or(ResourceStatus::New)
    }

    pub(crate) fn output_status(&self, id: &ResourceId) -> ResourceStatus {
        self.previous
            .output_status(id)
            .unwrap_or(ResourceStatus::New)
    }

    pub(crate) fn is_processed(&self, id: &ResourceId) -> bool {
        self.current
            .lock()
            .inputs
            .get(id)
            .is_some_and(|input| input.processed)
    }

    pub(crate) fn outputs_of(&self, input: &ResourceId, generation: Generation) -> Vec<ResourceId> {
        match generation {
            Generation::Current => self.current.lock().graph.outputs_of(input).cloned().collect(),
            Generation::Previous => self.previous.graph().outputs_of(input).cloned().collect(),
        }
    }

    pub(crate) fn inputs_of(&self, output: &ResourceId, generation: Generation) -> Vec<ResourceId> {
        match generation {
            Generation::Current => self.current.lock().graph.inputs_of(output).cloned().collect(),
            Generation::Previous => self.previous.graph().inputs_of(output).cloned().collect(),
        }
    }

    pub(crate) fn includes_of(&self, input: &ResourceId, generation: Generation) -> Vec<ResourceId> {
        match generation {
            Generation::Current => self.current.lock().graph.includes_of(input).cloned().collect(),
            Generation::Previous => self.previous.graph().includes_of(input).cloned().collect(),
        }
    }

    pub(crate) fn messages_of(&self, id: &ResourceId, generation: Generation) -> Vec<Message> {
        let current = self.current.lock();
        match generation {
            Generation::Current => current.journal.messages(id),
            Generation::Previous => current.journal.previous_messages(id).to_vec(),
        }
    }

    pub(crate) fn begin_write(&self, output: &ResourceId) -> Result<(), BuildError> {
        self.ensure_open()?;
        let mut current = self.current.lock();
        let record = current
            .outputs
            .get_mut(output)
            .ok_or_else(|| BuildError::UnknownResource(output.clone()))?;
        record.write = WriteState::Open;
        Ok(())
    }

    pub(crate) fn finish_write(&self, output: &ResourceId, stat: ResourceStat) {
        if let Some(record) = self.current.lock().outputs.get_mut(output) {
            record.write = WriteState::Finalized(stat);
        }
    }

    pub(crate) fn discard_write(&self, output: &ResourceId) {
        if let Some(record) = self.current.lock().outputs.get_mut(output) {
            record.write = WriteState::Discarded;
        }
    }

    pub(crate) fn digests_enabled(&self) -> bool {
        self.resolver.digests_enabled()
    }
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        if self.lifecycle == Lifecycle::Open {
            warn!(
                root = %self.build_root.display(),
                "Build context dropped without close; nothing was committed"
            );
        }
    }
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("build_root", &self.build_root)
            .field("generation", &self.previous.generation())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}
