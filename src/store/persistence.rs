//! File-backed build state snapshot

use crate::config::TEMP_PREFIX;
use crate::error::StorageError;
use crate::store::{BuildState, MetadataStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const STATE_VERSION: u32 = 1;

/// Snapshot envelope; the version comes first so it can be read on its own.
#[derive(Debug, Serialize, Deserialize)]
struct StateEnvelope {
    version: u32,
    state: BuildState,
}

/// One bincode snapshot file per build root, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(&self, bytes: &[u8]) -> Result<BuildState, StorageError> {
        let version: u32 = bincode::deserialize(bytes).map_err(|e| StorageError::Decode {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        if version != STATE_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: version,
                expected: STATE_VERSION,
            });
        }
        let envelope: StateEnvelope =
            bincode::deserialize(bytes).map_err(|e| StorageError::Decode {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(envelope.state)
    }
}

impl MetadataStore for FileStateStore {
    fn load(&self) -> Result<Option<BuildState>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match self.decode(&bytes) {
            Ok(state) => {
                debug!(
                    path = %self.path.display(),
                    generation = state.generation,
                    inputs = state.inputs.len(),
                    outputs = state.outputs.len(),
                    "Loaded build state"
                );
                Ok(Some(state))
            }
            Err(StorageError::UnsupportedVersion { found, expected }) => {
                warn!(
                    path = %self.path.display(),
                    found,
                    expected,
                    "Discarding build state with unsupported version; next build starts clean"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, state: &BuildState) -> Result<(), StorageError> {
        let envelope = StateEnvelope {
            version: STATE_VERSION,
            state: state.clone(),
        };
        let serialized =
            bincode::serialize(&envelope).map_err(|e| StorageError::Encode(e.to_string()))?;

        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(write_err)?;

        // Temp file in the same directory so the rename stays on one filesystem.
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&parent)
            .map_err(write_err)?;
        temp.write_all(&serialized).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!(
            path = %self.path.display(),
            generation = state.generation,
            bytes = serialized.len(),
            "Committed build state"
        );
        Ok(())
    }
}
