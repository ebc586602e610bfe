//! Observed file stat

use crate::resource::hasher;
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Size, modification time and optional content digest of a file as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStat {
    pub size: u64,
    pub modified_secs: u64,
    pub modified_nanos: u32,
    pub digest: Option<Hash>,
}

impl ResourceStat {
    /// Stat a file. Returns `Ok(None)` when the file does not exist.
    ///
    /// The digest is only computed when `with_digest` is set.
    pub fn capture(path: &Path, with_digest: bool) -> io::Result<Option<Self>> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if !metadata.is_file() {
            return Ok(None);
        }
        let modified = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let digest = if with_digest {
            Some(hasher::compute_file_hash(path)?)
        } else {
            None
        };
        Ok(Some(ResourceStat {
            size: metadata.len(),
            modified_secs: modified.as_secs(),
            modified_nanos: modified.subsec_nanos(),
            digest,
        }))
    }

    pub fn same_timestamp(&self, other: &ResourceStat) -> bool {
        self.modified_secs == other.modified_secs && self.modified_nanos == other.modified_nanos
    }

    /// Fill in the digest if missing.
    pub fn ensure_digest(&mut self, path: &Path) -> io::Result<Hash> {
        match self.digest {
            Some(d) => Ok(d),
            None => {
                let d = hasher::compute_file_hash(path)?;
                self.digest = Some(d);
                Ok(d)
            }
        }
    }
}
