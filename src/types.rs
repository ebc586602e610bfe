//! Core identifiers and enumerations shared across the build state engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// BLAKE3 content digest.
pub type Hash = [u8; 32];

/// Canonical identity of a resource (input, output or included file).
///
/// Always built through [`crate::resource::path`] so that two spellings of the same
/// file map to the same id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(PathBuf);

impl ResourceId {
    /// Wrap an already canonical path.
    pub(crate) fn from_canonical(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for ResourceId {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Change status of a resource relative to the previous build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceStatus {
    /// Not present in the previous build.
    New,
    /// The resource itself, an included resource or an associated output changed.
    Modified,
    /// The resource and everything it depends on is unchanged.
    Unmodified,
    /// Present in the previous build, gone now.
    Removed,
}

impl ResourceStatus {
    pub fn is_unmodified(self) -> bool {
        self == ResourceStatus::Unmodified
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceStatus::New => "new",
            ResourceStatus::Modified => "modified",
            ResourceStatus::Unmodified => "unmodified",
            ResourceStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// Diagnostic severity. Only errors fail a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// Which generation a handle or query is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    /// State being built by the open context.
    Current,
    /// Snapshot loaded at context open; immutable for the whole build.
    Previous,
}
