//! Resource status resolution
//!
//! Classifies a resource against its record from the previous generation. Size and
//! modification time decide; the content digest is only consulted when the policy
//! allows it and the timestamp alone is inconclusive.

use crate::resource::ResourceStat;
use crate::types::ResourceStatus;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// When content digests take part in change detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestPolicy {
    /// Size and mtime only.
    #[default]
    Never,
    /// Same size, different mtime: compare BLAKE3 digests before declaring a change.
    OnTimestampChange,
}

/// Status of a resource plus the stat observed while resolving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: ResourceStatus,
    /// `None` when the file is not on disk.
    pub stat: Option<ResourceStat>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusResolver {
    policy: DigestPolicy,
}

impl StatusResolver {
    pub fn new(policy: DigestPolicy) -> Self {
        Self { policy }
    }

    pub fn digests_enabled(&self) -> bool {
        self.policy != DigestPolicy::Never
    }

    /// Stat `path` and classify it against `previous`.
    ///
    /// A file that is absent now is REMOVED whether or not it was recorded before.
    pub fn resolve(&self, path: &Path, previous: Option<&ResourceStat>) -> io::Result<Resolution> {
        let current = ResourceStat::capture(path, false)?;
        let (status, stat) = match (previous, current) {
            (_, None) => (ResourceStatus::Removed, None),
            (None, Some(current)) => (ResourceStatus::New, Some(current)),
            (Some(previous), Some(mut current)) => {
                let status = self.compare(path, previous, &mut current)?;
                (status, Some(current))
            }
        };
        Ok(Resolution { status, stat })
    }

    /// Compare a fresh stat against the recorded one. May fill in `current.digest`.
    pub fn compare(
        &self,
        path: &Path,
        previous: &ResourceStat,
        current: &mut ResourceStat,
    ) -> io::Result<ResourceStatus> {
        if previous.size != current.size {
            return Ok(ResourceStatus::Modified);
        }
        if previous.same_timestamp(current) {
            if current.digest.is_none() {
                current.digest = previous.digest;
            }
            return Ok(ResourceStatus::Unmodified);
        }
        match (self.policy, previous.digest) {
            (DigestPolicy::OnTimestampChange, Some(recorded)) => {
                if current.ensure_digest(path)? == recorded {
                    Ok(ResourceStatus::Unmodified)
                } else {
                    Ok(ResourceStatus::Modified)
                }
            }
            _ => Ok(ResourceStatus::Modified),
        }
    }
}
