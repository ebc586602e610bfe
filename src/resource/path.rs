//! Path canonicalization for resource identity

use crate::error::BuildError;
use crate::types::ResourceId;
use std::fs;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Canonical id of a path that may not exist yet (outputs, removed inputs).
///
/// The nearest existing ancestor is resolved on disk (symlinks, `..`), the remaining
/// components are appended lexically. The result is NFC normalized with trailing
/// separators removed.
pub fn resource_id(path: &Path) -> Result<ResourceId, BuildError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| BuildError::invalid(path, format!("no working directory: {}", e)))?
            .join(path)
    };
    let lexical = lexical_normalize(&absolute);

    let mut existing = lexical.as_path();
    let mut tail = Vec::new();
    let canonical_base = loop {
        match dunce::canonicalize(existing) {
            Ok(base) => break base,
            Err(_) => {
                let Some(name) = existing.file_name() else {
                    return Err(BuildError::invalid(path, "no existing ancestor"));
                };
                tail.push(name.to_os_string());
                existing = existing
                    .parent()
                    .ok_or_else(|| BuildError::invalid(path, "no existing ancestor"))?;
            }
        }
    };

    let mut full = canonical_base;
    for name in tail.iter().rev() {
        full.push(name);
    }
    Ok(ResourceId::from_canonical(PathBuf::from(normalize_path_string(
        &full.to_string_lossy(),
    ))))
}

/// Canonical id of an existing, readable regular file.
pub fn input_id(path: &Path) -> Result<ResourceId, BuildError> {
    let metadata = fs::metadata(path).map_err(|e| BuildError::invalid(path, e.to_string()))?;
    if !metadata.is_file() {
        return Err(BuildError::invalid(path, "not a regular file"));
    }
    fs::File::open(path).map_err(|e| BuildError::invalid(path, format!("cannot be read: {}", e)))?;
    resource_id(path)
}

/// Normalize a path string (without filesystem access): NFC, no trailing separators.
pub fn normalize_path_string(path: &str) -> String {
    let mut result: String = path.nfc().collect();
    if result.len() > 1 {
        while result.ends_with('/') || result.ends_with('\\') {
            result.pop();
        }
    }
    result
}

/// Resolve `.` and `..` without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
