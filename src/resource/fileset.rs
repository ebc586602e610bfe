//! Candidate input enumeration
//!
//! A [`FileSet`] selects regular files below a base directory with include and
//! exclude patterns. It only enumerates; registering the results with a build is the
//! caller's job.

use crate::config::{STATE_DIR, TEMP_PREFIX};
use crate::error::BuildError;
use crate::resource::patterns::MatchPatterns;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct FileSet {
    basedir: PathBuf,
    includes: MatchPatterns,
    excludes: MatchPatterns,
    case_sensitive: bool,
}

impl FileSet {
    /// All files below `basedir` until includes or excludes are added. The build
    /// state directory and in-flight temp files are always excluded.
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
            includes: MatchPatterns::default(),
            excludes: MatchPatterns::from([
                format!("**/{}/", STATE_DIR),
                format!("**/{}*", TEMP_PREFIX),
            ]),
            case_sensitive: true,
        }
    }

    pub fn include(mut self, pattern: &str) -> Self {
        self.includes.push(pattern);
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.excludes.push(pattern);
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Whether a path relative to the base directory is selected.
    pub fn matches(&self, relative: &str) -> bool {
        (self.includes.is_empty() || self.includes.matches(relative, self.case_sensitive))
            && !self.excludes.matches(relative, self.case_sensitive)
    }

    fn may_descend(&self, relative: &str) -> bool {
        (self.includes.is_empty()
            || self
                .includes
                .matches_pattern_start(relative, self.case_sensitive))
            && !self.excludes.matches(relative, self.case_sensitive)
    }

    /// Walk the base directory and return selected files, sorted by path.
    pub fn scan(&self) -> Result<Vec<PathBuf>, BuildError> {
        if !self.basedir.is_dir() {
            return Err(BuildError::invalid(&self.basedir, "not a directory"));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.basedir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                match relative(&self.basedir, entry.path()) {
                    Some(rel) => self.may_descend(&rel),
                    None => false,
                }
            });

        for entry in walker {
            let entry = entry.map_err(|e| BuildError::invalid(&self.basedir, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(rel) = relative(&self.basedir, entry.path()) {
                if self.matches(&rel) {
                    files.push(entry.into_path());
                }
            }
        }

        files.sort();
        debug!(basedir = %self.basedir.display(), count = files.len(), "Scanned file set");
        Ok(files)
    }
}

fn relative(base: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(base)
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}
