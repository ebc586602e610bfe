//! Shared test utilities for integration tests
//!
//! A [`Workspace`] is a throwaway build root with helpers to lay out inputs, run a
//! simple one-to-one transformation build and inspect the committed state.

#![allow(dead_code)]

use buildstate::config::BuildConfig;
use buildstate::store::{BuildState, FileStateStore, MetadataStore};
use buildstate::{BuildContext, BuildOutcome};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.path(relative)).unwrap();
    }

    /// Move the modification time without touching content.
    pub fn touch(&self, relative: &str, offset_secs: u64) {
        let file = fs::File::options()
            .write(true)
            .open(self.path(relative))
            .unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(offset_secs))
            .unwrap();
    }

    /// Write `.buildstate/config.toml`.
    pub fn configure(&self, toml: &str) {
        self.write(".buildstate/config.toml", toml);
    }

    pub fn open(&self) -> BuildContext {
        BuildContext::open(self.root()).unwrap()
    }

    pub fn state_file(&self) -> PathBuf {
        BuildConfig::default().state_path(self.root())
    }

    pub fn load_state(&self) -> Option<BuildState> {
        FileStateStore::new(self.state_file()).load().unwrap()
    }

    /// Run a build that uppercases every changed input into `out/<stem>.out`.
    pub fn compile(&self, inputs: &[&str]) -> CompileRun {
        let mut ctx = self.open();
        let paths: Vec<PathBuf> = inputs.iter().map(|i| self.path(i)).collect();
        let mut processed = Vec::new();
        for input in ctx.register_inputs_for_processing(&paths).unwrap() {
            let content = fs::read_to_string(input.resource()).unwrap();
            let output = input.associate_output(self.output_for(input.resource())).unwrap();
            output
                .write_with(|w| w.write_all(content.to_uppercase().as_bytes()))
                .unwrap();
            processed.push(file_name(input.resource()));
        }
        let outcome = ctx.close().unwrap();
        processed.sort();
        CompileRun { outcome, processed }
    }

    pub fn output_for(&self, input: &Path) -> PathBuf {
        let stem = input.file_stem().unwrap().to_string_lossy();
        self.path(&format!("out/{}.out", stem))
    }
}

pub struct CompileRun {
    pub outcome: BuildOutcome,
    /// File names of the inputs that were processed.
    pub processed: Vec<String>,
}

pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}
