//! Configuration System
//!
//! Layered build configuration: built-in defaults, then the build root's
//! `.buildstate/config.toml`, then `BUILDSTATE_*` environment variables.

use crate::error::BuildError;
use crate::logging::LoggingConfig;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::status::DigestPolicy;

/// Directory under the build root holding state and config.
pub const STATE_DIR: &str = ".buildstate";

/// Prefix of the temp files written next to outputs and the state file.
pub const TEMP_PREFIX: &str = ".buildstate-";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub state: StateConfig,

    /// Content digest policy for change detection
    #[serde(default)]
    pub digest: DigestPolicy,

    /// Delete outputs orphaned by the build at close
    #[serde(default = "default_true")]
    pub delete_orphans: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Snapshot location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Snapshot file, relative paths resolve against the build root
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_state_path() -> PathBuf {
    PathBuf::from(STATE_DIR).join("state.bin")
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            state: StateConfig::default(),
            digest: DigestPolicy::default(),
            delete_orphans: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.state.path.as_os_str().is_empty() {
            return Err(BuildError::Config("State path cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Snapshot path resolved against `build_root`.
    pub fn state_path(&self, build_root: &Path) -> PathBuf {
        if self.state.path.is_absolute() {
            self.state.path.clone()
        } else {
            build_root.join(&self.state.path)
        }
    }

    pub fn with_digest(mut self, digest: DigestPolicy) -> Self {
        self.digest = digest;
        self
    }
}

/// Loads [`BuildConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Config file consulted for `build_root`.
    pub fn config_path(build_root: &Path) -> PathBuf {
        build_root.join(STATE_DIR).join("config.toml")
    }

    pub fn load(build_root: &Path) -> Result<BuildConfig, BuildError> {
        let mut builder = builder_with_defaults()?;
        let file = Self::config_path(build_root);
        if file.exists() {
            builder = builder.add_source(File::from(file).required(false));
        }
        Self::finish(builder)
    }

    pub fn load_from_file(path: &Path) -> Result<BuildConfig, BuildError> {
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        Self::finish(builder)
    }

    fn finish(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<BuildConfig, BuildError> {
        let config: BuildConfig = builder
            .add_source(Environment::with_prefix("BUILDSTATE").separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Config::builder()
        .set_default("state.path", default_state_path().to_string_lossy().to_string())?
        .set_default("digest", "never")?
        .set_default("delete_orphans", true)
}
