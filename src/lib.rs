//! Buildstate: build-avoidance state tracking
//!
//! Remembers what the previous build read and wrote, decides which inputs need
//! reprocessing, tracks which inputs produced which outputs, and removes outputs that
//! no longer have a producer.
//!
//! A build opens a [`BuildContext`], registers its inputs, processes the ones that
//! changed, writes outputs through scoped streams and closes the context. Closing
//! commits the next generation atomically and reports a [`BuildOutcome`].

pub mod config;
pub mod context;
pub mod error;
pub mod escalation;
pub mod graph;
pub mod logging;
pub mod messages;
pub mod resource;
pub mod status;
pub mod store;
pub mod types;

pub use config::{BuildConfig, ConfigLoader, DigestPolicy};
pub use context::{
    BuildContext, BuildOutcome, Input, InputMetadata, Lifecycle, Output, OutputMetadata,
    OutputStream,
};
pub use error::{BuildError, StorageError};
pub use messages::Message;
pub use resource::{FileSet, MatchPatterns};
pub use store::{FileStateStore, MemoryStateStore, MetadataStore};
pub use types::{Generation, ResourceId, ResourceStatus, Severity};
