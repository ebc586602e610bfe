//! Resources on disk
//!
//! Canonical identity, observed stat and digest of the files a build reads and writes,
//! plus pattern-based enumeration of candidate inputs.

pub mod fileset;
pub mod hasher;
pub mod path;
pub mod patterns;
pub mod stat;

pub use fileset::FileSet;
pub use patterns::{MatchPattern, MatchPatterns};
pub use stat::ResourceStat;
