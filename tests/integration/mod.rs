//! Integration tests for the build state engine

mod associations;
mod config_integration;
mod messages;
pub mod test_utils;
