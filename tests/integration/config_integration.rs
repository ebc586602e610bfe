//! Configuration wired into the build context

use crate::integration::test_utils::Workspace;
use buildstate::config::{BuildConfig, ConfigLoader, DigestPolicy};
use buildstate::{BuildContext, BuildError, ResourceStatus};

#[test]
fn test_custom_state_path() {
    let ws = Workspace::new();
    ws.configure("[state]\npath = \"cache/custom.bin\"\n");
    ws.write("src/a.txt", "alpha");

    ws.compile(&["src/a.txt"]);

    assert!(ws.exists("cache/custom.bin"));
    assert!(!ws.state_file().exists());
    assert!(ws.compile(&["src/a.txt"]).processed.is_empty());
}

#[test]
fn test_digest_policy_ignores_touch() {
    let ws = Workspace::new();
    ws.configure("digest = \"on-timestamp-change\"\n");
    ws.write("src/a.txt", "alpha");
    ws.compile(&["src/a.txt"]);

    let state = ws.load_state().unwrap();
    assert!(state.inputs.values().all(|i| i.stat.digest.is_some()));

    ws.touch("src/a.txt", 30);
    assert!(ws.compile(&["src/a.txt"]).processed.is_empty());
}

#[test]
fn test_digest_policy_still_sees_edits() {
    let ws = Workspace::new();
    ws.configure("digest = \"on-timestamp-change\"\n");
    ws.write("src/a.txt", "alpha");
    ws.compile(&["src/a.txt"]);

    // Same size, different bytes, new timestamp.
    ws.write("src/a.txt", "omega");
    ws.touch("src/a.txt", 30);
    assert_eq!(ws.compile(&["src/a.txt"]).processed, vec!["a.txt"]);
}

#[test]
fn test_explicit_config_overrides_file() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "alpha");
    ws.compile(&["src/a.txt"]);
    ws.touch("src/a.txt", 30);

    // No digests were recorded, so a touch is a change even with digests enabled.
    let config = BuildConfig::default().with_digest(DigestPolicy::OnTimestampChange);
    let ctx = BuildContext::with_config(ws.root(), config).unwrap();
    assert_eq!(ctx.config().digest, DigestPolicy::OnTimestampChange);
    let input = ctx.register_input(ws.path("src/a.txt")).unwrap();
    assert_eq!(input.status(), ResourceStatus::Modified);
}

#[test]
fn test_invalid_config_file_fails_open() {
    let ws = Workspace::new();
    ws.configure("digest = \"always\"\n");

    assert!(ConfigLoader::load(ws.root()).is_err());
    assert!(matches!(
        BuildContext::open(ws.root()),
        Err(BuildError::Config(_))
    ));
}
