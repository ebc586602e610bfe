//! Diagnostics: error gating, carry-over and clearing on reprocessing

use crate::integration::test_utils::Workspace;
use buildstate::{BuildError, Message, Severity};
use std::io;
use std::io::Write;

/// Process changed inputs; inputs whose content contains "error" or "warn" get the
/// matching diagnostic.
fn lint(ws: &Workspace, inputs: &[&str]) -> buildstate::BuildOutcome {
    let mut ctx = ws.open();
    let paths: Vec<_> = inputs.iter().map(|i| ws.path(i)).collect();
    for input in ctx.register_inputs_for_processing(&paths).unwrap() {
        let content = std::fs::read_to_string(input.resource()).unwrap();
        if content.contains("error") {
            input
                .add_message(Message::new(1, 7, "unexpected token", Severity::Error))
                .unwrap();
        }
        if content.contains("warn") {
            input
                .add_message(Message::new(2, 1, "unused import", Severity::Warning))
                .unwrap();
        }
        input
            .associate_output(ws.output_for(input.resource()))
            .unwrap()
            .write_with(|w| w.write_all(content.as_bytes()))
            .unwrap();
    }
    ctx.close().unwrap()
}

#[test]
fn test_error_fails_the_build() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "has an error");
    ws.write("src/b.txt", "clean");

    let outcome = lint(&ws, &["src/a.txt", "src/b.txt"]);
    assert!(!outcome.is_success());
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].1.line, 1);
    assert_eq!(outcome.errors[0].1.column, 7);
}

#[test]
fn test_warnings_do_not_fail_the_build() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "warn me");

    let outcome = lint(&ws, &["src/a.txt"]);
    assert!(outcome.is_success());
    assert_eq!(outcome.warnings.len(), 1);
}

#[test]
fn test_errors_carry_over_until_fixed() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "has an error");
    ws.write("src/b.txt", "clean");
    lint(&ws, &["src/a.txt", "src/b.txt"]);

    // Nothing changed: the error is replayed and still fails the build.
    let outcome = lint(&ws, &["src/a.txt", "src/b.txt"]);
    assert!(!outcome.is_success());
    assert_eq!(outcome.replayed, 1);
    assert!(!outcome.state_changed);

    // Reprocessing without re-adding the message clears it.
    ws.write("src/a.txt", "fixed it");
    let outcome = lint(&ws, &["src/a.txt", "src/b.txt"]);
    assert!(outcome.is_success());
    assert_eq!(outcome.replayed, 0);
    assert!(ws.load_state().unwrap().inputs.values().all(|i| i.messages.is_empty()));
}

#[test]
fn test_reprocessing_replaces_messages() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "error and warn");
    let outcome = lint(&ws, &["src/a.txt"]);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.warnings.len(), 1);

    ws.write("src/a.txt", "only a warning left");
    let outcome = lint(&ws, &["src/a.txt"]);
    assert!(outcome.is_success());
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.errors.is_empty());
}

#[test]
fn test_message_cause_is_recorded() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "alpha");

    let mut ctx = ws.open();
    let input = ctx.register_input(ws.path("src/a.txt")).unwrap().process().unwrap();
    let cause = io::Error::new(io::ErrorKind::InvalidData, "bad utf-8");
    input
        .add_message(Message::new(3, 4, "cannot decode", Severity::Error).with_cause(&cause))
        .unwrap();
    assert_eq!(input.messages().len(), 1);
    let outcome = ctx.close().unwrap();

    assert_eq!(outcome.errors[0].1.cause.as_deref(), Some("bad utf-8"));
}

#[test]
fn test_message_requires_registration() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "alpha");

    let ctx = ws.open();
    let result = ctx.add_message(
        ws.path("src/a.txt"),
        Message::new(1, 1, "orphan message", Severity::Warning),
    );
    assert!(matches!(result, Err(BuildError::UnknownResource(_))));
}

#[test]
fn test_error_survives_a_failed_output_write() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "has an error");
    ws.write("src/b.txt", "clean");

    let mut ctx = ws.open();
    for input in ctx
        .register_inputs_for_processing([ws.path("src/a.txt"), ws.path("src/b.txt")])
        .unwrap()
    {
        let content = std::fs::read_to_string(input.resource()).unwrap();
        let output = input.associate_output(ws.output_for(input.resource())).unwrap();
        let written = output.write_with(|w| {
            if content.contains("error") {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "bad input"));
            }
            w.write_all(content.as_bytes())
        });
        if written.is_err() {
            input
                .add_message(Message::new(1, 1, "unexpected token", Severity::Error))
                .unwrap();
        }
    }
    let outcome = ctx.close().unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.errors.len(), 1);
    assert!(!ws.exists("out/a.out"));
    assert!(ws.exists("out/b.out"));

    // The failed input was not recorded, so it is processed and reported again.
    let outcome = lint(&ws, &["src/a.txt", "src/b.txt"]);
    assert!(!outcome.is_success());
    assert_eq!(outcome.replayed, 0);
}

#[test]
fn test_message_requires_processing() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "alpha");

    let mut ctx = ws.open();
    let input = ctx.register_input(ws.path("src/a.txt")).unwrap();
    let result = ctx.add_message(
        input.resource(),
        Message::new(1, 1, "not processed yet", Severity::Error),
    );
    assert!(matches!(result, Err(BuildError::NotProcessed(_))));

    input.process().unwrap();
    ctx.add_message(
        ws.path("src/a.txt"),
        Message::new(1, 1, "now it counts", Severity::Error),
    )
    .unwrap();
    assert!(!ctx.close().unwrap().is_success());
}
