//! Input/output associations, orphan cleanup and aggregation

use crate::integration::test_utils::{file_name, Workspace};
use buildstate::{FileSet, Generation};
use std::fs;
use std::io::Write;
use std::path::Path;

#[test]
fn test_associations_are_symmetric_after_close() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "alpha");
    ws.write("src/b.txt", "beta");

    let mut ctx = ws.open();
    for input in ctx
        .register_inputs_for_processing([ws.path("src/a.txt"), ws.path("src/b.txt")])
        .unwrap()
    {
        let own = input.associate_output(ws.output_for(input.resource())).unwrap();
        own.write_with(|w| w.write_all(b"own")).unwrap();
        input.associate_output(ws.path("out/all.txt")).unwrap();
    }
    ctx.register_output(ws.path("out/all.txt"))
        .unwrap()
        .write_with(|w| w.write_all(b"all"))
        .unwrap();
    ctx.close().unwrap();

    let state = ws.load_state().unwrap();
    assert!(state.associations_symmetric());
    let all = state
        .outputs
        .values()
        .find(|o| o.id.path().ends_with("all.txt"))
        .unwrap();
    assert_eq!(all.inputs.len(), 2);
    for input in state.inputs.values() {
        assert_eq!(input.outputs.len(), 2);
    }
}

#[test]
fn test_associate_output_is_idempotent() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "alpha");
    ws.write("out/a.out", "A");

    let mut ctx = ws.open();
    ctx.register_input(ws.path("src/a.txt")).unwrap().process().unwrap();
    ctx.associate_output(ws.path("src/a.txt"), ws.path("out/a.out")).unwrap();
    ctx.associate_output(ws.path("src/a.txt"), ws.path("out/a.out")).unwrap();
    ctx.associate_input(ws.path("out/a.out"), ws.path("src/a.txt")).unwrap();
    ctx.close().unwrap();

    let state = ws.load_state().unwrap();
    let record = state.inputs.values().next().unwrap();
    assert_eq!(record.outputs.len(), 1);
    assert!(state.associations_symmetric());
}

#[test]
fn test_output_of_removed_input_is_deleted() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "alpha");
    ws.write("src/b.txt", "beta");
    ws.compile(&["src/a.txt", "src/b.txt"]);

    ws.remove("src/a.txt");
    let run = ws.compile(&["src/b.txt"]);

    assert!(run.processed.is_empty());
    assert!(!ws.exists("out/a.out"));
    assert!(ws.exists("out/b.out"));
    assert_eq!(run.outcome.deleted_outputs.len(), 1);
    assert!(run.outcome.deleted_outputs[0].ends_with("a.out"));

    let state = ws.load_state().unwrap();
    assert_eq!(state.inputs.len(), 1);
    assert_eq!(state.outputs.len(), 1);
    assert!(state.associations_symmetric());
}

#[test]
fn test_output_dropped_by_reprocessing_is_deleted() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "alpha");

    let mut ctx = ws.open();
    let input = ctx.register_input(ws.path("src/a.txt")).unwrap().process().unwrap();
    for name in ["out/one.txt", "out/two.txt"] {
        input
            .associate_output(ws.path(name))
            .unwrap()
            .write_with(|w| w.write_all(b"x"))
            .unwrap();
    }
    ctx.close().unwrap();

    ws.write("src/a.txt", "alpha, one output only");
    let mut ctx = ws.open();
    let input = ctx.register_input(ws.path("src/a.txt")).unwrap().process().unwrap();
    input
        .associate_output(ws.path("out/one.txt"))
        .unwrap()
        .write_with(|w| w.write_all(b"y"))
        .unwrap();
    let outcome = ctx.close().unwrap();

    assert!(ws.exists("out/one.txt"));
    assert!(!ws.exists("out/two.txt"));
    assert_eq!(outcome.deleted_outputs.len(), 1);
}

#[test]
fn test_orphans_kept_when_cleanup_disabled() {
    let ws = Workspace::new();
    ws.configure("delete_orphans = false\n");
    ws.write("src/a.txt", "alpha");
    ws.compile(&["src/a.txt"]);

    ws.remove("src/a.txt");
    let run = ws.compile(&[]);

    assert!(run.outcome.deleted_outputs.is_empty());
    assert!(ws.exists("out/a.out"));
    assert!(ws.load_state().unwrap().outputs.is_empty());
}

#[test]
fn test_old_output_lookup() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "alpha");

    {
        let ctx = ws.open();
        assert!(ctx.get_old_output(ws.path("out/a.out")).unwrap().is_none());
    }
    ws.compile(&["src/a.txt"]);

    let ctx = ws.open();
    let old = ctx.get_old_output(ws.path("out/a.out")).unwrap().unwrap();
    assert_eq!(old.generation(), Generation::Previous);
    assert!(!old.is_processing_required());
    let contributors = old.associated_inputs();
    assert_eq!(contributors.len(), 1);
    assert_eq!(file_name(contributors[0].resource()), "a.txt");
}

fn is_interesting(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|content| content.starts_with('@'))
        .unwrap_or(false)
}

struct AggregateRun {
    regenerated: bool,
    success: bool,
}

/// Aggregate every interesting input under `src/` into `out/agg.txt`.
fn aggregate(ws: &Workspace) -> AggregateRun {
    let mut ctx = ws.open();
    let agg = ws.path("out/agg.txt");

    let regenerated = {
        let candidates = FileSet::new(ws.path("src")).include("**/*.txt").scan().unwrap();
        let inputs = ctx.register_inputs(&candidates).unwrap();

        let regenerate = match ctx.get_old_output(&agg).unwrap() {
            Some(old) => {
                old.is_processing_required()
                    || inputs
                        .iter()
                        .any(|i| i.is_processing_required() && is_interesting(i.resource()))
            }
            None => true,
        };

        if regenerate {
            let output = ctx.register_output(&agg).unwrap();
            let mut contributors = Vec::new();
            for input in &inputs {
                if is_interesting(input.resource()) {
                    let input = input.process().unwrap();
                    output.associate_input(&input).unwrap();
                    contributors.push(file_name(input.resource()));
                }
            }
            output
                .write_with(|w| write!(w, "contributors: {}", contributors.join(",")))
                .unwrap();
        }
        regenerate
    };

    let outcome = ctx.close().unwrap();
    AggregateRun {
        regenerated,
        success: outcome.is_success(),
    }
}

#[test]
fn test_aggregate_follows_its_contributors() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "@alpha");
    ws.write("src/b.txt", "beta");

    // Build 1: everything new, `a` contributes.
    let run = aggregate(&ws);
    assert!(run.regenerated);
    assert!(run.success);
    assert_eq!(ws.read("out/agg.txt"), "contributors: a.txt");
    let state = ws.load_state().unwrap();
    let agg = state.outputs.values().next().unwrap();
    assert_eq!(agg.inputs.len(), 1);

    // Build 2: nothing changed.
    let run = aggregate(&ws);
    assert!(!run.regenerated);
    assert_eq!(ws.read("out/agg.txt"), "contributors: a.txt");

    // Build 3: the only contributor is gone.
    ws.remove("src/a.txt");
    let run = aggregate(&ws);
    assert!(run.regenerated);
    assert_eq!(ws.read("out/agg.txt"), "contributors: ");

    let state = ws.load_state().unwrap();
    assert_eq!(state.outputs.len(), 1);
    let agg = state.outputs.values().next().unwrap();
    assert!(agg.inputs.is_empty());
    assert!(state.inputs.is_empty());
    assert!(state.associations_symmetric());
}

#[test]
fn test_aggregate_picks_up_new_contributor() {
    let ws = Workspace::new();
    ws.write("src/a.txt", "@alpha");
    aggregate(&ws);

    ws.write("src/c.txt", "@gamma");
    let run = aggregate(&ws);
    assert!(run.regenerated);
    assert_eq!(ws.read("out/agg.txt"), "contributors: a.txt,c.txt");
    let state = ws.load_state().unwrap();
    assert_eq!(state.outputs.values().next().unwrap().inputs.len(), 2);
}
