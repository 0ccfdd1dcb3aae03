use nbmodel_core::{CellSpec, SharedNotebook};
use serde_json::json;

fn three_cell_doc() -> SharedNotebook {
    let mut doc = SharedNotebook::new();
    doc.insert_cells(
        0,
        vec![
            CellSpec::code().with_source("a"),
            CellSpec::code().with_source("b"),
            CellSpec::code().with_source("c"),
        ],
    );
    doc.clear_undo_history();
    doc
}

fn sources(doc: &SharedNotebook) -> Vec<String> {
    doc.cells().iter().map(|c| c.source().to_owned()).collect()
}

#[test]
fn undo_delete_restores_identity_and_content() {
    let mut doc = three_cell_doc();
    doc.set_cell_metadata(1, "tags", json!(["keep"])).expect("in range");
    doc.clear_undo_history();

    let before = doc.cell(1).expect("cell present").to_data();
    doc.delete_cell(1).expect("in range");
    assert_eq!(doc.len(), 2);

    assert!(doc.undo());
    assert_eq!(doc.len(), 3);
    let restored = doc.cell(1).expect("cell present").to_data();
    assert_eq!(restored, before);
    assert_eq!(restored.id, before.id);
}

#[test]
fn undo_insert_removes_the_cell() {
    let mut doc = three_cell_doc();
    doc.insert_cell(1, CellSpec::markdown().with_source("new"));
    assert_eq!(doc.len(), 4);

    assert!(doc.undo());
    assert_eq!(sources(&doc), vec!["a", "b", "c"]);

    assert!(doc.redo());
    assert_eq!(sources(&doc), vec!["a", "new", "b", "c"]);
}

#[test]
fn undo_batch_insert_removes_whole_batch() {
    let mut doc = three_cell_doc();
    doc.insert_cells(
        1,
        vec![
            CellSpec::raw().with_source("x"),
            CellSpec::raw().with_source("y"),
        ],
    );
    assert_eq!(doc.len(), 5);

    assert!(doc.undo());
    assert_eq!(sources(&doc), vec!["a", "b", "c"]);

    assert!(doc.redo());
    assert_eq!(sources(&doc), vec!["a", "x", "y", "b", "c"]);
}

#[test]
fn undo_move_restores_order() {
    let mut doc = three_cell_doc();
    doc.move_cell(0, 2).expect("in range");
    assert_eq!(sources(&doc), vec!["b", "c", "a"]);

    assert!(doc.undo());
    assert_eq!(sources(&doc), vec!["a", "b", "c"]);

    assert!(doc.redo());
    assert_eq!(sources(&doc), vec!["b", "c", "a"]);
}

#[test]
fn undo_source_edit_restores_text() {
    let mut doc = three_cell_doc();
    doc.set_source(0, "edited").expect("in range");
    assert!(doc.undo());
    assert_eq!(doc.cell(0).expect("cell present").source(), "a");
    assert!(doc.redo());
    assert_eq!(doc.cell(0).expect("cell present").source(), "edited");
}

#[test]
fn undo_interleaves_structural_and_content_edits() {
    let mut doc = three_cell_doc();
    doc.set_source(0, "a2").expect("in range");
    doc.delete_cell(2).expect("in range");
    doc.set_source(1, "b2").expect("in range");

    // LIFO: content edit, then the delete, then the first edit.
    assert!(doc.undo());
    assert_eq!(sources(&doc), vec!["a2", "b"]);
    assert!(doc.undo());
    assert_eq!(sources(&doc), vec!["a2", "b", "c"]);
    assert!(doc.undo());
    assert_eq!(sources(&doc), vec!["a", "b", "c"]);
    assert!(!doc.undo());
}

#[test]
fn empty_history_is_a_noop_at_both_ends() {
    let mut doc = three_cell_doc();
    assert!(!doc.undo());
    assert!(!doc.redo());
    assert_eq!(doc.len(), 3);
}

#[test]
fn fresh_mutation_clears_redo() {
    let mut doc = three_cell_doc();
    doc.set_source(0, "edited").expect("in range");
    assert!(doc.undo());
    assert!(doc.can_redo());

    doc.set_source(2, "other").expect("in range");
    assert!(!doc.can_redo());
    assert!(!doc.redo());
}

#[test]
fn clear_undo_history_keeps_state() {
    let mut doc = three_cell_doc();
    doc.set_source(0, "edited").expect("in range");
    doc.clear_undo_history();
    assert!(!doc.can_undo());
    assert_eq!(doc.cell(0).expect("cell present").source(), "edited");
}

#[test]
fn scoped_mode_skips_structural_history() {
    let mut doc = SharedNotebook::with_options(5, false);
    doc.insert_cell(0, CellSpec::code().with_source("kept"));
    doc.delete_cell(0).expect("in range");
    assert!(!doc.undo());
    assert_eq!(doc.len(), 0);
}

#[test]
fn scoped_mode_undoes_content_edits_per_cell() {
    let mut doc = SharedNotebook::with_options(5, false);
    doc.insert_cells(
        0,
        vec![
            CellSpec::code().with_source("a"),
            CellSpec::code().with_source("b"),
        ],
    );
    doc.set_source(0, "a2").expect("in range");
    doc.set_source(1, "b2").expect("in range");

    // Document-wide undo saw nothing; each cell replays its own edits.
    assert!(!doc.undo());
    assert!(doc.undo_cell(1).expect("in range"));
    assert_eq!(sources(&doc), vec!["a2", "b"]);
    assert!(doc.undo_cell(0).expect("in range"));
    assert_eq!(sources(&doc), vec!["a", "b"]);
    assert!(doc.redo_cell(0).expect("in range"));
    assert_eq!(sources(&doc), vec!["a2", "b"]);
}

#[test]
fn per_cell_history_travels_with_the_cell() {
    let mut doc = SharedNotebook::with_options(5, false);
    doc.insert_cells(
        0,
        vec![
            CellSpec::code().with_source("a"),
            CellSpec::code().with_source("b"),
        ],
    );
    doc.set_source(0, "a2").expect("in range");
    doc.move_cell(0, 1).expect("in range");

    assert!(doc.undo_cell(1).expect("in range"));
    assert_eq!(sources(&doc), vec!["b", "a"]);
}
