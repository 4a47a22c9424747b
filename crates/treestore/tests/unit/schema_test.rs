//! Model parsing and schema matching tests
//!
//! Covers model text errors and the annotations writes are checked against.

use std::sync::Arc;
use treestore::key::{INT, TEXT};
use treestore::schema::{build_schema, parse_models};
use treestore::{Key, MemoryLexicon, ObjectStore, SchemaRegistry, Step, StoreError, Unit, Value};

fn lexicon(classes: &[&str]) -> Arc<MemoryLexicon> {
    let lexicon = Arc::new(MemoryLexicon::new());
    for class in classes {
        lexicon.define_class(class).unwrap();
    }
    lexicon
}

#[test]
fn test_misaligned_model_line_reports_line_number() {
    let lex = lexicon(&["Paper"]);
    let registry = SchemaRegistry::new(lex.clone()).unwrap();

    let err = registry
        .load_models("?Paper Title Text\n       Author Text\n     Year Int\n")
        .unwrap_err();
    assert!(matches!(err, StoreError::SchemaAuthoring { .. }));
    assert!(err.to_string().contains("line 3"), "{err}");
}

#[test]
fn test_duplicate_tag_in_model() {
    let lex = lexicon(&["Paper"]);
    let text = "?Paper Title Text\n       Remark Title Int\n";
    let models = parse_models(text, lex.as_ref()).unwrap();
    let err = build_schema(&models[0], lex.as_ref()).unwrap_err();
    assert!(matches!(err, StoreError::SchemaAuthoring { .. }));
}

#[test]
fn test_unknown_class_in_model() {
    let lex = lexicon(&["Paper"]);
    let registry = SchemaRegistry::new(lex.clone()).unwrap();
    let err = registry.load_models("?Paper Author ?Nobody\n").unwrap_err();
    assert!(matches!(err, StoreError::UnknownName { .. }));
}

#[test]
fn test_models_and_redefinition() {
    let lex = lexicon(&["Paper"]);
    let registry = SchemaRegistry::new(lex.clone()).unwrap();
    let keys = registry.load_models("?Paper Title Text\n").unwrap();
    let paper = keys[0];
    assert!(registry.contains(paper));

    let before = registry.schema(paper).unwrap();
    registry.load_models("?Paper Title Text\n       Year Int\n").unwrap();
    let after = registry.schema(paper).unwrap();

    let year = lex.tag("Year").unwrap();
    assert!(before.tag_path(year).is_none());
    assert!(after.tag_path(year).is_some());
}

#[test]
fn test_object_without_model() {
    let lex = lexicon(&["Paper", "Orphan"]);
    let store = ObjectStore::in_memory(lex.clone()).unwrap();
    store.load_models("?Paper Title Text\n").unwrap();

    let orphan = lex.object("Orphan", "o1").unwrap();
    assert!(matches!(
        store.open_read(orphan),
        Err(StoreError::SchemaNotFound { .. })
    ));
}

#[test]
fn test_repeat_column_chains_right() {
    let lex = lexicon(&["Seq"]);
    let store = ObjectStore::in_memory(lex.clone()).unwrap();
    store.load_models("?Seq Scores Int REPEAT\n").unwrap();
    let seq = lex.object("Seq", "s1").unwrap();
    let scores = lex.tag("Scores").unwrap();

    let mut handle = store.open_write(seq).unwrap();
    handle.add_data(Step::Tag(scores), INT, 1).unwrap();
    handle.add_data(Step::Right, INT, 2).unwrap();
    handle.add_data(Step::Right, INT, 3).unwrap();
    handle.reset();

    assert_eq!(
        handle.flatten(4),
        vec![vec![Unit::Key(scores), Unit::Int(1), Unit::Int(2), Unit::Int(3)]]
    );
}

#[test]
fn test_end_of_model_refuses_more() {
    let lex = lexicon(&["Paper"]);
    let store = ObjectStore::in_memory(lex.clone()).unwrap();
    store.load_models("?Paper Title Text\n").unwrap();
    let paper = lex.object("Paper", "p1").unwrap();

    let mut handle = store.open_write(paper).unwrap();
    handle.add_data(Step::Tag(lex.tag("Title").unwrap()), TEXT, "x").unwrap();
    let err = handle.add_data(Step::Right, TEXT, "y").unwrap_err();
    assert!(matches!(err, StoreError::SchemaViolation { .. }));
}

#[test]
fn test_unique_column_keeps_last_value() {
    let lex = lexicon(&["Paper"]);
    let store = ObjectStore::in_memory(lex.clone()).unwrap();
    store.load_models("?Paper Title UNIQUE Text\n").unwrap();
    let paper = lex.object("Paper", "p1").unwrap();
    let title = lex.tag("Title").unwrap();

    let mut handle = store.open_write(paper).unwrap();
    handle.add_data(Step::Tag(title), TEXT, "Draft").unwrap();
    handle.add_data(Step::Tag(title), TEXT, "Final").unwrap();

    handle.reset();
    assert_eq!(handle.get_text(Step::Tag(title)).unwrap().as_deref(), Some("Final"));
    assert_eq!(handle.get_text(Step::Down).unwrap(), None);
    assert_eq!(handle.tree().len(), 3);
}

#[test]
fn test_any_column_takes_every_key() {
    let lex = lexicon(&["Note", "Paper"]);
    let store = ObjectStore::in_memory(lex.clone()).unwrap();
    store.load_models("?Note About ANY\n?Paper Title Text\n").unwrap();
    let note = lex.object("Note", "n1").unwrap();
    let paper = lex.object("Paper", "p1").unwrap();
    let about = lex.tag("About").unwrap();

    let mut handle = store.open_write(note).unwrap();
    handle.add_key(Step::Tag(about), paper).unwrap();
    handle.add_data(Step::Tag(about), INT, 12).unwrap();

    handle.reset();
    assert_eq!(handle.get_key(Step::Tag(about)).unwrap(), Some(paper));
    handle.reset();
    assert_eq!(handle.get_int(Step::Tag(about)).unwrap(), Some(12));
}

#[test]
fn test_constraint_hook_rejects_values() {
    let lex = lexicon(&["Paper"]);
    let recent = |_constraint: Key, _key: Key, value: &Value| {
        matches!(value, Value::Int(year) if *year >= 1900)
    };
    let store = ObjectStore::in_memory(lex.clone())
        .unwrap()
        .with_constraints(Arc::new(recent));
    store.load_models("?Paper Year Int Constraint Recent\n").unwrap();
    let paper = lex.object("Paper", "p1").unwrap();
    let year = lex.tag("Year").unwrap();

    let mut handle = store.open_write(paper).unwrap();
    handle.add_data(Step::Tag(year), INT, 1999).unwrap();
    let err = handle.add_data(Step::Tag(year), INT, 1066).unwrap_err();
    assert!(matches!(err, StoreError::SchemaViolation { .. }));
    // overwriting is checked too
    assert!(handle.add_data(Step::Here, INT, 12).is_err());

    handle.reset();
    assert_eq!(handle.get_int(Step::Tag(year)).unwrap(), Some(1999));
    assert_eq!(handle.get_int(Step::Down).unwrap(), None);
}
