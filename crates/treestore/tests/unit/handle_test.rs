//! ObjectHandle tests
//!
//! Navigation, typed reads and schema-checked writes on in-memory stores.

use std::sync::Arc;
use treestore::key::{FLOAT, INT, TEXT};
use treestore::{
    Key, KeyKind, Mark, MemoryBackend, MemoryLexicon, ObjectStore, Step, StoreConfig, StoreError,
    Unit, Value,
};

const MODELS: &str = "\
?Paper Title Text
       Author ?Person
       Year Int
       Score Float
       Address #Address
#Address Street Text
         Town Text
?Person Name Text
";

fn setup() -> (ObjectStore, Arc<MemoryLexicon>) {
    let lexicon = Arc::new(MemoryLexicon::new());
    lexicon.define_class("Paper").unwrap();
    lexicon.define_class("Person").unwrap();
    let store = ObjectStore::in_memory(lexicon.clone()).unwrap();
    store.load_models(MODELS).unwrap();
    (store, lexicon)
}

fn tag(lexicon: &MemoryLexicon, name: &str) -> Key {
    lexicon.tag(name).unwrap()
}

#[test]
fn test_new_object_is_root_only() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let mut handle = store.open_read(paper).unwrap();

    assert_eq!(handle.key(), paper);
    assert_eq!(handle.tree().len(), 1);
    assert!(!handle.is_writable());
    assert!(!handle.find_tag(tag(&lexicon, "Title")).unwrap());
    assert_eq!(handle.get_text(Step::Tag(tag(&lexicon, "Title"))).unwrap(), None);
}

#[test]
fn test_read_handle_refuses_writes() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let mut handle = store.open_read(paper).unwrap();

    let err = handle.add_tag(tag(&lexicon, "Title")).unwrap_err();
    assert!(matches!(err, StoreError::ReadOnly { key } if key == paper));
    assert!(!handle.is_modified());
}

#[test]
fn test_find_tag_is_idempotent() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let mut handle = store.open_write(paper).unwrap();
    let year = tag(&lexicon, "Year");
    handle.add_data(Step::Tag(year), INT, 1999).unwrap();

    handle.reset();
    assert!(handle.find_tag(year).unwrap());
    let first = handle.current();
    assert!(handle.find_tag(year).unwrap());
    assert_eq!(handle.current(), first);
    assert_eq!(handle.current_key(), year);
}

#[test]
fn test_missing_tag_leaves_cursor() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let mut handle = store.open_write(paper).unwrap();
    handle.add_tag(tag(&lexicon, "Title")).unwrap();
    let before = handle.current();

    assert!(!handle.find_tag(tag(&lexicon, "Year")).unwrap());
    assert!(!handle.find_tag(tag(&lexicon, "Nowhere")).unwrap());
    assert_eq!(handle.current(), before);
}

#[test]
fn test_values_stack_down_in_insertion_order() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let smith = lexicon.object("Person", "smith").unwrap();
    let jones = lexicon.object("Person", "jones").unwrap();
    let author = tag(&lexicon, "Author");

    let mut handle = store.open_write(paper).unwrap();
    handle.add_key(Step::Tag(author), smith).unwrap();
    handle.add_key(Step::Tag(author), jones).unwrap();
    // the same reference again is a no-op
    handle.add_key(Step::Tag(author), smith).unwrap();

    handle.reset();
    assert_eq!(handle.get_key(Step::Tag(author)).unwrap(), Some(smith));
    assert_eq!(handle.get_key(Step::Down).unwrap(), Some(jones));
    assert_eq!(handle.get_key(Step::Down).unwrap(), None);
    assert_eq!(handle.current_key(), jones);
    assert_eq!(handle.tree().len(), 4);
}

#[test]
fn test_columns_follow_model_order() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let mut handle = store.open_write(paper).unwrap();

    // Written out of model order
    handle.add_data(Step::Tag(tag(&lexicon, "Year")), INT, 2001).unwrap();
    handle.add_data(Step::Tag(tag(&lexicon, "Title")), TEXT, "Trees").unwrap();

    let tree = handle.tree();
    let tags: Vec<Key> = tree.children(tree.root()).map(|n| tree.key(n)).collect();
    assert_eq!(tags, vec![tag(&lexicon, "Title"), tag(&lexicon, "Year")]);
}

#[test]
fn test_schema_violations_leave_tree_unchanged() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let other = lexicon.object("Paper", "p2").unwrap();
    let mut handle = store.open_write(paper).unwrap();
    handle.add_tag(tag(&lexicon, "Author")).unwrap();
    let nodes = handle.tree().len();

    // wrong class under Author
    let err = handle
        .add_key(Step::Tag(tag(&lexicon, "Author")), other)
        .unwrap_err();
    assert!(matches!(err, StoreError::SchemaViolation { .. }));
    // scalars go through add_data
    assert!(handle.add_key(Step::Here, TEXT).is_err());
    // type the column does not hold
    assert!(handle
        .add_data(Step::Tag(tag(&lexicon, "Author")), INT, 5)
        .is_err());
    // value of the wrong type
    assert!(handle.add_data(Step::Here, INT, "five").is_err());
    // tag from another model
    assert!(handle.add_tag(tag(&lexicon, "Name")).is_err());

    assert_eq!(handle.tree().len(), nodes);
}

#[test]
fn test_add_data_here_overwrites() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let year = tag(&lexicon, "Year");
    let mut handle = store.open_write(paper).unwrap();

    handle.add_tag(year).unwrap();
    handle.add_data(Step::Here, INT, 1999).unwrap();
    assert_eq!(handle.current_key(), INT);
    handle.add_data(Step::Here, INT, 2001).unwrap();

    handle.reset();
    assert_eq!(handle.get_int(Step::Tag(year)).unwrap(), Some(2001));
    assert_eq!(handle.get_int(Step::Down).unwrap(), None);

    // any other step appends an alternative
    handle.add_data(Step::Tag(year), INT, 2002).unwrap();
    handle.reset();
    assert_eq!(handle.get_int(Step::Tag(year)).unwrap(), Some(2001));
    assert_eq!(handle.get_int(Step::Down).unwrap(), Some(2002));
}

#[test]
fn test_empty_text_reads_as_empty_string() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let title = tag(&lexicon, "Title");
    let mut handle = store.open_write(paper).unwrap();

    handle.add_data(Step::Tag(title), TEXT, "").unwrap();
    handle.reset();
    assert_eq!(handle.get_text(Step::Tag(title)).unwrap(), Some(String::new()));
    assert_eq!(handle.tree().value(handle.current()), &Value::None);
}

#[test]
fn test_close_floats_are_not_duplicated() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let score = tag(&lexicon, "Score");
    let mut handle = store.open_write(paper).unwrap();

    handle.add_data(Step::Tag(score), FLOAT, 0.5f32).unwrap();
    handle.add_data(Step::Tag(score), FLOAT, 0.5000001f32).unwrap();
    handle.add_data(Step::Tag(score), FLOAT, 0.75f32).unwrap();

    handle.reset();
    assert_eq!(handle.get_float(Step::Tag(score)).unwrap(), Some(0.5));
    assert_eq!(handle.get_float(Step::Down).unwrap(), Some(0.75));
    assert_eq!(handle.get_float(Step::Down).unwrap(), None);
}

#[test]
fn test_nan_is_not_duplicated() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let score = tag(&lexicon, "Score");
    let mut handle = store.open_write(paper).unwrap();

    handle.add_data(Step::Tag(score), FLOAT, f32::NAN).unwrap();
    let nodes = handle.tree().len();
    handle.add_data(Step::Tag(score), FLOAT, f32::NAN).unwrap();
    assert_eq!(handle.tree().len(), nodes);

    handle.reset();
    assert!(handle.get_float(Step::Tag(score)).unwrap().is_some_and(f32::is_nan));
    assert_eq!(handle.get_float(Step::Down).unwrap(), None);
}

#[test]
fn test_text_with_nul_is_rejected() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let title = tag(&lexicon, "Title");
    let mut handle = store.open_write(paper).unwrap();

    let err = handle.add_data(Step::Tag(title), TEXT, "a\0b").unwrap_err();
    assert!(matches!(err, StoreError::SchemaViolation { .. }));
    assert_eq!(handle.tree().len(), 1);
    assert!(!handle.is_modified());

    // the rest of the edit still saves
    handle.add_data(Step::Tag(title), TEXT, "ab").unwrap();
    store.save(handle).unwrap();
    let mut reader = store.open_read(paper).unwrap();
    assert_eq!(reader.get_text(Step::Tag(title)).unwrap().as_deref(), Some("ab"));
}

#[test]
fn test_repeat_chain_stops_at_nesting_depth() {
    let lexicon = Arc::new(MemoryLexicon::new());
    lexicon.define_class("Seq").unwrap();
    let store = ObjectStore::with_backend(
        Box::new(MemoryBackend::new()),
        lexicon.clone(),
        StoreConfig::default().with_max_nesting_depth(8),
    )
    .unwrap();
    store.load_models("?Seq Scores Int REPEAT\n").unwrap();
    let seq = lexicon.object("Seq", "s1").unwrap();
    let scores = tag(&lexicon, "Scores");
    let mut handle = store.open_write(seq).unwrap();

    // Phase 1: each value nests one level right of the previous one
    handle.add_data(Step::Tag(scores), INT, 0).unwrap();
    let mut accepted = 0;
    let err = loop {
        let nodes = handle.tree().len();
        match handle.add_data(Step::Right, INT, accepted + 1) {
            Ok(()) => accepted += 1,
            Err(err) => {
                assert_eq!(handle.tree().len(), nodes);
                break err;
            }
        }
        assert!(accepted < 100, "chain was never bounded");
    };
    assert!(matches!(err, StoreError::SchemaViolation { .. }));
    assert_eq!(accepted, 6);

    // Phase 2: everything accepted also saves
    let nodes = handle.tree().len();
    store.save(handle).unwrap();
    assert_eq!(store.open_read(seq).unwrap().tree().len(), nodes);
}

#[test]
fn test_get_data_copies_value() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let title = tag(&lexicon, "Title");
    let mut handle = store.open_write(paper).unwrap();
    handle.add_data(Step::Tag(title), TEXT, "First").unwrap();

    handle.reset();
    let copy = handle.get_data(Step::Tag(title), KeyKind::Text).unwrap();
    handle.add_data(Step::Here, TEXT, "Second").unwrap();
    assert_eq!(copy, Some(Value::Text("First".to_string())));
    handle.reset();
    assert_eq!(handle.get_text(Step::Tag(title)).unwrap().as_deref(), Some("Second"));
}

#[test]
fn test_mark_and_goto() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let title = tag(&lexicon, "Title");
    let mut handle = store.open_write(paper).unwrap();
    handle.add_data(Step::Tag(title), TEXT, "Hello").unwrap();

    let mark = handle.mark();
    let at = handle.current();
    handle.reset();
    assert_ne!(handle.current(), at);
    handle.goto(&mark).unwrap();
    assert_eq!(handle.current(), at);
    assert_eq!(handle.current_key(), TEXT);

    // the empty mark is the root
    handle.goto(&Mark::default()).unwrap();
    assert_eq!(handle.current(), handle.tree().root());
}

#[test]
fn test_stale_mark_rejected() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let title = tag(&lexicon, "Title");
    let mut handle = store.open_write(paper).unwrap();
    handle.add_data(Step::Tag(title), TEXT, "Hello").unwrap();
    let mark = handle.mark();

    assert!(handle.find_tag(title).unwrap());
    handle.remove().unwrap();

    assert!(matches!(handle.goto(&mark), Err(StoreError::StaleMark)));
    assert_eq!(handle.tree().len(), 1);
}

#[test]
fn test_mark_from_other_object_rejected() {
    let (store, lexicon) = setup();
    let p1 = lexicon.object("Paper", "p1").unwrap();
    let p2 = lexicon.object("Paper", "p2").unwrap();
    let first = store.open_read(p1).unwrap();
    let mut second = store.open_read(p2).unwrap();

    let err = second.goto(&first.mark()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation { .. }));
}

#[test]
fn test_remove_root_is_refused() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let mut handle = store.open_write(paper).unwrap();
    assert!(matches!(
        handle.remove(),
        Err(StoreError::InvalidOperation { .. })
    ));
    assert!(handle.prune().is_err());
}

#[test]
fn test_prune_climbs_through_lone_ancestors() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let smith = lexicon.object("Person", "smith").unwrap();
    let jones = lexicon.object("Person", "jones").unwrap();
    let author = tag(&lexicon, "Author");
    let title = tag(&lexicon, "Title");

    let mut handle = store.open_write(paper).unwrap();
    handle.add_data(Step::Tag(title), TEXT, "Hello").unwrap();
    handle.add_key(Step::Tag(author), smith).unwrap();
    handle.add_key(Step::Tag(author), jones).unwrap();

    // jones has a sibling: only jones goes
    handle.prune().unwrap();
    handle.reset();
    assert_eq!(handle.get_key(Step::Tag(author)).unwrap(), Some(smith));
    assert_eq!(handle.get_key(Step::Down).unwrap(), None);

    // smith is alone: the Author tag goes with it
    handle.reset();
    handle.get_key(Step::Tag(author)).unwrap();
    handle.prune().unwrap();
    assert!(!handle.find_tag(author).unwrap());
    assert!(handle.find_tag(title).unwrap());
}

#[test]
fn test_clear_leaves_root() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let mut handle = store.open_write(paper).unwrap();
    handle.add_data(Step::Tag(tag(&lexicon, "Year")), INT, 1).unwrap();
    handle.add_data(Step::Tag(tag(&lexicon, "Title")), TEXT, "x").unwrap();

    handle.clear().unwrap();
    assert_eq!(handle.tree().len(), 1);
    assert!(handle.is_modified());
}

#[test]
fn test_subtype_columns() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let address = tag(&lexicon, "Address");
    let street = tag(&lexicon, "Street");
    let town = tag(&lexicon, "Town");

    let mut handle = store.open_write(paper).unwrap();
    handle.add_tag(address).unwrap();
    handle.add_key(Step::Right, street).unwrap();
    handle.add_data(Step::Right, TEXT, "Main St").unwrap();
    // Town resolves inside the Address frame
    handle.add_tag(town).unwrap();
    handle.add_data(Step::Right, TEXT, "Springfield").unwrap();

    // From the root, subtype tags are out of reach
    handle.reset();
    assert!(!handle.find_tag(street).unwrap());

    assert!(handle.find_tag(address).unwrap());
    assert!(handle.step(Step::Right).unwrap());
    assert_eq!(handle.current_key(), street);
    assert_eq!(handle.get_text(Step::Tag(town)).unwrap().as_deref(), Some("Springfield"));
    assert_eq!(handle.get_text(Step::Tag(street)).unwrap().as_deref(), Some("Main St"));
}

#[test]
fn test_comments_are_skipped_by_navigation() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let year = tag(&lexicon, "Year");
    let mut handle = store.open_write(paper).unwrap();

    handle.add_data(Step::Tag(year), INT, 1999).unwrap();
    handle.reset();
    assert!(handle.find_tag(year).unwrap());
    handle.add_comment("estimated").unwrap();
    handle.add_comment("estimated").unwrap();

    assert_eq!(handle.comments(), vec!["estimated".to_string()]);
    assert_eq!(handle.get_int(Step::Right).unwrap(), Some(1999));
    assert_eq!(handle.pending_xrefs().len(), 1);
}

#[test]
fn test_flatten_rows() {
    let (store, lexicon) = setup();
    let paper = lexicon.object("Paper", "p1").unwrap();
    let smith = lexicon.object("Person", "smith").unwrap();
    let author = tag(&lexicon, "Author");
    let year = tag(&lexicon, "Year");

    let mut handle = store.open_write(paper).unwrap();
    handle.add_key(Step::Tag(author), smith).unwrap();
    handle.add_data(Step::Tag(year), INT, 1999).unwrap();
    handle.add_data(Step::Tag(year), INT, 2001).unwrap();
    handle.reset();

    let rows = handle.flatten(3);
    assert_eq!(
        rows,
        vec![
            vec![Unit::Key(author), Unit::Key(smith), Unit::Empty],
            vec![Unit::Key(year), Unit::Int(1999), Unit::Empty],
            vec![Unit::Key(year), Unit::Int(2001), Unit::Empty],
        ]
    );

    // narrower than the tree: paths are cut at the tags
    assert_eq!(
        handle.flatten(1),
        vec![vec![Unit::Key(author)], vec![Unit::Key(year)]]
    );
    assert!(handle.flatten(0).is_empty());
}
