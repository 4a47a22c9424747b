//! Export format tests

use std::sync::Arc;
use treestore::export::{to_ace, to_json};
use treestore::key::{INT, TEXT};
use treestore::{MemoryLexicon, NodeView, ObjectHandle, ObjectStore, Step};

fn populated() -> (ObjectStore, ObjectHandle) {
    let lexicon = Arc::new(MemoryLexicon::new());
    lexicon.define_class("Paper").unwrap();
    lexicon.define_class("Person").unwrap();
    let store = ObjectStore::in_memory(lexicon.clone()).unwrap();
    store
        .load_models(concat!(
            "?Paper Title Text\n",
            "       Author ?Person\n",
            "       Year Int\n",
            "?Person Name Text\n",
        ))
        .unwrap();

    let paper = lexicon.object("Paper", "p1").unwrap();
    let smith = lexicon.object("Person", "smith").unwrap();
    let mut handle = store.open_write(paper).unwrap();
    handle
        .add_data(Step::Tag(lexicon.tag("Title").unwrap()), TEXT, "A \"quoted\" title")
        .unwrap();
    handle
        .add_key(Step::Tag(lexicon.tag("Author").unwrap()), smith)
        .unwrap();
    handle
        .add_data(Step::Tag(lexicon.tag("Year").unwrap()), INT, 1999)
        .unwrap();
    handle.reset();
    handle.add_comment("checked").unwrap();
    (store, handle)
}

#[test]
fn test_ace_lines() {
    let (_store, handle) = populated();
    let ace = to_ace(&handle);
    let lines: Vec<&str> = ace.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Paper : \"p1\"",
            "-C \"checked\"",
            "Title\t\"A \\\"quoted\\\" title\"",
            "Author\t\"smith\"",
            "Year\t1999",
        ]
    );
    assert!(ace.ends_with("\n\n"));
}

#[test]
fn test_json_tree_and_view() {
    let (_store, handle) = populated();
    let json = to_json(&handle).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(doc["class"], "Paper");
    assert_eq!(doc["name"], "p1");
    let tree = doc["tree"].as_array().unwrap();
    assert_eq!(tree.len(), 4);
    assert_eq!(tree[0]["comment"], "checked");
    assert_eq!(tree[1]["tag"], "Title");
    assert_eq!(tree[1]["children"][0]["text"], "A \"quoted\" title");
    assert_eq!(tree[2]["children"][0]["class"], "Person");
    assert_eq!(tree[2]["children"][0]["ref"], "smith");
    assert_eq!(tree[3]["children"][0]["int"], 1999);

    let view: NodeView = serde_json::from_value(doc["view"].clone()).unwrap();
    assert_eq!(view, handle.view());
    assert_eq!(view.count(), handle.tree().len());
}
