//! Cross-reference integration tests
//!
//! Reciprocal edits are applied at save time to the referenced objects.

use std::sync::Arc;
use treestore::key::{COMMENT_CLASS, QUOTED_IN, TEXT};
use treestore::storage::RecordWrite;
use treestore::{
    CodecError, Key, Lexicon, MemoryBackend, MemoryLexicon, ObjectStore, SaveReport, Step,
    StorageBackend, StoreConfig, StoreError,
};

const MODELS: &str = "\
?Paper Title Text
       Author ?Person XREF Paper
       Editor UNIQUE ?Person XREF Edited
?Person Paper ?Paper XREF Author
        Edited ?Paper XREF Editor
";

struct Fixture {
    store: ObjectStore,
    backend: MemoryBackend,
    lexicon: Arc<MemoryLexicon>,
}

impl Fixture {
    fn new(config: StoreConfig) -> Self {
        let lexicon = Arc::new(MemoryLexicon::new());
        lexicon.define_class("Paper").unwrap();
        lexicon.define_class("Person").unwrap();
        let backend = MemoryBackend::new();
        let store =
            ObjectStore::with_backend(Box::new(backend.clone()), lexicon.clone(), config)
                .unwrap();
        store.load_models(MODELS).unwrap();
        Self {
            store,
            backend,
            lexicon,
        }
    }

    fn paper(&self, name: &str) -> Key {
        self.lexicon.object("Paper", name).unwrap()
    }

    fn person(&self, name: &str) -> Key {
        self.lexicon.object("Person", name).unwrap()
    }

    fn tag(&self, name: &str) -> Key {
        self.lexicon.tag(name).unwrap()
    }

    /// Every reference stored under `tag` in `object`.
    fn refs(&self, object: Key, tag: &str) -> Vec<Key> {
        let mut handle = self.store.open_read(object).unwrap();
        let mut found = Vec::new();
        let mut next = handle.get_key(Step::Tag(self.tag(tag))).unwrap();
        while let Some(key) = next {
            found.push(key);
            next = handle.get_key(Step::Down).unwrap();
        }
        found
    }
}

#[test]
fn test_add_is_mirrored() {
    let fx = Fixture::new(StoreConfig::default());
    let p1 = fx.paper("p1");
    let smith = fx.person("smith");

    let mut handle = fx.store.open_write(p1).unwrap();
    handle.add_key(Step::Tag(fx.tag("Author")), smith).unwrap();
    assert_eq!(handle.pending_xrefs().len(), 1);
    let report = fx.store.save(handle).unwrap();

    assert_eq!(
        report,
        SaveReport {
            written: 2,
            xrefs_applied: 1,
            xrefs_dropped: 0,
        }
    );
    assert_eq!(fx.refs(smith, "Paper"), vec![p1]);
    assert_eq!(fx.refs(p1, "Author"), vec![smith]);
}

#[test]
fn test_mirroring_works_from_either_side() {
    let fx = Fixture::new(StoreConfig::default());
    let p1 = fx.paper("p1");
    let p2 = fx.paper("p2");
    let smith = fx.person("smith");

    let mut handle = fx.store.open_write(smith).unwrap();
    handle.add_key(Step::Tag(fx.tag("Paper")), p1).unwrap();
    handle.add_key(Step::Tag(fx.tag("Paper")), p2).unwrap();
    fx.store.save(handle).unwrap();

    assert_eq!(fx.refs(p1, "Author"), vec![smith]);
    assert_eq!(fx.refs(p2, "Author"), vec![smith]);
    assert_eq!(fx.refs(smith, "Paper"), vec![p1, p2]);
}

#[test]
fn test_removal_is_mirrored() {
    let fx = Fixture::new(StoreConfig::default());
    let p1 = fx.paper("p1");
    let smith = fx.person("smith");
    let jones = fx.person("jones");
    let author = fx.tag("Author");

    let mut handle = fx.store.open_write(p1).unwrap();
    handle.add_key(Step::Tag(author), smith).unwrap();
    handle.add_key(Step::Tag(author), jones).unwrap();
    fx.store.save(handle).unwrap();

    let mut handle = fx.store.open_write(p1).unwrap();
    assert_eq!(handle.get_key(Step::Tag(author)).unwrap(), Some(smith));
    handle.remove().unwrap();
    let report = fx.store.save(handle).unwrap();
    assert_eq!(report.xrefs_applied, 1);

    assert_eq!(fx.refs(p1, "Author"), vec![jones]);
    assert_eq!(fx.refs(jones, "Paper"), vec![p1]);
    // smith held nothing else, so the record goes
    assert!(fx.refs(smith, "Paper").is_empty());
    assert!(!fx.store.exists(smith).unwrap());
}

#[test]
fn test_unique_eviction_detaches_old_target() {
    let fx = Fixture::new(StoreConfig::default());
    let p1 = fx.paper("p1");
    let smith = fx.person("smith");
    let jones = fx.person("jones");
    let editor = fx.tag("Editor");

    let mut handle = fx.store.open_write(p1).unwrap();
    handle.add_key(Step::Tag(editor), smith).unwrap();
    fx.store.save(handle).unwrap();
    assert_eq!(fx.refs(smith, "Edited"), vec![p1]);

    let mut handle = fx.store.open_write(p1).unwrap();
    handle.add_key(Step::Tag(editor), jones).unwrap();
    let pending = handle.pending_xrefs().to_vec();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().any(|e| e.target == smith && e.delete));
    assert!(pending.iter().any(|e| e.target == jones && !e.delete));
    fx.store.save(handle).unwrap();

    assert_eq!(fx.refs(p1, "Editor"), vec![jones]);
    assert_eq!(fx.refs(jones, "Edited"), vec![p1]);
    assert!(fx.refs(smith, "Edited").is_empty());
}

#[test]
fn test_locked_target_is_dropped_but_primary_commits() {
    let fx = Fixture::new(StoreConfig::default());
    let p1 = fx.paper("p1");
    let smith = fx.person("smith");

    let held = fx.store.open_write(smith).unwrap();

    let mut handle = fx.store.open_write(p1).unwrap();
    handle.add_key(Step::Tag(fx.tag("Author")), smith).unwrap();
    let report = fx.store.save(handle).unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(report.xrefs_dropped, 1);
    assert_eq!(report.xrefs_applied, 0);

    fx.store.discard(held);
    assert_eq!(fx.refs(p1, "Author"), vec![smith]);
    assert!(fx.refs(smith, "Paper").is_empty());
}

#[test]
fn test_corrupt_target_fails_the_save() {
    let fx = Fixture::new(StoreConfig::default());
    let p1 = fx.paper("p1");
    let smith = fx.person("smith");

    // baseline cell plus three stray bytes
    fx.backend
        .clone()
        .write_batch(&[RecordWrite::Put {
            key: smith,
            record: vec![0, 0, 0, 0, 1, 2, 3],
        }])
        .unwrap();

    let mut handle = fx.store.open_write(p1).unwrap();
    handle.add_key(Step::Tag(fx.tag("Author")), smith).unwrap();
    let err = fx.store.save(handle).unwrap_err();
    assert!(matches!(err, StoreError::Codec(CodecError::Misaligned { len: 3 })));
    assert!(!err.is_recoverable());

    // the primary record was queued before the target was opened
    assert_eq!(fx.refs(p1, "Author"), vec![smith]);
    assert!(!fx.store.cache().is_locked(smith));
}

#[test]
fn test_depth_limit_drops_edits() {
    let config = StoreConfig {
        max_xref_depth: 0,
        ..StoreConfig::default()
    };
    let fx = Fixture::new(config);
    let p1 = fx.paper("p1");
    let smith = fx.person("smith");

    let mut handle = fx.store.open_write(p1).unwrap();
    handle.add_key(Step::Tag(fx.tag("Author")), smith).unwrap();
    let report = fx.store.save(handle).unwrap();
    assert_eq!(report.xrefs_dropped, 1);
    assert!(!fx.store.exists(smith).unwrap());
}

#[test]
fn test_delete_detaches_everything() {
    let fx = Fixture::new(StoreConfig::default());
    let p1 = fx.paper("p1");
    let smith = fx.person("smith");
    let jones = fx.person("jones");

    let mut handle = fx.store.open_write(p1).unwrap();
    handle.add_key(Step::Tag(fx.tag("Author")), smith).unwrap();
    handle.add_key(Step::Tag(fx.tag("Editor")), jones).unwrap();
    fx.store.save(handle).unwrap();

    let report = fx.store.delete(p1).unwrap();
    assert_eq!(report.xrefs_applied, 2);
    assert!(!fx.store.exists(p1).unwrap());
    assert!(!fx.store.exists(smith).unwrap());
    assert!(!fx.store.exists(jones).unwrap());
}

#[test]
fn test_comment_gets_quoted_in() {
    let fx = Fixture::new(StoreConfig::default());
    let p1 = fx.paper("p1");

    let mut handle = fx.store.open_write(p1).unwrap();
    handle
        .add_data(Step::Tag(fx.tag("Title")), TEXT, "Trees")
        .unwrap();
    handle.add_comment("needs review").unwrap();
    fx.store.save(handle).unwrap();

    let comment = fx.lexicon.lookup(COMMENT_CLASS, "needs review").unwrap();
    let mut note = fx.store.open_read(comment).unwrap();
    assert_eq!(note.get_key(Step::Tag(QUOTED_IN)).unwrap(), Some(p1));

    // removing the commented node unquotes the comment
    let mut handle = fx.store.open_write(p1).unwrap();
    assert!(handle.find_tag(fx.tag("Title")).unwrap());
    handle.remove().unwrap();
    fx.store.save(handle).unwrap();
    assert!(!fx.store.exists(comment).unwrap());
}
