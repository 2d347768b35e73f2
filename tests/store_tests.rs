use std::collections::BTreeMap;

use graphimport::{
    GraphImportError, GraphStore, Index, Key, PropertyValue, SqliteStore, StoreConfig,
    fragment::set_property,
    store::{SavepointGuard, SchemaKind, SchemaOutcome, TransactionGuard},
    value::Properties,
};
use tempfile::TempDir;

fn keyed_node(store: &SqliteStore, key: &Key) -> graphimport::NodeHandle {
    let node = store.create_node().expect("node");
    store.add_label(node, key.label()).expect("label");
    store
        .set_node_property(node, key.property(), &PropertyValue::from(&key.value))
        .expect("property");
    node
}

#[test]
fn find_nodes_matches_label_property_and_typed_value() {
    let store = SqliteStore::open_in_memory().expect("store");
    let key = Key::with_property("Person", "id", "1");
    let first = keyed_node(&store, &key);
    let second = keyed_node(&store, &key);
    keyed_node(&store, &Key::with_property("Person", "id", 1));
    keyed_node(&store, &Key::with_property("Grant", "id", "1"));

    assert_eq!(store.find_nodes(&key).expect("find"), vec![first, second]);
    assert_eq!(
        store
            .find_nodes(&Key::with_property("Person", "id", 1))
            .expect("find")
            .len(),
        1
    );
    assert!(
        store
            .find_nodes(&Key::with_property("Person", "id", "2"))
            .expect("find")
            .is_empty()
    );
}

#[test]
fn node_properties_are_last_write_wins() {
    let store = SqliteStore::open_in_memory().expect("store");
    let node = store.create_node().expect("node");
    store
        .set_node_property(node, "name", &PropertyValue::from("first"))
        .expect("set");
    store
        .set_node_property(node, "name", &PropertyValue::from("second"))
        .expect("set");
    store.add_label(node, "Person").expect("label");
    store.add_label(node, "Person").expect("label twice");

    assert_eq!(
        store.node_property(node, "name").expect("read"),
        Some(PropertyValue::from("second"))
    );
    assert_eq!(store.node_labels(node).expect("labels"), vec!["Person"]);
    assert_eq!(store.node_properties(node).expect("props").len(), 1);
}

#[test]
fn non_finite_property_is_rejected() {
    let store = SqliteStore::open_in_memory().expect("store");
    let node = store.create_node().expect("node");
    let err = store
        .set_node_property(node, "score", &PropertyValue::Float(f64::NAN))
        .expect_err("nan must fail");
    assert!(matches!(err, GraphImportError::InvalidInput(_)));
    assert!(store.node_properties(node).expect("props").is_empty());
}

#[test]
fn writes_to_missing_node_fail() {
    let store = SqliteStore::open_in_memory().expect("store");
    let err = store
        .add_label(graphimport::NodeHandle(99), "Person")
        .expect_err("missing node");
    assert!(matches!(err, GraphImportError::NotFound(_)));
}

#[test]
fn relationships_merge_properties() {
    let store = SqliteStore::open_in_memory().expect("store");
    let a = store.create_node().expect("a");
    let b = store.create_node().expect("b");
    assert_eq!(store.find_relationship(a, b, "KNOWS").expect("find"), None);

    let rel = store.create_relationship(a, b, "KNOWS").expect("create");
    assert_eq!(store.find_relationship(a, b, "KNOWS").expect("find"), Some(rel));
    assert_eq!(store.find_relationship(b, a, "KNOWS").expect("find"), None);
    assert_eq!(store.find_relationship(a, b, "CITES").expect("find"), None);

    let mut props = Properties::new();
    set_property(&mut props, "since", 2001);
    set_property(&mut props, "weight", 0.5);
    store.merge_relationship_properties(rel, &props).expect("merge");
    let mut update = Properties::new();
    set_property(&mut update, "since", 2005);
    store.merge_relationship_properties(rel, &update).expect("merge");

    let stored = store.relationship(rel).expect("read");
    assert_eq!(stored.start, a);
    assert_eq!(stored.end, b);
    assert_eq!(stored.rel_type, "KNOWS");
    assert_eq!(stored.properties["since"], PropertyValue::Integer(2005));
    assert_eq!(stored.properties["weight"], PropertyValue::Float(0.5));
}

#[test]
fn relationship_endpoints_must_exist() {
    let store = SqliteStore::open_in_memory().expect("store");
    let a = store.create_node().expect("a");
    assert!(
        store
            .create_relationship(a, graphimport::NodeHandle(42), "KNOWS")
            .is_err()
    );
    assert!(store.create_relationship(a, a, "SELF").is_ok());
    assert_eq!(store.relationship_count().expect("count"), 1);
}

#[test]
fn ensure_index_is_idempotent() {
    let store = SqliteStore::open_in_memory().expect("store");
    let index = Index::with_property("Person", "id");
    assert_eq!(store.ensure_index(&index).expect("create"), SchemaOutcome::Created);
    assert_eq!(store.ensure_index(&index).expect("again"), SchemaOutcome::Existing);
    assert_eq!(
        store.schema_entries().expect("entries"),
        vec![(index, SchemaKind::Index)]
    );
}

#[test]
fn unique_constraint_upgrades_index_and_rejects_duplicates() {
    let store = SqliteStore::open_in_memory().expect("store");
    let index = Index::with_property("Person", "id");
    store.ensure_index(&index).expect("index");
    assert_eq!(
        store.ensure_unique_constraint(&index).expect("upgrade"),
        SchemaOutcome::Upgraded
    );
    assert_eq!(
        store.ensure_unique_constraint(&index).expect("again"),
        SchemaOutcome::Existing
    );
    assert_eq!(store.ensure_index(&index).expect("index"), SchemaOutcome::Existing);

    let key = Key::with_property("Person", "id", "A1");
    keyed_node(&store, &key);
    let other = store.create_node().expect("node");
    store.add_label(other, "Person").expect("label");
    let err = store
        .set_node_property(other, "id", &PropertyValue::from("A1"))
        .expect_err("duplicate");
    assert!(matches!(err, GraphImportError::ConstraintViolation(_)));
    assert_eq!(store.node_property(other, "id").expect("read"), None);

    // Unlabeled nodes are outside the constraint.
    let loose = store.create_node().expect("node");
    store
        .set_node_property(loose, "id", &PropertyValue::from("A1"))
        .expect("unlabeled");
    let err = store.add_label(loose, "Person").expect_err("label makes it collide");
    assert!(matches!(err, GraphImportError::ConstraintViolation(_)));
    assert!(store.node_labels(loose).expect("labels").is_empty());
}

#[test]
fn unique_constraint_over_existing_duplicates_fails() {
    let store = SqliteStore::open_in_memory().expect("store");
    let key = Key::with_property("Person", "id", "A1");
    keyed_node(&store, &key);
    keyed_node(&store, &key);
    let err = store
        .ensure_unique_constraint(&key.index)
        .expect_err("duplicates");
    assert!(matches!(err, GraphImportError::ConstraintViolation(_)));
    assert!(store.schema_entries().expect("entries").is_empty());
}

#[test]
fn transaction_guard_rolls_back_on_drop() {
    let store = SqliteStore::open_in_memory().expect("store");
    {
        let _tx = TransactionGuard::begin(&store).expect("begin");
        store.create_node().expect("node");
    }
    assert_eq!(store.node_count().expect("count"), 0);

    let tx = TransactionGuard::begin(&store).expect("begin");
    tx.store().create_node().expect("node");
    tx.commit().expect("commit");
    assert_eq!(store.node_count().expect("count"), 1);

    let result: Result<(), GraphImportError> = TransactionGuard::begin(&store)
        .expect("begin")
        .execute(|store| {
            store.create_node()?;
            Err(GraphImportError::invalid_input("abort"))
        });
    assert!(result.is_err());
    assert_eq!(store.node_count().expect("count"), 1);
}

#[test]
fn savepoint_rollback_keeps_outer_work() {
    let store = SqliteStore::open_in_memory().expect("store");
    let tx = TransactionGuard::begin(&store).expect("begin");
    store.create_node().expect("kept");
    {
        let savepoint = SavepointGuard::open(&store, "inner").expect("savepoint");
        store.create_node().expect("discarded");
        savepoint.rollback().expect("rollback");
    }
    {
        let savepoint = SavepointGuard::open(&store, "inner").expect("savepoint");
        store.create_node().expect("released");
        savepoint.release().expect("release");
    }
    {
        let _savepoint = SavepointGuard::open(&store, "inner").expect("savepoint");
        store.create_node().expect("dropped");
    }
    tx.commit().expect("commit");
    assert_eq!(store.node_count().expect("count"), 2);
}

#[test]
fn invalid_savepoint_names_are_rejected() {
    let store = SqliteStore::open_in_memory().expect("store");
    assert!(store.savepoint("bad name; DROP TABLE graph_nodes").is_err());
    assert!(store.savepoint("").is_err());
}

#[test]
fn count_label_connections_counts_either_direction() {
    let store = SqliteStore::open_in_memory().expect("store");
    let person = keyed_node(&store, &Key::labeled("Person", "p"));
    let grant = keyed_node(&store, &Key::labeled("Grant", "g"));
    let other = keyed_node(&store, &Key::labeled("Grant", "h"));
    store.create_relationship(person, grant, "FUNDED_BY").expect("rel");
    store.create_relationship(other, person, "FUNDS").expect("rel");
    store.create_relationship(grant, other, "RELATED").expect("rel");

    assert_eq!(
        store.count_label_connections("Person", "Grant").expect("count"),
        2
    );
    assert_eq!(
        store.count_label_connections("Grant", "Person").expect("count"),
        2
    );
    assert_eq!(
        store.count_label_connections("Grant", "Grant").expect("count"),
        1
    );
    assert_eq!(store.relationships(Some("FUNDS")).expect("rels").len(), 1);
    assert_eq!(store.relationships(None).expect("rels").len(), 3);
}

#[test]
fn read_only_store_requires_existing_graph() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("graph.db");
    {
        let store = SqliteStore::open(&path).expect("create");
        store.create_node().expect("node");
    }
    let store = SqliteStore::open_read_only(&path).expect("read only");
    assert_eq!(store.node_count().expect("count"), 1);
    assert!(store.create_node().is_err());

    let empty = dir.path().join("empty.db");
    rusqlite::Connection::open(&empty).expect("plain sqlite");
    assert!(SqliteStore::open_read_only(&empty).is_err());
    assert!(SqliteStore::open_read_only(dir.path().join("missing.db")).is_err());
}

#[test]
fn open_with_config_applies_pragmas() {
    let dir = TempDir::new().expect("tempdir");
    let mut pragmas = BTreeMap::new();
    pragmas.insert("journal_mode".to_string(), "WAL".to_string());
    pragmas.insert("synchronous".to_string(), "NORMAL".to_string());
    let config = StoreConfig {
        cache_size: Some(64),
        pragmas,
    };
    let store = SqliteStore::open_with_config(dir.path().join("graph.db"), &config).expect("open");
    store.create_node().expect("node");

    let mut bad = BTreeMap::new();
    bad.insert("journal_mode; DROP".to_string(), "WAL".to_string());
    let bad = StoreConfig {
        cache_size: None,
        pragmas: bad,
    };
    assert!(SqliteStore::open_with_config(dir.path().join("bad.db"), &bad).is_err());
}
