//! Conformance checks for storage adapters.
//!
//! Every check drives units of work through [`MapEntityStore`] over the
//! adapter of a [`TestStore`] and panics on a violation. Checks use
//! disjoint identities, so [`run_all`] can run them on one store.
//!
//! [`MapEntityStore`]: entistore_core::MapEntityStore

use crate::fixtures::TestStore;
use entistore_core::{CoreError, EntityReference, EntityStore, Value};
use entistore_storage::StorageAdapter;

/// Runs every check against `store`.
pub fn run_all(store: &TestStore) {
    committed_state_is_read_back(store);
    stale_writer_loses(store);
    rejected_change_set_writes_nothing(store);
    removal_deletes(store);
    scan_reflects_commits(store);
    stored_envelope_shape(store);
}

fn reference(id: &str) -> EntityReference {
    EntityReference::new(id)
}

/// A committed entity is read back exactly, associations in order.
pub fn committed_state_is_read_back(store: &TestStore) {
    let mut uow = store.new_unit_of_work().expect("Failed to open");
    let ann = uow
        .new_entity("Employee", Some("conf-ann"))
        .expect("Failed to create");
    ann.set_property("name", "Ann").unwrap();
    ann.set_property("salary", 5200.5).unwrap();
    ann.set_property("status", Value::Enum("away".into())).unwrap();
    ann.set_association("manager", Some(reference("conf-boss")))
        .unwrap();
    for (i, friend) in ["conf-c", "conf-a", "conf-b"].into_iter().enumerate() {
        ann.add_many_association("friends", i, reference(friend))
            .unwrap();
    }
    ann.put_named_association("contacts", "work", reference("conf-w"))
        .unwrap();
    ann.put_named_association("contacts", "home", reference("conf-h"))
        .unwrap();
    let expected = ann.clone();
    uow.complete().expect("Failed to complete");

    let mut uow = store.new_unit_of_work().expect("Failed to open");
    let loaded = uow.get("Person", "conf-ann").expect("Entity should exist");
    assert_eq!(loaded.version(), 1);
    assert_eq!(loaded.entity_type(), "Employee");
    assert_eq!(
        loaded.properties().collect::<Vec<_>>(),
        expected.properties().collect::<Vec<_>>()
    );
    assert_eq!(
        loaded.many_association("friends"),
        expected.many_association("friends")
    );
    let keys: Vec<&str> = loaded
        .named_association("contacts")
        .expect("declared")
        .iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(keys, vec!["work", "home"]);
}

/// Of two writers loading the same version, the second to complete loses.
pub fn stale_writer_loses(store: &TestStore) {
    crate::fixtures::scenarios::create_person(store, "conf-race", "A");

    let mut first = store.new_unit_of_work().expect("Failed to open");
    let mut second = store.new_unit_of_work().expect("Failed to open");
    first.get("Person", "conf-race").unwrap();
    second.get("Person", "conf-race").unwrap();

    first
        .get("Person", "conf-race")
        .unwrap()
        .set_property("name", "B")
        .unwrap();
    first.complete().expect("First writer should win");

    second
        .get("Person", "conf-race")
        .unwrap()
        .set_property("name", "C")
        .unwrap();
    let err = second.complete().expect_err("Second writer should lose");
    assert!(err.is_concurrent_modification());
    assert_eq!(err.conflicting_references(), &[reference("conf-race")]);

    let mut check = store.new_unit_of_work().expect("Failed to open");
    let state = check.get("Person", "conf-race").unwrap();
    assert_eq!(state.property("name"), Some(&Value::from("B")));
    assert_eq!(state.version(), 2);
}

/// A change set with one conflict leaves its other changes unwritten.
pub fn rejected_change_set_writes_nothing(store: &TestStore) {
    crate::fixtures::scenarios::create_person(store, "conf-x", "X");

    let mut loser = store.new_unit_of_work().expect("Failed to open");
    loser
        .get("Person", "conf-x")
        .unwrap()
        .set_property("age", 1)
        .unwrap();
    loser.new_entity("Person", Some("conf-y")).unwrap();

    let mut winner = store.new_unit_of_work().expect("Failed to open");
    winner
        .get("Person", "conf-x")
        .unwrap()
        .set_property("age", 2)
        .unwrap();
    winner.complete().unwrap();

    assert!(loser.complete().is_err());
    let mut check = store.new_unit_of_work().expect("Failed to open");
    assert!(matches!(
        check.get("Person", "conf-y"),
        Err(CoreError::NotFound { .. })
    ));
}

/// A removed entity is gone for later units of work.
pub fn removal_deletes(store: &TestStore) {
    crate::fixtures::scenarios::create_person(store, "conf-rm", "R");

    let mut uow = store.new_unit_of_work().expect("Failed to open");
    uow.get("Person", "conf-rm").unwrap();
    uow.remove(&reference("conf-rm")).unwrap();
    uow.complete().unwrap();

    assert!(!store.adapter().contains(&reference("conf-rm")).unwrap());
    let mut check = store.new_unit_of_work().expect("Failed to open");
    assert!(matches!(
        check.get("Person", "conf-rm"),
        Err(CoreError::NotFound { .. })
    ));
}

/// Scans see every committed entity and no removed one, each pass anew.
pub fn scan_reflects_commits(store: &TestStore) {
    let scanned = |store: &TestStore| -> Vec<String> {
        let mut ids: Vec<String> = store
            .store()
            .entity_states()
            .expect("Failed to scan")
            .map(|state| state.expect("Failed to decode").reference().identity().to_string())
            .filter(|id| id.starts_with("conf-scan"))
            .collect();
        ids.sort();
        ids
    };

    crate::fixtures::scenarios::create_person(store, "conf-scan-1", "1");
    crate::fixtures::scenarios::create_person(store, "conf-scan-2", "2");
    assert_eq!(scanned(store), vec!["conf-scan-1", "conf-scan-2"]);

    let mut uow = store.new_unit_of_work().expect("Failed to open");
    uow.get("Person", "conf-scan-1").unwrap();
    uow.remove(&reference("conf-scan-1")).unwrap();
    uow.complete().unwrap();
    assert_eq!(scanned(store), vec!["conf-scan-2"]);
}

/// Stored bytes are a JSON envelope with the documented field names.
pub fn stored_envelope_shape(store: &TestStore) {
    crate::fixtures::scenarios::create_person(store, "conf-env", "E");

    let bytes = store
        .adapter()
        .get(&reference("conf-env"))
        .expect("Entity should be stored");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("Envelope is JSON");
    for field in [
        "identity",
        "type",
        "version",
        "modified",
        "properties",
        "associations",
        "manyAssociations",
        "namedAssociations",
    ] {
        assert!(json.get(field).is_some(), "envelope lacks '{field}'");
    }
    assert_eq!(json["identity"], "conf-env");
    assert_eq!(json["type"], "Person");
    assert_eq!(json["version"], 1);
    assert_eq!(json["properties"]["name"], "E");
}
