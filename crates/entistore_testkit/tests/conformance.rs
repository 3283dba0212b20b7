//! Runs the adapter conformance suite against every bundled adapter.

use entistore_core::{Config, CoreError};
use entistore_testkit::prelude::*;
use entistore_testkit::scenarios;
use proptest::prelude::*;
use std::sync::Arc;

#[test]
fn memory_adapter_conforms() {
    conformance::run_all(&TestStore::memory());
}

#[test]
fn log_adapter_conforms() {
    conformance::run_all(&TestStore::log());
}

#[test]
fn log_adapter_conforms_after_reopen() {
    let store = TestStore::log();
    conformance::committed_state_is_read_back(&store);
    let store = store.reopen();

    let mut uow = store.new_unit_of_work().unwrap();
    assert_eq!(uow.get("Employee", "conf-ann").unwrap().version(), 1);
    drop(uow);
    conformance::stale_writer_loses(&store);
}

#[test]
fn precheck_applies_to_every_adapter() {
    for backend in [Backend::Memory, Backend::Log] {
        let store = TestStore::new(backend, Config::default().precheck_new_identity(true));
        scenarios::create_person(&store, "taken", "T");

        let mut uow = store.new_unit_of_work().unwrap();
        assert!(matches!(
            uow.new_entity("Person", Some("taken")),
            Err(CoreError::AlreadyExists { .. })
        ));
    }
}

#[test]
fn concurrent_increments_on_the_log_adapter() {
    let store = TestStore::log();
    let config = StressConfig {
        operations: 25,
        threads: 4,
        counters: 2,
        max_retries: 200,
    };
    create_counters(&store, &config);

    let result = stress_concurrent_increments(&store, &config);
    assert_eq!(counter_total(&store, &config), result.successful_ops as i64);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn generated_people_persist(
        state in entity_state_strategy(Arc::clone(sample_model().descriptor("Person").unwrap()))
    ) {
        with_memory_store(|store| {
            let mut uow = store.new_unit_of_work().unwrap();
            let identity = state.reference().identity().to_string();
            let created = uow.new_entity("Person", Some(&identity)).unwrap();
            for (name, value) in state.properties() {
                created.set_property(name, value.clone()).unwrap();
            }
            for (name, target) in state.associations() {
                created.set_association(name, target.cloned()).unwrap();
            }
            for (name, references) in state.many_associations() {
                for (i, reference) in references.iter().enumerate() {
                    created.add_many_association(name, i, reference.clone()).unwrap();
                }
            }
            for (name, named) in state.named_associations() {
                for (key, reference) in named.iter() {
                    created.put_named_association(name, key, reference.clone()).unwrap();
                }
            }
            uow.complete().unwrap();

            let mut check = store.new_unit_of_work().unwrap();
            let loaded = check.get("Person", &identity).unwrap();
            assert_eq!(loaded.properties().collect::<Vec<_>>(), state.properties().collect::<Vec<_>>());
            assert_eq!(loaded.many_associations().collect::<Vec<_>>(), state.many_associations().collect::<Vec<_>>());
            assert_eq!(loaded.named_associations().collect::<Vec<_>>(), state.named_associations().collect::<Vec<_>>());
            assert_eq!(loaded.version(), 1);
        });
    }
}
