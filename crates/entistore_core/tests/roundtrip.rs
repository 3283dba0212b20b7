//! Property tests: encoding then decoding an entity state gives it back.

use chrono::{TimeZone, Utc};
use entistore_codec::EnvelopeFormat;
use entistore_core::{
    EntityDescriptor, EntityModel, EntityReference, EntityState, EntityStateSerializer, Value,
    ValueType,
};
use proptest::prelude::*;
use std::sync::Arc;

fn model() -> Arc<EntityModel> {
    Arc::new(
        EntityModel::new()
            .with_type(
                EntityDescriptor::new("Document")
                    .property("title", ValueType::Text)
                    .property("pages", ValueType::Integer)
                    .property("rating", ValueType::Float)
                    .property("draft", ValueType::Bool)
                    .property("blob", ValueType::Bytes)
                    .property("tags", ValueType::list(ValueType::Text))
                    .property("counts", ValueType::map(ValueType::Text, ValueType::Integer))
                    .association("author")
                    .many_association("reviewers")
                    .named_association("links"),
            )
            .unwrap(),
    )
}

#[derive(Debug, Clone)]
struct Fields {
    title: Option<String>,
    pages: i64,
    rating: f64,
    draft: bool,
    blob: Vec<u8>,
    tags: Vec<String>,
    counts: Vec<(String, i64)>,
    author: Option<String>,
    reviewers: Vec<String>,
    links: Vec<(String, String)>,
}

fn identity() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}"
}

fn fields() -> impl Strategy<Value = Fields> {
    (
        (
            proptest::option::of(".{0,24}"),
            any::<i64>(),
            // Quarters print and parse back exactly
            (-4_000_000i32..4_000_000).prop_map(|n| f64::from(n) / 4.0),
            any::<bool>(),
            proptest::collection::vec(any::<u8>(), 0..64),
        ),
        (
            proptest::collection::vec("[a-z]{0,8}", 0..6),
            proptest::collection::vec(("[a-z]{1,6}", any::<i64>()), 0..6),
            proptest::option::of(identity()),
            proptest::collection::vec(identity(), 0..8),
            proptest::collection::vec(("[a-z]{1,6}", identity()), 0..8),
        ),
    )
        .prop_map(
            |((title, pages, rating, draft, blob), (tags, counts, author, reviewers, links))| {
                Fields {
                    title,
                    pages,
                    rating,
                    draft,
                    blob,
                    tags,
                    counts,
                    author,
                    reviewers,
                    links,
                }
            },
        )
}

fn build(model: &EntityModel, id: &str, f: &Fields) -> EntityState {
    let descriptor = Arc::clone(model.descriptor("Document").unwrap());
    let mut state = EntityState::new(EntityReference::new(id), descriptor);
    state.set_property("title", f.title.clone()).unwrap();
    state.set_property("pages", f.pages).unwrap();
    state.set_property("rating", f.rating).unwrap();
    state.set_property("draft", f.draft).unwrap();
    state.set_property("blob", f.blob.clone()).unwrap();
    state
        .set_property(
            "tags",
            Value::List(f.tags.iter().map(|t| Value::from(t.as_str())).collect()),
        )
        .unwrap();
    state
        .set_property(
            "counts",
            Value::map(
                f.counts
                    .iter()
                    .map(|(k, v)| (Value::from(k.as_str()), Value::Integer(*v)))
                    .collect(),
            ),
        )
        .unwrap();
    state
        .set_association("author", f.author.as_deref().map(EntityReference::new))
        .unwrap();
    for (i, reviewer) in f.reviewers.iter().enumerate() {
        state
            .add_many_association("reviewers", i, EntityReference::new(reviewer))
            .unwrap();
    }
    for (key, target) in &f.links {
        state
            .put_named_association("links", key.as_str(), EntityReference::new(target))
            .unwrap();
    }
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn json_roundtrip(id in identity(), f in fields()) {
        let model = model();
        let serializer = EntityStateSerializer::new(Arc::clone(&model));
        let state = build(&model, &id, &f);

        let decoded = serializer.decode(&serializer.encode(&state).unwrap()).unwrap();
        prop_assert_eq!(&decoded, &state);
    }

    #[test]
    fn cbor_roundtrip(id in identity(), f in fields(), version in 0u64..1000, millis in 0i64..4_000_000_000_000) {
        let model = model();
        let serializer = EntityStateSerializer::new(Arc::clone(&model)).with_format(EnvelopeFormat::Cbor);
        let state = build(&model, &id, &f);
        let modified = Utc.timestamp_millis_opt(millis).unwrap();

        let decoded = serializer
            .decode(&serializer.encode_as(&state, version, modified).unwrap())
            .unwrap();
        prop_assert_eq!(decoded.version(), version);
        prop_assert_eq!(decoded.last_modified(), modified);
        prop_assert_eq!(decoded.properties().collect::<Vec<_>>(), state.properties().collect::<Vec<_>>());
    }

    #[test]
    fn association_order_survives(id in identity(), f in fields()) {
        let model = model();
        let serializer = EntityStateSerializer::new(Arc::clone(&model));
        let state = build(&model, &id, &f);
        let decoded = serializer.decode(&serializer.encode(&state).unwrap()).unwrap();

        let reviewers: Vec<&str> = decoded
            .many_association("reviewers")
            .iter()
            .map(EntityReference::identity)
            .collect();
        let expected: Vec<&str> = f.reviewers.iter().map(String::as_str).collect();
        prop_assert_eq!(reviewers, expected);

        let keys: Vec<&str> = decoded.named_association("links").unwrap().iter().map(|(k, _)| k).collect();
        let expected_keys: Vec<&str> = state.named_association("links").unwrap().iter().map(|(k, _)| k).collect();
        prop_assert_eq!(keys, expected_keys);
    }
}
