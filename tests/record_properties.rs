// tests/record_properties.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use serde::{Deserialize, Serialize};

use playbookd::errors::PlaybookdError;
use playbookd::fs::mock::MockFileSystem;
use playbookd::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entity {
    label: String,
    count: i64,
    tags: Vec<String>,
    attrs: BTreeMap<String, String>,
}

fn entity_strategy() -> impl Strategy<Value = Entity> {
    (
        ".*",
        any::<i64>(),
        proptest::collection::vec("[a-z]{0,8}", 0..4),
        proptest::collection::btree_map("[a-z]{1,6}", ".{0,12}", 0..4),
    )
        .prop_map(|(label, count, tags, attrs)| Entity {
            label,
            count,
            tags,
            attrs,
        })
}

fn id_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9._-]{0,15}"
}

proptest! {
    #[test]
    fn stored_entities_read_back_unchanged(id in id_strategy(), entity in entity_strategy()) {
        let fs = Arc::new(MockFileSystem::new());
        let store: RecordStore<Entity> = RecordStore::open(fs, "/records").unwrap();

        store.write(&id, &entity).unwrap();
        prop_assert_eq!(store.read(&id).unwrap(), entity);
    }

    #[test]
    fn changing_the_stored_hash_is_detected(id in id_strategy(), entity in entity_strategy()) {
        let fs = Arc::new(MockFileSystem::new());
        let store: RecordStore<Entity> = RecordStore::open(fs.clone(), "/records").unwrap();
        store.write(&id, &entity).unwrap();

        let path = format!("/records/{id}");
        let text = String::from_utf8(fs.file_contents(&path).unwrap()).unwrap();
        let hash = store.read_record(&id).unwrap().hash;
        let flipped = if hash.starts_with('0') { format!("1{}", &hash[1..]) } else { format!("0{}", &hash[1..]) };
        let tampered = text.replacen(&hash, &flipped, 1);
        prop_assert_ne!(&tampered, &text);
        fs.add_file(&path, tampered.into_bytes());

        let is_corrupted = matches!(
            store.read(&id),
            Err(PlaybookdError::RecordCorrupted { ref stored, .. }) if *stored == flipped
        );
        prop_assert!(is_corrupted);
    }
}
