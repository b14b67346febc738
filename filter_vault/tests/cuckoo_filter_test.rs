//! Cuckoo filter acceptance tests: duplicate counting, deletion accounting,
//! growth past nominal capacity, and header + chunk stream reconstruction.

use proptest::prelude::*;

use filter_vault::encoding::MAX_CHUNK_BYTES;
use filter_vault::{CuckooFilter, InsertStatus};

fn dump_and_reload(filter: &CuckooFilter, chunk_size: usize) -> CuckooFilter {
    let mut restored = CuckooFilter::from_header(&filter.header()).unwrap();
    let mut cursor = 0u64;
    loop {
        let (next, chunk) = filter.encoded_chunk(cursor, chunk_size).unwrap();
        if chunk.is_empty() {
            break;
        }
        restored.load_chunk(next, chunk).unwrap();
        cursor = next;
    }
    restored
}

#[test]
fn test_duplicates_count_and_delete() {
    let mut filter = CuckooFilter::new(1000).unwrap();
    assert_eq!(filter.insert(b"a"), InsertStatus::Inserted);
    assert_eq!(filter.insert(b"a"), InsertStatus::Inserted);
    assert_eq!(filter.count(b"a"), 2);

    assert!(filter.delete(b"a"));
    assert_eq!(filter.count(b"a"), 1);
    assert!(filter.check(b"a"));

    assert!(filter.delete(b"a"));
    assert_eq!(filter.count(b"a"), 0);
    assert!(!filter.check(b"a"));
}

#[test]
fn test_insert_unique_returns_exists_without_mutation() {
    let mut filter = CuckooFilter::new(1000).unwrap();
    assert_eq!(filter.insert_unique(b"b"), InsertStatus::Inserted);
    let items_before = filter.num_items();

    assert_eq!(filter.insert_unique(b"b"), InsertStatus::Exists);
    assert_eq!(filter.num_items(), items_before);
    assert_eq!(filter.count(b"b"), 1);
}

#[test]
fn test_item_count_tracks_inserts_minus_deletes() {
    let mut filter = CuckooFilter::new(500).unwrap();
    let mut inserted = 0u64;
    let mut deleted = 0u64;

    for i in 0..300u32 {
        if filter.insert(&i.to_le_bytes()) == InsertStatus::Inserted {
            inserted += 1;
        }
    }
    for i in (0..300u32).step_by(3) {
        if filter.delete(&i.to_le_bytes()) {
            deleted += 1;
        }
    }

    assert_eq!(filter.num_items(), inserted - deleted);
    assert_eq!(filter.num_deletes(), deleted);
}

#[test]
fn test_overfilling_appends_sub_filters_and_keeps_every_item() {
    // nominal capacity 1000 -> 512 buckets, 1024 slots
    let mut filter = CuckooFilter::new(1000).unwrap();
    let items: Vec<Vec<u8>> = (0..1000).map(|i| format!("member-{i}").into_bytes()).collect();

    for item in &items {
        assert_eq!(filter.insert(item), InsertStatus::Inserted);
    }

    assert!(
        filter.num_filters() >= 2,
        "95%+ load on two-slot buckets should have forced a sub-filter append"
    );
    for item in &items {
        assert!(filter.check(item), "lost {:?}", String::from_utf8_lossy(item));
    }
    assert_eq!(filter.num_items(), 1000);
}

#[test]
fn test_deleted_items_stay_deleted_after_reload() {
    let mut filter = CuckooFilter::new(200).unwrap();
    for i in 0..100u32 {
        filter.insert(&i.to_le_bytes());
    }
    for i in 40..60u32 {
        assert!(filter.delete(&i.to_le_bytes()));
    }

    let restored = dump_and_reload(&filter, MAX_CHUNK_BYTES);
    assert_eq!(restored.num_items(), filter.num_items());
    assert_eq!(restored.num_deletes(), filter.num_deletes());
    for i in 0..100u32 {
        assert_eq!(restored.check(&i.to_le_bytes()), filter.check(&i.to_le_bytes()));
    }
    assert_eq!(restored.mem_usage(), filter.mem_usage());
}

#[test]
fn test_reload_answers_identically_on_probe_set() {
    let mut filter = CuckooFilter::new(100).unwrap();
    for i in 0..250u32 {
        filter.insert(&i.to_le_bytes());
    }
    assert!(filter.num_filters() >= 2);

    let restored = dump_and_reload(&filter, 7);
    for i in 0..10_000u32 {
        assert_eq!(
            restored.check(&i.to_le_bytes()),
            filter.check(&i.to_le_bytes()),
            "answer diverged on {i}"
        );
    }
}

proptest! {
    #[test]
    fn prop_inserted_items_check_present(
        items in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..150)
    ) {
        let mut filter = CuckooFilter::new(64).unwrap();
        for item in &items {
            prop_assert_eq!(filter.insert(item), InsertStatus::Inserted);
        }
        for item in &items {
            prop_assert!(filter.check(item));
        }
    }

    #[test]
    fn prop_reload_preserves_answers(
        items in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 1..80),
        chunk_size in 1usize..256
    ) {
        let mut filter = CuckooFilter::new(32).unwrap();
        for item in &items {
            filter.insert(item);
        }

        let restored = dump_and_reload(&filter, chunk_size);
        for item in &items {
            prop_assert!(restored.check(item));
        }
        prop_assert_eq!(restored.num_items(), filter.num_items());
    }
}
