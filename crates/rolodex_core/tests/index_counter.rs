use rolodex_core::repo::index_counter::{COUNTER_FILENAME, COUNTER_LOCK_FILENAME};
use rolodex_core::IndexCounter;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

fn write_contact(dir: &Path, identifier: &str, index: u32) {
    fs::write(
        dir.join(format!("{identifier}--c{index}__contact.md")),
        format!("---\ntitle: C{index}\ntags: [contact]\nidentifier: {identifier}\nindex_id: {index}\n---\n"),
    )
    .unwrap();
}

fn read_next(dir: &Path) -> u64 {
    let raw = fs::read_to_string(dir.join(COUNTER_FILENAME)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    json["next_index_id"].as_u64().unwrap()
}

#[test]
fn fresh_directory_allocates_from_one() {
    let dir = tempfile::tempdir().unwrap();
    let counter = IndexCounter::open(dir.path()).unwrap();

    let allocated: Vec<u32> = (0..5).map(|_| counter.next_index().unwrap()).collect();
    assert_eq!(allocated, vec![1, 2, 3, 4, 5]);
    assert_eq!(read_next(dir.path()), 6);
    assert!(dir.path().join(COUNTER_LOCK_FILENAME).exists());
}

#[test]
fn counter_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let counter = IndexCounter::open(dir.path()).unwrap();
        counter.next_index().unwrap();
        counter.next_index().unwrap();
    }
    let reopened = IndexCounter::open(dir.path()).unwrap();
    assert_eq!(reopened.next_index().unwrap(), 3);
}

#[test]
fn missing_counter_heals_from_existing_records() {
    let dir = tempfile::tempdir().unwrap();
    write_contact(dir.path(), "20240101T000000", 3);
    write_contact(dir.path(), "20240102T000000", 7);

    let counter = IndexCounter::open(dir.path()).unwrap();
    assert_eq!(counter.peek().unwrap(), 8);
    assert_eq!(counter.next_index().unwrap(), 8);
}

#[test]
fn deleted_record_index_is_not_reused() {
    let dir = tempfile::tempdir().unwrap();
    let counter = IndexCounter::open(dir.path()).unwrap();
    let first = counter.next_index().unwrap();
    write_contact(dir.path(), "20240101T000000", first);
    let second = counter.next_index().unwrap();
    write_contact(dir.path(), "20240102T000000", second);

    fs::remove_file(dir.path().join(format!("20240102T000000--c{second}__contact.md"))).unwrap();
    drop(counter);

    let counter = IndexCounter::open(dir.path()).unwrap();
    assert_eq!(counter.next_index().unwrap(), 3);
}

#[test]
fn independent_handles_never_hand_out_the_same_value() {
    let dir = tempfile::tempdir().unwrap();
    let root = Arc::new(dir.path().to_path_buf());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let root = Arc::clone(&root);
            thread::spawn(move || {
                // Separate handle per worker, as separate processes would have.
                let counter = IndexCounter::open(root.as_path()).unwrap();
                (0..25)
                    .map(|_| counter.next_index().unwrap())
                    .collect::<Vec<u32>>()
            })
        })
        .collect();

    let mut seen = BTreeSet::new();
    for worker in workers {
        for value in worker.join().unwrap() {
            assert!(seen.insert(value), "index {value} handed out twice");
        }
    }
    assert_eq!(seen.len(), 100);
    assert_eq!(seen.iter().next_back().copied(), Some(100));
    assert_eq!(read_next(dir.path()), 101);
}

#[test]
fn corrupt_counter_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(COUNTER_FILENAME), "not json").unwrap();
    let err = IndexCounter::open(dir.path()).unwrap_err();
    assert!(err.to_string().contains("index counter error"));
}
