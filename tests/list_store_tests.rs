//! Derived list store integration tests: flush pipeline, merge
//! idempotence, and the missing-id scan.

use std::fs;

use seqmine::store::{catalog_dir, ListSet, ListStore};
use seqmine::uid::Field;
use tempfile::TempDir;

fn field(key: char, seq_id: u32, content: &str) -> Field {
    Field {
        key,
        seq_id,
        content: content.to_string(),
    }
}

#[test]
fn test_flush_writes_exact_grouped_format() {
    let tmp = TempDir::new().unwrap();
    let list = ListStore::new("comments", 'C', tmp.path());
    list.update(&[field('C', 1, "a"), field('C', 1, "b"), field('C', 3, "c")]);
    list.flush(false).unwrap();

    let content = fs::read_to_string(list.path()).unwrap();
    assert_eq!(content, "A000001: a\n  b\nA000003: c\n");
}

#[test]
fn test_empty_flush_leaves_file_byte_identical() {
    let tmp = TempDir::new().unwrap();
    let list = ListStore::new("comments", 'C', tmp.path());
    list.update(&[field('C', 7, "x")]);
    list.flush(false).unwrap();
    let before = fs::read(list.path()).unwrap();

    list.flush(false).unwrap();
    assert_eq!(fs::read(list.path()).unwrap(), before);
}

#[test]
fn test_content_equal_reflush_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    let list = ListStore::new("formulas", 'F', tmp.path());
    list.update(&[field('F', 1, "a(n) = n"), field('F', 2, "a(n) = 2n")]);
    list.flush(false).unwrap();
    let before = fs::read(list.path()).unwrap();

    list.update(&[field('F', 1, "a(n) = n")]);
    list.flush(false).unwrap();
    assert_eq!(fs::read(list.path()).unwrap(), before);
}

#[test]
fn test_missing_id_scan_matches_spec_example() {
    let tmp = TempDir::new().unwrap();
    let list = ListStore::new("offsets", 'O', tmp.path());
    for seq_id in [1u32, 2, 5, 7] {
        list.update(&[field('O', seq_id, "0,1")]);
    }
    list.flush(true).unwrap();

    let (missing, total) = list.find_missing_ids(7, 5).unwrap();
    assert_eq!(missing, vec![3, 4, 6]);
    assert_eq!(total, 3);

    // The slice is bounded by the cap but the count stays exact.
    let (missing, total) = list.find_missing_ids(7, 2).unwrap();
    assert_eq!(missing, vec![3, 4]);
    assert_eq!(total, 3);
}

#[test]
fn test_gzip_sibling_tracks_live_file() {
    let tmp = TempDir::new().unwrap();
    let list = ListStore::new("authors", 'A', tmp.path());
    list.update(&[field('A', 12, "Leonhard Euler")]);
    list.flush(false).unwrap();

    let gz = list.path().with_file_name("authors.gz");
    assert!(gz.exists());
    let mut decoder = flate2::read::GzDecoder::new(fs::File::open(&gz).unwrap());
    let mut text = String::new();
    std::io::Read::read_to_string(&mut decoder, &mut text).unwrap();
    assert_eq!(text, fs::read_to_string(list.path()).unwrap());
}

#[test]
fn test_list_set_dispatch_and_flush_all() {
    let tmp = TempDir::new().unwrap();
    let set = ListSet::open(tmp.path());
    set.update(&[
        field('A', 1, "N. J. A. Sloane"),
        field('K', 1, "nonn,core"),
        field('O', 1, "1,2"),
        field('o', 1, "(PARI) a(n)=n"),
        field('Z', 1, "unregistered key is dropped"),
    ]);
    set.flush_all().unwrap();

    let catalog = catalog_dir(tmp.path());
    assert_eq!(
        fs::read_to_string(catalog.join("authors")).unwrap(),
        "A000001: N. J. A. Sloane\n"
    );
    assert_eq!(
        fs::read_to_string(catalog.join("keywords")).unwrap(),
        "A000001: nonn,core\n"
    );
    assert_eq!(
        fs::read_to_string(catalog.join("programs")).unwrap(),
        "A000001: (PARI) a(n)=n\n"
    );
    // Nothing registered 'Z'; comments and formulas stay absent.
    assert!(!catalog.join("comments").exists());
}

#[test]
fn test_offsets_deduplicate_on_flush_all() {
    let tmp = TempDir::new().unwrap();
    let set = ListSet::open(tmp.path());
    set.update(&[field('O', 1, "0,1")]);
    set.flush_all().unwrap();
    set.update(&[field('O', 1, "0,2")]);
    set.flush_all().unwrap();

    let catalog = catalog_dir(tmp.path());
    // Offsets keep only the newest entry per id.
    assert_eq!(
        fs::read_to_string(catalog.join("offsets")).unwrap(),
        "A000001: 0,2\n"
    );
}

#[test]
fn test_comments_accumulate_without_dedup() {
    let tmp = TempDir::new().unwrap();
    let set = ListSet::open(tmp.path());
    set.update(&[field('C', 1, "first note")]);
    set.flush_all().unwrap();
    set.update(&[field('C', 1, "second note")]);
    set.flush_all().unwrap();

    let catalog = catalog_dir(tmp.path());
    assert_eq!(
        fs::read_to_string(catalog.join("comments")).unwrap(),
        "A000001: second note\n  first note\n"
    );
}
