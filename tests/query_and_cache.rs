//! Scenarios for the read-side query/cache layer against a written archive.

use carbon::reader::open_bytes;
use carbon::{Document, LruCacheOptions, Query, Value, write};

fn sample_bytes() -> Vec<u8> {
    let mut doc = Document::new();
    doc.insert("first", Value::String("grace".into()));
    doc.insert("last", Value::String("hopper".into()));
    doc.insert("handle", Value::String("amazing.grace@navy.mil".into()));
    write(&doc).unwrap()
}

#[test]
fn scan_strids_visits_every_table_entry_once() {
    let bytes = sample_bytes();
    let archive = open_bytes(&bytes).unwrap();
    let query = Query::new(&archive);
    let scanned: Vec<_> = query.scan_strids().collect();
    assert_eq!(scanned.len(), archive.string_table().len());
}

#[test]
fn find_ids_locates_matching_strings() {
    let bytes = sample_bytes();
    let archive = open_bytes(&bytes).unwrap();
    let query = Query::new(&archive);
    let emails = query.find_ids(|s| Ok(s.contains('@')), None).unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(archive.resolve(emails[0]), Some("amazing.grace@navy.mil"));
}

#[test]
fn find_ids_honors_limit() {
    let bytes = sample_bytes();
    let archive = open_bytes(&bytes).unwrap();
    let query = Query::new(&archive);
    let any = query.find_ids(|_| Ok(true), Some(1)).unwrap();
    assert_eq!(any.len(), 1);
}

#[test]
fn fetch_string_by_id_uses_a_bucketed_lru_cache() {
    let bytes = sample_bytes();
    let archive = open_bytes(&bytes).unwrap();
    let mut query = Query::with_cache_options(&archive, LruCacheOptions { capacity: Some(1) });

    let ids: Vec<_> = query.scan_strids().map(|(id, _)| id).collect();
    for &id in &ids {
        query.fetch_string_by_id(id);
    }
    assert!(ids.len() > 1, "fixture should have more than one string");
}
