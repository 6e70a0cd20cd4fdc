//! Read-side search over an opened archive: scanning its string table and
//! finding the ids whose text satisfies a predicate.

use crate::cache::{LruCacheOptions, LruStringCache};
use crate::error::Result;
use crate::ids::StringId;
use crate::reader::Archive;

/// An iterator over every `(id, text)` pair in an archive's string table,
/// in ascending id order — the Rust counterpart of a disk-backed scan over
/// the reference implementation's fixed-size id/offset/length table.
pub struct StridIter<'a> {
    entries: std::vec::IntoIter<(StringId, &'a str)>,
}

impl<'a> StridIter<'a> {
    #[must_use]
    pub fn new(archive: &'a Archive) -> Self {
        StridIter { entries: archive.string_table().into_iter() }
    }
}

impl<'a> Iterator for StridIter<'a> {
    type Item = (StringId, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }
}

/// A query session against one opened archive, with its own LRU string
/// cache so repeated `fetch` calls for the same id are cheap.
pub struct Query<'a> {
    archive: &'a Archive,
    cache: LruStringCache,
}

impl<'a> Query<'a> {
    #[must_use]
    pub fn new(archive: &'a Archive) -> Self {
        Self::with_cache_options(archive, LruCacheOptions::default())
    }

    /// Open a query session with an explicit cache sizing policy.
    #[must_use]
    pub fn with_cache_options(archive: &'a Archive, options: LruCacheOptions) -> Self {
        let capacity = options.resolve(archive.string_table().len());
        Query { archive, cache: LruStringCache::new(capacity) }
    }

    /// Iterate every string id in the archive.
    #[must_use]
    pub fn scan_strids(&self) -> StridIter<'a> {
        StridIter::new(self.archive)
    }

    /// Resolve one string id to its text, going through the query's cache.
    pub fn fetch_string_by_id(&mut self, id: StringId) -> Option<&str> {
        if self.cache.get(id).is_none() {
            let text = self.archive.resolve(id)?;
            self.cache.insert(id, text.to_string());
        }
        self.cache.get(id)
    }

    /// All string ids whose text satisfies `predicate`, in ascending id
    /// order, capped at `limit` matches (`None` for unbounded).
    pub fn find_ids(
        &self,
        mut predicate: impl FnMut(&str) -> Result<bool>,
        limit: Option<usize>,
    ) -> Result<Vec<StringId>> {
        let mut found = Vec::new();
        for (id, text) in self.archive.string_table() {
            if predicate(text)? {
                found.push(id);
                if limit.is_some_and(|n| found.len() >= n) {
                    break;
                }
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Value};
    use crate::reader::{self, Archive};
    use crate::writer;

    fn sample_archive() -> Vec<u8> {
        let mut doc = Document::new();
        doc.insert("name", Value::String("alice".into()));
        doc.insert("email", Value::String("alice@example.com".into()));
        writer::write(&doc).unwrap()
    }

    #[test]
    fn scan_strids_covers_every_entry() {
        let bytes = sample_archive();
        let archive = reader::open_bytes(&bytes).unwrap();
        let query = Query::new(&archive);
        let all: Vec<_> = query.scan_strids().collect();
        assert!(all.iter().any(|(_, s)| *s == "alice"));
        assert!(all.iter().any(|(_, s)| *s == "name"));
    }

    #[test]
    fn find_ids_matches_predicate() {
        let bytes = sample_archive();
        let archive = reader::open_bytes(&bytes).unwrap();
        let query = Query::new(&archive);
        let matches = query.find_ids(|s| Ok(s.contains('@')), None).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn fetch_caches_repeated_lookups() {
        let bytes = sample_archive();
        let archive = reader::open_bytes(&bytes).unwrap();
        let mut query = Query::new(&archive);
        let id = query.scan_strids().find(|(_, s)| *s == "alice").unwrap().0;
        assert_eq!(query.fetch_string_by_id(id), Some("alice"));
        assert_eq!(query.cache.statistics().num_misses, 1);
        assert_eq!(query.fetch_string_by_id(id), Some("alice"));
        assert_eq!(query.cache.statistics().num_hits, 1);
    }

    #[test]
    fn query_works_against_a_file_backed_archive() {
        let doc = {
            let mut doc = Document::new();
            doc.insert("name", Value::String("bob".into()));
            doc
        };
        let path = std::env::temp_dir().join(format!("carbon-query-test-{:?}", std::thread::current().id()));
        writer::write_to_path(&path, &doc).unwrap();
        let archive = Archive::open(&path).unwrap();
        let query = Query::new(&archive);
        let matches = query.find_ids(|s| Ok(s == "bob"), None).unwrap();
        assert_eq!(matches.len(), 1);
        std::fs::remove_file(&path).ok();
    }
}
