//! In-memory metadata sink.

use crate::host::{MetadataId, MetadataSink};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// A tag value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    Number(f64),
}

impl TagValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            TagValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            TagValue::Number(n) => Some(*n),
            TagValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsongEntry {
    pub index: usize,
    pub name: String,
    /// Length in seconds.
    pub length: f32,
}

/// Everything recorded for one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataEntry {
    pub url: String,
    pub tags: BTreeMap<String, TagValue>,
    pub subsongs: Vec<SubsongEntry>,
    pub samples: Vec<String>,
    pub instruments: Vec<String>,
}

impl MetadataEntry {
    pub fn text(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).and_then(TagValue::as_text)
    }

    pub fn number(&self, tag: &str) -> Option<f64> {
        self.tags.get(tag).and_then(TagValue::as_number)
    }
}

/// Metadata sink that keeps entries in memory, one per resource.
///
/// Creating an entry for a url that already has one replaces it.
#[derive(Default)]
pub struct MetadataStore {
    next_id: AtomicU64,
    inner: RwLock<Entries>,
}

/// Both maps change under one lock so a url always resolves to a live entry.
#[derive(Default)]
struct Entries {
    by_id: HashMap<MetadataId, MetadataEntry>,
    by_url: HashMap<String, MetadataId>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry recorded for a resource.
    pub fn get(&self, url: &str) -> Option<MetadataEntry> {
        let inner = self.inner.read();
        let id = inner.by_url.get(url)?;
        inner.by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    fn update(&self, id: MetadataId, f: impl FnOnce(&mut MetadataEntry)) {
        match self.inner.write().by_id.get_mut(&id) {
            Some(entry) => f(entry),
            None => tracing::debug!(id, "Metadata update for unknown entry ignored"),
        }
    }
}

impl MetadataSink for MetadataStore {
    fn create_url(&self, url: &str) -> Option<MetadataId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut inner = self.inner.write();
        if let Some(old) = inner.by_url.insert(url.to_string(), id) {
            inner.by_id.remove(&old);
        }
        inner.by_id.insert(
            id,
            MetadataEntry {
                url: url.to_string(),
                ..Default::default()
            },
        );
        Some(id)
    }

    fn set_tag(&self, id: MetadataId, tag: &str, value: &str) {
        self.update(id, |e| {
            e.tags
                .insert(tag.to_string(), TagValue::Text(value.to_string()));
        });
    }

    fn set_tag_f64(&self, id: MetadataId, tag: &str, value: f64) {
        self.update(id, |e| {
            e.tags.insert(tag.to_string(), TagValue::Number(value));
        });
    }

    fn add_subsong(&self, id: MetadataId, index: usize, name: &str, length: f32) {
        self.update(id, |e| {
            e.subsongs.push(SubsongEntry {
                index,
                name: name.to_string(),
                length,
            })
        });
    }

    fn add_sample(&self, id: MetadataId, text: &str) {
        self.update(id, |e| e.samples.push(text.to_string()));
    }

    fn add_instrument(&self, id: MetadataId, text: &str) {
        self.update(id, |e| e.instruments.push(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_entry() {
        let store = MetadataStore::new();
        let id = store.create_url("tune.mod").unwrap();

        store.set_tag(id, "title", "Tune");
        store.set_tag_f64(id, "length", 12.5);
        store.add_subsong(id, 1, "Tune - Intro (1/2)", 3.0);
        store.add_sample(id, "kick");
        store.add_instrument(id, "piano");

        let entry = store.get("tune.mod").unwrap();
        assert_eq!(entry.text("title"), Some("Tune"));
        assert_eq!(entry.number("length"), Some(12.5));
        assert_eq!(entry.subsongs.len(), 1);
        assert_eq!(entry.samples, vec!["kick"]);
        assert_eq!(entry.instruments, vec!["piano"]);
    }

    #[test]
    fn test_recreate_replaces_entry() {
        let store = MetadataStore::new();
        let first = store.create_url("tune.mod").unwrap();
        store.set_tag(first, "title", "Old");

        let second = store.create_url("tune.mod").unwrap();
        assert_ne!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("tune.mod").unwrap().text("title"), None);

        // Writes through a stale id are dropped
        store.set_tag(first, "title", "Stale");
        assert_eq!(store.get("tune.mod").unwrap().text("title"), None);
    }

    #[test]
    fn test_concurrent_create_keeps_one_entry_per_url() {
        let store = MetadataStore::new();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let id = store.create_url("tune.mod").unwrap();
                        store.set_tag(id, "title", "Tune");
                        assert!(store.get("tune.mod").is_some());
                    }
                });
            }
        });

        assert_eq!(store.len(), 1);
        let entry = store.get("tune.mod").unwrap();
        assert_eq!(entry.url, "tune.mod");
    }
}
