//! Ingestion Cache: process-local dedup state for a single ingester
//! run. Each ingester owns one of these exclusively, so no locking is
//! needed — the dedup sets exist purely to avoid re-sending identical
//! physicality/composition/relation rows to the flusher within one run; the
//! datastore's `ON CONFLICT DO NOTHING` upserts are the actual source of
//! cross-run idempotency.

use crate::substrate::CachedComposition;
use std::collections::{HashMap, HashSet};

/// Per-run dedup state plus a text -> composition cache so re-encountering
/// the same surface form later in the same document reuses its computed
/// geometry instead of recomputing it.
#[derive(Default)]
pub struct IngestionCache {
    seen_physicalities: HashSet<u128>,
    seen_compositions: HashSet<u128>,
    seen_relations: HashSet<u128>,
    text_to_composition: HashMap<String, CachedComposition>,
}

impl IngestionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a given physicality id is seen this
    /// run; `false` on every subsequent call with the same id.
    pub fn mark_physicality(&mut self, phys_id: u128) -> bool {
        self.seen_physicalities.insert(phys_id)
    }

    pub fn mark_composition(&mut self, comp_id: u128) -> bool {
        self.seen_compositions.insert(comp_id)
    }

    pub fn mark_relation(&mut self, rel_id: u128) -> bool {
        self.seen_relations.insert(rel_id)
    }

    pub fn cache_composition(&mut self, text: &str, entry: CachedComposition) {
        self.text_to_composition.insert(text.to_string(), entry);
    }

    pub fn lookup_composition(&self, text: &str) -> Option<CachedComposition> {
        self.text_to_composition.get(text).copied()
    }

    pub fn composition_count(&self) -> usize {
        self.seen_compositions.len()
    }

    pub fn relation_count(&self) -> usize {
        self.seen_relations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;

    #[test]
    fn marking_a_new_id_reports_first_sighting() {
        let mut cache = IngestionCache::new();
        assert!(cache.mark_composition(42));
        assert!(!cache.mark_composition(42));
    }

    #[test]
    fn cached_composition_round_trips_by_text() {
        let mut cache = IngestionCache::new();
        let entry = CachedComposition {
            comp_id: 1,
            phys_id: 2,
            centroid: Vector4::new(1.0, 0.0, 0.0, 0.0),
        };
        cache.cache_composition("hello", entry);
        let found = cache.lookup_composition("hello").unwrap();
        assert_eq!(found.comp_id, 1);
        assert!(cache.lookup_composition("missing").is_none());
    }
}
