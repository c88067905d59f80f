//! Shared chunk-processing core used by every ingester: compute
//! compositions and relations for one chunk in parallel, merge into a
//! batch, hand off to the flusher.

use crate::cache::IngestionCache;
use crate::hash::content_hash;
use crate::hash::EntityTag;
use crate::storage::{AsyncFlusher, SubstrateBatch};
use crate::substrate::{CachedComposition, SubstrateService};
use crate::unicode::AtomLookup;
use rayon::prelude::*;

/// Which ingester produced a relation, driving its base ELO rating: higher
/// base ratings reflect stronger a-priori confidence in the relation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    DependencyHeadDependent,
    WordAdjacency,
    ParallelTranslation,
    Synonym,
    Antonym,
    Hypernym,
    Gloss,
    Category,
}

impl SourceKind {
    pub fn base_rating(self) -> f64 {
        match self {
            SourceKind::DependencyHeadDependent => 1800.0,
            SourceKind::WordAdjacency => 1500.0,
            SourceKind::ParallelTranslation => 1600.0,
            SourceKind::Synonym => 1950.0,
            SourceKind::Antonym => 1850.0,
            SourceKind::Hypernym => 1900.0,
            SourceKind::Gloss => 1800.0,
            SourceKind::Category => 1200.0,
        }
    }
}

/// A candidate relation between two surface strings, waiting to be turned
/// into composition ids once both sides have been computed.
#[derive(Debug, Clone)]
pub struct RelationCandidate {
    pub left_text: String,
    pub right_text: String,
    pub kind: SourceKind,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub compositions: usize,
    pub relations: usize,
    pub skipped_empty: usize,
}

/// Computes every composition in `texts` (in parallel via rayon) and every
/// relation in `candidates`, deduplicates against `cache`, and returns a
/// batch ready to hand to the flusher.
pub fn ingest_chunk(
    texts: &[String],
    candidates: &[RelationCandidate],
    content_id: u128,
    lookup: &dyn AtomLookup,
    cache: &mut IngestionCache,
) -> (SubstrateBatch, IngestStats) {
    let mut stats = IngestStats::default();
    let mut batch = SubstrateBatch::default();

    let computed: Vec<_> = texts
        .par_iter()
        .map(|text| SubstrateService::compute_composition(text, lookup))
        .collect();

    let mut by_text: std::collections::HashMap<&str, CachedComposition> =
        std::collections::HashMap::new();

    for (text, result) in texts.iter().zip(computed.into_iter()) {
        match result {
            Some(computed) => {
                by_text.insert(text.as_str(), computed.cache_entry);
                cache.cache_composition(text, computed.cache_entry);
                if cache.mark_composition(computed.composition.comp_id) {
                    batch.physicalities.push(computed.physicality);
                    batch.compositions.push(computed.composition);
                    batch.composition_sequences.extend(computed.sequence);
                    stats.compositions += 1;
                }
            }
            None => stats.skipped_empty += 1,
        }
    }

    let relation_results: Vec<_> = candidates
        .par_iter()
        .filter_map(|candidate| {
            let left = by_text
                .get(candidate.left_text.as_str())
                .copied()
                .or_else(|| cache.lookup_composition(&candidate.left_text))?;
            let right = by_text
                .get(candidate.right_text.as_str())
                .copied()
                .or_else(|| cache.lookup_composition(&candidate.right_text))?;
            SubstrateService::compute_relation(&left, &right, content_id, candidate.kind.base_rating())
        })
        .collect();

    for relation in relation_results {
        let is_new = cache.mark_relation(relation.relation.rel_id);
        if is_new {
            batch.physicalities.push(relation.physicality.clone());
            batch.relations.push(relation.relation);
            batch.relation_sequences.extend(relation.sequence);
            stats.relations += 1;
        }
        // The evidence row upserts on (content_id, rel_id), and the rating
        // row upserts by incrementing observations - both are safe to
        // re-emit even when the relation itself was already seen this run,
        // since different chunks may observe the same relation again.
        batch.ratings.push(relation.rating);
        batch.evidence.push(relation.evidence);
    }

    (batch, stats)
}

/// Derives a stable content id for a source document, used to key evidence
/// rows so re-ingesting the same document is idempotent.
pub fn content_id_for_source(source_name: &str) -> u128 {
    content_hash(EntityTag::Physicality, source_name.as_bytes())
}

/// Runs `ingest_chunk` over every chunk and enqueues the resulting batches
/// on the flusher, returning aggregate stats.
pub async fn ingest_chunks(
    chunks: Vec<(Vec<String>, Vec<RelationCandidate>)>,
    content_id: u128,
    lookup: &dyn AtomLookup,
    cache: &mut IngestionCache,
    flusher: &AsyncFlusher,
) -> crate::error::Result<IngestStats> {
    let mut total = IngestStats::default();
    for (texts, candidates) in chunks {
        let (batch, stats) = ingest_chunk(&texts, &candidates, content_id, lookup, cache);
        total.compositions += stats.compositions;
        total.relations += stats.relations;
        total.skipped_empty += stats.skipped_empty;
        if !batch.is_empty() {
            flusher.enqueue(batch).await?;
        }
    }
    Ok(total)
}
