//! Plain-text ingester: chunks raw text into sentences, relates adjacent
//! words by word-adjacency, and hands everything to the shared chunk
//! pipeline.

use crate::cache::IngestionCache;
use crate::error::Result;
use crate::ingest::common::{self, content_id_for_source, IngestStats, RelationCandidate, SourceKind};
use crate::storage::AsyncFlusher;
use crate::unicode::AtomLookup;

/// Ingester-chosen chunk size bounds: below ~10k tokens per chunk,
/// rayon parallelism barely pays for its own overhead; above ~100k, a
/// single chunk's batch risks starving the flusher's bounded queue.
pub const MIN_CHUNK_SIZE: usize = 10_000;
pub const MAX_CHUNK_SIZE: usize = 100_000;

pub async fn ingest_text(
    source_name: &str,
    text: &str,
    lookup: &dyn AtomLookup,
    flusher: &AsyncFlusher,
) -> Result<IngestStats> {
    let content_id = content_id_for_source(source_name);
    let mut cache = IngestionCache::new();

    let words: Vec<&str> = text.split_whitespace().collect();
    let chunk_size = MIN_CHUNK_SIZE.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);

    let mut chunks = Vec::new();
    for window in words.chunks(chunk_size.min(words.len().max(1))) {
        let texts: Vec<String> = window.iter().map(|s| s.to_string()).collect();
        let mut candidates = Vec::with_capacity(texts.len().saturating_sub(1));
        for pair in texts.windows(2) {
            candidates.push(RelationCandidate {
                left_text: pair[0].clone(),
                right_text: pair[1].clone(),
                kind: SourceKind::WordAdjacency,
            });
        }
        chunks.push((texts, candidates));
    }

    common::ingest_chunks(chunks, content_id, lookup, &mut cache, flusher).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_respects_bounds() {
        assert!(MIN_CHUNK_SIZE <= MAX_CHUNK_SIZE);
    }
}
