//! Tatoeba ingester: parses tab-separated sentence-pair exports and
//! relates each pair as a parallel translation.

use crate::cache::IngestionCache;
use crate::error::{Result, SubstrateError};
use crate::ingest::common::{self, content_id_for_source, IngestStats, RelationCandidate, SourceKind};
use crate::storage::AsyncFlusher;
use crate::unicode::AtomLookup;

/// One row of a Tatoeba `Sentence pairs` export: `id\ttext\tid\ttranslation`.
struct SentencePair {
    source: String,
    translation: String,
}

fn parse_pairs(tsv: &str) -> Result<Vec<SentencePair>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(tsv.as_bytes());

    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SubstrateError::Parse(e.to_string()))?;
        if record.len() < 4 {
            continue;
        }
        pairs.push(SentencePair {
            source: record[1].to_string(),
            translation: record[3].to_string(),
        });
    }
    Ok(pairs)
}

pub async fn ingest_tatoeba(
    source_name: &str,
    tsv: &str,
    lookup: &dyn AtomLookup,
    flusher: &AsyncFlusher,
) -> Result<IngestStats> {
    let content_id = content_id_for_source(source_name);
    let mut cache = IngestionCache::new();
    let pairs = parse_pairs(tsv)?;

    let chunks: Vec<_> = pairs
        .into_iter()
        .map(|pair| {
            let texts = vec![pair.source.clone(), pair.translation.clone()];
            let candidates = vec![RelationCandidate {
                left_text: pair.source,
                right_text: pair.translation,
                kind: SourceKind::ParallelTranslation,
            }];
            (texts, candidates)
        })
        .collect();

    common::ingest_chunks(chunks, content_id, lookup, &mut cache, flusher).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tab_separated_pairs() {
        let tsv = "1\tHello.\t2\tBonjour.\n3\tGoodbye.\t4\tAu revoir.\n";
        let pairs = parse_pairs(tsv).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].source, "Hello.");
        assert_eq!(pairs[0].translation, "Bonjour.");
    }

    #[test]
    fn skips_malformed_rows() {
        let tsv = "1\tonly three\tfields\n";
        let pairs = parse_pairs(tsv).unwrap();
        assert!(pairs.is_empty());
    }
}
