//! Universal Dependencies (CoNLL-U) ingester: relates each token to its
//! syntactic head via dependency-head-dependent relations.

use crate::cache::IngestionCache;
use crate::error::Result;
use crate::ingest::common::{self, content_id_for_source, IngestStats, RelationCandidate, SourceKind};
use crate::storage::AsyncFlusher;
use crate::unicode::AtomLookup;

struct ConlluToken {
    id: u32,
    form: String,
    head: u32,
}

/// Parses one CoNLL-U document, grouping tokens into sentences on blank
/// lines and skipping comment lines (`#`) and multiword-token ranges
/// (ids containing `-` or `.`).
fn parse_sentences(text: &str) -> Vec<Vec<ConlluToken>> {
    let mut sentences = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !current.is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 8 {
            continue;
        }
        if fields[0].contains('-') || fields[0].contains('.') {
            continue;
        }
        let (Ok(id), Ok(head)) = (fields[0].parse::<u32>(), fields[6].parse::<u32>()) else {
            continue;
        };
        current.push(ConlluToken {
            id,
            form: fields[1].to_string(),
            head,
        });
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

pub async fn ingest_ud(
    source_name: &str,
    conllu_text: &str,
    lookup: &dyn AtomLookup,
    flusher: &AsyncFlusher,
) -> Result<IngestStats> {
    let content_id = content_id_for_source(source_name);
    let mut cache = IngestionCache::new();
    let sentences = parse_sentences(conllu_text);

    let chunks: Vec<_> = sentences
        .into_iter()
        .map(|tokens| {
            let by_id: std::collections::HashMap<u32, &str> =
                tokens.iter().map(|t| (t.id, t.form.as_str())).collect();

            let texts: Vec<String> = tokens.iter().map(|t| t.form.clone()).collect();
            let mut candidates = Vec::new();
            for token in &tokens {
                if token.head == 0 {
                    continue; // root has no head to relate to
                }
                if let Some(&head_form) = by_id.get(&token.head) {
                    candidates.push(RelationCandidate {
                        left_text: head_form.to_string(),
                        right_text: token.form.clone(),
                        kind: SourceKind::DependencyHeadDependent,
                    });
                }
            }
            (texts, candidates)
        })
        .collect();

    common::ingest_chunks(chunks, content_id, lookup, &mut cache, flusher).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_sentence() {
        let doc = "# sent_id = 1\n1\tThe\tthe\tDET\t_\t_\t2\tdet\t_\t_\n2\tcat\tcat\tNOUN\t_\t_\t0\troot\t_\t_\n\n";
        let sentences = parse_sentences(doc);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].len(), 2);
        assert_eq!(sentences[0][0].head, 2);
        assert_eq!(sentences[0][1].head, 0);
    }

    #[test]
    fn skips_multiword_token_ranges() {
        let doc = "1-2\tdon't\t_\t_\t_\t_\t_\t_\t_\t_\n1\tdo\tdo\tAUX\t_\t_\t0\troot\t_\t_\n2\tn't\tnot\tPART\t_\t_\t1\tadvmod\t_\t_\n\n";
        let sentences = parse_sentences(doc);
        assert_eq!(sentences[0].len(), 2);
    }
}
