//! HuggingFace model-package ingester (feature `model-ingest`): reads a
//! tokenizer vocabulary and a static embedding tensor from a `safetensors`
//! checkpoint and relates each token to its nearest neighbors in embedding
//! space as Category relations.
//!
//! This reads weights that already exist on disk; it never runs a forward
//! pass, so it stays on the right side of the "no online model inference"
//! boundary while still getting distributional structure out of a
//! pretrained embedding table.

use crate::cache::IngestionCache;
use crate::error::{Result, SubstrateError};
use crate::ingest::common::{self, content_id_for_source, IngestStats, RelationCandidate, SourceKind};
use crate::storage::AsyncFlusher;
use crate::unicode::AtomLookup;
use safetensors::SafeTensors;
use std::path::Path;
use tokenizers::Tokenizer;

/// Per-token category relations are capped at this many nearest neighbors,
/// keeping the O(vocab^2) brute-force search tractable for mid-size vocabs.
const NEIGHBORS_PER_TOKEN: usize = 5;

struct TokenEmbeddings {
    tokens: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

fn load_embeddings(
    tokenizer_path: &Path,
    weights_path: &Path,
    tensor_name: &str,
) -> Result<TokenEmbeddings> {
    let tokenizer = Tokenizer::from_file(tokenizer_path)
        .map_err(|e| SubstrateError::ModelPackage(format!("tokenizer load failed: {e}")))?;

    let data = std::fs::read(weights_path)?;
    let tensors = SafeTensors::deserialize(&data)
        .map_err(|e| SubstrateError::ModelPackage(format!("safetensors load failed: {e}")))?;
    let tensor = tensors
        .tensor(tensor_name)
        .map_err(|e| SubstrateError::ModelPackage(format!("tensor '{tensor_name}' missing: {e}")))?;

    let shape = tensor.shape();
    if shape.len() != 2 {
        return Err(SubstrateError::ModelPackage(format!(
            "expected a 2D embedding tensor, got shape {shape:?}"
        )));
    }
    let (vocab_size, dim) = (shape[0], shape[1]);

    let raw: &[u8] = tensor.data();
    let floats: Vec<f32> = raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    if floats.len() != vocab_size * dim {
        return Err(SubstrateError::ModelPackage(
            "embedding tensor byte length does not match its declared shape".into(),
        ));
    }

    let vocab = tokenizer.get_vocab(false);
    let mut tokens = vec![String::new(); vocab_size];
    for (token, id) in vocab {
        if (id as usize) < vocab_size {
            tokens[id as usize] = token;
        }
    }

    let vectors = floats.chunks(dim).map(|c| c.to_vec()).collect();
    Ok(TokenEmbeddings { tokens, vectors })
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < 1e-9 || norm_b < 1e-9 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn nearest_neighbor_candidates(embeddings: &TokenEmbeddings) -> Vec<RelationCandidate> {
    let mut candidates = Vec::new();
    for (i, vector) in embeddings.vectors.iter().enumerate() {
        if embeddings.tokens[i].is_empty() {
            continue;
        }
        let mut scored: Vec<(usize, f32)> = embeddings
            .vectors
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i && !embeddings.tokens[*j].is_empty())
            .map(|(j, other)| (j, cosine_similarity(vector, other)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (j, _) in scored.into_iter().take(NEIGHBORS_PER_TOKEN) {
            candidates.push(RelationCandidate {
                left_text: embeddings.tokens[i].clone(),
                right_text: embeddings.tokens[j].clone(),
                kind: SourceKind::Category,
            });
        }
    }
    candidates
}

pub async fn ingest_model(
    source_name: &str,
    tokenizer_path: &Path,
    weights_path: &Path,
    tensor_name: &str,
    lookup: &dyn AtomLookup,
    flusher: &AsyncFlusher,
) -> Result<IngestStats> {
    let content_id = content_id_for_source(source_name);
    let mut cache = IngestionCache::new();

    let embeddings = load_embeddings(tokenizer_path, weights_path, tensor_name)?;
    let texts: Vec<String> = embeddings
        .tokens
        .iter()
        .filter(|t| !t.is_empty())
        .cloned()
        .collect();
    let candidates = nearest_neighbor_candidates(&embeddings);

    common::ingest_chunks(vec![(texts, candidates)], content_id, lookup, &mut cache, flusher).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn nearest_neighbors_skip_blank_tokens() {
        let embeddings = TokenEmbeddings {
            tokens: vec!["".to_string(), "cat".to_string(), "dog".to_string()],
            vectors: vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.9, 0.1]],
        };
        let candidates = nearest_neighbor_candidates(&embeddings);
        assert!(candidates.iter().all(|c| !c.left_text.is_empty() && !c.right_text.is_empty()));
    }
}
