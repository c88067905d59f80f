//! Ingesters: turn raw corpora into `SubstrateBatch`es via chunked,
//! rayon-parallel compute, handed off to the [`crate::storage::AsyncFlusher`].
//!
//! Each format gets its own thin parser; all of them funnel into
//! [`common::ingest_chunk`], which is where [`crate::substrate::SubstrateService`]
//! and relation-source base ratings actually live.

mod common;
#[cfg(feature = "model-ingest")]
pub mod model;
pub mod ngram;
pub mod tatoeba;
pub mod text;
pub mod ud;
pub mod wiktionary;

pub use common::{IngestStats, RelationCandidate, SourceKind};
