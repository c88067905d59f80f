//! Error taxonomy for the substrate core.
//!
//! Parse errors are recoverable per-record (the caller counts and continues
//! the stream). Datastore errors distinguish transient (retryable) from hard
//! failures so the flusher's retry loop can tell them apart without string
//! matching against driver messages.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SubstrateError>;

#[derive(Error, Debug)]
pub enum SubstrateError {
    #[error("datastore error: {0}")]
    Database(String),

    #[error("datastore connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("transient datastore error (retryable): {0}")]
    Transient(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("codepoint {0:#x} not present in the seeded atom table")]
    AtomLookupMiss(u32),

    #[error("invalid composition: {0}")]
    InvalidComposition(String),

    #[error("invalid relation: {0}")]
    InvalidRelation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unicode character database error: {0}")]
    Ucd(String),

    #[error("model package error: {0}")]
    ModelPackage(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl SubstrateError {
    /// Whether this error should drive the flusher's retry loop rather than
    /// dropping the batch outright.
    pub fn is_transient(&self) -> bool {
        matches!(self, SubstrateError::Transient(_))
    }
}

impl From<tokio_postgres::Error> for SubstrateError {
    fn from(e: tokio_postgres::Error) -> Self {
        // SQLSTATE class 40 is "transaction rollback" (deadlock_detected,
        // serialization_failure, ...) - the only class worth retrying.
        let transient = e
            .code()
            .map(|c| c.code().starts_with("40"))
            .unwrap_or(false);
        if transient {
            SubstrateError::Transient(e.to_string())
        } else {
            SubstrateError::Database(e.to_string())
        }
    }
}
