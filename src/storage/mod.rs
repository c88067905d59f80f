//! Persistence: the datastore contract and the async write-behind
//! flusher built on top of it.

pub mod datastore;
pub mod flusher;

pub use datastore::{Datastore, PostgresDatastore, RelationNeighbor, Transaction};
pub use flusher::{AsyncFlusher, SubstrateBatch};
