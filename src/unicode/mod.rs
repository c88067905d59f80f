//! Unicode Character Database ingestion and the preloaded Atom lookup
//! cache it seeds.

mod atom_store;
mod ucd;

pub use atom_store::{AtomLookup, AtomStore};
pub use ucd::{CodepointRecord, UcdLoader};
