//! The substrate data model and the stateless compute service
//! that turns raw text into content-addressed entities positioned on S³.

mod models;
mod service;

pub use models::{
    Composition, CompositionSequence, Physicality, Relation, RelationEvidence, RelationRating,
    RelationSequence,
};
pub use service::{CachedComposition, ComputedComposition, ComputedRelation, SubstrateService};
