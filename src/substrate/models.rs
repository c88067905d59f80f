//! Row-shaped data model structs mirroring the datastore schema.

use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

/// An ordered multiset of Atoms that together form one addressable unit of
/// meaning (a word, token or higher-order grouping).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composition {
    pub comp_id: u128,
    pub phys_id: u128,
}

/// One (composition, member, ordinal) triple recording a Composition's
/// member order; repeated members are merged into a single row with an
/// `occurrences` count rather than one row per repeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionSequence {
    pub seq_id: u128,
    pub comp_id: u128,
    pub atom_id: u128,
    pub ordinal: u32,
    pub occurrences: u32,
}

/// The geometric realization shared by Compositions and Relations: a
/// centroid on S³ plus a decimated trajectory of the positions averaged to
/// produce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Physicality {
    pub phys_id: u128,
    pub hilbert_index: u128,
    #[serde(with = "vector4_serde")]
    pub centroid: Vector4<f64>,
    #[serde(with = "vector4_vec_serde")]
    pub trajectory: Vec<Vector4<f64>>,
}

/// A directed edge between two Compositions, identified independent of
/// which side is "source" by canonicalizing on id order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub rel_id: u128,
    pub phys_id: u128,
}

/// One (relation, composition, role) row: role 0 is the canonically-first
/// composition id, role 1 the second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationSequence {
    pub seq_id: u128,
    pub rel_id: u128,
    pub comp_id: u128,
    pub role: u32,
}

/// ELO-style confidence rating for a Relation, updated as more evidence for
/// or against it is observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRating {
    pub rel_id: u128,
    pub observations: u32,
    pub elo: f64,
    pub k_factor: f64,
}

/// One observation of a Relation in a specific source document, upserted
/// (content_id, rel_id) so re-ingesting the same source is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationEvidence {
    pub evidence_id: u128,
    pub content_id: u128,
    pub rel_id: u128,
    pub positive: bool,
    pub base_rating: f64,
    pub weight: f64,
}

mod vector4_serde {
    use nalgebra::Vector4;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Vector4<f64>, s: S) -> Result<S::Ok, S::Error> {
        [v[0], v[1], v[2], v[3]].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vector4<f64>, D::Error> {
        let arr: [f64; 4] = Deserialize::deserialize(d)?;
        Ok(Vector4::new(arr[0], arr[1], arr[2], arr[3]))
    }
}

mod vector4_vec_serde {
    use nalgebra::Vector4;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[Vector4<f64>], s: S) -> Result<S::Ok, S::Error> {
        let raw: Vec<[f64; 4]> = v.iter().map(|p| [p[0], p[1], p[2], p[3]]).collect();
        serde::Serialize::serialize(&raw, s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vector4<f64>>, D::Error> {
        let raw: Vec<[f64; 4]> = serde::Deserialize::deserialize(d)?;
        Ok(raw
            .into_iter()
            .map(|a| Vector4::new(a[0], a[1], a[2], a[3]))
            .collect())
    }
}
