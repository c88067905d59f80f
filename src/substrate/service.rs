//! SubstrateService: the stateless hot-path that turns raw text and
//! composition pairs into content-addressed, S³-positioned entities.
//!
//! Composition identity hashes `0x43 || atom_ids`, the
//! centroid is the mean of member positions renormalized to S³ (falling
//! back to the identity point below the degeneracy threshold), physicality
//! identity hashes `0x50 || centroid || trajectory`, and relation identity
//! canonicalizes argument order by numeric id comparison so `(a, b)` and
//! `(b, a)` collide. All numeric fields in hashed payloads are little-endian.

use crate::geometry::identity_point;
use crate::hash::{content_hash, hash_composition, hash_evidence, hash_relation, EntityTag};
use crate::hilbert::{encode, EntityClass};
use crate::substrate::models::{
    CompositionSequence, Physicality, Relation, RelationEvidence, RelationRating,
    RelationSequence,
};
use crate::substrate::Composition;
use crate::unicode::AtomLookup;
use nalgebra::Vector4;

/// A trajectory longer than this is decimated to a fixed number of evenly
/// spaced samples before hashing and storage, bounding per-row geometry
/// cost independent of composition length.
const MAX_TRAJECTORY_POINTS: usize = 16;

/// The minimal state a caller needs to hold onto between ingesting a
/// Composition and later relating it to another one, without re-fetching
/// from the datastore.
#[derive(Debug, Clone, Copy)]
pub struct CachedComposition {
    pub comp_id: u128,
    pub phys_id: u128,
    pub centroid: Vector4<f64>,
}

/// Everything [`SubstrateService::compute_composition`] produces for one
/// piece of text.
#[derive(Debug, Clone)]
pub struct ComputedComposition {
    pub composition: Composition,
    pub sequence: Vec<CompositionSequence>,
    pub physicality: Physicality,
    pub cache_entry: CachedComposition,
}

/// Everything [`SubstrateService::compute_relation`] produces for one pair
/// of related compositions.
#[derive(Debug, Clone)]
pub struct ComputedRelation {
    pub relation: Relation,
    pub physicality: Physicality,
    pub sequence: Vec<RelationSequence>,
    pub rating: RelationRating,
    pub evidence: RelationEvidence,
}

pub struct SubstrateService;

impl SubstrateService {
    /// Compute a Composition's identity and geometry from its text, looking
    /// up each codepoint's Atom via `lookup`. Returns `None` for empty text
    /// or text with no codepoints present in the Atom table.
    pub fn compute_composition(
        text: &str,
        lookup: &dyn AtomLookup,
    ) -> Option<ComputedComposition> {
        if text.is_empty() {
            return None;
        }

        let mut atom_ids = Vec::with_capacity(text.chars().count());
        let mut positions = Vec::with_capacity(atom_ids.capacity());
        for ch in text.chars() {
            if let Ok(entry) = lookup.lookup(ch as u32) {
                atom_ids.push(entry.atom_id);
                positions.push(entry.centroid);
            }
        }
        if atom_ids.is_empty() {
            return None;
        }

        let comp_id = hash_composition(&atom_ids);

        let mut centroid = positions.iter().fold(Vector4::zeros(), |acc, p| acc + p);
        centroid /= positions.len() as f64;
        let centroid = if centroid.norm() > 1e-10 {
            centroid / centroid.norm()
        } else {
            identity_point()
        };

        let trajectory = decimate_trajectory(&positions);
        let phys_id = hash_physicality_geometry(&centroid, &trajectory);
        let hilbert_index = encode(&centroid, EntityClass::CompositionOrRelation);

        let physicality = Physicality {
            phys_id,
            hilbert_index,
            centroid,
            trajectory,
        };

        let sequence = build_composition_sequence(comp_id, &atom_ids);

        Some(ComputedComposition {
            composition: Composition { comp_id, phys_id },
            sequence,
            physicality,
            cache_entry: CachedComposition {
                comp_id,
                phys_id,
                centroid,
            },
        })
    }

    /// Compute a Relation's identity and geometry from two already-computed
    /// compositions. `content_id` identifies the source document this
    /// relation was observed in, for evidence upserts. Returns `None` when
    /// `a` and `b` are the same composition (no self-relations).
    pub fn compute_relation(
        a: &CachedComposition,
        b: &CachedComposition,
        content_id: u128,
        base_rating: f64,
    ) -> Option<ComputedRelation> {
        if a.comp_id == b.comp_id {
            return None;
        }

        let (first, second) = if a.comp_id < b.comp_id { (a, b) } else { (b, a) };
        let rel_id = hash_relation(first.comp_id, second.comp_id);

        let mut centroid = (a.centroid + b.centroid) * 0.5;
        centroid = if centroid.norm() > 1e-10 {
            centroid / centroid.norm()
        } else {
            identity_point()
        };

        let trajectory = vec![a.centroid, b.centroid];
        let phys_id = hash_physicality_geometry(&centroid, &trajectory);
        let hilbert_index = encode(&centroid, EntityClass::CompositionOrRelation);

        let physicality = Physicality {
            phys_id,
            hilbert_index,
            centroid,
            trajectory,
        };

        let sequence = vec![
            RelationSequence {
                seq_id: content_hash(
                    EntityTag::RelationSequence,
                    &relation_sequence_payload(rel_id, first.comp_id, 0),
                ),
                rel_id,
                comp_id: first.comp_id,
                role: 0,
            },
            RelationSequence {
                seq_id: content_hash(
                    EntityTag::RelationSequence,
                    &relation_sequence_payload(rel_id, second.comp_id, 1),
                ),
                rel_id,
                comp_id: second.comp_id,
                role: 1,
            },
        ];

        let evidence_id = hash_evidence(content_id, rel_id);

        Some(ComputedRelation {
            relation: Relation { rel_id, phys_id },
            physicality,
            sequence,
            rating: RelationRating {
                rel_id,
                observations: 1,
                elo: base_rating,
                k_factor: 32.0,
            },
            evidence: RelationEvidence {
                evidence_id,
                content_id,
                rel_id,
                positive: true,
                base_rating,
                weight: 1.0,
            },
        })
    }
}

fn hash_physicality_geometry(centroid: &Vector4<f64>, trajectory: &[Vector4<f64>]) -> u128 {
    let mut payload = Vec::with_capacity(32 + trajectory.len() * 32);
    for c in centroid.iter() {
        payload.extend_from_slice(&c.to_le_bytes());
    }
    for point in trajectory {
        for c in point.iter() {
            payload.extend_from_slice(&c.to_le_bytes());
        }
    }
    content_hash(EntityTag::Physicality, &payload)
}

fn relation_sequence_payload(rel_id: u128, comp_id: u128, role: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(36);
    payload.extend_from_slice(&rel_id.to_le_bytes());
    payload.extend_from_slice(&comp_id.to_le_bytes());
    payload.extend_from_slice(&role.to_le_bytes());
    payload
}

/// Builds the sequence rows for a composition, merging consecutive repeats
/// of the same atom into a single row with an `occurrences` count instead
/// of emitting one row per repeat.
fn build_composition_sequence(comp_id: u128, atom_ids: &[u128]) -> Vec<CompositionSequence> {
    let mut rows = Vec::new();
    let mut i = 0;
    while i < atom_ids.len() {
        let ordinal = i as u32;
        let mut occurrences = 1u32;
        while i + (occurrences as usize) < atom_ids.len()
            && atom_ids[i + occurrences as usize] == atom_ids[i]
        {
            occurrences += 1;
        }

        let mut payload = Vec::with_capacity(36);
        payload.extend_from_slice(&comp_id.to_le_bytes());
        payload.extend_from_slice(&atom_ids[i].to_le_bytes());
        payload.extend_from_slice(&ordinal.to_le_bytes());
        let seq_id = content_hash(EntityTag::CompositionSequence, &payload);

        rows.push(CompositionSequence {
            seq_id,
            comp_id,
            atom_id: atom_ids[i],
            ordinal,
            occurrences,
        });
        i += occurrences as usize;
    }
    rows
}

/// Decimates a trajectory to at most [`MAX_TRAJECTORY_POINTS`] evenly
/// spaced samples, keeping physicality row size (and its GIST/4D spatial
/// index cost) constant for arbitrarily long compositions.
fn decimate_trajectory(points: &[Vector4<f64>]) -> Vec<Vector4<f64>> {
    if points.len() <= MAX_TRAJECTORY_POINTS {
        return points.to_vec();
    }
    (0..MAX_TRAJECTORY_POINTS)
        .map(|i| {
            let idx = i * (points.len() - 1) / (MAX_TRAJECTORY_POINTS - 1);
            points[idx]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unicode::{AtomStore, CodepointRecord, UcdLoader};

    fn test_store() -> AtomStore {
        let records: Vec<CodepointRecord> = "hello world"
            .chars()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .map(|c| CodepointRecord {
                codepoint: c as u32,
                general_category: "Ll".into(),
                script: "Latn".into(),
                ..Default::default()
            })
            .collect();
        AtomStore::from_total_order(&UcdLoader::total_order(records))
    }

    #[test]
    fn identical_text_produces_identical_composition_id() {
        let store = test_store();
        let a = SubstrateService::compute_composition("hello", &store).unwrap();
        let b = SubstrateService::compute_composition("hello", &store).unwrap();
        assert_eq!(a.composition.comp_id, b.composition.comp_id);
        assert_eq!(a.physicality.phys_id, b.physicality.phys_id);
    }

    #[test]
    fn different_text_produces_different_composition_id() {
        let store = test_store();
        let a = SubstrateService::compute_composition("hello", &store).unwrap();
        let b = SubstrateService::compute_composition("world", &store).unwrap();
        assert_ne!(a.composition.comp_id, b.composition.comp_id);
    }

    #[test]
    fn composition_centroid_is_unit_norm() {
        let store = test_store();
        let c = SubstrateService::compute_composition("hello world", &store).unwrap();
        assert!((c.physicality.centroid.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_text_yields_no_composition() {
        let store = test_store();
        assert!(SubstrateService::compute_composition("", &store).is_none());
    }

    #[test]
    fn relation_argument_order_does_not_affect_identity() {
        let store = test_store();
        let hello = SubstrateService::compute_composition("hello", &store).unwrap();
        let world = SubstrateService::compute_composition("world", &store).unwrap();

        let forward =
            SubstrateService::compute_relation(&hello.cache_entry, &world.cache_entry, 1, 1500.0)
                .unwrap();
        let backward =
            SubstrateService::compute_relation(&world.cache_entry, &hello.cache_entry, 1, 1500.0)
                .unwrap();

        assert_eq!(forward.relation.rel_id, backward.relation.rel_id);
    }

    #[test]
    fn self_relation_is_rejected() {
        let store = test_store();
        let hello = SubstrateService::compute_composition("hello", &store).unwrap();
        assert!(
            SubstrateService::compute_relation(&hello.cache_entry, &hello.cache_entry, 1, 1500.0)
                .is_none()
        );
    }

    #[test]
    fn repeated_atoms_merge_into_one_sequence_row() {
        let store = test_store();
        let c = SubstrateService::compute_composition("hello", &store).unwrap();
        let l_row = c
            .sequence
            .iter()
            .find(|row| row.ordinal == 2)
            .expect("ordinal 2 should start the repeated 'l' run");
        assert_eq!(l_row.occurrences, 2);
    }
}
