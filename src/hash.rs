//! Content-addressed identity: 128-bit BLAKE3-derived hashes over
//! typed byte layouts, so two entities with the same logical content always
//! resolve to the same id regardless of which ingester produced them.

use rayon::prelude::*;

/// Tag bytes disambiguate entity classes that would otherwise hash
/// identically (e.g. a Composition built from the same bytes as a Relation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntityTag {
    Atom = 0x41,
    Composition = 0x43,
    CompositionSequence = 0x53,
    Relation = 0x52,
    RelationSequence = 0x54,
    Physicality = 0x50,
}

/// Truncated-BLAKE3 hash of `tag || payload`, read as a big-endian u128.
///
/// Truncating BLAKE3's 256-bit output to 128 bits still leaves a birthday
/// bound around 2^64 before collisions become likely, comfortably above
/// any realistic substrate's entity count.
pub fn content_hash(tag: EntityTag, payload: &[u8]) -> u128 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[tag as u8]);
    hasher.update(payload);
    let digest = hasher.finalize();
    let bytes = digest.as_bytes();
    u128::from_be_bytes(bytes[0..16].try_into().unwrap())
}

/// Hash a single Unicode codepoint as an Atom. Numeric fields are encoded
/// little-endian throughout, per the identity layout's bit-exact contract.
pub fn hash_codepoint(codepoint: u32) -> u128 {
    content_hash(EntityTag::Atom, &codepoint.to_le_bytes())
}

/// Hash an ordered list of member ids as a Composition: member order is
/// part of the content, so `[a, b] != [b, a]`.
pub fn hash_composition(member_ids: &[u128]) -> u128 {
    let mut payload = Vec::with_capacity(member_ids.len() * 16);
    for id in member_ids {
        payload.extend_from_slice(&id.to_le_bytes());
    }
    content_hash(EntityTag::Composition, &payload)
}

/// Hash a Relation between two compositions, canonicalizing on id order so
/// `(a, b)` and `(b, a)` collide to the same id: the relation kind (the
/// grammatical or lexical label) is carried on the evidence row, not the
/// identity, so repeated observations of the same pair under different
/// kinds accumulate onto one rating rather than fragmenting it.
pub fn hash_relation(comp_a: u128, comp_b: u128) -> u128 {
    let (first, second) = if comp_a < comp_b {
        (comp_a, comp_b)
    } else {
        (comp_b, comp_a)
    };
    let mut payload = Vec::with_capacity(32);
    payload.extend_from_slice(&first.to_le_bytes());
    payload.extend_from_slice(&second.to_le_bytes());
    content_hash(EntityTag::Relation, &payload)
}

/// Hash a RelationEvidence row's identity from the content it was observed
/// in and the relation it supports. Unlike every other entity id, this one
/// carries no tag byte: the payload is exactly `content_id || rel_id`, 32
/// bytes, since evidence rows are already disambiguated by their
/// `(content_id, rel_id)` uniqueness constraint and don't need one.
pub fn hash_evidence(content_id: u128, rel_id: u128) -> u128 {
    let mut payload = Vec::with_capacity(32);
    payload.extend_from_slice(&content_id.to_le_bytes());
    payload.extend_from_slice(&rel_id.to_le_bytes());
    let digest = blake3::hash(&payload);
    u128::from_be_bytes(digest.as_bytes()[0..16].try_into().unwrap())
}

/// Hash many independent payloads in parallel via rayon, preserving input
/// order in the output. Used by the bulk ingesters to hash a whole chunk of
/// n-grams or relation candidates without serializing through one thread.
pub fn hash_batch<'a, T, F>(items: &'a [T], f: F) -> Vec<u128>
where
    T: Sync,
    F: Fn(&'a T) -> u128 + Sync + Send,
{
    items.par_iter().map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_hash() {
        assert_eq!(hash_codepoint(0x41), hash_codepoint(0x41));
    }

    #[test]
    fn different_tags_diverge() {
        let a = content_hash(EntityTag::Atom, b"x");
        let b = content_hash(EntityTag::Composition, b"x");
        assert_ne!(a, b);
    }

    #[test]
    fn composition_hash_is_order_sensitive() {
        let a = hash_composition(&[1, 2, 3]);
        let b = hash_composition(&[3, 2, 1]);
        assert_ne!(a, b);
    }

    #[test]
    fn relation_hash_is_order_insensitive() {
        let a = hash_relation(10, 20);
        let b = hash_relation(20, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn evidence_hash_has_no_tag_byte() {
        let mut payload = Vec::with_capacity(32);
        payload.extend_from_slice(&7u128.to_le_bytes());
        payload.extend_from_slice(&9u128.to_le_bytes());
        let untagged = u128::from_be_bytes(blake3::hash(&payload).as_bytes()[0..16].try_into().unwrap());
        assert_eq!(hash_evidence(7, 9), untagged);
        assert_ne!(hash_evidence(7, 9), content_hash(EntityTag::Relation, &payload));
    }

    #[test]
    fn evidence_hash_is_order_sensitive() {
        assert_ne!(hash_evidence(7, 9), hash_evidence(9, 7));
    }

    #[test]
    fn batch_hash_matches_sequential() {
        let items: Vec<u32> = (0..1000).collect();
        let batch = hash_batch(&items, |c| hash_codepoint(*c));
        let sequential: Vec<u128> = items.iter().map(|c| hash_codepoint(*c)).collect();
        assert_eq!(batch, sequential);
    }
}
