//! 128-bit spatial index.
//!
//! This is a Z-order (Morton) bit-interleaving of four 32-bit discretized
//! coordinates, not a true Hilbert/Skilling curve. Z-order is cheaper to
//! compute and still locality-preserving, which is all a coarse spatial
//! index needs.
//!
//! The least significant bit of the resulting 128-bit index is overwritten
//! with an entity-type parity bit: 1 for Atom-class entities, 0 for
//! Composition/Relation-class entities, so a caller can filter by class
//! without a second index.

use nalgebra::Vector4;

/// Bits of precision per dimension. 4 * 32 = 128 total before the parity
/// bit is folded in.
const BITS_PER_DIM: u32 = 32;
const DISCRETE_MAX: u64 = (1u64 << BITS_PER_DIM) - 1;

/// Discretizes a coordinate in `[-1, 1]` (S³ points never exceed this) to
/// an unsigned `BITS_PER_DIM`-bit integer.
fn discretize(coord: f64) -> u64 {
    let clamped = coord.clamp(-1.0, 1.0);
    let unit = (clamped + 1.0) / 2.0; // now in [0, 1]
    (unit * DISCRETE_MAX as f64).round() as u64
}

/// Spreads the low `BITS_PER_DIM` bits of `v` so there are 3 zero bits
/// between each original bit, leaving room to interleave 4 dimensions:
/// input bit `i` lands at output bit `4*i`.
fn spread_bits(v: u64) -> u128 {
    let mut out: u128 = 0;
    for i in 0..BITS_PER_DIM {
        let bit = (v >> i) & 1;
        out |= (bit as u128) << (4 * i);
    }
    out
}

/// Whether an entity is Atom-class (parity bit 1) or
/// Composition/Relation-class (parity bit 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityClass {
    Atom,
    CompositionOrRelation,
}

/// Encode a point already known to lie on (or near) S³ into the 128-bit
/// spatial index, discretizing each coordinate to 32 bits and interleaving.
pub fn encode(point: &Vector4<f64>, class: EntityClass) -> u128 {
    let coords = [
        discretize(point[0]),
        discretize(point[1]),
        discretize(point[2]),
        discretize(point[3]),
    ];

    let mut index: u128 = 0;
    for (dim, &c) in coords.iter().enumerate() {
        index |= spread_bits(c) << dim;
    }

    let parity = match class {
        EntityClass::Atom => 1u128,
        EntityClass::CompositionOrRelation => 0u128,
    };
    (index & !1u128) | parity
}

/// The entity class encoded in `index`'s parity bit.
pub fn class_of(index: u128) -> EntityClass {
    if index & 1 == 1 {
        EntityClass::Atom
    } else {
        EntityClass::CompositionOrRelation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_deterministic() {
        let p = Vector4::new(0.5, -0.2, 0.1, 0.8);
        assert_eq!(
            encode(&p, EntityClass::Atom),
            encode(&p, EntityClass::Atom)
        );
    }

    #[test]
    fn parity_bit_round_trips() {
        let p = Vector4::new(0.1, 0.2, 0.3, 0.9);
        assert_eq!(class_of(encode(&p, EntityClass::Atom)), EntityClass::Atom);
        assert_eq!(
            class_of(encode(&p, EntityClass::CompositionOrRelation)),
            EntityClass::CompositionOrRelation
        );
    }

    #[test]
    fn nearby_points_get_nearby_indices() {
        let a = Vector4::new(0.5, 0.5, 0.5, 0.5);
        let b = Vector4::new(0.5001, 0.5, 0.5, 0.5);
        let far = Vector4::new(-0.5, -0.5, -0.5, -0.5);

        let ia = encode(&a, EntityClass::Atom);
        let ib = encode(&b, EntityClass::Atom);
        let ifar = encode(&far, EntityClass::Atom);

        // Z-order doesn't guarantee every neighbor stays close, but the high
        // bits (which dominate magnitude) should match for a points this near.
        let high_bits_a = ia >> 100;
        let high_bits_b = ib >> 100;
        let high_bits_far = ifar >> 100;
        assert_eq!(high_bits_a, high_bits_b);
        assert_ne!(high_bits_a, high_bits_far);
    }

    #[test]
    fn out_of_range_coordinates_are_clamped_not_panicking() {
        let p = Vector4::new(5.0, -5.0, 0.0, 0.0);
        let _ = encode(&p, EntityClass::Atom);
    }
}
