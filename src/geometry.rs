//! S³ geometry: normalization, geodesic distance, the Super-Fibonacci
//! spiral seeding lattice and the Hopf fibration between S³ and S².
//!
//! All points are unit vectors in ℝ⁴ (`nalgebra::Vector4<f64>`) representing
//! the unit 3-sphere embedded in 4-space.

use nalgebra::Vector4;
use std::f64::consts::PI;

/// Below this norm a vector is treated as degenerate and snapped to the
/// identity point rather than producing NaNs on normalization.
const DEGENERATE_NORM_EPS: f64 = 1e-15;

/// Golden ratio, used as the first irrational rotation constant of the
/// Super-Fibonacci spiral.
pub const PHI: f64 = 1.618_033_988_749_895;

/// Plastic constant, the second irrational rotation constant; chosen (over
/// e.g. sqrt(2)) because its continued fraction avoids near-resonances with
/// PHI across the index range used for seeding.
pub const PSI: f64 = 1.324_717_957_244_746;

/// Identity point returned for degenerate (near-zero) input vectors.
pub fn identity_point() -> Vector4<f64> {
    Vector4::new(1.0, 0.0, 0.0, 0.0)
}

/// Project `v` onto the unit 3-sphere. Vectors with norm below
/// [`DEGENERATE_NORM_EPS`] fall back to [`identity_point`] rather than
/// dividing by (near) zero.
pub fn normalize_s3(v: Vector4<f64>) -> Vector4<f64> {
    let norm = v.norm();
    if norm < DEGENERATE_NORM_EPS {
        identity_point()
    } else {
        v / norm
    }
}

/// Whether `v` already lies on S³ within `tolerance`.
pub fn is_on_s3(v: &Vector4<f64>, tolerance: f64) -> bool {
    (v.norm() - 1.0).abs() <= tolerance
}

/// Geodesic (great-circle) distance between two points on S³, in `[0, π]`.
pub fn distance_s3(a: &Vector4<f64>, b: &Vector4<f64>) -> f64 {
    let dot = a.dot(b).clamp(-1.0, 1.0);
    dot.acos()
}

/// The `i`-th point (of `n` total) of the Super-Fibonacci spiral on S³.
///
/// Distributes `n` points quasi-uniformly over S³ using two incommensurate
/// rotation rates (`1/PHI`, `1/PSI`) so consecutive indices never cluster,
/// which keeps Unicode codepoint seeding locality-preserving under the
/// Hilbert/Morton index (see [`crate::hilbert`]).
pub fn super_fibonacci_point(i: u64, n: u64) -> Vector4<f64> {
    let n = n.max(1);
    let s = (i as f64 + 0.5) / n as f64;
    let t = i as f64;

    let r = s.sqrt();
    let rc = (1.0 - s).sqrt();

    let alpha = 2.0 * PI * (t / PHI);
    let beta = 2.0 * PI * (t / PSI);

    normalize_s3(Vector4::new(
        r * alpha.sin(),
        r * alpha.cos(),
        rc * beta.sin(),
        rc * beta.cos(),
    ))
}

/// Forward Hopf map S³ → S², sending the fiber over each point of S² to a
/// great circle on S³.
pub fn hopf_forward(p: &Vector4<f64>) -> [f64; 3] {
    let (x0, x1, x2, x3) = (p[0], p[1], p[2], p[3]);
    [
        2.0 * (x0 * x2 + x1 * x3),
        2.0 * (x1 * x2 - x0 * x3),
        x0 * x0 + x1 * x1 - x2 * x2 - x3 * x3,
    ]
}

/// One point of the fiber over `s2` (a unit vector in ℝ³) at `fiber_angle`
/// radians, i.e. a right inverse of [`hopf_forward`].
///
/// The fiber over each S² point is a full circle on S³. Writing the S³
/// point as a pair of complex numbers `(z1, z2) = (x0+x1 i, x2+x3 i)`, the
/// forward map is invariant under the global phase rotation
/// `(z1, z2) -> (z1 e^{iθ}, z2 e^{iθ})`; `fiber_angle` is that θ.
pub fn hopf_inverse(s2: &[f64; 3], fiber_angle: f64) -> Vector4<f64> {
    let (nx, ny, nz) = (s2[0], s2[1], s2[2]);

    // Representative point with x1 = 0, obtained by solving the forward
    // map directly: x0 = sqrt((1+nz)/2), x2 = nx/(2 x0), x3 = -ny/(2 x0).
    let (x0, x2, x3) = if (1.0 + nz) < DEGENERATE_NORM_EPS {
        // South pole: fiber is the circle x0=x1=0, x2^2+x3^2=1.
        (0.0, fiber_angle.cos(), fiber_angle.sin())
    } else {
        let a = ((1.0 + nz) / 2.0).sqrt();
        (a, nx / (2.0 * a), -ny / (2.0 * a))
    };
    let x1 = 0.0_f64;

    if (1.0 + nz) < DEGENERATE_NORM_EPS {
        return normalize_s3(Vector4::new(x0, x1, x2, x3));
    }

    // Apply the global phase e^{i * fiber_angle} to (z1, z2).
    let (s, c) = fiber_angle.sin_cos();
    let z1 = (x0 * c - x1 * s, x0 * s + x1 * c);
    let z2 = (x2 * c - x3 * s, x2 * s + x3 * c);
    normalize_s3(Vector4::new(z1.0, z1.1, z2.0, z2.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_degenerate_vector() {
        let v = Vector4::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(normalize_s3(v), identity_point());
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let v = Vector4::new(3.0, 4.0, 0.0, 0.0);
        let n = normalize_s3(v);
        assert!((n.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = super_fibonacci_point(7, 1000);
        assert!(distance_s3(&p, &p) < 1e-9);
    }

    #[test]
    fn distance_is_symmetric_and_bounded() {
        let a = super_fibonacci_point(1, 1000);
        let b = super_fibonacci_point(500, 1000);
        let d_ab = distance_s3(&a, &b);
        let d_ba = distance_s3(&b, &a);
        assert!((d_ab - d_ba).abs() < 1e-12);
        assert!(d_ab >= 0.0 && d_ab <= PI + 1e-9);
    }

    #[test]
    fn super_fibonacci_points_are_on_s3() {
        for i in [0u64, 1, 500, 999] {
            let p = super_fibonacci_point(i, 1000);
            assert!(is_on_s3(&p, 1e-9), "point {i} not on S3: norm={}", p.norm());
        }
    }

    #[test]
    fn super_fibonacci_spreads_points_apart() {
        let n = 200;
        let mut min_d = f64::MAX;
        for i in 0..n {
            let j = (i + 1) % n;
            let d = distance_s3(&super_fibonacci_point(i, n), &super_fibonacci_point(j, n));
            min_d = min_d.min(d);
        }
        assert!(min_d > 1e-4, "adjacent indices should not collide: min_d={min_d}");
    }

    #[test]
    fn hopf_forward_image_is_on_s2() {
        let p = super_fibonacci_point(42, 1000);
        let s2 = hopf_forward(&p);
        let norm = (s2[0] * s2[0] + s2[1] * s2[1] + s2[2] * s2[2]).sqrt();
        assert!((norm - 1.0).abs() < 1e-9, "hopf image norm={norm}");
    }

    #[test]
    fn hopf_inverse_roundtrips_through_forward() {
        let p = super_fibonacci_point(17, 1000);
        let s2 = hopf_forward(&p);
        let lifted = hopf_inverse(&s2, 0.0);
        let s2_again = hopf_forward(&lifted);
        let err = ((s2[0] - s2_again[0]).powi(2)
            + (s2[1] - s2_again[1]).powi(2)
            + (s2[2] - s2_again[2]).powi(2))
        .sqrt();
        assert!(err < 1e-6, "hopf roundtrip error too large: {err}");
    }

    proptest::proptest! {
        #[test]
        fn super_fibonacci_is_always_unit_length(i in 0u64..100_000, n in 1u64..100_000) {
            let p = super_fibonacci_point(i % n.max(1), n);
            proptest::prop_assert!((p.norm() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn distance_s3_stays_in_range(
            ax in -1.0f64..1.0, ay in -1.0f64..1.0, az in -1.0f64..1.0, aw in -1.0f64..1.0,
            bx in -1.0f64..1.0, by in -1.0f64..1.0, bz in -1.0f64..1.0, bw in -1.0f64..1.0,
        ) {
            let a = normalize_s3(Vector4::new(ax, ay, az, aw));
            let b = normalize_s3(Vector4::new(bx, by, bz, bw));
            let d = distance_s3(&a, &b);
            proptest::prop_assert!(d >= 0.0 && d <= PI + 1e-9);
        }
    }
}
