//! Deterministic RNG utilities for reproducible tests.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Create a deterministic `ChaCha8Rng` from a seed.
///
/// All test randomization should go through this to ensure reproducibility.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Uniformly distributed unit vector.
pub fn random_unit_vector<R: Rng>(rng: &mut R) -> Vector3<f32> {
    loop {
        let v: Vector3<f32> = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let norm = v.norm();
        if (0.1..=1.0).contains(&norm) {
            return v / norm;
        }
    }
}

/// A chain of `links` transforms rooted at the origin, each segment pointing
/// in a random direction with a length drawn from `[min_len, max_len)`.
///
/// Consecutive segments are kept at least ~25° apart so the chain is never
/// (nearly) straight, which would stall an unconstrained FABRIK solve.
pub fn random_bent_chain<R: Rng>(
    rng: &mut R,
    links: usize,
    min_len: f32,
    max_len: f32,
) -> Vec<Isometry3<f32>> {
    let mut chain = Vec::with_capacity(links);
    let mut position = Vector3::zeros();
    let mut previous: Option<Vector3<f32>> = None;
    for _ in 0..links {
        chain.push(Isometry3::from_parts(
            Translation3::from(position),
            UnitQuaternion::identity(),
        ));
        let direction = loop {
            let d = random_unit_vector(rng);
            if previous.map_or(true, |p| p.dot(&d) < 0.9) {
                break d;
            }
        };
        position += direction * rng.gen_range(min_len..max_len);
        previous = Some(direction);
    }
    chain
}

/// A point at `ratio` of `reach` from `origin`, in a random direction.
pub fn random_point_at<R: Rng>(rng: &mut R, origin: &Vector3<f32>, reach: f32, ratio: f32) -> Vector3<f32> {
    origin + random_unit_vector(rng) * reach * ratio
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn seeded_rng_is_deterministic() {
        let mut rng1 = seeded_rng(42);
        let mut rng2 = seeded_rng(42);
        let v1: f32 = rng1.r#gen();
        let v2: f32 = rng2.r#gen();
        assert!((v1 - v2).abs() < f32::EPSILON);
    }

    #[test]
    fn unit_vectors_are_normalized() {
        let mut rng = seeded_rng(7);
        for _ in 0..50 {
            assert_relative_eq!(random_unit_vector(&mut rng).norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn bent_chain_has_requested_shape() {
        let mut rng = seeded_rng(3);
        let chain = random_bent_chain(&mut rng, 6, 5.0, 15.0);
        assert_eq!(chain.len(), 6);
        assert_relative_eq!(chain[0].translation.vector, Vector3::zeros());
        for pair in chain.windows(2) {
            let len = (pair[1].translation.vector - pair[0].translation.vector).norm();
            assert!((5.0..15.0).contains(&len), "len = {len}");
        }
    }

    #[test]
    fn random_chains_differ_by_seed() {
        let a = random_bent_chain(&mut seeded_rng(1), 3, 1.0, 2.0);
        let b = random_bent_chain(&mut seeded_rng(2), 3, 1.0, 2.0);
        assert_ne!(a, b);
    }
}
