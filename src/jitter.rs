use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A duration of `base_ms` milliseconds, shifted by a uniform amount in `[-variance_ms, variance_ms]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterSpec {
    pub base_ms: u64,
    pub variance_ms: u64,
}

impl JitterSpec {
    pub const fn new(base_ms: u64, variance_ms: u64) -> Self {
        Self {
            base_ms,
            variance_ms,
        }
    }
}

pub struct Jitter<R: Rng + ?Sized> {
    pub rng: Box<R>,
}

impl Jitter<SmallRng> {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Box::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl<R: Rng + ?Sized> Jitter<R> {
    /// Function that draws a jittered duration. Saturates at zero and at `u64::MAX` ms.
    pub fn duration(&mut self, spec: JitterSpec) -> Duration {
        let variance = u128::from(spec.variance_ms);
        let offset = self.rng.random_range(0..=2 * variance);

        let millis = if offset >= variance {
            let above = u64::try_from(offset - variance).unwrap_or(u64::MAX);
            spec.base_ms.saturating_add(above)
        } else {
            let below = u64::try_from(variance - offset).unwrap_or(u64::MAX);
            spec.base_ms.saturating_sub(below)
        };
        Duration::from_millis(millis)
    }

    /// Function that returns `true` with the given probability.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.random_bool(probability.clamp(0., 1.))
    }
}

/// Function that derives a per-process seed from the simulation seed.
pub fn derive_seed(seed: u64, stream: u64) -> u64 {
    seed ^ stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_stay_within_the_variance() {
        let mut jitter = Jitter::new(7);
        let spec = JitterSpec::new(1000, 500);
        for _ in 0..1000 {
            let millis = jitter.duration(spec).as_millis();
            assert!((500..=1500).contains(&millis));
        }
    }

    #[test]
    fn zero_variance_is_exact() {
        let mut jitter = Jitter::new(1);
        assert_eq!(
            jitter.duration(JitterSpec::new(200, 0)),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn variance_larger_than_base_clamps_at_zero() {
        let mut jitter = Jitter::new(3);
        for _ in 0..200 {
            assert!(jitter.duration(JitterSpec::new(10, 50)) <= Duration::from_millis(60));
        }
    }

    #[test]
    fn extreme_specs_saturate_instead_of_panicking() {
        let mut jitter = Jitter::new(1);
        for _ in 0..200 {
            let _ = jitter.duration(JitterSpec::new(10, u64::MAX));
            assert!(jitter.duration(JitterSpec::new(u64::MAX, 5)) >= Duration::from_millis(u64::MAX - 5));
            assert!(jitter.duration(JitterSpec::new(u64::MAX, u64::MAX)) <= Duration::from_millis(u64::MAX));
        }
    }

    #[test]
    fn same_seed_same_draws() {
        let spec = JitterSpec::new(100, 100);
        let mut a = Jitter::new(42);
        let mut b = Jitter::new(42);
        for _ in 0..20 {
            assert_eq!(a.duration(spec), b.duration(spec));
        }
    }

    #[test]
    fn derived_seeds_differ_per_stream() {
        assert_ne!(derive_seed(5, 0), derive_seed(5, 1));
    }
}
