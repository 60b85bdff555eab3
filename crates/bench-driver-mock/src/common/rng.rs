//! Seeded random source shared by failure injection and signal noise.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;

use super::lock;

/// Thread-safe seeded RNG.
pub struct MockRng {
    inner: Mutex<ChaCha8Rng>,
}

impl MockRng {
    /// Seeded when `seed` is given, otherwise seeded from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            inner: Mutex::new(rng),
        }
    }

    /// Bernoulli draw with probability `rate` (clamped to 0..=1).
    pub fn should_fail(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        lock(&self.inner).gen::<f64>() < rate
    }

    /// Uniform noise in `[-amplitude, amplitude)`.
    pub fn noise(&self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        lock(&self.inner).gen_range(-amplitude..amplitude)
    }

    /// Fill `out` with uniform noise of the given amplitude added in place.
    pub fn add_noise(&self, out: &mut [f64], amplitude: f64) {
        if amplitude <= 0.0 {
            return;
        }
        let mut rng = lock(&self.inner);
        for v in out.iter_mut() {
            *v += rng.gen_range(-amplitude..amplitude);
        }
    }
}

impl Default for MockRng {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for MockRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRng").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let a = MockRng::new(Some(7));
        let b = MockRng::new(Some(7));
        for _ in 0..10 {
            assert_eq!(a.noise(0.5), b.noise(0.5));
        }
    }

    #[test]
    fn test_rate_extremes() {
        let rng = MockRng::new(Some(42));
        assert!((0..100).all(|_| !rng.should_fail(0.0)));
        assert!((0..100).all(|_| rng.should_fail(1.0)));
    }

    #[test]
    fn test_rate_is_roughly_honored() {
        let rng = MockRng::new(Some(42));
        let failures = (0..10_000).filter(|_| rng.should_fail(0.3)).count();
        assert!((2_700..3_300).contains(&failures), "got {failures}");
    }

    #[test]
    fn test_noise_bounded() {
        let rng = MockRng::new(Some(1));
        let mut buf = vec![1.0; 1000];
        rng.add_noise(&mut buf, 0.01);
        assert!(buf.iter().all(|v| (v - 1.0).abs() < 0.01));
        assert_eq!(rng.noise(0.0), 0.0);
    }
}
