//! Bernoulli trials behind a seam so decisions can be replayed in tests.

use rand::Rng;

/// Source of independent yes/no draws.
pub trait Dice {
    /// Returns `true` with the given probability (clamped to `[0, 1]`).
    fn chance(&mut self, probability: f64) -> bool;
}

impl<R: Rng + ?Sized> Dice for R {
    fn chance(&mut self, probability: f64) -> bool {
        self.gen_bool(probability.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn extremes_are_certain() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(rng.chance(1.0));
        assert!(!rng.chance(0.0));
        assert!(rng.chance(3.0));
        assert!(!rng.chance(-1.0));
    }

    #[test]
    fn same_seed_same_draws() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        let left: Vec<bool> = (0..32).map(|_| a.chance(0.5)).collect();
        let right: Vec<bool> = (0..32).map(|_| b.chance(0.5)).collect();
        assert_eq!(left, right);
    }
}
