//! Xorshift random generator for the audio thread.
//!
//! No allocations, no global state. Gaussian output keeps the spare
//! Box-Muller value, so alternating calls stay cheap.

/// Xorshift32 generator.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u32,
    gaussian_spare: Option<f32>,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
            gaussian_spare: None,
        }
    }

    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    /// Uniform in [0, 1).
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform in [-1, 1).
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        self.next_f32() * 2.0 - 1.0
    }

    /// Uniform in [lo, hi).
    #[inline]
    pub fn next_range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }

    /// Standard normal via Box-Muller, scaled to stay inside [-1, 1] most
    /// of the time for use as audio noise.
    pub fn next_gaussian(&mut self) -> f32 {
        if let Some(spare) = self.gaussian_spare.take() {
            return spare;
        }

        let u1 = self.next_f32().max(1e-7);
        let u2 = self.next_f32();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = std::f32::consts::TAU * u2;

        // 0.25 sigma keeps ~4 sigma within full scale.
        let scale = 0.25;
        self.gaussian_spare = Some(radius * theta.sin() * scale);
        radius * theta.cos() * scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_range() {
        let mut rng = Rng::new(42);
        for _ in 0..10_000 {
            let x = rng.next_f32();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let mut a = Rng::new(7);
        let mut b = Rng::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_gaussian_statistics() {
        let mut rng = Rng::new(1234);
        let n = 50_000;
        let samples: Vec<f32> = (0..n).map(|_| rng.next_gaussian()).collect();
        let mean = samples.iter().sum::<f32>() / n as f32;
        let var = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n as f32;

        assert!(mean.abs() < 0.01, "mean {}", mean);
        // Sigma is scaled to 0.25, variance to 0.0625.
        assert!((var - 0.0625).abs() < 0.01, "variance {}", var);
    }

    #[test]
    fn test_gaussian_not_periodic_short_term() {
        // The spare-value cache must not make consecutive values repeat.
        let mut rng = Rng::new(99);
        let a: Vec<f32> = (0..16).map(|_| rng.next_gaussian()).collect();
        let distinct = a
            .iter()
            .filter(|&&x| a.iter().filter(|&&y| (x - y).abs() < 1e-9).count() == 1)
            .count();
        assert!(distinct >= 14);
    }
}
