//! Running power estimate of a voice's output.
//!
//! Tracks the per-block mean square of the rendered stereo signal with
//! attack/release ballistics. The voice stealer reads the result from any
//! thread through an atomic.

use voce_core::{AtomicFloat, StereoBlock};

const ATTACK_SECONDS: f32 = 0.005;
const RELEASE_SECONDS: f32 = 0.200;

/// Block-rate power follower.
#[derive(Debug)]
pub struct PowerFollower {
    sample_rate: f32,
    samples_per_block: usize,
    attack_coeff: f32,
    release_coeff: f32,
    state: f32,
    average: AtomicFloat,
}

impl PowerFollower {
    pub fn new() -> Self {
        let mut follower = Self {
            sample_rate: voce_core::config::DEFAULT_SAMPLE_RATE,
            samples_per_block: voce_core::config::DEFAULT_BLOCK_SIZE,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            state: 0.0,
            average: AtomicFloat::new(0.0),
        };
        follower.update_coefficients();
        follower
    }

    fn update_coefficients(&mut self) {
        let block_rate = self.sample_rate / self.samples_per_block.max(1) as f32;
        let coeff = |seconds: f32| {
            if seconds <= 0.0 {
                0.0
            } else {
                (-1.0 / (seconds * block_rate)).exp()
            }
        };
        self.attack_coeff = coeff(ATTACK_SECONDS);
        self.release_coeff = coeff(RELEASE_SECONDS);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    pub fn set_samples_per_block(&mut self, samples_per_block: usize) {
        self.samples_per_block = samples_per_block;
        self.update_coefficients();
    }

    /// Fold one rendered block into the estimate.
    pub fn process(&mut self, block: &StereoBlock<'_>) {
        let frames = block.frames();
        if frames == 0 {
            return;
        }

        let mut sum = 0.0f32;
        for (&l, &r) in block.left().iter().zip(block.right().iter()) {
            sum += l * l + r * r;
        }
        let power = sum / (2 * frames) as f32;

        let coeff = if power > self.state {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.state = power + coeff * (self.state - power);
        self.average.set(self.state);
    }

    /// Cross-thread read used as the voice-stealing score.
    #[inline]
    pub fn average_power(&self) -> f32 {
        self.average.get()
    }

    pub fn clear(&mut self) {
        self.state = 0.0;
        self.average.set(0.0);
    }
}

impl Default for PowerFollower {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_reads_zero() {
        let follower = PowerFollower::new();
        assert_eq!(follower.average_power(), 0.0);
    }

    #[test]
    fn test_rises_on_signal_falls_on_silence() {
        let mut follower = PowerFollower::new();
        follower.set_sample_rate(48_000.0);
        follower.set_samples_per_block(64);

        let mut l = [0.5f32; 64];
        let mut r = [0.5f32; 64];
        for _ in 0..100 {
            let block = StereoBlock::new(&mut l, &mut r);
            follower.process(&block);
        }
        let loud = follower.average_power();
        assert!(loud > 0.1, "follower should rise, got {}", loud);

        let mut zl = [0.0f32; 64];
        let mut zr = [0.0f32; 64];
        for _ in 0..2000 {
            let block = StereoBlock::new(&mut zl, &mut zr);
            follower.process(&block);
        }
        assert!(follower.average_power() < loud * 0.1);
    }

    #[test]
    fn test_clear_resets() {
        let mut follower = PowerFollower::new();
        let mut l = [1.0f32; 64];
        let mut r = [1.0f32; 64];
        for _ in 0..10 {
            let block = StereoBlock::new(&mut l, &mut r);
            follower.process(&block);
        }
        assert!(follower.average_power() > 0.0);

        follower.clear();
        assert_eq!(follower.average_power(), 0.0);
    }
}
