//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use voce::prelude::*;
use voce::StereoBlock;

pub const SAMPLE_RATE: f32 = 48_000.0;
pub const BLOCK_SIZE: usize = 256;

/// Comparison tolerance for float audio.
pub const AUDIO_EPSILON: f32 = 1e-5;

/// Build a voice/resources pair at the standard test rates.
pub fn test_rig() -> (Voice, Resources) {
    let mut voice = Voice::new(0);
    voice.set_sample_rate(SAMPLE_RATE);
    voice.set_samples_per_block(BLOCK_SIZE);
    (voice, Resources::new(BLOCK_SIZE))
}

/// Render one block and return the channel buffers.
pub fn render_block(voice: &mut Voice, resources: &Resources, frames: usize) -> (Vec<f32>, Vec<f32>) {
    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];
    let mut block = StereoBlock::new(&mut left, &mut right);
    voice.render_block(resources, &mut block);
    (left, right)
}

/// Render `blocks` consecutive blocks and concatenate the left channel.
pub fn render_blocks(voice: &mut Voice, resources: &Resources, blocks: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(blocks * BLOCK_SIZE);
    for _ in 0..blocks {
        let (left, _) = render_block(voice, resources, BLOCK_SIZE);
        out.extend_from_slice(&left);
    }
    out
}

/// A mono region playing the builtin sine at the given keycenter.
pub fn sine_region(keycenter: u8) -> Arc<Region> {
    let mut region = Region::new(0, "*sine");
    region.pitch_keycenter = keycenter;
    Arc::new(region)
}

/// Register a mono ramp sample (frame i holds i / frames) under `id`.
pub fn load_ramp(resources: &Resources, id: &str, frames: usize, sample_rate: f64) {
    let samples: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
    resources
        .file_pool
        .insert_memory(id, SampleData::mono(samples, sample_rate));
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()))
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

pub fn is_silent(samples: &[f32]) -> bool {
    samples.iter().all(|&x| x.abs() < AUDIO_EPSILON)
}

/// Frequency estimate from positive-going zero crossings.
pub fn estimate_frequency(samples: &[f32], sample_rate: f32) -> f32 {
    let mut crossings = 0;
    for w in samples.windows(2) {
        if w[0] <= 0.0 && w[1] > 0.0 {
            crossings += 1;
        }
    }
    crossings as f32 * sample_rate / samples.len() as f32
}
