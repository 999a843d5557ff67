//! Shared collaborator bundle handed to every voice operation.

use voce_core::{MidiState, ScratchPool, SynthConfig};

use crate::file_pool::FilePool;
use crate::mod_matrix::ModMatrix;
use crate::rng::Rng;
use crate::tuning::{StretchTuning, Tuning};
use crate::wave_pool::WavePool;

/// Everything a voice borrows from the surrounding sampler.
///
/// Voices take `&mut Resources` on the event path (the modulation matrix
/// and RNG mutate) and `&Resources` while rendering. The audio thread is
/// the only writer during a block.
pub struct Resources {
    pub midi_state: MidiState,
    pub mod_matrix: ModMatrix,
    pub file_pool: FilePool,
    pub wave_pool: WavePool,
    pub tuning: Tuning,
    pub stretch: Option<StretchTuning>,
    pub scratch_pool: ScratchPool,
    pub synth_config: SynthConfig,
    pub rng: Rng,
}

impl Resources {
    /// Build with scratch and modulation buffers sized for
    /// `block_capacity` frames.
    pub fn new(block_capacity: usize) -> Self {
        Self {
            midi_state: MidiState::new(),
            mod_matrix: ModMatrix::new(block_capacity),
            file_pool: FilePool::new(),
            wave_pool: WavePool::new(),
            tuning: Tuning::equal_temperament(),
            stretch: None,
            scratch_pool: ScratchPool::new(block_capacity),
            synth_config: SynthConfig::default(),
            rng: Rng::new(0x5EED_1234),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction() {
        let resources = Resources::new(256);
        assert_eq!(resources.scratch_pool.block_capacity(), 256);
        assert!(resources.stretch.is_none());
        assert_eq!(resources.midi_state.cc_value(64), 0.0);
    }
}
