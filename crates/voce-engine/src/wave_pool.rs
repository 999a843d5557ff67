//! Prebuilt and file-backed wavetables for the oscillator path.

use std::sync::Arc;

use dashmap::DashMap;
use voce_dsp::WavetableMulti;

/// Wavetable storage shared by all voices.
pub struct WavePool {
    sine: Arc<WavetableMulti>,
    triangle: Arc<WavetableMulti>,
    square: Arc<WavetableMulti>,
    saw: Arc<WavetableMulti>,
    file_waves: DashMap<String, Arc<WavetableMulti>>,
}

impl WavePool {
    /// Builds the four standard waveforms up front; call off the audio
    /// thread.
    pub fn new() -> Self {
        Self {
            sine: Arc::new(WavetableMulti::sine()),
            triangle: Arc::new(WavetableMulti::triangle()),
            square: Arc::new(WavetableMulti::square()),
            saw: Arc::new(WavetableMulti::saw()),
            file_waves: DashMap::new(),
        }
    }

    pub fn get_wave_sin(&self) -> Arc<WavetableMulti> {
        Arc::clone(&self.sine)
    }

    pub fn get_wave_triangle(&self) -> Arc<WavetableMulti> {
        Arc::clone(&self.triangle)
    }

    pub fn get_wave_square(&self) -> Arc<WavetableMulti> {
        Arc::clone(&self.square)
    }

    pub fn get_wave_saw(&self) -> Arc<WavetableMulti> {
        Arc::clone(&self.saw)
    }

    /// Build a wavetable from one cycle of audio and register it. Non-RT.
    pub fn insert_file_wave(&self, name: &str, cycle: &[f32]) {
        self.file_waves
            .insert(name.to_string(), Arc::new(WavetableMulti::from_cycle(cycle)));
    }

    /// Look up a file-backed wavetable.
    pub fn get_file_wave(&self, name: &str) -> Option<Arc<WavetableMulti>> {
        self.file_waves.get(name).map(|e| Arc::clone(e.value()))
    }
}

impl Default for WavePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_waves_present() {
        let pool = WavePool::new();
        // Shared handles, not rebuilt per call.
        assert!(Arc::ptr_eq(&pool.get_wave_sin(), &pool.get_wave_sin()));
        let _ = pool.get_wave_triangle();
        let _ = pool.get_wave_square();
        let _ = pool.get_wave_saw();
    }

    #[test]
    fn test_file_wave_registration() {
        let pool = WavePool::new();
        assert!(pool.get_file_wave("organ").is_none());

        let cycle: Vec<f32> = (0..64)
            .map(|i| (std::f32::consts::TAU * i as f32 / 64.0).sin())
            .collect();
        pool.insert_file_wave("organ", &cycle);
        assert!(pool.get_file_wave("organ").is_some());
    }
}
