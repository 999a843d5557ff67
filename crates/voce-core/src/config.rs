//! Engine-wide numeric configuration.

/// Default sample rate used before the host configures one.
pub const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;

/// Default maximum block size in frames.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Default number of filter slots constructed per voice.
pub const FILTERS_PER_VOICE: usize = 2;

/// Default number of EQ slots constructed per voice.
pub const EQS_PER_VOICE: usize = 3;

/// Oscillators held by one voice; bounds the unison spread.
pub const OSCILLATORS_PER_VOICE: usize = 9;

/// Gain smoother time constant in seconds.
pub const GAIN_SMOOTHING_SECONDS: f32 = 0.003;

/// Crossfade smoother time constant in seconds.
pub const XFADE_SMOOTHING_SECONDS: f32 = 0.005;

/// Number of float scratch buffers in the pool.
///
/// The deepest render path (unison generator) checks out six spans at once;
/// a few spares cover nested stages.
pub const SCRATCH_BUFFERS: usize = 10;

/// Number of integer scratch buffers in the pool.
pub const SCRATCH_INDEX_BUFFERS: usize = 2;

/// Envelope level below which a releasing envelope is considered finished.
pub const EG_RELEASE_FLOOR: f32 = 1e-4;

/// Release time applied by `off()` when the region requests a fast off.
pub const OFF_TIME_SECONDS: f32 = 0.006;

/// Sustain pedal threshold as a normalized CC value.
pub const DEFAULT_SUSTAIN_THRESHOLD: f32 = 0.5;

/// Sample-quality selector shared by all voices.
///
/// Quality maps to the resampling interpolator: 1 is linear, 2 is a
/// third-order B-spline, anything above 2 is reserved and currently also
/// serves the B-spline.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    live_sample_quality: i32,
    freewheel_sample_quality: i32,
    freewheeling: bool,
    live_oscillator_quality: i32,
    freewheel_oscillator_quality: i32,
}

impl SynthConfig {
    /// Quality used while rendering live.
    pub fn set_live_sample_quality(&mut self, quality: i32) {
        self.live_sample_quality = quality.max(1);
    }

    /// Quality used while freewheeling (offline bounce by the host).
    pub fn set_freewheel_sample_quality(&mut self, quality: i32) {
        self.freewheel_sample_quality = quality.max(1);
    }

    pub fn set_freewheeling(&mut self, freewheeling: bool) {
        self.freewheeling = freewheeling;
    }

    pub fn is_freewheeling(&self) -> bool {
        self.freewheeling
    }

    #[inline]
    pub fn current_sample_quality(&self) -> i32 {
        if self.freewheeling {
            self.freewheel_sample_quality
        } else {
            self.live_sample_quality
        }
    }

    #[inline]
    pub fn current_oscillator_quality(&self) -> i32 {
        if self.freewheeling {
            self.freewheel_oscillator_quality
        } else {
            self.live_oscillator_quality
        }
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            live_sample_quality: 2,
            freewheel_sample_quality: 3,
            freewheeling: false,
            live_oscillator_quality: 1,
            freewheel_oscillator_quality: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_follows_freewheel_flag() {
        let mut config = SynthConfig::default();
        assert_eq!(config.current_sample_quality(), 2);

        config.set_freewheeling(true);
        assert_eq!(config.current_sample_quality(), 3);

        config.set_freewheeling(false);
        config.set_live_sample_quality(1);
        assert_eq!(config.current_sample_quality(), 1);
    }

    #[test]
    fn test_quality_floor() {
        let mut config = SynthConfig::default();
        config.set_live_sample_quality(0);
        assert_eq!(config.current_sample_quality(), 1);
    }
}
