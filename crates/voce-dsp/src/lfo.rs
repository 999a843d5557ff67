//! Per-voice low-frequency oscillator.
//!
//! Voices own a configurable number of these; the modulation matrix reads
//! their output blocks as modulation sources.

/// LFO waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoShape {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
    SawtoothDown,
}

impl LfoShape {
    #[inline]
    pub fn evaluate(&self, phase: f32) -> f32 {
        match self {
            LfoShape::Sine => (phase * std::f32::consts::TAU).sin(),
            LfoShape::Triangle => {
                let p = phase * 4.0;
                if p < 1.0 {
                    p
                } else if p < 3.0 {
                    2.0 - p
                } else {
                    p - 4.0
                }
            }
            LfoShape::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoShape::Sawtooth => phase * 2.0 - 1.0,
            LfoShape::SawtoothDown => 1.0 - phase * 2.0,
        }
    }
}

/// One LFO slot.
#[derive(Debug, Clone)]
pub struct VoiceLfo {
    shape: LfoShape,
    /// Rate in Hz.
    frequency: f32,
    /// Frames before the LFO starts moving.
    delay_frames: i64,
    /// Frames over which the output fades in after the delay.
    fade_frames: i64,
    phase: f32,
    sample_rate: f32,
    delay_remaining: i64,
    fade_position: i64,
}

impl VoiceLfo {
    pub fn new() -> Self {
        Self {
            shape: LfoShape::Sine,
            frequency: 1.0,
            delay_frames: 0,
            fade_frames: 0,
            phase: 0.0,
            sample_rate: voce_core::config::DEFAULT_SAMPLE_RATE,
            delay_remaining: 0,
            fade_position: 0,
        }
    }

    pub fn configure(&mut self, shape: LfoShape, frequency: f32, delay: f32, fade: f32) {
        self.shape = shape;
        self.frequency = frequency.max(0.0);
        self.delay_frames = (delay.max(0.0) * self.sample_rate) as i64;
        self.fade_frames = (fade.max(0.0) * self.sample_rate) as i64;
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        // Re-derive the frame counts from the stored second values.
        let delay_seconds = self.delay_frames as f32 / self.sample_rate;
        let fade_seconds = self.fade_frames as f32 / self.sample_rate;
        self.sample_rate = sample_rate;
        self.delay_frames = (delay_seconds * sample_rate) as i64;
        self.fade_frames = (fade_seconds * sample_rate) as i64;
    }

    /// Restart for a new note, `delay` frames into the block.
    pub fn start(&mut self, delay: i64) {
        self.phase = 0.0;
        self.delay_remaining = self.delay_frames + delay.max(0);
        self.fade_position = 0;
    }

    /// Render one block of bipolar LFO output.
    pub fn process(&mut self, out: &mut [f32]) {
        let step = self.frequency / self.sample_rate;

        for y in out.iter_mut() {
            if self.delay_remaining > 0 {
                self.delay_remaining -= 1;
                *y = 0.0;
                continue;
            }

            let fade = if self.fade_frames > 0 && self.fade_position < self.fade_frames {
                self.fade_position += 1;
                self.fade_position as f32 / self.fade_frames as f32
            } else {
                1.0
            };

            *y = self.shape.evaluate(self.phase) * fade;
            self.phase += step;
            self.phase -= self.phase.floor();
        }
    }
}

impl Default for VoiceLfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_lfo_range() {
        let mut lfo = VoiceLfo::new();
        lfo.set_sample_rate(1000.0);
        lfo.configure(LfoShape::Sine, 10.0, 0.0, 0.0);
        lfo.start(0);

        let mut out = [0.0f32; 1000];
        lfo.process(&mut out);

        let max = out.iter().fold(f32::MIN, |m, &x| m.max(x));
        let min = out.iter().fold(f32::MAX, |m, &x| m.min(x));
        assert!(max > 0.99 && min < -0.99);
    }

    #[test]
    fn test_delay_holds_zero() {
        let mut lfo = VoiceLfo::new();
        lfo.set_sample_rate(1000.0);
        lfo.configure(LfoShape::Square, 5.0, 0.05, 0.0); // 50-frame delay
        lfo.start(0);

        let mut out = [1.0f32; 100];
        lfo.process(&mut out);

        assert!(out[..50].iter().all(|&x| x == 0.0));
        assert!(out[50..].iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_fade_ramps_amplitude() {
        let mut lfo = VoiceLfo::new();
        lfo.set_sample_rate(1000.0);
        lfo.configure(LfoShape::Square, 1.0, 0.0, 0.1); // 100-frame fade
        lfo.start(0);

        let mut out = [0.0f32; 100];
        lfo.process(&mut out);

        // Square holds +1 through the fade, so the fade itself is visible.
        assert!(out[10].abs() < 0.2);
        assert!(out[99].abs() > 0.9);
    }
}
