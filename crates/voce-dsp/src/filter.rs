//! Per-voice filter and EQ slots.
//!
//! Each slot is a biquad configured from a region description at note
//! start: cutoff tracks key and velocity in cents, EQ gain tracks velocity.
//! Slots process mono or stereo in place and carry their own channel state.

use voce_core::cents_factor;

/// Filter response selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    /// One-pole lowpass.
    Lpf1p,
    /// One-pole highpass.
    Hpf1p,
    /// Two-pole lowpass.
    #[default]
    Lpf2p,
    /// Two-pole highpass.
    Hpf2p,
    /// Two-pole bandpass.
    Bpf2p,
    /// Two-pole band-reject.
    Brf2p,
}

/// Region-level filter parameters.
#[derive(Debug, Clone, Copy)]
pub struct FilterDescription {
    pub kind: FilterKind,
    /// Base cutoff in Hz.
    pub cutoff: f32,
    /// Resonance in dB above the Butterworth response.
    pub resonance: f32,
    /// Cents of cutoff change per key away from the keycenter.
    pub keytrack: f32,
    pub keycenter: u8,
    /// Cents of cutoff change at full velocity.
    pub veltrack: f32,
}

impl Default for FilterDescription {
    fn default() -> Self {
        Self {
            kind: FilterKind::Lpf2p,
            cutoff: 20_000.0,
            resonance: 0.0,
            keytrack: 0.0,
            keycenter: 60,
            veltrack: 0.0,
        }
    }
}

/// Region-level EQ band parameters (peaking biquad).
#[derive(Debug, Clone, Copy)]
pub struct EqDescription {
    /// Center frequency in Hz.
    pub frequency: f32,
    /// Bandwidth in octaves.
    pub bandwidth: f32,
    /// Gain in dB.
    pub gain: f32,
    /// Gain in dB added at full velocity.
    pub vel2gain: f32,
    /// Hz added to the center frequency at full velocity.
    pub vel2frequency: f32,
}

impl Default for EqDescription {
    fn default() -> Self {
        Self {
            frequency: 1_000.0,
            bandwidth: 1.0,
            gain: 0.0,
            vel2gain: 0.0,
            vel2frequency: 0.0,
        }
    }
}

/// Direct-form-I biquad with per-channel state.
#[derive(Debug, Clone, Default)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    // [channel][tap]
    x: [[f32; 2]; 2],
    y: [[f32; 2]; 2],
}

impl Biquad {
    fn reset_state(&mut self) {
        self.x = [[0.0; 2]; 2];
        self.y = [[0.0; 2]; 2];
    }

    #[inline]
    fn tick(&mut self, channel: usize, input: f32) -> f32 {
        let x = &mut self.x[channel];
        let y = &mut self.y[channel];
        let out = self.b0 * input + self.b1 * x[0] + self.b2 * x[1] - self.a1 * y[0] - self.a2 * y[1];
        x[1] = x[0];
        x[0] = input;
        y[1] = y[0];
        y[0] = out;
        out
    }

    fn process(&mut self, channel: usize, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.tick(channel, *sample);
        }
    }

    fn set_lowpass_2p(&mut self, cutoff: f32, q: f32, sample_rate: f32) {
        let (w0, alpha) = Self::omega(cutoff, q, sample_rate);
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha;
        self.b0 = (1.0 - cos_w0) * 0.5 / a0;
        self.b1 = (1.0 - cos_w0) / a0;
        self.b2 = self.b0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    fn set_highpass_2p(&mut self, cutoff: f32, q: f32, sample_rate: f32) {
        let (w0, alpha) = Self::omega(cutoff, q, sample_rate);
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha;
        self.b0 = (1.0 + cos_w0) * 0.5 / a0;
        self.b1 = -(1.0 + cos_w0) / a0;
        self.b2 = self.b0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    fn set_bandpass_2p(&mut self, cutoff: f32, q: f32, sample_rate: f32) {
        let (w0, alpha) = Self::omega(cutoff, q, sample_rate);
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha;
        self.b0 = alpha / a0;
        self.b1 = 0.0;
        self.b2 = -alpha / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    fn set_bandreject_2p(&mut self, cutoff: f32, q: f32, sample_rate: f32) {
        let (w0, alpha) = Self::omega(cutoff, q, sample_rate);
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha;
        self.b0 = 1.0 / a0;
        self.b1 = -2.0 * cos_w0 / a0;
        self.b2 = 1.0 / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    fn set_onepole_lowpass(&mut self, cutoff: f32, sample_rate: f32) {
        let g = Self::onepole_gain(cutoff, sample_rate);
        self.b0 = g;
        self.b1 = 0.0;
        self.b2 = 0.0;
        self.a1 = g - 1.0;
        self.a2 = 0.0;
    }

    fn set_onepole_highpass(&mut self, cutoff: f32, sample_rate: f32) {
        let g = Self::onepole_gain(cutoff, sample_rate);
        self.b0 = 1.0 - g;
        self.b1 = -(1.0 - g);
        self.b2 = 0.0;
        self.a1 = g - 1.0;
        self.a2 = 0.0;
    }

    fn set_peaking(&mut self, frequency: f32, bandwidth_octaves: f32, gain_db: f32, sample_rate: f32) {
        let w0 = Self::clamp_w0(frequency, sample_rate);
        let sin_w0 = w0.sin();
        let cos_w0 = w0.cos();
        let a = 10.0f32.powf(gain_db / 40.0);
        let ln2_half = std::f32::consts::LN_2 / 2.0;
        let alpha = sin_w0 * (ln2_half * bandwidth_octaves * w0 / sin_w0).sinh();

        let a0 = 1.0 + alpha / a;
        self.b0 = (1.0 + alpha * a) / a0;
        self.b1 = -2.0 * cos_w0 / a0;
        self.b2 = (1.0 - alpha * a) / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha / a) / a0;
    }

    fn clamp_w0(cutoff: f32, sample_rate: f32) -> f32 {
        let nyquist = sample_rate * 0.5;
        let cutoff = cutoff.clamp(1.0, nyquist * 0.95);
        std::f32::consts::TAU * cutoff / sample_rate
    }

    fn omega(cutoff: f32, q: f32, sample_rate: f32) -> (f32, f32) {
        let w0 = Self::clamp_w0(cutoff, sample_rate);
        let alpha = w0.sin() / (2.0 * q.max(0.01));
        (w0, alpha)
    }

    fn onepole_gain(cutoff: f32, sample_rate: f32) -> f32 {
        let w0 = Self::clamp_w0(cutoff, sample_rate);
        1.0 - (-w0).exp()
    }
}

/// Resonance in dB to biquad Q, relative to the Butterworth baseline.
fn resonance_to_q(resonance_db: f32) -> f32 {
    std::f32::consts::FRAC_1_SQRT_2 * 10.0f32.powf(resonance_db / 20.0)
}

/// One filter slot of a voice.
#[derive(Debug, Clone, Default)]
pub struct FilterHolder {
    biquad: Biquad,
    sample_rate: f32,
    description: Option<FilterDescription>,
}

impl FilterHolder {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            biquad: Biquad::default(),
            sample_rate,
            description: None,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        if let Some(description) = self.description {
            self.apply(&description);
        }
    }

    /// Configure from a region description at note start. The cutoff tracks
    /// the key distance from the keycenter and the velocity, both in cents.
    pub fn setup(&mut self, description: &FilterDescription, key: u8, velocity: f32) {
        let mut tracked = *description;
        let key_offset = key as f32 - description.keycenter as f32;
        tracked.cutoff *= cents_factor(description.keytrack * key_offset);
        tracked.cutoff *= cents_factor(description.veltrack * velocity);

        self.apply(&tracked);
        self.description = Some(tracked);
        self.biquad.reset_state();
    }

    fn apply(&mut self, description: &FilterDescription) {
        let q = resonance_to_q(description.resonance);
        let sr = self.sample_rate;
        match description.kind {
            FilterKind::Lpf1p => self.biquad.set_onepole_lowpass(description.cutoff, sr),
            FilterKind::Hpf1p => self.biquad.set_onepole_highpass(description.cutoff, sr),
            FilterKind::Lpf2p => self.biquad.set_lowpass_2p(description.cutoff, q, sr),
            FilterKind::Hpf2p => self.biquad.set_highpass_2p(description.cutoff, q, sr),
            FilterKind::Bpf2p => self.biquad.set_bandpass_2p(description.cutoff, q, sr),
            FilterKind::Brf2p => self.biquad.set_bandreject_2p(description.cutoff, q, sr),
        }
    }

    pub fn process_mono(&mut self, buffer: &mut [f32]) {
        self.biquad.process(0, buffer);
    }

    pub fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.biquad.process(0, left);
        self.biquad.process(1, right);
    }

    pub fn reset(&mut self) {
        self.biquad.reset_state();
        self.description = None;
    }
}

/// One EQ slot of a voice (peaking band).
#[derive(Debug, Clone, Default)]
pub struct EqHolder {
    biquad: Biquad,
    sample_rate: f32,
    description: Option<EqDescription>,
}

impl EqHolder {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            biquad: Biquad::default(),
            sample_rate,
            description: None,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        if let Some(description) = self.description {
            self.apply(&description);
        }
    }

    pub fn setup(&mut self, description: &EqDescription, velocity: f32) {
        let mut tracked = *description;
        tracked.gain += description.vel2gain * velocity;
        tracked.frequency += description.vel2frequency * velocity;

        self.apply(&tracked);
        self.description = Some(tracked);
        self.biquad.reset_state();
    }

    fn apply(&mut self, description: &EqDescription) {
        self.biquad.set_peaking(
            description.frequency,
            description.bandwidth,
            description.gain,
            self.sample_rate,
        );
    }

    pub fn process_mono(&mut self, buffer: &mut [f32]) {
        self.biquad.process(0, buffer);
    }

    pub fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.biquad.process(0, left);
        self.biquad.process(1, right);
    }

    pub fn reset(&mut self) {
        self.biquad.reset_state();
        self.description = None;
    }
}
