//! Region: the resolved SFZ parameters a voice renders.
//!
//! Immutable while any voice holds it. Opcode defaults follow the SFZ
//! conventions; times are seconds, levels are normalized, pitch offsets are
//! cents.

use voce_dsp::{AdsrParams, EqDescription, FilterDescription};

use crate::rng::Rng;

/// Loop behavior of the sample path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    NoLoop,
    /// Play to the sample end regardless of note-off.
    OneShot,
    /// Loop for as long as the voice lives.
    Continuous,
    /// Loop while the note is held.
    Sustain,
}

/// How `off()` fades the voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffMode {
    /// Engine-default fast fade.
    #[default]
    Fast,
    /// Use the region's `off_time`.
    Time,
}

/// Shape of the CC crossfade response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossfadeCurve {
    /// Linear in gain.
    Gain,
    /// Equal-power (square-root) fades.
    #[default]
    Power,
}

/// One CC-driven crossfade range.
#[derive(Debug, Clone, Copy)]
pub struct CcRange {
    pub cc: u8,
    pub lo: f32,
    pub hi: f32,
}

impl CcRange {
    pub fn new(cc: u8, lo: f32, hi: f32) -> Self {
        Self { cc, lo, hi }
    }
}

/// Crossfade-in gain for a value against a range.
pub fn crossfade_in(range: &CcRange, value: f32, curve: CrossfadeCurve) -> f32 {
    let span = (range.hi - range.lo).max(f32::EPSILON);
    let x = ((value - range.lo) / span).clamp(0.0, 1.0);
    match curve {
        CrossfadeCurve::Gain => x,
        CrossfadeCurve::Power => x.sqrt(),
    }
}

/// Crossfade-out gain for a value against a range.
pub fn crossfade_out(range: &CcRange, value: f32, curve: CrossfadeCurve) -> f32 {
    let span = (range.hi - range.lo).max(f32::EPSILON);
    let x = 1.0 - ((value - range.lo) / span).clamp(0.0, 1.0);
    match curve {
        CrossfadeCurve::Gain => x,
        CrossfadeCurve::Power => x.sqrt(),
    }
}

/// The resolved region.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: u32,
    /// Sample file id, or a `*generator` name for the oscillator path.
    pub sample_id: String,
    pub disabled: bool,
    /// True when the decoded sample has two channels.
    pub stereo: bool,

    // Sample playback
    pub offset: u64,
    pub offset_random: u64,
    /// Last addressable frame of the sample, in un-oversampled frames.
    pub sample_end: u64,
    pub loop_mode: LoopMode,
    pub loop_start: u64,
    /// Inclusive loop end frame.
    pub loop_end: u64,
    /// Seconds of silence before the sample starts.
    pub delay: f32,

    // Pitch
    pub pitch_keycenter: u8,
    /// Cents per key away from the keycenter.
    pub pitch_keytrack: f32,
    /// Cents added at full velocity.
    pub pitch_veltrack: f32,
    /// Half-range of the random cents applied at start.
    pub pitch_random: f32,
    /// Fixed tune in cents.
    pub tune: f32,
    /// Transpose in semitones.
    pub transpose: i32,
    /// Cents at full upward bend.
    pub bend_up: f32,
    /// Cents at full downward bend (negative).
    pub bend_down: f32,
    /// Bend quantization step in cents; 1 or less disables quantization.
    pub bend_step: f32,
    /// Bend smoother time constant in seconds.
    pub bend_smooth: f32,

    // Amplitude
    /// Volume in dB.
    pub volume: f32,
    /// Linear amplitude multiplier.
    pub amplitude: f32,
    /// Velocity tracking amount in [-1, 1].
    pub amp_veltrack: f32,
    /// Half-range of the random dB applied at start.
    pub amp_random: f32,
    pub pan: f32,
    pub width: f32,
    pub position: f32,

    // Envelopes
    pub amplitude_eg: AdsrParams,
    pub pitch_eg: Option<AdsrParams>,
    pub filter_eg: Option<AdsrParams>,

    // Filters and EQs
    pub filters: Vec<FilterDescription>,
    pub equalizers: Vec<EqDescription>,

    // Group lifecycle
    pub group: i64,
    pub off_by: Option<i64>,
    pub off_mode: OffMode,
    pub off_time: f32,

    // Sustain pedal
    pub check_sustain: bool,
    pub sustain_cc: u8,
    pub sustain_threshold: f32,

    // CC crossfades
    pub crossfade_cc_in: Vec<CcRange>,
    pub crossfade_cc_out: Vec<CcRange>,
    pub crossfade_cc_curve: CrossfadeCurve,

    // Oscillator
    pub oscillator: bool,
    /// Start phase in cycles; negative requests a random phase per start.
    pub oscillator_phase: f32,
    pub oscillator_quality: Option<i32>,
    /// 0 ring modulation, 1 phase modulation (unimplemented, treated as
    /// FM), 2 frequency modulation.
    pub oscillator_mode: i32,
    /// Number of unison oscillators; below 3 with mode 0 plays a single
    /// oscillator, otherwise two-oscillator modulation.
    pub oscillator_multi: i32,
    /// Unison or modulator detune in cents.
    pub oscillator_detune: f32,
    pub oscillator_mod_depth: f32,

    pub sample_quality: Option<i32>,
}

impl Region {
    pub fn new(id: u32, sample_id: impl Into<String>) -> Self {
        Self {
            id,
            sample_id: sample_id.into(),
            disabled: false,
            stereo: false,
            offset: 0,
            offset_random: 0,
            sample_end: u64::MAX,
            loop_mode: LoopMode::NoLoop,
            loop_start: 0,
            loop_end: 0,
            delay: 0.0,
            pitch_keycenter: 60,
            pitch_keytrack: 100.0,
            pitch_veltrack: 0.0,
            pitch_random: 0.0,
            tune: 0.0,
            transpose: 0,
            bend_up: 200.0,
            bend_down: -200.0,
            bend_step: 1.0,
            bend_smooth: 0.0,
            volume: 0.0,
            amplitude: 1.0,
            amp_veltrack: 1.0,
            amp_random: 0.0,
            pan: 0.0,
            width: 1.0,
            position: 0.0,
            amplitude_eg: AdsrParams::default(),
            pitch_eg: None,
            filter_eg: None,
            filters: Vec::new(),
            equalizers: Vec::new(),
            group: 0,
            off_by: None,
            off_mode: OffMode::Fast,
            off_time: 0.006,
            check_sustain: true,
            sustain_cc: 64,
            sustain_threshold: voce_core::config::DEFAULT_SUSTAIN_THRESHOLD,
            crossfade_cc_in: Vec::new(),
            crossfade_cc_out: Vec::new(),
            crossfade_cc_curve: CrossfadeCurve::default(),
            oscillator: false,
            oscillator_phase: 0.0,
            oscillator_quality: None,
            oscillator_mode: 0,
            oscillator_multi: 1,
            oscillator_detune: 0.0,
            oscillator_mod_depth: 1.0,
            sample_quality: None,
        }
    }

    /// True when this region renders through the oscillator path.
    #[inline]
    pub fn is_oscillator(&self) -> bool {
        self.oscillator || self.is_generator()
    }

    /// True for `*`-prefixed builtin generators.
    #[inline]
    pub fn is_generator(&self) -> bool {
        self.sample_id.starts_with('*')
    }

    #[inline]
    pub fn is_stereo(&self) -> bool {
        self.stereo
    }

    #[inline]
    pub fn should_loop(&self) -> bool {
        matches!(self.loop_mode, LoopMode::Continuous | LoopMode::Sustain)
    }

    #[inline]
    pub fn loop_start(&self, oversampling: u32) -> u64 {
        self.loop_start * oversampling as u64
    }

    #[inline]
    pub fn loop_end(&self, oversampling: u32) -> u64 {
        self.loop_end * oversampling as u64
    }

    /// End frame the region promises, scaled for the oversampled source.
    #[inline]
    pub fn true_sample_end(&self, oversampling: u32) -> u64 {
        self.sample_end.saturating_mul(oversampling as u64)
    }

    /// Start offset in source frames, including the random part.
    pub fn start_offset(&self, oversampling: u32, rng: &mut Rng) -> u64 {
        let random = if self.offset_random > 0 {
            (rng.next_f32() * self.offset_random as f32) as u64
        } else {
            0
        };
        (self.offset + random) * oversampling as u64
    }

    /// Base pitch ratio from key position, velocity, and the random spread.
    ///
    /// `key` is a fractional 12-TET key number (already retuned).
    pub fn base_pitch_variation(&self, key: f32, velocity: f32, rng: &mut Rng) -> f32 {
        let mut cents = self.pitch_keytrack * (key - self.pitch_keycenter as f32);
        cents += self.tune;
        cents += 100.0 * self.transpose as f32;
        cents += self.pitch_veltrack * velocity;
        if self.pitch_random > 0.0 {
            cents += rng.next_range(-self.pitch_random, self.pitch_random);
        }
        voce_core::cents_factor(cents)
    }

    /// Base volume in dB, including the random spread.
    pub fn base_volume_db(&self, _note: u8, rng: &mut Rng) -> f32 {
        let mut db = self.volume;
        if self.amp_random > 0.0 {
            db += rng.next_range(-self.amp_random, self.amp_random);
        }
        db
    }

    /// Linear amplitude multiplier.
    #[inline]
    pub fn base_gain(&self) -> f32 {
        self.amplitude
    }

    /// Velocity response of the amplifier. Positive tracking follows the
    /// square of the velocity, negative tracking inverts it.
    pub fn note_gain(&self, _note: u8, velocity: f32) -> f32 {
        let t = self.amp_veltrack.clamp(-1.0, 1.0);
        if t >= 0.0 {
            (1.0 - t) + t * velocity * velocity
        } else {
            let inv = 1.0 - velocity;
            (1.0 + t) - t * inv * inv
        }
    }

    /// Bend position in [-1, 1] to cents.
    #[inline]
    pub fn bend_in_cents(&self, bend: f32) -> f32 {
        if bend >= 0.0 {
            bend * self.bend_up
        } else {
            -bend * self.bend_down
        }
    }

    /// Oscillator start phase in cycles; negative opcode values request a
    /// fresh random phase.
    pub fn phase(&self, rng: &mut Rng) -> f32 {
        if self.oscillator_phase >= 0.0 {
            self.oscillator_phase - self.oscillator_phase.floor()
        } else {
            rng.next_f32()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> Rng {
        Rng::new(1)
    }

    #[test]
    fn test_keytrack_pitch() {
        let region = Region::new(0, "a.wav");
        // One octave above the keycenter doubles the ratio.
        let ratio = region.base_pitch_variation(72.0, 0.0, &mut rng());
        assert!((ratio - 2.0).abs() < 1e-4, "got {}", ratio);

        let down = region.base_pitch_variation(48.0, 0.0, &mut rng());
        assert!((down - 0.5).abs() < 1e-4, "got {}", down);
    }

    #[test]
    fn test_transpose_and_tune() {
        let mut region = Region::new(0, "a.wav");
        region.transpose = 12;
        region.tune = -1200.0;
        let ratio = region.base_pitch_variation(60.0, 0.0, &mut rng());
        assert!((ratio - 1.0).abs() < 1e-4, "transpose and tune cancel: {}", ratio);
    }

    #[test]
    fn test_pitch_random_bounded() {
        let mut region = Region::new(0, "a.wav");
        region.pitch_random = 50.0;
        let mut r = rng();
        for _ in 0..100 {
            let ratio = region.base_pitch_variation(60.0, 0.0, &mut r);
            let cents = 1200.0 * ratio.log2();
            assert!(cents.abs() <= 50.0 + 1e-3);
        }
    }

    #[test]
    fn test_note_gain_full_veltrack() {
        let region = Region::new(0, "a.wav");
        assert!((region.note_gain(60, 1.0) - 1.0).abs() < 1e-6);
        assert!((region.note_gain(60, 0.5) - 0.25).abs() < 1e-6);
        assert!(region.note_gain(60, 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_note_gain_no_veltrack() {
        let mut region = Region::new(0, "a.wav");
        region.amp_veltrack = 0.0;
        assert!((region.note_gain(60, 0.1) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bend_cents_asymmetric() {
        let mut region = Region::new(0, "a.wav");
        region.bend_up = 200.0;
        region.bend_down = -1200.0;
        assert!((region.bend_in_cents(1.0) - 200.0).abs() < 1e-6);
        assert!((region.bend_in_cents(-1.0) - -1200.0).abs() < 1e-6);
        assert_eq!(region.bend_in_cents(0.0), 0.0);
    }

    #[test]
    fn test_generator_detection() {
        assert!(Region::new(0, "*sine").is_generator());
        assert!(Region::new(0, "*sine").is_oscillator());
        assert!(!Region::new(0, "piano.wav").is_oscillator());

        let mut wave = Region::new(0, "single_cycle.wav");
        wave.oscillator = true;
        assert!(wave.is_oscillator());
        assert!(!wave.is_generator());
    }

    #[test]
    fn test_loop_points_scale_with_oversampling() {
        let mut region = Region::new(0, "a.wav");
        region.loop_start = 100;
        region.loop_end = 200;
        region.sample_end = 300;
        assert_eq!(region.loop_start(2), 200);
        assert_eq!(region.loop_end(2), 400);
        assert_eq!(region.true_sample_end(2), 600);
    }

    #[test]
    fn test_crossfade_curves() {
        let range = CcRange::new(1, 0.0, 1.0);

        assert_eq!(crossfade_in(&range, 0.0, CrossfadeCurve::Gain), 0.0);
        assert_eq!(crossfade_in(&range, 1.0, CrossfadeCurve::Gain), 1.0);
        assert!((crossfade_in(&range, 0.25, CrossfadeCurve::Power) - 0.5).abs() < 1e-6);

        assert_eq!(crossfade_out(&range, 0.0, CrossfadeCurve::Gain), 1.0);
        assert_eq!(crossfade_out(&range, 1.0, CrossfadeCurve::Gain), 0.0);
        // Equal power: in^2 + out^2 == 1 at any point.
        let v = 0.3;
        let i = crossfade_in(&range, v, CrossfadeCurve::Power);
        let o = crossfade_out(&range, v, CrossfadeCurve::Power);
        assert!((i * i + o * o - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_crossfade_clamps_outside_range() {
        let range = CcRange::new(1, 0.2, 0.8);
        assert_eq!(crossfade_in(&range, 0.1, CrossfadeCurve::Gain), 0.0);
        assert_eq!(crossfade_in(&range, 0.9, CrossfadeCurve::Gain), 1.0);
    }

    #[test]
    fn test_phase_wraps_and_randomizes() {
        let mut region = Region::new(0, "*saw");
        region.oscillator_phase = 1.25;
        assert!((region.phase(&mut rng()) - 0.25).abs() < 1e-6);

        region.oscillator_phase = -1.0;
        let mut r = rng();
        let a = region.phase(&mut r);
        let b = region.phase(&mut r);
        assert!((0.0..1.0).contains(&a));
        assert_ne!(a, b);
    }
}
