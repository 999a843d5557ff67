//! Amplifier envelope: delay, attack, hold, decay, sustain, release.
//!
//! The release can be scheduled at any frame offset inside the next block,
//! which is what gives note-offs their sample accuracy. A zero-length
//! release drops the envelope to the floor within one sample; the voice
//! uses that for end-of-sample clamps.

use voce_core::config::EG_RELEASE_FLOOR;

/// Envelope timing in seconds and levels in [0, 1], before velocity
/// tracking.
#[derive(Debug, Clone, Copy)]
pub struct AdsrParams {
    pub delay: f32,
    pub start: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    /// Seconds added to attack at full velocity.
    pub vel2attack: f32,
    /// Seconds added to decay at full velocity.
    pub vel2decay: f32,
    /// Seconds added to release at full velocity.
    pub vel2release: f32,
    /// Level added to sustain at full velocity.
    pub vel2sustain: f32,
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self {
            delay: 0.0,
            start: 0.0,
            attack: 0.0,
            hold: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: 0.0,
            vel2attack: 0.0,
            vel2decay: 0.0,
            vel2release: 0.0,
            vel2sustain: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    Done,
}

/// The envelope itself. One per voice for amplitude; optional extra
/// instances drive pitch and filter when enabled.
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    stage: Stage,
    sample_rate: f32,
    current: f32,
    start: f32,
    sustain: f32,
    delay_remaining: i64,
    attack_remaining: i64,
    attack_step: f32,
    hold_remaining: i64,
    decay_coeff: f32,
    release_frames: i64,
    release_coeff: f32,
    /// Release scheduled at this frame offset of the next `get_block`.
    pending_release: Option<i64>,
    released: bool,
}

impl AdsrEnvelope {
    pub fn new() -> Self {
        Self {
            stage: Stage::Done,
            sample_rate: voce_core::config::DEFAULT_SAMPLE_RATE,
            current: 0.0,
            start: 0.0,
            sustain: 1.0,
            delay_remaining: 0,
            attack_remaining: 0,
            attack_step: 0.0,
            hold_remaining: 0,
            decay_coeff: 0.0,
            release_frames: 0,
            release_coeff: 0.0,
            pending_release: None,
            released: false,
        }
    }

    /// Arm the envelope for a new note. `event_delay` is the trigger offset
    /// in frames; it is absorbed into the delay stage.
    pub fn trigger(
        &mut self,
        params: &AdsrParams,
        event_delay: i64,
        velocity: f32,
        sample_rate: f32,
    ) {
        debug_assert!((0.0..=1.0).contains(&velocity));
        self.sample_rate = sample_rate;

        let to_frames = |seconds: f32| ((seconds.max(0.0)) * sample_rate) as i64;

        let attack = params.attack + params.vel2attack * velocity;
        let decay = params.decay + params.vel2decay * velocity;
        let release = params.release + params.vel2release * velocity;

        self.delay_remaining = event_delay.max(0) + to_frames(params.delay);
        self.attack_remaining = to_frames(attack);
        self.attack_step = if self.attack_remaining > 0 {
            (1.0 - params.start) / self.attack_remaining as f32
        } else {
            0.0
        };
        self.hold_remaining = to_frames(params.hold);
        self.sustain = (params.sustain + params.vel2sustain * velocity).clamp(0.0, 1.0);
        self.decay_coeff = Self::fall_coeff(to_frames(decay));
        self.set_release_frames(to_frames(release));

        self.start = params.start.clamp(0.0, 1.0);
        self.current = self.start;
        self.stage = Stage::Delay;
        self.pending_release = None;
        self.released = false;
    }

    /// Coefficient such that a unit level falls to the floor over `frames`.
    fn fall_coeff(frames: i64) -> f32 {
        if frames <= 0 {
            0.0
        } else {
            (EG_RELEASE_FLOOR.ln() / frames as f32).exp()
        }
    }

    fn set_release_frames(&mut self, frames: i64) {
        self.release_frames = frames.max(0);
        self.release_coeff = Self::fall_coeff(self.release_frames);
    }

    /// Replace the release time; used by `off()` and end-of-sample clamps.
    pub fn set_release_time(&mut self, seconds: f32) {
        let frames = (seconds.max(0.0) * self.sample_rate) as i64;
        self.set_release_frames(frames);
    }

    /// Schedule the release at `delay` frames into the next `get_block`.
    pub fn start_release(&mut self, delay: i64) {
        self.released = true;
        self.pending_release = Some(delay.max(0));
    }

    /// Frames left before the envelope leaves its delay stage.
    pub fn remaining_delay(&self) -> i64 {
        if self.stage == Stage::Delay {
            self.delay_remaining
        } else {
            0
        }
    }

    /// False once the envelope has fully faded out.
    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.stage != Stage::Done
    }

    /// True from the moment a release has been requested.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }

    #[inline]
    fn enter_release(&mut self) {
        self.stage = Stage::Release;
        if self.release_frames <= 0 {
            self.current = 0.0;
            self.stage = Stage::Done;
        }
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        match self.stage {
            Stage::Delay => {
                if self.delay_remaining > 0 {
                    self.delay_remaining -= 1;
                    return 0.0;
                }
                self.stage = Stage::Attack;
                self.next_sample()
            }
            Stage::Attack => {
                if self.attack_remaining > 0 {
                    self.attack_remaining -= 1;
                    self.current += self.attack_step;
                    return self.current.min(1.0);
                }
                self.current = 1.0;
                self.stage = Stage::Hold;
                self.next_sample()
            }
            Stage::Hold => {
                if self.hold_remaining > 0 {
                    self.hold_remaining -= 1;
                    return 1.0;
                }
                self.stage = Stage::Decay;
                self.next_sample()
            }
            Stage::Decay => {
                self.current = self.sustain + (self.current - self.sustain) * self.decay_coeff;
                if self.current - self.sustain < EG_RELEASE_FLOOR {
                    self.current = self.sustain;
                    self.stage = if self.sustain < EG_RELEASE_FLOOR {
                        Stage::Done
                    } else {
                        Stage::Sustain
                    };
                }
                self.current
            }
            Stage::Sustain => self.sustain,
            Stage::Release => {
                self.current *= self.release_coeff;
                if self.current < EG_RELEASE_FLOOR {
                    self.current = 0.0;
                    self.stage = Stage::Done;
                }
                self.current
            }
            Stage::Done => 0.0,
        }
    }

    /// Render the next block of envelope values.
    pub fn get_block(&mut self, out: &mut [f32]) {
        let release_at = self.pending_release.take();
        for (i, y) in out.iter_mut().enumerate() {
            if let Some(at) = release_at {
                if i as i64 >= at && self.stage != Stage::Release && self.stage != Stage::Done {
                    self.enter_release();
                }
            }
            *y = self.next_sample();
        }
        // A release aimed past this block carries into the next one.
        if let Some(at) = release_at {
            let remaining = at - out.len() as i64;
            if remaining > 0 && self.stage != Stage::Release && self.stage != Stage::Done {
                self.pending_release = Some(remaining);
            }
        }
    }
}

impl Default for AdsrEnvelope {
    fn default() -> Self {
        Self::new()
    }
}
