//! The per-voice synthesis engine.
//!
//! One `Voice` renders one triggered region inside the realtime callback.
//! Per block it: consumes any initial delay, fills raw audio (sample reader
//! or oscillator generator), then runs the amplitude, pan, and filter
//! stages, feeds the power follower, and advances its age. Event intake
//! (`register_*`) is sample-accurate through frame delays relative to the
//! block start.
//!
//! Nothing here allocates, locks, or performs I/O while rendering; scratch
//! memory comes from the shared pool and a failed checkout skips the stage
//! for the block.

use std::sync::Arc;

use voce_core::{
    cents_factor, config, db_to_mag, midi_note_frequency, Error, Result, Smoother, StereoBlock,
};
use voce_dsp::{
    bend_envelope, linear_envelope, pan, width, AdsrEnvelope, EqHolder, FilterHolder, FlexEnvelope,
    Interpolator, PowerFollower, VoiceLfo, WavetableOscillator, STEREO_PAN_COMPENSATION,
};

use crate::events::{TriggerEvent, TriggerEventKind};
use crate::file_pool::SamplePromise;
use crate::mod_matrix::{ModId, ModKey, ModMatrix, ModTarget};
use crate::region::{crossfade_in, crossfade_out, LoopMode, OffMode, Region};
use crate::resources::Resources;

const OSCILLATORS_PER_VOICE: usize = config::OSCILLATORS_PER_VOICE;

/// Amplitude bounds of the builtin noise generators.
const NOISE_BOUNDS: f32 = 0.25;

/// Lifecycle of a voice slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Free for allocation; no region, no promise.
    #[default]
    Idle,
    /// Rendering, possibly already releasing.
    Playing,
    /// Envelope finished; waiting for the manager to `reset`.
    CleanMeUp,
}

/// Observer notified on every state switch.
pub trait StateListener: Send + Sync {
    fn on_voice_state_changed(&self, voice_id: u32, state: VoiceState);
}

/// One polyphonic voice slot.
pub struct Voice {
    id: u32,
    state: VoiceState,
    listener: Option<Arc<dyn StateListener>>,

    region: Option<Arc<Region>>,
    promise: Option<SamplePromise>,
    trigger_event: TriggerEvent,

    sample_rate: f32,
    samples_per_block: usize,

    speed_ratio: f32,
    pitch_ratio: f32,
    base_volume_db: f32,
    base_gain: f32,
    base_frequency: f32,
    bend_step_cents: f32,

    source_position: i64,
    float_position_offset: f32,
    initial_delay: i64,
    trigger_delay: Option<i64>,
    age: i64,
    note_is_off: bool,

    gain_smoother: Smoother,
    bend_smoother: Smoother,
    xfade_smoother: Smoother,

    eg_amplitude: AdsrEnvelope,
    eg_pitch: Option<Box<AdsrEnvelope>>,
    eg_filter: Option<Box<AdsrEnvelope>>,

    wave_oscillators: [WavetableOscillator; OSCILLATORS_PER_VOICE],
    wave_unison_size: usize,
    wave_detune_ratio: [f32; OSCILLATORS_PER_VOICE],
    wave_left_gain: [f32; OSCILLATORS_PER_VOICE],
    wave_right_gain: [f32; OSCILLATORS_PER_VOICE],

    filters: Vec<FilterHolder>,
    equalizers: Vec<EqHolder>,
    lfos: Vec<VoiceLfo>,
    flex_egs: Vec<FlexEnvelope>,

    power_follower: PowerFollower,
    noise_rng: crate::rng::Rng,

    amplitude_target: Option<ModTarget>,
    volume_target: Option<ModTarget>,
    pan_target: Option<ModTarget>,
    position_target: Option<ModTarget>,
    width_target: Option<ModTarget>,
    pitch_target: Option<ModTarget>,
    oscillator_detune_target: Option<ModTarget>,
    oscillator_mod_depth_target: Option<ModTarget>,

    sister_prev: u32,
    sister_next: u32,
}

impl Voice {
    /// Construct one voice slot. `id` doubles as the voice's index in the
    /// manager's slice; sister links start pointing at itself.
    pub fn new(id: u32) -> Self {
        let sample_rate = config::DEFAULT_SAMPLE_RATE;

        let mut gain_smoother = Smoother::new();
        gain_smoother.set_smoothing(config::GAIN_SMOOTHING_SECONDS, sample_rate);
        let mut xfade_smoother = Smoother::new();
        xfade_smoother.set_smoothing(config::XFADE_SMOOTHING_SECONDS, sample_rate);

        let mut wave_oscillators: [WavetableOscillator; OSCILLATORS_PER_VOICE] =
            Default::default();
        for osc in wave_oscillators.iter_mut() {
            osc.init(sample_rate);
        }

        Self {
            id,
            state: VoiceState::Idle,
            listener: None,
            region: None,
            promise: None,
            trigger_event: TriggerEvent::default(),
            sample_rate,
            samples_per_block: config::DEFAULT_BLOCK_SIZE,
            speed_ratio: 1.0,
            pitch_ratio: 1.0,
            base_volume_db: 0.0,
            base_gain: 1.0,
            base_frequency: 440.0,
            bend_step_cents: 1.0,
            source_position: 0,
            float_position_offset: 0.0,
            initial_delay: 0,
            trigger_delay: None,
            age: 0,
            note_is_off: false,
            gain_smoother,
            bend_smoother: Smoother::new(),
            xfade_smoother,
            eg_amplitude: AdsrEnvelope::new(),
            eg_pitch: None,
            eg_filter: None,
            wave_oscillators,
            wave_unison_size: 1,
            wave_detune_ratio: [1.0; OSCILLATORS_PER_VOICE],
            wave_left_gain: [1.0; OSCILLATORS_PER_VOICE],
            wave_right_gain: [1.0; OSCILLATORS_PER_VOICE],
            filters: (0..config::FILTERS_PER_VOICE)
                .map(|_| FilterHolder::new(sample_rate))
                .collect(),
            equalizers: (0..config::EQS_PER_VOICE)
                .map(|_| EqHolder::new(sample_rate))
                .collect(),
            lfos: Vec::new(),
            flex_egs: Vec::new(),
            power_follower: PowerFollower::new(),
            noise_rng: crate::rng::Rng::new(id.wrapping_mul(2654435761).wrapping_add(1)),
            amplitude_target: None,
            volume_target: None,
            pan_target: None,
            position_target: None,
            width_target: None,
            pitch_target: None,
            oscillator_detune_target: None,
            oscillator_mod_depth_target: None,
            sister_prev: id,
            sister_next: id,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start rendering `region` at `delay` frames into the next block.
    ///
    /// A disabled region leaves the voice idle. A region whose sample
    /// promise cannot be acquired moves straight to `CleanMeUp`.
    pub fn start_voice(
        &mut self,
        resources: &mut Resources,
        region: &Arc<Region>,
        delay: i64,
        event: TriggerEvent,
    ) {
        debug_assert!((0.0..=1.0).contains(&event.value));

        if region.disabled {
            return;
        }
        self.region = Some(Arc::clone(region));

        self.trigger_event = event;
        if self.trigger_event.kind == TriggerEventKind::Cc {
            self.trigger_event.number = region.pitch_keycenter;
        }
        let number = self.trigger_event.number;
        let value = self.trigger_event.value;

        self.switch_state(VoiceState::Playing);

        debug_assert!(delay >= 0);
        let delay = delay.max(0);

        if region.is_oscillator() {
            let wave = if !region.is_generator() {
                resources.wave_pool.get_file_wave(&region.sample_id)
            } else {
                match region.sample_id.as_str() {
                    "*sine" => Some(resources.wave_pool.get_wave_sin()),
                    "*triangle" | "*tri" => Some(resources.wave_pool.get_wave_triangle()),
                    "*square" => Some(resources.wave_pool.get_wave_square()),
                    "*saw" => Some(resources.wave_pool.get_wave_saw()),
                    // *silence and the noise generators need no table.
                    _ => None,
                }
            };
            let phase = region.phase(&mut resources.rng);
            let quality = region
                .oscillator_quality
                .unwrap_or_else(|| resources.synth_config.current_oscillator_quality());
            for osc in self.wave_oscillators.iter_mut() {
                osc.set_wavetable(wave.clone());
                osc.set_phase(phase);
                osc.set_quality(quality);
            }
            self.setup_oscillator_unison(region);
        } else {
            match resources.file_pool.get_file_promise(&region.sample_id) {
                Some(promise) => {
                    self.speed_ratio = (promise.sample_rate() / self.sample_rate as f64) as f32;
                    self.source_position =
                        region.start_offset(promise.oversampling_factor(), &mut resources.rng)
                            as i64;
                    self.float_position_offset = 0.0;
                    self.promise = Some(promise);
                }
                None => {
                    self.switch_state(VoiceState::CleanMeUp);
                    return;
                }
            }
        }

        // Scala retuning reconverted into a fractional 12-TET key number.
        let retuned = resources.tuning.key_fractional_12tet(number);

        self.pitch_ratio = region.base_pitch_variation(retuned, value, &mut resources.rng);
        if let Some(stretch) = &resources.stretch {
            self.pitch_ratio *= stretch.ratio_for_fractional_key(retuned);
        }

        self.base_volume_db = region.base_volume_db(number, &mut resources.rng);
        self.base_gain = region.base_gain();
        if self.trigger_event.kind != TriggerEventKind::Cc {
            self.base_gain *= region.note_gain(number, value);
        }
        self.gain_smoother.reset(0.0);
        self.reset_crossfades(resources);

        for i in 0..region.filters.len().min(self.filters.len()) {
            self.filters[i].setup(&region.filters[i], number, value);
        }
        for i in 0..region.equalizers.len().min(self.equalizers.len()) {
            self.equalizers[i].setup(&region.equalizers[i], value);
        }

        self.trigger_delay = Some(delay);
        self.initial_delay = delay + (region.delay * self.sample_rate) as i64;
        self.base_frequency = resources.tuning.frequency_of_key(number);
        self.bend_step_cents = region.bend_step;
        self.bend_smoother
            .set_smoothing(region.bend_smooth, self.sample_rate);
        self.bend_smoother
            .reset(cents_factor(region.bend_in_cents(resources.midi_state.pitch_bend())));
        self.note_is_off = false;

        self.eg_amplitude
            .trigger(&region.amplitude_eg, delay, value, self.sample_rate);
        if let (Some(eg), Some(params)) = (self.eg_pitch.as_deref_mut(), region.pitch_eg.as_ref())
        {
            eg.trigger(params, delay, value, self.sample_rate);
        }
        if let (Some(eg), Some(params)) = (self.eg_filter.as_deref_mut(), region.filter_eg.as_ref())
        {
            eg.trigger(params, delay, value, self.sample_rate);
        }
        for lfo in self.lfos.iter_mut() {
            lfo.start(delay);
        }
        for flex in self.flex_egs.iter_mut() {
            flex.start(delay);
        }

        resources.mod_matrix.init_voice(self.id, region.id, delay);
        self.save_modulation_targets(region, &resources.mod_matrix);
    }

    /// Begin the release phase at `delay` frames into the next block. If
    /// the envelope has not yet left its pre-attack delay, the note never
    /// became audible and the voice jumps straight to cleanup.
    pub fn release(&mut self, resources: &mut Resources, delay: i64) {
        if self.state != VoiceState::Playing {
            return;
        }

        if self.eg_amplitude.remaining_delay() > delay {
            self.switch_state(VoiceState::CleanMeUp);
        } else {
            self.eg_amplitude.start_release(delay);
        }

        if let Some(region) = &self.region {
            resources.mod_matrix.release_voice(self.id, region.id, delay);
        }
        for flex in self.flex_egs.iter_mut() {
            flex.release(delay);
        }
    }

    /// Forced fast release, honoring the region's off mode.
    pub fn off(&mut self, resources: &mut Resources, delay: i64) {
        if let Some(region) = self.region.clone() {
            match region.off_mode {
                OffMode::Fast => self
                    .eg_amplitude
                    .set_release_time(config::OFF_TIME_SECONDS),
                OffMode::Time => self.eg_amplitude.set_release_time(region.off_time),
            }
        }
        self.release(resources, delay);
    }

    /// Return the voice to the pool. Idempotent. The manager must unlink
    /// the voice from its sister ring first ([`crate::ring::unlink`]
    /// patches the neighbors); this resets only the voice's own links.
    pub fn reset(&mut self) {
        self.switch_state(VoiceState::Idle);
        self.region = None;
        self.promise = None;
        self.source_position = 0;
        self.float_position_offset = 0.0;
        self.initial_delay = 0;
        self.trigger_delay = None;
        self.age = 0;
        self.note_is_off = false;

        self.power_follower.clear();
        for filter in self.filters.iter_mut() {
            filter.reset();
        }
        for eq in self.equalizers.iter_mut() {
            eq.reset();
        }
        self.reset_smoothers();

        self.sister_prev = self.id;
        self.sister_next = self.id;
    }

    fn reset_smoothers(&mut self) {
        self.bend_smoother.reset(1.0);
        self.gain_smoother.reset(0.0);
    }

    fn switch_state(&mut self, new_state: VoiceState) {
        if new_state != self.state {
            self.state = new_state;
            if let Some(listener) = &self.listener {
                listener.on_voice_state_changed(self.id, new_state);
            }
        }
    }

    pub fn set_state_listener(&mut self, listener: Option<Arc<dyn StateListener>>) {
        self.listener = listener;
    }

    // ------------------------------------------------------------------
    // Event intake
    // ------------------------------------------------------------------

    pub fn register_note_off(
        &mut self,
        resources: &mut Resources,
        delay: i64,
        note: u8,
        velocity: f32,
    ) {
        debug_assert!((0.0..=1.0).contains(&velocity));
        let _ = velocity;

        let Some(region) = self.region.clone() else {
            return;
        };
        if self.state != VoiceState::Playing {
            return;
        }

        if self.trigger_event.number == note && self.trigger_event.kind == TriggerEventKind::NoteOn
        {
            self.note_is_off = true;

            if region.loop_mode == LoopMode::OneShot {
                return;
            }

            if !region.check_sustain
                || resources.midi_state.cc_value(region.sustain_cc) < region.sustain_threshold
            {
                self.release(resources, delay);
            }
        }
    }

    pub fn register_cc(&mut self, resources: &mut Resources, delay: i64, cc: u8, value: f32) {
        debug_assert!((0.0..=1.0).contains(&value));

        let Some(region) = self.region.clone() else {
            return;
        };
        if self.state != VoiceState::Playing {
            return;
        }

        if region.check_sustain
            && self.note_is_off
            && cc == region.sustain_cc
            && value < region.sustain_threshold
        {
            self.release(resources, delay);
        }
    }

    /// Pitch is re-read from the MIDI state during block assembly; the
    /// event only needs to reach that state.
    pub fn register_pitch_wheel(&mut self, _delay: i64, _value: f32) {}

    pub fn register_aftertouch(&mut self, _delay: i64, _value: f32) {}

    pub fn register_tempo(&mut self, _delay: i64, _seconds_per_quarter: f32) {}

    /// Kill this voice if `other` (a newly triggered region) silences its
    /// group.
    pub fn check_off_group(
        &mut self,
        resources: &mut Resources,
        other: &Region,
        delay: i64,
        note: u8,
    ) -> bool {
        let Some(region) = self.region.clone() else {
            return false;
        };

        if self.trigger_event.kind == TriggerEventKind::NoteOn
            && region.off_by == Some(other.group)
            && (region.group != other.group || note != self.trigger_event.number)
        {
            self.off(resources, delay);
            return true;
        }

        false
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Render the next block into `buffer`. The buffer is cleared first;
    /// a voice without a region stays silent.
    pub fn render_block(&mut self, resources: &Resources, buffer: &mut StereoBlock<'_>) {
        debug_assert!(buffer.frames() <= self.samples_per_block);
        buffer.fill(0.0);

        let Some(region) = self.region.clone() else {
            return;
        };

        let frames = buffer.frames();
        let delay = (self.initial_delay.max(0) as usize).min(frames);
        self.initial_delay -= delay as i64;

        {
            let mut delayed = buffer.tail_mut(delay);
            if region.is_oscillator() {
                self.fill_with_generator(resources, &mut delayed);
            } else {
                self.fill_with_data(resources, &mut delayed, delay);
            }
        }

        if region.is_stereo() {
            self.amp_stage_stereo(resources, buffer);
            self.pan_stage_stereo(resources, buffer);
            self.filter_stage_stereo(buffer);
        } else {
            self.amp_stage_mono(resources, buffer);
            self.filter_stage_mono(buffer);
            self.pan_stage_mono(resources, buffer);
        }

        if !self.eg_amplitude.is_smoothing() {
            self.switch_state(VoiceState::CleanMeUp);
        }

        self.power_follower.process(buffer);

        self.age += frames as i64;
        if let Some(trigger_delay) = self.trigger_delay.take() {
            // Age restarts at the trigger sample; it never goes positive
            // before the trigger has passed.
            self.age = (self.age - trigger_delay).min(0);
        }

        debug_assert!(!buffer.has_nan_inf());
    }

    // ------------------------------------------------------------------
    // Pitch assembly
    // ------------------------------------------------------------------

    /// Multiply the per-frame pitch-ratio span in place by the bend
    /// envelope and the pitch modulation.
    fn pitch_envelope(&mut self, resources: &Resources, pitch_span: &mut [f32]) {
        let Some(region) = self.region.clone() else {
            return;
        };
        let frames = pitch_span.len();

        let Some(mut bends) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };

        let events = resources.midi_state.pitch_events();
        let step = (region.bend_step > 1.0).then_some(self.bend_step_cents);
        bend_envelope(events, &mut bends, |bend| region.bend_in_cents(bend), step);
        self.bend_smoother.process_in_place(&mut bends, false);

        for (p, &b) in pitch_span.iter_mut().zip(bends.iter()) {
            *p *= b;
        }

        if let Some(modulation) = self.modulation(resources, self.pitch_target) {
            for (p, &cents) in pitch_span.iter_mut().zip(modulation.iter()) {
                *p *= cents_factor(cents);
            }
        }
    }

    // ------------------------------------------------------------------
    // Raw fill: sampler path
    // ------------------------------------------------------------------

    /// Resample the promised source into `buffer`. `block_offset` is the
    /// number of initial-delay frames consumed ahead of `buffer`, so the
    /// end-of-sample release lands on the right frame of the full block.
    fn fill_with_data(
        &mut self,
        resources: &Resources,
        buffer: &mut StereoBlock<'_>,
        block_offset: usize,
    ) {
        let frames = buffer.frames();
        if frames == 0 {
            return;
        }

        let Some(promise) = self.promise.clone() else {
            #[cfg(debug_assertions)]
            tracing::warn!(voice = self.id, "missing sample promise during fill");
            return;
        };
        let oversampling = promise.oversampling_factor();

        let Some(mut jumps) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };
        let Some(mut coeffs) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };
        let Some(mut indices) = resources.scratch_pool.get_index_buffer(frames) else {
            return;
        };

        jumps.fill(self.pitch_ratio * self.speed_ratio);
        self.pitch_envelope(resources, &mut jumps);

        // Cumulative displacement, then integer/fraction split.
        jumps[0] += self.float_position_offset;
        let mut acc = 0.0f32;
        for jump in jumps.iter_mut() {
            acc += *jump;
            *jump = acc;
        }
        for i in 0..frames {
            let position = jumps[i];
            let index = position as i64;
            indices[i] = index + self.source_position;
            coeffs[i] = position - index as f32;
        }

        let Some(region) = self.region.clone() else {
            return;
        };
        let source_frames = promise.frames() as i64;

        if region.should_loop() && region.loop_end(oversampling) <= promise.frames() as u64 {
            let loop_end = region.loop_end(oversampling) as i64;
            let loop_start = region.loop_start(oversampling) as i64;
            let loop_size = loop_end + 1 - loop_start;
            for index in indices.iter_mut() {
                if *index >= loop_end + 1 {
                    *index = loop_start + (*index - loop_start) % loop_size;
                }
            }
        } else {
            let promised = region.true_sample_end(oversampling);
            let sample_end = promised.min(source_frames as u64) as i64 - 1;
            for i in 0..frames {
                if indices[i] >= sample_end {
                    #[cfg(debug_assertions)]
                    if region.sample_end != u64::MAX && (source_frames as u64) < promised {
                        tracing::warn!(
                            sample = %region.sample_id,
                            available = source_frames,
                            promised,
                            "source underflow"
                        );
                    }
                    self.eg_amplitude.set_release_time(0.0);
                    self.eg_amplitude.start_release((i + block_offset) as i64);
                    for index in indices[i..].iter_mut() {
                        *index = sample_end;
                    }
                    for coeff in coeffs[i..].iter_mut() {
                        *coeff = 1.0;
                    }
                    break;
                }
            }
        }

        let interpolator = Interpolator::from_quality(self.current_sample_quality(resources));
        let left_source = promise.channel(0);
        let (left, right) = buffer.channels_mut();

        if promise.num_channels() == 1 {
            for i in 0..frames {
                let sample = interpolator.interpolate(left_source, indices[i], coeffs[i]);
                left[i] = sample;
                right[i] = sample;
            }
        } else {
            let right_source = promise.channel(1);
            for i in 0..frames {
                left[i] = interpolator.interpolate(left_source, indices[i], coeffs[i]);
                right[i] = interpolator.interpolate(right_source, indices[i], coeffs[i]);
            }
        }

        self.source_position = indices[frames - 1];
        self.float_position_offset = coeffs[frames - 1];

        debug_assert!(!buffer.has_nan_inf());
    }

    // ------------------------------------------------------------------
    // Raw fill: oscillator path
    // ------------------------------------------------------------------

    fn fill_with_generator(&mut self, resources: &Resources, buffer: &mut StereoBlock<'_>) {
        let frames = buffer.frames();
        if frames == 0 {
            return;
        }
        let Some(region) = self.region.clone() else {
            return;
        };

        match region.sample_id.as_str() {
            "*noise" => {
                let (left, right) = buffer.channels_mut();
                for y in left.iter_mut() {
                    *y = NOISE_BOUNDS * self.noise_rng.next_bipolar();
                }
                for y in right.iter_mut() {
                    *y = NOISE_BOUNDS * self.noise_rng.next_bipolar();
                }
            }
            "*gnoise" => {
                // The generator state lives in the voice's RNG, so both
                // channels keep drawing from one sequence.
                let (left, right) = buffer.channels_mut();
                for y in left.iter_mut() {
                    *y = self.noise_rng.next_gaussian();
                }
                for y in right.iter_mut() {
                    *y = self.noise_rng.next_gaussian();
                }
            }
            _ => self.fill_with_oscillators(resources, buffer, &region),
        }

        debug_assert!(!buffer.has_nan_inf());
    }

    fn fill_with_oscillators(
        &mut self,
        resources: &Resources,
        buffer: &mut StereoBlock<'_>,
        region: &Region,
    ) {
        let frames = buffer.frames();

        let Some(mut frequencies) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };
        let keycenter_frequency = midi_note_frequency(region.pitch_keycenter as f32);
        frequencies.fill(self.pitch_ratio * keycenter_frequency);
        self.pitch_envelope(resources, &mut frequencies);

        let Some(mut detune_span) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };

        let oscillator_mode = region.oscillator_mode;
        let oscillator_multi = region.oscillator_multi;

        if oscillator_mode <= 0 && oscillator_multi < 2 {
            // Single oscillator.
            let Some(mut temp) = resources.scratch_pool.get_buffer(frames) else {
                return;
            };

            detune_span.fill(1.0);
            self.wave_oscillators[0].process_modulated(&frequencies, &detune_span, &mut temp);

            let (left, right) = buffer.channels_mut();
            left.copy_from_slice(&temp);
            right.copy_from_slice(&temp);
        } else if oscillator_mode <= 0 && oscillator_multi >= 3 {
            // Unison: mix every oscillator into the stereo pair laid out
            // by `setup_oscillator_unison`.
            let Some(mut temp) = resources.scratch_pool.get_buffer(frames) else {
                return;
            };
            let Some(mut temp_left) = resources.scratch_pool.get_buffer(frames) else {
                return;
            };
            let Some(mut temp_right) = resources.scratch_pool.get_buffer(frames) else {
                return;
            };

            let detune_mod = self.modulation(resources, self.oscillator_detune_target);
            let detune_ratio = self.wave_detune_ratio;
            let left_gain = self.wave_left_gain;
            let right_gain = self.wave_right_gain;

            for u in 0..self.wave_unison_size {
                match detune_mod {
                    None => detune_span.fill(detune_ratio[u]),
                    Some(modulation) => {
                        for (d, &cents) in detune_span.iter_mut().zip(modulation.iter()) {
                            *d = cents_factor(cents) * detune_ratio[u];
                        }
                    }
                }
                self.wave_oscillators[u].process_modulated(
                    &frequencies,
                    &detune_span,
                    &mut temp,
                );
                if u == 0 {
                    for i in 0..frames {
                        temp_left[i] = left_gain[u] * temp[i];
                        temp_right[i] = right_gain[u] * temp[i];
                    }
                } else {
                    for i in 0..frames {
                        temp_left[i] += left_gain[u] * temp[i];
                        temp_right[i] += right_gain[u] * temp[i];
                    }
                }
            }

            let (left, right) = buffer.channels_mut();
            left.copy_from_slice(&temp_left);
            right.copy_from_slice(&temp_right);
        } else {
            // Two-oscillator modulation: oscillator 1 modulates
            // oscillator 0.
            let Some(mut temp) = resources.scratch_pool.get_buffer(frames) else {
                return;
            };
            let Some(mut modulator) = resources.scratch_pool.get_buffer(frames) else {
                return;
            };

            let detune_mod = self.modulation(resources, self.oscillator_detune_target);
            let depth_mod = self.modulation(resources, self.oscillator_mod_depth_target);
            let modulator_detune = self.wave_detune_ratio[1];

            match detune_mod {
                None => detune_span.fill(modulator_detune),
                Some(modulation) => {
                    for (d, &cents) in detune_span.iter_mut().zip(modulation.iter()) {
                        *d = cents_factor(cents) * modulator_detune;
                    }
                }
            }

            let (carrier_part, modulator_part) = self.wave_oscillators.split_at_mut(1);
            let osc_carrier = &mut carrier_part[0];
            let osc_modulator = &mut modulator_part[0];

            osc_modulator.process_modulated(&frequencies, &detune_span, &mut modulator);

            let mod_depth = region.oscillator_mod_depth;
            if mod_depth != 1.0 {
                for y in modulator.iter_mut() {
                    *y *= mod_depth;
                }
            }
            if let Some(depth) = depth_mod {
                for (y, &percent) in modulator.iter_mut().zip(depth.iter()) {
                    *y *= 0.01 * percent;
                }
            }

            match region.oscillator_mode {
                // Ring modulation.
                0 => {
                    detune_span.fill(1.0);
                    osc_carrier.process_modulated(&frequencies, &detune_span, &mut temp);
                    for (y, &m) in temp.iter_mut().zip(modulator.iter()) {
                        *y *= m;
                    }
                }
                // Phase modulation is not implemented; FM serves both.
                _ => {
                    for (f, &m) in frequencies.iter_mut().zip(modulator.iter()) {
                        *f += m;
                    }
                    detune_span.fill(1.0);
                    osc_carrier.process_modulated(&frequencies, &detune_span, &mut temp);
                }
            }

            let (left, right) = buffer.channels_mut();
            left.copy_from_slice(&temp);
            right.copy_from_slice(&temp);
        }
    }

    /// Detune offsets and complementary stereo gains for unison playback.
    fn setup_oscillator_unison(&mut self, region: &Region) {
        let multi = region.oscillator_multi;
        let detune = region.oscillator_detune;

        // Below 3 oscillators (or any modulation mode) the slots hold a
        // carrier/modulator pair instead of a unison spread.
        if multi < 3 || region.oscillator_mode > 0 {
            self.wave_unison_size = 1;
            self.wave_detune_ratio[0] = 1.0;
            self.wave_left_gain[0] = 1.0;
            self.wave_right_gain[0] = 1.0;
            let mod_depth = region.oscillator_mod_depth;
            self.wave_detune_ratio[1] = cents_factor(detune);
            self.wave_left_gain[1] = mod_depth;
            self.wave_right_gain[1] = mod_depth;
            return;
        }

        let m = (multi as usize).min(OSCILLATORS_PER_VOICE);
        self.wave_unison_size = m;

        let mut detunes = [0.0f32; OSCILLATORS_PER_VOICE];
        detunes[0] = 0.0;
        detunes[1] = -detune;
        detunes[2] = detune;
        for i in 3..m {
            let n = ((i - 1) / 2) as f32;
            detunes[i] = detune * if i & 1 == 1 { -0.25 } else { 0.25 } * n;
        }

        for i in 0..m {
            self.wave_detune_ratio[i] = cents_factor(detunes[i]);
        }

        self.wave_left_gain[0] = 0.0;
        self.wave_right_gain[m - 1] = 0.0;
        for i in 0..m - 1 {
            let g = 1.0 - i as f32 / (m - 1) as f32;
            self.wave_left_gain[m - 1 - i] = g;
            self.wave_right_gain[i] = g;
        }
    }

    // ------------------------------------------------------------------
    // Amplitude stage
    // ------------------------------------------------------------------

    fn amplitude_envelope(&mut self, resources: &Resources, span: &mut [f32]) {
        self.eg_amplitude.get_block(span);

        let base_gain = self.base_gain;
        for y in span.iter_mut() {
            *y *= base_gain;
        }
        if let Some(modulation) = self.modulation(resources, self.amplitude_target) {
            for (y, &percent) in span.iter_mut().zip(modulation.iter()) {
                *y *= percent * 0.01;
            }
        }

        let volume = db_to_mag(self.base_volume_db);
        for y in span.iter_mut() {
            *y *= volume;
        }
        if let Some(modulation) = self.modulation(resources, self.volume_target) {
            for (y, &db) in span.iter_mut().zip(modulation.iter()) {
                *y *= db_to_mag(db);
            }
        }

        self.gain_smoother.process_in_place(span, false);
    }

    /// Seed the crossfade smoother from the current CC values.
    fn reset_crossfades(&mut self, resources: &Resources) {
        let Some(region) = self.region.clone() else {
            return;
        };
        let curve = region.crossfade_cc_curve;

        let mut xfade = 1.0f32;
        for range in &region.crossfade_cc_in {
            let value = resources.midi_state.cc_value(range.cc);
            xfade *= crossfade_in(range, value, curve);
        }
        for range in &region.crossfade_cc_out {
            let value = resources.midi_state.cc_value(range.cc);
            xfade *= crossfade_out(range, value, curve);
        }

        self.xfade_smoother.reset(xfade);
    }

    fn apply_crossfades(&mut self, resources: &Resources, modulation_span: &mut [f32]) {
        let Some(region) = self.region.clone() else {
            return;
        };
        let frames = modulation_span.len();
        let curve = region.crossfade_cc_curve;

        let Some(mut temp) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };
        let Some(mut xfade) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };
        xfade.fill(1.0);

        let mut can_shortcut = true;
        for range in &region.crossfade_cc_in {
            let events = resources.midi_state.cc_events(range.cc);
            can_shortcut &= events.len() == 1;
            linear_envelope(events, &mut temp, |x| crossfade_in(range, x, curve));
            for (y, &g) in xfade.iter_mut().zip(temp.iter()) {
                *y *= g;
            }
        }
        for range in &region.crossfade_cc_out {
            let events = resources.midi_state.cc_events(range.cc);
            can_shortcut &= events.len() == 1;
            linear_envelope(events, &mut temp, |x| crossfade_out(range, x, curve));
            for (y, &g) in xfade.iter_mut().zip(temp.iter()) {
                *y *= g;
            }
        }

        self.xfade_smoother.process_in_place(&mut xfade, can_shortcut);
        for (y, &g) in modulation_span.iter_mut().zip(xfade.iter()) {
            *y *= g;
        }
    }

    fn amp_stage_mono(&mut self, resources: &Resources, buffer: &mut StereoBlock<'_>) {
        let frames = buffer.frames();
        let Some(mut modulation_span) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };

        self.amplitude_envelope(resources, &mut modulation_span);
        self.apply_crossfades(resources, &mut modulation_span);

        for (y, &g) in buffer.left_mut().iter_mut().zip(modulation_span.iter()) {
            *y *= g;
        }
    }

    fn amp_stage_stereo(&mut self, resources: &Resources, buffer: &mut StereoBlock<'_>) {
        let frames = buffer.frames();
        let Some(mut modulation_span) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };

        self.amplitude_envelope(resources, &mut modulation_span);
        self.apply_crossfades(resources, &mut modulation_span);
        buffer.apply_gain(&modulation_span);
    }

    // ------------------------------------------------------------------
    // Pan stage
    // ------------------------------------------------------------------

    fn pan_stage_mono(&mut self, resources: &Resources, buffer: &mut StereoBlock<'_>) {
        let Some(region) = self.region.clone() else {
            return;
        };
        let frames = buffer.frames();
        let Some(mut values) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };

        let pan_mod = self.modulation(resources, self.pan_target);
        let (left, right) = buffer.channels_mut();

        // Promote to stereo, then position the voice.
        right.copy_from_slice(left);

        values.fill(region.pan);
        if let Some(modulation) = pan_mod {
            for (v, &percent) in values.iter_mut().zip(modulation.iter()) {
                *v += percent * 0.01;
            }
        }
        pan(&values, left, right);
    }

    fn pan_stage_stereo(&mut self, resources: &Resources, buffer: &mut StereoBlock<'_>) {
        let Some(region) = self.region.clone() else {
            return;
        };
        let frames = buffer.frames();
        let Some(mut values) = resources.scratch_pool.get_buffer(frames) else {
            return;
        };

        let pan_mod = self.modulation(resources, self.pan_target);
        let width_mod = self.modulation(resources, self.width_target);
        let position_mod = self.modulation(resources, self.position_target);
        let (left, right) = buffer.channels_mut();

        values.fill(region.pan);
        if let Some(modulation) = pan_mod {
            for (v, &percent) in values.iter_mut().zip(modulation.iter()) {
                *v += percent * 0.01;
            }
        }
        pan(&values, left, right);

        values.fill(region.width);
        if let Some(modulation) = width_mod {
            for (v, &percent) in values.iter_mut().zip(modulation.iter()) {
                *v += percent * 0.01;
            }
        }
        width(&values, left, right);

        values.fill(region.position);
        if let Some(modulation) = position_mod {
            for (v, &percent) in values.iter_mut().zip(modulation.iter()) {
                *v += percent * 0.01;
            }
        }
        pan(&values, left, right);

        // Restore the 3 dB lost in each of the two pan stages.
        for y in left.iter_mut() {
            *y *= STEREO_PAN_COMPENSATION;
        }
        for y in right.iter_mut() {
            *y *= STEREO_PAN_COMPENSATION;
        }
    }

    // ------------------------------------------------------------------
    // Filter / EQ stage
    // ------------------------------------------------------------------

    fn filter_stage_mono(&mut self, buffer: &mut StereoBlock<'_>) {
        let Some(region) = self.region.clone() else {
            return;
        };
        let left = buffer.left_mut();

        for i in 0..region.filters.len().min(self.filters.len()) {
            self.filters[i].process_mono(left);
        }
        for i in 0..region.equalizers.len().min(self.equalizers.len()) {
            self.equalizers[i].process_mono(left);
        }
    }

    fn filter_stage_stereo(&mut self, buffer: &mut StereoBlock<'_>) {
        let Some(region) = self.region.clone() else {
            return;
        };
        let (left, right) = buffer.channels_mut();

        for i in 0..region.filters.len().min(self.filters.len()) {
            self.filters[i].process_stereo(left, right);
        }
        for i in 0..region.equalizers.len().min(self.equalizers.len()) {
            self.equalizers[i].process_stereo(left, right);
        }
    }

    // ------------------------------------------------------------------
    // Modulation targets
    // ------------------------------------------------------------------

    fn save_modulation_targets(&mut self, region: &Region, matrix: &ModMatrix) {
        let find = |id: ModId| matrix.find_target(ModKey::new(id, region.id));
        self.amplitude_target = find(ModId::Amplitude);
        self.volume_target = find(ModId::Volume);
        self.pan_target = find(ModId::Pan);
        self.position_target = find(ModId::Position);
        self.width_target = find(ModId::Width);
        self.pitch_target = find(ModId::Pitch);
        self.oscillator_detune_target = find(ModId::OscillatorDetune);
        self.oscillator_mod_depth_target = find(ModId::OscillatorModDepth);
    }

    #[inline]
    fn modulation<'a>(
        &self,
        resources: &'a Resources,
        target: Option<ModTarget>,
    ) -> Option<&'a [f32]> {
        target.and_then(|t| resources.mod_matrix.get_modulation(t))
    }

    // ------------------------------------------------------------------
    // Configuration (non-realtime)
    // ------------------------------------------------------------------

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.gain_smoother
            .set_smoothing(config::GAIN_SMOOTHING_SECONDS, sample_rate);
        self.xfade_smoother
            .set_smoothing(config::XFADE_SMOOTHING_SECONDS, sample_rate);

        for osc in self.wave_oscillators.iter_mut() {
            osc.init(sample_rate);
        }
        for lfo in self.lfos.iter_mut() {
            lfo.set_sample_rate(sample_rate);
        }
        for flex in self.flex_egs.iter_mut() {
            flex.set_sample_rate(sample_rate);
        }
        for filter in self.filters.iter_mut() {
            filter.set_sample_rate(sample_rate);
        }
        for eq in self.equalizers.iter_mut() {
            eq.set_sample_rate(sample_rate);
        }
        self.power_follower.set_sample_rate(sample_rate);
    }

    pub fn set_samples_per_block(&mut self, samples_per_block: usize) {
        self.samples_per_block = samples_per_block;
        self.power_follower.set_samples_per_block(samples_per_block);
    }

    pub fn set_max_filters_per_voice(&mut self, count: usize) -> Result<()> {
        self.ensure_idle()?;
        if count != self.filters.len() {
            self.filters = (0..count).map(|_| FilterHolder::new(self.sample_rate)).collect();
        }
        Ok(())
    }

    pub fn set_max_eqs_per_voice(&mut self, count: usize) -> Result<()> {
        self.ensure_idle()?;
        if count != self.equalizers.len() {
            self.equalizers = (0..count).map(|_| EqHolder::new(self.sample_rate)).collect();
        }
        Ok(())
    }

    pub fn set_max_lfos_per_voice(&mut self, count: usize) -> Result<()> {
        self.ensure_idle()?;
        self.lfos = (0..count)
            .map(|_| {
                let mut lfo = VoiceLfo::new();
                lfo.set_sample_rate(self.sample_rate);
                lfo
            })
            .collect();
        Ok(())
    }

    pub fn set_max_flex_egs_per_voice(&mut self, count: usize) -> Result<()> {
        self.ensure_idle()?;
        self.flex_egs = (0..count)
            .map(|_| {
                let mut eg = FlexEnvelope::new();
                eg.set_sample_rate(self.sample_rate);
                eg
            })
            .collect();
        Ok(())
    }

    pub fn set_pitch_eg_enabled_per_voice(&mut self, enabled: bool) -> Result<()> {
        self.ensure_idle()?;
        self.eg_pitch = enabled.then(|| Box::new(AdsrEnvelope::new()));
        Ok(())
    }

    pub fn set_filter_eg_enabled_per_voice(&mut self, enabled: bool) -> Result<()> {
        self.ensure_idle()?;
        self.eg_filter = enabled.then(|| Box::new(AdsrEnvelope::new()));
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_free() {
            Ok(())
        } else {
            Err(Error::VoiceBusy(self.id))
        }
    }

    /// LFO slots, for the matrix driver that reads them as sources.
    pub fn lfos_mut(&mut self) -> &mut [VoiceLfo] {
        &mut self.lfos
    }

    /// Flex envelope slots, for the matrix driver.
    pub fn flex_egs_mut(&mut self) -> &mut [FlexEnvelope] {
        &mut self.flex_egs
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn state(&self) -> VoiceState {
        self.state
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.state == VoiceState::Idle
    }

    #[inline]
    pub fn released_or_free(&self) -> bool {
        self.state != VoiceState::Playing || self.eg_amplitude.is_released()
    }

    #[inline]
    pub fn source_position(&self) -> u64 {
        self.source_position.max(0) as u64
    }

    #[inline]
    pub fn average_power(&self) -> f32 {
        self.power_follower.average_power()
    }

    pub fn current_sample_quality(&self, resources: &Resources) -> i32 {
        self.region
            .as_ref()
            .and_then(|region| region.sample_quality)
            .unwrap_or_else(|| resources.synth_config.current_sample_quality())
    }

    #[inline]
    pub fn trigger_event(&self) -> &TriggerEvent {
        &self.trigger_event
    }

    /// Tuned frequency of the trigger key, cached at start.
    #[inline]
    pub fn base_frequency(&self) -> f32 {
        self.base_frequency
    }

    #[inline]
    pub fn age(&self) -> i64 {
        self.age
    }

    #[inline]
    pub fn region(&self) -> Option<&Arc<Region>> {
        self.region.as_ref()
    }

    // ------------------------------------------------------------------
    // Sister ring topology
    // ------------------------------------------------------------------

    #[inline]
    pub fn next_sister_voice(&self) -> u32 {
        self.sister_next
    }

    #[inline]
    pub fn previous_sister_voice(&self) -> u32 {
        self.sister_prev
    }

    #[inline]
    pub fn set_next_sister_voice(&mut self, voice: u32) {
        self.sister_next = voice;
    }

    #[inline]
    pub fn set_previous_sister_voice(&mut self, voice: u32) {
        self.sister_prev = voice;
    }
}
