//! # voce - per-voice SFZ synthesis engine
//!
//! The rendering core of an SFZ sampler: one [`Voice`] turns a triggered
//! region, a stream of MIDI-level events, and an audio block clock into the
//! next block of stereo samples for exactly one note, inside a hard
//! realtime callback.
//!
//! ## Architecture
//!
//! voce is an umbrella crate over three members:
//! - **voce-core** - RT-safe primitives (scratch pool, smoother, MIDI
//!   state, stereo spans, lock-free atomics)
//! - **voce-dsp** - DSP building blocks (envelopes, wavetables,
//!   interpolators, filters, panning, power follower)
//! - **voce-engine** - the voice itself plus its collaborators (regions,
//!   pools, modulation matrix, tuning)
//!
//! ## Quick start
//!
//! ```
//! use voce::prelude::*;
//! use std::sync::Arc;
//!
//! let mut resources = Resources::new(1024);
//! let mut voice = Voice::new(0);
//! voice.set_sample_rate(48_000.0);
//! voice.set_samples_per_block(1024);
//!
//! // A region playing the builtin sine at A4.
//! let mut region = Region::new(0, "*sine");
//! region.pitch_keycenter = 69;
//! voice.start_voice(&mut resources, &Arc::new(region), 0, TriggerEvent::note_on(69, 1.0));
//!
//! let mut left = [0.0f32; 1024];
//! let mut right = [0.0f32; 1024];
//! let mut block = StereoBlock::new(&mut left, &mut right);
//! voice.render_block(&resources, &mut block);
//! ```

/// Re-export of voce-core for direct access.
pub use voce_core as core;

// RT primitives
pub use voce_core::{
    cents_factor, config, db_to_mag, midi_note_frequency, AtomicFloat, Error, Event, MidiState,
    Result, ScratchPool, Smoother, StereoBlock, SynthConfig,
};

/// Re-export of voce-dsp for direct access.
pub use voce_dsp as dsp;

// DSP building blocks
pub use voce_dsp::{
    AdsrEnvelope, AdsrParams, EqDescription, EqHolder, FilterDescription, FilterHolder,
    FilterKind, FlexEnvelope, FlexPoint, Interpolator, LfoShape, PowerFollower, VoiceLfo,
    WavetableMulti, WavetableOscillator,
};

/// Re-export of voce-engine for direct access.
pub use voce_engine as engine;

// The voice and its collaborators
pub use voce_engine::{
    crossfade_in, crossfade_out, ring, CcRange, CrossfadeCurve, FilePool, LoopMode, ModId,
    ModKey, ModMatrix, ModTarget, OffMode, Region, Resources, Rng, SampleData, SamplePromise,
    StateListener, StretchTuning, TriggerEvent, TriggerEventKind, Tuning, Voice, VoiceState,
    WavePool,
};

/// Convenience prelude for common imports.
pub mod prelude {
    pub use crate::core::{StereoBlock, SynthConfig};
    pub use crate::{
        Region, Resources, SampleData, TriggerEvent, TriggerEventKind, Voice, VoiceState,
    };
}
