//! The voce per-voice synthesis engine.
//!
//! A [`Voice`] renders one triggered region: sample playback with looping
//! and resampling, or wavetable synthesis (single, unison, ring- and
//! frequency-modulated), through an amplitude envelope, CC crossfades,
//! panning, and per-voice filter/EQ chains. Everything on the render path
//! runs inside a hard realtime callback: no allocation, no locks, no I/O.
//!
//! The surrounding sampler supplies the collaborators bundled in
//! [`Resources`]: the sample promises of a [`FilePool`], prebuilt
//! wavetables from a [`WavePool`], per-block modulation buffers from a
//! [`ModMatrix`], controller state from
//! [`MidiState`](voce_core::MidiState), and scratch memory from a
//! [`ScratchPool`](voce_core::ScratchPool).

pub mod events;
pub mod file_pool;
pub mod mod_matrix;
pub mod region;
pub mod resources;
pub mod ring;
pub mod rng;
pub mod tuning;
pub mod voice;
pub mod wave_pool;

pub use events::{TriggerEvent, TriggerEventKind};
pub use file_pool::{FilePool, SampleData, SamplePromise};
pub use mod_matrix::{ModId, ModKey, ModMatrix, ModTarget};
pub use region::{
    crossfade_in, crossfade_out, CcRange, CrossfadeCurve, LoopMode, OffMode, Region,
};
pub use resources::Resources;
pub use rng::Rng;
pub use tuning::{StretchTuning, Tuning};
pub use voice::{StateListener, Voice, VoiceState};
pub use wave_pool::WavePool;
