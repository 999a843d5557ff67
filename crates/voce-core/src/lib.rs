//! Shared runtime primitives for the voce voice engine.
//!
//! Everything in this crate is usable from a hard realtime audio callback:
//! no allocation, no locking, no I/O after construction. The engine crates
//! build on these pieces:
//!
//! - [`StereoBlock`] - borrowed stereo sample span handed to the render path
//! - [`ScratchPool`] - lock-free bounded checkout of block scratch buffers
//! - [`Smoother`] - first-order parameter smoother with a block fast path
//! - [`MidiState`] - controller values and sample-accurate event lists
//! - [`AtomicFloat`] - cache-line aligned atomic for cross-thread meters

pub mod audio;
pub mod config;
pub mod error;
pub mod lockfree;
pub mod midi;
pub mod scratch;
pub mod smooth;

pub use audio::StereoBlock;
pub use config::SynthConfig;
pub use error::{Error, Result};
pub use lockfree::AtomicFloat;
pub use midi::{Event, MidiState};
pub use scratch::{IndexGuard, ScratchGuard, ScratchPool};
pub use smooth::Smoother;

/// The ratio `2^(cents/1200)`.
#[inline]
pub fn cents_factor(cents: f32) -> f32 {
    (cents / 1200.0).exp2()
}

/// Decibels to linear magnitude.
#[inline]
pub fn db_to_mag(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Equal-tempered frequency of a MIDI note number, A4 = 440 Hz.
#[inline]
pub fn midi_note_frequency(note: f32) -> f32 {
    440.0 * ((note - 69.0) / 12.0).exp2()
}
