//! DSP building blocks for the voce voice engine.
//!
//! Stateless kernels and small stateful units consumed by the per-voice
//! render path. Everything here is RT-safe once constructed; configuration
//! entry points (`set_sample_rate`, table construction) are the only places
//! that may allocate.

pub mod adsr;
pub mod envelope;
pub mod filter;
pub mod flex;
pub mod interpolate;
pub mod lfo;
pub mod panning;
pub mod power_follower;
pub mod wavetable;

pub use adsr::{AdsrEnvelope, AdsrParams};
pub use envelope::{bend_envelope, linear_envelope};
pub use filter::{EqDescription, EqHolder, FilterDescription, FilterHolder, FilterKind};
pub use flex::{FlexEnvelope, FlexPoint};
pub use interpolate::{
    interpolate_bspline3, interpolate_hermite3, interpolate_linear, Interpolator,
};
pub use lfo::{LfoShape, VoiceLfo};
pub use panning::{pan, width, STEREO_PAN_COMPENSATION};
pub use power_follower::PowerFollower;
pub use wavetable::{WavetableMulti, WavetableOscillator, TABLE_SIZE};
