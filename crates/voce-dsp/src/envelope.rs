//! Per-block control envelopes built from MIDI event lists.
//!
//! Event lists come from [`voce_core::MidiState`]: time-ordered, first entry
//! at delay 0. The builders interpolate linearly between events in the value
//! domain and map each sample through a caller-supplied transform.

use voce_core::{cents_factor, Event};

/// Fill `out` with a linear interpolation of the event values, transformed
/// by `f`.
pub fn linear_envelope<F: Fn(f32) -> f32>(events: &[Event], out: &mut [f32], f: F) {
    if out.is_empty() {
        return;
    }

    let mut last_delay = 0usize;
    let mut last_value = events.first().map(|e| e.value).unwrap_or(0.0);

    for event in events.iter().skip(1) {
        let delay = (event.delay as usize).min(out.len());
        let span = delay.saturating_sub(last_delay);
        if span > 0 {
            for i in 0..span {
                let t = (i + 1) as f32 / span as f32;
                out[last_delay + i] = f(last_value + (event.value - last_value) * t);
            }
        }
        last_delay = delay;
        last_value = event.value;
    }

    let tail = f(last_value);
    for y in out[last_delay..].iter_mut() {
        *y = tail;
    }
}

/// Pitch-bend envelope: linear interpolation of bend values, converted to a
/// ratio through `to_cents`, optionally quantized to multiples of
/// `step_cents` (stepped glissando).
pub fn bend_envelope<F: Fn(f32) -> f32>(
    events: &[Event],
    out: &mut [f32],
    to_cents: F,
    step_cents: Option<f32>,
) {
    let transform = |bend: f32| {
        let mut cents = to_cents(bend);
        if let Some(step) = step_cents {
            if step > 1.0 {
                cents = (cents / step).trunc() * step;
            }
        }
        cents_factor(cents)
    };
    linear_envelope(events, out, transform);
}
