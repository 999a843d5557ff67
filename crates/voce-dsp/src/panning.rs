//! Equal-power panning and stereo width laws.

/// Gain restoring unity after the two equal-power pan stages of the stereo
/// path, each of which costs 3 dB at center.
pub const STEREO_PAN_COMPENSATION: f32 = 1.4125375446227544;

/// Equal-power pan. `values` holds per-sample pan positions in [-1, 1];
/// both channels are scaled in place. Center costs 3 dB per stage.
pub fn pan(values: &[f32], left: &mut [f32], right: &mut [f32]) {
    let n = values.len().min(left.len()).min(right.len());
    for i in 0..n {
        let v = (values[i].clamp(-1.0, 1.0) + 1.0) * 0.5;
        let theta = v * std::f32::consts::FRAC_PI_2;
        left[i] *= theta.cos();
        right[i] *= theta.sin();
    }
}

/// Stereo width through mid/side scaling. `values` holds per-sample width
/// in [-1, 1]: 1 leaves the image untouched, 0 collapses to mono, -1 swaps
/// the channels. Unity-preserving at full width.
pub fn width(values: &[f32], left: &mut [f32], right: &mut [f32]) {
    let n = values.len().min(left.len()).min(right.len());
    for i in 0..n {
        let w = values[i].clamp(-1.0, 1.0);
        let mid = 0.5 * (left[i] + right[i]);
        let side = 0.5 * (left[i] - right[i]);
        left[i] = mid + w * side;
        right[i] = mid - w * side;
    }
}
