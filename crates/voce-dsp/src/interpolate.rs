//! Fractional-sample interpolation kernels for the resampling reader.
//!
//! All kernels take an integer index and a fractional coefficient in
//! [0, 1). Taps outside the slice are clamped to its edges, so no padding
//! of the source buffer is required.

/// Interpolator selection, mapped from the engine's sample-quality value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolator {
    Linear,
    Bspline3,
    Hermite3,
}

impl Interpolator {
    /// Quality 1 is linear; 2 and above use the third-order B-spline.
    /// Values above 2 are reserved for sinc, which is not implemented.
    pub fn from_quality(quality: i32) -> Self {
        if quality <= 1 {
            Interpolator::Linear
        } else {
            Interpolator::Bspline3
        }
    }

    #[inline]
    pub fn interpolate(&self, data: &[f32], index: i64, coeff: f32) -> f32 {
        match self {
            Interpolator::Linear => interpolate_linear(data, index, coeff),
            Interpolator::Bspline3 => interpolate_bspline3(data, index, coeff),
            Interpolator::Hermite3 => interpolate_hermite3(data, index, coeff),
        }
    }
}

#[inline]
fn tap(data: &[f32], index: i64) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let clamped = index.clamp(0, data.len() as i64 - 1) as usize;
    data[clamped]
}

/// Two-point linear interpolation.
#[inline]
pub fn interpolate_linear(data: &[f32], index: i64, coeff: f32) -> f32 {
    let x0 = tap(data, index);
    let x1 = tap(data, index + 1);
    x0 + coeff * (x1 - x0)
}

/// Third-order uniform B-spline. Faster aliasing decay than Hermite but no
/// exact zero crossings at integer positions.
#[inline]
pub fn interpolate_bspline3(data: &[f32], index: i64, coeff: f32) -> f32 {
    let xm1 = tap(data, index - 1);
    let x0 = tap(data, index);
    let x1 = tap(data, index + 1);
    let x2 = tap(data, index + 2);

    let t = coeff;
    let t2 = t * t;
    let t3 = t2 * t;

    let h_m1 = (1.0 - t) * (1.0 - t) * (1.0 - t) / 6.0;
    let h0 = (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0;
    let h1 = (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0;
    let h2 = t3 / 6.0;

    xm1 * h_m1 + x0 * h0 + x1 * h1 + x2 * h2
}

/// Four-point Catmull-Rom (Hermite) interpolation.
#[inline]
pub fn interpolate_hermite3(data: &[f32], index: i64, coeff: f32) -> f32 {
    let xm1 = tap(data, index - 1);
    let x0 = tap(data, index);
    let x1 = tap(data, index + 1);
    let x2 = tap(data, index + 2);

    let c0 = x0;
    let c1 = 0.5 * (x1 - xm1);
    let c2 = xm1 - 2.5 * x0 + 2.0 * x1 - 0.5 * x2;
    let c3 = 0.5 * (x2 - xm1) + 1.5 * (x0 - x1);

    ((c3 * coeff + c2) * coeff + c1) * coeff + c0
}
