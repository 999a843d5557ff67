//! Band-limited wavetables and the phase-accumulator oscillator.
//!
//! Tables are built once, off the audio thread, by additive synthesis: one
//! mip level per octave of fundamental frequency, each level keeping only
//! the harmonics that stay below Nyquist at the top of its range. The
//! oscillator picks the level for the instantaneous frequency every sample,
//! so frequency modulation never aliases harder than one level's worth.

use std::f32::consts::TAU;
use std::sync::Arc;

/// Samples per wavetable cycle.
pub const TABLE_SIZE: usize = 1024;

/// Reference rate the mip levels are laid out against.
const REFERENCE_NYQUIST: f32 = 22_050.0;

/// Fundamental covered by the first mip level.
const BASE_FREQUENCY: f32 = 20.0;

/// Number of octave-spaced mip levels.
const MIP_LEVELS: usize = 10;

struct MipTable {
    /// Highest fundamental this level should serve.
    max_frequency: f32,
    samples: Box<[f32]>,
}

/// A multi-resolution wavetable for one waveform.
pub struct WavetableMulti {
    tables: Vec<MipTable>,
}

impl WavetableMulti {
    /// Build from a harmonic series: `amplitude(n)` for harmonic `n >= 1`.
    fn from_harmonics<F: Fn(usize) -> f32>(amplitude: F) -> Self {
        let mut tables = Vec::with_capacity(MIP_LEVELS);

        for level in 0..MIP_LEVELS {
            let top = BASE_FREQUENCY * (1 << (level + 1)) as f32;
            let max_harmonic = ((REFERENCE_NYQUIST / top) as usize)
                .clamp(1, TABLE_SIZE / 2);

            let mut samples = vec![0.0f32; TABLE_SIZE];
            for n in 1..=max_harmonic {
                let a = amplitude(n);
                if a == 0.0 {
                    continue;
                }
                for (i, s) in samples.iter_mut().enumerate() {
                    *s += a * (TAU * n as f32 * i as f32 / TABLE_SIZE as f32).sin();
                }
            }

            // Normalize each level to unit peak so quality switches are
            // level-matched.
            let peak = samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
            if peak > 0.0 {
                for s in samples.iter_mut() {
                    *s /= peak;
                }
            }

            tables.push(MipTable {
                max_frequency: top,
                samples: samples.into_boxed_slice(),
            });
        }

        Self { tables }
    }

    pub fn sine() -> Self {
        Self::from_harmonics(|n| if n == 1 { 1.0 } else { 0.0 })
    }

    pub fn triangle() -> Self {
        Self::from_harmonics(|n| {
            if n % 2 == 1 {
                let sign = if (n / 2) % 2 == 0 { 1.0 } else { -1.0 };
                sign / (n * n) as f32
            } else {
                0.0
            }
        })
    }

    pub fn square() -> Self {
        Self::from_harmonics(|n| if n % 2 == 1 { 1.0 / n as f32 } else { 0.0 })
    }

    pub fn saw() -> Self {
        Self::from_harmonics(|n| 1.0 / n as f32)
    }

    /// Build from one raw cycle of audio (file-backed waves). The cycle is
    /// resampled to the table size; every level shares it, so extreme
    /// upward transposition of file waves may alias.
    pub fn from_cycle(cycle: &[f32]) -> Self {
        let mut samples = vec![0.0f32; TABLE_SIZE];
        if !cycle.is_empty() {
            for (i, s) in samples.iter_mut().enumerate() {
                let pos = i as f32 * cycle.len() as f32 / TABLE_SIZE as f32;
                let i0 = pos as usize % cycle.len();
                let i1 = (i0 + 1) % cycle.len();
                let frac = pos - pos.floor();
                *s = cycle[i0] + frac * (cycle[i1] - cycle[i0]);
            }
        }

        let peak = samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        if peak > 0.0 {
            for s in samples.iter_mut() {
                *s /= peak;
            }
        }

        let shared: Box<[f32]> = samples.into_boxed_slice();
        let tables = (0..MIP_LEVELS)
            .map(|level| MipTable {
                max_frequency: BASE_FREQUENCY * (1 << (level + 1)) as f32,
                samples: shared.clone(),
            })
            .collect();

        Self { tables }
    }

    #[inline]
    fn select(&self, frequency: f32) -> &MipTable {
        for table in &self.tables {
            if frequency <= table.max_frequency {
                return table;
            }
        }
        // Frequencies above the top level read the most band-limited table.
        &self.tables[self.tables.len() - 1]
    }
}

/// Phase-accumulator reader over a [`WavetableMulti`].
#[derive(Clone)]
pub struct WavetableOscillator {
    wavetable: Option<Arc<WavetableMulti>>,
    phase: f32,
    sample_interval: f32,
    quality: i32,
}

impl WavetableOscillator {
    pub fn new() -> Self {
        Self {
            wavetable: None,
            phase: 0.0,
            sample_interval: 1.0 / voce_core::config::DEFAULT_SAMPLE_RATE,
            quality: 1,
        }
    }

    pub fn init(&mut self, sample_rate: f32) {
        self.sample_interval = 1.0 / sample_rate;
        self.phase = 0.0;
    }

    /// `None` renders silence.
    pub fn set_wavetable(&mut self, wavetable: Option<Arc<WavetableMulti>>) {
        self.wavetable = wavetable;
    }

    /// Phase in cycles, wrapped into [0, 1).
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase - phase.floor();
    }

    /// 1 reads the table linearly; 2 and above use Hermite taps.
    pub fn set_quality(&mut self, quality: i32) {
        self.quality = quality;
    }

    /// Render one block: per-sample frequency times per-sample detune ratio.
    pub fn process_modulated(&mut self, frequencies: &[f32], detune: &[f32], out: &mut [f32]) {
        debug_assert_eq!(frequencies.len(), out.len());
        debug_assert_eq!(detune.len(), out.len());

        let Some(wavetable) = self.wavetable.as_ref() else {
            out.fill(0.0);
            return;
        };

        let hermite = self.quality >= 2;
        let mut phase = self.phase;

        for i in 0..out.len() {
            let frequency = frequencies[i] * detune[i];
            let table = wavetable.select(frequency);
            let data = &table.samples;

            let pos = phase * TABLE_SIZE as f32;
            let index = pos as usize % TABLE_SIZE;
            let frac = pos - pos.floor();

            out[i] = if hermite {
                let xm1 = data[(index + TABLE_SIZE - 1) % TABLE_SIZE];
                let x0 = data[index];
                let x1 = data[(index + 1) % TABLE_SIZE];
                let x2 = data[(index + 2) % TABLE_SIZE];
                let c1 = 0.5 * (x1 - xm1);
                let c2 = xm1 - 2.5 * x0 + 2.0 * x1 - 0.5 * x2;
                let c3 = 0.5 * (x2 - xm1) + 1.5 * (x0 - x1);
                ((c3 * frac + c2) * frac + c1) * frac + x0
            } else {
                let x0 = data[index];
                let x1 = data[(index + 1) % TABLE_SIZE];
                x0 + frac * (x1 - x0)
            };

            phase += frequency * self.sample_interval;
            phase -= phase.floor();
        }

        self.phase = phase;
    }
}

impl Default for WavetableOscillator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(osc: &mut WavetableOscillator, frequency: f32, frames: usize) -> Vec<f32> {
        let freqs = vec![frequency; frames];
        let detune = vec![1.0f32; frames];
        let mut out = vec![0.0f32; frames];
        osc.process_modulated(&freqs, &detune, &mut out);
        out
    }

    /// Count positive-going zero crossings to estimate frequency.
    fn estimate_frequency(samples: &[f32], sample_rate: f32) -> f32 {
        let mut crossings = 0;
        for w in samples.windows(2) {
            if w[0] <= 0.0 && w[1] > 0.0 {
                crossings += 1;
            }
        }
        crossings as f32 * sample_rate / samples.len() as f32
    }

    #[test]
    fn test_sine_frequency() {
        let mut osc = WavetableOscillator::new();
        osc.init(48_000.0);
        osc.set_wavetable(Some(Arc::new(WavetableMulti::sine())));

        let out = render(&mut osc, 440.0, 48_000);
        let estimated = estimate_frequency(&out, 48_000.0);
        assert!(
            (estimated - 440.0).abs() < 2.0,
            "estimated {} Hz",
            estimated
        );
    }

    #[test]
    fn test_no_wavetable_is_silent() {
        let mut osc = WavetableOscillator::new();
        osc.init(48_000.0);
        let out = render(&mut osc, 440.0, 64);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_unit_peak() {
        for wavetable in [
            WavetableMulti::sine(),
            WavetableMulti::triangle(),
            WavetableMulti::square(),
            WavetableMulti::saw(),
        ] {
            let mut osc = WavetableOscillator::new();
            osc.init(48_000.0);
            osc.set_wavetable(Some(Arc::new(wavetable)));
            let out = render(&mut osc, 100.0, 4096);
            let peak = out.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
            assert!(peak <= 1.001, "peak {}", peak);
            assert!(peak > 0.5, "peak {}", peak);
        }
    }

    #[test]
    fn test_phase_offset_shifts_start() {
        let table = Arc::new(WavetableMulti::sine());

        let mut a = WavetableOscillator::new();
        a.init(48_000.0);
        a.set_wavetable(Some(Arc::clone(&table)));
        a.set_phase(0.25);

        let out = render(&mut a, 440.0, 4);
        // Sine read at a quarter cycle starts near its positive peak.
        assert!(out[0] > 0.9, "got {}", out[0]);
    }

    #[test]
    fn test_detune_doubles_frequency() {
        let table = Arc::new(WavetableMulti::sine());
        let mut osc = WavetableOscillator::new();
        osc.init(48_000.0);
        osc.set_wavetable(Some(table));

        let freqs = vec![220.0f32; 48_000];
        let detune = vec![2.0f32; 48_000];
        let mut out = vec![0.0f32; 48_000];
        osc.process_modulated(&freqs, &detune, &mut out);

        let estimated = estimate_frequency(&out, 48_000.0);
        assert!((estimated - 440.0).abs() < 2.0, "estimated {}", estimated);
    }

    #[test]
    fn test_from_cycle_reproduces_shape() {
        let cycle: Vec<f32> = (0..64)
            .map(|i| (TAU * i as f32 / 64.0).sin())
            .collect();
        let table = WavetableMulti::from_cycle(&cycle);

        let mut osc = WavetableOscillator::new();
        osc.init(48_000.0);
        osc.set_wavetable(Some(Arc::new(table)));

        let out = render(&mut osc, 440.0, 48_000);
        let estimated = estimate_frequency(&out, 48_000.0);
        assert!((estimated - 440.0).abs() < 2.0, "estimated {}", estimated);
    }
}
