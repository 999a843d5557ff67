//! Flexible multi-point envelope.
//!
//! A sequence of (time, level) points with an optional sustain point. The
//! envelope ramps linearly between points, parks on the sustain point until
//! released, then runs the remaining points to the end.

/// One breakpoint of a flex envelope.
#[derive(Debug, Clone, Copy)]
pub struct FlexPoint {
    /// Seconds from the previous point.
    pub time: f32,
    /// Target level reached at the end of the segment.
    pub level: f32,
}

const MAX_POINTS: usize = 8;

/// The envelope. Owned per voice, driven as a modulation source.
#[derive(Debug, Clone)]
pub struct FlexEnvelope {
    points: [FlexPoint; MAX_POINTS],
    point_count: usize,
    sustain_point: usize,
    sample_rate: f32,

    active: bool,
    released: bool,
    current_point: usize,
    segment_remaining: i64,
    current: f32,
    step: f32,
    delay_remaining: i64,
}

impl FlexEnvelope {
    pub fn new() -> Self {
        Self {
            points: [FlexPoint {
                time: 0.0,
                level: 0.0,
            }; MAX_POINTS],
            point_count: 0,
            sustain_point: 0,
            sample_rate: voce_core::config::DEFAULT_SAMPLE_RATE,
            active: false,
            released: false,
            current_point: 0,
            segment_remaining: 0,
            current: 0.0,
            step: 0.0,
            delay_remaining: 0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Replace the point list. Points beyond the storage bound are dropped.
    pub fn configure(&mut self, points: &[FlexPoint], sustain_point: usize) {
        self.point_count = points.len().min(MAX_POINTS);
        self.points[..self.point_count].copy_from_slice(&points[..self.point_count]);
        self.sustain_point = sustain_point.min(self.point_count.saturating_sub(1));
    }

    /// Start for a new note, `delay` frames into the block.
    pub fn start(&mut self, delay: i64) {
        self.active = self.point_count > 0;
        self.released = false;
        self.current_point = 0;
        self.current = 0.0;
        self.delay_remaining = delay.max(0);
        if self.active {
            self.enter_segment(0);
        }
    }

    /// Leave the sustain point `delay` frames into the next block.
    pub fn release(&mut self, delay: i64) {
        self.released = true;
        self.delay_remaining = self.delay_remaining.max(delay.max(0));
    }

    fn enter_segment(&mut self, index: usize) {
        self.current_point = index;
        let point = self.points[index];
        self.segment_remaining = (point.time.max(0.0) * self.sample_rate) as i64;
        self.step = if self.segment_remaining > 0 {
            (point.level - self.current) / self.segment_remaining as f32
        } else {
            0.0
        };
        if self.segment_remaining == 0 {
            self.current = point.level;
        }
    }

    /// Render one block of envelope output.
    pub fn process(&mut self, out: &mut [f32]) {
        for y in out.iter_mut() {
            if !self.active {
                *y = self.current;
                continue;
            }

            if self.delay_remaining > 0 {
                self.delay_remaining -= 1;
                *y = self.current;
                continue;
            }

            let holding = !self.released
                && self.current_point == self.sustain_point
                && self.segment_remaining <= 0;
            if holding {
                *y = self.current;
                continue;
            }

            if self.segment_remaining > 0 {
                self.segment_remaining -= 1;
                self.current += self.step;
            } else if self.current_point + 1 < self.point_count {
                self.enter_segment(self.current_point + 1);
                if self.segment_remaining > 0 {
                    self.segment_remaining -= 1;
                    self.current += self.step;
                }
            } else {
                self.active = false;
            }

            *y = self.current;
        }
    }
}

impl Default for FlexEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 1000.0;

    #[test]
    fn test_ramps_between_points() {
        let mut eg = FlexEnvelope::new();
        eg.set_sample_rate(SR);
        eg.configure(
            &[
                FlexPoint {
                    time: 0.01,
                    level: 1.0,
                },
                FlexPoint {
                    time: 0.01,
                    level: 0.25,
                },
            ],
            1,
        );
        eg.start(0);

        let mut out = [0.0f32; 30];
        eg.process(&mut out);

        assert!((out[9] - 1.0).abs() < 0.15, "peak around frame 10: {}", out[9]);
        assert!((out[25] - 0.25).abs() < 1e-3, "sustain level: {}", out[25]);
    }

    #[test]
    fn test_sustain_holds_until_release() {
        let mut eg = FlexEnvelope::new();
        eg.set_sample_rate(SR);
        eg.configure(
            &[
                FlexPoint {
                    time: 0.005,
                    level: 0.8,
                },
                FlexPoint {
                    time: 0.005,
                    level: 0.0,
                },
            ],
            0,
        );
        eg.start(0);

        let mut out = [0.0f32; 100];
        eg.process(&mut out);
        assert!((out[99] - 0.8).abs() < 1e-3, "held: {}", out[99]);

        eg.release(0);
        let mut tail = [0.0f32; 100];
        eg.process(&mut tail);
        assert!(tail[99].abs() < 1e-3, "released to zero: {}", tail[99]);
    }

    #[test]
    fn test_empty_envelope_outputs_zero() {
        let mut eg = FlexEnvelope::new();
        eg.start(0);
        let mut out = [1.0f32; 8];
        eg.process(&mut out);
        assert!(out.iter().all(|&x| x == 0.0));
    }
}
