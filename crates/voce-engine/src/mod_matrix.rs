//! Modulation matrix: per-voice, per-target modulation buffers.
//!
//! The host registers targets when it builds its routing, fills the target
//! buffers before the voices render a block, and the voices read them
//! through opaque handles cached at `start_voice`. A target with no writer
//! this block reads as `None`, meaning "no modulation".

/// Modulation destinations a voice consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModId {
    /// Percent multiplier on the amplitude stage.
    Amplitude,
    /// Additive volume in dB.
    Volume,
    /// Additive pan in percent.
    Pan,
    /// Additive stereo position in percent.
    Position,
    /// Additive width in percent.
    Width,
    /// Additive pitch in cents.
    Pitch,
    /// Oscillator detune in cents.
    OscillatorDetune,
    /// Oscillator modulation depth in percent.
    OscillatorModDepth,
}

/// A target key: destination plus the region it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModKey {
    pub id: ModId,
    pub region: u32,
}

impl ModKey {
    pub fn new(id: ModId, region: u32) -> Self {
        Self { id, region }
    }
}

/// Opaque handle to a registered target. Valid until the matrix is
/// rebuilt; voices re-resolve their handles at every `start_voice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModTarget(u32);

struct TargetSlot {
    key: ModKey,
    buffer: Vec<f32>,
    frames: usize,
    active: bool,
}

/// The matrix itself.
pub struct ModMatrix {
    targets: Vec<TargetSlot>,
    block_capacity: usize,
}

impl ModMatrix {
    pub fn new(block_capacity: usize) -> Self {
        Self {
            targets: Vec::new(),
            block_capacity,
        }
    }

    /// Register a target; idempotent per key. Non-RT.
    pub fn register_target(&mut self, key: ModKey) -> ModTarget {
        if let Some(found) = self.find_target(key) {
            return found;
        }
        self.targets.push(TargetSlot {
            key,
            buffer: vec![0.0; self.block_capacity],
            frames: 0,
            active: false,
        });
        ModTarget(self.targets.len() as u32 - 1)
    }

    /// Resolve a target key to its handle.
    pub fn find_target(&self, key: ModKey) -> Option<ModTarget> {
        self.targets
            .iter()
            .position(|slot| slot.key == key)
            .map(|i| ModTarget(i as u32))
    }

    /// A voice came alive for `region`; hook for matrix-side sources.
    pub fn init_voice(&mut self, _voice_id: u32, _region_id: u32, _delay: i64) {}

    /// A voice entered its release; hook for matrix-side sources.
    pub fn release_voice(&mut self, _voice_id: u32, _region_id: u32, _delay: i64) {}

    /// Write a target's buffer for the coming block. RT-safe: copies into
    /// preallocated storage.
    pub fn set_modulation(&mut self, target: ModTarget, values: &[f32]) {
        if let Some(slot) = self.targets.get_mut(target.0 as usize) {
            let frames = values.len().min(slot.buffer.len());
            slot.buffer[..frames].copy_from_slice(&values[..frames]);
            slot.frames = frames;
            slot.active = true;
        }
    }

    /// Mark a target silent for the coming block.
    pub fn clear_modulation(&mut self, target: ModTarget) {
        if let Some(slot) = self.targets.get_mut(target.0 as usize) {
            slot.active = false;
        }
    }

    /// Borrow a target's buffer for this block; `None` means no
    /// modulation. The span must not be held across blocks.
    #[inline]
    pub fn get_modulation(&self, target: ModTarget) -> Option<&[f32]> {
        let slot = self.targets.get(target.0 as usize)?;
        if slot.active {
            Some(&slot.buffer[..slot.frames])
        } else {
            None
        }
    }
}
