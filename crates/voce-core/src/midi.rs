//! MIDI controller state with sample-accurate per-block event lists.

/// One controller change inside the current block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Frame offset from the block start.
    pub delay: u32,
    /// Normalized value. CCs are in [0, 1], pitch bend in [-1, 1].
    pub value: f32,
}

impl Event {
    pub fn new(delay: u32, value: f32) -> Self {
        Self { delay, value }
    }
}

const EVENTS_PER_CC: usize = 64;

/// Controller values and the events that produced them this block.
///
/// Every event list always holds at least one entry at delay 0 carrying the
/// block-start value, so per-block envelope builders never see an empty
/// list. `advance_block` collapses each list back to that form.
///
/// Event vectors are given capacity up front; the audio thread only
/// reallocates in the pathological case of more than `EVENTS_PER_CC` events
/// on one controller in one block.
#[derive(Debug)]
pub struct MidiState {
    cc_events: Vec<Vec<Event>>,
    pitch_events: Vec<Event>,
    aftertouch: f32,
    /// Seconds per quarter note.
    tempo_spq: f32,
}

impl MidiState {
    pub fn new() -> Self {
        let mut cc_events = Vec::with_capacity(128);
        for _ in 0..128 {
            let mut events = Vec::with_capacity(EVENTS_PER_CC);
            events.push(Event::new(0, 0.0));
            cc_events.push(events);
        }

        let mut pitch_events = Vec::with_capacity(EVENTS_PER_CC);
        pitch_events.push(Event::new(0, 0.0));

        Self {
            cc_events,
            pitch_events,
            aftertouch: 0.0,
            tempo_spq: 0.5,
        }
    }

    /// Record a CC change at `delay` frames into the block.
    pub fn cc_event(&mut self, delay: u32, cc: u8, value: f32) {
        debug_assert!((0.0..=1.0).contains(&value));
        let events = &mut self.cc_events[cc as usize & 127];
        if delay == 0 {
            events.clear();
        }
        events.push(Event::new(delay, value));
    }

    /// Record a pitch-bend change at `delay` frames into the block.
    pub fn pitch_bend_event(&mut self, delay: u32, value: f32) {
        debug_assert!((-1.0..=1.0).contains(&value));
        if delay == 0 {
            self.pitch_events.clear();
        }
        self.pitch_events.push(Event::new(delay, value));
    }

    pub fn aftertouch_event(&mut self, _delay: u32, value: f32) {
        self.aftertouch = value;
    }

    pub fn tempo_event(&mut self, _delay: u32, seconds_per_quarter: f32) {
        self.tempo_spq = seconds_per_quarter;
    }

    /// Current (most recent) value of a CC.
    #[inline]
    pub fn cc_value(&self, cc: u8) -> f32 {
        self.cc_events[cc as usize & 127]
            .last()
            .map(|e| e.value)
            .unwrap_or(0.0)
    }

    /// Events for a CC in this block, time-ordered, first at delay 0.
    #[inline]
    pub fn cc_events(&self, cc: u8) -> &[Event] {
        &self.cc_events[cc as usize & 127]
    }

    /// Current pitch-bend value in [-1, 1].
    #[inline]
    pub fn pitch_bend(&self) -> f32 {
        self.pitch_events.last().map(|e| e.value).unwrap_or(0.0)
    }

    /// Pitch-bend events for this block.
    #[inline]
    pub fn pitch_events(&self) -> &[Event] {
        &self.pitch_events
    }

    #[inline]
    pub fn aftertouch(&self) -> f32 {
        self.aftertouch
    }

    #[inline]
    pub fn tempo_seconds_per_quarter(&self) -> f32 {
        self.tempo_spq
    }

    /// End-of-block bookkeeping: each list collapses to a single delay-0
    /// event carrying its final value.
    pub fn advance_block(&mut self) {
        for events in self.cc_events.iter_mut() {
            if events.len() > 1 || events.first().map(|e| e.delay != 0).unwrap_or(true) {
                let value = events.last().map(|e| e.value).unwrap_or(0.0);
                events.clear();
                events.push(Event::new(0, value));
            }
        }
        if self.pitch_events.len() > 1
            || self.pitch_events.first().map(|e| e.delay != 0).unwrap_or(true)
        {
            let value = self.pitch_events.last().map(|e| e.value).unwrap_or(0.0);
            self.pitch_events.clear();
            self.pitch_events.push(Event::new(0, value));
        }
    }
}

impl Default for MidiState {
    fn default() -> Self {
        Self::new()
    }
}
