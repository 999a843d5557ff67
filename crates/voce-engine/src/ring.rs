//! Sister ring: circular list of voices sharing one trigger event.
//!
//! Links are voice indices into the manager's voice slice, not pointers;
//! an unlinked voice points at itself both ways. Mutation happens only on
//! the audio thread, so plain fields suffice.

use crate::voice::Voice;

/// Splice `incoming` into the ring right after `existing`.
///
/// `incoming` must currently be alone in its own ring.
pub fn link_after(voices: &mut [Voice], existing: usize, incoming: usize) {
    debug_assert_ne!(existing, incoming);
    debug_assert_eq!(voices[incoming].next_sister_voice(), incoming as u32);
    debug_assert_eq!(voices[incoming].previous_sister_voice(), incoming as u32);

    let next = voices[existing].next_sister_voice();
    voices[existing].set_next_sister_voice(incoming as u32);
    voices[incoming].set_previous_sister_voice(existing as u32);
    voices[incoming].set_next_sister_voice(next);
    voices[next as usize].set_previous_sister_voice(incoming as u32);
}

/// Remove a voice from its ring, leaving it self-linked. Safe to call on
/// an already solitary voice.
pub fn unlink(voices: &mut [Voice], index: usize) {
    let prev = voices[index].previous_sister_voice();
    let next = voices[index].next_sister_voice();
    voices[prev as usize].set_next_sister_voice(next);
    voices[next as usize].set_previous_sister_voice(prev);
    voices[index].set_next_sister_voice(index as u32);
    voices[index].set_previous_sister_voice(index as u32);
}

/// Check `v.next.prev == v` and `v.prev.next == v` for every voice.
pub fn is_well_formed(voices: &[Voice]) -> bool {
    voices.iter().enumerate().all(|(i, v)| {
        let next = v.next_sister_voice() as usize;
        let prev = v.previous_sister_voice() as usize;
        next < voices.len()
            && prev < voices.len()
            && voices[next].previous_sister_voice() == i as u32
            && voices[prev].next_sister_voice() == i as u32
    })
}

/// Walk the ring starting at `index`, yielding each member once.
pub fn ring_members(voices: &[Voice], index: usize) -> impl Iterator<Item = usize> + '_ {
    std::iter::successors(Some(index), move |&i| {
        let next = voices[i].next_sister_voice() as usize;
        (next != index).then_some(next)
    })
}
