//! MIDI views handed to backends for one process call.
//!
//! Offsets seen by a backend are always relative to the window it processes.
//! When a block is split into chunks, [`MidiInput`] rebases incoming events
//! onto the chunk and [`MidiOutput`] shifts collected events back onto the
//! caller's block, so neither side ever copies into scratch storage.

use minihost_midi::MidiEvent;

/// Read-only, chunk-relative view over a caller's event list.
#[derive(Clone, Copy, Debug, Default)]
pub struct MidiInput<'a> {
    events: &'a [MidiEvent],
    base: usize,
    frames: usize,
}

impl<'a> MidiInput<'a> {
    /// Events for a whole block of `frames` frames.
    pub fn new(events: &'a [MidiEvent], frames: usize) -> Self {
        Self {
            events,
            base: 0,
            frames,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Events of a chunk starting at `base` within the caller's block.
    pub(crate) fn chunk(events: &'a [MidiEvent], base: usize, frames: usize) -> Self {
        Self {
            events,
            base,
            frames,
        }
    }

    /// Events in order, with offsets rebased onto the window.
    ///
    /// Events positioned before the window are skipped. Offsets past the end
    /// are clamped to the last frame.
    pub fn iter(&self) -> impl Iterator<Item = MidiEvent> + 'a {
        let base = self.base;
        let last = self.frames.saturating_sub(1);
        self.events
            .iter()
            .filter(move |event| event.sample_offset >= base)
            .map(move |event| event.with_offset((event.sample_offset - base).min(last)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }
}

/// Bounded collector for events a backend produces.
///
/// Writes into caller-provided slots. Events beyond capacity are dropped and
/// counted, never reallocated.
#[derive(Debug)]
pub struct MidiOutput<'a> {
    slots: &'a mut [MidiEvent],
    len: usize,
    base: usize,
    dropped: usize,
}

impl<'a> MidiOutput<'a> {
    pub fn new(slots: &'a mut [MidiEvent]) -> Self {
        Self {
            slots,
            len: 0,
            base: 0,
            dropped: 0,
        }
    }

    /// Zero-capacity sink: everything pushed is dropped.
    pub fn discard() -> MidiOutput<'static> {
        MidiOutput::new(&mut [])
    }

    /// Store an event with a window-relative offset. Returns `false` when full.
    #[inline]
    pub fn push(&mut self, event: MidiEvent) -> bool {
        match self.slots.get_mut(self.len) {
            Some(slot) => {
                *slot = event.with_offset(event.sample_offset.saturating_add(self.base));
                self.len += 1;
                true
            }
            None => {
                self.dropped += 1;
                false
            }
        }
    }

    /// Collected events, offsets relative to the caller's block.
    #[inline]
    pub fn events(&self) -> &[MidiEvent] {
        &self.slots[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Events rejected since the last [`clear`](Self::clear).
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.base = 0;
        self.dropped = 0;
    }

    #[inline]
    pub(crate) fn set_base(&mut self, base: usize) {
        self.base = base;
    }
}
