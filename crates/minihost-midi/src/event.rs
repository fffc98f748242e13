//! RT-safe MIDI event type with sample-accurate timing.

use midi_msg::MidiMsg;

/// One short MIDI channel message plus its position within a block.
///
/// This is the unit carried by the SPSC queue and handed to plugin backends.
/// It is `Copy` and fixed-size so it can live in pre-allocated slots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MidiEvent {
    /// Offset within the current block (0 = first sample).
    pub sample_offset: usize,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiEvent {
    #[inline]
    pub const fn new(sample_offset: usize, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            sample_offset,
            status,
            data1,
            data2,
        }
    }

    #[inline]
    pub const fn note_on(sample_offset: usize, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(sample_offset, 0x90 | (channel & 0x0F), note, velocity)
    }

    #[inline]
    pub const fn note_off(sample_offset: usize, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(sample_offset, 0x80 | (channel & 0x0F), note, velocity)
    }

    #[inline]
    pub const fn control_change(sample_offset: usize, channel: u8, cc: u8, value: u8) -> Self {
        Self::new(sample_offset, 0xB0 | (channel & 0x0F), cc, value)
    }

    #[inline]
    pub const fn program_change(sample_offset: usize, channel: u8, program: u8) -> Self {
        Self::new(sample_offset, 0xC0 | (channel & 0x0F), program, 0)
    }

    #[inline]
    pub const fn aftertouch(sample_offset: usize, channel: u8, pressure: u8) -> Self {
        Self::new(sample_offset, 0xD0 | (channel & 0x0F), pressure, 0)
    }

    /// 14-bit bend, 8192 = center.
    #[inline]
    pub const fn pitch_bend(sample_offset: usize, channel: u8, bend: u16) -> Self {
        Self::new(
            sample_offset,
            0xE0 | (channel & 0x0F),
            (bend & 0x7F) as u8,
            ((bend >> 7) & 0x7F) as u8,
        )
    }

    #[inline]
    pub fn note_on_builder(note: u8, velocity: u8) -> MidiEventBuilder {
        MidiEventBuilder::new(0x90, note, velocity)
    }

    #[inline]
    pub fn note_off_builder(note: u8) -> MidiEventBuilder {
        MidiEventBuilder::new(0x80, note, 0)
    }

    #[inline]
    pub fn cc_builder(control: u8, value: u8) -> MidiEventBuilder {
        MidiEventBuilder::new(0xB0, control, value)
    }

    /// Same event moved to another position.
    #[inline]
    pub const fn with_offset(mut self, sample_offset: usize) -> Self {
        self.sample_offset = sample_offset;
        self
    }

    /// Upper nibble of the status byte (`0x90` for note on, ...).
    #[inline]
    pub const fn kind(&self) -> u8 {
        self.status & 0xF0
    }

    #[inline]
    pub const fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    #[inline]
    pub const fn is_note_on(&self) -> bool {
        self.kind() == 0x90 && self.data2 > 0
    }

    #[inline]
    pub const fn is_note_off(&self) -> bool {
        self.kind() == 0x80 || (self.kind() == 0x90 && self.data2 == 0)
    }

    /// Number of meaningful wire bytes, derived from the status byte.
    ///
    /// Data bytes in the status position (running status) report 3.
    pub const fn wire_len(&self) -> usize {
        match self.status {
            0xC0..=0xDF => 2,
            0xF1 | 0xF3 => 2,
            0xF2 => 3,
            0xF0..=0xFF => 1,
            _ => 3,
        }
    }

    /// Wire bytes, valid up to [`wire_len`](Self::wire_len). No allocation.
    #[inline]
    pub const fn to_bytes(&self) -> [u8; 3] {
        [self.status, self.data1, self.data2]
    }

    /// Build from raw wire bytes. Missing data bytes read as zero.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_bytes(sample_offset: usize, bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        Some(Self {
            sample_offset,
            status,
            data1: bytes.get(1).copied().unwrap_or(0),
            data2: bytes.get(2).copied().unwrap_or(0),
        })
    }

    pub fn to_midi_msg(&self) -> Result<MidiMsg, midi_msg::ParseError> {
        let bytes = self.to_bytes();
        let (msg, _len) = MidiMsg::from_midi(&bytes[..self.wire_len()])?;
        Ok(msg)
    }

    /// Convert a parsed message. Messages longer than three bytes (sysex)
    /// have no short-message form and return `None`.
    pub fn from_midi_msg(sample_offset: usize, msg: &MidiMsg) -> Option<Self> {
        let bytes = msg.to_midi();
        if bytes.len() > 3 {
            return None;
        }
        Self::from_bytes(sample_offset, &bytes)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MidiEventBuilder {
    sample_offset: usize,
    channel: u8,
    kind: u8,
    data1: u8,
    data2: u8,
}

impl MidiEventBuilder {
    fn new(kind: u8, data1: u8, data2: u8) -> Self {
        Self {
            sample_offset: 0,
            channel: 0,
            kind,
            data1,
            data2,
        }
    }

    #[inline]
    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    #[inline]
    pub fn offset(mut self, sample_offset: usize) -> Self {
        self.sample_offset = sample_offset;
        self
    }

    #[inline]
    pub fn build(self) -> MidiEvent {
        MidiEvent::new(
            self.sample_offset,
            self.kind | (self.channel & 0x0F),
            self.data1,
            self.data2,
        )
    }
}
