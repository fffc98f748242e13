//! Sample-accurate parameter automation.
//!
//! A block with parameter changes is split at every distinct change offset.
//! Each chunk is processed with the parameter values in effect at its first
//! frame and with only the MIDI events falling inside it.
//!
//! Ordering rules:
//! - changes at the same offset apply in list order, before the chunk that
//!   starts there (and so before MIDI at that offset)
//! - values are clamped to 0..1, NaN values are skipped
//! - changes at or past the end of the block are never applied

use crate::buffer::{AudioBlock, Sample};
use crate::midi::{MidiInput, MidiOutput};
use crate::{Error, Result};
use minihost_midi::MidiEvent;

/// A parameter change for a single plugin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamChange {
    pub sample_offset: usize,
    pub param_index: u32,
    /// Normalized 0..1.
    pub value: f32,
}

impl ParamChange {
    pub const fn new(sample_offset: usize, param_index: u32, value: f32) -> Self {
        Self {
            sample_offset,
            param_index,
            value,
        }
    }
}

/// A parameter change addressed to one stage of a chain.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainParamChange {
    pub sample_offset: usize,
    pub plugin_index: usize,
    pub param_index: u32,
    /// Normalized 0..1.
    pub value: f32,
}

impl ChainParamChange {
    pub const fn new(sample_offset: usize, plugin_index: usize, param_index: u32, value: f32) -> Self {
        Self {
            sample_offset,
            plugin_index,
            param_index,
            value,
        }
    }
}

/// Anything positioned in a block that carries a normalized value.
pub trait TimedChange {
    fn sample_offset(&self) -> usize;

    fn value(&self) -> f32;
}

impl TimedChange for ParamChange {
    #[inline]
    fn sample_offset(&self) -> usize {
        self.sample_offset
    }

    #[inline]
    fn value(&self) -> f32 {
        self.value
    }
}

impl TimedChange for ChainParamChange {
    #[inline]
    fn sample_offset(&self) -> usize {
        self.sample_offset
    }

    #[inline]
    fn value(&self) -> f32 {
        self.value
    }
}

/// Clamp into 0..1. `None` for NaN.
#[inline]
pub fn normalize(value: f32) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        Some(value.clamp(0.0, 1.0))
    }
}

/// Something that can process chunks and receive changes between them.
pub(crate) trait ChunkTarget<T: Sample> {
    type Change: TimedChange;

    /// Called with an already normalized value.
    fn apply_change(&mut self, change: &Self::Change, value: f32);

    fn process_chunk(
        &mut self,
        block: &mut AudioBlock<'_, T>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()>;
}

/// Walk `block` chunk by chunk. `changes` and `midi_in` must be sorted by
/// offset. Stops at the first failing chunk.
pub(crate) fn process_chunked<T, C>(
    target: &mut C,
    block: &mut AudioBlock<'_, T>,
    midi_in: &[MidiEvent],
    midi_out: &mut MidiOutput<'_>,
    changes: &[C::Change],
) -> Result<()>
where
    T: Sample,
    C: ChunkTarget<T>,
{
    let frames = block.frames();
    let mut pos = 0;
    let mut change_idx = 0;
    let mut midi_idx = 0;

    while pos < frames {
        while let Some(change) = changes.get(change_idx) {
            if change.sample_offset() > pos {
                break;
            }
            if let Some(value) = normalize(change.value()) {
                target.apply_change(change, value);
            }
            change_idx += 1;
        }

        // Next pending change is strictly after `pos`.
        let chunk_end = changes
            .get(change_idx)
            .map_or(frames, |next| next.sample_offset().min(frames));

        let midi_start = midi_idx;
        while midi_in
            .get(midi_idx)
            .is_some_and(|event| event.sample_offset < chunk_end)
        {
            midi_idx += 1;
        }

        let len = chunk_end - pos;
        let chunk_midi = MidiInput::chunk(&midi_in[midi_start..midi_idx], pos, len);
        let mut chunk = block.window(pos, len).ok_or(Error::BlockTooLarge {
            frames: chunk_end,
            max: frames,
        })?;

        midi_out.set_base(pos);
        let result = target.process_chunk(&mut chunk, chunk_midi, midi_out);
        midi_out.set_base(0);
        result?;

        pos = chunk_end;
    }

    Ok(())
}
