//! Per-callback orchestration between the audio driver and a processor.
//!
//! [`RealtimeAudioLoop`] owns everything the audio thread touches. All of it
//! is allocated in [`RealtimeAudioLoop::new`]; nothing in
//! [`process_interleaved`](RealtimeAudioLoop::process_interleaved) allocates,
//! locks or blocks.
//!
//! The control side keeps a [`LoopHandle`]. Replacing the input callback or
//! MIDI sink goes through a bounded command channel; the objects they replace
//! come back through a second channel so they are dropped off the audio
//! thread.

use crate::config::DEFAULT_MAX_MIDI_EVENTS_PER_BLOCK;
use crate::sink::MidiOutputSink;
use crate::stats::{LoopStats, LoopStatsSnapshot};
use crate::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use minihost_core::{AudioBlock, BlockProcessor, MidiOutput, PlanarBuffer};
use minihost_midi::{MidiEvent, MidiQueueConsumer};
use std::sync::Arc;

/// Fills the loop's input buffer for an effect. Called on the audio thread
/// with the number of frames to provide; must be realtime safe.
pub type InputCallback = Box<dyn FnMut(&mut PlanarBuffer<f32>, usize) + Send>;

const COMMAND_CAPACITY: usize = 16;

enum LoopCommand {
    SetInputCallback(Option<InputCallback>),
    SetMidiOutput(Option<Box<dyn MidiOutputSink>>),
}

/// Something the audio thread let go of.
enum Retired {
    InputCallback(InputCallback),
    MidiOutput(Box<dyn MidiOutputSink>),
}

/// Control-thread side of a [`RealtimeAudioLoop`].
pub struct LoopHandle {
    commands: Sender<LoopCommand>,
    retired: Receiver<Retired>,
    stats: Arc<LoopStats>,
}

impl LoopHandle {
    /// Takes effect at the start of the next callback. `None` feeds silence.
    pub fn set_input_callback(&self, callback: Option<InputCallback>) -> Result<()> {
        self.collect_retired();
        self.send(LoopCommand::SetInputCallback(callback))
    }

    pub fn set_midi_output(&self, sink: Option<Box<dyn MidiOutputSink>>) -> Result<()> {
        self.collect_retired();
        self.send(LoopCommand::SetMidiOutput(sink))
    }

    /// Drop whatever the audio thread has handed back. Returns how many.
    pub fn collect_retired(&self) -> usize {
        let mut count = 0;
        for retired in self.retired.try_iter() {
            match retired {
                Retired::InputCallback(_) => tracing::debug!("Dropped retired input callback"),
                Retired::MidiOutput(_) => tracing::debug!("Dropped retired MIDI output sink"),
            }
            count += 1;
        }
        count
    }

    pub fn stats(&self) -> LoopStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn shared_stats(&self) -> Arc<LoopStats> {
        Arc::clone(&self.stats)
    }

    fn send(&self, command: LoopCommand) -> Result<()> {
        self.commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => Error::CommandQueueFull,
            TrySendError::Disconnected(_) => Error::LoopClosed,
        })
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.collect_retired();
    }
}

/// Audio-thread side: runs one processor per driver callback.
pub struct RealtimeAudioLoop {
    processor: Box<dyn BlockProcessor<f32>>,
    midi_queue: MidiQueueConsumer,
    input: PlanarBuffer<f32>,
    output: PlanarBuffer<f32>,
    midi_in: Vec<MidiEvent>,
    midi_out: Vec<MidiEvent>,
    input_callback: Option<InputCallback>,
    midi_sink: Option<Box<dyn MidiOutputSink>>,
    commands: Receiver<LoopCommand>,
    retired: Sender<Retired>,
    stats: Arc<LoopStats>,
}

impl RealtimeAudioLoop {
    /// Pre-allocate for `buffer_frames * 2` frames, capped at the processor's
    /// max block size.
    pub fn new(
        processor: Box<dyn BlockProcessor<f32>>,
        midi_queue: MidiQueueConsumer,
        buffer_frames: usize,
        max_midi_events: usize,
    ) -> (Self, LoopHandle) {
        let capacity = buffer_frames
            .saturating_mul(2)
            .min(processor.max_block_size())
            .max(1);
        let max_midi_events = if max_midi_events == 0 {
            DEFAULT_MAX_MIDI_EVENTS_PER_BLOCK
        } else {
            max_midi_events
        };

        let (command_tx, command_rx) = bounded(COMMAND_CAPACITY);
        let (retired_tx, retired_rx) = bounded(COMMAND_CAPACITY);
        let stats = Arc::new(LoopStats::new());

        tracing::debug!(
            "Realtime loop: {} in / {} out, {} frames capacity, {} MIDI events per block",
            processor.input_channels(),
            processor.output_channels(),
            capacity,
            max_midi_events
        );

        let realtime = Self {
            input: PlanarBuffer::new(processor.input_channels(), capacity),
            output: PlanarBuffer::new(processor.output_channels(), capacity),
            midi_in: vec![MidiEvent::default(); max_midi_events],
            midi_out: vec![MidiEvent::default(); max_midi_events],
            processor,
            midi_queue,
            input_callback: None,
            midi_sink: None,
            commands: command_rx,
            retired: retired_tx,
            stats: Arc::clone(&stats),
        };
        let handle = LoopHandle {
            commands: command_tx,
            retired: retired_rx,
            stats,
        };
        (realtime, handle)
    }

    /// Frames processed per callback at most.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.output.capacity()
    }

    #[inline]
    pub fn output_channels(&self) -> usize {
        self.output.num_channels()
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.processor.sample_rate()
    }

    /// Render one driver buffer of interleaved `device_channels`-wide frames.
    ///
    /// Frames past [`capacity`](Self::capacity), device channels the
    /// processor does not produce, and the whole buffer after a failed block
    /// are written as silence.
    pub fn process_interleaved(&mut self, out: &mut [f32], device_channels: usize) {
        self.apply_commands();

        if device_channels == 0 {
            self.stats.record_callback(false);
            out.fill(0.0);
            return;
        }

        let requested = out.len() / device_channels;
        let frames = requested.min(self.capacity());
        self.stats.record_callback(frames < requested);

        match self.input_callback.as_mut() {
            Some(callback) => callback(&mut self.input, frames),
            None => self.input.clear(frames),
        }

        let drained = self.midi_queue.pop_all(&mut self.midi_in);
        self.stats.record_midi_in(drained);

        let result = run_block(
            self.processor.as_mut(),
            &self.input,
            &mut self.output,
            frames,
            &self.midi_in[..drained],
            &mut self.midi_out,
        );

        let (generated, mut dropped) = match result {
            Ok(counts) => counts,
            Err(_) => {
                self.stats.record_failure();
                out.fill(0.0);
                return;
            }
        };

        let mut sent = 0;
        match self.midi_sink.as_mut() {
            Some(sink) => {
                for event in &self.midi_out[..generated] {
                    if sink.send(event) {
                        sent += 1;
                    } else {
                        dropped += 1;
                    }
                }
            }
            None => dropped += generated,
        }
        self.stats.record_midi_out(sent, dropped);

        interleave(&self.output, frames, out, device_channels);
    }

    pub fn stats(&self) -> LoopStatsSnapshot {
        self.stats.snapshot()
    }

    /// For drivers that clamp before handing the buffer over.
    #[inline]
    pub(crate) fn note_clamped(&self) {
        self.stats.record_clamped();
    }

    fn apply_commands(&mut self) {
        // A replaced object must be handed back, so stop once the return
        // channel is full and pick the rest up next callback.
        while !self.retired.is_full() {
            let command = match self.commands.try_recv() {
                Ok(command) => command,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            let previous = match command {
                LoopCommand::SetInputCallback(callback) => {
                    std::mem::replace(&mut self.input_callback, callback)
                        .map(Retired::InputCallback)
                }
                LoopCommand::SetMidiOutput(sink) => {
                    std::mem::replace(&mut self.midi_sink, sink).map(Retired::MidiOutput)
                }
            };
            if let Some(previous) = previous {
                // Disconnected means the handle is gone; dropping here is
                // the only option left.
                let _ = self.retired.try_send(previous);
            }
        }
    }
}

/// Returns (events generated, events dropped by the collector).
fn run_block(
    processor: &mut dyn BlockProcessor<f32>,
    input: &PlanarBuffer<f32>,
    output: &mut PlanarBuffer<f32>,
    frames: usize,
    midi_in: &[MidiEvent],
    midi_slots: &mut [MidiEvent],
) -> minihost_core::Result<(usize, usize)> {
    let mut block = AudioBlock::from_parts(input.inputs(frames)?, output.outputs(frames)?)?;
    let mut midi_out = MidiOutput::new(midi_slots);
    processor.process_block(&mut block, midi_in, &mut midi_out)?;
    Ok((midi_out.len(), midi_out.dropped()))
}

/// Planar → interleaved. Everything in `out` not covered by
/// `frames` × produced channels is zeroed.
fn interleave(planar: &PlanarBuffer<f32>, frames: usize, out: &mut [f32], device_channels: usize) {
    let whole = out.len() - out.len() % device_channels;
    let (body, partial) = out.split_at_mut(whole);
    partial.fill(0.0);

    for (i, frame) in body.chunks_exact_mut(device_channels).enumerate() {
        if i >= frames {
            frame.fill(0.0);
            continue;
        }
        for (ch, sample) in frame.iter_mut().enumerate() {
            *sample = planar.channel(ch).map_or(0.0, |c| c[i]);
        }
    }
}
