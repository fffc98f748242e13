//! Serial plugin chains.
//!
//! Stage N's output feeds stage N+1's input through intermediate buffers
//! allocated once at construction. Each intermediate holds
//! `max(upstream outputs, downstream inputs)` channels; when the downstream
//! stage wants more inputs than upstream produced, the surplus channels are
//! zeroed before every call so stale audio never leaks through. Sidechain
//! inputs of later stages count as surplus and read silence.

use crate::automation::{process_chunked, ChainParamChange, ChunkTarget};
use crate::backend::{PluginBackend, ProcessSample};
use crate::buffer::{AudioBlock, PlanarBuffer};
use crate::midi::{MidiInput, MidiOutput};
use crate::processor::BlockProcessor;
use crate::transport::TransportInfo;
use crate::{Error, Result};
use minihost_midi::MidiEvent;
use std::sync::Arc;

pub const DEFAULT_MAX_BLOCK_SIZE: usize = 8192;

/// Largest sample rate difference tolerated between stages.
const SAMPLE_RATE_TOLERANCE: f64 = 0.1;

struct Stage {
    backend: Arc<dyn PluginBackend>,
    /// Main plus sidechain.
    input_channels: usize,
    output_channels: usize,
}

/// Ordered stage list plus the block size intermediates are sized for.
///
/// ```ignore
/// let chain = PluginChain::<f32>::builder()
///     .stage(synth)
///     .stage(reverb)
///     .max_block_size(1024)
///     .build()?;
/// ```
#[derive(Default)]
pub struct PluginChainBuilder {
    slots: Vec<Option<Arc<dyn PluginBackend>>>,
    max_block_size: Option<usize>,
}

impl PluginChainBuilder {
    pub fn stage(mut self, backend: Arc<dyn PluginBackend>) -> Self {
        self.slots.push(Some(backend));
        self
    }

    /// A slot that may be empty. Building fails if any slot is `None`.
    pub fn slot(mut self, backend: Option<Arc<dyn PluginBackend>>) -> Self {
        self.slots.push(backend);
        self
    }

    pub fn max_block_size(mut self, frames: usize) -> Self {
        self.max_block_size = Some(frames);
        self
    }

    pub fn build<T: ProcessSample>(self) -> Result<PluginChain<T>> {
        PluginChain::from_slots(
            self.slots,
            self.max_block_size.unwrap_or(DEFAULT_MAX_BLOCK_SIZE),
        )
    }
}

pub struct PluginChain<T = f32> {
    stages: Vec<Stage>,
    /// `buffers[i]` sits between stage `i` and stage `i + 1`.
    buffers: Vec<PlanarBuffer<T>>,
    sample_rate: f64,
    max_block_size: usize,
}

impl<T: ProcessSample> PluginChain<T> {
    pub fn builder() -> PluginChainBuilder {
        PluginChainBuilder::default()
    }

    /// Chain with [`DEFAULT_MAX_BLOCK_SIZE`].
    pub fn new(backends: Vec<Arc<dyn PluginBackend>>) -> Result<Self> {
        Self::from_slots(
            backends.into_iter().map(Some).collect(),
            DEFAULT_MAX_BLOCK_SIZE,
        )
    }

    pub fn from_slots(
        slots: Vec<Option<Arc<dyn PluginBackend>>>,
        max_block_size: usize,
    ) -> Result<Self> {
        if slots.is_empty() {
            return Err(Error::EmptyChain);
        }
        if max_block_size == 0 {
            return Err(Error::InvalidConfig(
                "max block size must be at least 1".into(),
            ));
        }

        let mut stages = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            let backend = slot.ok_or(Error::MissingStage { index })?;
            if !T::supported_by(&*backend) {
                return Err(Error::StageDoublePrecisionUnsupported { stage: index });
            }
            let info = backend.info();
            stages.push(Stage {
                backend,
                input_channels: info.total_input_channels(),
                output_channels: info.output_channels,
            });
        }

        let sample_rate = stages[0].backend.sample_rate();
        for (index, stage) in stages.iter().enumerate().skip(1) {
            let actual = stage.backend.sample_rate();
            if (actual - sample_rate).abs() > SAMPLE_RATE_TOLERANCE {
                return Err(Error::SampleRateMismatch {
                    stage: index,
                    expected: sample_rate,
                    actual,
                });
            }
        }

        let buffers = stages
            .windows(2)
            .map(|pair| {
                let channels = pair[0].output_channels.max(pair[1].input_channels);
                PlanarBuffer::new(channels, max_block_size)
            })
            .collect();

        let chain = Self {
            stages,
            buffers,
            sample_rate,
            max_block_size,
        };
        tracing::debug!(
            "Built plugin chain: {} stages, {} Hz, {} in / {} out, {} samples latency",
            chain.num_stages(),
            sample_rate,
            chain.input_channels(),
            chain.output_channels(),
            chain.latency_samples()
        );
        Ok(chain)
    }

    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn stage(&self, index: usize) -> Option<&Arc<dyn PluginBackend>> {
        self.stages.get(index).map(|s| &s.backend)
    }

    /// Inputs of the first stage, sidechain included.
    pub fn input_channels(&self) -> usize {
        self.stages.first().map_or(0, |s| s.input_channels)
    }

    /// Outputs of the last stage.
    pub fn output_channels(&self) -> usize {
        self.stages.last().map_or(0, |s| s.output_channels)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Sum of stage latencies.
    pub fn latency_samples(&self) -> usize {
        self.stages.iter().map(|s| s.backend.latency_samples()).sum()
    }

    /// Longest stage tail.
    pub fn tail_seconds(&self) -> f64 {
        self.stages
            .iter()
            .map(|s| s.backend.tail_seconds())
            .fold(0.0, f64::max)
    }

    /// Reset every stage in order, stopping at the first failure.
    pub fn reset(&self) -> Result<()> {
        for (index, stage) in self.stages.iter().enumerate() {
            stage.backend.reset().inspect_err(|e| {
                tracing::warn!("Reset failed at chain stage {}: {}", index, e);
            })?;
        }
        Ok(())
    }

    pub fn set_non_realtime(&self, non_realtime: bool) -> Result<()> {
        for stage in &self.stages {
            stage.backend.set_non_realtime(non_realtime)?;
        }
        Ok(())
    }

    /// Hand the playhead to every stage. Stages without transport support
    /// are skipped; any other failure stops the fan-out.
    pub fn set_transport(&self, transport: Option<&TransportInfo>) -> Result<()> {
        for (index, stage) in self.stages.iter().enumerate() {
            match stage.backend.set_transport(transport) {
                Ok(()) | Err(Error::Unsupported(_)) => {}
                Err(e) => {
                    tracing::warn!("Transport update failed at chain stage {}: {}", index, e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Audio only.
    pub fn process(&mut self, block: &mut AudioBlock<'_, T>) -> Result<()> {
        self.process_auto(block, &[], &mut MidiOutput::discard(), &[])
    }

    /// MIDI goes to the first stage, MIDI output is collected from it.
    pub fn process_midi(
        &mut self,
        block: &mut AudioBlock<'_, T>,
        midi_in: &[MidiEvent],
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        self.process_auto(block, midi_in, midi_out, &[])
    }

    /// Split the block at change offsets and run the whole chain per chunk.
    /// Changes addressed to a stage outside the chain are ignored.
    pub fn process_auto(
        &mut self,
        block: &mut AudioBlock<'_, T>,
        midi_in: &[MidiEvent],
        midi_out: &mut MidiOutput<'_>,
        changes: &[ChainParamChange],
    ) -> Result<()> {
        let frames = block.frames();
        if frames > self.max_block_size {
            return Err(Error::BlockTooLarge {
                frames,
                max: self.max_block_size,
            });
        }

        if changes.is_empty() {
            return self.traverse(block, MidiInput::new(midi_in, frames), midi_out);
        }
        process_chunked(self, block, midi_in, midi_out, changes)
    }

    /// One pass through every stage.
    fn traverse(
        &mut self,
        block: &mut AudioBlock<'_, T>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        let frames = block.frames();
        let last = self.stages.len() - 1;

        if last == 0 {
            return T::process(&*self.stages[0].backend, block, midi_in, midi_out)
                .map_err(stage_failed(0));
        }

        {
            let mut first = AudioBlock::from_parts(block.inputs(), self.buffers[0].outputs(frames)?)?;
            T::process(&*self.stages[0].backend, &mut first, midi_in, midi_out)
                .map_err(stage_failed(0))?;
        }

        for index in 1..last {
            self.zero_missing_inputs(index, frames);
            let (upstream, downstream) = self.buffers.split_at_mut(index);
            let mut middle = AudioBlock::from_parts(
                upstream[index - 1].inputs(frames)?,
                downstream[0].outputs(frames)?,
            )?;
            T::process(
                &*self.stages[index].backend,
                &mut middle,
                MidiInput::empty(),
                &mut MidiOutput::discard(),
            )
            .map_err(stage_failed(index))?;
        }

        self.zero_missing_inputs(last, frames);
        let mut final_block =
            AudioBlock::from_parts(self.buffers[last - 1].inputs(frames)?, block.outputs())?;
        T::process(
            &*self.stages[last].backend,
            &mut final_block,
            MidiInput::empty(),
            &mut MidiOutput::discard(),
        )
        .map_err(stage_failed(last))
    }

    /// Zero intermediate channels `stage` reads but `stage - 1` never writes.
    fn zero_missing_inputs(&mut self, stage: usize, frames: usize) {
        let produced = self.stages[stage - 1].output_channels;
        let wanted = self.stages[stage].input_channels;
        if wanted > produced {
            self.buffers[stage - 1].clear_channels(produced..wanted, frames);
        }
    }
}

fn stage_failed(stage: usize) -> impl FnOnce(Error) -> Error {
    move |source| Error::StageFailed {
        stage,
        source: Box::new(source),
    }
}

impl<T: ProcessSample> ChunkTarget<T> for PluginChain<T> {
    type Change = ChainParamChange;

    #[inline]
    fn apply_change(&mut self, change: &ChainParamChange, value: f32) {
        if let Some(stage) = self.stages.get(change.plugin_index) {
            stage.backend.set_parameter_rt(change.param_index, value);
        }
    }

    #[inline]
    fn process_chunk(
        &mut self,
        block: &mut AudioBlock<'_, T>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        self.traverse(block, midi_in, midi_out)
    }
}

impl<T: ProcessSample> BlockProcessor<T> for PluginChain<T> {
    fn input_channels(&self) -> usize {
        PluginChain::input_channels(self)
    }

    fn output_channels(&self) -> usize {
        PluginChain::output_channels(self)
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    fn process_block(
        &mut self,
        block: &mut AudioBlock<'_, T>,
        midi_in: &[MidiEvent],
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        self.process_midi(block, midi_in, midi_out)
    }
}
