//! Single-backend processing with sample-accurate automation.

use crate::automation::{process_chunked, ChunkTarget, ParamChange};
use crate::backend::{BackendInfo, PluginBackend, ProcessSample};
use crate::buffer::AudioBlock;
use crate::midi::{MidiInput, MidiOutput};
use crate::{Error, Result};
use minihost_midi::MidiEvent;
use std::marker::PhantomData;
use std::sync::Arc;

/// Anything that turns one block plus MIDI into output, at a fixed rate and
/// channel layout. Implemented by [`SampleAccurateProcessor`] and
/// [`PluginChain`](crate::PluginChain) so the device loop can drive either.
pub trait BlockProcessor<T = f32>: Send {
    fn input_channels(&self) -> usize;

    fn output_channels(&self) -> usize;

    fn sample_rate(&self) -> f64;

    fn max_block_size(&self) -> usize;

    /// `midi_in` must be sorted by offset.
    fn process_block(
        &mut self,
        block: &mut AudioBlock<'_, T>,
        midi_in: &[MidiEvent],
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()>;
}

/// Drives one backend, splitting blocks at parameter change offsets.
///
/// ```ignore
/// use minihost_core::testing::RecordingBackend;
/// use minihost_core::{AudioBlock, MidiOutput, ParamChange, SampleAccurateProcessor};
/// use std::sync::Arc;
///
/// let backend = Arc::new(RecordingBackend::new(0, 1));
/// let processor = SampleAccurateProcessor::<f32>::new(backend.clone(), 512).unwrap();
///
/// let mut output = vec![vec![0.0f32; 128]];
/// let mut block = AudioBlock::output_only(&mut output, 128).unwrap();
/// let changes = [ParamChange::new(64, 1, 0.5)];
/// processor
///     .process_auto(&mut block, &[], &mut MidiOutput::discard(), &changes)
///     .unwrap();
///
/// assert_eq!(backend.calls().len(), 2);
/// ```
pub struct SampleAccurateProcessor<T = f32> {
    backend: Arc<dyn PluginBackend>,
    info: BackendInfo,
    sample_rate: f64,
    max_block_size: usize,
    _sample: PhantomData<fn() -> T>,
}

impl<T: ProcessSample> SampleAccurateProcessor<T> {
    /// Channel layout and sample rate are read once, here. Fails with
    /// [`Error::DoublePrecisionUnsupported`] when `T` is `f64` and the backend
    /// only processes `f32`.
    pub fn new(backend: Arc<dyn PluginBackend>, max_block_size: usize) -> Result<Self> {
        if max_block_size == 0 {
            return Err(Error::InvalidConfig(
                "max block size must be at least 1".into(),
            ));
        }
        if !T::supported_by(&*backend) {
            return Err(Error::DoublePrecisionUnsupported);
        }
        let info = backend.info();
        let sample_rate = backend.sample_rate();
        Ok(Self {
            backend,
            info,
            sample_rate,
            max_block_size,
            _sample: PhantomData,
        })
    }

    pub fn backend(&self) -> &Arc<dyn PluginBackend> {
        &self.backend
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Main plus sidechain inputs.
    pub fn input_channels(&self) -> usize {
        self.info.total_input_channels()
    }

    pub fn output_channels(&self) -> usize {
        self.info.output_channels
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Audio only.
    pub fn process(&self, block: &mut AudioBlock<'_, T>) -> Result<()> {
        self.process_auto(block, &[], &mut MidiOutput::discard(), &[])
    }

    /// MIDI in and out, no automation.
    pub fn process_midi(
        &self,
        block: &mut AudioBlock<'_, T>,
        midi_in: &[MidiEvent],
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        self.process_auto(block, midi_in, midi_out, &[])
    }

    /// Apply `changes` at their exact offsets. `changes` and `midi_in` must be
    /// sorted by offset.
    ///
    /// On failure the output written so far is unspecified.
    pub fn process_auto(
        &self,
        block: &mut AudioBlock<'_, T>,
        midi_in: &[MidiEvent],
        midi_out: &mut MidiOutput<'_>,
        changes: &[ParamChange],
    ) -> Result<()> {
        let frames = block.frames();
        if frames > self.max_block_size {
            return Err(Error::BlockTooLarge {
                frames,
                max: self.max_block_size,
            });
        }

        if changes.is_empty() {
            return T::process(
                &*self.backend,
                block,
                MidiInput::new(midi_in, frames),
                midi_out,
            );
        }

        let mut target = BackendTarget {
            backend: &*self.backend,
        };
        process_chunked(&mut target, block, midi_in, midi_out, changes)
    }
}

struct BackendTarget<'a> {
    backend: &'a dyn PluginBackend,
}

impl<T: ProcessSample> ChunkTarget<T> for BackendTarget<'_> {
    type Change = ParamChange;

    #[inline]
    fn apply_change(&mut self, change: &ParamChange, value: f32) {
        self.backend.set_parameter_rt(change.param_index, value);
    }

    #[inline]
    fn process_chunk(
        &mut self,
        block: &mut AudioBlock<'_, T>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        T::process(self.backend, block, midi_in, midi_out)
    }
}

impl<T: ProcessSample> BlockProcessor<T> for SampleAccurateProcessor<T> {
    fn input_channels(&self) -> usize {
        self.info.total_input_channels()
    }

    fn output_channels(&self) -> usize {
        self.info.output_channels
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingBackend, PARAM_GAIN, PARAM_OFFSET};
    use crate::PlanarBuffer;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn processor(backend: &Arc<RecordingBackend>) -> SampleAccurateProcessor<f32> {
        SampleAccurateProcessor::new(backend.clone(), 512).unwrap()
    }

    #[test]
    fn test_rejects_zero_max_block() {
        let backend = Arc::new(RecordingBackend::new(1, 1));
        assert!(SampleAccurateProcessor::<f32>::new(backend, 0).is_err());
    }

    #[test]
    fn test_block_too_large() {
        let backend = Arc::new(RecordingBackend::new(0, 1));
        let processor = SampleAccurateProcessor::<f32>::new(backend.clone(), 64).unwrap();
        let mut output = PlanarBuffer::<f32>::new(1, 128);
        let mut block = AudioBlock::output_only(&mut output, 128).unwrap();
        let err = processor.process(&mut block).err().unwrap();
        assert!(matches!(err, Error::BlockTooLarge { frames: 128, max: 64 }));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_fast_path_is_single_call() {
        let backend = Arc::new(RecordingBackend::new(1, 1));
        let input = PlanarBuffer::<f32>::new(1, 256);
        let mut output = PlanarBuffer::<f32>::new(1, 256);
        let mut block = AudioBlock::new(&input, &mut output, 256).unwrap();
        processor(&backend).process(&mut block).unwrap();
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(backend.calls()[0].frames, 256);
    }

    #[test]
    fn test_fast_path_clamps_late_midi() {
        let backend = Arc::new(RecordingBackend::new(0, 1));
        let mut output = PlanarBuffer::<f32>::new(1, 64);
        let mut block = AudioBlock::output_only(&mut output, 64).unwrap();
        let midi = [MidiEvent::note_on(1000, 0, 60, 100)];
        processor(&backend)
            .process_midi(&mut block, &midi, &mut MidiOutput::discard())
            .unwrap();
        assert_eq!(backend.calls()[0].midi[0].sample_offset, 63);
    }

    #[test]
    fn test_offset_change_lands_at_exact_sample() {
        // Instrument with gain 0: output is the offset parameter alone.
        let backend = Arc::new(RecordingBackend::new(0, 1).with_params(&[0.0, 0.0]));
        let mut output = PlanarBuffer::<f32>::new(1, 100);
        let mut block = AudioBlock::output_only(&mut output, 100).unwrap();
        let changes = [ParamChange::new(37, PARAM_OFFSET, 0.75)];
        processor(&backend)
            .process_auto(&mut block, &[], &mut MidiOutput::discard(), &changes)
            .unwrap();
        drop(block);

        let ch = output.channel(0).unwrap();
        assert!(ch[..37].iter().all(|&s| s == 0.0));
        assert!(ch[37..].iter().all(|&s| (s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn test_co_located_changes_apply_in_order() {
        let backend = Arc::new(RecordingBackend::new(0, 1));
        let mut output = PlanarBuffer::<f32>::new(1, 32);
        let mut block = AudioBlock::output_only(&mut output, 32).unwrap();
        let changes = [
            ParamChange::new(8, PARAM_GAIN, 0.2),
            ParamChange::new(8, PARAM_GAIN, 0.6),
            ParamChange::new(8, PARAM_OFFSET, 0.1),
        ];
        processor(&backend)
            .process_auto(&mut block, &[], &mut MidiOutput::discard(), &changes)
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].params, vec![1.0, 0.0]);
        assert_relative_eq!(calls[1].params[0], 0.6);
        assert_relative_eq!(calls[1].params[1], 0.1);
    }

    #[test]
    fn test_midi_rebased_both_ways() {
        let backend = Arc::new(RecordingBackend::new(0, 1).echo_midi());
        let mut output = PlanarBuffer::<f32>::new(1, 128);
        let mut block = AudioBlock::output_only(&mut output, 128).unwrap();
        let midi = [
            MidiEvent::note_on(10, 0, 60, 100),
            MidiEvent::note_on(80, 0, 64, 100),
        ];
        let changes = [ParamChange::new(64, PARAM_GAIN, 0.5)];
        let mut slots = [MidiEvent::default(); 16];
        let mut out = MidiOutput::new(&mut slots);

        processor(&backend)
            .process_auto(&mut block, &midi, &mut out, &changes)
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls[0].midi, vec![MidiEvent::note_on(10, 0, 60, 100)]);
        assert_eq!(calls[1].midi, vec![MidiEvent::note_on(16, 0, 64, 100)]);
        assert_eq!(out.events(), &midi[..]);
    }

    #[test]
    fn test_midi_output_truncated_to_capacity() {
        let backend = Arc::new(RecordingBackend::new(0, 1).echo_midi());
        let mut output = PlanarBuffer::<f32>::new(1, 64);
        let mut block = AudioBlock::output_only(&mut output, 64).unwrap();
        let midi: Vec<_> = (0..5).map(|i| MidiEvent::note_on(i * 10, 0, 60, 1)).collect();
        let changes = [ParamChange::new(25, PARAM_GAIN, 0.5)];
        let mut slots = [MidiEvent::default(); 3];
        let mut out = MidiOutput::new(&mut slots);

        processor(&backend)
            .process_auto(&mut block, &midi, &mut out, &changes)
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out.dropped(), 2);
        assert_eq!(out.events()[2].sample_offset, 20);
    }

    #[test]
    fn test_failure_aborts_remaining_chunks() {
        let backend = Arc::new(RecordingBackend::new(0, 1).fail_from_call(1));
        let mut output = PlanarBuffer::<f32>::new(1, 64);
        let mut block = AudioBlock::output_only(&mut output, 64).unwrap();
        let changes = [
            ParamChange::new(16, PARAM_GAIN, 0.5),
            ParamChange::new(32, PARAM_GAIN, 0.25),
        ];
        let result =
            processor(&backend).process_auto(&mut block, &[], &mut MidiOutput::discard(), &changes);
        assert!(matches!(result, Err(Error::ProcessFailed)));
        // First chunk succeeded, second failed, third never ran.
        assert_eq!(backend.calls().len(), 2);
        assert_relative_eq!(backend.param(PARAM_GAIN), 0.5);
    }

    #[test]
    fn test_double_precision_dispatch() {
        let backend = Arc::new(RecordingBackend::new(1, 1));
        let processor = SampleAccurateProcessor::<f64>::new(backend.clone(), 64).unwrap();
        let input = vec![vec![0.5f64; 16]];
        let mut output = vec![vec![0.0f64; 16]];
        let mut block = AudioBlock::new(&input, &mut output, 16).unwrap();
        processor.process(&mut block).unwrap();
        drop(block);
        assert!(backend.calls()[0].double_precision);
        assert_relative_eq!(output[0][15], 0.5);

    }

    #[test]
    fn test_double_precision_rejected_at_construction() {
        let single: Arc<dyn PluginBackend> =
            Arc::new(RecordingBackend::new(1, 1).single_precision_only());
        assert!(matches!(
            SampleAccurateProcessor::<f64>::new(single.clone(), 64),
            Err(Error::DoublePrecisionUnsupported)
        ));
        assert!(SampleAccurateProcessor::<f32>::new(single, 64).is_ok());
    }

    #[test]
    fn test_sidechain_counts_as_input() {
        let backend = Arc::new(RecordingBackend::new(2, 2).with_sidechain(2));
        let processor = SampleAccurateProcessor::<f32>::new(backend.clone(), 64).unwrap();
        assert_eq!(processor.input_channels(), 4);

        let input = vec![vec![1.0f32; 8], vec![1.0; 8], vec![0.25; 8], vec![0.75; 8]];
        let mut output = vec![vec![0.0f32; 8]; 2];
        let mut block = AudioBlock::new(&input, &mut output, 8).unwrap();
        processor.process(&mut block).unwrap();
        drop(block);

        let seen = &backend.calls()[0].inputs;
        assert_relative_eq!(seen[2][0], 0.25);
        assert_relative_eq!(seen[3][0], 0.75);
        assert!(output.iter().all(|ch| ch.iter().all(|&s| s == 1.0)));
    }

    #[test]
    fn test_bypass_passes_main_inputs_through() {
        let backend = Arc::new(RecordingBackend::new(1, 1).with_params(&[0.25, 0.5]));
        let processor = SampleAccurateProcessor::<f32>::new(backend.clone(), 64).unwrap();
        backend.set_bypass(true).unwrap();
        assert!(backend.get_bypass().unwrap());

        let input = vec![vec![0.8f32; 8]];
        let mut output = vec![vec![0.0f32; 8]];
        let mut block = AudioBlock::new(&input, &mut output, 8).unwrap();
        processor.process(&mut block).unwrap();
        drop(block);
        assert_relative_eq!(output[0][7], 0.8);
    }

    proptest! {
        #[test]
        fn fast_path_matches_single_call(
            frames in 1usize..=512,
            samples in proptest::collection::vec(-1.0f32..1.0, 512),
            gain in 0.0f32..1.0,
        ) {
            let input = vec![samples[..frames].to_vec()];

            let chunked = Arc::new(RecordingBackend::new(1, 1).with_params(&[gain, 0.0]));
            let mut out_a = vec![vec![0.0f32; frames]];
            let mut block = AudioBlock::new(&input, &mut out_a, frames).unwrap();
            processor(&chunked)
                .process_auto(&mut block, &[], &mut MidiOutput::discard(), &[])
                .unwrap();
            drop(block);

            let direct = RecordingBackend::new(1, 1).with_params(&[gain, 0.0]);
            let mut out_b = vec![vec![0.0f32; frames]];
            let mut block = AudioBlock::new(&input, &mut out_b, frames).unwrap();
            direct
                .process(&mut block, MidiInput::new(&[], frames), &mut MidiOutput::discard())
                .unwrap();
            drop(block);

            prop_assert_eq!(out_a, out_b);
            prop_assert_eq!(chunked.calls().len(), 1);
        }
    }
}
