//! Sample-accurate automation on a single plugin

use crate::helpers::{ramp, shared, tolerances::FLOAT_EPSILON};
use approx::assert_relative_eq;
use minihost::{AudioBlock, MidiEvent, MidiOutput, ParamChange, SampleAccurateProcessor};
use minihost_core::testing::{RecordingBackend, PARAM_GAIN, PARAM_OFFSET};
use proptest::prelude::*;

#[test]
fn test_gain_steps_exactly_at_change_offsets() {
    let backend = RecordingBackend::new(1, 1).into_shared();
    let processor = SampleAccurateProcessor::<f32>::new(shared(&backend), 256).unwrap();

    let input = ramp(1, 256);
    let mut output = vec![vec![0.0f32; 256]];
    let mut block = AudioBlock::new(&input, &mut output, 256).unwrap();
    let changes = [
        ParamChange::new(0, PARAM_GAIN, 0.5),
        ParamChange::new(100, PARAM_GAIN, 0.25),
        ParamChange::new(100, PARAM_OFFSET, 1.0),
    ];
    processor
        .process_auto(&mut block, &[], &mut MidiOutput::discard(), &changes)
        .unwrap();

    for i in 0..100 {
        assert_relative_eq!(output[0][i], i as f32 * 0.5, epsilon = FLOAT_EPSILON);
    }
    for i in 100..256 {
        assert_relative_eq!(output[0][i], i as f32 * 0.25 + 1.0, epsilon = FLOAT_EPSILON);
    }
    assert_eq!(backend.calls().len(), 2);
}

#[test]
fn test_midi_rebased_into_chunk_and_output_restored() {
    let backend = RecordingBackend::new(0, 2).echo_midi().into_shared();
    let processor = SampleAccurateProcessor::<f32>::new(shared(&backend), 512).unwrap();

    let mut output = vec![vec![0.0f32; 512]; 2];
    let mut block = AudioBlock::output_only(&mut output, 512).unwrap();
    let midi = [
        MidiEvent::note_on(10, 0, 60, 100),
        MidiEvent::note_off(300, 0, 60, 0),
    ];
    let mut slots = [MidiEvent::default(); 8];
    let mut midi_out = MidiOutput::new(&mut slots);
    processor
        .process_auto(
            &mut block,
            &midi,
            &mut midi_out,
            &[ParamChange::new(256, PARAM_GAIN, 1.0)],
        )
        .unwrap();

    let calls = backend.calls();
    assert_eq!(calls[1].midi, vec![MidiEvent::note_off(44, 0, 60, 0)]);
    assert_eq!(midi_out.events(), &midi[..]);
}

proptest! {
    #[test]
    fn prop_output_uses_gain_in_effect_at_each_frame(
        frames in 1usize..=256,
        mut offsets in proptest::collection::vec(0usize..300, 0..6),
        gains in proptest::collection::vec(0.0f32..=1.0, 6),
    ) {
        offsets.sort_unstable();
        let changes: Vec<_> = offsets
            .iter()
            .zip(&gains)
            .map(|(&offset, &gain)| ParamChange::new(offset, PARAM_GAIN, gain))
            .collect();

        let backend = RecordingBackend::new(1, 1).into_shared();
        let processor = SampleAccurateProcessor::<f32>::new(shared(&backend), 256).unwrap();
        let input = vec![vec![1.0f32; frames]];
        let mut output = vec![vec![0.0f32; frames]];
        let mut block = AudioBlock::new(&input, &mut output, frames).unwrap();
        processor
            .process_auto(&mut block, &[], &mut MidiOutput::discard(), &changes)
            .unwrap();

        for (i, &sample) in output[0].iter().enumerate() {
            let expected = changes
                .iter()
                .filter(|c| c.sample_offset <= i)
                .last()
                .map_or(1.0, |c| c.value);
            prop_assert!((sample - expected).abs() < FLOAT_EPSILON);
        }
    }
}
