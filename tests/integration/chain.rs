//! Plugin chain tests

use crate::helpers::{constant, is_silent, shared, tolerances::FLOAT_EPSILON, TEST_BUFFER_SIZE};
use approx::assert_relative_eq;
use minihost::{AudioBlock, ChainParamChange, MidiEvent, MidiOutput, PluginChain, TransportInfo};
use minihost_core::testing::{RecordingBackend, PARAM_GAIN, PARAM_OFFSET};
use minihost_core::Error as CoreError;

#[test]
fn test_stages_run_in_order() {
    let gain = RecordingBackend::new(2, 2).with_params(&[0.5, 0.0]).into_shared();
    let offset = RecordingBackend::new(2, 2).with_params(&[1.0, 0.25]).into_shared();
    let mut chain = PluginChain::<f32>::new(vec![shared(&gain), shared(&offset)]).unwrap();

    let input = constant(2, 64, 1.0);
    let mut output = constant(2, 64, 0.0);
    let mut block = AudioBlock::new(&input, &mut output, 64).unwrap();
    chain.process(&mut block).unwrap();

    for channel in &output {
        for &sample in channel {
            assert_relative_eq!(sample, 0.75, epsilon = FLOAT_EPSILON);
        }
    }
}

#[test]
fn test_wider_downstream_sees_zeroed_extra_channels() {
    let narrow = RecordingBackend::new(2, 2).with_params(&[1.0, 0.5]).into_shared();
    let wide = RecordingBackend::new(4, 4).into_shared();
    let mut chain = PluginChain::<f32>::new(vec![shared(&narrow), shared(&wide)]).unwrap();
    assert_eq!(chain.output_channels(), 4);

    for _ in 0..3 {
        let input = constant(2, 32, 1.0);
        let mut output = constant(4, 32, 9.0);
        let mut block = AudioBlock::new(&input, &mut output, 32).unwrap();
        chain.process(&mut block).unwrap();
        assert!(is_silent(&output[2]));
        assert!(is_silent(&output[3]));
    }

    for call in wide.calls() {
        assert!(call.inputs[0].iter().all(|&s| s == 1.5));
        assert!(call.inputs[2].iter().all(|&s| s == 0.0));
        assert!(call.inputs[3].iter().all(|&s| s == 0.0));
    }
}

#[test]
fn test_chain_automation_targets_one_stage() {
    let first = RecordingBackend::new(1, 1).into_shared();
    let second = RecordingBackend::new(1, 1).into_shared();
    let mut chain = PluginChain::<f32>::builder()
        .stage(first.clone())
        .stage(second.clone())
        .max_block_size(128)
        .build::<f32>()
        .unwrap();

    let input = constant(1, 128, 1.0);
    let mut output = constant(1, 128, 0.0);
    let mut block = AudioBlock::new(&input, &mut output, 128).unwrap();
    let changes = [
        ChainParamChange::new(64, 1, PARAM_OFFSET, 0.5),
        ChainParamChange::new(96, 7, PARAM_GAIN, 0.0),
    ];
    chain
        .process_auto(&mut block, &[], &mut MidiOutput::discard(), &changes)
        .unwrap();

    assert!(output[0][..64].iter().all(|&s| s == 1.0));
    assert!(output[0][64..].iter().all(|&s| s == 1.5));
    assert_eq!(first.param(PARAM_OFFSET), 0.0);
    assert_eq!(second.param(PARAM_OFFSET), 0.5);
}

#[test]
fn test_midi_reaches_only_first_stage() {
    let first = RecordingBackend::new(0, 2).echo_midi().into_shared();
    let second = RecordingBackend::new(2, 2).echo_midi().into_shared();
    let mut chain = PluginChain::<f32>::new(vec![shared(&first), shared(&second)]).unwrap();

    let mut output = constant(2, 64, 0.0);
    let mut block = AudioBlock::output_only(&mut output, 64).unwrap();
    let midi = [MidiEvent::note_on(5, 0, 48, 90)];
    let mut slots = [MidiEvent::default(); 4];
    let mut midi_out = MidiOutput::new(&mut slots);
    chain.process_midi(&mut block, &midi, &mut midi_out).unwrap();

    assert_eq!(first.calls()[0].midi.len(), 1);
    assert!(second.calls()[0].midi.is_empty());
    assert_eq!(midi_out.events(), &midi[..]);
}

#[test]
fn test_failure_reports_stage_and_later_stages_skip() {
    let first = RecordingBackend::new(1, 1).into_shared();
    let broken = RecordingBackend::new(1, 1).fail_from_call(0).into_shared();
    let last = RecordingBackend::new(1, 1).into_shared();
    let mut chain =
        PluginChain::<f32>::new(vec![shared(&first), shared(&broken), shared(&last)]).unwrap();

    let input = constant(1, 16, 1.0);
    let mut output = constant(1, 16, 0.0);
    let mut block = AudioBlock::new(&input, &mut output, 16).unwrap();
    let err = chain.process(&mut block).unwrap_err();

    match err {
        CoreError::StageFailed { stage, source } => {
            assert_eq!(stage, 1);
            assert!(matches!(*source, CoreError::ProcessFailed));
        }
        other => panic!("expected stage failure, got {other}"),
    }
    assert!(last.calls().is_empty());
}

#[test]
fn test_latency_tail_and_control_fan_out() {
    let stages = [
        RecordingBackend::new(2, 2).with_latency(10).into_shared(),
        RecordingBackend::new(2, 2).with_tail(2.5).into_shared(),
        RecordingBackend::new(2, 2).with_latency(5).with_tail(1.0).into_shared(),
    ];
    let chain = PluginChain::<f32>::new(stages.iter().map(shared).collect()).unwrap();

    assert_eq!(chain.latency_samples(), 15);
    assert_relative_eq!(chain.tail_seconds(), 2.5);

    chain.set_non_realtime(true).unwrap();
    chain.reset().unwrap();
    for stage in &stages {
        assert!(stage.is_non_realtime());
        assert_eq!(stage.resets(), 1);
    }
}

#[test]
fn test_transport_skips_stages_without_playhead() {
    let synced = RecordingBackend::new(0, 2).into_shared();
    let plain = RecordingBackend::new(2, 2).without_transport().into_shared();
    let delay = RecordingBackend::new(2, 2).into_shared();
    let mut chain =
        PluginChain::<f32>::new(vec![shared(&synced), shared(&plain), shared(&delay)]).unwrap();

    let transport = TransportInfo::new(140.0).playing(true);
    chain.set_transport(Some(&transport)).unwrap();
    assert_eq!(synced.transport(), Some(transport));
    assert_eq!(plain.transport(), None);
    assert_eq!(delay.transport(), Some(transport));

    let mut output = constant(2, TEST_BUFFER_SIZE, 0.0);
    let mut block = AudioBlock::output_only(&mut output, TEST_BUFFER_SIZE).unwrap();
    chain.process(&mut block).unwrap();
    assert_eq!(delay.calls()[0].transport, Some(transport));
}

#[test]
fn test_empty_chain_rejected() {
    assert!(matches!(
        PluginChain::<f32>::new(Vec::new()),
        Err(CoreError::EmptyChain)
    ));
}
