//! Realtime device loop, driven one callback at a time

use crate::helpers::{shared, tolerances::FLOAT_EPSILON, TEST_BUFFER_SIZE};
use approx::assert_relative_eq;
use minihost::{MidiEvent, MidiEventQueue, PluginChain, QueueMidiSink, RealtimeAudioLoop};
use minihost_core::testing::RecordingBackend;

#[test]
fn test_instrument_chain_renders_across_callbacks() {
    let synth = RecordingBackend::new(0, 2)
        .with_params(&[1.0, 0.5])
        .echo_midi()
        .into_shared();
    let fx = RecordingBackend::new(2, 2).with_params(&[0.5, 0.0]).into_shared();
    let chain = PluginChain::<f32>::new(vec![shared(&synth), shared(&fx)]).unwrap();

    let (mut producer, consumer) = MidiEventQueue::new(64).split();
    let (mut rt, handle) = RealtimeAudioLoop::new(Box::new(chain), consumer, TEST_BUFFER_SIZE, 256);
    let (sink, mut generated) = QueueMidiSink::with_capacity(64);
    handle.set_midi_output(Some(Box::new(sink))).unwrap();

    producer.push(MidiEvent::note_on(0, 0, 60, 100));
    let mut out = vec![1.0f32; TEST_BUFFER_SIZE * 2];
    rt.process_interleaved(&mut out, 2);
    rt.process_interleaved(&mut out, 2);

    for &sample in &out {
        assert_relative_eq!(sample, 0.25, epsilon = FLOAT_EPSILON);
    }
    assert_eq!(synth.calls()[0].midi.len(), 1);
    assert!(synth.calls()[1].midi.is_empty());
    assert_eq!(generated.pop(), Some(MidiEvent::note_on(0, 0, 60, 100)));

    let stats = handle.stats();
    assert_eq!(stats.callbacks, 2);
    assert_eq!(stats.midi_in, 1);
    assert_eq!(stats.midi_out, 1);
    assert_eq!(stats.failed_blocks, 0);
}

#[test]
fn test_stage_failure_silences_callback_and_loop_recovers_next_time() {
    let ok = RecordingBackend::new(0, 1).with_params(&[1.0, 0.5]).into_shared();
    let flaky = RecordingBackend::new(1, 1).fail_from_call(1).into_shared();
    let chain = PluginChain::<f32>::new(vec![shared(&ok), shared(&flaky)]).unwrap();

    let (_producer, consumer) = MidiEventQueue::new(16).split();
    let (mut rt, handle) = RealtimeAudioLoop::new(Box::new(chain), consumer, 64, 16);

    let mut out = vec![0.0f32; 64];
    rt.process_interleaved(&mut out, 1);
    assert!(out.iter().all(|&s| s == 0.5));

    rt.process_interleaved(&mut out, 1);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(handle.stats().failed_blocks, 1);
}
