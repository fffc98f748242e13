//! Destinations for MIDI generated on the audio thread.

use minihost_midi::{MidiEvent, MidiEventQueue, MidiQueueConsumer, MidiQueueProducer};
use parking_lot::Mutex;
use std::sync::Arc;

/// Receives generated MIDI from the realtime loop, one event at a time.
///
/// Called on the audio thread. Implementations must not block or allocate.
pub trait MidiOutputSink: Send {
    /// Best-effort. Returns `false` if the event was not delivered.
    fn send(&mut self, event: &MidiEvent) -> bool;
}

/// Pushes generated MIDI into a queue drained by a non-realtime consumer.
pub struct QueueMidiSink {
    producer: MidiQueueProducer,
}

impl QueueMidiSink {
    pub fn new(producer: MidiQueueProducer) -> Self {
        Self { producer }
    }

    /// A sink plus the consumer that reads what it receives.
    pub fn with_capacity(capacity: usize) -> (Self, MidiQueueConsumer) {
        let (producer, consumer) = MidiEventQueue::new(capacity).split();
        (Self::new(producer), consumer)
    }
}

impl MidiOutputSink for QueueMidiSink {
    #[inline]
    fn send(&mut self, event: &MidiEvent) -> bool {
        self.producer.push(*event)
    }
}

impl<F> MidiOutputSink for F
where
    F: FnMut(&MidiEvent) -> bool + Send,
{
    #[inline]
    fn send(&mut self, event: &MidiEvent) -> bool {
        self(event)
    }
}

/// MIDI input producer shared by every source feeding one loop.
///
/// The queue allows one producer at a time; the mutex serializes hardware
/// port callbacks and control-thread sends. The consumer is never locked.
pub type SharedMidiProducer = Arc<Mutex<MidiQueueProducer>>;

pub fn shared_producer(producer: MidiQueueProducer) -> SharedMidiProducer {
    Arc::new(Mutex::new(producer))
}
