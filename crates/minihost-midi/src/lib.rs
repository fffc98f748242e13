//! MIDI plumbing for minihost.
//!
//! - [`MidiEvent`]: 4-field short message with a sample offset
//! - [`MidiEventQueue`]: lock-free single-producer/single-consumer ring buffer
//!   bridging a MIDI input thread and the realtime audio thread
//!
//! # Example
//!
//! ```
//! use minihost_midi::{MidiEvent, MidiEventQueue};
//!
//! let (mut producer, mut consumer) = MidiEventQueue::new(256).split();
//!
//! // MIDI thread
//! producer.push(MidiEvent::note_on(0, 0, 60, 100));
//!
//! // Audio thread
//! let mut batch = [MidiEvent::default(); 256];
//! let n = consumer.pop_all(&mut batch);
//! assert_eq!(n, 1);
//! ```

mod event;
pub use event::{MidiEvent, MidiEventBuilder};

mod queue;
pub use queue::{MidiEventQueue, MidiQueueConsumer, MidiQueueProducer, DEFAULT_QUEUE_CAPACITY};

// Re-export so users can convert without depending on midi-msg directly
pub use midi_msg::{Channel, ChannelVoiceMsg, MidiMsg};
