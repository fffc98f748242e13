//! Realtime device loop for minihost.
//!
//! - [`RealtimeAudioLoop`]: per-callback orchestration (input, MIDI drain,
//!   processing, MIDI out, interleaving). Driver-agnostic and allocation-free
//!   after construction.
//! - [`AudioDevice`] (`"device"`): a CPAL output stream around the loop
//! - MIDI port bridge (`"midi-io"`): hardware and virtual ports via midir,
//!   exposed as methods on [`AudioDevice`]
//!
//! # Example
//!
//! ```ignore
//! use minihost_audio::{AudioConfig, AudioDevice};
//!
//! let chain = PluginChain::<f32>::builder().stage(synth).stage(reverb).build()?;
//! let config = AudioConfig {
//!     buffer_frames: Some(256),
//!     midi_input_port: Some(0),
//!     ..Default::default()
//! };
//!
//! let mut device = AudioDevice::open(Box::new(chain), &config)?;
//! device.start()?;
//! device.send_midi(0x90, 60, 100);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{AudioConfig, DEFAULT_BUFFER_FRAMES};

mod stats;
pub use stats::{LoopStats, LoopStatsSnapshot};

mod sink;
pub use sink::{shared_producer, MidiOutputSink, QueueMidiSink, SharedMidiProducer};

mod realtime;
pub use realtime::{InputCallback, LoopHandle, RealtimeAudioLoop};

#[cfg(feature = "device")]
mod device;
#[cfg(feature = "device")]
pub use device::AudioDevice;

#[cfg(feature = "midi-io")]
mod midi_io;
#[cfg(feature = "midi-io")]
pub use midi_io::MidirOutputSink;
