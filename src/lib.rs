//! # minihost - Minimal Audio Plugin Host
//!
//! Hosts already-loaded plugins with sample-accurate automation, chains them
//! in series, and runs them on a realtime audio device.
//!
//! ## Architecture
//!
//! minihost is an umbrella crate over:
//! - **minihost-midi** - MIDI event type and lock-free SPSC queue
//! - **minihost-core** - Buffers, backend trait, format registry, processor, chain
//! - **minihost-audio** - Realtime loop, CPAL device, MIDI port bridge
//!
//! ## Quick Start
//!
//! ```ignore
//! use minihost::prelude::*;
//!
//! let registry = FormatRegistry::new().with_format(MyVst3Format::new());
//! let options = OpenOptions::new(48_000.0, 512);
//! let synth = registry.open("Synth.vst3", &options)?;
//! let delay = registry.open("Delay.vst3", &options)?;
//!
//! let chain = PluginChain::<f32>::builder().stage(synth).stage(delay).build()?;
//!
//! let mut device = AudioDevice::open(Box::new(chain), &AudioConfig::default())?;
//! device.start()?;
//! device.send_midi(0x90, 60, 100);
//! ```
//!
//! ## Feature Flags
//!
//! - `device` (default) - CPAL audio output
//! - `midi-io` (default) - Hardware and virtual MIDI ports
//! - `serde` - Serialization for events, changes and options
//! - `testing` - `RecordingBackend` fake for downstream tests

mod error;
pub use error::{Error, Result};

/// Re-export of minihost-core for direct access
pub use minihost_core as core;

/// Re-export of minihost-midi
pub use minihost_midi as midi;

/// Re-export of minihost-audio
pub use minihost_audio as audio;

// Processing
pub use minihost_core::{
    AudioBlock, BackendInfo, BlockProcessor, ChainParamChange, Inputs, MidiInput, MidiOutput,
    Outputs, ParamChange, PlanarBuffer, PluginBackend, PluginChain, PluginChainBuilder, Sample,
    SampleAccurateProcessor, TransportInfo, DEFAULT_MAX_BLOCK_SIZE,
};

// Loading
pub use minihost_core::{FormatRegistry, LoadStage, OpenOptions, PluginFormat};

// MIDI
pub use minihost_midi::{MidiEvent, MidiEventQueue, MidiQueueConsumer, MidiQueueProducer};

// Realtime
pub use minihost_audio::{
    AudioConfig, InputCallback, LoopHandle, LoopStatsSnapshot, MidiOutputSink, QueueMidiSink,
    RealtimeAudioLoop,
};

#[cfg(feature = "device")]
pub use minihost_audio::AudioDevice;

#[cfg(feature = "testing")]
pub use minihost_core::testing;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        AudioBlock, AudioConfig, BlockProcessor, ChainParamChange, Error, FormatRegistry, MidiEvent,
        MidiEventQueue, MidiInput, MidiOutput, OpenOptions, ParamChange, PlanarBuffer,
        PluginBackend, PluginChain, PluginFormat, RealtimeAudioLoop, Result,
        SampleAccurateProcessor, TransportInfo,
    };

    #[cfg(feature = "device")]
    pub use crate::AudioDevice;
}
