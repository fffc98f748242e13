//! Sample-accurate plugin processing.
//!
//! # Primary API
//!
//! - [`PluginBackend`]: one loaded plugin, shared by control and audio threads
//! - [`SampleAccurateProcessor`]: drives one backend, splitting blocks at
//!   parameter change offsets
//! - [`PluginChain`]: serial composition of backends with pre-allocated
//!   intermediate buffers
//! - [`FormatRegistry`]: opens plugin paths through registered [`PluginFormat`]s
//! - [`AudioBlock`] / [`MidiInput`] / [`MidiOutput`]: zero-copy per-call views
//!
//! # Feature-gated APIs
//!
//! - `"testing"`: [`testing::RecordingBackend`], a deterministic backend that
//!   records every call
//! - `"serde"`: serialization for events, changes and options
//!
//! # Example
//!
//! ```ignore
//! use minihost_core::prelude::*;
//!
//! let registry = FormatRegistry::new().with_format(Vst3Format::new());
//! let options = OpenOptions::new(48_000.0, 512);
//! let synth = registry.open("Synth.vst3", &options)?;
//! let reverb = registry.open("Reverb.vst3", &options)?;
//!
//! let mut chain = PluginChain::<f32>::builder()
//!     .stage(synth)
//!     .stage(reverb)
//!     .max_block_size(512)
//!     .build()?;
//!
//! let changes = [ChainParamChange::new(128, 1, 0, 0.8)];
//! chain.process_auto(&mut block, &midi, &mut midi_out, &changes)?;
//! ```

pub mod error;
pub use error::{Error, LoadStage, Result};

mod buffer;
pub use buffer::{
    AudioBlock, ChannelSlices, ChannelSlicesMut, Inputs, NoChannels, Outputs, PlanarBuffer, Sample,
};

mod midi;
pub use midi::{MidiInput, MidiOutput};

mod backend;
pub use backend::{BackendInfo, PluginBackend, ProcessSample};

mod transport;
pub use transport::TransportInfo;

pub mod registry;
pub use registry::{FormatRegistry, OpenOptions, PluginFormat};

mod automation;
pub use automation::{normalize, ChainParamChange, ParamChange, TimedChange};

mod processor;
pub use processor::{BlockProcessor, SampleAccurateProcessor};

mod chain;
pub use chain::{PluginChain, PluginChainBuilder, DEFAULT_MAX_BLOCK_SIZE};

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use minihost_midi::MidiEvent;

pub mod prelude {
    pub use crate::{
        AudioBlock, BlockProcessor, ChainParamChange, Error, FormatRegistry, MidiEvent,
        MidiInput, MidiOutput, OpenOptions, ParamChange, PlanarBuffer, PluginBackend,
        PluginChain, PluginFormat, Result, SampleAccurateProcessor, TransportInfo,
    };
}
