//! Plugin backend contract.
//!
//! A backend is one loaded plugin instance. It is shared between the control
//! thread (state, parameters, reset) and the audio thread (process,
//! realtime parameter writes), so every method takes `&self` and the backend
//! owns whatever synchronization its host API needs.

use crate::buffer::{AudioBlock, Sample};
use crate::midi::{MidiInput, MidiOutput};
use crate::transport::TransportInfo;
use crate::{Error, Result};

/// Static facts about a loaded plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackendInfo {
    pub num_params: usize,
    pub input_channels: usize,
    pub output_channels: usize,
    /// Sidechain inputs, read from the block's input channels directly after
    /// the main `input_channels`.
    pub sidechain_channels: usize,
    pub latency_samples: usize,
    pub accepts_midi: bool,
    pub produces_midi: bool,
}

impl BackendInfo {
    /// Main plus sidechain inputs.
    pub fn total_input_channels(&self) -> usize {
        self.input_channels + self.sidechain_channels
    }
}

/// One loaded plugin instance, format-agnostic.
///
/// Realtime methods (`process`, `process_f64`, `set_parameter_rt`) are called
/// from the audio thread and must not allocate, lock or block. Every other
/// method is a control-thread call.
pub trait PluginBackend: Send + Sync {
    /// Process one window. Offsets in `midi_in` and the events pushed to
    /// `midi_out` are relative to the block's first frame.
    fn process(
        &self,
        block: &mut AudioBlock<'_, f32>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()>;

    fn supports_f64(&self) -> bool {
        false
    }

    fn process_f64(
        &self,
        _block: &mut AudioBlock<'_, f64>,
        _midi_in: MidiInput<'_>,
        _midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        Err(Error::DoublePrecisionUnsupported)
    }

    /// Normalized 0..1. Takes effect from the next `process` call.
    fn set_parameter_rt(&self, index: u32, value: f32);

    fn info(&self) -> BackendInfo;

    fn sample_rate(&self) -> f64;

    fn latency_samples(&self) -> usize {
        self.info().latency_samples
    }

    fn tail_seconds(&self) -> f64 {
        0.0
    }

    /// Normalized 0..1.
    fn get_parameter(&self, index: u32) -> Result<f32>;

    /// Normalized 0..1.
    fn set_parameter(&self, index: u32, value: f32) -> Result<()>;

    fn get_state(&self) -> Result<Vec<u8>> {
        Err(Error::Unsupported("state save"))
    }

    fn set_state(&self, _data: &[u8]) -> Result<()> {
        Err(Error::Unsupported("state restore"))
    }

    /// Clear delay lines, voices and other internal state.
    fn reset(&self) -> Result<()>;

    /// Switch to offline rendering quality.
    fn set_non_realtime(&self, _non_realtime: bool) -> Result<()> {
        Ok(())
    }

    /// Playhead seen from the next `process` call on. `None` clears it and
    /// the plugin sees no transport.
    fn set_transport(&self, _transport: Option<&TransportInfo>) -> Result<()> {
        Err(Error::Unsupported("transport"))
    }

    fn get_bypass(&self) -> Result<bool> {
        Err(Error::Unsupported("bypass"))
    }

    /// A bypassed plugin passes its main inputs through unchanged.
    fn set_bypass(&self, _bypass: bool) -> Result<()> {
        Err(Error::Unsupported("bypass"))
    }
}

/// Sample types a backend can process, dispatching to the matching entry point.
pub trait ProcessSample: Sample {
    /// Whether this type goes through `process_f64`.
    const DOUBLE_PRECISION: bool;

    /// Whether `backend` has an entry point for this type.
    fn supported_by(backend: &dyn PluginBackend) -> bool {
        !Self::DOUBLE_PRECISION || backend.supports_f64()
    }

    fn process(
        backend: &dyn PluginBackend,
        block: &mut AudioBlock<'_, Self>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()>;
}

impl ProcessSample for f32 {
    const DOUBLE_PRECISION: bool = false;

    #[inline]
    fn process(
        backend: &dyn PluginBackend,
        block: &mut AudioBlock<'_, f32>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        backend.process(block, midi_in, midi_out)
    }
}

impl ProcessSample for f64 {
    const DOUBLE_PRECISION: bool = true;

    #[inline]
    fn process(
        backend: &dyn PluginBackend,
        block: &mut AudioBlock<'_, f64>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        backend.process_f64(block, midi_in, midi_out)
    }
}
