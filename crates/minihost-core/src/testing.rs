//! Deterministic in-process backend for tests.
//!
//! [`RecordingBackend`] renders `input * gain + offset` per channel, where
//! `gain` and `offset` are parameters 0 and 1, and records what every process
//! call saw. Bypass passes main inputs through and transport updates are
//! stored for inspection. It locks and allocates on the audio path, so it is only suitable
//! for tests.

use crate::backend::{BackendInfo, PluginBackend};
use crate::buffer::{AudioBlock, Sample};
use crate::midi::{MidiInput, MidiOutput};
use crate::transport::TransportInfo;
use crate::{Error, Result};
use minihost_midi::MidiEvent;
use parking_lot::Mutex;
use std::sync::Arc;

pub const PARAM_GAIN: u32 = 0;
pub const PARAM_OFFSET: u32 = 1;

/// What one process call observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessCall {
    pub frames: usize,
    /// Events after rebasing onto the window.
    pub midi: Vec<MidiEvent>,
    /// Parameter values in effect during the call.
    pub params: Vec<f32>,
    /// Input samples per channel, exactly as the backend saw them. Sidechain
    /// channels follow the main inputs.
    pub inputs: Vec<Vec<f64>>,
    pub double_precision: bool,
    pub transport: Option<TransportInfo>,
}

struct State {
    params: Vec<f32>,
    calls: Vec<ProcessCall>,
    fail_on_call: Option<usize>,
    non_realtime: bool,
    bypass: bool,
    transport: Option<TransportInfo>,
    resets: usize,
}

pub struct RecordingBackend {
    info: BackendInfo,
    sample_rate: f64,
    tail_seconds: f64,
    echo_midi: bool,
    supports_f64: bool,
    supports_transport: bool,
    state: Mutex<State>,
}

impl RecordingBackend {
    /// Unity gain, zero offset, 48 kHz.
    pub fn new(input_channels: usize, output_channels: usize) -> Self {
        Self {
            info: BackendInfo {
                num_params: 2,
                input_channels,
                output_channels,
                sidechain_channels: 0,
                latency_samples: 0,
                accepts_midi: true,
                produces_midi: false,
            },
            sample_rate: 48_000.0,
            tail_seconds: 0.0,
            echo_midi: false,
            supports_f64: true,
            supports_transport: true,
            state: Mutex::new(State {
                params: vec![1.0, 0.0],
                calls: Vec::new(),
                fail_on_call: None,
                non_realtime: false,
                bypass: false,
                transport: None,
                resets: 0,
            }),
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_latency(mut self, samples: usize) -> Self {
        self.info.latency_samples = samples;
        self
    }

    pub fn with_tail(mut self, seconds: f64) -> Self {
        self.tail_seconds = seconds;
        self
    }

    pub fn with_params(mut self, values: &[f32]) -> Self {
        self.info.num_params = values.len();
        self.state.get_mut().params = values.to_vec();
        self
    }

    /// Copy every received event to the MIDI output.
    pub fn echo_midi(mut self) -> Self {
        self.echo_midi = true;
        self.info.produces_midi = true;
        self
    }

    pub fn with_sidechain(mut self, channels: usize) -> Self {
        self.info.sidechain_channels = channels;
        self
    }

    /// Reject transport updates like a plugin with no playhead support.
    pub fn without_transport(mut self) -> Self {
        self.supports_transport = false;
        self
    }

    pub fn single_precision_only(mut self) -> Self {
        self.supports_f64 = false;
        self
    }

    /// Fail the `n`th process call (0-based) and every one after it.
    pub fn fail_from_call(mut self, n: usize) -> Self {
        self.state.get_mut().fail_on_call = Some(n);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<ProcessCall> {
        self.state.lock().calls.clone()
    }

    pub fn param(&self, index: u32) -> f32 {
        self.state
            .lock()
            .params
            .get(index as usize)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn resets(&self) -> usize {
        self.state.lock().resets
    }

    pub fn is_non_realtime(&self) -> bool {
        self.state.lock().non_realtime
    }

    /// Last transport set from the control thread.
    pub fn transport(&self) -> Option<TransportInfo> {
        self.state.lock().transport
    }

    fn render<T: Sample>(
        &self,
        block: &mut AudioBlock<'_, T>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
        double_precision: bool,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state
            .fail_on_call
            .is_some_and(|n| state.calls.len() >= n)
        {
            let params = state.params.clone();
            let transport = state.transport;
            state.calls.push(ProcessCall {
                frames: block.frames(),
                midi: Vec::new(),
                params,
                inputs: Vec::new(),
                double_precision,
                transport,
            });
            return Err(Error::ProcessFailed);
        }

        let (gain, offset) = if state.bypass {
            (1.0, 0.0)
        } else {
            (
                state.params.first().copied().unwrap_or(1.0) as f64,
                state.params.get(1).copied().unwrap_or(0.0) as f64,
            )
        };

        let (inputs, mut outputs) = block.split();
        let seen: Vec<Vec<f64>> = (0..self.info.total_input_channels())
            .map(|ch| {
                inputs
                    .channel(ch)
                    .map(|s| s.iter().map(|x| x.to_f64()).collect())
                    .unwrap_or_else(|| vec![0.0; inputs.frames()])
            })
            .collect();

        for ch in 0..self.info.output_channels {
            let source = seen.get(ch).filter(|_| ch < self.info.input_channels);
            if let Some(dest) = outputs.channel_mut(ch) {
                for (i, sample) in dest.iter_mut().enumerate() {
                    let x = source.map_or(0.0, |s| s[i]);
                    *sample = T::from_f64(x * gain + offset);
                }
            }
        }

        let midi: Vec<MidiEvent> = midi_in.iter().collect();
        if self.echo_midi {
            for event in &midi {
                midi_out.push(*event);
            }
        }

        let params = state.params.clone();
        let transport = state.transport;
        state.calls.push(ProcessCall {
            frames: inputs.frames(),
            midi,
            params,
            inputs: seen,
            double_precision,
            transport,
        });
        Ok(())
    }
}

impl PluginBackend for RecordingBackend {
    fn process(
        &self,
        block: &mut AudioBlock<'_, f32>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        self.render(block, midi_in, midi_out, false)
    }

    fn supports_f64(&self) -> bool {
        self.supports_f64
    }

    fn process_f64(
        &self,
        block: &mut AudioBlock<'_, f64>,
        midi_in: MidiInput<'_>,
        midi_out: &mut MidiOutput<'_>,
    ) -> Result<()> {
        if !self.supports_f64 {
            return Err(Error::DoublePrecisionUnsupported);
        }
        self.render(block, midi_in, midi_out, true)
    }

    fn set_parameter_rt(&self, index: u32, value: f32) {
        if let Some(param) = self.state.lock().params.get_mut(index as usize) {
            *param = value;
        }
    }

    fn info(&self) -> BackendInfo {
        self.info
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn tail_seconds(&self) -> f64 {
        self.tail_seconds
    }

    fn get_parameter(&self, index: u32) -> Result<f32> {
        let state = self.state.lock();
        state
            .params
            .get(index as usize)
            .copied()
            .ok_or(Error::ParameterOutOfRange {
                index,
                count: state.params.len(),
            })
    }

    fn set_parameter(&self, index: u32, value: f32) -> Result<()> {
        let mut state = self.state.lock();
        let count = state.params.len();
        let param = state
            .params
            .get_mut(index as usize)
            .ok_or(Error::ParameterOutOfRange { index, count })?;
        *param = value.clamp(0.0, 1.0);
        Ok(())
    }

    fn get_state(&self) -> Result<Vec<u8>> {
        let state = self.state.lock();
        Ok(state.params.iter().flat_map(|p| p.to_le_bytes()).collect())
    }

    fn set_state(&self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if data.len() != state.params.len() * 4 {
            return Err(Error::StateRestore(format!(
                "expected {} bytes, got {}",
                state.params.len() * 4,
                data.len()
            )));
        }
        for (param, bytes) in state.params.iter_mut().zip(data.chunks_exact(4)) {
            *param = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.resets += 1;
        Ok(())
    }

    fn set_non_realtime(&self, non_realtime: bool) -> Result<()> {
        self.state.lock().non_realtime = non_realtime;
        Ok(())
    }

    fn set_transport(&self, transport: Option<&TransportInfo>) -> Result<()> {
        if !self.supports_transport {
            return Err(Error::Unsupported("transport"));
        }
        self.state.lock().transport = transport.copied();
        Ok(())
    }

    fn get_bypass(&self) -> Result<bool> {
        Ok(self.state.lock().bypass)
    }

    fn set_bypass(&self, bypass: bool) -> Result<()> {
        self.state.lock().bypass = bypass;
        Ok(())
    }
}
