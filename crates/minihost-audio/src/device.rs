//! CPAL output device driving a [`RealtimeAudioLoop`].

use crate::config::AudioConfig;
use crate::realtime::{InputCallback, LoopHandle, RealtimeAudioLoop};
use crate::sink::{shared_producer, MidiOutputSink, SharedMidiProducer};
use crate::stats::LoopStatsSnapshot;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use minihost_core::BlockProcessor;
use minihost_midi::{MidiEvent, MidiEventQueue};
use std::sync::Arc;

#[cfg(feature = "midi-io")]
use crate::midi_io::{self, InputPort, PortState};

/// The device runs at the processor's rate; there is no resampling.
const SAMPLE_RATE_TOLERANCE: f64 = 0.1;

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
///
/// `cpal::Stream` is `!Send` on some platforms because of raw pointers in its
/// internals.
struct StreamHandle(cpal::Stream);

// SAFETY: the stream is owned by exactly one AudioDevice and only touched
// through `&mut self` (play/pause) or on drop. It is never shared between
// threads.
unsafe impl Send for StreamHandle {}

/// An output stream on the default device, rendering one processor or chain.
///
/// Opened stopped; call [`start`](Self::start) to begin rendering.
pub struct AudioDevice {
    // Dropped first: the audio callback owns the loop.
    stream: StreamHandle,
    sample_rate: f64,
    buffer_frames: usize,
    channels: usize,
    is_playing: bool,
    handle: LoopHandle,
    midi_producer: SharedMidiProducer,
    #[cfg(feature = "midi-io")]
    midi_input: Option<InputPort>,
    #[cfg(feature = "midi-io")]
    midi_output: Option<PortState>,
}

impl AudioDevice {
    pub fn open(processor: Box<dyn BlockProcessor<f32>>, config: &AudioConfig) -> Result<Self> {
        config.validate()?;

        let sample_rate = match config.sample_rate {
            Some(rate) if (rate - processor.sample_rate()).abs() > SAMPLE_RATE_TOLERANCE => {
                return Err(Error::InvalidConfig(format!(
                    "device sample rate {} Hz does not match processor rate {} Hz",
                    rate,
                    processor.sample_rate()
                )));
            }
            Some(rate) => rate,
            None => processor.sample_rate(),
        };
        let channels = config
            .output_channels
            .unwrap_or_else(|| processor.output_channels());
        if channels == 0 {
            return Err(Error::InvalidConfig(
                "processor has no output channels".into(),
            ));
        }
        let buffer_frames = config.buffer_frames_or_default();

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::InvalidDevice("No output device available".to_string()))?;
        let device_name = device.name()?;
        let sample_format = device.default_output_config()?.sample_format();

        let stream_config = cpal::StreamConfig {
            channels: u16::try_from(channels).map_err(|_| {
                Error::InvalidConfig(format!("{} output channels is too many", channels))
            })?,
            sample_rate: cpal::SampleRate(sample_rate.round() as u32),
            buffer_size: match config.buffer_frames {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };

        let (producer, consumer) = MidiEventQueue::new(config.midi_queue_capacity).split();
        let (realtime, handle) = RealtimeAudioLoop::new(
            processor,
            consumer,
            buffer_frames,
            config.max_midi_events_per_block,
        );

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, realtime)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, realtime)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, realtime)?,
            format => {
                return Err(Error::InvalidConfig(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        };

        tracing::info!(
            "Opened audio device {} ({} Hz, {} channels, {} frames, {:?})",
            device_name,
            sample_rate,
            channels,
            buffer_frames,
            sample_format
        );

        let mut audio = Self {
            stream: StreamHandle(stream),
            sample_rate,
            buffer_frames,
            channels,
            is_playing: false,
            handle,
            midi_producer: shared_producer(producer),
            #[cfg(feature = "midi-io")]
            midi_input: None,
            #[cfg(feature = "midi-io")]
            midi_output: None,
        };
        audio.connect_configured_ports(config)?;
        Ok(audio)
    }

    #[cfg(feature = "midi-io")]
    fn connect_configured_ports(&mut self, config: &AudioConfig) -> Result<()> {
        if let Some(index) = config.midi_input_port {
            self.connect_midi_input(index)?;
        }
        if let Some(index) = config.midi_output_port {
            self.connect_midi_output(index)?;
        }
        Ok(())
    }

    #[cfg(not(feature = "midi-io"))]
    fn connect_configured_ports(&mut self, config: &AudioConfig) -> Result<()> {
        if config.midi_input_port.is_some() || config.midi_output_port.is_some() {
            return Err(Error::Unsupported("MIDI ports without the midi-io feature"));
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        if self.is_playing {
            return Ok(());
        }
        self.stream.0.play()?;
        self.is_playing = true;
        tracing::info!("Audio device started");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if !self.is_playing {
            return Ok(());
        }
        self.stream.0.pause()?;
        self.is_playing = false;
        self.handle.collect_retired();
        tracing::info!("Audio device stopped");
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Requested period size. The loop pre-allocates twice this.
    pub fn buffer_frames(&self) -> usize {
        self.buffer_frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Supply input for an effect. `None` feeds silence.
    pub fn set_input_callback(&self, callback: Option<InputCallback>) -> Result<()> {
        self.handle.set_input_callback(callback)
    }

    /// Route generated MIDI to a custom sink, replacing any output port.
    pub fn set_midi_output(&mut self, sink: Option<Box<dyn MidiOutputSink>>) -> Result<()> {
        self.handle.set_midi_output(sink)?;
        #[cfg(feature = "midi-io")]
        {
            self.midi_output = None;
        }
        Ok(())
    }

    /// Queue a short message for the start of the next buffer.
    ///
    /// Returns `false` if the MIDI queue is full.
    pub fn send_midi(&self, status: u8, data1: u8, data2: u8) -> bool {
        self.midi_producer
            .lock()
            .push(MidiEvent::new(0, status, data1, data2))
    }

    /// Producer for feeding the loop's MIDI queue from other threads.
    pub fn midi_producer(&self) -> SharedMidiProducer {
        Arc::clone(&self.midi_producer)
    }

    pub fn stats(&self) -> LoopStatsSnapshot {
        self.handle.stats()
    }
}

#[cfg(feature = "midi-io")]
impl AudioDevice {
    /// Replaces any current input port.
    pub fn connect_midi_input(&mut self, index: usize) -> Result<()> {
        self.disconnect_midi_input();
        let port = midi_io::open_input(index, self.midi_producer())?;
        self.midi_input = Some(port);
        Ok(())
    }

    pub fn create_virtual_midi_input(&mut self, name: &str) -> Result<()> {
        self.disconnect_midi_input();
        let port = midi_io::open_virtual_input(name, self.midi_producer())?;
        self.midi_input = Some(port);
        Ok(())
    }

    pub fn disconnect_midi_input(&mut self) {
        if self.midi_input.take().is_some() {
            tracing::info!("Disconnected MIDI input");
        }
    }

    /// Replaces any current output port or sink.
    pub fn connect_midi_output(&mut self, index: usize) -> Result<()> {
        let (sink, state) = midi_io::open_output(index)?;
        self.handle.set_midi_output(Some(Box::new(sink)))?;
        self.midi_output = Some(state);
        Ok(())
    }

    pub fn create_virtual_midi_output(&mut self, name: &str) -> Result<()> {
        let (sink, state) = midi_io::open_virtual_output(name)?;
        self.handle.set_midi_output(Some(Box::new(sink)))?;
        self.midi_output = Some(state);
        Ok(())
    }

    pub fn disconnect_midi_output(&mut self) -> Result<()> {
        if self.midi_output.take().is_some() {
            self.handle.set_midi_output(None)?;
            tracing::info!("Disconnected MIDI output");
        }
        Ok(())
    }

    /// Hardware port index. `None` when disconnected or virtual.
    pub fn midi_input_port(&self) -> Option<usize> {
        self.midi_input.as_ref().and_then(|p| p.state.index)
    }

    pub fn midi_output_port(&self) -> Option<usize> {
        self.midi_output.and_then(|p| p.index)
    }

    pub fn is_midi_input_virtual(&self) -> bool {
        self.midi_input.as_ref().is_some_and(|p| p.state.is_virtual)
    }

    pub fn is_midi_output_virtual(&self) -> bool {
        self.midi_output.is_some_and(|p| p.is_virtual)
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        tracing::debug!("Closing audio device");
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut realtime: RealtimeAudioLoop,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch = vec![0.0f32; realtime.capacity() * channels];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let len = data.len().min(scratch.len());
                if len < data.len() {
                    realtime.note_clamped();
                }
                realtime.process_interleaved(&mut scratch[..len], channels);

                let (head, tail) = data.split_at_mut(len);
                for (sample, value) in head.iter_mut().zip(&scratch[..len]) {
                    *sample = T::from_sample(*value);
                }
                for sample in tail {
                    *sample = T::from_sample(0.0f32);
                }
            }));

            if result.is_err() {
                // Panic in callback - output silence
                for sample in data.iter_mut() {
                    *sample = T::from_sample(0.0f32);
                }
            }
        },
        |_err| {
            // Audio stream error - cannot log from callback
        },
        None,
    )?;

    Ok(stream)
}
