//! Audio device configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Period size requested when none is configured.
pub const DEFAULT_BUFFER_FRAMES: u32 = 512;

pub const DEFAULT_MIDI_QUEUE_CAPACITY: usize = 256;

pub const DEFAULT_MAX_MIDI_EVENTS_PER_BLOCK: usize = 256;

/// Configuration for [`AudioDevice`](crate::AudioDevice) and
/// [`RealtimeAudioLoop`](crate::RealtimeAudioLoop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// `None` runs at the processor's sample rate.
    pub sample_rate: Option<f64>,
    /// `None` requests [`DEFAULT_BUFFER_FRAMES`].
    pub buffer_frames: Option<u32>,
    /// `None` uses the processor's output channel count.
    pub output_channels: Option<usize>,
    pub midi_input_port: Option<usize>,
    pub midi_output_port: Option<usize>,
    pub midi_queue_capacity: usize,
    /// Events drained from the MIDI queue per callback. The rest wait.
    pub max_midi_events_per_block: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            buffer_frames: None,
            output_channels: None,
            midi_input_port: None,
            midi_output_port: None,
            midi_queue_capacity: DEFAULT_MIDI_QUEUE_CAPACITY,
            max_midi_events_per_block: DEFAULT_MAX_MIDI_EVENTS_PER_BLOCK,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(rate) = self.sample_rate {
            if !(8000.0..=384000.0).contains(&rate) {
                return Err(Error::InvalidConfig(format!(
                    "sample_rate {} out of range (8000-384000 Hz)",
                    rate
                )));
            }
        }
        if self.buffer_frames == Some(0) {
            return Err(Error::InvalidConfig("buffer_frames must be at least 1".into()));
        }
        if self.output_channels == Some(0) {
            return Err(Error::InvalidConfig(
                "output_channels must be at least 1".into(),
            ));
        }
        if self.max_midi_events_per_block == 0 {
            return Err(Error::InvalidConfig(
                "max_midi_events_per_block must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn buffer_frames_or_default(&self) -> usize {
        self.buffer_frames.unwrap_or(DEFAULT_BUFFER_FRAMES) as usize
    }
}
