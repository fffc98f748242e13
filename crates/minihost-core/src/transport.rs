//! Host playhead handed to tempo-synced plugins.

/// Tempo, meter and position as the plugin sees them on its next block.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportInfo {
    pub bpm: f64,
    pub time_sig_numerator: u32,
    pub time_sig_denominator: u32,
    pub position_samples: i64,
    /// In quarter notes.
    pub position_beats: f64,
    pub playing: bool,
    pub recording: bool,
    pub looping: bool,
    pub loop_start_samples: i64,
    pub loop_end_samples: i64,
}

impl Default for TransportInfo {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            time_sig_numerator: 4,
            time_sig_denominator: 4,
            position_samples: 0,
            position_beats: 0.0,
            playing: false,
            recording: false,
            looping: false,
            loop_start_samples: 0,
            loop_end_samples: 0,
        }
    }
}

impl TransportInfo {
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm,
            ..Default::default()
        }
    }

    pub fn time_signature(mut self, numerator: u32, denominator: u32) -> Self {
        self.time_sig_numerator = numerator;
        self.time_sig_denominator = denominator;
        self
    }

    pub fn playing(mut self, playing: bool) -> Self {
        self.playing = playing;
        self
    }

    pub fn loop_range(mut self, start_samples: i64, end_samples: i64) -> Self {
        self.looping = true;
        self.loop_start_samples = start_samples;
        self.loop_end_samples = end_samples;
        self
    }

    /// Move the playhead forward by `frames` if playing. Wraps back into the
    /// loop range when looping past its end.
    pub fn advance(&mut self, frames: usize, sample_rate: f64) {
        if !self.playing || sample_rate <= 0.0 {
            return;
        }
        let mut position = self.position_samples.saturating_add(frames as i64);
        let loop_len = self.loop_end_samples - self.loop_start_samples;
        if self.looping && loop_len > 0 && position >= self.loop_end_samples {
            position = self.loop_start_samples + (position - self.loop_start_samples) % loop_len;
        }
        self.position_samples = position;
        self.position_beats = position as f64 / sample_rate * self.bpm / 60.0;
    }
}
