//! Test helpers and fixtures for minihost integration tests

#![allow(dead_code)]

pub mod tolerances;

use minihost::{OpenOptions, PluginBackend, PluginFormat};
use minihost_core::testing::RecordingBackend;
use std::path::Path;
use std::sync::Arc;

pub const TEST_SAMPLE_RATE: f64 = 48000.0;

pub const TEST_BUFFER_SIZE: usize = 512;

/// Opens any `*.fake` path as a `RecordingBackend` with the requested layout.
pub struct FakeFormat;

impl PluginFormat for FakeFormat {
    fn name(&self) -> &str {
        "fake"
    }

    fn can_open(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "fake")
    }

    fn open(
        &self,
        _path: &Path,
        options: &OpenOptions,
    ) -> minihost_core::Result<Arc<dyn PluginBackend>> {
        let backend = RecordingBackend::new(
            options.input_channels.unwrap_or(2),
            options.output_channels.unwrap_or(2),
        )
        .with_sample_rate(options.sample_rate);
        Ok(Arc::new(backend))
    }
}

/// `value` on every channel.
pub fn constant(channels: usize, frames: usize, value: f32) -> Vec<Vec<f32>> {
    vec![vec![value; frames]; channels]
}

/// 0, 1, 2, ... on every channel.
pub fn ramp(channels: usize, frames: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|_| (0..frames).map(|i| i as f32).collect())
        .collect()
}

pub fn silence(channels: usize, frames: usize) -> Vec<Vec<f32>> {
    constant(channels, frames, 0.0)
}

pub fn is_silent(samples: &[f32]) -> bool {
    samples
        .iter()
        .all(|s| s.abs() < tolerances::SILENCE_THRESHOLD)
}

pub fn shared(backend: &Arc<RecordingBackend>) -> Arc<dyn PluginBackend> {
    backend.clone()
}
