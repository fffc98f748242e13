//! Error types for minihost-audio.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error(transparent)]
    Core(#[from] minihost_core::Error),

    #[error("Audio loop command queue is full")]
    CommandQueueFull,

    #[error("Audio loop is gone")]
    LoopClosed,

    #[error("Not supported on this platform: {0}")]
    Unsupported(&'static str),

    #[cfg(feature = "device")]
    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "device")]
    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "device")]
    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[cfg(feature = "device")]
    #[error("Failed to pause audio stream")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[cfg(feature = "device")]
    #[error("Failed to get device name")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[cfg(feature = "midi-io")]
    #[error("Failed to initialize MIDI: {0}")]
    MidiInit(#[from] midir::InitError),

    #[error("MIDI port {0} not found")]
    MidiPortNotFound(usize),

    #[error("Failed to connect MIDI port: {0}")]
    MidiConnect(String),
}

pub type Result<T> = std::result::Result<T, Error>;
