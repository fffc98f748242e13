//! Error types for plugin processing

use std::path::PathBuf;
use thiserror::Error;

/// Where a plugin open attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Probing,
    Opening,
    Instantiation,
    Activation,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::Probing => write!(f, "probing format"),
            LoadStage::Opening => write!(f, "opening library"),
            LoadStage::Instantiation => write!(f, "creating instance"),
            LoadStage::Activation => write!(f, "activating"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Plugin chain is empty")]
    EmptyChain,

    #[error("Plugin chain stage {index} is missing")]
    MissingStage { index: usize },

    #[error("Sample rate mismatch: stage 0 runs at {expected} Hz, stage {stage} at {actual} Hz")]
    SampleRateMismatch {
        stage: usize,
        expected: f64,
        actual: f64,
    },

    #[error("Block of {frames} frames exceeds maximum of {max}")]
    BlockTooLarge { frames: usize, max: usize },

    #[error("Channel {channel} holds {len} samples, block needs {frames}")]
    ChannelTooShort {
        channel: usize,
        len: usize,
        frames: usize,
    },

    #[error("Input view has {inputs} frames, output view has {outputs}")]
    FrameMismatch { inputs: usize, outputs: usize },

    #[error("Plugin process call failed")]
    ProcessFailed,

    #[error("Plugin chain stage {stage} failed to process: {source}")]
    StageFailed {
        stage: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Double precision processing not supported by this plugin")]
    DoublePrecisionUnsupported,

    #[error("Plugin chain stage {stage} does not support double precision processing")]
    StageDoublePrecisionUnsupported { stage: usize },

    #[error("Parameter {index} out of range ({count} parameters)")]
    ParameterOutOfRange { index: u32, count: usize },

    #[error("Operation not supported by this plugin: {0}")]
    Unsupported(&'static str),

    #[error("Plugin load failed at {stage} stage: {path}\n  Reason: {reason}")]
    LoadFailed {
        path: PathBuf,
        stage: LoadStage,
        reason: String,
    },

    #[error("No registered plugin format can open {0}")]
    UnknownFormat(PathBuf),

    #[error("Failed to save plugin state: {0}")]
    StateSave(String),

    #[error("Failed to restore plugin state: {0}")]
    StateRestore(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
