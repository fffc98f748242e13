//! Umbrella error type.
//!
//! Wraps the member crates' errors so `?` works across loading, processing
//! and device calls in one function.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] minihost_core::Error),

    #[error("Audio: {0}")]
    Audio(#[from] minihost_audio::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
