//! Integration test modules

pub mod automation;
pub mod chain;
pub mod loading;
pub mod realtime;
