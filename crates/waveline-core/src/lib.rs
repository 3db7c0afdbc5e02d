//! Waveline Core - timeline buffer aggregation and windowed effects rendering
//!
//! Assembles independently loaded audio files into one continuous
//! multi-channel timeline buffer, lets callers attach time-ranged effects to
//! spans of that timeline, renders those effects offline one second at a
//! time, and patches the results back into the live playback buffer.

pub mod config;
pub mod effects;
pub mod engine;
pub mod event;
pub mod platform;
pub mod timeline;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use engine::{PlatformServices, TimelineEngine};
pub use types::*;
