//! Platform service boundaries
//!
//! The engine core treats byte retrieval, audio decoding, offline effect
//! rendering and playback output as external collaborators behind traits.
//! Default implementations ship here (filesystem fetch, symphonia decode,
//! CPAL output); tests substitute stubs.

pub mod decode;
pub mod fetch;
pub mod playback;

pub use decode::{DecodeError, SymphoniaDecoder};
pub use fetch::{FetchError, FsFetcher};
pub use playback::{CpalSink, PlaybackError};

use std::sync::Arc;

use thiserror::Error;

use crate::effects::ParamValue;
use crate::types::{DecodedAudio, Sample};

/// Retrieves raw audio bytes for a url
///
/// No retries are performed here or anywhere in the engine; a retry policy,
/// if desired, belongs to the implementation.
pub trait FetchService: Send + Sync {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Decodes raw bytes into per-channel sample data at the engine sample rate
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, DecodeError>;
}

/// One link of an offline render chain: an effect type plus its current
/// parameter values, in the shape the platform DSP expects
#[derive(Debug, Clone)]
pub struct EffectChainLink {
    /// Effect type name from the catalog (e.g. "Delay")
    pub type_name: String,
    /// Current parameter values in descriptor order
    pub params: Vec<ParamValue>,
}

/// Offline rendering failure; fatal to the enclosing apply() call
#[derive(Error, Debug)]
pub enum RenderError {
    /// The platform renderer reported a failure for one window
    #[error("Offline render failed: {0}")]
    Failed(String),
}

/// Renders one window of samples through an ordered effect chain
///
/// The first link consumes `input`, each subsequent link consumes the
/// previous link's output, and the last link's output is returned. The
/// output must have the input's length.
pub trait OfflineRenderer {
    fn render(
        &mut self,
        chain: &[EffectChainLink],
        input: &[Sample],
        sample_rate: u32,
    ) -> Result<Vec<Sample>, RenderError>;
}

/// A renderer that applies no processing at all
///
/// Useful as a placeholder when no platform DSP is wired up, and in tests
/// that only exercise the windowing bookkeeping.
#[derive(Debug, Default)]
pub struct PassthroughRenderer;

impl OfflineRenderer for PassthroughRenderer {
    fn render(
        &mut self,
        _chain: &[EffectChainLink],
        input: &[Sample],
        _sample_rate: u32,
    ) -> Result<Vec<Sample>, RenderError> {
        Ok(input.to_vec())
    }
}

/// Streams a multi-channel buffer to an audio output
///
/// `play` takes zero-copy channel handles; the sink must invoke `on_ended`
/// exactly once when playback reaches the end of the buffer. Stopping the
/// sink must not invoke it; the caller owns stop-side completion.
pub trait PlaybackSink {
    fn play(
        &mut self,
        channels: Vec<Arc<Vec<Sample>>>,
        sample_rate: u32,
        start_offset: f64,
        on_ended: Box<dyn FnOnce() + Send>,
    ) -> Result<(), PlaybackError>;

    /// Halt output; a no-op when nothing is playing
    fn stop(&mut self);
}
