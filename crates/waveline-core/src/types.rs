//! Common types for waveline
//!
//! This module contains the fundamental audio buffer types used throughout
//! the engine: decoded per-file audio and the concatenated multi-channel
//! timeline buffer.

use std::sync::Arc;

/// Default sample rate for the engine (CD-quality; every decoded file is
/// resampled to the configured rate on load)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Audio sample type (32-bit float throughout)
pub type Sample = f32;

/// Per-channel sample data produced by the decoder for a single file
///
/// Channels are planar (one `Vec` per channel) and share a single length.
/// The sample rate is always the engine rate by the time this struct leaves
/// the loader.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// One sample array per channel, all the same length
    pub channels: Vec<Vec<Sample>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Create silent audio with the given shape
    pub fn silence(channels: usize, len: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; len]; channels],
            sample_rate,
        }
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    pub fn len_samples(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len_samples() as f64 / self.sample_rate as f64
    }
}

/// The master multi-channel timeline buffer
///
/// Channels are reference-counted so playback can hold a zero-copy view of
/// the buffer while the engine keeps patching it: mutation goes through
/// copy-on-write (`Arc::make_mut`), so a stream started before a patch keeps
/// playing its own consistent snapshot.
#[derive(Debug, Clone, Default)]
pub struct MultiBuffer {
    channels: Vec<Arc<Vec<Sample>>>,
    sample_rate: u32,
}

impl MultiBuffer {
    /// Create an empty buffer at the given sample rate
    pub fn empty(sample_rate: u32) -> Self {
        Self {
            channels: Vec::new(),
            sample_rate,
        }
    }

    /// Create a buffer from owned channel data
    ///
    /// All channels must have the same length.
    pub fn from_channels(channels: Vec<Vec<Sample>>, sample_rate: u32) -> Self {
        debug_assert!(
            channels.windows(2).all(|w| w[0].len() == w[1].len()),
            "channel lengths must match"
        );
        Self {
            channels: channels.into_iter().map(Arc::new).collect(),
            sample_rate,
        }
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    pub fn len_samples(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// True when the buffer holds no audio
    pub fn is_empty(&self) -> bool {
        self.len_samples() == 0
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len_samples() as f64 / self.sample_rate as f64
    }

    /// Sample data for one channel
    pub fn channel(&self, idx: usize) -> Option<&[Sample]> {
        self.channels.get(idx).map(|c| c.as_slice())
    }

    /// Shared handle to one channel (zero-copy, for playback and events)
    pub fn channel_arc(&self, idx: usize) -> Option<Arc<Vec<Sample>>> {
        self.channels.get(idx).cloned()
    }

    /// Shared handles to all channels in order
    pub fn channel_arcs(&self) -> Vec<Arc<Vec<Sample>>> {
        self.channels.clone()
    }

    /// Write `samples` into channel `idx` starting at `offset`
    ///
    /// The write is clamped to the channel end; a partial tail write is
    /// allowed and anything past the end is dropped. Out-of-range channels
    /// are ignored.
    pub fn write_at(&mut self, idx: usize, offset: usize, samples: &[Sample]) {
        let Some(channel) = self.channels.get_mut(idx) else {
            return;
        };
        let len = channel.len();
        if offset >= len {
            return;
        }
        let writable = samples.len().min(len - offset);
        let data = Arc::make_mut(channel);
        data[offset..offset + writable].copy_from_slice(&samples[..writable]);
    }

    /// Replace the contents of channel `idx` wholesale
    ///
    /// Used by revert; the replacement must have the channel's length.
    pub fn replace_channel(&mut self, idx: usize, samples: &[Sample]) {
        let Some(channel) = self.channels.get_mut(idx) else {
            return;
        };
        debug_assert_eq!(channel.len(), samples.len());
        let data = Arc::make_mut(channel);
        data.copy_from_slice(samples);
    }
}
