//! CPAL playback sink
//!
//! Streams the shared timeline channels to the default output device. The
//! sink owns the CPAL stream; dropping or replacing it stops output. The
//! completion callback fires from the audio thread the first time the read
//! position passes the end of the buffer.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};
use thiserror::Error;

use super::PlaybackSink;
use crate::types::Sample;

/// Playback errors
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// No default output device available
    #[error("No audio output devices found")]
    NoDevice,

    /// Failed to query device configurations
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build the output stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start the output stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Playback sink backed by the system's default CPAL output device
#[derive(Default)]
pub struct CpalSink {
    stream: Option<Stream>,
}

impl CpalSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackSink for CpalSink {
    fn play(
        &mut self,
        channels: Vec<Arc<Vec<Sample>>>,
        sample_rate: u32,
        start_offset: f64,
        on_ended: Box<dyn FnOnce() + Send>,
    ) -> Result<(), PlaybackError> {
        self.stop();

        let len = channels.first().map(|c| c.len()).unwrap_or(0);
        if len == 0 {
            // Nothing to play; completes immediately
            on_ended();
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| PlaybackError::ConfigError(e.to_string()))?
            .collect();

        // Prefer f32 at the buffer's rate; fall back to any f32 config
        let best = supported
            .iter()
            .filter(|c| c.sample_format() == SampleFormat::F32)
            .find(|c| sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0)
            .or_else(|| supported.iter().find(|c| c.sample_format() == SampleFormat::F32))
            .ok_or_else(|| {
                PlaybackError::ConfigError("No supported f32 output configuration".to_string())
            })?;

        let device_rate =
            if sample_rate >= best.min_sample_rate().0 && sample_rate <= best.max_sample_rate().0 {
                SampleRate(sample_rate)
            } else {
                let fallback = best.max_sample_rate();
                log::warn!(
                    "Audio device doesn't support {}Hz, falling back to {}Hz (playback speed will differ)",
                    sample_rate,
                    fallback.0
                );
                fallback
            };

        let config: StreamConfig = best.clone().with_sample_rate(device_rate).config();
        let out_channels = config.channels as usize;

        log::info!(
            "Playback on {}: {} channels at {}Hz, starting at {:.2}s",
            device_name,
            out_channels,
            device_rate.0,
            start_offset
        );

        let src_count = channels.len();
        let mut pos = ((start_offset * sample_rate as f64) as usize).min(len);
        let mut ended = Some(on_ended);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [Sample], _info: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(out_channels) {
                        if pos < len {
                            for (ch, slot) in frame.iter_mut().enumerate() {
                                *slot = if ch < src_count { channels[ch][pos] } else { 0.0 };
                            }
                            pos += 1;
                        } else {
                            for slot in frame.iter_mut() {
                                *slot = 0.0;
                            }
                        }
                    }
                    if pos >= len {
                        if let Some(cb) = ended.take() {
                            cb();
                        }
                    }
                },
                move |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| PlaybackError::StreamBuildError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| PlaybackError::StreamPlayError(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Playback stream stopped");
        }
    }
}
