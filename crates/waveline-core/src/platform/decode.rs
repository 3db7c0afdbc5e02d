//! Audio decoding via symphonia
//!
//! Decodes any format symphonia knows (WAV/PCM and FLAC are enabled) from an
//! in-memory byte buffer into planar f32 channels, then resamples to the
//! engine sample rate with rubato so every file in the timeline shares one
//! rate.

use std::io::Cursor;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use super::AudioDecoder;
use crate::types::{DecodedAudio, Sample};

/// Input chunk size for the resampler, in frames
const RESAMPLE_CHUNK: usize = 1024;

/// Decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The bytes are not audio symphonia can parse
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// A container was parsed but held no decodable audio track
    #[error("No audio track found")]
    NoAudioTrack,

    /// The track decoded to zero samples
    #[error("Audio track is empty")]
    EmptyAudio,

    /// Sample rate conversion failed
    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Decoder that normalizes everything to one target sample rate
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    target_sample_rate: u32,
}

impl SymphoniaDecoder {
    /// Create a decoder producing audio at `target_sample_rate`
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &Hint::new(),
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

        let mut interleaved: Vec<Sample> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<Sample>> = None;
        let mut channel_count = 0usize;
        let mut source_rate = 0u32;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    log::warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("Error decoding packet: {}", e);
                    continue;
                }
            };

            if sample_buf.is_none() {
                let spec = *decoded.spec();
                channel_count = spec.channels.count();
                source_rate = spec.rate;
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }

            let buf = sample_buf.as_mut().unwrap();
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }

        if channel_count == 0 || interleaved.is_empty() {
            return Err(DecodeError::EmptyAudio);
        }

        // De-interleave into planar channels
        let frames = interleaved.len() / channel_count;
        let mut channels: Vec<Vec<Sample>> = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }

        let channels = if source_rate != self.target_sample_rate {
            log::debug!(
                "Resampling {} -> {} Hz ({} frames)",
                source_rate,
                self.target_sample_rate,
                frames
            );
            resample(channels, source_rate, self.target_sample_rate)?
        } else {
            channels
        };

        Ok(DecodedAudio {
            channels,
            sample_rate: self.target_sample_rate,
        })
    }
}

/// Resample planar channels from `source_rate` to `target_rate`
fn resample(
    channels: Vec<Vec<Sample>>,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<Sample>>, DecodeError> {
    let len = channels.first().map(|c| c.len()).unwrap_or(0);
    if len == 0 {
        return Ok(channels);
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let expected = (len as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<Sample>::new(ratio, 2.0, params, RESAMPLE_CHUNK, channels.len())
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let delay = resampler.output_delay();
    let mut out: Vec<Vec<Sample>> = vec![Vec::with_capacity(expected + delay); channels.len()];

    let mut pos = 0usize;
    loop {
        let needed = resampler.input_frames_next();
        if pos + needed <= len {
            let chunk: Vec<&[Sample]> = channels.iter().map(|c| &c[pos..pos + needed]).collect();
            let rendered = resampler
                .process(&chunk, None)
                .map_err(|e| DecodeError::Resample(e.to_string()))?;
            for (ch, data) in out.iter_mut().zip(rendered) {
                ch.extend(data);
            }
            pos += needed;
        } else {
            if pos < len {
                let chunk: Vec<&[Sample]> = channels.iter().map(|c| &c[pos..]).collect();
                let rendered = resampler
                    .process_partial(Some(chunk.as_slice()), None)
                    .map_err(|e| DecodeError::Resample(e.to_string()))?;
                for (ch, data) in out.iter_mut().zip(rendered) {
                    ch.extend(data);
                }
            }
            // Flush the resampler's internal buffer
            let rendered = resampler
                .process_partial(None::<&[Vec<Sample>]>, None)
                .map_err(|e| DecodeError::Resample(e.to_string()))?;
            for (ch, data) in out.iter_mut().zip(rendered) {
                ch.extend(data);
            }
            break;
        }
    }

    // Drop the sinc latency from the front and pin the length so the file's
    // duration survives the rate change exactly
    for ch in &mut out {
        ch.drain(..delay.min(ch.len()));
        ch.resize(expected, 0.0);
    }

    Ok(out)
}
