//! Shared test doubles for the platform service boundaries
//!
//! The stub fetcher hands the url back as bytes and the stub decoder parses
//! it as a synthesis recipe, so a test can describe a file's shape in its
//! name: `"<seconds>x<channels>@<value>[#tag].wav"` decodes to constant
//! samples of `value * (channel + 1)`. Urls starting with `missing` fail to
//! fetch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::EngineConfig;
use crate::platform::{
    AudioDecoder, DecodeError, EffectChainLink, FetchError, FetchService, OfflineRenderer,
    PlaybackError, PlaybackSink, RenderError,
};
use crate::timeline::TimelineAggregator;
use crate::types::{DecodedAudio, Sample};

pub(crate) struct SpecFetcher;

impl FetchService for SpecFetcher {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url.starts_with("missing") {
            return Err(FetchError::Unreachable {
                url: url.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        Ok(url.as_bytes().to_vec())
    }
}

pub(crate) struct SpecDecoder {
    pub sample_rate: u32,
}

impl AudioDecoder for SpecDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::UnsupportedFormat("not utf8".to_string()))?;
        let recipe = text.trim_end_matches(".wav");
        let recipe = recipe.split('#').next().unwrap_or(recipe);

        let parse = || -> Option<DecodedAudio> {
            let (dims, value) = recipe.split_once('@')?;
            let (secs, chans) = dims.split_once('x')?;
            let secs: f64 = secs.parse().ok()?;
            let chans: usize = chans.parse().ok()?;
            let value: Sample = value.parse().ok()?;
            let len = (secs * self.sample_rate as f64).round() as usize;
            Some(DecodedAudio {
                channels: (0..chans)
                    .map(|c| vec![value * (c + 1) as Sample; len])
                    .collect(),
                sample_rate: self.sample_rate,
            })
        };
        parse().ok_or_else(|| DecodeError::UnsupportedFormat(text.to_string()))
    }
}

/// Shared handles into a [`StubSink`], kept by the test
#[derive(Clone, Default)]
pub(crate) struct SinkProbe {
    /// (channel count, samples per channel, start offset) per play call
    pub plays: Arc<Mutex<Vec<(usize, usize, f64)>>>,
    pub stops: Arc<AtomicUsize>,
    pending_end: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl SinkProbe {
    /// Simulate the sink reaching the end of the buffer
    pub fn finish(&self) {
        if let Some(cb) = self.pending_end.lock().unwrap().take() {
            cb();
        }
    }
}

pub(crate) struct StubSink {
    pub probe: SinkProbe,
}

impl PlaybackSink for StubSink {
    fn play(
        &mut self,
        channels: Vec<Arc<Vec<Sample>>>,
        _sample_rate: u32,
        start_offset: f64,
        on_ended: Box<dyn FnOnce() + Send>,
    ) -> Result<(), PlaybackError> {
        self.probe.plays.lock().unwrap().push((
            channels.len(),
            channels.first().map(|c| c.len()).unwrap_or(0),
            start_offset,
        ));
        *self.probe.pending_end.lock().unwrap() = Some(on_ended);
        Ok(())
    }

    fn stop(&mut self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Renderer that doubles the input once per chain link
pub(crate) struct DoublingRenderer;

impl OfflineRenderer for DoublingRenderer {
    fn render(
        &mut self,
        chain: &[EffectChainLink],
        input: &[Sample],
        _sample_rate: u32,
    ) -> Result<Vec<Sample>, RenderError> {
        let factor = (2.0 as Sample).powi(chain.len() as i32);
        Ok(input.iter().map(|s| s * factor).collect())
    }
}

/// Renderer that always fails
pub(crate) struct FailingRenderer;

impl OfflineRenderer for FailingRenderer {
    fn render(
        &mut self,
        _chain: &[EffectChainLink],
        _input: &[Sample],
        _sample_rate: u32,
    ) -> Result<Vec<Sample>, RenderError> {
        Err(RenderError::Failed("stub render failure".to_string()))
    }
}

/// Aggregator wired to the stub services, plus the sink probe
pub(crate) fn test_aggregator(sample_rate: u32) -> (TimelineAggregator, SinkProbe) {
    let probe = SinkProbe::default();
    let config = EngineConfig {
        sample_rate,
        ..Default::default()
    };
    let aggregator = TimelineAggregator::new(
        &config,
        Arc::new(SpecFetcher),
        Arc::new(SpecDecoder { sample_rate }),
        Box::new(StubSink {
            probe: probe.clone(),
        }),
    );
    (aggregator, probe)
}
