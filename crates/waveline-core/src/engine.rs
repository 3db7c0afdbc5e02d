//! Public engine surface
//!
//! Ties the aggregator, the effects registry and the platform services
//! together behind the surface a thin caller layer consumes: file set
//! reconciliation, effect registration / removal / application, playback,
//! and timeline queries.

use std::sync::Arc;

use crate::config::{ConfigError, EngineConfig};
use crate::effects::{
    render, EffectCatalog, EffectId, EffectInstance, EffectsError, EffectsRegistry,
};
use crate::event::{BufferChanged, EventDispatcher, SubscriptionId};
use crate::platform::{
    AudioDecoder, CpalSink, FetchService, FsFetcher, OfflineRenderer, PassthroughRenderer,
    PlaybackError, PlaybackSink, RenderError, SymphoniaDecoder,
};
use crate::timeline::{LoadReport, SourceFile, TimelineAggregator};

/// The collaborators the engine runs against
///
/// Swap any of these for a stub in tests, or for an application-specific
/// implementation (a network fetcher, a real DSP renderer).
pub struct PlatformServices {
    pub fetcher: Arc<dyn FetchService>,
    pub decoder: Arc<dyn AudioDecoder>,
    pub sink: Box<dyn PlaybackSink>,
    pub renderer: Box<dyn OfflineRenderer>,
}

impl PlatformServices {
    /// Filesystem fetch, symphonia decode, CPAL output, no-op DSP
    pub fn defaults(sample_rate: u32) -> Self {
        Self {
            fetcher: Arc::new(FsFetcher),
            decoder: Arc::new(SymphoniaDecoder::new(sample_rate)),
            sink: Box::new(CpalSink::new()),
            renderer: Box::new(PassthroughRenderer),
        }
    }
}

/// The assembled engine
pub struct TimelineEngine {
    aggregator: TimelineAggregator,
    registry: EffectsRegistry,
    renderer: Box<dyn OfflineRenderer>,
    _resync: SubscriptionId,
}

impl TimelineEngine {
    /// Validate the configuration and assemble the engine
    ///
    /// Files listed in `config.audio_files` are loaded before this returns;
    /// per-file failures are logged and do not fail construction.
    pub fn new(config: EngineConfig, services: PlatformServices) -> Result<Self, ConfigError> {
        config.validate()?;

        let aggregator = TimelineAggregator::new(
            &config,
            services.fetcher,
            services.decoder,
            services.sink,
        );
        let registry = EffectsRegistry::new(EffectCatalog::builtin());
        let resync = registry.attach(aggregator.events());

        let mut engine = Self {
            aggregator,
            registry,
            renderer: services.renderer,
            _resync: resync,
        };

        if !config.audio_files.is_empty() {
            let report = engine.aggregator.add_files(&config.audio_files);
            if !report.all_ok() {
                log::warn!(
                    "{} of {} initial file(s) failed to load",
                    report.failed.len(),
                    config.audio_files.len()
                );
            }
        }
        Ok(engine)
    }

    /// Assemble with the default platform services
    pub fn with_defaults(config: EngineConfig) -> Result<Self, ConfigError> {
        let services = PlatformServices::defaults(config.sample_rate);
        Self::new(config, services)
    }

    /// Reconcile the loaded file set against `urls`
    ///
    /// Files no longer listed are removed first (with the change event
    /// suppressed when additions follow, so subscribers see one transition),
    /// then newly listed files are loaded and appended.
    pub fn set_files(&mut self, urls: &[String]) -> LoadReport {
        let current = self.aggregator.file_names();
        let removed: Vec<String> = current
            .iter()
            .filter(|name| !urls.contains(name))
            .cloned()
            .collect();
        let added: Vec<String> = urls
            .iter()
            .filter(|url| !current.contains(url))
            .cloned()
            .collect();

        if !removed.is_empty() {
            self.aggregator.remove_files(&removed, added.is_empty());
        }
        if !added.is_empty() {
            return self.aggregator.add_files(&added);
        }
        LoadReport::default()
    }

    /// Loaded files in timeline order
    pub fn loaded_files(&self) -> &[SourceFile] {
        self.aggregator.files()
    }

    /// Urls of the loaded files in timeline order
    pub fn file_names(&self) -> Vec<String> {
        self.aggregator.file_names()
    }

    /// The catalog of known effect types
    pub fn catalog(&self) -> &EffectCatalog {
        self.registry.catalog()
    }

    /// Currently registered effect instances, in registration order
    pub fn effects(&self) -> Vec<EffectInstance> {
        self.registry.snapshot()
    }

    /// Register an effect of `type_name` over samples `[start, end)`
    pub fn add_effect(
        &mut self,
        type_name: &str,
        start: usize,
        end: usize,
    ) -> Result<EffectId, EffectsError> {
        self.registry
            .add(type_name, start, end, self.aggregator.sample_rate() as usize)
    }

    /// Update one parameter on a registered effect, clamped to its bounds
    pub fn set_effect_param(
        &mut self,
        id: EffectId,
        name: &str,
        value: f64,
    ) -> Result<(), EffectsError> {
        self.registry.set_param(id, name, value)
    }

    /// Remove a registered effect and reapply the remainder
    ///
    /// When other effects remain, the union range of the remaining set is
    /// re-rendered; when the last one goes, the buffer reverts to the
    /// original snapshot. Returns false when the id is unknown.
    pub fn remove_effect(&mut self, id: EffectId) -> Result<bool, RenderError> {
        match self.registry.remove(id) {
            None => Ok(false),
            Some(0) => {
                self.aggregator.revert();
                Ok(true)
            }
            Some(_) => {
                self.apply_effects()?;
                Ok(true)
            }
        }
    }

    /// Render the registered effect set and patch the result into the buffer
    ///
    /// A full re-render over the union range of the current set; a render
    /// failure aborts the call with the buffer left at its pre-apply state.
    pub fn apply_effects(&mut self) -> Result<(), RenderError> {
        let effects = self.registry.snapshot();
        render::apply(&mut self.aggregator, self.renderer.as_mut(), &effects)
    }

    /// Start playback at `start_at` seconds (from the beginning by default)
    pub fn play(
        &mut self,
        start_at: Option<f64>,
        on_complete: Option<Box<dyn FnOnce() + Send>>,
    ) -> Result<(), PlaybackError> {
        self.aggregator.play(start_at.unwrap_or(0.0), on_complete)
    }

    /// Halt playback; a pending completion callback fires exactly once
    pub fn stop(&mut self) {
        self.aggregator.stop();
    }

    /// Playback position on the timeline in seconds, or `None` when idle
    pub fn current_time(&self) -> Option<f64> {
        self.aggregator.current_time()
    }

    /// Buffer duration in seconds
    pub fn duration(&self) -> f64 {
        self.aggregator.duration()
    }

    /// Engine sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.aggregator.sample_rate()
    }

    /// Starting sample offset of the named file on the timeline
    pub fn position_of(&self, url: &str) -> Option<usize> {
        self.aggregator.position_of(url)
    }

    /// Duration in seconds of the named file
    pub fn file_duration(&self, url: &str) -> Option<f64> {
        self.aggregator.file_duration(url)
    }

    /// The buffer-changed event source, for external subscribers
    pub fn events(&self) -> &EventDispatcher<BufferChanged> {
        self.aggregator.events()
    }

    /// Subscribe to buffer-changed events
    pub fn on_buffer_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BufferChanged) + Send + Sync + 'static,
    {
        self.aggregator.on_buffer_changed(handler)
    }
}
