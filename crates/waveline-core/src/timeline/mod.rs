//! Timeline buffer aggregation
//!
//! Owns the ordered list of loaded files, concatenates their decoded audio
//! into one master multi-channel buffer, tracks each file's starting sample
//! offset, and exposes patch / revert / playback on the active channel.
//!
//! Two sample stores exist side by side: the live buffer that patches write
//! into and playback reads from, and the original snapshot taken at every
//! structural change that `extract_samples` reads from and `revert` restores.
//! They never share backing storage.

mod loader;

pub use loader::LoadError;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::event::{BufferChanged, EventDispatcher, FileInfo, SubscriptionId};
use crate::platform::{AudioDecoder, FetchService, PlaybackError, PlaybackSink};
use crate::types::{DecodedAudio, MultiBuffer, Sample};
use loader::FileLoader;

/// Fallback display palette cycled when the caller configures no colors
pub const FILE_COLORS: [&str; 8] = [
    "#66C2A5", "#FC8D62", "#8DA0CB", "#E78AC8", "#A6D854", "#FFD92F", "#E5C494", "#B3B3B3",
];

/// One loaded source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Source url
    pub url: String,
    /// Decoded audio at the engine sample rate
    pub audio: DecodedAudio,
    /// Display color assigned at load time
    pub color: String,
}

impl SourceFile {
    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.audio.duration()
    }

    /// Length in samples
    pub fn len_samples(&self) -> usize {
        self.audio.len_samples()
    }
}

/// A write of rendered samples at a sample offset on the active channel
#[derive(Debug, Clone)]
pub struct PatchSegment {
    /// Starting sample index on the timeline
    pub offset: usize,
    /// Samples to write; clamped at the buffer end
    pub samples: Vec<Sample>,
}

/// Outcome of one `add_files` batch
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Urls that entered the timeline, in request order
    pub loaded: Vec<String>,
    /// Urls that failed, with the reason
    pub failed: Vec<(String, LoadError)>,
}

impl LoadReport {
    /// True when every requested file loaded
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

struct ActivePlayback {
    started_at: Instant,
    start_offset: f64,
    finished: Arc<AtomicBool>,
    completion: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

/// The timeline buffer aggregator
pub struct TimelineAggregator {
    files: Vec<SourceFile>,
    buffer: MultiBuffer,
    snapshot: Vec<Sample>,
    positions: Vec<usize>,
    colors: Vec<String>,
    audio_channel: usize,
    sample_rate: u32,
    loader: FileLoader,
    sink: Box<dyn PlaybackSink>,
    playback: Option<ActivePlayback>,
    changed: EventDispatcher<BufferChanged>,
}

impl TimelineAggregator {
    /// Create an empty aggregator
    ///
    /// The config must already be validated; see
    /// [`EngineConfig::validate`](crate::config::EngineConfig::validate).
    pub fn new(
        config: &EngineConfig,
        fetcher: Arc<dyn FetchService>,
        decoder: Arc<dyn AudioDecoder>,
        sink: Box<dyn PlaybackSink>,
    ) -> Self {
        Self {
            files: Vec::new(),
            buffer: MultiBuffer::empty(config.sample_rate),
            snapshot: Vec::new(),
            positions: Vec::new(),
            colors: config.colors.clone(),
            audio_channel: config.audio_channel,
            sample_rate: config.sample_rate,
            loader: FileLoader::spawn(fetcher, decoder),
            sink,
            playback: None,
            changed: EventDispatcher::new(),
        }
    }

    /// Fetch, decode and append a batch of files
    ///
    /// The whole batch is loaded before the timeline changes, so the
    /// buffer-changed event fires once per call with every sibling visible.
    /// A file that fails to fetch or decode is logged, reported, and does
    /// not keep its siblings out of the buffer.
    pub fn add_files(&mut self, urls: &[String]) -> LoadReport {
        if urls.is_empty() {
            return LoadReport::default();
        }

        for (index, url) in urls.iter().enumerate() {
            self.loader.request(index, url);
        }
        let results = self.loader.collect(urls.len());

        let mut report = LoadReport::default();
        for result in results {
            match result.result {
                Ok(audio) => {
                    let color = self.color_at(self.files.len());
                    log::info!(
                        "Loaded {} ({:.2}s, {} channel(s))",
                        result.url,
                        audio.duration(),
                        audio.channel_count()
                    );
                    self.files.push(SourceFile {
                        url: result.url.clone(),
                        audio,
                        color,
                    });
                    report.loaded.push(result.url);
                }
                Err(e) => {
                    report.failed.push((result.url, e));
                }
            }
        }

        self.rebuild();
        self.emit_changed();
        report
    }

    /// Remove files by exact url match
    ///
    /// The event can be suppressed when the caller is about to add files in
    /// the same logical operation, avoiding a redundant intermediate render.
    pub fn remove_files(&mut self, names: &[String], emit_event: bool) {
        for name in names {
            match self.files.iter().position(|f| &f.url == name) {
                Some(pos) => {
                    self.files.remove(pos);
                }
                None => log::warn!("remove_files: no loaded file named {}", name),
            }
        }
        self.rebuild();
        if emit_event {
            self.emit_changed();
        }
    }

    /// Copy of the original snapshot's samples in `[start, end)`
    ///
    /// Indices are clamped to the snapshot bounds.
    pub fn extract_samples(&self, start: usize, end: usize) -> Vec<Sample> {
        let len = self.snapshot.len();
        let start = start.min(len);
        let end = end.min(len).max(start);
        self.snapshot[start..end].to_vec()
    }

    /// Apply rendered segments onto the active channel of the live buffer
    ///
    /// Writes never touch the snapshot, and a segment reaching past the
    /// buffer end is clamped to a partial tail write.
    pub fn patch(&mut self, segments: &[PatchSegment]) {
        let channel = self.active_channel_index();
        for segment in segments {
            self.buffer.write_at(channel, segment.offset, &segment.samples);
        }
        self.emit_changed();
    }

    /// Restore the active channel from the original snapshot
    pub fn revert(&mut self) {
        if !self.snapshot.is_empty() {
            let channel = self.active_channel_index();
            let snapshot = std::mem::take(&mut self.snapshot);
            self.buffer.replace_channel(channel, &snapshot);
            self.snapshot = snapshot;
        }
        self.emit_changed();
    }

    /// Start playback of the current buffer at `start_at` seconds
    ///
    /// `on_complete` is invoked exactly once when playback reaches the end
    /// of the buffer or is stopped. Starting while already playing stops the
    /// previous run first (completing it).
    pub fn play(
        &mut self,
        start_at: f64,
        on_complete: Option<Box<dyn FnOnce() + Send>>,
    ) -> Result<(), PlaybackError> {
        self.stop();

        let start_offset = start_at.max(0.0);
        let finished = Arc::new(AtomicBool::new(false));
        let completion = Arc::new(Mutex::new(on_complete));

        let ended_flag = Arc::clone(&finished);
        let ended_completion = Arc::clone(&completion);
        let on_ended = Box::new(move || {
            ended_flag.store(true, Ordering::SeqCst);
            if let Some(cb) = ended_completion.lock().unwrap().take() {
                cb();
            }
        });

        self.sink
            .play(self.buffer.channel_arcs(), self.sample_rate, start_offset, on_ended)?;

        self.playback = Some(ActivePlayback {
            started_at: Instant::now(),
            start_offset,
            finished,
            completion,
        });
        Ok(())
    }

    /// Halt playback; stopping counts as completion
    ///
    /// A pending completion callback fires exactly once. Stopping with no
    /// active playback is a no-op.
    pub fn stop(&mut self) {
        self.sink.stop();
        if let Some(playback) = self.playback.take() {
            playback.finished.store(true, Ordering::SeqCst);
            if let Some(cb) = playback.completion.lock().unwrap().take() {
                cb();
            }
        }
    }

    /// Playback position on the timeline in seconds (the start offset plus
    /// the time elapsed since the last `play`), or `None` when idle
    pub fn current_time(&self) -> Option<f64> {
        self.playback
            .as_ref()
            .filter(|p| !p.finished.load(Ordering::SeqCst))
            .map(|p| p.start_offset + p.started_at.elapsed().as_secs_f64())
    }

    /// The buffer-changed event source
    pub fn events(&self) -> &EventDispatcher<BufferChanged> {
        &self.changed
    }

    /// Subscribe to buffer-changed events
    pub fn on_buffer_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BufferChanged) + Send + Sync + 'static,
    {
        self.changed.subscribe(handler)
    }

    /// Buffer duration in seconds
    pub fn duration(&self) -> f64 {
        self.buffer.duration()
    }

    /// Engine sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of loaded files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Loaded files in timeline order
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Urls of the loaded files in timeline order
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.url.clone()).collect()
    }

    /// Starting sample offset of each file, in timeline order
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Starting sample offset of the named file
    pub fn position_of(&self, url: &str) -> Option<usize> {
        let idx = self.files.iter().position(|f| f.url == url)?;
        self.positions.get(idx).copied()
    }

    /// Duration in seconds of the named file
    pub fn file_duration(&self, url: &str) -> Option<f64> {
        self.files
            .iter()
            .find(|f| f.url == url)
            .map(|f| f.duration())
    }

    /// Copy of the active channel's current (possibly patched) samples
    pub fn active_samples(&self) -> Vec<Sample> {
        self.buffer
            .channel(self.active_channel_index())
            .map(<[Sample]>::to_vec)
            .unwrap_or_default()
    }

    /// The configured channel, clamped to what the buffer actually has
    fn active_channel_index(&self) -> usize {
        match self.buffer.channel_count() {
            0 => 0,
            n => self.audio_channel.min(n - 1),
        }
    }

    /// Recompute buffer, positions and snapshot from the file list
    fn rebuild(&mut self) {
        self.buffer = concat_files(&self.files, self.sample_rate);
        self.positions = file_positions(&self.files);
        self.snapshot = self
            .buffer
            .channel(self.active_channel_index())
            .map(<[Sample]>::to_vec)
            .unwrap_or_default();
    }

    fn emit_changed(&self) {
        let active = self
            .buffer
            .channel_arc(self.active_channel_index())
            .unwrap_or_else(|| Arc::new(Vec::new()));
        let event = BufferChanged {
            active_channel: active,
            sample_rate: self.sample_rate,
            duration: self.buffer.duration(),
            file_count: self.files.len(),
            positions: self.positions.clone(),
            files: self
                .files
                .iter()
                .map(|f| FileInfo {
                    url: f.url.clone(),
                    color: f.color.clone(),
                })
                .collect(),
        };
        self.changed.emit(&event);
    }

    fn color_at(&self, idx: usize) -> String {
        self.colors
            .get(idx)
            .cloned()
            .unwrap_or_else(|| FILE_COLORS[idx % FILE_COLORS.len()].to_string())
    }
}

/// Concatenate decoded files into one multi-channel buffer
///
/// The result has the maximum channel count across files; where a file has
/// fewer channels than that, silence of the file's length substitutes, so
/// every output channel spans the full timeline.
fn concat_files(files: &[SourceFile], sample_rate: u32) -> MultiBuffer {
    let max_channels = files
        .iter()
        .map(|f| f.audio.channel_count())
        .max()
        .unwrap_or(0);
    if max_channels == 0 {
        return MultiBuffer::empty(sample_rate);
    }

    let total: usize = files.iter().map(|f| f.len_samples()).sum();
    let mut channels = Vec::with_capacity(max_channels);
    for c in 0..max_channels {
        let mut data = Vec::with_capacity(total);
        for file in files {
            match file.audio.channels.get(c) {
                Some(ch) => data.extend_from_slice(ch),
                None => data.resize(data.len() + file.len_samples(), 0.0),
            }
        }
        channels.push(data);
    }
    MultiBuffer::from_channels(channels, sample_rate)
}

/// Starting sample index per file: the sum of every earlier file's length
fn file_positions(files: &[SourceFile]) -> Vec<usize> {
    let mut positions = Vec::with_capacity(files.len());
    let mut sum = 0usize;
    for file in files {
        positions.push(sum);
        sum += file.len_samples();
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_aggregator;
    use std::sync::atomic::AtomicUsize;

    const RATE: u32 = 44100;

    fn event_counter(aggregator: &TimelineAggregator) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        aggregator.on_buffer_changed(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        counter
    }

    #[test]
    fn test_two_files_concat_and_positions() {
        let (mut aggregator, _) = test_aggregator(RATE);
        let report =
            aggregator.add_files(&["2x1@0.5.wav".to_string(), "3x1@0.5.wav".to_string()]);

        assert!(report.all_ok());
        assert!((aggregator.duration() - 5.0).abs() < 1e-9);
        assert_eq!(aggregator.positions(), &[0, 88200]);
        assert_eq!(aggregator.position_of("3x1@0.5.wav"), Some(88200));
        assert_eq!(aggregator.file_duration("2x1@0.5.wav"), Some(2.0));
    }

    #[test]
    fn test_positions_strictly_increasing_from_zero() {
        let (mut aggregator, _) = test_aggregator(RATE);
        aggregator.add_files(&[
            "1x1@0.1.wav".to_string(),
            "2x1@0.1.wav".to_string(),
            "1x1@0.1#c.wav".to_string(),
        ]);

        let positions = aggregator.positions();
        assert_eq!(positions[0], 0);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_channel_count_is_max_with_silence_fill() {
        let (mut aggregator, _) = test_aggregator(100);
        // 1s stereo then 1s mono
        aggregator.add_files(&["1x2@0.5.wav".to_string(), "1x1@0.5.wav".to_string()]);

        assert_eq!(aggregator.buffer.channel_count(), 2);
        let second_channel = aggregator.buffer.channel(1).unwrap();
        // Stereo file's channel 1 carries audio, the mono file's span is silence
        assert_eq!(second_channel[0], 1.0);
        assert_eq!(second_channel[150], 0.0);
        assert_eq!(second_channel.len(), 200);
    }

    #[test]
    fn test_failed_file_does_not_block_siblings() {
        let (mut aggregator, _) = test_aggregator(RATE);
        let counter = event_counter(&aggregator);

        let report =
            aggregator.add_files(&["missing.wav".to_string(), "2x1@0.5.wav".to_string()]);

        assert_eq!(report.loaded, vec!["2x1@0.5.wav".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(aggregator.file_count(), 1);
        assert!((aggregator.duration() - 2.0).abs() < 1e-9);
        // One event for the whole batch
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_batch_emits_single_event() {
        let (mut aggregator, _) = test_aggregator(RATE);
        let counter = event_counter(&aggregator);

        aggregator.add_files(&["1x1@0.5.wav".to_string(), "1x1@0.5#b.wav".to_string()]);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_first_file() {
        let (mut aggregator, _) = test_aggregator(RATE);
        aggregator.add_files(&["2x1@0.5.wav".to_string(), "3x1@0.5.wav".to_string()]);

        aggregator.remove_files(&["2x1@0.5.wav".to_string()], true);

        assert_eq!(aggregator.file_count(), 1);
        assert!((aggregator.duration() - 3.0).abs() < 1e-9);
        assert_eq!(aggregator.positions(), &[0]);
    }

    #[test]
    fn test_remove_with_suppressed_event() {
        let (mut aggregator, _) = test_aggregator(RATE);
        aggregator.add_files(&["2x1@0.5.wav".to_string()]);
        let counter = event_counter(&aggregator);

        aggregator.remove_files(&["2x1@0.5.wav".to_string()], false);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        aggregator.remove_files(&["nope.wav".to_string()], true);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extract_samples_clamps() {
        let (mut aggregator, _) = test_aggregator(100);
        aggregator.add_files(&["1x1@0.5.wav".to_string()]);

        assert_eq!(aggregator.extract_samples(0, 100).len(), 100);
        assert_eq!(aggregator.extract_samples(50, 10_000).len(), 50);
        assert_eq!(aggregator.extract_samples(500, 600).len(), 0);
        assert_eq!(aggregator.extract_samples(80, 20).len(), 0);
    }

    #[test]
    fn test_patch_then_revert_roundtrip() {
        let (mut aggregator, _) = test_aggregator(100);
        aggregator.add_files(&["2x1@0.5.wav".to_string()]);
        let original = aggregator.extract_samples(0, usize::MAX);
        let counter = event_counter(&aggregator);

        aggregator.patch(&[PatchSegment {
            offset: 100,
            samples: vec![0.9; 100],
        }]);

        assert_eq!(aggregator.active_samples()[100], 0.9);
        // The snapshot is untouched by the patch
        assert_eq!(aggregator.extract_samples(0, usize::MAX), original);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        aggregator.revert();
        assert_eq!(aggregator.active_samples(), original);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_patch_clamps_tail_write() {
        let (mut aggregator, _) = test_aggregator(100);
        aggregator.add_files(&["1x1@0.5.wav".to_string()]);

        aggregator.patch(&[PatchSegment {
            offset: 80,
            samples: vec![0.9; 100],
        }]);

        let samples = aggregator.active_samples();
        assert_eq!(samples.len(), 100);
        assert_eq!(samples[79], 0.5);
        assert_eq!(samples[80], 0.9);
        assert_eq!(samples[99], 0.9);
    }

    #[test]
    fn test_structural_change_discards_patches() {
        let (mut aggregator, _) = test_aggregator(100);
        aggregator.add_files(&["1x1@0.5.wav".to_string()]);

        aggregator.patch(&[PatchSegment {
            offset: 0,
            samples: vec![0.9; 100],
        }]);
        assert_eq!(aggregator.active_samples()[0], 0.9);

        // A structural change rebuilds the buffer from the decoded files and
        // takes a fresh snapshot; rendered patches do not survive it
        aggregator.add_files(&["1x1@0.2.wav".to_string()]);
        assert_eq!(aggregator.active_samples()[0], 0.5);
        assert_eq!(aggregator.extract_samples(0, 1)[0], 0.5);
        assert_eq!(aggregator.active_samples().len(), 200);
    }

    #[test]
    fn test_play_stop_completion_fires_once() {
        let (mut aggregator, probe) = test_aggregator(100);
        aggregator.add_files(&["1x1@0.5.wav".to_string()]);

        let completions = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&completions);
        aggregator
            .play(0.0, Some(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })))
            .unwrap();

        assert!(aggregator.current_time().is_some());
        assert_eq!(probe.plays.lock().unwrap().len(), 1);

        aggregator.stop();
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(aggregator.current_time().is_none());

        // Second stop is a no-op
        aggregator.stop();
        assert_eq!(completions.load(Ordering::SeqCst), 1);

        // A late sink callback must not double-fire the completion
        probe.finish();
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_natural_end_completes_playback() {
        let (mut aggregator, probe) = test_aggregator(100);
        aggregator.add_files(&["1x1@0.5.wav".to_string()]);

        let completions = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&completions);
        aggregator
            .play(0.25, Some(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })))
            .unwrap();

        assert_eq!(probe.plays.lock().unwrap()[0].2, 0.25);

        // Sink reaches end of buffer
        probe.finish();
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(aggregator.current_time().is_none());

        aggregator.stop();
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_palette_cycles_when_no_colors_configured() {
        let (mut aggregator, _) = test_aggregator(100);
        aggregator.add_files(&["1x1@0.5.wav".to_string(), "1x1@0.5#b.wav".to_string()]);

        let files = aggregator.files();
        assert_eq!(files[0].color, FILE_COLORS[0]);
        assert_eq!(files[1].color, FILE_COLORS[1]);
    }
}
