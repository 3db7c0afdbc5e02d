//! Waveform view state
//!
//! Bridges the engine's buffer-changed events to an external drawing
//! surface: recomputes the column and ruler data whenever the buffer
//! changes, and pushes a frame with the current playback progress once per
//! tick while playing.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use waveline_core::event::{BufferChanged, EventDispatcher, FileInfo, SubscriptionId};

use crate::downsample::{downsample, WaveformColumn};
use crate::ruler::ruler_marks;

/// View construction errors
#[derive(Error, Debug)]
pub enum ViewError {
    /// The rendering surface dimensions are unusable
    #[error("Invalid rendering surface: {0}")]
    InvalidSurface(String),
}

/// Rendering surface dimensions
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Number of display columns (the surface's pixel width)
    pub columns: usize,
    /// Surface height in pixels, waveform occupies half above/below center
    pub render_height: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            columns: 800,
            render_height: 200.0,
        }
    }
}

impl ViewConfig {
    /// Check the dimensions for construction-time errors
    pub fn validate(&self) -> Result<(), ViewError> {
        if self.columns == 0 {
            return Err(ViewError::InvalidSurface("zero columns".to_string()));
        }
        if !self.render_height.is_finite() || self.render_height <= 0.0 {
            return Err(ViewError::InvalidSurface(format!(
                "bad render height {}",
                self.render_height
            )));
        }
        Ok(())
    }
}

/// One frame handed to the drawing surface
pub struct WaveformFrame<'a> {
    /// Per-column amplitude and owning file
    pub columns: &'a [WaveformColumn],
    /// Loaded files (the owner index resolves into this list for colors)
    pub files: &'a [FileInfo],
    /// Labelled time-ruler marks
    pub ruler: &'a [(u64, String)],
    /// Playback progress in `[0, 1]`
    pub progress: f32,
}

/// The external drawing collaborator
pub trait RenderSurface: Send {
    fn draw(&mut self, frame: WaveformFrame<'_>);
}

struct ViewState {
    config: ViewConfig,
    surface: Box<dyn RenderSurface>,
    columns: Vec<WaveformColumn>,
    files: Vec<FileInfo>,
    ruler: Vec<(u64, String)>,
    duration: f64,
}

impl ViewState {
    fn reload(&mut self, event: &BufferChanged) {
        self.columns = downsample(
            &event.active_channel,
            &event.positions,
            self.config.columns,
            self.config.render_height,
        );
        self.ruler = ruler_marks(event.duration);
        self.files = event.files.clone();
        self.duration = event.duration;
        log::debug!(
            "Waveform recomputed: {} column(s) over {:.2}s",
            self.columns.len(),
            self.duration
        );
    }

    fn redraw(&mut self, progress: f32) {
        self.surface.draw(WaveformFrame {
            columns: &self.columns,
            files: &self.files,
            ruler: &self.ruler,
            progress,
        });
    }
}

/// Keeps the downsampled waveform in sync with the timeline buffer
pub struct WaveformView {
    state: Arc<Mutex<ViewState>>,
    subscription: Option<SubscriptionId>,
}

impl WaveformView {
    /// Create a view drawing onto `surface`
    pub fn new(config: ViewConfig, surface: Box<dyn RenderSurface>) -> Result<Self, ViewError> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(Mutex::new(ViewState {
                config,
                surface,
                columns: Vec::new(),
                files: Vec::new(),
                ruler: Vec::new(),
                duration: 0.0,
            })),
            subscription: None,
        })
    }

    /// Subscribe to a buffer-changed source; every event recomputes the
    /// column data and redraws once with progress reset
    pub fn attach(&mut self, events: &EventDispatcher<BufferChanged>) {
        let state = Arc::clone(&self.state);
        self.subscription = Some(events.subscribe(move |event: &BufferChanged| {
            let mut state = state.lock().unwrap();
            state.reload(event);
            state.redraw(0.0);
        }));
    }

    /// The subscription handle, if attached
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Redraw with the progress for `current_time`
    ///
    /// Called once per tick of the caller's playback loop; `None` draws the
    /// resting state.
    pub fn tick(&self, current_time: Option<f64>) {
        let mut state = self.state.lock().unwrap();
        let progress = match current_time {
            Some(time) if state.duration > 0.0 => (time / state.duration).clamp(0.0, 1.0) as f32,
            _ => 0.0,
        };
        state.redraw(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct RecordingSurface {
        /// (column count, max amplitude, progress) per draw call
        draws: Arc<Mutex<Vec<(usize, f32, f32)>>>,
    }

    impl RenderSurface for RecordingSurface {
        fn draw(&mut self, frame: WaveformFrame<'_>) {
            let peak = frame
                .columns
                .iter()
                .map(|c| c.amplitude)
                .fold(0.0f32, f32::max);
            self.draws
                .lock()
                .unwrap()
                .push((frame.columns.len(), peak, frame.progress));
        }
    }

    fn buffer_changed(samples: Vec<f32>, duration: f64) -> BufferChanged {
        BufferChanged {
            active_channel: Arc::new(samples),
            sample_rate: 100,
            duration,
            file_count: 1,
            positions: vec![0],
            files: vec![FileInfo {
                url: "a.wav".to_string(),
                color: "#AABBCC".to_string(),
            }],
        }
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        let config = ViewConfig {
            columns: 0,
            ..Default::default()
        };
        assert!(WaveformView::new(config, Box::new(RecordingSurface::default())).is_err());
    }

    #[test]
    fn test_buffer_change_recomputes_and_redraws() {
        let surface = RecordingSurface::default();
        let draws = surface.draws.clone();

        let config = ViewConfig {
            columns: 10,
            render_height: 100.0,
        };
        let mut view = WaveformView::new(config, Box::new(surface)).unwrap();

        let events = EventDispatcher::new();
        view.attach(&events);
        events.emit(&buffer_changed(vec![0.5; 500], 5.0));

        let recorded = draws.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        let (columns, peak, progress) = recorded[0];
        assert_eq!(columns, 10);
        assert!((peak - 50.0).abs() < 1e-4);
        assert_eq!(progress, 0.0);
    }

    #[test]
    fn test_tick_reports_progress_fraction() {
        let surface = RecordingSurface::default();
        let draws = surface.draws.clone();

        let mut view =
            WaveformView::new(ViewConfig::default(), Box::new(surface)).unwrap();
        let events = EventDispatcher::new();
        view.attach(&events);
        events.emit(&buffer_changed(vec![0.5; 500], 5.0));

        view.tick(Some(2.5));
        view.tick(Some(99.0));
        view.tick(None);

        let recorded = draws.lock().unwrap();
        assert_eq!(recorded[1].2, 0.5);
        assert_eq!(recorded[2].2, 1.0);
        assert_eq!(recorded[3].2, 0.0);
    }
}
