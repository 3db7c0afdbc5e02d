//! Waveline Waveform - display data preparation for the timeline buffer
//!
//! Turns the engine's raw sample data into a compact renderable form: one
//! amplitude + owning-file tuple per display column, labelled time-ruler
//! marks, and a playback progress fraction. The actual pixel drawing lives
//! behind the [`RenderSurface`] trait.

pub mod downsample;
pub mod ruler;
pub mod view;

pub use downsample::{downsample, WaveformColumn};
pub use ruler::{format_clock, ruler_marks};
pub use view::{RenderSurface, ViewConfig, ViewError, WaveformFrame, WaveformView};
