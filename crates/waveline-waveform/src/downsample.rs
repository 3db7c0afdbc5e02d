//! Waveform downsampling
//!
//! Converts the active channel's raw samples plus the file-offset list into
//! one renderable tuple per display column: a mean-absolute amplitude in
//! pixel units and the index of the file that owns that point on the
//! timeline.

use waveline_core::types::Sample;

/// Reference ceiling the loudest column is normalized to before rescaling
/// into pixel units
const NORMAL_CEILING: f32 = 32768.0;

/// One display column of the waveform
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformColumn {
    /// Column height in `[0, render_height / 2]` pixel units
    pub amplitude: f32,
    /// Index of the file owning the column's starting sample
    pub file_index: usize,
}

/// Index of the file whose start position is the greatest one at or before
/// `sample`; 0 when the position list is empty
fn owner_index(positions: &[usize], sample: usize) -> usize {
    positions.iter().rposition(|&p| p <= sample).unwrap_or(0)
}

/// Downsample `samples` into `columns` display columns
///
/// The sample array is partitioned into `columns` contiguous subsets of
/// equal floating-point length (the last may be shorter by fractional
/// rounding). Each subset's amplitude is the mean of its absolute sample
/// values; amplitudes are then normalized so the loudest column maps to the
/// reference ceiling and rescaled into `[0, render_height / 2]`.
pub fn downsample(
    samples: &[Sample],
    positions: &[usize],
    columns: usize,
    render_height: f32,
) -> Vec<WaveformColumn> {
    if columns == 0 || samples.is_empty() {
        return Vec::new();
    }

    let subset_len = samples.len() as f64 / columns as f64;
    let mut out = Vec::with_capacity(columns);
    let mut peak = 0.0f32;

    for i in 0..columns {
        let start = (i as f64 * subset_len) as usize;
        let end = ((i + 1) as f64 * subset_len) as usize;
        let end = end.min(samples.len()).max(start);

        let subset = &samples[start..end];
        let amplitude = if subset.is_empty() {
            0.0
        } else {
            subset.iter().map(|s| s.abs()).sum::<f32>() / subset.len() as f32
        };

        if amplitude > peak {
            peak = amplitude;
        }
        out.push(WaveformColumn {
            amplitude,
            file_index: owner_index(positions, start),
        });
    }

    if peak > 0.0 {
        let normal = NORMAL_CEILING / peak;
        let half_height = render_height / 2.0;
        for column in &mut out {
            column.amplitude = (column.amplitude * normal / NORMAL_CEILING) * half_height;
        }
    }

    out
}
