//! Windowed offline rendering
//!
//! Converts the registered effect set into processed sample data one second
//! at a time and merges the result back into the master buffer as a single
//! patch. Every application is a full re-render over the union range of the
//! current effect set, not an incremental delta.

use crate::platform::{EffectChainLink, OfflineRenderer, RenderError};
use crate::timeline::{PatchSegment, TimelineAggregator};

use super::EffectInstance;

/// Union sample range `[min start, max end)` across all instances
pub fn union_range(effects: &[EffectInstance]) -> Option<(usize, usize)> {
    let start = effects.iter().map(|e| e.range_start).min()?;
    let end = effects.iter().map(|e| e.range_end).max()?;
    Some((start, end))
}

/// The ordered chain active in one second, preserving registration order
fn chain_for_second(effects: &[EffectInstance], second: usize) -> Vec<EffectChainLink> {
    effects
        .iter()
        .filter(|e| e.affects_second(second))
        .map(|e| EffectChainLink {
            type_name: e.type_name.to_string(),
            params: e.params.clone(),
        })
        .collect()
}

/// Render the union range of `effects` and patch the result into the buffer
///
/// The range is widened to whole-second boundaries. Seconds with no active
/// effect are skipped and their samples left untouched. Input for every
/// window comes from the aggregator's original snapshot, so re-applying
/// after a parameter or registry change is idempotent. Renders run strictly
/// one second after another; a failure in any window aborts the whole call
/// before anything is patched.
pub fn apply(
    aggregator: &mut TimelineAggregator,
    renderer: &mut dyn OfflineRenderer,
    effects: &[EffectInstance],
) -> Result<(), RenderError> {
    let Some((start, end)) = union_range(effects) else {
        return Ok(());
    };

    let sample_rate = aggregator.sample_rate() as usize;
    if sample_rate == 0 {
        return Ok(());
    }

    let first_second = start / sample_rate;
    let last_second = end.div_ceil(sample_rate);

    let mut segments: Vec<PatchSegment> = Vec::new();
    for second in first_second..last_second {
        let chain = chain_for_second(effects, second);
        if chain.is_empty() {
            continue;
        }

        let offset = second * sample_rate;
        let input = aggregator.extract_samples(offset, offset + sample_rate);
        if input.is_empty() {
            continue;
        }

        let samples = renderer.render(&chain, &input, aggregator.sample_rate())?;
        segments.push(PatchSegment { offset, samples });
    }

    if !segments.is_empty() {
        log::debug!(
            "Patching {} rendered second(s) over samples [{}, {})",
            segments.len(),
            start,
            end
        );
        aggregator.patch(&segments);
    }
    Ok(())
}
