use crate::models::{Stroke, YBounds};

/// Slack applied to query intervals to absorb baseline jitter in handwriting.
pub const DEFAULT_Y_TOLERANCE: f64 = 5.0;

/// Strokes whose vertical extent meets `bounds` widened by `tolerance`.
///
/// Strokes without points have no extent and never match. Input order is kept.
pub fn strokes_overlapping<'a, I>(strokes: I, bounds: &YBounds, tolerance: f64) -> Vec<&'a Stroke>
where
    I: IntoIterator<Item = &'a Stroke>,
{
    strokes
        .into_iter()
        .filter(|stroke| {
            stroke
                .y_bounds()
                .map(|extent| bounds.overlaps(&extent, tolerance))
                .unwrap_or(false)
        })
        .collect()
}
