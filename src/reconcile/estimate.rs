use std::collections::{BTreeSet, HashMap};

use crate::models::{EstimatedLine, Recognition, Stroke, StrokeId, YBounds};

use super::geometry::strokes_overlapping;

/// Ids of the strokes likely to have produced a line spanning `bounds`.
///
/// An empty result is valid: lines typed in the editor have no stroke backing.
pub fn estimate_stroke_ids<'a, I>(bounds: &YBounds, strokes: I, tolerance: f64) -> BTreeSet<StrokeId>
where
    I: IntoIterator<Item = &'a Stroke>,
{
    strokes_overlapping(strokes, bounds, tolerance)
        .into_iter()
        .map(|stroke| stroke.id)
        .collect()
}

/// Estimates every line of a recognizer batch, preserving recognizer order.
///
/// Blank lines are dropped; they can never produce a block. Strokes estimated for
/// several lines are linked by only one of them (see [`assign_link_owners`]).
pub fn estimate_lines(
    recognition: &Recognition,
    strokes: &[&Stroke],
    tolerance: f64,
) -> Vec<EstimatedLine> {
    let mut lines: Vec<EstimatedLine> = recognition
        .lines
        .iter()
        .filter(|line| !line.text.trim().is_empty())
        .map(|line| {
            let stroke_ids = estimate_stroke_ids(&line.bounds, strokes.iter().copied(), tolerance);
            EstimatedLine::new(line.text.trim(), line.bounds, line.indent_level, stroke_ids)
        })
        .collect();
    assign_link_owners(&mut lines, strokes);
    lines
}

/// Fills each line's `link_ids` so every stroke has a single owning line.
///
/// A stroke goes to the line whose unwidened bounds overlap its extent the most,
/// then to the line with the nearest center, then to the earliest line.
pub fn assign_link_owners(lines: &mut [EstimatedLine], strokes: &[&Stroke]) {
    let extents: HashMap<StrokeId, YBounds> = strokes
        .iter()
        .filter_map(|stroke| stroke.y_bounds().map(|bounds| (stroke.id, bounds)))
        .collect();

    let mut owners: HashMap<StrokeId, usize> = HashMap::new();
    for (index, line) in lines.iter().enumerate() {
        for id in &line.stroke_ids {
            let Some(extent) = extents.get(id) else {
                continue;
            };
            let keep = owners
                .get(id)
                .is_some_and(|&current| !closer_fit(extent, &line.bounds, &lines[current].bounds));
            if !keep {
                owners.insert(*id, index);
            }
        }
    }

    for line in lines.iter_mut() {
        line.link_ids.clear();
    }
    for (id, index) in owners {
        lines[index].link_ids.insert(id);
    }
}

fn closer_fit(extent: &YBounds, challenger: &YBounds, incumbent: &YBounds) -> bool {
    let (a, b) = (extent.overlap_len(challenger), extent.overlap_len(incumbent));
    if a != b {
        return a > b;
    }
    (extent.center() - challenger.center()).abs() < (extent.center() - incumbent.center()).abs()
}
