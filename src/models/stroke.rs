use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{BlockId, PageRef};

/// Stable stroke identifier: the pen-down timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrokeId(pub i64);

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// Capture time in milliseconds.
    pub t: i64,
}

impl Point {
    pub fn new(x: f64, y: f64, t: i64) -> Self {
        Self { x, y, t }
    }
}

/// Vertical extent of a stroke, line or block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YBounds {
    pub min_y: f64,
    pub max_y: f64,
}

impl YBounds {
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { min_y: a, max_y: b }
        } else {
            Self { min_y: b, max_y: a }
        }
    }

    /// Extent of a set of y coordinates, `None` when the set is empty.
    pub fn from_ys<I: IntoIterator<Item = f64>>(ys: I) -> Option<Self> {
        ys.into_iter().fold(None, |acc, y| match acc {
            None => Some(Self { min_y: y, max_y: y }),
            Some(bounds) => Some(Self {
                min_y: bounds.min_y.min(y),
                max_y: bounds.max_y.max(y),
            }),
        })
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }

    /// Intersection test after widening `self` by `tolerance` on both ends.
    pub fn overlaps(&self, other: &YBounds, tolerance: f64) -> bool {
        let lo = self.min_y - tolerance;
        let hi = self.max_y + tolerance;
        other.max_y >= lo && other.min_y <= hi
    }

    /// Length of the shared span, zero when disjoint.
    pub fn overlap_len(&self, other: &YBounds) -> f64 {
        (self.max_y.min(other.max_y) - self.min_y.max(other.min_y)).max(0.0)
    }

    pub fn union(&self, other: &YBounds) -> YBounds {
        YBounds {
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn split_at_midpoint(&self) -> (YBounds, YBounds) {
        let mid = self.center();
        (
            YBounds {
                min_y: self.min_y,
                max_y: mid,
            },
            YBounds {
                min_y: mid,
                max_y: self.max_y,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub id: StrokeId,
    pub points: Vec<Point>,
    pub page: PageRef,
    /// `None` until the stroke has been linked to a text block.
    pub block_id: Option<BlockId>,
    pub deleted: bool,
}

impl Stroke {
    /// Builds a stroke whose id is the timestamp of its first point.
    pub fn new(page: PageRef, points: Vec<Point>) -> Self {
        let id = StrokeId(points.first().map(|p| p.t).unwrap_or_default());
        Self {
            id,
            points,
            page,
            block_id: None,
            deleted: false,
        }
    }

    pub fn y_bounds(&self) -> Option<YBounds> {
        YBounds::from_ys(self.points.iter().map(|p| p.y))
    }

    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Persisted projection: rounded coordinates and start-relative timestamps.
    pub fn to_stored(&self) -> StoredStroke {
        let start = self.id.0;
        StoredStroke {
            id: self.id,
            points: self
                .points
                .iter()
                .map(|p| StoredPoint {
                    x: round_coord(p.x),
                    y: round_coord(p.y),
                    dt: p.t - start,
                })
                .collect(),
            block_id: self.block_id.clone(),
        }
    }
}

fn round_coord(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub x: f64,
    pub y: f64,
    pub dt: i64,
}

/// Stroke as written to the stroke store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredStroke {
    pub id: StrokeId,
    pub points: Vec<StoredPoint>,
    pub block_id: Option<BlockId>,
}

impl StoredStroke {
    pub fn into_stroke(self, page: PageRef) -> Stroke {
        let start = self.id.0;
        Stroke {
            id: self.id,
            points: self
                .points
                .into_iter()
                .map(|p| Point::new(p.x, p.y, start + p.dt))
                .collect(),
            page,
            block_id: self.block_id,
            deleted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    /// Association was empty and now points at the block.
    Linked,
    /// Already pointed at the block.
    Unchanged,
    /// Belongs to another block; left untouched.
    Conflict { existing: BlockId },
    Missing,
}

/// Provenance of an explicit stroke move between blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reassignment {
    pub stroke_id: StrokeId,
    pub from: BlockId,
    pub to: BlockId,
}

/// All strokes captured or imported during a session, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct StrokeCollection {
    strokes: BTreeMap<StrokeId, Stroke>,
}

impl StrokeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stroke; returns `false` when a stroke with the same id is already present.
    pub fn insert(&mut self, stroke: Stroke) -> bool {
        if self.strokes.contains_key(&stroke.id) {
            return false;
        }
        self.strokes.insert(stroke.id, stroke);
        true
    }

    pub fn extend<I: IntoIterator<Item = Stroke>>(&mut self, strokes: I) -> usize {
        strokes
            .into_iter()
            .map(|stroke| self.insert(stroke))
            .filter(|inserted| *inserted)
            .count()
    }

    /// Rehydrates strokes persisted for `page`, skipping ids already in memory.
    pub fn restore(&mut self, page: &PageRef, stored: Vec<StoredStroke>) -> usize {
        self.extend(stored.into_iter().map(|s| s.into_stroke(page.clone())))
    }

    pub fn get(&self, id: StrokeId) -> Option<&Stroke> {
        self.strokes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.values()
    }

    /// Non-deleted strokes on `page`, in id order.
    pub fn active_on(&self, page: &PageRef) -> Vec<&Stroke> {
        self.strokes
            .values()
            .filter(|s| s.is_active() && &s.page == page)
            .collect()
    }

    pub fn soft_delete(&mut self, ids: &[StrokeId]) -> usize {
        let mut count = 0;
        for id in ids {
            if let Some(stroke) = self.strokes.get_mut(id) {
                if !stroke.deleted {
                    stroke.deleted = true;
                    count += 1;
                }
            }
        }
        count
    }

    /// Block id → ids of the active strokes currently linked to it.
    pub fn block_associations(&self, page: &PageRef) -> HashMap<BlockId, BTreeSet<StrokeId>> {
        let mut map: HashMap<BlockId, BTreeSet<StrokeId>> = HashMap::new();
        for stroke in self.active_on(page) {
            if let Some(block_id) = &stroke.block_id {
                map.entry(block_id.clone()).or_default().insert(stroke.id);
            }
        }
        map
    }

    /// Links a stroke to `block` unless it already belongs to a different block.
    pub fn assign_block(&mut self, id: StrokeId, block: &BlockId) -> AssignOutcome {
        let Some(stroke) = self.strokes.get_mut(&id) else {
            return AssignOutcome::Missing;
        };
        match &stroke.block_id {
            None => {
                stroke.block_id = Some(block.clone());
                AssignOutcome::Linked
            }
            Some(existing) if existing == block => AssignOutcome::Unchanged,
            Some(existing) => AssignOutcome::Conflict {
                existing: existing.clone(),
            },
        }
    }

    /// Moves every stroke on `page` linked to `from` over to `to`.
    pub fn reassign_block(
        &mut self,
        page: &PageRef,
        from: &BlockId,
        to: &BlockId,
    ) -> Vec<Reassignment> {
        let mut moved = Vec::new();
        if from == to {
            return moved;
        }
        for stroke in self.strokes.values_mut() {
            if &stroke.page != page || stroke.block_id.as_ref() != Some(from) {
                continue;
            }
            stroke.block_id = Some(to.clone());
            moved.push(Reassignment {
                stroke_id: stroke.id,
                from: from.clone(),
                to: to.clone(),
            });
        }
        moved
    }

    /// Drops associations to a block that has been deleted; returns the released ids.
    pub fn clear_block(&mut self, page: &PageRef, block: &BlockId) -> Vec<StrokeId> {
        let mut released = Vec::new();
        for stroke in self.strokes.values_mut() {
            if &stroke.page == page && stroke.block_id.as_ref() == Some(block) {
                stroke.block_id = None;
                released.push(stroke.id);
            }
        }
        released
    }

    /// Projection of the active strokes on `page` for the stroke store.
    pub fn stored_snapshot(&self, page: &PageRef) -> Vec<StoredStroke> {
        self.active_on(page)
            .into_iter()
            .map(Stroke::to_stored)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageRef {
        PageRef::new("3017", 1)
    }

    fn stroke(t: i64, ys: &[f64]) -> Stroke {
        let points = ys
            .iter()
            .enumerate()
            .map(|(i, y)| Point::new(10.0 + i as f64, *y, t + i as i64 * 10))
            .collect();
        Stroke::new(page(), points)
    }

    #[test]
    fn stroke_id_comes_from_first_point() {
        let s = stroke(1_700_000, &[5.0, 9.0, 7.0]);
        assert_eq!(s.id, StrokeId(1_700_000));
        assert_eq!(s.y_bounds(), Some(YBounds::new(5.0, 9.0)));
        assert_eq!(Stroke::new(page(), Vec::new()).y_bounds(), None);
    }

    #[test]
    fn bounds_overlap_respects_tolerance() {
        let a = YBounds::new(10.0, 20.0);
        assert!(a.overlaps(&YBounds::new(24.0, 30.0), 5.0));
        assert!(!a.overlaps(&YBounds::new(26.0, 30.0), 5.0));
        assert!(a.overlaps(&YBounds::new(0.0, 10.0), 0.0));
        assert_eq!(a.overlap_len(&YBounds::new(15.0, 40.0)), 5.0);
        assert_eq!(a.overlap_len(&YBounds::new(30.0, 40.0)), 0.0);
    }

    #[test]
    fn split_and_union() {
        let (top, bottom) = YBounds::new(10.0, 30.0).split_at_midpoint();
        assert_eq!(top, YBounds::new(10.0, 20.0));
        assert_eq!(bottom, YBounds::new(20.0, 30.0));
        assert_eq!(top.union(&bottom), YBounds::new(10.0, 30.0));
    }

    #[test]
    fn stored_projection_rounds_and_restores() {
        let mut s = stroke(500, &[1.23456, 2.0]);
        s.block_id = Some(BlockId::from("b1"));
        let stored = s.to_stored();
        assert_eq!(stored.points[0].y, 1.23);
        assert_eq!(stored.points[1].dt, 10);

        let back = stored.into_stroke(page());
        assert_eq!(back.id, s.id);
        assert_eq!(back.points[1].t, 510);
        assert_eq!(back.block_id, s.block_id);
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut strokes = StrokeCollection::new();
        assert!(strokes.insert(stroke(1, &[0.0])));
        assert!(!strokes.insert(stroke(1, &[50.0])));
        assert_eq!(strokes.len(), 1);
    }

    #[test]
    fn assign_never_overwrites_other_block() {
        let mut strokes = StrokeCollection::new();
        strokes.insert(stroke(1, &[0.0]));
        let b1 = BlockId::from("b1");
        let b2 = BlockId::from("b2");

        assert_eq!(strokes.assign_block(StrokeId(1), &b1), AssignOutcome::Linked);
        assert_eq!(strokes.assign_block(StrokeId(1), &b1), AssignOutcome::Unchanged);
        assert_eq!(
            strokes.assign_block(StrokeId(1), &b2),
            AssignOutcome::Conflict { existing: b1.clone() }
        );
        assert_eq!(strokes.get(StrokeId(1)).and_then(|s| s.block_id.clone()), Some(b1));
        assert_eq!(strokes.assign_block(StrokeId(9), &b2), AssignOutcome::Missing);
    }

    #[test]
    fn reassign_records_provenance() {
        let mut strokes = StrokeCollection::new();
        let b1 = BlockId::from("b1");
        let b2 = BlockId::from("b2");
        for t in [1, 2, 3] {
            strokes.insert(stroke(t, &[0.0]));
        }
        strokes.assign_block(StrokeId(1), &b1);
        strokes.assign_block(StrokeId(2), &b2);
        strokes.assign_block(StrokeId(3), &b2);

        let moved = strokes.reassign_block(&page(), &b2, &b1);
        assert_eq!(moved.len(), 2);
        assert!(moved.iter().all(|r| r.from == b2 && r.to == b1));
        let associations = strokes.block_associations(&page());
        assert_eq!(associations[&b1].len(), 3);
        assert!(!associations.contains_key(&b2));
    }

    #[test]
    fn soft_deleted_strokes_leave_associations_and_snapshot() {
        let mut strokes = StrokeCollection::new();
        let b1 = BlockId::from("b1");
        strokes.insert(stroke(1, &[0.0]));
        strokes.insert(stroke(2, &[0.0]));
        strokes.assign_block(StrokeId(1), &b1);

        assert_eq!(strokes.soft_delete(&[StrokeId(1), StrokeId(1)]), 1);
        assert!(strokes.block_associations(&page()).is_empty());
        assert_eq!(strokes.stored_snapshot(&page()).len(), 1);
        assert_eq!(strokes.clear_block(&page(), &b1), vec![StrokeId(1)]);
    }
}
