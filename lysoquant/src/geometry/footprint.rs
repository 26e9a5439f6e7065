use glam::DVec2;

use super::{DRect, Shape};

/// Region of one detected object, kept as horizontal pixel runs.
///
/// On the label grid every run is a unit-high rectangle; after scaling the
/// rectangles keep the exact shape of the pixel region on the finer grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    runs: Vec<DRect>,
    bounds: DRect,
}

impl Footprint {
    /// Builds a footprint from `(y, x_start, x_end)` runs, `x_end` exclusive.
    ///
    /// Returns `None` when there are no non-empty runs.
    pub fn from_runs(runs: impl IntoIterator<Item = (i64, i64, i64)>) -> Option<Self> {
        let runs: Vec<DRect> = runs
            .into_iter()
            .filter(|&(_, start, end)| end > start)
            .map(|(y, start, end)| {
                DRect::new(
                    DVec2::new(start as f64, y as f64),
                    DVec2::new(end as f64, (y + 1) as f64),
                )
            })
            .collect();

        Self::from_rects(runs)
    }

    fn from_rects(runs: Vec<DRect>) -> Option<Self> {
        let (first, rest) = runs.split_first()?;
        let bounds = rest.iter().fold(*first, |acc, run| acc.union(run));
        Some(Self { runs, bounds })
    }

    pub fn runs(&self) -> &[DRect] {
        &self.runs
    }

    /// Covered area in grid units.
    pub fn area(&self) -> f64 {
        self.runs
            .iter()
            .map(|run| {
                let size = run.max - run.min;
                size.x * size.y
            })
            .sum()
    }
}

impl Shape for Footprint {
    fn bounds(&self) -> DRect {
        self.bounds
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            runs: self
                .runs
                .iter()
                .map(|run| DRect::new(run.min * factor, run.max * factor))
                .collect(),
            bounds: DRect::new(self.bounds.min * factor, self.bounds.max * factor),
        }
    }

    fn relocated(&self, from: DVec2, to: DVec2) -> Self {
        let map = |p: DVec2| to + (p - from);
        Self {
            runs: self
                .runs
                .iter()
                .map(|run| DRect::new(map(run.min), map(run.max)))
                .collect(),
            bounds: DRect::new(map(self.bounds.min), map(self.bounds.max)),
        }
    }

    fn contains(&self, point: DVec2) -> bool {
        self.bounds.contains(point) && self.runs.iter().any(|run| run.contains(point))
    }
}
