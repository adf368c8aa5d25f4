use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Signed integer lattice coordinates `(col, row)` relative to the seed corner.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct GridCoords {
    pub col: i32,
    pub row: i32,
}

impl GridCoords {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    pub const fn offset(self, dc: i32, dr: i32) -> Self {
        Self {
            col: self.col + dc,
            row: self.row + dr,
        }
    }
}

impl From<(i32, i32)> for GridCoords {
    fn from((col, row): (i32, i32)) -> Self {
        Self { col, row }
    }
}

/// Sparse map from lattice coordinates to sub-pixel corner centers.
///
/// A cell is filled at most once: [`CalibrationGrid::insert`] never replaces
/// an existing entry, and a missing key means "no corner found there".
#[derive(Clone, Debug, Default)]
pub struct CalibrationGrid {
    cells: HashMap<GridCoords, Point2<f32>>,
}

impl CalibrationGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a corner if the cell is still empty. Returns `true` when inserted.
    pub fn insert(&mut self, at: GridCoords, center: Point2<f32>) -> bool {
        match self.cells.entry(at) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(center);
                true
            }
        }
    }

    pub fn get(&self, at: GridCoords) -> Option<Point2<f32>> {
        self.cells.get(&at).copied()
    }

    pub fn contains(&self, at: GridCoords) -> bool {
        self.cells.contains_key(&at)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells sorted by column, then row.
    pub fn sorted(&self) -> Vec<(GridCoords, Point2<f32>)> {
        let mut out: Vec<_> = self.cells.iter().map(|(k, v)| (*k, *v)).collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (GridCoords, Point2<f32>)> + '_ {
        self.cells.iter().map(|(k, v)| (*k, *v))
    }

    /// The four corners of the square anchored at `at`, in
    /// `(c,r), (c,r+1), (c+1,r), (c+1,r+1)` order, when all are present.
    pub fn square(&self, at: GridCoords) -> Option<[Point2<f32>; 4]> {
        Some([
            self.get(at)?,
            self.get(at.offset(0, 1))?,
            self.get(at.offset(1, 0))?,
            self.get(at.offset(1, 1))?,
        ])
    }
}
