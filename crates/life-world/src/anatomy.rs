//! An organism's body plan: an ordered list of cells at unique local offsets.

use crate::cell::BodyCell;
use life_core::{CellCounts, CellType, ALL_NEIGHBORS};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Smallest distance between a parent's center and its offspring's center
const MIN_BIRTH_DISTANCE: i32 = 4;

/// Ordered body cells plus aggregates derived from them.
///
/// Aggregates (`counts`, `birth_distance`) are only valid after
/// [`Anatomy::recompute_aggregates`]; batch edits pass `recompute = false`
/// and refresh once at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BodyCell>", into = "Vec<BodyCell>")]
pub struct Anatomy {
    cells: Vec<BodyCell>,
    counts: CellCounts,
    birth_distance: i32,
}

impl Default for Anatomy {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            counts: CellCounts::default(),
            birth_distance: MIN_BIRTH_DISTANCE,
        }
    }
}

impl TryFrom<Vec<BodyCell>> for Anatomy {
    type Error = String;

    fn try_from(cells: Vec<BodyCell>) -> Result<Self, Self::Error> {
        Anatomy::from_cells(cells).ok_or_else(|| "duplicate body cell offset".to_string())
    }
}

impl From<Anatomy> for Vec<BodyCell> {
    fn from(anatomy: Anatomy) -> Self {
        anatomy.cells
    }
}

impl Anatomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a cell list, rejecting duplicate offsets.
    pub fn from_cells(cells: Vec<BodyCell>) -> Option<Self> {
        let mut anatomy = Anatomy::new();
        for cell in cells {
            if !anatomy.can_add_cell_at(cell.loc_col, cell.loc_row) {
                return None;
            }
            anatomy.cells.push(cell);
        }
        anatomy.recompute_aggregates();
        Some(anatomy)
    }

    pub fn cells(&self) -> &[BodyCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn can_add_cell_at(&self, loc_col: i32, loc_row: i32) -> bool {
        self.local_cell(loc_col, loc_row).is_none()
    }

    /// Append a cell. Two cells sharing an offset is an invariant violation.
    pub fn add_cell(&mut self, cell: BodyCell, recompute: bool) {
        assert!(
            self.can_add_cell_at(cell.loc_col, cell.loc_row),
            "body cell offset ({}, {}) already occupied",
            cell.loc_col,
            cell.loc_row
        );
        self.cells.push(cell);
        if recompute {
            self.recompute_aggregates();
        }
    }

    pub fn add_default_cell(&mut self, cell_type: CellType, loc_col: i32, loc_row: i32, recompute: bool) {
        self.add_cell(BodyCell::default_of(cell_type, loc_col, loc_row), recompute);
    }

    pub fn add_random_cell(
        &mut self,
        cell_type: CellType,
        loc_col: i32,
        loc_row: i32,
        rng: &mut ChaCha8Rng,
        recompute: bool,
    ) {
        self.add_cell(BodyCell::random_of(cell_type, loc_col, loc_row, rng), recompute);
    }

    pub fn add_inherited_cell(&mut self, parent: &BodyCell, recompute: bool) {
        self.add_cell(BodyCell::inherit(parent), recompute);
    }

    /// Remove the cell at an offset. The center only goes when `allow_center`.
    pub fn remove_cell(&mut self, loc_col: i32, loc_row: i32, allow_center: bool, recompute: bool) -> bool {
        if loc_col == 0 && loc_row == 0 && !allow_center {
            return false;
        }
        let Some(index) = self
            .cells
            .iter()
            .position(|c| c.loc_col == loc_col && c.loc_row == loc_row)
        else {
            return false;
        };
        self.cells.remove(index);
        if recompute {
            self.recompute_aggregates();
        }
        true
    }

    /// Swap the cell at an offset for a freshly randomized one of `cell_type`.
    pub fn replace_cell(
        &mut self,
        cell_type: CellType,
        loc_col: i32,
        loc_row: i32,
        rng: &mut ChaCha8Rng,
        recompute: bool,
    ) {
        self.remove_cell(loc_col, loc_row, true, false);
        self.add_random_cell(cell_type, loc_col, loc_row, rng, recompute);
    }

    pub fn local_cell(&self, loc_col: i32, loc_row: i32) -> Option<&BodyCell> {
        self.cells
            .iter()
            .find(|c| c.loc_col == loc_col && c.loc_row == loc_row)
    }

    /// Cells in the 3x3 block around an offset, the offset itself included
    pub fn neighbors_of_cell(&self, loc_col: i32, loc_row: i32) -> Vec<&BodyCell> {
        let mut neighbors = Vec::new();
        for dc in -1..=1 {
            for dr in -1..=1 {
                if let Some(cell) = self.local_cell(loc_col + dc, loc_row + dr) {
                    neighbors.push(cell);
                }
            }
        }
        neighbors
    }

    /// Free offsets touching the body, in body order
    pub fn free_neighbor_offsets(&self) -> Vec<(i32, i32)> {
        let mut seen = HashSet::new();
        let mut free = Vec::new();
        for cell in &self.cells {
            for (dc, dr) in ALL_NEIGHBORS {
                let offset = (cell.loc_col + dc, cell.loc_row + dr);
                if self.can_add_cell_at(offset.0, offset.1) && seen.insert(offset) {
                    free.push(offset);
                }
            }
        }
        free
    }

    pub fn recompute_aggregates(&mut self) {
        let mut counts = CellCounts::default();
        let mut birth_distance = MIN_BIRTH_DISTANCE;
        for cell in &self.cells {
            counts.increment(cell.cell_type());
            let reach = cell.loc_col.abs().max(cell.loc_row.abs());
            birth_distance = birth_distance.max(2 * reach + 2);
        }
        self.counts = counts;
        self.birth_distance = birth_distance;
    }

    pub fn random_cell(&self, rng: &mut ChaCha8Rng) -> Option<&BodyCell> {
        if self.cells.is_empty() {
            return None;
        }
        Some(&self.cells[rng.gen_range(0..self.cells.len())])
    }

    /// Same length and, index by index, the same offset and cell type
    pub fn is_equal(&self, other: &Anatomy) -> bool {
        self.cells.len() == other.cells.len()
            && self.cells.iter().zip(&other.cells).all(|(a, b)| {
                a.loc_col == b.loc_col && a.loc_row == b.loc_row && a.cell_type() == b.cell_type()
            })
    }

    pub fn counts(&self) -> CellCounts {
        self.counts
    }

    pub fn count(&self, cell_type: CellType) -> u32 {
        self.counts.get(cell_type)
    }

    pub fn has(&self, cell_type: CellType) -> bool {
        self.counts.get(cell_type) > 0
    }

    pub fn birth_distance(&self) -> i32 {
        self.birth_distance
    }
}
