//! Bounded 2D grid the organisms live on.
//!
//! Every mutation goes through [`Grid::change_cell`] (or one of its thin
//! wrappers), which writes the state tag and the occupant back-reference
//! together and records the position in the change set that the rendering
//! side drains each frame.

use life_core::{CellState, GridPos, OrganismId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Non-owning back-reference from a grid cell to the body cell covering it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occupant {
    pub organism: OrganismId,
    /// Local offset of the body cell inside the organism's anatomy
    pub loc_col: i32,
    pub loc_row: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub col: i32,
    pub row: i32,
    pub state: CellState,
    pub owner: Option<Occupant>,
}

impl GridCell {
    fn empty(col: i32, row: i32) -> Self {
        Self {
            col,
            row,
            state: CellState::Empty,
            owner: None,
        }
    }

    pub fn pos(&self) -> GridPos {
        GridPos::new(self.col, self.row)
    }

    pub fn owner_org(&self) -> Option<OrganismId> {
        self.owner.map(|o| o.organism)
    }
}

/// Cells changed and cells highlighted since the consumer last drained them
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changed: HashSet<GridPos>,
    highlighted: HashSet<GridPos>,
}

impl ChangeSet {
    pub fn changed(&self) -> &HashSet<GridPos> {
        &self.changed
    }

    pub fn highlighted(&self) -> &HashSet<GridPos> {
        &self.highlighted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub cols: i32,
    pub rows: i32,
    cells: Vec<GridCell>,
    #[serde(skip)]
    changes: ChangeSet,
}

impl Grid {
    pub fn new(cols: i32, rows: i32) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let mut cells = Vec::with_capacity((cols * rows) as usize);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(GridCell::empty(col, row));
            }
        }
        Self {
            cols,
            rows,
            cells,
            changes: ChangeSet::default(),
        }
    }

    pub fn in_bounds(&self, col: i32, row: i32) -> bool {
        col >= 0 && row >= 0 && col < self.cols && row < self.rows
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if self.in_bounds(col, row) {
            Some((row * self.cols + col) as usize)
        } else {
            None
        }
    }

    /// Bounds-checked lookup; off-grid coordinates yield `None`.
    pub fn cell_at(&self, col: i32, row: i32) -> Option<&GridCell> {
        self.index(col, row).map(|i| &self.cells[i])
    }

    pub fn cell_at_pos(&self, pos: GridPos) -> Option<&GridCell> {
        self.cell_at(pos.col, pos.row)
    }

    pub fn state_at(&self, col: i32, row: i32) -> Option<CellState> {
        self.cell_at(col, row).map(|c| c.state)
    }

    /// Set state and occupant in one step. Returns false off-grid.
    pub fn change_cell(&mut self, col: i32, row: i32, state: CellState, owner: Option<Occupant>) -> bool {
        let Some(index) = self.index(col, row) else {
            return false;
        };
        let cell = &mut self.cells[index];
        cell.state = state;
        cell.owner = owner;
        self.changes.changed.insert(GridPos::new(col, row));
        true
    }

    /// Set a cell's state, dropping any occupant.
    pub fn set_cell_state(&mut self, col: i32, row: i32, state: CellState) -> bool {
        self.change_cell(col, row, state, None)
    }

    /// Replace the occupant reference without touching the state tag.
    pub fn set_occupant(&mut self, col: i32, row: i32, owner: Option<Occupant>) -> bool {
        let Some(index) = self.index(col, row) else {
            return false;
        };
        self.cells[index].owner = owner;
        self.changes.changed.insert(GridPos::new(col, row));
        true
    }

    /// Overwrite every cell with `state`, optionally leaving walls in place.
    pub fn fill(&mut self, state: CellState, keep_walls: bool) {
        for cell in &mut self.cells {
            if keep_walls && cell.state == CellState::Wall {
                continue;
            }
            cell.state = state;
            cell.owner = None;
            self.changes.changed.insert(GridPos::new(cell.col, cell.row));
        }
    }

    /// Replace the backing store with an empty grid of the new size.
    ///
    /// Walls that still fall inside the new bounds survive unless `clear_walls`.
    pub fn resize(&mut self, cols: i32, rows: i32, clear_walls: bool) {
        let walls: Vec<GridPos> = if clear_walls { Vec::new() } else { self.walls() };
        let mut resized = Grid::new(cols, rows);
        for wall in walls {
            resized.set_cell_state(wall.col, wall.row, CellState::Wall);
        }
        *self = resized;
        self.mark_all_changed();
    }

    pub fn walls(&self) -> Vec<GridPos> {
        self.cells
            .iter()
            .filter(|c| c.state == CellState::Wall)
            .map(GridCell::pos)
            .collect()
    }

    pub fn center(&self) -> GridPos {
        GridPos::new(self.cols / 2, self.rows / 2)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells.iter()
    }

    pub fn count_state(&self, state: CellState) -> usize {
        self.cells.iter().filter(|c| c.state == state).count()
    }

    /// Cell states in row-major order (`row * cols + col`)
    pub fn states(&self) -> Vec<CellState> {
        self.cells.iter().map(|c| c.state).collect()
    }

    /// Rebuild a grid from row-major states. Occupants are left empty.
    pub fn from_states(cols: i32, rows: i32, states: &[CellState]) -> Option<Self> {
        if cols <= 0 || rows <= 0 || states.len() != (cols * rows) as usize {
            return None;
        }
        let mut grid = Grid::new(cols, rows);
        for (cell, state) in grid.cells.iter_mut().zip(states) {
            cell.state = *state;
        }
        grid.mark_all_changed();
        Some(grid)
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Drain the set of cells changed since the last call
    pub fn take_changed(&mut self) -> Vec<GridPos> {
        self.changes.changed.drain().collect()
    }

    pub fn mark_all_changed(&mut self) {
        let positions: Vec<GridPos> = self.cells.iter().map(GridCell::pos).collect();
        self.changes.changed.extend(positions);
    }

    pub fn highlight_cell(&mut self, col: i32, row: i32) {
        if self.in_bounds(col, row) {
            self.changes.highlighted.insert(GridPos::new(col, row));
        }
    }

    pub fn highlight_organism(&mut self, organism: OrganismId) {
        let owned: Vec<GridPos> = self
            .cells
            .iter()
            .filter(|c| c.owner_org() == Some(organism))
            .map(GridCell::pos)
            .collect();
        self.changes.highlighted.extend(owned);
    }

    /// Clear highlights, returning the cells that need repainting
    pub fn clear_highlights(&mut self) -> Vec<GridPos> {
        self.changes.highlighted.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid = Grid::new(10, 8);
        assert_eq!(grid.cols, 10);
        assert_eq!(grid.rows, 8);
        assert_eq!(grid.iter().count(), 80);
        assert_eq!(grid.cell_at(9, 7).unwrap().pos(), GridPos::new(9, 7));
    }

    #[test]
    fn test_out_of_bounds_is_none() {
        let grid = Grid::new(10, 10);
        assert!(grid.cell_at(-1, 0).is_none());
        assert!(grid.cell_at(0, 10).is_none());
        assert!(grid.cell_at(10, 3).is_none());
        assert!(grid.cell_at(0, 0).is_some());
    }

    #[test]
    fn test_change_cell_sets_state_and_owner_and_marks_dirty() {
        let mut grid = Grid::new(5, 5);
        let occupant = Occupant {
            organism: OrganismId(3),
            loc_col: 0,
            loc_row: 0,
        };
        assert!(grid.change_cell(2, 2, CellState::Mouth, Some(occupant)));
        let cell = grid.cell_at(2, 2).unwrap();
        assert_eq!(cell.state, CellState::Mouth);
        assert_eq!(cell.owner_org(), Some(OrganismId(3)));

        assert!(grid.set_cell_state(2, 2, CellState::Food));
        assert_eq!(grid.cell_at(2, 2).unwrap().owner, None);

        let changed = grid.take_changed();
        assert_eq!(changed, vec![GridPos::new(2, 2)]);
        assert!(grid.take_changed().is_empty());
        assert!(!grid.change_cell(7, 7, CellState::Food, None));
    }

    #[test]
    fn test_resize_preserves_walls() {
        let mut grid = Grid::new(10, 10);
        grid.set_cell_state(1, 1, CellState::Wall);
        grid.set_cell_state(8, 8, CellState::Wall);
        grid.set_cell_state(2, 2, CellState::Food);

        grid.resize(5, 5, false);
        assert_eq!(grid.cols, 5);
        assert_eq!(grid.state_at(1, 1), Some(CellState::Wall));
        assert_eq!(grid.state_at(2, 2), Some(CellState::Empty));
        assert_eq!(grid.count_state(CellState::Wall), 1);

        grid.resize(6, 6, true);
        assert_eq!(grid.count_state(CellState::Wall), 0);
    }

    #[test]
    fn test_fill_keeps_walls() {
        let mut grid = Grid::new(4, 4);
        grid.set_cell_state(0, 0, CellState::Wall);
        grid.fill(CellState::Food, true);
        assert_eq!(grid.state_at(0, 0), Some(CellState::Wall));
        assert_eq!(grid.count_state(CellState::Food), 15);
    }

    #[test]
    fn test_states_round_trip_row_major() {
        let mut grid = Grid::new(3, 2);
        grid.set_cell_state(2, 0, CellState::Wall);
        grid.set_cell_state(0, 1, CellState::Food);
        let states = grid.states();
        assert_eq!(states[2], CellState::Wall);
        assert_eq!(states[3], CellState::Food);

        let rebuilt = Grid::from_states(3, 2, &states).unwrap();
        assert_eq!(rebuilt.states(), states);
        assert!(Grid::from_states(3, 3, &states).is_none());
    }

    #[test]
    fn test_highlights() {
        let mut grid = Grid::new(5, 5);
        let occupant = Occupant {
            organism: OrganismId(1),
            loc_col: 0,
            loc_row: 0,
        };
        grid.change_cell(1, 1, CellState::Mouth, Some(occupant));
        grid.change_cell(1, 2, CellState::Producer, Some(Occupant { loc_row: 1, ..occupant }));
        grid.highlight_organism(OrganismId(1));
        grid.highlight_cell(4, 4);
        grid.highlight_cell(9, 9);
        assert_eq!(grid.changes().highlighted().len(), 3);
        assert_eq!(grid.clear_highlights().len(), 3);
        assert!(grid.changes().highlighted().is_empty());
    }
}
