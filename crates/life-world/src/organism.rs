//! Organism lifecycle: eating, moving, reproducing, mutating and dying.

use crate::anatomy::Anatomy;
use crate::brain::BrainController;
use crate::cell::{self, BodyCell};
use crate::grid::{Grid, Occupant};
use crate::species::FossilRecord;
use crate::world::World;
use life_core::{CellState, CellType, Direction, GridPos, Hyperparams, OrganismId, ALL_NEIGHBORS};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, trace};

pub const DEFAULT_MOVE_RANGE: u32 = 4;
pub const DEFAULT_MUTABILITY: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organism {
    pub id: OrganismId,
    /// Grid position of the center cell
    pub position: GridPos,
    pub movement_direction: Direction,
    pub rotation_direction: Direction,
    pub living: bool,
    pub lifetime: u64,
    pub food_collected: u32,
    /// Mutation chance in percent, drifting by one per generation
    pub mutability: u32,
    pub move_range: u32,
    pub move_count: u32,
    pub ignore_brain_for: u32,
    pub damage: u32,
    pub anatomy: Anatomy,
    pub brain: Option<BrainController>,
    pub species: Option<String>,
    pub birth_tick: u64,
}

impl Organism {
    pub fn new(id: OrganismId, position: GridPos, birth_tick: u64) -> Self {
        Self {
            id,
            position,
            movement_direction: Direction::South,
            rotation_direction: Direction::North,
            living: true,
            lifetime: 0,
            food_collected: 0,
            mutability: DEFAULT_MUTABILITY,
            move_range: DEFAULT_MOVE_RANGE,
            move_count: 0,
            ignore_brain_for: 0,
            damage: 0,
            anatomy: Anatomy::new(),
            brain: None,
            species: None,
            birth_tick,
        }
    }

    /// Fresh offspring carrying a deep copy of the parent's heritable state
    pub fn inherit(id: OrganismId, parent: &Organism, birth_tick: u64) -> Self {
        let mut child = Organism::new(id, parent.position, birth_tick);
        child.rotation_direction = parent.rotation_direction;
        child.mutability = parent.mutability;
        child.move_range = parent.move_range;
        for body_cell in parent.anatomy.cells() {
            child.anatomy.add_inherited_cell(body_cell, false);
        }
        child.anatomy.recompute_aggregates();
        child.brain = parent.brain.as_ref().map(BrainController::inherit);
        child.species = parent.species.clone();
        child
    }

    pub fn food_needed(&self, params: &Hyperparams) -> u32 {
        let cells = self.anatomy.len() as u32;
        if self.anatomy.has(CellType::Mover) {
            cells + params.extra_mover_food_cost * self.anatomy.count(CellType::Mover)
        } else {
            cells
        }
    }

    pub fn lifespan(&self, params: &Hyperparams) -> u64 {
        self.anatomy.len() as u64 * params.lifespan_multiplier
    }

    pub fn max_health(&self) -> u32 {
        self.anatomy.len() as u32
    }

    /// Absolute position of a body cell given a hypothetical center and rotation
    pub fn cell_position(&self, body_cell: &BodyCell, center: GridPos, rotation: Direction) -> GridPos {
        body_cell.real_pos(center, rotation)
    }

    pub fn occupied_positions(&self) -> Vec<GridPos> {
        self.anatomy
            .cells()
            .iter()
            .map(|c| c.real_pos(self.position, self.rotation_direction))
            .collect()
    }

    /// Every rotated cell is on the grid and free for this organism.
    pub fn is_clear(&self, grid: &Grid, center: GridPos, rotation: Direction, params: &Hyperparams) -> bool {
        self.anatomy.cells().iter().all(|body_cell| {
            let pos = body_cell.real_pos(center, rotation);
            match grid.cell_at_pos(pos) {
                None => false,
                Some(cell) => {
                    cell.owner_org() == Some(self.id)
                        || cell.state == CellState::Empty
                        || (!params.food_blocks_reproduction && cell.state == CellState::Food)
                }
            }
        })
    }

    /// The line from `from` to `to` crosses only cells an offspring may pass.
    pub fn is_straight_path(&self, grid: &Grid, from: GridPos, to: GridPos, parent: OrganismId) -> bool {
        let step_col = (to.col - from.col).signum();
        let step_row = (to.row - from.row).signum();
        let mut pos = from;
        while pos != to {
            let passable = grid.cell_at_pos(pos).is_some_and(|cell| {
                let owner = cell.owner_org();
                matches!(cell.state, CellState::Empty | CellState::Food)
                    || owner == Some(self.id)
                    || owner == Some(parent)
            });
            if !passable {
                return false;
            }
            if pos.col != to.col {
                pos.col += step_col;
            }
            if pos.row != to.row {
                pos.row += step_row;
            }
        }
        true
    }

    /// Stamp the body onto the grid at the current position and rotation.
    pub fn update_grid(&self, grid: &mut Grid) {
        for body_cell in self.anatomy.cells() {
            let pos = body_cell.real_pos(self.position, self.rotation_direction);
            grid.change_cell(
                pos.col,
                pos.row,
                body_cell.state(),
                Some(Occupant {
                    organism: self.id,
                    loc_col: body_cell.loc_col,
                    loc_row: body_cell.loc_row,
                }),
            );
        }
    }

    fn clear_footprint(&self, grid: &mut Grid) {
        for pos in self.occupied_positions() {
            grid.set_cell_state(pos.col, pos.row, CellState::Empty);
        }
    }

    /// Turn the body into food and drop out of the species count.
    pub fn die(&mut self, grid: &mut Grid, fossil_record: &mut FossilRecord, tick: u64) {
        if !self.living {
            return;
        }
        for pos in self.occupied_positions() {
            grid.set_cell_state(pos.col, pos.row, CellState::Food);
        }
        if let Some(species) = &self.species {
            fossil_record.decrease_population(species, tick);
        }
        self.living = false;
        debug!(event = "organism_died", organism = %self.id, lifetime = self.lifetime, tick);
    }

    pub fn harm(&mut self, grid: &mut Grid, fossil_record: &mut FossilRecord, params: &Hyperparams, tick: u64) {
        self.damage += 1;
        if self.damage >= self.max_health() || params.insta_kill {
            self.die(grid, fossil_record, tick);
        }
    }

    pub fn change_movement_direction(&mut self, direction: Direction) {
        self.movement_direction = direction;
        self.move_count = 0;
    }

    pub fn attempt_move(&mut self, grid: &mut Grid, params: &Hyperparams) -> bool {
        let target = self.position.step(self.movement_direction, 1);
        if !self.is_clear(grid, target, self.rotation_direction, params) {
            return false;
        }
        self.clear_footprint(grid);
        self.position = target;
        self.update_grid(grid);
        true
    }

    pub fn attempt_rotate(&mut self, grid: &mut Grid, params: &Hyperparams, rng: &mut ChaCha8Rng) -> bool {
        if !params.rotation_enabled {
            self.change_movement_direction(Direction::random(rng));
            return true;
        }
        let rotation = Direction::random(rng);
        if !self.is_clear(grid, self.position, rotation, params) {
            return false;
        }
        self.clear_footprint(grid);
        self.rotation_direction = rotation;
        self.change_movement_direction(Direction::random(rng));
        self.update_grid(grid);
        true
    }

    /// One mutation pass. Returns true if the anatomy changed.
    pub fn mutate_cells(&mut self, params: &Hyperparams, rng: &mut ChaCha8Rng) -> bool {
        let had_eye = self.anatomy.has(CellType::Eye);
        let mut mutated = false;

        if rng.gen::<f64>() * 100.0 <= params.add_prob {
            if let Some(anchor) = self.anatomy.random_cell(rng).copied() {
                let (dc, dr) = ALL_NEIGHBORS[rng.gen_range(0..ALL_NEIGHBORS.len())];
                let (loc_col, loc_row) = (anchor.loc_col + dc, anchor.loc_row + dr);
                let cell_type = CellType::random(rng);
                if self.anatomy.can_add_cell_at(loc_col, loc_row) {
                    self.anatomy.add_random_cell(cell_type, loc_col, loc_row, rng, false);
                    mutated = true;
                }
            }
        }

        if rng.gen::<f64>() * 100.0 <= params.change_prob {
            if let Some(target) = self.anatomy.random_cell(rng).copied() {
                let cell_type = CellType::random(rng);
                self.anatomy
                    .replace_cell(cell_type, target.loc_col, target.loc_row, rng, false);
                mutated = true;
            }
        }

        if rng.gen::<f64>() * 100.0 <= params.remove_prob && self.anatomy.len() > 1 {
            if let Some(target) = self.anatomy.random_cell(rng).copied() {
                mutated |= self
                    .anatomy
                    .remove_cell(target.loc_col, target.loc_row, false, false);
            }
        }

        self.anatomy.recompute_aggregates();
        self.sync_brain(had_eye, rng);
        mutated
    }

    /// Keep the brain controller in step with the anatomy after edits.
    fn sync_brain(&mut self, had_eye: bool, rng: &mut ChaCha8Rng) {
        if !self.anatomy.has(CellType::Brain) {
            return;
        }
        let gained_eye = !had_eye && self.anatomy.has(CellType::Eye);
        match self.brain.as_mut() {
            Some(brain) if gained_eye => brain.randomize_decisions(rng),
            Some(brain) => brain.mutate_decisions(rng),
            None => self.brain = Some(BrainController::random(rng)),
        }
    }

    /// Try to place one offspring. Food is only spent when placement succeeds.
    pub fn reproduce(&mut self, world: &mut World, params: &Hyperparams, rng: &mut ChaCha8Rng) -> Option<OrganismId> {
        let tick = world.total_ticks;
        let mut child = Organism::inherit(world.allocate_id(), self, tick);
        if params.rotation_enabled {
            child.rotation_direction = Direction::random(rng);
        }

        let probability = if params.use_global_mutability {
            params.global_mutability
        } else {
            if rng.gen_bool(0.5) {
                child.mutability += 1;
            } else {
                child.mutability = child.mutability.saturating_sub(1).max(1);
            }
            self.mutability
        };
        let mutated = rng.gen::<f64>() * 100.0 <= probability as f64 && child.mutate_cells(params, rng);

        let direction = Direction::random(rng);
        let offset = rng.gen_range(0..3);
        let target = self
            .position
            .step(direction, self.anatomy.birth_distance() + offset);

        if !child.is_clear(&world.grid, target, child.rotation_direction, params)
            || !child.is_straight_path(&world.grid, self.position, target, self.id)
        {
            trace!(event = "birth_blocked", parent = %self.id, col = target.col, row = target.row);
            return None;
        }
        child.position = target;

        if mutated {
            world
                .fossil_record
                .add_species(&mut child, self.species.as_deref(), tick, rng);
        } else if let Some(species) = &child.species {
            world.fossil_record.add_population(species);
        }

        self.food_collected = self.food_collected.saturating_sub(self.food_needed(params));
        Some(world.add_organism(child))
    }

    /// Advance one tick. Returns false once the organism has died.
    pub fn update(&mut self, world: &mut World, params: &Hyperparams, rng: &mut ChaCha8Rng) -> bool {
        self.lifetime += 1;
        if self.lifetime > self.lifespan(params) {
            self.die(&mut world.grid, &mut world.fossil_record, world.total_ticks);
            return false;
        }

        if self.food_collected >= self.food_needed(params) {
            self.reproduce(world, params, rng);
        }

        // the brain only reacts to what the eyes report this tick
        if let Some(brain) = self.brain.as_mut() {
            brain.clear_observations();
        }
        for index in 0..self.anatomy.len() {
            let body_cell = self.anatomy.cells()[index];
            cell::perform(&body_cell, self, world, params, rng);
            if !self.living {
                return false;
            }
        }

        if self.anatomy.has(CellType::Mover) {
            self.move_step(&mut world.grid, params, rng);
        }
        self.living
    }

    fn move_step(&mut self, grid: &mut Grid, params: &Hyperparams, rng: &mut ChaCha8Rng) {
        self.move_count += 1;
        let mut changed_by_brain = false;
        if self.ignore_brain_for > 0 {
            self.ignore_brain_for -= 1;
        } else if self.anatomy.has(CellType::Brain) {
            if let Some(brain) = self.brain.as_mut() {
                if brain.decide(self.id, &mut self.movement_direction) {
                    self.move_count = 0;
                    changed_by_brain = true;
                }
            }
        }

        let moved = self.attempt_move(grid, params);
        let threshold = self.move_range + self.anatomy.count(CellType::Mover);
        if (self.move_count > threshold && !changed_by_brain) || !moved {
            if !self.attempt_rotate(grid, params, rng) {
                self.change_movement_direction(Direction::random(rng));
                if changed_by_brain {
                    self.ignore_brain_for = threshold + 1;
                }
            }
        }
    }

    /// Has a center cell and no two cells share an offset
    pub fn is_natural(&self) -> bool {
        let cells = self.anatomy.cells();
        let mut seen = HashSet::new();
        self.anatomy.local_cell(0, 0).is_some() && cells.iter().all(|c| seen.insert((c.loc_col, c.loc_row)))
    }
}
