//! Serializable world snapshots.
//!
//! Grid states are stored row-major (`index = row * cols + col`). Organism
//! bodies are not part of the grid payload: living cell states are cleared on
//! load and every organism is stamped back from its own cell list, so the
//! occupant back-references are always rebuilt from scratch.

use crate::anatomy::Anatomy;
use crate::brain::BrainController;
use crate::cell::BodyCell;
use crate::grid::Grid;
use crate::organism::Organism;
use crate::simulation::Simulation;
use crate::species::{FossilRecord, Species};
use crate::world::World;
use life_core::{CellState, Direction, Error, GridPos, Hyperparams, OrganismId, Result, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganismSnapshot {
    pub col: i32,
    pub row: i32,
    pub movement_direction: Direction,
    pub rotation_direction: Direction,
    pub lifetime: u64,
    pub food_collected: u32,
    pub mutability: u32,
    pub move_range: u32,
    pub move_count: u32,
    pub ignore_brain_for: u32,
    pub damage: u32,
    pub birth_tick: u64,
    pub species: Option<String>,
    pub cells: Vec<BodyCell>,
    pub brain: Option<BrainController>,
}

impl OrganismSnapshot {
    pub fn capture(org: &Organism) -> Self {
        Self {
            col: org.position.col,
            row: org.position.row,
            movement_direction: org.movement_direction,
            rotation_direction: org.rotation_direction,
            lifetime: org.lifetime,
            food_collected: org.food_collected,
            mutability: org.mutability,
            move_range: org.move_range,
            move_count: org.move_count,
            ignore_brain_for: org.ignore_brain_for,
            damage: org.damage,
            birth_tick: org.birth_tick,
            species: org.species.clone(),
            cells: org.anatomy.cells().to_vec(),
            brain: org.brain.as_ref().map(BrainController::inherit),
        }
    }

    /// Rebuild a living organism under a fresh id.
    pub fn into_organism(self, id: OrganismId) -> Result<Organism> {
        let anatomy = Anatomy::from_cells(self.cells).ok_or_else(|| {
            Error::Validation(format!("organism at ({}, {}) has duplicate cell offsets", self.col, self.row))
        })?;
        let mut org = Organism::new(id, GridPos::new(self.col, self.row), self.birth_tick);
        org.movement_direction = self.movement_direction;
        org.rotation_direction = self.rotation_direction;
        org.lifetime = self.lifetime;
        org.food_collected = self.food_collected;
        org.mutability = self.mutability.max(1);
        org.move_range = self.move_range;
        org.move_count = self.move_count;
        org.ignore_brain_for = self.ignore_brain_for;
        org.damage = self.damage;
        org.species = self.species;
        org.anatomy = anatomy;
        org.brain = self.brain;
        if !org.is_natural() {
            return Err(Error::Validation(format!(
                "organism at ({}, {}) has no center cell",
                self.col, self.row
            )));
        }
        Ok(org)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub version: u32,
    pub cols: i32,
    pub rows: i32,
    pub total_ticks: u64,
    /// Row-major cell states
    pub cells: Vec<CellState>,
    pub organisms: Vec<OrganismSnapshot>,
    pub fossil_record: FossilRecord,
    pub hyperparams: Option<Hyperparams>,
}

impl WorldSnapshot {
    /// Capture the living part of a world.
    pub fn capture(world: &World, hyperparams: Option<&Hyperparams>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            cols: world.grid.cols,
            rows: world.grid.rows,
            total_ticks: world.total_ticks,
            cells: world.grid.states(),
            organisms: world
                .organisms
                .values()
                .filter(|o| o.living)
                .map(OrganismSnapshot::capture)
                .collect(),
            fossil_record: world.fossil_record.clone(),
            hyperparams: hyperparams.cloned(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Rebuild a world, repairing species references that do not resolve.
    #[instrument(skip(self), fields(cols = self.cols, rows = self.rows, organisms = self.organisms.len()))]
    pub fn restore(self) -> Result<World> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::Validation(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        let mut grid = Grid::from_states(self.cols, self.rows, &self.cells).ok_or_else(|| {
            Error::Validation(format!(
                "{} cell states do not fit a {}x{} grid",
                self.cells.len(),
                self.cols,
                self.rows
            ))
        })?;
        let living: Vec<GridPos> = grid
            .iter()
            .filter(|c| c.state.is_living())
            .map(|c| c.pos())
            .collect();
        for pos in living {
            grid.set_cell_state(pos.col, pos.row, CellState::Empty);
        }

        let mut world = World::with_grid(grid);
        world.total_ticks = self.total_ticks;
        world.fossil_record = self.fossil_record;

        let mut members: BTreeMap<String, u32> = BTreeMap::new();
        for snapshot in self.organisms {
            let org = snapshot.into_organism(world.allocate_id())?;
            for pos in org.occupied_positions() {
                let blocked = match world.grid.cell_at_pos(pos) {
                    None => true,
                    Some(cell) => cell.owner.is_some() || cell.state == CellState::Wall,
                };
                if blocked {
                    return Err(Error::Validation(format!(
                        "organism at ({}, {}) overlaps a wall, another organism or the grid edge",
                        org.position.col, org.position.row
                    )));
                }
            }

            if let Some(name) = &org.species {
                if !world.fossil_record.contains(name) {
                    warn!(
                        event = "placeholder_species",
                        species = %name,
                        "Snapshot references an unknown species, rebuilding it from the organism"
                    );
                    let mut placeholder = Species::new(name.clone(), org.anatomy.clone(), None, self.total_ticks);
                    placeholder.population = 0;
                    world.fossil_record.add_species_obj(placeholder);
                }
                *members.entry(name.clone()).or_default() += 1;
            }
            world.add_organism(org);
        }

        for (name, count) in members {
            if let Some(species) = world.fossil_record.get_mut(&name) {
                if species.extinct {
                    species.resurrect();
                }
                species.population = count;
                species.cumulative_population = species.cumulative_population.max(count as u64);
            }
        }
        world.births = 0;

        info!(
            event = "snapshot_restored",
            tick = world.total_ticks,
            organisms = world.organisms.len(),
            species = world.fossil_record.species().count()
        );
        Ok(world)
    }
}

impl Simulation {
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self.world(), Some(self.hyperparams()))
    }

    /// Resume from a snapshot; stored hyperparameters override `config`'s.
    pub fn from_snapshot(mut config: SimulationConfig, snapshot: WorldSnapshot) -> Result<Self> {
        if let Some(hyperparams) = snapshot.hyperparams.clone() {
            config.hyperparams = hyperparams;
        }
        config.world.cols = snapshot.cols;
        config.world.rows = snapshot.rows;
        let world = snapshot.restore()?;
        Ok(Simulation::from_world(config, world))
    }
}
