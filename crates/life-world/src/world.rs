//! The environment: grid, organism arena and fossil record, plus the
//! editing operations an outer control surface drives.

use crate::generator;
use crate::grid::Grid;
use crate::organism::Organism;
use crate::species::{FossilRecord, Species};
use life_core::{CellState, GridPos, Hyperparams, OrganismId};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Attempts per organism when dropping random organisms
const RANDOM_PLACEMENT_ATTEMPTS: usize = 10;

#[derive(Debug, Clone)]
pub struct World {
    pub grid: Grid,
    /// Keyed by monotonic id, so iteration follows insertion order
    pub organisms: BTreeMap<OrganismId, Organism>,
    pub fossil_record: FossilRecord,
    pub total_ticks: u64,
    /// Running sum of the mutability of every organism in the arena
    pub total_mutability: u64,
    pub largest_cell_count: usize,
    pub births: u64,
    pub deaths: u64,
    next_id: u64,
}

impl World {
    pub fn new(cols: i32, rows: i32) -> Self {
        Self::with_grid(Grid::new(cols, rows))
    }

    pub fn with_grid(grid: Grid) -> Self {
        Self {
            grid,
            organisms: BTreeMap::new(),
            fossil_record: FossilRecord::new(),
            total_ticks: 0,
            total_mutability: 0,
            largest_cell_count: 0,
            births: 0,
            deaths: 0,
            next_id: 0,
        }
    }

    pub fn allocate_id(&mut self) -> OrganismId {
        let id = OrganismId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Stamp an organism onto the grid and take ownership of it.
    pub fn add_organism(&mut self, org: Organism) -> OrganismId {
        let id = org.id;
        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
        org.update_grid(&mut self.grid);
        self.total_mutability += org.mutability as u64;
        self.largest_cell_count = self.largest_cell_count.max(org.anatomy.len());
        self.births += 1;
        debug!(
            event = "organism_added",
            organism = %id,
            cells = org.anatomy.len(),
            species = ?org.species,
            tick = self.total_ticks
        );
        self.organisms.insert(id, org);
        id
    }

    /// Drop organisms by id. Duplicate and unknown ids are ignored.
    pub fn remove_organisms(&mut self, ids: &[OrganismId]) -> usize {
        let unique: BTreeSet<OrganismId> = ids.iter().copied().collect();
        let mut removed = 0;
        for id in unique {
            if let Some(org) = self.organisms.remove(&id) {
                self.total_mutability = self.total_mutability.saturating_sub(org.mutability as u64);
                self.deaths += 1;
                removed += 1;
            }
        }
        removed
    }

    pub fn organism_count(&self) -> usize {
        self.organisms.len()
    }

    pub fn live_count(&self) -> usize {
        self.organisms.values().filter(|o| o.living).count()
    }

    /// Mean mutability of living organisms. Bodies killed this tick but not
    /// yet swept are left out.
    pub fn average_mutability(&self, params: &Hyperparams) -> f64 {
        if params.use_global_mutability {
            return params.global_mutability as f64;
        }
        let (dead_total, dead_count) = self
            .organisms
            .values()
            .filter(|o| !o.living)
            .fold((0u64, 0usize), |(total, count), o| (total + o.mutability as u64, count + 1));
        let living = self.organisms.len() - dead_count;
        if living == 0 {
            return 0.0;
        }
        self.total_mutability.saturating_sub(dead_total) as f64 / living as f64
    }

    /// Place the three-cell ancestor at the grid center as a root species.
    pub fn origin_of_life(&mut self, rng: &mut ChaCha8Rng, params: &Hyperparams) -> Option<OrganismId> {
        let mut org = Organism::new(self.allocate_id(), self.grid.center(), self.total_ticks);
        org.anatomy = generator::origin_anatomy();
        if !org.is_clear(&self.grid, org.position, org.rotation_direction, params) {
            return None;
        }
        self.fossil_record.add_species(&mut org, None, self.total_ticks, rng);
        Some(self.add_organism(org))
    }

    /// Drop up to `count` random organisms at random clear positions.
    pub fn spawn_random_organisms(&mut self, count: usize, rng: &mut ChaCha8Rng, params: &Hyperparams) -> usize {
        let mut spawned = 0;
        for _ in 0..count {
            let id = self.allocate_id();
            let mut org = generator::random_organism(id, GridPos::new(0, 0), self.total_ticks, rng);
            for _ in 0..RANDOM_PLACEMENT_ATTEMPTS {
                let pos = GridPos::new(rng.gen_range(0..self.grid.cols), rng.gen_range(0..self.grid.rows));
                if org.is_clear(&self.grid, pos, org.rotation_direction, params) {
                    org.position = pos;
                    self.fossil_record.add_species(&mut org, None, self.total_ticks, rng);
                    self.add_organism(org);
                    spawned += 1;
                    break;
                }
            }
        }
        info!(event = "random_organisms_spawned", requested = count, spawned);
        spawned
    }

    /// Scatter food over empty cells. Returns how many cells became food.
    pub fn generate_food(&mut self, params: &Hyperparams, rng: &mut ChaCha8Rng) -> usize {
        if params.food_drop_prob <= 0.0 {
            return 0;
        }
        let area = (self.grid.cols as f64) * (self.grid.rows as f64);
        let attempts = ((area * params.food_drop_prob / 50_000.0).floor() as usize).max(1);
        let mut dropped = 0;
        for _ in 0..attempts {
            let col = rng.gen_range(0..self.grid.cols);
            let row = rng.gen_range(0..self.grid.rows);
            if rng.gen::<f64>() * 100.0 <= params.food_drop_prob
                && self.grid.state_at(col, row) == Some(CellState::Empty)
            {
                self.grid.set_cell_state(col, row, CellState::Food);
                dropped += 1;
            }
        }
        dropped
    }

    /// Place a copy of `template` centered at `pos`, keeping its species.
    pub fn drop_organism(&mut self, template: &Organism, pos: GridPos, params: &Hyperparams, rng: &mut ChaCha8Rng) -> Option<OrganismId> {
        let mut org = Organism::inherit(self.allocate_id(), template, self.total_ticks);
        org.movement_direction = template.movement_direction;
        if !org.is_clear(&self.grid, pos, org.rotation_direction, params) {
            return None;
        }
        org.position = pos;

        match org.species.clone() {
            Some(name) if self.fossil_record.contains(&name) => {
                self.fossil_record.resurrect(&name);
                self.fossil_record.add_population(&name);
            }
            Some(name) => {
                let species = Species::new(name, org.anatomy.clone(), None, self.total_ticks);
                self.fossil_record.add_species_obj(species);
            }
            None => {
                self.fossil_record.add_species(&mut org, None, self.total_ticks, rng);
            }
        }
        Some(self.add_organism(org))
    }

    /// Paint `state` over a square brush, optionally killing organisms in the way.
    pub fn drop_cell_type(
        &mut self,
        center: GridPos,
        state: CellState,
        brush_size: i32,
        kill_blocking: bool,
        ignore_state: Option<CellState>,
    ) -> usize {
        let mut painted = 0;
        for pos in brush(center, brush_size) {
            let Some(cell) = self.grid.cell_at_pos(pos) else {
                continue;
            };
            if let Some(owner) = cell.owner_org() {
                if !kill_blocking {
                    continue;
                }
                self.kill_organism(owner);
            }
            if ignore_state.is_some_and(|ignored| self.grid.state_at(pos.col, pos.row) == Some(ignored)) {
                continue;
            }
            self.grid.set_cell_state(pos.col, pos.row, state);
            painted += 1;
        }
        painted
    }

    /// First organism found under the brush, scanning row by row
    pub fn find_near_organism(&self, center: GridPos, brush_size: i32) -> Option<OrganismId> {
        brush(center, brush_size)
            .into_iter()
            .filter_map(|pos| self.grid.cell_at_pos(pos).and_then(|c| c.owner_org()))
            .find(|id| self.organisms.get(id).is_some_and(|o| o.living))
    }

    pub fn kill_near_organisms(&mut self, center: GridPos, brush_size: i32) -> usize {
        let owners: BTreeSet<OrganismId> = brush(center, brush_size)
            .into_iter()
            .filter_map(|pos| self.grid.cell_at_pos(pos).and_then(|c| c.owner_org()))
            .collect();
        owners
            .into_iter()
            .filter(|id| self.kill_organism(*id))
            .count()
    }

    /// Kill a living organism in place; it is removed on the next tick.
    fn kill_organism(&mut self, id: OrganismId) -> bool {
        let tick = self.total_ticks;
        let World {
            grid,
            organisms,
            fossil_record,
            ..
        } = self;
        match organisms.get_mut(&id) {
            Some(org) if org.living => {
                org.die(grid, fossil_record, tick);
                true
            }
            _ => false,
        }
    }

    pub fn clear_walls(&mut self) {
        for wall in self.grid.walls() {
            self.grid.set_cell_state(wall.col, wall.row, CellState::Empty);
        }
    }

    /// Kill and drop every organism. Their bodies are left behind as food.
    pub fn clear_organisms(&mut self) {
        let ids: Vec<OrganismId> = self.organisms.keys().copied().collect();
        let tick = self.total_ticks;
        for org in self.organisms.values_mut() {
            org.die(&mut self.grid, &mut self.fossil_record, tick);
        }
        self.remove_organisms(&ids);
    }

    /// Wipe organisms, food and history; walls survive unless `clear_walls`.
    pub fn reset(&mut self, clear_walls: bool, reset_life: bool, rng: &mut ChaCha8Rng, params: &Hyperparams) {
        self.organisms.clear();
        self.grid.fill(CellState::Empty, !clear_walls);
        self.fossil_record.clear();
        self.total_mutability = 0;
        self.total_ticks = 0;
        self.largest_cell_count = 0;
        self.births = 0;
        self.deaths = 0;
        if reset_life {
            self.origin_of_life(rng, params);
        }
        info!(event = "world_reset", clear_walls, reset_life);
    }

    pub fn resize(&mut self, cols: i32, rows: i32, clear_walls: bool, rng: &mut ChaCha8Rng, params: &Hyperparams) {
        self.grid.resize(cols, rows, clear_walls);
        self.reset(clear_walls, true, rng, params);
        info!(event = "world_resized", cols = self.grid.cols, rows = self.grid.rows);
    }
}

/// Positions in the square of radius `size` around `center`, row by row
fn brush(center: GridPos, size: i32) -> Vec<GridPos> {
    let size = size.max(0);
    let mut positions = Vec::new();
    for dr in -size..=size {
        for dc in -size..=size {
            positions.push(center.add(dc, dr));
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use life_core::CellType;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_origin_of_life() {
        let mut world = World::new(20, 20);
        let params = Hyperparams::default();
        let id = world.origin_of_life(&mut rng(), &params).unwrap();
        let org = &world.organisms[&id];
        assert_eq!(org.position, GridPos::new(10, 10));
        assert_eq!(world.grid.state_at(10, 10), Some(CellState::Mouth));
        assert_eq!(world.grid.state_at(11, 11), Some(CellState::Producer));
        assert_eq!(world.grid.state_at(9, 9), Some(CellState::Producer));
        assert_eq!(world.fossil_record.extant_count(), 1);
        assert_eq!(world.largest_cell_count, 3);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut world = World::new(10, 10);
        let a = world.allocate_id();
        let b = world.allocate_id();
        assert!(b > a);
        let mut org = Organism::new(OrganismId(40), GridPos::new(1, 1), 0);
        org.anatomy.add_default_cell(CellType::Mouth, 0, 0, true);
        world.add_organism(org);
        assert_eq!(world.allocate_id(), OrganismId(41));
    }

    #[test]
    fn test_average_mutability() {
        let mut world = World::new(10, 10);
        let mut params = Hyperparams::default();
        assert_eq!(world.average_mutability(&params), 0.0);
        for (i, mutability) in [(1, 4), (2, 8)] {
            let mut org = Organism::new(OrganismId(i), GridPos::new(i as i32 * 3, 3), 0);
            org.mutability = mutability;
            org.anatomy.add_default_cell(CellType::Mouth, 0, 0, true);
            world.add_organism(org);
        }
        assert_eq!(world.average_mutability(&params), 6.0);
        world.remove_organisms(&[OrganismId(1)]);
        assert_eq!(world.average_mutability(&params), 8.0);
        params.use_global_mutability = true;
        params.global_mutability = 11;
        assert_eq!(world.average_mutability(&params), 11.0);
    }

    #[test]
    fn test_generate_food() {
        let mut world = World::new(100, 100);
        let mut params = Hyperparams::default();
        let mut rng = rng();
        assert_eq!(world.generate_food(&params, &mut rng), 0);
        params.food_drop_prob = 100.0;
        let dropped = world.generate_food(&params, &mut rng);
        assert!(dropped > 0 && dropped <= 20);
        assert_eq!(world.grid.count_state(CellState::Food), dropped);
    }

    #[test]
    fn test_spawn_random_organisms() {
        let mut world = World::new(60, 60);
        let params = Hyperparams::default();
        let spawned = world.spawn_random_organisms(10, &mut rng(), &params);
        assert!(spawned > 0);
        assert_eq!(world.organism_count(), spawned);
        assert_eq!(world.fossil_record.extant_count(), spawned);
    }

    #[test]
    fn test_drop_organism_resurrects_species() {
        let mut world = World::new(30, 30);
        let params = Hyperparams::default();
        let mut rng = rng();
        let id = world.origin_of_life(&mut rng, &params).unwrap();
        let template = world.organisms[&id].clone();
        let name = template.species.clone().unwrap();

        world.clear_organisms();
        assert!(world.organisms.is_empty());
        assert!(!world.fossil_record.species_is_extant(&name));

        let dropped = world.drop_organism(&template, GridPos::new(5, 5), &params, &mut rng).unwrap();
        assert!(world.fossil_record.species_is_extant(&name));
        assert_eq!(world.fossil_record.get(&name).unwrap().population, 1);
        assert_eq!(world.organisms[&dropped].species.as_deref(), Some(name.as_str()));

        // the ancestor's corpse is food, which blocks placement by default
        assert!(world.drop_organism(&template, GridPos::new(15, 15), &params, &mut rng).is_none());
    }

    #[test]
    fn test_drop_organism_registers_unknown_species() {
        let mut world = World::new(30, 30);
        let params = Hyperparams::default();
        let mut template = Organism::new(OrganismId(0), GridPos::new(0, 0), 0);
        template.anatomy.add_default_cell(CellType::Mouth, 0, 0, true);
        template.species = Some("imported01".into());
        world.drop_organism(&template, GridPos::new(4, 4), &params, &mut rng()).unwrap();
        assert!(world.fossil_record.species_is_extant("imported01"));
    }

    #[test]
    fn test_drop_cell_type_respects_organisms() {
        let mut world = World::new(20, 20);
        let params = Hyperparams::default();
        let id = world.origin_of_life(&mut rng(), &params).unwrap();

        let painted = world.drop_cell_type(GridPos::new(10, 10), CellState::Wall, 1, false, None);
        assert_eq!(painted, 6);
        assert_eq!(world.grid.state_at(10, 10), Some(CellState::Mouth));
        assert!(world.organisms[&id].living);

        world.drop_cell_type(GridPos::new(10, 10), CellState::Wall, 1, true, None);
        assert_eq!(world.grid.state_at(10, 10), Some(CellState::Wall));
        assert!(!world.organisms[&id].living);
    }

    #[test]
    fn test_drop_cell_type_ignore_state() {
        let mut world = World::new(10, 10);
        world.grid.set_cell_state(5, 5, CellState::Wall);
        world.drop_cell_type(GridPos::new(5, 5), CellState::Food, 1, false, Some(CellState::Wall));
        assert_eq!(world.grid.state_at(5, 5), Some(CellState::Wall));
        assert_eq!(world.grid.count_state(CellState::Food), 8);
    }

    #[test]
    fn test_average_mutability_skips_unswept_dead() {
        let mut world = World::new(20, 20);
        let params = Hyperparams::default();
        let mut low = Organism::new(world.allocate_id(), GridPos::new(4, 4), 0);
        low.anatomy.add_default_cell(CellType::Mouth, 0, 0, true);
        low.mutability = 2;
        let mut high = Organism::new(world.allocate_id(), GridPos::new(12, 12), 0);
        high.anatomy.add_default_cell(CellType::Mouth, 0, 0, true);
        high.mutability = 10;
        let low = world.add_organism(low);
        world.add_organism(high);
        assert_eq!(world.average_mutability(&params), 6.0);

        world.kill_near_organisms(GridPos::new(4, 4), 0);
        assert_eq!(world.organism_count(), 2);
        assert_eq!(world.average_mutability(&params), 10.0);

        world.remove_organisms(&[low]);
        assert_eq!(world.average_mutability(&params), 10.0);
    }

    #[test]
    fn test_find_and_kill_near() {
        let mut world = World::new(20, 20);
        let params = Hyperparams::default();
        let id = world.origin_of_life(&mut rng(), &params).unwrap();
        assert_eq!(world.find_near_organism(GridPos::new(12, 12), 1), Some(id));
        assert_eq!(world.find_near_organism(GridPos::new(2, 2), 2), None);
        assert_eq!(world.kill_near_organisms(GridPos::new(12, 12), 1), 1);
        assert_eq!(world.kill_near_organisms(GridPos::new(12, 12), 1), 0);
        assert_eq!(world.find_near_organism(GridPos::new(12, 12), 1), None);
    }

    #[test]
    fn test_reset_keeps_walls() {
        let mut world = World::new(20, 20);
        let params = Hyperparams::default();
        let mut rng = rng();
        world.grid.set_cell_state(0, 0, CellState::Wall);
        world.grid.set_cell_state(3, 3, CellState::Food);
        world.spawn_random_organisms(5, &mut rng, &params);
        world.total_ticks = 500;

        world.reset(false, true, &mut rng, &params);
        assert_eq!(world.grid.state_at(0, 0), Some(CellState::Wall));
        assert_eq!(world.grid.state_at(3, 3), Some(CellState::Empty));
        assert_eq!(world.organism_count(), 1);
        assert_eq!(world.total_ticks, 0);
        assert_eq!(world.fossil_record.species().count(), 1);

        world.reset(true, false, &mut rng, &params);
        assert_eq!(world.grid.count_state(CellState::Wall), 0);
        assert!(world.organisms.is_empty());

        world.grid.set_cell_state(1, 1, CellState::Wall);
        world.clear_walls();
        assert_eq!(world.grid.count_state(CellState::Wall), 0);
    }

    #[test]
    fn test_resize() {
        let mut world = World::new(20, 20);
        let params = Hyperparams::default();
        world.resize(30, 10, false, &mut rng(), &params);
        assert_eq!(world.grid.cols, 30);
        assert_eq!(world.grid.rows, 10);
        assert_eq!(world.organisms.values().next().unwrap().position, GridPos::new(15, 5));
    }

    proptest! {
        #[test]
        fn prop_remove_pass_is_exact(
            count in 1usize..30,
            picks in prop::collection::vec(0u64..40, 0..60),
        ) {
            let mut world = World::new(200, 10);
            for i in 0..count {
                let mut org = Organism::new(world.allocate_id(), GridPos::new(i as i32 * 4 + 1, 5), 0);
                org.anatomy.add_default_cell(CellType::Mouth, 0, 0, true);
                world.add_organism(org);
            }
            let ids: Vec<OrganismId> = picks.iter().map(|p| OrganismId(*p)).collect();
            let expected: BTreeSet<OrganismId> = ids.iter().copied().filter(|id| id.0 < count as u64).collect();

            let removed = world.remove_organisms(&ids);
            prop_assert_eq!(removed, expected.len());
            prop_assert_eq!(world.organism_count(), count - expected.len());
            for i in 0..count as u64 {
                prop_assert_eq!(world.organisms.contains_key(&OrganismId(i)), !expected.contains(&OrganismId(i)));
            }
        }
    }
}
