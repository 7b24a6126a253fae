//! Body cells and their per-tick behavior.
//!
//! A body cell is a plain value: a local offset plus a [`CellKind`] tag that
//! carries any type-specific payload. Behavior lives in free functions that
//! switch on the tag, so the set of cell types is closed and checked
//! exhaustively by the compiler.

use crate::brain::Observation;
use crate::organism::Organism;
use crate::world::World;
use life_core::{CellState, CellType, Direction, GridPos, Hyperparams};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Type tag plus variant payload of a body cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Mouth,
    Producer,
    Mover,
    Killer,
    Armor,
    /// `direction` is relative to the organism's rotation
    Eye { direction: Direction },
    Brain,
}

impl CellKind {
    pub fn cell_type(&self) -> CellType {
        match self {
            CellKind::Mouth => CellType::Mouth,
            CellKind::Producer => CellType::Producer,
            CellKind::Mover => CellType::Mover,
            CellKind::Killer => CellType::Killer,
            CellKind::Armor => CellType::Armor,
            CellKind::Eye { .. } => CellType::Eye,
            CellKind::Brain => CellType::Brain,
        }
    }

    pub fn state(&self) -> CellState {
        self.cell_type().state()
    }

    /// Payload initialized to its default values
    pub fn default_of(cell_type: CellType) -> Self {
        match cell_type {
            CellType::Mouth => CellKind::Mouth,
            CellType::Producer => CellKind::Producer,
            CellType::Mover => CellKind::Mover,
            CellType::Killer => CellKind::Killer,
            CellType::Armor => CellKind::Armor,
            CellType::Eye => CellKind::Eye {
                direction: Direction::North,
            },
            CellType::Brain => CellKind::Brain,
        }
    }

    /// Payload initialized randomly
    pub fn random_of(cell_type: CellType, rng: &mut ChaCha8Rng) -> Self {
        match cell_type {
            CellType::Eye => CellKind::Eye {
                direction: Direction::random(rng),
            },
            other => Self::default_of(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyCell {
    pub loc_col: i32,
    pub loc_row: i32,
    pub kind: CellKind,
}

impl BodyCell {
    pub fn new(kind: CellKind, loc_col: i32, loc_row: i32) -> Self {
        Self { loc_col, loc_row, kind }
    }

    pub fn default_of(cell_type: CellType, loc_col: i32, loc_row: i32) -> Self {
        Self::new(CellKind::default_of(cell_type), loc_col, loc_row)
    }

    pub fn random_of(cell_type: CellType, loc_col: i32, loc_row: i32, rng: &mut ChaCha8Rng) -> Self {
        Self::new(CellKind::random_of(cell_type, rng), loc_col, loc_row)
    }

    /// Deep copy of a parent's cell, payload included
    pub fn inherit(parent: &BodyCell) -> Self {
        *parent
    }

    pub fn cell_type(&self) -> CellType {
        self.kind.cell_type()
    }

    pub fn state(&self) -> CellState {
        self.kind.state()
    }

    pub fn is_center(&self) -> bool {
        self.loc_col == 0 && self.loc_row == 0
    }

    /// Offset after applying the organism's rotation
    pub fn rotated(&self, rotation: Direction) -> (i32, i32) {
        rotation.rotate_offset(self.loc_col, self.loc_row)
    }

    /// Absolute grid position for an organism centered at `center`
    pub fn real_pos(&self, center: GridPos, rotation: Direction) -> GridPos {
        let (dc, dr) = self.rotated(rotation);
        center.add(dc, dr)
    }
}

/// Run one cell's per-tick action for its organism.
pub(crate) fn perform(
    cell: &BodyCell,
    org: &mut Organism,
    world: &mut World,
    params: &Hyperparams,
    rng: &mut ChaCha8Rng,
) {
    match cell.kind {
        CellKind::Mouth => eat_neighbors(cell, org, world, params),
        CellKind::Producer => produce_food(cell, org, world, params, rng),
        CellKind::Killer => strike_neighbors(cell, org, world, params),
        CellKind::Eye { direction } => {
            if org.anatomy.has(CellType::Brain) && org.brain.is_some() {
                let observation = look(cell, direction, org, world, params);
                if let Some(brain) = org.brain.as_mut() {
                    brain.observe(observation);
                }
            }
        }
        CellKind::Mover | CellKind::Armor | CellKind::Brain => {}
    }
}

fn eat_neighbors(cell: &BodyCell, org: &mut Organism, world: &mut World, params: &Hyperparams) {
    let real = cell.real_pos(org.position, org.rotation_direction);
    for &(dc, dr) in &params.edible_neighbors {
        let target = real.add(dc, dr);
        if world.grid.state_at(target.col, target.row) == Some(CellState::Food) {
            world.grid.set_cell_state(target.col, target.row, CellState::Empty);
            org.food_collected += 1;
        }
    }
}

fn produce_food(
    cell: &BodyCell,
    org: &Organism,
    world: &mut World,
    params: &Hyperparams,
    rng: &mut ChaCha8Rng,
) {
    if org.anatomy.has(CellType::Mover) && !params.movers_can_produce {
        return;
    }
    if params.growable_neighbors.is_empty() || rng.gen::<f64>() * 100.0 > params.food_prod_prob {
        return;
    }
    let (dc, dr) = params.growable_neighbors[rng.gen_range(0..params.growable_neighbors.len())];
    let target = cell.real_pos(org.position, org.rotation_direction).add(dc, dr);
    if world.grid.state_at(target.col, target.row) == Some(CellState::Empty) {
        world.grid.set_cell_state(target.col, target.row, CellState::Food);
    }
}

/// Harm every other living organism touching this killer, except through armor.
fn strike_neighbors(cell: &BodyCell, org: &mut Organism, world: &mut World, params: &Hyperparams) {
    let real = cell.real_pos(org.position, org.rotation_direction);
    let tick = world.total_ticks;
    for &(dc, dr) in &params.killable_neighbors {
        let target = real.add(dc, dr);
        let Some(grid_cell) = world.grid.cell_at(target.col, target.row) else {
            continue;
        };
        let Some(victim_id) = grid_cell.owner_org() else {
            continue;
        };
        if victim_id == org.id || grid_cell.state == CellState::Armor {
            continue;
        }
        let hit_killer = grid_cell.state == CellState::Killer;

        let World {
            grid,
            organisms,
            fossil_record,
            ..
        } = world;
        let Some(victim) = organisms.get_mut(&victim_id) else {
            continue;
        };
        if !victim.living {
            continue;
        }
        victim.harm(grid, fossil_record, params, tick);

        if params.insta_kill && hit_killer {
            org.harm(grid, fossil_record, params, tick);
            if !org.living {
                return;
            }
        }
    }
}

/// Cast a ray from an eye cell along its absolute facing.
pub fn look(
    cell: &BodyCell,
    relative: Direction,
    org: &Organism,
    world: &World,
    params: &Hyperparams,
) -> Observation {
    let direction = org.rotation_direction.compose(relative);
    let start = cell.real_pos(org.position, org.rotation_direction);
    let mut pos = start;
    let mut last_seen = None;

    for _ in 0..params.look_range {
        pos = pos.step(direction, 1);
        let Some(grid_cell) = world.grid.cell_at_pos(pos) else {
            return Observation::off_grid(start.manhattan_distance(&pos.step(direction, -1)) as u32, direction);
        };
        if params.see_through_self && grid_cell.owner_org() == Some(org.id) {
            continue;
        }
        if grid_cell.state != CellState::Empty {
            return Observation::of(grid_cell, start.manhattan_distance(&pos) as u32, direction);
        }
        last_seen = Some(grid_cell);
    }

    match last_seen {
        Some(grid_cell) => Observation::of(grid_cell, params.look_range, direction),
        None => Observation::off_grid(0, direction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Occupant;
    use rand::SeedableRng;

    fn eye_organism(world: &mut World, pos: GridPos) -> Organism {
        let mut org = Organism::new(world.allocate_id(), pos, world.total_ticks);
        org.anatomy.add_cell(BodyCell::default_of(CellType::Eye, 0, 0), true);
        org.update_grid(&mut world.grid);
        org
    }

    #[test]
    fn test_factory_payloads() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(
            CellKind::default_of(CellType::Eye),
            CellKind::Eye { direction: Direction::North }
        );
        for cell_type in CellType::ALL {
            let cell = BodyCell::random_of(cell_type, 1, -1, &mut rng);
            assert_eq!(cell.cell_type(), cell_type);
            assert_eq!(cell.state(), cell_type.state());
            assert_eq!(BodyCell::inherit(&cell), cell);
        }
    }

    #[test]
    fn test_real_pos_uses_rotation() {
        let cell = BodyCell::default_of(CellType::Mouth, 0, -2);
        let center = GridPos::new(10, 10);
        assert_eq!(cell.real_pos(center, Direction::North), GridPos::new(10, 8));
        assert_eq!(cell.real_pos(center, Direction::East), GridPos::new(12, 10));
        assert_eq!(cell.real_pos(center, Direction::South), GridPos::new(10, 12));
        assert_eq!(cell.real_pos(center, Direction::West), GridPos::new(8, 10));
    }

    #[test]
    fn test_eye_sees_wall_at_distance() {
        let mut world = World::new(20, 20);
        let params = Hyperparams {
            look_range: 5,
            ..Default::default()
        };
        let org = eye_organism(&mut world, GridPos::new(5, 10));
        world.grid.set_cell_state(5, 7, CellState::Wall);

        let cell = org.anatomy.cells()[0];
        let obs = look(&cell, Direction::North, &org, &world, &params);
        assert_eq!(obs.distance, 3);
        assert_eq!(obs.direction, Direction::North);
        assert_eq!(obs.state, Some(CellState::Wall));
    }

    #[test]
    fn test_eye_direction_is_relative_to_rotation() {
        let mut world = World::new(20, 20);
        let params = Hyperparams {
            look_range: 5,
            ..Default::default()
        };
        let mut org = eye_organism(&mut world, GridPos::new(5, 10));
        org.rotation_direction = Direction::East;
        world.grid.set_cell_state(7, 10, CellState::Food);

        let cell = org.anatomy.cells()[0];
        let obs = look(&cell, Direction::North, &org, &world, &params);
        assert_eq!(obs.direction, Direction::East);
        assert_eq!(obs.distance, 2);
        assert_eq!(obs.state, Some(CellState::Food));
    }

    #[test]
    fn test_eye_ray_stops_at_grid_edge() {
        let mut world = World::new(10, 10);
        let params = Hyperparams {
            look_range: 8,
            ..Default::default()
        };
        let org = eye_organism(&mut world, GridPos::new(5, 2));
        let cell = org.anatomy.cells()[0];
        let obs = look(&cell, Direction::North, &org, &world, &params);
        assert_eq!(obs.state, None);
        assert_eq!(obs.distance, 2);
    }

    #[test]
    fn test_eye_sees_through_self_when_enabled() {
        let mut world = World::new(20, 20);
        let mut params = Hyperparams {
            look_range: 6,
            ..Default::default()
        };
        let mut org = Organism::new(world.allocate_id(), GridPos::new(10, 10), 0);
        org.anatomy.add_cell(BodyCell::default_of(CellType::Eye, 0, 0), false);
        org.anatomy.add_cell(BodyCell::default_of(CellType::Armor, 0, -1), true);
        org.update_grid(&mut world.grid);
        world.grid.set_cell_state(10, 6, CellState::Wall);

        let cell = org.anatomy.cells()[0];
        let blocked = look(&cell, Direction::North, &org, &world, &params);
        assert_eq!(blocked.owner, Some(org.id));
        assert_eq!(blocked.distance, 1);

        params.see_through_self = true;
        let through = look(&cell, Direction::North, &org, &world, &params);
        assert_eq!(through.state, Some(CellState::Wall));
        assert_eq!(through.distance, 4);
    }

    #[test]
    fn test_empty_lane_reports_full_range() {
        let mut world = World::new(30, 30);
        let params = Hyperparams {
            look_range: 4,
            ..Default::default()
        };
        let org = eye_organism(&mut world, GridPos::new(15, 15));
        let cell = org.anatomy.cells()[0];
        let obs = look(&cell, Direction::West, &org, &world, &params);
        assert_eq!(obs.state, Some(CellState::Empty));
        assert_eq!(obs.distance, 4);
        assert_eq!(obs.direction, Direction::West);
    }

    #[test]
    fn test_killer_skips_armor_cells() {
        let mut world = World::new(10, 10);
        let params = Hyperparams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut killer = Organism::new(world.allocate_id(), GridPos::new(4, 4), 0);
        killer.anatomy.add_cell(BodyCell::default_of(CellType::Killer, 0, 0), true);
        killer.update_grid(&mut world.grid);

        let mut victim = Organism::new(world.allocate_id(), GridPos::new(5, 4), 0);
        victim.anatomy.add_cell(BodyCell::default_of(CellType::Armor, 0, 0), false);
        victim.anatomy.add_cell(BodyCell::default_of(CellType::Mouth, 1, 0), true);
        let victim_id = world.add_organism(victim);

        let cell = killer.anatomy.cells()[0];
        perform(&cell, &mut killer, &mut world, &params, &mut rng);
        assert_eq!(world.organisms[&victim_id].damage, 0);

        // the killer's neighbor is now a mouth cell
        world.grid.change_cell(
            5,
            4,
            CellState::Mouth,
            Some(Occupant {
                organism: victim_id,
                loc_col: 0,
                loc_row: 0,
            }),
        );
        perform(&cell, &mut killer, &mut world, &params, &mut rng);
        assert_eq!(world.organisms[&victim_id].damage, 1);
        assert!(world.organisms[&victim_id].living);
    }
}
