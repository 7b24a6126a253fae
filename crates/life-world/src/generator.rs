//! Builders for starting organisms.

use crate::anatomy::Anatomy;
use crate::brain::BrainController;
use crate::organism::Organism;
use life_core::{CellType, GridPos, OrganismId};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

const RANDOM_LAYERS: i32 = 4;
const BASE_SPAWN_CHANCE: f64 = 0.75;

/// Mouth at the center flanked by two diagonal producers
pub fn origin_anatomy() -> Anatomy {
    let mut anatomy = Anatomy::new();
    anatomy.add_default_cell(CellType::Mouth, 0, 0, false);
    anatomy.add_default_cell(CellType::Producer, 1, 1, false);
    anatomy.add_default_cell(CellType::Producer, -1, -1, true);
    anatomy
}

/// Grow a body ring by ring around a center mouth.
///
/// Each offset in ring `n` is tried once, only if it touches a cell grown
/// earlier, with a spawn chance that shrinks by a quarter per ring. Growth
/// stops at the first ring that adds nothing.
pub fn random_organism(id: OrganismId, position: GridPos, birth_tick: u64, rng: &mut ChaCha8Rng) -> Organism {
    let mut org = Organism::new(id, position, birth_tick);
    org.anatomy.add_default_cell(CellType::Mouth, 0, 0, false);

    for layer in 1..=RANDOM_LAYERS {
        let chance = BASE_SPAWN_CHANCE - (layer - 1) as f64 / 4.0;
        let mut grew = false;
        for (loc_col, loc_row) in ring(layer) {
            if org.anatomy.neighbors_of_cell(loc_col, loc_row).is_empty() {
                continue;
            }
            if rng.gen::<f64>() < chance {
                let cell_type = CellType::random(rng);
                org.anatomy.add_random_cell(cell_type, loc_col, loc_row, rng, false);
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }
    org.anatomy.recompute_aggregates();

    if org.anatomy.has(CellType::Brain) {
        org.brain = Some(BrainController::random(rng));
    }
    org
}

/// Offsets on the square ring at Chebyshev distance `layer`
fn ring(layer: i32) -> Vec<(i32, i32)> {
    let mut offsets = Vec::with_capacity((8 * layer) as usize);
    for c in -layer..=layer {
        offsets.push((c, -layer));
        offsets.push((c, layer));
    }
    for r in (-layer + 1)..layer {
        offsets.push((-layer, r));
        offsets.push((layer, r));
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_origin_anatomy() {
        let anatomy = origin_anatomy();
        assert_eq!(anatomy.len(), 3);
        assert_eq!(anatomy.local_cell(0, 0).unwrap().cell_type(), CellType::Mouth);
        assert_eq!(anatomy.count(CellType::Producer), 2);
    }

    #[test]
    fn test_ring_sizes() {
        assert_eq!(ring(1).len(), 8);
        assert_eq!(ring(3).len(), 24);
        assert!(ring(2).iter().all(|(c, r)| c.abs().max(r.abs()) == 2));
    }

    #[test]
    fn test_random_organisms_are_connected() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for i in 0..50 {
            let org = random_organism(OrganismId(i), GridPos::new(50, 50), 0, &mut rng);
            assert!(org.is_natural());
            assert!(org.anatomy.len() <= 81);
            for cell in org.anatomy.cells().iter().filter(|c| !c.is_center()) {
                assert!(org.anatomy.neighbors_of_cell(cell.loc_col, cell.loc_row).len() > 1);
            }
            assert_eq!(org.brain.is_some(), org.anatomy.has(CellType::Brain));
        }
    }

    #[test]
    fn test_random_growth_has_no_empty_rings() {
        let mut rng = ChaCha8Rng::seed_from_u64(29);
        for i in 0..50 {
            let org = random_organism(OrganismId(i), GridPos::new(50, 50), 0, &mut rng);
            let layers: std::collections::BTreeSet<i32> = org
                .anatomy
                .cells()
                .iter()
                .map(|c| c.loc_col.abs().max(c.loc_row.abs()))
                .collect();
            let outer = layers.iter().copied().max().unwrap_or(0);
            assert!(outer <= RANDOM_LAYERS);
            assert_eq!(layers.len() as i32, outer + 1);
        }
    }

    #[test]
    fn test_random_organism_is_seeded() {
        let a = random_organism(OrganismId(1), GridPos::new(5, 5), 0, &mut ChaCha8Rng::seed_from_u64(3));
        let b = random_organism(OrganismId(1), GridPos::new(5, 5), 0, &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(a.anatomy, b.anatomy);
    }
}
