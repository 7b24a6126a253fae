//! Decision table that steers an organism from what its eyes report.

use crate::grid::GridCell;
use life_core::{CellState, Decision, Direction, GridPos, OrganismId};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What one eye saw this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// `None` when the ray left the grid before seeing anything
    pub state: Option<CellState>,
    pub position: Option<GridPos>,
    pub owner: Option<OrganismId>,
    pub distance: u32,
    /// Absolute direction the eye was facing
    pub direction: Direction,
}

impl Observation {
    pub fn of(cell: &GridCell, distance: u32, direction: Direction) -> Self {
        Self {
            state: Some(cell.state),
            position: Some(cell.pos()),
            owner: cell.owner_org(),
            distance,
            direction,
        }
    }

    pub fn off_grid(distance: u32, direction: Direction) -> Self {
        Self {
            state: None,
            position: None,
            owner: None,
            distance,
            direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainController {
    decisions: BTreeMap<CellState, Decision>,
    #[serde(skip)]
    observations: Vec<Observation>,
}

impl Default for BrainController {
    /// Chase food, flee killers, ignore everything else
    fn default() -> Self {
        let mut decisions: BTreeMap<CellState, Decision> =
            CellState::ALL.iter().map(|s| (*s, Decision::Ignore)).collect();
        decisions.insert(CellState::Food, Decision::Chase);
        decisions.insert(CellState::Killer, Decision::Retreat);
        Self {
            decisions,
            observations: Vec::new(),
        }
    }
}

impl BrainController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn random(rng: &mut ChaCha8Rng) -> Self {
        let mut brain = Self::default();
        brain.randomize_decisions(rng);
        brain
    }

    /// Copy of the decision table for an offspring, without pending observations
    pub fn inherit(&self) -> Self {
        Self {
            decisions: self.decisions.clone(),
            observations: Vec::new(),
        }
    }

    pub fn decision_for(&self, state: CellState) -> Decision {
        self.decisions.get(&state).copied().unwrap_or(Decision::Ignore)
    }

    pub fn set_decision(&mut self, state: CellState, decision: Decision) {
        self.decisions.insert(state, decision);
    }

    pub fn decisions(&self) -> &BTreeMap<CellState, Decision> {
        &self.decisions
    }

    pub fn randomize_decisions(&mut self, rng: &mut ChaCha8Rng) {
        for state in CellState::ALL {
            self.decisions.insert(state, Decision::random(rng));
        }
    }

    /// Re-roll the reaction to one randomly chosen cell state.
    pub fn mutate_decisions(&mut self, rng: &mut ChaCha8Rng) {
        let state = CellState::ALL[rng.gen_range(0..CellState::ALL.len())];
        self.decisions.insert(state, Decision::random(rng));
    }

    pub fn observe(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    pub fn pending_observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Forget what was seen on earlier ticks.
    pub fn clear_observations(&mut self) {
        self.observations.clear();
    }

    /// React to the closest foreign cell seen this tick.
    ///
    /// Observations are consumed. Returns true when `movement` was changed.
    pub fn decide(&mut self, own_id: OrganismId, movement: &mut Direction) -> bool {
        let mut closest: Option<(u32, Decision, Direction)> = None;
        for obs in self.observations.drain(..) {
            let Some(state) = obs.state else {
                continue;
            };
            if obs.owner == Some(own_id) {
                continue;
            }
            if closest.map_or(true, |(distance, _, _)| obs.distance < distance) {
                let decision = self.decisions.get(&state).copied().unwrap_or(Decision::Ignore);
                closest = Some((obs.distance, decision, obs.direction));
            }
        }

        match closest {
            Some((_, Decision::Chase, direction)) => {
                *movement = direction;
                true
            }
            Some((_, Decision::Retreat, direction)) => {
                *movement = direction.opposite();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn seen(state: CellState, distance: u32, direction: Direction, owner: Option<OrganismId>) -> Observation {
        Observation {
            state: Some(state),
            position: None,
            owner,
            distance,
            direction,
        }
    }

    #[test]
    fn test_default_table() {
        let brain = BrainController::new();
        assert_eq!(brain.decision_for(CellState::Food), Decision::Chase);
        assert_eq!(brain.decision_for(CellState::Killer), Decision::Retreat);
        assert_eq!(brain.decision_for(CellState::Wall), Decision::Ignore);
        assert_eq!(brain.decisions().len(), CellState::ALL.len());
    }

    #[test]
    fn test_chase_closest() {
        let mut brain = BrainController::new();
        let mut movement = Direction::South;
        brain.observe(seen(CellState::Killer, 6, Direction::West, Some(OrganismId(9))));
        brain.observe(seen(CellState::Food, 2, Direction::East, None));
        assert!(brain.decide(OrganismId(1), &mut movement));
        assert_eq!(movement, Direction::East);
        assert!(brain.pending_observations().is_empty());
    }

    #[test]
    fn test_retreat_goes_opposite() {
        let mut brain = BrainController::new();
        let mut movement = Direction::South;
        brain.observe(seen(CellState::Killer, 3, Direction::NorthEast, Some(OrganismId(4))));
        assert!(brain.decide(OrganismId(1), &mut movement));
        assert_eq!(movement, Direction::SouthWest);
    }

    #[test]
    fn test_own_cells_and_ignores_leave_direction() {
        let mut brain = BrainController::new();
        let mut movement = Direction::South;
        brain.observe(seen(CellState::Killer, 1, Direction::North, Some(OrganismId(1))));
        brain.observe(seen(CellState::Wall, 4, Direction::East, None));
        brain.observe(Observation::off_grid(2, Direction::West));
        assert!(!brain.decide(OrganismId(1), &mut movement));
        assert_eq!(movement, Direction::South);
        assert!(!brain.decide(OrganismId(1), &mut movement));
    }

    #[test]
    fn test_clear_observations() {
        let mut brain = BrainController::new();
        let mut movement = Direction::South;
        brain.observe(seen(CellState::Food, 2, Direction::North, None));
        brain.clear_observations();
        assert!(brain.pending_observations().is_empty());
        assert!(!brain.decide(OrganismId(1), &mut movement));
        assert_eq!(movement, Direction::South);
    }

    #[test]
    fn test_inherit_drops_observations() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut brain = BrainController::random(&mut rng);
        brain.observe(seen(CellState::Food, 1, Direction::North, None));
        let child = brain.inherit();
        assert_eq!(child.decisions(), brain.decisions());
        assert!(child.pending_observations().is_empty());
    }

    #[test]
    fn test_mutate_changes_at_most_one_entry() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut brain = BrainController::new();
        let before = brain.decisions().clone();
        brain.mutate_decisions(&mut rng);
        let diffs = before
            .iter()
            .filter(|(state, decision)| brain.decision_for(**state) != **decision)
            .count();
        assert!(diffs <= 1);
    }

    #[test]
    fn test_serialization_skips_observations() {
        let mut brain = BrainController::new();
        brain.observe(seen(CellState::Food, 1, Direction::North, None));
        let json = serde_json::to_string(&brain).unwrap();
        let back: BrainController = serde_json::from_str(&json).unwrap();
        assert_eq!(back.decisions(), brain.decisions());
        assert!(back.pending_observations().is_empty());
    }
}
