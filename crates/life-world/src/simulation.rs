//! Tick driver for a world.

use crate::world::World;
use life_core::{CellState, GridPos, Hyperparams, OrganismId, SimulationConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{event, info, instrument, Level};

const PROGRESS_LOG_INTERVAL: u64 = 1000;

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub population: usize,
    pub births: u64,
    pub deaths: usize,
    pub food_dropped: usize,
    /// The population died out and the world restarted from the origin of life
    pub reset: bool,
}

/// Point-in-time population statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    pub tick: u64,
    pub population: usize,
    pub extant_species: usize,
    pub total_species: usize,
    pub average_mutability: f64,
    pub largest_cell_count: usize,
    pub total_births: u64,
    pub total_deaths: u64,
    pub food_cells: usize,
    pub auto_resets: u32,
}

pub struct Simulation {
    world: World,
    config: SimulationConfig,
    rng: ChaCha8Rng,
    paused: bool,
    auto_reset_count: u32,
}

impl Simulation {
    /// New world seeded with the origin of life at its center.
    pub fn new(config: SimulationConfig) -> Self {
        let mut sim = Self::empty(config);
        let Simulation { world, config, rng, .. } = &mut sim;
        world.origin_of_life(rng, &config.hyperparams);
        sim
    }

    /// New world with no organisms in it.
    pub fn empty(config: SimulationConfig) -> Self {
        let world = World::new(config.world.cols, config.world.rows);
        Self::from_world(config, world)
    }

    /// Drive an existing world. The RNG stream is derived from the seed and
    /// the world's tick so a restored world does not replay from tick zero.
    pub fn from_world(config: SimulationConfig, world: World) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed ^ world.total_ticks);
        Self {
            world,
            config,
            rng,
            paused: false,
            auto_reset_count: 0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn hyperparams(&self) -> &Hyperparams {
        &self.config.hyperparams
    }

    pub fn set_hyperparams(&mut self, hyperparams: Hyperparams) {
        self.config.hyperparams = hyperparams;
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn tick(&self) -> u64 {
        self.world.total_ticks
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn auto_reset_count(&self) -> u32 {
        self.auto_reset_count
    }

    /// Advance one tick. Returns `None` while paused.
    pub fn step(&mut self) -> Option<TickReport> {
        if self.paused {
            return None;
        }
        let births_before = self.world.births;

        // Newborns added during the pass get their first update next tick.
        let ids: Vec<OrganismId> = self.world.organisms.keys().copied().collect();
        let had_population = !ids.is_empty();
        let mut dead = Vec::new();
        for id in ids {
            let Some(mut org) = self.world.organisms.remove(&id) else {
                continue;
            };
            let alive = org.living && org.update(&mut self.world, &self.config.hyperparams, &mut self.rng);
            self.world.organisms.insert(id, org);
            if !alive {
                dead.push(id);
            }
        }
        // killers can finish off organisms that already took their turn
        dead.extend(
            self.world
                .organisms
                .iter()
                .filter(|(_, org)| !org.living)
                .map(|(id, _)| *id),
        );
        let deaths = self.world.remove_organisms(&dead);
        let births = self.world.births - births_before;

        let mut reset = false;
        if had_population && self.world.organisms.is_empty() {
            if self.config.world.auto_reset {
                self.auto_reset_count += 1;
                info!(
                    event = "auto_reset",
                    tick = self.world.total_ticks,
                    auto_resets = self.auto_reset_count,
                    "Population died out, restarting from the origin of life"
                );
                self.world.reset(
                    self.config.world.clear_walls_on_reset,
                    true,
                    &mut self.rng,
                    &self.config.hyperparams,
                );
                reset = true;
            } else {
                info!(
                    event = "population_extinct",
                    tick = self.world.total_ticks,
                    "Population died out, pausing"
                );
                self.paused = true;
            }
        }

        let food_dropped = self.world.generate_food(&self.config.hyperparams, &mut self.rng);
        self.world.total_ticks += 1;

        let rate = self.config.world.data_update_rate;
        if rate > 0 && self.world.total_ticks % rate == 0 {
            let average_mutability = self.world.average_mutability(&self.config.hyperparams);
            self.world.fossil_record.update_data(
                self.world.total_ticks,
                self.world.organisms.values(),
                average_mutability,
            );
        }

        Some(TickReport {
            tick: self.world.total_ticks,
            population: self.world.organisms.len(),
            births,
            deaths,
            food_dropped,
            reset,
        })
    }

    /// Run up to `num_ticks` ticks, stopping early if the simulation pauses.
    #[instrument(skip(self), fields(start_tick = self.world.total_ticks))]
    pub fn run(&mut self, num_ticks: u64) -> PopulationStats {
        info!("Running simulation for {} ticks", num_ticks);
        for _ in 0..num_ticks {
            let Some(report) = self.step() else {
                break;
            };
            if report.tick % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    "Tick {}: {} organisms alive, {} species extant",
                    report.tick,
                    report.population,
                    self.world.fossil_record.extant_count()
                );
            }
        }
        let stats = self.stats();
        info!(
            event = "run_complete",
            tick = stats.tick,
            population = stats.population,
            extant_species = stats.extant_species,
            paused = self.paused,
        );
        stats
    }

    /// Drop random organisms; `None` uses the configured count.
    pub fn spawn_random_organisms(&mut self, count: Option<usize>) -> usize {
        let count = count.unwrap_or(self.config.world.num_random_orgs);
        self.world
            .spawn_random_organisms(count, &mut self.rng, &self.config.hyperparams)
    }

    /// Clear the world. Walls follow the `clear_walls_on_reset` setting.
    pub fn reset(&mut self, reset_life: bool) {
        self.world.reset(
            self.config.world.clear_walls_on_reset,
            reset_life,
            &mut self.rng,
            &self.config.hyperparams,
        );
        self.paused = false;
    }

    /// Paint `state` under the configured brush. Painting food leaves walls alone.
    pub fn paint_cells(&mut self, center: GridPos, state: CellState, kill_blocking: bool) -> usize {
        let ignore_state = (state == CellState::Food).then_some(CellState::Wall);
        self.world.drop_cell_type(
            center,
            state,
            self.config.world.brush_size,
            kill_blocking,
            ignore_state,
        )
    }

    pub fn find_near_organism(&self, center: GridPos) -> Option<OrganismId> {
        self.world
            .find_near_organism(center, self.config.world.brush_size)
    }

    pub fn kill_near_organisms(&mut self, center: GridPos) -> usize {
        self.world
            .kill_near_organisms(center, self.config.world.brush_size)
    }

    pub fn stats(&self) -> PopulationStats {
        PopulationStats {
            tick: self.world.total_ticks,
            population: self.world.organisms.len(),
            extant_species: self.world.fossil_record.extant_count(),
            total_species: self.world.fossil_record.species().count(),
            average_mutability: self.world.average_mutability(&self.config.hyperparams),
            largest_cell_count: self.world.largest_cell_count,
            total_births: self.world.births,
            total_deaths: self.world.deaths,
            food_cells: self.world.grid.count_state(CellState::Food),
            auto_resets: self.auto_reset_count,
        }
    }

    /// Log population gauges for the current tick.
    pub fn emit_population_metrics(&self) {
        let stats = self.stats();
        info!(
            event = "population_metrics",
            tick = stats.tick,
            population = stats.population,
            extant_species = stats.extant_species,
            total_species = stats.total_species,
            average_mutability = stats.average_mutability,
            largest_cell_count = stats.largest_cell_count,
            food_cells = stats.food_cells,
            "Population metrics"
        );
        event!(
            Level::INFO,
            gauge_name = "population",
            gauge_value = stats.population,
            "Population gauge"
        );
        event!(
            Level::INFO,
            gauge_name = "extant_species",
            gauge_value = stats.extant_species,
            "Extant species gauge"
        );
        event!(
            Level::INFO,
            gauge_name = "average_mutability",
            gauge_value = stats.average_mutability,
            "Average mutability gauge"
        );
    }
}
