//! Species bookkeeping and the population time series.

use crate::anatomy::Anatomy;
use crate::organism::Organism;
use life_core::CellCounts;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const SPECIES_NAME_LEN: usize = 10;
const NAME_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random base-36 species name
pub fn random_species_name(rng: &mut ChaCha8Rng) -> String {
    (0..SPECIES_NAME_LEN)
        .map(|_| NAME_ALPHABET[rng.gen_range(0..NAME_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    /// Body plan of the founding organism
    pub anatomy: Anatomy,
    pub parent: Option<String>,
    pub population: u32,
    pub cumulative_population: u64,
    pub start_tick: u64,
    pub end_tick: Option<u64>,
    pub extinct: bool,
    pub cell_counts: CellCounts,
}

impl Species {
    pub fn new(name: String, anatomy: Anatomy, parent: Option<String>, start_tick: u64) -> Self {
        let cell_counts = anatomy.counts();
        Self {
            name,
            anatomy,
            parent,
            population: 1,
            cumulative_population: 1,
            start_tick,
            end_tick: None,
            extinct: false,
            cell_counts,
        }
    }

    pub fn add_population(&mut self) {
        self.population += 1;
        self.cumulative_population += 1;
    }

    /// Returns true when this decrement drove the species extinct.
    pub fn decrease_population(&mut self, tick: u64) -> bool {
        self.population = self.population.saturating_sub(1);
        if self.population == 0 && !self.extinct {
            self.extinct = true;
            self.end_tick = Some(tick);
            return true;
        }
        false
    }

    pub fn resurrect(&mut self) {
        self.extinct = false;
        self.end_tick = None;
    }
}

/// Append-only samples taken every `data_update_rate` ticks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FossilSeries {
    pub ticks: Vec<u64>,
    pub population: Vec<usize>,
    pub extant_species: Vec<usize>,
    pub average_mutability: Vec<f64>,
    pub average_cells: Vec<f64>,
    /// Average count of each cell type per organism, indexed by `CellType::index`
    pub average_cell_counts: Vec<[f64; 7]>,
}

impl FossilSeries {
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FossilRecord {
    species: BTreeMap<String, Species>,
    series: FossilSeries,
}

impl FossilRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Found a new species for `org` and assign it.
    pub fn add_species(
        &mut self,
        org: &mut Organism,
        parent: Option<&str>,
        tick: u64,
        rng: &mut ChaCha8Rng,
    ) -> String {
        let mut name = random_species_name(rng);
        while self.species.contains_key(&name) {
            name = random_species_name(rng);
        }
        let species = Species::new(name.clone(), org.anatomy.clone(), parent.map(str::to_string), tick);
        debug!(event = "species_founded", species = %name, parent = ?parent, tick);
        self.species.insert(name.clone(), species);
        org.species = Some(name.clone());
        name
    }

    /// Register an existing species object. Returns false if the name is taken.
    pub fn add_species_obj(&mut self, species: Species) -> bool {
        if self.species.contains_key(&species.name) {
            return false;
        }
        self.species.insert(species.name.clone(), species);
        true
    }

    pub fn add_population(&mut self, name: &str) {
        match self.species.get_mut(name) {
            Some(species) => species.add_population(),
            None => warn!(species = name, "Population added to unknown species"),
        }
    }

    pub fn decrease_population(&mut self, name: &str, tick: u64) {
        if let Some(species) = self.species.get_mut(name) {
            if species.decrease_population(tick) {
                debug!(event = "species_extinct", species = name, tick);
            }
        }
    }

    pub fn resurrect(&mut self, name: &str) -> bool {
        match self.species.get_mut(name) {
            Some(species) if species.extinct => {
                species.resurrect();
                debug!(event = "species_resurrected", species = name);
                true
            }
            _ => false,
        }
    }

    pub fn species_is_extant(&self, name: &str) -> bool {
        self.species.get(name).map(|s| !s.extinct).unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<&Species> {
        self.species.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Species> {
        self.species.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.species.contains_key(name)
    }

    pub fn species(&self) -> impl Iterator<Item = &Species> + '_ {
        self.species.values()
    }

    pub fn extant_count(&self) -> usize {
        self.species.values().filter(|s| !s.extinct).count()
    }

    pub fn series(&self) -> &FossilSeries {
        &self.series
    }

    /// Append one sample of population statistics.
    pub fn update_data<'a>(
        &mut self,
        tick: u64,
        organisms: impl Iterator<Item = &'a Organism>,
        average_mutability: f64,
    ) {
        if self.series.ticks.last().is_some_and(|last| *last >= tick) {
            warn!(tick, "Skipping out-of-order fossil sample");
            return;
        }

        let mut population = 0usize;
        let mut total_cells = 0u64;
        let mut totals = [0u64; 7];
        for org in organisms.filter(|o| o.living) {
            population += 1;
            total_cells += org.anatomy.len() as u64;
            for (slot, count) in totals.iter_mut().zip(org.anatomy.counts().0) {
                *slot += count as u64;
            }
        }

        let per_org = |total: u64| if population == 0 { 0.0 } else { total as f64 / population as f64 };
        let mut average_cell_counts = [0.0; 7];
        for (avg, total) in average_cell_counts.iter_mut().zip(totals) {
            *avg = per_org(total);
        }

        self.series.ticks.push(tick);
        self.series.population.push(population);
        self.series.extant_species.push(self.extant_count());
        self.series.average_mutability.push(average_mutability);
        self.series.average_cells.push(per_org(total_cells));
        self.series.average_cell_counts.push(average_cell_counts);
    }

    pub fn clear(&mut self) {
        self.species.clear();
        self.series = FossilSeries::default();
    }
}
