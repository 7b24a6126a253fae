//! Grid-world evolution engine.
//!
//! Organisms built from typed body cells live on a bounded grid, eat, move,
//! reproduce with mutation and die. Lineages are tracked in a fossil record.

pub mod anatomy;
pub mod brain;
pub mod cell;
pub mod generator;
pub mod grid;
pub mod organism;
pub mod simulation;
pub mod snapshot;
pub mod species;
pub mod world;

pub use anatomy::Anatomy;
pub use brain::{BrainController, Observation};
pub use cell::{BodyCell, CellKind};
pub use grid::{Grid, GridCell, Occupant};
pub use organism::Organism;
pub use simulation::{PopulationStats, Simulation, TickReport};
pub use snapshot::{OrganismSnapshot, WorldSnapshot};
pub use species::{FossilRecord, FossilSeries, Species};
pub use world::World;
