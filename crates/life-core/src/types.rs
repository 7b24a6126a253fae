//! Core type definitions for the simulation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an organism in the world arena.
///
/// Ids are handed out from a monotonic counter and never reused, so a stale
/// id held by a grid cell can only miss, never alias another organism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrganismId(pub u64);

impl fmt::Display for OrganismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "org-{}", self.0)
    }
}

/// Integer column/row position on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub col: i32,
    pub row: i32,
}

impl GridPos {
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    pub fn add(&self, dc: i32, dr: i32) -> Self {
        Self {
            col: self.col + dc,
            row: self.row + dr,
        }
    }

    /// Step `n` tiles in the given direction
    pub fn step(&self, direction: Direction, n: i32) -> Self {
        let (dc, dr) = direction.scalar();
        self.add(dc * n, dr * n)
    }

    /// Manhattan distance to another position
    pub fn manhattan_distance(&self, other: &GridPos) -> i32 {
        (self.col - other.col).abs() + (self.row - other.row).abs()
    }
}

/// One of the eight compass directions.
///
/// The discriminants are the direction's index on the compass, clockwise from
/// north, and every arithmetic operation wraps modulo 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North = 0,
    NorthEast = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 8]
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..8)]
    }

    /// Unit step (dcol, drow); rows grow southwards.
    pub fn scalar(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        }
    }

    pub fn rotate_right(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn rotate_left(self) -> Self {
        Self::from_index(self.index() + 7)
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 4)
    }

    /// Compose a relative direction onto this one (mod 8 addition).
    pub fn compose(self, relative: Direction) -> Self {
        Self::from_index(self.index() + relative.index())
    }

    /// Rotate a local body offset into grid space for an organism facing `self`.
    ///
    /// Octants share a quarter-turn table: N/NE keep the offset, E/SE turn it a
    /// quarter clockwise, S/SW a half turn, W/NW a quarter counter-clockwise.
    /// Each entry is a bijection, so distinct offsets stay distinct.
    pub fn rotate_offset(self, col: i32, row: i32) -> (i32, i32) {
        match self {
            Direction::North | Direction::NorthEast => (col, row),
            Direction::East | Direction::SouthEast => (-row, col),
            Direction::South | Direction::SouthWest => (-col, -row),
            Direction::West | Direction::NorthWest => (row, -col),
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::North
    }
}

/// Living cell types an anatomy can be built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Mouth,
    Producer,
    Mover,
    Killer,
    Armor,
    Eye,
    Brain,
}

impl CellType {
    pub const ALL: [CellType; 7] = [
        CellType::Mouth,
        CellType::Producer,
        CellType::Mover,
        CellType::Killer,
        CellType::Armor,
        CellType::Eye,
        CellType::Brain,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn state(self) -> CellState {
        match self {
            CellType::Mouth => CellState::Mouth,
            CellType::Producer => CellState::Producer,
            CellType::Mover => CellState::Mover,
            CellType::Killer => CellState::Killer,
            CellType::Armor => CellState::Armor,
            CellType::Eye => CellState::Eye,
            CellType::Brain => CellState::Brain,
        }
    }

    pub fn name(self) -> &'static str {
        self.state().name()
    }
}

/// State tag carried by every grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    Empty,
    Food,
    Wall,
    Mouth,
    Producer,
    Mover,
    Killer,
    Armor,
    Eye,
    Brain,
}

impl CellState {
    pub const ALL: [CellState; 10] = [
        CellState::Empty,
        CellState::Food,
        CellState::Wall,
        CellState::Mouth,
        CellState::Producer,
        CellState::Mover,
        CellState::Killer,
        CellState::Armor,
        CellState::Eye,
        CellState::Brain,
    ];

    pub fn is_living(self) -> bool {
        self.cell_type().is_some()
    }

    pub fn cell_type(self) -> Option<CellType> {
        match self {
            CellState::Mouth => Some(CellType::Mouth),
            CellState::Producer => Some(CellType::Producer),
            CellState::Mover => Some(CellType::Mover),
            CellState::Killer => Some(CellType::Killer),
            CellState::Armor => Some(CellType::Armor),
            CellState::Eye => Some(CellType::Eye),
            CellState::Brain => Some(CellType::Brain),
            CellState::Empty | CellState::Food | CellState::Wall => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CellState::Empty => "empty",
            CellState::Food => "food",
            CellState::Wall => "wall",
            CellState::Mouth => "mouth",
            CellState::Producer => "producer",
            CellState::Mover => "mover",
            CellState::Killer => "killer",
            CellState::Armor => "armor",
            CellState::Eye => "eye",
            CellState::Brain => "brain",
        }
    }
}

impl Default for CellState {
    fn default() -> Self {
        CellState::Empty
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A brain's reaction to something an eye has seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Ignore,
    Retreat,
    Chase,
}

impl Decision {
    pub const ALL: [Decision; 3] = [Decision::Ignore, Decision::Retreat, Decision::Chase];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Per-type cell tallies, indexed by `CellType::index`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellCounts(pub [u32; 7]);

impl CellCounts {
    pub fn get(&self, cell_type: CellType) -> u32 {
        self.0[cell_type.index()]
    }

    pub fn increment(&mut self, cell_type: CellType) {
        self.0[cell_type.index()] += 1;
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}
