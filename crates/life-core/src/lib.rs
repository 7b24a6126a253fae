//! Core types and configuration shared by the Life Engine simulation crates.

pub mod types;
pub mod config;
pub mod error;

pub use error::{Error, Result};
pub use types::*;
pub use config::*;
