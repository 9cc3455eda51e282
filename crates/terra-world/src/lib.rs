//! # Terra World
//!
//! Terrain generation and persistent world storage.
//!
//! This crate handles:
//! - Seeded noise maps and biome classification
//! - Tile, chunk and region storage
//! - The binary region file format
//! - Region streaming around the player on a background worker
//! - World metadata and save folders

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod biome;
pub mod chunk;
pub mod config;
pub mod error;
pub mod generation;
pub mod map;
pub mod metadata;
pub mod noise;
pub mod progress;
pub mod region;
pub mod region_file;
pub mod rng;
pub mod streaming;
pub mod tiles;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::biome::*;
    pub use crate::chunk::*;
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::generation::*;
    pub use crate::map::*;
    pub use crate::metadata::*;
    pub use crate::noise::*;
    pub use crate::progress::*;
    pub use crate::region::*;
    pub use crate::rng::*;
    pub use crate::streaming::*;
    pub use crate::tiles::*;
}

pub use prelude::*;
