//! # Terra Common
//!
//! Common types shared by the Terra world crates:
//! - Coordinate types (pixel, grid, region, chunk, chunk-local)
//! - World layout and tile addressing
//! - Tile identifiers and colors
//! - Layout errors

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_to_chunk_and_region() {
        let layout = WorldLayout::default();
        let pos = GridPos::new(100, 200);

        assert_eq!(layout.chunk_of(pos), ChunkCoord::new(6, 12));
        assert_eq!(layout.region_of(pos), RegionCoord::new(0, 1));
        assert_eq!(
            layout.decompose(pos).map(|a| a.local),
            Some(LocalTile::new(4, 8))
        );
    }
}
