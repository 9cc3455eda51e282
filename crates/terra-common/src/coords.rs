//! Coordinate types and world addressing.
//!
//! The world is a bounded grid of tiles. Tiles are grouped into chunks, and
//! chunks are grouped into regions. Every valid grid position maps to exactly
//! one `(region, chunk, local tile)` triple through integer division and
//! modulo against the [`WorldLayout`]; [`WorldLayout::decompose`] and
//! [`WorldLayout::compose`] are inverses of each other.
//!
//! Chunk coordinates are always absolute in the global chunk grid. The
//! region-relative offset of a chunk is computed on demand with
//! [`WorldLayout::chunk_offset`].

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Default number of regions along each world axis.
pub const DEFAULT_MAX_REGIONS: u32 = 16;

/// Default number of chunks along each region axis.
pub const DEFAULT_REGION_SIZE_IN_CHUNKS: u32 = 8;

/// Default chunk width/height in tiles.
pub const DEFAULT_CHUNK_SIZE_IN_TILES: u16 = 16;

/// Default number of depth layers per chunk.
pub const DEFAULT_CHUNK_DEPTH: u16 = 5;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE_PX: u32 = 16;

/// World coordinate in pixels (render/physics position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldCoord {
    /// X coordinate in world space
    pub x: i64,
    /// Y coordinate in world space
    pub y: i64,
}

impl WorldCoord {
    /// Creates a new world coordinate.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Converts to the grid position of the tile containing this pixel.
    #[must_use]
    pub const fn to_grid(self, tile_size_px: u32) -> GridPos {
        let size = tile_size_px as i64;
        GridPos {
            x: self.x.div_euclid(size) as i32,
            y: self.y.div_euclid(size) as i32,
        }
    }
}

/// Integer tile coordinate in the world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl GridPos {
    /// Creates a new grid position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Top-left pixel of this tile.
    #[must_use]
    pub const fn to_world_coord(self, tile_size_px: u32) -> WorldCoord {
        WorldCoord {
            x: (self.x as i64) * (tile_size_px as i64),
            y: (self.y as i64) * (tile_size_px as i64),
        }
    }
}

/// Region coordinate in the region grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionCoord {
    /// Region X
    pub x: i32,
    /// Region Y
    pub y: i32,
}

impl RegionCoord {
    /// Creates a new region coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Region file name (`r.<x>.<y>.region`).
    #[must_use]
    pub fn filename(&self) -> String {
        format!("r.{}.{}.region", self.x, self.y)
    }

    /// Chebyshev distance to another region.
    #[must_use]
    pub const fn distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy {
            dx
        } else {
            dy
        }
    }
}

impl std::fmt::Display for RegionCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Chunk coordinate, absolute in the global chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// X coordinate in chunk space
    pub x: i32,
    /// Y coordinate in chunk space
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Tile coordinate within a chunk (0 to chunk size - 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalTile {
    /// X coordinate within chunk
    pub x: u16,
    /// Y coordinate within chunk
    pub y: u16,
}

impl LocalTile {
    /// Creates a new local coordinate.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Full address of a tile column: owning region, owning chunk, and tile offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileAddress {
    /// Region containing the chunk
    pub region: RegionCoord,
    /// Absolute chunk coordinate
    pub chunk: ChunkCoord,
    /// Tile offset within the chunk
    pub local: LocalTile,
}

/// Two-dimensional extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    /// Size along X
    pub width: u32,
    /// Size along Y
    pub height: u32,
}

impl Extent {
    /// Creates a new extent.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square extent.
    #[must_use]
    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// Number of cells covered.
    #[must_use]
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Tile dimensions of a chunk (`x * y` columns, `z` depth layers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkDims {
    /// Tiles along X
    pub x: u16,
    /// Tiles along Y
    pub y: u16,
    /// Depth layers (layer 0 is the base terrain)
    pub z: u16,
}

impl ChunkDims {
    /// Total tile slots in a chunk.
    #[must_use]
    pub const fn volume(self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }
}

/// Runtime description of the world's bounded grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldLayout {
    /// Number of regions along each axis
    pub max_regions: Extent,
    /// Number of chunks along each region axis
    pub region_size_in_chunks: Extent,
    /// Tiles per chunk
    pub chunk_size_in_tiles: ChunkDims,
    /// Tile edge length in pixels
    pub tile_size_px: u32,
}

impl Default for WorldLayout {
    fn default() -> Self {
        Self {
            max_regions: Extent::square(DEFAULT_MAX_REGIONS),
            region_size_in_chunks: Extent::square(DEFAULT_REGION_SIZE_IN_CHUNKS),
            chunk_size_in_tiles: ChunkDims {
                x: DEFAULT_CHUNK_SIZE_IN_TILES,
                y: DEFAULT_CHUNK_SIZE_IN_TILES,
                z: DEFAULT_CHUNK_DEPTH,
            },
            tile_size_px: DEFAULT_TILE_SIZE_PX,
        }
    }
}

impl WorldLayout {
    /// Checks that every extent is non-zero and that region/chunk offsets fit
    /// the u16 fields of the region file format.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.max_regions.area() == 0 {
            return Err(LayoutError::Empty("max_regions"));
        }
        if self.region_size_in_chunks.area() == 0 {
            return Err(LayoutError::Empty("region_size_in_chunks"));
        }
        if self.chunk_size_in_tiles.volume() == 0 {
            return Err(LayoutError::Empty("chunk_size_in_tiles"));
        }
        if self.tile_size_px == 0 {
            return Err(LayoutError::Empty("tile_size_px"));
        }
        if self.region_size_in_chunks.width > u32::from(u16::MAX)
            || self.region_size_in_chunks.height > u32::from(u16::MAX)
        {
            return Err(LayoutError::TooLarge("region_size_in_chunks"));
        }
        let world = u64::from(self.max_regions.width)
            * u64::from(self.region_size_in_chunks.width)
            * u64::from(self.chunk_size_in_tiles.x);
        let world_y = u64::from(self.max_regions.height)
            * u64::from(self.region_size_in_chunks.height)
            * u64::from(self.chunk_size_in_tiles.y);
        if world.max(world_y) > i32::MAX as u64 {
            return Err(LayoutError::TooLarge("world grid"));
        }
        Ok(())
    }

    /// Number of region slots.
    #[must_use]
    pub const fn region_count(&self) -> usize {
        self.max_regions.area()
    }

    /// Chunk grid extent of the whole world.
    #[must_use]
    pub const fn max_chunks(&self) -> Extent {
        Extent::new(
            self.max_regions.width * self.region_size_in_chunks.width,
            self.max_regions.height * self.region_size_in_chunks.height,
        )
    }

    /// Region extent in tiles.
    #[must_use]
    pub const fn region_size_in_tiles(&self) -> Extent {
        Extent::new(
            self.region_size_in_chunks.width * self.chunk_size_in_tiles.x as u32,
            self.region_size_in_chunks.height * self.chunk_size_in_tiles.y as u32,
        )
    }

    /// World extent in tiles.
    #[must_use]
    pub const fn world_size_in_tiles(&self) -> Extent {
        let chunks = self.max_chunks();
        Extent::new(
            chunks.width * self.chunk_size_in_tiles.x as u32,
            chunks.height * self.chunk_size_in_tiles.y as u32,
        )
    }

    /// World extent in pixels.
    #[must_use]
    pub const fn real_dimensions(&self) -> (u64, u64) {
        let tiles = self.world_size_in_tiles();
        (
            tiles.width as u64 * self.tile_size_px as u64,
            tiles.height as u64 * self.tile_size_px as u64,
        )
    }

    /// Center tile of the world.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn center(&self) -> GridPos {
        let tiles = self.world_size_in_tiles();
        GridPos::new((tiles.width / 2) as i32, (tiles.height / 2) as i32)
    }

    /// Whether the grid position lies inside the world.
    #[must_use]
    pub const fn contains(&self, pos: GridPos) -> bool {
        let tiles = self.world_size_in_tiles();
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < tiles.width && (pos.y as u32) < tiles.height
    }

    /// Whether the region lies inside the region grid.
    #[must_use]
    pub const fn contains_region(&self, region: RegionCoord) -> bool {
        region.x >= 0
            && region.y >= 0
            && (region.x as u32) < self.max_regions.width
            && (region.y as u32) < self.max_regions.height
    }

    /// Linear slot index of a region (row-major), if in bounds.
    #[must_use]
    pub const fn region_index(&self, region: RegionCoord) -> Option<usize> {
        if !self.contains_region(region) {
            return None;
        }
        Some(region.y as usize * self.max_regions.width as usize + region.x as usize)
    }

    /// Region at a linear slot index.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn region_at(&self, index: usize) -> RegionCoord {
        let width = self.max_regions.width as usize;
        RegionCoord::new((index % width) as i32, (index / width) as i32)
    }

    /// Iterates every region in slot order.
    pub fn regions(&self) -> impl Iterator<Item = RegionCoord> + '_ {
        (0..self.region_count()).map(|i| self.region_at(i))
    }

    /// Region containing a grid position (not bounds checked).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn region_of(&self, pos: GridPos) -> RegionCoord {
        let size = self.region_size_in_tiles();
        RegionCoord::new(
            pos.x.div_euclid(size.width as i32),
            pos.y.div_euclid(size.height as i32),
        )
    }

    /// Chunk containing a grid position (not bounds checked).
    #[must_use]
    pub const fn chunk_of(&self, pos: GridPos) -> ChunkCoord {
        ChunkCoord::new(
            pos.x.div_euclid(self.chunk_size_in_tiles.x as i32),
            pos.y.div_euclid(self.chunk_size_in_tiles.y as i32),
        )
    }

    /// Region containing a chunk.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn region_of_chunk(&self, chunk: ChunkCoord) -> RegionCoord {
        RegionCoord::new(
            chunk.x.div_euclid(self.region_size_in_chunks.width as i32),
            chunk.y.div_euclid(self.region_size_in_chunks.height as i32),
        )
    }

    /// Region-relative offset of a chunk.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn chunk_offset(&self, chunk: ChunkCoord) -> (u16, u16) {
        (
            chunk.x.rem_euclid(self.region_size_in_chunks.width as i32) as u16,
            chunk.y.rem_euclid(self.region_size_in_chunks.height as i32) as u16,
        )
    }

    /// Absolute chunk from a region and a region-relative offset.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn chunk_from_offset(&self, region: RegionCoord, dx: u16, dy: u16) -> ChunkCoord {
        ChunkCoord::new(
            region.x * self.region_size_in_chunks.width as i32 + dx as i32,
            region.y * self.region_size_in_chunks.height as i32 + dy as i32,
        )
    }

    /// First chunk of a region.
    #[must_use]
    pub const fn region_first_chunk(&self, region: RegionCoord) -> ChunkCoord {
        self.chunk_from_offset(region, 0, 0)
    }

    /// Top-left tile of a chunk.
    #[must_use]
    pub const fn chunk_origin(&self, chunk: ChunkCoord) -> GridPos {
        GridPos::new(
            chunk.x * self.chunk_size_in_tiles.x as i32,
            chunk.y * self.chunk_size_in_tiles.y as i32,
        )
    }

    /// Top-left tile of a region.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn region_origin(&self, region: RegionCoord) -> GridPos {
        let size = self.region_size_in_tiles();
        GridPos::new(region.x * size.width as i32, region.y * size.height as i32)
    }

    /// Splits a grid position into region, chunk and chunk-local tile.
    ///
    /// Returns `None` if the position lies outside the world.
    #[must_use]
    pub const fn decompose(&self, pos: GridPos) -> Option<TileAddress> {
        if !self.contains(pos) {
            return None;
        }
        let chunk = self.chunk_of(pos);
        let local = LocalTile::new(
            pos.x.rem_euclid(self.chunk_size_in_tiles.x as i32) as u16,
            pos.y.rem_euclid(self.chunk_size_in_tiles.y as i32) as u16,
        );
        Some(TileAddress {
            region: self.region_of_chunk(chunk),
            chunk,
            local,
        })
    }

    /// Inverse of [`Self::decompose`].
    #[must_use]
    pub const fn compose(&self, address: TileAddress) -> GridPos {
        let origin = self.chunk_origin(address.chunk);
        GridPos::new(
            origin.x + address.local.x as i32,
            origin.y + address.local.y as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_layout_sizes() {
        let layout = WorldLayout::default();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.max_chunks(), Extent::square(128));
        assert_eq!(layout.region_size_in_tiles(), Extent::square(128));
        assert_eq!(layout.world_size_in_tiles(), Extent::square(2048));
        assert_eq!(layout.real_dimensions(), (2048 * 16, 2048 * 16));
        assert_eq!(layout.chunk_size_in_tiles.volume(), 16 * 16 * 5);
    }

    #[test]
    fn test_decompose_examples() {
        let layout = WorldLayout::default();

        let addr = layout.decompose(GridPos::new(0, 0)).expect("in bounds");
        assert_eq!(addr.region, RegionCoord::new(0, 0));
        assert_eq!(addr.chunk, ChunkCoord::new(0, 0));
        assert_eq!(addr.local, LocalTile::new(0, 0));

        let addr = layout.decompose(GridPos::new(130, 17)).expect("in bounds");
        assert_eq!(addr.region, RegionCoord::new(1, 0));
        assert_eq!(addr.chunk, ChunkCoord::new(8, 1));
        assert_eq!(addr.local, LocalTile::new(2, 1));
        assert_eq!(layout.chunk_offset(addr.chunk), (0, 1));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let layout = WorldLayout::default();
        assert!(layout.decompose(GridPos::new(-1, 0)).is_none());
        assert!(layout.decompose(GridPos::new(0, 2048)).is_none());
        assert!(!layout.contains_region(RegionCoord::new(-1, 0)));
        assert!(!layout.contains_region(RegionCoord::new(16, 0)));
        assert_eq!(layout.region_index(RegionCoord::new(16, 0)), None);
    }

    #[test]
    fn test_region_index_round_trip() {
        let layout = WorldLayout::default();
        for (i, region) in layout.regions().enumerate() {
            assert_eq!(layout.region_index(region), Some(i));
        }
    }

    #[test]
    fn test_region_filename() {
        assert_eq!(RegionCoord::new(5, 3).filename(), "r.5.3.region");
    }

    #[test]
    fn test_pixel_to_grid() {
        let pixel = WorldCoord::new(33, 15);
        assert_eq!(pixel.to_grid(16), GridPos::new(2, 0));
        assert_eq!(GridPos::new(2, 0).to_world_coord(16), WorldCoord::new(32, 0));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let mut layout = WorldLayout::default();
        layout.chunk_size_in_tiles.z = 0;
        assert!(matches!(layout.validate(), Err(LayoutError::Empty(_))));
    }

    proptest! {
        #[test]
        fn prop_decompose_compose_bijection(x in 0i32..2048, y in 0i32..2048) {
            let layout = WorldLayout::default();
            let pos = GridPos::new(x, y);
            let addr = layout.decompose(pos).expect("in bounds");
            prop_assert_eq!(layout.region_of_chunk(addr.chunk), addr.region);
            prop_assert_eq!(layout.compose(addr), pos);
        }

        #[test]
        fn prop_chunk_offset_round_trip(cx in 0i32..128, cy in 0i32..128) {
            let layout = WorldLayout::default();
            let chunk = ChunkCoord::new(cx, cy);
            let (dx, dy) = layout.chunk_offset(chunk);
            let region = layout.region_of_chunk(chunk);
            prop_assert_eq!(layout.chunk_from_offset(region, dx, dy), chunk);
        }
    }
}
