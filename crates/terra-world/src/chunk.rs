//! Chunk data structure.

use terra_common::{ChunkCoord, ChunkDims, LocalTile};

use crate::tiles::Tile;

/// Chunk state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkFlags(u8);

impl ChunkFlags {
    /// Diverges from pure procedural generation
    pub const MODIFIED: u8 = 1 << 0;
    /// Must survive automatic unloading
    pub const KEEP_LOADED: u8 = 1 << 1;

    /// Returns whether a flag is set.
    #[must_use]
    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    /// Sets a flag.
    pub fn insert(&mut self, flag: u8) {
        self.0 |= flag;
    }

    /// Clears a flag.
    pub fn remove(&mut self, flag: u8) {
        self.0 &= !flag;
    }
}

/// A chunk of the world: `x * y` columns of `z` optional tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Absolute chunk coordinate
    coord: ChunkCoord,
    /// Tile dimensions
    dims: ChunkDims,
    /// Tile slots indexed `(x * dims.y + y) * dims.z + z`
    tiles: Vec<Option<Tile>>,
    flags: ChunkFlags,
}

impl Chunk {
    /// Creates a new empty chunk.
    #[must_use]
    pub fn new(coord: ChunkCoord, dims: ChunkDims) -> Self {
        Self {
            coord,
            dims,
            tiles: vec![None; dims.volume()],
            flags: ChunkFlags::default(),
        }
    }

    /// Returns the chunk coordinate.
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Returns the tile dimensions.
    #[must_use]
    pub const fn dims(&self) -> ChunkDims {
        self.dims
    }

    /// Returns the chunk flags.
    #[must_use]
    pub const fn flags(&self) -> ChunkFlags {
        self.flags
    }

    /// Returns whether the chunk has been modified since last save.
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.flags.contains(ChunkFlags::MODIFIED)
    }

    /// Marks the chunk as modified.
    pub fn mark_modified(&mut self) {
        self.flags.insert(ChunkFlags::MODIFIED);
    }

    /// Marks the chunk as clean.
    pub fn mark_clean(&mut self) {
        self.flags.remove(ChunkFlags::MODIFIED);
    }

    /// Returns whether the chunk must stay loaded.
    #[must_use]
    pub const fn keeps_loaded(&self) -> bool {
        self.flags.contains(ChunkFlags::KEEP_LOADED)
    }

    /// Sets or clears the keep-loaded flag.
    pub fn set_keep_loaded(&mut self, keep: bool) {
        if keep {
            self.flags.insert(ChunkFlags::KEEP_LOADED);
        } else {
            self.flags.remove(ChunkFlags::KEEP_LOADED);
        }
    }

    fn index(&self, local: LocalTile, z: u16) -> Option<usize> {
        if local.x >= self.dims.x || local.y >= self.dims.y || z >= self.dims.z {
            return None;
        }
        let (x, y, z) = (local.x as usize, local.y as usize, z as usize);
        Some((x * self.dims.y as usize + y) * self.dims.z as usize + z)
    }

    /// Gets the tile at a local position and layer.
    #[must_use]
    pub fn get(&self, local: LocalTile, z: u16) -> Option<&Tile> {
        self.index(local, z)
            .and_then(|index| self.tiles.get(index))
            .and_then(Option::as_ref)
    }

    /// Places a tile, returning the one it replaced.
    ///
    /// Marks the chunk modified. Returns `Err(tile)` if the position or layer
    /// is outside the chunk.
    pub fn put(&mut self, local: LocalTile, tile: Tile) -> Result<Option<Tile>, Tile> {
        let Some(index) = self.index(local, tile.z) else {
            return Err(tile);
        };
        self.flags.insert(ChunkFlags::MODIFIED);
        Ok(self.tiles[index].replace(tile))
    }

    /// Places a tile without marking the chunk modified (generation and
    /// loading).
    pub(crate) fn place(&mut self, local: LocalTile, tile: Tile) -> bool {
        match self.index(local, tile.z) {
            Some(index) => {
                self.tiles[index] = Some(tile);
                true
            },
            None => false,
        }
    }

    /// Removes and returns the tile at a local position and layer.
    ///
    /// Marks the chunk modified if a tile was removed.
    pub fn remove(&mut self, local: LocalTile, z: u16) -> Option<Tile> {
        let index = self.index(local, z)?;
        let removed = self.tiles[index].take();
        if removed.is_some() {
            self.flags.insert(ChunkFlags::MODIFIED);
        }
        removed
    }

    /// Iterates placed tiles as `(local, tile)` in storage order.
    pub fn tiles(&self) -> impl Iterator<Item = (LocalTile, &Tile)> + '_ {
        let column = self.dims.y as usize * self.dims.z as usize;
        let depth = self.dims.z as usize;
        self.tiles.iter().enumerate().filter_map(move |(i, slot)| {
            slot.as_ref().map(|tile| {
                let local = LocalTile::new((i / column) as u16, ((i % column) / depth) as u16);
                (local, tile)
            })
        })
    }

    /// Number of placed tiles.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.iter().filter(|slot| slot.is_some()).count()
    }
}
