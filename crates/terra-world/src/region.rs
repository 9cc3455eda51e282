//! Regions: the unit of persistence and of load/unload.

use terra_common::{ChunkCoord, GridPos, RegionCoord, TileAddress, WorldLayout};

use crate::chunk::Chunk;
use crate::tiles::Tile;

/// A region: a fixed grid of lazily allocated chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    coord: RegionCoord,
    layout: WorldLayout,
    /// Chunk slots indexed by region-relative offset, row-major
    chunks: Vec<Option<Chunk>>,
}

impl Region {
    /// Creates an empty region.
    #[must_use]
    pub fn new(coord: RegionCoord, layout: WorldLayout) -> Self {
        Self {
            coord,
            layout,
            chunks: vec![None; layout.region_size_in_chunks.area()],
        }
    }

    /// Returns the region coordinate.
    #[must_use]
    pub const fn coord(&self) -> RegionCoord {
        self.coord
    }

    /// Returns the world layout.
    #[must_use]
    pub const fn layout(&self) -> &WorldLayout {
        &self.layout
    }

    fn slot(&self, chunk: ChunkCoord) -> Option<usize> {
        if self.layout.region_of_chunk(chunk) != self.coord {
            return None;
        }
        let (dx, dy) = self.layout.chunk_offset(chunk);
        Some(dy as usize * self.layout.region_size_in_chunks.width as usize + dx as usize)
    }

    /// Gets an allocated chunk.
    #[must_use]
    pub fn chunk(&self, chunk: ChunkCoord) -> Option<&Chunk> {
        self.slot(chunk).and_then(|i| self.chunks[i].as_ref())
    }

    /// Gets an allocated chunk mutably.
    pub fn chunk_mut(&mut self, chunk: ChunkCoord) -> Option<&mut Chunk> {
        self.slot(chunk).and_then(|i| self.chunks[i].as_mut())
    }

    /// Gets a chunk, allocating it if its slot is empty.
    ///
    /// Returns `None` if the chunk belongs to another region.
    pub fn chunk_or_insert(&mut self, chunk: ChunkCoord) -> Option<&mut Chunk> {
        let index = self.slot(chunk)?;
        let dims = self.layout.chunk_size_in_tiles;
        Some(self.chunks[index].get_or_insert_with(|| Chunk::new(chunk, dims)))
    }

    /// Iterates allocated chunks.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.chunks.iter().flatten()
    }

    /// Iterates allocated chunks mutably.
    pub fn chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> + '_ {
        self.chunks.iter_mut().flatten()
    }

    /// Gets the tile at an address and layer.
    #[must_use]
    pub fn get_tile(&self, address: TileAddress, z: u16) -> Option<&Tile> {
        self.chunk(address.chunk)?.get(address.local, z)
    }

    /// Places a tile, marking its chunk modified. Returns the replaced tile,
    /// or `Err(tile)` if the address or layer is not part of this region.
    pub fn put_tile(&mut self, address: TileAddress, tile: Tile) -> Result<Option<Tile>, Tile> {
        if tile.z >= self.layout.chunk_size_in_tiles.z {
            return Err(tile);
        }
        match self.chunk_or_insert(address.chunk) {
            Some(chunk) => chunk.put(address.local, tile),
            None => Err(tile),
        }
    }

    /// Places a tile without marking its chunk modified.
    pub(crate) fn place_tile(&mut self, address: TileAddress, tile: Tile) -> bool {
        self.chunk_or_insert(address.chunk)
            .is_some_and(|chunk| chunk.place(address.local, tile))
    }

    /// Removes the tile at an address and layer.
    pub fn remove_tile(&mut self, address: TileAddress, z: u16) -> Option<Tile> {
        self.chunk_mut(address.chunk)?.remove(address.local, z)
    }

    /// Whether any chunk has been modified since the last save.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.chunks().any(Chunk::is_modified)
    }

    /// Whether any chunk must stay loaded.
    #[must_use]
    pub fn keeps_loaded(&self) -> bool {
        self.chunks().any(Chunk::keeps_loaded)
    }

    /// Clears the modified flag on every chunk.
    pub fn mark_clean(&mut self) {
        self.chunks_mut().for_each(Chunk::mark_clean);
    }

    /// Number of allocated chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks().count()
    }

    /// Number of placed tiles.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.chunks().map(Chunk::tile_count).sum()
    }

    /// Top-left tile of the region.
    #[must_use]
    pub const fn origin(&self) -> GridPos {
        self.layout.region_origin(self.coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_common::TileId;

    fn tile_at(layout: &WorldLayout, pos: GridPos, z: u16) -> (TileAddress, Tile) {
        let address = layout.decompose(pos).expect("in bounds");
        (address, Tile::new(TileId::from_tag("terra:stone"), pos, z))
    }

    #[test]
    fn test_chunks_allocated_lazily() {
        let layout = WorldLayout::default();
        let mut region = Region::new(RegionCoord::new(1, 0), layout);
        assert_eq!(region.chunk_count(), 0);

        let (address, tile) = tile_at(&layout, GridPos::new(130, 17), 0);
        assert_eq!(region.put_tile(address, tile), Ok(None));
        assert_eq!(region.chunk_count(), 1);
        assert_eq!(region.get_tile(address, 0), Some(&tile));
        assert!(region.is_modified());
        assert_eq!(region.origin(), GridPos::new(128, 0));
    }

    #[test]
    fn test_foreign_address_rejected() {
        let layout = WorldLayout::default();
        let mut region = Region::new(RegionCoord::new(0, 0), layout);
        let (address, tile) = tile_at(&layout, GridPos::new(130, 17), 0);
        assert!(region.put_tile(address, tile).is_err());
        assert!(region.get_tile(address, 0).is_none());
        assert_eq!(region.chunk_count(), 0);
    }

    #[test]
    fn test_layer_out_of_range_does_not_allocate() {
        let layout = WorldLayout::default();
        let mut region = Region::new(RegionCoord::new(0, 0), layout);
        let (address, tile) = tile_at(&layout, GridPos::new(1, 1), 5);
        assert!(region.put_tile(address, tile).is_err());
        assert_eq!(region.chunk_count(), 0);
    }

    #[test]
    fn test_mark_clean_and_counts() {
        let layout = WorldLayout::default();
        let mut region = Region::new(RegionCoord::new(0, 0), layout);
        for x in 0..20 {
            let (address, tile) = tile_at(&layout, GridPos::new(x, 0), 0);
            assert!(region.place_tile(address, tile));
        }
        assert!(!region.is_modified());
        assert_eq!(region.chunk_count(), 2);
        assert_eq!(region.tile_count(), 20);

        let (address, _) = tile_at(&layout, GridPos::new(0, 0), 0);
        assert!(region.remove_tile(address, 0).is_some());
        assert!(region.is_modified());
        region.mark_clean();
        assert!(!region.is_modified());
    }

    #[test]
    fn test_keeps_loaded() {
        let layout = WorldLayout::default();
        let mut region = Region::new(RegionCoord::new(0, 0), layout);
        assert!(!region.keeps_loaded());
        if let Some(chunk) = region.chunk_or_insert(ChunkCoord::new(3, 3)) {
            chunk.set_keep_loaded(true);
        }
        assert!(region.keeps_loaded());
    }
}
