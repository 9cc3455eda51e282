//! Tile database and placed tiles.
//!
//! Static per-kind data ([`TileData`]) is registered once in a
//! [`TileDatabase`]; placed tiles ([`Tile`]) only carry the id, position,
//! depth layer and tint.

use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use terra_common::{GridPos, Rgb, TileId};
use tracing::{debug, warn};

/// Built-in tile tags.
pub mod tile_tags {
    /// Fallback returned for unregistered tags and ids
    pub const UNKNOWN: &str = "terra:unknown";
    /// Grass top (tinted per cell)
    pub const GRASS: &str = "terra:grass";
    /// Short grass decoration
    pub const SHORT_GRASS: &str = "terra:short_grass";
    /// Bush decoration, variant 1
    pub const BUSH_1: &str = "terra:bush_1";
    /// Bush decoration, variant 2
    pub const BUSH_2: &str = "terra:bush_2";
    /// Snow-covered grass
    pub const SNOWY_GRASS: &str = "terra:snowy_grass";
    /// Snow overlay decoration
    pub const SNOW_OVERLAY: &str = "terra:snow_overlay";
    /// Sand
    pub const SAND: &str = "terra:sand";
    /// Bare stone
    pub const STONE: &str = "terra:stone";
    /// Water
    pub const WATER: &str = "terra:water";
    /// Dirt
    pub const DIRT: &str = "terra:dirt";
}

/// Id of the grass-top tile. Region files store a color only for this id.
pub const GRASS_TOP_ID: TileId = TileId::from_tag(tile_tags::GRASS);

/// Pixel rectangle of a tile's texture in the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextureRect {
    /// Left edge in pixels
    pub x: u32,
    /// Top edge in pixels
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Static data for one tile kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileData {
    /// Tag (`domain:name`)
    pub tag: String,
    /// Display name
    pub name: String,
    /// Id derived from the tag
    pub id: TileId,
    /// Atlas rectangle
    pub texture_rect: TextureRect,
}

/// Entry of a JSON tile pack.
#[derive(Debug, Clone, Deserialize)]
struct TileEntry {
    tag: String,
    name: String,
    rect_x: u32,
    rect_y: u32,
    size: u32,
}

/// A tile placed in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Tile kind
    pub id: TileId,
    /// Grid position of the column holding this tile
    pub position: GridPos,
    /// Depth layer (0 = base terrain)
    pub z: u16,
    /// Tint color
    pub color: Rgb,
}

impl Tile {
    /// Creates an untinted tile.
    #[must_use]
    pub const fn new(id: TileId, position: GridPos, z: u16) -> Self {
        Self {
            id,
            position,
            z,
            color: Rgb::WHITE,
        }
    }

    /// Sets the tint color.
    #[must_use]
    pub const fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }
}

/// Registry of tile kinds, keyed by tag.
#[derive(Debug, Clone)]
pub struct TileDatabase {
    tiles: AHashMap<String, TileData>,
    unknown: TileData,
}

impl Default for TileDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl TileDatabase {
    /// Creates a database holding only the unknown fallback.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tiles: AHashMap::new(),
            unknown: TileData {
                tag: tile_tags::UNKNOWN.to_string(),
                name: "Unknown".to_string(),
                id: TileId::from_tag(tile_tags::UNKNOWN),
                texture_rect: TextureRect {
                    x: 0,
                    y: 0,
                    width: 16,
                    height: 16,
                },
            },
        }
    }

    /// Creates a database with the built-in tiles registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut db = Self::new();
        let defaults = [
            (tile_tags::GRASS, "Grass", 1, 0),
            (tile_tags::SHORT_GRASS, "Short Grass", 2, 0),
            (tile_tags::BUSH_1, "Bush", 3, 0),
            (tile_tags::BUSH_2, "Bush", 4, 0),
            (tile_tags::SNOWY_GRASS, "Snowy Grass", 5, 0),
            (tile_tags::SNOW_OVERLAY, "Snow", 6, 0),
            (tile_tags::SAND, "Sand", 0, 1),
            (tile_tags::STONE, "Stone", 1, 1),
            (tile_tags::WATER, "Water", 2, 1),
            (tile_tags::DIRT, "Dirt", 3, 1),
        ];
        for (tag, name, rect_x, rect_y) in defaults {
            db.insert(tag, name, rect_x, rect_y, 16);
        }
        db
    }

    /// Registers a tile. The atlas rectangle is `rect_* * size_px`.
    ///
    /// Re-registering a tag replaces its data. Returns `false`, registering
    /// nothing, if the rectangle does not fit in `u32` pixels.
    pub fn insert(
        &mut self,
        tag: &str,
        name: &str,
        rect_x: u32,
        rect_y: u32,
        size_px: u32,
    ) -> bool {
        let Some(texture_rect) = atlas_rect(rect_x, rect_y, size_px) else {
            warn!("Tile {} atlas rectangle overflows", tag);
            return false;
        };
        let data = TileData {
            tag: tag.to_string(),
            name: name.to_string(),
            id: TileId::from_tag(tag),
            texture_rect,
        };
        if self.tiles.insert(tag.to_string(), data).is_some() {
            debug!("Replaced tile {}", tag);
        }
        true
    }

    /// Number of registered tiles (excluding the fallback).
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether no tiles are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Whether a tag is registered.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.tiles.contains_key(tag)
    }

    /// The unknown fallback tile.
    #[must_use]
    pub fn unknown(&self) -> &TileData {
        &self.unknown
    }

    /// Looks up a tile by tag, falling back to the unknown tile.
    #[must_use]
    pub fn get_by_tag(&self, tag: &str) -> &TileData {
        self.tiles.get(tag).unwrap_or_else(|| {
            warn!("Unknown tile tag {}", tag);
            &self.unknown
        })
    }

    /// Looks up a tile by id (linear scan), falling back to the unknown tile.
    #[must_use]
    pub fn get_by_id(&self, id: TileId) -> &TileData {
        self.tiles
            .values()
            .find(|data| data.id == id)
            .unwrap_or_else(|| {
                warn!("Unknown tile id {}", id);
                &self.unknown
            })
    }

    /// Creates a placed tile of the given kind.
    #[must_use]
    pub fn create_tile(&self, tag: &str, position: GridPos, z: u16) -> Tile {
        Tile::new(self.get_by_tag(tag).id, position, z)
    }

    /// Registers every tile in a JSON pack (a list of
    /// `{tag, name, rect_x, rect_y, size}`). Returns the number registered.
    ///
    /// A pack with any entry whose atlas rectangle overflows is rejected
    /// whole.
    pub fn load_json(&mut self, path: &Path) -> std::io::Result<usize> {
        let contents = std::fs::read_to_string(path)?;
        let entries: Vec<TileEntry> = serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(bad) = entries
            .iter()
            .find(|entry| atlas_rect(entry.rect_x, entry.rect_y, entry.size).is_none())
        {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("tile {} atlas rectangle overflows", bad.tag),
            ));
        }
        for entry in &entries {
            self.insert(&entry.tag, &entry.name, entry.rect_x, entry.rect_y, entry.size);
        }
        debug!("Loaded {} tiles from {}", entries.len(), path.display());
        Ok(entries.len())
    }
}

fn atlas_rect(rect_x: u32, rect_y: u32, size_px: u32) -> Option<TextureRect> {
    Some(TextureRect {
        x: rect_x.checked_mul(size_px)?,
        y: rect_y.checked_mul(size_px)?,
        width: size_px,
        height: size_px,
    })
}
