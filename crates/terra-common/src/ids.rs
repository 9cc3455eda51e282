//! Tile identifiers and colors.

use serde::{Deserialize, Serialize};

/// FNV-1a 32-bit offset basis.
const FNV_OFFSET: u32 = 0x811c_9dc5;

/// FNV-1a 32-bit prime.
const FNV_PRIME: u32 = 0x0100_0193;

/// Numeric tile identifier, derived from the tile tag.
///
/// The id is a 32-bit FNV-1a hash of the tag string, so it is stable across
/// runs and platforms and can be written to region files. Collisions between
/// tags are possible and are not detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(u32);

impl TileId {
    /// Hashes a tag (`domain:name`) into its id.
    #[must_use]
    pub const fn from_tag(tag: &str) -> Self {
        let bytes = tag.as_bytes();
        let mut hash = FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Creates a tile id from a raw value (for deserialization).
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Rgb {
    /// Untinted.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Creates a new color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Creates a color from unit-range channels, clamping out-of-range input.
    #[must_use]
    pub fn from_unit(r: f64, g: f64, b: f64) -> Self {
        let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(channel(r), channel(g), channel(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_id_is_fnv1a() {
        // Reference values for 32-bit FNV-1a.
        assert_eq!(TileId::from_tag("").raw(), 0x811c_9dc5);
        assert_eq!(TileId::from_tag("a").raw(), 0xe40c_292c);
    }

    #[test]
    fn test_tile_id_stable_and_distinct() {
        let grass = TileId::from_tag("terra:grass");
        assert_eq!(grass, TileId::from_tag("terra:grass"));
        assert_ne!(grass, TileId::from_tag("terra:sand"));
        assert_eq!(TileId::from_raw(grass.raw()), grass);
    }

    #[test]
    fn test_rgb_from_unit_clamps() {
        assert_eq!(Rgb::from_unit(1.5, -0.2, 0.5), Rgb::new(255, 0, 128));
    }
}
