//! Region streaming policy.
//!
//! Regions within `load_radius` (Chebyshev distance, in regions) of the
//! player's region are loaded in spiral order from the center outward.
//! Regions beyond `unload_radius` are unloaded. Keeping `unload_radius`
//! above `load_radius` stops a player walking along a region border from
//! loading and unloading the same regions every step.

use terra_common::{RegionCoord, WorldLayout};

/// Default load radius in regions.
pub const DEFAULT_LOAD_RADIUS: u32 = 1;

/// Default unload radius in regions (should be > load radius).
pub const DEFAULT_UNLOAD_RADIUS: u32 = 2;

/// Decides which regions to load and unload around the player.
#[derive(Debug, Clone)]
pub struct RegionStreamer {
    load_radius: u32,
    unload_radius: u32,
    /// Last region the player was in
    last_center: Option<RegionCoord>,
}

impl Default for RegionStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_LOAD_RADIUS, DEFAULT_UNLOAD_RADIUS)
    }
}

impl RegionStreamer {
    /// Creates a streamer. The unload radius is raised to `load_radius + 1`
    /// if it is not larger than the load radius.
    #[must_use]
    pub fn new(load_radius: u32, unload_radius: u32) -> Self {
        Self {
            load_radius,
            unload_radius: unload_radius.max(load_radius + 1),
            last_center: None,
        }
    }

    /// Load radius in regions.
    #[must_use]
    pub const fn load_radius(&self) -> u32 {
        self.load_radius
    }

    /// Unload radius in regions.
    #[must_use]
    pub const fn unload_radius(&self) -> u32 {
        self.unload_radius
    }

    /// Records the player's region. Returns whether it changed.
    pub fn recenter(&mut self, center: RegionCoord) -> bool {
        let changed = self.last_center != Some(center);
        self.last_center = Some(center);
        changed
    }

    /// Last recorded player region.
    #[must_use]
    pub const fn center(&self) -> Option<RegionCoord> {
        self.last_center
    }

    /// In-bounds regions within the load radius, closest first.
    #[must_use]
    pub fn regions_to_load(&self, layout: &WorldLayout, center: RegionCoord) -> Vec<RegionCoord> {
        Self::spiral_regions(center, self.load_radius)
            .into_iter()
            .filter(|region| layout.contains_region(*region))
            .collect()
    }

    /// Whether a loaded region is far enough from the player to unload.
    #[must_use]
    pub const fn should_unload(&self, center: RegionCoord, region: RegionCoord) -> bool {
        center.distance(region) > self.unload_radius
    }

    /// Regions in spiral order from center outward.
    fn spiral_regions(center: RegionCoord, radius: u32) -> Vec<RegionCoord> {
        let mut result = vec![center];

        #[allow(clippy::cast_possible_wrap)]
        for ring in 1..=radius as i32 {
            // Top edge (left to right, excluding right corner)
            for x in -ring..ring {
                result.push(RegionCoord::new(center.x + x, center.y + ring));
            }
            // Right edge (top to bottom, excluding bottom corner)
            for y in (-ring..ring).rev() {
                result.push(RegionCoord::new(center.x + ring, center.y + y));
            }
            // Bottom edge (right to left, excluding left corner)
            for x in (-ring..ring).rev() {
                result.push(RegionCoord::new(center.x + x, center.y - ring));
            }
            // Left edge (bottom to top, excluding top corner)
            for y in -ring..ring {
                result.push(RegionCoord::new(center.x - ring, center.y + y));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spiral_covers_square() {
        let spiral = RegionStreamer::spiral_regions(RegionCoord::new(5, 5), 2);
        assert_eq!(spiral.len(), 25);
        assert_eq!(spiral[0], RegionCoord::new(5, 5));
        let mut unique = spiral.clone();
        unique.sort_by_key(|r| (r.x, r.y));
        unique.dedup();
        assert_eq!(unique.len(), 25);
        // Distances never decrease along the spiral.
        let distances: Vec<u32> = spiral.iter().map(|r| r.distance(RegionCoord::new(5, 5))).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_regions_to_load_clipped_to_world() {
        let streamer = RegionStreamer::default();
        let layout = WorldLayout::default();
        let corner = streamer.regions_to_load(&layout, RegionCoord::new(0, 0));
        assert_eq!(corner.len(), 4);
        assert_eq!(corner[0], RegionCoord::new(0, 0));
        let middle = streamer.regions_to_load(&layout, RegionCoord::new(8, 8));
        assert_eq!(middle.len(), 9);
    }

    #[test]
    fn test_hysteresis() {
        let streamer = RegionStreamer::new(1, 2);
        let center = RegionCoord::new(5, 5);
        assert!(!streamer.should_unload(center, RegionCoord::new(7, 5)));
        assert!(streamer.should_unload(center, RegionCoord::new(8, 5)));

        let clamped = RegionStreamer::new(3, 1);
        assert_eq!(clamped.unload_radius(), 4);
    }

    #[test]
    fn test_recenter() {
        let mut streamer = RegionStreamer::default();
        assert!(streamer.recenter(RegionCoord::new(1, 1)));
        assert!(!streamer.recenter(RegionCoord::new(1, 1)));
        assert!(streamer.recenter(RegionCoord::new(2, 1)));
        assert_eq!(streamer.center(), Some(RegionCoord::new(2, 1)));
    }
}
