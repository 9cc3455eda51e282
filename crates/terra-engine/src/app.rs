//! Headless play loop.
//!
//! A simulated player walks the world in straight lines, bouncing off the
//! world border, while the map streams regions around it. Tiles are placed
//! along the way so that saves have something to write.

use ahash::AHashSet;
use terra_common::{Extent, GridPos, RegionCoord};
use terra_world::{MapStats, WorldMap};
use tracing::{debug, info};

use crate::config::WalkConfig;

/// Ticks between progress log lines.
const LOG_EVERY: u32 = 200;

/// Simulated player position and heading, in tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct Walker {
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
}

impl Walker {
    /// Creates a walker at `start`, heading east-south-east.
    pub fn new(start: GridPos) -> Self {
        let (dx, dy) = (0.8_f32, 0.6_f32);
        Self {
            x: start.x as f32 + 0.5,
            y: start.y as f32 + 0.5,
            dx,
            dy,
        }
    }

    /// Current grid cell.
    pub fn position(&self) -> GridPos {
        GridPos::new(self.x.floor() as i32, self.y.floor() as i32)
    }

    /// Moves `speed * dt` tiles, reflecting off the edges of `world`.
    pub fn step(&mut self, dt: f32, speed: f32, world: Extent) {
        let width = world.width as f32;
        let height = world.height as f32;
        self.x += self.dx * speed * dt;
        self.y += self.dy * speed * dt;

        if self.x < 0.0 || self.x >= width {
            self.dx = -self.dx;
            self.x = self.x.clamp(0.0, width - 0.001);
        }
        if self.y < 0.0 || self.y >= height {
            self.dy = -self.dy;
            self.y = self.y.clamp(0.0, height - 0.001);
        }
    }
}

/// Summary of a headless session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkReport {
    /// Ticks run
    pub ticks: u32,
    /// Distinct regions the walker entered
    pub regions_visited: usize,
    /// Tiles placed
    pub tiles_placed: u32,
    /// Placements skipped because the region was still streaming in
    pub placements_skipped: u32,
    /// Final walker cell
    pub final_position: GridPos,
    /// Map counters at the end of the walk
    pub stats: MapStats,
}

/// Walks the player from the spawn point for `config.ticks` ticks.
pub fn play(map: &mut WorldMap, config: &WalkConfig) -> WalkReport {
    let world = map.layout().world_size_in_tiles();
    let mut walker = Walker::new(map.spawn_point());
    let mut visited: AHashSet<RegionCoord> = AHashSet::new();
    let mut tiles_placed = 0;
    let mut placements_skipped = 0;

    for tick in 1..=config.ticks {
        walker.step(config.tick_secs, config.speed, world);
        let pos = walker.position();
        map.update(config.tick_secs, pos);
        visited.insert(map.layout().region_of(pos));

        if config.place_every > 0 && tick % config.place_every == 0 {
            let tile = map.tiles().create_tile(&config.place_tag, pos, config.place_layer);
            match map.put_tile(tile) {
                Ok(_) => tiles_placed += 1,
                Err(e) => {
                    debug!("Skipped placement at ({}, {}): {}", pos.x, pos.y, e);
                    placements_skipped += 1;
                },
            }
        }

        if tick % LOG_EVERY == 0 {
            let stats = map.stats();
            info!(
                "Tick {}: player at ({}, {}), {} regions loaded, {} tiles",
                tick, pos.x, pos.y, stats.loaded_regions, stats.tiles
            );
        }
    }

    WalkReport {
        ticks: config.ticks,
        regions_visited: visited.len(),
        tiles_placed,
        placements_skipped,
        final_position: walker.position(),
        stats: map.stats(),
    }
}
