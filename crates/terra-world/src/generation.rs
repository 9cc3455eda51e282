//! Procedural terrain generation.
//!
//! The generator samples height, moisture and heat noise for every world
//! cell, classifies each cell into a biome, and rolls one random value per
//! cell for decorations. These fields are computed per region the first time
//! a region is needed and cached for the generator's lifetime. Construction
//! warms the cache for the regions around the world center, which is the
//! loading-screen phase reported through [`GeneratorStage`].

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use terra_common::{Extent, GridPos, RegionCoord, Rgb, WorldLayout};
use tracing::{debug, info, warn};

use crate::biome::{BiomeCell, BiomeClassifier, BiomeType};
use crate::error::{WorldError, WorldResult};
use crate::noise::{NoiseMap, NoiseMapBuilder, PerlinNoise, Wave};
use crate::progress::ProgressMessage;
use crate::region::Region;
use crate::rng::{mix_seed, WorldRng};
use crate::tiles::{tile_tags, Tile, TileDatabase, GRASS_TOP_ID};

const HEIGHT_SALT: u64 = 1;
const MOISTURE_SALT: u64 = 2;
const HEAT_SALT: u64 = 3;

/// Layer holding decorations.
pub const DECORATION_LAYER: u16 = 1;

const BUSH_2_CHANCE: f32 = 0.001;
const BUSH_1_CHANCE: f32 = 0.002;
const SHORT_GRASS_CHANCE: f32 = 0.005;
const SNOW_OVERLAY_CHANCE: f32 = 0.05;

/// Cell used if the biome catalog is empty.
const UNCLASSIFIED: BiomeCell = BiomeCell {
    kind: BiomeType::Ocean,
    color: Rgb::WHITE,
    base_tile: tile_tags::UNKNOWN,
};

/// Generator construction stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeneratorStage {
    /// Nothing computed
    Uninitialized,
    /// Permutation tables built
    WavesInitialized,
    /// Noise maps of the warm regions computed
    NoiseMapsComputed,
    /// Warm regions classified into biomes
    BiomesClassified,
    /// Decoration rolls computed
    RandomGridComputed,
    /// Ready to generate regions
    Ready,
}

impl GeneratorStage {
    /// Loading-screen text shown while working toward this stage.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Uninitialized => "Waiting...",
            Self::WavesInitialized => "Initializing perlin waves...",
            Self::NoiseMapsComputed => "Generating noise maps...",
            Self::BiomesClassified => "Precomputing biomes...",
            Self::RandomGridComputed => "Generating random grid...",
            Self::Ready => "Done!",
        }
    }
}

/// Noise parameters of the terrain generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Base scale applied to every wave's frequency
    pub scale: f64,
    /// Octaves of the height field
    pub height_waves: Vec<Wave>,
    /// Octaves of the moisture field
    pub moisture_waves: Vec<Wave>,
    /// Octaves of the heat field
    pub heat_waves: Vec<Wave>,
    /// Regions around the world center computed during construction
    pub warm_radius: u32,
    /// Spawn search radius in tiles
    pub spawn_search_radius: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            scale: 0.25,
            height_waves: vec![Wave::new(1.0, 0.05, 56.3), Wave::new(0.5, 0.1, 199.7)],
            moisture_waves: vec![Wave::new(1.0, 0.03, 621.1)],
            heat_waves: vec![Wave::new(1.0, 0.04, 318.6), Wave::new(0.5, 0.08, 329.7)],
            warm_radius: 1,
            spawn_search_radius: 256,
        }
    }
}

/// Cached per-region fields, row-major over the region's tiles.
#[derive(Debug)]
pub struct RegionFields {
    height: NoiseMap,
    moisture: NoiseMap,
    heat: NoiseMap,
    biomes: Vec<BiomeCell>,
    random: Vec<f32>,
}

impl RegionFields {
    fn from_parts(maps: FieldMaps, biomes: Vec<BiomeCell>, random: Vec<f32>) -> Self {
        Self {
            height: maps.height,
            moisture: maps.moisture,
            heat: maps.heat,
            biomes,
            random,
        }
    }

    /// Region extent in tiles.
    #[must_use]
    pub const fn size(&self) -> Extent {
        self.height.size()
    }

    /// Height values.
    #[must_use]
    pub fn height(&self) -> &[f32] {
        self.height.values()
    }

    /// Moisture values.
    #[must_use]
    pub fn moisture(&self) -> &[f32] {
        self.moisture.values()
    }

    /// Heat values.
    #[must_use]
    pub fn heat(&self) -> &[f32] {
        self.heat.values()
    }

    /// Biome classification.
    #[must_use]
    pub fn biomes(&self) -> &[BiomeCell] {
        &self.biomes
    }

    /// Decoration rolls in `[0, 1)`.
    #[must_use]
    pub fn random(&self) -> &[f32] {
        &self.random
    }
}

struct FieldMaps {
    height: NoiseMap,
    moisture: NoiseMap,
    heat: NoiseMap,
}

/// Seed-driven terrain generator.
pub struct TerrainGenerator {
    seed: u64,
    layout: WorldLayout,
    settings: GeneratorSettings,
    height_noise: PerlinNoise,
    moisture_noise: PerlinNoise,
    heat_noise: PerlinNoise,
    classifier: BiomeClassifier,
    tiles: Arc<TileDatabase>,
    /// Workers for noise maps; `None` builds on the calling thread
    pool: Option<ThreadPool>,
    fields: Mutex<AHashMap<RegionCoord, Arc<RegionFields>>>,
    stage: GeneratorStage,
}

impl TerrainGenerator {
    /// Builds a generator and warms the field cache around the world center.
    ///
    /// `threads` sizes the noise-map pool (0 = all cores, 1 = no pool).
    /// Each stage's text is published to `progress` before the stage runs.
    pub fn new(
        seed: u64,
        layout: WorldLayout,
        settings: GeneratorSettings,
        tiles: Arc<TileDatabase>,
        threads: usize,
        progress: &ProgressMessage,
    ) -> WorldResult<Self> {
        layout.validate()?;

        progress.set(GeneratorStage::WavesInitialized.message());
        let mut generator = Self {
            seed,
            layout,
            settings,
            height_noise: PerlinNoise::new(mix_seed(seed, HEIGHT_SALT)),
            moisture_noise: PerlinNoise::new(mix_seed(seed, MOISTURE_SALT)),
            heat_noise: PerlinNoise::new(mix_seed(seed, HEAT_SALT)),
            classifier: BiomeClassifier::default(),
            tiles,
            pool: build_pool(threads),
            fields: Mutex::new(AHashMap::new()),
            stage: GeneratorStage::WavesInitialized,
        };
        generator.warm_up(progress);

        info!(
            "Terrain generator ready (seed {}, {} regions precomputed)",
            seed,
            generator.cached_regions()
        );
        Ok(generator)
    }

    fn advance(&mut self, stage: GeneratorStage, progress: &ProgressMessage) {
        debug!("Generator stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
        progress.set(stage.message());
    }

    fn warm_up(&mut self, progress: &ProgressMessage) {
        let center = self.layout.region_of(self.layout.center());
        let regions = self.regions_around(center, self.settings.warm_radius);

        self.advance(GeneratorStage::NoiseMapsComputed, progress);
        let maps: Vec<FieldMaps> = regions.iter().map(|&r| self.noise_maps(r)).collect();

        self.advance(GeneratorStage::BiomesClassified, progress);
        let biomes: Vec<Vec<BiomeCell>> = maps.iter().map(|m| self.classify(m)).collect();

        self.advance(GeneratorStage::RandomGridComputed, progress);
        let randoms: Vec<Vec<f32>> = regions.iter().map(|&r| self.random_grid(r)).collect();

        let cache = self.fields.get_mut();
        for (((region, maps), biomes), random) in regions.into_iter().zip(maps).zip(biomes).zip(randoms)
        {
            cache.insert(region, Arc::new(RegionFields::from_parts(maps, biomes, random)));
        }

        self.advance(GeneratorStage::Ready, progress);
    }

    #[allow(clippy::cast_possible_wrap)]
    fn regions_around(&self, center: RegionCoord, radius: u32) -> Vec<RegionCoord> {
        let r = radius as i32;
        let mut regions = Vec::new();
        for y in (center.y - r)..=(center.y + r) {
            for x in (center.x - r)..=(center.x + r) {
                let region = RegionCoord::new(x, y);
                if self.layout.contains_region(region) {
                    regions.push(region);
                }
            }
        }
        regions
    }

    fn noise_maps(&self, region: RegionCoord) -> FieldMaps {
        let size = self.layout.region_size_in_tiles();
        let origin = self.layout.region_origin(region);
        let build = |noise: &PerlinNoise, waves: &[Wave]| {
            let builder = NoiseMapBuilder::new(noise, waves, size, origin, self.settings.scale);
            match &self.pool {
                Some(pool) => builder.build_in(pool),
                None => builder.build(),
            }
        };
        FieldMaps {
            height: build(&self.height_noise, &self.settings.height_waves),
            moisture: build(&self.moisture_noise, &self.settings.moisture_waves),
            heat: build(&self.heat_noise, &self.settings.heat_waves),
        }
    }

    fn classify(&self, maps: &FieldMaps) -> Vec<BiomeCell> {
        maps.height
            .values()
            .iter()
            .zip(maps.moisture.values())
            .zip(maps.heat.values())
            .map(|((&h, &m), &t)| self.classifier.classify(h, m, t).unwrap_or(UNCLASSIFIED))
            .collect()
    }

    fn random_grid(&self, region: RegionCoord) -> Vec<f32> {
        let mut rng = WorldRng::for_region(self.seed, region);
        (0..self.layout.region_size_in_tiles().area())
            .map(|_| rng.next_f32())
            .collect()
    }

    /// Fields of a region, computing and caching them on first use.
    ///
    /// Returns `None` for regions outside the world.
    pub fn fields(&self, region: RegionCoord) -> Option<Arc<RegionFields>> {
        if !self.layout.contains_region(region) {
            return None;
        }
        if let Some(fields) = self.fields.lock().get(&region) {
            return Some(Arc::clone(fields));
        }

        let maps = self.noise_maps(region);
        let biomes = self.classify(&maps);
        let random = self.random_grid(region);
        let computed = Arc::new(RegionFields::from_parts(maps, biomes, random));
        debug!("Computed fields for region {}", region);

        let mut cache = self.fields.lock();
        Some(Arc::clone(cache.entry(region).or_insert(computed)))
    }

    fn cell<T>(&self, pos: GridPos, read: impl FnOnce(&RegionFields, usize) -> T) -> Option<T> {
        if !self.layout.contains(pos) {
            return None;
        }
        let region = self.layout.region_of(pos);
        let fields = self.fields(region)?;
        let origin = self.layout.region_origin(region);
        let width = self.layout.region_size_in_tiles().width as usize;
        let index = (pos.y - origin.y) as usize * width + (pos.x - origin.x) as usize;
        Some(read(&fields, index))
    }

    /// Biome at a grid position.
    #[must_use]
    pub fn biome_at(&self, pos: GridPos) -> Option<BiomeType> {
        self.cell(pos, |f, i| f.biomes[i].kind)
    }

    /// Full biome classification at a grid position.
    #[must_use]
    pub fn biome_cell_at(&self, pos: GridPos) -> Option<BiomeCell> {
        self.cell(pos, |f, i| f.biomes[i])
    }

    /// Height at a grid position.
    #[must_use]
    pub fn height_at(&self, pos: GridPos) -> Option<f32> {
        self.cell(pos, |f, i| f.height.values()[i])
    }

    /// Moisture at a grid position.
    #[must_use]
    pub fn moisture_at(&self, pos: GridPos) -> Option<f32> {
        self.cell(pos, |f, i| f.moisture.values()[i])
    }

    /// Heat at a grid position.
    #[must_use]
    pub fn heat_at(&self, pos: GridPos) -> Option<f32> {
        self.cell(pos, |f, i| f.heat.values()[i])
    }

    /// Generates a region's base terrain and decorations.
    ///
    /// Every cell gets a layer-0 tile from its biome. Grass tops keep the
    /// biome tint and may get a bush or short grass on the decoration layer;
    /// snowy grass may get a snow overlay. The returned region is clean.
    #[allow(clippy::cast_possible_wrap)]
    pub fn generate_region(&self, region: RegionCoord) -> WorldResult<Region> {
        let Some(fields) = self.fields(region) else {
            warn!("Refusing to generate region {} outside the world", region);
            return Err(WorldError::RegionOutOfBounds(region));
        };

        let mut out = Region::new(region, self.layout);
        let origin = self.layout.region_origin(region);
        let size = self.layout.region_size_in_tiles();

        for row in 0..size.height {
            for col in 0..size.width {
                let index = row as usize * size.width as usize + col as usize;
                let pos = GridPos::new(origin.x + col as i32, origin.y + row as i32);
                let Some(address) = self.layout.decompose(pos) else {
                    continue;
                };

                let cell = &fields.biomes[index];
                let base = self.tiles.get_by_tag(cell.base_tile);
                let color = if base.id == GRASS_TOP_ID {
                    cell.color
                } else {
                    Rgb::WHITE
                };
                out.place_tile(address, Tile::new(base.id, pos, 0).with_color(color));

                if let Some(tag) = decoration(cell.base_tile, fields.random[index]) {
                    let tile = self.tiles.create_tile(tag, pos, DECORATION_LAYER);
                    out.place_tile(address, tile);
                }
            }
        }

        debug!("Generated region {} ({} tiles)", region, out.tile_count());
        Ok(out)
    }

    /// Nearest land cell to the world center whose biome allows spawning.
    ///
    /// Searches rings of growing radius; falls back to the center.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn find_spawn_point(&self) -> GridPos {
        let center = self.layout.center();
        for radius in 0..=self.settings.spawn_search_radius as i32 {
            for pos in ring(center, radius) {
                if self.biome_at(pos).is_some_and(BiomeType::is_spawnable) {
                    return pos;
                }
            }
        }
        warn!("No spawnable biome near the world center, spawning at {:?}", center);
        center
    }

    /// World seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// World layout.
    #[must_use]
    pub const fn layout(&self) -> &WorldLayout {
        &self.layout
    }

    /// Noise settings.
    #[must_use]
    pub const fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Current construction stage.
    #[must_use]
    pub const fn stage(&self) -> GeneratorStage {
        self.stage
    }

    /// Tile database used for base and decoration tiles.
    #[must_use]
    pub fn tiles(&self) -> &Arc<TileDatabase> {
        &self.tiles
    }

    /// Number of regions with cached fields.
    #[must_use]
    pub fn cached_regions(&self) -> usize {
        self.fields.lock().len()
    }
}

fn build_pool(threads: usize) -> Option<ThreadPool> {
    if threads == 1 {
        return None;
    }
    match ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("terra-noise-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!("Failed to build noise thread pool, using one thread: {}", e);
            None
        },
    }
}

/// Decoration for a base tile and its roll. First match wins.
fn decoration(base_tile: &str, roll: f32) -> Option<&'static str> {
    match base_tile {
        tile_tags::GRASS => {
            if roll < BUSH_2_CHANCE {
                Some(tile_tags::BUSH_2)
            } else if roll < BUSH_1_CHANCE {
                Some(tile_tags::BUSH_1)
            } else if roll < SHORT_GRASS_CHANCE {
                Some(tile_tags::SHORT_GRASS)
            } else {
                None
            }
        },
        tile_tags::SNOWY_GRASS if roll < SNOW_OVERLAY_CHANCE => Some(tile_tags::SNOW_OVERLAY),
        _ => None,
    }
}

/// Cells at Chebyshev distance `radius` from `center`.
fn ring(center: GridPos, radius: i32) -> Vec<GridPos> {
    if radius == 0 {
        return vec![center];
    }
    let mut cells = Vec::with_capacity(8 * radius.unsigned_abs() as usize);
    for dx in -radius..=radius {
        cells.push(GridPos::new(center.x + dx, center.y - radius));
        cells.push(GridPos::new(center.x + dx, center.y + radius));
    }
    for dy in (-radius + 1)..radius {
        cells.push(GridPos::new(center.x - radius, center.y + dy));
        cells.push(GridPos::new(center.x + radius, center.y + dy));
    }
    cells
}
