//! The world map: region lifecycle, persistence and tile access.
//!
//! A [`WorldMap`] owns a fixed grid of region slots. Each slot moves through
//! `Unloaded -> Loading -> Loaded -> Unloading -> Unloaded`. A single
//! background worker builds the terrain generator, loads the spawn area and
//! then serves load, unload and autosave jobs in submission order, so the
//! caller's update loop never blocks on disk or generation.
//!
//! All structural changes to the slot grid happen under one mutex. Region
//! files are read and written outside of it: loads fill a detached
//! [`Region`] before inserting it, unloads take the region out of its slot
//! first, and saves encode under the lock but write afterwards.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use terra_common::{ChunkCoord, GridPos, RegionCoord, TileAddress, WorldLayout};
use tracing::{debug, error, info, warn};

use crate::biome::{BiomeCell, BiomeType};
use crate::chunk::Chunk;
use crate::config::WorldConfig;
use crate::error::{WorldError, WorldResult};
use crate::generation::{GeneratorSettings, GeneratorStage, TerrainGenerator};
use crate::metadata::{DataPacks, Difficulty, WorldMetadata, METADATA_FILE, REGIONS_DIR};
use crate::progress::ProgressMessage;
use crate::region::Region;
use crate::region_file;
use crate::streaming::RegionStreamer;
use crate::tiles::{Tile, TileDatabase};

/// In-game day length in seconds.
pub const DAY_LENGTH_SECS: f64 = 1200.0;

const SPAWN_AREA_MESSAGE: &str = "Loading spawn area...";
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Observable state of a region slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionState {
    /// Not in memory
    Unloaded,
    /// Queued or being read/generated
    Loading,
    /// In memory
    Loaded,
    /// Queued or being written before release
    Unloading,
    /// Last load failed with an I/O error; only an explicit load retries
    Failed,
}

enum RegionSlot {
    Unloaded,
    Loading,
    Loaded(Region),
    Unloading,
    Failed,
}

impl RegionSlot {
    const fn state(&self) -> RegionState {
        match self {
            Self::Unloaded => RegionState::Unloaded,
            Self::Loading => RegionState::Loading,
            Self::Loaded(_) => RegionState::Loaded,
            Self::Unloading => RegionState::Unloading,
            Self::Failed => RegionState::Failed,
        }
    }
}

/// Loaded-world counters for debug overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapStats {
    /// Regions in memory
    pub loaded_regions: usize,
    /// Allocated chunks
    pub chunks: usize,
    /// Placed tiles
    pub tiles: usize,
    /// Regions with unsaved changes
    pub modified_regions: usize,
}

struct InitJob {
    seed: u64,
    settings: GeneratorSettings,
    threads: usize,
    streamer: RegionStreamer,
    is_new: bool,
}

enum Job {
    Initialize(InitJob),
    Load(RegionCoord),
    Unload(Region),
    SaveAll,
    Shutdown,
}

/// State shared with the worker thread.
struct Shared {
    layout: WorldLayout,
    world_dir: PathBuf,
    regions_dir: PathBuf,
    slots: Mutex<Vec<RegionSlot>>,
    /// One per region, held from encode until the file is in place
    write_locks: Vec<Mutex<()>>,
    generator: OnceLock<TerrainGenerator>,
    tiles: Arc<TileDatabase>,
    metadata: Mutex<WorldMetadata>,
    progress: ProgressMessage,
    ready: AtomicBool,
    failed: AtomicBool,
}

impl Shared {
    fn index(&self, region: RegionCoord) -> WorldResult<usize> {
        self.layout.region_index(region).ok_or_else(|| {
            warn!("Region {} is outside the world", region);
            WorldError::RegionOutOfBounds(region)
        })
    }

    fn initialize(&self, init: InitJob) -> WorldResult<()> {
        let generator = TerrainGenerator::new(
            init.seed,
            self.layout,
            init.settings,
            Arc::clone(&self.tiles),
            init.threads,
            &self.progress,
        )?;

        let spawn = if init.is_new {
            let spawn = generator.find_spawn_point();
            self.metadata.lock().set_spawn_point(spawn);
            spawn
        } else {
            self.metadata.lock().spawn_point()
        };
        if self.generator.set(generator).is_err() {
            warn!("Terrain generator was already initialized");
        }

        self.progress.set(SPAWN_AREA_MESSAGE);
        let center = self.layout.region_of(spawn);
        for region in init.streamer.regions_to_load(&self.layout, center) {
            if let Err(e) = self.load_region(region) {
                if region == center {
                    return Err(e);
                }
                warn!("Continuing without region {}: {}", region, e);
            }
        }
        if init.is_new {
            self.save_metadata()?;
        }

        self.ready.store(true, Ordering::Release);
        self.progress.set(GeneratorStage::Ready.message());
        info!("World ready, spawn at ({}, {})", spawn.x, spawn.y);
        Ok(())
    }

    /// Reads a region from disk, or generates it if it was never saved or
    /// its file is malformed.
    fn read_region(&self, region: RegionCoord) -> WorldResult<Region> {
        let generator = self.generator.get().ok_or(WorldError::Initializing)?;
        match region_file::load_region_file(&self.regions_dir, region, self.layout) {
            Ok(Some(loaded)) => {
                debug!("Loaded region {} from disk", region);
                Ok(loaded)
            },
            Ok(None) => generator.generate_region(region),
            Err(e) if e.is_corruption() => {
                warn!("Region {} file is corrupt ({}), regenerating", region, e);
                if let Err(e) = region_file::quarantine_region_file(&self.regions_dir, region) {
                    warn!("Could not move corrupt region {} aside: {}", region, e);
                }
                generator.generate_region(region)
            },
            Err(source) => Err(WorldError::RegionFile { region, source }),
        }
    }

    fn load_region(&self, region: RegionCoord) -> WorldResult<()> {
        let index = self.index(region)?;
        if self.generator.get().is_none() {
            return Err(WorldError::Initializing);
        }
        {
            let mut slots = self.slots.lock();
            match slots[index].state() {
                RegionState::Loaded => return Ok(()),
                RegionState::Loading | RegionState::Unloading => {
                    return Err(WorldError::RegionBusy(region));
                },
                RegionState::Unloaded | RegionState::Failed => slots[index] = RegionSlot::Loading,
            }
        }
        self.finish_load(region, index)
    }

    /// Completes a load for a slot already marked `Loading`.
    fn finish_load(&self, region: RegionCoord, index: usize) -> WorldResult<()> {
        match self.read_region(region) {
            Ok(loaded) => {
                self.slots.lock()[index] = RegionSlot::Loaded(loaded);
                debug!("Region {} loaded", region);
                Ok(())
            },
            Err(e) => {
                self.slots.lock()[index] = RegionSlot::Failed;
                error!("Failed to load region {}: {}", region, e);
                Err(e)
            },
        }
    }

    /// Saves (if modified) and releases a region already taken out of its
    /// slot. On a failed save the region goes back into its slot.
    fn finish_unload(&self, region: Region) -> WorldResult<()> {
        let coord = region.coord();
        let index = self.index(coord)?;
        let _write = self.write_locks[index].lock();
        if region.is_modified() {
            if let Err(source) = region_file::save_region_file(&self.regions_dir, &region) {
                error!("Failed to save region {} on unload: {}", coord, source);
                self.slots.lock()[index] = RegionSlot::Loaded(region);
                return Err(WorldError::RegionFile {
                    region: coord,
                    source,
                });
            }
        }
        self.slots.lock()[index] = RegionSlot::Unloaded;
        debug!("Region {} unloaded", coord);
        Ok(())
    }

    fn unload_region(&self, region: RegionCoord) -> WorldResult<()> {
        let index = self.index(region)?;
        let taken = {
            let mut slots = self.slots.lock();
            match slots[index].state() {
                RegionState::Unloaded | RegionState::Failed => return Ok(()),
                RegionState::Loading | RegionState::Unloading => {
                    return Err(WorldError::RegionBusy(region));
                },
                RegionState::Loaded => std::mem::replace(&mut slots[index], RegionSlot::Unloading),
            }
        };
        match taken {
            RegionSlot::Loaded(loaded) => self.finish_unload(loaded),
            _ => Ok(()),
        }
    }

    /// Writes one loaded region. Returns `Ok(false)` if `only_modified` is
    /// set and the region has no changes.
    ///
    /// Writers of the same region are serialized, so a file on disk is never
    /// older than the last snapshot marked clean.
    fn save_region(&self, region: RegionCoord, only_modified: bool) -> WorldResult<bool> {
        let index = self.index(region)?;
        let _write = self.write_locks[index].lock();
        let (bytes, dirty) = {
            let mut slots = self.slots.lock();
            let RegionSlot::Loaded(loaded) = &mut slots[index] else {
                return Err(WorldError::NotReady(region));
            };
            if only_modified && !loaded.is_modified() {
                return Ok(false);
            }
            let bytes = region_file::encode_region(loaded)
                .map_err(|source| WorldError::RegionFile { region, source })?;
            let dirty: Vec<ChunkCoord> = loaded
                .chunks()
                .filter(|chunk| chunk.is_modified())
                .map(Chunk::coord)
                .collect();
            loaded.mark_clean();
            (bytes, dirty)
        };

        if let Err(source) = region_file::write_region_file(&self.regions_dir, region, &bytes) {
            error!("Failed to save region {}: {}", region, source);
            if let RegionSlot::Loaded(loaded) = &mut self.slots.lock()[index] {
                for coord in dirty {
                    if let Some(chunk) = loaded.chunk_mut(coord) {
                        chunk.mark_modified();
                    }
                }
            }
            return Err(WorldError::RegionFile { region, source });
        }
        debug!("Region {} saved", region);
        Ok(true)
    }

    /// Saves every modified region and the metadata. Keeps going past
    /// failed regions and reports the first failure.
    fn save_all(&self) -> WorldResult<usize> {
        let modified: Vec<RegionCoord> = {
            let slots = self.slots.lock();
            slots
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| match slot {
                    RegionSlot::Loaded(region) if region.is_modified() => {
                        Some(self.layout.region_at(i))
                    },
                    _ => None,
                })
                .collect()
        };

        let mut saved = 0;
        let mut first_error = None;
        for region in modified {
            match self.save_region(region, true) {
                Ok(true) => saved += 1,
                Ok(false) => {},
                Err(e) => {
                    first_error.get_or_insert(e);
                },
            }
        }
        if let Err(e) = self.save_metadata() {
            error!("Failed to save world metadata: {}", e);
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Saved world ({} regions written)", saved);
                Ok(saved)
            },
        }
    }

    fn save_metadata(&self) -> WorldResult<()> {
        let mut metadata = self.metadata.lock().clone();
        metadata.touch();
        metadata.save(&self.world_dir)?;
        self.metadata.lock().last_played = metadata.last_played;
        Ok(())
    }

    fn with_loaded<T>(
        &self,
        pos: GridPos,
        f: impl FnOnce(&mut Region, TileAddress) -> WorldResult<T>,
    ) -> WorldResult<T> {
        let Some(address) = self.layout.decompose(pos) else {
            warn!("Position ({}, {}) is outside the world", pos.x, pos.y);
            return Err(WorldError::PositionOutOfBounds(pos));
        };
        let index = self.index(address.region)?;
        let mut slots = self.slots.lock();
        match &mut slots[index] {
            RegionSlot::Loaded(region) => f(region, address),
            RegionSlot::Loading | RegionSlot::Unloading => {
                Err(WorldError::RegionBusy(address.region))
            },
            RegionSlot::Unloaded | RegionSlot::Failed => Err(WorldError::NotReady(address.region)),
        }
    }
}

fn run_worker(shared: &Shared, jobs: &Receiver<Job>) {
    for job in jobs {
        match job {
            Job::Initialize(init) => {
                if let Err(e) = shared.initialize(init) {
                    error!("World initialization failed: {}", e);
                    shared.progress.set(&format!("Failed: {e}"));
                    shared.failed.store(true, Ordering::Release);
                }
            },
            Job::Load(region) => {
                if let Ok(index) = shared.index(region) {
                    // Errors are logged by finish_load.
                    let _ = shared.finish_load(region, index);
                }
            },
            Job::Unload(region) => {
                let _ = shared.finish_unload(region);
            },
            Job::SaveAll => {
                if let Err(e) = shared.save_all() {
                    error!("Autosave failed: {}", e);
                }
            },
            Job::Shutdown => break,
        }
    }
    debug!("World worker stopped");
}

/// Validates a world name for use as a folder name.
fn check_world_name(name: &str) -> WorldResult<()> {
    let invalid = name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', ':'])
        || name.len() > 64;
    if invalid {
        return Err(WorldError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// A loaded world.
pub struct WorldMap {
    shared: Arc<Shared>,
    jobs: Sender<Job>,
    worker: Option<JoinHandle<()>>,
    streamer: RegionStreamer,
    autosave_interval: f32,
    autosave_timer: f32,
}

impl WorldMap {
    /// Creates a new world in `<saves_dir>/<name>`.
    ///
    /// Generation runs in the background; poll [`Self::is_ready`].
    pub fn create(
        config: WorldConfig,
        name: &str,
        seed: u64,
        difficulty: Difficulty,
    ) -> WorldResult<Self> {
        check_world_name(name)?;
        let world_dir = config.saves_dir.join(name);
        if world_dir.join(METADATA_FILE).exists() {
            return Err(WorldError::AlreadyExists(world_dir));
        }
        info!("Creating world {} (seed {})", name, seed);
        let metadata = WorldMetadata::new(name, seed, difficulty);
        Self::start(config, world_dir, metadata, true)
    }

    /// Opens the world in `<saves_dir>/<name>`.
    pub fn open(config: WorldConfig, name: &str) -> WorldResult<Self> {
        check_world_name(name)?;
        let world_dir = config.saves_dir.join(name);
        let metadata = WorldMetadata::load(&world_dir)?;
        info!("Opening world {} (seed {})", metadata.name, metadata.seed);
        Self::start(config, world_dir, metadata, false)
    }

    fn start(
        mut config: WorldConfig,
        world_dir: PathBuf,
        metadata: WorldMetadata,
        is_new: bool,
    ) -> WorldResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(world_dir.join(REGIONS_DIR))?;

        let mut tiles = TileDatabase::with_defaults();
        for pack in &metadata.data_packs.enabled {
            let Some(path) = DataPacks::resolve(&world_dir, pack) else {
                continue;
            };
            match tiles.load_json(&path) {
                Ok(count) => info!("Loaded data pack {} ({} tiles)", pack, count),
                Err(e) => warn!("Skipping data pack {}: {}", pack, e),
            }
        }

        let layout = config.layout;
        let seed = metadata.seed;
        let shared = Arc::new(Shared {
            layout,
            regions_dir: world_dir.join(REGIONS_DIR),
            world_dir,
            slots: Mutex::new((0..layout.region_count()).map(|_| RegionSlot::Unloaded).collect()),
            write_locks: (0..layout.region_count()).map(|_| Mutex::new(())).collect(),
            generator: OnceLock::new(),
            tiles: Arc::new(tiles),
            metadata: Mutex::new(metadata),
            progress: ProgressMessage::new(GeneratorStage::Uninitialized.message()),
            ready: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        });

        let (jobs, receiver) = crossbeam_channel::unbounded();
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("terra-world".to_string())
            .spawn(move || run_worker(&worker_shared, &receiver))?;

        let streamer = RegionStreamer::new(config.load_radius, config.unload_radius);
        let init = InitJob {
            seed,
            settings: config.generator,
            threads: config.noise_threads,
            streamer: streamer.clone(),
            is_new,
        };
        jobs.send(Job::Initialize(init))
            .map_err(|_| WorldError::WorkerGone)?;

        Ok(Self {
            shared,
            jobs,
            worker: Some(worker),
            streamer,
            autosave_interval: config.autosave_interval_secs,
            autosave_timer: 0.0,
        })
    }

    /// Advances the world by `dt` seconds with the player at `player`.
    ///
    /// Queues loads of unloaded regions within the load radius, unloads of
    /// loaded regions beyond the unload radius (unless a chunk keeps them
    /// loaded), and periodic autosaves. Does nothing until the world is ready.
    pub fn update(&mut self, dt: f32, player: GridPos) {
        if !self.is_ready() {
            return;
        }
        {
            let mut metadata = self.shared.metadata.lock();
            metadata.time_played += f64::from(dt) / 3600.0;
            metadata.day_time = (metadata.day_time + f64::from(dt)) % DAY_LENGTH_SECS;
        }

        let layout = self.shared.layout;
        let center = layout.region_of(player);
        if self.streamer.recenter(center) {
            debug!("Player entered region {}", center);
        }

        let mut jobs = Vec::new();
        {
            let mut slots = self.shared.slots.lock();
            for region in self.streamer.regions_to_load(&layout, center) {
                if let Some(index) = layout.region_index(region) {
                    if matches!(slots[index], RegionSlot::Unloaded) {
                        slots[index] = RegionSlot::Loading;
                        jobs.push(Job::Load(region));
                    }
                }
            }
            for (index, slot) in slots.iter_mut().enumerate() {
                let evict = match slot {
                    RegionSlot::Loaded(region) => {
                        self.streamer.should_unload(center, layout.region_at(index))
                            && !region.keeps_loaded()
                    },
                    _ => false,
                };
                if evict {
                    if let RegionSlot::Loaded(region) =
                        std::mem::replace(slot, RegionSlot::Unloading)
                    {
                        jobs.push(Job::Unload(region));
                    }
                }
            }
        }

        if self.autosave_interval > 0.0 {
            self.autosave_timer += dt;
            if self.autosave_timer >= self.autosave_interval {
                self.autosave_timer = 0.0;
                jobs.push(Job::SaveAll);
            }
        }

        for job in jobs {
            if let Err(crossbeam_channel::SendError(job)) = self.jobs.send(job) {
                error!("World worker is not running");
                self.restore(job);
            }
        }
    }

    /// Puts back slot state for a job the worker never received.
    fn restore(&self, job: Job) {
        let mut slots = self.shared.slots.lock();
        match job {
            Job::Load(region) => {
                if let Some(index) = self.shared.layout.region_index(region) {
                    slots[index] = RegionSlot::Unloaded;
                }
            },
            Job::Unload(region) => {
                if let Some(index) = self.shared.layout.region_index(region.coord()) {
                    slots[index] = RegionSlot::Loaded(region);
                }
            },
            Job::Initialize(_) | Job::SaveAll | Job::Shutdown => {},
        }
    }

    /// Loads a region on the calling thread, from disk or by generation.
    ///
    /// A missing or malformed file regenerates the region. I/O errors are
    /// returned and leave the region `Failed`.
    pub fn load_region(&self, region: RegionCoord) -> WorldResult<()> {
        self.shared.load_region(region)
    }

    /// Writes a loaded region to disk, modified or not.
    pub fn save_region(&self, region: RegionCoord) -> WorldResult<()> {
        self.shared.save_region(region, false).map(|_| ())
    }

    /// Saves the region if modified, then releases it.
    pub fn unload_region(&self, region: RegionCoord) -> WorldResult<()> {
        self.shared.unload_region(region)
    }

    /// Saves every modified region and the metadata on the calling thread.
    /// Returns the number of regions written.
    pub fn save(&self) -> WorldResult<usize> {
        self.shared.save_all()
    }

    /// Tile at a grid position and layer, if its region is loaded.
    #[must_use]
    pub fn get_tile(&self, pos: GridPos, z: u16) -> Option<Tile> {
        let address = self.shared.layout.decompose(pos)?;
        let index = self.shared.layout.region_index(address.region)?;
        match &self.shared.slots.lock()[index] {
            RegionSlot::Loaded(region) => region.get_tile(address, z).copied(),
            _ => None,
        }
    }

    /// Places a tile at its own position and layer, marking the chunk
    /// modified. Returns the replaced tile.
    pub fn put_tile(&self, tile: Tile) -> WorldResult<Option<Tile>> {
        self.shared.with_loaded(tile.position, |region, address| {
            region
                .put_tile(address, tile)
                .map_err(|rejected| WorldError::LayerOutOfRange(rejected.z))
        })
    }

    /// Removes the tile at a grid position and layer, marking the chunk
    /// modified if one was removed.
    pub fn remove_tile(&self, pos: GridPos, z: u16) -> WorldResult<Option<Tile>> {
        self.shared
            .with_loaded(pos, |region, address| Ok(region.remove_tile(address, z)))
    }

    /// Sets or clears the keep-loaded flag of the chunk containing `pos`.
    pub fn set_keep_loaded(&self, pos: GridPos, keep: bool) -> WorldResult<()> {
        self.shared.with_loaded(pos, |region, address| {
            if let Some(chunk) = region.chunk_or_insert(address.chunk) {
                chunk.set_keep_loaded(keep);
            }
            Ok(())
        })
    }

    /// Whether the generator is built and the spawn area is loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    /// Whether background initialization failed.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.shared.failed.load(Ordering::Acquire)
    }

    /// Current progress text.
    #[must_use]
    pub fn message(&self) -> String {
        self.shared.progress.get()
    }

    /// Shared progress handle for a loading screen.
    #[must_use]
    pub fn progress(&self) -> ProgressMessage {
        self.shared.progress.clone()
    }

    /// Blocks until the world is ready, initialization fails, or `timeout`
    /// passes. Returns whether the world is ready.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.is_ready() {
                return true;
            }
            if self.has_failed() || start.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Blocks until no region is loading or unloading, or `timeout` passes.
    /// Returns whether the map went idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            let busy = self.shared.slots.lock().iter().any(|slot| {
                matches!(slot, RegionSlot::Loading | RegionSlot::Unloading)
            });
            if !busy {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// State of a region slot.
    #[must_use]
    pub fn region_state(&self, region: RegionCoord) -> Option<RegionState> {
        let index = self.shared.layout.region_index(region)?;
        Some(self.shared.slots.lock()[index].state())
    }

    /// Loaded regions in slot order.
    #[must_use]
    pub fn loaded_regions(&self) -> Vec<RegionCoord> {
        let slots = self.shared.slots.lock();
        slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, RegionSlot::Loaded(_)))
            .map(|(i, _)| self.shared.layout.region_at(i))
            .collect()
    }

    /// Loaded-world counters.
    #[must_use]
    pub fn stats(&self) -> MapStats {
        let slots = self.shared.slots.lock();
        let mut stats = MapStats::default();
        for slot in slots.iter() {
            if let RegionSlot::Loaded(region) = slot {
                stats.loaded_regions += 1;
                stats.chunks += region.chunk_count();
                stats.tiles += region.tile_count();
                if region.is_modified() {
                    stats.modified_regions += 1;
                }
            }
        }
        stats
    }

    /// Spawn point.
    #[must_use]
    pub fn spawn_point(&self) -> GridPos {
        self.shared.metadata.lock().spawn_point()
    }

    /// Copy of the world metadata.
    #[must_use]
    pub fn metadata(&self) -> WorldMetadata {
        self.shared.metadata.lock().clone()
    }

    /// World folder.
    #[must_use]
    pub fn world_dir(&self) -> &Path {
        &self.shared.world_dir
    }

    /// World layout.
    #[must_use]
    pub fn layout(&self) -> &WorldLayout {
        &self.shared.layout
    }

    /// Tile database.
    #[must_use]
    pub fn tiles(&self) -> &TileDatabase {
        &self.shared.tiles
    }

    /// World size in pixels.
    #[must_use]
    pub fn real_dimensions(&self) -> (u64, u64) {
        self.shared.layout.real_dimensions()
    }

    /// Biome at a grid position, once the generator is built.
    #[must_use]
    pub fn biome_at(&self, pos: GridPos) -> Option<BiomeType> {
        self.shared.generator.get()?.biome_at(pos)
    }

    /// Full biome classification at a grid position.
    #[must_use]
    pub fn biome_cell_at(&self, pos: GridPos) -> Option<BiomeCell> {
        self.shared.generator.get()?.biome_cell_at(pos)
    }

    /// Height at a grid position.
    #[must_use]
    pub fn height_at(&self, pos: GridPos) -> Option<f32> {
        self.shared.generator.get()?.height_at(pos)
    }

    /// Moisture at a grid position.
    #[must_use]
    pub fn moisture_at(&self, pos: GridPos) -> Option<f32> {
        self.shared.generator.get()?.moisture_at(pos)
    }

    /// Heat at a grid position.
    #[must_use]
    pub fn heat_at(&self, pos: GridPos) -> Option<f32> {
        self.shared.generator.get()?.heat_at(pos)
    }
}

impl Drop for WorldMap {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("World worker panicked");
            }
        }
        if self.is_ready() {
            if let Err(e) = self.save() {
                error!("Failed to save world on close: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::tile_tags;
    use tempfile::TempDir;
    use terra_common::{ChunkDims, Extent, TileId};

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn small_config(saves: &Path) -> WorldConfig {
        WorldConfig {
            saves_dir: saves.to_path_buf(),
            layout: WorldLayout {
                max_regions: Extent::square(4),
                region_size_in_chunks: Extent::square(2),
                chunk_size_in_tiles: ChunkDims { x: 8, y: 8, z: 5 },
                tile_size_px: 16,
            },
            noise_threads: 1,
            autosave_interval_secs: 0.0,
            ..WorldConfig::default()
        }
    }

    fn ready_map(saves: &Path) -> WorldMap {
        let map = WorldMap::create(small_config(saves), "test", 42, Difficulty::Normal)
            .expect("create");
        assert!(map.wait_until_ready(TIMEOUT), "{}", map.message());
        map
    }

    #[test]
    fn test_world_names_checked() {
        assert!(check_world_name("My World").is_ok());
        for bad in ["", "  ", "../up", "a/b", ".hidden", "c:d"] {
            assert!(check_world_name(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_ready_after_spawn_area_loaded() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        assert_eq!(map.message(), "Done!");
        let spawn_region = map.layout().region_of(map.spawn_point());
        assert_eq!(map.region_state(spawn_region), Some(RegionState::Loaded));
        assert!(map.get_tile(map.spawn_point(), 0).is_some());
        assert!(temp.path().join("test").join(METADATA_FILE).exists());
    }

    #[test]
    fn test_create_twice_rejected() {
        let temp = TempDir::new().expect("temp dir");
        drop(ready_map(temp.path()));
        let again = WorldMap::create(small_config(temp.path()), "test", 1, Difficulty::Easy);
        assert!(matches!(again, Err(WorldError::AlreadyExists(_))));
    }

    #[test]
    fn test_put_get_remove_tile() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        let pos = map.spawn_point();
        let tile = map.tiles().create_tile(tile_tags::DIRT, pos, 2);

        assert_eq!(map.put_tile(tile).expect("put"), None);
        assert_eq!(map.get_tile(pos, 2), Some(tile));
        assert_eq!(map.stats().modified_regions, 1);
        assert_eq!(map.remove_tile(pos, 2).expect("remove"), Some(tile));
        assert!(map.get_tile(pos, 2).is_none());
    }

    #[test]
    fn test_tile_access_errors() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        let outside = Tile::new(TileId::from_tag(tile_tags::DIRT), GridPos::new(-1, 0), 0);
        assert!(matches!(map.put_tile(outside), Err(WorldError::PositionOutOfBounds(_))));

        let deep = Tile::new(TileId::from_tag(tile_tags::DIRT), map.spawn_point(), 9);
        assert!(matches!(map.put_tile(deep), Err(WorldError::LayerOutOfRange(9))));

        map.unload_region(RegionCoord::new(0, 0)).expect("unload");
        let far = Tile::new(TileId::from_tag(tile_tags::DIRT), GridPos::new(0, 0), 0);
        assert!(matches!(map.put_tile(far), Err(WorldError::NotReady(_))));
        assert!(map.get_tile(GridPos::new(0, 0), 0).is_none());
    }

    #[test]
    fn test_out_of_bounds_region_calls() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        for region in [RegionCoord::new(-1, 0), RegionCoord::new(4, 0)] {
            assert!(matches!(map.load_region(region), Err(WorldError::RegionOutOfBounds(_))));
            assert!(matches!(map.save_region(region), Err(WorldError::RegionOutOfBounds(_))));
            assert!(map.region_state(region).is_none());
        }
    }

    #[test]
    fn test_unload_writes_only_modified() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        let regions_dir = map.world_dir().join(REGIONS_DIR);
        let loaded = map.loaded_regions();
        assert!(loaded.len() >= 2);

        let untouched = loaded[0];
        map.unload_region(untouched).expect("unload");
        assert_eq!(map.region_state(untouched), Some(RegionState::Unloaded));
        assert!(!regions_dir.join(untouched.filename()).exists());

        let edited = loaded[1];
        let pos = map.layout().region_origin(edited);
        let tile = map.tiles().create_tile(tile_tags::STONE, pos, 3);
        map.put_tile(tile).expect("put");
        map.unload_region(edited).expect("unload");
        assert!(regions_dir.join(edited.filename()).exists());

        map.load_region(edited).expect("reload");
        assert_eq!(map.get_tile(pos, 3), Some(tile));
        assert_eq!(map.stats().modified_regions, 0);
    }

    #[test]
    fn test_save_region_writes_unconditionally() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        let region = map.loaded_regions()[0];
        map.save_region(region).expect("save");
        assert!(map.world_dir().join(REGIONS_DIR).join(region.filename()).exists());

        map.unload_region(RegionCoord::new(0, 0)).expect("unload");
        assert!(matches!(
            map.save_region(RegionCoord::new(0, 0)),
            Err(WorldError::NotReady(_))
        ));
    }

    /// Swaps the regions directory for a plain file so every write fails.
    fn block_region_writes(map: &WorldMap) -> PathBuf {
        let regions_dir = map.world_dir().join(REGIONS_DIR);
        let parked = map.world_dir().join("regions.parked");
        std::fs::rename(&regions_dir, &parked).expect("park regions");
        std::fs::write(&regions_dir, b"not a directory").expect("blocker");
        parked
    }

    fn unblock_region_writes(map: &WorldMap, parked: &Path) {
        let regions_dir = map.world_dir().join(REGIONS_DIR);
        std::fs::remove_file(&regions_dir).expect("remove blocker");
        std::fs::rename(parked, &regions_dir).expect("restore regions");
    }

    #[test]
    fn test_failed_save_keeps_file_and_changes() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        let pos = map.spawn_point();
        let region = map.layout().region_of(pos);
        let path = map.world_dir().join(REGIONS_DIR).join(region.filename());

        map.put_tile(map.tiles().create_tile(tile_tags::STONE, pos, 3))
            .expect("put");
        assert_eq!(map.save().expect("first save"), 1);
        let saved = std::fs::read(&path).expect("region file");

        let edit = map.tiles().create_tile(tile_tags::DIRT, pos, 4);
        map.put_tile(edit).expect("put");
        let parked = block_region_writes(&map);
        assert!(matches!(
            map.save(),
            Err(WorldError::RegionFile { region: r, .. }) if r == region
        ));
        assert_eq!(map.stats().modified_regions, 1);
        unblock_region_writes(&map, &parked);
        assert_eq!(std::fs::read(&path).expect("region file"), saved);

        assert_eq!(map.save().expect("retry"), 1);
        assert_ne!(std::fs::read(&path).expect("region file"), saved);
        assert_eq!(map.stats().modified_regions, 0);
        assert_eq!(map.get_tile(pos, 4), Some(edit));
    }

    #[test]
    fn test_failed_unload_keeps_region_loaded() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        let pos = map.spawn_point();
        let region = map.layout().region_of(pos);
        let tile = map.tiles().create_tile(tile_tags::STONE, pos, 3);
        map.put_tile(tile).expect("put");

        let parked = block_region_writes(&map);
        assert!(map.unload_region(region).is_err());
        assert_eq!(map.region_state(region), Some(RegionState::Loaded));
        assert_eq!(map.get_tile(pos, 3), Some(tile));
        assert_eq!(map.stats().modified_regions, 1);
        unblock_region_writes(&map, &parked);

        map.unload_region(region).expect("unload");
        assert_eq!(map.region_state(region), Some(RegionState::Unloaded));
        map.load_region(region).expect("reload");
        assert_eq!(map.get_tile(pos, 3), Some(tile));
    }

    #[test]
    fn test_region_io_error_fails_only_that_region() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        let spawn_region = map.layout().region_of(map.spawn_point());
        let region = map
            .loaded_regions()
            .into_iter()
            .find(|&r| r != spawn_region)
            .expect("a neighbour is loaded");
        map.unload_region(region).expect("unload");

        // A directory where the file should be reads as an I/O error.
        let path = map.world_dir().join(REGIONS_DIR).join(region.filename());
        std::fs::create_dir(&path).expect("blocker");
        assert!(matches!(
            map.load_region(region),
            Err(WorldError::RegionFile { region: r, .. }) if r == region
        ));
        assert_eq!(map.region_state(region), Some(RegionState::Failed));
        assert_eq!(map.region_state(spawn_region), Some(RegionState::Loaded));
        assert!(map.is_ready());
        assert!(!map.has_failed());

        std::fs::remove_dir(&path).expect("remove blocker");
        map.load_region(region).expect("retry");
        assert_eq!(map.region_state(region), Some(RegionState::Loaded));
    }

    #[test]
    fn test_overlapping_saves_keep_every_edit() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        let region = map.layout().region_of(map.spawn_point());
        let origin = map.layout().region_origin(region);

        let saver = {
            let shared = Arc::clone(&map.shared);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let _ = shared.save_region(region, true);
                }
            })
        };
        let mut placed = Vec::new();
        for i in 0..16 {
            let tile = map
                .tiles()
                .create_tile(tile_tags::STONE, GridPos::new(origin.x + i, origin.y), 4);
            map.put_tile(tile).expect("put");
            map.save_region(region).expect("save");
            placed.push(tile);
        }
        saver.join().expect("saver thread");

        map.save().expect("final save");
        map.unload_region(region).expect("unload");
        map.load_region(region).expect("reload");
        for tile in placed {
            assert_eq!(map.get_tile(tile.position, 4), Some(tile));
        }
    }

    #[test]
    fn test_data_packs_outside_world_ignored() {
        let temp = TempDir::new().expect("temp dir");
        drop(ready_map(temp.path()));
        let world_dir = temp.path().join("test");
        let pack = r#"[{"tag":"mod:glass","name":"Glass","rect_x":0,"rect_y":2,"size":16}]"#;
        std::fs::write(temp.path().join("outside.json"), pack).expect("outside pack");
        std::fs::create_dir(world_dir.join("packs")).expect("packs dir");
        std::fs::write(world_dir.join("packs/inside.json"), pack.replace("glass", "clay"))
            .expect("inside pack");

        let mut metadata = WorldMetadata::load(&world_dir).expect("metadata");
        metadata.data_packs.enabled = vec!["../outside.json".into(), "packs/inside.json".into()];
        metadata.save(&world_dir).expect("save metadata");

        let map = WorldMap::open(small_config(temp.path()), "test").expect("open");
        assert!(map.tiles().contains("mod:clay"));
        assert!(!map.tiles().contains("mod:glass"));
    }

    #[test]
    fn test_update_streams_regions() {
        let temp = TempDir::new().expect("temp dir");
        let mut map = ready_map(temp.path());
        map.update(0.1, GridPos::new(0, 0));
        assert!(map.wait_until_idle(TIMEOUT));
        assert_eq!(map.region_state(RegionCoord::new(0, 0)), Some(RegionState::Loaded));
        assert_eq!(map.region_state(RegionCoord::new(1, 1)), Some(RegionState::Loaded));

        map.update(0.1, GridPos::new(63, 63));
        assert!(map.wait_until_idle(TIMEOUT));
        // Distance 3 from region (3, 3) is beyond the unload radius of 2.
        assert_eq!(map.region_state(RegionCoord::new(0, 0)), Some(RegionState::Unloaded));
        assert_eq!(map.region_state(RegionCoord::new(3, 3)), Some(RegionState::Loaded));
    }

    #[test]
    fn test_keep_loaded_survives_update() {
        let temp = TempDir::new().expect("temp dir");
        let mut map = ready_map(temp.path());
        map.update(0.1, GridPos::new(0, 0));
        assert!(map.wait_until_idle(TIMEOUT));
        map.set_keep_loaded(GridPos::new(1, 1), true).expect("flag");

        map.update(0.1, GridPos::new(63, 63));
        assert!(map.wait_until_idle(TIMEOUT));
        assert_eq!(map.region_state(RegionCoord::new(0, 0)), Some(RegionState::Loaded));
    }

    #[test]
    fn test_update_accumulates_time() {
        let temp = TempDir::new().expect("temp dir");
        let mut map = ready_map(temp.path());
        let spawn = map.spawn_point();
        for _ in 0..36 {
            map.update(100.0, spawn);
        }
        let metadata = map.metadata();
        assert!((metadata.time_played - 1.0).abs() < 1e-6);
        assert!((metadata.day_time - 3600.0 % DAY_LENGTH_SECS).abs() < 1e-6);
    }

    #[test]
    fn test_field_accessors() {
        let temp = TempDir::new().expect("temp dir");
        let map = ready_map(temp.path());
        let pos = map.spawn_point();
        assert!(map.biome_at(pos).is_some_and(BiomeType::is_spawnable) || pos == map.layout().center());
        for value in [map.height_at(pos), map.moisture_at(pos), map.heat_at(pos)] {
            let value = value.expect("in bounds");
            assert!((0.0..=1.0).contains(&value));
        }
        assert!(map.height_at(GridPos::new(-5, 0)).is_none());
        assert_eq!(map.real_dimensions(), (64 * 16, 64 * 16));
    }
}
