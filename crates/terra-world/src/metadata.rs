//! Per-world metadata (`metadata.json`).

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use terra_common::GridPos;
use tracing::{debug, warn};

use crate::error::{WorldError, WorldResult};

/// Metadata file name inside a world folder.
pub const METADATA_FILE: &str = "metadata.json";

/// Region files directory inside a world folder.
pub const REGIONS_DIR: &str = "regions";

/// Current metadata format version.
pub const METADATA_VERSION: u32 = 1;

/// Name of the built-in terrain generator.
pub const GENERATOR_NAME: &str = "terra:default";

/// Seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// World difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// No hostile pressure
    Peaceful,
    /// Easy difficulty
    Easy,
    /// Normal difficulty (default)
    #[default]
    Normal,
    /// Hard difficulty
    Hard,
}

impl Difficulty {
    /// Get display name
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Peaceful => "Peaceful",
            Self::Easy => "Easy",
            Self::Normal => "Normal",
            Self::Hard => "Hard",
        }
    }
}

/// Enabled and disabled data packs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataPacks {
    /// Packs loaded with the world
    #[serde(default)]
    pub enabled: Vec<String>,
    /// Packs known but not loaded
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl DataPacks {
    /// Resolves a pack name against the world folder.
    ///
    /// Returns `None` for names that are absolute or step outside the
    /// folder (`..`, roots, drive prefixes).
    #[must_use]
    pub fn resolve(world_dir: &Path, pack: &str) -> Option<PathBuf> {
        let relative = Path::new(pack);
        let contained = !pack.is_empty()
            && relative
                .components()
                .all(|part| matches!(part, Component::Normal(_) | Component::CurDir));
        if !contained {
            warn!("Ignoring data pack outside the world folder: {}", pack);
            return None;
        }
        Some(world_dir.join(relative))
    }
}

/// Persisted per-world record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldMetadata {
    /// Metadata format version
    pub metadata_version: u32,
    /// Version of the program that last wrote the world
    pub game_version: String,
    /// Data packs
    #[serde(default)]
    pub data_packs: DataPacks,
    /// Time of day in seconds
    #[serde(default)]
    pub day_time: f64,
    /// Display name
    pub name: String,
    /// Difficulty
    #[serde(default)]
    pub difficulty: Difficulty,
    /// World seed
    pub seed: u64,
    /// Terrain generator name
    pub generator_name: String,
    /// Creation time (epoch seconds)
    pub creation_date: u64,
    /// Last time the world was played (epoch seconds)
    pub last_played: u64,
    /// Spawn column
    pub spawn_x: i32,
    /// Spawn row
    pub spawn_y: i32,
    /// Total play time in hours
    #[serde(default)]
    pub time_played: f64,
}

impl WorldMetadata {
    /// Creates metadata for a new world.
    #[must_use]
    pub fn new(name: impl Into<String>, seed: u64, difficulty: Difficulty) -> Self {
        let now = unix_now();
        Self {
            metadata_version: METADATA_VERSION,
            game_version: env!("CARGO_PKG_VERSION").to_string(),
            data_packs: DataPacks::default(),
            day_time: 0.0,
            name: name.into(),
            difficulty,
            seed,
            generator_name: GENERATOR_NAME.to_string(),
            creation_date: now,
            last_played: now,
            spawn_x: 0,
            spawn_y: 0,
            time_played: 0.0,
        }
    }

    /// Spawn point.
    #[must_use]
    pub const fn spawn_point(&self) -> GridPos {
        GridPos::new(self.spawn_x, self.spawn_y)
    }

    /// Sets the spawn point.
    pub fn set_spawn_point(&mut self, pos: GridPos) {
        self.spawn_x = pos.x;
        self.spawn_y = pos.y;
    }

    /// Stamps the last-played time and program version.
    pub fn touch(&mut self) {
        self.last_played = unix_now();
        self.game_version = env!("CARGO_PKG_VERSION").to_string();
    }

    /// Metadata path of a world folder.
    #[must_use]
    pub fn path(world_dir: &Path) -> PathBuf {
        world_dir.join(METADATA_FILE)
    }

    /// Loads a world's metadata.
    pub fn load(world_dir: &Path) -> WorldResult<Self> {
        let path = Self::path(world_dir);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(WorldError::WorldNotFound(world_dir.to_path_buf()));
            },
            Err(e) => return Err(e.into()),
        };
        let metadata: Self = serde_json::from_reader(BufReader::new(file))?;
        if metadata.metadata_version > METADATA_VERSION {
            warn!(
                "World {} has metadata version {} (newer than {})",
                metadata.name, metadata.metadata_version, METADATA_VERSION
            );
        }
        Ok(metadata)
    }

    /// Saves a world's metadata atomically (temp file + rename).
    pub fn save(&self, world_dir: &Path) -> WorldResult<()> {
        fs::create_dir_all(world_dir)?;
        let final_path = Self::path(world_dir);
        let temp_path = world_dir.join(format!("{METADATA_FILE}.tmp"));

        let written = File::create(&temp_path)
            .map_err(WorldError::from)
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, self)?;
                writer.flush()?;
                Ok(())
            });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        debug!("Saved metadata for {}", self.name);
        Ok(())
    }
}

/// Lists the worlds in a saves directory, most recently played first.
///
/// Folders without a readable `metadata.json` are skipped. A missing saves
/// directory yields an empty list.
pub fn list_worlds(saves_dir: &Path) -> WorldResult<Vec<(PathBuf, WorldMetadata)>> {
    let entries = match fs::read_dir(saves_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut worlds = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        match WorldMetadata::load(&path) {
            Ok(metadata) => worlds.push((path, metadata)),
            Err(e) => debug!("Skipping {}: {}", path.display(), e),
        }
    }
    worlds.sort_by(|a, b| b.1.last_played.cmp(&a.1.last_played));
    Ok(worlds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_keys() {
        let metadata = WorldMetadata::new("Test", 42, Difficulty::Hard);
        let value = serde_json::to_value(&metadata).expect("serialize");
        for key in [
            "metadataVersion",
            "gameVersion",
            "dataPacks",
            "dayTime",
            "name",
            "difficulty",
            "seed",
            "generatorName",
            "creationDate",
            "lastPlayed",
            "spawnX",
            "spawnY",
            "timePlayed",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["difficulty"], "hard");
        assert!(value["dataPacks"]["enabled"].is_array());
    }

    #[test]
    fn test_data_pack_paths_stay_in_world() {
        let world = Path::new("saves/world");
        assert_eq!(
            DataPacks::resolve(world, "packs/extra.json"),
            Some(world.join("packs/extra.json"))
        );
        for bad in ["", "/etc/passwd", "../other/pack.json", "packs/../../x.json"] {
            assert_eq!(DataPacks::resolve(world, bad), None, "{bad:?}");
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().expect("temp dir");
        let dir = temp.path().join("world");
        let mut metadata = WorldMetadata::new("My World", u64::MAX, Difficulty::Easy);
        metadata.set_spawn_point(GridPos::new(12, -3));
        metadata.time_played = 1.5;
        metadata.data_packs.enabled.push("packs/extra.json".into());

        metadata.save(&dir).expect("save");
        assert!(dir.join(METADATA_FILE).exists());
        assert!(!dir.join("metadata.json.tmp").exists());

        let loaded = WorldMetadata::load(&dir).expect("load");
        assert_eq!(loaded, metadata);
        assert_eq!(loaded.spawn_point(), GridPos::new(12, -3));
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let temp = TempDir::new().expect("temp dir");
        assert!(matches!(
            WorldMetadata::load(temp.path()),
            Err(WorldError::WorldNotFound(_))
        ));

        fs::write(temp.path().join(METADATA_FILE), "{ nope").expect("write");
        assert!(matches!(
            WorldMetadata::load(temp.path()),
            Err(WorldError::Metadata(_))
        ));
    }

    #[test]
    fn test_list_worlds() {
        let temp = TempDir::new().expect("temp dir");
        assert!(list_worlds(&temp.path().join("missing")).expect("list").is_empty());

        let mut older = WorldMetadata::new("Older", 1, Difficulty::Normal);
        older.last_played = 100;
        older.save(&temp.path().join("older")).expect("save");
        let mut newer = WorldMetadata::new("Newer", 2, Difficulty::Normal);
        newer.last_played = 200;
        newer.save(&temp.path().join("newer")).expect("save");
        fs::create_dir_all(temp.path().join("empty")).expect("mkdir");
        fs::write(temp.path().join("stray.txt"), "x").expect("write");

        let worlds = list_worlds(temp.path()).expect("list");
        let names: Vec<_> = worlds.iter().map(|(_, m)| m.name.as_str()).collect();
        assert_eq!(names, vec!["Newer", "Older"]);
    }
}
