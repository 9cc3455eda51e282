//! Engine configuration.
//!
//! World and walker settings, loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use terra_common::LayoutError;
use terra_world::tiles::tile_tags;
use terra_world::WorldConfig;
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "terra.toml";

/// Simulated player settings for headless play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Number of update ticks to run
    pub ticks: u32,
    /// Simulated seconds per tick
    pub tick_secs: f32,
    /// Walking speed in tiles per second
    pub speed: f32,
    /// Place a tile every N ticks (0 = never)
    pub place_every: u32,
    /// Tag of the placed tile
    pub place_tag: String,
    /// Layer of the placed tile
    pub place_layer: u16,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            ticks: 1200,
            tick_secs: 0.05,
            speed: 12.0,
            place_every: 40,
            place_tag: tile_tags::STONE.to_string(),
            place_layer: 2,
        }
    }
}

/// Engine configuration parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// World settings
    pub world: WorldConfig,
    /// Headless walker settings
    pub walk: WalkConfig,
}

impl EngineConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) -> Result<(), LayoutError> {
        self.walk.tick_secs = self.walk.tick_secs.clamp(0.001, 1.0);
        if !self.walk.speed.is_finite() {
            self.walk.speed = WalkConfig::default().speed;
        }
        self.walk.speed = self.walk.speed.clamp(0.0, 256.0);
        self.world.validate()
    }
}
