//! World configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use terra_common::{LayoutError, WorldLayout};

use crate::generation::GeneratorSettings;

/// Default saves directory.
pub const DEFAULT_SAVES_DIR: &str = "saves";

/// Runtime configuration of a world map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Directory holding one folder per world
    pub saves_dir: PathBuf,
    /// World grid layout
    pub layout: WorldLayout,
    /// Regions within this Chebyshev distance of the player are loaded
    pub load_radius: u32,
    /// Regions beyond this Chebyshev distance of the player are unloaded
    pub unload_radius: u32,
    /// Seconds between autosaves (0 = disabled)
    pub autosave_interval_secs: f32,
    /// Noise-map worker threads (0 = all cores)
    pub noise_threads: usize,
    /// Terrain noise settings
    pub generator: GeneratorSettings,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            saves_dir: PathBuf::from(DEFAULT_SAVES_DIR),
            layout: WorldLayout::default(),
            load_radius: 1,
            unload_radius: 2,
            autosave_interval_secs: 300.0,
            noise_threads: 0,
            generator: GeneratorSettings::default(),
        }
    }
}

impl WorldConfig {
    /// Clamps values to sensible ranges and checks the layout.
    pub fn validate(&mut self) -> Result<(), LayoutError> {
        self.load_radius = self.load_radius.min(8);
        // Hysteresis: unload strictly beyond the load radius.
        self.unload_radius = self.unload_radius.clamp(self.load_radius + 1, 16);
        if !self.autosave_interval_secs.is_finite() || self.autosave_interval_secs < 0.0 {
            self.autosave_interval_secs = 0.0;
        }
        self.noise_threads = self.noise_threads.min(256);
        if !self.generator.scale.is_finite() || self.generator.scale <= 0.0 {
            self.generator.scale = GeneratorSettings::default().scale;
        }
        self.layout.validate()
    }
}
