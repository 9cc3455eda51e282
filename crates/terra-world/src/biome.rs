//! Biome classification.
//!
//! Each biome preset has ideal height, moisture and heat values. A world cell
//! is assigned the preset whose ideal conditions are closest to the sampled
//! conditions, scored with [`BiomePreset::calculate_weight`]. The scoring is a
//! greedy nearest match: weights are not normalized across biomes, and exact
//! ties go to the preset that comes first in the catalog.

use serde::{Deserialize, Serialize};
use terra_common::Rgb;

use crate::tiles::tile_tags;

/// Biome kinds in the built-in catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiomeType {
    /// Hot, dry sand
    Desert,
    /// Temperate, wet woodland
    Forest,
    /// Temperate open grass
    Grassland,
    /// Hot, very wet
    Jungle,
    /// High, bare stone
    Mountains,
    /// Low-lying water
    Ocean,
    /// Cold, snow-covered grass
    Tundra,
}

impl BiomeType {
    /// Whether players can spawn on this biome.
    #[must_use]
    pub const fn is_spawnable(self) -> bool {
        !matches!(self, Self::Ocean | Self::Mountains)
    }
}

/// Ideal conditions and surface data for one biome.
#[derive(Debug, Clone, PartialEq)]
pub struct BiomePreset {
    /// Biome kind
    pub kind: BiomeType,
    /// Display name
    pub name: &'static str,
    /// Ideal height in `[0, 1]`
    pub height: f64,
    /// Ideal moisture in `[0, 1]`
    pub moisture: f64,
    /// Ideal heat in `[0, 1]`
    pub heat: f64,
    /// Tag of the layer-0 tile
    pub base_tile: &'static str,
    /// Static display color
    pub color: Rgb,
}

impl BiomePreset {
    /// Match score for the given conditions; higher is better.
    ///
    /// `1 / (1 + |h - h0| + |m - m0| + |t - t0|)`
    #[must_use]
    pub fn calculate_weight(&self, height: f64, moisture: f64, heat: f64) -> f64 {
        1.0 / (1.0
            + (height - self.height).abs()
            + (moisture - self.moisture).abs()
            + (heat - self.heat).abs())
    }

    /// Whether this biome's surface is grass that takes a moisture/heat tint.
    #[must_use]
    pub fn is_grass_family(&self) -> bool {
        self.base_tile == tile_tags::GRASS
    }

    /// Display color for a cell with the given conditions.
    ///
    /// Grass-family biomes drift toward straw as the cell gets drier and
    /// hotter; other biomes use their static color.
    #[must_use]
    pub fn color_for(&self, moisture: f64, heat: f64) -> Rgb {
        if !self.is_grass_family() {
            return self.color;
        }
        let dryness = (-3.0 * moisture.clamp(0.0, 1.0)).exp();
        let t = (dryness * (0.5 + 0.5 * heat.clamp(0.0, 1.0))).clamp(0.0, 1.0);
        let mix = |base: u8, straw: f64| {
            let base = f64::from(base) / 255.0;
            base + (straw - base) * t
        };
        Rgb::from_unit(
            mix(self.color.r, 0.78),
            mix(self.color.g, 0.72),
            mix(self.color.b, 0.36),
        )
    }
}

/// The built-in catalog, in tie-break order.
#[must_use]
pub fn default_catalog() -> Vec<BiomePreset> {
    vec![
        BiomePreset {
            kind: BiomeType::Desert,
            name: "Desert",
            height: 0.5,
            moisture: 0.1,
            heat: 0.9,
            base_tile: tile_tags::SAND,
            color: Rgb::new(237, 201, 125),
        },
        BiomePreset {
            kind: BiomeType::Forest,
            name: "Forest",
            height: 0.6,
            moisture: 0.6,
            heat: 0.5,
            base_tile: tile_tags::GRASS,
            color: Rgb::new(52, 130, 48),
        },
        BiomePreset {
            kind: BiomeType::Grassland,
            name: "Grassland",
            height: 0.5,
            moisture: 0.4,
            heat: 0.5,
            base_tile: tile_tags::GRASS,
            color: Rgb::new(96, 168, 64),
        },
        BiomePreset {
            kind: BiomeType::Jungle,
            name: "Jungle",
            height: 0.5,
            moisture: 0.9,
            heat: 0.9,
            base_tile: tile_tags::GRASS,
            color: Rgb::new(30, 150, 40),
        },
        BiomePreset {
            kind: BiomeType::Mountains,
            name: "Mountains",
            height: 0.9,
            moisture: 0.3,
            heat: 0.3,
            base_tile: tile_tags::STONE,
            color: Rgb::new(128, 128, 128),
        },
        BiomePreset {
            kind: BiomeType::Ocean,
            name: "Ocean",
            height: 0.1,
            moisture: 0.5,
            heat: 0.5,
            base_tile: tile_tags::WATER,
            color: Rgb::new(40, 90, 200),
        },
        BiomePreset {
            kind: BiomeType::Tundra,
            name: "Tundra",
            height: 0.6,
            moisture: 0.3,
            heat: 0.1,
            base_tile: tile_tags::SNOWY_GRASS,
            color: Rgb::new(230, 240, 245),
        },
    ]
}

/// Per-cell classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiomeCell {
    /// Winning biome
    pub kind: BiomeType,
    /// Display color of the cell
    pub color: Rgb,
    /// Tag of the layer-0 tile
    pub base_tile: &'static str,
}

/// Picks the best-matching biome for sampled conditions.
#[derive(Debug, Clone)]
pub struct BiomeClassifier {
    catalog: Vec<BiomePreset>,
}

impl Default for BiomeClassifier {
    fn default() -> Self {
        Self::new(default_catalog())
    }
}

impl BiomeClassifier {
    /// Creates a classifier over a catalog. Catalog order is the tie-break
    /// order.
    #[must_use]
    pub fn new(catalog: Vec<BiomePreset>) -> Self {
        Self { catalog }
    }

    /// The catalog, in tie-break order.
    #[must_use]
    pub fn catalog(&self) -> &[BiomePreset] {
        &self.catalog
    }

    /// Preset for a biome kind.
    #[must_use]
    pub fn preset(&self, kind: BiomeType) -> Option<&BiomePreset> {
        self.catalog.iter().find(|p| p.kind == kind)
    }

    /// Arg-max over the catalog; the first preset wins exact ties.
    #[must_use]
    pub fn best_match(&self, height: f64, moisture: f64, heat: f64) -> Option<&BiomePreset> {
        let mut best: Option<(&BiomePreset, f64)> = None;
        for preset in &self.catalog {
            let weight = preset.calculate_weight(height, moisture, heat);
            match best {
                Some((_, best_weight)) if weight <= best_weight => {},
                _ => best = Some((preset, weight)),
            }
        }
        best.map(|(preset, _)| preset)
    }

    /// Classifies one cell.
    #[must_use]
    pub fn classify(&self, height: f32, moisture: f32, heat: f32) -> Option<BiomeCell> {
        let (h, m, t) = (f64::from(height), f64::from(moisture), f64::from(heat));
        self.best_match(h, m, t).map(|preset| BiomeCell {
            kind: preset.kind,
            color: preset.color_for(m, t),
            base_tile: preset.base_tile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_formula() {
        let preset = &default_catalog()[0];
        assert!((preset.calculate_weight(0.5, 0.1, 0.9) - 1.0).abs() < f64::EPSILON);
        let w = preset.calculate_weight(0.0, 0.1, 0.9);
        assert!((w - 1.0 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_ideal_conditions_pick_own_biome() {
        let classifier = BiomeClassifier::default();
        for preset in classifier.catalog() {
            let best = classifier
                .best_match(preset.height, preset.moisture, preset.heat)
                .expect("non-empty catalog");
            assert_eq!(best.kind, preset.kind);
        }
    }

    #[test]
    fn test_tie_goes_to_first_in_catalog() {
        let a = BiomePreset {
            kind: BiomeType::Grassland,
            name: "A",
            height: 0.4,
            moisture: 0.5,
            heat: 0.5,
            base_tile: tile_tags::GRASS,
            color: Rgb::WHITE,
        };
        let b = BiomePreset {
            kind: BiomeType::Desert,
            name: "B",
            height: 0.6,
            ..a.clone()
        };
        let forward = BiomeClassifier::new(vec![a.clone(), b.clone()]);
        let reverse = BiomeClassifier::new(vec![b, a]);
        assert_eq!(forward.best_match(0.5, 0.5, 0.5).map(|p| p.kind), Some(BiomeType::Grassland));
        assert_eq!(reverse.best_match(0.5, 0.5, 0.5).map(|p| p.kind), Some(BiomeType::Desert));
    }

    #[test]
    fn test_classification_is_stable() {
        let classifier = BiomeClassifier::default();
        let samples = [(0.05, 0.5, 0.5), (0.95, 0.2, 0.2), (0.5, 0.95, 0.95), (0.6, 0.3, 0.05)];
        for (h, m, t) in samples {
            let first = classifier.classify(h, m, t);
            for _ in 0..10 {
                assert_eq!(classifier.classify(h, m, t), first);
            }
        }
        assert_eq!(classifier.classify(0.05, 0.5, 0.5).map(|c| c.kind), Some(BiomeType::Ocean));
        assert_eq!(
            classifier.classify(0.95, 0.2, 0.2).map(|c| c.kind),
            Some(BiomeType::Mountains)
        );
    }

    #[test]
    fn test_grass_color_depends_on_moisture() {
        let classifier = BiomeClassifier::default();
        let grassland = classifier.preset(BiomeType::Grassland).expect("grassland");
        let wet = grassland.color_for(1.0, 0.5);
        let dry = grassland.color_for(0.0, 0.5);
        assert_ne!(wet, dry);
        assert!(dry.r > wet.r);

        let ocean = classifier.preset(BiomeType::Ocean).expect("ocean");
        assert_eq!(ocean.color_for(0.0, 1.0), ocean.color);
    }

    #[test]
    fn test_empty_catalog() {
        let classifier = BiomeClassifier::new(Vec::new());
        assert!(classifier.classify(0.5, 0.5, 0.5).is_none());
    }
}
