//! # Terra Engine
//!
//! Headless driver for the terrain and persistence core.
//!
//! Creates, opens, walks and inspects worlds from the command line:
//! - `new`: generate a world and save its spawn area
//! - `play`: open a world and walk a simulated player through it
//! - `list`: show saved worlds, most recently played first
//! - `inspect`: print the noise fields and tile stack of one cell

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod seed;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use terra_common::GridPos;
use terra_world::{list_worlds, Difficulty, WorldMap};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{EngineConfig, CONFIG_FILE};

/// Longest wait for a world's spawn area.
const READY_TIMEOUT: Duration = Duration::from_secs(600);

/// Tile-world generator and save inspector.
#[derive(Parser)]
#[command(name = "terra")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Override the saves directory.
    #[arg(long)]
    saves: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new world.
    New {
        /// World name (also the folder name).
        name: String,

        /// Seed: a number, 0x-prefixed hex, or any text.
        #[arg(short, long)]
        seed: Option<String>,

        /// Difficulty.
        #[arg(short, long, default_value = "normal")]
        difficulty: DifficultyArg,
    },
    /// Open a world and walk a simulated player through it.
    Play {
        /// World name.
        name: String,

        /// Override the number of ticks.
        #[arg(short, long)]
        ticks: Option<u32>,
    },
    /// List saved worlds.
    List,
    /// Print the fields and tiles of one grid cell.
    Inspect {
        /// World name.
        name: String,

        /// Grid column.
        x: i32,

        /// Grid row.
        y: i32,
    },
    /// Write the default configuration file.
    InitConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Peaceful,
    Easy,
    Normal,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Peaceful => Self::Peaceful,
            DifficultyArg::Easy => Self::Easy,
            DifficultyArg::Normal => Self::Normal,
            DifficultyArg::Hard => Self::Hard,
        }
    }
}

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("terra=info".parse()?))
        .init();

    let cli = Cli::parse();
    info!("Terra {} starting", env!("CARGO_PKG_VERSION"));

    if matches!(cli.command, Commands::InitConfig) {
        EngineConfig::default()
            .save_to(&cli.config)
            .with_context(|| format!("writing {}", cli.config.display()))?;
        return Ok(());
    }

    let mut config = EngineConfig::load_from(&cli.config);
    if let Some(saves) = cli.saves {
        config.world.saves_dir = saves;
    }
    config.validate().context("invalid world layout")?;

    match cli.command {
        Commands::New {
            name,
            seed,
            difficulty,
        } => {
            let seed = seed
                .as_deref()
                .map_or_else(crate::seed::random_seed, crate::seed::parse_seed);
            let map = WorldMap::create(config.world, &name, seed, difficulty.into())?;
            wait_ready(&map)?;
            let spawn = map.spawn_point();
            info!(
                "Created world {} with seed {} (spawn at {}, {})",
                name, seed, spawn.x, spawn.y
            );
            map.save()?;
        },
        Commands::Play { name, ticks } => {
            let mut map = WorldMap::open(config.world, &name)?;
            wait_ready(&map)?;
            if let Some(ticks) = ticks {
                config.walk.ticks = ticks;
            }
            let report = app::play(&mut map, &config.walk);
            let saved = map.save()?;
            info!(
                "Walked {} ticks through {} regions, placed {} tiles ({} skipped), ended at ({}, {})",
                report.ticks,
                report.regions_visited,
                report.tiles_placed,
                report.placements_skipped,
                report.final_position.x,
                report.final_position.y
            );
            info!(
                "{} regions loaded, {} chunks, {} tiles; {} regions saved",
                report.stats.loaded_regions, report.stats.chunks, report.stats.tiles, saved
            );
        },
        Commands::List => {
            let worlds = list_worlds(&config.world.saves_dir)?;
            if worlds.is_empty() {
                println!("No worlds in {}", config.world.saves_dir.display());
            }
            for (path, metadata) in worlds {
                println!(
                    "{:<24} seed {:<20} {:<8} {:>7.2} h played  {}",
                    metadata.name,
                    metadata.seed,
                    metadata.difficulty.display_name(),
                    metadata.time_played,
                    path.display()
                );
            }
        },
        Commands::Inspect { name, x, y } => {
            let map = WorldMap::open(config.world, &name)?;
            wait_ready(&map)?;
            inspect(&map, GridPos::new(x, y))?;
        },
        Commands::InitConfig => {},
    }

    info!("Terra shutdown complete");
    Ok(())
}

fn wait_ready(map: &WorldMap) -> Result<()> {
    if !map.wait_until_ready(READY_TIMEOUT) {
        bail!("world did not become ready: {}", map.message());
    }
    Ok(())
}

fn inspect(map: &WorldMap, pos: GridPos) -> Result<()> {
    let layout = map.layout();
    let Some(address) = layout.decompose(pos) else {
        bail!("({}, {}) is outside the world", pos.x, pos.y);
    };
    map.load_region(address.region)?;

    let biome = map.biome_cell_at(pos).context("no biome")?;
    println!(
        "({}, {}) region {} chunk ({}, {}) tile ({}, {})",
        pos.x,
        pos.y,
        address.region,
        address.chunk.x,
        address.chunk.y,
        address.local.x,
        address.local.y
    );
    println!(
        "biome {:?}, height {:.3}, moisture {:.3}, heat {:.3}",
        biome.kind,
        map.height_at(pos).unwrap_or_default(),
        map.moisture_at(pos).unwrap_or_default(),
        map.heat_at(pos).unwrap_or_default()
    );
    for z in 0..layout.chunk_size_in_tiles.z {
        if let Some(tile) = map.get_tile(pos, z) {
            let data = map.tiles().get_by_id(tile.id);
            println!(
                "  z={} {} ({}) color #{:02x}{:02x}{:02x}",
                z, data.tag, data.name, tile.color.r, tile.color.g, tile.color.b
            );
        }
    }
    Ok(())
}
