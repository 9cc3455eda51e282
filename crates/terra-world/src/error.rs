//! World error types.

use std::path::PathBuf;

use terra_common::{GridPos, LayoutError, RegionCoord};
use thiserror::Error;

/// Errors reading or writing a region file.
#[derive(Debug, Error)]
pub enum RegionFileError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// File ended inside a record
    #[error("Region file truncated while reading {context}")]
    Truncated {
        /// Record being read
        context: &'static str,
    },
    /// Chunk offset outside the region
    #[error("Chunk offset ({x}, {y}) outside region")]
    ChunkOffsetOutOfRange {
        /// Offset X
        x: u16,
        /// Offset Y
        y: u16,
    },
    /// Tile position outside its chunk
    #[error("Tile position ({x}, {y}, {z}) outside chunk")]
    TilePositionOutOfRange {
        /// Local X
        x: u16,
        /// Local Y
        y: u16,
        /// Layer
        z: u16,
    },
    /// Chunk record declares more tiles than a chunk holds
    #[error("Chunk declares {count} tiles, capacity is {capacity}")]
    TooManyTiles {
        /// Declared count
        count: u32,
        /// Chunk volume
        capacity: usize,
    },
}

impl RegionFileError {
    /// Whether the error means the file content is malformed (as opposed to
    /// an I/O failure).
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Result type for region file operations.
pub type RegionFileResult<T> = Result<T, RegionFileError>;

/// Errors from world operations.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Region outside the world
    #[error("Region {0} is outside the world")]
    RegionOutOfBounds(RegionCoord),
    /// Grid position outside the world
    #[error("Position ({}, {}) is outside the world", .0.x, .0.y)]
    PositionOutOfBounds(GridPos),
    /// Depth layer outside the chunk
    #[error("Layer {0} is outside the chunk")]
    LayerOutOfRange(u16),
    /// Region is not loaded yet
    #[error("Region {0} is not loaded")]
    NotReady(RegionCoord),
    /// Terrain generator is still being built
    #[error("World is still initializing")]
    Initializing,
    /// Region is being loaded or unloaded
    #[error("Region {0} is busy")]
    RegionBusy(RegionCoord),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Region file error
    #[error("Region {region}: {source}")]
    RegionFile {
        /// Region being read or written
        region: RegionCoord,
        /// Underlying error
        #[source]
        source: RegionFileError,
    },
    /// Metadata (de)serialization error
    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] LayoutError),
    /// World folder already exists
    #[error("World already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    /// World name cannot be used as a folder name
    #[error("Invalid world name: {0:?}")]
    InvalidName(String),
    /// World folder has no metadata
    #[error("World not found: {}", .0.display())]
    WorldNotFound(PathBuf),
    /// Background worker stopped
    #[error("World worker is not running")]
    WorkerGone,
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
