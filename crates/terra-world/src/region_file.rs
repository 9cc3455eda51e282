//! Binary region files (`r.<x>.<y>.region`).
//!
//! A region file is a sequence of chunk records, all little-endian:
//!
//! ```text
//! chunk record: [offset_x: u16][offset_y: u16][tile_count: u32] tile_record * tile_count
//! tile record:  [x: u16][y: u16][z: u16][tile_id: u32] ([r: u8][g: u8][b: u8] if grass top)
//! ```
//!
//! Chunk offsets are relative to the region; tile positions are relative to
//! the chunk. Only grass-top tiles store a color, every other tile is loaded
//! untinted. End of file is only valid between chunk records.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use terra_common::{LocalTile, RegionCoord, Rgb, TileAddress, TileId, WorldLayout};
use tracing::{debug, warn};

use crate::error::{RegionFileError, RegionFileResult};
use crate::region::Region;
use crate::tiles::{Tile, GRASS_TOP_ID};

const CHUNK_HEADER_LEN: usize = 8;
const TILE_RECORD_LEN: usize = 10;
const COLOR_LEN: usize = 3;

/// Path of a region's file inside a regions directory.
#[must_use]
pub fn region_path(dir: &Path, region: RegionCoord) -> PathBuf {
    dir.join(region.filename())
}

/// Writes a region in the binary format.
///
/// Every allocated chunk is written, including empty ones.
pub fn write_region<W: Write>(writer: &mut W, region: &Region) -> RegionFileResult<()> {
    let layout = region.layout();
    for chunk in region.chunks() {
        let (offset_x, offset_y) = layout.chunk_offset(chunk.coord());
        let count = u32::try_from(chunk.tile_count()).map_err(|_| {
            RegionFileError::TooManyTiles {
                count: u32::MAX,
                capacity: chunk.dims().volume(),
            }
        })?;
        writer.write_all(&offset_x.to_le_bytes())?;
        writer.write_all(&offset_y.to_le_bytes())?;
        writer.write_all(&count.to_le_bytes())?;

        for (local, tile) in chunk.tiles() {
            writer.write_all(&local.x.to_le_bytes())?;
            writer.write_all(&local.y.to_le_bytes())?;
            writer.write_all(&tile.z.to_le_bytes())?;
            writer.write_all(&tile.id.raw().to_le_bytes())?;
            if tile.id == GRASS_TOP_ID {
                writer.write_all(&[tile.color.r, tile.color.g, tile.color.b])?;
            }
        }
    }
    Ok(())
}

/// Reads fixed-size records, telling a clean end of stream apart from a
/// partial record.
struct RecordReader<R> {
    inner: R,
}

impl<R: Read> RecordReader<R> {
    /// Reads until `buf` is full or the stream ends. Returns bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn exact<const N: usize>(&mut self, context: &'static str) -> RegionFileResult<[u8; N]> {
        let mut buf = [0u8; N];
        if self.fill(&mut buf)? < N {
            return Err(RegionFileError::Truncated { context });
        }
        Ok(buf)
    }

    /// Reads a chunk header, or `None` at a clean end of stream.
    fn chunk_header(&mut self) -> RegionFileResult<Option<(u16, u16, u32)>> {
        let mut buf = [0u8; CHUNK_HEADER_LEN];
        match self.fill(&mut buf)? {
            0 => Ok(None),
            CHUNK_HEADER_LEN => Ok(Some((
                u16::from_le_bytes([buf[0], buf[1]]),
                u16::from_le_bytes([buf[2], buf[3]]),
                u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ))),
            _ => Err(RegionFileError::Truncated {
                context: "chunk header",
            }),
        }
    }
}

/// Reads a region in the binary format.
///
/// Loaded chunks are clean. Fails on any partial record or out-of-range
/// position instead of returning a partially filled region.
pub fn read_region<R: Read>(
    reader: R,
    coord: RegionCoord,
    layout: WorldLayout,
) -> RegionFileResult<Region> {
    let mut reader = RecordReader { inner: reader };
    let mut region = Region::new(coord, layout);
    let dims = layout.chunk_size_in_tiles;
    let chunks = layout.region_size_in_chunks;

    while let Some((offset_x, offset_y, tile_count)) = reader.chunk_header()? {
        if u32::from(offset_x) >= chunks.width || u32::from(offset_y) >= chunks.height {
            return Err(RegionFileError::ChunkOffsetOutOfRange {
                x: offset_x,
                y: offset_y,
            });
        }
        if tile_count as usize > dims.volume() {
            return Err(RegionFileError::TooManyTiles {
                count: tile_count,
                capacity: dims.volume(),
            });
        }
        let chunk = layout.chunk_from_offset(coord, offset_x, offset_y);
        // Allocates the chunk even when it holds no tiles.
        region.chunk_or_insert(chunk);

        for _ in 0..tile_count {
            let record: [u8; TILE_RECORD_LEN] = reader.exact("tile record")?;
            let x = u16::from_le_bytes([record[0], record[1]]);
            let y = u16::from_le_bytes([record[2], record[3]]);
            let z = u16::from_le_bytes([record[4], record[5]]);
            let id = TileId::from_raw(u32::from_le_bytes([
                record[6], record[7], record[8], record[9],
            ]));
            if x >= dims.x || y >= dims.y || z >= dims.z {
                return Err(RegionFileError::TilePositionOutOfRange { x, y, z });
            }
            let color = if id == GRASS_TOP_ID {
                let [r, g, b]: [u8; COLOR_LEN] = reader.exact("tile color")?;
                Rgb::new(r, g, b)
            } else {
                Rgb::WHITE
            };

            let address = TileAddress {
                region: coord,
                chunk,
                local: LocalTile::new(x, y),
            };
            let tile = Tile::new(id, layout.compose(address), z).with_color(color);
            region.place_tile(address, tile);
        }
    }
    Ok(region)
}

/// Encodes a region into an in-memory buffer.
pub fn encode_region(region: &Region) -> RegionFileResult<Vec<u8>> {
    let mut bytes = Vec::new();
    write_region(&mut bytes, region)?;
    Ok(bytes)
}

/// Writes encoded region bytes atomically (unique temp file + rename).
///
/// On failure the previous file, if any, is left untouched and the temp
/// file is removed.
pub fn write_region_file(dir: &Path, coord: RegionCoord, bytes: &[u8]) -> RegionFileResult<()> {
    fs::create_dir_all(dir)?;
    let final_path = region_path(dir, coord);

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        writer.write_all(bytes)?;
        writer.flush()?;
    }
    temp.persist(&final_path).map_err(|e| e.error)?;
    debug!("Wrote {} ({} bytes)", final_path.display(), bytes.len());
    Ok(())
}

/// Saves a region atomically.
pub fn save_region_file(dir: &Path, region: &Region) -> RegionFileResult<()> {
    let bytes = encode_region(region)?;
    write_region_file(dir, region.coord(), &bytes)
}

/// Loads a region file. Returns `Ok(None)` if the region has never been
/// saved.
pub fn load_region_file(
    dir: &Path,
    coord: RegionCoord,
    layout: WorldLayout,
) -> RegionFileResult<Option<Region>> {
    let path = region_path(dir, coord);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    read_region(BufReader::new(file), coord, layout).map(Some)
}

/// Moves a malformed region file aside to `<name>.corrupt`.
pub fn quarantine_region_file(dir: &Path, coord: RegionCoord) -> io::Result<PathBuf> {
    let path = region_path(dir, coord);
    let target = dir.join(format!("{}.corrupt", coord.filename()));
    fs::rename(&path, &target)?;
    warn!("Moved corrupt region file to {}", target.display());
    Ok(target)
}
