//! Terrain snapshot and restore. A battle captures the contested town's
//! chunks to durable blobs when it starts, and repaints them in rate-limited
//! batches when it goes dormant.

pub mod restore;
pub mod snapshot;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use restore::RestorePipeline;
pub use snapshot::ChunkStore;

pub const CHUNK_WIDTH: usize = 16;
/// Lowest cell layer of a chunk in world coordinates.
pub const MIN_CELL_Y: i32 = -64;
/// Vertical extent of a chunk, covering world layers -64..320.
pub const CHUNK_HEIGHT: usize = 384;
/// Cells per chunk; the length of both snapshot arrays.
pub const CHUNK_VOLUME: usize = CHUNK_WIDTH * CHUNK_WIDTH * CHUNK_HEIGHT;

/// Coordinates of one terrain chunk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Blob file name for this chunk.
    pub(crate) fn file_key(self) -> String {
        format!("{}_{}", self.x, self.z)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Flat index of the cell at chunk-local `(x, y, z)`, with `y` already
/// shifted to `0..CHUNK_HEIGHT`.
pub fn cell_index(x: usize, y: usize, z: usize) -> usize {
    x + z * CHUNK_WIDTH + y * CHUNK_WIDTH * CHUNK_WIDTH
}

/// Inverse of [`cell_index`].
pub fn cell_position(index: usize) -> (usize, usize, usize) {
    let x = index % CHUNK_WIDTH;
    let z = (index / CHUNK_WIDTH) % CHUNK_WIDTH;
    let y = index / (CHUNK_WIDTH * CHUNK_WIDTH);
    (x, y, z)
}

/// Durable image of one chunk: two parallel arrays over every cell, one for
/// the material id (`None` means air) and one for the encoded block state of
/// cells whose state carries meaning beyond the material.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkSnapshot {
    pub coord: ChunkCoord,
    pub materials: Vec<Option<String>>,
    pub block_states: Vec<Option<String>>,
}

impl ChunkSnapshot {
    pub fn blank(coord: ChunkCoord) -> Self {
        Self {
            coord,
            materials: vec![None; CHUNK_VOLUME],
            block_states: vec![None; CHUNK_VOLUME],
        }
    }

    /// True when every cell is air. Empty chunks are never written to the
    /// store, so an all-air chunk is indistinguishable from one whose capture
    /// failed; the restore side skips both with a warning.
    pub fn is_empty(&self) -> bool {
        self.materials.iter().all(Option::is_none) && self.block_states.iter().all(Option::is_none)
    }
}

/// A chunk queued for restoration. Starts unread; the restore pipeline fills
/// in the arrays from the stored blob.
#[derive(Debug)]
pub struct PendingChunk {
    pub coord: ChunkCoord,
    pub materials: Option<Vec<Option<String>>>,
    pub block_states: Option<Vec<Option<String>>>,
}

impl PendingChunk {
    pub fn unread(coord: ChunkCoord) -> Self {
        Self {
            coord,
            materials: None,
            block_states: None,
        }
    }

    /// A pending chunk with no materials and no block states carries no
    /// information and is skipped by the painter.
    pub fn is_useless(&self) -> bool {
        self.materials.is_none() && self.block_states.is_none()
    }
}
