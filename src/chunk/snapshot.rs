use std::io;
use std::path::PathBuf;

use tokio::task::JoinHandle;

use super::{CHUNK_VOLUME, ChunkCoord, ChunkSnapshot, PendingChunk};
use crate::world::{CellState, TerrainGrid};

/// Durable store of chunk blobs, one file per chunk keyed `"x_z"`.
///
/// Blobs are written once when a battle starts and consumed-and-deleted once
/// when the battle reaches its restore point. The store holds data only; the
/// restore policy lives in [`super::RestorePipeline`].
#[derive(Clone, Debug)]
pub struct ChunkStore {
    dir: PathBuf,
}

impl ChunkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Scan one chunk into a snapshot. Runs on the simulation side; the grid
    /// is only read here, never from a worker task.
    pub fn scan(grid: &dyn TerrainGrid, coord: ChunkCoord) -> ChunkSnapshot {
        let mut snap = ChunkSnapshot::blank(coord);
        for index in 0..CHUNK_VOLUME {
            let Some(cell) = grid.cell(coord, index) else {
                continue;
            };
            if let Some(state) = &cell.state {
                if state_is_useful(state) {
                    snap.block_states[index] = Some(state.encoded.clone());
                }
            }
            snap.materials[index] = Some(cell.material);
        }
        snap
    }

    /// Capture `chunks` to durable blobs. Scanning happens inline; the writes
    /// are spawned onto the runtime so the caller never waits on disk. A
    /// failed write loses that chunk's capture and is only logged.
    ///
    /// All-air chunks are not stored at all, to avoid no-op restores.
    ///
    /// The returned handles may be dropped; the writes continue regardless.
    pub fn capture(&self, grid: &dyn TerrainGrid, chunks: &[ChunkCoord]) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(chunks.len());
        for &coord in chunks {
            let snap = Self::scan(grid, coord);
            if snap.is_empty() {
                tracing::debug!(chunk = %coord, "all-air chunk not stored");
                continue;
            }
            let store = self.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = store.write(&snap).await {
                    tracing::warn!(chunk = %snap.coord, error = %e, "chunk capture lost");
                }
            }));
        }
        handles
    }

    /// Write one snapshot blob.
    pub async fn write(&self, snap: &ChunkSnapshot) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec(snap)?;
        tokio::fs::write(self.dir.join(snap.coord.file_key()), bytes).await
    }

    /// Read a chunk's blob, deleting it on success. A missing or unreadable
    /// blob yields an unread (useless) pending chunk; the painter will skip
    /// it with a warning.
    pub async fn read_and_delete(&self, coord: ChunkCoord) -> PendingChunk {
        let path = self.dir.join(coord.file_key());
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return PendingChunk::unread(coord);
            }
            Err(e) => {
                tracing::error!(chunk = %coord, error = %e, "failed to read chunk blob");
                return PendingChunk::unread(coord);
            }
        };
        let snap: ChunkSnapshot = match serde_json::from_slice(&bytes) {
            Ok(snap) => snap,
            Err(e) => {
                tracing::error!(chunk = %coord, error = %e, "corrupt chunk blob");
                return PendingChunk::unread(coord);
            }
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(chunk = %coord, error = %e, "failed to delete chunk blob");
        }
        PendingChunk {
            coord,
            materials: Some(snap.materials),
            block_states: Some(snap.block_states),
        }
    }
}

/// Whether a block state is worth persisting alongside its material.
fn state_is_useful(state: &CellState) -> bool {
    use crate::world::StateFacet::*;
    state.facets.iter().any(|f| {
        matches!(
            f,
            Directional
                | Aged
                | Waterlogged
                | Powered
                | Openable
                | Bisected
                | Lit
                | Levelled
                | Rotated
                | MultiFacing
        )
    })
}
