use std::collections::{HashSet, VecDeque};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{CHUNK_VOLUME, ChunkCoord, ChunkStore, PendingChunk};
use crate::world::TerrainGrid;

/// Repaints stored chunk blobs back into the world.
///
/// Blob reads run on worker tasks, batch by batch; painting happens on the
/// simulation side, a bounded number of chunks per tick, so a large town
/// never stalls the loop. The channel between the two has capacity one:
/// batch k+1 may be read while batch k waits to be painted, but reads never
/// run further ahead than that.
pub struct RestorePipeline {
    tx: mpsc::Sender<Vec<PendingChunk>>,
    rx: mpsc::Receiver<Vec<PendingChunk>>,
    paint_queue: VecDeque<PendingChunk>,
    chunks_per_tick: usize,
    denylist: HashSet<String>,
}

impl RestorePipeline {
    pub fn new(chunks_per_tick: usize, denylist: HashSet<String>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx,
            paint_queue: VecDeque::new(),
            chunks_per_tick: chunks_per_tick.max(1),
            denylist,
        }
    }

    /// Queue `chunks` for restoration. The reads are spawned onto the
    /// runtime; each blob is deleted as it is read. Batches arrive at the
    /// painter whole and in order.
    ///
    /// The returned handle may be dropped; the reads continue regardless.
    pub fn enqueue(
        &self,
        store: ChunkStore,
        chunks: Vec<ChunkCoord>,
        batch_size: usize,
    ) -> JoinHandle<()> {
        let tx = self.tx.clone();
        let batch_size = batch_size.max(1);
        tokio::spawn(async move {
            for batch in chunks.chunks(batch_size) {
                let mut read = Vec::with_capacity(batch.len());
                for &coord in batch {
                    read.push(store.read_and_delete(coord).await);
                }
                // Blocks until the painter has taken the previous batch.
                if tx.send(read).await.is_err() {
                    return;
                }
            }
        })
    }

    /// Paint up to the configured number of chunks. Call once per simulation
    /// tick, from the simulation side only.
    pub fn tick(&mut self, grid: &mut dyn TerrainGrid) {
        while let Ok(batch) = self.rx.try_recv() {
            self.paint_queue.extend(batch);
        }
        for _ in 0..self.chunks_per_tick {
            let Some(pending) = self.paint_queue.pop_front() else {
                return;
            };
            self.paint(pending, grid);
        }
    }

    /// Chunks accepted but not yet painted.
    pub fn queued(&self) -> usize {
        self.paint_queue.len()
    }

    fn paint(&self, pending: PendingChunk, grid: &mut dyn TerrainGrid) {
        if pending.is_useless() {
            tracing::warn!(chunk = %pending.coord, "chunk has no information, skipping restore");
            return;
        }
        let materials = pending.materials.unwrap_or_default();
        let states = pending.block_states.unwrap_or_default();

        for index in 0..CHUNK_VOLUME {
            match materials.get(index).and_then(|m| m.as_deref()) {
                // Absent material means the cell was air at capture time.
                None => grid.set_cell(pending.coord, index, None, None),
                Some(material) if self.denylist.contains(material) => {}
                Some(material) => {
                    let state = states.get(index).and_then(|s| s.as_deref());
                    grid.set_cell(pending.coord, index, Some(material), state);
                }
            }
        }
        grid.clear_dropped_items(pending.coord);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::chunk::cell_index;
    use crate::testutil::TestWorld;
    use crate::world::{Cell, CellState, StateFacet};

    fn denylist() -> HashSet<String> {
        ["DIAMOND_ORE".to_string()].into_iter().collect()
    }

    async fn drain(pipeline: &mut RestorePipeline, world: &mut TestWorld) {
        for _ in 0..50 {
            pipeline.tick(world);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restores_materials_states_and_air() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        let coord = ChunkCoord::new(0, 0);

        let mut original = TestWorld::new();
        original.put_block(coord, cell_index(0, 0, 0), "STONE", None);
        original.put_block(
            coord,
            cell_index(1, 0, 0),
            "OAK_DOOR",
            Some(CellState {
                encoded: "oak_door[facing=east]".into(),
                facets: vec![StateFacet::Directional],
            }),
        );
        store.write(&ChunkStore::scan(&original, coord)).await.unwrap();

        // The world has since been griefed: blocks moved, junk added.
        let mut world = TestWorld::new();
        world.put_block(coord, cell_index(5, 5, 5), "COBBLESTONE", None);
        world.dropped_items.insert(coord, 3);

        let mut pipeline = RestorePipeline::new(5, denylist());
        let _ = pipeline.enqueue(store, vec![coord], 10);
        drain(&mut pipeline, &mut world).await;

        assert_eq!(
            world.cell(coord, cell_index(0, 0, 0)),
            Some(Cell {
                material: "STONE".into(),
                state: None
            })
        );
        let door = world.cell(coord, cell_index(1, 0, 0)).unwrap();
        assert_eq!(door.material, "OAK_DOOR");
        assert_eq!(door.state.unwrap().encoded, "oak_door[facing=east]");
        // The junk block was forced back to air, the drops removed.
        assert_eq!(world.cell(coord, cell_index(5, 5, 5)), None);
        assert_eq!(world.dropped_items.get(&coord), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn denylisted_material_is_not_restored() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        let coord = ChunkCoord::new(1, 1);

        let mut original = TestWorld::new();
        original.put_block(coord, cell_index(0, 0, 0), "DIAMOND_ORE", None);
        original.put_block(coord, cell_index(1, 0, 0), "STONE", None);
        store.write(&ChunkStore::scan(&original, coord)).await.unwrap();

        let mut world = TestWorld::new();
        let mut pipeline = RestorePipeline::new(5, denylist());
        let _ = pipeline.enqueue(store, vec![coord], 10);
        drain(&mut pipeline, &mut world).await;

        assert_eq!(world.cell(coord, cell_index(0, 0, 0)), None);
        assert!(world.cell(coord, cell_index(1, 0, 0)).is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_blob_is_skipped_without_painting() {
        // An all-air chunk was never stored, so restoring it looks exactly
        // like a failed capture: the chunk is skipped and the world is left
        // untouched.
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path());
        let coord = ChunkCoord::new(2, 2);

        let mut world = TestWorld::new();
        world.put_block(coord, cell_index(0, 0, 0), "COBBLESTONE", None);

        let mut pipeline = RestorePipeline::new(5, HashSet::new());
        let _ = pipeline.enqueue(store, vec![coord], 10);
        drain(&mut pipeline, &mut world).await;

        assert_eq!(pipeline.queued(), 0);
        assert!(world.cell(coord, cell_index(0, 0, 0)).is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn paints_at_most_chunks_per_tick() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path());

        let coords: Vec<ChunkCoord> = (0..4).map(|x| ChunkCoord::new(x, 0)).collect();
        let mut original = TestWorld::new();
        for &coord in &coords {
            original.put_block(coord, 0, "STONE", None);
            store.write(&ChunkStore::scan(&original, coord)).await.unwrap();
        }

        let mut world = TestWorld::new();
        let mut pipeline = RestorePipeline::new(1, HashSet::new());
        let handle = pipeline.enqueue(store, coords.clone(), 4);
        handle.await.unwrap();

        pipeline.tick(&mut world);
        let painted: usize = coords
            .iter()
            .filter(|&&c| world.cell(c, 0).is_some())
            .count();
        assert_eq!(painted, 1);
        assert_eq!(pipeline.queued(), 3);

        for _ in 0..3 {
            pipeline.tick(&mut world);
        }
        assert_eq!(pipeline.queued(), 0);
        assert!(coords.iter().all(|&c| world.cell(c, 0).is_some()));
    }
}
