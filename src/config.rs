use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Engine tuning knobs. Stage durations are not here; they derive from town
/// size at battle start.
#[derive(Clone, Debug)]
pub struct BattleConfig {
    /// How often the clock advances expired battles and persists state.
    pub cycle_period: Duration,
    /// How often the restore painter runs.
    pub paint_period: Duration,
    /// Chunk blobs read per restore batch.
    pub read_batch_size: usize,
    /// Chunks repainted per paint tick.
    pub chunks_per_tick: usize,
    /// Materials never placed back during restore.
    pub denylist: HashSet<String>,
    /// Directory holding chunk blobs.
    pub chunk_dir: PathBuf,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            cycle_period: Duration::from_secs(10),
            paint_period: Duration::from_millis(50),
            read_batch_size: 10,
            chunks_per_tick: 5,
            denylist: ["DIAMOND_ORE".to_string()].into_iter().collect(),
            chunk_dir: PathBuf::from("chunk_data"),
        }
    }
}
