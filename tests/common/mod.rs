//! Shared fixtures for integration tests.

use std::path::Path;
use std::time::Duration;

use bannerwar::config::BattleConfig;
use bannerwar::db::{BattleStore, connect, migrate};
use bannerwar::manager::BattleManager;
use bannerwar::testutil::TestWorld;

/// Open (and migrate) a file-backed battle database under `dir`.
pub async fn file_store(dir: &Path) -> BattleStore {
    let pool = connect(&dir.join("battles.db")).await.unwrap();
    migrate(&pool).await.unwrap();
    BattleStore::new(pool)
}

/// A manager whose chunk blobs live under `dir`.
pub fn manager_at(store: BattleStore, dir: &Path) -> BattleManager {
    BattleManager::new(
        store,
        BattleConfig {
            chunk_dir: dir.join("chunks"),
            ..BattleConfig::default()
        },
    )
}

/// A world holding one 10-plot town in a nation, plus a hostile nation.
pub fn ten_plot_world() -> TestWorld {
    let mut world = TestWorld::new();
    world.add_town("Ironhold", 10, Some("Dominion"));
    world.add_nation("Raiders");
    world
}

/// Poll until `dir` contains `count` files, panicking after a few seconds.
/// Chunk captures are fire-and-forget; tests wait for the blobs to land.
pub async fn await_blob_count(dir: &Path, count: usize) {
    for _ in 0..200 {
        let found = std::fs::read_dir(dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        if found == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} chunk blobs under {}", dir.display());
}
