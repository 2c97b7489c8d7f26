//! The periodic driver. One task owns both cadences: the slow battle cycle
//! and the fast restore painter.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::manager::BattleManager;
use crate::signal::BattleSignal;
use crate::world::GameWorld;

/// Handle to the running clock task.
pub struct BattleClock {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl BattleClock {
    /// Spawn the clock. Cycles are never re-entered: a cycle that overruns
    /// its period delays the next tick rather than overlapping it, and
    /// missed ticks are skipped, not replayed.
    ///
    /// Signals drained from each cycle are forwarded on `signal_tx`.
    pub fn start<W: GameWorld + Send + 'static>(
        manager: Arc<tokio::sync::Mutex<BattleManager>>,
        world: Arc<tokio::sync::Mutex<W>>,
        cycle_period: Duration,
        paint_period: Duration,
        signal_tx: mpsc::UnboundedSender<BattleSignal>,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let notify = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut cycle = tokio::time::interval(cycle_period);
            cycle.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut paint = tokio::time::interval(paint_period);
            paint.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cycle.tick() => {
                        let mut manager = manager.lock().await;
                        let mut world = world.lock().await;
                        manager.run_cycle(&mut *world, epoch_millis()).await;
                        for signal in manager.take_signals() {
                            tracing::debug!(town = signal.town(), "forwarding battle signal");
                            if signal_tx.send(signal).is_err() {
                                tracing::debug!("signal receiver dropped");
                                break;
                            }
                        }
                    }
                    _ = paint.tick() => {
                        let mut manager = manager.lock().await;
                        let mut world = world.lock().await;
                        manager.restore_tick(&mut *world);
                    }
                    _ = notify.notified() => {
                        tracing::info!("battle clock stopping");
                        break;
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Request shutdown. An in-flight cycle finishes first.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    /// Wait for the clock task to exit.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "battle clock task panicked");
        }
    }
}

/// Milliseconds since the Unix epoch. The single source of "now" for the
/// running engine; tests drive the manager with explicit timestamps instead.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BattleConfig;
    use crate::db::migrate::{connect_memory, migrate};
    use crate::db::BattleStore;
    use crate::testutil::TestWorld;

    #[tokio::test(flavor = "multi_thread")]
    async fn clock_runs_cycles_and_stops() {
        let pool = connect_memory().await.unwrap();
        migrate(&pool).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = BattleConfig {
            cycle_period: Duration::from_millis(5),
            paint_period: Duration::from_millis(2),
            chunk_dir: dir.path().to_path_buf(),
            ..BattleConfig::default()
        };

        let store = BattleStore::new(pool);
        let manager = Arc::new(tokio::sync::Mutex::new(BattleManager::new(
            store.clone(),
            config.clone(),
        )));
        let mut world = TestWorld::new();
        world.add_town("Ironhold", 3, None);
        let world = Arc::new(tokio::sync::Mutex::new(world));

        {
            let world = world.lock().await;
            manager
                .lock()
                .await
                .start_battle("Ironhold", None, None, &*world, epoch_millis());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let clock = BattleClock::start(
            manager.clone(),
            world.clone(),
            config.cycle_period,
            config.paint_period,
            tx,
        );

        tokio::time::sleep(Duration::from_millis(40)).await;
        clock.stop();
        clock.join().await;

        // At least one cycle ran and persisted the battle.
        assert_eq!(store.all().await.unwrap().len(), 1);
        // The pending start signal was forwarded by the first cycle.
        assert_eq!(
            rx.try_recv().unwrap(),
            BattleSignal::BattleStarted {
                town: "Ironhold".into()
            }
        );
    }
}
