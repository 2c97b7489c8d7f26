//! Owns every live battle and drives them through their stages. One manager
//! per process; the clock task calls into it on a fixed cadence.

use std::collections::HashMap;

use crate::chunk::{ChunkStore, RestorePipeline};
use crate::config::BattleConfig;
use crate::db::BattleStore;
use crate::model::{Battle, BattleRecord, BattleStage, Transition};
use crate::signal::BattleSignal;
use crate::world::{GameWorld, TerrainGrid, WorldDirectory};

pub struct BattleManager {
    battles: HashMap<String, Battle>,
    store: BattleStore,
    chunks: ChunkStore,
    restore: RestorePipeline,
    config: BattleConfig,
    signals: Vec<BattleSignal>,
    /// Towns whose rows must still be deleted. Kept across cycles so a
    /// failed delete retries instead of leaking a stale row.
    pending_deletes: Vec<String>,
}

impl BattleManager {
    pub fn new(store: BattleStore, config: BattleConfig) -> Self {
        Self {
            battles: HashMap::new(),
            store,
            chunks: ChunkStore::new(&config.chunk_dir),
            restore: RestorePipeline::new(config.chunks_per_tick, config.denylist.clone()),
            config,
            signals: Vec::new(),
            pending_deletes: Vec::new(),
        }
    }

    /// Load every stored battle and re-register it against the live world.
    /// Returns how many battles resumed.
    pub async fn resume_battles(
        &mut self,
        world: &dyn WorldDirectory,
    ) -> Result<usize, sqlx::Error> {
        let records = self.store.all().await?;
        let count = records.len();
        for record in records {
            let battle = Battle::resume(record, world);
            tracing::info!(town = battle.town(), stage = battle.current_stage().as_str(), "battle resumed");
            self.battles.insert(battle.town().to_string(), battle);
        }
        Ok(count)
    }

    /// Open a battle against `town`. Captures the town's terrain before
    /// anything can be damaged. Returns false when the town is already
    /// contested or cannot be fought over.
    pub fn start_battle<W: GameWorld>(
        &mut self,
        town: &str,
        attacker: Option<String>,
        defender: Option<String>,
        world: &W,
        now: u64,
    ) -> bool {
        if self.battles.contains_key(town) {
            tracing::warn!(town, "battle already in progress");
            return false;
        }
        let Some(battle) = Battle::start(town, attacker, defender, world, now) else {
            tracing::warn!(town, "town missing or has no home plot");
            return false;
        };

        let chunks: Vec<_> = battle.initial_plots().iter().map(|p| p.chunk()).collect();
        self.chunks.capture(world, &chunks);

        self.signals.push(BattleSignal::BattleStarted {
            town: town.to_string(),
        });
        self.battles.insert(town.to_string(), battle);
        true
    }

    /// One clock cycle: advance every battle whose stage timer has run out,
    /// then persist the whole registry. Storage failures are logged and
    /// retried on the next cycle; the in-memory state is authoritative.
    pub async fn run_cycle<W: GameWorld>(&mut self, world: &mut W, now: u64) {
        let due: Vec<String> = self
            .battles
            .values()
            .filter(|b| b.is_pending_stage_advance(now))
            .map(|b| b.town().to_string())
            .collect();
        for town in due {
            let transition = match self.battles.get_mut(&town) {
                Some(battle) => battle.advance_stage(true, now, world, &mut self.signals),
                None => continue,
            };
            self.apply_transition(&town, transition);
        }

        for battle in self.battles.values() {
            if let Err(e) = self.store.upsert(&BattleRecord::of(battle)).await {
                tracing::error!(town = battle.town(), error = %e, "failed to persist battle");
            }
        }
        let deletes = std::mem::take(&mut self.pending_deletes);
        for town in deletes {
            if let Err(e) = self.store.delete(&town).await {
                tracing::error!(town, error = %e, "failed to delete battle row");
                self.pending_deletes.push(town);
            }
        }
    }

    /// The attacker took the town's home plot. Only meaningful during the
    /// flag stage; at any other time the capture is ignored.
    pub fn home_block_captured<W: GameWorld>(
        &mut self,
        town: &str,
        world: &mut W,
        now: u64,
    ) -> bool {
        let Some(battle) = self.battles.get_mut(town) else {
            return false;
        };
        if battle.current_stage() != BattleStage::Flag {
            return false;
        }
        let transition = battle.lose_defense(now, world, &mut self.signals);
        self.apply_transition(town, transition);
        true
    }

    /// Settle an active battle immediately, e.g. when the attacking or
    /// defending side was deleted. `win` is from the defender's view.
    pub fn force_end<W: GameWorld>(
        &mut self,
        town: &str,
        win: bool,
        world: &mut W,
        now: u64,
    ) -> bool {
        let Some(battle) = self.battles.get_mut(town) else {
            return false;
        };
        if !battle.is_active() {
            return false;
        }
        let transition = if win {
            battle.win_defense(now, world, &mut self.signals)
        } else {
            battle.lose_defense(now, world, &mut self.signals)
        };
        self.apply_transition(town, transition);
        true
    }

    /// Advance a battle without waiting for its timer. Administrative.
    pub fn force_advance<W: GameWorld>(
        &mut self,
        town: &str,
        win: bool,
        world: &mut W,
        now: u64,
    ) -> bool {
        let Some(battle) = self.battles.get_mut(town) else {
            return false;
        };
        let transition = battle.advance_stage(win, now, world, &mut self.signals);
        self.apply_transition(town, transition);
        true
    }

    fn apply_transition(&mut self, town: &str, transition: Transition) {
        if !transition.restore.is_empty() {
            self.restore.enqueue(
                self.chunks.clone(),
                transition.restore,
                self.config.read_batch_size,
            );
        }
        if transition.remove {
            self.battles.remove(town);
            self.pending_deletes.push(town.to_string());
        }
    }

    /// Paint a slice of any in-flight terrain restore. Called on the paint
    /// cadence, independent of the battle cycle.
    pub fn restore_tick(&mut self, grid: &mut dyn TerrainGrid) {
        self.restore.tick(grid);
    }

    /// Drain accumulated signals, oldest first.
    pub fn take_signals(&mut self) -> Vec<BattleSignal> {
        std::mem::take(&mut self.signals)
    }

    pub fn battle(&self, town: &str) -> Option<&Battle> {
        self.battles.get(town)
    }

    pub fn battle_mut(&mut self, town: &str) -> Option<&mut Battle> {
        self.battles.get_mut(town)
    }

    pub fn battles(&self) -> impl Iterator<Item = &Battle> {
        self.battles.values()
    }

    pub fn len(&self) -> usize {
        self.battles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.battles.is_empty()
    }
}
