use std::time::Duration;

use uuid::Uuid;

use super::coord::PlotCoord;
use super::record::BattleRecord;
use super::stage::{BattleStage, StageDurations, compute_stage_times};
use crate::chunk::ChunkCoord;
use crate::signal::BattleSignal;
use crate::world::WorldDirectory;

/// An active flag placement: who planted it and which plot it contests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlagMarker {
    pub owner: String,
    pub plot: PlotCoord,
}

/// Side effects of a stage transition that the registry must carry out.
/// The battle mutates the world itself; deregistration and terrain
/// restoration belong to the manager.
#[derive(Debug, Default)]
pub struct Transition {
    /// The battle is over and must leave the registry (and storage).
    pub remove: bool,
    /// Chunks whose pre-battle terrain should be repainted.
    pub restore: Vec<ChunkCoord>,
}

/// All the state of one siege against one town.
///
/// References to the attacker, defender, world and initial mayor are held by
/// name or UUID and may be absent: a battle resumed from storage tolerates
/// entities that vanished while the process was down and then behaves as a
/// degenerate no-op contest until it naturally expires.
#[derive(Debug)]
pub struct Battle {
    town: String,
    attacker: Option<String>,
    defender: Option<String>,
    home: PlotCoord,
    world_id: Option<Uuid>,
    initial_plots: Vec<PlotCoord>,
    initial_mayor: Option<Uuid>,
    city_state: bool,
    stage: BattleStage,
    stage_started_at: u64,
    durations: StageDurations,
    /// Live flags, in placement order. Never persisted; empty after resume.
    flags: Vec<FlagMarker>,
}

impl Battle {
    /// Begin a new battle against `town` at `now` (epoch millis).
    ///
    /// Returns `None` when the town does not exist or has no home plot; a
    /// contest without a home plot has no win condition.
    pub fn start(
        town: &str,
        attacker: Option<String>,
        defender: Option<String>,
        world: &dyn WorldDirectory,
        now: u64,
    ) -> Option<Self> {
        if !world.town_exists(town) {
            return None;
        }
        let home = world.home_plot(town)?;
        let initial_plots = world.town_plots(town);
        let city_state = world.is_city_state(town);
        Some(Self {
            durations: compute_stage_times(initial_plots.len(), city_state),
            town: town.to_string(),
            attacker,
            defender,
            home,
            world_id: world.town_world(town),
            initial_plots,
            initial_mayor: world.town_mayor(town),
            city_state,
            stage: BattleStage::PreFlag,
            stage_started_at: now,
            flags: Vec::new(),
        })
    }

    /// Rebuild a battle from a stored record, re-resolving every reference
    /// against the live world. Vanished nations, worlds or residents become
    /// `None`; the battle itself always resumes.
    pub fn resume(record: BattleRecord, world: &dyn WorldDirectory) -> Self {
        let resolve_nation =
            |n: Option<String>| n.filter(|name| world.nation_exists(name));
        Self {
            durations: compute_stage_times(record.town_blocks.len(), record.city_state),
            attacker: resolve_nation(record.attacker),
            defender: resolve_nation(record.defender),
            home: PlotCoord::new(record.home_x, record.home_z),
            world_id: record.world_id.filter(|&id| world.world_exists(id)),
            initial_mayor: record.initial_mayor.filter(|&id| world.resident_exists(id)),
            town: record.contested_town,
            initial_plots: record.town_blocks,
            city_state: record.city_state,
            stage: record.stage,
            stage_started_at: record.stage_start_time,
            flags: Vec::new(),
        }
    }

    pub fn town(&self) -> &str {
        &self.town
    }

    pub fn attacker(&self) -> Option<&str> {
        self.attacker.as_deref()
    }

    pub fn defender(&self) -> Option<&str> {
        self.defender.as_deref()
    }

    pub fn home_plot(&self) -> PlotCoord {
        self.home
    }

    pub fn world_id(&self) -> Option<Uuid> {
        self.world_id
    }

    /// The plots the town held when the battle began. Captured once, never
    /// mutated.
    pub fn initial_plots(&self) -> &[PlotCoord] {
        &self.initial_plots
    }

    pub fn initial_mayor(&self) -> Option<Uuid> {
        self.initial_mayor
    }

    pub fn is_city_state(&self) -> bool {
        self.city_state
    }

    pub fn current_stage(&self) -> BattleStage {
        self.stage
    }

    /// Epoch millis at which the current stage started.
    pub fn stage_start_time(&self) -> u64 {
        self.stage_started_at
    }

    pub fn duration(&self, stage: BattleStage) -> Duration {
        self.durations.get(stage)
    }

    /// Whether flags may still decide this battle (pre-flag or flag stage).
    pub fn is_active(&self) -> bool {
        matches!(self.stage, BattleStage::PreFlag | BattleStage::Flag)
    }

    /// Combined pre-flag and flag duration.
    pub fn active_period(&self) -> Duration {
        self.durations.pre_flag + self.durations.flag
    }

    /// Time left in the current stage, clamped at zero.
    pub fn time_remaining(&self, now: u64) -> Duration {
        let elapsed = Duration::from_millis(now.saturating_sub(self.stage_started_at));
        self.duration(self.stage).saturating_sub(elapsed)
    }

    /// Whether the current stage's timer has run out.
    pub fn is_pending_stage_advance(&self, now: u64) -> bool {
        self.time_remaining(now).is_zero()
    }

    fn set_stage(&mut self, stage: BattleStage, now: u64) {
        self.stage = stage;
        self.stage_started_at = now;
    }

    /// Record a flag placed by `owner` against `plot`.
    pub fn add_flag(&mut self, owner: &str, plot: PlotCoord) {
        self.flags.push(FlagMarker {
            owner: owner.to_string(),
            plot,
        });
    }

    /// Drop `owner`'s first flag, if any.
    pub fn remove_flag(&mut self, owner: &str) {
        if let Some(pos) = self.flags.iter().position(|f| f.owner == owner) {
            self.flags.remove(pos);
        }
    }

    /// The flag contesting `plot`, if one is planted there. The flag list is
    /// expected to stay small; a linear scan is fine.
    pub fn flag_at(&self, plot: PlotCoord) -> Option<&FlagMarker> {
        self.flags.iter().find(|f| f.plot == plot)
    }

    pub fn flags(&self) -> &[FlagMarker] {
        &self.flags
    }

    /// Plots the attacker has taken so far: the initial holdings minus what
    /// the town still owns.
    pub fn captured_plots(&self, world: &dyn WorldDirectory) -> Vec<PlotCoord> {
        let current = world.town_plots(&self.town);
        self.initial_plots
            .iter()
            .copied()
            .filter(|p| !current.contains(p))
            .collect()
    }

    /// Whether a resident belongs to this battle: a member of the attacking
    /// or defending nation or one of their allies, or a resident of the
    /// contested town itself.
    pub fn is_participant(&self, resident: Uuid, world: &dyn WorldDirectory) -> bool {
        let Some(nation) = world.resident_nation(resident) else {
            return false;
        };
        let related_to = |side: Option<&str>| {
            side.is_some_and(|s| s == nation || world.are_allied(s, &nation))
        };
        related_to(self.attacker())
            || related_to(self.defender())
            || world.is_town_resident(resident, &self.town)
    }

    /// Advance to the next stage. `win` selects the outcome when the flag
    /// stage ends on its timer; a captured home plot goes through
    /// [`Battle::lose_defense`] directly instead.
    pub fn advance_stage(
        &mut self,
        win: bool,
        now: u64,
        world: &mut dyn WorldDirectory,
        signals: &mut Vec<BattleSignal>,
    ) -> Transition {
        match self.stage {
            BattleStage::PreFlag => {
                self.make_flaggable(now, signals);
                Transition::default()
            }
            BattleStage::Flag => {
                if win {
                    self.win_defense(now, world, signals)
                } else {
                    self.lose_defense(now, world, signals)
                }
            }
            BattleStage::Ruined => self.un_ruin(now, world),
            BattleStage::Dormant => Transition {
                remove: true,
                restore: Vec::new(),
            },
        }
    }

    /// Open the flag stage.
    pub fn make_flaggable(&mut self, now: u64, signals: &mut Vec<BattleSignal>) {
        self.set_stage(BattleStage::Flag, now);
        signals.push(BattleSignal::FlagPhaseBegan {
            town: self.town.clone(),
        });
    }

    /// The defense held: time ran out before the home plot fell. Returns the
    /// territory, goes dormant and schedules the terrain restore.
    pub fn win_defense(
        &mut self,
        now: u64,
        world: &mut dyn WorldDirectory,
        signals: &mut Vec<BattleSignal>,
    ) -> Transition {
        self.end_war_procedures(world);
        let transition = self.make_dormant(now);
        signals.push(BattleSignal::BattleEnded {
            town: self.town.clone(),
            defended: true,
        });
        transition
    }

    /// The defense fell: the home plot was captured (or the defender ceased
    /// to exist). Returns the territory and puts the town into ruin.
    pub fn lose_defense(
        &mut self,
        now: u64,
        world: &mut dyn WorldDirectory,
        signals: &mut Vec<BattleSignal>,
    ) -> Transition {
        self.end_war_procedures(world);
        self.set_stage(BattleStage::Ruined, now);
        world.set_ruined(&self.town, true);
        signals.push(BattleSignal::BattleEnded {
            town: self.town.clone(),
            defended: false,
        });
        Transition::default()
    }

    /// Lift the ruined state, reinstating the pre-battle mayor when the town
    /// is still ruined and the mayor still exists, then go dormant.
    fn un_ruin(&mut self, now: u64, world: &mut dyn WorldDirectory) -> Transition {
        let transition = self.make_dormant(now);
        if world.is_ruined(&self.town) {
            world.set_ruined(&self.town, false);
            if let Some(mayor) = self.initial_mayor {
                world.set_mayor(&self.town, mayor);
            }
        }
        transition
    }

    fn make_dormant(&mut self, now: u64) -> Transition {
        self.set_stage(BattleStage::Dormant, now);
        Transition {
            remove: false,
            restore: self.initial_plots.iter().map(|p| p.chunk()).collect(),
        }
    }

    /// End-of-war bookkeeping shared by both outcomes: clear every live
    /// flag's physical object and hand all captured plots back to the town.
    /// A refused transfer is logged; the battle still finishes its
    /// transition, accepting that world and battle state may diverge.
    fn end_war_procedures(&mut self, world: &mut dyn WorldDirectory) {
        for flag in self.flags.drain(..) {
            world.clear_flag_objects(&flag.owner);
        }
        if let Err(e) = world.transfer_plots(&self.town, &self.initial_plots, self.home) {
            tracing::error!(town = %self.town, error = %e, "failed to return plots");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestWorld;

    fn world_with_town(n: usize) -> TestWorld {
        let mut world = TestWorld::new();
        world.add_town("Ironhold", n, Some("Dominion"));
        world.add_nation("Raiders");
        world
    }

    fn started(world: &TestWorld) -> Battle {
        Battle::start(
            "Ironhold",
            Some("Raiders".into()),
            Some("Dominion".into()),
            world,
            1_000,
        )
        .unwrap()
    }

    #[test]
    fn fresh_battle_invariants() {
        let world = world_with_town(10);
        let battle = started(&world);
        assert_eq!(battle.current_stage(), BattleStage::PreFlag);
        assert_eq!(battle.stage_start_time(), 1_000);
        assert!(battle.flags().is_empty());
        assert_eq!(battle.initial_plots().len(), 10);
        assert!(battle.is_active());
        // 5 minutes of pre-flag plus 17 of flag stage.
        assert_eq!(battle.active_period(), Duration::from_secs(22 * 60));
    }

    #[test]
    fn start_requires_existing_town_with_home() {
        let world = TestWorld::new();
        assert!(Battle::start("Nowhere", None, None, &world, 0).is_none());

        let mut world = world_with_town(3);
        world.towns.get_mut("Ironhold").unwrap().home = None;
        assert!(Battle::start("Ironhold", None, None, &world, 0).is_none());
    }

    #[test]
    fn pending_advance_follows_stage_timer() {
        let world = world_with_town(10);
        let battle = started(&world);
        // PRE_FLAG for 10 plots is 5 minutes.
        assert!(!battle.is_pending_stage_advance(1_000));
        assert!(!battle.is_pending_stage_advance(1_000 + 299_999));
        assert!(battle.is_pending_stage_advance(1_000 + 300_000));
        assert_eq!(battle.time_remaining(1_000 + 400_000), Duration::ZERO);
    }

    #[test]
    fn pre_flag_advances_to_flag_with_signal() {
        let mut world = world_with_town(10);
        let mut battle = started(&world);
        let mut signals = Vec::new();

        let t = battle.advance_stage(true, 301_000, &mut world, &mut signals);
        assert!(!t.remove);
        assert!(t.restore.is_empty());
        assert_eq!(battle.current_stage(), BattleStage::Flag);
        assert_eq!(battle.stage_start_time(), 301_000);
        assert_eq!(
            signals,
            vec![BattleSignal::FlagPhaseBegan {
                town: "Ironhold".into()
            }]
        );
    }

    #[test]
    fn flag_timer_expiry_wins_defense_and_restores() {
        let mut world = world_with_town(4);
        let mut battle = started(&world);
        let mut signals = Vec::new();
        battle.make_flaggable(2_000, &mut signals);
        battle.add_flag("raider1", PlotCoord::new(0, 0));

        let t = battle.advance_stage(true, 3_000, &mut world, &mut signals);
        assert_eq!(battle.current_stage(), BattleStage::Dormant);
        assert!(!t.remove);
        assert_eq!(t.restore.len(), 4);
        assert!(battle.flags().is_empty());
        assert_eq!(world.cleared_flags, vec!["raider1".to_string()]);
        assert_eq!(world.transfers.len(), 1);
        assert!(signals.contains(&BattleSignal::BattleEnded {
            town: "Ironhold".into(),
            defended: true,
        }));
    }

    #[test]
    fn home_capture_loses_defense_and_ruins() {
        let mut world = world_with_town(4);
        let mut battle = started(&world);
        let mut signals = Vec::new();
        battle.make_flaggable(2_000, &mut signals);

        let t = battle.lose_defense(5_000, &mut world, &mut signals);
        assert_eq!(battle.current_stage(), BattleStage::Ruined);
        assert_eq!(battle.stage_start_time(), 5_000);
        assert!(!t.remove);
        assert!(t.restore.is_empty());
        assert!(world.is_ruined("Ironhold"));
        assert!(signals.contains(&BattleSignal::BattleEnded {
            town: "Ironhold".into(),
            defended: false,
        }));
    }

    #[test]
    fn ruined_advance_unruins_and_reinstates_mayor() {
        let mut world = world_with_town(4);
        let mayor = world.towns["Ironhold"].mayor.unwrap();
        let mut battle = started(&world);
        let mut signals = Vec::new();
        battle.make_flaggable(2_000, &mut signals);
        battle.lose_defense(3_000, &mut world, &mut signals);

        // Simulate the world handing the mayorship to someone else meanwhile.
        world.towns.get_mut("Ironhold").unwrap().mayor = Some(Uuid::new_v4());

        let t = battle.advance_stage(true, 10_000, &mut world, &mut signals);
        assert_eq!(battle.current_stage(), BattleStage::Dormant);
        assert_eq!(t.restore.len(), 4);
        assert!(!world.is_ruined("Ironhold"));
        assert_eq!(world.towns["Ironhold"].mayor, Some(mayor));
    }

    #[test]
    fn dormant_advance_requests_removal() {
        let mut world = world_with_town(4);
        let mut battle = started(&world);
        let mut signals = Vec::new();
        battle.make_flaggable(0, &mut signals);
        battle.win_defense(0, &mut world, &mut signals);

        let t = battle.advance_stage(true, 999_999_999, &mut world, &mut signals);
        assert!(t.remove);
        assert!(t.restore.is_empty());
    }

    #[test]
    fn flag_bookkeeping() {
        let world = world_with_town(4);
        let mut battle = started(&world);
        let plot_a = PlotCoord::new(0, 0);
        let plot_b = PlotCoord::new(1, 0);

        battle.add_flag("alice", plot_a);
        battle.add_flag("bob", plot_b);
        battle.add_flag("alice", plot_b);

        assert_eq!(battle.flag_at(plot_a).unwrap().owner, "alice");
        // Removal drops the first match by owner.
        battle.remove_flag("alice");
        assert!(battle.flag_at(plot_a).is_none());
        assert_eq!(battle.flags().len(), 2);
        battle.remove_flag("nobody");
        assert_eq!(battle.flags().len(), 2);
    }

    #[test]
    fn participant_rules() {
        let mut world = world_with_town(4);
        world.add_nation("Allies");
        world.ally("Raiders", "Allies");

        let attacker_member = world.add_resident(Some("Raiders"));
        let ally_member = world.add_resident(Some("Allies"));
        let neutral = world.add_resident(Some("Bystanders"));
        let nationless = world.add_resident(None);
        let local = world.add_resident(Some("Bystanders"));
        world.add_town_resident("Ironhold", local);

        let battle = started(&world);
        assert!(battle.is_participant(attacker_member, &world));
        assert!(battle.is_participant(ally_member, &world));
        assert!(!battle.is_participant(neutral, &world));
        assert!(!battle.is_participant(nationless, &world));
        assert!(battle.is_participant(local, &world));
    }

    #[test]
    fn factionless_settlement_has_no_defender_checks() {
        let mut world = TestWorld::new();
        world.add_town("Freehold", 3, None);
        world.add_nation("Raiders");
        let battle =
            Battle::start("Freehold", Some("Raiders".into()), None, &world, 0).unwrap();
        assert_eq!(battle.defender(), None);

        let outsider = world.add_resident(Some("Bystanders"));
        assert!(!battle.is_participant(outsider, &world));
    }

    #[test]
    fn captured_plots_are_initial_minus_current() {
        let mut world = world_with_town(4);
        let battle = started(&world);
        let taken = battle.initial_plots()[0];
        world
            .towns
            .get_mut("Ironhold")
            .unwrap()
            .plots
            .retain(|p| *p != taken);

        assert_eq!(battle.captured_plots(&world), vec![taken]);
    }

    #[test]
    fn transfer_failure_still_completes_transition() {
        let mut world = world_with_town(4);
        world.fail_transfers = true;
        let mut battle = started(&world);
        let mut signals = Vec::new();
        battle.make_flaggable(0, &mut signals);

        battle.win_defense(1_000, &mut world, &mut signals);
        assert_eq!(battle.current_stage(), BattleStage::Dormant);
    }
}
