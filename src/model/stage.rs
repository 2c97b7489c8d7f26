use std::time::Duration;

/// One of the stages a [`Battle`](super::Battle) can be in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BattleStage {
    /// The battle has begun; flags are not yet allowed to be placed.
    PreFlag,
    /// The main stage; flags are being placed and the town is contested.
    Flag,
    /// The defense was lost; the town sits in a ruined state.
    Ruined,
    /// The battle has effectively ended; the town cannot be attacked again
    /// until this stage runs out and the battle is removed.
    Dormant,
}

impl BattleStage {
    /// Stable name used in persistent storage.
    pub fn as_str(self) -> &'static str {
        match self {
            BattleStage::PreFlag => "PRE_FLAG",
            BattleStage::Flag => "FLAG",
            BattleStage::Ruined => "RUINED",
            BattleStage::Dormant => "DORMANT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRE_FLAG" => Some(BattleStage::PreFlag),
            "FLAG" => Some(BattleStage::Flag),
            "RUINED" => Some(BattleStage::Ruined),
            "DORMANT" => Some(BattleStage::Dormant),
            _ => None,
        }
    }
}

/// Duration of every stage of one battle. The stage set is closed, so this is
/// a plain struct rather than a map; a missing entry cannot exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageDurations {
    pub pre_flag: Duration,
    pub flag: Duration,
    pub ruined: Duration,
    pub dormant: Duration,
}

impl StageDurations {
    pub fn get(&self, stage: BattleStage) -> Duration {
        match stage {
            BattleStage::PreFlag => self.pre_flag,
            BattleStage::Flag => self.flag,
            BattleStage::Ruined => self.ruined,
            BattleStage::Dormant => self.dormant,
        }
    }
}

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_DAY: u64 = 86_400;

/// Compute the stage durations for a battle from the contested town's size at
/// battle start (its initial plot count) and its city-state classification.
///
/// Called exactly once at battle construction. Resumed battles recompute from
/// the persisted plot list, so they keep the durations implied by their
/// original size even if the territory later shrank. A zero duration is valid
/// and makes that stage expire on the next clock cycle.
pub fn compute_stage_times(size: usize, city_state: bool) -> StageDurations {
    let n = size as f64;
    StageDurations {
        pre_flag: if city_state {
            Duration::from_secs(30)
        } else {
            minutes((0.5 * n).round() as u64)
        },
        flag: minutes((1.7 * n).round() as u64),
        ruined: minutes((1.5 * n).round() as u64),
        dormant: Duration::from_secs(((n / 30.0).ceil() as u64 + 1) * SECS_PER_DAY),
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * SECS_PER_MINUTE)
}
