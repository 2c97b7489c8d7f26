use uuid::Uuid;

use super::battle::Battle;
use super::coord::PlotCoord;
use super::stage::BattleStage;

/// The persisted image of a battle: one row per contested town.
///
/// Everything needed to resume after a crash, and nothing more. Live flags
/// are deliberately absent; their physical objects do not survive a restart
/// either.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleRecord {
    pub contested_town: String,
    pub attacker: Option<String>,
    pub defender: Option<String>,
    pub home_x: i32,
    pub home_z: i32,
    /// Epoch millis at which the current stage started.
    pub stage_start_time: u64,
    pub city_state: bool,
    pub stage: BattleStage,
    pub world_id: Option<Uuid>,
    pub town_blocks: Vec<PlotCoord>,
    pub initial_mayor: Option<Uuid>,
}

impl BattleRecord {
    pub fn of(battle: &Battle) -> Self {
        Self {
            contested_town: battle.town().to_string(),
            attacker: battle.attacker().map(str::to_string),
            defender: battle.defender().map(str::to_string),
            home_x: battle.home_plot().x,
            home_z: battle.home_plot().z,
            stage_start_time: battle.stage_start_time(),
            city_state: battle.is_city_state(),
            stage: battle.current_stage(),
            world_id: battle.world_id(),
            town_blocks: battle.initial_plots().to_vec(),
            initial_mayor: battle.initial_mayor(),
        }
    }
}

/// Encode plots as `"x-z"` pairs joined by `":"`.
pub fn encode_plots(plots: &[PlotCoord]) -> String {
    plots
        .iter()
        .map(|p| format!("{}-{}", p.x, p.z))
        .collect::<Vec<_>>()
        .join(":")
}

/// Decode the [`encode_plots`] form. Unparseable pairs are dropped with a
/// warning; one bad plot should not discard a whole battle.
pub fn decode_plots(encoded: &str) -> Vec<PlotCoord> {
    if encoded.is_empty() {
        return Vec::new();
    }
    encoded
        .split(':')
        .filter_map(|pair| match decode_pair(pair) {
            Some(plot) => Some(plot),
            None => {
                tracing::warn!(pair, "dropping malformed plot coordinate");
                None
            }
        })
        .collect()
}

/// Split `"x-z"` at the separator dash. Either coordinate may be negative,
/// so the separator is the first dash past index zero. Checked slicing: the
/// input comes from storage and may hold arbitrary bytes.
fn decode_pair(pair: &str) -> Option<PlotCoord> {
    let sep = pair.get(1..)?.find('-')? + 1;
    let x = pair.get(..sep)?.parse().ok()?;
    let z = pair.get(sep + 1..)?.parse().ok()?;
    Some(PlotCoord::new(x, z))
}
