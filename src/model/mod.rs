pub mod battle;
pub mod coord;
pub mod record;
pub mod stage;

pub use battle::{Battle, FlagMarker, Transition};
pub use coord::PlotCoord;
pub use record::BattleRecord;
pub use stage::{BattleStage, StageDurations, compute_stage_times};
