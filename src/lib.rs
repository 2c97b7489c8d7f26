pub mod chunk;
pub mod clock;
pub mod config;
pub mod db;
pub mod manager;
pub mod model;
pub mod signal;
pub mod testutil;
pub mod world;

pub use clock::BattleClock;
pub use config::BattleConfig;
pub use manager::BattleManager;
pub use model::{
    Battle, BattleRecord, BattleStage, FlagMarker, PlotCoord, StageDurations, Transition,
    compute_stage_times,
};
pub use signal::BattleSignal;
pub use world::{Cell, CellState, GameWorld, StateFacet, TerrainGrid, WorldDirectory};
