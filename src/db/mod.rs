//! SQLite persistence. One table, one row per live battle; rows are upserted
//! every cycle and deleted when a battle is removed, so a crash at any point
//! resumes from the last completed cycle.

pub mod battles;
pub mod migrate;

pub use battles::BattleStore;
pub use migrate::{connect, migrate};
