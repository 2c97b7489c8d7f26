//! Outbound notifications. Chat, UI and permission collaborators consume
//! these; the engine itself only emits them.

/// A notification produced by a battle transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BattleSignal {
    /// A battle was started against `town`.
    BattleStarted { town: String },
    /// The battle entered its flag stage; flags may now be placed.
    FlagPhaseBegan { town: String },
    /// The battle ended. `defended` is true when the defense held.
    BattleEnded { town: String, defended: bool },
}

impl BattleSignal {
    /// The contested town this signal concerns.
    pub fn town(&self) -> &str {
        match self {
            BattleSignal::BattleStarted { town }
            | BattleSignal::FlagPhaseBegan { town }
            | BattleSignal::BattleEnded { town, .. } => town,
        }
    }
}
