//! Collaborator seams. The settlement/faction domain model and the terrain
//! backend live outside this crate; battles talk to them through these traits.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chunk::ChunkCoord;
use crate::model::PlotCoord;

/// Facets of a block state that carry information beyond the bare material
/// id. A state with none of these is not worth persisting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum StateFacet {
    Directional,
    Aged,
    Waterlogged,
    Powered,
    Openable,
    Bisected,
    Lit,
    Levelled,
    Rotated,
    MultiFacing,
}

/// Encoded block state as reported by the terrain backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellState {
    /// Opaque string the backend can later apply verbatim.
    pub encoded: String,
    pub facets: Vec<StateFacet>,
}

/// One non-air cell of a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub material: String,
    pub state: Option<CellState>,
}

/// Read/write access to world terrain, one chunk at a time. Cells are
/// addressed by the flat index described in [`crate::chunk::cell_index`].
///
/// Only the simulation thread may call the mutating methods.
pub trait TerrainGrid {
    /// The cell at `index` of `chunk`, or `None` for air.
    fn cell(&self, chunk: ChunkCoord, index: usize) -> Option<Cell>;

    /// Overwrite a cell. `None` material forces air. A state string, when
    /// present, is applied verbatim after the material.
    fn set_cell(&mut self, chunk: ChunkCoord, index: usize, material: Option<&str>, state: Option<&str>);

    /// Despawn transient dropped-item entities left in the chunk.
    fn clear_dropped_items(&mut self, chunk: ChunkCoord);
}

/// Failure to hand territory back to a town at the end of a battle.
#[derive(Debug)]
pub struct TransferError(pub String);

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plot transfer failed: {}", self.0)
    }
}

impl std::error::Error for TransferError {}

/// Directory of towns, nations and residents, plus the handful of mutations a
/// battle performs on them. Every lookup is by stable name or UUID so that a
/// resumed battle can tolerate entities that no longer exist.
pub trait WorldDirectory {
    fn town_exists(&self, town: &str) -> bool;
    fn town_world(&self, town: &str) -> Option<Uuid>;
    fn world_exists(&self, world: Uuid) -> bool;

    /// The plots a town currently holds.
    fn town_plots(&self, town: &str) -> Vec<PlotCoord>;
    fn home_plot(&self, town: &str) -> Option<PlotCoord>;
    fn town_mayor(&self, town: &str) -> Option<Uuid>;
    fn is_city_state(&self, town: &str) -> bool;

    fn nation_exists(&self, nation: &str) -> bool;
    fn are_allied(&self, a: &str, b: &str) -> bool;

    fn resident_exists(&self, resident: Uuid) -> bool;
    fn resident_nation(&self, resident: Uuid) -> Option<String>;
    fn is_town_resident(&self, resident: Uuid, town: &str) -> bool;

    /// Reassign `plots` to `town` and reset its home plot.
    fn transfer_plots(
        &mut self,
        town: &str,
        plots: &[PlotCoord],
        home: PlotCoord,
    ) -> Result<(), TransferError>;

    fn set_ruined(&mut self, town: &str, ruined: bool);
    fn is_ruined(&self, town: &str) -> bool;
    fn set_mayor(&mut self, town: &str, mayor: Uuid);

    /// Tear down the physical flag objects placed by `owner`.
    fn clear_flag_objects(&mut self, owner: &str);
}

/// Bound for collaborators that provide both the settlement directory and
/// terrain access. The usual embedding implements both on one world handle.
pub trait GameWorld: WorldDirectory + TerrainGrid {}

impl<T: WorldDirectory + TerrainGrid> GameWorld for T {}
