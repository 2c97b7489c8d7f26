//! In-memory world double shared by unit and integration tests.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::chunk::ChunkCoord;
use crate::model::PlotCoord;
use crate::world::{Cell, CellState, TerrainGrid, TransferError, WorldDirectory};

#[derive(Debug, Default)]
pub struct TestTown {
    pub plots: Vec<PlotCoord>,
    pub home: Option<PlotCoord>,
    pub mayor: Option<Uuid>,
    pub nation: Option<String>,
    pub city_state: bool,
    pub ruined: bool,
    pub residents: HashSet<Uuid>,
}

/// Fake world: towns, nations and residents in hash maps, terrain in a
/// cell map. Mutations a battle performs are recorded for assertions.
#[derive(Debug)]
pub struct TestWorld {
    pub world_id: Uuid,
    pub towns: HashMap<String, TestTown>,
    pub nations: HashSet<String>,
    pub alliances: HashSet<(String, String)>,
    pub residents: HashMap<Uuid, Option<String>>,
    pub cells: HashMap<(ChunkCoord, usize), Cell>,
    pub dropped_items: HashMap<ChunkCoord, u32>,
    /// `(town, plots, home)` of every successful transfer.
    pub transfers: Vec<(String, Vec<PlotCoord>, PlotCoord)>,
    pub cleared_flags: Vec<String>,
    pub fail_transfers: bool,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            world_id: Uuid::new_v4(),
            towns: HashMap::new(),
            nations: HashSet::new(),
            alliances: HashSet::new(),
            residents: HashMap::new(),
            cells: HashMap::new(),
            dropped_items: HashMap::new(),
            transfers: Vec::new(),
            cleared_flags: Vec::new(),
            fail_transfers: false,
        }
    }

    /// Add a town with `plots` plots in a row, home at the first, a fresh
    /// mayor, and an optional nation (registered as a side effect).
    pub fn add_town(&mut self, name: &str, plots: usize, nation: Option<&str>) {
        let plots: Vec<PlotCoord> = (0..plots).map(|i| PlotCoord::new(i as i32, 0)).collect();
        if let Some(nation) = nation {
            self.nations.insert(nation.to_string());
        }
        self.towns.insert(
            name.to_string(),
            TestTown {
                home: plots.first().copied(),
                mayor: Some(Uuid::new_v4()),
                nation: nation.map(str::to_string),
                plots,
                ..TestTown::default()
            },
        );
    }

    pub fn add_nation(&mut self, name: &str) {
        self.nations.insert(name.to_string());
    }

    pub fn ally(&mut self, a: &str, b: &str) {
        self.alliances.insert((a.to_string(), b.to_string()));
    }

    pub fn add_resident(&mut self, nation: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.residents.insert(id, nation.map(str::to_string));
        id
    }

    pub fn add_town_resident(&mut self, town: &str, resident: Uuid) {
        if let Some(town) = self.towns.get_mut(town) {
            town.residents.insert(resident);
        }
    }

    pub fn put_block(
        &mut self,
        chunk: ChunkCoord,
        index: usize,
        material: &str,
        state: Option<CellState>,
    ) {
        self.cells.insert(
            (chunk, index),
            Cell {
                material: material.to_string(),
                state,
            },
        );
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainGrid for TestWorld {
    fn cell(&self, chunk: ChunkCoord, index: usize) -> Option<Cell> {
        self.cells.get(&(chunk, index)).cloned()
    }

    fn set_cell(&mut self, chunk: ChunkCoord, index: usize, material: Option<&str>, state: Option<&str>) {
        match material {
            None => {
                self.cells.remove(&(chunk, index));
            }
            Some(material) => {
                self.cells.insert(
                    (chunk, index),
                    Cell {
                        material: material.to_string(),
                        state: state.map(|encoded| CellState {
                            encoded: encoded.to_string(),
                            facets: Vec::new(),
                        }),
                    },
                );
            }
        }
    }

    fn clear_dropped_items(&mut self, chunk: ChunkCoord) {
        self.dropped_items.remove(&chunk);
    }
}

impl WorldDirectory for TestWorld {
    fn town_exists(&self, town: &str) -> bool {
        self.towns.contains_key(town)
    }

    fn town_world(&self, town: &str) -> Option<Uuid> {
        self.towns.contains_key(town).then_some(self.world_id)
    }

    fn world_exists(&self, world: Uuid) -> bool {
        world == self.world_id
    }

    fn town_plots(&self, town: &str) -> Vec<PlotCoord> {
        self.towns.get(town).map(|t| t.plots.clone()).unwrap_or_default()
    }

    fn home_plot(&self, town: &str) -> Option<PlotCoord> {
        self.towns.get(town)?.home
    }

    fn town_mayor(&self, town: &str) -> Option<Uuid> {
        self.towns.get(town)?.mayor
    }

    fn is_city_state(&self, town: &str) -> bool {
        self.towns.get(town).is_some_and(|t| t.city_state)
    }

    fn nation_exists(&self, nation: &str) -> bool {
        self.nations.contains(nation)
    }

    fn are_allied(&self, a: &str, b: &str) -> bool {
        self.alliances.contains(&(a.to_string(), b.to_string()))
            || self.alliances.contains(&(b.to_string(), a.to_string()))
    }

    fn resident_exists(&self, resident: Uuid) -> bool {
        self.residents.contains_key(&resident)
    }

    fn resident_nation(&self, resident: Uuid) -> Option<String> {
        self.residents.get(&resident)?.clone()
    }

    fn is_town_resident(&self, resident: Uuid, town: &str) -> bool {
        self.towns
            .get(town)
            .is_some_and(|t| t.residents.contains(&resident))
    }

    fn transfer_plots(
        &mut self,
        town: &str,
        plots: &[PlotCoord],
        home: PlotCoord,
    ) -> Result<(), TransferError> {
        if self.fail_transfers {
            return Err(TransferError("transfer refused".to_string()));
        }
        if let Some(t) = self.towns.get_mut(town) {
            t.plots = plots.to_vec();
            t.home = Some(home);
        }
        self.transfers.push((town.to_string(), plots.to_vec(), home));
        Ok(())
    }

    fn set_ruined(&mut self, town: &str, ruined: bool) {
        if let Some(t) = self.towns.get_mut(town) {
            t.ruined = ruined;
        }
    }

    fn is_ruined(&self, town: &str) -> bool {
        self.towns.get(town).is_some_and(|t| t.ruined)
    }

    fn set_mayor(&mut self, town: &str, mayor: Uuid) {
        if let Some(t) = self.towns.get_mut(town) {
            t.mayor = Some(mayor);
        }
    }

    fn clear_flag_objects(&mut self, owner: &str) {
        self.cleared_flags.push(owner.to_string());
    }
}
