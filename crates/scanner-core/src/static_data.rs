use crate::universe::UniverseGraph;
use std::collections::{HashMap, HashSet};

/// Item catalog entry.
#[derive(Debug, Clone)]
pub struct ItemType {
    pub name: String,
    /// Packaged volume in m3.
    pub volume: f64,
    pub group_id: i32,
    pub category_id: i32,
}

#[derive(Debug, Clone)]
pub struct SolarSystem {
    pub name: String,
    pub region_id: i32,
    pub security: f64,
}

#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Station {
    pub system_id: i32,
}

/// Immutable game data assembled by the external loader. The core only
/// reads from it after construction.
#[derive(Debug, Clone, Default)]
pub struct StaticData {
    pub types: HashMap<i32, ItemType>,
    pub systems: HashMap<i32, SolarSystem>,
    pub regions: HashMap<i32, Region>,
    pub stations: HashMap<i64, Station>,
    pub universe: UniverseGraph,
    /// Types that cannot be listed on the open market. Supplied as data,
    /// not hard-coded ids.
    pub market_disabled: HashSet<i32>,
}

impl StaticData {
    pub fn type_name(&self, type_id: i32) -> Option<&str> {
        self.types.get(&type_id).map(|t| t.name.as_str())
    }

    pub fn type_volume(&self, type_id: i32) -> Option<f64> {
        self.types.get(&type_id).map(|t| t.volume)
    }

    pub fn system_name(&self, system_id: i32) -> Option<&str> {
        self.systems.get(&system_id).map(|s| s.name.as_str())
    }

    pub fn region_name(&self, region_id: i32) -> Option<&str> {
        self.regions.get(&region_id).map(|r| r.name.as_str())
    }

    pub fn region_of_system(&self, system_id: i32) -> Option<i32> {
        self.systems.get(&system_id).map(|s| s.region_id)
    }

    pub fn station_system(&self, location_id: i64) -> Option<i32> {
        self.stations.get(&location_id).map(|s| s.system_id)
    }

    pub fn is_market_disabled(&self, type_id: i32) -> bool {
        self.market_disabled.contains(&type_id)
    }
}
