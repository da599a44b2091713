use scanner_core::ItemType;
use serde::{Deserialize, Serialize};

/// Ships live in this catalog category.
pub const SHIP_CATEGORY_ID: i32 = 6;

/// Fittable modules (including rigs) live here; loose modules in a ship
/// contract get the unknown-fitted-state haircut.
pub const MODULE_CATEGORY_ID: i32 = 7;

/// Rig groups in the module category.
const RIG_GROUP_RANGE: std::ops::RangeInclusive<i32> = 773..=786;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipSize {
    Small,
    Medium,
    Large,
}

/// Frigates, destroyers and their tech-2 derivatives.
const SMALL_SHIP_GROUPS: &[i32] = &[25, 31, 237, 324, 420, 541, 830, 831, 834, 893, 1283, 1305];

/// Cruiser and battlecruiser hulls, haulers.
const MEDIUM_SHIP_GROUPS: &[i32] = &[26, 28, 358, 380, 419, 540, 543, 832, 833, 894, 906, 963];

/// Battleships and everything capital, freighters included. Jump
/// freighters (group 902) are classified here by group id; the name
/// fallback below never sees them.
const LARGE_SHIP_GROUPS: &[i32] = &[27, 485, 513, 547, 659, 883, 898, 900, 902, 941, 30, 1538];

/// Size class from the catalog group. The name-based fallback only runs
/// for rows with an unknown (zero) group id.
pub fn ship_size(item_type: &ItemType) -> Option<ShipSize> {
    if item_type.category_id != SHIP_CATEGORY_ID {
        return None;
    }
    if item_type.group_id != 0 {
        if SMALL_SHIP_GROUPS.contains(&item_type.group_id) {
            return Some(ShipSize::Small);
        }
        if MEDIUM_SHIP_GROUPS.contains(&item_type.group_id) {
            return Some(ShipSize::Medium);
        }
        if LARGE_SHIP_GROUPS.contains(&item_type.group_id) {
            return Some(ShipSize::Large);
        }
        return None;
    }
    ship_size_from_name(&item_type.name)
}

fn ship_size_from_name(name: &str) -> Option<ShipSize> {
    let lower = name.to_ascii_lowercase();
    for (needle, size) in [
        ("frigate", ShipSize::Small),
        ("destroyer", ShipSize::Small),
        ("shuttle", ShipSize::Small),
        ("cruiser", ShipSize::Medium),
        ("industrial", ShipSize::Medium),
        ("battleship", ShipSize::Large),
        ("freighter", ShipSize::Large),
        ("carrier", ShipSize::Large),
        ("dreadnought", ShipSize::Large),
    ] {
        if lower.contains(needle) {
            return Some(size);
        }
    }
    None
}

pub fn is_rig(item_type: &ItemType) -> bool {
    item_type.category_id == MODULE_CATEGORY_ID && RIG_GROUP_RANGE.contains(&item_type.group_id)
}

/// Rig size from the catalog name prefix; rig names always lead with it.
pub fn rig_size(item_type: &ItemType) -> Option<ShipSize> {
    if !is_rig(item_type) {
        return None;
    }
    let name = item_type.name.as_str();
    if name.starts_with("Small") {
        Some(ShipSize::Small)
    } else if name.starts_with("Medium") {
        Some(ShipSize::Medium)
    } else if name.starts_with("Large") || name.starts_with("Capital") {
        Some(ShipSize::Large)
    } else {
        None
    }
}

pub fn is_loose_module(item_type: &ItemType) -> bool {
    item_type.category_id == MODULE_CATEGORY_ID && !is_rig(item_type)
}
