use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Location ids above this value are player-owned structures, not NPC stations.
pub const STRUCTURE_ID_FLOOR: i64 = 1_000_000_000_000;

/// Books where best ask <= best bid / JUNK_BOOK_RATIO are manipulated junk.
pub const JUNK_BOOK_RATIO: f64 = 100.0;

/// One resting market offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub type_id: i32,
    /// Station or player structure holding the order.
    pub location_id: i64,
    pub system_id: i32,
    pub price: f64,
    pub volume_remain: i64,
    pub is_buy_order: bool,
}

/// Which side(s) of the book to fetch from a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
    All,
}

/// One daily bar of regional market history for a type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub volume: i64,
    pub order_count: i64,
}

/// Per-type pricing snapshot derived within one scan.
///
/// When `has_history` is false consumers must fall back to book-depth
/// proxies and never compute confidence-sensitive outputs from the
/// history fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemPriceData {
    pub min_ask: f64,
    pub ask_volume_total: i64,
    pub ask_order_count: u32,
    pub vwap_30d: f64,
    pub avg_daily_volume_7d: f64,
    pub has_history: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractKind {
    ItemExchange,
    Other,
}

/// Public fixed-price contract header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub contract_id: i64,
    pub start_location_id: i64,
    pub kind: ContractKind,
    pub price: f64,
    pub volume: f64,
    pub title: String,
    pub date_expired: DateTime<Utc>,
}

/// One line inside a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractItem {
    pub type_id: i32,
    pub quantity: i64,
    /// true = delivered to the buyer; false = buyer must provide it.
    pub is_included: bool,
    pub is_blueprint_copy: bool,
    /// -1 marks a blueprint original.
    pub runs: i32,
    /// Some(_) on assembled/damaged items; damaged items are excluded
    /// from valuation.
    pub damage: Option<f64>,
    pub is_singleton: bool,
    /// Raw fitting slot, e.g. "RigSlot0", "HiSlot3", "Cargo".
    pub slot_flag: String,
}

impl ContractItem {
    pub fn is_blueprint_original(&self) -> bool {
        self.runs == -1
    }

    pub fn is_damaged(&self) -> bool {
        self.damage.map(|d| d > 0.0).unwrap_or(false)
    }

    pub fn is_rig_slot(&self) -> bool {
        self.slot_flag.starts_with("RigSlot")
    }
}

/// Historical execution from the user's wallet, input to portfolio
/// analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub date: DateTime<Utc>,
    pub type_id: i32,
    pub location_id: i64,
    pub is_buy: bool,
    pub unit_price: f64,
    pub quantity: i64,
}

/// One of the user's own resting market orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveOrder {
    pub order_id: i64,
    pub type_id: i32,
    pub location_id: i64,
    pub is_buy_order: bool,
    pub price: f64,
    pub volume_remain: i64,
    pub volume_total: i64,
}

impl ActiveOrder {
    pub fn filled_quantity(&self) -> i64 {
        (self.volume_total - self.volume_remain).max(0)
    }
}

/// Inventory the user already holds at a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub type_id: i32,
    pub location_id: i64,
    pub quantity: i64,
    pub avg_cost: f64,
}
