use crate::error::ScanError;
use crate::static_data::StaticData;
use serde::{Deserialize, Serialize};

/// Fixed fallbacks applied when a parameter arrives as zero.
pub mod defaults {
    pub const MIN_CONTRACT_PRICE: f64 = 10_000_000.0;
    pub const MAX_CONTRACT_MARGIN: f64 = 100.0;
    pub const MIN_PRICED_RATIO: f64 = 0.8;
    pub const MIN_SELL_ORDER_VOLUME: i64 = 5;
    pub const MAX_VWAP_DEVIATION: f64 = 30.0;
    pub const CONTRACT_FILL_PARTICIPATION: f64 = 0.35;
    pub const CONTRACT_CONSERVATIVE_PRICE_HAIRCUT: f64 = 0.03;
    pub const CONTRACT_DAILY_CARRY_RATE: f64 = 0.001;
    pub const CONTRACT_SHIP_MODULE_VALUE_FACTOR: f64 = 0.55;
    pub const CONTRACT_HOLD_DAYS: u32 = 7;
    pub const CONTRACT_TARGET_CONFIDENCE: f64 = 80.0;
    pub const MAX_UNLIMITED_RESULTS: usize = 1500;
    pub const MAX_ROUTE_RESULTS: usize = 100;
    pub const STATION_WORKING_SET_CAP: usize = 5000;

    /// Bounded history-fetch concurrency per strategy.
    pub const ROUTE_HISTORY_CONCURRENCY: usize = 10;
    pub const STATION_HISTORY_CONCURRENCY: usize = 20;
    pub const CONTRACT_HISTORY_CONCURRENCY: usize = 30;
}

/// Weighting profile for the composite trading score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtsProfile {
    #[default]
    Balanced,
    Aggressive,
    Defensive,
}

impl CtsProfile {
    /// Parse a user-supplied profile name; unknown or empty falls back to
    /// balanced.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "aggressive" => CtsProfile::Aggressive,
            "defensive" => CtsProfile::Defensive,
            _ => CtsProfile::Balanced,
        }
    }
}

/// Every tunable of a scan. Zero-valued fields take the fixed defaults at
/// `normalized()`; there is no process-wide mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanParams {
    pub buy_radius: i32,
    pub sell_radius: i32,
    pub current_system_id: i32,
    /// m3 the hauler can carry.
    pub cargo_capacity: f64,
    /// Percent margin floor for any opportunity.
    pub min_margin: f64,
    pub max_investment: f64,
    pub min_daily_volume: f64,
    /// Security floor applied to the sell route.
    pub min_route_security: f64,
    pub max_results: usize,
    pub target_region_id: Option<i32>,

    /// When true the buy/sell specific fee percentages apply; otherwise
    /// the single broker fee and sales tax cover both sides.
    pub split_trade_fees: bool,
    pub broker_fee_pct: f64,
    pub sales_tax_pct: f64,
    pub buy_broker_fee_pct: f64,
    pub sell_broker_fee_pct: f64,

    pub min_contract_price: f64,
    pub max_contract_margin: f64,
    pub min_priced_ratio: f64,
    pub contract_instant_liquidation: bool,
    /// Holding horizon in days, clamped to 1..=180.
    pub contract_hold_days: u32,
    /// Target full-liquidation confidence in percent, 0..=100.
    pub contract_target_confidence: f64,

    pub require_history: bool,
    pub exclude_rigs_with_ship: bool,
    pub include_player_structures: bool,
    pub access_token: Option<String>,
    pub cts_profile: CtsProfile,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            buy_radius: 5,
            sell_radius: 5,
            current_system_id: 0,
            cargo_capacity: 1000.0,
            min_margin: 5.0,
            max_investment: 100_000_000.0,
            min_daily_volume: 1.0,
            min_route_security: 0.0,
            max_results: defaults::MAX_ROUTE_RESULTS,
            target_region_id: None,
            split_trade_fees: false,
            broker_fee_pct: 3.0,
            sales_tax_pct: 3.6,
            buy_broker_fee_pct: 0.0,
            sell_broker_fee_pct: 0.0,
            min_contract_price: defaults::MIN_CONTRACT_PRICE,
            max_contract_margin: defaults::MAX_CONTRACT_MARGIN,
            min_priced_ratio: defaults::MIN_PRICED_RATIO,
            contract_instant_liquidation: false,
            contract_hold_days: defaults::CONTRACT_HOLD_DAYS,
            contract_target_confidence: defaults::CONTRACT_TARGET_CONFIDENCE,
            require_history: false,
            exclude_rigs_with_ship: false,
            include_player_structures: false,
            access_token: None,
            cts_profile: CtsProfile::Balanced,
        }
    }
}

impl ScanParams {
    /// Apply the fixed defaults to zero-valued tunables and clamp bounded
    /// fields into range.
    pub fn normalized(mut self) -> Self {
        if self.min_contract_price <= 0.0 {
            self.min_contract_price = defaults::MIN_CONTRACT_PRICE;
        }
        if self.max_contract_margin <= 0.0 {
            self.max_contract_margin = defaults::MAX_CONTRACT_MARGIN;
        }
        if self.min_priced_ratio <= 0.0 {
            self.min_priced_ratio = defaults::MIN_PRICED_RATIO;
        }
        if self.max_results == 0 {
            self.max_results = defaults::MAX_ROUTE_RESULTS;
        }
        if self.contract_hold_days == 0 {
            self.contract_hold_days = defaults::CONTRACT_HOLD_DAYS;
        }
        self.contract_hold_days = self.contract_hold_days.clamp(1, 180);
        if self.contract_target_confidence <= 0.0 {
            self.contract_target_confidence = defaults::CONTRACT_TARGET_CONFIDENCE;
        }
        self.contract_target_confidence = self.contract_target_confidence.clamp(0.0, 100.0);
        self
    }

    /// Fatal input checks; everything else degrades to partial results.
    pub fn validate(&self, static_data: &StaticData) -> Result<(), ScanError> {
        if self.buy_radius < 0 || self.sell_radius < 0 {
            return Err(ScanError::InvalidInput(format!(
                "negative radius: buy={} sell={}",
                self.buy_radius, self.sell_radius
            )));
        }
        if !static_data.systems.contains_key(&self.current_system_id) {
            return Err(ScanError::InvalidInput(format!(
                "unknown origin system {}",
                self.current_system_id
            )));
        }
        if let Some(region_id) = self.target_region_id {
            if region_id <= 0 {
                return Err(ScanError::InvalidInput(format!(
                    "region id must be positive, got {}",
                    region_id
                )));
            }
        }
        Ok(())
    }

    /// Broker percentage charged when placing the buy order.
    pub fn buy_broker_pct(&self) -> f64 {
        if self.split_trade_fees {
            self.buy_broker_fee_pct
        } else {
            self.broker_fee_pct
        }
    }

    /// Broker percentage charged when placing the sell order.
    pub fn sell_broker_pct(&self) -> f64 {
        if self.split_trade_fees {
            self.sell_broker_fee_pct
        } else {
            self.broker_fee_pct
        }
    }
}
