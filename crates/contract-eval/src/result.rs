use crate::ships::ShipSize;
use scanner_core::SanitizeCounter;
use serde::{Deserialize, Serialize};

/// One evaluated public contract worth buying for resale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractDeal {
    pub contract_id: i64,
    pub title: String,
    pub price: f64,

    pub start_location_id: i64,
    pub system_id: i32,
    pub region_id: i32,
    pub station_name: String,
    pub system_name: String,
    pub region_name: String,

    /// Sum of per-line valuations before probability weighting.
    pub market_value: f64,
    /// Probability-weighted gross (estimate mode) or walked proceeds
    /// (instant mode).
    pub expected_gross: f64,
    pub expected_profit: f64,
    pub margin_pct: f64,

    pub priced_items: usize,
    pub unpriced_items: usize,
    pub provided_items_cost: f64,

    /// Product of per-line fill probabilities within the horizon.
    pub fill_probability: f64,
    /// Slowest line's expected days to liquidate.
    pub liquidation_days: f64,
    pub carry_cost: f64,

    /// Chosen liquidation system in instant mode.
    pub sell_system_id: Option<i32>,
    pub instant: bool,

    pub has_ship: bool,
    pub ship_size: Option<ShipSize>,
}

impl ContractDeal {
    pub fn sanitize(&mut self, counter: &SanitizeCounter) {
        for value in [
            &mut self.price,
            &mut self.market_value,
            &mut self.expected_gross,
            &mut self.expected_profit,
            &mut self.margin_pct,
            &mut self.provided_items_cost,
            &mut self.fill_probability,
            &mut self.liquidation_days,
            &mut self.carry_cost,
        ] {
            *value = counter.fix(*value);
        }
    }
}

/// Fill probability of one line within `horizon_days`, given the days a
/// full liquidation takes. The zero-fill-days edge means the line clears
/// instantly; an unbounded fill time never clears.
pub fn fill_probability(fill_days: f64, horizon_days: f64) -> f64 {
    if horizon_days <= 0.0 {
        return 0.0;
    }
    if fill_days <= 0.0 {
        return 1.0;
    }
    if !fill_days.is_finite() {
        return 0.0;
    }
    1.0 - (-horizon_days / fill_days).exp()
}
