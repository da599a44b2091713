use scanner_core::SanitizeCounter;
use serde::{Deserialize, Serialize};

/// Jump count reported when no acceptable route exists.
pub const UNREACHABLE_JUMPS: u32 = 999;

/// One hauling opportunity: buy at the cheapest ask, haul, sell into the
/// highest bid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlipResult {
    pub type_id: i32,
    pub type_name: String,
    /// m3 per unit.
    pub item_volume: f64,

    pub buy_price: f64,
    pub sell_price: f64,
    pub effective_buy: f64,
    pub effective_sell: f64,
    pub profit_per_unit: f64,
    pub margin_pct: f64,

    pub units: i64,
    pub total_profit: f64,
    pub investment: f64,

    pub buy_system_id: i32,
    pub buy_location_id: i64,
    pub buy_station_name: String,
    pub sell_system_id: i32,
    pub sell_location_id: i64,
    pub sell_station_name: String,

    pub buy_jumps: u32,
    pub sell_jumps: u32,
    pub profit_per_jump: f64,

    /// Execution-aware pricing from walking the location books.
    pub expected_buy_price: f64,
    pub expected_sell_price: f64,
    pub buy_slippage_pct: f64,
    pub sell_slippage_pct: f64,
    pub expected_profit: f64,

    /// Calibrated price impact of moving the full haul, percent. Stays
    /// zero when history is too short to fit the coefficients.
    pub price_impact_pct: f64,

    /// History enrichment; zero when the type has no usable history.
    pub daily_volume: f64,
    /// Average units per trade, a proxy for how fast the line moves.
    pub velocity: f64,
    /// 7-day average volume vs 30-day, percent.
    pub trend_pct: f64,
    pub daily_profit: f64,
    pub has_history: bool,
}

impl FlipResult {
    /// Route every numeric output through the scan's sanitizer so a bad
    /// feed value cannot leak NaN into serialized results.
    pub fn sanitize(&mut self, counter: &SanitizeCounter) {
        for value in [
            &mut self.item_volume,
            &mut self.buy_price,
            &mut self.sell_price,
            &mut self.effective_buy,
            &mut self.effective_sell,
            &mut self.profit_per_unit,
            &mut self.margin_pct,
            &mut self.total_profit,
            &mut self.investment,
            &mut self.profit_per_jump,
            &mut self.expected_buy_price,
            &mut self.expected_sell_price,
            &mut self.buy_slippage_pct,
            &mut self.sell_slippage_pct,
            &mut self.expected_profit,
            &mut self.price_impact_pct,
            &mut self.daily_volume,
            &mut self.velocity,
            &mut self.trend_pct,
            &mut self.daily_profit,
        ] {
            *value = counter.fix(*value);
        }
    }
}
