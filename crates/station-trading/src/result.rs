use scanner_core::SanitizeCounter;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLabel {
    High,
    Medium,
    #[default]
    Low,
}

impl ConfidenceLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            ConfidenceLabel::High
        } else if score >= 50.0 {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::Low
        }
    }
}

/// Percentile forecasts for one station row. Quantity bands run P50 >=
/// P80 >= P95; the liquidation ETA runs the other way because a longer
/// wait is the pessimistic outcome.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ForecastBands {
    pub volume_p50: f64,
    pub volume_p80: f64,
    pub volume_p95: f64,
    pub profit_p50: f64,
    pub profit_p80: f64,
    pub profit_p95: f64,
    pub eta_days_p50: f64,
    pub eta_days_p80: f64,
    pub eta_days_p95: f64,
}

/// One same-station market-making opportunity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationTrade {
    pub type_id: i32,
    pub type_name: String,
    pub location_id: i64,
    pub station_name: String,
    pub system_id: i32,
    pub region_id: i32,

    pub best_bid: f64,
    pub best_ask: f64,
    pub bid_volume: i64,
    pub ask_volume: i64,
    pub bid_order_count: u32,
    pub ask_order_count: u32,

    /// Maker economics: buy at the bid, sell at the ask.
    pub effective_buy: f64,
    pub effective_sell: f64,
    pub profit_per_unit: f64,
    pub margin_pct: f64,
    /// Margin recomputed over the executable quantity, when evidence
    /// exists.
    pub realizable_margin_pct: f64,

    pub tradable_units: i64,
    pub cycle_capital: f64,
    pub obds: f64,
    pub competition: f64,
    pub scam_score: f64,

    pub has_history: bool,
    pub vwap_30d: f64,
    pub drvi_30d: f64,
    pub spread_roi: f64,
    pub avg_price_30d: f64,
    pub high_price_30d: f64,
    pub low_price_30d: f64,
    pub region_daily_volume: f64,
    /// Station's share of regional depth for this type, clamped to 1.
    pub station_share: f64,
    pub daily_volume: f64,
    /// Sells-to-bids daily flow; together with `buy_from_ask_flow` it
    /// sums to the station's daily volume.
    pub sell_to_bid_flow: f64,
    pub buy_from_ask_flow: f64,
    pub days_of_supply: f64,

    pub daily_share: f64,
    pub theoretical_daily_profit: f64,
    pub realizable_daily_profit: f64,
    pub has_execution_evidence: bool,
    pub safe_quantity: i64,

    pub extreme_price: bool,
    pub high_risk: bool,

    pub confidence: f64,
    pub confidence_label: ConfidenceLabel,
    pub cts: f64,
    pub forecast: ForecastBands,
}

impl StationTrade {
    pub fn sanitize(&mut self, counter: &SanitizeCounter) {
        for value in [
            &mut self.best_bid,
            &mut self.best_ask,
            &mut self.effective_buy,
            &mut self.effective_sell,
            &mut self.profit_per_unit,
            &mut self.margin_pct,
            &mut self.realizable_margin_pct,
            &mut self.cycle_capital,
            &mut self.obds,
            &mut self.competition,
            &mut self.scam_score,
            &mut self.vwap_30d,
            &mut self.drvi_30d,
            &mut self.spread_roi,
            &mut self.avg_price_30d,
            &mut self.high_price_30d,
            &mut self.low_price_30d,
            &mut self.region_daily_volume,
            &mut self.station_share,
            &mut self.daily_volume,
            &mut self.sell_to_bid_flow,
            &mut self.buy_from_ask_flow,
            &mut self.days_of_supply,
            &mut self.daily_share,
            &mut self.theoretical_daily_profit,
            &mut self.realizable_daily_profit,
            &mut self.confidence,
            &mut self.cts,
            &mut self.forecast.volume_p50,
            &mut self.forecast.volume_p80,
            &mut self.forecast.volume_p95,
            &mut self.forecast.profit_p50,
            &mut self.forecast.profit_p80,
            &mut self.forecast.profit_p95,
            &mut self.forecast.eta_days_p50,
            &mut self.forecast.eta_days_p80,
            &mut self.forecast.eta_days_p95,
        ] {
            *value = counter.fix(*value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_thresholds() {
        assert_eq!(ConfidenceLabel::from_score(80.0), ConfidenceLabel::High);
        assert_eq!(ConfidenceLabel::from_score(75.0), ConfidenceLabel::High);
        assert_eq!(ConfidenceLabel::from_score(60.0), ConfidenceLabel::Medium);
        assert_eq!(ConfidenceLabel::from_score(49.9), ConfidenceLabel::Low);
    }

    #[test]
    fn label_monotone_in_score() {
        let labels: Vec<ConfidenceLabel> = (0..=100)
            .map(|s| ConfidenceLabel::from_score(s as f64))
            .collect();
        let rank = |l: &ConfidenceLabel| match l {
            ConfidenceLabel::Low => 0,
            ConfidenceLabel::Medium => 1,
            ConfidenceLabel::High => 2,
        };
        for pair in labels.windows(2) {
            assert!(rank(&pair[0]) <= rank(&pair[1]));
        }
    }
}
