use scanner_core::ScanParams;
use serde::{Deserialize, Serialize};

/// Multiplier pair turning raw book prices into effective cash flows.
/// `buy_cost` applies to the acquisition side (>= 1), `sell_revenue` to the
/// liquidation side (<= 1, floored at 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeMultipliers {
    pub buy_cost: f64,
    pub sell_revenue: f64,
}

impl FeeMultipliers {
    /// Frictionless reference pair.
    pub fn none() -> Self {
        Self {
            buy_cost: 1.0,
            sell_revenue: 1.0,
        }
    }

    pub fn effective_buy(&self, price: f64) -> f64 {
        price * self.buy_cost
    }

    pub fn effective_sell(&self, price: f64) -> f64 {
        price * self.sell_revenue
    }
}

/// Maker-mode multipliers: broker on both placements, tax on the sale.
pub fn trade_fee_multipliers(
    buy_broker_pct: f64,
    sell_broker_pct: f64,
    sales_tax_pct: f64,
) -> FeeMultipliers {
    let buy_cost = 1.0 + buy_broker_pct.max(0.0) / 100.0;
    let sell_revenue = (1.0 - sell_broker_pct.max(0.0) / 100.0 - sales_tax_pct.max(0.0) / 100.0)
        .max(0.0);
    FeeMultipliers {
        buy_cost,
        sell_revenue,
    }
}

/// Taker-mode multipliers: broker is omitted on the taker side, tax still
/// applies to the sale.
pub fn instant_fee_multipliers(sales_tax_pct: f64) -> FeeMultipliers {
    FeeMultipliers {
        buy_cost: 1.0,
        sell_revenue: (1.0 - sales_tax_pct.max(0.0) / 100.0).max(0.0),
    }
}

/// Maker multipliers from scan parameters, honoring the split-fee flag.
pub fn maker_multipliers(params: &ScanParams) -> FeeMultipliers {
    trade_fee_multipliers(
        params.buy_broker_pct(),
        params.sell_broker_pct(),
        params.sales_tax_pct,
    )
}

/// Taker multipliers from scan parameters.
pub fn taker_multipliers(params: &ScanParams) -> FeeMultipliers {
    instant_fee_multipliers(params.sales_tax_pct)
}
