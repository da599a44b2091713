use crate::execution::BookLevel;
use scanner_core::{finite_or, CtsProfile};
use serde::{Deserialize, Serialize};

/// Sum of price * volume for levels within `pct` percent of the best
/// price: above the best ask, below the best bid.
pub fn depth_within_pct(levels: &[BookLevel], pct: f64, is_bid: bool) -> f64 {
    let Some(best) = levels.first().map(|l| l.price) else {
        return 0.0;
    };
    let bound = if is_bid {
        best * (1.0 - pct / 100.0)
    } else {
        best * (1.0 + pct / 100.0)
    };
    levels
        .iter()
        .filter(|l| if is_bid { l.price >= bound } else { l.price <= bound })
        .map(|l| l.price * l.volume as f64)
        .sum()
}

/// Share of a daily flow one extra order can expect against `competitors`
/// resting orders queued on the same side.
pub fn harmonic_share(flow_per_day: f64, competitors: u32) -> f64 {
    if flow_per_day <= 0.0 {
        return 0.0;
    }
    finite_or(flow_per_day / (competitors as f64 + 1.0), 0.0)
}

/// Competition Index: active order count plus twice the number of
/// tight-spread pairs (adjacent sorted prices within max(0.01% of price,
/// 0.01 absolute)).
pub fn competition_index(prices: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = prices.iter().copied().filter(|p| p.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut tight_pairs = 0usize;
    for pair in sorted.windows(2) {
        let tolerance = (pair[1] * 0.0001).max(0.01);
        if (pair[1] - pair[0]).abs() <= tolerance {
            tight_pairs += 1;
        }
    }

    (sorted.len() + 2 * tight_pairs) as f64
}

/// Inputs to the scam detector for one (location, type) book.
#[derive(Debug, Clone, Default)]
pub struct ScamInputs {
    pub best_bid: f64,
    pub vwap_30d: f64,
    pub bid_volume_total: f64,
    pub avg_daily_volume: f64,
    pub largest_bid_volume: f64,
    pub bid_count: u32,
    pub traded_last_7_days: bool,
}

/// Scam Detection Score, 0-100. Triggers: bid far below VWAP (+30),
/// bid-side volume out of proportion to real flow (+25), one order
/// dominating the bid side (+25), stale market (+20). A book with zero
/// bids scores 100 outright.
pub fn scam_score(inputs: &ScamInputs) -> f64 {
    if inputs.bid_count == 0 {
        return 100.0;
    }

    let mut score: f64 = 0.0;
    if inputs.vwap_30d > 0.0 && inputs.best_bid < 0.5 * inputs.vwap_30d {
        score += 30.0;
    }
    if inputs.avg_daily_volume > 0.0 && inputs.bid_volume_total > 10.0 * inputs.avg_daily_volume {
        score += 25.0;
    }
    if inputs.bid_volume_total > 0.0
        && inputs.largest_bid_volume / inputs.bid_volume_total > 0.9
    {
        score += 25.0;
    }
    if !inputs.traded_last_7_days {
        score += 20.0;
    }
    score.min(100.0)
}

/// Raw metric bundle scored by the composite trading score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CtsInputs {
    /// Period spread ROI, percent (useful range 0..100).
    pub spread_roi: f64,
    /// Order-book depth score (useful range 0..2).
    pub obds: f64,
    /// Daily range volatility index (useful range 0..50, lower better).
    pub drvi: f64,
    /// Competition index (useful range 0..100, lower better).
    pub competition: f64,
    /// Scam detection score 0..100, lower better.
    pub scam: f64,
    /// Average traded units per day.
    pub daily_volume: f64,
}

/// One weight per normalized input; a valid profile sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CtsWeights {
    pub spread_roi: f64,
    pub depth: f64,
    pub volatility: f64,
    pub competition: f64,
    pub scam: f64,
    pub volume: f64,
}

impl CtsWeights {
    pub fn balanced() -> Self {
        Self {
            spread_roi: 0.20,
            depth: 0.20,
            volatility: 0.15,
            competition: 0.15,
            scam: 0.15,
            volume: 0.15,
        }
    }

    /// ROI and volume favored; volatility and scam penalties discounted.
    pub fn aggressive() -> Self {
        Self {
            spread_roi: 0.30,
            depth: 0.15,
            volatility: 0.05,
            competition: 0.15,
            scam: 0.05,
            volume: 0.30,
        }
    }

    /// Scam and volatility dominate; raw ROI barely matters.
    pub fn defensive() -> Self {
        Self {
            spread_roi: 0.10,
            depth: 0.15,
            volatility: 0.25,
            competition: 0.10,
            scam: 0.30,
            volume: 0.10,
        }
    }

    pub fn for_profile(profile: CtsProfile) -> Self {
        match profile {
            CtsProfile::Balanced => Self::balanced(),
            CtsProfile::Aggressive => Self::aggressive(),
            CtsProfile::Defensive => Self::defensive(),
        }
    }

    /// Clamp negative weights to 0 and renormalize to sum 1. An all-zero
    /// set falls back to balanced.
    pub fn normalized(&self) -> Self {
        let clamped = Self {
            spread_roi: self.spread_roi.max(0.0),
            depth: self.depth.max(0.0),
            volatility: self.volatility.max(0.0),
            competition: self.competition.max(0.0),
            scam: self.scam.max(0.0),
            volume: self.volume.max(0.0),
        };
        let sum = clamped.spread_roi
            + clamped.depth
            + clamped.volatility
            + clamped.competition
            + clamped.scam
            + clamped.volume;
        if sum <= 0.0 {
            return Self::balanced();
        }
        Self {
            spread_roi: clamped.spread_roi / sum,
            depth: clamped.depth / sum,
            volatility: clamped.volatility / sum,
            competition: clamped.competition / sum,
            scam: clamped.scam / sum,
            volume: clamped.volume / sum,
        }
    }
}

/// Composite Trading Score 0-100 under an explicit weight set.
pub fn composite_score_with_weights(inputs: &CtsInputs, weights: &CtsWeights) -> f64 {
    let w = weights.normalized();

    let roi_n = inputs.spread_roi.clamp(0.0, 100.0);
    let depth_n = (inputs.obds / 2.0 * 100.0).clamp(0.0, 100.0);
    let vol_inv_n = ((1.0 - inputs.drvi / 50.0) * 100.0).clamp(0.0, 100.0);
    let comp_inv_n = (100.0 - inputs.competition).clamp(0.0, 100.0);
    let scam_inv_n = (100.0 - inputs.scam).clamp(0.0, 100.0);
    let volume_n = ((1.0 + inputs.daily_volume.max(0.0)).log10() / 4.0 * 100.0).clamp(0.0, 100.0);

    let score = roi_n * w.spread_roi
        + depth_n * w.depth
        + vol_inv_n * w.volatility
        + comp_inv_n * w.competition
        + scam_inv_n * w.scam
        + volume_n * w.volume;

    finite_or(score, 0.0).clamp(0.0, 100.0)
}

/// Composite Trading Score under the legacy balanced weighting.
pub fn composite_score(inputs: &CtsInputs) -> f64 {
    composite_score_with_weights(inputs, &CtsWeights::balanced())
}
