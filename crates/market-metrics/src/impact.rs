use scanner_core::HistoryEntry;
use serde::{Deserialize, Serialize};

/// Minimum usable days of history for a calibration.
const MIN_CALIBRATION_DAYS: usize = 5;

/// Price-impact coefficients fitted from daily history.
///
/// `linear` is the Amihud illiquidity ratio (mean of |daily return| /
/// traded volume); `sqrt_coef` is the daily return volatility driving the
/// square-root term sigma * sqrt(Q / V).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactCoefficients {
    pub linear: f64,
    pub sqrt_coef: f64,
}

impl ImpactCoefficients {
    /// Fractional price impact of taking `quantity` against a market
    /// trading `daily_volume` units per day.
    pub fn estimate(&self, quantity: f64, daily_volume: f64) -> f64 {
        if quantity <= 0.0 || daily_volume <= 0.0 {
            return 0.0;
        }
        let linear_term = self.linear * quantity;
        let sqrt_term = self.sqrt_coef * (quantity / daily_volume).sqrt();
        linear_term + sqrt_term
    }
}

/// Fit impact coefficients from history. Needs at least 5 days with
/// positive volume and price; otherwise returns None and the caller must
/// skip impact estimation.
pub fn calibrate_impact(history: &[HistoryEntry]) -> Option<ImpactCoefficients> {
    let eligible: Vec<&HistoryEntry> = history
        .iter()
        .filter(|e| e.average > 0.0 && e.volume > 0)
        .collect();
    if eligible.len() < MIN_CALIBRATION_DAYS {
        return None;
    }

    let mut returns = Vec::with_capacity(eligible.len() - 1);
    let mut amihud_sum = 0.0;
    for pair in eligible.windows(2) {
        let r = (pair[1].average - pair[0].average) / pair[0].average;
        returns.push(r);
        amihud_sum += r.abs() / pair[1].volume as f64;
    }
    if returns.len() < MIN_CALIBRATION_DAYS - 1 {
        return None;
    }

    let linear = amihud_sum / returns.len() as f64;

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let sqrt_coef = variance.sqrt();

    if !linear.is_finite() || !sqrt_coef.is_finite() {
        return None;
    }

    Some(ImpactCoefficients { linear, sqrt_coef })
}
