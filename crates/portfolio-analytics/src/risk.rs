use chrono::NaiveDate;
use scanner_core::{finite_or, Transaction};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::{HashMap, VecDeque};

/// Distinct realized-P&L days required before any tail estimate.
const MIN_SAMPLE_DAYS: usize = 5;

/// Below this sample size the empirical quantile is too coarse; switch
/// to the Cornish-Fisher expansion.
const EMPIRICAL_SAMPLE_FLOOR: usize = 20;

/// Samples needed before the 99% numbers deserve trust.
const VAR99_RELIABLE_SAMPLE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBucket {
    Safe,
    Balanced,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRiskSummary {
    pub sample_days: usize,
    pub mean_daily: f64,
    pub std_daily: f64,
    pub skewness: f64,
    pub excess_kurtosis: f64,

    /// Loss magnitudes; always reported positive.
    pub var_95: f64,
    pub var_99: f64,
    pub es_95: f64,
    pub es_99: f64,
    /// True when the small-sample Cornish-Fisher path produced the
    /// numbers above.
    pub cornish_fisher: bool,
    pub var_99_reliable: bool,

    pub risk_score: f64,
    pub bucket: RiskBucket,
    pub capacity_multiplier: f64,
}

/// Daily realized P&L through FIFO lot matching, then empirical or
/// Cornish-Fisher tail estimates. Returns None below five distinct days.
pub fn compute_portfolio_risk(transactions: &[Transaction]) -> Option<PortfolioRiskSummary> {
    let daily = realized_daily_pnl(transactions);
    if daily.len() < MIN_SAMPLE_DAYS {
        return None;
    }

    let pnl: Vec<f64> = daily.values().copied().collect();
    let n = pnl.len() as f64;
    let mean = pnl.iter().sum::<f64>() / n;
    let variance = pnl.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();

    let (skew, ex_kurt) = if std > 0.0 {
        let m3 = pnl.iter().map(|x| ((x - mean) / std).powi(3)).sum::<f64>() / n;
        let m4 = pnl.iter().map(|x| ((x - mean) / std).powi(4)).sum::<f64>() / n;
        (m3, m4 - 3.0)
    } else {
        (0.0, 0.0)
    };

    let small_sample = pnl.len() < EMPIRICAL_SAMPLE_FLOOR;
    let (var_95, es_95) = if small_sample {
        cornish_fisher_tail(mean, std, skew, ex_kurt, 0.05)
    } else {
        empirical_tail(&pnl, 0.05)
    };
    let (var_99, es_99) = if small_sample {
        cornish_fisher_tail(mean, std, skew, ex_kurt, 0.01)
    } else {
        empirical_tail(&pnl, 0.01)
    };

    // Normalize by the average magnitude so the score is scale-free.
    let mean_abs = pnl.iter().map(|x| x.abs()).sum::<f64>() / n;
    let normalized_std = if mean_abs > 0.0 { std / mean_abs } else { 0.0 };
    let risk_score = (normalized_std * 40.0).clamp(0.0, 100.0);

    let bucket = if risk_score < 30.0 {
        RiskBucket::Safe
    } else if risk_score > 70.0 {
        RiskBucket::High
    } else {
        RiskBucket::Balanced
    };

    let capacity_multiplier = if risk_score < 70.0 {
        let sharpe_like = if std > 0.0 {
            mean / std * 365.0_f64.sqrt()
        } else {
            0.0
        };
        if sharpe_like >= 2.0 {
            2.0
        } else if sharpe_like >= 1.0 {
            1.5
        } else {
            1.2
        }
    } else {
        1.0
    };

    Some(PortfolioRiskSummary {
        sample_days: pnl.len(),
        mean_daily: finite_or(mean, 0.0),
        std_daily: finite_or(std, 0.0),
        skewness: finite_or(skew, 0.0),
        excess_kurtosis: finite_or(ex_kurt, 0.0),
        var_95: finite_or(var_95, 0.0),
        var_99: finite_or(var_99, 0.0),
        es_95: finite_or(es_95, 0.0),
        es_99: finite_or(es_99, 0.0),
        cornish_fisher: small_sample,
        var_99_reliable: pnl.len() >= VAR99_RELIABLE_SAMPLE,
        risk_score: finite_or(risk_score, 0.0),
        bucket,
        capacity_multiplier,
    })
}

/// FIFO matching: sells consume the oldest lots of their type; sells
/// with no remaining lot (bought before the window) count as pure
/// revenue.
fn realized_daily_pnl(transactions: &[Transaction]) -> HashMap<NaiveDate, f64> {
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by_key(|t| (t.date, t.type_id));

    let mut lots: HashMap<i32, VecDeque<(i64, f64)>> = HashMap::new();
    let mut daily: HashMap<NaiveDate, f64> = HashMap::new();

    for t in ordered {
        if t.quantity <= 0 || t.unit_price < 0.0 {
            continue;
        }
        if t.is_buy {
            lots.entry(t.type_id)
                .or_default()
                .push_back((t.quantity, t.unit_price));
            continue;
        }

        let mut remaining = t.quantity;
        let mut realized = 0.0;
        if let Some(queue) = lots.get_mut(&t.type_id) {
            while remaining > 0 {
                let Some((lot_qty, lot_price)) = queue.front_mut() else {
                    break;
                };
                let matched = remaining.min(*lot_qty);
                realized += (t.unit_price - *lot_price) * matched as f64;
                *lot_qty -= matched;
                remaining -= matched;
                if *lot_qty == 0 {
                    queue.pop_front();
                }
            }
        }
        if remaining > 0 {
            realized += t.unit_price * remaining as f64;
        }
        *daily.entry(t.date.date_naive()).or_insert(0.0) += realized;
    }

    daily
}

/// Quantile z adjusted for skew and excess kurtosis:
/// z + (z^2-1)s/6 + (z^3-3z)k/24 - (2z^3-5z)s^2/36.
/// With s = k = 0 this is the plain normal quantile.
fn cornish_fisher_z(z: f64, skew: f64, ex_kurt: f64) -> f64 {
    z + (z * z - 1.0) * skew / 6.0
        + (z * z * z - 3.0 * z) * ex_kurt / 24.0
        - (2.0 * z * z * z - 5.0 * z) * skew * skew / 36.0
}

/// VaR and ES magnitudes at tail probability `alpha` for a small sample.
fn cornish_fisher_tail(mean: f64, std: f64, skew: f64, ex_kurt: f64, alpha: f64) -> (f64, f64) {
    let normal = Normal::new(0.0, 1.0).expect("unit normal");
    let z = normal.inverse_cdf(alpha);
    let z_cf = cornish_fisher_z(z, skew, ex_kurt);

    let var = -(mean + z_cf * std);
    let pdf = (-0.5 * z_cf * z_cf).exp() / (2.0 * std::f64::consts::PI).sqrt();
    let es = -(mean - std * pdf / alpha);
    (var.max(0.0), es.max(0.0))
}

/// Interpolated-quantile VaR and tail-mean ES on the raw sample.
fn empirical_tail(pnl: &[f64], alpha: f64) -> (f64, f64) {
    let mut sorted: Vec<f64> = pnl.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = alpha * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let quantile = if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
    };
    let var = (-quantile).max(0.0);

    let tail_len = ((alpha * sorted.len() as f64).ceil() as usize).max(1);
    let tail_mean = sorted[..tail_len].iter().sum::<f64>() / tail_len as f64;
    let es = (-tail_mean).max(0.0);
    (var, es.max(var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sell(days_ago: i64, type_id: i32, unit_price: f64, quantity: i64) -> Transaction {
        Transaction {
            date: Utc::now() - Duration::days(days_ago),
            type_id,
            location_id: 60003760,
            is_buy: false,
            unit_price,
            quantity,
        }
    }

    fn buy(days_ago: i64, type_id: i32, unit_price: f64, quantity: i64) -> Transaction {
        Transaction {
            is_buy: true,
            ..sell(days_ago, type_id, unit_price, quantity)
        }
    }

    #[test]
    fn fifo_matches_oldest_lot_first() {
        let transactions = vec![
            buy(10, 34, 100.0, 10),
            buy(9, 34, 200.0, 10),
            sell(8, 34, 250.0, 10),
        ];
        let daily = realized_daily_pnl(&transactions);
        // Matched against the 100 lot: (250 - 100) * 10.
        let total: f64 = daily.values().sum();
        assert!((total - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn unmatched_sell_is_pure_revenue() {
        let transactions = vec![sell(3, 34, 50.0, 4)];
        let daily = realized_daily_pnl(&transactions);
        let total: f64 = daily.values().sum();
        assert!((total - 200.0).abs() < 1e-9);
    }

    #[test]
    fn too_few_days_returns_none() {
        let transactions = vec![
            sell(1, 34, 100.0, 1),
            sell(2, 34, 100.0, 1),
            sell(3, 34, 100.0, 1),
        ];
        assert!(compute_portfolio_risk(&transactions).is_none());
    }

    #[test]
    fn cornish_fisher_reduces_to_normal_at_zero_moments() {
        let z = -1.6448536269514729;
        assert!((cornish_fisher_z(z, 0.0, 0.0) - z).abs() < 1e-12);
    }

    /// One day realizing exactly -loss: buy at 2x, sell the lot at x.
    fn loss_day(days_ago: i64, loss: f64) -> [Transaction; 2] {
        [
            buy(days_ago, 34, 2.0 * loss, 1),
            sell(days_ago, 34, loss, 1),
        ]
    }

    #[test]
    fn small_symmetric_sample_takes_cf_path() {
        // Ten days of uniformly spaced losses: -10, -20, ..., -100.
        let transactions: Vec<Transaction> = (1..=10)
            .flat_map(|d| loss_day(d, (d as f64) * 10.0))
            .collect();

        let summary = compute_portfolio_risk(&transactions).unwrap();
        assert_eq!(summary.sample_days, 10);
        assert!(summary.cornish_fisher);
        assert!(!summary.var_99_reliable);
        // Uniformly spaced losses: symmetric, thin-tailed.
        assert!(summary.skewness.abs() < 0.2);
        assert!(summary.excess_kurtosis < 0.0);
        assert!(summary.var_95 > 0.0);
        assert!(summary.var_99 > 0.0);
        assert!(summary.es_95 > 0.0);
        // Mean loss of 55 dominates the scale of every tail number.
        assert!(summary.var_95 > 55.0);
    }

    #[test]
    fn empirical_path_obeys_tail_ordering() {
        // 40 days alternating gains and occasional deep losses.
        let mut transactions = Vec::new();
        for d in 1..=40i64 {
            if d % 8 == 0 {
                // Deep loss day: buy 1000, sell 400.
                transactions.push(buy(d, 34, 1000.0, 1));
                transactions.push(sell(d, 34, 400.0, 1));
            } else {
                transactions.push(buy(d, 35, 100.0, 1));
                transactions.push(sell(d, 35, 110.0 + (d % 3) as f64, 1));
            }
        }
        let summary = compute_portfolio_risk(&transactions).unwrap();
        assert!(!summary.cornish_fisher);
        assert!(summary.var_99_reliable);
        assert!(summary.var_99 >= summary.var_95);
        assert!(summary.es_95 >= summary.var_95);
        assert!(summary.es_99 >= summary.var_99);
    }

    #[test]
    fn risk_score_bounded_and_bucketed() {
        let mut transactions = Vec::new();
        for d in 1..=12i64 {
            transactions.push(sell(d, 34, 100.0, 1));
        }
        let summary = compute_portfolio_risk(&transactions).unwrap();
        assert!((0.0..=100.0).contains(&summary.risk_score));
        assert_eq!(summary.bucket, RiskBucket::Safe);
        assert!(summary.capacity_multiplier >= 1.2);
    }
}
