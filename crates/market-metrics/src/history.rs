use scanner_core::{finite_or, HistoryEntry};

/// Volume-weighted average price over the most recent `days` entries.
/// Returns 0 on empty or zero-volume input.
pub fn vwap(history: &[HistoryEntry], days: usize) -> f64 {
    let tail = recent(history, days);
    let mut priced = 0.0;
    let mut volume = 0.0;
    for entry in tail {
        priced += entry.average * entry.volume as f64;
        volume += entry.volume as f64;
    }
    if volume <= 0.0 {
        return 0.0;
    }
    finite_or(priced / volume, 0.0)
}

/// Mean traded volume over the most recent `days` entries.
pub fn avg_daily_volume(history: &[HistoryEntry], days: usize) -> f64 {
    let tail = recent(history, days);
    if tail.is_empty() {
        return 0.0;
    }
    let total: i64 = tail.iter().map(|e| e.volume).sum();
    finite_or(total as f64 / tail.len() as f64, 0.0)
}

/// Mean order count over the most recent `days` entries.
pub fn avg_daily_order_count(history: &[HistoryEntry], days: usize) -> f64 {
    let tail = recent(history, days);
    if tail.is_empty() {
        return 0.0;
    }
    let total: i64 = tail.iter().map(|e| e.order_count).sum();
    finite_or(total as f64 / tail.len() as f64, 0.0)
}

/// Daily Range Volatility Index: sample standard deviation (Bessel's
/// correction) of the daily percentage range (high - low) / avg * 100.
/// Fewer than 2 eligible days is undefined and returns 0.
pub fn daily_range_volatility(history: &[HistoryEntry], days: usize) -> f64 {
    let ranges: Vec<f64> = recent(history, days)
        .iter()
        .filter(|e| e.average > 0.0)
        .map(|e| (e.highest - e.lowest) / e.average * 100.0)
        .collect();

    if ranges.len() < 2 {
        return 0.0;
    }

    let n = ranges.len() as f64;
    let mean = ranges.iter().sum::<f64>() / n;
    let variance = ranges.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    finite_or(variance.sqrt(), 0.0)
}

/// Percentile with linear interpolation between the two bracketing
/// indices. Expects `sorted` ascending; `pct` in 0..=100.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    finite_or(sorted[lo] + (sorted[hi] - sorted[lo]) * frac, 0.0)
}

/// Spread ROI over the window: 10th percentile of daily lows against the
/// 90th percentile of daily highs, trimming outlier spikes on both ends.
pub fn period_spread_roi(history: &[HistoryEntry], days: usize) -> f64 {
    let tail = recent(history, days);
    if tail.is_empty() {
        return 0.0;
    }

    let mut lows: Vec<f64> = tail.iter().map(|e| e.lowest).collect();
    let mut highs: Vec<f64> = tail.iter().map(|e| e.highest).collect();
    lows.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    highs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let p10_low = percentile(&lows, 10.0);
    let p90_high = percentile(&highs, 90.0);
    if p10_low <= 0.0 {
        return 0.0;
    }
    finite_or((p90_high - p10_low) / p10_low * 100.0, 0.0)
}

/// True when any of the most recent `days` entries traded volume.
pub fn traded_within(history: &[HistoryEntry], days: usize) -> bool {
    recent(history, days).iter().any(|e| e.volume > 0)
}

fn recent(history: &[HistoryEntry], days: usize) -> &[HistoryEntry] {
    let len = history.len();
    &history[len.saturating_sub(days)..]
}
