use crate::paths::{build_paths, ArbitragePath, NES_EXTRACTOR_PLEX, PLEX_TYPE_ID,
    SKILL_EXTRACTOR_TYPE_ID};
use crate::signal::{derive_signal, SignalInputs, TradeSignal};
use chrono::NaiveDate;
use market_metrics::{bollinger_bands, instant_fee_multipliers, log_return_volatility,
    log_volume_zscore, rsi, sma};
use scanner_core::{HistoryEntry, Order, SanitizeCounter, ScanParams};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// History window shipped to the dashboard chart.
pub const MAX_HISTORY_POINTS: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityRegime {
    Low,
    Medium,
    High,
}

impl VolatilityRegime {
    fn classify(annualized: f64) -> Self {
        if annualized < 0.25 {
            VolatilityRegime::Low
        } else if annualized <= 0.75 {
            VolatilityRegime::Medium
        } else {
            VolatilityRegime::High
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexIndicators {
    pub sma7: f64,
    pub sma30: f64,
    pub bollinger_upper: f64,
    pub bollinger_middle: f64,
    pub bollinger_lower: f64,
    pub rsi14: f64,
    pub change_1d_pct: f64,
    pub change_7d_pct: f64,
    pub change_30d_pct: f64,
    pub volume_zscore: Option<f64>,
    /// Annualized 20-day log-return volatility, as a fraction.
    pub volatility_annualized: f64,
    pub volatility_regime: VolatilityRegime,
}

/// Aligned chart series; every vector matches `dates` in length.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartOverlays {
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<f64>,
    pub sma7: Vec<Option<f64>>,
    pub sma30: Vec<Option<f64>>,
    pub bollinger_upper: Vec<Option<f64>>,
    pub bollinger_lower: Vec<Option<f64>>,
}

/// Store-chain profit recomputed against each historical PLEX price with
/// today's related-item prices held constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetroPoint {
    pub date: NaiveDate,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexDashboard {
    pub best_bid: f64,
    pub best_ask: f64,
    pub spread_pct: f64,
    pub paths: Vec<ArbitragePath>,
    pub indicators: PlexIndicators,
    pub overlays: ChartOverlays,
    pub retro_profit: Vec<RetroPoint>,
    pub signal: TradeSignal,
}

/// Assemble the dashboard from hub-scoped books and daily history. The
/// façade supplies orders per type id and the market-disabled set from
/// static data.
pub fn compute_plex_dashboard(
    orders_by_type: &HashMap<i32, Vec<Order>>,
    history: &[HistoryEntry],
    market_disabled: &HashSet<i32>,
    params: &ScanParams,
    sanitizer: &SanitizeCounter,
) -> PlexDashboard {
    let paths = build_paths(orders_by_type, market_disabled, params);

    let (best_bid, best_ask) = plex_top(orders_by_type);
    let spread_pct = if best_bid > 0.0 {
        (best_ask - best_bid) / best_bid * 100.0
    } else {
        0.0
    };

    let window: Vec<&HistoryEntry> = history
        .iter()
        .rev()
        .take(MAX_HISTORY_POINTS)
        .rev()
        .collect();
    let closes: Vec<f64> = window.iter().map(|e| e.average).collect();
    let volumes: Vec<f64> = window.iter().map(|e| e.volume as f64).collect();

    let indicators = compute_indicators(&closes, &volumes);
    let overlays = compute_overlays(&window, &closes);
    let retro_profit = retro_series(&window, orders_by_type, params);

    let last_price = closes.last().copied().unwrap_or(0.0);
    let signal = derive_signal(&SignalInputs {
        price: last_price,
        rsi14: indicators.rsi14,
        bollinger_upper: indicators.bollinger_upper,
        bollinger_lower: indicators.bollinger_lower,
        sma7: indicators.sma7,
        sma30: indicators.sma30,
        change_1d_pct: indicators.change_1d_pct,
        change_7d_pct: indicators.change_7d_pct,
        volume_zscore: indicators.volume_zscore,
    });

    let mut dashboard = PlexDashboard {
        best_bid,
        best_ask,
        spread_pct,
        paths,
        indicators,
        overlays,
        retro_profit,
        signal,
    };
    sanitize(&mut dashboard, sanitizer);
    dashboard
}

fn plex_top(orders_by_type: &HashMap<i32, Vec<Order>>) -> (f64, f64) {
    let mut best_bid: f64 = 0.0;
    let mut best_ask = f64::INFINITY;
    for order in orders_by_type.get(&PLEX_TYPE_ID).into_iter().flatten() {
        if order.price <= 0.0 || order.volume_remain <= 0 {
            continue;
        }
        if order.is_buy_order {
            best_bid = best_bid.max(order.price);
        } else {
            best_ask = best_ask.min(order.price);
        }
    }
    (best_bid, if best_ask.is_finite() { best_ask } else { 0.0 })
}

fn pct_change(closes: &[f64], days_back: usize) -> f64 {
    if closes.len() <= days_back {
        return 0.0;
    }
    let past = closes[closes.len() - 1 - days_back];
    let last = closes[closes.len() - 1];
    if past > 0.0 {
        (last - past) / past * 100.0
    } else {
        0.0
    }
}

fn compute_indicators(closes: &[f64], volumes: &[f64]) -> PlexIndicators {
    let sma7_series = sma(closes, 7);
    let sma30_series = sma(closes, 30);
    let bands = bollinger_bands(closes, 20, 2.0);
    let rsi_series = rsi(closes, 14);
    let volatility = log_return_volatility(closes, 20);

    PlexIndicators {
        sma7: sma7_series.last().copied().unwrap_or(0.0),
        sma30: sma30_series.last().copied().unwrap_or(0.0),
        bollinger_upper: bands.upper.last().copied().unwrap_or(0.0),
        bollinger_middle: bands.middle.last().copied().unwrap_or(0.0),
        bollinger_lower: bands.lower.last().copied().unwrap_or(0.0),
        rsi14: rsi_series.last().copied().unwrap_or(0.0),
        change_1d_pct: pct_change(closes, 1),
        change_7d_pct: pct_change(closes, 7),
        change_30d_pct: pct_change(closes, 30),
        volume_zscore: log_volume_zscore(volumes, 20),
        volatility_annualized: volatility,
        volatility_regime: VolatilityRegime::classify(volatility),
    }
}

fn compute_overlays(window: &[&HistoryEntry], closes: &[f64]) -> ChartOverlays {
    let n = closes.len();
    let pad = |series: Vec<f64>, period: usize| -> Vec<Option<f64>> {
        let mut out: Vec<Option<f64>> = vec![None; (period - 1).min(n)];
        out.extend(series.into_iter().map(Some));
        out.truncate(n);
        out
    };

    let bands = bollinger_bands(closes, 20, 2.0);
    ChartOverlays {
        dates: window.iter().map(|e| e.date).collect(),
        prices: closes.to_vec(),
        sma7: pad(sma(closes, 7), 7),
        sma30: pad(sma(closes, 30), 30),
        bollinger_upper: pad(bands.upper, 20),
        bollinger_lower: pad(bands.lower, 20),
    }
}

/// What the store-extractor flip would have paid on each historical day,
/// with today's extractor bid held constant.
fn retro_series(
    window: &[&HistoryEntry],
    orders_by_type: &HashMap<i32, Vec<Order>>,
    params: &ScanParams,
) -> Vec<RetroPoint> {
    let taker = instant_fee_multipliers(params.sales_tax_pct);
    let extractor_bid = orders_by_type
        .get(&SKILL_EXTRACTOR_TYPE_ID)
        .into_iter()
        .flatten()
        .filter(|o| o.is_buy_order && o.price > 0.0 && o.volume_remain > 0)
        .map(|o| o.price)
        .fold(0.0_f64, f64::max);
    let net_revenue = taker.effective_sell(extractor_bid);

    window
        .iter()
        .map(|entry| RetroPoint {
            date: entry.date,
            profit: net_revenue - NES_EXTRACTOR_PLEX * entry.average,
        })
        .collect()
}

fn sanitize(dashboard: &mut PlexDashboard, counter: &SanitizeCounter) {
    dashboard.best_bid = counter.fix(dashboard.best_bid);
    dashboard.best_ask = counter.fix(dashboard.best_ask);
    dashboard.spread_pct = counter.fix(dashboard.spread_pct);
    for path in dashboard.paths.iter_mut() {
        path.cost = counter.fix(path.cost);
        path.gross_revenue = counter.fix(path.gross_revenue);
        path.net_revenue = counter.fix(path.net_revenue);
        path.profit = counter.fix(path.profit);
        path.roi_pct = counter.fix(path.roi_pct);
        path.break_even_unit_price = counter.fix(path.break_even_unit_price);
        path.roi_per_hour = counter.fix(path.roi_per_hour);
        path.execution_adjusted_profit = counter.fix(path.execution_adjusted_profit);
    }
    let ind = &mut dashboard.indicators;
    ind.sma7 = counter.fix(ind.sma7);
    ind.sma30 = counter.fix(ind.sma30);
    ind.bollinger_upper = counter.fix(ind.bollinger_upper);
    ind.bollinger_middle = counter.fix(ind.bollinger_middle);
    ind.bollinger_lower = counter.fix(ind.bollinger_lower);
    ind.rsi14 = counter.fix(ind.rsi14);
    ind.change_1d_pct = counter.fix(ind.change_1d_pct);
    ind.change_7d_pct = counter.fix(ind.change_7d_pct);
    ind.change_30d_pct = counter.fix(ind.change_30d_pct);
    ind.volatility_annualized = counter.fix(ind.volatility_annualized);
    for point in dashboard.retro_profit.iter_mut() {
        point.profit = counter.fix(point.profit);
    }
    dashboard.signal.confidence = counter.fix(dashboard.signal.confidence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::{LARGE_SKILL_INJECTOR_TYPE_ID, MPTC_TYPE_ID};

    fn order(id: i64, type_id: i32, price: f64, volume: i64, buy: bool) -> Order {
        Order {
            order_id: id,
            type_id,
            location_id: 60003760,
            system_id: 30000142,
            price,
            volume_remain: volume,
            is_buy_order: buy,
        }
    }

    fn books() -> HashMap<i32, Vec<Order>> {
        HashMap::from([
            (
                PLEX_TYPE_ID,
                vec![
                    order(1, PLEX_TYPE_ID, 4_000_000.0, 100, true),
                    order(2, PLEX_TYPE_ID, 4_100_000.0, 100, false),
                ],
            ),
            (
                SKILL_EXTRACTOR_TYPE_ID,
                vec![
                    order(3, SKILL_EXTRACTOR_TYPE_ID, 1_400_000_000.0, 20, true),
                    order(4, SKILL_EXTRACTOR_TYPE_ID, 1_500_000_000.0, 20, false),
                ],
            ),
            (
                LARGE_SKILL_INJECTOR_TYPE_ID,
                vec![
                    order(5, LARGE_SKILL_INJECTOR_TYPE_ID, 1_900_000_000.0, 20, true),
                    order(6, LARGE_SKILL_INJECTOR_TYPE_ID, 2_000_000_000.0, 20, false),
                ],
            ),
            (
                MPTC_TYPE_ID,
                vec![
                    order(7, MPTC_TYPE_ID, 2_200_000_000.0, 10, true),
                    order(8, MPTC_TYPE_ID, 2_400_000_000.0, 10, false),
                ],
            ),
        ])
    }

    fn history(days: usize) -> Vec<HistoryEntry> {
        (0..days)
            .map(|i| HistoryEntry {
                date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                average: 4_000_000.0 * (1.0 + 0.01 * ((i % 5) as f64 - 2.0)),
                highest: 4_200_000.0,
                lowest: 3_800_000.0,
                volume: 3_000 + (i as i64 % 7) * 150,
                order_count: 900,
            })
            .collect()
    }

    #[test]
    fn dashboard_with_disabled_mptc_yields_six_paths() {
        let disabled = HashSet::from([MPTC_TYPE_ID]);
        let dashboard = compute_plex_dashboard(
            &books(),
            &history(120),
            &disabled,
            &ScanParams::default(),
            &SanitizeCounter::new(),
        );

        assert_eq!(dashboard.paths.len(), 6);
        assert_eq!(dashboard.best_bid, 4_000_000.0);
        assert_eq!(dashboard.best_ask, 4_100_000.0);
        assert!(dashboard.indicators.sma7 > 0.0);
        assert!(dashboard.indicators.rsi14 > 0.0);
        assert_eq!(dashboard.overlays.prices.len(), MAX_HISTORY_POINTS);
        assert_eq!(dashboard.overlays.dates.len(), MAX_HISTORY_POINTS);
        assert_eq!(dashboard.retro_profit.len(), MAX_HISTORY_POINTS);
        assert!(matches!(
            dashboard.signal.action,
            crate::signal::SignalAction::Buy
                | crate::signal::SignalAction::Sell
                | crate::signal::SignalAction::Hold
        ));
    }

    #[test]
    fn overlays_align_with_dates() {
        let dashboard = compute_plex_dashboard(
            &books(),
            &history(40),
            &HashSet::new(),
            &ScanParams::default(),
            &SanitizeCounter::new(),
        );
        let n = dashboard.overlays.dates.len();
        assert_eq!(n, 40);
        assert_eq!(dashboard.overlays.sma7.len(), n);
        assert_eq!(dashboard.overlays.sma30.len(), n);
        assert_eq!(dashboard.overlays.bollinger_upper.len(), n);
        // Warmup region is None, the rest is Some.
        assert!(dashboard.overlays.sma7[..6].iter().all(Option::is_none));
        assert!(dashboard.overlays.sma7[6..].iter().all(Option::is_some));
    }

    #[test]
    fn retro_profit_tracks_historical_plex_price() {
        let dashboard = compute_plex_dashboard(
            &books(),
            &history(30),
            &HashSet::new(),
            &ScanParams {
                sales_tax_pct: 0.0,
                ..ScanParams::default()
            },
            &SanitizeCounter::new(),
        );
        // Cheaper historical PLEX means larger retro profit.
        let p = &dashboard.retro_profit;
        for (entry, point) in history(30).iter().zip(p.iter()) {
            let expected = 1_400_000_000.0 - NES_EXTRACTOR_PLEX * entry.average;
            assert!((point.profit - expected).abs() < 1.0);
        }
    }

    #[test]
    fn empty_history_still_builds() {
        let dashboard = compute_plex_dashboard(
            &books(),
            &[],
            &HashSet::new(),
            &ScanParams::default(),
            &SanitizeCounter::new(),
        );
        assert_eq!(dashboard.paths.len(), 8);
        assert!(dashboard.retro_profit.is_empty());
        assert_eq!(dashboard.indicators.sma7, 0.0);
    }
}
