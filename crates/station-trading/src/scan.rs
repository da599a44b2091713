use crate::result::{ConfidenceLabel, ForecastBands, StationTrade};
use dashmap::DashMap;
use market_metrics::{
    ask_levels, avg_daily_volume, bid_levels, competition_index, composite_score_with_weights,
    daily_range_volatility, depth_within_pct, harmonic_share, maker_multipliers, period_spread_roi,
    safe_quantity_search, scam_score, traded_within, vwap, BookLevel, CtsInputs, CtsWeights,
    FeeMultipliers, ScamInputs,
};
use order_index::OrderIndex;
use scanner_core::{
    defaults, HistoryEntry, HistoryFeed, Progress, SanitizeCounter, ScanError, ScanParams,
    StaticData, STRUCTURE_ID_FLOOR,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Books where best bid / best ask < this are manipulated junk.
const JUNK_BID_ASK_RATIO: f64 = 0.01;

/// Depth band used for the order-book depth score.
const DEPTH_BAND_PCT: f64 = 5.0;

/// Absolute per-unit profit floor; sub-cent margins are noise.
const MIN_UNIT_PROFIT: f64 = 0.01;

const HIGH_RISK_SCAM: f64 = 50.0;
const HIGH_RISK_DRVI: f64 = 40.0;

struct Candidate {
    trade: StationTrade,
    proxy: f64,
    asks: Vec<BookLevel>,
    bids: Vec<BookLevel>,
    largest_bid_volume: i64,
}

/// Scan one region's books for same-station market-making lines.
///
/// `target_station` narrows the scan to one location; otherwise all
/// stations are considered and player structures are skipped unless the
/// parameters opt them in.
#[allow(clippy::too_many_arguments)]
pub async fn scan_station_trades(
    index: &OrderIndex,
    region_id: i32,
    target_station: Option<i64>,
    params: &ScanParams,
    static_data: &StaticData,
    history_feed: Arc<dyn HistoryFeed>,
    sanitizer: &SanitizeCounter,
    cancel: &CancellationToken,
    progress: Progress,
) -> Result<Vec<StationTrade>, ScanError> {
    let fees = maker_multipliers(params);

    // Regional depth per type, taken before any station filtering so the
    // station-share scaling sees the whole market.
    let mut total_region_depth: HashMap<i32, f64> = HashMap::new();
    for order in index.asks.orders.iter().chain(index.bids.orders.iter()) {
        *total_region_depth.entry(order.type_id).or_insert(0.0) += order.volume_remain as f64;
    }

    let keys: BTreeSet<(i32, i64)> = index
        .asks
        .book_keys()
        .chain(index.bids.book_keys())
        .collect();

    progress(&format!("grouping {} station books", keys.len()));

    let mut candidates = Vec::new();
    for (type_id, location_id) in keys {
        if cancel.is_cancelled() {
            return Err(ScanError::Canceled);
        }

        if static_data.is_market_disabled(type_id) {
            continue;
        }
        if let Some(target) = target_station {
            if location_id != target {
                continue;
            }
        } else if location_id > STRUCTURE_ID_FLOOR && !params.include_player_structures {
            continue;
        }

        let asks = ask_levels(index.asks.book(type_id, location_id));
        let bids = bid_levels(index.bids.book(type_id, location_id));
        let (Some(best_ask), Some(best_bid)) =
            (asks.first().map(|l| l.price), bids.first().map(|l| l.price))
        else {
            continue;
        };
        if best_bid / best_ask < JUNK_BID_ASK_RATIO {
            continue;
        }

        let ask_volume: i64 = asks.iter().map(|l| l.volume).sum();
        let bid_volume: i64 = bids.iter().map(|l| l.volume).sum();
        if ask_volume < defaults::MIN_SELL_ORDER_VOLUME {
            continue;
        }

        // Maker economics: buy into the bid, sell at the ask.
        let effective_buy = fees.effective_buy(best_bid);
        let effective_sell = fees.effective_sell(best_ask);
        let profit_per_unit = effective_sell - effective_buy;
        if profit_per_unit < MIN_UNIT_PROFIT {
            continue;
        }
        let margin_pct = profit_per_unit / effective_buy * 100.0;
        if margin_pct < params.min_margin {
            continue;
        }

        let bid_order_count = index
            .bids
            .order_count
            .get(&(type_id, location_id))
            .copied()
            .unwrap_or(0);
        let ask_order_count = index
            .asks
            .order_count
            .get(&(type_id, location_id))
            .copied()
            .unwrap_or(0);

        let tradable_units = bid_volume.min(ask_volume);
        let cycle_capital = effective_buy * tradable_units as f64;

        let obds = if best_bid > 0.0 && tradable_units > 0 {
            let band_value = depth_within_pct(&bids, DEPTH_BAND_PCT, true)
                + depth_within_pct(&asks, DEPTH_BAND_PCT, false);
            band_value / (2.0 * best_bid * tradable_units as f64)
        } else {
            0.0
        };

        let prices: Vec<f64> = asks
            .iter()
            .chain(bids.iter())
            .map(|l| l.price)
            .collect();
        let competition = competition_index(&prices);

        let largest_bid_volume = bids.iter().map(|l| l.volume).max().unwrap_or(0);

        // Liquid, moderate-margin books beat huge-margin scams in the
        // pre-history ordering.
        let proxy = margin_pct.min(50.0)
            * tradable_units as f64
            * (1.0 + (bid_order_count + ask_order_count) as f64).log2();

        // Player structures are absent from the station catalog; their
        // system comes off the orders themselves.
        let system_id = static_data
            .station_system(location_id)
            .or_else(|| {
                index
                    .asks
                    .book(type_id, location_id)
                    .next()
                    .map(|o| o.system_id)
            })
            .or_else(|| {
                index
                    .bids
                    .book(type_id, location_id)
                    .next()
                    .map(|o| o.system_id)
            })
            .unwrap_or_default();

        let trade = StationTrade {
            type_id,
            type_name: static_data
                .type_name(type_id)
                .unwrap_or_default()
                .to_string(),
            location_id,
            system_id,
            region_id,
            best_bid,
            best_ask,
            bid_volume,
            ask_volume,
            bid_order_count,
            ask_order_count,
            effective_buy,
            effective_sell,
            profit_per_unit,
            margin_pct,
            realizable_margin_pct: margin_pct,
            tradable_units,
            cycle_capital,
            obds,
            competition,
            ..StationTrade::default()
        };

        candidates.push(Candidate {
            trade,
            proxy,
            asks,
            bids,
            largest_bid_volume,
        });
    }

    candidates.sort_by(|a, b| {
        b.proxy
            .partial_cmp(&a.proxy)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.trade.type_id.cmp(&b.trade.type_id))
            .then(a.trade.location_id.cmp(&b.trade.location_id))
    });
    candidates.truncate(defaults::STATION_WORKING_SET_CAP);

    let histories =
        fetch_histories(&candidates, region_id, history_feed, cancel, &progress).await?;
    if cancel.is_cancelled() {
        return Err(ScanError::Canceled);
    }

    let weights = CtsWeights::for_profile(params.cts_profile);
    let mut rows = Vec::with_capacity(candidates.len());
    for mut candidate in candidates {
        let history_ref = histories.get(&candidate.trade.type_id);
        let history: &[HistoryEntry] = history_ref
            .as_ref()
            .map(|entry| entry.value().as_slice())
            .unwrap_or(&[]);
        score_candidate(
            &mut candidate,
            history,
            &fees,
            &weights,
            &total_region_depth,
        );
        rows.push(candidate.trade);
    }

    // Final filter pass over execution-aware numbers.
    rows.retain(|row| {
        if row.realizable_margin_pct < params.min_margin {
            return false;
        }
        if row.safe_quantity > 0 && row.realizable_daily_profit <= 0.0 {
            return false;
        }
        if params.require_history && !row.has_history {
            return false;
        }
        if params.min_daily_volume > 0.0 && row.daily_volume < params.min_daily_volume {
            return false;
        }
        true
    });

    rows.sort_by(|a, b| {
        b.cts
            .partial_cmp(&a.cts)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.type_id.cmp(&b.type_id))
            .then(a.location_id.cmp(&b.location_id))
    });
    rows.truncate(defaults::MAX_UNLIMITED_RESULTS);

    for row in rows.iter_mut() {
        row.sanitize(sanitizer);
    }

    progress(&format!("{} station trades after filters", rows.len()));
    Ok(rows)
}

async fn fetch_histories(
    candidates: &[Candidate],
    region_id: i32,
    history_feed: Arc<dyn HistoryFeed>,
    cancel: &CancellationToken,
    progress: &Progress,
) -> Result<Arc<DashMap<i32, Vec<HistoryEntry>>>, ScanError> {
    let mut type_ids: Vec<i32> = candidates.iter().map(|c| c.trade.type_id).collect();
    type_ids.sort_unstable();
    type_ids.dedup();

    progress(&format!("fetching history for {} types", type_ids.len()));

    let fetched: Arc<DashMap<i32, Vec<HistoryEntry>>> = Arc::new(DashMap::new());
    let semaphore = Arc::new(Semaphore::new(defaults::STATION_HISTORY_CONCURRENCY));
    let mut tasks = JoinSet::new();

    for type_id in type_ids {
        let feed = Arc::clone(&history_feed);
        let fetched = Arc::clone(&fetched);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };
            if cancel.is_cancelled() {
                return;
            }
            match feed.fetch_market_history(region_id, type_id).await {
                Ok(history) => {
                    fetched.insert(type_id, history);
                }
                Err(e) => {
                    tracing::warn!("history fetch failed for type {}: {}", type_id, e);
                }
            }
        });
    }
    while tasks.join_next().await.is_some() {}

    if cancel.is_cancelled() {
        return Err(ScanError::Canceled);
    }
    Ok(fetched)
}

fn score_candidate(
    candidate: &mut Candidate,
    history: &[HistoryEntry],
    fees: &FeeMultipliers,
    weights: &CtsWeights,
    total_region_depth: &HashMap<i32, f64>,
) {
    let trade = &mut candidate.trade;

    if !history.is_empty() {
        trade.has_history = true;
        trade.vwap_30d = vwap(history, 30);
        trade.drvi_30d = daily_range_volatility(history, 30);
        trade.spread_roi = period_spread_roi(history, 30);

        let recent: Vec<&HistoryEntry> =
            history.iter().rev().take(30).collect();
        if !recent.is_empty() {
            trade.avg_price_30d =
                recent.iter().map(|e| e.average).sum::<f64>() / recent.len() as f64;
            trade.high_price_30d = recent
                .iter()
                .map(|e| e.highest)
                .fold(f64::MIN, f64::max);
            trade.low_price_30d = recent.iter().map(|e| e.lowest).fold(f64::MAX, f64::min);
        }

        trade.region_daily_volume = avg_daily_volume(history, 7);

        let region_depth = total_region_depth
            .get(&trade.type_id)
            .copied()
            .unwrap_or(0.0);
        let station_depth = (trade.bid_volume + trade.ask_volume) as f64;
        trade.station_share = if region_depth > 0.0 {
            (station_depth / region_depth).min(1.0)
        } else {
            0.0
        };
        trade.daily_volume = trade.region_daily_volume * trade.station_share;

        // Side flows keep mass balance: together they are the station's
        // daily traded volume.
        let book_total = (trade.bid_volume + trade.ask_volume) as f64;
        let bid_share = if book_total > 0.0 {
            trade.bid_volume as f64 / book_total
        } else {
            0.5
        };
        trade.sell_to_bid_flow = trade.daily_volume * bid_share;
        trade.buy_from_ask_flow = trade.daily_volume - trade.sell_to_bid_flow;

        trade.days_of_supply = if trade.daily_volume > 0.0 {
            (trade.bid_volume + trade.ask_volume) as f64 / trade.daily_volume
        } else {
            999.0
        };
    } else {
        trade.days_of_supply = 999.0;
    }

    trade.scam_score = scam_score(&ScamInputs {
        best_bid: trade.best_bid,
        vwap_30d: trade.vwap_30d,
        bid_volume_total: trade.bid_volume as f64,
        avg_daily_volume: trade.daily_volume,
        largest_bid_volume: candidate.largest_bid_volume as f64,
        bid_count: trade.bid_order_count,
        traded_last_7_days: trade.has_history && traded_within(history, 7),
    });

    trade.extreme_price = trade.has_history
        && trade.vwap_30d > 0.0
        && ((trade.best_ask - trade.vwap_30d) / trade.vwap_30d * 100.0).abs()
            > defaults::MAX_VWAP_DEVIATION;
    trade.high_risk = trade.scam_score >= HIGH_RISK_SCAM || trade.drvi_30d > HIGH_RISK_DRVI;

    trade.daily_share = harmonic_share(trade.sell_to_bid_flow, trade.bid_order_count)
        .min(harmonic_share(trade.buy_from_ask_flow, trade.ask_order_count));
    trade.theoretical_daily_profit = trade.profit_per_unit * trade.daily_share;

    let base_confidence = base_confidence(trade);

    let share_qty = trade.daily_share.floor() as i64;
    if share_qty >= 1 {
        if let Some(safe) = safe_quantity_search(&candidate.asks, &candidate.bids, share_qty, fees)
        {
            trade.has_execution_evidence = true;
            trade.safe_quantity = safe.quantity;
            trade.realizable_daily_profit = safe.net_profit;
        }
    }
    if !trade.has_execution_evidence {
        let fallback = (0.2 + 0.7 * (base_confidence / 100.0) / (trade.competition + 1.0).sqrt())
            .clamp(0.2, 0.9);
        trade.realizable_daily_profit = trade.theoretical_daily_profit * fallback;
    }
    trade.realizable_daily_profit = trade
        .realizable_daily_profit
        .clamp(0.0, trade.theoretical_daily_profit.max(0.0));

    trade.realizable_margin_pct = if trade.daily_share > 0.0 && trade.effective_buy > 0.0 {
        trade.realizable_daily_profit / (trade.daily_share * trade.effective_buy) * 100.0
    } else {
        trade.margin_pct
    };

    trade.confidence = if trade.has_execution_evidence {
        (base_confidence + 5.0).clamp(0.0, 100.0)
    } else {
        base_confidence
    };
    trade.confidence_label = ConfidenceLabel::from_score(trade.confidence);

    trade.cts = composite_score_with_weights(
        &CtsInputs {
            spread_roi: trade.spread_roi,
            obds: trade.obds,
            drvi: trade.drvi_30d,
            competition: trade.competition,
            scam: trade.scam_score,
            daily_volume: trade.daily_volume,
        },
        weights,
    );

    trade.forecast = forecast_bands(trade);
}

/// Weighted confidence blend, before the execution-evidence bonus.
fn base_confidence(trade: &StationTrade) -> f64 {
    let mut score = 0.0;
    if trade.has_history {
        score += 20.0;
        score += 15.0 * (1.0 - trade.drvi_30d / 50.0).clamp(0.0, 1.0);
    }
    score += 20.0 * (trade.obds / 2.0).clamp(0.0, 1.0);
    score += 20.0 * (1.0 - trade.scam_score / 100.0).clamp(0.0, 1.0);
    score += 10.0 * ((1.0 + trade.daily_volume.max(0.0)).log10() / 3.0).clamp(0.0, 1.0);

    let balance = if trade.sell_to_bid_flow > 0.0 && trade.buy_from_ask_flow > 0.0 {
        let imbalance = (trade.sell_to_bid_flow / trade.buy_from_ask_flow).ln().abs();
        (1.0 - imbalance / 1.5).clamp(0.0, 1.0)
    } else {
        0.0
    };
    score += 10.0 * balance;

    if trade.extreme_price {
        score -= 10.0;
    }
    if trade.high_risk {
        score -= 10.0;
    }
    score.clamp(0.0, 100.0)
}

/// Band width shrinks as confidence rises; quantities fall toward the
/// pessimistic tail while the liquidation ETA stretches.
fn forecast_bands(trade: &StationTrade) -> ForecastBands {
    let width = 0.1 + 0.6 * (1.0 - trade.confidence / 100.0);

    let volume_p50 = trade.daily_volume.max(0.0);
    let profit_p50 = trade.realizable_daily_profit.max(0.0);
    let eta_p50 = if trade.daily_share > 0.0 {
        (trade.tradable_units as f64 / trade.daily_share).min(999.0)
    } else {
        999.0
    };

    ForecastBands {
        volume_p50,
        volume_p80: volume_p50 * (1.0 - 0.5 * width),
        volume_p95: volume_p50 * (1.0 - width),
        profit_p50,
        profit_p80: profit_p50 * (1.0 - 0.5 * width),
        profit_p95: profit_p50 * (1.0 - width),
        eta_days_p50: eta_p50,
        eta_days_p80: (eta_p50 / (1.0 - 0.5 * width)).min(999.0),
        eta_days_p95: (eta_p50 / (1.0 - width)).min(999.0),
    }
}
