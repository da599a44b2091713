use crate::result::{FlipResult, UNREACHABLE_JUMPS};
use dashmap::DashMap;
use market_metrics::{
    ask_levels, avg_daily_volume, avg_daily_order_count, bid_levels, calibrate_impact,
    taker_multipliers, walk_book, BookSide,
};
use order_index::OrderIndex;
use scanner_core::{
    defaults, HistoryEntry, HistoryFeed, Progress, SanitizeCounter, ScanError, ScanParams,
    StaticData, JUNK_BOOK_RATIO,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Match cheapest asks against highest bids across the indexed systems
/// and price the survivors with the execution walker and market history.
pub async fn scan_routes(
    index: &OrderIndex,
    params: &ScanParams,
    static_data: &StaticData,
    buy_distances: &HashMap<i32, u32>,
    history_feed: Arc<dyn HistoryFeed>,
    sanitizer: &SanitizeCounter,
    cancel: &CancellationToken,
    progress: Progress,
) -> Result<Vec<FlipResult>, ScanError> {
    let fees = taker_multipliers(params);
    let min_security = (params.min_route_security > 0.0).then_some(params.min_route_security);

    let mut results = Vec::new();
    for type_id in index.matched_types() {
        if cancel.is_cancelled() {
            return Err(ScanError::Canceled);
        }

        let Some(ask) = index.asks.best.get(&type_id) else {
            continue;
        };
        let Some(bid) = index.bids.best.get(&type_id) else {
            continue;
        };

        // Manipulated books: an ask priced at a fraction of the bid is
        // bait, not an opportunity.
        if ask.price <= bid.price / JUNK_BOOK_RATIO {
            continue;
        }
        if bid.price <= ask.price {
            continue;
        }

        let effective_buy = fees.effective_buy(ask.price);
        let effective_sell = fees.effective_sell(bid.price);
        let profit_per_unit = effective_sell - effective_buy;
        if profit_per_unit <= 0.0 {
            continue;
        }
        let margin_pct = profit_per_unit / effective_buy * 100.0;
        if margin_pct < params.min_margin {
            continue;
        }

        let Some(item) = static_data.types.get(&type_id) else {
            continue;
        };
        let item_volume = item.volume.max(0.01);

        let cargo_units = (params.cargo_capacity / item_volume).floor() as i64;
        let ask_depth = index.asks.book_depth(type_id, ask.location_id);
        let bid_depth = index.bids.book_depth(type_id, bid.location_id);
        let investment_units = if ask.price > 0.0 {
            (params.max_investment / ask.price).floor() as i64
        } else {
            0
        };
        let units = cargo_units
            .min(ask_depth)
            .min(bid_depth)
            .min(investment_units);
        if units <= 0 {
            continue;
        }

        let buy_jumps = buy_distances
            .get(&ask.system_id)
            .copied()
            .unwrap_or(UNREACHABLE_JUMPS);
        let sell_jumps = static_data
            .universe
            .shortest_path_len(ask.system_id, bid.system_id, min_security)
            .unwrap_or(UNREACHABLE_JUMPS);

        let total_profit = profit_per_unit * units as f64;
        let total_jumps = (buy_jumps + sell_jumps).max(1);

        results.push(FlipResult {
            type_id,
            type_name: item.name.clone(),
            item_volume,
            buy_price: ask.price,
            sell_price: bid.price,
            effective_buy,
            effective_sell,
            profit_per_unit,
            margin_pct,
            units,
            total_profit,
            investment: effective_buy * units as f64,
            buy_system_id: ask.system_id,
            buy_location_id: ask.location_id,
            sell_system_id: bid.system_id,
            sell_location_id: bid.location_id,
            buy_jumps,
            sell_jumps,
            profit_per_jump: total_profit / total_jumps as f64,
            ..FlipResult::default()
        });
    }

    // Trim before the expensive passes; ties break on type id so frozen
    // inputs always produce the same list.
    results.sort_by(|a, b| {
        b.total_profit
            .partial_cmp(&a.total_profit)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.type_id.cmp(&b.type_id))
    });
    results.truncate(params.max_results.max(1));

    progress(&format!("{} route candidates, re-pricing books", results.len()));

    for flip in results.iter_mut() {
        let asks = ask_levels(index.asks.book(flip.type_id, flip.buy_location_id));
        let bids = bid_levels(index.bids.book(flip.type_id, flip.sell_location_id));
        let buy_plan = walk_book(&asks, flip.units, BookSide::Ask);
        let sell_plan = walk_book(&bids, flip.units, BookSide::Bid);

        flip.expected_buy_price = buy_plan.expected_price;
        flip.expected_sell_price = sell_plan.expected_price;
        flip.buy_slippage_pct = buy_plan.slippage_pct;
        flip.sell_slippage_pct = sell_plan.slippage_pct;
        let executable = buy_plan.filled.min(sell_plan.filled);
        flip.expected_profit = (fees.effective_sell(sell_plan.expected_price)
            - fees.effective_buy(buy_plan.expected_price))
            * executable as f64;
    }

    enrich_with_history(
        &mut results,
        params,
        static_data,
        history_feed,
        cancel,
        progress,
    )
    .await?;

    results.retain(|flip| {
        if params.min_daily_volume <= 0.0 {
            return true;
        }
        flip.has_history && flip.daily_volume >= params.min_daily_volume
    });

    results.sort_by(|a, b| {
        b.expected_profit
            .partial_cmp(&a.expected_profit)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.type_id.cmp(&b.type_id))
    });

    for flip in results.iter_mut() {
        flip.sanitize(sanitizer);
    }

    Ok(results)
}

/// Fetch history once per (region, type) and fold volume, velocity and
/// trend into the surviving rows.
async fn enrich_with_history(
    results: &mut [FlipResult],
    params: &ScanParams,
    static_data: &StaticData,
    history_feed: Arc<dyn HistoryFeed>,
    cancel: &CancellationToken,
    progress: Progress,
) -> Result<(), ScanError> {
    let mut wanted: Vec<(i32, i32)> = results
        .iter()
        .filter_map(|flip| {
            static_data
                .region_of_system(flip.sell_system_id)
                .map(|region| (region, flip.type_id))
        })
        .collect();
    wanted.sort_unstable();
    wanted.dedup();

    progress(&format!("fetching history for {} types", wanted.len()));

    let fetched: Arc<DashMap<(i32, i32), Vec<HistoryEntry>>> = Arc::new(DashMap::new());
    let semaphore = Arc::new(Semaphore::new(defaults::ROUTE_HISTORY_CONCURRENCY));
    let mut tasks = JoinSet::new();

    for (region_id, type_id) in wanted {
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
                    fetched.insert((region_id, type_id), history);
                }
                Err(e) => {
                    tracing::warn!(
                        "history fetch failed for region {} type {}: {}",
                        region_id,
                        type_id,
                        e
                    );
                }
            }
        });
    }
    while tasks.join_next().await.is_some() {}

    if cancel.is_cancelled() {
        return Err(ScanError::Canceled);
    }

    for flip in results.iter_mut() {
        let Some(region_id) = static_data.region_of_system(flip.sell_system_id) else {
            continue;
        };
        let Some(history) = fetched.get(&(region_id, flip.type_id)) else {
            continue;
        };
        let history = history.value();
        if history.is_empty() {
            continue;
        }

        flip.has_history = true;
        flip.daily_volume = avg_daily_volume(history, 7);
        let daily_orders = avg_daily_order_count(history, 7);
        flip.velocity = if daily_orders > 0.0 {
            flip.daily_volume / daily_orders
        } else {
            0.0
        };
        let avg_30 = avg_daily_volume(history, 30);
        flip.trend_pct = if avg_30 > 0.0 {
            (flip.daily_volume / avg_30 - 1.0) * 100.0
        } else {
            0.0
        };
        flip.daily_profit = flip.profit_per_unit * flip.daily_volume.min(flip.units as f64);

        // Short histories skip impact estimation entirely.
        if let Some(coefficients) = calibrate_impact(history) {
            flip.price_impact_pct =
                coefficients.estimate(flip.units as f64, flip.daily_volume) * 100.0;
        }
    }

    Ok(())
}
