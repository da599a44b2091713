use crate::result::{fill_probability, ContractDeal};
use crate::ships::{is_loose_module, is_rig, rig_size, ship_size, ShipSize, SHIP_CATEGORY_ID};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use market_metrics::{avg_daily_volume, bid_levels, instant_fee_multipliers, trade_fee_multipliers,
    vwap, walk_book, BookLevel, BookSide};
use order_index::OrderIndex;
use scanner_core::{
    defaults, Contract, ContractFeed, ContractItem, ContractKind, HistoryEntry, HistoryFeed,
    IndustryFeed, ItemPriceData, Progress, SanitizeCounter, ScanError, ScanParams, StaticData,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Everything the evaluator needs besides the contracts themselves.
pub struct ContractScanContext<'a> {
    pub params: &'a ScanParams,
    pub static_data: &'a StaticData,
    /// Books within the sell radius: bids price instant liquidations,
    /// asks provide reference prices.
    pub index: &'a OrderIndex,
    /// Buy-radius membership, system id -> jumps.
    pub buy_systems: &'a HashMap<i32, u32>,
    pub now: DateTime<Utc>,
}

struct Line {
    type_id: i32,
    quantity: i64,
    /// Loose module in a ship contract, subject to the fitted-state
    /// haircut.
    haircut: bool,
}

/// Evaluate pre-fetched public contracts into ranked resale deals.
pub async fn evaluate_contracts(
    contracts: Vec<Contract>,
    contract_feed: Arc<dyn ContractFeed>,
    history_feed: Arc<dyn HistoryFeed>,
    industry_feed: Option<Arc<dyn IndustryFeed>>,
    ctx: &ContractScanContext<'_>,
    sanitizer: &SanitizeCounter,
    cancel: &CancellationToken,
    progress: Progress,
) -> Result<Vec<ContractDeal>, ScanError> {
    let params = ctx.params;
    let location_systems = location_system_map(ctx);

    let survivors: Vec<Contract> = contracts
        .into_iter()
        .filter(|c| {
            c.kind == ContractKind::ItemExchange
                && c.date_expired > ctx.now
                && c.price >= params.min_contract_price
                && location_systems
                    .get(&c.start_location_id)
                    .is_some_and(|system| ctx.buy_systems.contains_key(system))
        })
        .collect();

    progress(&format!(
        "{} contracts pass the pre-filter, fetching items",
        survivors.len()
    ));
    if cancel.is_cancelled() {
        return Err(ScanError::Canceled);
    }

    let ids: Vec<i64> = survivors.iter().map(|c| c.contract_id).collect();
    let items = contract_feed
        .fetch_contract_items_batch(&ids, Arc::clone(&progress))
        .await?;

    // Estimate mode leans on per-type history; fetch each (region, type)
    // once across all contracts.
    let histories = if params.contract_instant_liquidation {
        Arc::new(DashMap::new())
    } else {
        let mut wanted: HashSet<(i32, i32)> = HashSet::new();
        for contract in &survivors {
            let Some(region) = contract_region(contract, &location_systems, ctx) else {
                continue;
            };
            for item in items.get(&contract.contract_id).into_iter().flatten() {
                wanted.insert((region, item.type_id));
            }
        }
        fetch_histories(wanted, Arc::clone(&history_feed), cancel).await?
    };

    let adjusted_prices = match &industry_feed {
        Some(feed) => feed.all_adjusted_prices().await.unwrap_or_default(),
        None => HashMap::new(),
    };

    let bids_by_system = bids_by_type_system(ctx.index);

    let mut deals = Vec::new();
    for contract in survivors {
        if cancel.is_cancelled() {
            return Err(ScanError::Canceled);
        }
        let Some(lines) = items.get(&contract.contract_id) else {
            continue;
        };
        if let Some(deal) = evaluate_one(
            &contract,
            lines,
            ctx,
            &location_systems,
            &histories,
            &adjusted_prices,
            &bids_by_system,
        ) {
            deals.push(deal);
        }
    }

    deals.sort_by(|a, b| {
        b.expected_profit
            .partial_cmp(&a.expected_profit)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.contract_id.cmp(&b.contract_id))
    });
    deals.truncate(params.max_results.max(1));

    for deal in deals.iter_mut() {
        deal.sanitize(sanitizer);
    }

    progress(&format!("{} contract deals after evaluation", deals.len()));
    Ok(deals)
}

/// Station catalog first, then locations observed on market orders.
fn location_system_map(ctx: &ContractScanContext<'_>) -> HashMap<i64, i32> {
    let mut map: HashMap<i64, i32> = ctx
        .static_data
        .stations
        .iter()
        .map(|(&location, station)| (location, station.system_id))
        .collect();
    for order in ctx
        .index
        .asks
        .orders
        .iter()
        .chain(ctx.index.bids.orders.iter())
    {
        map.entry(order.location_id).or_insert(order.system_id);
    }
    map
}

fn contract_region(
    contract: &Contract,
    location_systems: &HashMap<i64, i32>,
    ctx: &ContractScanContext<'_>,
) -> Option<i32> {
    if let Some(region) = ctx.params.target_region_id {
        return Some(region);
    }
    location_systems
        .get(&contract.start_location_id)
        .and_then(|&system| ctx.static_data.region_of_system(system))
}

async fn fetch_histories(
    wanted: HashSet<(i32, i32)>,
    history_feed: Arc<dyn HistoryFeed>,
    cancel: &CancellationToken,
) -> Result<Arc<DashMap<(i32, i32), Vec<HistoryEntry>>>, ScanError> {
    let fetched: Arc<DashMap<(i32, i32), Vec<HistoryEntry>>> = Arc::new(DashMap::new());
    let semaphore = Arc::new(Semaphore::new(defaults::CONTRACT_HISTORY_CONCURRENCY));
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
    Ok(fetched)
}

/// Descending bid levels aggregated per (type, system) across every
/// location in the indexed sell radius.
fn bids_by_type_system(index: &OrderIndex) -> HashMap<(i32, i32), Vec<BookLevel>> {
    let mut grouped: HashMap<(i32, i32), Vec<&scanner_core::Order>> = HashMap::new();
    for order in &index.bids.orders {
        grouped
            .entry((order.type_id, order.system_id))
            .or_default()
            .push(order);
    }
    grouped
        .into_iter()
        .map(|(key, orders)| (key, bid_levels(orders.into_iter())))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn evaluate_one(
    contract: &Contract,
    items: &[ContractItem],
    ctx: &ContractScanContext<'_>,
    location_systems: &HashMap<i64, i32>,
    histories: &DashMap<(i32, i32), Vec<HistoryEntry>>,
    adjusted_prices: &HashMap<i32, f64>,
    bids_by_system: &HashMap<(i32, i32), Vec<BookLevel>>,
) -> Option<ContractDeal> {
    let params = ctx.params;
    let static_data = ctx.static_data;
    let region_id = contract_region(contract, location_systems, ctx)?;
    let system_id = *location_systems.get(&contract.start_location_id)?;

    // Pass 1: ship presence and size drive the rig and module rules.
    let mut contract_ship: Option<ShipSize> = None;
    let mut has_ship = false;
    for item in items.iter().filter(|i| i.is_included) {
        if let Some(item_type) = static_data.types.get(&item.type_id) {
            if item_type.category_id == SHIP_CATEGORY_ID {
                has_ship = true;
                if contract_ship.is_none() {
                    contract_ship = ship_size(item_type);
                }
            }
        }
    }

    // Pass 2: aggregate included quantities, applying the exclusion
    // rules; collect required-provided quantities separately.
    let mut included: HashMap<i32, Line> = HashMap::new();
    let mut provided: HashMap<i32, i64> = HashMap::new();
    for item in items {
        if item.quantity <= 0 {
            continue;
        }
        if !item.is_included {
            *provided.entry(item.type_id).or_insert(0) += item.quantity;
            continue;
        }
        if item.is_blueprint_original() || item.is_blueprint_copy || item.is_damaged() {
            continue;
        }
        let item_type = static_data.types.get(&item.type_id);
        if let Some(item_type) = item_type {
            if is_rig(item_type) {
                if params.exclude_rigs_with_ship && has_ship {
                    continue;
                }
                if has_ship && rig_size(item_type) == contract_ship && contract_ship.is_some() {
                    continue;
                }
            }
        }
        let haircut = has_ship
            && item_type.map(is_loose_module).unwrap_or(false);
        included
            .entry(item.type_id)
            .and_modify(|line| line.quantity += item.quantity)
            .or_insert(Line {
                type_id: item.type_id,
                quantity: item.quantity,
                haircut,
            });
    }
    if included.is_empty() {
        // Blueprint-only or fully excluded contract.
        return None;
    }

    // Every required-provided line must be priceable or the whole
    // contract is inconsistent.
    let mut provided_cost = 0.0;
    for (&type_id, &quantity) in &provided {
        let unit = reference_price(type_id, region_id, ctx, histories, adjusted_prices)?;
        provided_cost += unit * quantity as f64;
    }

    let mut lines: Vec<&Line> = included.values().collect();
    lines.sort_by_key(|line| line.type_id);

    let total_cost = contract.price + provided_cost;
    let deal = if params.contract_instant_liquidation {
        price_instant(contract, &lines, ctx, bids_by_system, total_cost)?
    } else {
        price_estimate(contract, &lines, ctx, region_id, histories, total_cost)?
    };

    if deal.expected_profit <= 0.0 {
        return None;
    }
    // Margins beyond the cap are bait, not bargains.
    if deal.margin_pct > params.max_contract_margin {
        return None;
    }
    if deal.margin_pct < params.min_margin {
        return None;
    }

    let mut deal = deal;
    deal.system_id = system_id;
    deal.region_id = region_id;
    deal.system_name = static_data
        .system_name(system_id)
        .unwrap_or_default()
        .to_string();
    deal.region_name = static_data
        .region_name(region_id)
        .unwrap_or_default()
        .to_string();
    deal.has_ship = has_ship;
    deal.ship_size = contract_ship;
    Some(deal)
}

/// Per-type pricing snapshot for one contract line, derived from the
/// indexed asks and the fetched history.
fn line_price_data(
    type_id: i32,
    ctx: &ContractScanContext<'_>,
    history: &[HistoryEntry],
) -> ItemPriceData {
    let quote = ctx.index.asks.best.get(&type_id);
    ItemPriceData {
        min_ask: quote.map(|q| q.price).unwrap_or(0.0),
        ask_volume_total: quote.map(|q| q.volume_remain).unwrap_or(0),
        ask_order_count: quote.map(|q| q.order_count).unwrap_or(0),
        vwap_30d: vwap(history, 30),
        avg_daily_volume_7d: avg_daily_volume(history, 7),
        has_history: !history.is_empty(),
    }
}

/// Best ask in the indexed radius, then VWAP, then the published
/// adjusted price.
fn reference_price(
    type_id: i32,
    region_id: i32,
    ctx: &ContractScanContext<'_>,
    histories: &DashMap<(i32, i32), Vec<HistoryEntry>>,
    adjusted_prices: &HashMap<i32, f64>,
) -> Option<f64> {
    if let Some(ask) = ctx.index.asks.best.get(&type_id) {
        if ask.price > 0.0 {
            return Some(ask.price);
        }
    }
    if let Some(history) = histories.get(&(region_id, type_id)) {
        let value = vwap(history.value(), 30);
        if value > 0.0 {
            return Some(value);
        }
    }
    adjusted_prices.get(&type_id).copied().filter(|&p| p > 0.0)
}

/// Instant mode: all lines must liquidate in one common system; pick the
/// system maximizing summed walked proceeds.
fn price_instant(
    contract: &Contract,
    lines: &[&Line],
    ctx: &ContractScanContext<'_>,
    bids_by_system: &HashMap<(i32, i32), Vec<BookLevel>>,
    total_cost: f64,
) -> Option<ContractDeal> {
    let mut common: Option<HashSet<i32>> = None;
    for line in lines {
        let systems: HashSet<i32> = bids_by_system
            .keys()
            .filter(|(type_id, _)| *type_id == line.type_id)
            .map(|(_, system)| *system)
            .collect();
        common = Some(match common {
            None => systems,
            Some(prev) => prev.intersection(&systems).copied().collect(),
        });
    }
    let common = common?;
    if common.is_empty() {
        return None;
    }

    let mut best: Option<(i32, f64, usize)> = None;
    let mut candidates: Vec<i32> = common.into_iter().collect();
    candidates.sort_unstable();
    for system in candidates {
        let mut proceeds = 0.0;
        let mut priced = 0;
        for line in lines {
            let Some(levels) = bids_by_system.get(&(line.type_id, system)) else {
                continue;
            };
            let plan = walk_book(levels, line.quantity, BookSide::Bid);
            if plan.filled > 0 {
                proceeds += plan.expected_price * plan.filled as f64;
                priced += 1;
            }
        }
        let better = match best {
            None => true,
            Some((_, best_proceeds, _)) => proceeds > best_proceeds,
        };
        if better {
            best = Some((system, proceeds, priced));
        }
    }
    let (sell_system, gross, priced) = best?;
    if gross <= 0.0 {
        return None;
    }

    let fees = instant_fee_multipliers(ctx.params.sales_tax_pct);
    let net = fees.effective_sell(gross);
    let expected_profit = net - total_cost;
    let margin_pct = if total_cost > 0.0 {
        expected_profit / total_cost * 100.0
    } else {
        0.0
    };

    Some(ContractDeal {
        contract_id: contract.contract_id,
        title: contract.title.clone(),
        price: contract.price,
        start_location_id: contract.start_location_id,
        market_value: gross,
        expected_gross: net,
        expected_profit,
        margin_pct,
        priced_items: priced,
        unpriced_items: lines.len() - priced,
        provided_items_cost: total_cost - contract.price,
        fill_probability: 1.0,
        liquidation_days: 0.0,
        carry_cost: 0.0,
        sell_system_id: Some(sell_system),
        instant: true,
        ..ContractDeal::default()
    })
}

/// Estimate mode: VWAP-based valuation with the liquidity-horizon model.
fn price_estimate(
    contract: &Contract,
    lines: &[&Line],
    ctx: &ContractScanContext<'_>,
    region_id: i32,
    histories: &DashMap<(i32, i32), Vec<HistoryEntry>>,
    total_cost: f64,
) -> Option<ContractDeal> {
    let params = ctx.params;
    let horizon = params.contract_hold_days as f64;

    let mut market_value = 0.0;
    let mut expected_gross = 0.0;
    let mut fill_prob = 1.0;
    let mut slowest_days: f64 = 0.0;
    let mut priced = 0usize;
    let mut unpriced = 0usize;

    for line in lines {
        let history_entry = histories.get(&(region_id, line.type_id));
        let history: &[HistoryEntry] = history_entry
            .as_ref()
            .map(|h| h.value().as_slice())
            .unwrap_or(&[]);

        let price_data = line_price_data(line.type_id, ctx, history);

        // History-derived VWAP when available; without history the book
        // is the only proxy and no flow-sensitive output is trusted.
        let mut unit = if price_data.has_history && price_data.vwap_30d > 0.0 {
            if price_data.min_ask > 0.0 && price_data.min_ask < 0.5 * price_data.vwap_30d {
                // Asks far below VWAP are either a crash or a stale
                // average; cap the valuation to the cheaper story.
                (price_data.vwap_30d * 0.7).min(price_data.min_ask * 2.0)
            } else {
                price_data.vwap_30d
            }
        } else if price_data.min_ask > 0.0 {
            price_data.min_ask
        } else {
            unpriced += 1;
            continue;
        };
        if line.haircut {
            unit *= defaults::CONTRACT_SHIP_MODULE_VALUE_FACTOR;
        }

        let value = unit * line.quantity as f64;
        market_value += value;
        priced += 1;

        let fill_days = if price_data.has_history && price_data.avg_daily_volume_7d > 0.0 {
            line.quantity as f64
                / (price_data.avg_daily_volume_7d * defaults::CONTRACT_FILL_PARTICIPATION)
        } else {
            f64::INFINITY
        };
        let p = fill_probability(fill_days, horizon);
        fill_prob *= p;
        expected_gross += value * p;
        if fill_days.is_finite() {
            slowest_days = slowest_days.max(fill_days);
        } else {
            slowest_days = f64::MAX;
        }
    }

    let total_lines = priced + unpriced;
    if total_lines == 0 || market_value <= 0.0 {
        return None;
    }
    if (unpriced as f64 / total_lines as f64) > (1.0 - params.min_priced_ratio) {
        return None;
    }
    if fill_prob < params.contract_target_confidence / 100.0 {
        return None;
    }

    let sell_fees = trade_fee_multipliers(0.0, params.sell_broker_pct(), params.sales_tax_pct);
    let conservative = expected_gross
        * (1.0 - defaults::CONTRACT_CONSERVATIVE_PRICE_HAIRCUT)
        * sell_fees.sell_revenue;
    let carry_days = horizon.min(if slowest_days == f64::MAX {
        horizon
    } else {
        slowest_days
    });
    let carry_cost = total_cost * defaults::CONTRACT_DAILY_CARRY_RATE * carry_days;
    let expected_profit = conservative - total_cost - carry_cost;
    let margin_pct = if total_cost > 0.0 {
        expected_profit / total_cost * 100.0
    } else {
        0.0
    };

    Some(ContractDeal {
        contract_id: contract.contract_id,
        title: contract.title.clone(),
        price: contract.price,
        start_location_id: contract.start_location_id,
        market_value,
        expected_gross: conservative,
        expected_profit,
        margin_pct,
        priced_items: priced,
        unpriced_items: unpriced,
        provided_items_cost: total_cost - contract.price,
        fill_probability: fill_prob,
        liquidation_days: if slowest_days == f64::MAX {
            9999.0
        } else {
            slowest_days
        },
        carry_cost,
        sell_system_id: None,
        instant: false,
        ..ContractDeal::default()
    })
}
