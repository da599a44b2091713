use market_metrics::{bid_levels, instant_fee_multipliers, trade_fee_multipliers, walk_book,
    BookSide, FeeMultipliers};
use scanner_core::{Order, ScanParams};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Catalog ids of the currency-adjacent items.
pub const PLEX_TYPE_ID: i32 = 44992;
pub const SKILL_EXTRACTOR_TYPE_ID: i32 = 40519;
pub const LARGE_SKILL_INJECTOR_TYPE_ID: i32 = 40520;
pub const MPTC_TYPE_ID: i32 = 34133;

/// In-store price tags, denominated in PLEX.
pub const NES_EXTRACTOR_PLEX: f64 = 366.0;
pub const NES_MPTC_PLEX: f64 = 485.0;

/// Quantity used when probing a book for execution-adjusted pricing.
const EXECUTION_PROBE_UNITS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    /// Buy PLEX, spend it in the store, sell the item on the market.
    StoreToMarket,
    /// Store-bought extractor converted into an injector.
    SpChainStore,
    /// Market-bought extractor converted into an injector.
    SpChainMarket,
    /// Resting limit orders on both sides of one book.
    MakerSpread,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitragePath {
    pub kind: PathKind,
    pub name: String,
    pub item_type_id: i32,
    pub cost: f64,
    pub gross_revenue: f64,
    pub net_revenue: f64,
    pub profit: f64,
    pub roi_pct: f64,
    /// Unit sale price at which the path breaks even.
    pub break_even_unit_price: f64,
    pub estimated_minutes: f64,
    pub roi_per_hour: f64,
    /// Profit after walking the sell book instead of taking the touch.
    pub execution_adjusted_profit: f64,
}

/// Best bid/ask per related book, the working view for path pricing.
#[derive(Debug, Clone, Default)]
pub struct BookTops {
    pub best_bid: HashMap<i32, f64>,
    pub best_ask: HashMap<i32, f64>,
}

pub fn book_tops(orders_by_type: &HashMap<i32, Vec<Order>>) -> BookTops {
    let mut tops = BookTops::default();
    for (&type_id, orders) in orders_by_type {
        let mut best_bid: f64 = 0.0;
        let mut best_ask = f64::INFINITY;
        for order in orders {
            if order.price <= 0.0 || order.volume_remain <= 0 {
                continue;
            }
            if order.is_buy_order {
                best_bid = best_bid.max(order.price);
            } else {
                best_ask = best_ask.min(order.price);
            }
        }
        if best_bid > 0.0 {
            tops.best_bid.insert(type_id, best_bid);
        }
        if best_ask.is_finite() {
            tops.best_ask.insert(type_id, best_ask);
        }
    }
    tops
}

/// Build the fixed path catalog. Paths that trade a market-disabled item
/// are suppressed entirely; paths missing a quote survive with zeroed
/// economics so the dashboard can show the gap.
pub fn build_paths(
    orders_by_type: &HashMap<i32, Vec<Order>>,
    market_disabled: &HashSet<i32>,
    params: &ScanParams,
) -> Vec<ArbitragePath> {
    let tops = book_tops(orders_by_type);
    let taker = instant_fee_multipliers(params.sales_tax_pct);
    let maker = trade_fee_multipliers(
        params.buy_broker_pct(),
        params.sell_broker_pct(),
        params.sales_tax_pct,
    );

    let plex_ask = tops.best_ask.get(&PLEX_TYPE_ID).copied().unwrap_or(0.0);

    let mut paths = Vec::new();

    let store_items: [(i32, &str, f64); 2] = [
        (SKILL_EXTRACTOR_TYPE_ID, "Skill Extractor", NES_EXTRACTOR_PLEX),
        (MPTC_TYPE_ID, "Multiple Pilot Training Certificate", NES_MPTC_PLEX),
    ];
    for (type_id, name, store_plex) in store_items {
        if market_disabled.contains(&type_id) {
            continue;
        }
        paths.push(store_to_market(
            type_id,
            name,
            store_plex,
            plex_ask,
            orders_by_type,
            &tops,
            &taker,
        ));
    }

    if !market_disabled.contains(&LARGE_SKILL_INJECTOR_TYPE_ID) {
        // Store chain: PLEX buys the extractor, the extraction yields an
        // injector to sell.
        let store_cost = NES_EXTRACTOR_PLEX * plex_ask;
        paths.push(sp_chain(
            PathKind::SpChainStore,
            "SP chain (store extractor)",
            store_cost,
            orders_by_type,
            &tops,
            &taker,
        ));

        let market_cost = tops
            .best_ask
            .get(&SKILL_EXTRACTOR_TYPE_ID)
            .copied()
            .unwrap_or(0.0);
        paths.push(sp_chain(
            PathKind::SpChainMarket,
            "SP chain (market extractor)",
            market_cost,
            orders_by_type,
            &tops,
            &taker,
        ));
    }

    let maker_items: [(i32, &str); 4] = [
        (PLEX_TYPE_ID, "PLEX"),
        (LARGE_SKILL_INJECTOR_TYPE_ID, "Large Skill Injector"),
        (SKILL_EXTRACTOR_TYPE_ID, "Skill Extractor"),
        (MPTC_TYPE_ID, "Multiple Pilot Training Certificate"),
    ];
    for (type_id, name) in maker_items {
        if market_disabled.contains(&type_id) {
            continue;
        }
        paths.push(maker_spread(type_id, name, orders_by_type, &tops, &maker));
    }

    paths
}

fn execution_adjusted(
    type_id: i32,
    cost: f64,
    orders_by_type: &HashMap<i32, Vec<Order>>,
    fees: &FeeMultipliers,
) -> f64 {
    let Some(orders) = orders_by_type.get(&type_id) else {
        return 0.0;
    };
    let bids = bid_levels(orders.iter());
    let plan = walk_book(&bids, EXECUTION_PROBE_UNITS, BookSide::Bid);
    if plan.filled == 0 {
        return 0.0;
    }
    fees.effective_sell(plan.expected_price) - cost
}

fn store_to_market(
    type_id: i32,
    name: &str,
    store_plex: f64,
    plex_ask: f64,
    orders_by_type: &HashMap<i32, Vec<Order>>,
    tops: &BookTops,
    taker: &FeeMultipliers,
) -> ArbitragePath {
    let cost = store_plex * plex_ask;
    let gross = tops.best_bid.get(&type_id).copied().unwrap_or(0.0);
    let net = taker.effective_sell(gross);
    let minutes = 5.0;
    finish_path(
        PathKind::StoreToMarket,
        format!("Store {} to market", name),
        type_id,
        cost,
        gross,
        net,
        minutes,
        execution_adjusted(type_id, cost, orders_by_type, taker),
        taker,
    )
}

fn sp_chain(
    kind: PathKind,
    name: &str,
    cost: f64,
    orders_by_type: &HashMap<i32, Vec<Order>>,
    tops: &BookTops,
    taker: &FeeMultipliers,
) -> ArbitragePath {
    let gross = tops
        .best_bid
        .get(&LARGE_SKILL_INJECTOR_TYPE_ID)
        .copied()
        .unwrap_or(0.0);
    let net = taker.effective_sell(gross);
    let minutes = if kind == PathKind::SpChainStore { 10.0 } else { 5.0 };
    finish_path(
        kind,
        name.to_string(),
        LARGE_SKILL_INJECTOR_TYPE_ID,
        cost,
        gross,
        net,
        minutes,
        execution_adjusted(LARGE_SKILL_INJECTOR_TYPE_ID, cost, orders_by_type, taker),
        taker,
    )
}

fn maker_spread(
    type_id: i32,
    name: &str,
    orders_by_type: &HashMap<i32, Vec<Order>>,
    tops: &BookTops,
    maker: &FeeMultipliers,
) -> ArbitragePath {
    let bid = tops.best_bid.get(&type_id).copied().unwrap_or(0.0);
    let ask = tops.best_ask.get(&type_id).copied().unwrap_or(0.0);
    let cost = maker.effective_buy(bid);
    let gross = ask;
    let net = maker.effective_sell(ask);
    finish_path(
        PathKind::MakerSpread,
        format!("Maker spread on {}", name),
        type_id,
        cost,
        gross,
        net,
        30.0,
        execution_adjusted(type_id, cost, orders_by_type, maker),
        maker,
    )
}

#[allow(clippy::too_many_arguments)]
fn finish_path(
    kind: PathKind,
    name: String,
    item_type_id: i32,
    cost: f64,
    gross_revenue: f64,
    net_revenue: f64,
    estimated_minutes: f64,
    execution_adjusted_profit: f64,
    fees: &FeeMultipliers,
) -> ArbitragePath {
    let profit = net_revenue - cost;
    let roi_pct = if cost > 0.0 { profit / cost * 100.0 } else { 0.0 };
    let break_even = if fees.sell_revenue > 0.0 {
        cost / fees.sell_revenue
    } else {
        0.0
    };
    let roi_per_hour = if estimated_minutes > 0.0 {
        roi_pct / (estimated_minutes / 60.0)
    } else {
        0.0
    };
    ArbitragePath {
        kind,
        name,
        item_type_id,
        cost,
        gross_revenue,
        net_revenue,
        profit,
        roi_pct,
        break_even_unit_price: break_even,
        estimated_minutes,
        roi_per_hour,
        execution_adjusted_profit,
    }
}
