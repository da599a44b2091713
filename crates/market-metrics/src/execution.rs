use crate::fees::FeeMultipliers;
use scanner_core::{finite_or, Order};
use serde::{Deserialize, Serialize};

/// One consumable price level of a sorted book view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    /// Ascending ask levels, consumed when buying.
    Ask,
    /// Descending bid levels, consumed when selling.
    Bid,
}

/// Sorted ask view (ascending) for one (location, type) book.
pub fn ask_levels<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Vec<BookLevel> {
    let mut levels: Vec<BookLevel> = orders
        .into_iter()
        .filter(|o| !o.is_buy_order && o.price > 0.0 && o.volume_remain > 0)
        .map(|o| BookLevel {
            price: o.price,
            volume: o.volume_remain,
        })
        .collect();
    levels.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));
    levels
}

/// Sorted bid view (descending).
pub fn bid_levels<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Vec<BookLevel> {
    let mut levels: Vec<BookLevel> = orders
        .into_iter()
        .filter(|o| o.is_buy_order && o.price > 0.0 && o.volume_remain > 0)
        .map(|o| BookLevel {
            price: o.price,
            volume: o.volume_remain,
        })
        .collect();
    levels.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal));
    levels
}

/// Result of walking a sorted book to fill a target quantity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Volume-weighted average over the consumed levels.
    pub expected_price: f64,
    /// Worst consumed level vs the best level, percent. Positive when the
    /// fill walks away from the touch on either side.
    pub slippage_pct: f64,
    pub can_fill: bool,
    pub filled: i64,
}

/// Walk a sorted book view to fill `quantity`. When depth runs out the
/// plan reports `can_fill = false` with the partial fill priced.
pub fn walk_book(levels: &[BookLevel], quantity: i64, side: BookSide) -> ExecutionPlan {
    if quantity <= 0 || levels.is_empty() {
        return ExecutionPlan::default();
    }

    let best = levels[0].price;
    let mut remaining = quantity;
    let mut cost = 0.0;
    let mut last_price = best;

    for level in levels {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(level.volume);
        cost += level.price * take as f64;
        last_price = level.price;
        remaining -= take;
    }

    let filled = quantity - remaining;
    if filled == 0 {
        return ExecutionPlan::default();
    }

    let expected_price = finite_or(cost / filled as f64, 0.0);
    let slippage_pct = if best > 0.0 {
        let raw = (last_price - best) / best * 100.0;
        match side {
            BookSide::Ask => raw,
            BookSide::Bid => -raw,
        }
    } else {
        0.0
    };

    ExecutionPlan {
        expected_price,
        slippage_pct: finite_or(slippage_pct, 0.0),
        can_fill: remaining == 0,
        filled,
    }
}

/// Outcome of the maker-mode safe-quantity bisection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeQuantity {
    pub quantity: i64,
    pub buy_plan: ExecutionPlan,
    pub sell_plan: ExecutionPlan,
    pub net_profit: f64,
}

/// Bisect downward from `target` to the largest quantity whose per-unit
/// net profit stays positive after fees. Per-unit profit is monotone
/// non-increasing in quantity (walking deeper only worsens both fills),
/// so plain bisection applies. Returns None when even a single unit
/// loses money or either book is empty.
pub fn safe_quantity_search(
    asks: &[BookLevel],
    bids: &[BookLevel],
    target: i64,
    fees: &FeeMultipliers,
) -> Option<SafeQuantity> {
    if target <= 0 || asks.is_empty() || bids.is_empty() {
        return None;
    }

    let ask_depth: i64 = asks.iter().map(|l| l.volume).sum();
    let bid_depth: i64 = bids.iter().map(|l| l.volume).sum();
    let mut hi = target.min(ask_depth).min(bid_depth);
    if hi <= 0 {
        return None;
    }

    let per_unit = |q: i64| -> f64 {
        let buy = walk_book(asks, q, BookSide::Ask);
        let sell = walk_book(bids, q, BookSide::Bid);
        fees.effective_sell(sell.expected_price) - fees.effective_buy(buy.expected_price)
    };

    if per_unit(1) <= 0.0 {
        return None;
    }

    let mut lo = 1i64;
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if per_unit(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    let buy_plan = walk_book(asks, lo, BookSide::Ask);
    let sell_plan = walk_book(bids, lo, BookSide::Bid);
    let net_profit = (fees.effective_sell(sell_plan.expected_price)
        - fees.effective_buy(buy_plan.expected_price))
        * lo as f64;

    Some(SafeQuantity {
        quantity: lo,
        buy_plan,
        sell_plan,
        net_profit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asks() -> Vec<BookLevel> {
        vec![
            BookLevel { price: 100.0, volume: 10 },
            BookLevel { price: 105.0, volume: 10 },
            BookLevel { price: 120.0, volume: 10 },
        ]
    }

    fn bids() -> Vec<BookLevel> {
        vec![
            BookLevel { price: 95.0, volume: 10 },
            BookLevel { price: 90.0, volume: 10 },
        ]
    }

    #[test]
    fn walk_single_level() {
        let plan = walk_book(&asks(), 5, BookSide::Ask);
        assert!(plan.can_fill);
        assert_eq!(plan.filled, 5);
        assert_eq!(plan.expected_price, 100.0);
        assert_eq!(plan.slippage_pct, 0.0);
    }

    #[test]
    fn walk_spans_levels_with_slippage() {
        let plan = walk_book(&asks(), 15, BookSide::Ask);
        assert!(plan.can_fill);
        // 10 @ 100 + 5 @ 105
        let expected = (10.0 * 100.0 + 5.0 * 105.0) / 15.0;
        assert!((plan.expected_price - expected).abs() < 1e-9);
        assert!((plan.slippage_pct - 5.0).abs() < 1e-9);
        // Never better than the touch on the buy side.
        assert!(plan.expected_price >= 100.0);
    }

    #[test]
    fn walk_partial_fill_reported() {
        let plan = walk_book(&asks(), 100, BookSide::Ask);
        assert!(!plan.can_fill);
        assert_eq!(plan.filled, 30);
        assert!(plan.expected_price > 100.0);
    }

    #[test]
    fn bid_side_slippage_positive_when_walking_down() {
        let plan = walk_book(&bids(), 15, BookSide::Bid);
        assert!(plan.can_fill);
        assert!(plan.slippage_pct > 0.0);
        assert!(plan.expected_price <= 95.0);
    }

    #[test]
    fn zero_quantity_is_empty_plan() {
        let plan = walk_book(&asks(), 0, BookSide::Ask);
        assert!(!plan.can_fill);
        assert_eq!(plan.filled, 0);
        assert_eq!(plan.expected_price, 0.0);
    }

    #[test]
    fn safe_quantity_full_target_when_profitable() {
        // Selling at 95 after buying at 100 loses; flip the books so the
        // maker spread is wide enough to stay profitable at depth.
        let asks = vec![BookLevel { price: 80.0, volume: 20 }];
        let bids = vec![BookLevel { price: 95.0, volume: 20 }];
        let safe = safe_quantity_search(&asks, &bids, 10, &FeeMultipliers::none()).unwrap();
        assert_eq!(safe.quantity, 10);
        assert!((safe.net_profit - 150.0).abs() < 1e-9);
    }

    #[test]
    fn safe_quantity_bisects_below_target() {
        // Second ask level erases the edge, so only the first 10 work.
        let asks = vec![
            BookLevel { price: 80.0, volume: 10 },
            BookLevel { price: 200.0, volume: 100 },
        ];
        let bids = vec![BookLevel { price: 95.0, volume: 200 }];
        let safe = safe_quantity_search(&asks, &bids, 100, &FeeMultipliers::none()).unwrap();
        assert!(safe.quantity >= 10 && safe.quantity < 100);
        assert!(safe.net_profit > 0.0);
    }

    #[test]
    fn safe_quantity_none_when_unprofitable() {
        let result = safe_quantity_search(&asks(), &bids(), 10, &FeeMultipliers::none());
        assert!(result.is_none());
    }

    #[test]
    fn expected_price_never_beats_the_touch() {
        // Buy fills pay at least the best ask; sell fills receive at
        // most the best bid, at every quantity.
        for quantity in 1..=40 {
            let buy = walk_book(&asks(), quantity, BookSide::Ask);
            if buy.filled > 0 {
                assert!(buy.expected_price >= 100.0);
                assert!(buy.slippage_pct >= 0.0);
            }
            let sell = walk_book(&bids(), quantity, BookSide::Bid);
            if sell.filled > 0 {
                assert!(sell.expected_price <= 95.0);
                assert!(sell.slippage_pct >= 0.0);
            }
        }
    }

    #[test]
    fn expected_price_monotone_in_quantity() {
        let mut last = 0.0;
        for quantity in 1..=30 {
            let plan = walk_book(&asks(), quantity, BookSide::Ask);
            assert!(plan.expected_price >= last);
            last = plan.expected_price;
        }
    }

    #[test]
    fn ask_levels_sorted_and_filtered() {
        let orders = vec![
            Order {
                order_id: 1,
                type_id: 34,
                location_id: 60003760,
                system_id: 30000142,
                price: 105.0,
                volume_remain: 5,
                is_buy_order: false,
            },
            Order {
                order_id: 2,
                type_id: 34,
                location_id: 60003760,
                system_id: 30000142,
                price: 100.0,
                volume_remain: 5,
                is_buy_order: false,
            },
            Order {
                order_id: 3,
                type_id: 34,
                location_id: 60003760,
                system_id: 30000142,
                price: 99.0,
                volume_remain: 5,
                is_buy_order: true,
            },
        ];
        let levels = ask_levels(orders.iter());
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].price, 100.0);
    }
}
