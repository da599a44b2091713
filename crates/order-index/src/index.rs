use scanner_core::Order;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Best price for a type on one side, with the location that holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestQuote {
    pub price: f64,
    pub volume_remain: i64,
    pub location_id: i64,
    pub system_id: i32,
    /// Orders resting at (type, winning location); backfilled once the
    /// streams close.
    pub order_count: u32,
}

/// One side of the scanned market. Reducers are commutative (min / max /
/// sum), so the final state is independent of batch arrival order.
#[derive(Debug, Default)]
pub struct SideIndex {
    /// type id -> best quote (minimum price for asks, maximum for bids).
    pub best: HashMap<i32, BestQuote>,
    /// (type id, location id) -> resting order count.
    pub order_count: HashMap<(i32, i64), u32>,
    /// Raw orders retained for execution-plan reuse.
    pub orders: Vec<Order>,
    /// (type id, location id) -> indices into `orders`.
    books: HashMap<(i32, i64), Vec<u32>>,
}

impl SideIndex {
    /// Fold one order into the index. `better` decides whether a price
    /// beats the incumbent (less-than for asks, greater-than for bids);
    /// ties go to the lower order id so concurrent scans agree.
    pub(crate) fn absorb(&mut self, order: Order, better: fn(f64, f64) -> bool) {
        *self
            .order_count
            .entry((order.type_id, order.location_id))
            .or_insert(0) += 1;

        let replace = match self.best.get(&order.type_id) {
            None => true,
            Some(incumbent) => {
                better(order.price, incumbent.price)
                    || (order.price == incumbent.price && order.location_id < incumbent.location_id)
            }
        };
        if replace {
            self.best.insert(
                order.type_id,
                BestQuote {
                    price: order.price,
                    volume_remain: order.volume_remain,
                    location_id: order.location_id,
                    system_id: order.system_id,
                    order_count: 0,
                },
            );
        } else if let Some(incumbent) = self.best.get_mut(&order.type_id) {
            if incumbent.price == order.price && incumbent.location_id == order.location_id {
                incumbent.volume_remain += order.volume_remain;
            }
        }

        let idx = self.orders.len() as u32;
        self.books
            .entry((order.type_id, order.location_id))
            .or_default()
            .push(idx);
        self.orders.push(order);
    }

    /// Every (type, location) book present on this side.
    pub fn book_keys(&self) -> impl Iterator<Item = (i32, i64)> + '_ {
        self.books.keys().copied()
    }

    /// All retained orders for one (type, location) book.
    pub fn book(&self, type_id: i32, location_id: i64) -> impl Iterator<Item = &Order> {
        self.books
            .get(&(type_id, location_id))
            .into_iter()
            .flatten()
            .map(|&i| &self.orders[i as usize])
    }

    /// Total remaining volume at (type, location).
    pub fn book_depth(&self, type_id: i32, location_id: i64) -> i64 {
        self.book(type_id, location_id)
            .map(|o| o.volume_remain)
            .sum()
    }

    pub(crate) fn backfill_best_order_counts(&mut self) {
        for (type_id, quote) in self.best.iter_mut() {
            quote.order_count = self
                .order_count
                .get(&(*type_id, quote.location_id))
                .copied()
                .unwrap_or(0);
        }
    }
}

/// Both sides of the scanned market, built fresh per scan.
#[derive(Debug, Default)]
pub struct OrderIndex {
    pub asks: SideIndex,
    pub bids: SideIndex,
}

impl OrderIndex {
    /// Fold one order into the matching side.
    pub fn ingest(&mut self, order: Order) {
        if order.is_buy_order {
            self.bids.absorb(order, |candidate, incumbent| candidate > incumbent);
        } else {
            self.asks.absorb(order, |candidate, incumbent| candidate < incumbent);
        }
    }

    /// Run the post-stream pass that stamps order counts onto the
    /// winning best-location entries.
    pub fn finalize(&mut self) {
        self.asks.backfill_best_order_counts();
        self.bids.backfill_best_order_counts();
    }

    /// Build a complete index from an in-memory order set. The streaming
    /// builder is the primary path; this serves tests and callers that
    /// already hold the full region feed.
    pub fn from_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let mut index = Self::default();
        for order in orders {
            if order.price > 0.0 && order.volume_remain > 0 {
                index.ingest(order);
            }
        }
        index.finalize();
        index
    }

    /// Types quoted on both sides, the candidate set for any flip.
    pub fn matched_types(&self) -> Vec<i32> {
        let mut types: Vec<i32> = self
            .asks
            .best
            .keys()
            .filter(|t| self.bids.best.contains_key(t))
            .copied()
            .collect();
        types.sort_unstable();
        types
    }
}
