use crate::index::{OrderIndex, SideIndex};
use futures_util::StreamExt;
use scanner_core::{noop_progress, Order, OrderFeed, OrderSide, Progress, ScanError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Token poll stride while reducing order batches.
const CANCEL_CHECK_STRIDE: u64 = 4096;

/// Channel capacity per side, in batches.
const CHANNEL_CAPACITY: usize = 64;

/// Trade-hub regions fetch first so the largest books start flowing
/// before the long tail of quiet regions.
const HUB_PRIORITY: &[(i32, u8)] = &[
    (10000002, 0), // The Forge
    (10000043, 1), // Domain
    (10000032, 2), // Sinq Laison
    (10000030, 3), // Heimatar
    (10000042, 4), // Metropolis
];

fn region_priority(region_id: i32) -> u8 {
    HUB_PRIORITY
        .iter()
        .find(|(id, _)| *id == region_id)
        .map(|(_, p)| *p)
        .unwrap_or(u8::MAX)
}

/// Region sets and system filters for one index build. The system maps
/// carry BFS jump distances; an order outside its side's map is dropped
/// at the fetcher before it ever reaches a channel.
#[derive(Debug, Clone, Default)]
pub struct IndexRequest {
    pub buy_regions: HashSet<i32>,
    pub sell_regions: HashSet<i32>,
    pub allowed_buy_systems: HashMap<i32, u32>,
    pub allowed_sell_systems: HashMap<i32, u32>,
}

impl IndexRequest {
    fn side_for(&self, region_id: i32) -> OrderSide {
        let buy = self.buy_regions.contains(&region_id);
        let sell = self.sell_regions.contains(&region_id);
        match (buy, sell) {
            (true, true) => OrderSide::All,
            // Buying happens against sell orders and vice versa.
            (true, false) => OrderSide::Sell,
            (false, true) => OrderSide::Buy,
            (false, false) => OrderSide::All,
        }
    }
}

/// Stream every relevant region through two side channels into a pair of
/// single-tasked reducers. Fetchers run in parallel, hub regions first;
/// each consumer owns its side's index so no locking is needed inside
/// the reducers. A lost region is logged and skipped; cancellation
/// abandons the build with `ScanError::Canceled`.
pub async fn build_order_index(
    feed: Arc<dyn OrderFeed>,
    request: &IndexRequest,
    cancel: &CancellationToken,
    progress: Progress,
) -> Result<OrderIndex, ScanError> {
    let mut regions: Vec<i32> = request
        .buy_regions
        .union(&request.sell_regions)
        .copied()
        .collect();
    regions.sort_by_key(|&r| (region_priority(r), r));

    progress(&format!("fetching order books from {} regions", regions.len()));

    let (ask_tx, ask_rx) = mpsc::channel::<Vec<Order>>(CHANNEL_CAPACITY);
    let (bid_tx, bid_rx) = mpsc::channel::<Vec<Order>>(CHANNEL_CAPACITY);

    let mut fetchers = JoinSet::new();
    for region_id in regions {
        let feed = Arc::clone(&feed);
        let side = request.side_for(region_id);
        let buy_systems: HashSet<i32> = request.allowed_buy_systems.keys().copied().collect();
        let sell_systems: HashSet<i32> = request.allowed_sell_systems.keys().copied().collect();
        let ask_tx = ask_tx.clone();
        let bid_tx = bid_tx.clone();
        let cancel = cancel.clone();

        fetchers.spawn(async move {
            let mut stream = match feed.fetch_region_orders(region_id, side).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("region {} order fetch failed: {}", region_id, e);
                    return;
                }
            };

            while let Some(batch) = stream.next().await {
                if cancel.is_cancelled() {
                    return;
                }
                let batch = match batch {
                    Ok(batch) => batch,
                    Err(e) => {
                        tracing::warn!("region {} order page failed: {}", region_id, e);
                        return;
                    }
                };

                let mut asks = Vec::new();
                let mut bids = Vec::new();
                for order in batch {
                    if order.price <= 0.0 || order.volume_remain <= 0 {
                        continue;
                    }
                    if order.is_buy_order {
                        if sell_systems.contains(&order.system_id) {
                            bids.push(order);
                        }
                    } else if buy_systems.contains(&order.system_id) {
                        asks.push(order);
                    }
                }
                if !asks.is_empty() && ask_tx.send(asks).await.is_err() {
                    return;
                }
                if !bids.is_empty() && bid_tx.send(bids).await.is_err() {
                    return;
                }
            }
        });
    }
    // Consumers observe channel close once every fetcher is done.
    drop(ask_tx);
    drop(bid_tx);

    let ask_consumer = tokio::spawn(consume_side(ask_rx, cancel.clone(), false));
    let bid_consumer = tokio::spawn(consume_side(bid_rx, cancel.clone(), true));

    while fetchers.join_next().await.is_some() {}

    let asks = ask_consumer
        .await
        .map_err(|e| ScanError::FeedUnavailable(e.to_string()))??;
    let bids = bid_consumer
        .await
        .map_err(|e| ScanError::FeedUnavailable(e.to_string()))??;

    if cancel.is_cancelled() {
        return Err(ScanError::Canceled);
    }

    let mut index = OrderIndex { asks, bids };
    index.finalize();

    progress(&format!(
        "order index built: {} ask types, {} bid types",
        index.asks.best.len(),
        index.bids.best.len()
    ));

    Ok(index)
}

async fn consume_side(
    mut rx: mpsc::Receiver<Vec<Order>>,
    cancel: CancellationToken,
    is_bid_side: bool,
) -> Result<SideIndex, ScanError> {
    let mut side = SideIndex::default();
    let better: fn(f64, f64) -> bool = if is_bid_side {
        |candidate, incumbent| candidate > incumbent
    } else {
        |candidate, incumbent| candidate < incumbent
    };

    let mut processed: u64 = 0;
    while let Some(batch) = rx.recv().await {
        for order in batch {
            side.absorb(order, better);
            processed += 1;
            if processed % CANCEL_CHECK_STRIDE == 0 && cancel.is_cancelled() {
                return Err(ScanError::Canceled);
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(ScanError::Canceled);
    }
    Ok(side)
}

/// Blocking-in-async convenience used by the station scanner: one region,
/// both sides, no system filter beyond the region itself.
pub async fn build_region_index(
    feed: Arc<dyn OrderFeed>,
    region_id: i32,
    region_systems: &HashMap<i32, u32>,
    cancel: &CancellationToken,
) -> Result<OrderIndex, ScanError> {
    let request = IndexRequest {
        buy_regions: HashSet::from([region_id]),
        sell_regions: HashSet::from([region_id]),
        allowed_buy_systems: region_systems.clone(),
        allowed_sell_systems: region_systems.clone(),
    };
    build_order_index(feed, &request, cancel, noop_progress()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::stream;
    use scanner_core::OrderBatchStream;

    struct FakeFeed {
        batches: HashMap<i32, Vec<Vec<Order>>>,
    }

    #[async_trait]
    impl OrderFeed for FakeFeed {
        async fn fetch_region_orders(
            &self,
            region_id: i32,
            _side: OrderSide,
        ) -> Result<OrderBatchStream<'_>, ScanError> {
            let batches = self
                .batches
                .get(&region_id)
                .cloned()
                .ok_or_else(|| ScanError::FeedUnavailable(format!("region {}", region_id)))?;
            Ok(Box::pin(stream::iter(batches.into_iter().map(Ok))))
        }
    }

    fn order(id: i64, type_id: i32, system: i32, price: f64, volume: i64, buy: bool) -> Order {
        Order {
            order_id: id,
            type_id,
            location_id: 60_000_000 + system as i64,
            system_id: system,
            price,
            volume_remain: volume,
            is_buy_order: buy,
        }
    }

    fn request_for(systems: &[i32]) -> IndexRequest {
        let allowed: HashMap<i32, u32> = systems.iter().map(|&s| (s, 1)).collect();
        IndexRequest {
            buy_regions: HashSet::from([10000002]),
            sell_regions: HashSet::from([10000002]),
            allowed_buy_systems: allowed.clone(),
            allowed_sell_systems: allowed,
        }
    }

    #[tokio::test]
    async fn best_quotes_reduce_across_batches() {
        let feed = Arc::new(FakeFeed {
            batches: HashMap::from([(
                10000002,
                vec![
                    vec![
                        order(1, 34, 30000142, 105.0, 10, false),
                        order(2, 34, 30000142, 100.0, 20, false),
                    ],
                    vec![
                        order(3, 34, 30000142, 90.0, 5, true),
                        order(4, 34, 30000142, 95.0, 7, true),
                        order(5, 35, 30000142, 50.0, 9, false),
                    ],
                ],
            )]),
        });

        let index = build_order_index(
            feed,
            &request_for(&[30000142]),
            &CancellationToken::new(),
            noop_progress(),
        )
        .await
        .unwrap();

        let ask = &index.asks.best[&34];
        assert_eq!(ask.price, 100.0);
        assert_eq!(ask.order_count, 2);
        let bid = &index.bids.best[&34];
        assert_eq!(bid.price, 95.0);
        assert_eq!(index.matched_types(), vec![34]);
        assert_eq!(index.asks.book_depth(34, 60_000_000 + 30000142), 30);
    }

    #[tokio::test]
    async fn orders_outside_allowed_systems_dropped() {
        let feed = Arc::new(FakeFeed {
            batches: HashMap::from([(
                10000002,
                vec![vec![
                    order(1, 34, 30000142, 100.0, 10, false),
                    order(2, 34, 30099999, 10.0, 10, false),
                ]],
            )]),
        });

        let index = build_order_index(
            feed,
            &request_for(&[30000142]),
            &CancellationToken::new(),
            noop_progress(),
        )
        .await
        .unwrap();

        assert_eq!(index.asks.best[&34].price, 100.0);
    }

    #[tokio::test]
    async fn failed_region_is_skipped_not_fatal() {
        let feed = Arc::new(FakeFeed {
            batches: HashMap::from([(
                10000002,
                vec![vec![order(1, 34, 30000142, 100.0, 10, false)]],
            )]),
        });

        let mut request = request_for(&[30000142]);
        request.buy_regions.insert(10000043);

        let index = build_order_index(
            feed,
            &request,
            &CancellationToken::new(),
            noop_progress(),
        )
        .await
        .unwrap();
        assert_eq!(index.asks.best.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_propagates() {
        let feed = Arc::new(FakeFeed {
            batches: HashMap::from([(
                10000002,
                vec![vec![order(1, 34, 30000142, 100.0, 10, false)]],
            )]),
        });

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = build_order_index(
            feed,
            &request_for(&[30000142]),
            &cancel,
            noop_progress(),
        )
        .await;
        assert!(matches!(result, Err(ScanError::Canceled)));
    }
}
