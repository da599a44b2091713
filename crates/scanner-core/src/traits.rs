use crate::error::ScanError;
use crate::types::{Contract, ContractItem, HistoryEntry, Order, OrderSide};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Batched stream of region orders. The upstream client owns pagination
/// and rate limiting; one item corresponds to one fetched page.
pub type OrderBatchStream<'a> = BoxStream<'a, Result<Vec<Order>, ScanError>>;

/// Stage narration for long scans. Callers may no-op it.
pub type Progress = Arc<dyn Fn(&str) + Send + Sync>;

pub fn noop_progress() -> Progress {
    Arc::new(|_| {})
}

/// Live order books, one region at a time.
#[async_trait]
pub trait OrderFeed: Send + Sync {
    async fn fetch_region_orders(
        &self,
        region_id: i32,
        side: OrderSide,
    ) -> Result<OrderBatchStream<'_>, ScanError>;
}

/// Daily price/volume series per (region, type). Cached behind the feed.
#[async_trait]
pub trait HistoryFeed: Send + Sync {
    async fn fetch_market_history(
        &self,
        region_id: i32,
        type_id: i32,
    ) -> Result<Vec<HistoryEntry>, ScanError>;
}

/// Public contracts and their item lines. Cached behind the feed on a
/// short TTL; item lists are immutable per contract id.
#[async_trait]
pub trait ContractFeed: Send + Sync {
    async fn fetch_region_contracts(&self, region_id: i32) -> Result<Vec<Contract>, ScanError>;

    async fn fetch_contract_items_batch(
        &self,
        contract_ids: &[i64],
        progress: Progress,
    ) -> Result<HashMap<i64, Vec<ContractItem>>, ScanError>;
}

/// Station and structure name lookup with prefetch support. Structure
/// names need an access token; unresolvable ids return None and callers
/// fall back to "Structure @ <system>".
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn station_name(&self, location_id: i64) -> Option<String>;

    async fn prefetch_station_names(&self, location_ids: &HashSet<i64>);

    async fn prefetch_structure_names(
        &self,
        location_ids: &HashSet<i64>,
        access_token: Option<&str>,
        cancel: &CancellationToken,
    );

    async fn structure_name(&self, location_id: i64) -> Option<String>;
}

/// CCP-published reference prices and cost indices.
#[async_trait]
pub trait IndustryFeed: Send + Sync {
    /// Adjusted price per type id, universe-wide.
    async fn all_adjusted_prices(&self) -> Result<HashMap<i32, f64>, ScanError>;

    async fn system_cost_index(&self, system_id: i32) -> Result<f64, ScanError>;

    /// Region-scoped cached market prices (average of recent trades).
    async fn cached_market_prices(&self, region_id: i32) -> Result<HashMap<i32, f64>, ScanError>;
}
