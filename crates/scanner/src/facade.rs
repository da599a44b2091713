use crate::names::{location_label, prefetch_names};
use contract_eval::{evaluate_contracts, ContractDeal, ContractScanContext};
use order_index::{build_order_index, IndexRequest};
use plex_dashboard::{
    PlexDashboard, LARGE_SKILL_INJECTOR_TYPE_ID, MPTC_TYPE_ID, PLEX_TYPE_ID,
    SKILL_EXTRACTOR_TYPE_ID,
};
use route_scanner::{scan_routes, FlipResult};
use scanner_core::{
    ContractFeed, HistoryFeed, IndustryFeed, NameResolver, Order, OrderFeed, Progress,
    SanitizeCounter, ScanError, ScanParams, StaticData,
};
use station_trading::{scan_station_trades as run_station_scan, StationTrade};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Primary trade-hub region; the PLEX dashboard prices against it.
const HUB_REGION_ID: i32 = 10000002;

/// Days of history behind the PLEX chart.
const PLEX_HISTORY_DAYS: usize = 90;

/// Entry point over the strategy scanners. Owns the feed ports and the
/// immutable static data; every scan builds its derived state fresh.
pub struct Scanner {
    orders: Arc<dyn OrderFeed>,
    history: Arc<dyn HistoryFeed>,
    contracts: Arc<dyn ContractFeed>,
    names: Arc<dyn NameResolver>,
    industry: Option<Arc<dyn IndustryFeed>>,
    static_data: Arc<StaticData>,
}

impl Scanner {
    pub fn new(
        orders: Arc<dyn OrderFeed>,
        history: Arc<dyn HistoryFeed>,
        contracts: Arc<dyn ContractFeed>,
        names: Arc<dyn NameResolver>,
        static_data: Arc<StaticData>,
    ) -> Self {
        Self {
            orders,
            history,
            contracts,
            names,
            industry: None,
            static_data,
        }
    }

    pub fn with_industry_feed(mut self, industry: Arc<dyn IndustryFeed>) -> Self {
        self.industry = Some(industry);
        self
    }

    /// Radius flip scan around the origin system.
    pub async fn scan(
        &self,
        params: ScanParams,
        progress: Progress,
    ) -> Result<Vec<FlipResult>, ScanError> {
        self.scan_with_token(params, progress, &CancellationToken::new())
            .await
    }

    pub async fn scan_with_token(
        &self,
        params: ScanParams,
        progress: Progress,
        cancel: &CancellationToken,
    ) -> Result<Vec<FlipResult>, ScanError> {
        let params = params.normalized();
        params.validate(&self.static_data)?;

        let buy_systems = self.static_data.universe.systems_within_radius(
            params.current_system_id,
            params.buy_radius as u32,
            None,
        );
        let sell_systems = self.static_data.universe.systems_within_radius(
            params.current_system_id,
            params.sell_radius as u32,
            None,
        );
        self.run_route_scan(params, buy_systems, sell_systems, progress, cancel)
            .await
    }

    /// Hauling scan with the sell side widened to a whole target region.
    pub async fn scan_multi_region(
        &self,
        params: ScanParams,
        progress: Progress,
        cancel: &CancellationToken,
    ) -> Result<Vec<FlipResult>, ScanError> {
        let params = params.normalized();
        params.validate(&self.static_data)?;

        let buy_systems = self.static_data.universe.systems_within_radius(
            params.current_system_id,
            params.buy_radius as u32,
            None,
        );
        let sell_systems: HashMap<i32, u32> = match params.target_region_id {
            Some(region_id) => self
                .static_data
                .systems
                .iter()
                .filter(|(_, system)| system.region_id == region_id)
                .map(|(&id, _)| (id, 0))
                .collect(),
            None => self.static_data.universe.systems_within_radius(
                params.current_system_id,
                params.sell_radius as u32,
                None,
            ),
        };
        self.run_route_scan(params, buy_systems, sell_systems, progress, cancel)
            .await
    }

    async fn run_route_scan(
        &self,
        params: ScanParams,
        buy_systems: HashMap<i32, u32>,
        sell_systems: HashMap<i32, u32>,
        progress: Progress,
        cancel: &CancellationToken,
    ) -> Result<Vec<FlipResult>, ScanError> {
        let sanitizer = SanitizeCounter::new();

        let request = IndexRequest {
            buy_regions: self
                .static_data
                .universe
                .regions_in_set(buy_systems.keys()),
            sell_regions: self
                .static_data
                .universe
                .regions_in_set(sell_systems.keys()),
            allowed_buy_systems: buy_systems.clone(),
            allowed_sell_systems: sell_systems,
        };
        let index = build_order_index(
            Arc::clone(&self.orders),
            &request,
            cancel,
            Arc::clone(&progress),
        )
        .await?;

        let mut flips = scan_routes(
            &index,
            &params,
            &self.static_data,
            &buy_systems,
            Arc::clone(&self.history),
            &sanitizer,
            cancel,
            Arc::clone(&progress),
        )
        .await?;

        self.fill_flip_names(&mut flips, &params, cancel).await;
        self.log_sanitizer(&sanitizer, "route scan");
        progress(&format!("scan complete: {} opportunities", flips.len()));
        Ok(flips)
    }

    /// Blocking adapter for callers without an async runtime. Not for
    /// use inside one.
    pub fn scan_blocking(
        &self,
        params: ScanParams,
        progress: Progress,
    ) -> Result<Vec<FlipResult>, ScanError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ScanError::FeedUnavailable(e.to_string()))?;
        runtime.block_on(self.scan(params, progress))
    }

    /// Same-station market-making scan over one region.
    pub async fn scan_station_trades(
        &self,
        region_id: i32,
        target_station: Option<i64>,
        params: ScanParams,
        progress: Progress,
        cancel: &CancellationToken,
    ) -> Result<Vec<StationTrade>, ScanError> {
        if region_id <= 0 {
            return Err(ScanError::InvalidInput(format!(
                "region id must be positive, got {}",
                region_id
            )));
        }
        let params = params.normalized();
        let sanitizer = SanitizeCounter::new();

        let region_systems: HashMap<i32, u32> = self
            .static_data
            .systems
            .iter()
            .filter(|(_, system)| system.region_id == region_id)
            .map(|(&id, _)| (id, 0))
            .collect();
        if region_systems.is_empty() {
            return Err(ScanError::InvalidInput(format!(
                "unknown region {}",
                region_id
            )));
        }

        let request = IndexRequest {
            buy_regions: HashSet::from([region_id]),
            sell_regions: HashSet::from([region_id]),
            allowed_buy_systems: region_systems.clone(),
            allowed_sell_systems: region_systems,
        };
        let index = build_order_index(
            Arc::clone(&self.orders),
            &request,
            cancel,
            Arc::clone(&progress),
        )
        .await?;

        let mut trades = run_station_scan(
            &index,
            region_id,
            target_station,
            &params,
            &self.static_data,
            Arc::clone(&self.history),
            &sanitizer,
            cancel,
            Arc::clone(&progress),
        )
        .await?;

        self.fill_station_names(&mut trades, &params, cancel).await;
        self.log_sanitizer(&sanitizer, "station scan");
        Ok(trades)
    }

    /// Public-contract scan across the buy radius.
    pub async fn scan_contracts(
        &self,
        params: ScanParams,
        progress: Progress,
    ) -> Result<Vec<ContractDeal>, ScanError> {
        self.scan_contracts_with_token(params, progress, &CancellationToken::new())
            .await
    }

    pub async fn scan_contracts_with_token(
        &self,
        params: ScanParams,
        progress: Progress,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContractDeal>, ScanError> {
        let params = params.normalized();
        params.validate(&self.static_data)?;
        let sanitizer = SanitizeCounter::new();

        let buy_systems = self.static_data.universe.systems_within_radius(
            params.current_system_id,
            params.buy_radius as u32,
            None,
        );
        let sell_systems = self.static_data.universe.systems_within_radius(
            params.current_system_id,
            params.sell_radius as u32,
            None,
        );

        // Liquidation books live in the sell radius; both sides indexed
        // so asks double as reference prices.
        let request = IndexRequest {
            buy_regions: self
                .static_data
                .universe
                .regions_in_set(sell_systems.keys()),
            sell_regions: self
                .static_data
                .universe
                .regions_in_set(sell_systems.keys()),
            allowed_buy_systems: sell_systems.clone(),
            allowed_sell_systems: sell_systems,
        };
        let index = build_order_index(
            Arc::clone(&self.orders),
            &request,
            cancel,
            Arc::clone(&progress),
        )
        .await?;

        let contract_regions = self
            .static_data
            .universe
            .regions_in_set(buy_systems.keys());
        let mut contracts = Vec::new();
        for region_id in contract_regions {
            if cancel.is_cancelled() {
                return Err(ScanError::Canceled);
            }
            match self.contracts.fetch_region_contracts(region_id).await {
                Ok(mut batch) => contracts.append(&mut batch),
                Err(e) => {
                    tracing::warn!("contract fetch failed for region {}: {}", region_id, e);
                    progress(&format!("region {} contracts unavailable, skipping", region_id));
                }
            }
        }

        let ctx = ContractScanContext {
            params: &params,
            static_data: &self.static_data,
            index: &index,
            buy_systems: &buy_systems,
            now: chrono_now(),
        };
        let mut deals = evaluate_contracts(
            contracts,
            Arc::clone(&self.contracts),
            Arc::clone(&self.history),
            self.industry.clone(),
            &ctx,
            &sanitizer,
            cancel,
            Arc::clone(&progress),
        )
        .await?;

        self.fill_contract_names(&mut deals, &params, cancel).await;
        self.log_sanitizer(&sanitizer, "contract scan");
        Ok(deals)
    }

    /// PLEX-adjacency dashboard priced against the primary hub.
    pub async fn compute_plex_dashboard(
        &self,
        params: ScanParams,
        progress: Progress,
        cancel: &CancellationToken,
    ) -> Result<PlexDashboard, ScanError> {
        let params = params.normalized();
        let sanitizer = SanitizeCounter::new();

        let hub_systems: HashMap<i32, u32> = self
            .static_data
            .systems
            .iter()
            .filter(|(_, system)| system.region_id == HUB_REGION_ID)
            .map(|(&id, _)| (id, 0))
            .collect();

        let request = IndexRequest {
            buy_regions: HashSet::from([HUB_REGION_ID]),
            sell_regions: HashSet::from([HUB_REGION_ID]),
            allowed_buy_systems: hub_systems.clone(),
            allowed_sell_systems: hub_systems,
        };
        let index = build_order_index(
            Arc::clone(&self.orders),
            &request,
            cancel,
            Arc::clone(&progress),
        )
        .await?;

        let wanted = [
            PLEX_TYPE_ID,
            SKILL_EXTRACTOR_TYPE_ID,
            LARGE_SKILL_INJECTOR_TYPE_ID,
            MPTC_TYPE_ID,
        ];
        let mut orders_by_type: HashMap<i32, Vec<Order>> = HashMap::new();
        for order in index.asks.orders.iter().chain(index.bids.orders.iter()) {
            if wanted.contains(&order.type_id) {
                orders_by_type
                    .entry(order.type_id)
                    .or_default()
                    .push(order.clone());
            }
        }

        progress("fetching PLEX history");
        let mut history = self
            .history
            .fetch_market_history(HUB_REGION_ID, PLEX_TYPE_ID)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("PLEX history unavailable: {}", e);
                Vec::new()
            });
        if history.len() > PLEX_HISTORY_DAYS {
            history = history.split_off(history.len() - PLEX_HISTORY_DAYS);
        }

        if cancel.is_cancelled() {
            return Err(ScanError::Canceled);
        }

        let dashboard = plex_dashboard::compute_plex_dashboard(
            &orders_by_type,
            &history,
            &self.static_data.market_disabled,
            &params,
            &sanitizer,
        );
        self.log_sanitizer(&sanitizer, "plex dashboard");
        Ok(dashboard)
    }

    async fn fill_flip_names(
        &self,
        flips: &mut [FlipResult],
        params: &ScanParams,
        cancel: &CancellationToken,
    ) {
        let locations: HashSet<i64> = flips
            .iter()
            .flat_map(|f| [f.buy_location_id, f.sell_location_id])
            .collect();
        prefetch_names(&self.names, &locations, params.access_token.as_deref(), cancel).await;
        for flip in flips.iter_mut() {
            flip.buy_station_name = location_label(
                &self.names,
                &self.static_data,
                flip.buy_location_id,
                flip.buy_system_id,
            )
            .await;
            flip.sell_station_name = location_label(
                &self.names,
                &self.static_data,
                flip.sell_location_id,
                flip.sell_system_id,
            )
            .await;
        }
    }

    async fn fill_station_names(
        &self,
        trades: &mut [StationTrade],
        params: &ScanParams,
        cancel: &CancellationToken,
    ) {
        let locations: HashSet<i64> = trades.iter().map(|t| t.location_id).collect();
        prefetch_names(&self.names, &locations, params.access_token.as_deref(), cancel).await;
        for trade in trades.iter_mut() {
            trade.station_name = location_label(
                &self.names,
                &self.static_data,
                trade.location_id,
                trade.system_id,
            )
            .await;
        }
    }

    async fn fill_contract_names(
        &self,
        deals: &mut [ContractDeal],
        params: &ScanParams,
        cancel: &CancellationToken,
    ) {
        let locations: HashSet<i64> = deals.iter().map(|d| d.start_location_id).collect();
        prefetch_names(&self.names, &locations, params.access_token.as_deref(), cancel).await;
        for deal in deals.iter_mut() {
            deal.station_name = location_label(
                &self.names,
                &self.static_data,
                deal.start_location_id,
                deal.system_id,
            )
            .await;
        }
    }

    fn log_sanitizer(&self, sanitizer: &SanitizeCounter, stage: &str) {
        let replaced = sanitizer.replaced();
        if replaced > 0 {
            tracing::warn!("{}: sanitized {} non-finite values", stage, replaced);
        } else {
            tracing::debug!("{}: no non-finite values", stage);
        }
    }
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
