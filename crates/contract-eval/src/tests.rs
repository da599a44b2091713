use crate::evaluate::{evaluate_contracts, ContractScanContext};
use crate::ships::{MODULE_CATEGORY_ID, SHIP_CATEGORY_ID};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use order_index::OrderIndex;
use scanner_core::{
    noop_progress, Contract, ContractFeed, ContractItem, ContractKind, HistoryEntry, HistoryFeed,
    ItemType, Order, Progress, SanitizeCounter, ScanError, ScanParams, SolarSystem, Station,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct FakeContracts {
    items: HashMap<i64, Vec<ContractItem>>,
}

#[async_trait]
impl ContractFeed for FakeContracts {
    async fn fetch_region_contracts(&self, _region_id: i32) -> Result<Vec<Contract>, ScanError> {
        Ok(vec![])
    }

    async fn fetch_contract_items_batch(
        &self,
        contract_ids: &[i64],
        _progress: Progress,
    ) -> Result<HashMap<i64, Vec<ContractItem>>, ScanError> {
        Ok(contract_ids
            .iter()
            .filter_map(|id| self.items.get(id).map(|items| (*id, items.clone())))
            .collect())
    }
}

struct FakeHistory {
    per_type: HashMap<i32, Vec<HistoryEntry>>,
}

#[async_trait]
impl HistoryFeed for FakeHistory {
    async fn fetch_market_history(
        &self,
        _region_id: i32,
        type_id: i32,
    ) -> Result<Vec<HistoryEntry>, ScanError> {
        Ok(self.per_type.get(&type_id).cloned().unwrap_or_default())
    }
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
}

fn contract(id: i64, price: f64) -> Contract {
    Contract {
        contract_id: id,
        start_location_id: 60003760,
        kind: ContractKind::ItemExchange,
        price,
        volume: 100.0,
        title: format!("Contract {}", id),
        date_expired: now() + Duration::days(3),
    }
}

fn included(type_id: i32, quantity: i64) -> ContractItem {
    ContractItem {
        type_id,
        quantity,
        is_included: true,
        is_blueprint_copy: false,
        runs: 0,
        damage: None,
        is_singleton: false,
        slot_flag: "Cargo".to_string(),
    }
}

fn bid(id: i64, type_id: i32, system: i32, price: f64, volume: i64) -> Order {
    Order {
        order_id: id,
        type_id,
        location_id: 61_000_000 + system as i64,
        system_id: system,
        price,
        volume_remain: volume,
        is_buy_order: true,
    }
}

fn static_data() -> scanner_core::StaticData {
    let mut sd = scanner_core::StaticData::default();
    for (system, region) in [(30000142, 10000002), (30002187, 10000002), (30002659, 10000032)] {
        sd.systems.insert(
            system,
            SolarSystem {
                name: format!("System {}", system),
                region_id: region,
                security: 0.9,
            },
        );
    }
    sd.regions.insert(
        10000002,
        scanner_core::Region {
            name: "The Forge".to_string(),
        },
    );
    sd.stations.insert(60003760, Station { system_id: 30000142 });
    sd.types.insert(
        100,
        ItemType {
            name: "Widget A".to_string(),
            volume: 1.0,
            group_id: 18,
            category_id: 4,
        },
    );
    sd.types.insert(
        101,
        ItemType {
            name: "Widget B".to_string(),
            volume: 1.0,
            group_id: 18,
            category_id: 4,
        },
    );
    sd.types.insert(
        200,
        ItemType {
            name: "Rifter".to_string(),
            volume: 2500.0,
            group_id: 25,
            category_id: SHIP_CATEGORY_ID,
        },
    );
    sd.types.insert(
        201,
        ItemType {
            name: "Small Trimark Armor Pump I".to_string(),
            volume: 5.0,
            group_id: 773,
            category_id: MODULE_CATEGORY_ID,
        },
    );
    sd.types.insert(
        202,
        ItemType {
            name: "Large Trimark Armor Pump I".to_string(),
            volume: 20.0,
            group_id: 773,
            category_id: MODULE_CATEGORY_ID,
        },
    );
    sd
}

fn params_instant() -> ScanParams {
    ScanParams {
        current_system_id: 30000142,
        min_contract_price: 1_000.0,
        min_margin: 1.0,
        contract_instant_liquidation: true,
        sales_tax_pct: 0.0,
        broker_fee_pct: 0.0,
        ..ScanParams::default()
    }
}

fn buy_systems() -> HashMap<i32, u32> {
    HashMap::from([(30000142, 0), (30002187, 2), (30002659, 4)])
}

async fn run(
    contracts: Vec<Contract>,
    items: HashMap<i64, Vec<ContractItem>>,
    index: &OrderIndex,
    params: &ScanParams,
    history: HashMap<i32, Vec<HistoryEntry>>,
) -> Vec<crate::result::ContractDeal> {
    let sd = static_data();
    let systems = buy_systems();
    let ctx = ContractScanContext {
        params,
        static_data: &sd,
        index,
        buy_systems: &systems,
        now: now(),
    };
    evaluate_contracts(
        contracts,
        Arc::new(FakeContracts { items }),
        Arc::new(FakeHistory { per_type: history }),
        None,
        &ctx,
        &SanitizeCounter::new(),
        &CancellationToken::new(),
        noop_progress(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn split_liquidity_across_systems_rejects_contract() {
    // Widget A only sells in one system, Widget B only in another: no
    // single liquidation venue exists.
    let index = OrderIndex::from_orders(vec![
        bid(1, 100, 30000142, 100.0, 50),
        bid(2, 101, 30002187, 80.0, 50),
    ]);
    let items = HashMap::from([(1, vec![included(100, 1), included(101, 1)])]);

    let deals = run(
        vec![contract(1, 10_000.0)],
        items,
        &index,
        &params_instant(),
        HashMap::new(),
    )
    .await;
    assert!(deals.is_empty());
}

#[tokio::test]
async fn common_system_with_best_sum_wins() {
    // System 30000142 prices (A, B) at (100, 40); 30002187 at (95, 80).
    let index = OrderIndex::from_orders(vec![
        bid(1, 100, 30000142, 100.0, 50),
        bid(2, 101, 30000142, 40.0, 50),
        bid(3, 100, 30002187, 95.0, 50),
        bid(4, 101, 30002187, 80.0, 50),
    ]);
    let items = HashMap::from([(1, vec![included(100, 1), included(101, 1)])]);

    let deals = run(
        vec![contract(1, 100.0)],
        items,
        &index,
        &ScanParams {
            min_contract_price: 50.0,
            ..params_instant()
        },
        HashMap::new(),
    )
    .await;

    assert_eq!(deals.len(), 1);
    let deal = &deals[0];
    assert_eq!(deal.sell_system_id, Some(30002187));
    assert!((deal.market_value - 175.0).abs() < 1e-9);
    assert_eq!(deal.priced_items, 2);
    assert!((deal.expected_profit - 75.0).abs() < 1e-9);
}

#[tokio::test]
async fn matching_rig_excluded_with_ship() {
    // Ship (small) + small rig + large rig. The small rig is presumed
    // fitted and dropped; the large rig is loose cargo and keeps value.
    let index = OrderIndex::from_orders(vec![
        bid(1, 200, 30000142, 1_000_000.0, 5),
        bid(2, 201, 30000142, 50_000.0, 50),
        bid(3, 202, 30000142, 80_000.0, 50),
    ]);
    let items = HashMap::from([(
        1,
        vec![included(200, 1), included(201, 1), included(202, 1)],
    )]);

    let deals = run(
        vec![contract(1, 600_000.0)],
        items,
        &index,
        &params_instant(),
        HashMap::new(),
    )
    .await;

    assert_eq!(deals.len(), 1);
    let deal = &deals[0];
    assert!(deal.has_ship);
    // Ship + large rig priced; small rig dropped.
    assert_eq!(deal.priced_items, 2);
    assert!((deal.market_value - 1_080_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn all_rigs_excluded_when_configured() {
    let index = OrderIndex::from_orders(vec![
        bid(1, 200, 30000142, 1_000_000.0, 5),
        bid(2, 201, 30000142, 50_000.0, 50),
        bid(3, 202, 30000142, 80_000.0, 50),
    ]);
    let items = HashMap::from([(
        1,
        vec![included(200, 1), included(201, 1), included(202, 1)],
    )]);

    let params = ScanParams {
        exclude_rigs_with_ship: true,
        ..params_instant()
    };
    let deals = run(
        vec![contract(1, 600_000.0)],
        items,
        &index,
        &params,
        HashMap::new(),
    )
    .await;

    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].priced_items, 1);
    assert!((deals[0].market_value - 1_000_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn expired_and_cheap_contracts_prefiltered() {
    let index = OrderIndex::from_orders(vec![bid(1, 100, 30000142, 100.0, 50)]);
    let items = HashMap::from([
        (1, vec![included(100, 1)]),
        (2, vec![included(100, 1)]),
    ]);

    let mut expired = contract(1, 10_000.0);
    expired.date_expired = now() - Duration::hours(1);
    let cheap = contract(2, 10.0);

    let deals = run(
        vec![expired, cheap],
        items,
        &index,
        &params_instant(),
        HashMap::new(),
    )
    .await;
    assert!(deals.is_empty());
}

#[tokio::test]
async fn blueprint_only_contract_silently_dropped() {
    let index = OrderIndex::from_orders(vec![bid(1, 100, 30000142, 100.0, 50)]);
    let mut original = included(100, 1);
    original.runs = -1;
    let items = HashMap::from([(1, vec![original])]);

    let deals = run(
        vec![contract(1, 5_000.0)],
        items,
        &index,
        &params_instant(),
        HashMap::new(),
    )
    .await;
    assert!(deals.is_empty());
}

#[tokio::test]
async fn unpriceable_required_item_aborts_contract() {
    let index = OrderIndex::from_orders(vec![bid(1, 100, 30000142, 100.0, 50)]);
    let mut required = included(999, 5);
    required.is_included = false;
    let items = HashMap::from([(1, vec![included(100, 1), required])]);

    let deals = run(
        vec![contract(1, 5_000.0)],
        items,
        &index,
        &params_instant(),
        HashMap::new(),
    )
    .await;
    assert!(deals.is_empty());
}

#[tokio::test]
async fn scam_margin_guard_rejects_too_good_deals() {
    // Proceeds of 100 * 50 vs a 100 price: thousands of percent margin.
    let index = OrderIndex::from_orders(vec![bid(1, 100, 30000142, 100.0, 50)]);
    let items = HashMap::from([(1, vec![included(100, 50)])]);

    let params = ScanParams {
        min_contract_price: 50.0,
        max_contract_margin: 100.0,
        ..params_instant()
    };
    let deals = run(
        vec![contract(1, 100.0)],
        items,
        &index,
        &params,
        HashMap::new(),
    )
    .await;
    assert!(deals.is_empty());
}

#[tokio::test]
async fn estimate_mode_prices_through_history() {
    let index = OrderIndex::default();
    let items = HashMap::from([(1, vec![included(100, 100)])]);
    let history: Vec<HistoryEntry> = (1..=30)
        .map(|d| HistoryEntry {
            date: chrono::NaiveDate::from_ymd_opt(2026, 6, d).unwrap(),
            average: 1_000.0,
            highest: 1_050.0,
            lowest: 950.0,
            volume: 5_000,
            order_count: 40,
        })
        .collect();

    let params = ScanParams {
        current_system_id: 30000142,
        min_contract_price: 1_000.0,
        min_margin: 1.0,
        contract_instant_liquidation: false,
        contract_hold_days: 7,
        contract_target_confidence: 80.0,
        sales_tax_pct: 0.0,
        broker_fee_pct: 0.0,
        ..ScanParams::default()
    };
    let deals = run(
        vec![contract(1, 50_000.0)],
        items,
        &index,
        &params,
        HashMap::from([(100, history)]),
    )
    .await;

    assert_eq!(deals.len(), 1);
    let deal = &deals[0];
    assert!(!deal.instant);
    // 100 units against 5000/day at 35% participation clear fast.
    assert!(deal.fill_probability > 0.99);
    assert!(deal.liquidation_days < 1.0);
    assert!(deal.carry_cost > 0.0);
    assert!((deal.market_value - 100_000.0).abs() < 1e-6);
    assert!(deal.expected_profit > 0.0);
}

#[tokio::test]
async fn estimate_mode_rejects_illiquid_contracts() {
    let index = OrderIndex::default();
    let items = HashMap::from([(1, vec![included(100, 100_000)])]);
    let history: Vec<HistoryEntry> = (1..=30)
        .map(|d| HistoryEntry {
            date: chrono::NaiveDate::from_ymd_opt(2026, 6, d).unwrap(),
            average: 1_000.0,
            highest: 1_050.0,
            lowest: 950.0,
            volume: 10,
            order_count: 2,
        })
        .collect();

    let params = ScanParams {
        contract_instant_liquidation: false,
        min_contract_price: 1_000.0,
        ..params_instant()
    };
    let deals = run(
        vec![contract(1, 50_000.0)],
        items,
        &index,
        &params,
        HashMap::from([(100, history)]),
    )
    .await;
    assert!(deals.is_empty());
}
