use crate::result::{ConfidenceLabel, StationTrade};
use scanner_core::{ActiveOrder, OpenPosition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Competition level above which a resting order should chase the book.
const REPRICE_COMPETITION: f64 = 60.0;

/// Days of supply past which the book is saturated.
const REPRICE_DAYS_OF_SUPPLY: f64 = 30.0;

/// What to do about one (type, station) line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationAction {
    Cancel,
    Reprice,
    NewEntry,
    Hold,
}

impl StationAction {
    pub fn priority(&self) -> u8 {
        match self {
            StationAction::Cancel => 100,
            StationAction::Reprice => 85,
            StationAction::NewEntry => 70,
            StationAction::Hold => 40,
        }
    }

    /// Multiplier applied to the line's daily profit to estimate the
    /// delta from taking the action.
    pub fn expected_delta_multiplier(&self) -> f64 {
        match self {
            StationAction::Cancel => 0.0,
            StationAction::Reprice => 0.8,
            StationAction::NewEntry => 1.0,
            StationAction::Hold => 0.9,
        }
    }

    pub fn score_delta(&self) -> f64 {
        match self {
            StationAction::Cancel => -20.0,
            StationAction::Reprice => 10.0,
            StationAction::NewEntry => 15.0,
            StationAction::Hold => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationCommandRow {
    pub type_id: i32,
    pub type_name: String,
    pub location_id: i64,
    pub action: StationAction,
    pub priority: u8,
    pub reason: String,
    pub score_delta: f64,
    /// Daily profit scaled by the action's expected-delta multiplier.
    pub expected_daily_delta: f64,
    pub personalized_score: f64,
    pub daily_profit: f64,
    pub cts: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationCommandResult {
    pub rows: Vec<StationCommandRow>,
    pub cancel_count: usize,
    pub reprice_count: usize,
    pub new_entry_count: usize,
    pub hold_count: usize,
}

/// Turn scan rows plus the user's resting orders and inventory into a
/// prioritized action list.
pub fn build_station_command(
    trades: &[StationTrade],
    active_orders: &[ActiveOrder],
    open_positions: &[OpenPosition],
) -> StationCommandResult {
    let mut orders_here: HashMap<(i32, i64), Vec<&ActiveOrder>> = HashMap::new();
    let mut order_types: HashMap<i32, Vec<&ActiveOrder>> = HashMap::new();
    for order in active_orders {
        orders_here
            .entry((order.type_id, order.location_id))
            .or_default()
            .push(order);
        order_types.entry(order.type_id).or_default().push(order);
    }

    let mut inventory: HashMap<(i32, i64), i64> = HashMap::new();
    for position in open_positions {
        *inventory
            .entry((position.type_id, position.location_id))
            .or_insert(0) += position.quantity;
    }

    let mut rows: Vec<StationCommandRow> = trades
        .iter()
        .map(|trade| decide(trade, &orders_here, &order_types, &inventory))
        .collect();

    rows.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(
                b.personalized_score
                    .partial_cmp(&a.personalized_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(
                b.daily_profit
                    .partial_cmp(&a.daily_profit)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(
                b.cts
                    .partial_cmp(&a.cts)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.type_id.cmp(&b.type_id))
    });

    let count = |action: StationAction| rows.iter().filter(|r| r.action == action).count();
    StationCommandResult {
        cancel_count: count(StationAction::Cancel),
        reprice_count: count(StationAction::Reprice),
        new_entry_count: count(StationAction::NewEntry),
        hold_count: count(StationAction::Hold),
        rows,
    }
}

fn decide(
    trade: &StationTrade,
    orders_here: &HashMap<(i32, i64), Vec<&ActiveOrder>>,
    order_types: &HashMap<i32, Vec<&ActiveOrder>>,
    inventory: &HashMap<(i32, i64), i64>,
) -> StationCommandRow {
    let key = (trade.type_id, trade.location_id);
    let here = orders_here.get(&key).map(|v| v.as_slice()).unwrap_or(&[]);
    let anywhere = order_types
        .get(&trade.type_id)
        .map(|v| v.as_slice())
        .unwrap_or(&[]);
    let held = inventory.get(&key).copied().unwrap_or(0);

    let (action, reason) = if !here.is_empty() {
        if trade.realizable_margin_pct <= 0.0 {
            (
                StationAction::Cancel,
                "resting order with non-positive realizable margin".to_string(),
            )
        } else if trade.confidence_label == ConfidenceLabel::Low
            || trade.competition > REPRICE_COMPETITION
            || trade.days_of_supply > REPRICE_DAYS_OF_SUPPLY
        {
            (
                StationAction::Reprice,
                "resting order under pressure: weak confidence, crowded book or oversupply"
                    .to_string(),
            )
        } else {
            (StationAction::Hold, "resting order still healthy".to_string())
        }
    } else if !anywhere.is_empty()
        && trade.realizable_daily_profit > 0.0
        && trade.confidence_label != ConfidenceLabel::Low
    {
        (
            StationAction::Reprice,
            "better venue for an order resting elsewhere".to_string(),
        )
    } else if trade.realizable_daily_profit <= 0.0 {
        (StationAction::Hold, "no realizable daily profit".to_string())
    } else if held > 0 {
        (
            StationAction::Reprice,
            "inventory on hand: relist before committing new capital".to_string(),
        )
    } else {
        (StationAction::NewEntry, "fresh profitable line".to_string())
    };

    StationCommandRow {
        type_id: trade.type_id,
        type_name: trade.type_name.clone(),
        location_id: trade.location_id,
        action,
        priority: action.priority(),
        reason,
        score_delta: action.score_delta(),
        expected_daily_delta: trade.realizable_daily_profit * action.expected_delta_multiplier(),
        personalized_score: 0.6 * trade.cts + 0.4 * trade.confidence,
        daily_profit: trade.realizable_daily_profit,
        cts: trade.cts,
    }
}
