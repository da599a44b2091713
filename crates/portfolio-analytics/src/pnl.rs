use chrono::{Duration, NaiveDate, Utc};
use scanner_core::{finite_or, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One aggregated trading day with the running equity context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPnl {
    pub date: NaiveDate,
    pub sell_total: f64,
    pub buy_total: f64,
    pub net: f64,
    pub cumulative: f64,
    pub peak: f64,
    /// (cumulative - peak) / peak, percent; never positive.
    pub drawdown_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPnl {
    pub type_id: i32,
    pub sell_total: f64,
    pub buy_total: f64,
    pub net: f64,
    pub quantity_sold: i64,
    pub quantity_bought: i64,
    pub avg_sell_price: f64,
    pub avg_buy_price: f64,
    pub margin_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationPnl {
    pub location_id: i64,
    pub sell_total: f64,
    pub buy_total: f64,
    pub net: f64,
    pub avg_sell_price: f64,
    pub avg_buy_price: f64,
    pub margin_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioPnl {
    pub days: Vec<DailyPnl>,
    pub total_net: f64,
    pub mean_daily: f64,
    pub best_day: f64,
    pub best_day_date: Option<NaiveDate>,
    pub worst_day: f64,
    pub worst_day_date: Option<NaiveDate>,
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub expectancy: f64,
    /// Average capital tied up across the window.
    pub deployed_capital: f64,
    pub roi_pct: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub max_drawdown_days: i64,
    pub calmar: f64,
    pub top_items: Vec<ItemPnl>,
    pub top_stations: Vec<StationPnl>,
}

const TOP_ITEMS: usize = 50;
const TOP_STATIONS: usize = 20;

/// Aggregate wallet transactions inside the lookback window into daily
/// P&L with drawdown, ratio metrics and per-item/per-station breakdowns.
pub fn compute_portfolio_pnl(transactions: &[Transaction], lookback_days: u32) -> PortfolioPnl {
    let cutoff = Utc::now() - Duration::days(lookback_days.max(1) as i64);
    let mut in_window: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.date >= cutoff)
        .collect();
    in_window.sort_by_key(|t| (t.date, t.type_id));

    if in_window.is_empty() {
        return PortfolioPnl::default();
    }

    // Daily sell/buy totals.
    let mut per_day: HashMap<NaiveDate, (f64, f64)> = HashMap::new();
    for t in &in_window {
        let entry = per_day.entry(t.date.date_naive()).or_insert((0.0, 0.0));
        let value = t.unit_price * t.quantity as f64;
        if t.is_buy {
            entry.1 += value;
        } else {
            entry.0 += value;
        }
    }
    let mut dates: Vec<NaiveDate> = per_day.keys().copied().collect();
    dates.sort();

    let mut days = Vec::with_capacity(dates.len());
    let mut cumulative = 0.0;
    let mut peak = 0.0_f64;
    let mut peak_date = dates[0];
    let mut max_drawdown = 0.0_f64;
    let mut max_drawdown_days = 0i64;
    let mut cum_buy = 0.0;
    let mut cum_sell = 0.0;
    let mut deployed_sum = 0.0;

    for &date in &dates {
        let (sell_total, buy_total) = per_day[&date];
        let net = sell_total - buy_total;
        cumulative += net;
        if cumulative > peak {
            peak = cumulative;
            peak_date = date;
        }
        let drawdown_pct = if peak > 0.0 {
            (cumulative - peak) / peak * 100.0
        } else {
            0.0
        };
        let drawdown = peak - cumulative;
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
            max_drawdown_days = (date - peak_date).num_days();
        }

        cum_buy += buy_total;
        cum_sell += sell_total;
        deployed_sum += (cum_buy - cum_sell).max(0.0);

        days.push(DailyPnl {
            date,
            sell_total,
            buy_total,
            net,
            cumulative,
            peak,
            drawdown_pct: finite_or(drawdown_pct, 0.0).min(0.0),
        });
    }

    let nets: Vec<f64> = days.iter().map(|d| d.net).collect();
    let total_net: f64 = nets.iter().sum();
    let n = nets.len() as f64;
    let mean_daily = total_net / n;

    let wins: Vec<f64> = nets.iter().copied().filter(|&x| x > 0.0).collect();
    let losses: Vec<f64> = nets.iter().copied().filter(|&x| x < 0.0).collect();
    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = -losses.iter().sum::<f64>();
    let win_rate = wins.len() as f64 / n;
    let loss_rate = losses.len() as f64 / n;
    let avg_win = if wins.is_empty() {
        0.0
    } else {
        gross_profit / wins.len() as f64
    };
    let avg_loss = if losses.is_empty() {
        0.0
    } else {
        gross_loss / losses.len() as f64
    };
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::MAX
    } else {
        0.0
    };
    let expectancy = win_rate * avg_win - loss_rate * avg_loss;

    let best = days
        .iter()
        .max_by(|a, b| a.net.partial_cmp(&b.net).unwrap_or(std::cmp::Ordering::Equal));
    let worst = days
        .iter()
        .min_by(|a, b| a.net.partial_cmp(&b.net).unwrap_or(std::cmp::Ordering::Equal));

    // Time-weighted deployed capital keeps repeated buy/sell cycles from
    // inflating the denominator.
    let deployed_capital = deployed_sum / n;
    let roi_pct = if deployed_capital > 0.0 {
        total_net / deployed_capital * 100.0
    } else {
        0.0
    };

    let sharpe = if nets.len() >= 2 {
        let variance =
            nets.iter().map(|x| (x - mean_daily).powi(2)).sum::<f64>() / (n - 1.0);
        let std = variance.sqrt();
        if std > 0.0 {
            mean_daily / std * 365.0_f64.sqrt()
        } else {
            0.0
        }
    } else {
        0.0
    };

    let annualized_return = mean_daily * 365.0;
    let calmar = if max_drawdown > 0.0 {
        annualized_return / max_drawdown
    } else {
        0.0
    };

    PortfolioPnl {
        total_net,
        mean_daily,
        best_day: best.map(|d| d.net).unwrap_or(0.0),
        best_day_date: best.map(|d| d.date),
        worst_day: worst.map(|d| d.net).unwrap_or(0.0),
        worst_day_date: worst.map(|d| d.date),
        win_rate,
        gross_profit,
        gross_loss,
        profit_factor,
        avg_win,
        avg_loss,
        expectancy,
        deployed_capital,
        roi_pct,
        sharpe,
        max_drawdown,
        max_drawdown_days,
        calmar,
        top_items: top_items(&in_window),
        top_stations: top_stations(&in_window),
        days,
    }
}

fn top_items(transactions: &[&Transaction]) -> Vec<ItemPnl> {
    #[derive(Default)]
    struct Acc {
        sell: f64,
        buy: f64,
        sold: i64,
        bought: i64,
    }
    let mut per_type: HashMap<i32, Acc> = HashMap::new();
    for t in transactions {
        let acc = per_type.entry(t.type_id).or_default();
        let value = t.unit_price * t.quantity as f64;
        if t.is_buy {
            acc.buy += value;
            acc.bought += t.quantity;
        } else {
            acc.sell += value;
            acc.sold += t.quantity;
        }
    }

    let mut items: Vec<ItemPnl> = per_type
        .into_iter()
        .map(|(type_id, acc)| {
            let avg_sell = if acc.sold > 0 { acc.sell / acc.sold as f64 } else { 0.0 };
            let avg_buy = if acc.bought > 0 { acc.buy / acc.bought as f64 } else { 0.0 };
            ItemPnl {
                type_id,
                sell_total: acc.sell,
                buy_total: acc.buy,
                net: acc.sell - acc.buy,
                quantity_sold: acc.sold,
                quantity_bought: acc.bought,
                avg_sell_price: avg_sell,
                avg_buy_price: avg_buy,
                margin_pct: if avg_buy > 0.0 && avg_sell > 0.0 {
                    (avg_sell - avg_buy) / avg_buy * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();
    items.sort_by(|a, b| {
        b.net
            .abs()
            .partial_cmp(&a.net.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.type_id.cmp(&b.type_id))
    });
    items.truncate(TOP_ITEMS);
    items
}

fn top_stations(transactions: &[&Transaction]) -> Vec<StationPnl> {
    #[derive(Default)]
    struct Acc {
        sell: f64,
        buy: f64,
        sold: i64,
        bought: i64,
    }
    let mut per_station: HashMap<i64, Acc> = HashMap::new();
    for t in transactions {
        let acc = per_station.entry(t.location_id).or_default();
        let value = t.unit_price * t.quantity as f64;
        if t.is_buy {
            acc.buy += value;
            acc.bought += t.quantity;
        } else {
            acc.sell += value;
            acc.sold += t.quantity;
        }
    }

    let mut stations: Vec<StationPnl> = per_station
        .into_iter()
        .map(|(location_id, acc)| {
            let avg_sell = if acc.sold > 0 { acc.sell / acc.sold as f64 } else { 0.0 };
            let avg_buy = if acc.bought > 0 { acc.buy / acc.bought as f64 } else { 0.0 };
            StationPnl {
                location_id,
                sell_total: acc.sell,
                buy_total: acc.buy,
                net: acc.sell - acc.buy,
                avg_sell_price: avg_sell,
                avg_buy_price: avg_buy,
                margin_pct: if avg_buy > 0.0 && avg_sell > 0.0 {
                    (avg_sell - avg_buy) / avg_buy * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();
    stations.sort_by(|a, b| {
        b.net
            .abs()
            .partial_cmp(&a.net.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.location_id.cmp(&b.location_id))
    });
    stations.truncate(TOP_STATIONS);
    stations
}
