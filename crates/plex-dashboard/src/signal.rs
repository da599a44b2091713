use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub action: SignalAction,
    /// 0..=100, agreement of the weighted contributions.
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// Inputs already computed by the indicator block.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalInputs {
    pub price: f64,
    pub rsi14: f64,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
    pub sma7: f64,
    pub sma30: f64,
    pub change_1d_pct: f64,
    pub change_7d_pct: f64,
    pub volume_zscore: Option<f64>,
}

/// Weighted vote across the classic triggers. A 2-sigma log-space volume
/// spike on a falling price is the strongest buy evidence there is on
/// this market.
pub fn derive_signal(inputs: &SignalInputs) -> TradeSignal {
    let mut buy: f64 = 0.0;
    let mut sell: f64 = 0.0;
    let mut reasons = Vec::new();

    if inputs.rsi14 > 0.0 && inputs.rsi14 < 30.0 {
        buy += 2.0;
        reasons.push(format!("RSI oversold at {:.1}", inputs.rsi14));
    } else if inputs.rsi14 > 70.0 {
        sell += 2.0;
        reasons.push(format!("RSI overbought at {:.1}", inputs.rsi14));
    }

    if inputs.bollinger_lower > 0.0 && inputs.price <= inputs.bollinger_lower {
        buy += 2.0;
        reasons.push("price at lower Bollinger band".to_string());
    } else if inputs.bollinger_upper > 0.0 && inputs.price >= inputs.bollinger_upper {
        sell += 2.0;
        reasons.push("price at upper Bollinger band".to_string());
    }

    if inputs.sma7 > 0.0 && inputs.sma30 > 0.0 {
        if inputs.sma7 > inputs.sma30 {
            buy += 1.0;
            reasons.push("SMA7 above SMA30".to_string());
        } else if inputs.sma7 < inputs.sma30 {
            sell += 1.0;
            reasons.push("SMA7 below SMA30".to_string());
        }
    }

    if let Some(z) = inputs.volume_zscore {
        if z >= 2.0 && inputs.change_1d_pct <= -3.0 {
            buy += 3.0;
            reasons.push(format!(
                "volume anomaly ({:.1} sigma) into a {:.1}% drop",
                z, inputs.change_1d_pct
            ));
        }
    }

    if inputs.change_7d_pct <= -5.0 {
        buy += 1.0;
        reasons.push(format!("7d momentum {:.1}%", inputs.change_7d_pct));
    } else if inputs.change_7d_pct >= 5.0 {
        sell += 1.0;
        reasons.push(format!("7d momentum +{:.1}%", inputs.change_7d_pct));
    }

    let total = buy + sell;
    let (action, edge) = if total == 0.0 {
        (SignalAction::Hold, 0.0)
    } else if buy > sell {
        (SignalAction::Buy, buy - sell)
    } else if sell > buy {
        (SignalAction::Sell, sell - buy)
    } else {
        (SignalAction::Hold, 0.0)
    };

    let confidence = if total > 0.0 {
        (edge / total * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    if reasons.is_empty() {
        reasons.push("no active triggers".to_string());
    }

    TradeSignal {
        action,
        confidence,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_market_holds() {
        let signal = derive_signal(&SignalInputs {
            price: 100.0,
            rsi14: 50.0,
            bollinger_upper: 110.0,
            bollinger_lower: 90.0,
            sma7: 0.0,
            sma30: 0.0,
            change_1d_pct: 0.0,
            change_7d_pct: 0.0,
            volume_zscore: None,
        });
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn oversold_with_band_touch_buys() {
        let signal = derive_signal(&SignalInputs {
            price: 88.0,
            rsi14: 25.0,
            bollinger_upper: 110.0,
            bollinger_lower: 90.0,
            sma7: 95.0,
            sma30: 100.0,
            change_1d_pct: -1.0,
            change_7d_pct: -2.0,
            volume_zscore: None,
        });
        assert_eq!(signal.action, SignalAction::Buy);
        assert!(signal.confidence > 50.0);
        assert!(signal.reasons.len() >= 2);
    }

    #[test]
    fn volume_spike_into_drop_is_strong_buy() {
        let signal = derive_signal(&SignalInputs {
            price: 100.0,
            rsi14: 55.0,
            bollinger_upper: 120.0,
            bollinger_lower: 80.0,
            sma7: 100.0,
            sma30: 100.0,
            change_1d_pct: -4.0,
            change_7d_pct: 0.0,
            volume_zscore: Some(2.5),
        });
        assert_eq!(signal.action, SignalAction::Buy);
        assert!(signal
            .reasons
            .iter()
            .any(|r| r.contains("volume anomaly")));
    }

    #[test]
    fn overbought_rally_sells() {
        let signal = derive_signal(&SignalInputs {
            price: 125.0,
            rsi14: 80.0,
            bollinger_upper: 120.0,
            bollinger_lower: 80.0,
            sma7: 118.0,
            sma30: 100.0,
            change_1d_pct: 2.0,
            change_7d_pct: 9.0,
            volume_zscore: None,
        });
        assert_eq!(signal.action, SignalAction::Sell);
    }
}
