use scanner_core::finite_or;

/// Simple Moving Average over closes; one output per full window.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(finite_or(sum / period as f64, 0.0));
    }
    result
}

pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Bollinger Bands over `period` with population standard deviation.
pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    if period == 0 || data.len() < period {
        return BollingerBands {
            upper: vec![],
            middle: vec![],
            lower: vec![],
        };
    }

    let middle = sma(data, period);
    let mut upper = Vec::with_capacity(middle.len());
    let mut lower = Vec::with_capacity(middle.len());

    for i in period - 1..data.len() {
        let window = &data[i + 1 - period..=i];
        let mean = middle[i + 1 - period];
        let variance: f64 =
            window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();
        upper.push(finite_or(mean + std_dev * std, mean));
        lower.push(finite_or(mean - std_dev * std, mean));
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

/// Relative Strength Index with Wilder's smoothing.
pub fn rsi(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period + 1 {
        return vec![];
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for pair in data.windows(2) {
        let change = pair[1] - pair[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let mut values = Vec::with_capacity(gains.len() - period + 1);
    let mut push_rsi = |avg_gain: f64, avg_loss: f64, out: &mut Vec<f64>| {
        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };
        out.push(finite_or(rsi, 50.0));
    };
    push_rsi(avg_gain, avg_loss, &mut values);

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        push_rsi(avg_gain, avg_loss, &mut values);
    }

    values
}

/// Annualized log-return volatility over the trailing `window` closes.
/// Game markets trade every day, so annualization uses 365.
pub fn log_return_volatility(closes: &[f64], window: usize) -> f64 {
    if window < 2 || closes.len() < window + 1 {
        return 0.0;
    }

    let tail = &closes[closes.len() - window - 1..];
    let returns: Vec<f64> = tail
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    finite_or(variance.sqrt() * 365.0_f64.sqrt(), 0.0)
}

/// Z-score of the latest volume against the trailing window, measured in
/// log space so spikes on thin markets do not swamp the baseline.
/// Returns None when the window lacks positive volumes.
pub fn log_volume_zscore(volumes: &[f64], window: usize) -> Option<f64> {
    if volumes.len() < window + 1 || window < 2 {
        return None;
    }

    let latest = *volumes.last()?;
    if latest <= 0.0 {
        return None;
    }

    let baseline: Vec<f64> = volumes[volumes.len() - window - 1..volumes.len() - 1]
        .iter()
        .filter(|&&v| v > 0.0)
        .map(|v| v.ln())
        .collect();
    if baseline.len() < 2 {
        return None;
    }

    let n = baseline.len() as f64;
    let mean = baseline.iter().sum::<f64>() / n;
    let variance = baseline.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();
    if std <= 0.0 {
        return None;
    }

    Some(finite_or((latest.ln() - mean) / std, 0.0))
}
