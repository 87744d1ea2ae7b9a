use super::IndicatorSeries;

/// Calculate Average True Range
///
/// # Arguments
/// * `highs` - Slice of high prices
/// * `lows` - Slice of low prices
/// * `closes` - Slice of closing prices
/// * `period` - ATR period (typically 14)
///
/// # Returns
/// Series seeded at index `period - 1` with the mean of the first `period`
/// true ranges, Wilder-smoothed afterwards
pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> IndicatorSeries {
    let n = highs.len().min(lows.len()).min(closes.len());
    let mut atr = vec![None; n];
    if period == 0 || n < period {
        return IndicatorSeries::from_values(atr);
    }

    let alpha = 1.0 / period as f64;

    // The first bar has no previous close
    let mut tr = vec![0.0; n];
    tr[0] = highs[0] - lows[0];
    for i in 1..n {
        tr[i] = true_range(highs[i], lows[i], closes[i - 1]);
    }

    let mut current = tr[..period].iter().sum::<f64>() / period as f64;
    atr[period - 1] = Some(current);

    for i in period..n {
        current = current * (1.0 - alpha) + tr[i] * alpha;
        atr[i] = Some(current);
    }

    IndicatorSeries::from_values(atr)
}

/// Calculate True Range for a single bar
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    let hl = high - low;
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}
