use super::IndicatorSeries;

/// Calculate Simple Moving Average
///
/// # Arguments
/// * `prices` - Slice of prices
/// * `period` - SMA period
///
/// # Returns
/// Series aligned with `prices`; the first `period - 1` values are undefined
pub fn calculate_sma(prices: &[f64], period: usize) -> IndicatorSeries {
    let n = prices.len();
    let mut sma = vec![None; n];

    if n < period || period == 0 {
        return IndicatorSeries::from_values(sma);
    }

    // Calculate initial sum
    let mut sum: f64 = prices[..period].iter().sum();
    sma[period - 1] = Some(sum / period as f64);

    // Sliding window for subsequent values
    for i in period..n {
        sum = sum - prices[i - period] + prices[i];
        sma[i] = Some(sum / period as f64);
    }

    IndicatorSeries::from_values(sma)
}

/// Population standard deviation over a trailing window
pub fn rolling_std_dev(prices: &[f64], period: usize) -> IndicatorSeries {
    let n = prices.len();
    let mut std = vec![None; n];

    if n < period || period == 0 {
        return IndicatorSeries::from_values(std);
    }

    for i in (period - 1)..n {
        let window = &prices[i + 1 - period..=i];
        let mean: f64 = window.iter().sum::<f64>() / period as f64;
        let variance: f64 = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        std[i] = Some(variance.sqrt());
    }

    IndicatorSeries::from_values(std)
}
