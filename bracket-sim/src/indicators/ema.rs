use super::IndicatorSeries;

/// Calculate Exponential Moving Average seeded with the SMA of the first
/// `period` prices.
///
/// # Arguments
/// * `prices` - Slice of prices
/// * `period` - EMA period
///
/// # Returns
/// Series aligned with `prices`, undefined before index `period - 1`
pub fn calculate_ema(prices: &[f64], period: usize) -> IndicatorSeries {
    let n = prices.len();
    let mut ema = vec![None; n];

    if n < period || period == 0 {
        return IndicatorSeries::from_values(ema);
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    let mut current: f64 = prices[..period].iter().sum::<f64>() / period as f64;
    ema[period - 1] = Some(current);

    for i in period..n {
        current = (prices[i] - current) * multiplier + current;
        ema[i] = Some(current);
    }

    IndicatorSeries::from_values(ema)
}
