use super::IndicatorSeries;

/// Calculate RSI using Wilder's Smoothing
///
/// # Arguments
/// * `prices` - Slice of closing prices
/// * `period` - RSI period (typically 14)
///
/// # Returns
/// Series aligned with `prices`. The first defined value sits at index
/// `period`, after `period` price deltas. A window with no movement at all
/// reads 50.
pub fn calculate_rsi(prices: &[f64], period: usize) -> IndicatorSeries {
    let n = prices.len();
    let mut rsi = vec![None; n];
    if period == 0 || n < period + 1 {
        return IndicatorSeries::from_values(rsi);
    }

    let alpha = 1.0 / period as f64;

    // Calculate initial averages
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..=period {
        let delta = prices[i] - prices[i - 1];
        if delta > 0.0 {
            avg_gain += delta;
        } else {
            avg_loss += delta.abs();
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    rsi[period] = Some(rsi_value(avg_gain, avg_loss));

    // Wilder's Smoothing for subsequent values
    for i in (period + 1)..n {
        let delta = prices[i] - prices[i - 1];
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { delta.abs() } else { 0.0 };

        avg_gain = avg_gain * (1.0 - alpha) + gain * alpha;
        avg_loss = avg_loss * (1.0 - alpha) + loss * alpha;

        rsi[i] = Some(rsi_value(avg_gain, avg_loss));
    }

    IndicatorSeries::from_values(rsi)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}
