use super::sma::{calculate_sma, rolling_std_dev};
use super::IndicatorSeries;

/// Bollinger Bands result
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
}

/// Calculate Bollinger Bands
///
/// # Arguments
/// * `prices` - Slice of closing prices
/// * `period` - Period for moving average (typically 20)
/// * `std_dev` - Number of standard deviations (typically 2.0)
///
/// # Returns
/// BollingerBands struct containing upper, middle (SMA), and lower bands
pub fn calculate_bollinger_bands(prices: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let middle = calculate_sma(prices, period);
    let deviation = rolling_std_dev(prices, period);

    let band = |sign: f64| {
        IndicatorSeries::from_values(
            middle
                .values()
                .iter()
                .zip(deviation.values())
                .map(|(m, s)| match (m, s) {
                    (Some(m), Some(s)) => Some(m + sign * std_dev * s),
                    _ => None,
                })
                .collect(),
        )
    };

    BollingerBands {
        upper: band(1.0),
        lower: band(-1.0),
        middle,
    }
}
