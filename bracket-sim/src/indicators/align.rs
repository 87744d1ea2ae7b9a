use chrono::Duration;
use common::BarSeries;

use super::IndicatorSeries;

/// Project a series computed on `source` onto the index space of `primary`.
///
/// Each primary bar takes the value of the latest source bar that has closed
/// by the time the primary bar closes. Bars are stamped at their open and a
/// bar closes one [`bar_interval`] later, so a primary bar never sees a
/// higher-timeframe close that lies in its future.
pub fn align_to(primary: &BarSeries, source: &BarSeries, values: &IndicatorSeries) -> IndicatorSeries {
    let primary_span = bar_interval(primary);
    let source_span = bar_interval(source);
    let source_bars = source.bars();
    let mut aligned = Vec::with_capacity(primary.len());
    let mut cursor: Option<usize> = None;

    for bar in primary.bars() {
        let closes_at = bar.timestamp + primary_span;
        let mut next = cursor.map_or(0, |c| c + 1);
        while next < source_bars.len() && source_bars[next].timestamp + source_span <= closes_at {
            cursor = Some(next);
            next += 1;
        }
        aligned.push(cursor.and_then(|c| values.get(c)));
    }

    IndicatorSeries::from_values(aligned)
}

/// Smallest gap between consecutive bars. Zero for fewer than two bars.
pub fn bar_interval(series: &BarSeries) -> Duration {
    series
        .bars()
        .windows(2)
        .map(|pair| pair[1].timestamp - pair[0].timestamp)
        .min()
        .unwrap_or_else(Duration::zero)
}
