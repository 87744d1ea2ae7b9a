use common::{Bar, Result, SimError, Signal};
use tracing::debug;

use crate::indicators::IndicatorSet;

/// Value a condition compares
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Close,
    Indicator(String),
    Value(f64),
}

impl Operand {
    pub fn indicator(name: impl Into<String>) -> Self {
        Operand::Indicator(name.into())
    }

    fn resolve(&self, ctx: &BarContext<'_>, idx: usize) -> Result<f64> {
        match self {
            Operand::Close => ctx
                .bars
                .get(idx)
                .map(|b| b.close)
                .ok_or_else(|| SimError::IndicatorUndefined {
                    indicator: "close".to_string(),
                    index: idx,
                }),
            Operand::Indicator(name) => {
                ctx.indicators
                    .value(name, idx)
                    .ok_or_else(|| SimError::IndicatorUndefined {
                        indicator: name.clone(),
                        index: idx,
                    })
            }
            Operand::Value(v) => Ok(*v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    fn apply(self, left: f64, right: f64) -> bool {
        match self {
            CmpOp::Gt => left > right,
            CmpOp::Ge => left >= right,
            CmpOp::Lt => left < right,
            CmpOp::Le => left <= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    /// `fast` above `slow` now, at or below it on the previous bar
    CrossAbove { fast: Operand, slow: Operand },
    /// `fast` below `slow` now, at or above it on the previous bar
    CrossBelow { fast: Operand, slow: Operand },
    /// Strictly inside `(low, high)`
    Between { operand: Operand, low: f64, high: f64 },
}

impl Condition {
    pub fn compare(left: Operand, op: CmpOp, right: Operand) -> Self {
        Condition::Compare { left, op, right }
    }

    pub fn holds(&self, ctx: &BarContext<'_>) -> Result<bool> {
        let idx = ctx.index;
        match self {
            Condition::Compare { left, op, right } => {
                Ok(op.apply(left.resolve(ctx, idx)?, right.resolve(ctx, idx)?))
            }
            Condition::CrossAbove { fast, slow } => {
                let prev = ctx.previous_index()?;
                let now = fast.resolve(ctx, idx)? > slow.resolve(ctx, idx)?;
                let before = fast.resolve(ctx, prev)? <= slow.resolve(ctx, prev)?;
                Ok(now && before)
            }
            Condition::CrossBelow { fast, slow } => {
                let prev = ctx.previous_index()?;
                let now = fast.resolve(ctx, idx)? < slow.resolve(ctx, idx)?;
                let before = fast.resolve(ctx, prev)? >= slow.resolve(ctx, prev)?;
                Ok(now && before)
            }
            Condition::Between { operand, low, high } => {
                let v = operand.resolve(ctx, idx)?;
                Ok(v > *low && v < *high)
            }
        }
    }
}

/// Conditions that must all hold for each side
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalRules {
    pub buy: Vec<Condition>,
    pub sell: Vec<Condition>,
}

/// Everything the evaluator may look at for one bar
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub index: usize,
    pub bars: &'a [Bar],
    pub indicators: &'a IndicatorSet,
}

impl<'a> BarContext<'a> {
    pub fn new(index: usize, bars: &'a [Bar], indicators: &'a IndicatorSet) -> Self {
        Self {
            index,
            bars,
            indicators,
        }
    }

    pub fn bar(&self) -> Option<&'a Bar> {
        self.bars.get(self.index)
    }

    fn previous_index(&self) -> Result<usize> {
        self.index
            .checked_sub(1)
            .ok_or_else(|| SimError::IndicatorUndefined {
                indicator: "previous bar".to_string(),
                index: self.index,
            })
    }
}

/// Classifies each bar as Buy, Sell or NoSignal
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    rules: SignalRules,
}

impl SignalEvaluator {
    pub fn new(rules: SignalRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &SignalRules {
        &self.rules
    }

    /// Evaluate both sides. Fails with `IndicatorUndefined` when any operand
    /// is missing for this bar. Buy and Sell together cancel out.
    pub fn evaluate(&self, ctx: &BarContext<'_>) -> Result<Signal> {
        let buy = all_hold(&self.rules.buy, ctx)?;
        let sell = all_hold(&self.rules.sell, ctx)?;

        Ok(match (buy, sell) {
            (true, false) => Signal::Buy,
            (false, true) => Signal::Sell,
            (true, true) => {
                debug!(index = ctx.index, "buy and sell both matched, ignoring bar");
                Signal::NoSignal
            }
            (false, false) => Signal::NoSignal,
        })
    }
}

fn all_hold(conditions: &[Condition], ctx: &BarContext<'_>) -> Result<bool> {
    if conditions.is_empty() {
        return Ok(false);
    }
    let mut all = true;
    for condition in conditions {
        all &= condition.holds(ctx)?;
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSeries;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::minutes(i as i64), c, c + 0.5, c - 0.5, c))
            .collect()
    }

    fn make_indicators(fast: &[Option<f64>], slow: &[Option<f64>], rsi: &[Option<f64>]) -> IndicatorSet {
        let mut set = IndicatorSet::new(fast.len());
        set.insert("fast", IndicatorSeries::from_values(fast.to_vec())).unwrap();
        set.insert("slow", IndicatorSeries::from_values(slow.to_vec())).unwrap();
        set.insert("rsi", IndicatorSeries::from_values(rsi.to_vec())).unwrap();
        set
    }

    fn trend_rules() -> SignalRules {
        SignalRules {
            buy: vec![
                Condition::CrossAbove {
                    fast: Operand::indicator("fast"),
                    slow: Operand::indicator("slow"),
                },
                Condition::compare(Operand::indicator("rsi"), CmpOp::Gt, Operand::Value(50.0)),
            ],
            sell: vec![
                Condition::CrossBelow {
                    fast: Operand::indicator("fast"),
                    slow: Operand::indicator("slow"),
                },
                Condition::compare(Operand::indicator("rsi"), CmpOp::Lt, Operand::Value(50.0)),
            ],
        }
    }

    #[test]
    fn test_cross_above_buy() {
        let bars = make_bars(&[1.0, 1.0, 1.0]);
        let set = make_indicators(
            &[Some(1.0), Some(1.0), Some(1.2)],
            &[Some(1.1), Some(1.1), Some(1.1)],
            &[Some(55.0), Some(55.0), Some(60.0)],
        );
        let evaluator = SignalEvaluator::new(trend_rules());

        assert_eq!(evaluator.evaluate(&BarContext::new(1, &bars, &set)).unwrap(), Signal::NoSignal);
        assert_eq!(evaluator.evaluate(&BarContext::new(2, &bars, &set)).unwrap(), Signal::Buy);
    }

    #[test]
    fn test_cross_needs_previous_bar() {
        let bars = make_bars(&[1.0]);
        let set = make_indicators(&[Some(1.2)], &[Some(1.1)], &[Some(60.0)]);
        let evaluator = SignalEvaluator::new(trend_rules());

        let err = evaluator.evaluate(&BarContext::new(0, &bars, &set)).unwrap_err();
        assert!(matches!(err, SimError::IndicatorUndefined { index: 0, .. }));
    }

    #[test]
    fn test_undefined_indicator() {
        let bars = make_bars(&[1.0, 1.0]);
        let set = make_indicators(&[Some(1.0), Some(1.2)], &[Some(1.1), Some(1.1)], &[None, None]);
        let evaluator = SignalEvaluator::new(trend_rules());

        let err = evaluator.evaluate(&BarContext::new(1, &bars, &set)).unwrap_err();
        match err {
            SimError::IndicatorUndefined { indicator, index } => {
                assert_eq!(indicator, "rsi");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_simultaneous_buy_and_sell_is_no_signal() {
        let bars = make_bars(&[1.0]);
        let set = make_indicators(&[Some(1.0)], &[Some(1.0)], &[Some(50.0)]);
        let always = Condition::compare(Operand::Close, CmpOp::Ge, Operand::Value(0.0));
        let evaluator = SignalEvaluator::new(SignalRules {
            buy: vec![always.clone()],
            sell: vec![always],
        });

        assert_eq!(evaluator.evaluate(&BarContext::new(0, &bars, &set)).unwrap(), Signal::NoSignal);
    }

    #[test]
    fn test_empty_rules_never_fire() {
        let bars = make_bars(&[1.0]);
        let set = IndicatorSet::new(1);
        let evaluator = SignalEvaluator::new(SignalRules::default());

        assert_eq!(evaluator.evaluate(&BarContext::new(0, &bars, &set)).unwrap(), Signal::NoSignal);
    }

    #[test]
    fn test_between_is_exclusive() {
        let bars = make_bars(&[1.0, 1.0, 1.0]);
        let set = make_indicators(
            &[None, None, None],
            &[None, None, None],
            &[Some(40.0), Some(50.0), Some(60.0)],
        );
        let cond = Condition::Between {
            operand: Operand::indicator("rsi"),
            low: 40.0,
            high: 60.0,
        };

        assert!(!cond.holds(&BarContext::new(0, &bars, &set)).unwrap());
        assert!(cond.holds(&BarContext::new(1, &bars, &set)).unwrap());
        assert!(!cond.holds(&BarContext::new(2, &bars, &set)).unwrap());
    }
}
