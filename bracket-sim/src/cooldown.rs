use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Last entry seen for one instrument
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CooldownState {
    pub last_entry_time: Option<DateTime<Utc>>,
}

/// Enforces a minimum gap between consecutive entries per instrument.
///
/// Only entries are gated; exits are never delayed.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    period: Duration,
    states: HashMap<String, CooldownState>,
}

impl CooldownGate {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            states: HashMap::new(),
        }
    }

    /// Gate built from an optional period in seconds; `None` never blocks
    pub fn from_secs(secs: Option<i64>) -> Self {
        Self::new(Duration::seconds(secs.unwrap_or(0)))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a new entry on `instrument` may happen at `now`
    pub fn allow_entry(&self, instrument: &str, now: DateTime<Utc>) -> bool {
        match self.state(instrument).last_entry_time {
            Some(last) => now - last >= self.period,
            None => true,
        }
    }

    /// Record a successful entry; only call once the position is actually open
    pub fn record_entry(&mut self, instrument: &str, now: DateTime<Utc>) {
        self.states
            .entry(instrument.to_string())
            .or_default()
            .last_entry_time = Some(now);
    }

    pub fn state(&self, instrument: &str) -> CooldownState {
        self.states.get(instrument).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap() + Duration::minutes(minute)
    }

    #[test]
    fn test_first_entry_allowed() {
        let gate = CooldownGate::new(Duration::minutes(15));
        assert!(gate.allow_entry("EURUSD", at(0)));
        assert_eq!(gate.state("EURUSD").last_entry_time, None);
    }

    #[test]
    fn test_blocks_within_period() {
        let mut gate = CooldownGate::new(Duration::minutes(15));
        gate.record_entry("EURUSD", at(0));

        assert!(!gate.allow_entry("EURUSD", at(1)));
        assert!(!gate.allow_entry("EURUSD", at(14)));
        assert!(gate.allow_entry("EURUSD", at(15)));
        assert!(gate.allow_entry("EURUSD", at(30)));
    }

    #[test]
    fn test_instruments_are_independent() {
        let mut gate = CooldownGate::new(Duration::minutes(2));
        gate.record_entry("BTCUSD", at(0));
        assert!(!gate.allow_entry("BTCUSD", at(1)));
        assert!(gate.allow_entry("ETHUSD", at(1)));
    }

    #[test]
    fn test_zero_period_never_blocks() {
        let mut gate = CooldownGate::from_secs(None);
        gate.record_entry("EURUSD", at(0));
        assert!(gate.allow_entry("EURUSD", at(0)));
    }
}
