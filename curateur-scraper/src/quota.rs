//! Daily request ledger.
//!
//! Counts real network calls against the daily cap (the lower of the
//! Provider-reported cap and any operator override). The counter resets at
//! the operator-local day boundary. Crossing the warning ratio logs once
//! per process.

use std::sync::Mutex;

use chrono::{Local, NaiveDate};

use crate::error::ScrapeError;

#[derive(Debug)]
struct Inner {
    day: NaiveDate,
    used_today: u32,
    daily_cap: Option<u32>,
    warned: bool,
}

/// Shared daily-quota state. Incremented only on actual network calls;
/// cache hits are free.
#[derive(Debug)]
pub struct QuotaLedger {
    warn_ratio: f64,
    inner: Mutex<Inner>,
}

impl QuotaLedger {
    pub fn new(daily_cap: Option<u32>, warn_ratio: f64) -> Self {
        Self {
            warn_ratio,
            inner: Mutex::new(Inner {
                day: Local::now().date_naive(),
                used_today: 0,
                daily_cap,
                warned: false,
            }),
        }
    }

    /// The effective daily cap: Provider cap lower-bounded by an operator
    /// override.
    pub fn effective_cap(provider_cap: Option<u32>, override_cap: Option<u32>) -> Option<u32> {
        match (provider_cap, override_cap) {
            (Some(p), Some(o)) => Some(p.min(o)),
            (Some(p), None) => Some(p),
            (None, Some(o)) => Some(o),
            (None, None) => None,
        }
    }

    /// Fail with `QuotaExceeded` when the day's budget is spent.
    /// Checked before dispatching a network call.
    pub fn check(&self) -> Result<(), ScrapeError> {
        let mut inner = self.inner.lock().expect("quota lock poisoned");
        roll_day(&mut inner);
        if let Some(cap) = inner.daily_cap {
            if inner.used_today >= cap {
                return Err(ScrapeError::QuotaExceeded {
                    used: inner.used_today,
                    max: cap,
                });
            }
        }
        Ok(())
    }

    /// Record one real network call.
    pub fn record_call(&self) {
        let mut inner = self.inner.lock().expect("quota lock poisoned");
        roll_day(&mut inner);
        inner.used_today += 1;
        self.maybe_warn(&mut inner);
    }

    /// Fold in the Provider's own view of today's usage, which includes
    /// calls made by other clients on the same account.
    pub fn sync_usage(&self, requests_today: u32) {
        let mut inner = self.inner.lock().expect("quota lock poisoned");
        roll_day(&mut inner);
        if requests_today > inner.used_today {
            inner.used_today = requests_today;
        }
        self.maybe_warn(&mut inner);
    }

    pub fn used_today(&self) -> u32 {
        let mut inner = self.inner.lock().expect("quota lock poisoned");
        roll_day(&mut inner);
        inner.used_today
    }

    fn maybe_warn(&self, inner: &mut Inner) {
        if inner.warned {
            return;
        }
        if let Some(cap) = inner.daily_cap {
            if cap > 0 && inner.used_today as f64 / cap as f64 >= self.warn_ratio {
                log::warn!(
                    "Daily quota at {}/{} requests ({:.0}% of cap)",
                    inner.used_today,
                    cap,
                    100.0 * inner.used_today as f64 / cap as f64
                );
                inner.warned = true;
            }
        }
    }
}

fn roll_day(inner: &mut Inner) {
    let today = Local::now().date_naive();
    if inner.day != today {
        inner.day = today;
        inner.used_today = 0;
        inner.warned = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_enforced() {
        let ledger = QuotaLedger::new(Some(2), 0.95);
        assert!(ledger.check().is_ok());
        ledger.record_call();
        ledger.record_call();
        assert!(matches!(
            ledger.check(),
            Err(ScrapeError::QuotaExceeded { used: 2, max: 2 })
        ));
    }

    #[test]
    fn no_cap_means_unbounded() {
        let ledger = QuotaLedger::new(None, 0.95);
        for _ in 0..100 {
            ledger.record_call();
        }
        assert!(ledger.check().is_ok());
    }

    #[test]
    fn provider_usage_only_raises() {
        let ledger = QuotaLedger::new(Some(100), 0.95);
        ledger.record_call();
        ledger.sync_usage(50);
        assert_eq!(ledger.used_today(), 50);
        ledger.sync_usage(10);
        assert_eq!(ledger.used_today(), 50);
    }

    #[test]
    fn effective_cap_is_minimum() {
        assert_eq!(QuotaLedger::effective_cap(Some(20000), Some(5000)), Some(5000));
        assert_eq!(QuotaLedger::effective_cap(Some(100), None), Some(100));
        assert_eq!(QuotaLedger::effective_cap(None, None), None);
    }
}
