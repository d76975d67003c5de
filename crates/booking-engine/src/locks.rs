//! Per-provider, per-local-day commit serialization.
//!
//! Every commit holds the lock of each provider-local date its effective
//! interval touches, so two candidates that could overlap always contend on at
//! least one shared lock. Dates are locked in ascending order and a commit only
//! ever locks one provider, which rules out deadlock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{BookingError, Result};

type DayKey = (String, NaiveDate);

#[derive(Debug, Default)]
pub struct DayLocks {
    locks: Mutex<HashMap<DayKey, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop.
#[derive(Debug)]
pub struct DayGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl DayLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `dates` for `provider_id`, waiting at most `timeout` per date.
    pub async fn acquire(
        &self,
        provider_id: &str,
        dates: &[NaiveDate],
        timeout: Duration,
    ) -> Result<DayGuard> {
        let mut ordered = dates.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for date in ordered {
            let lock = self.handle(provider_id, date);
            let guard = tokio::time::timeout(timeout, lock.lock_owned())
                .await
                .map_err(|_| BookingError::Busy {
                    provider_id: provider_id.to_string(),
                    date,
                })?;
            debug!(provider_id, %date, "acquired day lock");
            guards.push(guard);
        }

        Ok(DayGuard { _guards: guards })
    }

    /// Number of provider-days with a live lock entry.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, provider_id: &str, date: NaiveDate) -> Arc<AsyncMutex<()>> {
        let mut table = self.table();
        // Entries nobody references any more can be rebuilt on demand.
        table.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(
            table
                .entry((provider_id.to_string(), date))
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<DayKey, Arc<AsyncMutex<()>>>> {
        // The table holds no invariants a panicking holder could break.
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn second_acquire_times_out_while_first_is_held() {
        let locks = DayLocks::new();
        let day = [date(2030, 3, 18)];

        let _held = locks
            .acquire("p1", &day, Duration::from_millis(50))
            .await
            .unwrap();
        let err = locks
            .acquire("p1", &day, Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Busy { .. }));
    }

    #[tokio::test]
    async fn other_provider_and_other_day_are_independent() {
        let locks = DayLocks::new();
        let monday = [date(2030, 3, 18)];
        let tuesday = [date(2030, 3, 19)];
        let timeout = Duration::from_millis(20);

        let _held = locks.acquire("p1", &monday, timeout).await.unwrap();
        assert!(locks.acquire("p2", &monday, timeout).await.is_ok());
        assert!(locks.acquire("p1", &tuesday, timeout).await.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = DayLocks::new();
        let timeout = Duration::from_millis(20);

        drop(locks.acquire("p1", &[date(2030, 3, 18)], timeout).await.unwrap());
        drop(locks.acquire("p1", &[date(2030, 3, 19)], timeout).await.unwrap());

        // The first entry was unreferenced when the second was created.
        assert_eq!(locks.len(), 1);
    }
}
