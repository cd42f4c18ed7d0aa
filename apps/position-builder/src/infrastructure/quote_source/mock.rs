//! Mock quote source for testing.
//!
//! Quotes come from a table set by the test. A gated source holds every
//! fetch until the test releases it, which is how tests line up responses
//! against edits made while a request is in flight.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use crate::application::ports::{QuoteBatch, QuoteSourceError, QuoteSourcePort};
use crate::domain::position::{LegKey, Quote};

/// Mock quote source for testing.
#[derive(Debug, Default)]
pub struct MockQuoteSource {
    quotes: Mutex<BTreeMap<LegKey, Quote>>,
    failures: Mutex<VecDeque<QuoteSourceError>>,
    calls: Mutex<Vec<BTreeSet<LegKey>>>,
    gate: Option<Semaphore>,
    started: Notify,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockQuoteSource {
    /// Create a source that answers immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source whose fetches wait for [`Self::release`].
    #[must_use]
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Set the quote for a leg.
    pub fn set_quote(&self, key: LegKey, quote: Quote) {
        self.quotes.lock().insert(key, quote);
    }

    /// Remove the quote for a leg; it will come back absent.
    pub fn clear_quote(&self, key: &LegKey) {
        self.quotes.lock().remove(key);
    }

    /// Make the next fetch fail with `error`. Failures queue up.
    pub fn fail_next(&self, error: QuoteSourceError) {
        self.failures.lock().push_back(error);
    }

    /// Let `n` gated fetches finish.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Key sets of every fetch so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<BTreeSet<LegKey>> {
        self.calls.lock().clone()
    }

    /// Number of fetches so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of fetches ever running at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` fetches have started.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let started = self.started.notified();
            if self.call_count() >= n {
                return;
            }
            started.await;
        }
    }
}

#[async_trait]
impl QuoteSourcePort for MockQuoteSource {
    async fn fetch(&self, keys: &BTreeSet<LegKey>) -> Result<QuoteBatch, QuoteSourceError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.calls.lock().push(keys.clone());
        self.started.notify_waiters();

        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    return Err(QuoteSourceError::ConnectionLost {
                        message: "gate closed".to_string(),
                    });
                }
            }
        }

        let failure = self.failures.lock().pop_front();
        let result = match failure {
            Some(error) => Err(error),
            None => {
                let quotes = self.quotes.lock();
                Ok(keys.iter().map(|k| (*k, quotes.get(k).copied())).collect())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn expirations(&self) -> Result<Vec<NaiveDate>, QuoteSourceError> {
        let expirations: BTreeSet<NaiveDate> =
            self.quotes.lock().keys().map(|k| k.expiration).collect();
        Ok(expirations.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;

    fn march() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 21).unwrap()
    }

    #[tokio::test]
    async fn answers_from_table() {
        let source = MockQuoteSource::new();
        let known = LegKey::call(march(), dec!(5000));
        let unknown = LegKey::put(march(), dec!(5000));
        source.set_quote(known, Quote::two_sided(10.0, 10.5));

        let batch = source
            .fetch(&BTreeSet::from([known, unknown]))
            .await
            .unwrap();
        assert_eq!(batch[&known], Some(Quote::two_sided(10.0, 10.5)));
        assert_eq!(batch[&unknown], None);
        assert_eq!(source.calls(), vec![BTreeSet::from([known, unknown])]);
    }

    #[tokio::test]
    async fn injected_failure_is_used_once() {
        let source = MockQuoteSource::new();
        let key = LegKey::call(march(), dec!(5000));
        source.fail_next(QuoteSourceError::ConnectionLost {
            message: "down".to_string(),
        });

        assert!(source.fetch(&BTreeSet::from([key])).await.is_err());
        assert!(source.fetch(&BTreeSet::from([key])).await.is_ok());
    }

    #[tokio::test]
    async fn gated_fetch_waits_for_release() {
        let source = Arc::new(MockQuoteSource::gated());
        let key = LegKey::call(march(), dec!(5000));

        let task = {
            let source = Arc::clone(&source);
            tokio::spawn(async move { source.fetch(&BTreeSet::from([key])).await })
        };

        source.wait_for_calls(1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        source.release(1);
        assert!(task.await.unwrap().is_ok());
        assert_eq!(source.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn expirations_follow_table() {
        let source = MockQuoteSource::new();
        let april = NaiveDate::from_ymd_opt(2025, 4, 17).unwrap();
        source.set_quote(LegKey::call(april, dec!(5000)), Quote::two_sided(1.0, 1.1));
        source.set_quote(LegKey::call(march(), dec!(5000)), Quote::two_sided(1.0, 1.1));
        source.set_quote(LegKey::put(march(), dec!(5000)), Quote::two_sided(1.0, 1.1));

        assert_eq!(source.expirations().await.unwrap(), vec![march(), april]);
    }
}
