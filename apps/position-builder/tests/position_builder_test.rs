//! Integration Tests for the Position Builder Runtime
//!
//! Drives a running builder and quote worker through the public handle and
//! watches what reaches the presentation sink. A gated mock source holds each
//! fetch until the test releases it, so edits can be lined up against an
//! in-flight request.

// Allow unwrap in tests - tests should panic on unexpected errors
#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::collections::BTreeSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

use position_builder::application::ports::{QuoteSourceError, QuoteSourcePort, Snapshot, Status};
use position_builder::application::services::{
    BuilderError, BuilderRuntime, PositionBuilderConfig,
};
use position_builder::domain::position::{
    EditOutcome, LegAction, LegField, LegKey, LegStoreError, Quote,
};
use position_builder::domain::pricing::{Sign, Total};
use position_builder::infrastructure::presentation::RecordingSink;
use position_builder::infrastructure::quote_source::{ChainQuoteSource, MockQuoteSource};

const WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// Helpers
// =============================================================================

fn march() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 21).unwrap()
}

fn april() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 17).unwrap()
}

fn one() -> NonZeroU32 {
    NonZeroU32::new(1).unwrap()
}

fn call_5000() -> LegKey {
    LegKey::call(march(), dec!(5000))
}

fn put_5000() -> LegKey {
    LegKey::put(march(), dec!(5000))
}

/// Periodic refresh far enough out that it never fires during a test.
fn quiet_config() -> PositionBuilderConfig {
    PositionBuilderConfig {
        refresh_interval: Duration::from_secs(3600),
        ..PositionBuilderConfig::default()
    }
}

fn start(
    source: &Arc<MockQuoteSource>,
    config: PositionBuilderConfig,
) -> (BuilderRuntime, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let runtime = BuilderRuntime::start(
        Arc::clone(source) as Arc<dyn QuoteSourcePort>,
        Arc::clone(&sink),
        config,
        CancellationToken::new(),
    );
    (runtime, sink)
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.unwrap();
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn settled(snapshot: &Snapshot) -> bool {
    !snapshot.refreshing && snapshot.totals.lazy.is_known()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn single_long_call_is_priced_after_refresh() {
    let source = Arc::new(MockQuoteSource::new());
    source.set_quote(call_5000(), Quote::two_sided(10.0, 10.5));
    let (runtime, sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    let position = handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();
    assert_eq!(position.len(), 1);

    let snapshot = sink.wait_for(WAIT, settled).await.unwrap();
    assert_close(snapshot.totals.lazy.value(), 10.5);
    assert_close(snapshot.totals.smart.value(), 10.25);
    assert_eq!(snapshot.totals.lazy.sign(), Some(Sign::Debit));
    assert_eq!(snapshot.totals.smart.sign(), Some(Sign::Debit));
    assert_eq!(snapshot.status, Status::Ready);

    let curve = snapshot.curve.unwrap();
    assert_eq!(curve.cost_basis(), 10.5);
    assert_eq!(curve.value_at(5100.0) - curve.cost_basis(), 89.5);
    assert_eq!(curve.value_at(4900.0) - curve.cost_basis(), -10.5);

    runtime.shutdown().await;
}

#[tokio::test]
async fn call_plus_short_put_prices_both_legs() {
    let source = Arc::new(MockQuoteSource::new());
    source.set_quote(call_5000(), Quote::two_sided(10.0, 10.5));
    source.set_quote(put_5000(), Quote::two_sided(8.0, 8.4));
    let (runtime, sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();
    handle.add(LegAction::Sell, one(), put_5000()).await.unwrap();

    let snapshot = sink
        .wait_for(WAIT, |s| s.position.len() == 2 && settled(s))
        .await
        .unwrap();
    assert_close(snapshot.totals.lazy.value(), 2.5);
    assert_close(snapshot.totals.smart.value(), 2.05);
    assert_eq!(snapshot.totals.lazy.sign(), Some(Sign::Debit));

    runtime.shutdown().await;
}

#[tokio::test]
async fn unanswered_leg_has_unknown_totals_and_no_curve() {
    let source = Arc::new(MockQuoteSource::gated());
    source.set_quote(call_5000(), Quote::two_sided(10.0, 10.5));
    let (runtime, sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();
    source.wait_for_calls(1).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.totals.lazy, Total::Unknown);
    assert_eq!(snapshot.totals.smart, Total::Unknown);
    assert!(snapshot.curve.is_none());
    assert!(snapshot.refreshing);

    source.release(1);
    let snapshot = sink.wait_for(WAIT, settled).await.unwrap();
    assert!(snapshot.curve.is_some());

    runtime.shutdown().await;
}

#[tokio::test]
async fn strike_edit_onto_existing_leg_merges() {
    let source = Arc::new(MockQuoteSource::new());
    let call_5050 = LegKey::call(march(), dec!(5050));
    source.set_quote(call_5000(), Quote::two_sided(10.0, 10.5));
    source.set_quote(call_5050, Quote::two_sided(4.1, 4.5));
    let (runtime, sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();
    handle
        .add(LegAction::Sell, NonZeroU32::new(2).unwrap(), call_5050)
        .await
        .unwrap();
    sink.wait_for(WAIT, |s| s.position.len() == 2 && settled(s))
        .await
        .unwrap();

    let (position, outcome) = handle
        .edit(call_5050, LegField::Strike(dec!(5000)))
        .await
        .unwrap();

    assert_eq!(outcome, EditOutcome::Merged { into: call_5000() });
    assert_eq!(position.len(), 1);
    let kept = position.get(&call_5000()).unwrap();
    assert_eq!(kept.action(), LegAction::Buy);
    assert_eq!(kept.multiplier(), one());
    assert_eq!(kept.quote(), Some(&Quote::two_sided(10.0, 10.5)));

    runtime.shutdown().await;
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn response_for_old_legs_is_discarded() {
    let source = Arc::new(MockQuoteSource::gated());
    source.set_quote(call_5000(), Quote::two_sided(10.0, 10.5));
    source.set_quote(put_5000(), Quote::two_sided(8.0, 8.4));
    let (runtime, sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();
    source.wait_for_calls(1).await;
    handle.add(LegAction::Sell, one(), put_5000()).await.unwrap();

    // answer for {call} arrives after the put was added
    source.release(1);
    source.wait_for_calls(2).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.position.len(), 2);
    assert!(snapshot.position.iter().all(|leg| leg.quote().is_none()));
    assert_eq!(snapshot.totals.lazy, Total::Unknown);

    source.release(1);
    let snapshot = sink
        .wait_for(WAIT, |s| s.position.len() == 2 && settled(s))
        .await
        .unwrap();
    assert!(snapshot.position.iter().all(|leg| leg.quote().is_some()));

    runtime.shutdown().await;
}

#[tokio::test]
async fn requests_issued_while_busy_drain_to_latest() {
    let source = Arc::new(MockQuoteSource::gated());
    let put_5050 = LegKey::put(march(), dec!(5050));
    source.set_quote(call_5000(), Quote::two_sided(10.0, 10.5));
    source.set_quote(put_5050, Quote::two_sided(36.0, 37.2));
    let (runtime, sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    // R1 in flight
    handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();
    source.wait_for_calls(1).await;

    // R2 then R3 queued; R3 replaces R2
    handle.add(LegAction::Sell, one(), put_5000()).await.unwrap();
    let (_, outcome) = handle
        .edit(put_5000(), LegField::Strike(dec!(5050)))
        .await
        .unwrap();
    assert_eq!(outcome, EditOutcome::Rekeyed { key: put_5050 });
    assert!(handle.refresh().await.unwrap());

    source.release(1);
    source.wait_for_calls(2).await;
    source.release(1);

    let snapshot = sink
        .wait_for(WAIT, |s| s.position.len() == 2 && settled(s))
        .await
        .unwrap();
    assert_close(snapshot.totals.lazy.value(), 10.5 - 36.0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let calls = source.calls();
    assert_eq!(calls.len(), 2, "only the latest queued request is sent");
    assert_eq!(calls[1], BTreeSet::from([call_5000(), put_5050]));
    assert_eq!(source.max_in_flight(), 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn never_more_than_one_fetch_in_flight() {
    let source = Arc::new(MockQuoteSource::gated());
    let (runtime, sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    for strike in [dec!(4900), dec!(4950), dec!(5000), dec!(5050), dec!(5100)] {
        handle
            .add(LegAction::Buy, one(), LegKey::call(march(), strike))
            .await
            .unwrap();
        handle.refresh().await.unwrap();
    }

    source.wait_for_calls(1).await;
    source.release(1);
    source.wait_for_calls(2).await;
    source.release(1);

    sink.wait_for(WAIT, |s| s.position.len() == 5 && !s.refreshing)
        .await
        .unwrap();
    assert_eq!(source.call_count(), 2);
    assert_eq!(source.max_in_flight(), 1);

    runtime.shutdown().await;
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn source_failure_sets_status_until_next_success() {
    let source = Arc::new(MockQuoteSource::new());
    source.set_quote(call_5000(), Quote::two_sided(10.0, 10.5));
    source.fail_next(QuoteSourceError::ConnectionLost {
        message: "session dropped".to_string(),
    });
    let (runtime, sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();

    let snapshot = sink
        .wait_for(WAIT, |s| s.status.is_error() && !s.refreshing)
        .await
        .unwrap();
    assert_eq!(
        snapshot.status,
        Status::Error("connection lost: session dropped".to_string())
    );
    assert_eq!(snapshot.totals.lazy, Total::Unknown);
    assert!(snapshot.curve.is_none());

    assert!(handle.refresh().await.unwrap());
    let snapshot = sink.wait_for(WAIT, settled).await.unwrap();
    assert_eq!(snapshot.status, Status::Ready);
    assert_close(snapshot.totals.lazy.value(), 10.5);

    runtime.shutdown().await;
}

#[tokio::test]
async fn leg_errors_leave_position_untouched() {
    let source = Arc::new(MockQuoteSource::new());
    let (runtime, _sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();

    let err = handle
        .add(LegAction::Sell, one(), call_5000())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BuilderError::LegStore(LegStoreError::DuplicateKey { key: call_5000() })
    );

    let err = handle.remove(put_5000()).await.unwrap_err();
    assert!(matches!(
        err,
        BuilderError::LegStore(LegStoreError::NotFound { .. })
    ));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.position.len(), 1);
    assert_eq!(
        snapshot.position.get(&call_5000()).unwrap().action(),
        LegAction::Buy
    );

    runtime.shutdown().await;
}

#[tokio::test]
async fn clearing_leaves_a_flat_position() {
    let source = Arc::new(MockQuoteSource::new());
    source.set_quote(call_5000(), Quote::two_sided(10.0, 10.5));
    let (runtime, sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();
    sink.wait_for(WAIT, settled).await.unwrap();

    let position = handle.clear().await.unwrap();
    assert!(position.is_empty());
    assert!(!handle.refresh().await.unwrap());

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.totals.lazy, Total::Known(0.0));
    assert!(snapshot.curve.is_none());
    assert_eq!(source.call_count(), 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn periodic_refresh_picks_up_new_quotes() {
    let source = Arc::new(MockQuoteSource::new());
    source.set_quote(call_5000(), Quote::two_sided(10.0, 10.5));
    let config = PositionBuilderConfig {
        refresh_interval: Duration::from_millis(50),
        ..PositionBuilderConfig::default()
    };
    let (runtime, sink) = start(&source, config);
    let handle = runtime.handle();

    handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();
    sink.wait_for(WAIT, settled).await.unwrap();

    source.set_quote(call_5000(), Quote::two_sided(11.0, 11.5));
    let snapshot = sink
        .wait_for(WAIT, |s| s.totals.lazy.value() == Some(11.5))
        .await
        .unwrap();
    assert_close(snapshot.totals.smart.value(), 11.25);

    runtime.shutdown().await;
}

// =============================================================================
// Expirations and lifecycle
// =============================================================================

#[tokio::test]
async fn expirations_come_from_the_source() {
    let source = Arc::new(MockQuoteSource::new());
    source.set_quote(LegKey::call(april(), dec!(5000)), Quote::two_sided(1.0, 1.1));
    source.set_quote(call_5000(), Quote::two_sided(10.0, 10.5));
    let (runtime, _sink) = start(&source, quiet_config());

    let expirations = runtime.handle().expirations().await.unwrap();
    assert_eq!(expirations, vec![march(), april()]);

    runtime.shutdown().await;
}

#[tokio::test]
async fn handle_reports_stopped_after_shutdown() {
    let source = Arc::new(MockQuoteSource::new());
    let (runtime, _sink) = start(&source, quiet_config());
    let handle = runtime.handle();

    runtime.shutdown().await;

    let err = handle.add(LegAction::Buy, one(), call_5000()).await.unwrap_err();
    assert_eq!(err, BuilderError::Stopped);
}

// =============================================================================
// Option chain source end to end
// =============================================================================

fn chain_runtime() -> (BuilderRuntime, Arc<RecordingSink>) {
    let yaml = include_str!("../fixtures/chain.yaml");
    let source = ChainQuoteSource::from_yaml_str(yaml, Duration::ZERO).unwrap();
    let sink = Arc::new(RecordingSink::new());
    let runtime = BuilderRuntime::start(
        Arc::new(source),
        Arc::clone(&sink),
        quiet_config(),
        CancellationToken::new(),
    );
    (runtime, sink)
}

#[tokio::test]
async fn chain_prices_call_and_short_put() {
    let (runtime, sink) = chain_runtime();
    let handle = runtime.handle();

    handle.add(LegAction::Buy, one(), call_5000()).await.unwrap();
    handle.add(LegAction::Sell, one(), put_5000()).await.unwrap();

    let snapshot = sink
        .wait_for(WAIT, |s| s.position.len() == 2 && settled(s))
        .await
        .unwrap();
    assert_close(snapshot.totals.lazy.value(), 2.5);
    assert_close(snapshot.totals.smart.value(), 2.05);
    assert_close(snapshot.totals.net_delta, 0.52 + 0.47);

    let expirations = handle.expirations().await.unwrap();
    assert_eq!(expirations, vec![march(), april()]);

    runtime.shutdown().await;
}

#[tokio::test]
async fn chain_reports_unlisted_expiration() {
    let (runtime, sink) = chain_runtime();
    let handle = runtime.handle();
    let may = NaiveDate::from_ymd_opt(2025, 5, 16).unwrap();

    handle
        .add(LegAction::Buy, one(), LegKey::call(may, dec!(5000)))
        .await
        .unwrap();

    let snapshot = sink
        .wait_for(WAIT, |s| s.status.is_error() && !s.refreshing)
        .await
        .unwrap();
    assert!(
        snapshot
            .status
            .to_string()
            .starts_with("no quotes for these strikes/expirations:")
    );
    assert_eq!(snapshot.totals.lazy, Total::Unknown);

    runtime.shutdown().await;
}

#[tokio::test]
async fn chain_one_sided_market_leaves_lazy_unknown() {
    let (runtime, sink) = chain_runtime();
    let handle = runtime.handle();

    // the April 5100 put has an ask but no bid
    handle
        .add(LegAction::Sell, one(), LegKey::put(april(), dec!(5100)))
        .await
        .unwrap();

    let snapshot = sink
        .wait_for(WAIT, |s| !s.refreshing && s.position.iter().all(|l| l.quote().is_some()))
        .await
        .unwrap();
    assert_eq!(snapshot.status, Status::Ready);
    assert_eq!(snapshot.totals.lazy, Total::Unknown);
    assert!(snapshot.curve.is_none());

    runtime.shutdown().await;
}
