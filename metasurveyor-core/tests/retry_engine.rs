//! Integration tests for the retry engine driving a collector.

mod common;

use common::{Behavior, MockCollector};
use metasurveyor_core::{
    Collector, CollectorError, ErrorCode, ExecutionContext, RetryConfig, retry, with_retry,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn fast_config(max_retries: u32) -> RetryConfig {
    RetryConfig::new(
        max_retries,
        Duration::from_millis(100),
        Duration::from_secs(1),
        2.0,
        0.0,
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_retryable_failures_are_bounded() {
    let collector = MockCollector::new("mysql").with_behavior("t", Behavior::Fail(ErrorCode::Network));
    let ctx = ExecutionContext::new();

    for max_retries in [0, 1, 3] {
        let before = collector.calls_for("t");
        let outcome = with_retry(&ctx, &fast_config(max_retries), |ctx| {
            let collector = &collector;
            async move { collector.fetch_table_metadata(&ctx, "db", "s", "t").await }
        })
        .await;

        assert_eq!(outcome.attempts, max_retries + 1);
        assert_eq!(collector.calls_for("t") - before, max_retries + 1);
        assert_eq!(outcome.error().map(CollectorError::code), Some(ErrorCode::Network));
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_codes_fail_fast() {
    let permanent = ErrorCode::ALL
        .iter()
        .copied()
        .filter(|code| !code.is_retryable_by_default());

    for code in permanent {
        let table = code.as_str();
        let collector = MockCollector::new("postgres").with_behavior(table, Behavior::Fail(code));

        let outcome = with_retry(&ExecutionContext::new(), &fast_config(5), |ctx| {
            let collector = &collector;
            async move { collector.fetch_table_metadata(&ctx, "db", "s", table).await }
        })
        .await;

        assert_eq!(outcome.attempts, 1, "{code} should not be retried");
        assert_eq!(outcome.error().map(CollectorError::code), Some(code));
        assert!(outcome.total_duration < Duration::from_millis(100));
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_then_success() {
    let collector =
        MockCollector::new("redis").with_behavior("keys", Behavior::FailTimes(2, ErrorCode::Timeout));

    let outcome = with_retry(&ExecutionContext::new(), &fast_config(3), |ctx| {
        let collector = &collector;
        async move { collector.fetch_table_metadata(&ctx, "0", "", "keys").await }
    })
    .await;

    assert!(outcome.is_success());
    assert!(outcome.retried());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.value().map(|t| t.name.as_str()), Some("keys"));
    // 100ms + 200ms of backoff
    assert!(outcome.total_duration >= Duration::from_millis(300));
    assert!(outcome.total_duration < Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_context_cancelled_during_backoff() {
    let ctx = ExecutionContext::new();
    let attempts = Arc::new(AtomicU32::new(0));
    let config = RetryConfig::new(
        10,
        Duration::from_secs(10),
        Duration::from_secs(60),
        2.0,
        0.0,
    )
    .unwrap();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let counter = Arc::clone(&attempts);
    let outcome = with_retry(&ctx, &config, move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(CollectorError::network("kafka", "list_topics", "broker unreachable"))
        }
    })
    .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.attempts, 1);
    let err = outcome.error().unwrap();
    assert_eq!(err.code(), ErrorCode::Cancelled);
    assert!(outcome.total_duration < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_elapsed_during_backoff() {
    let ctx = ExecutionContext::new().with_timeout(Duration::from_millis(250));

    let outcome = with_retry(&ctx, &fast_config(5), |_ctx| async {
        Err::<(), _>(CollectorError::timeout("bigquery", "list_tables", "slow"))
    })
    .await;

    // Attempts at 0ms and 100ms; the 200ms backoff crosses the deadline.
    assert_eq!(outcome.attempts, 2);
    assert_eq!(
        outcome.error().map(CollectorError::code),
        Some(ErrorCode::DeadlineExceeded)
    );
}

#[tokio::test]
async fn test_already_cancelled_context_still_makes_one_attempt() {
    let ctx = ExecutionContext::new();
    ctx.cancel();
    let collector = MockCollector::new("mysql");

    let result = retry(&ctx, &fast_config(3), |ctx| {
        let collector = &collector;
        async move { collector.health_check(&ctx).await }
    })
    .await;

    assert_eq!(result.unwrap_err().code(), ErrorCode::Cancelled);
}

#[tokio::test]
async fn test_already_cancelled_context_does_not_mask_success() {
    let ctx = ExecutionContext::new();
    ctx.cancel();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let outcome = with_retry(&ctx, &fast_config(3), move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CollectorError>("done")
        }
    })
    .await;

    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.value(), Some(&"done"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_worked_example() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let value = retry(&ExecutionContext::new(), &fast_config(3), move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CollectorError::network("mysql", "connect", "connection reset"))
            } else {
                Ok(42)
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(value, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
