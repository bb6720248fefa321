//! Bounded-time table statistics collection.
//!
//! Statistics queries (row counts, sizes) can be arbitrarily slow on large
//! sources. [`fetch_table_statistics_with_timeout`] imposes a soft budget: if
//! the budget runs out while the caller is still waiting, the call succeeds
//! with a partial outcome instead of failing. Cancellation or a deadline
//! coming from the caller's own context is still a hard error.

use crate::collector::Collector;
use crate::context::{ExecutionContext, wrap_context_error};
use crate::error::Result;
use crate::models::TableStatistics;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

const STATISTICS_OPERATION: &str = "fetch_table_statistics";

/// Statistics plus how completely they were collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsOutcome {
    /// Collected statistics; `None` when the soft budget ran out
    pub statistics: Option<TableStatistics>,
    /// The statistics are missing or incomplete
    pub is_partial: bool,
    /// The soft budget elapsed before the source answered
    pub timeout_reached: bool,
    /// Explanation when the outcome is degraded
    pub warning: Option<String>,
    /// Time spent waiting for the source
    pub collection_duration: Duration,
}

impl StatisticsOutcome {
    fn complete(statistics: TableStatistics, collection_duration: Duration) -> Self {
        Self {
            statistics: Some(statistics),
            is_partial: false,
            timeout_reached: false,
            warning: None,
            collection_duration,
        }
    }

    fn soft_timeout(warning: String, collection_duration: Duration) -> Self {
        Self {
            statistics: None,
            is_partial: true,
            timeout_reached: true,
            warning: Some(warning),
            collection_duration,
        }
    }
}

/// Converts a configured number of seconds into a statistics budget.
///
/// Zero or negative values mean "no timeout" and map to [`Duration::ZERO`].
pub fn statistics_timeout(seconds: i64) -> Duration {
    u64::try_from(seconds).map_or(Duration::ZERO, Duration::from_secs)
}

/// Fetches statistics for one table under a soft time budget.
///
/// - `timeout` of zero: the call runs under `ctx` alone.
/// - Otherwise the call runs under a child of `ctx` bounded by `timeout`.
///   If only that bound elapses, the result is `Ok` with
///   `timeout_reached` and `is_partial` set and a warning attached. The
///   wait ends at the bound even if the driver ignores its context.
///
/// # Errors
/// - `CANCELLED` / `DEADLINE_EXCEEDED` when `ctx` itself ends, regardless of
///   `timeout`.
/// - Any driver error that is not caused by the soft bound.
pub async fn fetch_table_statistics_with_timeout(
    ctx: &ExecutionContext,
    collector: &dyn Collector,
    catalog: &str,
    schema: &str,
    table: &str,
    timeout: Duration,
    source: &str,
) -> Result<StatisticsOutcome> {
    let started = Instant::now();

    if timeout.is_zero() {
        let call = collector.fetch_table_statistics(ctx, catalog, schema, table);
        return match ctx.run_until_done(call).await {
            Ok(Ok(statistics)) => Ok(StatisticsOutcome::complete(statistics, started.elapsed())),
            Ok(Err(err)) => Err(wrap_context_error(ctx, err, source, STATISTICS_OPERATION)),
            Err(end) => Err(end.into_error(source, STATISTICS_OPERATION)),
        };
    }

    let bounded = ctx.with_timeout(timeout);
    let _release = bounded.cancel_on_drop();

    let call = collector.fetch_table_statistics(&bounded, catalog, schema, table);
    let driver_error = match bounded.run_until_done(call).await {
        Ok(Ok(statistics)) => {
            return Ok(StatisticsOutcome::complete(statistics, started.elapsed()));
        }
        Ok(Err(err)) => Some(err),
        Err(_) => None,
    };

    // The caller's context is checked first: its end is never softened.
    if let Some(end) = ctx.end() {
        let err = match driver_error {
            Some(err) => wrap_context_error(ctx, err, source, STATISTICS_OPERATION),
            None => end.into_error(source, STATISTICS_OPERATION),
        };
        tracing::debug!(
            source,
            table,
            code = %err.code(),
            "statistics collection stopped by caller"
        );
        return Err(err);
    }

    match driver_error {
        Some(err) if !bounded.is_done() => Err(err),
        _ => {
            let elapsed = started.elapsed();
            let warning = format!(
                "statistics collection for {catalog}.{schema}.{table} exceeded {timeout:?}; \
                 returning partial result"
            );
            tracing::warn!(
                source,
                catalog,
                schema,
                table,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "statistics soft timeout reached"
            );
            Ok(StatisticsOutcome::soft_timeout(warning, elapsed))
        }
    }
}
