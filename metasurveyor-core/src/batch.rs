//! Multi-item collection that tolerates per-item failure.
//!
//! A [`BatchCollector`] fans one logical request ("metadata for these 500
//! tables") out into per-item driver calls. Every item ends up either in
//! [`PartialResult::results`] or as a [`FailureItem`]; a failing item never
//! aborts the batch.
//!
//! # Features
//! - Input order preserved in both results and failures
//! - Context polled before every item; items reached after cancellation are
//!   recorded as CANCELLED / DEADLINE_EXCEEDED without calling the driver
//! - Optional name filtering through a [`Matcher`]

use crate::collector::Collector;
use crate::context::{ExecutionContext, check_context};
use crate::error::{CollectorError, ErrorCode, Result, error_code};
use crate::matching::Matcher;
use crate::models::{ListTablesOptions, TableMetadata};
use crate::statistics::{StatisticsOutcome, fetch_table_statistics_with_timeout};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Page size used when listing tables for a filtered batch.
pub const DEFAULT_LIST_PAGE_SIZE: u32 = 500;

/// Why one item of a batch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureItem {
    /// Identifier of the failed item (usually a table name)
    pub item: String,
    /// Rendered error message
    pub error: String,
    /// Taxonomy code; `None` if the error was not classified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

impl FailureItem {
    /// Builds a failure record from any error, classifying it if possible.
    pub fn from_error(item: impl Into<String>, err: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            item: item.into(),
            error: err.to_string(),
            error_code: error_code(err),
        }
    }
}

/// Successes and per-item failures of one batch call.
///
/// Counters are maintained by [`add_result`](Self::add_result) and
/// [`add_failure`](Self::add_failure) only, so
/// `total_count == success_count + failure_count`,
/// `success_count == results().len()` and
/// `failure_count == failures().len()` always hold.
#[derive(Debug, Clone, Serialize)]
pub struct PartialResult<T> {
    results: Vec<T>,
    failures: Vec<FailureItem>,
    total_count: usize,
    success_count: usize,
    failure_count: usize,
}

impl<T> Default for PartialResult<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            failures: Vec::new(),
            total_count: 0,
            success_count: 0,
            failure_count: 0,
        }
    }
}

impl<T> PartialResult<T> {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty result sized for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Records a success.
    pub fn add_result(&mut self, value: T) {
        self.results.push(value);
        self.success_count += 1;
        self.total_count += 1;
    }

    /// Records a failure.
    pub fn add_failure(&mut self, failure: FailureItem) {
        self.failures.push(failure);
        self.failure_count += 1;
        self.total_count += 1;
    }

    /// Appends everything from `other`, preserving its order.
    pub fn merge(&mut self, other: PartialResult<T>) {
        let (results, failures) = other.into_parts();
        for value in results {
            self.add_result(value);
        }
        for failure in failures {
            self.add_failure(failure);
        }
    }

    /// Successful values in input order.
    pub fn results(&self) -> &[T] {
        &self.results
    }

    /// Failures in input order.
    pub fn failures(&self) -> &[FailureItem] {
        &self.failures
    }

    /// Items processed.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Items that succeeded.
    pub fn success_count(&self) -> usize {
        self.success_count
    }

    /// Items that failed.
    pub fn failure_count(&self) -> usize {
        self.failure_count
    }

    /// At least one item failed.
    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }

    /// No item failed.
    pub fn is_complete(&self) -> bool {
        self.failure_count == 0
    }

    /// Fraction of items that succeeded; 1.0 for an empty batch.
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            1.0
        } else {
            self.success_count as f64 / self.total_count as f64
        }
    }

    /// Splits into successes and failures.
    pub fn into_parts(self) -> (Vec<T>, Vec<FailureItem>) {
        (self.results, self.failures)
    }
}

/// Runs per-item collector calls for one catalog/schema.
///
/// Uses a single collector serially. To collect several sources in
/// parallel, run one `BatchCollector` per collector in separate tasks.
pub struct BatchCollector<'a> {
    collector: &'a dyn Collector,
    source: String,
}

impl std::fmt::Debug for BatchCollector<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCollector")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<'a> BatchCollector<'a> {
    /// Wraps `collector`, attributing engine-side errors to `source`.
    pub fn new(collector: &'a dyn Collector, source: impl Into<String>) -> Self {
        Self {
            collector,
            source: source.into(),
        }
    }

    /// Source label used in engine-side errors.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Fetches metadata for every table in `tables`.
    ///
    /// Never fails as a whole: each table ends up in the results or in the
    /// failures of the returned [`PartialResult`]. Once `ctx` ends, the
    /// remaining tables are recorded without a driver call, coded as
    /// [`check_context`] reports: CANCELLED or DEADLINE_EXCEEDED.
    pub async fn fetch_all_table_metadata<S>(
        &self,
        ctx: &ExecutionContext,
        catalog: &str,
        schema: &str,
        tables: &[S],
    ) -> PartialResult<TableMetadata>
    where
        S: AsRef<str>,
    {
        let collector = self.collector;
        self.collect_each(ctx, "fetch_table_metadata", tables, move |table| async move {
            collector
                .fetch_table_metadata(ctx, catalog, schema, &table)
                .await
        })
        .await
    }

    /// Fetches statistics for every table in `tables`, each under the soft
    /// budget `timeout` (see [`fetch_table_statistics_with_timeout`]).
    ///
    /// Soft timeouts are successes with a partial outcome; only hard errors
    /// become failures.
    pub async fn fetch_all_table_statistics<S>(
        &self,
        ctx: &ExecutionContext,
        catalog: &str,
        schema: &str,
        tables: &[S],
        timeout: Duration,
    ) -> PartialResult<StatisticsOutcome>
    where
        S: AsRef<str>,
    {
        let collector = self.collector;
        let source = self.source.as_str();
        self.collect_each(ctx, "fetch_table_statistics", tables, move |table| async move {
            fetch_table_statistics_with_timeout(
                ctx, collector, catalog, schema, &table, timeout, source,
            )
            .await
        })
        .await
    }

    /// Lists every table in `catalog.schema`, keeps those accepted by
    /// `matcher`, and fetches their metadata.
    ///
    /// # Errors
    /// Fails only if listing fails; per-table failures are reported in the
    /// returned [`PartialResult`].
    pub async fn fetch_matching_table_metadata(
        &self,
        ctx: &ExecutionContext,
        catalog: &str,
        schema: &str,
        matcher: &Matcher,
    ) -> Result<PartialResult<TableMetadata>> {
        let tables = self.list_all_tables(ctx, catalog, schema).await?;
        let discovered = tables.len();
        let selected = matcher.filter(tables);

        tracing::debug!(
            source = %self.source,
            catalog,
            schema,
            discovered,
            selected = selected.len(),
            "filtered table list"
        );

        Ok(self
            .fetch_all_table_metadata(ctx, catalog, schema, &selected)
            .await)
    }

    async fn list_all_tables(
        &self,
        ctx: &ExecutionContext,
        catalog: &str,
        schema: &str,
    ) -> Result<Vec<String>> {
        let mut tables = Vec::new();
        let mut options = ListTablesOptions::default().with_page_size(DEFAULT_LIST_PAGE_SIZE);

        loop {
            check_context(ctx, &self.source, "list_tables")?;
            let page = self
                .collector
                .list_tables(ctx, catalog, schema, &options)
                .await?;
            tables.extend(page.tables);

            match page.next_page_token {
                Some(token) if !token.is_empty() => {
                    if options.page_token.as_deref() == Some(token.as_str()) {
                        return Err(CollectorError::parse(
                            self.source.as_str(),
                            "list_tables",
                            "driver returned the same page token twice",
                        ));
                    }
                    options.page_token = Some(token);
                }
                _ => return Ok(tables),
            }
        }
    }

    async fn collect_each<S, T, F, Fut>(
        &self,
        ctx: &ExecutionContext,
        operation: &str,
        items: &[S],
        mut fetch: F,
    ) -> PartialResult<T>
    where
        S: AsRef<str>,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut result = PartialResult::with_capacity(items.len());

        tracing::info!(
            source = %self.source,
            operation,
            items = items.len(),
            "starting batch collection"
        );

        for item in items {
            let item = item.as_ref();

            if let Err(err) = check_context(ctx, &self.source, operation) {
                result.add_failure(FailureItem::from_error(item, &err));
                continue;
            }

            match fetch(item.to_string()).await {
                Ok(value) => result.add_result(value),
                Err(err) => {
                    tracing::warn!(
                        source = %self.source,
                        operation,
                        item,
                        code = %err.code(),
                        "item collection failed: {}",
                        err
                    );
                    result.add_failure(FailureItem::from_error(item, &err));
                }
            }
        }

        tracing::info!(
            source = %self.source,
            operation,
            succeeded = result.success_count(),
            failed = result.failure_count(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "batch collection finished"
        );

        result
    }
}
