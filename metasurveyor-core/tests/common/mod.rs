//! Shared test fixtures: a scriptable in-memory collector.

#![allow(dead_code)]

use async_trait::async_trait;
use metasurveyor_core::{
    CatalogInfo, Collector, CollectorError, ErrorCode, ExecutionContext, HealthStatus,
    ListTablesOptions, Result, TableListResult, TableMetadata, TableStatistics, check_context,
    wrap_context_error,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How the mock answers for one table.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Answer immediately
    Succeed,
    /// Always fail with this code
    Fail(ErrorCode),
    /// Fail this many times with the code, then succeed
    FailTimes(u32, ErrorCode),
    /// Answer after the delay, giving up if the context ends first
    Delay(Duration),
    /// Answer after the delay without looking at the context
    IgnoreContext(Duration),
}

/// Scriptable collector. Tables without a behavior succeed.
pub struct MockCollector {
    source: String,
    tables: Vec<String>,
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<HashMap<String, u32>>,
    total_calls: AtomicUsize,
    repeat_page_token: bool,
    max_page_size: Option<usize>,
}

impl MockCollector {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            tables: Vec::new(),
            behaviors: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            total_calls: AtomicUsize::new(0),
            repeat_page_token: false,
            max_page_size: None,
        }
    }

    /// Tables returned by `list_tables`.
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_behavior(self, table: &str, behavior: Behavior) -> Self {
        self.behaviors
            .lock()
            .unwrap()
            .insert(table.to_string(), behavior);
        self
    }

    /// Makes `list_tables` hand back the token it was given.
    pub fn with_repeating_page_token(mut self) -> Self {
        self.repeat_page_token = true;
        self
    }

    /// Caps pages below whatever the caller asks for.
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = Some(size);
        self
    }

    /// Driver calls made for `table`.
    pub fn calls_for(&self, table: &str) -> u32 {
        self.calls.lock().unwrap().get(table).copied().unwrap_or(0)
    }

    /// Driver calls made across all tables.
    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, ctx: &ExecutionContext, operation: &str, table: &str) -> Result<()> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(table.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or(Behavior::Succeed);

        match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail(code) => Err(error_for(code, &self.source, operation, table)),
            Behavior::FailTimes(times, code) if call <= times => {
                Err(error_for(code, &self.source, operation, table))
            }
            Behavior::FailTimes(..) => Ok(()),
            Behavior::Delay(delay) => {
                if ctx.run_until_done(tokio::time::sleep(delay)).await.is_err() {
                    let err = CollectorError::query(&self.source, operation, "query interrupted");
                    return Err(wrap_context_error(ctx, err, &self.source, operation));
                }
                Ok(())
            }
            Behavior::IgnoreContext(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

pub fn error_for(code: ErrorCode, source: &str, operation: &str, table: &str) -> CollectorError {
    CollectorError::new(code, source, operation, format!("scripted failure for {table}"))
}

pub fn statistics(row_count: u64) -> TableStatistics {
    TableStatistics {
        row_count,
        data_size_bytes: row_count * 100,
        partition_count: 0,
        collected_at: chrono::Utc::now(),
    }
}

#[async_trait]
impl Collector for MockCollector {
    fn source(&self) -> &str {
        &self.source
    }

    async fn connect(&self, ctx: &ExecutionContext) -> Result<()> {
        check_context(ctx, &self.source, "connect")
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self, ctx: &ExecutionContext) -> Result<HealthStatus> {
        check_context(ctx, &self.source, "health_check")?;
        Ok(HealthStatus {
            connected: true,
            latency: Duration::from_millis(1),
            version: Some("mock-1.0".to_string()),
            message: None,
        })
    }

    async fn discover_catalogs(&self, ctx: &ExecutionContext) -> Result<Vec<CatalogInfo>> {
        check_context(ctx, &self.source, "discover_catalogs")?;
        Ok(vec![CatalogInfo::new("main", "database")])
    }

    async fn list_schemas(&self, ctx: &ExecutionContext, _catalog: &str) -> Result<Vec<String>> {
        check_context(ctx, &self.source, "list_schemas")?;
        Ok(vec!["public".to_string()])
    }

    async fn list_tables(
        &self,
        ctx: &ExecutionContext,
        _catalog: &str,
        _schema: &str,
        options: &ListTablesOptions,
    ) -> Result<TableListResult> {
        check_context(ctx, &self.source, "list_tables")?;

        let start: usize = options
            .page_token
            .as_deref()
            .map_or(0, |token| token.parse().unwrap());
        let requested = options.page_size.map_or(usize::MAX, |size| size.max(1) as usize);
        let page_size = self.max_page_size.map_or(requested, |max| requested.min(max));
        let end = start.saturating_add(page_size).min(self.tables.len());

        let next_page_token = if self.repeat_page_token {
            Some(options.page_token.clone().unwrap_or_else(|| "0".to_string()))
        } else if end < self.tables.len() {
            Some(end.to_string())
        } else {
            None
        };

        Ok(TableListResult {
            tables: self.tables[start..end].to_vec(),
            next_page_token,
            total_count: Some(self.tables.len() as u64),
        })
    }

    async fn fetch_table_metadata(
        &self,
        ctx: &ExecutionContext,
        catalog: &str,
        schema: &str,
        table: &str,
    ) -> Result<TableMetadata> {
        check_context(ctx, &self.source, "fetch_table_metadata")?;
        self.answer(ctx, "fetch_table_metadata", table).await?;
        Ok(TableMetadata::new(catalog, schema, table))
    }

    async fn fetch_table_statistics(
        &self,
        ctx: &ExecutionContext,
        _catalog: &str,
        _schema: &str,
        table: &str,
    ) -> Result<TableStatistics> {
        check_context(ctx, &self.source, "fetch_table_statistics")?;
        self.answer(ctx, "fetch_table_statistics", table).await?;
        Ok(statistics(42))
    }
}
