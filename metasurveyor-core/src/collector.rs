//! The capability contract every source driver implements.
//!
//! The engine depends only on [`Collector`]; relational, key-value,
//! message-queue and warehouse drivers are external implementations of it.
//!
//! # Contract for implementors
//! - Every call receives the caller's [`ExecutionContext`] and must check it
//!   between blocking steps (see [`crate::context::check_context`]).
//! - Failures are returned as classified [`CollectorError`]s so the retry,
//!   batch and statistics layers can act on them.
//! - An instance is used serially within one batch; concurrent use is only
//!   safe if the driver documents it.
//!
//! [`CollectorError`]: crate::error::CollectorError

use crate::context::ExecutionContext;
use crate::error::{Result, SourceCategory};
use crate::models::{
    CatalogInfo, HealthStatus, ListTablesOptions, PartitionInfo, TableListResult, TableMetadata,
    TableStatistics,
};
use async_trait::async_trait;

/// Metadata collection capability for one external data source.
///
/// # Object Safety
/// This trait is object-safe, allowing for dynamic dispatch through
/// `Box<dyn Collector>` or `Arc<dyn Collector>`.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Driver name used to attribute errors, e.g. `"mysql"`.
    fn source(&self) -> &str;

    /// Source family. Defaults to inference from [`Collector::source`].
    fn category(&self) -> SourceCategory {
        SourceCategory::infer(self.source())
    }

    /// Opens the underlying connection.
    ///
    /// # Errors
    /// `AUTH`, `NETWORK`, `TIMEOUT` or `INVALID_CONFIG` depending on cause.
    async fn connect(&self, ctx: &ExecutionContext) -> Result<()>;

    /// Releases the underlying connection. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Probes the source without collecting anything.
    async fn health_check(&self, ctx: &ExecutionContext) -> Result<HealthStatus>;

    /// Lists top-level catalogs.
    async fn discover_catalogs(&self, ctx: &ExecutionContext) -> Result<Vec<CatalogInfo>>;

    /// Lists schemas within `catalog`.
    async fn list_schemas(&self, ctx: &ExecutionContext, catalog: &str) -> Result<Vec<String>>;

    /// Lists one page of tables within `catalog.schema`.
    async fn list_tables(
        &self,
        ctx: &ExecutionContext,
        catalog: &str,
        schema: &str,
        options: &ListTablesOptions,
    ) -> Result<TableListResult>;

    /// Fetches structural metadata for one table.
    ///
    /// # Errors
    /// `NOT_FOUND` if the table does not exist.
    async fn fetch_table_metadata(
        &self,
        ctx: &ExecutionContext,
        catalog: &str,
        schema: &str,
        table: &str,
    ) -> Result<TableMetadata>;

    /// Fetches size statistics for one table. May be slow.
    async fn fetch_table_statistics(
        &self,
        ctx: &ExecutionContext,
        catalog: &str,
        schema: &str,
        table: &str,
    ) -> Result<TableStatistics>;

    /// Lists partitions of one table.
    ///
    /// # Default Implementation
    /// Returns an empty vector (unpartitioned source).
    async fn fetch_partitions(
        &self,
        _ctx: &ExecutionContext,
        _catalog: &str,
        _schema: &str,
        _table: &str,
    ) -> Result<Vec<PartitionInfo>> {
        Ok(Vec::new())
    }
}
