//! Fault-tolerant metadata collection engine for MetaSurveyor.
//!
//! This crate sits between a catalog service and the source-specific
//! drivers (relational, key-value, message-queue, warehouse). Drivers
//! implement [`Collector`]; the engine adds what every driver needs:
//!
//! - a classified error taxonomy ([`CollectorError`], [`ErrorCode`])
//! - cancellation and deadlines ([`ExecutionContext`])
//! - bounded exponential backoff ([`with_retry`])
//! - include/exclude name filtering ([`Matcher`])
//! - continue-on-error batch collection ([`BatchCollector`], [`PartialResult`])
//! - soft-timeout statistics ([`fetch_table_statistics_with_timeout`])
//!
//! # Security Guarantees
//! - No credentials stored or logged in any data structures
//! - Connection URLs are redacted before they reach an error message
//! - All collector operations are read-only

pub mod batch;
pub mod collector;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod matching;
pub mod models;
pub mod registry;
pub mod retry;
pub mod statistics;

// Re-export commonly used types
pub use batch::{BatchCollector, DEFAULT_LIST_PAGE_SIZE, FailureItem, PartialResult};
pub use collector::Collector;
pub use config::{ConnectionConfig, EngineConfig};
pub use context::{ContextEnd, ExecutionContext, check_context, wrap_context_error};
pub use error::{CollectorError, ErrorCode, Result, SourceCategory, redact_url};
pub use matching::{CompiledMatching, Matcher, MatchingConfig, MatchingRule, PatternType};
pub use models::{
    CatalogInfo, ColumnInfo, HealthStatus, ListTablesOptions, PartitionInfo, TableListResult,
    TableMetadata, TableStatistics, TableType,
};
pub use registry::{CollectorFactory, CollectorRegistry};
pub use retry::{RetryConfig, RetryOutcome, retry, with_retry};
pub use statistics::{StatisticsOutcome, fetch_table_statistics_with_timeout, statistics_timeout};
