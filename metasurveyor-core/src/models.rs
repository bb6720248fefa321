//! Normalized metadata model shared by every collector.
//!
//! These types are what drivers return and what the downstream catalog
//! consumes. All are serializable and carry no credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of a collector health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Whether the source answered
    pub connected: bool,
    /// Round-trip time of the probe
    pub latency: Duration,
    /// Server version string, if reported
    pub version: Option<String>,
    /// Free-form detail
    pub message: Option<String>,
}

/// A top-level namespace discovered on a source (database, keyspace,
/// cluster, project, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogInfo {
    /// Catalog name
    pub catalog: String,
    /// Source-specific kind, e.g. `"database"` or `"topic_group"`
    pub catalog_type: String,
    /// Optional description
    pub description: Option<String>,
    /// Additional source-specific properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl CatalogInfo {
    /// Creates a catalog entry with no description or properties.
    pub fn new(catalog: impl Into<String>, catalog_type: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            catalog_type: catalog_type.into(),
            description: None,
            properties: BTreeMap::new(),
        }
    }
}

/// Paging and filtering for `list_tables`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTablesOptions {
    /// Opaque token from a previous page
    pub page_token: Option<String>,
    /// Maximum tables per page; `None` lets the driver decide
    pub page_size: Option<u32>,
    /// Driver-side name filter, if the source supports one
    pub filter: Option<String>,
}

impl ListTablesOptions {
    /// Builder method to set the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Builder method to set the page token.
    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    /// Builder method to set the driver-side filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// One page of table names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableListResult {
    /// Table names on this page
    pub tables: Vec<String>,
    /// Token for the next page; `None` on the last page
    pub next_page_token: Option<String>,
    /// Total matching tables, when the source can count them
    pub total_count: Option<u64>,
}

/// Kind of table-like object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    /// Regular table
    #[default]
    Table,
    /// View
    View,
    /// Materialized view
    MaterializedView,
    /// External / foreign table
    External,
    /// Message topic
    Topic,
    /// Key space or collection without a fixed schema
    Collection,
}

/// Column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Normalized type name
    pub data_type: String,
    /// Type exactly as the source reports it
    pub source_type: Option<String>,
    /// Whether NULLs are allowed
    pub nullable: bool,
    /// Part of the primary key
    pub is_primary_key: bool,
    /// 1-based position
    pub ordinal_position: u32,
    /// Default expression
    pub default_value: Option<String>,
    /// Column comment
    pub comment: Option<String>,
}

impl ColumnInfo {
    /// Creates a nullable, non-key column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal_position: u32) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            source_type: None,
            nullable: true,
            is_primary_key: false,
            ordinal_position,
            default_value: None,
            comment: None,
        }
    }
}

/// Structural metadata for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Owning catalog
    pub catalog: String,
    /// Owning schema
    pub schema: String,
    /// Table name
    pub name: String,
    /// Kind of object
    pub table_type: TableType,
    /// Columns in ordinal order
    pub columns: Vec<ColumnInfo>,
    /// Names of partitioning columns
    #[serde(default)]
    pub partition_columns: Vec<String>,
    /// Table comment
    pub comment: Option<String>,
    /// Additional source-specific properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// When the source last changed the definition, if known
    pub last_modified: Option<DateTime<Utc>>,
}

impl TableMetadata {
    /// Creates metadata for a plain table with no columns.
    pub fn new(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            name: name.into(),
            table_type: TableType::Table,
            columns: Vec::new(),
            partition_columns: Vec::new(),
            comment: None,
            properties: BTreeMap::new(),
            last_modified: None,
        }
    }

    /// Builder method to set the columns.
    pub fn with_columns(mut self, columns: Vec<ColumnInfo>) -> Self {
        self.columns = columns;
        self
    }

    /// Fully qualified `catalog.schema.name`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, self.name)
    }
}

/// Size statistics for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStatistics {
    /// Number of rows (exact or estimated, per source)
    pub row_count: u64,
    /// Bytes on disk
    pub data_size_bytes: u64,
    /// Number of partitions; 0 for unpartitioned tables
    pub partition_count: u64,
    /// When the statistics were gathered
    pub collected_at: DateTime<Utc>,
}

/// One partition of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Partition name, e.g. `dt=2024-01-01`
    pub name: String,
    /// Partition key values in partition-column order
    #[serde(default)]
    pub values: Vec<String>,
    /// Rows in the partition, if known
    pub row_count: Option<u64>,
    /// Bytes in the partition, if known
    pub data_size_bytes: Option<u64>,
    /// Creation time, if known
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_metadata_serialization() {
        let table = TableMetadata::new("sales", "public", "orders").with_columns(vec![
            ColumnInfo::new("id", "bigint", 1),
            ColumnInfo::new("total", "decimal", 2),
        ]);

        let json = serde_json::to_string(&table).unwrap();
        assert!(json.contains("\"name\":\"orders\""));
        assert!(json.contains("\"table_type\":\"table\""));

        let back: TableMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.qualified_name(), "sales.public.orders");
    }

    #[test]
    fn test_list_options_builder() {
        let options = ListTablesOptions::default()
            .with_page_size(100)
            .with_page_token("abc")
            .with_filter("orders%");
        assert_eq!(options.page_size, Some(100));
        assert_eq!(options.page_token.as_deref(), Some("abc"));
        assert_eq!(options.filter.as_deref(), Some("orders%"));
    }

    #[test]
    fn test_partition_defaults_on_deserialize() {
        let partition: PartitionInfo = serde_json::from_str(
            r#"{"name": "dt=2024-01-01", "row_count": 10, "data_size_bytes": null, "created_at": null}"#,
        )
        .unwrap();
        assert!(partition.values.is_empty());
        assert_eq!(partition.row_count, Some(10));
    }
}
