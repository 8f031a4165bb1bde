//! DataFusion-backed result backend seeded with a party's fixture table.
//!
//! Statements are rewritten so `default.<table>` resolves against the quoted
//! `"default"` schema, then executed and fully materialized. Nothing is cached
//! between calls.

use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::catalog::memory::MemTable;
use datafusion::common::DataFusionError;
use datafusion::execution::context::SQLOptions;
use datafusion::prelude::{SessionConfig, SessionContext};
use regex::Regex;
use thiserror::Error;
use tracing::info;

use crate::party::Party;

pub const DEFAULT_CATALOG: &str = "datafusion";
pub const DEFAULT_SCHEMA: &str = "default";

static DEFAULT_SCHEMA_REF: OnceLock<Regex> = OnceLock::new();

/// Failure reported by the SQL engine for one statement.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    Execution(String),
}

impl From<DataFusionError> for QueryError {
    fn from(err: DataFusionError) -> Self {
        Self::Execution(err.to_string())
    }
}

/// Materialized output of one statement.
#[derive(Debug, Clone)]
pub struct ColumnarResult {
    /// Result schema; present even when no rows were produced.
    pub schema: SchemaRef,
    /// Result batches in engine output order.
    pub batches: Vec<RecordBatch>,
    /// Total row count across `batches`.
    pub num_rows: usize,
}

/// Rewrites unquoted `default.<ident>` references to `"default".<ident>`.
///
/// Plain textual substitution: it will also touch matching text inside string
/// literals or comments. Applying it twice is a no-op.
pub fn rewrite_default_schema(command: &str) -> String {
    let pattern = DEFAULT_SCHEMA_REF.get_or_init(|| {
        Regex::new(r"(?i)\bdefault\.(\w+)").expect("default schema pattern is valid")
    });
    pattern
        .replace_all(command, r#""default".${1}"#)
        .into_owned()
}

/// SQL engine holding one party's seeded table.
pub struct ResultBackend {
    session_context: SessionContext,
}

impl ResultBackend {
    /// Creates an engine and registers the party's fixture table.
    pub fn seeded(party: Party) -> Result<Self> {
        let session_context = SessionContext::new_with_config(fixture_session_config());
        let batch = party.seed_batch()?;
        let num_rows = batch.num_rows();
        let table = MemTable::try_new(batch.schema(), vec![vec![batch]])
            .with_context(|| format!("build memory table {}", party.table_name()))?;
        session_context
            .register_table(party.table_name(), Arc::new(table))
            .with_context(|| format!("register table {}", party.table_name()))?;

        info!(
            party = %party,
            table = party.table_name(),
            rows = num_rows,
            "seeded fixture table"
        );
        Ok(Self { session_context })
    }

    /// Rewrites, runs, and collects one statement.
    pub async fn execute(&self, command: &str) -> Result<ColumnarResult, QueryError> {
        let sql = rewrite_default_schema(command);
        let frame = self
            .session_context
            .sql_with_options(&sql, read_only_sql_options())
            .await?;
        let schema = Arc::clone(frame.schema().inner());
        let batches = frame.collect().await?;
        let num_rows = batches.iter().map(RecordBatch::num_rows).sum();
        Ok(ColumnarResult {
            schema,
            batches,
            num_rows,
        })
    }

    /// Returns only the result shape of a statement.
    ///
    /// Fixture tables are tiny, so this runs the full statement and drops the rows.
    pub async fn execute_schema_only(
        &self,
        command: &str,
    ) -> Result<(SchemaRef, usize), QueryError> {
        let result = self.execute(command).await?;
        Ok((result.schema, result.num_rows))
    }

    /// Lists table names registered in the `default` schema, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names = self
            .session_context
            .catalog(DEFAULT_CATALOG)
            .and_then(|catalog| catalog.schema(DEFAULT_SCHEMA))
            .map(|schema| schema.table_names())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Runs a zero-row probe against `table` to obtain its schema.
    pub async fn probe_schema(&self, table: &str) -> Result<SchemaRef, QueryError> {
        let probe = format!("SELECT * FROM {DEFAULT_SCHEMA}.{table} LIMIT 0");
        Ok(self.execute(&probe).await?.schema)
    }
}

/// Session settings for deterministic fixture queries.
///
/// Identifier normalization is off so the mixed-case `ID` column resolves
/// exactly as written by clients. Matching is case-sensitive as a result:
/// `id` or `Id` does not resolve to `ID`.
fn fixture_session_config() -> SessionConfig {
    SessionConfig::new()
        .with_default_catalog_and_schema(DEFAULT_CATALOG, DEFAULT_SCHEMA)
        .with_create_default_catalog_and_schema(true)
        .with_information_schema(true)
        .with_target_partitions(1)
        .set_bool("datafusion.sql_parser.enable_ident_normalization", false)
}

/// Only queries are accepted; the fixture data is immutable.
fn read_only_sql_options() -> SQLOptions {
    SQLOptions::new()
        .with_allow_ddl(false)
        .with_allow_dml(false)
        .with_allow_statements(false)
}
