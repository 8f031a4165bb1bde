//! Party identities and the fixture table each one serves.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use datafusion::arrow::array::{ArrayRef, Int32Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;

pub const USER_CREDIT_TABLE_NAME: &str = "user_credit";
pub const USER_STATS_TABLE_NAME: &str = "user_stats";

/// `(ID, credit_rank, income, age)` rows served by alice.
const USER_CREDIT_ROWS: &[(&str, i32, i32, i32)] = &[
    ("id0001", 6, 100000, 20),
    ("id0002", 5, 90000, 19),
    ("id0003", 6, 89700, 32),
    ("id0005", 6, 607000, 30),
    ("id0006", 5, 30070, 25),
    ("id0007", 6, 12070, 28),
    ("id0008", 6, 200800, 50),
    ("id0009", 6, 607000, 30),
    ("id0010", 5, 30070, 25),
    ("id0011", 5, 12070, 28),
    ("id0012", 6, 200800, 50),
    ("id0013", 5, 30070, 25),
    ("id0014", 5, 12070, 28),
    ("id0015", 6, 200800, 18),
    ("id0016", 5, 30070, 26),
    ("id0017", 5, 12070, 27),
    ("id0018", 6, 200800, 16),
    ("id0019", 6, 30070, 25),
    ("id0020", 5, 12070, 28),
];

/// `(ID, order_amount, is_active)` rows served by bob.
const USER_STATS_ROWS: &[(&str, i32, i32)] = &[
    ("id0001", 5000, 1),
    ("id0002", 3000, 1),
    ("id0003", 8000, 0),
    ("id0005", 12000, 1),
    ("id0006", 1500, 1),
    ("id0007", 2500, 0),
    ("id0008", 9500, 1),
    ("id0009", 7000, 1),
    ("id0010", 500, 0),
    ("id0011", 3500, 1),
    ("id0012", 15000, 1),
    ("id0013", 2000, 0),
    ("id0014", 4500, 1),
    ("id0015", 6500, 1),
    ("id0016", 1000, 0),
    ("id0017", 8500, 1),
    ("id0018", 11000, 1),
    ("id0019", 3200, 1),
    ("id0020", 7500, 0),
];

/// Logical participant a server instance represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Party {
    Alice,
    Bob,
}

impl Party {
    /// Lowercase tag used in tickets and log fields.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Alice => "alice",
            Self::Bob => "bob",
        }
    }

    /// Name of the single table seeded for this party.
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Alice => USER_CREDIT_TABLE_NAME,
            Self::Bob => USER_STATS_TABLE_NAME,
        }
    }

    /// Builds the fixture batch for this party's table.
    pub fn seed_batch(self) -> Result<RecordBatch> {
        let (schema, columns) = match self {
            Self::Alice => user_credit_columns(),
            Self::Bob => user_stats_columns(),
        };
        RecordBatch::try_new(schema, columns)
            .with_context(|| format!("build {} fixture batch", self.table_name()))
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Party {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "alice" => Ok(Self::Alice),
            "bob" => Ok(Self::Bob),
            other => Err(anyhow!("unknown party {other:?}; expected alice or bob")),
        }
    }
}

fn user_credit_columns() -> (SchemaRef, Vec<ArrayRef>) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("ID", DataType::Utf8, false),
        Field::new("credit_rank", DataType::Int32, true),
        Field::new("income", DataType::Int32, true),
        Field::new("age", DataType::Int32, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            USER_CREDIT_ROWS.iter().map(|row| row.0),
        )),
        Arc::new(Int32Array::from_iter_values(
            USER_CREDIT_ROWS.iter().map(|row| row.1),
        )),
        Arc::new(Int32Array::from_iter_values(
            USER_CREDIT_ROWS.iter().map(|row| row.2),
        )),
        Arc::new(Int32Array::from_iter_values(
            USER_CREDIT_ROWS.iter().map(|row| row.3),
        )),
    ];
    (schema, columns)
}

fn user_stats_columns() -> (SchemaRef, Vec<ArrayRef>) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("ID", DataType::Utf8, false),
        Field::new("order_amount", DataType::Int32, true),
        Field::new("is_active", DataType::Int32, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            USER_STATS_ROWS.iter().map(|row| row.0),
        )),
        Arc::new(Int32Array::from_iter_values(
            USER_STATS_ROWS.iter().map(|row| row.1),
        )),
        Arc::new(Int32Array::from_iter_values(
            USER_STATS_ROWS.iter().map(|row| row.2),
        )),
    ];
    (schema, columns)
}
