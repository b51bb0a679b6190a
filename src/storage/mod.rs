//! Tabular persistence seam consumed by the version engine.
//!
//! The engine only ever speaks in terms of tables, named columns and
//! equality predicates. Each backend implements [`PersistenceAdapter`] and
//! decides for itself how much atomicity `commit`/`abort` actually provide.

mod memory;
pub mod schema;
mod sqlite;

use std::fmt;

use thiserror::Error;

pub use memory::{MemoryAdapter, TransactionCounters};
pub use sqlite::SqliteAdapter;

/// Errors produced by persistence adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error surfaced by the SQLite driver.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Table or column name contains characters outside `[a-z0-9_]`.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// A projected column is absent from a result row.
    #[error("column {0} missing from result row")]
    MissingColumn(String),
    /// A column held a value of an unexpected type.
    #[error("column {column} holds {found}, expected {expected}")]
    TypeMismatch {
        /// Column that was read.
        column: String,
        /// Type the caller asked for.
        expected: &'static str,
        /// Type actually stored.
        found: &'static str,
    },
    /// The backend rejected the write, e.g. a duplicate key.
    #[error("constraint violation on {table}: {message}")]
    Constraint {
        /// Table the write targeted.
        table: String,
        /// Backend message.
        message: String,
    },
}

/// Column value exchanged with an adapter.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Signed integer; ids are stored this way.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
    /// Boolean, stored as 0 or 1 by SQLite.
    Boolean(bool),
}

impl Value {
    /// Name used in type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
        }
    }

    /// Equality as used by `equality_select`: NULL never matches.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Boolean(a), Value::Integer(b)) | (Value::Integer(b), Value::Boolean(a)) => {
                i64::from(*a) == *b
            }
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        // Ids are allocated far below i64::MAX.
        Value::Integer(value as i64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// `(column, value)` pair used for inserted columns and predicates alike.
pub type Column<'a> = (&'a str, Value);

/// One result row with typed column access.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Row from `(column, value)` pairs.
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Raw value of `column`, if projected.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    fn require(&self, column: &str) -> Result<&Value, StorageError> {
        self.get(column)
            .ok_or_else(|| StorageError::MissingColumn(column.to_string()))
    }

    /// Non-null, non-negative integer.
    pub fn get_u64(&self, column: &str) -> Result<u64, StorageError> {
        self.get_opt_u64(column)?.ok_or_else(|| StorageError::TypeMismatch {
            column: column.to_string(),
            expected: "integer",
            found: "null",
        })
    }

    /// Non-negative integer or `NULL`.
    pub fn get_opt_u64(&self, column: &str) -> Result<Option<u64>, StorageError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Integer(v) => u64::try_from(*v).map(Some).map_err(|_| {
                StorageError::TypeMismatch {
                    column: column.to_string(),
                    expected: "non-negative integer",
                    found: "negative integer",
                }
            }),
            other => Err(mismatch(column, "integer", other)),
        }
    }

    /// Non-null text.
    pub fn get_str(&self, column: &str) -> Result<&str, StorageError> {
        self.get_opt_str(column)?.ok_or_else(|| StorageError::TypeMismatch {
            column: column.to_string(),
            expected: "text",
            found: "null",
        })
    }

    /// Text or `NULL`.
    pub fn get_opt_str(&self, column: &str) -> Result<Option<&str>, StorageError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Text(v) => Ok(Some(v.as_str())),
            other => Err(mismatch(column, "text", other)),
        }
    }

    /// Boolean, accepting SQLite's integer encoding.
    pub fn get_bool(&self, column: &str) -> Result<bool, StorageError> {
        match self.require(column)? {
            Value::Boolean(v) => Ok(*v),
            Value::Integer(v) => Ok(*v != 0),
            other => Err(mismatch(column, "boolean", other)),
        }
    }

    /// Columns in projection order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

fn mismatch(column: &str, expected: &'static str, found: &Value) -> StorageError {
    StorageError::TypeMismatch {
        column: column.to_string(),
        expected,
        found: found.type_name(),
    }
}

/// Result of an equality select. An empty set is a normal outcome.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rows(Vec<Row>);

impl Rows {
    /// Wraps already materialized rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self(rows)
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// First row, if any.
    pub fn first(&self) -> Option<&Row> {
        self.0.first()
    }

    /// Rows in backend order.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.0.iter()
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Rows {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Physical storage contract used by the engine.
///
/// `commit` and `abort` bound the current unit of work. Backends without
/// multi-statement atomicity may treat them as no-ops; callers still invoke
/// them uniformly.
pub trait PersistenceAdapter: Send + Sync {
    /// Inserts one row.
    fn insert(&self, table: &str, columns: &[Column<'_>]) -> Result<(), StorageError>;

    /// Selects rows whose columns equal every predicate. An empty
    /// `projection` returns all columns.
    fn equality_select(
        &self,
        table: &str,
        projection: &[&str],
        predicates: &[Column<'_>],
    ) -> Result<Rows, StorageError>;

    /// Returns the number of rows changed.
    fn update(
        &self,
        set: &[Column<'_>],
        predicates: &[Column<'_>],
        table: &str,
    ) -> Result<u64, StorageError>;

    /// Returns the number of rows removed.
    fn delete(&self, predicates: &[Column<'_>], table: &str) -> Result<u64, StorageError>;

    /// Makes the current unit of work durable.
    fn commit(&self) -> Result<(), StorageError>;

    /// Discards the current unit of work where the backend can.
    fn abort(&self) -> Result<(), StorageError>;

    /// Short backend name used in log events.
    fn name(&self) -> &'static str;
}

pub(crate) fn check_identifier(ident: &str) -> Result<(), StorageError> {
    let valid = !ident.is_empty()
        && ident
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier(ident.to_string()))
    }
}
