use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};
use tracing::{debug, warn};

use super::schema::{ID_TABLES, SQLITE_SCHEMA};
use super::{check_identifier, Column, PersistenceAdapter, Row, Rows, StorageError, Value};

/// Relational backend on top of SQLite.
///
/// Writes open a transaction lazily; `commit` and `abort` end it, so a unit
/// of work is all-or-nothing.
pub struct SqliteAdapter {
    state: Mutex<SqliteState>,
}

struct SqliteState {
    conn: Connection,
    in_tx: bool,
}

impl SqliteAdapter {
    /// Opens or creates the database file at `path`, in WAL mode with full
    /// sync, and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::init(conn)
    }

    /// Private database that disappears with the adapter.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        for statement in SQLITE_SCHEMA {
            conn.execute(statement, [])?;
        }
        Ok(Self {
            state: Mutex::new(SqliteState { conn, in_tx: false }),
        })
    }

    /// Largest id recorded in any id-bearing table, or 0 for a fresh file.
    pub fn max_id(&self) -> Result<u64, StorageError> {
        let state = self.state.lock();
        let mut max = 0i64;
        for (table, column) in ID_TABLES {
            let sql = format!("SELECT COALESCE(MAX({column}), 0) FROM {table}");
            let value: i64 = state.conn.query_row(&sql, [], |row| row.get(0))?;
            max = max.max(value);
        }
        Ok(max.max(0) as u64)
    }

    fn write<F>(&self, table: &str, op: F) -> Result<u64, StorageError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize>,
    {
        let mut state = self.state.lock();
        if !state.in_tx {
            state.conn.execute_batch("BEGIN IMMEDIATE")?;
            state.in_tx = true;
        }
        op(&state.conn)
            .map(|changed| changed as u64)
            .map_err(|err| map_write_error(table, err))
    }
}

impl PersistenceAdapter for SqliteAdapter {
    fn insert(&self, table: &str, columns: &[Column<'_>]) -> Result<(), StorageError> {
        check_identifier(table)?;
        for (name, _) in columns {
            check_identifier(name)?;
        }
        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        );
        self.write(table, |conn| {
            conn.execute(&sql, params_from_iter(columns.iter().map(|(_, value)| value)))
        })?;
        Ok(())
    }

    fn equality_select(
        &self,
        table: &str,
        projection: &[&str],
        predicates: &[Column<'_>],
    ) -> Result<Rows, StorageError> {
        check_identifier(table)?;
        for name in projection {
            check_identifier(name)?;
        }
        let selected = if projection.is_empty() {
            "*".to_string()
        } else {
            projection.join(", ")
        };
        let sql = format!(
            "SELECT {selected} FROM {table}{}",
            where_clause(predicates, 1)?
        );

        let state = self.state.lock();
        let mut stmt = state.conn.prepare(&sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut cursor = stmt.query(params_from_iter(predicates.iter().map(|(_, value)| value)))?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.next()? {
            let mut columns = Vec::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                let value = match row.get_ref(idx)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(v) => Value::Integer(v),
                    ValueRef::Real(v) => Value::Text(v.to_string()),
                    ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
                    ValueRef::Blob(_) => {
                        return Err(StorageError::TypeMismatch {
                            column: name.clone(),
                            expected: "scalar",
                            found: "blob",
                        })
                    }
                };
                columns.push((name.clone(), value));
            }
            rows.push(Row::new(columns));
        }
        Ok(Rows::new(rows))
    }

    fn update(
        &self,
        set: &[Column<'_>],
        predicates: &[Column<'_>],
        table: &str,
    ) -> Result<u64, StorageError> {
        check_identifier(table)?;
        if set.is_empty() {
            return Ok(0);
        }
        let mut assignments = Vec::with_capacity(set.len());
        for (idx, (name, _)) in set.iter().enumerate() {
            check_identifier(name)?;
            assignments.push(format!("{name} = ?{}", idx + 1));
        }
        let sql = format!(
            "UPDATE {table} SET {}{}",
            assignments.join(", "),
            where_clause(predicates, set.len() + 1)?
        );
        let params = set.iter().chain(predicates.iter()).map(|(_, value)| value);
        self.write(table, |conn| conn.execute(&sql, params_from_iter(params)))
    }

    fn delete(&self, predicates: &[Column<'_>], table: &str) -> Result<u64, StorageError> {
        check_identifier(table)?;
        let sql = format!("DELETE FROM {table}{}", where_clause(predicates, 1)?);
        self.write(table, |conn| {
            conn.execute(&sql, params_from_iter(predicates.iter().map(|(_, value)| value)))
        })
    }

    fn commit(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if state.in_tx {
            state.conn.execute_batch("COMMIT")?;
            state.in_tx = false;
            debug!(backend = "sqlite", "ground.storage.commit");
        }
        Ok(())
    }

    fn abort(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if state.in_tx {
            state.in_tx = false;
            state.conn.execute_batch("ROLLBACK")?;
            warn!(backend = "sqlite", "ground.storage.rollback");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Boolean(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
        })
    }
}

fn where_clause(predicates: &[Column<'_>], first_param: usize) -> Result<String, StorageError> {
    if predicates.is_empty() {
        return Ok(String::new());
    }
    let mut terms = Vec::with_capacity(predicates.len());
    for (offset, (name, _)) in predicates.iter().enumerate() {
        check_identifier(name)?;
        terms.push(format!("{name} = ?{}", first_param + offset));
    }
    Ok(format!(" WHERE {}", terms.join(" AND ")))
}

fn map_write_error(table: &str, err: rusqlite::Error) -> StorageError {
    match err {
        rusqlite::Error::SqliteFailure(code, message)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::Constraint {
                table: table.to_string(),
                message: message.unwrap_or_else(|| code.to_string()),
            }
        }
        other => StorageError::Sqlite(other),
    }
}
