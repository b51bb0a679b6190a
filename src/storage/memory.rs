use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use super::{check_identifier, Column, PersistenceAdapter, Row, Rows, StorageError, Value};

/// Wide-column style backend kept entirely in memory.
///
/// Every statement applies immediately. `commit` and `abort` only bump
/// counters, so a failure midway through a unit of work leaves the rows
/// written so far in place.
#[derive(Default)]
pub struct MemoryAdapter {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    commits: AtomicU64,
    aborts: AtomicU64,
}

/// Snapshot of the commit/abort calls observed by a [`MemoryAdapter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransactionCounters {
    /// Calls to `commit`.
    pub commits: u64,
    /// Calls to `abort`.
    pub aborts: u64,
}

impl MemoryAdapter {
    /// Empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit and abort calls observed so far.
    pub fn counters(&self) -> TransactionCounters {
        TransactionCounters {
            commits: self.commits.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
        }
    }

    /// Number of rows currently stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, Vec::len)
    }
}

fn row_matches(row: &Row, predicates: &[Column<'_>]) -> bool {
    predicates.iter().all(|(name, expected)| {
        row.get(name)
            .map_or(false, |actual| actual.matches(expected))
    })
}

impl PersistenceAdapter for MemoryAdapter {
    fn insert(&self, table: &str, columns: &[Column<'_>]) -> Result<(), StorageError> {
        check_identifier(table)?;
        let row = Row::new(
            columns
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        );
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(row);
        trace!(table, "ground.storage.memory.insert");
        Ok(())
    }

    fn equality_select(
        &self,
        table: &str,
        projection: &[&str],
        predicates: &[Column<'_>],
    ) -> Result<Rows, StorageError> {
        check_identifier(table)?;
        let tables = self.tables.lock();
        let Some(rows) = tables.get(table) else {
            return Ok(Rows::default());
        };
        let selected = rows
            .iter()
            .filter(|row| row_matches(row, predicates))
            .map(|row| {
                if projection.is_empty() {
                    return row.clone();
                }
                // Absent columns read back as NULL, as in a wide-column store.
                Row::new(
                    projection
                        .iter()
                        .map(|name| {
                            let value = row.get(name).cloned().unwrap_or(Value::Null);
                            (name.to_string(), value)
                        })
                        .collect(),
                )
            })
            .collect();
        Ok(Rows::new(selected))
    }

    fn update(
        &self,
        set: &[Column<'_>],
        predicates: &[Column<'_>],
        table: &str,
    ) -> Result<u64, StorageError> {
        check_identifier(table)?;
        let mut tables = self.tables.lock();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let mut changed = 0;
        for row in rows.iter_mut().filter(|row| row_matches(row, predicates)) {
            let mut columns: Vec<(String, Value)> = row
                .columns()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            for (name, value) in set {
                match columns.iter_mut().find(|(existing, _)| existing == name) {
                    Some(slot) => slot.1 = value.clone(),
                    None => columns.push((name.to_string(), value.clone())),
                }
            }
            *row = Row::new(columns);
            changed += 1;
        }
        Ok(changed)
    }

    fn delete(&self, predicates: &[Column<'_>], table: &str) -> Result<u64, StorageError> {
        check_identifier(table)?;
        let mut tables = self.tables.lock();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !row_matches(row, predicates));
        Ok((before - rows.len()) as u64)
    }

    fn commit(&self) -> Result<(), StorageError> {
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn abort(&self) -> Result<(), StorageError> {
        self.aborts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
