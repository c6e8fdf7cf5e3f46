//! In-process wide-column store
//!
//! Mirrors the Bigtable behaviors the loader relies on: column families
//! must exist, cells are versioned by timestamp (newest first, equal
//! timestamps overwrite), reads honor timestamp-range filters. Garbage
//! collection runs only when [`MemoryStore::collect_garbage`] is called,
//! as the real store collects lazily.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::api::WideColumnStore;
use crate::types::{ColumnFamilySpec, GcRule, Row, RowFilter, RowMutation};
use crate::{BigtableError, Result};

#[derive(Debug, Default)]
struct MemoryTable {
    families: BTreeMap<String, Option<GcRule>>,
    rows: BTreeMap<String, Row>,
}

#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    table: Mutex<Option<MemoryTable>>,
    mutate_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: Mutex::new(None),
            mutate_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
        }
    }

    pub fn mutate_calls(&self) -> usize {
        self.mutate_calls.load(Ordering::Relaxed)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::Relaxed)
    }

    pub fn row_count(&self) -> usize {
        self.table.lock().as_ref().map_or(0, |t| t.rows.len())
    }

    pub fn row_keys(&self) -> Vec<String> {
        self.table
            .lock()
            .as_ref()
            .map(|t| t.rows.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Apply the families' GC rules as of `now`. Returns the number of cells removed.
    pub fn collect_garbage(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.table.lock();
        let Some(table) = guard.as_mut() else {
            return 0;
        };

        let now_micros = now.timestamp_micros();
        let mut removed = 0;
        for row in table.rows.values_mut() {
            for (family, columns) in row.families.iter_mut() {
                let Some(Some(rule)) = table.families.get(family) else {
                    continue;
                };
                let GcRule::MaxAge(age) = *rule;
                let cutoff = now_micros - age.as_micros() as i64;
                for cells in columns.values_mut() {
                    let before = cells.len();
                    cells.retain(|c| c.timestamp_micros >= cutoff);
                    removed += before - cells.len();
                }
                columns.retain(|_, cells| !cells.is_empty());
            }
            row.families.retain(|_, columns| !columns.is_empty());
        }
        table.rows.retain(|_, row| !row.families.is_empty());

        debug!(table = %self.name, removed, "Garbage collected cells");
        removed
    }
}

#[async_trait]
impl WideColumnStore for MemoryStore {
    async fn table_exists(&self) -> Result<bool> {
        Ok(self.table.lock().is_some())
    }

    async fn delete_table(&self) -> Result<()> {
        match self.table.lock().take() {
            Some(_) => Ok(()),
            None => Err(BigtableError::TableNotFound(self.name.clone())),
        }
    }

    async fn create_table(&self, families: &[ColumnFamilySpec]) -> Result<()> {
        let mut guard = self.table.lock();
        if guard.is_some() {
            return Err(BigtableError::InvalidRequest(format!(
                "table {} already exists",
                self.name
            )));
        }
        *guard = Some(MemoryTable {
            families: families
                .iter()
                .map(|f| (f.name.clone(), f.gc_rule))
                .collect(),
            rows: BTreeMap::new(),
        });
        Ok(())
    }

    async fn mutate_rows(&self, rows: &[RowMutation]) -> Result<()> {
        self.mutate_calls.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.table.lock();
        let table = guard
            .as_mut()
            .ok_or_else(|| BigtableError::TableNotFound(self.name.clone()))?;

        // Validate everything first so a bad entry leaves the table untouched.
        for row in rows {
            for m in &row.mutations {
                if !table.families.contains_key(&m.family) {
                    return Err(BigtableError::Mutation {
                        row_key: row.row_key.clone(),
                        code: 5,
                        message: format!("column family '{}' not found", m.family),
                    });
                }
            }
        }

        for row in rows {
            let target = table
                .rows
                .entry(row.row_key.clone())
                .or_insert_with(|| Row::new(row.row_key.clone()));
            for m in &row.mutations {
                target.put(
                    &m.family,
                    &m.qualifier,
                    crate::types::Cell {
                        timestamp_micros: m.timestamp_micros,
                        value: m.value.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn read_row(&self, row_key: &str, filter: Option<&RowFilter>) -> Result<Option<Row>> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        let guard = self.table.lock();
        let table = guard
            .as_ref()
            .ok_or_else(|| BigtableError::TableNotFound(self.name.clone()))?;

        let Some(stored) = table.rows.get(row_key) else {
            return Ok(None);
        };

        let mut row = stored.clone();
        if let Some(filter) = filter {
            for columns in row.families.values_mut() {
                for cells in columns.values_mut() {
                    cells.retain(|c| filter.accepts(c.timestamp_micros));
                }
                columns.retain(|_, cells| !cells.is_empty());
            }
            row.families.retain(|_, columns| !columns.is_empty());
        }

        Ok(if row.is_empty() { None } else { Some(row) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    const DAY_MICROS: i64 = 86_400_000_000;

    fn families() -> Vec<ColumnFamilySpec> {
        let seven_days = GcRule::MaxAge(Duration::from_secs(7 * 86_400));
        vec![
            ColumnFamilySpec::new("vitals", seven_days),
            ColumnFamilySpec::new("meta", seven_days),
        ]
    }

    #[tokio::test]
    async fn test_create_delete_lifecycle() {
        let store = MemoryStore::new("t");
        assert!(!store.table_exists().await.unwrap());
        assert!(store.delete_table().await.is_err());

        store.create_table(&families()).await.unwrap();
        assert!(store.table_exists().await.unwrap());
        assert!(store.create_table(&families()).await.is_err());

        store.delete_table().await.unwrap();
        assert!(!store.table_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_family_rejects_whole_batch() {
        let store = MemoryStore::new("t");
        store.create_table(&families()).await.unwrap();

        let mut good = RowMutation::new("a");
        good.set_cell("vitals", "heart_rate", 1_000, "70");
        let mut bad = RowMutation::new("b");
        bad.set_cell("nope", "x", 1_000, "1");

        let err = tokio_test::assert_err!(store.mutate_rows(&[good, bad]).await);
        assert!(matches!(err, BigtableError::Mutation { code: 5, .. }));
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_read_row_applies_filter() {
        let store = MemoryStore::new("t");
        store.create_table(&families()).await.unwrap();

        let mut row = RowMutation::new("s#2024-01-01T00");
        row.set_cell("vitals", "heart_rate", 1_000, "70")
            .set_cell("vitals", "heart_rate", 2_000, "71")
            .set_cell("meta", "battery_level", 1_000, "90");
        store.mutate_rows(&[row]).await.unwrap();

        let filter = RowFilter::TimestampRange {
            start_micros: Some(2_000),
            end_micros: None,
        };
        let read = store.read_row("s#2024-01-01T00", Some(&filter)).await.unwrap().unwrap();
        assert_eq!(read.cells("vitals", "heart_rate").len(), 1);
        assert!(read.cells("meta", "battery_level").is_empty());

        let filter = RowFilter::TimestampRange {
            start_micros: Some(5_000),
            end_micros: None,
        };
        assert!(store.read_row("s#2024-01-01T00", Some(&filter)).await.unwrap().is_none());
        assert!(store.read_row("missing", None).await.unwrap().is_none());
        assert_eq!(store.read_calls(), 3);
    }

    #[tokio::test]
    async fn test_collect_garbage_honors_max_age() {
        let store = MemoryStore::new("t");
        store.create_table(&families()).await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let fresh = now.timestamp_micros() - DAY_MICROS;
        let stale = now.timestamp_micros() - 8 * DAY_MICROS;

        let mut old_row = RowMutation::new("s#old");
        old_row.set_cell("vitals", "heart_rate", stale, "60");
        let mut mixed = RowMutation::new("s#new");
        mixed
            .set_cell("vitals", "heart_rate", fresh, "61")
            .set_cell("meta", "battery_level", stale, "10");
        store.mutate_rows(&[old_row, mixed]).await.unwrap();

        assert_eq!(store.collect_garbage(now), 2);
        assert_eq!(store.row_keys(), vec!["s#new".to_string()]);
    }
}
