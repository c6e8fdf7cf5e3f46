//! Wide-column data model

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Fully-qualified table location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePath {
    pub project_id: String,
    pub instance_id: String,
    pub table_id: String,
}

impl TablePath {
    pub fn new(
        project_id: impl Into<String>,
        instance_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            instance_id: instance_id.into(),
            table_id: table_id.into(),
        }
    }

    pub fn instance_name(&self) -> String {
        format!("projects/{}/instances/{}", self.project_id, self.instance_id)
    }

    /// `projects/{p}/instances/{i}/tables/{t}`
    pub fn table_name(&self) -> String {
        format!("{}/tables/{}", self.instance_name(), self.table_id)
    }
}

impl fmt::Display for TablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_name())
    }
}

/// Garbage-collection rule attached to a column family, enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcRule {
    /// Cells older than the duration are collected.
    MaxAge(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFamilySpec {
    pub name: String,
    pub gc_rule: Option<GcRule>,
}

impl ColumnFamilySpec {
    pub fn new(name: impl Into<String>, gc_rule: GcRule) -> Self {
        Self {
            name: name.into(),
            gc_rule: Some(gc_rule),
        }
    }
}

/// A single `SetCell` mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCell {
    pub family: String,
    pub qualifier: String,
    pub timestamp_micros: i64,
    pub value: Vec<u8>,
}

/// All mutations for one row, applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMutation {
    pub row_key: String,
    pub mutations: Vec<SetCell>,
}

impl RowMutation {
    pub fn new(row_key: impl Into<String>) -> Self {
        Self {
            row_key: row_key.into(),
            mutations: Vec::new(),
        }
    }

    pub fn set_cell(
        &mut self,
        family: &str,
        qualifier: &str,
        timestamp_micros: i64,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.mutations.push(SetCell {
            family: family.to_string(),
            qualifier: qualifier.to_string(),
            timestamp_micros,
            value: value.into(),
        });
        self
    }
}

/// Read-side filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// Cells with `start <= timestamp < end`; an open bound is unbounded.
    TimestampRange {
        start_micros: Option<i64>,
        end_micros: Option<i64>,
    },
}

impl RowFilter {
    pub fn accepts(&self, timestamp_micros: i64) -> bool {
        match *self {
            RowFilter::TimestampRange {
                start_micros,
                end_micros,
            } => {
                start_micros.map_or(true, |s| timestamp_micros >= s)
                    && end_micros.map_or(true, |e| timestamp_micros < e)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub timestamp_micros: i64,
    pub value: Vec<u8>,
}

impl Cell {
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// A row as returned by a read. Cells of each column are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub families: BTreeMap<String, BTreeMap<String, Vec<Cell>>>,
}

impl Row {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            families: BTreeMap::new(),
        }
    }

    pub fn cells(&self, family: &str, qualifier: &str) -> &[Cell] {
        self.families
            .get(family)
            .and_then(|columns| columns.get(qualifier))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.families.values().all(|columns| columns.values().all(Vec::is_empty))
    }

    /// Insert a cell keeping newest-first order; an equal timestamp replaces the old value.
    pub fn put(&mut self, family: &str, qualifier: &str, cell: Cell) {
        let column = self
            .families
            .entry(family.to_string())
            .or_default()
            .entry(qualifier.to_string())
            .or_default();

        match column.binary_search_by(|c| cell.timestamp_micros.cmp(&c.timestamp_micros)) {
            Ok(idx) => column[idx] = cell,
            Err(idx) => column.insert(idx, cell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_keeps_newest_first_and_overwrites_equal_timestamp() {
        let mut row = Row::new("s#2024-01-01T00");
        for ts in [2_000, 1_000, 3_000] {
            row.put("vitals", "heart_rate", Cell { timestamp_micros: ts, value: b"70".to_vec() });
        }
        row.put("vitals", "heart_rate", Cell { timestamp_micros: 2_000, value: b"99".to_vec() });

        let cells = row.cells("vitals", "heart_rate");
        let stamps: Vec<i64> = cells.iter().map(|c| c.timestamp_micros).collect();
        assert_eq!(stamps, vec![3_000, 2_000, 1_000]);
        assert_eq!(cells[1].value_str(), Some("99"));
        assert!(row.cells("meta", "battery_level").is_empty());
    }

    #[test]
    fn test_timestamp_range_is_half_open() {
        let filter = RowFilter::TimestampRange {
            start_micros: Some(1_000),
            end_micros: Some(2_000),
        };
        assert!(filter.accepts(1_000));
        assert!(filter.accepts(1_999));
        assert!(!filter.accepts(2_000));
        assert!(!filter.accepts(999));
    }

    #[test]
    fn test_table_path_names() {
        let path = TablePath::new("p", "i", "t");
        assert_eq!(path.table_name(), "projects/p/instances/i/tables/t");
        assert_eq!(path.instance_name(), "projects/p/instances/i");
    }
}
