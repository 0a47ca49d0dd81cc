// src/table/mod.rs
use std::collections::HashMap;

pub mod utils;

pub use utils::{clean_cell, present};

/// Rows exactly as the sheet returned them. Row 0 is the header.
///
/// Trailing empty cells are omitted by the upstream API, so rows are ragged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<S: Into<String>> FromIterator<Vec<Option<S>>> for RawTable {
    fn from_iter<I: IntoIterator<Item = Vec<Option<S>>>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|row| row.into_iter().map(|c| c.map(Into::into)).collect())
                .collect(),
        )
    }
}

/// Immutable header + rows view of one fetched range.
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    /// Header cells verbatim (not trimmed). Lookup trims at comparison time.
    column_names: Vec<String>,
    /// Trimmed header name → position. When two headers trim to the same
    /// name the rightmost one wins, so `["Province", "District", "Province"]`
    /// maps `Province` to 2, not 0.
    column_index: HashMap<String, usize>,
    /// Data rows, possibly shorter than the header.
    rows: Vec<Vec<Option<String>>>,
}

impl TableSnapshot {
    /// Build a snapshot from a fetched range.
    ///
    /// Absent input, or input with no data row under the header, yields an
    /// empty snapshot rather than an error.
    pub fn build(raw: Option<RawTable>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        if raw.len() < 2 {
            return Self::default();
        }

        let mut rows = raw.rows.into_iter();
        let column_names: Vec<String> = rows
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();

        let mut column_index = HashMap::with_capacity(column_names.len());
        for (i, name) in column_names.iter().enumerate() {
            column_index.insert(name.trim().to_string(), i);
        }

        Self {
            column_names,
            column_index,
            rows: rows.collect(),
        }
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Header position for `name`, ignoring surrounding whitespace on both
    /// sides. Case-sensitive.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.column_index.get(name.trim()).copied()
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (`row`, `col`), `None` when the row is too short.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: &[&[&str]]) -> RawTable {
        rows.iter()
            .map(|r| r.iter().map(|c| Some(*c)).collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn test_absent_or_header_only_is_empty() {
        let snap = TableSnapshot::build(None);
        assert!(snap.is_empty());
        assert!(snap.column_names().is_empty());

        let snap = TableSnapshot::build(Some(RawTable::default()));
        assert!(snap.is_empty());

        let snap = TableSnapshot::build(Some(raw(&[&["Province", "District"]])));
        assert!(snap.is_empty());
        assert!(snap.column_names().is_empty());
        assert_eq!(snap.index_of("Province"), None);
    }

    #[test]
    fn test_header_kept_verbatim() {
        let snap = TableSnapshot::build(Some(raw(&[&[" Province ", "District"], &["P1", "D1"]])));
        assert_eq!(snap.column_names(), &[" Province ", "District"]);
        assert_eq!(snap.index_of(" Province "), Some(0));
        assert_eq!(snap.index_of("Province"), Some(0));
        assert_eq!(snap.index_of("province"), None);
        assert_eq!(snap.rows().len(), 1);
    }

    #[test]
    fn test_duplicate_header_last_wins() {
        let snap = TableSnapshot::build(Some(raw(&[&["A", "B", "A"], &["1", "2", "3"]])));
        assert_eq!(snap.index_of("A"), Some(2));
        assert_eq!(snap.index_of("B"), Some(1));

        let snap = TableSnapshot::build(Some(raw(&[
            &["Province", "District", " Province"],
            &["A", "X", "B"],
        ])));
        assert_eq!(snap.index_of("Province"), Some(2));
        assert_eq!(snap.column_names()[0], "Province");
    }

    #[test]
    fn test_ragged_rows_read_as_none() {
        let snap = TableSnapshot::build(Some(raw(&[&["A", "B", "C"], &["1"], &["1", "2", "3"]])));
        assert_eq!(snap.cell(0, 0), Some("1"));
        assert_eq!(snap.cell(0, 2), None);
        assert_eq!(snap.cell(1, 2), Some("3"));
        assert_eq!(snap.cell(5, 0), None);
    }

    #[test]
    fn test_null_header_cell_becomes_empty_name() {
        let table = RawTable::new(vec![
            vec![Some("A".into()), None],
            vec![Some("1".into()), Some("2".into())],
        ]);
        let snap = TableSnapshot::build(Some(table));
        assert_eq!(snap.column_names(), &["A", ""]);
    }
}
