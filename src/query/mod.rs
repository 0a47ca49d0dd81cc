// src/query/mod.rs
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, trace};

use crate::table::{clean_cell, present, TableSnapshot};

pub mod error;

pub use error::{QueryError, Result};

/// One output row: header name → cell, in header order.
pub type Record = IndexMap<String, Option<String>>;

/// A parsed request against a single snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    DumpAll,
    DistinctColumn {
        column: String,
    },
    EqualityFilter {
        column: String,
        value: String,
    },
    /// Distinct `child_column` values on rows whose `parent_column` equals
    /// `parent_value`.
    HierarchicalFilter {
        parent_column: String,
        parent_value: String,
        child_column: String,
    },
}

/// Result of a query, serialized as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Records(Vec<Record>),
    Values(Vec<String>),
}

impl QueryOutput {
    pub fn len(&self) -> usize {
        match self {
            Self::Records(r) => r.len(),
            Self::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QueryRequest {
    pub fn distinct(column: impl Into<String>) -> Self {
        Self::DistinctColumn {
            column: column.into(),
        }
    }

    pub fn equality(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::EqualityFilter {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn hierarchical(
        parent_column: impl Into<String>,
        parent_value: impl Into<String>,
        child_column: impl Into<String>,
    ) -> Self {
        Self::HierarchicalFilter {
            parent_column: parent_column.into(),
            parent_value: parent_value.into(),
            child_column: child_column.into(),
        }
    }

    /// Check required parameters. Runs before any fetch.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::EqualityFilter { column, value } if value.trim().is_empty() => {
                Err(QueryError::missing_parameter(column.trim()))
            }
            Self::HierarchicalFilter {
                parent_column,
                parent_value,
                ..
            } if parent_value.trim().is_empty() => {
                Err(QueryError::missing_parameter(parent_column.trim()))
            }
            _ => Ok(()),
        }
    }

    /// Output shape for an empty table.
    fn empty_output(&self) -> QueryOutput {
        match self {
            Self::DumpAll | Self::EqualityFilter { .. } => QueryOutput::Records(Vec::new()),
            Self::DistinctColumn { .. } | Self::HierarchicalFilter { .. } => {
                QueryOutput::Values(Vec::new())
            }
        }
    }

    /// Run this request over `snapshot`.
    pub fn execute(&self, snapshot: &TableSnapshot) -> Result<QueryOutput> {
        self.validate()?;
        if snapshot.is_empty() {
            debug!(request = ?self, "empty snapshot");
            return Ok(self.empty_output());
        }

        let out = match self {
            Self::DumpAll => QueryOutput::Records(dump_all(snapshot)),
            Self::DistinctColumn { column } => {
                QueryOutput::Values(distinct_column(snapshot, column)?)
            }
            Self::EqualityFilter { column, value } => {
                QueryOutput::Records(equality_filter(snapshot, column, value)?)
            }
            Self::HierarchicalFilter {
                parent_column,
                parent_value,
                child_column,
            } => QueryOutput::Values(hierarchical_filter(
                snapshot,
                parent_column,
                parent_value,
                child_column,
            )?),
        };
        debug!(request = ?self, results = out.len(), "query executed");
        Ok(out)
    }
}

/// Find the header position for `name`.
///
/// Both sides are trimmed; comparison is case-sensitive. If several headers
/// trim to `name`, the rightmost one is used: with headers
/// `["Province", "District", "Province"]`, `Province` resolves to column 2.
/// A first-match scan would pick column 0 instead.
pub fn resolve_column(snapshot: &TableSnapshot, name: &str) -> Option<usize> {
    snapshot.index_of(name)
}

fn record_at(snapshot: &TableSnapshot, row: usize) -> Record {
    let mut rec = Record::with_capacity(snapshot.column_names().len());
    for (j, header) in snapshot.column_names().iter().enumerate() {
        let value = present(snapshot.cell(row, j)).map(str::to_owned);
        rec.insert(header.clone(), value);
    }
    rec
}

/// Every data row as a [`Record`], in sheet order.
pub fn dump_all(snapshot: &TableSnapshot) -> Vec<Record> {
    (0..snapshot.rows().len())
        .map(|i| record_at(snapshot, i))
        .collect()
}

/// Distinct trimmed values of `column`, in first-seen order.
pub fn distinct_column(snapshot: &TableSnapshot, column: &str) -> Result<Vec<String>> {
    let idx = resolve_column(snapshot, column)
        .ok_or_else(|| QueryError::column_not_found(column.trim()))?;

    let mut seen = IndexSet::new();
    for i in 0..snapshot.rows().len() {
        if let Some(v) = clean_cell(snapshot.cell(i, idx)) {
            seen.insert(v.to_owned());
        }
    }
    Ok(seen.into_iter().collect())
}

/// Full records whose `column` trims-equal to `value`.
pub fn equality_filter(snapshot: &TableSnapshot, column: &str, value: &str) -> Result<Vec<Record>> {
    let wanted = value.trim();
    if wanted.is_empty() {
        return Err(QueryError::missing_parameter(column.trim()));
    }
    let idx = resolve_column(snapshot, column)
        .ok_or_else(|| QueryError::column_not_found(column.trim()))?;

    let mut out = Vec::new();
    for i in 0..snapshot.rows().len() {
        if clean_cell(snapshot.cell(i, idx)) == Some(wanted) {
            trace!(row = i + 1, "matched");
            out.push(record_at(snapshot, i));
        }
    }
    Ok(out)
}

/// Distinct `child` values co-occurring with `parent == value`, first-seen order.
pub fn hierarchical_filter(
    snapshot: &TableSnapshot,
    parent: &str,
    value: &str,
    child: &str,
) -> Result<Vec<String>> {
    let wanted = value.trim();
    if wanted.is_empty() {
        return Err(QueryError::missing_parameter(parent.trim()));
    }
    let (Some(p_idx), Some(c_idx)) = (
        resolve_column(snapshot, parent),
        resolve_column(snapshot, child),
    ) else {
        return Err(QueryError::column_not_found(format!(
            "{} or {}",
            parent.trim(),
            child.trim()
        )));
    };

    let mut seen = IndexSet::new();
    for i in 0..snapshot.rows().len() {
        let parent_cell = clean_cell(snapshot.cell(i, p_idx));
        let child_cell = clean_cell(snapshot.cell(i, c_idx));
        if let (Some(p), Some(c)) = (parent_cell, child_cell) {
            if p == wanted {
                seen.insert(c.to_owned());
            }
        }
    }
    Ok(seen.into_iter().collect())
}
