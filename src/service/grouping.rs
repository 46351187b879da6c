//! Rebuild multi-row documents from a flat sheet.
//!
//! Invoice-style sheets write the order number on the first row of each
//! document only; the item rows below leave it blank. A single forward pass
//! attaches every row to the most recent order number seen.

use serde::Deserialize;

use crate::sheets::{GroupedDataset, Record};

use super::lookup::column_containing;

/// Candidate "order number" columns for grouping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GroupKeyColumns {
  /// Exact header names, tried in order
  #[serde(rename = "key_columns")]
  pub exact: Vec<String>,
  /// Case-insensitive header fragments, tried only when no exact header has a value
  #[serde(rename = "fuzzy_fragments")]
  pub fuzzy: Vec<String>,
}

impl Default for GroupKeyColumns {
  fn default() -> Self {
    Self {
      exact: ["NO PESANAN", "NO'PESANAN", "NO INVOICE", "INVOICE"]
        .map(String::from)
        .to_vec(),
      fuzzy: ["PESANAN", "INVOICE"].map(String::from).to_vec(),
    }
  }
}

impl GroupKeyColumns {
  /// Order number carried by `row`, if any.
  pub fn key_of(&self, row: &Record) -> Option<String> {
    lead_key(row, &self.exact).or_else(|| {
      self.fuzzy.iter().find_map(|fragment| {
        column_containing(row, fragment)
          .filter(|(_, value)| !value.is_blank())
          .map(|(_, value)| value.to_string())
      })
    })
  }

  pub fn group(&self, rows: &[Record]) -> GroupedDataset {
    group_rows(rows, |row| self.key_of(row))
  }
}

/// Which rows of a sheet belong on a page, as `(column, value)` pairs.
///
/// A row is kept when any pair matches its trimmed cell text. No pairs keeps
/// every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
  any_of: Vec<(String, String)>,
}

impl RowFilter {
  pub fn any_of(pairs: &[(&str, &str)]) -> Self {
    Self {
      any_of: pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.to_string()))
        .collect(),
    }
  }

  pub fn keeps(&self, row: &Record) -> bool {
    self.any_of.is_empty()
      || self
        .any_of
        .iter()
        .any(|(column, value)| row.text(column).trim() == value)
  }
}

/// How one page turns its sheet into documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentGrouping {
  pub keys: GroupKeyColumns,
  pub filter: RowFilter,
}

impl DocumentGrouping {
  pub fn new(keys: GroupKeyColumns, filter: RowFilter) -> Self {
    Self { keys, filter }
  }

  /// Group the rows the filter keeps. Filtered-out rows never join a group,
  /// not even as continuation rows.
  pub fn group(&self, rows: &[Record]) -> GroupedDataset {
    group_rows(
      rows.iter().filter(|row| self.filter.keeps(row)),
      |row| self.keys.key_of(row),
    )
  }
}

/// Group `rows` by the first non-blank candidate key column on each row.
///
/// A row with a key starts (or resumes) that key's group; rows without one
/// join the group of the last key seen; rows before any key are dropped.
pub fn group_by_lead_column<S: AsRef<str>>(
  rows: &[Record],
  candidate_key_columns: &[S],
) -> GroupedDataset {
  group_rows(rows, |row| lead_key(row, candidate_key_columns))
}

fn lead_key<S: AsRef<str>>(row: &Record, candidates: &[S]) -> Option<String> {
  candidates
    .iter()
    .filter_map(|column| row.get(column.as_ref()))
    .find(|value| !value.is_blank())
    .map(ToString::to_string)
}

fn group_rows<'a>(
  rows: impl IntoIterator<Item = &'a Record>,
  key_of: impl Fn(&Record) -> Option<String>,
) -> GroupedDataset {
  let mut grouped = GroupedDataset::new();
  let mut current: Option<String> = None;

  for row in rows {
    if let Some(key) = key_of(row) {
      current = Some(key);
    }
    if let Some(key) = &current {
      grouped.push_row(key, row.clone());
    }
  }

  grouped
}

#[cfg(test)]
mod tests {
  use super::*;

  fn keyed(key: &str, x: i32) -> Record {
    Record::new().with("K", key).with("x", x)
  }

  fn item(x: i32) -> Record {
    Record::new().with("x", x)
  }

  #[test]
  fn test_continuation_rows_join_preceding_group() {
    let rows = vec![keyed("A", 1), item(2), keyed("B", 3)];
    let grouped = group_by_lead_column(&rows, &["K"]);

    assert_eq!(grouped.order(), ["A", "B"]);
    assert_eq!(grouped.get("A").unwrap(), [keyed("A", 1), item(2)]);
    assert_eq!(grouped.get("B").unwrap(), [keyed("B", 3)]);
  }

  #[test]
  fn test_rows_before_first_key_are_dropped() {
    let rows = vec![item(0), Record::new().with("K", "").with("x", 1), keyed("A", 2)];
    let grouped = group_by_lead_column(&rows, &["K"]);

    assert_eq!(grouped.order(), ["A"]);
    assert_eq!(grouped.total_rows(), 1);
  }

  #[test]
  fn test_repeated_key_resumes_group_in_first_seen_order() {
    let rows = vec![keyed("A", 1), keyed("B", 2), keyed("A", 3), item(4)];
    let grouped = group_by_lead_column(&rows, &["K"]);

    assert_eq!(grouped.order(), ["A", "B"]);
    assert_eq!(grouped.get("A").unwrap(), [keyed("A", 1), keyed("A", 3), item(4)]);
  }

  #[test]
  fn test_first_matching_candidate_wins_per_row() {
    let rows = vec![
      Record::new().with("INVOICE", "INV-9").with("NO PESANAN", "P-1"),
      Record::new().with("INVOICE", "INV-2"),
      Record::new().with("NO PESANAN", "").with("INVOICE", "INV-3"),
    ];
    let grouped = group_by_lead_column(&rows, &["NO PESANAN", "INVOICE"]);

    assert_eq!(grouped.order(), ["P-1", "INV-2", "INV-3"]);
  }

  #[test]
  fn test_numeric_order_numbers_become_plain_keys() {
    let rows = vec![Record::new().with("K", 1001), item(1)];
    let grouped = group_by_lead_column(&rows, &["K"]);
    assert_eq!(grouped.order(), ["1001"]);
  }

  #[test]
  fn test_grouping_is_pure() {
    let rows = vec![keyed("A", 1), item(2), keyed("B", 3), item(4)];
    assert_eq!(
      group_by_lead_column(&rows, &["K"]),
      group_by_lead_column(&rows, &["K"])
    );
  }

  #[test]
  fn test_no_candidate_columns_yields_empty() {
    let rows = vec![item(1), item(2)];
    assert!(group_by_lead_column(&rows, &["K"]).is_empty());
  }

  #[test]
  fn test_row_filter_drops_rows_before_keying() {
    let grouping = DocumentGrouping::new(
      GroupKeyColumns::default(),
      RowFilter::any_of(&[("DP/FP", "FP"), ("TRANSAKSI", "LUNAS")]),
    );
    let rows = vec![
      Record::new().with("NO PESANAN", "INV-1").with("DP/FP", "FP"),
      Record::new().with("DP/FP", "FP").with("ITEM", "Pot"),
      Record::new().with("NO PESANAN", "INV-2").with("DP/FP", "DP"),
      // Would continue INV-2 if the filter ran after keying
      Record::new().with("TRANSAKSI", "LUNAS").with("ITEM", "Pupuk"),
      Record::new().with("NO PESANAN", "INV-3").with("TRANSAKSI", " LUNAS "),
    ];
    let grouped = grouping.group(&rows);

    assert_eq!(grouped.order(), ["INV-1", "INV-3"]);
    assert_eq!(grouped.get("INV-1").map(<[Record]>::len), Some(3));
    assert!(!grouped.contains("INV-2"));
  }

  #[test]
  fn test_empty_row_filter_keeps_everything() {
    let rows = vec![keyed("A", 1), item(2)];
    let filter = RowFilter::default();
    assert!(rows.iter().all(|row| filter.keeps(row)));

    let grouping = DocumentGrouping::default();
    let rows = vec![Record::new().with("INVOICE", "INV-1"), item(2)];
    assert_eq!(grouping.group(&rows).total_rows(), 2);
  }

  #[test]
  fn test_key_columns_fall_back_to_fuzzy_header() {
    let keys = GroupKeyColumns::default();
    let rows = vec![
      Record::new().with("No. Pesanan", "Q-1").with("ITEM", "Pot"),
      Record::new().with("ITEM", "Tanah"),
      Record::new().with("NO'PESANAN", "Q-2"),
    ];
    let grouped = keys.group(&rows);

    assert_eq!(grouped.order(), ["Q-1", "Q-2"]);
    assert_eq!(grouped.get("Q-1").map(<[Record]>::len), Some(2));
  }
}
