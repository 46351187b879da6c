use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// A single cell as returned by the sheet endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
  #[default]
  Empty,
  Bool(bool),
  Number(f64),
  Text(String),
}

impl CellValue {
  /// True for null cells and strings that are empty after trimming.
  pub fn is_blank(&self) -> bool {
    match self {
      CellValue::Empty => true,
      CellValue::Text(s) => s.trim().is_empty(),
      _ => false,
    }
  }

  /// Numeric view of the cell. Missing or unparseable values count as zero.
  pub fn as_number(&self) -> f64 {
    match self {
      CellValue::Number(n) => *n,
      CellValue::Text(s) => s.trim().parse().unwrap_or(0.0),
      CellValue::Bool(_) | CellValue::Empty => 0.0,
    }
  }
}

impl fmt::Display for CellValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CellValue::Empty => Ok(()),
      CellValue::Bool(b) => write!(f, "{}", b),
      // Sheets hand back whole numbers as floats; print them the way the cell shows them
      CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
      CellValue::Number(n) => write!(f, "{}", n),
      CellValue::Text(s) => f.write_str(s),
    }
  }
}

impl From<&str> for CellValue {
  fn from(value: &str) -> Self {
    CellValue::Text(value.to_string())
  }
}

impl From<String> for CellValue {
  fn from(value: String) -> Self {
    CellValue::Text(value)
  }
}

impl From<f64> for CellValue {
  fn from(value: f64) -> Self {
    CellValue::Number(value)
  }
}

impl From<i64> for CellValue {
  fn from(value: i64) -> Self {
    CellValue::Number(value as f64)
  }
}

impl From<i32> for CellValue {
  fn from(value: i32) -> Self {
    CellValue::Number(value as f64)
  }
}

impl From<bool> for CellValue {
  fn from(value: bool) -> Self {
    CellValue::Bool(value)
  }
}

/// One sheet row: column name to value, plus the physical row number.
///
/// Rows read from the remote store carry `_rowIndex`, the 1-based position of
/// the row in its sheet. Rows created locally have none until the next reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
  #[serde(rename = "_rowIndex", default, skip_serializing_if = "Option::is_none")]
  row_index: Option<u64>,
  #[serde(flatten)]
  columns: BTreeMap<String, CellValue>,
}

impl Record {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style column setter.
  pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
    self.insert(column, value);
    self
  }

  pub fn with_row_index(mut self, row_index: u64) -> Self {
    self.row_index = Some(row_index);
    self
  }

  pub fn row_index(&self) -> Option<u64> {
    self.row_index
  }

  pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
    self.columns.insert(column.into(), value.into());
  }

  pub fn get(&self, column: &str) -> Option<&CellValue> {
    self.columns.get(column)
  }

  /// Text of a column, empty when the column is missing.
  pub fn text(&self, column: &str) -> String {
    self.get(column).map(ToString::to_string).unwrap_or_default()
  }

  /// Number in a column, zero when missing or unparseable.
  pub fn number(&self, column: &str) -> f64 {
    self.get(column).map(CellValue::as_number).unwrap_or(0.0)
  }

  pub fn is_blank(&self, column: &str) -> bool {
    self.get(column).map_or(true, CellValue::is_blank)
  }

  pub fn columns(&self) -> impl Iterator<Item = (&str, &CellValue)> {
    self.columns.iter().map(|(k, v)| (k.as_str(), v))
  }

  /// Overlay the columns of `patch` onto this record. Columns the patch does
  /// not mention keep their value, matching the remote update semantics.
  pub fn merge(&mut self, patch: &Record) {
    for (column, value) in &patch.columns {
      self.columns.insert(column.clone(), value.clone());
    }
  }
}

/// Result of reading a whole sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetData {
  pub headers: Vec<String>,
  pub rows: Vec<Record>,
}

/// Multi-row documents (invoices, quotations) keyed by order number.
///
/// `order` keeps first-seen order and every key in it has a non-empty row
/// list in `map`, and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGroupedDataset")]
pub struct GroupedDataset {
  map: HashMap<String, Vec<Record>>,
  order: Vec<String>,
}

#[derive(Deserialize)]
struct RawGroupedDataset {
  #[serde(default)]
  map: HashMap<String, Vec<Record>>,
  #[serde(default)]
  order: Vec<String>,
}

impl TryFrom<RawGroupedDataset> for GroupedDataset {
  type Error = String;

  fn try_from(raw: RawGroupedDataset) -> Result<Self, Self::Error> {
    let listed: HashSet<&str> = raw.order.iter().map(String::as_str).collect();
    if listed.len() != raw.order.len() {
      return Err("grouped dataset lists a key twice".to_string());
    }
    if listed.len() != raw.map.len() {
      return Err(format!(
        "grouped dataset lists {} keys but holds {} groups",
        listed.len(),
        raw.map.len()
      ));
    }
    for key in &raw.order {
      match raw.map.get(key) {
        Some(rows) if !rows.is_empty() => {}
        Some(_) => return Err(format!("group '{}' has no rows", key)),
        None => return Err(format!("group '{}' is listed but missing", key)),
      }
    }
    Ok(Self {
      map: raw.map,
      order: raw.order,
    })
  }
}

impl GroupedDataset {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a row to the group for `key`, opening the group if it is new.
  pub fn push_row(&mut self, key: &str, row: Record) {
    match self.map.get_mut(key) {
      Some(rows) => rows.push(row),
      None => {
        self.order.push(key.to_string());
        self.map.insert(key.to_string(), vec![row]);
      }
    }
  }

  /// Number of groups.
  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }

  pub fn total_rows(&self) -> usize {
    self.map.values().map(Vec::len).sum()
  }

  pub fn order(&self) -> &[String] {
    &self.order
  }

  pub fn get(&self, key: &str) -> Option<&[Record]> {
    self.map.get(key).map(Vec::as_slice)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.map.contains_key(key)
  }

  /// Groups in display order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &[Record])> {
    self
      .order
      .iter()
      .filter_map(|key| self.map.get(key).map(|rows| (key.as_str(), rows.as_slice())))
  }

  /// Take the group for `key` out, returning its rows.
  pub fn remove_group(&mut self, key: &str) -> Option<Vec<Record>> {
    let rows = self.map.remove(key)?;
    self.order.retain(|k| k != key);
    Some(rows)
  }
}

/// Document numbering series kept by the remote counters sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
  Invoice,
  Quotation,
}

impl DocumentKind {
  pub fn code(self) -> &'static str {
    match self {
      DocumentKind::Invoice => "INV",
      DocumentKind::Quotation => "QT",
    }
  }
}

/// Number handed out (or previewed) by the remote counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentId {
  pub id: String,
  pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
  pub success: bool,
  pub message: String,
  pub user: Option<String>,
}
