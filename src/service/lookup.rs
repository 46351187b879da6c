//! Lookups that tolerate the several spellings a sheet header has had over time
//! (`"NO HP"`, `"NO\nHP"`, `"No HP"`, ...).

use std::collections::BTreeMap;

use crate::sheets::{CellValue, Record};

/// Value of the first candidate column present on the record (a null cell
/// counts as absent), or `default`.
pub fn first_present<S: AsRef<str>>(
  record: &Record,
  candidates: &[S],
  default: impl Into<CellValue>,
) -> CellValue {
  candidates
    .iter()
    .find_map(|column| match record.get(column.as_ref()) {
      Some(CellValue::Empty) | None => None,
      Some(value) => Some(value.clone()),
    })
    .unwrap_or_else(|| default.into())
}

/// Like [`first_present`], but blank strings are skipped too.
pub fn first_non_blank<S: AsRef<str>>(
  record: &Record,
  candidates: &[S],
  default: impl Into<CellValue>,
) -> CellValue {
  candidates
    .iter()
    .filter_map(|column| record.get(column.as_ref()))
    .find(|value| !value.is_blank())
    .cloned()
    .unwrap_or_else(|| default.into())
}

/// First column whose header contains `fragment`, ignoring case.
pub fn column_containing<'a>(
  record: &'a Record,
  fragment: &str,
) -> Option<(&'a str, &'a CellValue)> {
  let fragment = fragment.to_uppercase();
  record
    .columns()
    .find(|(column, _)| column.to_uppercase().contains(&fragment))
}

/// Logical field name to candidate header spellings, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAliases(BTreeMap<String, Vec<String>>);

impl Default for FieldAliases {
  fn default() -> Self {
    let defaults: [(&str, &[&str]); 7] = [
      ("customer_name", &["NAMA PELANGGAN", "NAMA\nPELANGGAN", "Nama Pelanggan"]),
      ("vendor_name", &["NAMA\nVENDOR", "NAMA VENDOR"]),
      ("product_name", &["NAMA BARANG", "NAMA\nBARANG", "NAMA PRODUK"]),
      ("phone", &["NO HP", "NO\nHP", "No HP"]),
      ("city", &["KOTA", "Kota"]),
      ("date", &["TANGGAL", "Tanggal"]),
      ("total", &["TOTAL", "TOTAL\nHARGA", "TOTAL HARGA", "JUMLAH"]),
    ];

    Self(
      defaults
        .into_iter()
        .map(|(field, columns)| {
          (
            field.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
          )
        })
        .collect(),
    )
  }
}

impl FieldAliases {
  /// Defaults with `overrides` replacing whole candidate lists per field.
  pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Self {
    let mut aliases = Self::default();
    for (field, columns) in overrides {
      aliases.0.insert(field.clone(), columns.clone());
    }
    aliases
  }

  /// Candidate headers for `field`. Unknown fields are looked up under their
  /// own name.
  pub fn candidates<'a>(&'a self, field: &'a str) -> Vec<&'a str> {
    match self.0.get(field) {
      Some(columns) => columns.iter().map(String::as_str).collect(),
      None => vec![field],
    }
  }

  pub fn resolve(&self, record: &Record, field: &str, default: impl Into<CellValue>) -> CellValue {
    first_present(record, self.candidates(field).as_slice(), default)
  }

  /// Text of `field`, skipping blank spellings; empty when nothing matches.
  pub fn text(&self, record: &Record, field: &str) -> String {
    first_non_blank(record, self.candidates(field).as_slice(), CellValue::Empty).to_string()
  }
}
