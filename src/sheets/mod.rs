//! Remote tabular store: the spreadsheet behind the web-app endpoint.

pub mod api_types;
mod client;
mod types;

pub use client::{is_duplicate_entry, SheetsClient, TabularStore};
pub use types::{
  CellValue, DocumentId, DocumentKind, GroupedDataset, LoginOutcome, Record, SheetData,
};
