//! Page-owned working copies of a dataset and the edits made through them.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::sheets::{CellValue, GroupedDataset, Record, TabularStore};

use super::data_service::{DataService, DatasetView};
use super::grouping::DocumentGrouping;
use super::lookup::{first_non_blank, FieldAliases};
use super::optimistic::apply_then_confirm;

/// A column that must not repeat across rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueField {
  /// Column the remote store enforces uniqueness on
  pub column: String,
  /// Header spellings checked locally before anything is sent
  pub candidates: Vec<String>,
}

impl UniqueField {
  pub fn new(column: impl Into<String>) -> Self {
    let column = column.into();
    Self {
      candidates: vec![column.clone()],
      column,
    }
  }

  pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
    self.candidates = candidates;
    self
  }

  /// Unique on the logical `field`: every configured spelling is checked
  /// locally, the first one is sent to the remote store.
  pub fn from_aliases(aliases: &FieldAliases, field: &str) -> Self {
    let candidates: Vec<String> = aliases
      .candidates(field)
      .into_iter()
      .map(str::to_string)
      .collect();
    let column = candidates.first().cloned().unwrap_or_else(|| field.to_string());
    Self { column, candidates }
  }

  fn value_of(&self, record: &Record) -> Option<String> {
    let value = first_non_blank(record, &self.candidates, CellValue::Empty);
    (!value.is_blank()).then(|| value.to_string().trim().to_lowercase())
  }
}

/// Flat rows of one sheet, as a page holds them.
pub struct DatasetSession<S: CacheStore, R: TabularStore> {
  service: Arc<DataService<S, R>>,
  rows: Vec<Record>,
}

impl<S: CacheStore, R: TabularStore> DatasetSession<S, R> {
  pub fn new(service: Arc<DataService<S, R>>) -> Self {
    Self {
      service,
      rows: Vec::new(),
    }
  }

  pub fn rows(&self) -> &[Record] {
    &self.rows
  }

  pub fn service(&self) -> &DataService<S, R> {
    &self.service
  }

  pub async fn reload<V>(&mut self, view: &mut V) -> &[Record]
  where
    V: DatasetView<Vec<Record>> + ?Sized,
  {
    self.rows = self.service.load_data(view).await;
    &self.rows
  }

  /// Append `record`, then reload to pick up its row index.
  pub async fn add<V>(
    &mut self,
    record: Record,
    unique: Option<&UniqueField>,
    view: &mut V,
  ) -> Result<()>
  where
    V: DatasetView<Vec<Record>> + ?Sized,
  {
    if let Some(field) = unique {
      if let Some(value) = field.value_of(&record) {
        if self.rows.iter().any(|row| field.value_of(row).as_deref() == Some(value.as_str())) {
          return Err(eyre!(
            "Duplicate entry: {} '{}' already exists.",
            field.column,
            first_non_blank(&record, &field.candidates, CellValue::Empty)
          ));
        }
      }
    }

    let table = self.service.table_name();
    let remote = self
      .service
      .remote()
      .add_row(table, &record, unique.map(|field| field.column.as_str()));
    let pending = record.clone();

    apply_then_confirm(
      &self.service,
      &mut self.rows,
      view,
      "add row",
      |rows| {
        rows.push(pending);
        Ok(())
      },
      remote,
    )
    .await?;

    self.reload(view).await;
    Ok(())
  }

  /// Merge `patch` onto the row at `row_index`. The merged row stays as is on
  /// success.
  pub async fn update<V>(&mut self, row_index: u64, patch: Record, view: &mut V) -> Result<()>
  where
    V: DatasetView<Vec<Record>> + ?Sized,
  {
    let position = self.position_of(row_index)?;
    let remote = self
      .service
      .remote()
      .update_row(self.service.table_name(), row_index, &patch);

    apply_then_confirm(
      &self.service,
      &mut self.rows,
      view,
      "update row",
      |rows| {
        rows[position].merge(&patch);
        Ok(())
      },
      remote,
    )
    .await
  }

  /// Remove the row at `row_index`, then reload since later row indexes shift.
  pub async fn delete<V>(&mut self, row_index: u64, view: &mut V) -> Result<()>
  where
    V: DatasetView<Vec<Record>> + ?Sized,
  {
    let position = self.position_of(row_index)?;
    let remote = self
      .service
      .remote()
      .delete_row(self.service.table_name(), row_index);

    apply_then_confirm(
      &self.service,
      &mut self.rows,
      view,
      "delete row",
      |rows| {
        rows.remove(position);
        Ok(())
      },
      remote,
    )
    .await?;

    self.reload(view).await;
    Ok(())
  }

  fn position_of(&self, row_index: u64) -> Result<usize> {
    self
      .rows
      .iter()
      .position(|row| row.row_index() == Some(row_index))
      .ok_or_else(|| eyre!("Row {} not found in {}", row_index, self.service.table_name()))
  }
}

/// Grouped documents of one sheet, as a page holds them.
pub struct GroupedSession<S: CacheStore, R: TabularStore> {
  service: Arc<DataService<S, R>>,
  groups: GroupedDataset,
  grouping: DocumentGrouping,
}

impl<S: CacheStore, R: TabularStore> GroupedSession<S, R> {
  pub fn new(service: Arc<DataService<S, R>>, grouping: DocumentGrouping) -> Self {
    Self {
      service,
      groups: GroupedDataset::new(),
      grouping,
    }
  }

  pub fn groups(&self) -> &GroupedDataset {
    &self.groups
  }

  pub async fn reload<V>(&mut self, view: &mut V) -> &GroupedDataset
  where
    V: DatasetView<GroupedDataset> + ?Sized,
  {
    let grouping = &self.grouping;
    self.groups = self
      .service
      .load_grouped_data(view, |rows| grouping.group(rows))
      .await;
    &self.groups
  }

  /// Delete every row of the document `order_no`, then reload.
  pub async fn delete_group<V>(&mut self, order_no: &str, view: &mut V) -> Result<()>
  where
    V: DatasetView<GroupedDataset> + ?Sized,
  {
    if !self.groups.contains(order_no) {
      return Err(eyre!(
        "Order {} not found in {}",
        order_no,
        self.service.table_name()
      ));
    }

    let remote = self
      .service
      .remote()
      .delete_group(self.service.table_name(), order_no);

    apply_then_confirm(
      &self.service,
      &mut self.groups,
      view,
      "delete order",
      |groups| {
        groups.remove_group(order_no);
        Ok(())
      },
      remote,
    )
    .await?;

    self.reload(view).await;
    Ok(())
  }
}
