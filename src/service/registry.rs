//! One pre-configured [`DataService`] per page of the app.

use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::sheets::TabularStore;

use super::data_service::{DataService, DatasetConfig};
use super::grouping::{DocumentGrouping, RowFilter};
use super::session::UniqueField;

/// Built-in description of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
  pub name: &'static str,
  pub table: &'static str,
  pub cache_key: &'static str,
  pub empty_message: &'static str,
  pub column_span: u16,
  /// Rows form multi-row documents keyed by order number
  pub grouped: bool,
  /// `(column, value)` pairs, any of which keeps a row on the page
  pub keep_rows: &'static [(&'static str, &'static str)],
  /// Logical field (see `fields` in the config) that must not repeat on add
  pub unique_field: Option<&'static str>,
}

pub const PRESETS: &[Preset] = &[
  Preset {
    name: "vendor",
    table: "VENDOR",
    cache_key: "vendor_data_cache",
    empty_message: "No vendor data",
    column_span: 9,
    grouped: false,
    keep_rows: &[],
    unique_field: None,
  },
  Preset {
    name: "customer",
    table: "KOSTUMER",
    cache_key: "kustomer_data_cache",
    empty_message: "No customer data",
    column_span: 8,
    grouped: false,
    keep_rows: &[],
    unique_field: Some("phone"),
  },
  Preset {
    name: "product",
    table: "PERSEDIAAN BARANG",
    cache_key: "produk_data_cache",
    empty_message: "No product data",
    column_span: 15,
    grouped: false,
    keep_rows: &[],
    unique_field: None,
  },
  Preset {
    name: "invoice",
    table: "INVOICE",
    cache_key: "riwayat_data_cache",
    empty_message: "No transaction history yet",
    column_span: 5,
    grouped: true,
    keep_rows: &[("DP/FP", "FP"), ("TRANSACTION", "LUNAS"), ("TRANSAKSI", "LUNAS")],
    unique_field: None,
  },
  Preset {
    name: "settlement",
    table: "DP/Pelunasan",
    cache_key: "pelunasan_data_cache",
    empty_message: "No settlement data",
    column_span: 6,
    grouped: true,
    keep_rows: &[("DP/FP", "DP")],
    unique_field: None,
  },
  Preset {
    name: "quotation",
    table: "QUOTATION",
    cache_key: "quotation_data_cache",
    empty_message: "No quotations yet",
    column_span: 5,
    grouped: true,
    keep_rows: &[],
    unique_field: None,
  },
];

struct Registered<S: CacheStore, R: TabularStore> {
  name: &'static str,
  grouping: Option<DocumentGrouping>,
  unique: Option<UniqueField>,
  service: Arc<DataService<S, R>>,
}

/// All page datasets sharing one cache store and one remote client.
pub struct DataServices<S: CacheStore, R: TabularStore> {
  entries: Vec<Registered<S, R>>,
}

impl<S: CacheStore, R: TabularStore> DataServices<S, R> {
  /// Build every preset, applying the `datasets` overrides and cache settings
  /// from `config`.
  pub fn new(config: &Config, store: Arc<S>, remote: Arc<R>) -> Self {
    let aliases = config.field_aliases();
    let entries = PRESETS
      .iter()
      .map(|preset| {
        let dataset = dataset_config(preset, config);
        let service = DataService::new(dataset, store.clone(), remote.clone())
          .with_validity(config.cache.validity())
          .with_discard_superseded(config.cache.discard_superseded);

        let grouping = preset.grouped.then(|| {
          DocumentGrouping::new(config.grouping.clone(), RowFilter::any_of(preset.keep_rows))
        });

        Registered {
          name: preset.name,
          grouping,
          unique: preset
            .unique_field
            .map(|field| UniqueField::from_aliases(&aliases, field)),
          service: Arc::new(service),
        }
      })
      .collect();

    Self { entries }
  }

  pub fn get(&self, name: &str) -> Option<&Arc<DataService<S, R>>> {
    self.find(name).map(|entry| &entry.service)
  }

  pub fn is_grouped(&self, name: &str) -> bool {
    self.grouping(name).is_some()
  }

  /// How a grouped dataset turns rows into documents; `None` for flat ones.
  pub fn grouping(&self, name: &str) -> Option<&DocumentGrouping> {
    self.find(name).and_then(|entry| entry.grouping.as_ref())
  }

  /// Uniqueness enforced when adding rows to `name`, if any.
  pub fn unique_field(&self, name: &str) -> Option<&UniqueField> {
    self.find(name).and_then(|entry| entry.unique.as_ref())
  }

  pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.entries.iter().map(|entry| entry.name)
  }

  /// Services in registration order, with the grouping of grouped ones.
  pub fn iter(
    &self,
  ) -> impl Iterator<Item = (&'static str, Option<&DocumentGrouping>, &Arc<DataService<S, R>>)> {
    self
      .entries
      .iter()
      .map(|entry| (entry.name, entry.grouping.as_ref(), &entry.service))
  }

  fn find(&self, name: &str) -> Option<&Registered<S, R>> {
    self.entries.iter().find(|entry| entry.name == name)
  }
}

fn dataset_config(preset: &Preset, config: &Config) -> DatasetConfig {
  let overrides = config.datasets.get(preset.name).cloned().unwrap_or_default();

  let mut dataset = DatasetConfig::new(
    overrides.table.unwrap_or_else(|| preset.table.to_string()),
    preset.cache_key,
  )
  .with_empty_message(
    overrides
      .empty_message
      .unwrap_or_else(|| preset.empty_message.to_string()),
  )
  .with_column_span(overrides.column_span.unwrap_or(preset.column_span));

  if let Some(message) = overrides.error_message {
    dataset = dataset.with_error_message(message);
  }
  dataset
}
