//! Stale-while-revalidate loading for one sheet.
//!
//! Every page wants the same thing: paint whatever the cache has right away,
//! refresh from the remote store behind it, and never trade a stale view for
//! an empty one or an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheSource, CacheStore, Dataset, Payload, VALIDITY_WINDOW};
use crate::sheets::{GroupedDataset, Record, TabularStore};

pub const DEFAULT_EMPTY_MESSAGE: &str = "No data";
pub const DEFAULT_ERROR_MESSAGE: &str = "Failed to load data";
pub const LOADING_MESSAGE: &str = "Fetching data from server...";

/// Which sheet a service reads and where it caches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
  pub table_name: String,
  pub cache_key: String,
  pub empty_message: String,
  pub error_message: String,
  /// Width of the table a status message has to span
  pub column_span: u16,
}

impl DatasetConfig {
  pub fn new(table_name: impl Into<String>, cache_key: impl Into<String>) -> Self {
    Self {
      table_name: table_name.into(),
      cache_key: cache_key.into(),
      empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
      error_message: DEFAULT_ERROR_MESSAGE.to_string(),
      column_span: 8,
    }
  }

  pub fn with_empty_message(mut self, message: impl Into<String>) -> Self {
    self.empty_message = message.into();
    self
  }

  pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
    self.error_message = message.into();
    self
  }

  pub fn with_column_span(mut self, span: u16) -> Self {
    self.column_span = span;
    self
  }

  /// Name of the "refreshing" indicator for this dataset.
  pub fn indicator_id(&self) -> String {
    format!("{}_refreshIndicator", self.cache_key)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
  Loading,
  Empty,
  Error,
}

/// Placeholder text shown instead of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
  pub kind: MessageKind,
  pub text: String,
  pub column_span: u16,
}

/// Receives what a load produces. Only `render` is required.
pub trait DatasetView<T> {
  fn render(&mut self, data: &T, source: CacheSource);

  /// Loading, empty and error placeholders. Only shown when there is no
  /// cached data on screen.
  fn show_message(&mut self, _message: &StatusMessage) {}

  /// Called once fresh remote data has been rendered.
  fn data_ready(&mut self, _data: &T) {}
}

/// Whether a load may skip the remote read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
  /// Always refresh from the remote store
  #[default]
  Always,
  /// Serve a cache entry still inside the validity window without refreshing
  WhenStale,
}

/// Cache-backed loader for one sheet.
pub struct DataService<S: CacheStore, R: TabularStore> {
  config: DatasetConfig,
  store: Arc<S>,
  remote: Arc<R>,
  /// How long after a write cached data counts as fresh
  validity: Duration,
  /// Drop completions overtaken by a later load of the same dataset
  discard_superseded: bool,
  generation: AtomicU64,
  refreshing: watch::Sender<bool>,
}

impl<S: CacheStore, R: TabularStore> DataService<S, R> {
  pub fn new(config: DatasetConfig, store: Arc<S>, remote: Arc<R>) -> Self {
    let (refreshing, _) = watch::channel(false);
    Self {
      config,
      store,
      remote,
      validity: VALIDITY_WINDOW,
      discard_superseded: false,
      generation: AtomicU64::new(0),
      refreshing,
    }
  }

  pub fn with_validity(mut self, validity: Duration) -> Self {
    self.validity = validity;
    self
  }

  /// Ignore a refresh that completes after a newer load of this dataset
  /// started. Off by default: the last request to finish wins.
  pub fn with_discard_superseded(mut self, discard: bool) -> Self {
    self.discard_superseded = discard;
    self
  }

  pub fn config(&self) -> &DatasetConfig {
    &self.config
  }

  pub fn table_name(&self) -> &str {
    &self.config.table_name
  }

  pub fn cache_key(&self) -> &str {
    &self.config.cache_key
  }

  pub fn validity(&self) -> Duration {
    self.validity
  }

  pub fn remote(&self) -> &R {
    &self.remote
  }

  pub fn is_refreshing(&self) -> bool {
    *self.refreshing.borrow()
  }

  /// Follow the refreshing flag, e.g. to drive a spinner.
  pub fn subscribe_refreshing(&self) -> watch::Receiver<bool> {
    self.refreshing.subscribe()
  }

  /// Load the sheet as flat rows.
  pub async fn load_data<V>(&self, view: &mut V) -> Vec<Record>
  where
    V: DatasetView<Vec<Record>> + ?Sized,
  {
    self.load_data_with(view, RefreshPolicy::Always).await
  }

  pub async fn load_data_with<V>(&self, view: &mut V, policy: RefreshPolicy) -> Vec<Record>
  where
    V: DatasetView<Vec<Record>> + ?Sized,
  {
    self.load(view, policy, |rows| rows).await
  }

  /// Load the sheet and regroup it into documents with `group_fn`.
  pub async fn load_grouped_data<V, F>(&self, view: &mut V, group_fn: F) -> GroupedDataset
  where
    V: DatasetView<GroupedDataset> + ?Sized,
    F: FnOnce(&[Record]) -> GroupedDataset,
  {
    self
      .load_grouped_data_with(view, group_fn, RefreshPolicy::Always)
      .await
  }

  pub async fn load_grouped_data_with<V, F>(
    &self,
    view: &mut V,
    group_fn: F,
    policy: RefreshPolicy,
  ) -> GroupedDataset
  where
    V: DatasetView<GroupedDataset> + ?Sized,
    F: FnOnce(&[Record]) -> GroupedDataset,
  {
    self.load(view, policy, |rows| group_fn(&rows)).await
  }

  /// Cache-first load.
  ///
  /// 1. Render cached data if there is any, else show the loading message
  /// 2. Raise the refreshing flag and read the sheet
  /// 3. On rows: cache, render and return them
  /// 4. On no rows or failure: keep what is on screen, or show the empty /
  ///    error message if nothing is
  async fn load<T, V, F>(&self, view: &mut V, policy: RefreshPolicy, shape: F) -> T
  where
    T: Dataset,
    V: DatasetView<T> + ?Sized,
    F: FnOnce(Vec<Record>) -> T,
  {
    let key = self.config.cache_key.as_str();

    let cached = self.cached_dataset::<T>().await;
    match &cached {
      Some((data, fresh)) => {
        debug!("Showing cached {} data instantly", key);
        let source = if *fresh {
          CacheSource::CacheFresh
        } else {
          CacheSource::CacheStale
        };
        view.render(data, source);

        if *fresh && policy == RefreshPolicy::WhenStale {
          return data.clone();
        }
      }
      None => {
        let loading = self.message(MessageKind::Loading, LOADING_MESSAGE.to_string());
        view.show_message(&loading);
      }
    }

    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let _refreshing = RefreshGuard::raise(&self.refreshing);

    let outcome = self.remote.read_sheet(&self.config.table_name).await;

    // A newer load owns the view now, whatever this one got back
    if self.is_superseded(generation) {
      debug!("Dropping superseded refresh of {}", key);
      return cached.map(|(data, _)| data).unwrap_or_default();
    }

    match outcome {
      Ok(sheet) if !sheet.rows.is_empty() => {
        let fresh = shape(sheet.rows);
        self.store.set(key, &fresh.to_payload()).await;
        view.render(&fresh, CacheSource::Network);
        view.data_ready(&fresh);
        info!("{} data refreshed from server", key);
        fresh
      }
      Ok(_) => {
        debug!("Sheet {} returned no rows", self.config.table_name);
        if cached.is_none() {
          view.show_message(&self.message(MessageKind::Empty, self.config.empty_message.clone()));
        }
        cached.map(|(data, _)| data).unwrap_or_default()
      }
      Err(e) => {
        warn!("Error loading {}: {:#}", key, e);
        if cached.is_none() {
          let text = format!("{}: {}", self.config.error_message, e);
          view.show_message(&self.message(MessageKind::Error, text));
        }
        cached.map(|(data, _)| data).unwrap_or_default()
      }
    }
  }

  /// Usable cached data and whether it is still fresh.
  async fn cached_dataset<T: Dataset>(&self) -> Option<(T, bool)> {
    let entry = self.store.get(&self.config.cache_key).await?;
    let fresh = entry.is_fresh(self.validity);
    let data = match entry.into_dataset::<T>() {
      Some(data) => data,
      None => {
        warn!(
          "Cached {} has an unexpected shape, ignoring it",
          self.config.cache_key
        );
        return None;
      }
    };
    data.has_content().then_some((data, fresh))
  }

  fn is_superseded(&self, generation: u64) -> bool {
    self.discard_superseded && self.generation.load(Ordering::SeqCst) != generation
  }

  fn message(&self, kind: MessageKind, text: String) -> StatusMessage {
    StatusMessage {
      kind,
      text,
      column_span: self.config.column_span,
    }
  }

  pub async fn clear_cache(&self) -> bool {
    self.store.clear(&self.config.cache_key).await
  }

  /// Replace the cached view without a round trip, e.g. after a local edit.
  pub async fn update_cache(&self, payload: &Payload) -> bool {
    self.store.set(&self.config.cache_key, payload).await
  }

  pub async fn get_cached(&self) -> Option<CacheEntry> {
    self.store.get(&self.config.cache_key).await
  }
}

/// Holds the refreshing flag up for as long as it lives.
struct RefreshGuard<'a> {
  signal: &'a watch::Sender<bool>,
}

impl<'a> RefreshGuard<'a> {
  fn raise(signal: &'a watch::Sender<bool>) -> Self {
    signal.send_replace(true);
    Self { signal }
  }
}

impl Drop for RefreshGuard<'_> {
  fn drop(&mut self) {
    self.signal.send_replace(false);
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::cache::MemoryStore;
  use crate::service::grouping::group_by_lead_column;
  use crate::sheets::SheetData;
  use color_eyre::{eyre::eyre, Result};
  use std::collections::VecDeque;
  use std::sync::Mutex;
  use tokio::sync::Notify;

  /// What the fake sheet answers to the next read.
  pub(crate) enum Reply {
    Rows(Vec<Record>),
    Fail(&'static str),
    /// Wait for the notify before answering with rows
    Gated(Arc<Notify>, Vec<Record>),
    /// Wait for the notify before failing
    GatedFail(Arc<Notify>, &'static str),
    Hang,
  }

  /// Scripted stand-in for the remote store.
  #[derive(Default)]
  pub(crate) struct FakeSheets {
    pub reads: Mutex<VecDeque<Reply>>,
    pub mutations: Mutex<VecDeque<Result<(), &'static str>>>,
    pub calls: Mutex<Vec<String>>,
  }

  impl FakeSheets {
    pub fn replying(replies: Vec<Reply>) -> Arc<Self> {
      Arc::new(Self {
        reads: Mutex::new(replies.into()),
        ..Self::default()
      })
    }

    pub fn push_mutation(&self, outcome: Result<(), &'static str>) {
      self.mutations.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<String> {
      self.calls.lock().unwrap().clone()
    }

    fn mutate(&self, call: String) -> Result<()> {
      self.calls.lock().unwrap().push(call);
      match self.mutations.lock().unwrap().pop_front() {
        Some(Err(e)) => Err(eyre!("{}", e)),
        _ => Ok(()),
      }
    }
  }

  impl TabularStore for FakeSheets {
    async fn read_sheet(&self, table: &str) -> Result<SheetData> {
      self.calls.lock().unwrap().push(format!("read {}", table));
      let reply = self.reads.lock().unwrap().pop_front();
      let rows = match reply {
        Some(Reply::Rows(rows)) => rows,
        Some(Reply::Fail(e)) => return Err(eyre!("{}", e)),
        Some(Reply::Gated(gate, rows)) => {
          gate.notified().await;
          rows
        }
        Some(Reply::GatedFail(gate, e)) => {
          gate.notified().await;
          return Err(eyre!("{}", e));
        }
        Some(Reply::Hang) => std::future::pending().await,
        None => Vec::new(),
      };
      Ok(SheetData {
        headers: Vec::new(),
        rows,
      })
    }

    async fn add_row(&self, table: &str, row: &Record, unique_column: Option<&str>) -> Result<()> {
      self.mutate(format!("add {} {:?} {:?}", table, row, unique_column))
    }

    async fn update_row(&self, table: &str, row_index: u64, _patch: &Record) -> Result<()> {
      self.mutate(format!("update {} {}", table, row_index))
    }

    async fn delete_row(&self, table: &str, row_index: u64) -> Result<()> {
      self.mutate(format!("delete {} {}", table, row_index))
    }

    async fn delete_group(&self, table: &str, order_no: &str) -> Result<()> {
      self.mutate(format!("delete-group {} {}", table, order_no))
    }
  }

  /// Records everything a load does to the page.
  #[derive(Debug)]
  pub(crate) struct RecordingView<T> {
    pub renders: Vec<(T, CacheSource)>,
    pub messages: Vec<StatusMessage>,
    pub ready: Vec<T>,
  }

  impl<T> Default for RecordingView<T> {
    fn default() -> Self {
      Self {
        renders: Vec::new(),
        messages: Vec::new(),
        ready: Vec::new(),
      }
    }
  }

  impl<T: Clone> DatasetView<T> for RecordingView<T> {
    fn render(&mut self, data: &T, source: CacheSource) {
      self.renders.push((data.clone(), source));
    }

    fn show_message(&mut self, message: &StatusMessage) {
      self.messages.push(message.clone());
    }

    fn data_ready(&mut self, data: &T) {
      self.ready.push(data.clone());
    }
  }

  pub(crate) fn vendor(name: &str, row: u64) -> Record {
    Record::new().with("NAMA VENDOR", name).with_row_index(row)
  }

  pub(crate) fn service(
    store: Arc<MemoryStore>,
    remote: Arc<FakeSheets>,
  ) -> DataService<MemoryStore, FakeSheets> {
    DataService::new(
      DatasetConfig::new("VENDOR", "vendor_data_cache")
        .with_empty_message("No vendor data")
        .with_column_span(9),
      store,
      remote,
    )
  }

  #[tokio::test]
  async fn test_empty_cache_then_remote_rows() {
    let store = Arc::new(MemoryStore::new());
    let rows = vec![vendor("Toko A", 2), vendor("Toko B", 3)];
    let svc = service(store, FakeSheets::replying(vec![Reply::Rows(rows.clone())]));
    let mut view = RecordingView::default();

    let loaded = svc.load_data(&mut view).await;

    assert_eq!(loaded, rows);
    assert_eq!(view.renders, vec![(rows.clone(), CacheSource::Network)]);
    assert_eq!(view.ready, vec![rows.clone()]);
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].kind, MessageKind::Loading);
    assert_eq!(view.messages[0].column_span, 9);

    let entry = svc.get_cached().await.unwrap();
    assert_eq!(entry.payload, Payload::Rows(rows));
  }

  #[tokio::test]
  async fn test_cache_renders_first_even_if_remote_hangs() {
    let store = Arc::new(MemoryStore::new());
    let cached = vec![vendor("Lama", 2)];
    store.set("vendor_data_cache", &Payload::Rows(cached.clone())).await;

    let svc = service(store, FakeSheets::replying(vec![Reply::Hang]));
    let mut view = RecordingView::default();

    let outcome =
      tokio::time::timeout(Duration::from_millis(50), svc.load_data(&mut view)).await;

    assert!(outcome.is_err());
    assert_eq!(view.renders, vec![(cached, CacheSource::CacheFresh)]);
    assert!(view.messages.is_empty());
    // Dropping the hung load still lowers the flag
    assert!(!svc.is_refreshing());
  }

  #[tokio::test]
  async fn test_refresh_overwrites_previous_cache() {
    let store = Arc::new(MemoryStore::new());
    store
      .set("vendor_data_cache", &Payload::Rows(vec![vendor("Lama", 2)]))
      .await;

    let fresh = vec![vendor("Baru", 2), vendor("Lain", 3)];
    let svc = service(store, FakeSheets::replying(vec![Reply::Rows(fresh.clone())]));
    let mut view = RecordingView::default();

    let before = chrono::Utc::now();
    svc.load_data(&mut view).await;

    let entry = svc.get_cached().await.unwrap();
    assert_eq!(entry.payload, Payload::Rows(fresh.clone()));
    assert!(entry.written_at >= before);
    assert_eq!(view.renders.len(), 2);
    assert_eq!(view.renders[1], (fresh, CacheSource::Network));
  }

  #[tokio::test]
  async fn test_empty_remote_keeps_cached_rows() {
    let store = Arc::new(MemoryStore::new());
    let cached = vec![vendor("Lama", 2)];
    store.set("vendor_data_cache", &Payload::Rows(cached.clone())).await;

    let svc = service(store, FakeSheets::replying(vec![Reply::Rows(Vec::new())]));
    let mut view = RecordingView::default();

    let loaded = svc.load_data(&mut view).await;

    assert_eq!(loaded, cached);
    assert_eq!(view.renders.len(), 1);
    assert!(view.messages.is_empty());
    assert!(view.ready.is_empty());
    assert_eq!(
      svc.get_cached().await.unwrap().payload,
      Payload::Rows(cached)
    );
  }

  #[tokio::test]
  async fn test_empty_remote_without_cache_shows_empty_message() {
    let svc = service(
      Arc::new(MemoryStore::new()),
      FakeSheets::replying(vec![Reply::Rows(Vec::new())]),
    );
    let mut view = RecordingView::default();

    let loaded = svc.load_data(&mut view).await;

    assert!(loaded.is_empty());
    assert!(view.renders.is_empty());
    let kinds: Vec<_> = view.messages.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, [MessageKind::Loading, MessageKind::Empty]);
    assert_eq!(view.messages[1].text, "No vendor data");
  }

  #[tokio::test]
  async fn test_failure_without_cache_shows_error() {
    let svc = service(
      Arc::new(MemoryStore::new()),
      FakeSheets::replying(vec![Reply::Fail("Sheet not found: VENDOR")]),
    );
    let mut view = RecordingView::default();

    let loaded = svc.load_data(&mut view).await;

    assert!(loaded.is_empty());
    let last = view.messages.last().unwrap();
    assert_eq!(last.kind, MessageKind::Error);
    assert_eq!(last.text, "Failed to load data: Sheet not found: VENDOR");
    assert!(!svc.is_refreshing());
  }

  #[tokio::test]
  async fn test_failure_with_cache_keeps_stale_view() {
    let store = Arc::new(MemoryStore::new());
    let cached = vec![vendor("Lama", 2)];
    store.set("vendor_data_cache", &Payload::Rows(cached.clone())).await;

    let svc = service(store, FakeSheets::replying(vec![Reply::Fail("timeout")]));
    let mut view = RecordingView::default();

    let loaded = svc.load_data(&mut view).await;

    assert_eq!(loaded, cached);
    assert_eq!(view.renders.len(), 1);
    assert!(view.messages.is_empty());
  }

  #[tokio::test]
  async fn test_refreshing_flag_raised_during_fetch() {
    let gate = Arc::new(Notify::new());
    let svc = service(
      Arc::new(MemoryStore::new()),
      FakeSheets::replying(vec![Reply::Gated(gate.clone(), vec![vendor("A", 2)])]),
    );
    let mut flag = svc.subscribe_refreshing();
    let mut view = RecordingView::default();

    let load = svc.load_data(&mut view);
    let watch = async {
      flag.wait_for(|refreshing| *refreshing).await.unwrap();
      gate.notify_one();
    };
    let (loaded, _) = tokio::join!(load, watch);

    assert_eq!(loaded.len(), 1);
    assert!(!svc.is_refreshing());
  }

  #[tokio::test]
  async fn test_when_stale_policy_skips_fresh_cache() {
    let store = Arc::new(MemoryStore::new());
    let cached = vec![vendor("Lama", 2)];
    store.set("vendor_data_cache", &Payload::Rows(cached.clone())).await;

    let remote = FakeSheets::replying(vec![Reply::Rows(vec![vendor("Baru", 2)])]);
    let svc = service(store, remote.clone());
    let mut view = RecordingView::default();

    let loaded = svc.load_data_with(&mut view, RefreshPolicy::WhenStale).await;

    assert_eq!(loaded, cached);
    assert!(remote.calls().is_empty());
  }

  #[tokio::test]
  async fn test_when_stale_policy_refreshes_expired_cache() {
    let store = Arc::new(MemoryStore::new());
    store
      .set("vendor_data_cache", &Payload::Rows(vec![vendor("Lama", 2)]))
      .await;

    let fresh = vec![vendor("Baru", 2)];
    let svc = service(store, FakeSheets::replying(vec![Reply::Rows(fresh.clone())]))
      .with_validity(Duration::ZERO);
    let mut view = RecordingView::default();

    let loaded = svc.load_data_with(&mut view, RefreshPolicy::WhenStale).await;

    assert_eq!(loaded, fresh);
    assert_eq!(view.renders[0].1, CacheSource::CacheStale);
  }

  #[tokio::test]
  async fn test_grouped_load_groups_and_caches() {
    let rows = vec![
      Record::new().with("NO PESANAN", "INV-1").with("ITEM", "Pot"),
      Record::new().with("ITEM", "Tanah"),
      Record::new().with("NO PESANAN", "INV-2").with("ITEM", "Pupuk"),
    ];
    let svc = DataService::new(
      DatasetConfig::new("INVOICE", "riwayat_data_cache"),
      Arc::new(MemoryStore::new()),
      FakeSheets::replying(vec![Reply::Rows(rows.clone())]),
    );
    let mut view = RecordingView::default();

    let grouped = svc
      .load_grouped_data(&mut view, |rows| group_by_lead_column(rows, &["NO PESANAN"]))
      .await;

    assert_eq!(grouped.order(), ["INV-1", "INV-2"]);
    assert_eq!(grouped.get("INV-1").map(<[Record]>::len), Some(2));
    assert_eq!(view.renders.len(), 1);
    assert_eq!(
      svc.get_cached().await.unwrap().payload.as_grouped(),
      Some(&grouped)
    );
  }

  #[tokio::test]
  async fn test_grouped_load_ignores_flat_cache_and_keeps_grouped_on_empty() {
    let store = Arc::new(MemoryStore::new());
    let mut grouped = GroupedDataset::new();
    grouped.push_row("INV-1", Record::new().with("NO PESANAN", "INV-1"));
    store
      .set("riwayat_data_cache", &Payload::Grouped(grouped.clone()))
      .await;

    let svc = DataService::new(
      DatasetConfig::new("INVOICE", "riwayat_data_cache"),
      store.clone(),
      FakeSheets::replying(vec![Reply::Rows(Vec::new())]),
    );
    let mut view = RecordingView::default();
    let loaded = svc
      .load_grouped_data(&mut view, |rows| group_by_lead_column(rows, &["NO PESANAN"]))
      .await;
    assert_eq!(loaded, grouped);

    // A flat payload under a grouped key is treated as no cache
    store
      .set("riwayat_data_cache", &Payload::Rows(vec![vendor("x", 2)]))
      .await;
    let svc = DataService::new(
      DatasetConfig::new("INVOICE", "riwayat_data_cache"),
      store,
      FakeSheets::replying(vec![Reply::Fail("offline")]),
    );
    let mut view = RecordingView::default();
    let loaded = svc
      .load_grouped_data(&mut view, |rows| group_by_lead_column(rows, &["NO PESANAN"]))
      .await;
    assert!(loaded.is_empty());
    assert_eq!(view.messages.last().map(|m| m.kind), Some(MessageKind::Error));
  }

  #[tokio::test]
  async fn test_overlapping_loads_last_completion_wins_by_default() {
    let slow_gate = Arc::new(Notify::new());
    let remote = FakeSheets::replying(vec![
      Reply::Gated(slow_gate.clone(), vec![vendor("Old", 2)]),
      Reply::Rows(vec![vendor("New", 2)]),
    ]);
    let svc = service(Arc::new(MemoryStore::new()), remote);
    let mut first_view = RecordingView::default();
    let mut second_view = RecordingView::default();

    let first = svc.load_data(&mut first_view);
    let second = async {
      let rows = svc.load_data(&mut second_view).await;
      slow_gate.notify_one();
      rows
    };
    tokio::join!(first, second);

    let cached = svc.get_cached().await.unwrap();
    assert_eq!(cached.payload, Payload::Rows(vec![vendor("Old", 2)]));
  }

  #[tokio::test]
  async fn test_superseded_completion_is_discarded_when_enabled() {
    let slow_gate = Arc::new(Notify::new());
    let remote = FakeSheets::replying(vec![
      Reply::Gated(slow_gate.clone(), vec![vendor("Old", 2)]),
      Reply::Rows(vec![vendor("New", 2)]),
    ]);
    let svc = service(Arc::new(MemoryStore::new()), remote).with_discard_superseded(true);
    let mut first_view = RecordingView::default();
    let mut second_view = RecordingView::default();

    let first = svc.load_data(&mut first_view);
    let second = async {
      let rows = svc.load_data(&mut second_view).await;
      slow_gate.notify_one();
      rows
    };
    tokio::join!(first, second);

    let cached = svc.get_cached().await.unwrap();
    assert_eq!(cached.payload, Payload::Rows(vec![vendor("New", 2)]));
    assert!(first_view.renders.is_empty());
  }

  #[tokio::test]
  async fn test_superseded_empty_or_failed_load_leaves_view_alone() {
    let gate = Arc::new(Notify::new());
    let late_replies = [
      Reply::Gated(gate.clone(), Vec::new()),
      Reply::GatedFail(gate.clone(), "timeout"),
    ];

    for late in late_replies {
      let remote = FakeSheets::replying(vec![late, Reply::Rows(vec![vendor("New", 2)])]);
      let svc = service(Arc::new(MemoryStore::new()), remote).with_discard_superseded(true);
      let mut first_view = RecordingView::default();
      let mut second_view = RecordingView::default();

      let first = svc.load_data(&mut first_view);
      let second = async {
        let rows = svc.load_data(&mut second_view).await;
        gate.notify_one();
        rows
      };
      tokio::join!(first, second);

      assert_eq!(second_view.renders.len(), 1);
      assert!(first_view.renders.is_empty());
      let kinds: Vec<_> = first_view.messages.iter().map(|m| m.kind).collect();
      assert_eq!(kinds, [MessageKind::Loading]);
      assert_eq!(
        svc.get_cached().await.unwrap().payload,
        Payload::Rows(vec![vendor("New", 2)])
      );
    }
  }

  #[tokio::test]
  async fn test_clear_and_update_cache() {
    let svc = service(Arc::new(MemoryStore::new()), FakeSheets::replying(Vec::new()));
    assert!(svc.update_cache(&Payload::Rows(vec![vendor("A", 2)])).await);
    assert!(svc.get_cached().await.is_some());
    assert!(svc.clear_cache().await);
    assert!(svc.get_cached().await.is_none());
    assert_eq!(svc.config().indicator_id(), "vendor_data_cache_refreshIndicator");
  }
}
