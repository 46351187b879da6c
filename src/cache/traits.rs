//! Core traits and types for the caching system.

use std::future::Future;

use super::entry::{CacheEntry, Payload};

/// Durable key/value store for dataset views.
///
/// Every operation fails soft: storage trouble is logged and reported as a
/// miss (`None`) or `false`, never as an error. A missing cache only costs a
/// loading state, so nothing here is worth failing a page over.
pub trait CacheStore: Send + Sync {
  /// Read the entry for `key`.
  fn get(&self, key: &str) -> impl Future<Output = Option<CacheEntry>> + Send;

  /// Overwrite the entry for `key`, stamping it with the current time.
  /// Returns whether the payload was actually stored.
  fn set(&self, key: &str, payload: &Payload) -> impl Future<Output = bool> + Send;

  /// Delete the entry for `key`.
  fn clear(&self, key: &str) -> impl Future<Output = bool> + Send;

  /// Delete every entry.
  fn clear_all(&self) -> impl Future<Output = bool> + Send;
}

/// Indicates where rendered data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the remote store
  Network,
  /// Data from cache, still inside the validity window
  CacheFresh,
  /// Data from cache, past the validity window; a refresh is under way
  CacheStale,
  /// Local edit not yet confirmed by the remote store
  Optimistic,
  /// Local edit undone after the remote store rejected it
  RolledBack,
}

impl CacheSource {
  pub fn is_cached(self) -> bool {
    matches!(self, CacheSource::CacheFresh | CacheSource::CacheStale)
  }
}
