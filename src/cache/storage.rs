//! Cache store implementations: SQLite on disk, in-process memory, and a no-op.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::entry::{CacheEntry, Payload};
use super::traits::CacheStore;

/// Store that doesn't cache anything.
/// Used when caching is disabled - every read misses, every write is dropped
/// and reported as not stored.
pub struct NoopStore;

impl CacheStore for NoopStore {
  async fn get(&self, _key: &str) -> Option<CacheEntry> {
    None // Always miss
  }

  async fn set(&self, _key: &str, _payload: &Payload) -> bool {
    false
  }

  async fn clear(&self, _key: &str) -> bool {
    true
  }

  async fn clear_all(&self) -> bool {
    true
  }
}

/// Process-local store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, (Payload, DateTime<Utc>)>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStore for MemoryStore {
  async fn get(&self, key: &str) -> Option<CacheEntry> {
    let entries = match self.entries.lock() {
      Ok(entries) => entries,
      Err(e) => {
        warn!("Memory cache lock poisoned: {}", e);
        return None;
      }
    };

    entries.get(key).map(|(payload, written_at)| CacheEntry {
      key: key.to_string(),
      payload: payload.clone(),
      written_at: *written_at,
    })
  }

  async fn set(&self, key: &str, payload: &Payload) -> bool {
    let Ok(mut entries) = self.entries.lock() else {
      warn!("Memory cache lock poisoned, dropping write for {}", key);
      return false;
    };

    let now = Utc::now();
    let written_at = match entries.get(key) {
      Some((_, previous)) if *previous > now => *previous,
      _ => now,
    };
    entries.insert(key.to_string(), (payload.clone(), written_at));
    true
  }

  async fn clear(&self, key: &str) -> bool {
    match self.entries.lock() {
      Ok(mut entries) => {
        entries.remove(key);
        true
      }
      Err(_) => false,
    }
  }

  async fn clear_all(&self) -> bool {
    match self.entries.lock() {
      Ok(mut entries) => {
        entries.clear();
        true
      }
      Err(_) => false,
    }
  }
}

/// Where a SQLite store keeps its data.
#[derive(Debug, Clone)]
enum Location {
  File(PathBuf),
  Memory,
}

/// SQLite-backed durable store.
///
/// The connection is opened on first use and shared for the life of the
/// store. Callers that race on that first use wait for the same open.
pub struct SqliteStore {
  location: Location,
  conn: OnceCell<Mutex<Connection>>,
  opened: AtomicUsize,
}

/// Schema for the cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS data_cache (
    key TEXT PRIMARY KEY,
    payload BLOB NOT NULL,
    written_at INTEGER NOT NULL
);
"#;

impl SqliteStore {
  /// Store backed by the file at `path`. Nothing is opened until first use.
  pub fn at_path(path: impl Into<PathBuf>) -> Self {
    Self::with_location(Location::File(path.into()))
  }

  /// Private in-memory database; handy for tests and `--no-cache` style runs.
  pub fn in_memory() -> Self {
    Self::with_location(Location::Memory)
  }

  fn with_location(location: Location) -> Self {
    Self {
      location,
      conn: OnceCell::new(),
      opened: AtomicUsize::new(0),
    }
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("larosa").join("cache.db"))
  }

  /// Shared connection, opening it on first call.
  async fn handle(&self) -> Result<&Mutex<Connection>> {
    self
      .conn
      .get_or_try_init(|| async { self.connect().map(Mutex::new) })
      .await
  }

  fn connect(&self) -> Result<Connection> {
    let conn = match &self.location {
      Location::File(path) => Self::open_file(path)?,
      Location::Memory => Connection::open_in_memory()
        .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?,
    };

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    self.opened.fetch_add(1, Ordering::SeqCst);
    info!("Opened cache database ({:?})", self.location);
    Ok(conn)
  }

  fn open_file(path: &Path) -> Result<Connection> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))
  }

  #[cfg(test)]
  fn connections_opened(&self) -> usize {
    self.opened.load(Ordering::SeqCst)
  }

  async fn try_get(&self, key: &str) -> Result<Option<CacheEntry>> {
    let conn = self
      .handle()
      .await?
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, i64)> = conn
      .query_row(
        "SELECT payload, written_at FROM data_cache WHERE key = ?1",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", key, e))?;

    let Some((data, written_ms)) = row else {
      return Ok(None);
    };

    let payload: Payload = serde_json::from_slice(&data)
      .map_err(|e| eyre!("Corrupt cache entry {}: {}", key, e))?;
    let written_at = DateTime::from_timestamp_millis(written_ms)
      .ok_or_else(|| eyre!("Corrupt timestamp {} on cache entry {}", written_ms, key))?;

    Ok(Some(CacheEntry {
      key: key.to_string(),
      payload,
      written_at,
    }))
  }

  async fn try_set(&self, key: &str, payload: &Payload) -> Result<()> {
    let data =
      serde_json::to_vec(payload).map_err(|e| eyre!("Failed to serialize payload: {}", e))?;
    let now = Utc::now().timestamp_millis();

    let conn = self
      .handle()
      .await?
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // Overwrite, but never move written_at backwards if the clock did
    conn
      .execute(
        "INSERT INTO data_cache (key, payload, written_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
           payload = excluded.payload,
           written_at = MAX(data_cache.written_at, excluded.written_at)",
        params![key, data, now],
      )
      .map_err(|e| eyre!("Failed to store cache entry {}: {}", key, e))?;

    Ok(())
  }

  async fn try_clear(&self, key: Option<&str>) -> Result<usize> {
    let conn = self
      .handle()
      .await?
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = match key {
      Some(key) => conn.execute("DELETE FROM data_cache WHERE key = ?1", params![key]),
      None => conn.execute("DELETE FROM data_cache", []),
    }
    .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(removed)
  }
}

impl CacheStore for SqliteStore {
  async fn get(&self, key: &str) -> Option<CacheEntry> {
    match self.try_get(key).await {
      Ok(entry) => entry,
      Err(e) => {
        warn!("Cache read failed, treating as miss: {:#}", e);
        None
      }
    }
  }

  async fn set(&self, key: &str, payload: &Payload) -> bool {
    match self.try_set(key, payload).await {
      Ok(()) => {
        debug!("Cache saved: {}", key);
        true
      }
      Err(e) => {
        warn!("Cache write failed: {:#}", e);
        false
      }
    }
  }

  async fn clear(&self, key: &str) -> bool {
    match self.try_clear(Some(key)).await {
      Ok(_) => true,
      Err(e) => {
        warn!("Cache clear failed for {}: {:#}", key, e);
        false
      }
    }
  }

  async fn clear_all(&self) -> bool {
    match self.try_clear(None).await {
      Ok(removed) => {
        info!("All cache cleared ({} entries)", removed);
        true
      }
      Err(e) => {
        warn!("Cache clear failed: {:#}", e);
        false
      }
    }
  }
}
