use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sheets::{GroupedDataset, Record};

/// How long after a write an entry counts as fresh.
pub const VALIDITY_WINDOW: Duration = Duration::from_secs(5 * 60);

/// What a cache key holds: flat rows or grouped documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
  Rows(Vec<Record>),
  Grouped(GroupedDataset),
}

impl Payload {
  pub fn as_rows(&self) -> Option<&[Record]> {
    match self {
      Payload::Rows(rows) => Some(rows),
      Payload::Grouped(_) => None,
    }
  }

  pub fn as_grouped(&self) -> Option<&GroupedDataset> {
    match self {
      Payload::Grouped(grouped) => Some(grouped),
      Payload::Rows(_) => None,
    }
  }
}

impl From<Vec<Record>> for Payload {
  fn from(rows: Vec<Record>) -> Self {
    Payload::Rows(rows)
  }
}

impl From<GroupedDataset> for Payload {
  fn from(grouped: GroupedDataset) -> Self {
    Payload::Grouped(grouped)
  }
}

/// The last value written under a key, with its write time.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  pub key: String,
  pub payload: Payload,
  pub written_at: DateTime<Utc>,
}

impl CacheEntry {
  /// Fresh means strictly less than `window` has passed since the write.
  pub fn is_fresh_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
    let age_ms = now.timestamp_millis() - self.written_at.timestamp_millis();
    age_ms < window.as_millis() as i64
  }

  pub fn is_fresh(&self, window: Duration) -> bool {
    self.is_fresh_at(Utc::now(), window)
  }

  /// Take the payload as a particular dataset shape, if it has that shape.
  pub fn into_dataset<T: Dataset>(self) -> Option<T> {
    T::from_payload(self.payload)
  }
}

/// A cacheable view of one sheet: rows as read, or rows grouped into documents.
pub trait Dataset: Clone + Default + Send + Sync {
  fn from_payload(payload: Payload) -> Option<Self>;

  fn to_payload(&self) -> Payload;

  /// Whether the view has anything worth showing instead of a loading state.
  fn has_content(&self) -> bool;
}

impl Dataset for Vec<Record> {
  fn from_payload(payload: Payload) -> Option<Self> {
    match payload {
      Payload::Rows(rows) => Some(rows),
      Payload::Grouped(_) => None,
    }
  }

  fn to_payload(&self) -> Payload {
    Payload::Rows(self.clone())
  }

  fn has_content(&self) -> bool {
    !self.is_empty()
  }
}

impl Dataset for GroupedDataset {
  fn from_payload(payload: Payload) -> Option<Self> {
    match payload {
      Payload::Grouped(grouped) => Some(grouped),
      Payload::Rows(_) => None,
    }
  }

  fn to_payload(&self) -> Payload {
    Payload::Grouped(self.clone())
  }

  fn has_content(&self) -> bool {
    !self.is_empty()
  }
}
