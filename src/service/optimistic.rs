//! Apply an edit locally, confirm it remotely, undo it if the remote says no.

use color_eyre::{eyre::Report, Result};
use std::fmt;
use std::future::Future;
use tracing::{debug, warn};

use crate::cache::{CacheSource, CacheStore, Dataset};
use crate::sheets::TabularStore;

use super::data_service::{DataService, DatasetView};

/// A remote mutation that failed after its optimistic edit was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationError {
  pub action: String,
  pub message: String,
}

impl fmt::Display for MutationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Failed to {}: {}", self.action, self.message)
  }
}

impl std::error::Error for MutationError {}

/// Run `mutate` on `local`, publish the result, then await `remote`.
///
/// The pre-mutation view is captured before `mutate` runs. If `mutate`
/// itself fails nothing is published. If `remote` fails, the pre-image is put
/// back into `local` and the cache, re-rendered, and the failure returned as a
/// [`MutationError`].
pub async fn apply_then_confirm<S, R, T, V, F, Fut>(
  service: &DataService<S, R>,
  local: &mut T,
  view: &mut V,
  action: &str,
  mutate: F,
  remote: Fut,
) -> Result<()>
where
  S: CacheStore,
  R: TabularStore,
  T: Dataset,
  V: DatasetView<T> + ?Sized,
  F: FnOnce(&mut T) -> Result<()>,
  Fut: Future<Output = Result<()>>,
{
  let before = local.clone();
  mutate(local)?;

  service.update_cache(&local.to_payload()).await;
  view.render(local, CacheSource::Optimistic);

  match remote.await {
    Ok(()) => {
      debug!("{} confirmed for {}", action, service.table_name());
      Ok(())
    }
    Err(e) => {
      warn!(
        "Failed to {} in {}, rolling back: {:#}",
        action,
        service.table_name(),
        e
      );
      *local = before;
      service.update_cache(&local.to_payload()).await;
      view.render(local, CacheSource::RolledBack);

      Err(Report::new(MutationError {
        action: action.to_string(),
        message: e.to_string(),
      }))
    }
  }
}
