//! Dataset loading on top of the cache and the remote store.

pub mod data_service;
mod grouping;
mod lookup;
pub mod optimistic;
mod registry;
mod session;

pub use data_service::{
  DataService, DatasetConfig, DatasetView, MessageKind, RefreshPolicy, StatusMessage,
  LOADING_MESSAGE,
};
pub use grouping::{group_by_lead_column, DocumentGrouping, GroupKeyColumns, RowFilter};
pub use lookup::{column_containing, first_non_blank, first_present, FieldAliases};
pub use optimistic::{apply_then_confirm, MutationError};
pub use registry::{DataServices, Preset, PRESETS};
pub use session::{DatasetSession, GroupedSession, UniqueField};
