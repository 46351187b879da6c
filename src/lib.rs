//! Client-side data layer for the Larosa point-of-sale app.
//!
//! The app keeps its data in a spreadsheet reached through a small RPC
//! endpoint. This crate sits between the page controllers and that endpoint:
//! - `cache` persists the last good view of every dataset
//! - `sheets` talks to the remote tabular store
//! - `service` implements stale-while-revalidate loading, grouped documents
//!   and optimistic mutations with rollback

pub mod cache;
pub mod config;
pub mod logging;
pub mod service;
pub mod sheets;
