use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Report, Result};
use reqwest::header::CONTENT_TYPE;
use std::future::Future;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

use super::api_types::{parse_response, ApiRequest, ApiResponse, OrderRef};
use super::types::{DocumentId, DocumentKind, LoginOutcome, Record, SheetData};

/// The four row operations of the remote tabular store, plus whole-document
/// delete for grouped sheets.
///
/// Row indexes are the 1-based physical positions reported by `read_sheet`.
/// Deleting shifts every later row, so callers holding other indexes must
/// reload afterwards.
pub trait TabularStore: Send + Sync {
  fn read_sheet(&self, table: &str) -> impl Future<Output = Result<SheetData>> + Send;

  fn add_row(
    &self,
    table: &str,
    row: &Record,
    unique_column: Option<&str>,
  ) -> impl Future<Output = Result<()>> + Send;

  fn update_row(
    &self,
    table: &str,
    row_index: u64,
    patch: &Record,
  ) -> impl Future<Output = Result<()>> + Send;

  fn delete_row(&self, table: &str, row_index: u64) -> impl Future<Output = Result<()>> + Send;

  /// Delete every row of one grouped document: the header row carrying
  /// `order_no` and the continuation rows below it.
  fn delete_group(&self, table: &str, order_no: &str) -> impl Future<Output = Result<()>> + Send;
}

/// True when the store rejected an add because of its unique column.
pub fn is_duplicate_entry(error: &Report) -> bool {
  error.to_string().contains("Duplicate entry")
}

/// HTTP client for the spreadsheet web-app endpoint.
#[derive(Clone)]
pub struct SheetsClient {
  http: reqwest::Client,
  endpoint: Url,
}

impl SheetsClient {
  pub fn new(config: &Config) -> Result<Self> {
    Self::with_endpoint(config.api_url()?)
  }

  pub fn with_endpoint(endpoint: Url) -> Result<Self> {
    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, endpoint })
  }

  /// Check a username/password pair against the users sheet. A rejected
  /// login is a normal outcome, not an error.
  pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
    let response = self
      .post(&ApiRequest::Login { username, password })
      .await?;
    Ok(response.into_login())
  }

  /// Reserve the next document number for `date`.
  pub async fn next_document_id(
    &self,
    kind: DocumentKind,
    date: NaiveDate,
  ) -> Result<DocumentId> {
    let date = date.format("%Y-%m-%d").to_string();
    self
      .post(&ApiRequest::GetNextId {
        kind: kind.code(),
        date: &date,
      })
      .await?
      .into_document_id()
  }

  /// Preview the next document number without consuming it.
  pub async fn peek_document_id(
    &self,
    kind: DocumentKind,
    date: NaiveDate,
  ) -> Result<DocumentId> {
    let date = date.format("%Y-%m-%d").to_string();
    self
      .post(&ApiRequest::PeekNextId {
        kind: kind.code(),
        date: &date,
      })
      .await?
      .into_document_id()
  }

  /// Bump the transaction count of the customer whose phone number matches,
  /// returning the new count.
  pub async fn increment_customer_transaction(&self, phone_number: &str) -> Result<u64> {
    self
      .post(&ApiRequest::IncrementTransaction { phone_number })
      .await?
      .into_transaction_count()
  }

  async fn post(&self, request: &ApiRequest<'_>) -> Result<ApiResponse> {
    let body =
      serde_json::to_string(request).map_err(|e| eyre!("Failed to encode request: {}", e))?;

    // text/plain keeps the web-app endpoint from demanding a CORS preflight
    let text = self
      .http
      .post(self.endpoint.clone())
      .header(CONTENT_TYPE, "text/plain")
      .body(body)
      .send()
      .await
      .map_err(|e| eyre!("Request to sheet endpoint failed: {}", e))?
      .text()
      .await
      .map_err(|e| eyre!("Failed to read sheet endpoint response: {}", e))?;

    parse_response(&text)
  }
}

impl TabularStore for SheetsClient {
  async fn read_sheet(&self, table: &str) -> Result<SheetData> {
    let mut url = self.endpoint.clone();
    url
      .query_pairs_mut()
      .append_pair("sheet", table)
      .append_pair("action", "read");

    let text = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch sheet {}: {}", table, e))?
      .text()
      .await
      .map_err(|e| eyre!("Failed to read sheet {}: {}", table, e))?;

    let sheet = parse_response(&text)
      .map_err(|e| {
        warn!("Error fetching sheet {}: {}", table, e);
        e
      })?
      .into_sheet();
    debug!("Read {} rows from sheet {}", sheet.rows.len(), table);

    Ok(sheet)
  }

  async fn add_row(&self, table: &str, row: &Record, unique_column: Option<&str>) -> Result<()> {
    self
      .post(&ApiRequest::Add {
        sheet: table,
        data: row,
        unique_column,
      })
      .await?
      .ensure_success("add")?;
    Ok(())
  }

  async fn update_row(&self, table: &str, row_index: u64, patch: &Record) -> Result<()> {
    self
      .post(&ApiRequest::Update {
        sheet: table,
        row_index,
        data: patch,
      })
      .await?
      .ensure_success("update")?;
    Ok(())
  }

  async fn delete_row(&self, table: &str, row_index: u64) -> Result<()> {
    self
      .post(&ApiRequest::Delete {
        sheet: table,
        row_index,
      })
      .await?
      .ensure_success("delete")?;
    Ok(())
  }

  async fn delete_group(&self, table: &str, order_no: &str) -> Result<()> {
    self
      .post(&ApiRequest::DeleteInvoice {
        sheet: table,
        data: OrderRef { order_no },
      })
      .await?
      .ensure_success("delete-invoice")?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;

  #[test]
  fn test_duplicate_entry_detection() {
    let err = eyre!("Duplicate entry: NO HP '62811' already exists.");
    assert!(is_duplicate_entry(&err));
    assert!(!is_duplicate_entry(&eyre!("Sheet not found: KOSTUMER")));
  }
}
