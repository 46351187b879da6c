//! Serde types matching the sheet endpoint's request and response bodies.
//!
//! Kept apart from the domain types so the wire quirks (camelCase keys, the
//! `action` discriminator, `{ error }` failures) stay in one place.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};

use super::types::{DocumentId, LoginOutcome, Record, SheetData};

// ============================================================================
// Requests
// ============================================================================

/// POST body. The endpoint dispatches on `action`.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ApiRequest<'a> {
  Add {
    sheet: &'a str,
    data: &'a Record,
    #[serde(rename = "uniqueColumn", skip_serializing_if = "Option::is_none")]
    unique_column: Option<&'a str>,
  },
  Update {
    sheet: &'a str,
    #[serde(rename = "rowIndex")]
    row_index: u64,
    data: &'a Record,
  },
  Delete {
    sheet: &'a str,
    #[serde(rename = "rowIndex")]
    row_index: u64,
  },
  DeleteInvoice {
    sheet: &'a str,
    data: OrderRef<'a>,
  },
  Login {
    username: &'a str,
    password: &'a str,
  },
  GetNextId {
    #[serde(rename = "type")]
    kind: &'a str,
    date: &'a str,
  },
  PeekNextId {
    #[serde(rename = "type")]
    kind: &'a str,
    date: &'a str,
  },
  IncrementTransaction {
    #[serde(rename = "phoneNumber")]
    phone_number: &'a str,
  },
}

#[derive(Debug, Serialize)]
pub struct OrderRef<'a> {
  #[serde(rename = "noPesanan")]
  pub order_no: &'a str,
}

// ============================================================================
// Responses
// ============================================================================

/// Every action answers with some subset of these fields.
#[derive(Debug, Default, Deserialize)]
pub struct ApiResponse {
  #[serde(default)]
  pub success: bool,
  pub error: Option<String>,
  pub detail: Option<String>,
  pub message: Option<String>,
  #[serde(default)]
  pub headers: Vec<String>,
  #[serde(default)]
  pub data: Vec<Record>,
  pub user: Option<String>,
  pub id: Option<String>,
  pub count: Option<u64>,
  #[serde(rename = "newCount")]
  pub new_count: Option<u64>,
}

/// Parse a response body. A body carrying `error` is a failure whatever the
/// HTTP status was.
pub fn parse_response(body: &str) -> Result<ApiResponse> {
  let response: ApiResponse = serde_json::from_str(body)
    .map_err(|e| eyre!("Malformed response from sheet endpoint: {}", e))?;

  if let Some(error) = response.error {
    return Err(match response.detail {
      Some(detail) => eyre!("{} ({})", error, detail),
      None => eyre!("{}", error),
    });
  }

  Ok(response)
}

impl ApiResponse {
  /// Mutations answer `{ success: true }`; anything else is a failure.
  pub fn ensure_success(self, action: &str) -> Result<Self> {
    if self.success {
      Ok(self)
    } else {
      Err(eyre!(
        "{}",
        self
          .message
          .unwrap_or_else(|| format!("{} was not acknowledged", action))
      ))
    }
  }

  pub fn into_sheet(self) -> SheetData {
    SheetData {
      headers: self.headers,
      rows: self.data,
    }
  }

  pub fn into_login(self) -> LoginOutcome {
    LoginOutcome {
      success: self.success,
      message: self.message.unwrap_or_default(),
      user: self.user,
    }
  }

  pub fn into_document_id(self) -> Result<DocumentId> {
    let id = self
      .id
      .ok_or_else(|| eyre!("Counter response did not include an id"))?;
    Ok(DocumentId {
      id,
      count: self.count.unwrap_or(0),
    })
  }

  pub fn into_transaction_count(self) -> Result<u64> {
    self
      .ensure_success("increment-transaction")?
      .new_count
      .ok_or_else(|| eyre!("Increment response did not include the new count"))
  }
}
