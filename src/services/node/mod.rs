//! HTTP clients for the contract node: state queries, transaction history
//! and the argument decoder used to replay history.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};

pub mod decoder;
pub mod history;
pub mod state;

pub use decoder::{ArgumentDecoder, DecodeRequest, HttpArgumentDecoder};
pub use history::{HistoryClient, HistoryEntry, HistoryPage};
pub use state::StateClient;

/// Contract state queries (`calls[]` / `fields[]`).
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Returns the state payload for the requested calls and fields.
    async fn query(&self, calls: &[String], fields: &[String]) -> Result<Value>;

    /// Short label for logs.
    fn label(&self) -> &'static str;
}

/// Contract transaction history, newest first.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn page(&self, after: Option<&str>) -> Result<HistoryPage>;
}

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Reads a JSON body, turning non-2xx statuses and `success: false` into upstream errors.
pub(crate) async fn read_json(response: reqwest::Response, what: &str) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    let json: Option<Value> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        let message = json
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    format!("{what} request failed ({status})")
                } else {
                    text.clone()
                }
            });
        return Err(AppError::Upstream(message));
    }

    let json = json.ok_or_else(|| AppError::Upstream(format!("{what} response is not JSON")))?;
    ensure_success(&json, what)?;
    Ok(json)
}

pub(crate) fn ensure_success(json: &Value, what: &str) -> Result<()> {
    if json.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(AppError::Upstream(
            error_message(json).unwrap_or_else(|| format!("{what} request failed.")),
        ));
    }
    Ok(())
}

fn error_message(json: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .filter_map(|key| json.get(*key))
        .find_map(|value| match value {
            Value::String(text) if !text.is_empty() => Some(text.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
}
