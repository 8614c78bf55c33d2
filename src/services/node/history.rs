use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::Result,
    services::node::{HistorySource, read_json},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallContext {
    pub caller_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    pub hash: Option<String>,
    pub tx_id: Option<String>,
    pub is_voided: Option<bool>,
    pub nc_method: Option<String>,
    pub nc_args: Option<String>,
    pub nc_address: Option<String>,
    pub nc_blueprint_id: Option<String>,
    pub nc_context: Option<CallContext>,
}

impl HistoryEntry {
    pub fn is_voided(&self) -> bool {
        self.is_voided.unwrap_or(false)
    }

    pub fn sender(&self) -> Option<String> {
        self.nc_context
            .as_ref()
            .and_then(|context| context.caller_id.clone())
            .filter(|caller| !caller.is_empty())
            .or_else(|| self.nc_address.clone())
    }

    pub fn tx_hash(&self) -> Option<String> {
        self.hash.clone().or_else(|| self.tx_id.clone())
    }
}

pub struct HistoryClient {
    client: reqwest::Client,
    url: String,
    contract_id: String,
    page_size: u64,
}

impl HistoryClient {
    pub fn new(client: reqwest::Client, node_url: &str, contract_id: &str, page_size: u64) -> Self {
        Self {
            client,
            url: format!("{}/nano_contract/history", node_url.trim_end_matches('/')),
            contract_id: contract_id.to_string(),
            page_size,
        }
    }
}

#[async_trait]
impl HistorySource for HistoryClient {
    async fn page(&self, after: Option<&str>) -> Result<HistoryPage> {
        let mut params = vec![
            ("id", self.contract_id.clone()),
            ("count", self.page_size.to_string()),
        ];
        if let Some(after) = after {
            params.push(("after", after.to_string()));
        }

        let response = self.client.get(&self.url).query(&params).send().await?;
        let json = read_json(response, "History").await?;
        parse_page(json)
    }
}

/// Entries that do not match the expected shape are dropped, not fatal.
fn parse_page(json: Value) -> Result<HistoryPage> {
    let has_more = json.get("has_more").and_then(Value::as_bool).unwrap_or(false);
    let history = match json.get("history") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed history entry");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(HistoryPage { history, has_more })
}
