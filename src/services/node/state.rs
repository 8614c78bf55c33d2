use async_trait::async_trait;
use serde_json::Value;

use crate::{
    config::StateBackend,
    error::Result,
    services::node::{StateSource, ensure_success, read_json},
};

pub struct StateClient {
    client: reqwest::Client,
    url: String,
    wallet_id: Option<String>,
    contract_id: String,
    label: &'static str,
}

impl StateClient {
    pub fn new(client: reqwest::Client, backend: &StateBackend, contract_id: &str) -> Self {
        let (url, wallet_id, label) = match backend {
            StateBackend::Wallet { target, wallet_id } => (
                format!("{}/wallet/nano-contracts/state", target.trim_end_matches('/')),
                wallet_id.clone().filter(|id| !id.is_empty()),
                "wallet",
            ),
            StateBackend::Node { url } => (
                format!("{}/nano_contract/state", url.trim_end_matches('/')),
                None,
                "node",
            ),
        };

        Self {
            client,
            url,
            wallet_id,
            contract_id: contract_id.to_string(),
            label,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn query_params(&self, calls: &[String], fields: &[String]) -> Vec<(&'static str, String)> {
        let mut params = vec![("id", self.contract_id.clone())];
        params.extend(calls.iter().map(|call| ("calls[]", call.clone())));
        params.extend(fields.iter().map(|field| ("fields[]", field.clone())));
        params
    }
}

#[async_trait]
impl StateSource for StateClient {
    async fn query(&self, calls: &[String], fields: &[String]) -> Result<Value> {
        let mut request = self
            .client
            .get(&self.url)
            .query(&self.query_params(calls, fields));
        if let Some(wallet_id) = &self.wallet_id {
            request = request.header("X-Wallet-Id", wallet_id);
        }

        let json = read_json(request.send().await?, "State").await?;

        // Wallet responses nest the payload under `state`.
        let payload = match json.get("state") {
            Some(state) if state.is_object() => state.clone(),
            _ => json,
        };
        ensure_success(&payload, "State")?;
        Ok(payload)
    }

    fn label(&self) -> &'static str {
        self.label
    }
}
