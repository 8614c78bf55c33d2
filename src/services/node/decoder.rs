use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::{AppError, Result},
    services::node::read_json,
};

/// Everything needed to decode the raw arguments of one contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeRequest {
    pub blueprint_id: String,
    pub method: String,
    pub address: String,
    pub network: String,
    pub args: String,
}

impl DecodeRequest {
    /// Keyed per network: addresses in decoded args are network specific.
    fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.network, self.blueprint_id, self.method, self.args
        )
    }
}

#[async_trait]
pub trait ArgumentDecoder: Send + Sync {
    /// Decoded argument list, in call order.
    async fn decode(&self, request: &DecodeRequest) -> Result<Vec<Value>>;
}

pub struct HttpArgumentDecoder {
    client: reqwest::Client,
    url: String,
    cache: Cache<String, Arc<Vec<Value>>>,
}

impl HttpArgumentDecoder {
    pub fn new(client: reqwest::Client, url: &str, cache_capacity: u64) -> Self {
        Self {
            client,
            url: url.to_string(),
            cache: Cache::builder().max_capacity(cache_capacity).build(),
        }
    }
}

#[async_trait]
impl ArgumentDecoder for HttpArgumentDecoder {
    async fn decode(&self, request: &DecodeRequest) -> Result<Vec<Value>> {
        let key = request.cache_key();
        if let Some(cached) = self.cache.get(&key).await {
            return Ok((*cached).clone());
        }

        let response = self.client.post(&self.url).json(request).send().await?;
        let json = read_json(response, "Decoder").await?;
        let args = decoded_args(json)?;

        self.cache.insert(key, Arc::new(args.clone())).await;
        Ok(args)
    }
}

/// The decoder may answer with a bare list or `{args|parsed_args: [...]}`.
fn decoded_args(json: Value) -> Result<Vec<Value>> {
    match json {
        Value::Array(args) => Ok(args),
        Value::Object(mut map) => ["args", "parsed_args"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(args)) => Some(args),
                _ => None,
            })
            .ok_or_else(|| AppError::Decode("Decoder response carries no argument list".into())),
        _ => Err(AppError::Decode("Unexpected decoder response".into())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_both_reply_shapes() {
        let args = vec![json!({"value": 1}), json!({"value": 2})];
        assert_eq!(decoded_args(json!(args.clone())).unwrap(), args);
        assert_eq!(decoded_args(json!({"parsed_args": args.clone()})).unwrap(), args);
        assert_eq!(decoded_args(json!({"args": args.clone()})).unwrap(), args);
    }

    #[test]
    fn rejects_replies_without_arguments() {
        assert!(matches!(decoded_args(json!({"ok": true})), Err(AppError::Decode(_))));
        assert!(matches!(decoded_args(json!("nope")), Err(AppError::Decode(_))));
    }

    #[test]
    fn request_serializes_flat() {
        let request = DecodeRequest {
            blueprint_id: "bp".into(),
            method: "paint".into(),
            address: "addr".into(),
            network: "testnet".into(),
            args: "00ff".into(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"blueprint_id": "bp", "method": "paint", "address": "addr", "network": "testnet", "args": "00ff"})
        );
        assert_eq!(request.cache_key(), "testnet:bp:paint:00ff");
    }

    #[test]
    fn cache_key_separates_networks() {
        let testnet = DecodeRequest {
            blueprint_id: "bp".into(),
            method: "paint".into(),
            address: "addr".into(),
            network: "testnet".into(),
            args: "00ff".into(),
        };
        let mainnet = DecodeRequest {
            network: "mainnet".into(),
            ..testnet.clone()
        };
        assert_ne!(testnet.cache_key(), mainnet.cache_key());
    }
}
