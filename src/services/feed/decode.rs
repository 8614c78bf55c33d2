use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value;

use crate::codec::{Paint, PaintMethod};

/// What a feed message carries for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxData {
    pub tx_hash: Option<String>,
    pub blob: String,
}

/// A decoded paint call from the feed, before the contract filter is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCall {
    pub method: PaintMethod,
    pub contract: Option<String>,
    pub sender: Option<String>,
    pub paints: Vec<Paint>,
}

pub fn extract_tx_data(message: &Value) -> Option<TxData> {
    let result = message.get("result")?;

    let tx_hash = result
        .get("events")
        .and_then(|events| events.get("tx.hash"))
        .and_then(|hashes| hashes.get(0))
        .and_then(Value::as_str)
        .map(str::to_string);

    let value = result.get("data").and_then(|data| data.get("value"))?;
    let blob = value
        .get("TxResult")
        .and_then(|tx_result| tx_result.get("tx"))
        .or_else(|| value.get("tx"))
        .and_then(Value::as_str)?;

    Some(TxData {
        tx_hash,
        blob: blob.to_string(),
    })
}

/// base64 -> hex text -> JSON. A trailing odd nibble is ignored.
pub fn decode_tx_blob(blob: &str) -> Option<Value> {
    let hex_text = STANDARD.decode(blob.trim()).ok()?;
    let hex_text = hex_text.trim_ascii();
    let even = hex_text.len() / 2 * 2;
    let bytes = hex::decode(&hex_text[..even]).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Reads the `payload` of a decoded transaction. Non-paint calls yield `None`.
pub fn parse_payload(tx: &Value) -> Option<FeedCall> {
    let payload = tx.get("payload")?;
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };

    let method = text("function")
        .or_else(|| text("method"))
        .and_then(|name| PaintMethod::from_name(&name))?;

    let paints = match payload.get("kwargs").or_else(|| payload.get("args")) {
        Some(Value::Array(args)) => method.paints_from_args(args),
        Some(kwargs @ Value::Object(_)) => method.paints_from_kwargs(kwargs),
        _ => Vec::new(),
    };

    Some(FeedCall {
        method,
        contract: text("contract"),
        sender: text("sender"),
        paints,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;
    use crate::codec::Coord;

    /// Encodes a transaction the way the node does: JSON -> hex -> base64.
    pub fn encode_tx(tx: &Value) -> String {
        STANDARD.encode(hex::encode(tx.to_string()))
    }

    pub fn feed_message(tx: &Value, tx_hash: &str) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "events": {"tx.hash": [tx_hash]},
                "data": {"value": {"TxResult": {"tx": encode_tx(tx)}}}
            }
        })
    }

    #[test]
    fn extracts_hash_and_blob() {
        let message = feed_message(&json!({"payload": {}}), "abc");
        let data = extract_tx_data(&message).unwrap();
        assert_eq!(data.tx_hash.as_deref(), Some("abc"));
        assert_eq!(decode_tx_blob(&data.blob), Some(json!({"payload": {}})));
    }

    #[test]
    fn blob_may_sit_directly_under_value() {
        let message = json!({"result": {"data": {"value": {"tx": "e30="}}}});
        let data = extract_tx_data(&message).unwrap();
        assert_eq!(data.tx_hash, None);
        assert_eq!(data.blob, "e30=");
    }

    #[test]
    fn subscription_ack_has_no_tx() {
        assert!(extract_tx_data(&json!({"jsonrpc": "2.0", "id": 1, "result": {}})).is_none());
        assert!(extract_tx_data(&json!({"error": "nope"})).is_none());
    }

    #[test]
    fn garbage_blobs_do_not_decode() {
        assert_eq!(decode_tx_blob("!!!"), None);
        assert_eq!(decode_tx_blob(&STANDARD.encode("zz")), None);
        assert_eq!(decode_tx_blob(&STANDARD.encode(hex::encode("not json"))), None);
    }

    #[test]
    fn batch_payload_with_kwargs() {
        let tx = json!({"payload": {
            "contract": "canvas",
            "function": "paint_batch",
            "sender": "alice",
            "kwargs": {"xs": [1, 2], "ys": [1, 2], "colors": ["#FF0000", "#00FF00"]}
        }});
        let call = parse_payload(&tx).unwrap();

        assert_eq!(call.method, PaintMethod::PaintBatch);
        assert_eq!(call.contract.as_deref(), Some("canvas"));
        assert_eq!(call.sender.as_deref(), Some("alice"));
        assert_eq!(
            call.paints,
            vec![
                Paint::new(Coord::new(1, 1), "#ff0000"),
                Paint::new(Coord::new(2, 2), "#00ff00"),
            ]
        );
    }

    #[test]
    fn method_and_positional_args_are_accepted() {
        let tx = json!({"payload": {"method": "paint", "args": [4, 5, "#123456"]}});
        let call = parse_payload(&tx).unwrap();
        assert_eq!(call.paints, vec![Paint::new(Coord::new(4, 5), "#123456")]);
        assert_eq!(call.contract, None);
    }

    #[test]
    fn other_methods_are_ignored() {
        let tx = json!({"payload": {"function": "withdraw", "kwargs": {}}});
        assert!(parse_payload(&tx).is_none());
        assert!(parse_payload(&json!({})).is_none());
    }
}
