//! # JSON-RPC 2.0 Codec
//!
//! Envelope payloads are standard JSON-RPC 2.0 with the bridge ecosystem's
//! conventions baked in:
//!
//! - Request ids follow the millisecond-timestamp convention
//!   (`now_ms * 1000 + three random digits`), so they are positive, mostly
//!   monotonic, and unique enough per session.
//! - `wc_sessionRequest`/`wc_sessionUpdate` wrap their single param object
//!   in a one-element array; signing methods carry arrays of strings or
//!   transaction objects.
//! - Some peers append a non-standard `session: {chainId, account}` hint to
//!   requests. The decoder tolerates its presence and absence, and accepts
//!   `chainId` both as a string and as a legacy integer.
//! - When a response carries both `result` and `error`, the error member
//!   wins.

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::config::JSONRPC_VERSION;
use crate::error::{BridgeError, BridgeResult};

// ---------------------------------------------------------------------------
// Request Ids
// ---------------------------------------------------------------------------

/// Generates a request id in the bridge convention. Always positive.
pub fn request_id() -> i64 {
    let millis = chrono::Utc::now().timestamp_millis();
    millis * 1000 + rand::thread_rng().gen_range(0..1000)
}

// ---------------------------------------------------------------------------
// Chain Id
// ---------------------------------------------------------------------------

/// A chain identifier that decodes from either a JSON string or a legacy
/// integer, and always encodes as a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainId(pub String);

impl From<&str> for ChainId {
    fn from(value: &str) -> Self {
        ChainId(value.to_owned())
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(ChainId(s)),
            Value::Number(n) => Ok(ChainId(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "chainId must be a string or integer, got {other}"
            ))),
        }
    }
}

/// The non-standard `session` hint some peers append to requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<ChainId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

// ---------------------------------------------------------------------------
// Request / Response shapes
// ---------------------------------------------------------------------------

/// An outbound or inbound JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest<P = Value> {
    pub id: i64,
    pub jsonrpc: String,
    pub method: String,
    pub params: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionHint>,
}

impl<P: Serialize> JsonRpcRequest<P> {
    /// Builds a request with a fresh id.
    pub fn new(method: impl Into<String>, params: P) -> Self {
        Self {
            id: request_id(),
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params,
            session: None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("request serialization is infallible")
    }
}

/// A successful JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse<R = Value> {
    pub id: i64,
    pub jsonrpc: String,
    pub result: R,
}

impl<R: Serialize> JsonRpcResponse<R> {
    pub fn new(id: i64, result: R) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("response serialization is infallible")
    }
}

/// The `error` member of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcErrorDetail {
    pub code: i64,
    pub message: String,
}

/// An error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    pub id: i64,
    pub jsonrpc: String,
    pub error: JsonRpcErrorDetail,
}

impl JsonRpcErrorResponse {
    pub fn new(id: i64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_owned(),
            error: JsonRpcErrorDetail {
                code,
                message: message.into(),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("response serialization is infallible")
    }
}

// ---------------------------------------------------------------------------
// Inbound decoding
// ---------------------------------------------------------------------------

/// Decodes an inbound response, honoring error precedence: a present
/// `error` member is raised even when `result` is also present.
pub fn decode_response<R: DeserializeOwned>(value: &Value) -> BridgeResult<(i64, R)> {
    let id = value
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| BridgeError::BadJsonRpcRequest("response is missing an id".into()))?;

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let detail: JsonRpcErrorDetail = serde_json::from_value(error.clone())?;
        return Err(BridgeError::BadJsonRpcRequest(format!(
            "peer returned JSON-RPC error {}: {}",
            detail.code, detail.message
        )));
    }

    let result = value
        .get("result")
        .cloned()
        .ok_or_else(|| BridgeError::BadJsonRpcRequest("response has neither result nor error".into()))?;

    Ok((id, serde_json::from_value(result)?))
}

/// Pulls the params of an inbound request out as a JSON array.
///
/// The bridge conventions always carry array params; anything else is a
/// malformed request.
pub fn params_array(request: &Value) -> BridgeResult<&Vec<Value>> {
    request
        .get("params")
        .and_then(Value::as_array)
        .ok_or_else(|| BridgeError::BadJsonRpcRequest("params must be an array".into()))
}

/// Decodes the first element of an array-params request into a typed value.
pub fn first_param<T: DeserializeOwned>(request: &Value) -> BridgeResult<T> {
    let params = params_array(request)?;
    let first = params
        .first()
        .ok_or_else(|| BridgeError::BadJsonRpcRequest("params array is empty".into()))?;
    Ok(serde_json::from_value(first.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_ids_are_positive_and_distinct() {
        let a = request_id();
        let b = request_id();
        assert!(a > 0);
        assert!(b > 0);
        // Same millisecond is possible; same millisecond and same random
        // suffix twice in a row is not worth flaking over — ids only need
        // to be distinct within a session's in-flight window.
        assert!(a <= b + 1000);
    }

    #[test]
    fn chain_id_decodes_from_string_and_integer() {
        let from_str: ChainId = serde_json::from_value(json!("1")).unwrap();
        let from_int: ChainId = serde_json::from_value(json!(56)).unwrap();
        assert_eq!(from_str, ChainId("1".into()));
        assert_eq!(from_int, ChainId("56".into()));

        assert!(serde_json::from_value::<ChainId>(json!([1])).is_err());
    }

    #[test]
    fn chain_id_always_encodes_as_string() {
        let encoded = serde_json::to_value(ChainId("137".into())).unwrap();
        assert_eq!(encoded, json!("137"));
    }

    #[test]
    fn request_wire_shape() {
        let request = JsonRpcRequest::new("wc_sessionUpdate", vec![json!({"approved": false})]);
        let value: Value = serde_json::from_str(&request.to_json()).unwrap();

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "wc_sessionUpdate");
        assert!(value["params"].is_array());
        assert!(value["id"].as_i64().unwrap() > 0);
        // The session hint is omitted, not null.
        assert!(value.get("session").is_none());
    }

    #[test]
    fn session_hint_is_tolerated_on_inbound_requests() {
        let text = r#"{
            "id": 42,
            "jsonrpc": "2.0",
            "method": "eth_sendTransaction",
            "params": [],
            "session": {"chainId": 25, "account": "0xabc"}
        }"#;

        let request: JsonRpcRequest<Value> = serde_json::from_str(text).unwrap();
        let hint = request.session.unwrap();
        assert_eq!(hint.chain_id, Some(ChainId("25".into())));
        assert_eq!(hint.account.as_deref(), Some("0xabc"));

        // And its absence too.
        let bare = r#"{"id":1,"jsonrpc":"2.0","method":"eth_sign","params":[]}"#;
        let request: JsonRpcRequest<Value> = serde_json::from_str(bare).unwrap();
        assert!(request.session.is_none());
    }

    #[test]
    fn error_member_takes_precedence_over_result() {
        let both = json!({
            "id": 7,
            "jsonrpc": "2.0",
            "result": "0xsigned",
            "error": {"code": -32000, "message": "rejected"}
        });

        let err = decode_response::<String>(&both).unwrap_err();
        assert!(matches!(err, BridgeError::BadJsonRpcRequest(_)));
        assert!(err.to_string().contains("-32000"));
    }

    #[test]
    fn successful_response_decodes_result() {
        let ok = json!({"id": 7, "jsonrpc": "2.0", "result": "0xsigned"});
        let (id, result) = decode_response::<String>(&ok).unwrap();
        assert_eq!(id, 7);
        assert_eq!(result, "0xsigned");
    }

    #[test]
    fn first_param_rejects_empty_and_non_array_params() {
        let empty = json!({"id": 1, "jsonrpc": "2.0", "method": "m", "params": []});
        assert!(matches!(
            first_param::<Value>(&empty).unwrap_err(),
            BridgeError::BadJsonRpcRequest(_)
        ));

        let object = json!({"id": 1, "jsonrpc": "2.0", "method": "m", "params": {}});
        assert!(matches!(
            first_param::<Value>(&object).unwrap_err(),
            BridgeError::BadJsonRpcRequest(_)
        ));
    }

    #[test]
    fn error_response_wire_shape() {
        let response = JsonRpcErrorResponse::new(7, 4001, "user refused");
        let value: Value = serde_json::from_str(&response.to_json()).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["error"]["code"], 4001);
        assert_eq!(value["error"]["message"], "user refused");
        assert!(value.get("result").is_none());
    }
}
