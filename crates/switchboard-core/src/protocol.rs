//! Wire envelopes and the JSON codec boundary.
//!
//! Requests and responses travel as JSON objects:
//!
//! ```text
//! -> {"id": <any>, "method": "<key>.<operation>", "params": [<value>, ...]}
//! <- {"id": <same>, "result": <value>}
//! <- {"id": <same>, "error": <string|object>}
//! ```
//!
//! The runtime only handles the structured form; this module is the single
//! place where text is converted to and from it.

use crate::config::RpcConfig;
use crate::{Result, RpcError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Call envelope sent by the client proxy and consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Correlation token, echoed back untouched.
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RequestEnvelope {
    /// Create a new request envelope.
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Answer envelope produced by the dispatcher.
///
/// A well-formed response carries exactly one of `result` / `error`; `id` is
/// absent only when the request itself could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ResponseEnvelope {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response carrying a flat message.
    pub fn failure(id: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(Value::String(message.into())),
        }
    }

    /// Response to a request that could not be parsed. Carries no `id`.
    pub fn malformed() -> Self {
        Self::failure(None, RpcConfig::MALFORMED_REQUEST_MESSAGE)
    }

    /// Whether the response reports a failure.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Parse request text into an envelope.
pub fn decode_request(text: &str) -> Result<RequestEnvelope> {
    serde_json::from_str(text).map_err(|e| RpcError::MalformedRequest { source: Some(e) })
}

/// Serialize a request envelope to wire text.
pub fn encode_request(request: &RequestEnvelope) -> Result<String> {
    Ok(serde_json::to_string(request)?)
}

/// Parse response text into an envelope.
pub fn decode_response(text: &str) -> Result<ResponseEnvelope> {
    serde_json::from_str(text).map_err(|e| RpcError::Json {
        message: format!("Failed to parse response: {}", e),
        source: Some(e),
    })
}

/// Serialize a response envelope to wire text.
pub fn encode_response(response: &ResponseEnvelope) -> Result<String> {
    Ok(serde_json::to_string(response)?)
}

/// Convert a typed value to its wire form.
pub fn to_wire<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Convert a wire value into the declared type.
///
/// Conversion failures surface as `Invocation` errors carrying the codec's
/// message, since they only happen while preparing a handler call or reading
/// its answer.
pub fn from_wire<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| RpcError::Invocation {
        message: e.to_string(),
        source: Some(Box::new(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_params_default_to_empty() {
        let req = decode_request(r#"{"id": 3, "method": "system.listMethods"}"#).unwrap();
        assert_eq!(req.id, json!(3));
        assert_eq!(req.method, "system.listMethods");
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_request_without_method_is_malformed() {
        let err = decode_request(r#"{"id": 3, "params": []}"#).unwrap_err();
        assert!(matches!(err, RpcError::MalformedRequest { .. }));
        assert_eq!(err.to_string(), "unable to read request");
    }

    #[test]
    fn test_request_non_object_is_malformed() {
        assert!(decode_request("[1, 2, 3]").is_err());
        assert!(decode_request("not valid json").is_err());
        assert!(decode_request(r#"{"id": 1, "method": "a.b", "params": {"x": 1}}"#).is_err());
    }

    #[test]
    fn test_success_response_serialization() {
        let resp = ResponseEnvelope::success(json!(1), json!({"models": []}));
        let text = encode_response(&resp).unwrap();

        assert!(text.contains("\"result\""));
        assert!(!text.contains("\"error\""));
    }

    #[test]
    fn test_void_result_is_written_as_null() {
        let resp = ResponseEnvelope::success(json!(1), Value::Null);
        let text = encode_response(&resp).unwrap();
        assert_eq!(text, r#"{"id":1,"result":null}"#);
    }

    #[test]
    fn test_malformed_response_has_no_id() {
        let text = encode_response(&ResponseEnvelope::malformed()).unwrap();
        assert_eq!(text, r#"{"error":"unable to read request"}"#);
    }

    #[test]
    fn test_decode_structured_error() {
        let resp = decode_response(r#"{"id": 9, "error": {"code": 42}}"#).unwrap();
        assert!(resp.is_error());
        assert_eq!(resp.error, Some(json!({"code": 42})));
        assert!(resp.result.is_none());
    }

    #[test]
    fn test_from_wire_failure_is_invocation_error() {
        let err = from_wire::<i64>(json!("seven")).unwrap_err();
        assert!(matches!(err, RpcError::Invocation { .. }));
    }
}
