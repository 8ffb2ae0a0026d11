//! Client invocation proxy.
//!
//! A [`Proxy`] stands in for a remote handler. Every trait declared with
//! [`capability!`](crate::capability) is implemented for `Proxy<T>`, so
//! calling a capability method on the proxy builds a request envelope, sends
//! it through the transport and decodes the answer into the method's return
//! type.
//!
//! The proxy does not check that the response id matches the request id: it
//! assumes one call in flight per transport exchange.

use crate::config::RpcConfig;
use crate::protocol::{decode_response, encode_request, from_wire, RequestEnvelope};
use crate::transport::ClientTransport;
use crate::types::{TypeDesc, WireTyped};
use crate::{Result, RpcError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Callable stand-in for the handler bound to `key` on the remote side.
#[derive(Debug)]
pub struct Proxy<T> {
    transport: T,
    key: String,
    next_id: AtomicU64,
}

impl<T: ClientTransport> Proxy<T> {
    pub fn new(transport: T, key: impl Into<String>) -> Self {
        Self {
            transport,
            key: key.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registry key this proxy calls into.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Invoke `operation` on the remote handler and decode its result as `R`.
    ///
    /// Transport failures are returned as-is. An `error` field in the response
    /// becomes [`RpcError::Remote`]: a scalar error carries its value as the
    /// message, a structured one a generic message plus the raw payload.
    pub fn call_remote<R>(&self, operation: &str, params: Vec<Value>) -> Result<R>
    where
        R: DeserializeOwned + WireTyped,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = format!("{}{}{}", self.key, RpcConfig::METHOD_SEPARATOR, operation);
        let request = RequestEnvelope::new(id, method, params);
        let request_text = encode_request(&request)?;

        debug!("JSON-RPC >>  {}", request_text);
        let response_text = self.transport.call(&request_text)?;
        debug!("JSON-RPC <<  {}", response_text);

        let response = decode_response(&response_text)?;

        if let Some(error) = response.error {
            return Err(remote_error(error));
        }

        if R::type_desc() == TypeDesc::Void {
            return from_wire(Value::Null);
        }

        from_wire(response.result.unwrap_or(Value::Null))
    }
}

/// Classify a wire `error` value into a client-side error.
fn remote_error(error: Value) -> RpcError {
    match error {
        Value::String(message) => RpcError::Remote {
            message,
            payload: None,
        },
        Value::Bool(_) | Value::Number(_) => RpcError::Remote {
            message: error.to_string(),
            payload: None,
        },
        structured => RpcError::Remote {
            message: RpcConfig::STRUCTURED_ERROR_MESSAGE.to_string(),
            payload: Some(structured),
        },
    }
}
