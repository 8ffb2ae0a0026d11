//! Request dispatcher.
//!
//! Turns a request envelope into a response envelope:
//!
//! 1. parse the wire text (failure: id-less `"unable to read request"`)
//! 2. split `key.operation`
//! 3. find the handler by key
//! 4. find the first operation with that name and arity
//! 5. coerce params into the declared types
//! 6. invoke the handler
//! 7. encode the return value
//!
//! Every failure after step 1 becomes a response whose `error` is the failure
//! message and whose `id` echoes the request.
//!
//! # Thread Safety
//!
//! The dispatcher owns a frozen [`Registry`] and never mutates it, so a single
//! instance can be shared across threads (`Arc<Dispatcher>`). Handlers are
//! called without extra synchronization.

use crate::config::RpcConfig;
use crate::introspection::{CatalogIntrospection, Introspection};
use crate::protocol::{decode_request, encode_response, RequestEnvelope, ResponseEnvelope};
use crate::registry::{parse_method_name, Registry};
use crate::transport::ServerTransport;
use crate::{Result, RpcError};
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Dispatches request envelopes against a frozen registry.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Registry,
}

impl Dispatcher {
    /// Freeze `registry` and bind the introspection service to `system`.
    pub fn new(mut registry: Registry) -> Self {
        let descriptors = vec![<CatalogIntrospection as Introspection>::descriptor()];

        let mut catalog = registry.catalog();
        catalog.insert(
            RpcConfig::SYSTEM_KEY.to_string(),
            Registry::signatures_of(&descriptors),
        );

        let introspection = Arc::new(CatalogIntrospection::new(catalog));
        registry.bind(RpcConfig::SYSTEM_KEY, introspection, descriptors);

        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Serve one exchange over a server transport.
    ///
    /// A failed read is answered with the id-less malformed-request response.
    /// A failed write is logged and dropped.
    pub fn execute<S: ServerTransport + ?Sized>(&self, transport: &mut S) {
        let response = match transport.read_request() {
            Ok(text) => self.handle(&text),
            Err(e) => {
                warn!("unable to read request: {}", e);
                encode_or_fallback(&ResponseEnvelope::malformed())
            }
        };

        if let Err(e) = transport.write_response(&response) {
            warn!("unable to write response {}: {}", response, e);
        }
    }

    /// Dispatch request text and return response text.
    pub fn handle(&self, request: &str) -> String {
        debug!("JSON-RPC >>  {}", request);

        let response = match decode_request(request) {
            Ok(envelope) => self.dispatch(&envelope),
            Err(e) => {
                warn!("unable to read request: {}", e);
                ResponseEnvelope::malformed()
            }
        };

        let text = encode_or_fallback(&response);
        debug!("JSON-RPC <<  {}", text);
        text
    }

    /// Dispatch a parsed request envelope.
    pub fn dispatch(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        match self.call(&request.method, request.params.clone()) {
            Ok(result) => ResponseEnvelope::success(request.id.clone(), result),
            Err(e) => {
                warn!("exception occurred while executing {}: {}", request.method, e);
                ResponseEnvelope::failure(Some(request.id.clone()), e.to_string())
            }
        }
    }

    /// Resolve `method` and invoke it with positional wire params.
    pub fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let (key, operation) = parse_method_name(method)?;

        let unknown = || RpcError::UnknownMethod {
            method: method.to_string(),
        };
        let entry = self.registry.get(key).ok_or_else(unknown)?;
        let op = entry.resolve(operation, params.len()).ok_or_else(unknown)?;

        // A panicking handler fails this call only.
        match panic::catch_unwind(AssertUnwindSafe(|| op.invoke(params))) {
            Ok(result) => result.map_err(RpcError::into_invocation),
            Err(payload) => Err(RpcError::invocation(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Encode a response, degrading to a fixed error text if that fails.
fn encode_or_fallback(response: &ResponseEnvelope) -> String {
    encode_response(response).unwrap_or_else(|e| {
        warn!("unable to encode response: {}", e);
        format!(r#"{{"error":"{}"}}"#, RpcConfig::MALFORMED_REQUEST_MESSAGE)
    })
}
