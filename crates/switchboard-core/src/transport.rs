//! Transport contracts.
//!
//! The runtime never touches sockets itself. A client transport carries one
//! request text to a server and returns the response text; a server transport
//! yields one request text and accepts one response text. Concrete network
//! transports live outside this crate.

use crate::dispatcher::Dispatcher;
use crate::{Result, RpcError};
use std::sync::Arc;

/// Client side: send request text, block until the response text arrives.
pub trait ClientTransport: Send + Sync {
    fn call(&self, request: &str) -> Result<String>;
}

/// Server side: one request in, one response out.
pub trait ServerTransport {
    fn read_request(&mut self) -> Result<String>;
    fn write_response(&mut self, response: &str) -> Result<()>;
}

impl<T: ClientTransport + ?Sized> ClientTransport for Arc<T> {
    fn call(&self, request: &str) -> Result<String> {
        (**self).call(request)
    }
}

impl<T: ClientTransport + ?Sized> ClientTransport for &T {
    fn call(&self, request: &str) -> Result<String> {
        (**self).call(request)
    }
}

/// Server transport over an in-memory request, capturing the response.
#[derive(Debug, Default)]
pub struct BufferedExchange {
    request: Option<String>,
    response: Option<String>,
}

impl BufferedExchange {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: Some(request.into()),
            response: None,
        }
    }

    /// Response text, once the dispatcher has written it.
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn into_response(self) -> Option<String> {
        self.response
    }
}

impl ServerTransport for BufferedExchange {
    fn read_request(&mut self) -> Result<String> {
        self.request.take().ok_or_else(|| RpcError::Transport {
            message: "request already consumed".to_string(),
            source: None,
        })
    }

    fn write_response(&mut self, response: &str) -> Result<()> {
        self.response = Some(response.to_string());
        Ok(())
    }
}

/// Client transport that dispatches in-process, without any I/O.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    dispatcher: Arc<Dispatcher>,
}

impl LoopbackTransport {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl ClientTransport for LoopbackTransport {
    fn call(&self, request: &str) -> Result<String> {
        let mut exchange = BufferedExchange::new(request);
        self.dispatcher.execute(&mut exchange);
        exchange.into_response().ok_or_else(|| RpcError::Transport {
            message: "dispatcher produced no response".to_string(),
            source: None,
        })
    }
}
