//! Switchboard Core - JSON-RPC method registry, dispatcher and client proxy.
//!
//! Server side, handlers implement capability traits and are bound to registry
//! keys; the [`Dispatcher`] resolves `"key.operation"` calls against them.
//! Client side, a [`Proxy`] implements the same traits over any
//! [`ClientTransport`]. No network code lives here.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchboard_core::{capability, Dispatcher, LoopbackTransport, Proxy, Registry};
//!
//! capability! {
//!     pub trait Calculator {
//!         fn add(&self, a: i64, b: i64) -> i64;
//!     }
//! }
//!
//! struct Calc;
//!
//! impl Calculator for Calc {
//!     fn add(&self, a: i64, b: i64) -> switchboard_core::Result<i64> {
//!         Ok(a + b)
//!     }
//! }
//!
//! fn main() -> switchboard_core::Result<()> {
//!     let mut registry = Registry::new();
//!     registry.register("calc", Arc::new(Calc), vec![Calculator::descriptor()])?;
//!     let dispatcher = Arc::new(Dispatcher::new(registry));
//!
//!     let calc = Proxy::new(LoopbackTransport::new(dispatcher), "calc");
//!     assert_eq!(calc.add(2, 3)?, 5);
//!     Ok(())
//! }
//! ```

pub mod capability;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod introspection;
pub mod protocol;
pub mod proxy;
pub mod registry;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use capability::{CapabilityDescriptor, Invoker, OperationDef};
pub use config::RpcConfig;
pub use dispatcher::Dispatcher;
pub use error::{RpcError, Result};
pub use introspection::{CatalogIntrospection, Introspection};
pub use protocol::{RequestEnvelope, ResponseEnvelope};
pub use proxy::Proxy;
pub use registry::{HandlerEntry, OperationDescriptor, Registry};
pub use transport::{BufferedExchange, ClientTransport, LoopbackTransport, ServerTransport};
pub use types::{classify, is_allowed, TypeDesc, WireType, WireTyped};

pub use serde_json::Value;
