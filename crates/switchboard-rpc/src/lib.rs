//! Switchboard RPC - network transports and a demo server for switchboard-core.
//!
//! - [`http`]: blocking HTTP client transport and an Axum server (`POST /rpc`)
//! - [`tcp`]: length-prefixed TCP client transport and server
//! - [`services`]: demo handlers served by the `switchboard-rpc` binary

pub mod config;
pub mod http;
pub mod services;
pub mod tcp;

pub use config::{ServerConfig, TcpConfig};
pub use http::HttpClientTransport;
pub use tcp::{TcpClientTransport, TcpServer, TcpServerHandle};
