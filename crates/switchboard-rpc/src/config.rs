//! Configuration constants for the reference transports and server binary.

use std::time::Duration;

/// Server-level configuration.
pub struct ServerConfig;

impl ServerConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const RPC_ROUTE: &'static str = "/rpc";
    pub const HEALTH_ROUTE: &'static str = "/health";

    /// Requests handled concurrently by the HTTP server.
    pub const MAX_CONCURRENT_REQUESTS: usize = 64;
}

/// Length-prefixed TCP transport configuration.
pub struct TcpConfig;

impl TcpConfig {
    pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16MB
    pub const MAX_CONNECTIONS: usize = 32;
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
}
