//! HTTP transport: a blocking client and an Axum server.
//!
//! Each request body is one request envelope; the response body is the
//! response envelope, always with status 200 when the dispatcher answered.

use crate::config::ServerConfig;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::{BufferedExchange, ClientTransport, Dispatcher, Result, RpcError};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use url::Url;

/// Client transport posting each request to a fixed URL.
///
/// Uses `reqwest`'s blocking client, so it must not be called from inside an
/// async runtime worker.
#[derive(Debug)]
pub struct HttpClientTransport {
    url: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    client: reqwest::blocking::Client,
}

impl HttpClientTransport {
    /// Create a transport for `url` with no timeout.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| RpcError::transport(format!("invalid url '{}'", url), e))?;
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(Self {
            url,
            headers,
            timeout: None,
            client: build_client(None)?,
        })
    }

    /// Bound every call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(Some(timeout))?;
        self.timeout = Some(timeout);
        Ok(self)
    }

    /// Add or replace a header sent with every request.
    ///
    /// Names are case-insensitive, so `Content-Type` replaces the default.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| RpcError::transport(format!("invalid header name '{}'", name), e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| RpcError::transport(format!("invalid value for header '{}'", name), e))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

fn build_client(timeout: Option<Duration>) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RpcError::transport("failed to build http client", e))
}

impl ClientTransport for HttpClientTransport {
    fn call(&self, request: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .body(request.to_string())
            .send()
            .map_err(|e| RpcError::transport(format!("request to {} failed", self.url), e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(RpcError::Transport {
                message: format!("unexpected status code returned : {}", status.as_u16()),
                source: None,
            });
        }

        response
            .text()
            .map_err(|e| RpcError::transport("failed to read response body", e))
    }
}

/// State shared across request handlers.
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Run one request body through the dispatcher.
pub async fn handle_rpc(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let exchange = match String::from_utf8(body.to_vec()) {
        Ok(text) => BufferedExchange::new(text),
        Err(_) => {
            debug!("request body is not valid UTF-8");
            BufferedExchange::default()
        }
    };

    let dispatcher = state.dispatcher.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut exchange = exchange;
        dispatcher.execute(&mut exchange);
        exchange.into_response()
    })
    .await;

    match outcome {
        Ok(Some(text)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            text,
        )
            .into_response(),
        Ok(None) => {
            error!("dispatcher produced no response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!("dispatch task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Build the router serving `dispatcher`.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    let state = Arc::new(AppState { dispatcher });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(ServerConfig::HEALTH_ROUTE, get(handle_health))
        .route(ServerConfig::RPC_ROUTE, post(handle_rpc))
        .layer(ConcurrencyLimitLayer::new(ServerConfig::MAX_CONCURRENT_REQUESTS))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    dispatcher: Arc<Dispatcher>,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = router(dispatcher);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    Ok(actual_addr)
}
