//! End-to-end tests: proxies talking to real servers over HTTP and TCP.
//!
//! Servers run on a tokio runtime owned by a background thread, so the
//! blocking client transports are only ever used from plain test threads.

use std::io::{BufRead, BufReader};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::sync::Arc;
use switchboard_core::{Dispatcher, Introspection, Proxy, RpcError};
use switchboard_rpc::services::{self, Calculator, Echo};
use switchboard_rpc::{http, HttpClientTransport, TcpClientTransport, TcpServer};

fn demo_dispatcher() -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(services::demo_registry().unwrap()))
}

/// Start the HTTP server on a background runtime and return its address.
fn spawn_http_server() -> SocketAddr {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let addr = http::start_server(demo_dispatcher(), "127.0.0.1", 0)
                .await
                .unwrap();
            tx.send(addr).unwrap();
            std::future::pending::<()>().await;
        });
    });
    rx.recv().unwrap()
}

/// Start the TCP server on a background runtime and return its address.
fn spawn_tcp_server() -> SocketAddr {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let handle = TcpServer::start(demo_dispatcher(), "127.0.0.1", 0)
                .await
                .unwrap();
            tx.send(handle.addr()).unwrap();
            std::future::pending::<()>().await;
            drop(handle);
        });
    });
    rx.recv().unwrap()
}

fn http_proxy(addr: SocketAddr, key: &str) -> Proxy<HttpClientTransport> {
    let url = format!("http://{}/rpc", addr);
    Proxy::new(HttpClientTransport::new(&url).unwrap(), key)
}

#[test]
fn test_http_calculator_round_trip() {
    let addr = spawn_http_server();
    let calc = http_proxy(addr, "calc");

    assert_eq!(calc.add(2.0, 3.5).unwrap(), 5.5);
    assert_eq!(calc.subtract(2.0, 3.5).unwrap(), -1.5);
    assert_eq!(calc.sum(vec![0.5, 0.25]).unwrap(), 0.75);
}

#[test]
fn test_http_handler_error_is_remote() {
    let addr = spawn_http_server();
    let calc = http_proxy(addr, "calc");

    let err = calc.divide(1.0, 0.0).unwrap_err();
    assert!(matches!(err, RpcError::Remote { .. }));
    assert_eq!(err.to_string(), "division by zero");
}

#[test]
fn test_http_introspection() {
    let addr = spawn_http_server();
    let system = http_proxy(addr, "system");

    let methods = system.list_methods().unwrap();
    assert!(methods.contains(&"calc.divide".to_string()));
    assert!(methods.contains(&"echo.callCount".to_string()));
    assert!(methods.contains(&"system.listMethods".to_string()));

    assert_eq!(
        system.method_signature("calc.add".into()).unwrap(),
        vec!["double,double,double"]
    );
}

#[test]
fn test_http_unexpected_status() {
    let addr = spawn_http_server();
    let url = format!("http://{}/nowhere", addr);
    let calc = Proxy::new(HttpClientTransport::new(&url).unwrap(), "calc");

    let err = calc.add(1.0, 1.0).unwrap_err();
    match err {
        RpcError::Transport { message, .. } => {
            assert_eq!(message, "unexpected status code returned : 404");
        }
        other => panic!("Expected Transport error, got: {:?}", other),
    }
}

#[test]
fn test_http_malformed_body() {
    let addr = spawn_http_server();
    let response = reqwest::blocking::Client::new()
        .post(format!("http://{}/rpc", addr))
        .body("{not json")
        .send()
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().unwrap(), r#"{"error":"unable to read request"}"#);
}

#[test]
fn test_http_health() {
    let addr = spawn_http_server();
    let body: serde_json::Value = reqwest::blocking::get(format!("http://{}/health", addr))
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[test]
fn test_tcp_round_trip_on_one_connection() {
    let addr = spawn_tcp_server();
    let transport = Arc::new(TcpClientTransport::connect(addr).unwrap());
    let echo = Proxy::new(transport.clone(), "echo");
    let calc = Proxy::new(transport, "calc");

    assert_eq!(echo.echo("hello".into()).unwrap(), "hello");
    assert_eq!(echo.reverse("hello".into()).unwrap(), "olleh");
    assert_eq!(calc.divide(9.0, 3.0).unwrap(), 3.0);
    assert_eq!(echo.calls().unwrap(), 2);
}

#[test]
fn test_tcp_unknown_method() {
    let addr = spawn_tcp_server();
    let missing = Proxy::new(TcpClientTransport::connect(addr).unwrap(), "nobody");

    let err = missing.ping().unwrap_err();
    assert!(matches!(err, RpcError::Remote { .. }));
    assert!(err.to_string().contains("nobody.ping"));
}

#[test]
fn test_tcp_shared_client_across_threads() {
    let addr = spawn_tcp_server();
    let transport = Arc::new(TcpClientTransport::connect(addr).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let transport = transport.clone();
            std::thread::spawn(move || {
                let calc = Proxy::new(transport, "calc");
                for j in 0..5 {
                    let a = (i * 10 + j) as f64;
                    assert_eq!(calc.add(a, 1.0).unwrap(), a + 1.0);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

/// Kills the spawned server when the test ends.
struct ServerProcess(Child);

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_binary(transport: &str) -> (ServerProcess, u16) {
    let binary = PathBuf::from(env!("CARGO_BIN_EXE_switchboard-rpc"));
    let mut child = Command::new(binary)
        .args(["--host", "127.0.0.1", "--port", "0", "--transport", transport])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let process = ServerProcess(child);

    // Log lines share stdout with the port line.
    let port = BufReader::new(stdout)
        .lines()
        .map_while(|line| line.ok())
        .find_map(|line| line.strip_prefix("RPC_PORT=").map(|p| p.parse::<u16>().unwrap()))
        .expect("server exited without printing RPC_PORT");

    (process, port)
}

#[test]
fn test_binary_serves_http() {
    let (_server, port) = spawn_binary("http");
    let calc = Proxy::new(
        HttpClientTransport::new(&format!("http://127.0.0.1:{}/rpc", port)).unwrap(),
        "calc",
    );
    assert_eq!(calc.add(40.0, 2.0).unwrap(), 42.0);
}

#[test]
fn test_binary_serves_tcp() {
    let (_server, port) = spawn_binary("tcp");
    let echo = Proxy::new(
        TcpClientTransport::connect(("127.0.0.1", port)).unwrap(),
        "echo",
    );
    assert_eq!(echo.ping().unwrap(), "pong");
}
