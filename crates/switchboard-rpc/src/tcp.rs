//! Length-prefixed TCP transport.
//!
//! Frame format: `[4-byte BE u32 length][payload bytes]`, one request or
//! response envelope per frame. A connection carries any number of
//! request/response pairs in order.
//!
//! The server runs on the tokio runtime with one task per connection; the
//! dispatcher itself is synchronous and runs on the blocking pool. The client
//! is a plain blocking socket guarded by a mutex, so one client can be shared
//! between threads.

use crate::config::TcpConfig;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream as StdTcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use switchboard_core::{BufferedExchange, ClientTransport, Dispatcher, Result, RpcError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

fn frame_too_large(len: usize) -> RpcError {
    RpcError::Transport {
        message: format!(
            "frame size {} exceeds maximum {}",
            len,
            TcpConfig::MAX_FRAME_SIZE
        ),
        source: None,
    }
}

fn io_error(context: &str, e: std::io::Error) -> RpcError {
    RpcError::transport(context.to_string(), e)
}

/// Read a frame from an async reader.
///
/// Returns `None` when the peer closed the stream before sending any byte of
/// the next frame. A stream that ends inside a frame is an error.
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader
            .read(&mut len_buf[filled..])
            .await
            .map_err(|e| io_error("failed to read frame header", e))?;
        if n == 0 {
            return header_eof(filled);
        }
        filled += n;
    }

    let mut payload = vec![0u8; frame_len(len_buf)?];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| io_error("failed to read frame payload", e))?;

    Ok(Some(payload))
}

/// Write a frame to an async writer.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let header = frame_header(payload)?;
    writer
        .write_all(&header)
        .await
        .map_err(|e| io_error("failed to write frame header", e))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| io_error("failed to write frame payload", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_error("failed to flush frame", e))?;
    Ok(())
}

/// Blocking counterpart of [`read_frame`].
pub fn read_frame_blocking<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) => return header_eof(filled),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_error("failed to read frame header", e)),
        }
    }

    let mut payload = vec![0u8; frame_len(len_buf)?];
    reader
        .read_exact(&mut payload)
        .map_err(|e| io_error("failed to read frame payload", e))?;

    Ok(Some(payload))
}

/// Blocking counterpart of [`write_frame`].
pub fn write_frame_blocking<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let header = frame_header(payload)?;
    writer
        .write_all(&header)
        .map_err(|e| io_error("failed to write frame header", e))?;
    writer
        .write_all(payload)
        .map_err(|e| io_error("failed to write frame payload", e))?;
    writer
        .flush()
        .map_err(|e| io_error("failed to flush frame", e))?;
    Ok(())
}

fn header_eof(filled: usize) -> Result<Option<Vec<u8>>> {
    if filled == 0 {
        return Ok(None);
    }
    Err(RpcError::Transport {
        message: format!("stream ended after {} of 4 frame header bytes", filled),
        source: None,
    })
}

fn frame_len(len_buf: [u8; 4]) -> Result<usize> {
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > TcpConfig::MAX_FRAME_SIZE {
        return Err(frame_too_large(len));
    }
    Ok(len)
}

fn frame_header(payload: &[u8]) -> Result<[u8; 4]> {
    if payload.len() > TcpConfig::MAX_FRAME_SIZE {
        return Err(frame_too_large(payload.len()));
    }
    Ok((payload.len() as u32).to_be_bytes())
}

/// Client transport over a persistent TCP connection.
#[derive(Debug)]
pub struct TcpClientTransport {
    stream: Mutex<StdTcpStream>,
    addr: SocketAddr,
}

impl TcpClientTransport {
    /// Connect using the configured connect timeout.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let addr = addr
            .to_socket_addrs()
            .map_err(|e| io_error("failed to resolve address", e))?
            .next()
            .ok_or_else(|| RpcError::Transport {
                message: "address resolved to nothing".to_string(),
                source: None,
            })?;

        let stream = StdTcpStream::connect_timeout(&addr, TcpConfig::CONNECT_TIMEOUT)
            .map_err(|e| RpcError::transport(format!("failed to connect to {}", addr), e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| io_error("failed to configure socket", e))?;

        debug!("TCP client connected to {}", addr);

        Ok(Self {
            stream: Mutex::new(stream),
            addr,
        })
    }

    /// Address of the connected server.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl ClientTransport for TcpClientTransport {
    fn call(&self, request: &str) -> Result<String> {
        let mut stream = self.stream.lock().map_err(|_| RpcError::Transport {
            message: "connection lock poisoned".to_string(),
            source: None,
        })?;

        write_frame_blocking(&mut *stream, request.as_bytes())?;

        let frame = read_frame_blocking(&mut *stream)?.ok_or_else(|| RpcError::Transport {
            message: format!("connection to {} closed", self.addr),
            source: None,
        })?;

        String::from_utf8(frame).map_err(|e| RpcError::transport("response is not valid UTF-8", e))
    }
}

/// Handle to a running TCP server. Dropping it stops the server.
pub struct TcpServerHandle {
    addr: SocketAddr,
    stop: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl TcpServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and close the open ones after their
    /// current frame.
    pub fn shutdown(&mut self) {
        let _ = self.stop.send(true);
    }
}

impl Drop for TcpServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

/// TCP server feeding framed requests to a dispatcher.
pub struct TcpServer {
    dispatcher: Arc<Dispatcher>,
    slots: Arc<Semaphore>,
    stop: watch::Receiver<bool>,
}

impl TcpServer {
    /// Bind `host:port` (port 0 picks a free port) and serve in background tasks.
    pub async fn start(dispatcher: Arc<Dispatcher>, host: &str, port: u16) -> Result<TcpServerHandle> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| RpcError::transport(format!("failed to bind {}:{}", host, port), e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| io_error("failed to read local address", e))?;

        info!("TCP server listening on {}", addr);

        let (stop_tx, stop_rx) = watch::channel(false);
        let server = TcpServer {
            dispatcher,
            slots: Arc::new(Semaphore::new(TcpConfig::MAX_CONNECTIONS)),
            stop: stop_rx,
        };

        Ok(TcpServerHandle {
            addr,
            stop: stop_tx,
            accept_task: Some(tokio::spawn(server.run(listener))),
        })
    }

    async fn run(self, listener: TcpListener) {
        let mut stop = self.stop.clone();
        loop {
            let (stream, peer) = tokio::select! {
                _ = stop.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("accept error: {}", e);
                        continue;
                    }
                },
            };

            // The slot is held until the connection task ends.
            let Ok(slot) = self.slots.clone().try_acquire_owned() else {
                warn!(
                    "Rejecting connection from {}: {} connections already open",
                    peer,
                    TcpConfig::MAX_CONNECTIONS
                );
                continue;
            };

            let dispatcher = self.dispatcher.clone();
            let stop = self.stop.clone();
            tokio::spawn(async move {
                serve_connection(stream, peer, dispatcher, stop).await;
                drop(slot);
            });
        }
        info!("TCP server shutting down");
    }
}

/// Answer frames on one connection until the peer leaves or the server stops.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    mut stop: watch::Receiver<bool>,
) {
    debug!("connection from {}", peer);
    let (mut reader, mut writer) = stream.into_split();
    let mut served: u64 = 0;

    loop {
        let frame = tokio::select! {
            _ = stop.changed() => break,
            read = read_frame(&mut reader) => match read {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("dropping connection {}: {}", peer, e);
                    break;
                }
            },
        };

        let response = match dispatch_frame(&dispatcher, frame).await {
            Ok(response) => response,
            Err(e) => {
                warn!("frame {} from {} could not be dispatched: {}", served + 1, peer, e);
                break;
            }
        };

        if let Err(e) = write_frame(&mut writer, response.as_bytes()).await {
            warn!("unable to answer {}: {}", peer, e);
            break;
        }
        served += 1;
    }

    debug!("connection {} closed after {} requests", peer, served);
}

/// Run one frame through the dispatcher on the blocking pool.
async fn dispatch_frame(dispatcher: &Arc<Dispatcher>, frame: Vec<u8>) -> Result<String> {
    // A frame that is not UTF-8 is answered like any unreadable request.
    let mut exchange = match String::from_utf8(frame) {
        Ok(text) => BufferedExchange::new(text),
        Err(_) => BufferedExchange::default(),
    };

    let dispatcher = dispatcher.clone();
    let response = tokio::task::spawn_blocking(move || {
        dispatcher.execute(&mut exchange);
        exchange.into_response()
    })
    .await
    .map_err(|e| RpcError::transport("dispatch task failed", e))?;

    response.ok_or_else(|| RpcError::Transport {
        message: "dispatcher produced no response".to_string(),
        source: None,
    })
}
