//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Every duel message travels as one binary WebSocket frame, so the frame
//! boundary is the message boundary and no extra length prefix is needed.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, Connector, Transport, TransportError};

/// How many ports above the requested one [`WebSocketTransport::bind_scanning`]
/// probes by default.
pub const DEFAULT_PORT_SCAN_RANGE: u16 = 100;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to exactly the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Binds to `host:port`, walking upward through at most `range` further
    /// ports while the candidate is already in use.
    ///
    /// The port actually bound is available from
    /// [`local_addr`](Transport::local_addr).
    ///
    /// # Errors
    /// [`TransportError::NoFreePort`] when every candidate is taken, or
    /// [`TransportError::AcceptFailed`] for any bind error other than
    /// "address in use".
    pub async fn bind_scanning(
        host: &str,
        port: u16,
        range: u16,
    ) -> Result<Self, TransportError> {
        let last = port.saturating_add(range);
        for candidate in port..=last {
            match TcpListener::bind((host, candidate)).await {
                Ok(listener) => {
                    if candidate != port {
                        tracing::warn!(
                            requested = port,
                            bound = candidate,
                            "requested port in use, bound next free port"
                        );
                    }
                    tracing::info!(host, port = candidate, "WebSocket transport listening");
                    return Ok(Self { listener });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    tracing::debug!(port = candidate, "port in use");
                }
                Err(e) => return Err(TransportError::AcceptFailed(e)),
            }
        }
        Err(TransportError::NoFreePort { first: port, last })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        stream
            .set_nodelay(true)
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| {
                TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let conn = WebSocketConnection::new(ws);
        tracing::debug!(id = %conn.id, %addr, "accepted WebSocket connection");
        Ok(conn)
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

/// Dials `ws://host:port` endpoints.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Creates a connector that gives up on a dial after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// The client side of a WebSocket connection.
pub type ClientConnection = WebSocketConnection<MaybeTlsStream<TcpStream>>;

impl Connector for WebSocketConnector {
    type Connection = ClientConnection;
    type Error = TransportError;

    async fn connect(&self, addr: &str) -> Result<Self::Connection, Self::Error> {
        let url = format!("ws://{addr}");
        let dial = tokio_tungstenite::connect_async(url.as_str());
        let (ws, _response) = match tokio::time::timeout(self.connect_timeout, dial).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                return Err(TransportError::ConnectFailed {
                    addr: addr.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e),
                });
            }
            Err(_) => {
                return Err(TransportError::ConnectFailed {
                    addr: addr.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timed out",
                    ),
                });
            }
        };

        let conn = WebSocketConnection::new(ws);
        tracing::debug!(id = %conn.id, addr, "dialed WebSocket connection");
        Ok(conn)
    }
}

/// A single WebSocket connection.
///
/// The stream is split so a task parked in `recv` holds only the read half;
/// writers lock the sink independently.
pub struct WebSocketConnection<S = TcpStream> {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(ws: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id: next_connection_id(),
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = Message::Binary(data.to_vec().into());
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
