//! WebSocket Wheel Server
//!
//! Async WebSocket front end for the transaction runtime.
//! Handles authentication, transaction submission, queries, the
//! encrypt/decrypt gateway and per-account event subscriptions.
//!
//! All transactions funnel through one mutex-guarded [`Runtime`], which is
//! the serialization point for the whole system.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::core::address::Address;
use crate::core::clear::ClearBackend;
use crate::host::events::Event;
use crate::host::runtime::Runtime;
use crate::network::auth::{authenticate, AuthConfig, AuthError};
use crate::network::protocol::{
    AuthRequest, AuthResult, ClientMessage, Contract, ErrorCode, ServerError, ServerMessage,
    SubmitRequest,
};

/// Runtime shared between connections.
pub type SharedRuntime = Arc<Mutex<Runtime<ClearBackend>>>;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Event fan-out buffer per subscriber.
    pub event_buffer: usize,
    /// Encrypt requests one connection may make per minute.
    pub max_encrypts_per_minute: u32,
    /// Server version string.
    pub version: String,
    /// Token validation.
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            event_buffer: 256,
            max_encrypts_per_minute: 120,
            version: env!("CARGO_PKG_VERSION").to_string(),
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("WHEEL_BIND_ADDR") {
            match raw.parse() {
                Ok(addr) => config.bind_addr = addr,
                Err(_) => warn!(value = %raw, "ignoring invalid WHEEL_BIND_ADDR"),
            }
        }
        if let Some(max) = std::env::var("WHEEL_MAX_CONNECTIONS").ok().and_then(|v| v.parse().ok()) {
            config.max_connections = max;
        }
        if let Some(max) = std::env::var("WHEEL_MAX_ENCRYPTS_PER_MINUTE").ok().and_then(|v| v.parse().ok()) {
            config.max_encrypts_per_minute = max;
        }
        config.auth = AuthConfig::from_env();
        config
    }
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum WheelServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Account (after auth).
    address: Option<Address>,
    /// Receives events involving `address`.
    subscribed: bool,
    /// Connection time.
    connected_at: Instant,
    /// Last activity.
    last_activity: Instant,
    /// Start of the current encrypt rate window.
    encrypt_window: Instant,
    /// Encrypt requests in the current window.
    encrypts: u32,
}

impl ConnectedClient {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            address: None,
            subscribed: false,
            connected_at: now,
            last_activity: now,
            encrypt_window: now,
            encrypts: 0,
        }
    }

    /// Count one encrypt request; false once the window's budget is spent.
    fn take_encrypt(&mut self, per_minute: u32) -> bool {
        if self.encrypt_window.elapsed() >= Duration::from_secs(60) {
            self.encrypt_window = Instant::now();
            self.encrypts = 0;
        }
        if self.encrypts >= per_minute {
            return false;
        }
        self.encrypts += 1;
        true
    }
}

/// State every connection task holds a handle to.
#[derive(Clone)]
struct Shared {
    config: ServerConfig,
    runtime: SharedRuntime,
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    events_tx: broadcast::Sender<Event>,
}

/// The wheel server.
pub struct WheelServer {
    shared: Shared,
    shutdown_tx: broadcast::Sender<()>,
}

impl WheelServer {
    /// Create a server around a deployed runtime.
    ///
    /// Tokens resolving to either contract address are refused.
    pub fn new(mut config: ServerConfig, runtime: Runtime<ClearBackend>) -> Self {
        config.auth.reserved.extend(runtime.reserved_addresses());
        let (shutdown_tx, _) = broadcast::channel(1);
        let (events_tx, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            shared: Shared {
                config,
                runtime: Arc::new(Mutex::new(runtime)),
                clients: Arc::new(RwLock::new(BTreeMap::new())),
                events_tx,
            },
            shutdown_tx,
        }
    }

    /// Handle to the runtime.
    pub fn runtime(&self) -> SharedRuntime {
        self.shared.runtime.clone()
    }

    /// Sender that stops the accept loop and notifies clients.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.shared.clients.read().await.len()
    }

    /// Run the server until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), WheelServerError> {
        let listener = TcpListener::bind(&self.shared.config.bind_addr).await?;
        info!("Wheel server listening on {}", self.shared.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.shared.clients.read().await.len();
                            if clients_count >= self.shared.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let shared = self.shared.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut events_rx = self.shared.events_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            shared.clients.write().await.insert(addr, ConnectedClient::new());

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                            ErrorCode::InvalidMessage,
                                            "InvalidMessage",
                                            e.to_string(),
                                        ))).await;
                                        continue;
                                    }
                                };
                                if let Some(client) = shared.clients.write().await.get_mut(&addr) {
                                    client.last_activity = Instant::now();
                                }
                                shared.handle_client_message(addr, client_msg, &msg_tx).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    event = events_rx.recv() => {
                        match event {
                            Ok(event) => {
                                if shared.wants_event(&addr, &event).await {
                                    let _ = msg_tx.send(ServerMessage::Event(event)).await;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!("Client {} lagged, {} events dropped", addr, skipped);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Let queued replies drain before dropping the socket
            drop(msg_tx);
            let _ = sender_task.await;

            if let Some(client) = shared.clients.write().await.remove(&addr) {
                debug!(
                    "Client {} ({:?}) cleaned up after {:?}, idle {:?}",
                    addr,
                    client.address,
                    client.connected_at.elapsed(),
                    client.last_activity.elapsed()
                );
            }
        });
    }
}

impl Shared {
    /// Handle a client message.
    async fn handle_client_message(
        &self,
        addr: SocketAddr,
        msg: ClientMessage,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let reply = match msg {
            ClientMessage::Auth(auth) => self.handle_auth(addr, auth).await,
            ClientMessage::Submit(req) => self.handle_submit(addr, req).await,
            ClientMessage::Query { request_id, query } => {
                let result = self.runtime.lock().await.query(&query);
                ServerMessage::QueryResult { request_id, result }
            }
            ClientMessage::Encrypt { request_id, target, value } => {
                self.handle_encrypt(addr, request_id, target, value).await
            }
            ClientMessage::Decrypt { request_id, handle } => {
                match self.require_address(addr, request_id).await {
                    Ok(requester) => match self.runtime.lock().await.decrypt(handle, requester) {
                        Ok(value) => ServerMessage::Decrypted { request_id, handle, value },
                        Err(e) => ServerMessage::Error(
                            ServerError::new(ErrorCode::DecryptionDenied, e.reason(), e.to_string())
                                .for_request(request_id),
                        ),
                    },
                    Err(reply) => reply,
                }
            }
            ClientMessage::Subscribe => match self.set_subscribed(addr, true).await {
                Ok(()) => return,
                Err(reply) => reply,
            },
            ClientMessage::Unsubscribe => match self.set_subscribed(addr, false).await {
                Ok(()) => return,
                Err(reply) => reply,
            },
            ClientMessage::Ping { timestamp } => ServerMessage::Pong {
                timestamp,
                server_time: chrono::Utc::now().timestamp().max(0) as u64,
            },
        };
        let _ = sender.send(reply).await;
    }

    /// Handle authentication.
    async fn handle_auth(&self, addr: SocketAddr, auth: AuthRequest) -> ServerMessage {
        match authenticate(&auth.token, &self.config.auth) {
            Ok(address) => {
                if let Some(client) = self.clients.write().await.get_mut(&addr) {
                    client.address = Some(address);
                }
                info!("Client {} authenticated as {}", addr, address);
                ServerMessage::AuthResult(AuthResult {
                    success: true,
                    address: Some(address),
                    error: None,
                    server_version: self.config.version.clone(),
                })
            }
            Err(e) => {
                warn!("Authentication failed for {}: {}", addr, e);
                let code = match e {
                    AuthError::Expired => ErrorCode::TokenExpired,
                    AuthError::NotConfigured => ErrorCode::AuthFailed,
                    _ => ErrorCode::InvalidToken,
                };
                ServerMessage::Error(ServerError::new(code, e.reason(), e.to_string()))
            }
        }
    }

    /// Execute a transaction and fan out its events.
    async fn handle_submit(&self, addr: SocketAddr, req: SubmitRequest) -> ServerMessage {
        let caller = match self.require_address(addr, req.request_id).await {
            Ok(caller) => caller,
            Err(reply) => return reply,
        };
        let result = self.runtime.lock().await.execute(caller, req.value, req.tx);
        match result {
            Ok(receipt) => {
                for event in &receipt.events {
                    // No receivers is fine
                    let _ = self.events_tx.send(event.clone());
                }
                ServerMessage::Receipt { request_id: req.request_id, receipt }
            }
            Err(e) => ServerMessage::Error(
                ServerError::new(ErrorCode::TransactionReverted, e.reason(), e.to_string())
                    .for_request(req.request_id),
            ),
        }
    }

    /// Encrypt a value bound to a contract and the caller.
    async fn handle_encrypt(
        &self,
        addr: SocketAddr,
        request_id: Option<Uuid>,
        target: Contract,
        value: u64,
    ) -> ServerMessage {
        let submitter = match self.require_address(addr, request_id).await {
            Ok(submitter) => submitter,
            Err(reply) => return reply,
        };
        let allowed = match self.clients.write().await.get_mut(&addr) {
            Some(client) => client.take_encrypt(self.config.max_encrypts_per_minute),
            None => false,
        };
        if !allowed {
            warn!("Client {} exceeded the encrypt rate", addr);
            return ServerMessage::Error(
                ServerError::new(
                    ErrorCode::ServerOverloaded,
                    "EncryptRateLimited",
                    "Too many encrypt requests, retry later",
                )
                .for_request(request_id),
            );
        }
        let mut runtime = self.runtime.lock().await;
        let contract = match target {
            Contract::Ledger => runtime.ledger().address(),
            Contract::Wheel => runtime.wheel().address(),
        };
        let input = runtime.encrypt_input(contract, submitter, value);
        ServerMessage::Encrypted { request_id, input }
    }

    /// Authenticated account for a connection, or the error reply to send.
    async fn require_address(
        &self,
        addr: SocketAddr,
        request_id: Option<Uuid>,
    ) -> Result<Address, ServerMessage> {
        let clients = self.clients.read().await;
        clients
            .get(&addr)
            .and_then(|c| c.address)
            .ok_or_else(|| {
                ServerMessage::Error(
                    ServerError::new(
                        ErrorCode::NotAuthenticated,
                        "NotAuthenticated",
                        "Must authenticate first",
                    )
                    .for_request(request_id),
                )
            })
    }

    async fn set_subscribed(&self, addr: SocketAddr, subscribed: bool) -> Result<(), ServerMessage> {
        self.require_address(addr, None).await?;
        if let Some(client) = self.clients.write().await.get_mut(&addr) {
            client.subscribed = subscribed;
        }
        debug!("Client {} subscribed={}", addr, subscribed);
        Ok(())
    }

    /// Whether the connection subscribed to events involving its account.
    async fn wants_event(&self, addr: &SocketAddr, event: &Event) -> bool {
        let clients = self.clients.read().await;
        match clients.get(addr) {
            Some(ConnectedClient { address: Some(account), subscribed: true, .. }) => {
                event.involves(account)
            }
            _ => false,
        }
    }
}
