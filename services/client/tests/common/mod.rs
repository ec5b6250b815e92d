//! In-process mock HRV unit for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use hrv_client::{ClientConfig, CommandAck};
use hrv_codec::{Message as HrvMessage, MessageContext};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Line streamed to every client once it sends the start sentinel
pub const STREAMED_LINE: &str = "#MF: 1+ 0+ 2+30\r";

#[derive(Debug, Clone)]
enum Command {
    Push(String),
    DropAll,
}

struct UnitState {
    received: Mutex<Vec<String>>,
    handshakes: AtomicUsize,
    refuse: AtomicBool,
    reject_upgrades: AtomicBool,
    rejected: AtomicUsize,
    ack_commands: AtomicBool,
    commands: broadcast::Sender<Command>,
}

pub struct MockUnit {
    addr: SocketAddr,
    state: Arc<UnitState>,
    handle: JoinHandle<()>,
}

impl MockUnit {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        info!("Mock HRV unit listening on {}", addr);

        let (commands, _) = broadcast::channel(64);
        let state = Arc::new(UnitState {
            received: Mutex::new(Vec::new()),
            handshakes: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
            reject_upgrades: AtomicBool::new(false),
            rejected: AtomicUsize::new(0),
            ack_commands: AtomicBool::new(true),
            commands,
        });

        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                if accept_state.refuse.load(Ordering::SeqCst) {
                    debug!("Refusing connection from {}", peer);
                    drop(stream);
                    continue;
                }

                let state = accept_state.clone();
                if state.reject_upgrades.load(Ordering::SeqCst) {
                    tokio::spawn(async move {
                        if let Err(e) = reject_upgrade(stream).await {
                            debug!("Reject to {} failed: {}", peer, e);
                        }
                        state.rejected.fetch_add(1, Ordering::SeqCst);
                    });
                    continue;
                }

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        warn!("Mock connection error: {}", e);
                    }
                });
            }
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Client configuration with short timings for tests
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new("127.0.0.1", self.port())
            .with_connect_timeout(Duration::from_secs(2))
            .with_update_interval(Duration::from_secs(60))
            .with_keepalive_interval(Duration::from_secs(60))
            .with_retry_backoff(Duration::from_millis(100))
            .with_command_ack(CommandAck::Immediate)
    }

    /// Lines received from clients, terminators stripped
    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().clone()
    }

    pub fn received_count(&self, line: &str) -> usize {
        self.state
            .received
            .lock()
            .iter()
            .filter(|l| l.as_str() == line)
            .count()
    }

    /// Completed websocket handshakes
    pub fn handshakes(&self) -> usize {
        self.state.handshakes.load(Ordering::SeqCst)
    }

    /// Send raw text to every connected client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.state.commands.send(Command::Push(text.into()));
    }

    /// Drop every open connection without a close handshake
    pub fn drop_connections(&self) {
        let _ = self.state.commands.send(Command::DropAll);
    }

    /// Refuse (or accept again) new TCP connections before the handshake
    pub fn set_refuse(&self, refuse: bool) {
        self.state.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Answer (or stop answering) websocket upgrades with `404 Not Found`
    pub fn set_reject_upgrades(&self, reject: bool) {
        self.state.reject_upgrades.store(reject, Ordering::SeqCst);
    }

    /// Upgrade requests answered with 404
    pub fn rejected_upgrades(&self) -> usize {
        self.state.rejected.load(Ordering::SeqCst)
    }

    /// Whether commands are answered with a `$` acknowledgement
    pub fn set_ack_commands(&self, ack: bool) {
        self.state.ack_commands.store(ack, Ordering::SeqCst);
    }
}

impl Drop for MockUnit {
    fn drop(&mut self) {
        self.handle.abort();
        self.drop_connections();
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<UnitState>) -> Result<()> {
    let mut commands = state.commands.subscribe();
    let ws_stream = accept_async(stream).await?;
    state.handshakes.fetch_add(1, Ordering::SeqCst);
    debug!("Mock websocket connection established");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    for line in text.split(['\r', '\n']).map(str::trim).filter(|l| !l.is_empty()) {
                        debug!("Mock received: {}", line);
                        state.received.lock().push(line.to_string());

                        if line == "#:" {
                            ws_sender.send(Message::Text(STREAMED_LINE.to_string())).await?;
                        } else if state.ack_commands.load(Ordering::SeqCst) {
                            if let Some(ack) = acknowledge(line) {
                                ws_sender.send(Message::Text(ack)).await?;
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("Mock websocket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Ok(Command::Push(text)) => ws_sender.send(Message::Text(text)).await?,
                Ok(Command::DropAll) | Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
        }
    }

    Ok(())
}

async fn reject_upgrade(mut stream: TcpStream) -> Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }

    stream
        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
        .await?;
    stream.shutdown().await?;
    Ok(())
}

fn acknowledge(line: &str) -> Option<String> {
    let message = HrvMessage::decode(line).ok()?;
    if message.context != MessageContext::None {
        return None;
    }
    Some(HrvMessage::with_context(message.key, message.payload, MessageContext::AckOk).encode())
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
