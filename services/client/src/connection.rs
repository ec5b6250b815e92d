//! # Connection Manager
//!
//! ## Purpose
//!
//! Keeps one logical connection to the unit alive. `connect()` performs the
//! first handshake in the caller's task; after that a supervisor task owns
//! the socket and reconnects on transient faults until `close()`.
//!
//! ## Pipeline
//!
//! Every established socket gets four tasks in one `JoinSet`:
//! - reader: splits text frames into lines and hands them to [`ConnectionEvents`]
//! - writer: drains the per-connection outbound queue in FIFO order
//! - keepalive: enqueues `PONG` at a fixed interval
//! - ticker: requests a periodic data round
//!
//! When any of them ends, the rest are aborted and drained before the
//! supervisor decides whether to reconnect.
//!
//! ## Ordering
//!
//! State transitions go through [`ConnectionState::on_event`] under one
//! re-entrant lock, and state handlers are notified while it is held, so
//! notifications are delivered exactly once and in transition order.

use std::cell::Cell;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hrv_codec::{KEEPALIVE, START_STREAMING};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::state::{ConnectionEvent, ConnectionState, FaultKind, Transition};
use crate::transport::{open_socket, split_lines, WsStream};
use crate::{ClientError, Result};

/// Callbacks from the connection pipeline into the session
pub trait ConnectionEvents: Send + Sync + 'static {
    /// One inbound protocol line, in arrival order
    fn on_line(&self, line: &str);

    /// The periodic update interval elapsed
    fn on_tick(&self);

    /// The connection moved to `state`
    fn on_state_change(&self, state: ConnectionState);
}

struct Shared {
    config: ClientConfig,
    events: Arc<dyn ConnectionEvents>,
    state: ReentrantMutex<Cell<ConnectionState>>,
    outbound: Mutex<Option<UnboundedSender<String>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    fatal_fault: Mutex<Option<String>>,
    stop: watch::Sender<bool>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        self.state.lock().get()
    }

    /// Apply `event` and notify while holding the state lock
    fn transition(&self, event: ConnectionEvent) -> Option<Transition> {
        let state = self.state.lock();
        let current = state.get();
        let transition = current.on_event(event)?;

        info!(
            "Connection state {} -> {} on {:?}",
            current, transition.next, event
        );
        state.set(transition.next);
        self.events.on_state_change(transition.next);
        Some(transition)
    }

    /// Create the outbound queue for a fresh socket and move to OPEN
    ///
    /// The start sentinel is the first queued line. Returns `None` if the
    /// machine refused the transition (closed meanwhile).
    fn establish(&self) -> Option<UnboundedReceiver<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(START_STREAMING.to_string());
        *self.outbound.lock() = Some(tx);
        self.fatal_fault.lock().take();

        if self.transition(ConnectionEvent::Established).is_some() {
            Some(rx)
        } else {
            self.outbound.lock().take();
            None
        }
    }

    /// Remember a fault that ended the session; `send` reports it as
    /// [`ClientError::ConnectionLost`]
    fn record_fatal(&self, fault: &ClientError) {
        *self.fatal_fault.lock() = Some(fault.to_string());
    }
}

/// Supervised websocket connection to the unit
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Create a manager; nothing happens until [`ConnectionManager::connect`]
    pub fn new(config: ClientConfig, events: Arc<dyn ConnectionEvents>) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config,
                events,
                state: ReentrantMutex::new(Cell::new(ConnectionState::None)),
                outbound: Mutex::new(None),
                supervisor: Mutex::new(None),
                fatal_fault: Mutex::new(None),
                stop,
            }),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Open the connection and start the background pipeline
    ///
    /// Fails with [`ClientError::ConnectTimeout`] if the handshake does not
    /// complete in time; the manager is then `Closed` with nothing running.
    /// Calling this while already open or reconnecting is a no-op. A
    /// `close()` during the handshake abandons it and fails with
    /// [`ClientError::Stopped`].
    pub async fn connect(&self) -> Result<()> {
        self.shared.config.validate()?;
        let url = self.shared.config.url()?;
        let mut stop = self.shared.stop.subscribe();

        if self
            .shared
            .transition(ConnectionEvent::ConnectRequested)
            .is_none()
        {
            return match self.state() {
                ConnectionState::Open | ConnectionState::Retrying => Ok(()),
                ConnectionState::Stopped => Err(ClientError::Stopped),
                _ => Err(ClientError::ConnectionFailed {
                    address: self.shared.config.address(),
                    reason: "connection attempt already in progress".to_string(),
                }),
            };
        }

        self.shared.fatal_fault.lock().take();

        let attempt = tokio::select! {
            attempt = open_socket(&url, self.shared.config.connect_timeout()) => attempt,
            _ = stop.changed() => {
                info!("Connect to {} abandoned by close", url);
                return Err(ClientError::Stopped);
            }
        };

        let ws = match attempt {
            Ok(ws) => ws,
            Err(e) => {
                error!("Failed to connect to {}: {}", url, e);
                let kind = fault_kind(&e);
                if kind == FaultKind::Fatal {
                    self.shared.record_fatal(&e);
                }
                self.shared.transition(ConnectionEvent::AttemptFailed(kind));
                return Err(e);
            }
        };

        let outbound_rx = match self.shared.establish() {
            Some(rx) => rx,
            None => return Err(ClientError::Stopped),
        };

        let handle = tokio::spawn(supervise(
            Arc::clone(&self.shared),
            url,
            ws,
            outbound_rx,
            stop,
        ));

        if let Some(previous) = self.shared.supervisor.lock().replace(handle) {
            // Left over from a session that ended in CLOSED; already finished
            previous.abort();
        }
        Ok(())
    }

    /// Enqueue one encoded line for the writer
    ///
    /// Never blocks. While reconnecting the line is dropped.
    pub fn send(&self, line: impl Into<String>) -> Result<()> {
        let mut line = line.into();

        if let Some(tx) = self.shared.outbound.lock().as_ref() {
            debug!("Queueing {:?}", line);
            match tx.send(line) {
                Ok(()) => return Ok(()),
                Err(SendError(returned)) => line = returned,
            }
        }

        match self.state() {
            ConnectionState::Retrying => {
                warn!("Dropping {:?} while reconnecting", line);
                Ok(())
            }
            ConnectionState::Stopped => Err(ClientError::Stopped),
            _ => match self.shared.fatal_fault.lock().clone() {
                Some(reason) => Err(ClientError::ConnectionLost { reason }),
                None => Err(ClientError::NotConnected),
            },
        }
    }

    /// Stop the connection and every pipeline task; idempotent
    pub async fn close(&self) {
        if self
            .shared
            .transition(ConnectionEvent::StopRequested)
            .is_none()
        {
            debug!("Close requested on stopped connection");
            return;
        }

        self.shared.stop.send_replace(true);
        self.shared.outbound.lock().take();

        let supervisor = self.shared.supervisor.lock().take();
        if let Some(handle) = supervisor {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!("Connection supervisor panicked: {}", e);
                }
            }
        }
        info!("Connection to {} closed", self.shared.config.address());
    }
}

fn fault_kind(err: &ClientError) -> FaultKind {
    if err.is_transient() {
        FaultKind::Transient
    } else {
        FaultKind::Fatal
    }
}

/// Owns the socket for the lifetime of the session
async fn supervise(
    shared: Arc<Shared>,
    url: Url,
    mut ws: WsStream,
    mut outbound_rx: UnboundedReceiver<String>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        // close() may have fired before this receiver subscribed
        if *stop.borrow() {
            return;
        }

        let fault = match run_pipeline(&shared, ws, outbound_rx, &mut stop).await {
            Some(fault) => fault,
            None => return,
        };

        let kind = fault_kind(&fault);
        match kind {
            FaultKind::Transient => warn!("Connection to {} lost: {}", url, fault),
            FaultKind::Fatal => error!("Connection to {} failed: {}", url, fault),
        }
        if kind == FaultKind::Fatal {
            shared.record_fatal(&fault);
        }
        match shared.transition(ConnectionEvent::Dropped(kind)) {
            Some(t) if t.next == ConnectionState::Retrying => {}
            _ => return,
        }

        ws = match reconnect(&shared, &url, &mut stop).await {
            Some(ws) => ws,
            None => return,
        };
        outbound_rx = match shared.establish() {
            Some(rx) => rx,
            None => return,
        };
    }
}

/// Retry until a socket is established; `None` ends the session
///
/// The first attempt is immediate, later ones wait `retry_backoff`.
async fn reconnect(
    shared: &Shared,
    url: &Url,
    stop: &mut watch::Receiver<bool>,
) -> Option<WsStream> {
    let config = &shared.config;
    let mut attempts: u32 = 0;

    loop {
        if let Some(max) = config.max_retry_attempts {
            if attempts >= max {
                let fault = ClientError::RetriesExhausted {
                    address: config.address(),
                    attempts,
                };
                error!("{}", fault);
                shared.record_fatal(&fault);
                shared.transition(ConnectionEvent::RetriesExhausted);
                return None;
            }
        }

        if attempts > 0 {
            info!(
                "Reconnecting to {} in {}ms (attempt {})",
                url,
                config.retry_backoff_ms,
                attempts + 1
            );
            tokio::select! {
                _ = sleep(config.retry_backoff()) => {}
                _ = stop.changed() => return None,
            }
        }
        attempts += 1;

        let result = tokio::select! {
            result = open_socket(url, config.connect_timeout()) => result,
            _ = stop.changed() => return None,
        };

        match result {
            Ok(ws) => {
                info!("Reconnected to {} after {} attempt(s)", url, attempts);
                return Some(ws);
            }
            Err(e) => {
                let kind = fault_kind(&e);
                if kind == FaultKind::Fatal {
                    shared.record_fatal(&e);
                }
                if shared.transition(ConnectionEvent::AttemptFailed(kind)).is_some() {
                    error!("Giving up on {}: {}", url, e);
                    return None;
                }
                warn!("Reconnect attempt {} to {} failed: {}", attempts, url, e);
            }
        }
    }
}

/// Run the four per-connection tasks until one ends or a stop is requested
///
/// Returns the fault that ended the connection, or `None` when stopped.
async fn run_pipeline(
    shared: &Arc<Shared>,
    ws: WsStream,
    outbound_rx: UnboundedReceiver<String>,
    stop: &mut watch::Receiver<bool>,
) -> Option<ClientError> {
    let config = &shared.config;
    let (sink, stream) = ws.split();
    let keepalive_tx = shared.outbound.lock().clone()?;

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    tasks.spawn(read_loop(stream, Arc::clone(&shared.events)));
    tasks.spawn(write_loop(sink, outbound_rx));
    tasks.spawn(keepalive_loop(keepalive_tx, config.keepalive_interval()));
    tasks.spawn(tick_loop(
        Arc::clone(&shared.events),
        config.update_interval(),
    ));

    let fault = tokio::select! {
        joined = tasks.join_next() => Some(match joined {
            Some(Ok(Err(e))) => e,
            Some(Ok(Ok(()))) => ClientError::RemoteClosed { reason: None },
            Some(Err(e)) => ClientError::ConnectionFailed {
                address: config.address(),
                reason: format!("pipeline task ended: {}", e),
            },
            None => ClientError::RemoteClosed { reason: None },
        }),
        _ = stop.changed() => None,
    };

    shared.outbound.lock().take();
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
    debug!("Connection pipeline drained");

    fault
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    events: Arc<dyn ConnectionEvents>,
) -> Result<()> {
    while let Some(frame) = stream.next().await {
        match frame? {
            WsMessage::Text(text) => {
                for line in split_lines(&text) {
                    events.on_line(line);
                }
            }
            WsMessage::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => split_lines(text).for_each(|line| events.on_line(line)),
                Err(_) => debug!("Ignoring {} byte binary frame", bytes.len()),
            },
            WsMessage::Close(frame) => {
                return Err(ClientError::RemoteClosed {
                    reason: frame.map(|f| f.reason.to_string()),
                });
            }
            _ => {}
        }
    }

    Err(ClientError::RemoteClosed { reason: None })
}

async fn write_loop(
    mut sink: SplitSink<WsStream, WsMessage>,
    mut outbound_rx: UnboundedReceiver<String>,
) -> Result<()> {
    while let Some(line) = outbound_rx.recv().await {
        debug!("Sending {:?}", line);
        sink.send(WsMessage::Text(line)).await?;
    }
    Ok(())
}

async fn keepalive_loop(
    tx: UnboundedSender<String>,
    period: std::time::Duration,
) -> Result<()> {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        tx.send(KEEPALIVE.to_string())
            .map_err(|_| ClientError::RemoteClosed {
                reason: Some("outbound queue closed".to_string()),
            })?;
    }
}

async fn tick_loop(events: Arc<dyn ConnectionEvents>, period: std::time::Duration) -> Result<()> {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        events.on_tick();
    }
}
