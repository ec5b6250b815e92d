//! # Handler Dispatch
//!
//! ## Purpose
//!
//! Fan-out of data snapshots and state changes to registered handlers.
//! Handlers live in id-keyed registries and may be added or removed at any
//! time, including from inside a handler: every round iterates a copy of the
//! registry taken when the round starts.
//!
//! ## Failure Isolation
//!
//! A handler that returns `Err` or panics is logged and skipped; the rest of
//! the round still runs and the connection is unaffected.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::state::ConnectionState;
use crate::store::DataSnapshot;

/// Receives the current data snapshot periodically and after acknowledgements
pub trait DataHandler: Send + Sync {
    /// Handle one snapshot
    fn on_data(&self, data: &DataSnapshot) -> anyhow::Result<()>;
}

impl<F> DataHandler for F
where
    F: Fn(&DataSnapshot) -> anyhow::Result<()> + Send + Sync,
{
    fn on_data(&self, data: &DataSnapshot) -> anyhow::Result<()> {
        self(data)
    }
}

/// Receives every connection state transition, in order
pub trait StateHandler: Send + Sync {
    /// Handle one transition
    fn on_state_change(&self, state: ConnectionState) -> anyhow::Result<()>;
}

impl<F> StateHandler for F
where
    F: Fn(ConnectionState) -> anyhow::Result<()> + Send + Sync,
{
    fn on_state_change(&self, state: ConnectionState) -> anyhow::Result<()> {
        self(state)
    }
}

/// Registration token returned when adding a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// Id-keyed handler set
pub struct Registry<H: ?Sized> {
    handlers: Mutex<BTreeMap<HandlerId, Arc<H>>>,
}

impl<H: ?Sized> Default for Registry<H> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<H: ?Sized> Registry<H> {
    /// Store `handler` under `id`, replacing any handler already there
    pub fn insert(&self, id: HandlerId, handler: Arc<H>) {
        self.handlers.lock().insert(id, handler);
    }

    /// Remove a handler; unknown ids are ignored
    pub fn remove(&self, id: HandlerId) -> bool {
        self.handlers.lock().remove(&id).is_some()
    }

    /// Point-in-time copy of the registered handlers
    pub fn snapshot(&self) -> Vec<(HandlerId, Arc<H>)> {
        self.handlers
            .lock()
            .iter()
            .map(|(id, handler)| (*id, Arc::clone(handler)))
            .collect()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// No handlers registered
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }
}

/// Invokes data and state handlers
///
/// Ids come from one per-dispatcher sequence, so a data id never names a
/// state handler.
#[derive(Default)]
pub struct Dispatcher {
    data: Registry<dyn DataHandler>,
    state: Registry<dyn StateHandler>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Dispatcher {
    /// Dispatcher with empty registries
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Register a data handler
    pub fn add_data_handler<H: DataHandler + 'static>(&self, handler: H) -> HandlerId {
        let id = self.next_id();
        self.data.insert(id, Arc::new(handler));
        id
    }

    /// Unregister a data handler
    pub fn remove_data_handler(&self, id: HandlerId) -> bool {
        self.data.remove(id)
    }

    /// Register a state handler
    pub fn add_state_handler<H: StateHandler + 'static>(&self, handler: H) -> HandlerId {
        let id = self.next_id();
        self.state.insert(id, Arc::new(handler));
        id
    }

    /// Unregister a state handler
    pub fn remove_state_handler(&self, id: HandlerId) -> bool {
        self.state.remove(id)
    }

    /// Run one data round unless the dispatcher is closed
    pub fn dispatch_data(&self, data: &DataSnapshot) {
        if self.is_closed() {
            debug!("Dispatcher closed, skipping data round");
            return;
        }

        for (id, handler) in self.data.snapshot() {
            guard("Data", id, || handler.on_data(data));
        }
    }

    /// Notify state handlers of a transition
    pub fn dispatch_state(&self, state: ConnectionState) {
        for (id, handler) in self.state.snapshot() {
            guard("State", id, || handler.on_state_change(state));
        }
    }

    /// Stop starting new data rounds
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`Dispatcher::close`] was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn guard(kind: &str, id: HandlerId, call: impl FnOnce() -> anyhow::Result<()>) {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("{} handler {} failed: {:#}", kind, id, e),
        Err(panic) => error!("{} handler {} panicked: {}", kind, id, panic_message(&*panic)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
