//! HRV client session
//!
//! [`HrvClient`] is the entry point: it owns the configuration, the data
//! store, the error-frame aggregator, the handler registries and the
//! connection manager. Clones share the same session.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use hrv_codec::{DataKey, Message, MessageContext};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, CommandAck};
use crate::connection::{ConnectionEvents, ConnectionManager};
use crate::dispatch::{DataHandler, Dispatcher, HandlerId, StateHandler};
use crate::error_frame::{ErrorFrameAggregator, FrameOutcome};
use crate::state::ConnectionState;
use crate::store::{DataSnapshot, DataStore};
use crate::Result;

/// Inbound side of the session: decoding, aggregation, storage and dispatch
#[derive(Default)]
struct Session {
    store: DataStore,
    aggregator: ErrorFrameAggregator,
    dispatcher: Dispatcher,
}

impl Session {
    fn handle_message(&self, message: Message) {
        match self.aggregator.process(&message) {
            FrameOutcome::Completed(frame) => {
                debug!("Error frame completed with {} lines", frame.len());
                self.store.set_errors(frame);
            }
            FrameOutcome::Consumed => {}
            FrameOutcome::PassThrough => {
                self.store.set(message.key, message.payload.as_str());
                match message.context {
                    MessageContext::AckOk => {
                        debug!("Command acknowledged: {}", message.key);
                        self.dispatcher.dispatch_data(&self.store.snapshot());
                    }
                    MessageContext::AckError => {
                        warn!("Command rejected by unit: {}", message.key);
                    }
                    MessageContext::None => {}
                }
            }
        }
    }
}

impl ConnectionEvents for Session {
    fn on_line(&self, line: &str) {
        match Message::decode(line) {
            Ok(message) => self.handle_message(message),
            Err(e) if e.is_unrecognized_key() => debug!("{}", e),
            Err(e) => warn!("{}", e),
        }
    }

    fn on_tick(&self) {
        self.dispatcher.dispatch_data(&self.store.snapshot());
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.dispatcher.dispatch_state(state);
    }
}

/// Persistent client for one HRV unit
#[derive(Clone)]
pub struct HrvClient {
    config: Arc<ClientConfig>,
    session: Arc<Session>,
    connection: ConnectionManager,
}

impl HrvClient {
    /// Create a client; call [`HrvClient::connect`] to start streaming
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let session = Arc::new(Session::default());
        let events: Arc<dyn ConnectionEvents> = session.clone();
        let connection = ConnectionManager::new(config.clone(), events);

        Ok(Self {
            config: Arc::new(config),
            session,
            connection,
        })
    }

    /// Connect, run `body`, and close whatever the outcome
    pub async fn scoped<F, Fut, T>(config: ClientConfig, body: F) -> Result<T>
    where
        F: FnOnce(HrvClient) -> Fut,
        Fut: Future<Output = T>,
    {
        let client = HrvClient::new(config)?;
        if let Err(e) = client.connect().await {
            client.close().await;
            return Err(e);
        }

        let output = body(client.clone()).await;
        client.close().await;
        Ok(output)
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect to the unit and start the background pipeline
    pub async fn connect(&self) -> Result<()> {
        info!("Connecting to HRV unit at {}", self.config.address());
        self.connection.connect().await
    }

    /// Stop the connection; no handler round starts after this returns
    pub async fn close(&self) {
        self.session.dispatcher.close();
        self.connection.close().await;
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Latest known values
    pub fn data(&self) -> DataSnapshot {
        self.session.store.snapshot()
    }

    /// Register a handler for periodic and acknowledgement data rounds
    pub fn add_data_handler<H: DataHandler + 'static>(&self, handler: H) -> HandlerId {
        self.session.dispatcher.add_data_handler(handler)
    }

    /// Remove a data handler; unknown ids are ignored
    pub fn remove_data_handler(&self, id: HandlerId) {
        self.session.dispatcher.remove_data_handler(id);
    }

    /// Register a handler for connection state changes
    pub fn add_state_handler<H: StateHandler + 'static>(&self, handler: H) -> HandlerId {
        self.session.dispatcher.add_state_handler(handler)
    }

    /// Remove a state handler; unknown ids are ignored
    pub fn remove_state_handler(&self, id: HandlerId) {
        self.session.dispatcher.remove_state_handler(id);
    }

    /// Enqueue a message without waiting
    pub fn send(&self, message: &Message) -> Result<()> {
        self.connection.send(message.encode())
    }

    /// Submit `#key:value\r`
    ///
    /// With [`CommandAck::GracePeriod`] this waits the configured grace
    /// period after enqueueing. The unit's `$`/`!` reply reaches data
    /// handlers either way.
    pub async fn send_command(&self, key: DataKey, value: impl Display) -> Result<()> {
        let message = Message::new(key, value.to_string());
        info!("Sending command {}", message.encode().trim_end());
        self.send(&message)?;

        if self.config.command_ack == CommandAck::GracePeriod {
            tokio::time::sleep(self.config.command_grace_period()).await;
        }
        Ok(())
    }
}
