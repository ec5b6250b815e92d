//! # HRV Client
//!
//! ## Purpose
//!
//! Persistent client for an HRV ventilation unit's line protocol over
//! websocket. A single [`HrvClient`] keeps the connection alive across
//! drops, records the latest value of every reported property, folds
//! multi-line error reports into [`ErrorFrame`]s and notifies registered
//! handlers on a fixed cadence, after acknowledged commands and on every
//! connection state change.
//!
//! ## Architecture
//!
//! ```text
//! socket ─▶ reader ─▶ Message::decode ─▶ ErrorFrameAggregator ─┬─▶ DataStore
//!                                                              └─▶ Dispatcher (on $ ack)
//! ticker ─────────────────────────────────────────────────────────▶ Dispatcher
//! send_command ─▶ outbound queue ─▶ writer ─▶ socket      keepalive ─▶ outbound queue
//! ```
//!
//! The [`ConnectionManager`] drives an explicit state machine
//! ([`ConnectionState::on_event`]) and restarts the per-connection tasks on
//! every reconnect. The store and handler registries outlive reconnects.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hrv_client::{ClientConfig, DataSnapshot, HrvClient};
//! use hrv_codec::DataKey;
//!
//! # async fn run() -> hrv_client::Result<()> {
//! let client = HrvClient::new(ClientConfig::new("192.168.1.151", 3001))?;
//! client.add_data_handler(|data: &DataSnapshot| {
//!     println!("fan mode: {:?}", data.property(DataKey::ModeFan));
//!     anyhow::Ok(())
//! });
//! client.connect().await?;
//! client.send_command(DataKey::ModeFan, 2).await?;
//! client.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod error_frame;
pub mod state;
pub mod store;
pub mod transport;

pub use client::HrvClient;
pub use config::{ClientConfig, CommandAck, DEFAULT_PORT};
pub use connection::{ConnectionEvents, ConnectionManager};
pub use dispatch::{DataHandler, Dispatcher, HandlerId, StateHandler};
pub use error::{ClientError, Result};
pub use error_frame::{ErrorFrame, ErrorFrameAggregator, FrameOutcome};
pub use state::{Action, ConnectionEvent, ConnectionState, FaultKind, Transition};
pub use store::{DataSnapshot, DataStore};

pub use hrv_codec::{DataKey, Message, MessageContext, PropertyValue, SystemProperty};
