//! Error types for the HRV client

use hrv_codec::CodecError;
use std::io::ErrorKind;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Main error type for client operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// Handshake did not complete within the configured connect timeout
    #[error("Connection timeout for {address} after {timeout_ms}ms")]
    ConnectTimeout {
        /// The address that timed out
        address: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Connection attempt failed before the handshake completed
    #[error("Connection failed for {address}: {reason}")]
    ConnectionFailed {
        /// The address that failed to connect
        address: String,
        /// Reason for the failure
        reason: String,
    },

    /// No socket exists and no reconnection is in flight
    #[error("Not connected")]
    NotConnected,

    /// The client was closed and cannot be reused
    #[error("Client is stopped")]
    Stopped,

    /// The supervisor gave up on the connection after a fatal fault
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// Fault that ended the session
        reason: String,
    },

    /// Bounded reconnection loop ran out of attempts
    #[error("Maximum reconnection attempts ({attempts}) exceeded for {address}")]
    RetriesExhausted {
        /// Address being reconnected to
        address: String,
        /// Attempts that were made
        attempts: u32,
    },

    /// Host/port do not form a usable websocket address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration error in client settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Socket closed by the remote end
    #[error("Connection closed by remote: {reason:?}")]
    RemoteClosed {
        /// Close reason, if the remote sent one
        reason: Option<String>,
    },

    /// Websocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// I/O error during network operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line could not be decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    /// Whether this fault should drive the connection into RETRYING instead of
    /// being surfaced to the caller
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::ConnectTimeout { .. }
            | ClientError::ConnectionFailed { .. }
            | ClientError::RemoteClosed { .. } => true,
            // Refused upgrade: only 5xx is retried
            ClientError::WebSocket(tungstenite::Error::Http(response)) => {
                response.status().is_server_error()
            }
            ClientError::WebSocket(err) => !matches!(
                err,
                tungstenite::Error::Url(_) | tungstenite::Error::HttpFormat(_)
            ),
            ClientError::Io(err) => !is_permanent_io(err.kind()),
            _ => false,
        }
    }

    /// Check if this error indicates a permanent failure
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidAddress(_)
                | ClientError::Configuration(_)
                | ClientError::RetriesExhausted { .. }
                | ClientError::ConnectionLost { .. }
        ) || (!self.is_transient() && !matches!(self, ClientError::Codec(_)))
    }
}

fn is_permanent_io(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::PermissionDenied
            | ErrorKind::InvalidInput
            | ErrorKind::AddrNotAvailable
            | ErrorKind::Unsupported
    )
}
