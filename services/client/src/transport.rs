//! Websocket transport helpers

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use crate::{ClientError, Result};

/// Websocket stream to the unit
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a websocket to `url`, bounded by `connect_timeout`
pub async fn open_socket(url: &Url, connect_timeout: Duration) -> Result<WsStream> {
    let address = url.as_str().trim_end_matches('/').to_string();
    debug!("Connecting to {}", address);

    match timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((ws_stream, response))) => {
            info!(
                "Connected to {} with response: {:?}",
                address,
                response.status()
            );
            Ok(ws_stream)
        }
        Ok(Err(tungstenite::Error::Url(e))) => {
            Err(ClientError::InvalidAddress(format!("{}: {}", address, e)))
        }
        Ok(Err(tungstenite::Error::Io(e))) => {
            debug!("Handshake with {} failed: {}", address, e);
            Err(ClientError::Io(e))
        }
        Ok(Err(e)) => {
            debug!("Handshake with {} failed: {}", address, e);
            Err(ClientError::WebSocket(e))
        }
        Err(_) => Err(ClientError::ConnectTimeout {
            address,
            timeout_ms: connect_timeout.as_millis() as u64,
        }),
    }
}

/// Protocol lines carried by one text frame
///
/// A frame may hold several `\r` or `\n` separated lines; blank segments are
/// skipped.
pub fn split_lines(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_single_line() {
        let lines: Vec<_> = split_lines("#MF: 1+ 0+ 2\r").collect();
        assert_eq!(lines, vec!["#MF: 1+ 0+ 2"]);
    }

    #[test]
    fn test_split_batched_frame() {
        let lines: Vec<_> = split_lines("#*EA:\r#*EB:Filter\r\n#*EZ:").collect();
        assert_eq!(lines, vec!["#*EA:", "#*EB:Filter", "#*EZ:"]);
    }

    #[test]
    fn test_split_skips_blank_segments() {
        assert_eq!(split_lines("\r\n \r").count(), 0);
    }

    #[tokio::test]
    async fn test_refused_connection_is_transient() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("ws://127.0.0.1:{}", port)).unwrap();
        let err = open_socket(&url, Duration::from_secs(2)).await.unwrap_err();
        assert!(err.is_transient(), "{err}");
    }

    #[tokio::test]
    async fn test_silent_listener_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}", listener.local_addr().unwrap())).unwrap();

        let err = open_socket(&url, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ConnectTimeout { timeout_ms: 200, .. }));
    }
}
