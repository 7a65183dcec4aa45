//! Socket transport behind a connector trait.
//!
//! The session never touches a WebSocket directly. It asks a [`Connector`]
//! for a [`Connection`]: a pair of text-frame channels. Closing `inbound`
//! means the socket is gone; dropping `outbound` closes it.

use async_trait::async_trait;
use domlink_core::BridgeError;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// An open duplex text channel.
#[derive(Debug)]
pub struct Connection {
    /// Frames to write to the socket.
    pub outbound: mpsc::Sender<String>,
    /// Frames read from the socket. Yields `None` once the socket closes.
    pub inbound: mpsc::Receiver<String>,
}

/// Opens connections for a session.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Connection, BridgeError>;
}

/// WebSocket connector over `tokio-tungstenite`.
#[derive(Clone, Debug)]
pub struct WsConnector {
    outbound_capacity: usize,
    inbound_capacity: usize,
}

impl WsConnector {
    /// Create a connector with the given writer queue size.
    pub fn new(outbound_capacity: usize) -> Self {
        Self {
            outbound_capacity: outbound_capacity.max(1),
            inbound_capacity: 256,
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, BridgeError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| BridgeError::ConnectFailed {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        debug!(url, "websocket open");

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(self.outbound_capacity);
        let (in_tx, in_rx) = mpsc::channel::<String>(self.inbound_capacity);

        // Writer pump: ends when the session drops its sender.
        let _ = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %e, "websocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader pump: ends on close, error, or when the session stops reading.
        let _ = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text.as_str().to_owned()).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "websocket closed by peer");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "websocket read failed");
                        break;
                    }
                }
            }
        });

        Ok(Connection {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn connect_refused_maps_to_connect_failed() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("ws://{addr}/ws");
        let err = WsConnector::default().connect(&url).await.unwrap_err();
        assert_matches!(err, BridgeError::ConnectFailed { url: ref u, .. } if *u == url);
    }

    #[tokio::test]
    async fn invalid_url_maps_to_connect_failed() {
        let err = WsConnector::default().connect("not a url").await.unwrap_err();
        assert_matches!(err, BridgeError::ConnectFailed { .. });
    }
}
