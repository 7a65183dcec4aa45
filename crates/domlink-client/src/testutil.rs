//! In-memory doubles for exercising a session without a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use domlink_core::{BridgeError, DomOp};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::receiver::Receiver;
use crate::transport::{Connection, Connector};

/// Connector whose connections terminate in a [`MemoryServer`].
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<ServerEnd>,
    failures_left: AtomicU32,
    stalls_left: AtomicU32,
    attempts: AtomicU32,
    capacity: usize,
}

impl MemoryConnector {
    /// Create a connector and the server side that accepts its connections.
    pub fn new() -> (Arc<Self>, MemoryServer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accepted: tx,
            failures_left: AtomicU32::new(0),
            stalls_left: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            capacity: 64,
        });
        (connector, MemoryServer { accepted: rx })
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` connect attempts hang without ever completing.
    pub fn stall_next(&self, n: u32) {
        self.stalls_left.store(n, Ordering::SeqCst);
    }

    /// Connect attempts made so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Connection, BridgeError> {
        let _ = self.attempts.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.stalls_left) {
            std::future::pending::<()>().await;
        }
        if take_one(&self.failures_left) {
            return Err(BridgeError::ConnectFailed {
                url: url.to_owned(),
                reason: "refused".into(),
            });
        }

        let (client_tx, server_rx) = mpsc::channel(self.capacity);
        let (server_tx, client_rx) = mpsc::channel(self.capacity);
        let end = ServerEnd {
            to_client: Some(server_tx),
            from_client: server_rx,
        };
        self.accepted
            .send(end)
            .map_err(|_| BridgeError::ConnectFailed {
                url: url.to_owned(),
                reason: "server gone".into(),
            })?;

        Ok(Connection {
            outbound: client_tx,
            inbound: client_rx,
        })
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Accepts connections opened through a [`MemoryConnector`].
pub struct MemoryServer {
    accepted: mpsc::UnboundedReceiver<ServerEnd>,
}

impl MemoryServer {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<ServerEnd> {
        self.accepted.recv().await
    }
}

/// Server side of one in-memory connection.
pub struct ServerEnd {
    to_client: Option<mpsc::Sender<String>>,
    from_client: mpsc::Receiver<String>,
}

impl ServerEnd {
    /// Push a frame to the client. Returns `false` if the client is gone.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        match &self.to_client {
            Some(tx) => tx.send(text.into()).await.is_ok(),
            None => false,
        }
    }

    /// Push a JSON frame to the client.
    pub async fn send_json(&self, value: &Value) -> bool {
        self.send_text(value.to_string()).await
    }

    /// Next frame written by the client, parsed as JSON. `None` once the
    /// client side has closed.
    pub async fn recv_json(&mut self) -> Option<Value> {
        let text = self.from_client.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Close the connection from the server side.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

/// Receiver that records every operation applied to it.
///
/// Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingReceiver {
    ops: Arc<Mutex<Vec<DomOp>>>,
}

impl RecordingReceiver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations applied so far, in order.
    pub fn ops(&self) -> Vec<DomOp> {
        self.ops.lock().clone()
    }
}

impl Receiver for RecordingReceiver {
    fn mutate(&mut self, mutations: &[Value]) {
        self.ops.lock().push(DomOp::Mutate {
            mutations: mutations.to_vec(),
        });
    }

    fn call(&mut self, method: &str, args: &[Value]) {
        self.ops.lock().push(DomOp::Call {
            id: None,
            method: method.to_owned(),
            args: args.to_vec(),
        });
    }

    fn apply(&mut self, op: &DomOp) {
        self.ops.lock().push(op.clone());
    }
}
