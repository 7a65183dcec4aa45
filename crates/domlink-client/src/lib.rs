//! # domlink-client
//!
//! Client side of the remote-dom bridge.
//!
//! A [`Session`] owns one socket connection and routes inbound `remote-dom`
//! operations to per-destination [`Receiver`]s, buffering them until a
//! receiver registers. It also tracks request/response exchanges, fans out
//! queued-action notifications, and reconnects according to an injected
//! [`ReconnectPolicy`](domlink_core::ReconnectPolicy).
//!
//! ```no_run
//! # async fn demo() -> Result<(), domlink_core::BridgeError> {
//! use std::sync::Arc;
//! use domlink_client::{ChannelReceiver, Session, SessionConfig, WsConnector};
//!
//! let session = Session::spawn(
//!     SessionConfig::new("ws://127.0.0.1:3001/ws"),
//!     Arc::new(WsConnector::default()),
//! );
//! session.ensure_connected().await?;
//! let (receiver, mut ops) = ChannelReceiver::new();
//! let _ = session.register("ui://panel-1", receiver).await?;
//! while let Some(op) = ops.recv().await {
//!     println!("{op:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod dispatch;
pub mod encoder;
pub mod pending;
pub mod receiver;
pub mod registry;
pub mod session;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod transport;

pub use config::SessionConfig;
pub use dispatch::ActionDispatch;
pub use receiver::{ChannelReceiver, Receiver};
pub use registry::{DestinationSnapshot, DestinationState, RegisterOutcome, RouteOutcome};
pub use session::{ConnectionState, Session, SessionHandle, SessionSnapshot};
pub use transport::{Connection, Connector, WsConnector};
