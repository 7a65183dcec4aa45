//! # domlink-core
//!
//! Foundation types for the domlink bridge.
//!
//! - **Branded IDs**: `DestinationUri`, `CorrelationId`, `ActionId` as newtypes
//! - **Protocol**: inbound/outbound frame enums and the `remote-dom` sub-message
//! - **Errors**: `ProtocolError` and `BridgeError` via `thiserror`
//! - **Retry**: `ReconnectPolicy` and backoff math
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod retry;

pub use errors::{BridgeError, ProtocolError};
pub use ids::{ActionId, CorrelationId, DestinationUri};
pub use protocol::{
    DomOp, InboundFrame, OutboundFrame, QueuedAction, RemoteDomMessage, ResponsePayload,
    ToolPayload, decode_inbound, encode_outbound,
};
pub use retry::{Backoff, ReconnectPolicy};
