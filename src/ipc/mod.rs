//! Correlation and dispatch between page code and the host process
//!
//! Requests go out through the [`Dispatcher`] and wait in the
//! [`PendingTable`] for one response each. Streaming commands subscribe in
//! the [`StreamRegistry`] and receive any number of lines. Calls initiated
//! by the host go through the [`Gateway`] to a page-installed
//! [`ExternalHandler`]. The [`Router`] sorts everything the host sends.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wongus_bridge::ipc::{Dispatcher, Gateway, PendingTable, Router, StreamRegistry};
//!
//! let pending = Arc::new(PendingTable::new());
//! let streams = Arc::new(StreamRegistry::new());
//! let dispatcher = Arc::new(Dispatcher::new(channel, pending.clone()));
//! let gateway = Arc::new(Gateway::new(dispatcher.clone()));
//! let router = Router::new(pending, streams, gateway, 16 * 1024 * 1024);
//!
//! let response = dispatcher.send_request(&json!({ "read": "/etc/hosts" }));
//! // ... the host answers, and whoever owns the channel calls:
//! router.on_message(r#"{"id":1,"body":{"ok":"127.0.0.1 localhost"}}"#);
//! let contents = response.await?;
//! ```

mod dispatcher;
mod gateway;
mod pending;
mod protocol;
mod router;
mod stream;

pub use dispatcher::Dispatcher;
pub use gateway::{ExternalHandler, Gateway};
pub use pending::{PendingResponse, PendingTable};
pub use protocol::{ExternalCallId, Inbound, Outbound, Outcome, RequestId, StreamEnd, StreamId};
pub use router::{Delivery, Router};
pub use stream::{LineStream, StreamRegistry};
