//! Inbound router for messages arriving from the host

use std::sync::Arc;

use crate::error::Error;
use crate::ipc::gateway::Gateway;
use crate::ipc::pending::PendingTable;
use crate::ipc::protocol::{Inbound, Outcome};
use crate::ipc::stream::StreamRegistry;

/// What became of one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Resolved,
    Rejected,
    Line,
    StreamEnded,
    External,
    /// Undecodable, or addressed to an id nobody is waiting on
    Dropped,
}

/// Routes decoded envelopes to the pending table, the stream registry or
/// the external gateway
///
/// Nothing that arrives from the host can make this fail: bad or stale
/// envelopes are logged and dropped.
pub struct Router {
    pending: Arc<PendingTable>,
    streams: Arc<StreamRegistry>,
    gateway: Arc<Gateway>,
    max_message_len: usize,
}

impl Router {
    pub fn new(
        pending: Arc<PendingTable>,
        streams: Arc<StreamRegistry>,
        gateway: Arc<Gateway>,
        max_message_len: usize,
    ) -> Self {
        Self {
            pending,
            streams,
            gateway,
            max_message_len,
        }
    }

    /// Handle one raw message from the host
    pub fn on_message(&self, raw: &str) -> Delivery {
        let inbound = match Inbound::decode(raw, self.max_message_len) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(error = %e, len = raw.len(), "dropping undecodable IPC message");
                return Delivery::Dropped;
            }
        };
        self.route(inbound)
    }

    /// Route an already-decoded envelope
    pub fn route(&self, inbound: Inbound) -> Delivery {
        match inbound {
            Inbound::Response { id, body } => {
                let (delivered, delivery) = match body {
                    Outcome::Ok(value) => (self.pending.resolve(id, value), Delivery::Resolved),
                    Outcome::Err(message) => (
                        self.pending.reject(id, Error::Host(message)),
                        Delivery::Rejected,
                    ),
                };
                if delivered {
                    tracing::debug!(%id, "IPC response delivered");
                    delivery
                } else {
                    tracing::warn!(%id, "dropping response for unknown or completed request");
                    Delivery::Dropped
                }
            }
            Inbound::StreamLine { id, line } => {
                if self.streams.dispatch(id, line) {
                    Delivery::Line
                } else {
                    // Expected after an unsubscribe: the host keeps emitting until the command exits
                    tracing::debug!(%id, "dropping line for unknown stream");
                    Delivery::Dropped
                }
            }
            Inbound::StreamEnd { id, end } => {
                if let Some(err) = &end.err {
                    tracing::warn!(%id, error = %err, "stream ended with error");
                }
                if self.streams.finish(id, end) {
                    tracing::debug!(%id, "stream ended");
                    Delivery::StreamEnded
                } else {
                    tracing::debug!(%id, "dropping end for unknown stream");
                    Delivery::Dropped
                }
            }
            Inbound::ExternalCall { id, body } => {
                self.gateway.on_external_call(id, body);
                Delivery::External
            }
        }
    }
}
