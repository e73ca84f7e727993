//! Outbound dispatcher
//!
//! Assigns request ids, parks a completion slot in the pending table and
//! posts the envelope. It never waits on the host.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::ipc::pending::{PendingResponse, PendingTable};
use crate::ipc::protocol::{ExternalCallId, Outbound, Outcome, RequestId};

pub struct Dispatcher {
    channel: Arc<dyn Channel>,
    pending: Arc<PendingTable>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn Channel>, pending: Arc<PendingTable>) -> Self {
        Self {
            channel,
            pending,
            next_id: AtomicU64::new(1),
        }
    }

    /// Send `body` to the host and return a handle to its eventual response
    ///
    /// A failure to post (or a bridge that has shut down) completes the
    /// returned handle with that error instead of surfacing it here.
    pub fn send_request<T: Serialize + ?Sized>(&self, body: &T) -> PendingResponse {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let response = match self.pending.register(id) {
            Ok(response) => response,
            Err(e) => return PendingResponse::failed(id, e),
        };

        let posted = serde_json::to_value(body)
            .map_err(Error::from)
            .and_then(|body| Outbound::Window { id, body }.to_json())
            .and_then(|message| self.channel.post_message(message));
        match posted {
            Ok(()) => tracing::debug!(%id, "sent IPC request"),
            Err(e) => {
                tracing::warn!(%id, error = %e, "failed to send IPC request");
                self.pending.reject(id, e);
            }
        }
        response
    }

    /// Send the single reply owed for an external call
    pub fn send_reply(&self, id: ExternalCallId, body: Outcome) -> Result<()> {
        let message = Outbound::External { id, body }.to_json()?;
        self.channel.post_message(message)
    }
}
