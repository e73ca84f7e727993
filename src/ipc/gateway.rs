//! External invocation gateway
//!
//! The host may call into the page. Each call is answered exactly once:
//! with the handler's value, with the handler's error, or with an error
//! saying no handler is installed.

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::Error;
use crate::ipc::dispatcher::Dispatcher;
use crate::ipc::protocol::{ExternalCallId, Outcome};

/// Page-supplied logic for host-initiated calls
///
/// Closures of the form `Fn(Value) -> Result<Value, E>` with `E: Display`
/// implement this automatically.
///
/// # Example
///
/// ```rust,ignore
/// bridge.install_handler(|body: Value| -> Result<Value, String> {
///     match body.get("ping") {
///         Some(_) => Ok(json!("pong")),
///         None => Err("unsupported call".to_string()),
///     }
/// });
/// ```
pub trait ExternalHandler: Send + Sync + 'static {
    /// Handle one call. The error text is sent back to the host verbatim.
    fn handle(&self, body: Value) -> Result<Value, String>;
}

impl<F, E> ExternalHandler for F
where
    F: Fn(Value) -> Result<Value, E> + Send + Sync + 'static,
    E: Display,
{
    fn handle(&self, body: Value) -> Result<Value, String> {
        self(body).map_err(|e| e.to_string())
    }
}

pub struct Gateway {
    handler: Mutex<Option<Arc<dyn ExternalHandler>>>,
    replies: Arc<Dispatcher>,
}

impl Gateway {
    pub fn new(replies: Arc<Dispatcher>) -> Self {
        Self {
            handler: Mutex::new(None),
            replies,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<dyn ExternalHandler>>> {
        self.handler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `handler`, replacing any previous one
    pub fn install(&self, handler: Arc<dyn ExternalHandler>) -> Option<Arc<dyn ExternalHandler>> {
        self.slot().replace(handler)
    }

    /// Remove the installed handler, if any
    pub fn clear(&self) -> Option<Arc<dyn ExternalHandler>> {
        self.slot().take()
    }

    pub fn has_handler(&self) -> bool {
        self.slot().is_some()
    }

    /// Run the installed handler against `body`
    ///
    /// A panicking handler is treated like one that returned an error.
    pub fn invoke(&self, body: Value) -> Outcome {
        // Cloned out so a handler may reinstall itself without deadlocking.
        let Some(handler) = self.slot().clone() else {
            return Outcome::Err(Error::NoHandler.to_string());
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(body))) {
            Ok(result) => result.into(),
            Err(payload) => Outcome::Err(Error::Handler(panic_message(payload.as_ref())).to_string()),
        }
    }

    /// Answer one host-initiated call
    pub fn on_external_call(&self, id: ExternalCallId, body: Value) {
        let outcome = self.invoke(body);
        if let Outcome::Err(message) = &outcome {
            tracing::warn!(%id, error = %message, "external IPC call failed");
        } else {
            tracing::debug!(%id, "external IPC call handled");
        }

        if let Err(e) = self.replies.send_reply(id, outcome) {
            tracing::warn!(%id, error = %e, "failed to send external IPC reply");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
