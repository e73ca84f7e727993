//! Page-to-host send primitive
//!
//! The bridge only needs a one-way "post this text" operation; delivery in
//! the other direction is driven by whoever owns the channel, by calling
//! [`Bridge::on_message`](crate::Bridge::on_message) or running the pump.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use smol::channel::{Sender, TrySendError};

use crate::error::{Error, Result};

/// One-way, ordered message channel from the page to the host
///
/// Implementations must not block and must not interpret the message.
pub trait Channel: Send + Sync + 'static {
    fn post_message(&self, message: String) -> Result<()>;
}

impl Channel for Sender<String> {
    fn post_message(&self, message: String) -> Result<()> {
        self.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::Channel("host channel is full".to_string()),
            TrySendError::Closed(_) => Error::Channel("host channel is closed".to_string()),
        })
    }
}

/// Newline-delimited channel over any writer (stdout, a pipe, a socket)
pub struct LineChannel<W> {
    writer: Mutex<W>,
}

impl<W: Write> LineChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send + 'static> Channel for LineChannel<W> {
    fn post_message(&self, message: String) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{message}")
            .and_then(|()| writer.flush())
            .map_err(|e| Error::Channel(e.to_string()))
    }
}
