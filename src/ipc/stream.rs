//! Stream registry for long-lived subscriptions
//!
//! Unlike pending requests, a registration survives any number of
//! dispatches. It goes away when the host ends the stream, when the caller
//! unregisters it, or when the caller drops its [`LineStream`] (noticed on
//! the next dispatch or prune).

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};

use futures_lite::Stream;
use smol::channel::{self, Receiver, Sender};

use crate::error::{Error, Result};
use crate::ipc::protocol::{StreamEnd, StreamId};

#[derive(Debug)]
enum StreamEvent {
    Line(String),
    Failed(String),
}

/// Lines emitted by the host for one streaming command
///
/// Yields each line in delivery order. Ends when the host reports the end
/// of the stream; a failed end yields one final [`Error::StreamEnded`].
/// The sequence cannot be restarted.
#[derive(Debug)]
pub struct LineStream {
    id: StreamId,
    rx: Pin<Box<Receiver<StreamEvent>>>,
}

impl LineStream {
    pub fn id(&self) -> StreamId {
        self.id
    }
}

impl Stream for LineStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let event = ready!(self.rx.as_mut().poll_next(cx));
        Poll::Ready(event.map(|event| match event {
            StreamEvent::Line(line) => Ok(line),
            StreamEvent::Failed(message) => Err(Error::StreamEnded(message)),
        }))
    }
}

/// Registry of live stream subscriptions keyed by [`StreamId`]
pub struct StreamRegistry {
    entries: Mutex<HashMap<StreamId, Sender<StreamEvent>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<StreamId, Sender<StreamEvent>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh stream id and subscribe to it
    ///
    /// After shutdown the returned stream is already finished.
    pub fn register(&self) -> LineStream {
        let id = StreamId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = channel::unbounded();

        let mut entries = self.entries();
        if !self.closed.load(Ordering::SeqCst) {
            entries.insert(id, tx);
        }

        LineStream {
            id,
            rx: Box::pin(rx),
        }
    }

    /// Deliver a line to `id`
    ///
    /// Returns false if no live subscriber exists; the line is dropped.
    pub fn dispatch(&self, id: StreamId, line: String) -> bool {
        let mut entries = self.entries();
        let Some(tx) = entries.get(&id) else {
            return false;
        };
        if tx.try_send(StreamEvent::Line(line)).is_err() {
            entries.remove(&id);
            tracing::debug!(%id, "stream consumer went away, unregistering");
            return false;
        }
        true
    }

    /// End the stream for `id`, delivering the host's error if there is one
    pub fn finish(&self, id: StreamId, end: StreamEnd) -> bool {
        let Some(tx) = self.entries().remove(&id) else {
            return false;
        };
        if let Some(message) = end.err {
            let _ = tx.try_send(StreamEvent::Failed(message));
        }
        true
    }

    /// Stop delivering to `id`. The consumer sees the stream end.
    pub fn unregister(&self, id: StreamId) -> bool {
        self.entries().remove(&id).is_some()
    }

    pub fn contains(&self, id: StreamId) -> bool {
        self.entries().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop registrations whose consumer has gone away
    pub fn prune(&self) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, tx| !tx.is_closed());
        before - entries.len()
    }

    /// End every stream and refuse new subscriptions
    pub fn shutdown(&self) -> usize {
        let mut entries = self.entries();
        self.closed.store(true, Ordering::SeqCst);
        let count = entries.len();
        entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::StreamExt;

    #[tokio::test]
    async fn test_lines_arrive_in_order() {
        let registry = StreamRegistry::new();
        let stream = registry.register();
        let id = stream.id();

        for line in ["a", "b", "c"] {
            assert!(registry.dispatch(id, line.to_string()));
        }
        assert!(registry.finish(id, StreamEnd::default()));

        let lines: Vec<String> = stream.map(|line| line.unwrap()).collect().await;
        assert_eq!(lines, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failed_end_yields_error() {
        let registry = StreamRegistry::new();
        let mut stream = registry.register();
        let id = stream.id();

        registry.dispatch(id, "partial".to_string());
        registry.finish(
            id,
            StreamEnd {
                err: Some("exit status 1".to_string()),
            },
        );

        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        assert!(matches!(stream.next().await, Some(Err(Error::StreamEnded(m))) if m == "exit status 1"));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_registration_survives_dispatch() {
        let registry = StreamRegistry::new();
        let stream = registry.register();

        registry.dispatch(stream.id(), "x".to_string());
        registry.dispatch(stream.id(), "y".to_string());
        assert!(registry.contains(stream.id()));
    }

    #[test]
    fn test_unknown_id_is_dropped() {
        let registry = StreamRegistry::new();
        let stream = registry.register();

        assert!(!registry.dispatch(StreamId(stream.id().0 + 100), "lost".to_string()));
        assert!(!registry.finish(StreamId(500), StreamEnd::default()));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_ends_stream() {
        let registry = StreamRegistry::new();
        let mut stream = registry.register();
        let id = stream.id();

        registry.dispatch(id, "first".to_string());
        assert!(registry.unregister(id));
        assert!(!registry.dispatch(id, "second".to_string()));

        assert_eq!(stream.next().await.unwrap().unwrap(), "first");
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_dropped_consumer_is_cleaned_up() {
        let registry = StreamRegistry::new();
        let a = registry.register();
        let b = registry.register();
        let (a_id, b_id) = (a.id(), b.id());
        drop(a);
        drop(b);

        assert!(!registry.dispatch(a_id, "ignored".to_string()));
        assert!(!registry.contains(a_id));
        assert_eq!(registry.prune(), 1);
        assert!(!registry.contains(b_id));
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = StreamRegistry::new();
        let a = registry.register();
        let b = registry.register();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_shutdown_ends_streams() {
        let registry = StreamRegistry::new();
        let mut stream = registry.register();

        assert_eq!(registry.shutdown(), 1);
        assert!(stream.next().await.is_none());

        let mut late = registry.register();
        assert!(late.next().await.is_none());
        assert!(registry.is_empty());
    }
}
