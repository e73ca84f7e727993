//! Pending-request table
//!
//! Holds one completion slot per outstanding request. An entry is removed
//! before its caller is woken, so a second response for the same id finds
//! nothing and is dropped.

use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use smol::channel::{self, Receiver, Sender};

use crate::error::{Error, Result};
use crate::ipc::protocol::RequestId;

struct Entry {
    tx: Sender<Result<Value>>,
    issued_at: Instant,
}

/// Handle to the eventual result of a request
///
/// Await it directly, or call [`PendingResponse::wait`]. Dropping the handle
/// abandons the result; the table entry stays until the host answers, the
/// entry is evicted, or the bridge shuts down.
#[derive(Debug)]
pub struct PendingResponse {
    id: RequestId,
    rx: Receiver<Result<Value>>,
}

impl PendingResponse {
    fn new(id: RequestId) -> (Sender<Result<Value>>, Self) {
        let (tx, rx) = channel::bounded(1);
        (tx, Self { id, rx })
    }

    /// A response that has already failed
    pub(crate) fn failed(id: RequestId, error: Error) -> Self {
        let (tx, response) = Self::new(id);
        let _ = tx.try_send(Err(error));
        response
    }

    /// The id this response is correlated by
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the host's answer
    pub async fn wait(self) -> Result<Value> {
        match self.rx.recv().await {
            Ok(result) => result,
            // Every path that removes an entry sends first, so a bare close
            // only happens when the table itself is gone.
            Err(_) => Err(Error::Shutdown),
        }
    }
}

impl IntoFuture for PendingResponse {
    type Output = Result<Value>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

/// Table of requests waiting for exactly one response each
#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<RequestId, Entry>>,
    closed: AtomicBool,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<RequestId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a completion slot for `id`
    ///
    /// Fails after [`shutdown`](Self::shutdown), or if `id` is already waiting.
    pub fn register(&self, id: RequestId) -> Result<PendingResponse> {
        let mut entries = self.entries();
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Shutdown);
        }
        if entries.contains_key(&id) {
            return Err(Error::Protocol(format!("request id {id} is already pending")));
        }

        let (tx, response) = PendingResponse::new(id);
        entries.insert(
            id,
            Entry {
                tx,
                issued_at: Instant::now(),
            },
        );
        Ok(response)
    }

    /// Complete `id` with a value. Returns false if nothing was waiting.
    pub fn resolve(&self, id: RequestId, value: Value) -> bool {
        self.complete(id, Ok(value))
    }

    /// Complete `id` with an error. Returns false if nothing was waiting.
    pub fn reject(&self, id: RequestId, error: Error) -> bool {
        self.complete(id, Err(error))
    }

    fn complete(&self, id: RequestId, result: Result<Value>) -> bool {
        let Some(entry) = self.entries().remove(&id) else {
            return false;
        };
        if entry.tx.try_send(result).is_err() {
            tracing::debug!(%id, "response arrived after caller abandoned request");
        }
        true
    }

    /// Forget `id` without waking its caller
    pub fn remove(&self, id: RequestId) -> bool {
        self.entries().remove(&id).is_some()
    }

    /// Whether `id` is still waiting
    pub fn contains(&self, id: RequestId) -> bool {
        self.entries().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Reject every entry that has waited longer than `max_age`
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<(RequestId, Entry)> = {
            let mut entries = self.entries();
            let ids: Vec<RequestId> = entries
                .iter()
                .filter(|(_, entry)| now.duration_since(entry.issued_at) > max_age)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| entries.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        for (id, entry) in &expired {
            let age = now.duration_since(entry.issued_at);
            tracing::warn!(%id, ?age, "evicting request with no response");
            let _ = entry.tx.try_send(Err(Error::Evicted { id: *id, age }));
        }
        expired.len()
    }

    /// Reject everything still waiting and refuse new registrations
    pub fn shutdown(&self) -> usize {
        let drained: Vec<(RequestId, Entry)> = {
            let mut entries = self.entries();
            self.closed.store(true, Ordering::SeqCst);
            entries.drain().collect()
        };

        for (_, entry) in &drained {
            let _ = entry.tx.try_send(Err(Error::Shutdown));
        }
        drained.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolve_wakes_caller() {
        let table = PendingTable::new();
        let response = table.register(RequestId(1)).unwrap();

        assert!(table.resolve(RequestId(1), json!({ "content": "hi" })));
        assert!(table.is_empty());
        assert_eq!(response.await.unwrap(), json!({ "content": "hi" }));
    }

    #[tokio::test]
    async fn test_reject_carries_message() {
        let table = PendingTable::new();
        let response = table.register(RequestId(2)).unwrap();

        assert!(table.reject(RequestId(2), Error::Host("timeout".to_string())));
        let err = response.await.unwrap_err();
        assert_eq!(err.to_string(), "timeout");
    }

    #[tokio::test]
    async fn test_second_completion_is_noop() {
        let table = PendingTable::new();
        let response = table.register(RequestId(1)).unwrap();

        assert!(table.resolve(RequestId(1), json!(1)));
        assert!(!table.resolve(RequestId(1), json!(2)));
        assert!(!table.reject(RequestId(1), Error::Host("late".to_string())));
        assert_eq!(response.await.unwrap(), json!(1));
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let table = PendingTable::new();
        let _other = table.register(RequestId(1)).unwrap();

        assert!(!table.resolve(RequestId(99), json!(null)));
        assert!(!table.reject(RequestId(99), Error::Host("x".to_string())));
        assert!(table.contains(RequestId(1)));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let table = PendingTable::new();
        let _first = table.register(RequestId(4)).unwrap();
        assert!(matches!(table.register(RequestId(4)), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_abandoned_request_still_completes() {
        let table = PendingTable::new();
        drop(table.register(RequestId(1)).unwrap());

        assert!(table.contains(RequestId(1)));
        assert!(table.resolve(RequestId(1), json!(true)));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_all() {
        let table = PendingTable::new();
        let a = table.register(RequestId(1)).unwrap();
        let b = table.register(RequestId(2)).unwrap();

        assert_eq!(table.shutdown(), 2);
        assert!(matches!(a.await, Err(Error::Shutdown)));
        assert!(matches!(b.await, Err(Error::Shutdown)));
        assert!(matches!(table.register(RequestId(3)), Err(Error::Shutdown)));
    }

    #[tokio::test]
    async fn test_eviction() {
        let table = PendingTable::new();
        let old = table.register(RequestId(1)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let fresh = table.register(RequestId(2)).unwrap();

        assert_eq!(table.evict_older_than(Duration::from_millis(10)), 1);
        assert!(matches!(old.await, Err(Error::Evicted { id: RequestId(1), .. })));
        assert!(table.contains(fresh.id()));
    }
}
