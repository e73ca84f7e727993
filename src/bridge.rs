use std::path::Path;
use std::pin::pin;
use std::sync::Arc;

use async_io::Timer;
use executor_core::{Executor, Task};
use futures_lite::{Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::channel::Channel;
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::ipc::{
    Delivery, Dispatcher, ExternalHandler, Gateway, LineStream, PendingResponse, PendingTable,
    Router, StreamId, StreamRegistry,
};
use crate::request::{
    CommandOutput, CommandSpec, DetachedProcess, RequestBody, RunCommand, StreamCommand,
};

/// The page side of the host bridge
///
/// Owns the pending-request table, the stream registry and the external
/// handler slot, and exposes typed operations on top of them. Messages from
/// the host are fed in through [`on_message`](Self::on_message), or by
/// running [`pump`](Self::pump) over an inbound stream.
///
/// When dropped (or [`shutdown`](Self::shutdown)), every pending request
/// fails with [`Error::Shutdown`](crate::Error::Shutdown) and every open
/// stream ends.
pub struct Bridge {
    config: BridgeConfig,
    pending: Arc<PendingTable>,
    streams: Arc<StreamRegistry>,
    dispatcher: Arc<Dispatcher>,
    gateway: Arc<Gateway>,
    router: Router,
}

impl Bridge {
    /// Create a bridge with default configuration
    pub fn new(channel: impl Channel) -> Self {
        Self::with_config(channel, BridgeConfig::default())
    }

    /// Create a bridge with custom configuration
    pub fn with_config(channel: impl Channel, config: BridgeConfig) -> Self {
        let channel: Arc<dyn Channel> = Arc::new(channel);
        let pending = Arc::new(PendingTable::new());
        let streams = Arc::new(StreamRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(channel, Arc::clone(&pending)));
        let gateway = Arc::new(Gateway::new(Arc::clone(&dispatcher)));
        let router = Router::new(
            Arc::clone(&pending),
            Arc::clone(&streams),
            Arc::clone(&gateway),
            config.max_message_len(),
        );

        Self {
            config,
            pending,
            streams,
            dispatcher,
            gateway,
            router,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Send any serializable body and get a handle to the response
    pub fn send_request<T: Serialize + ?Sized>(&self, body: &T) -> PendingResponse {
        self.dispatcher.send_request(body)
    }

    /// Send an untyped JSON body
    pub fn send_value(&self, body: &Value) -> PendingResponse {
        self.dispatcher.send_request(body)
    }

    async fn request<T: DeserializeOwned>(&self, body: &RequestBody) -> Result<T> {
        let value = self.send_request(body).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Write a message to the host's log
    pub async fn log(&self, message: impl Into<String>) -> Result<()> {
        self.request::<Value>(&RequestBody::Log(message.into()))
            .await
            .map(drop)
    }

    /// List a directory on the host
    pub async fn list_dir(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        self.request(&RequestBody::ListDir(path.as_ref().to_path_buf()))
            .await
    }

    pub async fn file_exists(&self, path: impl AsRef<Path>) -> Result<bool> {
        self.request(&RequestBody::FileExists(path.as_ref().to_path_buf()))
            .await
    }

    /// Read a UTF-8 file on the host
    pub async fn read(&self, path: impl AsRef<Path>) -> Result<String> {
        self.request(&RequestBody::Read(path.as_ref().to_path_buf()))
            .await
    }

    /// Run a command on the host and wait for it to exit
    pub async fn run_command(&self, command: impl Into<RunCommand>) -> Result<CommandOutput> {
        self.request(&RequestBody::RunCommand(command.into())).await
    }

    /// Start a command on the host without waiting for it
    pub async fn run_detached_command(&self, spec: CommandSpec) -> Result<DetachedProcess> {
        self.request(&RequestBody::RunDetachedCommand(spec)).await
    }

    /// Start a command on the host and receive its stdout line by line
    ///
    /// The subscription exists before the request is sent, so no early line
    /// is lost. If the host refuses the command it is removed again.
    pub async fn stream_command(&self, spec: CommandSpec) -> Result<LineStream> {
        let stream = self.streams.register();
        let body = RequestBody::StreamCommand(StreamCommand {
            id: stream.id(),
            spec,
        });

        match self.request::<Value>(&body).await {
            Ok(_) => Ok(stream),
            Err(e) => {
                self.streams.unregister(stream.id());
                Err(e)
            }
        }
    }

    /// Stop delivering lines for `id`
    pub fn unregister_stream(&self, id: StreamId) -> bool {
        self.streams.unregister(id)
    }

    /// Install the handler for host-initiated calls, replacing any previous one
    pub fn install_handler(&self, handler: impl ExternalHandler) {
        if self.gateway.install(Arc::new(handler)).is_some() {
            tracing::debug!("replaced external IPC handler");
        }
    }

    /// Remove the external handler; later host calls are answered with an error
    pub fn clear_handler(&self) {
        self.gateway.clear();
    }

    /// Handle one message from the host
    pub fn on_message(&self, raw: &str) -> Delivery {
        self.router.on_message(raw)
    }

    /// Feed every message from `inbound` to the bridge
    ///
    /// When the stream ends the host is gone, so the bridge shuts down.
    pub async fn pump<S>(&self, inbound: S)
    where
        S: Stream<Item = String>,
    {
        let mut inbound = pin!(inbound);
        while let Some(raw) = inbound.next().await {
            self.on_message(&raw);
        }
        tracing::info!("host channel closed");
        self.shutdown();
    }

    /// Run [`pump`](Self::pump) as a detached task on `executor`
    pub fn spawn_pump<E, S>(self: &Arc<Self>, executor: &E, inbound: S)
    where
        E: Executor,
        S: Stream<Item = String> + Send + 'static,
    {
        let bridge = Arc::clone(self);
        executor
            .spawn(async move { bridge.pump(inbound).await })
            .detach();
    }

    /// Reclaim abandoned state
    ///
    /// Evicts requests older than the configured TTL and forgets streams
    /// whose consumer was dropped. Returns the number of evicted requests.
    pub fn sweep(&self) -> usize {
        let pruned = self.streams.prune();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned abandoned streams");
        }
        match self.config.pending_ttl() {
            Some(ttl) => self.pending.evict_older_than(ttl),
            None => 0,
        }
    }

    /// Call [`sweep`](Self::sweep) every `sweep_interval` until shutdown
    pub async fn run_sweeper(&self) {
        let mut ticks = Timer::interval(self.config.sweep_interval());
        while !self.is_shut_down() {
            ticks.next().await;
            self.sweep();
        }
    }

    /// Fail everything pending, end every stream, refuse new requests
    pub fn shutdown(&self) {
        if self.pending.is_shut_down() {
            return;
        }
        let rejected = self.pending.shutdown();
        let ended = self.streams.shutdown();
        tracing::info!(rejected, ended, "bridge shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.pending.is_shut_down()
    }

    /// Number of requests still waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Number of live stream subscriptions
    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
