//! Wongus Bridge - request/response correlation between a webview page and its host
//!
//! A page sends requests to the host over a single message channel and gets
//! answers back asynchronously, possibly out of order. This crate pairs each
//! answer with the request that asked for it, delivers line streams from
//! long-running host commands, and answers calls the host makes into the page.
//!
//! # Example
//!
//! ```rust,ignore
//! use wongus_bridge::{Bridge, CommandSpec};
//!
//! async fn tail(bridge: &Bridge) -> wongus_bridge::Result<()> {
//!     let hosts = bridge.read("/etc/hosts").await?;
//!     println!("{hosts}");
//!
//!     let mut lines = bridge
//!         .stream_command(CommandSpec::new(["journalctl", "-f"]))
//!         .await?;
//!     while let Some(line) = lines.next().await {
//!         println!("{}", line?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Wiring
//!
//! The host side of the channel is anything implementing [`Channel`]. Inbound
//! messages are handed to [`Bridge::on_message`] one at a time, or to
//! [`Bridge::pump`] / [`Bridge::spawn_pump`] as a stream. Host-initiated
//! calls reach the handler installed with [`Bridge::install_handler`].

mod bridge;
mod channel;
mod config;
mod error;
pub mod ipc;
mod request;

pub use bridge::Bridge;
pub use channel::{Channel, LineChannel};
pub use config::{
    BridgeConfig, BridgeConfigBuilder, DEFAULT_MAX_MESSAGE_LEN, DEFAULT_SWEEP_INTERVAL,
    MIN_SWEEP_INTERVAL,
};
pub use error::{Error, Result};
pub use ipc::{
    Delivery, ExternalCallId, ExternalHandler, LineStream, Outcome, PendingResponse, RequestId,
    StreamId,
};
pub use request::{
    CommandOutput, CommandSpec, DetachedProcess, RequestBody, RunCommand, StreamCommand,
};
