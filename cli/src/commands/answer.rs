use std::convert::Infallible;

use futures_lite::future;
use serde_json::Value;

use crate::commands::{connect, stdin_lines};
use crate::config::MergedConfig;
use crate::error::CliResult;

/// Answer every host call with its own body until the host closes stdin
pub async fn execute(config: MergedConfig) -> CliResult<()> {
    let bridge = connect(&config);
    bridge.install_handler(|body: Value| -> Result<Value, Infallible> {
        tracing::info!(%body, "answering external call");
        Ok(body)
    });

    let sweeper = async {
        bridge.run_sweeper().await;
    };
    future::or(bridge.pump(stdin_lines()), sweeper).await;
    Ok(())
}
