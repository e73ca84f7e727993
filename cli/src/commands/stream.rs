use anyhow::Context;
use futures_lite::StreamExt;

use crate::cli::CommandArgs;
use crate::commands::{command_spec, session};
use crate::config::MergedConfig;
use crate::error::CliResult;

pub async fn execute(args: CommandArgs, config: MergedConfig) -> CliResult<()> {
    let spec = command_spec(&args)?;

    session(&config, |bridge| async move {
        let mut lines = bridge
            .stream_command(spec)
            .await
            .context("failed to start stream")?;
        tracing::debug!(id = %lines.id(), "stream started");

        while let Some(line) = lines.next().await {
            eprintln!("{}", line?);
        }
        Ok(())
    })
    .await
}
